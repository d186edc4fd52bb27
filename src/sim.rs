//! Software platform for running the interrupt path without hardware.
//!
//! [`SimulatedPorts`] answers on the same six ports as a PC/AT: both 8259s
//! (with the ICW1..ICW4 state machine and mask registers) and the PS/2
//! controller (status bit plus a small scancode queue). Every write is
//! appended to a bounded log so command ordering can be asserted.

use crate::constants::keyboard::{DATA_PORT, STATUS_OUTPUT_BUFFER_FULL, STATUS_PORT};
use crate::constants::pic::{
    END_OF_INTERRUPT, PRIMARY_COMMAND_PORT, PRIMARY_DATA_PORT, SECONDARY_COMMAND_PORT,
    SECONDARY_DATA_PORT,
};
use crate::port::PortIo;

const SCANCODE_QUEUE_SIZE: usize = 16;
const WRITE_LOG_SIZE: usize = 64;

/// Position in the initialization sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcwStep {
    Ready,
    AwaitIcw2,
    AwaitIcw3,
    AwaitIcw4,
}

/// One 8259A as seen through its command and data ports.
#[derive(Debug, Clone, Copy)]
pub struct SimPic {
    /// Interrupt Mask Register, bit set = line disabled
    pub imr: u8,
    /// ICW2
    pub vector_base: u8,
    /// ICW3
    pub cascade: u8,
    /// ICW4
    pub mode: u8,
    pub step: IcwStep,
    /// Times a full ICW1..ICW4 sequence completed
    pub initializations: u32,
    pub end_of_interrupts: u32,
    icw4_expected: bool,
    single: bool,
}

impl SimPic {
    pub const fn new(vector_base: u8) -> Self {
        SimPic {
            imr: 0xff,
            vector_base,
            cascade: 0,
            mode: 0,
            step: IcwStep::Ready,
            initializations: 0,
            end_of_interrupts: 0,
            icw4_expected: false,
            single: false,
        }
    }

    fn finish(&mut self) {
        self.step = IcwStep::Ready;
        self.initializations += 1;
    }

    fn write_command(&mut self, value: u8) {
        if value & 0x10 != 0 {
            // ICW1 restarts initialization and clears the mask
            self.step = IcwStep::AwaitIcw2;
            self.icw4_expected = value & 0x01 != 0;
            self.single = value & 0x02 != 0;
            self.imr = 0;
        } else if value == END_OF_INTERRUPT {
            self.end_of_interrupts += 1;
        }
    }

    fn write_data(&mut self, value: u8) {
        match self.step {
            IcwStep::AwaitIcw2 => {
                self.vector_base = value & 0xf8;
                if !self.single {
                    self.step = IcwStep::AwaitIcw3;
                } else if self.icw4_expected {
                    self.step = IcwStep::AwaitIcw4;
                } else {
                    self.finish();
                }
            }
            IcwStep::AwaitIcw3 => {
                self.cascade = value;
                if self.icw4_expected {
                    self.step = IcwStep::AwaitIcw4;
                } else {
                    self.finish();
                }
            }
            IcwStep::AwaitIcw4 => {
                self.mode = value;
                self.finish();
            }
            // OCW1
            IcwStep::Ready => self.imr = value,
        }
    }

    /// Vector the CPU would see for `line`
    pub fn vector_for(&self, line: u8) -> u8 {
        self.vector_base + line
    }
}

/// Ring buffer of scancodes waiting in the PS/2 output buffer
struct ScancodeQueue {
    buffer: [u8; SCANCODE_QUEUE_SIZE],
    read_pos: usize,
    write_pos: usize,
}

impl ScancodeQueue {
    const fn new() -> Self {
        ScancodeQueue {
            buffer: [0; SCANCODE_QUEUE_SIZE],
            read_pos: 0,
            write_pos: 0,
        }
    }

    fn push(&mut self, scancode: u8) -> Result<(), ()> {
        let next_write = (self.write_pos + 1) % SCANCODE_QUEUE_SIZE;
        if next_write == self.read_pos {
            return Err(()); // Queue full
        }
        self.buffer[self.write_pos] = scancode;
        self.write_pos = next_write;
        Ok(())
    }

    fn pop(&mut self) -> Option<u8> {
        if self.read_pos == self.write_pos {
            return None;
        }
        let scancode = self.buffer[self.read_pos];
        self.read_pos = (self.read_pos + 1) % SCANCODE_QUEUE_SIZE;
        Some(scancode)
    }

    fn is_empty(&self) -> bool {
        self.read_pos == self.write_pos
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortWrite {
    pub port: u16,
    pub value: u8,
}

pub struct SimulatedPorts {
    pub primary: SimPic,
    pub secondary: SimPic,
    queue: ScancodeQueue,
    /// Last byte latched in the data register
    last_scancode: u8,
    log: [PortWrite; WRITE_LOG_SIZE],
    log_len: usize,
    dropped_writes: usize,
}

impl SimulatedPorts {
    /// Controllers start at their BIOS vectors (0x08 / 0x70), fully masked.
    pub const fn new() -> Self {
        SimulatedPorts {
            primary: SimPic::new(0x08),
            secondary: SimPic::new(0x70),
            queue: ScancodeQueue::new(),
            last_scancode: 0,
            log: [PortWrite { port: 0, value: 0 }; WRITE_LOG_SIZE],
            log_len: 0,
            dropped_writes: 0,
        }
    }

    /// Latch a scancode as if a key had been pressed or released.
    pub fn push_scancode(&mut self, scancode: u8) -> Result<(), ()> {
        self.queue.push(scancode)
    }

    pub fn has_pending_scancode(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Port writes in issue order; writes past the log capacity are counted, not kept.
    pub fn writes(&self) -> &[PortWrite] {
        &self.log[..self.log_len]
    }

    pub fn dropped_writes(&self) -> usize {
        self.dropped_writes
    }

    pub fn clear_log(&mut self) {
        self.log_len = 0;
        self.dropped_writes = 0;
    }

    fn record(&mut self, port: u16, value: u8) {
        if self.log_len < WRITE_LOG_SIZE {
            self.log[self.log_len] = PortWrite { port, value };
            self.log_len += 1;
        } else {
            self.dropped_writes += 1;
        }
    }
}

impl Default for SimulatedPorts {
    fn default() -> Self {
        Self::new()
    }
}

impl PortIo for SimulatedPorts {
    fn read_u8(&mut self, port: u16) -> u8 {
        match port {
            STATUS_PORT => {
                if self.queue.is_empty() {
                    0
                } else {
                    STATUS_OUTPUT_BUFFER_FULL
                }
            }
            DATA_PORT => {
                if let Some(scancode) = self.queue.pop() {
                    self.last_scancode = scancode;
                }
                self.last_scancode
            }
            PRIMARY_DATA_PORT => self.primary.imr,
            SECONDARY_DATA_PORT => self.secondary.imr,
            PRIMARY_COMMAND_PORT | SECONDARY_COMMAND_PORT => 0,
            _ => 0xff, // floating bus
        }
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        self.record(port, value);
        match port {
            PRIMARY_COMMAND_PORT => self.primary.write_command(value),
            PRIMARY_DATA_PORT => self.primary.write_data(value),
            SECONDARY_COMMAND_PORT => self.secondary.write_command(value),
            SECONDARY_DATA_PORT => self.secondary.write_data(value),
            _ => {}
        }
    }
}
