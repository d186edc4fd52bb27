//! Byte-wide port I/O as a capability.
//!
//! Everything that touches the keyboard controller or the PICs goes through
//! [`PortIo`], so the same code drives real hardware or [`crate::sim`].

use x86_64::instructions::port::Port;

pub trait PortIo {
    fn read_u8(&mut self, port: u16) -> u8;
    fn write_u8(&mut self, port: u16, value: u8);
}

impl<T: PortIo + ?Sized> PortIo for &mut T {
    fn read_u8(&mut self, port: u16) -> u8 {
        (**self).read_u8(port)
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        (**self).write_u8(port, value)
    }
}

/// `in`/`out` instructions on the current CPU.
pub struct HardwarePorts {
    _private: (),
}

impl HardwarePorts {
    /// # Safety
    ///
    /// Caller must run at a privilege level allowed to do port I/O and must
    /// not hold a second instance that could interleave command sequences.
    pub const unsafe fn new() -> Self {
        HardwarePorts { _private: () }
    }
}

impl PortIo for HardwarePorts {
    fn read_u8(&mut self, port: u16) -> u8 {
        let mut port: Port<u8> = Port::new(port);
        unsafe { port.read() }
    }

    fn write_u8(&mut self, port: u16, value: u8) {
        let mut port: Port<u8> = Port::new(port);
        unsafe { port.write(value) }
    }
}
