//! Programming of the cascaded 8259 pair.
//!
//! The controllers only accept their initialization words in one order:
//! ICW1 on the command port, then ICW2, ICW3 and ICW4 on the data port.
//! Both chips are walked through each step before moving to the next one.

use crate::constants::pic::{
    END_OF_INTERRUPT, ICW1_INIT, ICW3_PRIMARY_CASCADE, ICW3_SECONDARY_IDENTITY, ICW4_8086,
    IRQ_LINES, LINES_PER_CONTROLLER, MASK_ALL, PRIMARY_COMMAND_PORT, PRIMARY_DATA_PORT,
    PRIMARY_OFFSET, SECONDARY_COMMAND_PORT, SECONDARY_DATA_PORT, SECONDARY_OFFSET,
};
use crate::constants::keyboard;
use crate::error::{Error, Result};
use crate::port::PortIo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    pub primary_offset: u8,
    pub secondary_offset: u8,
    /// The only line left unmasked after configuration (0..16)
    pub irq: u8,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            primary_offset: PRIMARY_OFFSET,
            secondary_offset: SECONDARY_OFFSET,
            irq: keyboard::IRQ,
        }
    }
}

impl ControllerConfig {
    pub fn new(primary_offset: u8, secondary_offset: u8, irq: u8) -> Result<Self> {
        let config = ControllerConfig { primary_offset, secondary_offset, irq };
        config.validate()?;
        Ok(config)
    }

    /// `irq` is one of the 16 lines and its vector fits in a byte.
    pub fn validate(&self) -> Result<()> {
        self.vector().map(|_| ())
    }

    /// Vector the configured line is delivered on
    pub fn vector(&self) -> Result<u8> {
        let (port, line) = line_of(self.irq)?;
        let offset = if port == PRIMARY_DATA_PORT {
            self.primary_offset
        } else {
            self.secondary_offset
        };
        offset
            .checked_add(line)
            .ok_or(Error::VectorOutOfRange(usize::from(offset) + usize::from(line)))
    }
}

/// Data port of the controller owning `irq`, and the line number on it.
fn line_of(irq: u8) -> Result<(u16, u8)> {
    if irq < LINES_PER_CONTROLLER {
        Ok((PRIMARY_DATA_PORT, irq))
    } else if irq < IRQ_LINES {
        Ok((SECONDARY_DATA_PORT, irq - LINES_PER_CONTROLLER))
    } else {
        Err(Error::InvalidIrq(irq))
    }
}

/// Contents of both Interrupt Mask Registers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskState {
    pub primary: u8,
    pub secondary: u8,
}

impl MaskState {
    pub const ALL_MASKED: MaskState = MaskState { primary: MASK_ALL, secondary: MASK_ALL };

    /// Every line masked except `irq`
    pub fn only(irq: u8) -> Result<MaskState> {
        let mut state = Self::ALL_MASKED;
        let (port, line) = line_of(irq)?;
        if port == PRIMARY_DATA_PORT {
            state.primary &= !(1 << line);
        } else {
            state.secondary &= !(1 << line);
        }
        Ok(state)
    }

    pub fn is_only_enabled(&self, irq: u8) -> bool {
        Self::only(irq).map_or(false, |expected| *self == expected)
    }
}

/// Remap both controllers, mask every line, then unmask `config.irq`.
///
/// Lines are masked before the single unmask so nothing can be delivered
/// through a half-configured controller. A bad configuration is refused
/// before the first port write.
pub fn configure(ports: &mut impl PortIo, config: &ControllerConfig) -> Result<MaskState> {
    config.validate()?;

    // ICW1 - begin initialization
    ports.write_u8(PRIMARY_COMMAND_PORT, ICW1_INIT);
    ports.write_u8(SECONDARY_COMMAND_PORT, ICW1_INIT);

    // ICW2 - vector offsets
    ports.write_u8(PRIMARY_DATA_PORT, config.primary_offset);
    ports.write_u8(SECONDARY_DATA_PORT, config.secondary_offset);

    // ICW3 - cascade wiring
    ports.write_u8(PRIMARY_DATA_PORT, ICW3_PRIMARY_CASCADE);
    ports.write_u8(SECONDARY_DATA_PORT, ICW3_SECONDARY_IDENTITY);

    // ICW4 - environment info
    ports.write_u8(PRIMARY_DATA_PORT, ICW4_8086);
    ports.write_u8(SECONDARY_DATA_PORT, ICW4_8086);

    log::debug!(
        "PICs remapped to {:#04x}/{:#04x}",
        config.primary_offset,
        config.secondary_offset
    );

    mask_all(ports);
    unmask(ports, config.irq)?;

    let masks = read_masks(ports);
    log::debug!("PIC masks: primary {:#04x}, secondary {:#04x}", masks.primary, masks.secondary);
    Ok(masks)
}

pub fn mask_all(ports: &mut impl PortIo) {
    ports.write_u8(PRIMARY_DATA_PORT, MASK_ALL);
    ports.write_u8(SECONDARY_DATA_PORT, MASK_ALL);
}

/// Enable a single line, leaving the other mask bits as they are.
pub fn unmask(ports: &mut impl PortIo, irq: u8) -> Result<()> {
    let (port, bit) = line_of(irq)?;
    let mask = ports.read_u8(port);
    ports.write_u8(port, mask & !(1 << bit));
    Ok(())
}

pub fn read_masks(ports: &mut impl PortIo) -> MaskState {
    MaskState {
        primary: ports.read_u8(PRIMARY_DATA_PORT),
        secondary: ports.read_u8(SECONDARY_DATA_PORT),
    }
}

/// Acknowledge the current interrupt on the primary controller.
pub fn end_of_interrupt(ports: &mut impl PortIo) {
    ports.write_u8(PRIMARY_COMMAND_PORT, END_OF_INTERRUPT);
}
