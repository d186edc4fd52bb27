use core::fmt;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Vector number does not fit the 256-entry table
    VectorOutOfRange(usize),
    /// Device handlers may not shadow CPU exception vectors
    ReservedVector(u8),
    /// A handler is already bound to this vector
    VectorOccupied(u8),
    /// Text region access outside the mapped bytes
    OffsetOutOfBounds { offset: usize, len: usize },
    /// Region length disagrees with rows * columns * 2
    BadGeometry,
    /// Interrupt line outside the two cascaded controllers
    InvalidIrq(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::VectorOutOfRange(v) => write!(f, "vector {} is outside the descriptor table", v),
            Error::ReservedVector(v) => write!(f, "vector {:#04x} is reserved for CPU exceptions", v),
            Error::VectorOccupied(v) => write!(f, "vector {:#04x} already has a handler", v),
            Error::OffsetOutOfBounds { offset, len } => {
                write!(f, "text offset {} outside buffer of {} bytes", offset, len)
            }
            Error::BadGeometry => write!(f, "text region does not match display geometry"),
            Error::InvalidIrq(irq) => write!(f, "IRQ {} is not wired to either PIC", irq),
        }
    }
}
