//! Interrupt vector table in the 8-byte IA-32 gate format.

use core::mem::size_of;

use crate::constants::idt::{FIRST_DEVICE_VECTOR, IDT_SIZE, INTERRUPT_GATE};
use crate::error::{Error, Result};

/// Index into the vector table, checked at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Vector(u8);

impl Vector {
    pub fn new(number: usize) -> Result<Vector> {
        u8::try_from(number)
            .map(Vector)
            .map_err(|_| Error::VectorOutOfRange(number))
    }

    pub const fn from_u8(number: u8) -> Vector {
        Vector(number)
    }

    pub fn as_u8(self) -> u8 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        usize::from(self.0)
    }

    pub fn is_reserved(self) -> bool {
        self.0 < FIRST_DEVICE_VECTOR
    }
}

/// One gate: handler address split in halves around selector and type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(C)]
pub struct GateDescriptor {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl GateDescriptor {
    pub const MISSING: GateDescriptor = GateDescriptor {
        offset_low: 0,
        selector: 0,
        zero: 0,
        type_attr: 0,
        offset_high: 0,
    };

    /// Present ring 0 interrupt gate to `handler` in code segment `selector`.
    pub const fn interrupt_gate(handler: u32, selector: u16) -> GateDescriptor {
        GateDescriptor {
            offset_low: (handler & 0xffff) as u16,
            selector,
            zero: 0,
            type_attr: INTERRUPT_GATE,
            offset_high: (handler >> 16) as u16,
        }
    }

    pub fn handler_address(&self) -> u32 {
        u32::from(self.offset_high) << 16 | u32::from(self.offset_low)
    }

    pub fn offset_low(&self) -> u16 {
        self.offset_low
    }

    pub fn offset_high(&self) -> u16 {
        self.offset_high
    }

    pub fn selector(&self) -> u16 {
        self.selector
    }

    pub fn reserved(&self) -> u8 {
        self.zero
    }

    pub fn type_attr(&self) -> u8 {
        self.type_attr
    }

    pub fn is_present(&self) -> bool {
        self.type_attr & 0x80 != 0
    }

    pub fn privilege_level(&self) -> u8 {
        (self.type_attr >> 5) & 0b11
    }
}

#[repr(C, align(8))]
pub struct VectorTable {
    entries: [GateDescriptor; IDT_SIZE],
}

impl VectorTable {
    pub const fn new() -> Self {
        VectorTable {
            entries: [GateDescriptor::MISSING; IDT_SIZE],
        }
    }

    /// Place `gate` at `vector`. CPU exception vectors are refused.
    pub fn install(&mut self, vector: Vector, gate: GateDescriptor) -> Result<()> {
        if vector.is_reserved() {
            return Err(Error::ReservedVector(vector.as_u8()));
        }
        self.entries[vector.as_usize()] = gate;
        Ok(())
    }

    pub fn get(&self, vector: Vector) -> &GateDescriptor {
        &self.entries[vector.as_usize()]
    }

    pub fn entries(&self) -> &[GateDescriptor] {
        &self.entries
    }

    pub fn pointer(&self) -> TablePointer {
        TablePointer {
            limit: (size_of::<GateDescriptor>() * IDT_SIZE - 1) as u16,
            base: self as *const VectorTable as usize,
        }
    }
}

impl Default for VectorTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Operand of `lidt`: table size minus one, then the linear base address.
#[derive(Debug, Clone, Copy)]
#[repr(C, packed(2))]
pub struct TablePointer {
    limit: u16,
    base: usize,
}

impl TablePointer {
    pub fn limit(&self) -> u16 {
        self.limit
    }

    pub fn base(&self) -> usize {
        self.base
    }
}

/// The privileged "install this table" operation.
pub trait TableLoad {
    /// # Safety
    ///
    /// `pointer` must describe a table that stays valid for as long as it
    /// is active, with handlers that follow the interrupt calling convention.
    unsafe fn load(&mut self, pointer: &TablePointer);
}

/// Install an interrupt gate for `handler` at `vector`.
pub fn install_handler(
    table: &mut VectorTable,
    vector: Vector,
    handler: u32,
    selector: u16,
) -> Result<GateDescriptor> {
    let gate = GateDescriptor::interrupt_gate(handler, selector);
    table.install(vector, gate)?;
    log::debug!("gate {:#04x} -> {:#010x} (cs {:#06x})", vector.as_u8(), handler, selector);
    Ok(gate)
}

/// Make `table` the active vector table.
///
/// # Safety
///
/// See [`TableLoad::load`].
pub unsafe fn load(table: &'static VectorTable, loader: &mut impl TableLoad) {
    let pointer = table.pointer();
    log::debug!("loading vector table at {:#x}, limit {}", pointer.base(), pointer.limit());
    loader.load(&pointer);
}

/// `lidt` for 32-bit protected mode, where the gate format is native.
#[cfg(target_arch = "x86")]
pub struct Lidt;

#[cfg(target_arch = "x86")]
impl TableLoad for Lidt {
    unsafe fn load(&mut self, pointer: &TablePointer) {
        core::arch::asm!(
            "lidt [{}]",
            in(reg) pointer as *const TablePointer,
            options(readonly, nostack, preserves_flags)
        );
    }
}

#[cfg(target_arch = "x86_64")]
pub use long_mode::LongModeLoader;

#[cfg(target_arch = "x86_64")]
mod long_mode {
    use lazy_static::lazy_static;
    use spin::Mutex;
    use x86_64::structures::idt::InterruptDescriptorTable;
    use x86_64::{PrivilegeLevel, VirtAddr};

    use super::{GateDescriptor, TableLoad, TablePointer};
    use crate::constants::idt::FIRST_DEVICE_VECTOR;

    lazy_static! {
        static ref LONG_MODE_IDT: Mutex<InterruptDescriptorTable> =
            Mutex::new(InterruptDescriptorTable::new());
    }

    /// Long mode wants 16-byte gates, so present entries are widened into
    /// a static x86_64 table which is loaded instead of the 8-byte one.
    pub struct LongModeLoader;

    impl TableLoad for LongModeLoader {
        unsafe fn load(&mut self, pointer: &TablePointer) {
            let count = (usize::from(pointer.limit()) + 1) / core::mem::size_of::<GateDescriptor>();
            let gates =
                core::slice::from_raw_parts(pointer.base() as *const GateDescriptor, count);

            let mut idt = LONG_MODE_IDT.lock();
            // exception slots are never installed by this kernel
            for (vector, gate) in gates.iter().enumerate().skip(usize::from(FIRST_DEVICE_VECTOR)) {
                if !gate.is_present() {
                    continue;
                }
                idt[vector as u8]
                    .set_handler_addr(VirtAddr::new(u64::from(gate.handler_address())))
                    .set_privilege_level(PrivilegeLevel::from_u16(u16::from(
                        gate.privilege_level(),
                    )));
            }
            idt.load_unsafe();
        }
    }
}
