use spin::Mutex;

use crate::constants::idt::{IDT_SIZE, KERNEL_CODE_SELECTOR};
use crate::error::{Error, Result};
use crate::idt::{self, TableLoad, Vector, VectorTable};
use crate::keyboard::{KeyOutcome, KeyboardIsr};
use crate::pic::{self, ControllerConfig, MaskState};
use crate::port::PortIo;
use crate::vga_buffer::{TextBuffer, TextRegion};

pub const BANNER: &str = "Simple Kernel with Keyboard Support";

/// Handlers bound to vector numbers, called from the platform's interrupt stubs.
pub struct HandlerTable {
    handlers: [Option<fn()>; IDT_SIZE],
}

impl HandlerTable {
    pub const fn new() -> Self {
        HandlerTable {
            handlers: [None; IDT_SIZE],
        }
    }

    pub fn register(&mut self, vector: Vector, handler: fn()) -> Result<()> {
        if vector.is_reserved() {
            return Err(Error::ReservedVector(vector.as_u8()));
        }
        let slot = &mut self.handlers[vector.as_usize()];
        if slot.is_some() {
            return Err(Error::VectorOccupied(vector.as_u8()));
        }
        *slot = Some(handler);
        Ok(())
    }

    /// Run the handler for `vector`; false if none is bound.
    pub fn dispatch(&self, vector: Vector) -> bool {
        match self.handlers[vector.as_usize()] {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }
}

impl Default for HandlerTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the keyboard gate points and how the controllers are set up.
#[derive(Debug, Clone, Copy)]
pub struct BootConfig {
    /// Address of the register-saving entry stub for the keyboard vector
    pub keyboard_entry: u32,
    pub code_selector: u16,
    pub controllers: ControllerConfig,
}

impl BootConfig {
    pub fn new(keyboard_entry: u32) -> Self {
        BootConfig {
            keyboard_entry,
            code_selector: KERNEL_CODE_SELECTOR,
            controllers: ControllerConfig::default(),
        }
    }
}

/// Banner, vector table, controllers, in that order. Interrupts are still
/// disabled on return; the caller enables them.
///
/// # Safety
///
/// `config.keyboard_entry` must be a valid interrupt entry point in
/// `config.code_selector`; see [`idt::load`].
pub unsafe fn init<R, P, L>(
    screen: &mut TextBuffer<R>,
    ports: &mut P,
    loader: &mut L,
    table: &'static mut VectorTable,
    config: &BootConfig,
) -> Result<MaskState>
where
    R: TextRegion,
    P: PortIo,
    L: TableLoad,
{
    // refuse a bad line before anything is written
    let vector = Vector::from_u8(config.controllers.vector()?);

    screen.clear();
    screen.write(BANNER);
    screen.newline();
    screen.newline();

    log::debug!("installing keyboard gate");
    idt::install_handler(table, vector, config.keyboard_entry, config.code_selector)?;
    let table: &'static VectorTable = table;
    idt::load(table, loader);

    log::debug!("programming interrupt controllers");
    let masks = pic::configure(ports, &config.controllers)?;
    if !masks.is_only_enabled(config.controllers.irq) {
        log::warn!(
            "unexpected PIC masks {:#04x}/{:#04x}",
            masks.primary,
            masks.secondary
        );
    }

    log::info!("keyboard routed to vector {:#04x}", vector.as_u8());
    Ok(masks)
}

/// One keyboard interrupt with the screen and ports held for the whole
/// routine, so readers never see a half-applied keystroke.
pub fn service_keyboard<P, R>(
    isr: &KeyboardIsr,
    ports: &Mutex<P>,
    screen: &Mutex<TextBuffer<R>>,
) -> KeyOutcome
where
    P: PortIo,
    R: TextRegion,
{
    let mut screen = screen.lock();
    let mut ports = ports.lock();
    isr.service(&mut *ports, &mut *screen)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::idt::KEYBOARD_VECTOR;
    use crate::constants::vga::SCREEN_SIZE;
    use crate::idt::TablePointer;
    use crate::keyboard::ScancodeTable;
    use crate::sim::SimulatedPorts;
    use crate::vga_buffer::{ColorCode, Geometry, MemoryRegion};
    use core::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    type Screen = TextBuffer<MemoryRegion<SCREEN_SIZE>>;

    fn screen() -> Screen {
        TextBuffer::new(MemoryRegion::new(), Geometry::STANDARD, ColorCode::default()).unwrap()
    }

    struct RecordingLoader {
        loads: usize,
        base: usize,
    }

    impl TableLoad for RecordingLoader {
        unsafe fn load(&mut self, pointer: &TablePointer) {
            self.loads += 1;
            self.base = pointer.base();
        }
    }

    static KEYBOARD_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn count_keyboard() {
        KEYBOARD_CALLS.fetch_add(1, Ordering::SeqCst);
    }

    fn noop() {}

    #[test]
    fn registered_handler_is_dispatched() {
        let mut handlers = HandlerTable::new();
        let vector = Vector::from_u8(KEYBOARD_VECTOR);
        handlers.register(vector, count_keyboard).unwrap();

        assert!(handlers.dispatch(vector));
        assert!(!handlers.dispatch(Vector::from_u8(0x22)));
        assert_eq!(KEYBOARD_CALLS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registration_rejects_reserved_and_duplicates() {
        let mut handlers = HandlerTable::new();
        assert_eq!(
            handlers.register(Vector::from_u8(8), noop),
            Err(Error::ReservedVector(8))
        );
        handlers.register(Vector::from_u8(0x21), noop).unwrap();
        assert_eq!(
            handlers.register(Vector::from_u8(0x21), noop),
            Err(Error::VectorOccupied(0x21))
        );
    }

    #[test]
    fn init_prints_banner_and_routes_keyboard() {
        let mut screen = screen();
        let mut ports = SimulatedPorts::new();
        let mut loader = RecordingLoader { loads: 0, base: 0 };
        let table: &'static mut VectorTable = Box::leak(Box::new(VectorTable::new()));
        let table_addr = &*table as *const VectorTable as usize;

        let masks = unsafe {
            init(&mut screen, &mut ports, &mut loader, table, &BootConfig::new(0x0010_2030))
        }
        .unwrap();

        assert_eq!(screen.cursor(), 320);
        let banner: Vec<u8> = screen.region().bytes()[..2 * BANNER.len()]
            .chunks(2)
            .map(|pair| pair[0])
            .collect();
        assert_eq!(banner, BANNER.as_bytes());

        assert_eq!(loader.loads, 1);
        assert_eq!(loader.base, table_addr);
        let installed = unsafe { &*(table_addr as *const VectorTable) };
        let gate = installed.get(Vector::from_u8(KEYBOARD_VECTOR));
        assert_eq!(gate.handler_address(), 0x0010_2030);
        assert_eq!(gate.selector(), KERNEL_CODE_SELECTOR);

        assert!(masks.is_only_enabled(1));
        assert_eq!(ports.primary.vector_for(1), KEYBOARD_VECTOR);
    }

    #[test]
    fn init_refuses_unwired_line_untouched() {
        let mut screen = screen();
        let mut ports = SimulatedPorts::new();
        let mut loader = RecordingLoader { loads: 0, base: 0 };
        let table: &'static mut VectorTable = Box::leak(Box::new(VectorTable::new()));
        let table_addr = &*table as *const VectorTable as usize;
        let mut config = BootConfig::new(0x1000);
        config.controllers.irq = 16;

        let result = unsafe { init(&mut screen, &mut ports, &mut loader, table, &config) };

        assert_eq!(result, Err(Error::InvalidIrq(16)));
        assert!(ports.writes().is_empty());
        assert_eq!(loader.loads, 0);
        assert_eq!(screen.cursor(), 0);
        let untouched = unsafe { &*(table_addr as *const VectorTable) };
        assert!(untouched.entries().iter().all(|gate| !gate.is_present()));
    }

    #[test]
    fn typing_after_init() {
        let mut screen = screen();
        let mut ports = SimulatedPorts::new();
        let mut loader = RecordingLoader { loads: 0, base: 0 };
        let table: &'static mut VectorTable = Box::leak(Box::new(VectorTable::new()));
        unsafe { init(&mut screen, &mut ports, &mut loader, table, &BootConfig::new(0x1000)) }
            .unwrap();

        let isr = KeyboardIsr::new(ScancodeTable::us104());
        // "hi", release, Enter
        for code in [0x23, 0x17, 0x97, 0x1c] {
            ports.push_scancode(code).unwrap();
            isr.service(&mut ports, &mut screen);
        }
        assert_eq!(screen.region().cell(2, 0, 80), (b'h', 0x07));
        assert_eq!(screen.region().cell(2, 1, 80), (b'i', 0x07));
        assert_eq!(screen.cursor(), 480);
        assert_eq!(ports.primary.end_of_interrupts, 4);
    }

    #[test]
    fn readers_never_see_partial_keystrokes() {
        const PRESSES: usize = 500;
        let screen = Arc::new(Mutex::new(screen()));
        let ports = Arc::new(Mutex::new(SimulatedPorts::new()));
        screen.lock().clear();

        let writer = {
            let screen = Arc::clone(&screen);
            let ports = Arc::clone(&ports);
            thread::spawn(move || {
                let isr = KeyboardIsr::new(ScancodeTable::us104());
                for _ in 0..PRESSES {
                    ports.lock().push_scancode(0x1e).unwrap();
                    assert_eq!(service_keyboard(&isr, &*ports, &*screen), KeyOutcome::Printed(b'a'));
                }
            })
        };

        let mut last = 0;
        loop {
            let done = writer.is_finished();
            {
                let screen = screen.lock();
                let cursor = screen.cursor();
                let written = screen
                    .region()
                    .bytes()
                    .chunks(2)
                    .filter(|pair| **pair == [b'a', 0x07])
                    .count();
                assert_eq!(cursor % 2, 0);
                assert_eq!(written * 2, cursor);
                assert!(cursor >= last);
                last = cursor;
            }
            if done {
                break;
            }
        }
        writer.join().unwrap();
        assert_eq!(last, 2 * PRESSES);
    }
}
