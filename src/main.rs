#![no_std]
#![no_main]
#![feature(abi_x86_interrupt)]

use core::panic::PanicInfo;
use core::ptr::addr_of_mut;
use lazy_static::lazy_static;
use spin::{Mutex, Once};
use x86_64::structures::idt::InterruptStackFrame;

use kbdkernel::constants::idt::KEYBOARD_VECTOR;
use kbdkernel::idt::{LongModeLoader, Vector, VectorTable};
use kbdkernel::interrupts::{self, BootConfig, HandlerTable};
use kbdkernel::keyboard::{KeyboardIsr, ScancodeTable};
use kbdkernel::port::HardwarePorts;
use kbdkernel::vga_buffer::{ColorCode, TextBuffer, VgaRegion};
use kbdkernel::{gdt, hlt_loop, serial, serial_println};

static mut VECTOR_TABLE: VectorTable = VectorTable::new();
static PORTS: Mutex<HardwarePorts> = Mutex::new(unsafe { HardwarePorts::new() });
static HANDLERS: Once<HandlerTable> = Once::new();

lazy_static! {
    static ref SCREEN: Mutex<TextBuffer<VgaRegion>> =
        Mutex::new(TextBuffer::vga(unsafe { VgaRegion::new() }, ColorCode::default()));
    static ref KEYBOARD: KeyboardIsr = KeyboardIsr::new(ScancodeTable::us104());
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("{}", info);
    hlt_loop();
}

// Register save/restore happens in the x86-interrupt prologue
extern "x86-interrupt" fn keyboard_entry(_stack_frame: InterruptStackFrame) {
    if let Some(handlers) = HANDLERS.get() {
        handlers.dispatch(Vector::from_u8(KEYBOARD_VECTOR));
    }
}

fn keyboard_handler() {
    interrupts::service_keyboard(&KEYBOARD, &PORTS, &SCREEN);
}

#[no_mangle]
pub extern "C" fn _start() -> ! {
    if serial::init_logger(log::LevelFilter::Debug).is_err() {
        serial_println!("WARNING: logger was already installed");
    }
    log::info!("booting");

    let code_selector = gdt::init();

    let mut handlers = HandlerTable::new();
    if let Err(e) = handlers.register(Vector::from_u8(KEYBOARD_VECTOR), keyboard_handler) {
        log::error!("cannot bind keyboard handler: {}", e);
        hlt_loop();
    }
    HANDLERS.call_once(|| handlers);

    // build the scancode table before an interrupt can need it
    lazy_static::initialize(&KEYBOARD);

    let Ok(entry) = u32::try_from(keyboard_entry as usize) else {
        log::error!("keyboard entry stub is above 4 GiB");
        hlt_loop();
    };
    let config = BootConfig {
        code_selector: code_selector.0,
        ..BootConfig::new(entry)
    };

    let result = x86_64::instructions::interrupts::without_interrupts(|| {
        let table = unsafe { &mut *addr_of_mut!(VECTOR_TABLE) };
        unsafe {
            interrupts::init(
                &mut *SCREEN.lock(),
                &mut *PORTS.lock(),
                &mut LongModeLoader,
                table,
                &config,
            )
        }
    });

    match result {
        Ok(masks) => log::debug!(
            "PIC masks after init: {:#04x}/{:#04x}",
            masks.primary,
            masks.secondary
        ),
        Err(e) => {
            log::error!("interrupt setup failed: {}", e);
            hlt_loop();
        }
    }

    x86_64::instructions::interrupts::enable();
    log::info!("waiting for keystrokes");
    hlt_loop();
}
