#![cfg_attr(not(test), no_std)]

pub mod constants;
pub mod error;
pub mod gdt;
pub mod idt;
pub mod interrupts;
pub mod keyboard;
pub mod pic;
pub mod port;
pub mod serial;
pub mod sim;
pub mod vga_buffer;

pub use error::{Error, Result};

pub fn hlt_loop() -> ! {
    loop {
        x86_64::instructions::hlt();
    }
}
