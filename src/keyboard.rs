use pc_keyboard::{layouts, DecodedKey, HandleControl, Keyboard, ScancodeSet1};

use crate::constants::keyboard::{
    DATA_PORT, ENTER_KEY_CODE, RELEASE_BIT, SCANCODE_TABLE_LEN, STATUS_OUTPUT_BUFFER_FULL,
    STATUS_PORT,
};
use crate::pic;
use crate::port::PortIo;
use crate::vga_buffer::{TextBuffer, TextRegion};

/// Make code (0..128) to glyph byte. Zero means the key has no glyph.
#[derive(Clone)]
pub struct ScancodeTable {
    map: [u8; SCANCODE_TABLE_LEN],
}

impl ScancodeTable {
    pub const fn from_bytes(map: [u8; SCANCODE_TABLE_LEN]) -> Self {
        ScancodeTable { map }
    }

    /// Unshifted US layout, scancode set 1.
    pub fn us104() -> Self {
        let mut map = [0u8; SCANCODE_TABLE_LEN];
        for code in 0..SCANCODE_TABLE_LEN as u8 {
            // fresh decoder per code so no modifier state carries over
            let mut decoder =
                Keyboard::new(ScancodeSet1::new(), layouts::Us104Key, HandleControl::Ignore);
            if let Ok(Some(event)) = decoder.add_byte(code) {
                if let Some(DecodedKey::Unicode(c)) = decoder.process_keyevent(event) {
                    if c.is_ascii() {
                        map[usize::from(code)] = c as u8;
                    }
                }
            }
        }
        ScancodeTable { map }
    }

    pub fn lookup(&self, code: u8) -> Option<u8> {
        self.map.get(usize::from(code)).copied().filter(|&glyph| glyph != 0)
    }
}

/// What one keyboard interrupt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Status said the output buffer was empty
    NoData,
    /// Break code, ignored
    Released(u8),
    Newline,
    Printed(u8),
    /// Make code with no glyph in the table (modifiers and the like)
    Unmapped(u8),
}

pub struct KeyboardIsr {
    table: ScancodeTable,
}

impl KeyboardIsr {
    pub fn new(table: ScancodeTable) -> Self {
        KeyboardIsr { table }
    }

    pub fn table(&self) -> &ScancodeTable {
        &self.table
    }

    /// Body of the keyboard interrupt. Acknowledges the PIC first so the
    /// next interrupt can be raised, then consumes at most one scancode.
    pub fn service<P, R>(&self, ports: &mut P, screen: &mut TextBuffer<R>) -> KeyOutcome
    where
        P: PortIo,
        R: TextRegion,
    {
        pic::end_of_interrupt(ports);

        // Lowest bit of status will be set if buffer is not empty
        let status = ports.read_u8(STATUS_PORT);
        if status & STATUS_OUTPUT_BUFFER_FULL == 0 {
            return KeyOutcome::NoData;
        }

        let scancode = ports.read_u8(DATA_PORT);
        if scancode & RELEASE_BIT != 0 {
            return KeyOutcome::Released(scancode);
        }

        if scancode == ENTER_KEY_CODE {
            screen.newline();
            return KeyOutcome::Newline;
        }

        match self.table.lookup(scancode) {
            Some(glyph) => {
                screen.write_byte(glyph);
                KeyOutcome::Printed(glyph)
            }
            None => {
                log::trace!("no glyph for scancode {:#04x}", scancode);
                KeyOutcome::Unmapped(scancode)
            }
        }
    }
}
