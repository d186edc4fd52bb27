/// System-wide constants to avoid magic numbers

/// VGA text mode constants
pub mod vga {
    /// VGA text buffer physical address
    pub const BUFFER_ADDR: usize = 0xb8000;

    /// VGA text mode dimensions
    pub const BUFFER_HEIGHT: usize = 25;
    pub const BUFFER_WIDTH: usize = 80;

    /// Each cell is a character byte followed by an attribute byte
    pub const BYTES_PER_CELL: usize = 2;
    pub const SCREEN_SIZE: usize = BUFFER_HEIGHT * BUFFER_WIDTH * BYTES_PER_CELL;

    /// Light grey on black
    pub const DEFAULT_ATTRIBUTE: u8 = 0x07;

    /// Glyph written for bytes outside printable ASCII
    pub const REPLACEMENT_GLYPH: u8 = 0xfe;
}

/// PS/2 Keyboard controller constants
pub mod keyboard {
    /// PS/2 keyboard data port
    pub const DATA_PORT: u16 = 0x60;

    /// PS/2 keyboard status/command port
    pub const STATUS_PORT: u16 = 0x64;

    /// Status register bit flags
    pub const STATUS_OUTPUT_BUFFER_FULL: u8 = 0x01;

    /// Set 1 break codes carry the high bit
    pub const RELEASE_BIT: u8 = 0x80;

    /// Set 1 make code of the main Enter key
    pub const ENTER_KEY_CODE: u8 = 0x1c;

    /// Number of make codes covered by the scancode table
    pub const SCANCODE_TABLE_LEN: usize = 128;

    /// Line the keyboard is wired to on the primary controller
    pub const IRQ: u8 = 1;
}

/// 8259 PIC pair constants
pub mod pic {
    pub const PRIMARY_COMMAND_PORT: u16 = 0x20;
    pub const PRIMARY_DATA_PORT: u16 = 0x21;
    pub const SECONDARY_COMMAND_PORT: u16 = 0xa0;
    pub const SECONDARY_DATA_PORT: u16 = 0xa1;

    /// ICW1: edge triggered, cascaded, ICW4 follows
    pub const ICW1_INIT: u8 = 0x11;

    /// ICW2: we remap PIC interrupts to start at 32 to avoid conflicts with CPU exceptions
    pub const PRIMARY_OFFSET: u8 = 0x20;
    pub const SECONDARY_OFFSET: u8 = PRIMARY_OFFSET + 8;

    /// ICW3: secondary hangs off line 2 of the primary
    pub const ICW3_PRIMARY_CASCADE: u8 = 0x04;
    pub const ICW3_SECONDARY_IDENTITY: u8 = 0x02;

    /// ICW4: 8086/88 mode
    pub const ICW4_8086: u8 = 0x01;

    /// OCW1 value masking every line
    pub const MASK_ALL: u8 = 0xff;

    /// OCW2 non-specific end of interrupt
    pub const END_OF_INTERRUPT: u8 = 0x20;

    pub const LINES_PER_CONTROLLER: u8 = 8;
    pub const IRQ_LINES: u8 = 2 * LINES_PER_CONTROLLER;
}

/// Interrupt descriptor table constants
pub mod idt {
    pub const IDT_SIZE: usize = 256;

    /// Vectors below this are reserved for CPU exceptions
    pub const FIRST_DEVICE_VECTOR: u8 = 32;

    /// Present, DPL 0, 32-bit interrupt gate
    pub const INTERRUPT_GATE: u8 = 0x8e;

    /// First descriptor after the null entry of the GDT
    pub const KERNEL_CODE_SELECTOR: u16 = 0x08;

    pub const KEYBOARD_VECTOR: u8 = super::pic::PRIMARY_OFFSET + super::keyboard::IRQ;
}

/// Serial debug output
pub mod serial {
    /// COM1
    pub const COM1_PORT: u16 = 0x3f8;
}
