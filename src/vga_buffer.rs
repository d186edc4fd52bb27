use core::fmt;
use volatile::Volatile;

use crate::constants::vga::{
    BUFFER_ADDR, BUFFER_HEIGHT, BUFFER_WIDTH, BYTES_PER_CELL, REPLACEMENT_GLYPH, SCREEN_SIZE,
};
use crate::error::{Error, Result};

#[allow(dead_code)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Color {
    Black = 0,
    Blue = 1,
    Green = 2,
    Cyan = 3,
    Red = 4,
    Magenta = 5,
    Brown = 6,
    LightGray = 7,
    DarkGray = 8,
    LightBlue = 9,
    LightGreen = 10,
    LightCyan = 11,
    LightRed = 12,
    Pink = 13,
    Yellow = 14,
    White = 15,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct ColorCode(u8);

impl ColorCode {
    pub const fn new(foreground: Color, background: Color) -> ColorCode {
        ColorCode((background as u8) << 4 | (foreground as u8))
    }

    pub const fn from_attribute(attribute: u8) -> ColorCode {
        ColorCode(attribute)
    }

    pub fn attribute(self) -> u8 {
        self.0
    }
}

impl Default for ColorCode {
    fn default() -> Self {
        ColorCode::new(Color::LightGray, Color::Black)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub rows: usize,
    pub columns: usize,
}

impl Geometry {
    pub const STANDARD: Geometry = Geometry { rows: BUFFER_HEIGHT, columns: BUFFER_WIDTH };

    pub const fn row_bytes(&self) -> usize {
        self.columns * BYTES_PER_CELL
    }

    pub const fn screen_bytes(&self) -> usize {
        self.rows * self.row_bytes()
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::STANDARD
    }
}

/// Byte-addressed backing store of a text screen. Write-only from the
/// writer's point of view; offsets are checked by [`TextBuffer`].
pub trait TextRegion {
    fn len(&self) -> usize;
    fn store(&mut self, offset: usize, byte: u8);
}

/// The memory-mapped VGA text buffer.
#[repr(transparent)]
struct Buffer {
    bytes: [Volatile<u8>; SCREEN_SIZE],
}

pub struct VgaRegion {
    buffer: &'static mut Buffer,
}

impl VgaRegion {
    /// # Safety
    ///
    /// 0xb8000 must be identity mapped and no other `VgaRegion` may exist.
    pub unsafe fn new() -> Self {
        VgaRegion {
            buffer: &mut *(BUFFER_ADDR as *mut Buffer),
        }
    }
}

impl TextRegion for VgaRegion {
    fn len(&self) -> usize {
        SCREEN_SIZE
    }

    fn store(&mut self, offset: usize, byte: u8) {
        self.buffer.bytes[offset].write(byte);
    }
}

/// Plain memory with the same layout; lets the screen be inspected.
pub struct MemoryRegion<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> MemoryRegion<N> {
    pub const fn new() -> Self {
        MemoryRegion { bytes: [0; N] }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Character and attribute of the cell at `row`, `col`
    pub fn cell(&self, row: usize, col: usize, columns: usize) -> (u8, u8) {
        let offset = (row * columns + col) * BYTES_PER_CELL;
        (self.bytes[offset], self.bytes[offset + 1])
    }
}

impl<const N: usize> Default for MemoryRegion<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> TextRegion for MemoryRegion<N> {
    fn len(&self) -> usize {
        N
    }

    fn store(&mut self, offset: usize, byte: u8) {
        self.bytes[offset] = byte;
    }
}

/// Text screen with a byte-offset cursor.
///
/// The cursor always points at a character byte. When a write or newline
/// would take it past the end of the region it wraps back to offset 0.
pub struct TextBuffer<R: TextRegion> {
    region: R,
    geometry: Geometry,
    cursor: usize,
    color_code: ColorCode,
}

impl TextBuffer<VgaRegion> {
    pub fn vga(region: VgaRegion, color_code: ColorCode) -> Self {
        TextBuffer {
            region,
            geometry: Geometry::STANDARD,
            cursor: 0,
            color_code,
        }
    }
}

impl<R: TextRegion> TextBuffer<R> {
    pub fn new(region: R, geometry: Geometry, color_code: ColorCode) -> Result<Self> {
        if geometry.columns == 0 || region.len() != geometry.screen_bytes() {
            return Err(Error::BadGeometry);
        }
        Ok(TextBuffer {
            region,
            geometry,
            cursor: 0,
            color_code,
        })
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn color_code(&self) -> ColorCode {
        self.color_code
    }

    pub fn region(&self) -> &R {
        &self.region
    }

    // single entry point for every store into the region
    fn put(&mut self, offset: usize, byte: u8) -> Result<()> {
        let len = self.region.len();
        if offset >= len {
            return Err(Error::OffsetOutOfBounds { offset, len });
        }
        self.region.store(offset, byte);
        Ok(())
    }

    fn put_cell(&mut self, offset: usize, byte: u8) -> Result<()> {
        self.put(offset, byte)?;
        self.put(offset + 1, self.color_code.attribute())
    }

    /// Write one raw byte at the cursor and advance by one cell.
    pub fn write_byte(&mut self, byte: u8) {
        match self.put_cell(self.cursor, byte) {
            Ok(()) => self.cursor += BYTES_PER_CELL,
            Err(e) => log::warn!("dropping glyph {:#04x}: {}", byte, e),
        }
        if self.cursor >= self.region.len() {
            log::trace!("cursor wrapped at {}", self.cursor);
            self.cursor = 0;
        }
    }

    /// Append `text`. Newlines move to the next row, anything that is not
    /// printable ASCII shows as a block.
    pub fn write(&mut self, text: &str) {
        for byte in text.bytes() {
            match byte {
                b'\n' => self.newline(),
                0x20..=0x7e => self.write_byte(byte),
                _ => self.write_byte(REPLACEMENT_GLYPH),
            }
        }
    }

    /// Move to the start of the next row. Already at a row start still
    /// advances one full row.
    pub fn newline(&mut self) {
        let row_bytes = self.geometry.row_bytes();
        self.cursor += row_bytes - self.cursor % row_bytes;
        if self.cursor >= self.region.len() {
            log::trace!("newline wrapped to top");
            self.cursor = 0;
        }
    }

    /// Blank every cell with the current attribute and home the cursor.
    pub fn clear(&mut self) {
        let len = self.region.len();
        for offset in (0..len).step_by(BYTES_PER_CELL) {
            if let Err(e) = self.put_cell(offset, b' ') {
                log::warn!("clear stopped early: {}", e);
                break;
            }
        }
        self.cursor = 0;
    }
}

impl<R: TextRegion> fmt::Write for TextBuffer<R> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.write(s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::vga::DEFAULT_ATTRIBUTE;
    use core::fmt::Write;

    type Screen = TextBuffer<MemoryRegion<SCREEN_SIZE>>;

    fn screen() -> Screen {
        let mut screen =
            TextBuffer::new(MemoryRegion::new(), Geometry::STANDARD, ColorCode::default()).unwrap();
        screen.clear();
        screen
    }

    fn tiny() -> TextBuffer<MemoryRegion<16>> {
        let geometry = Geometry { rows: 2, columns: 4 };
        TextBuffer::new(MemoryRegion::new(), geometry, ColorCode::default()).unwrap()
    }

    #[test]
    fn default_color_is_light_grey_on_black() {
        assert_eq!(ColorCode::default().attribute(), DEFAULT_ATTRIBUTE);
        assert_eq!(ColorCode::new(Color::White, Color::Blue).attribute(), 0x1f);
    }

    #[test]
    fn write_interleaves_attribute() {
        let mut screen = screen();
        screen.write("Hi");
        assert_eq!(screen.cursor(), 4);
        assert_eq!(&screen.region().bytes()[0..4], &[b'H', 0x07, b'i', 0x07]);
    }

    #[test]
    fn write_from_any_cursor() {
        let mut screen = screen();
        screen.write("abc");
        let start = screen.cursor();
        let text = "hello, world";
        screen.write(text);

        assert_eq!(screen.cursor(), start + 2 * text.len());
        let written = &screen.region().bytes()[start..start + 2 * text.len()];
        for (pair, expected) in written.chunks(2).zip(text.bytes()) {
            assert_eq!(pair, &[expected, 0x07]);
        }
    }

    #[test]
    fn newline_goes_to_next_row_start() {
        let mut screen = screen();
        screen.write("Hi");
        screen.newline();
        assert_eq!(screen.cursor(), 160);
    }

    #[test]
    fn newline_on_row_boundary_skips_full_row() {
        let mut screen = screen();
        screen.newline();
        assert_eq!(screen.cursor(), 160);
        screen.newline();
        assert_eq!(screen.cursor(), 320);
    }

    #[test]
    fn newline_formula_holds_for_every_offset_in_first_rows() {
        for c in (0..480).step_by(2) {
            let mut screen = screen();
            for _ in 0..c / 2 {
                screen.write_byte(b'x');
            }
            assert_eq!(screen.cursor(), c);
            screen.newline();
            assert_eq!(screen.cursor(), c + (160 - c % 160));
        }
    }

    #[test]
    fn clear_blanks_every_cell_and_homes_cursor() {
        let mut screen = screen();
        screen.write("some text");
        screen.clear();

        assert_eq!(screen.cursor(), 0);
        for pair in screen.region().bytes().chunks(2) {
            assert_eq!(pair, &[b' ', 0x07]);
        }
    }

    #[test]
    fn write_wraps_to_top_when_full() {
        let mut screen = tiny();
        screen.write("abcdefg");
        assert_eq!(screen.cursor(), 14);
        screen.write("h");
        assert_eq!(screen.cursor(), 0);

        screen.write("Z");
        assert_eq!(screen.cursor(), 2);
        assert_eq!(screen.region().cell(0, 0, 4), (b'Z', 0x07));
        assert_eq!(screen.region().cell(1, 3, 4), (b'h', 0x07));
    }

    #[test]
    fn cursor_stays_inside_region_between_writes() {
        let mut screen = tiny();
        for byte in b"abcdefghijklmnopqrstuvwxyz".iter().copied() {
            screen.write_byte(byte);
            assert!(screen.cursor() < 16, "cursor {} escaped the region", screen.cursor());
            assert_eq!(screen.cursor() % 2, 0);
        }
        screen.newline();
        assert!(screen.cursor() < 16);
    }

    #[test]
    fn custom_attribute_is_used_for_every_cell() {
        let attribute = ColorCode::from_attribute(0x1e);
        let geometry = Geometry { rows: 2, columns: 4 };
        let mut screen = TextBuffer::new(MemoryRegion::<16>::new(), geometry, attribute).unwrap();
        assert_eq!(screen.geometry(), geometry);
        assert_eq!(screen.color_code(), ColorCode::new(Color::Yellow, Color::Blue));

        screen.clear();
        screen.write("ok");
        assert_eq!(screen.region().cell(0, 0, 4), (b'o', 0x1e));
        assert_eq!(screen.region().cell(1, 3, 4), (b' ', 0x1e));
    }

    #[test]
    fn newline_on_last_row_wraps() {
        let mut screen = tiny();
        screen.write("ab");
        screen.newline();
        assert_eq!(screen.cursor(), 8);
        screen.newline();
        assert_eq!(screen.cursor(), 0);
    }

    #[test]
    fn text_newline_and_unprintable_bytes() {
        let mut screen = screen();
        screen.write("a\nb\u{e9}");
        assert_eq!(screen.region().cell(0, 0, 80), (b'a', 0x07));
        assert_eq!(screen.region().cell(1, 0, 80), (b'b', 0x07));
        // two UTF-8 bytes, two replacement glyphs
        assert_eq!(screen.region().cell(1, 1, 80).0, REPLACEMENT_GLYPH);
        assert_eq!(screen.region().cell(1, 2, 80).0, REPLACEMENT_GLYPH);
        assert_eq!(screen.cursor(), 160 + 6);
    }

    #[test]
    fn fmt_write_goes_through_cursor() {
        let mut screen = screen();
        write!(screen, "{}+{}", 1, 2).unwrap();
        assert_eq!(screen.cursor(), 6);
        assert_eq!(screen.region().cell(0, 1, 80).0, b'+');
    }

    #[test]
    fn mismatched_region_is_rejected() {
        let geometry = Geometry { rows: 3, columns: 4 };
        let result = TextBuffer::new(MemoryRegion::<16>::new(), geometry, ColorCode::default());
        assert!(matches!(result, Err(Error::BadGeometry)));
    }

    #[test]
    fn out_of_range_store_is_refused() {
        let mut screen = tiny();
        assert_eq!(screen.put(16, b'x'), Err(Error::OffsetOutOfBounds { offset: 16, len: 16 }));
    }
}
