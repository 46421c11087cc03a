//! Command builder for ESC/POS and Star line-mode printers
//!
//! Provides a fluent API for building print data. Text is encoded through the
//! configured character set as it is written, so the buffer always holds the
//! exact bytes that go over the wire.

use crate::encoding::CharacterSet;
use crate::error::{PrintError, PrintResult};
use crate::raster::RasterImage;
use crate::table::{self, TableCell};
use serde::{Deserialize, Serialize};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;
const FS: u8 = 0x1C;
const RS: u8 = 0x1E;
const BEL: u8 = 0x07;

/// Rows sent under one raster header
pub const RASTER_BAND_ROWS: usize = 256;

/// Command dialect spoken by the printer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterType {
    /// ESC/POS (Epson and most clones)
    #[default]
    Epson,
    /// Star line mode
    Star,
}

impl PrinterType {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "epson" | "escpos" => Some(PrinterType::Epson),
            "star" => Some(PrinterType::Star),
            _ => None,
        }
    }
}

/// Horizontal alignment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    fn code(self) -> u8 {
        match self {
            Align::Left => 0,
            Align::Center => 1,
            Align::Right => 2,
        }
    }
}

/// 1D barcode options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BarcodeOptions {
    /// Module width in dots (2-6)
    pub width: u8,
    /// Bar height in dots
    pub height: u8,
    /// Human readable text: 0 none, 1 above, 2 below, 3 both
    pub hri_pos: u8,
    /// HRI font: 0 font A, 1 font B
    pub hri_font: u8,
    /// Append the check digit to EAN/UPC data that is one digit short
    pub include_parity: bool,
}

impl Default for BarcodeOptions {
    fn default() -> Self {
        Self {
            width: 3,
            height: 168,
            hri_pos: 0,
            hri_font: 0,
            include_parity: true,
        }
    }
}

/// QR code options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QrOptions {
    /// Module size in dots (1-16)
    pub cell_size: u8,
    /// Error correction level: L, M, Q or H
    pub correction: char,
    /// QR model (1 or 2)
    pub model: u8,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            cell_size: 3,
            correction: 'M',
            model: 2,
        }
    }
}

impl QrOptions {
    /// Error correction index, 0 (L) to 3 (H)
    fn correction_level(&self) -> u8 {
        match self.correction.to_ascii_uppercase() {
            'L' => 0,
            'Q' => 2,
            'H' => 3,
            _ => 1,
        }
    }
}

/// ESC/POS `GS k` function B symbology ids
pub mod symbology {
    pub const UPC_A: u8 = 65;
    pub const UPC_E: u8 = 66;
    pub const EAN13: u8 = 67;
    pub const EAN8: u8 = 68;
    pub const CODE39: u8 = 69;
    pub const ITF: u8 = 70;
    pub const CODABAR: u8 = 71;
    pub const CODE93: u8 = 72;
    pub const CODE128: u8 = 73;
}

/// Star `ESC b` type for an ESC/POS symbology id
fn star_barcode_type(id: u8) -> Option<u8> {
    let n1 = match id {
        symbology::UPC_E => 48,
        symbology::UPC_A => 49,
        symbology::EAN8 => 50,
        symbology::EAN13 => 51,
        symbology::CODE39 => 52,
        symbology::ITF => 53,
        symbology::CODE128 => 54,
        symbology::CODE93 => 55,
        symbology::CODABAR => 56,
        _ => return None,
    };
    Some(n1)
}

/// Digits including the check digit, for symbologies that carry one
fn full_length(id: u8) -> Option<usize> {
    match id {
        symbology::UPC_A => Some(12),
        symbology::EAN13 => Some(13),
        symbology::EAN8 => Some(8),
        _ => None,
    }
}

/// GS1 mod-10 check digit
fn check_digit(digits: &str) -> Option<char> {
    let mut sum = 0u32;
    for (i, c) in digits.chars().rev().enumerate() {
        let d = c.to_digit(10)?;
        sum += if i % 2 == 0 { d * 3 } else { d };
    }
    char::from_digit((10 - sum % 10) % 10, 10)
}

/// Printer command builder
///
/// Builds ESC/POS or Star byte sequences for thermal printers.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    printer_type: PrinterType,
    charset: CharacterSet,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(printer_type: PrinterType, charset: CharacterSet, width: usize) -> Self {
        let mut builder = Self {
            buf: Vec::with_capacity(4096),
            width,
            printer_type,
            charset,
        };
        builder.reset();
        builder
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn printer_type(&self) -> PrinterType {
        self.printer_type
    }

    pub fn charset(&self) -> CharacterSet {
        self.charset
    }

    /// Drop everything and start over with a freshly initialised printer
    pub fn clear(&mut self) -> &mut Self {
        self.buf.clear();
        self.reset()
    }

    /// Initialise the printer (ESC @) and select the code page
    pub fn reset(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x40]);
        match self.printer_type {
            PrinterType::Epson => {
                // ESC t n
                self.buf
                    .extend_from_slice(&[ESC, 0x74, self.charset.epson_table()]);
                if self.charset.is_multibyte() {
                    // FS & - Kanji mode on
                    self.buf.extend_from_slice(&[FS, 0x26]);
                }
            }
            PrinterType::Star => {
                // ESC GS t n
                self.buf
                    .extend_from_slice(&[ESC, GS, 0x74, self.charset.star_table()]);
            }
        }
        self
    }

    // === Text Output ===

    /// Write text, encoded for the selected code page
    pub fn text(&mut self, s: &str) -> &mut Self {
        let encoded = self.charset.encode(s);
        self.buf.extend_from_slice(&encoded);
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    // === Alignment ===

    pub fn align(&mut self, align: Align) -> &mut Self {
        match self.printer_type {
            PrinterType::Epson => self.buf.extend_from_slice(&[ESC, 0x61, align.code()]),
            PrinterType::Star => self.buf.extend_from_slice(&[ESC, GS, 0x61, align.code()]),
        }
        self
    }

    /// Align text to center
    pub fn center(&mut self) -> &mut Self {
        self.align(Align::Center)
    }

    /// Align text to left (default)
    pub fn left(&mut self) -> &mut Self {
        self.align(Align::Left)
    }

    /// Align text to right
    pub fn right(&mut self) -> &mut Self {
        self.align(Align::Right)
    }

    // === Text Style ===

    /// Enable or disable bold text
    pub fn bold(&mut self, on: bool) -> &mut Self {
        match (self.printer_type, on) {
            (PrinterType::Epson, on) => self.buf.extend_from_slice(&[ESC, 0x45, on as u8]),
            (PrinterType::Star, true) => self.buf.extend_from_slice(&[ESC, 0x45]),
            (PrinterType::Star, false) => self.buf.extend_from_slice(&[ESC, 0x46]),
        }
        self
    }

    /// Enable or disable single underline
    pub fn underline(&mut self, on: bool) -> &mut Self {
        // ESC - n, same in both dialects
        self.buf.extend_from_slice(&[ESC, 0x2D, on as u8]);
        self
    }

    // === Separators ===

    /// Print a line of `ch` across the paper
    pub fn rule(&mut self, ch: char) -> &mut Self {
        let line: String = std::iter::repeat_n(ch, self.width).collect();
        self.line(&line)
    }

    // === Layout Helpers ===

    /// Print one table row, continuing overflowing cells on extra lines
    pub fn table_row(&mut self, cells: &[TableCell]) -> &mut Self {
        for row in table::layout(cells, self.width, self.charset) {
            for segment in row {
                if segment.bold {
                    self.bold(true);
                }
                self.text(&segment.text);
                if segment.bold {
                    self.bold(false);
                }
            }
            self.newline();
        }
        self
    }

    // === Paper Control ===

    /// Cut paper (full cut)
    pub fn cut(&mut self) -> &mut Self {
        match self.printer_type {
            // GS V 0
            PrinterType::Epson => self.buf.extend_from_slice(&[GS, 0x56, 0x00]),
            // ESC d 2 - feed to cutter, full cut
            PrinterType::Star => self.buf.extend_from_slice(&[ESC, 0x64, 0x02]),
        }
        self
    }

    /// Partial cut (leave a small connection)
    pub fn cut_partial(&mut self) -> &mut Self {
        match self.printer_type {
            // GS V 1
            PrinterType::Epson => self.buf.extend_from_slice(&[GS, 0x56, 0x01]),
            // ESC d 3 - feed to cutter, partial cut
            PrinterType::Star => self.buf.extend_from_slice(&[ESC, 0x64, 0x03]),
        }
        self
    }

    /// Sound the buzzer
    pub fn beep(&mut self) -> &mut Self {
        match self.printer_type {
            // ESC B n t - 3 beeps, 200ms each
            PrinterType::Epson => self.buf.extend_from_slice(&[ESC, 0x42, 0x03, 0x02]),
            // ESC GS BEL m t1 t2 - external buzzer
            PrinterType::Star => self
                .buf
                .extend_from_slice(&[ESC, GS, BEL, 0x01, 0x02, 0x05]),
        }
        self
    }

    // === Cash Drawer ===

    /// Open cash drawer (pin 2)
    pub fn open_drawer(&mut self) -> &mut Self {
        match self.printer_type {
            // ESC p m t1 t2 - Generate pulse on pin m
            PrinterType::Epson => self.buf.extend_from_slice(&[ESC, 0x70, 0x00, 25, 250]),
            PrinterType::Star => self.buf.push(BEL),
        }
        self
    }

    // === QR Code ===

    /// Print a QR code
    pub fn qr_code(&mut self, data: &str, options: &QrOptions) -> PrintResult<&mut Self> {
        if data.is_empty() {
            return Err(PrintError::InvalidData("empty QR payload".into()));
        }
        let data_bytes = data.as_bytes();
        if data_bytes.len() > 7089 {
            return Err(PrintError::InvalidData(format!(
                "QR payload too long: {} bytes",
                data_bytes.len()
            )));
        }
        let size = options.cell_size.clamp(1, 16);
        let level = options.correction_level();
        let model = if options.model == 1 { 1 } else { 2 };

        match self.printer_type {
            PrinterType::Epson => {
                // Function 165: Select model
                self.buf.extend_from_slice(&[
                    GS, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x30 + model, 0x00,
                ]);
                // Function 167: Set module size
                self.buf
                    .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);
                // Function 169: Set error correction
                self.buf
                    .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x30 + level]);
                // Function 180: Store data
                let len = data_bytes.len() + 3;
                let p_l = (len & 0xFF) as u8;
                let p_h = ((len >> 8) & 0xFF) as u8;
                self.buf
                    .extend_from_slice(&[GS, 0x28, 0x6B, p_l, p_h, 0x31, 0x50, 0x30]);
                self.buf.extend_from_slice(data_bytes);
                // Function 181: Print
                self.buf
                    .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);
            }
            PrinterType::Star => {
                self.buf.extend_from_slice(&[ESC, GS, b'y', b'S', b'0', model]);
                self.buf.extend_from_slice(&[ESC, GS, b'y', b'S', b'1', level]);
                self.buf
                    .extend_from_slice(&[ESC, GS, b'y', b'S', b'2', size.min(8)]);
                let len = data_bytes.len();
                self.buf.extend_from_slice(&[
                    ESC,
                    GS,
                    b'y',
                    b'D',
                    b'1',
                    0,
                    (len & 0xFF) as u8,
                    ((len >> 8) & 0xFF) as u8,
                ]);
                self.buf.extend_from_slice(data_bytes);
                self.buf.extend_from_slice(&[ESC, GS, b'y', b'P']);
            }
        }
        self.buf.push(b'\n');
        Ok(self)
    }

    // === Barcode ===

    /// Print a 1D barcode
    ///
    /// `id` is an ESC/POS function B symbology (65-73); Star printers get
    /// the equivalent `ESC b` type.
    pub fn barcode(
        &mut self,
        data: &str,
        id: u8,
        options: &BarcodeOptions,
    ) -> PrintResult<&mut Self> {
        if data.is_empty() {
            return Err(PrintError::InvalidData("empty barcode data".into()));
        }
        let star_type = star_barcode_type(id)
            .ok_or_else(|| PrintError::InvalidData(format!("unsupported barcode type {}", id)))?;

        let mut payload = data.to_string();
        if let Some(full) = full_length(id) {
            if !payload.chars().all(|c| c.is_ascii_digit()) {
                return Err(PrintError::InvalidData(format!(
                    "barcode type {} takes digits only",
                    id
                )));
            }
            if options.include_parity
                && payload.len() + 1 == full
                && let Some(digit) = check_digit(&payload)
            {
                payload.push(digit);
            }
        }

        match self.printer_type {
            PrinterType::Epson => {
                if id == symbology::CODE128 && !payload.starts_with('{') {
                    payload.insert_str(0, "{B");
                }
                let bytes = payload.as_bytes();
                if bytes.len() > 255 {
                    return Err(PrintError::InvalidData("barcode data too long".into()));
                }
                // GS H n - HRI position
                self.buf.extend_from_slice(&[GS, 0x48, options.hri_pos.min(3)]);
                // GS f n - HRI font
                self.buf.extend_from_slice(&[GS, 0x66, options.hri_font.min(1)]);
                // GS h n - height
                self.buf.extend_from_slice(&[GS, 0x68, options.height.max(1)]);
                // GS w n - module width
                self.buf.extend_from_slice(&[GS, 0x77, options.width.clamp(2, 6)]);
                // GS k m n d1..dn
                self.buf.extend_from_slice(&[GS, 0x6B, id, bytes.len() as u8]);
                self.buf.extend_from_slice(bytes);
            }
            PrinterType::Star => {
                let n2 = if options.hri_pos == 0 { 49 } else { 50 };
                let n3 = 48 + options.width.clamp(2, 4) - 1;
                self.buf
                    .extend_from_slice(&[ESC, 0x62, star_type, n2, n3, options.height.max(1)]);
                self.buf.extend_from_slice(payload.as_bytes());
                self.buf.push(RS);
            }
        }
        Ok(self)
    }

    // === Raster ===

    /// Print a 1-bit raster image
    ///
    /// Sent in bands of at most [`RASTER_BAND_ROWS`] rows, each with its own
    /// header, so any height fits the 16-bit row count.
    pub fn raster(&mut self, image: &RasterImage) -> &mut Self {
        let x_bytes = image.width_bytes() as usize;
        if x_bytes == 0 {
            return self;
        }
        for band in image.data().chunks(x_bytes * RASTER_BAND_ROWS) {
            let rows = band.len() / x_bytes;
            match self.printer_type {
                PrinterType::Epson => {
                    // GS v 0 m xL xH yL yH
                    self.buf.extend_from_slice(&[GS, 0x76, 0x30, 0x00]);
                }
                PrinterType::Star => {
                    // ESC GS S m xL xH yL yH n
                    self.buf.extend_from_slice(&[ESC, GS, 0x53, 0x01]);
                }
            }
            self.buf.push(x_bytes as u8);
            self.buf.push((x_bytes >> 8) as u8);
            self.buf.push(rows as u8);
            self.buf.push((rows >> 8) as u8);
            if self.printer_type == PrinterType::Star {
                self.buf.push(0x00);
            }
            self.buf.extend_from_slice(band);
        }
        self.buf.push(b'\n');
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // === Build ===

    /// Current buffer contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(PrinterType::Epson, CharacterSet::default(), 48)
    }
}
