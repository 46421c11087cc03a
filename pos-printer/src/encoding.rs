//! Character set handling for thermal printers
//!
//! Receipt printers render text through a selectable code page. This module
//! provides utilities for:
//! - Mapping a configured character-set name to the printer's table number
//! - Encoding UTF-8 text into the selected table
//! - Calculating printed widths and padding/truncating to a column width

use crate::codepage::{self, CP437_HIGH, CP850_HIGH, CP852_HIGH};
use encoding_rs::Encoding;

/// Replacement byte for characters the code page cannot represent
const REPLACEMENT: u8 = b'?';

/// Character sets understood by the driver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CharacterSet {
    #[default]
    Pc437Usa,
    Pc850Multilingual,
    Pc852Latin2,
    Pc858Euro,
    Pc866Cyrillic2,
    Wpc1250Latin2,
    Wpc1252,
    /// GBK, sent in Kanji (Chinese) mode
    China,
}

impl CharacterSet {
    /// Parse a configured name such as `PC852_LATIN2`
    ///
    /// Short aliases (`PC852`, `CP437`, `GBK`...) are accepted as well.
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let set = match normalized.as_str() {
            "PC437_USA" | "PC437" | "CP437" => CharacterSet::Pc437Usa,
            "PC850_MULTILINGUAL" | "PC850" | "CP850" => CharacterSet::Pc850Multilingual,
            "PC852_LATIN2" | "PC852" | "CP852" => CharacterSet::Pc852Latin2,
            "PC858_EURO" | "PC858" | "CP858" => CharacterSet::Pc858Euro,
            "PC866_CYRILLIC2" | "PC866" | "CP866" => CharacterSet::Pc866Cyrillic2,
            "WPC1250_LATIN2" | "WPC1250" | "CP1250" => CharacterSet::Wpc1250Latin2,
            "WPC1252" | "CP1252" => CharacterSet::Wpc1252,
            "CHINA" | "GBK" => CharacterSet::China,
            _ => return None,
        };
        Some(set)
    }

    /// ESC/POS character code table (ESC t n)
    pub fn epson_table(self) -> u8 {
        match self {
            CharacterSet::Pc437Usa => 0,
            CharacterSet::Pc850Multilingual => 2,
            CharacterSet::Wpc1252 => 16,
            CharacterSet::Pc866Cyrillic2 => 17,
            CharacterSet::Pc852Latin2 => 18,
            CharacterSet::Pc858Euro => 19,
            CharacterSet::Wpc1250Latin2 => 45,
            CharacterSet::China => 0,
        }
    }

    /// Star line-mode code page (ESC GS t n)
    pub fn star_table(self) -> u8 {
        match self {
            CharacterSet::Pc437Usa => 1,
            CharacterSet::Pc858Euro => 3,
            CharacterSet::Pc850Multilingual => 4,
            CharacterSet::Pc852Latin2 => 5,
            CharacterSet::Pc866Cyrillic2 => 9,
            CharacterSet::Wpc1252 => 32,
            CharacterSet::Wpc1250Latin2 => 33,
            CharacterSet::China => 1,
        }
    }

    /// Double-byte sets need the printer's Kanji mode (FS &)
    pub fn is_multibyte(self) -> bool {
        matches!(self, CharacterSet::China)
    }

    fn whatwg(self) -> Option<&'static Encoding> {
        match self {
            CharacterSet::Pc866Cyrillic2 => Some(encoding_rs::IBM866),
            CharacterSet::Wpc1250Latin2 => Some(encoding_rs::WINDOWS_1250),
            CharacterSet::Wpc1252 => Some(encoding_rs::WINDOWS_1252),
            CharacterSet::China => Some(encoding_rs::GBK),
            _ => None,
        }
    }

    /// Encode a single character, `None` if the set cannot represent it
    fn encode_char(self, ch: char, out: &mut Vec<u8>) -> bool {
        if (ch as u32) < 0x80 {
            out.push(ch as u8);
            return true;
        }

        let single = match self {
            CharacterSet::Pc437Usa => codepage::lookup(&CP437_HIGH, ch),
            CharacterSet::Pc850Multilingual => codepage::lookup(&CP850_HIGH, ch),
            CharacterSet::Pc852Latin2 => codepage::lookup(&CP852_HIGH, ch),
            CharacterSet::Pc858Euro => codepage::lookup_cp858(ch),
            _ => None,
        };
        if let Some(byte) = single {
            out.push(byte);
            return true;
        }

        if let Some(encoding) = self.whatwg() {
            let mut buf = [0u8; 4];
            let (cow, _, had_errors) = encoding.encode(ch.encode_utf8(&mut buf));
            if !had_errors {
                out.extend_from_slice(&cow);
                return true;
            }
        }
        false
    }

    /// Encode text for the printer
    ///
    /// Characters outside the set are replaced with `?`.
    pub fn encode(self, s: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(s.len());
        for ch in s.chars() {
            if !self.encode_char(ch, &mut out) {
                tracing::debug!(character = %ch, charset = ?self, "unmapped character");
                out.push(REPLACEMENT);
            }
        }
        out
    }

    /// Printed width of a string (one column per encoded byte)
    ///
    /// CJK characters are two columns wide in GBK, everything else one.
    pub fn width(self, s: &str) -> usize {
        self.encode(s).len()
    }

    /// Truncate a string to fit within a printed width
    pub fn truncate(self, s: &str, max_width: usize) -> String {
        let mut width = 0;
        let mut result = String::new();
        for c in s.chars() {
            let mut buf = [0u8; 4];
            let char_len = self.width(c.encode_utf8(&mut buf));

            if width + char_len > max_width {
                break;
            }
            result.push(c);
            width += char_len;
        }
        result
    }

    /// Pad a string to a printed width
    ///
    /// If the string is longer than the width, it will be truncated.
    pub fn pad(self, s: &str, width: usize, align_right: bool) -> String {
        let current_width = self.width(s);
        if current_width >= width {
            return self.truncate(s, width);
        }
        let spaces = width - current_width;
        if align_right {
            format!("{}{}", " ".repeat(spaces), s)
        } else {
            format!("{}{}", s, " ".repeat(spaces))
        }
    }
}
