//! Column layout for table rows
//!
//! A row is a list of cells, each taking a fraction of the paper width.
//! Text that does not fit its column is cut one character short of the
//! column and continued on a following line.

use crate::encoding::CharacterSet;
use crate::escpos::Align;

/// One cell of a table row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCell {
    pub text: String,
    pub align: Align,
    /// Fraction of the paper width, `None` for an equal share
    pub width: Option<f32>,
    pub bold: bool,
}

impl TableCell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = align;
        self
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }
}

/// A padded piece of a printed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub bold: bool,
}

/// Columns for a cell on a line of `width` characters
fn column_width(cell: &TableCell, cells: usize, width: usize) -> usize {
    match cell.width {
        Some(fraction) if fraction > 0.0 => (width as f32 * fraction).floor() as usize,
        _ => width / cells.max(1),
    }
}

/// Split `text` into what fits in `column` and the overflow
fn split_overflow(text: &str, column: usize, charset: CharacterSet) -> (String, Option<String>) {
    if charset.width(text) <= column {
        return (text.to_string(), None);
    }
    let mut head = charset.truncate(text, column.saturating_sub(1));
    if head.is_empty() {
        // Always make progress, even on a one-column cell
        head = text.chars().take(1).collect();
    }
    let rest = text[head.len()..].to_string();
    (head, Some(rest))
}

fn pad(text: &str, column: usize, align: Align, charset: CharacterSet) -> String {
    let used = charset.width(text);
    let spaces = column.saturating_sub(used);
    match align {
        Align::Left => format!("{}{}", text, " ".repeat(spaces)),
        Align::Right => format!("{}{}", " ".repeat(spaces), text),
        Align::Center => {
            let before = spaces / 2;
            format!("{}{}{}", " ".repeat(before), text, " ".repeat(spaces - before))
        }
    }
}

/// Lay out one table row
///
/// Returns the printed lines: the row itself followed by any continuation
/// lines for cells that overflowed.
pub fn layout(cells: &[TableCell], width: usize, charset: CharacterSet) -> Vec<Vec<Segment>> {
    let mut lines = Vec::new();
    let mut pending: Vec<TableCell> = cells.to_vec();

    loop {
        let mut line = Vec::with_capacity(pending.len());
        let mut next = Vec::with_capacity(pending.len());
        let mut overflow = false;

        for cell in &pending {
            let column = column_width(cell, pending.len(), width);
            let (head, rest) = split_overflow(&cell.text, column, charset);

            line.push(Segment {
                text: pad(&head, column, cell.align, charset),
                bold: cell.bold,
            });

            let mut continuation = cell.clone();
            continuation.text = match rest {
                Some(rest) => {
                    overflow = true;
                    rest
                }
                None => String::new(),
            };
            next.push(continuation);
        }

        lines.push(line);
        if !overflow {
            break;
        }
        pending = next;
    }

    lines
}
