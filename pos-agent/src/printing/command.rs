//! Print command model
//!
//! Jobs arrive as loosely shaped JSON. Every entry is decoded into a closed
//! [`Command`] variant; entries that cannot be understood become
//! [`Command::Unrecognized`] and keep their original JSON so the Last Job
//! preview shows exactly what was sent.

use pos_printer::{Align, BarcodeOptions, QrOptions, TableCell, symbology};
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire tags the interpreter knows how to apply
const KNOWN_TAGS: &[&str] = &[
    "text",
    "table",
    "image",
    "barcode",
    "qrcode",
    "separator",
    "newLine",
    "cut",
    "partialCut",
    "beep",
    "raw",
];

/// Horizontal alignment as written by callers
///
/// Matching is case-insensitive; anything unknown means left.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl Alignment {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" | "centre" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::Left,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

impl From<Alignment> for Align {
    fn from(value: Alignment) -> Self {
        match value {
            Alignment::Left => Align::Left,
            Alignment::Center => Align::Center,
            Alignment::Right => Align::Right,
        }
    }
}

impl Serialize for Alignment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Alignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Alignment::parse(&s),
            _ => Alignment::Left,
        })
    }
}

/// Accept strings, numbers and booleans for text fields
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// JavaScript truthiness: `null`, `false`, `0` and `""` are false
fn truthy<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}

/// Like [`truthy`], but `null` leaves the field unset
fn truthy_opt<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        value => Some(is_truthy(&value)),
    })
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `null` means the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Column list where any non-object entry stands for a default column
fn lenient_columns<'de, D>(deserializer: D) -> Result<Vec<ColumnSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    entries
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry {
            value @ Value::Object(_) => serde_json::from_value(value).map_err(de::Error::custom),
            _ => Ok(ColumnSpec::default()),
        })
        .collect()
}

/// `text` command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextCommand {
    #[serde(
        alias = "text",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<String>,
    pub align: Alignment,
    #[serde(deserialize_with = "truthy")]
    pub bold: bool,
    #[serde(deserialize_with = "truthy")]
    pub underline: bool,
}

/// Column definition of a `table` command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnSpec {
    pub align: Alignment,
    /// Fraction of the line width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(deserialize_with = "truthy")]
    pub bold: bool,
}

/// A cell with its own styling; set fields override the column definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructuredCell {
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub align: Option<Alignment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    #[serde(deserialize_with = "truthy_opt", skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
}

/// One table cell: a plain value or a structured cell
#[derive(Debug, Clone, PartialEq)]
pub enum TableCellSpec {
    Structured(StructuredCell),
    Plain(Value),
}

impl TableCellSpec {
    fn text(&self) -> String {
        match self {
            TableCellSpec::Structured(cell) => cell.text.clone().unwrap_or_default(),
            TableCellSpec::Plain(Value::String(s)) => s.clone(),
            TableCellSpec::Plain(Value::Null) => String::new(),
            TableCellSpec::Plain(other) => other.to_string(),
        }
    }

    /// Resolve against the column definition of its position
    ///
    /// Without a width anywhere, the cell gets `1 / row_len` of the line.
    pub fn to_cell(&self, column: Option<&ColumnSpec>, row_len: usize) -> TableCell {
        let default_column = ColumnSpec::default();
        let column = column.unwrap_or(&default_column);
        let (align, width, bold) = match self {
            TableCellSpec::Structured(cell) => (
                cell.align.unwrap_or(column.align),
                cell.width.or(column.width),
                cell.bold.unwrap_or(column.bold),
            ),
            TableCellSpec::Plain(_) => (column.align, column.width, column.bold),
        };

        let width = width
            .filter(|w| *w > 0.0)
            .unwrap_or(1.0 / row_len.max(1) as f32);

        TableCell::new(self.text())
            .align(align.into())
            .width(width)
            .bold(bold)
    }
}

impl Serialize for TableCellSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TableCellSpec::Structured(cell) => cell.serialize(serializer),
            TableCellSpec::Plain(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for TableCellSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            value @ Value::Object(_) => serde_json::from_value(value)
                .map(TableCellSpec::Structured)
                .map_err(de::Error::custom),
            value => Ok(TableCellSpec::Plain(value)),
        }
    }
}

/// `table` command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableCommand {
    #[serde(deserialize_with = "null_as_default")]
    pub rows: Vec<Vec<TableCellSpec>>,
    #[serde(deserialize_with = "lenient_columns")]
    pub columns: Vec<ColumnSpec>,
}

impl TableCommand {
    /// Rows resolved into printer cells, zipped with the columns by index
    pub fn printable_rows(&self) -> impl Iterator<Item = Vec<TableCell>> + '_ {
        self.rows.iter().map(|row| {
            row.iter()
                .enumerate()
                .map(|(idx, cell)| cell.to_cell(self.columns.get(idx), row.len()))
                .collect()
        })
    }
}

/// `image` command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCommand {
    /// Base64 image, optionally as a `data:` URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub align: Alignment,
}

/// Barcode symbology, by `GS k` id or by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BarcodeMode {
    Id(u8),
    Name(String),
}

impl BarcodeMode {
    /// `GS k` function B id, `None` when the mode is not supported
    pub fn symbology(&self) -> Option<u8> {
        match self {
            BarcodeMode::Id(id) => (symbology::UPC_A..=symbology::CODE128)
                .contains(id)
                .then_some(*id),
            BarcodeMode::Name(name) => {
                let normalized = name.trim().to_ascii_uppercase().replace(['-', '_', ' '], "");
                let id = match normalized.as_str() {
                    "UPCA" => symbology::UPC_A,
                    "UPCE" => symbology::UPC_E,
                    "EAN13" | "JAN13" => symbology::EAN13,
                    "EAN8" | "JAN8" => symbology::EAN8,
                    "CODE39" => symbology::CODE39,
                    "ITF" => symbology::ITF,
                    "CODABAR" | "NW7" => symbology::CODABAR,
                    "CODE93" => symbology::CODE93,
                    "CODE128" => symbology::CODE128,
                    _ => return None,
                };
                Some(id)
            }
        }
    }
}

/// `barcode` command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BarcodeCommand {
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// CODE128 when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BarcodeMode>,
    #[serde(deserialize_with = "null_as_default")]
    pub options: BarcodeOptions,
}

/// `qrcode` command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QrCommand {
    #[serde(deserialize_with = "lenient_string", skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub align: Alignment,
    #[serde(deserialize_with = "null_as_default")]
    pub options: QrOptions,
}

impl Default for QrCommand {
    fn default() -> Self {
        Self {
            value: None,
            align: Alignment::Center,
            options: QrOptions::default(),
        }
    }
}

/// Payload of a `raw` command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawData {
    /// `[27, 64, ...]`
    Bytes(Vec<u8>),
    /// A serialized Node `Buffer`: `{"type": "Buffer", "data": [...]}`
    Buffer { data: Vec<u8> },
    /// Sent as its UTF-8 bytes
    Text(String),
}

impl RawData {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RawData::Bytes(bytes) | RawData::Buffer { data: bytes } => bytes,
            RawData::Text(text) => text.as_bytes(),
        }
    }
}

/// `raw` command
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCommand {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<RawData>,
}

/// One print operation
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "text")]
    Text(TextCommand),
    #[serde(rename = "table")]
    Table(TableCommand),
    #[serde(rename = "image")]
    Image(ImageCommand),
    #[serde(rename = "barcode")]
    Barcode(BarcodeCommand),
    #[serde(rename = "qrcode")]
    QrCode(QrCommand),
    #[serde(rename = "separator")]
    Separator,
    #[serde(rename = "newLine")]
    NewLine,
    #[serde(rename = "cut")]
    Cut,
    #[serde(rename = "partialCut")]
    PartialCut,
    #[serde(rename = "beep")]
    Beep,
    #[serde(rename = "raw")]
    Raw(RawCommand),
    /// Unknown tag or malformed fields; skipped when printing
    #[serde(skip_deserializing)]
    Unrecognized {
        kind: String,
        reason: String,
        raw: Value,
    },
}

/// Borrowed mirror of the known variants for serialisation
#[derive(Serialize)]
#[serde(tag = "type")]
enum WireRef<'a> {
    #[serde(rename = "text")]
    Text(&'a TextCommand),
    #[serde(rename = "table")]
    Table(&'a TableCommand),
    #[serde(rename = "image")]
    Image(&'a ImageCommand),
    #[serde(rename = "barcode")]
    Barcode(&'a BarcodeCommand),
    #[serde(rename = "qrcode")]
    QrCode(&'a QrCommand),
    #[serde(rename = "separator")]
    Separator,
    #[serde(rename = "newLine")]
    NewLine,
    #[serde(rename = "cut")]
    Cut,
    #[serde(rename = "partialCut")]
    PartialCut,
    #[serde(rename = "beep")]
    Beep,
    #[serde(rename = "raw")]
    Raw(&'a RawCommand),
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            Command::Unrecognized { raw, .. } => return raw.serialize(serializer),
            Command::Text(cmd) => WireRef::Text(cmd),
            Command::Table(cmd) => WireRef::Table(cmd),
            Command::Image(cmd) => WireRef::Image(cmd),
            Command::Barcode(cmd) => WireRef::Barcode(cmd),
            Command::QrCode(cmd) => WireRef::QrCode(cmd),
            Command::Separator => WireRef::Separator,
            Command::NewLine => WireRef::NewLine,
            Command::Cut => WireRef::Cut,
            Command::PartialCut => WireRef::PartialCut,
            Command::Beep => WireRef::Beep,
            Command::Raw(cmd) => WireRef::Raw(cmd),
        };
        wire.serialize(serializer)
    }
}

impl Command {
    /// Decode one job entry; never fails
    pub fn from_value(value: Value) -> Self {
        let kind = match value.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => other.to_string(),
            None => "<missing>".to_string(),
        };

        if !KNOWN_TAGS.contains(&kind.as_str()) {
            return Command::Unrecognized {
                kind,
                reason: "unknown command type".to_string(),
                raw: value,
            };
        }

        match serde_json::from_value::<Command>(value.clone()) {
            Ok(command) => command,
            Err(e) => Command::Unrecognized {
                kind,
                reason: e.to_string(),
                raw: value,
            },
        }
    }

    /// Wire tag of this command
    pub fn kind(&self) -> &str {
        match self {
            Command::Text(_) => "text",
            Command::Table(_) => "table",
            Command::Image(_) => "image",
            Command::Barcode(_) => "barcode",
            Command::QrCode(_) => "qrcode",
            Command::Separator => "separator",
            Command::NewLine => "newLine",
            Command::Cut => "cut",
            Command::PartialCut => "partialCut",
            Command::Beep => "beep",
            Command::Raw(_) => "raw",
            Command::Unrecognized { kind, .. } => kind,
        }
    }
}

/// An ordered batch of commands
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Job {
    pub commands: Vec<Command>,
}

impl Job {
    /// Extract the command list from a request body
    ///
    /// Accepts a bare array or an object with a `commands` array.
    pub fn from_payload(payload: Value) -> Self {
        let entries = match payload {
            Value::Array(entries) => entries,
            Value::Object(mut map) => match map.remove("commands") {
                Some(Value::Array(entries)) => entries,
                Some(Value::Null) | None => Vec::new(),
                Some(other) => {
                    tracing::warn!(found = %json_kind(&other), "`commands` is not an array, printing nothing");
                    Vec::new()
                }
            },
            other => {
                tracing::warn!(found = %json_kind(&other), "Print payload is neither an array nor an object");
                Vec::new()
            }
        };

        Self {
            commands: entries.into_iter().map(Command::from_value).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_text() {
        let cmd = Command::from_value(json!({
            "type": "text", "value": "Total", "align": "CENTER", "bold": true, "extra": 1
        }));
        let Command::Text(text) = cmd else {
            panic!("expected text");
        };
        assert_eq!(text.value.as_deref(), Some("Total"));
        assert_eq!(text.align, Alignment::Center);
        assert!(text.bold);
        assert!(!text.underline);
    }

    #[test]
    fn test_numeric_value_is_accepted() {
        let cmd = Command::from_value(json!({"type": "text", "value": 12.5}));
        assert!(matches!(cmd, Command::Text(TextCommand { value: Some(v), .. }) if v == "12.5"));
    }

    #[test]
    fn test_unknown_and_missing_tags() {
        let bogus = Command::from_value(json!({"type": "bogus", "x": 1}));
        assert!(matches!(&bogus, Command::Unrecognized { kind, .. } if kind == "bogus"));

        let missing = Command::from_value(json!({"value": "A"}));
        assert_eq!(missing.kind(), "<missing>");
    }

    #[test]
    fn test_malformed_known_tag() {
        let cmd = Command::from_value(json!({"type": "table", "rows": "A|B"}));
        let Command::Unrecognized { kind, reason, .. } = cmd else {
            panic!("expected unrecognized");
        };
        assert_eq!(kind, "table");
        assert!(!reason.is_empty());
    }

    #[test]
    fn test_loose_flags_follow_truthiness() {
        let cmd = Command::from_value(json!({"type": "text", "value": "TOTAL", "bold": null, "underline": 0}));
        let Command::Text(text) = cmd else {
            panic!("expected text");
        };
        assert_eq!(text.value.as_deref(), Some("TOTAL"));
        assert!(!text.bold);
        assert!(!text.underline);

        let cmd = Command::from_value(json!({"type": "text", "value": "x", "bold": 1, "underline": "yes"}));
        let Command::Text(text) = cmd else {
            panic!("expected text");
        };
        assert!(text.bold);
        assert!(text.underline);
    }

    #[test]
    fn test_table_null_fields() {
        let cmd = Command::from_value(json!({
            "type": "table",
            "rows": [["Coffee", "2.50"]],
            "columns": null
        }));
        let Command::Table(table) = cmd else {
            panic!("expected table");
        };
        assert!(table.columns.is_empty());
        assert_eq!(table.printable_rows().count(), 1);

        let cmd = Command::from_value(json!({
            "type": "table",
            "rows": null,
            "columns": [null, {"align": "right", "bold": null}]
        }));
        let Command::Table(table) = cmd else {
            panic!("expected table");
        };
        assert!(table.rows.is_empty());
        assert_eq!(table.columns[0], ColumnSpec::default());
        assert_eq!(table.columns[1].align, Alignment::Right);
        assert!(!table.columns[1].bold);
    }

    #[test]
    fn test_null_options_use_defaults() {
        let cmd = Command::from_value(json!({"type": "qrcode", "value": "x", "options": null}));
        assert!(matches!(cmd, Command::QrCode(_)));
        let cmd = Command::from_value(json!({"type": "barcode", "value": "123", "options": null}));
        assert!(matches!(cmd, Command::Barcode(_)));
    }

    #[test]
    fn test_unrecognized_serializes_original_json() {
        let raw = json!({"type": "hologram", "depth": 3});
        let cmd = Command::from_value(raw.clone());
        assert_eq!(serde_json::to_value(&cmd).unwrap(), raw);
    }

    #[test]
    fn test_serialize_wire_shape() {
        let cmd = Command::from_value(json!({"type": "text", "value": "Hi", "align": "Right"}));
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"type": "text", "value": "Hi", "align": "right", "bold": false, "underline": false})
        );
        assert_eq!(
            serde_json::to_value(Command::PartialCut).unwrap(),
            json!({"type": "partialCut"})
        );
    }

    #[test]
    fn test_table_columns_zip() {
        let cmd = Command::from_value(json!({
            "type": "table",
            "columns": [{"width": 0.2}, {"width": 0.4, "align": "RIGHT"}, {"width": 0.4, "align": "RIGHT"}],
            "rows": [["2", "10.00", 20], ["x", {"text": "y", "bold": true}]]
        }));
        let Command::Table(table) = cmd else {
            panic!("expected table");
        };
        let rows: Vec<_> = table.printable_rows().collect();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0][0].align, Align::Left);
        assert_eq!(rows[0][0].width, Some(0.2));
        assert_eq!(rows[0][1].align, Align::Right);
        assert_eq!(rows[0][2].text, "20");

        assert!(rows[1][1].bold);
        assert_eq!(rows[1][1].align, Align::Right);
    }

    #[test]
    fn test_missing_column_gets_equal_share() {
        let cmd = Command::from_value(json!({"type": "table", "rows": [["a", "b", "c", "d"]]}));
        let Command::Table(table) = cmd else {
            panic!("expected table");
        };
        let row = table.printable_rows().next().unwrap();
        assert!(row.iter().all(|c| c.width == Some(0.25) && !c.bold));
    }

    #[test]
    fn test_qrcode_defaults_to_center() {
        let cmd = Command::from_value(json!({"type": "qrcode", "value": "https://example.com"}));
        assert!(matches!(cmd, Command::QrCode(QrCommand { align: Alignment::Center, .. })));
    }

    #[test]
    fn test_barcode_modes() {
        assert_eq!(BarcodeMode::Name("code128".into()).symbology(), Some(73));
        assert_eq!(BarcodeMode::Name("EAN-13".into()).symbology(), Some(67));
        assert_eq!(BarcodeMode::Id(69).symbology(), Some(69));
        assert_eq!(BarcodeMode::Id(4).symbology(), None);
        assert_eq!(BarcodeMode::Name("PDF417".into()).symbology(), None);
    }

    #[test]
    fn test_raw_data_shapes() {
        let bytes: RawData = serde_json::from_value(json!([27, 64])).unwrap();
        assert_eq!(bytes.as_bytes(), &[27, 64]);

        let buffer: RawData = serde_json::from_value(json!({"type": "Buffer", "data": [10]})).unwrap();
        assert_eq!(buffer.as_bytes(), &[10]);

        let text: RawData = serde_json::from_value(json!("OK")).unwrap();
        assert_eq!(text.as_bytes(), b"OK");
    }

    #[test]
    fn test_job_payload_shapes() {
        let bare = Job::from_payload(json!([{"type": "cut"}]));
        assert_eq!(bare.len(), 1);

        let wrapped = Job::from_payload(json!({"commands": [{"type": "beep"}, {"type": "cut"}]}));
        assert_eq!(wrapped.len(), 2);

        assert!(Job::from_payload(json!({"printer": "x"})).is_empty());
        assert!(Job::from_payload(json!("cut")).is_empty());
    }
}
