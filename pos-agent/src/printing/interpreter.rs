//! Command interpreter
//!
//! Turns one [`Command`] into driver calls. A command that cannot be printed
//! is logged and skipped; it never aborts the job.

use super::command::{
    Alignment, BarcodeCommand, Command, ImageCommand, QrCommand, RawCommand, TableCommand,
    TextCommand,
};
use super::imaging::ImagePreprocessor;
use pos_printer::{PrinterDriver, symbology};
use tracing::{debug, warn};

/// Rule character for `separator`
const SEPARATOR_CHAR: &str = "-";

/// Width used by `separator` when the driver reports none
const FALLBACK_WIDTH: usize = 32;

fn set_alignment(driver: &mut dyn PrinterDriver, align: Alignment) {
    match align {
        Alignment::Left => driver.align_left(),
        Alignment::Center => driver.align_center(),
        Alignment::Right => driver.align_right(),
    }
}

/// Applies commands to a printer driver
#[derive(Debug, Clone)]
pub struct CommandInterpreter {
    images: ImagePreprocessor,
}

impl CommandInterpreter {
    pub fn new(images: ImagePreprocessor) -> Self {
        Self { images }
    }

    /// Apply one command
    ///
    /// `image` commands get their `data` replaced by the processed raster so
    /// the caller can keep what was actually printed.
    pub async fn apply(&self, driver: &mut dyn PrinterDriver, command: &mut Command) {
        match command {
            Command::Text(text) => Self::text(driver, text),
            Command::Table(table) => Self::table(driver, table),
            Command::Image(image) => self.image(driver, image).await,
            Command::Barcode(barcode) => Self::barcode(driver, barcode),
            Command::QrCode(qr) => Self::qrcode(driver, qr),
            Command::Separator => {
                let width = match driver.width() {
                    0 => FALLBACK_WIDTH,
                    w => w,
                };
                driver.println(&SEPARATOR_CHAR.repeat(width));
            }
            Command::NewLine => driver.new_line(),
            Command::Cut => driver.cut(),
            Command::PartialCut => driver.partial_cut(),
            Command::Beep => driver.beep(),
            Command::Raw(raw) => Self::raw(driver, raw),
            Command::Unrecognized { kind, reason, .. } => {
                warn!(kind = %kind, reason = %reason, "Unknown command type, skipping");
            }
        }
    }

    fn text(driver: &mut dyn PrinterDriver, text: &TextCommand) {
        set_alignment(driver, text.align);
        driver.bold(text.bold);
        driver.underline(text.underline);

        match text.value.as_deref() {
            Some(value) if !value.is_empty() => driver.println(value),
            _ => driver.new_line(),
        }

        driver.bold(false);
        driver.underline(false);
        driver.align_left();
    }

    fn table(driver: &mut dyn PrinterDriver, table: &TableCommand) {
        for row in table.printable_rows() {
            if !row.is_empty() {
                driver.table_custom(&row);
            }
        }
    }

    async fn image(&self, driver: &mut dyn PrinterDriver, image: &mut ImageCommand) {
        let Some(data) = image.data.as_deref().filter(|d| !d.is_empty()) else {
            debug!("image command without data");
            return;
        };

        let processed = match self.images.process(data).await {
            Ok(processed) => processed,
            Err(e) => {
                warn!(error = %e, "Logo processing failed, skipping image");
                return;
            }
        };
        image.data = Some(processed.data_uri.clone());

        set_alignment(driver, image.align);
        if let Err(e) = driver.print_image(processed.path()).await {
            warn!(error = %e, "Failed to print image");
        }
        driver.align_left();
        // `processed` drops here and removes the temp file
    }

    fn barcode(driver: &mut dyn PrinterDriver, barcode: &BarcodeCommand) {
        let Some(value) = barcode.value.as_deref().filter(|v| !v.is_empty()) else {
            return;
        };
        let id = match &barcode.mode {
            None => symbology::CODE128,
            Some(mode) => match mode.symbology() {
                Some(id) => id,
                None => {
                    warn!(mode = ?mode, "Unsupported barcode mode, skipping");
                    return;
                }
            },
        };
        if let Err(e) = driver.barcode(value, id, &barcode.options) {
            warn!(error = %e, value, "Barcode rejected");
        }
    }

    fn qrcode(driver: &mut dyn PrinterDriver, qr: &QrCommand) {
        let Some(value) = qr.value.as_deref().filter(|v| !v.is_empty()) else {
            return;
        };
        set_alignment(driver, qr.align);
        if let Err(e) = driver.print_qr(value, &qr.options) {
            warn!(error = %e, "QR code rejected");
        }
        driver.align_left();
    }

    fn raw(driver: &mut dyn PrinterDriver, raw: &RawCommand) {
        if let Some(data) = &raw.data {
            driver.raw(data.as_bytes());
        }
    }
}
