//! The printer driver capability
//!
//! `PrinterDriver` is what print jobs are rendered against: a buffer of
//! styled output plus a way to send it. `ThermalPrinter` is the real
//! implementation; tests substitute their own.

use crate::encoding::CharacterSet;
use crate::error::PrintResult;
use crate::escpos::{Align, BarcodeOptions, EscPosBuilder, PrinterType, QrOptions};
use crate::printer::{Interface, Printer};
use crate::raster::RasterImage;
use crate::table::TableCell;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

/// Dots per character column in font A
const DOTS_PER_CHAR: u32 = 12;

/// Stateful printer handle
///
/// Output accumulates in an internal buffer until `execute` sends it.
#[async_trait]
pub trait PrinterDriver: Send {
    /// Empty the buffer, leaving only the printer initialisation
    fn clear(&mut self);

    fn bold(&mut self, on: bool);
    fn underline(&mut self, on: bool);
    fn align_left(&mut self);
    fn align_center(&mut self);
    fn align_right(&mut self);

    /// Print a line of text
    fn println(&mut self, text: &str);
    fn new_line(&mut self);

    /// Print one table row
    fn table_custom(&mut self, cells: &[TableCell]);

    /// Print an image file as a raster
    async fn print_image(&mut self, path: &Path) -> PrintResult<()>;

    /// Print a 1D barcode; `symbology` is an ESC/POS `GS k` id (65-73)
    fn barcode(&mut self, value: &str, symbology: u8, options: &BarcodeOptions)
    -> PrintResult<()>;

    fn print_qr(&mut self, value: &str, options: &QrOptions) -> PrintResult<()>;

    /// Append bytes as-is
    fn raw(&mut self, bytes: &[u8]);

    fn cut(&mut self);
    fn partial_cut(&mut self);
    fn beep(&mut self);
    fn open_cash_drawer(&mut self);

    /// Send the buffer to the printer
    async fn execute(&mut self) -> PrintResult<()>;

    /// Copy of the buffer
    fn get_buffer(&self) -> Vec<u8>;

    /// Line width in characters
    fn width(&self) -> usize;
}

/// Settings for a `ThermalPrinter`
#[derive(Debug, Clone)]
pub struct PrinterSettings {
    pub printer_type: PrinterType,
    pub interface: String,
    pub width: usize,
    pub character_set: CharacterSet,
    pub timeout: Duration,
}

impl Default for PrinterSettings {
    fn default() -> Self {
        Self {
            printer_type: PrinterType::Epson,
            interface: String::new(),
            width: 48,
            character_set: CharacterSet::default(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// ESC/POS or Star printer behind a transport
pub struct ThermalPrinter {
    builder: EscPosBuilder,
    interface: Interface,
}

impl ThermalPrinter {
    /// Build a printer; fails if the interface string is unusable
    pub fn new(settings: &PrinterSettings) -> PrintResult<Self> {
        let interface = Interface::parse(&settings.interface, settings.timeout)?;
        let builder = EscPosBuilder::new(
            settings.printer_type,
            settings.character_set,
            settings.width,
        );
        Ok(Self { builder, interface })
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    fn max_image_dots(&self) -> u32 {
        self.builder.width() as u32 * DOTS_PER_CHAR
    }
}

#[async_trait]
impl PrinterDriver for ThermalPrinter {
    fn clear(&mut self) {
        self.builder.clear();
    }

    fn bold(&mut self, on: bool) {
        self.builder.bold(on);
    }

    fn underline(&mut self, on: bool) {
        self.builder.underline(on);
    }

    fn align_left(&mut self) {
        self.builder.align(Align::Left);
    }

    fn align_center(&mut self) {
        self.builder.align(Align::Center);
    }

    fn align_right(&mut self) {
        self.builder.align(Align::Right);
    }

    fn println(&mut self, text: &str) {
        self.builder.line(text);
    }

    fn new_line(&mut self) {
        self.builder.newline();
    }

    fn table_custom(&mut self, cells: &[TableCell]) {
        self.builder.table_row(cells);
    }

    #[instrument(skip(self))]
    async fn print_image(&mut self, path: &Path) -> PrintResult<()> {
        let raster = RasterImage::load(path, self.max_image_dots()).await?;
        debug!(width = raster.width(), height = raster.height(), "raster image");
        self.builder.raster(&raster);
        Ok(())
    }

    fn barcode(
        &mut self,
        value: &str,
        symbology: u8,
        options: &BarcodeOptions,
    ) -> PrintResult<()> {
        self.builder.barcode(value, symbology, options)?;
        Ok(())
    }

    fn print_qr(&mut self, value: &str, options: &QrOptions) -> PrintResult<()> {
        self.builder.qr_code(value, options)?;
        Ok(())
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.builder.raw(bytes);
    }

    fn cut(&mut self) {
        self.builder.cut();
    }

    fn partial_cut(&mut self) {
        self.builder.cut_partial();
    }

    fn beep(&mut self) {
        self.builder.beep();
    }

    fn open_cash_drawer(&mut self) {
        self.builder.open_drawer();
    }

    async fn execute(&mut self) -> PrintResult<()> {
        self.interface.print(self.builder.as_bytes()).await
    }

    fn get_buffer(&self) -> Vec<u8> {
        self.builder.as_bytes().to_vec()
    }

    fn width(&self) -> usize {
        self.builder.width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PrintError;

    fn settings(interface: &str) -> PrinterSettings {
        PrinterSettings {
            interface: interface.to_string(),
            width: 32,
            character_set: CharacterSet::Pc852Latin2,
            ..Default::default()
        }
    }

    #[test]
    fn test_construction_validates_interface() {
        assert!(ThermalPrinter::new(&settings("tcp://127.0.0.1:9100")).is_ok());
        assert!(matches!(
            ThermalPrinter::new(&settings("")),
            Err(PrintError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_buffer_lifecycle() {
        let mut printer = ThermalPrinter::new(&settings("tcp://0.0.0.0")).unwrap();
        let fresh = printer.get_buffer();

        printer.align_center();
        printer.println("Zażółć");
        printer.cut();
        let buf = printer.get_buffer();
        assert!(buf.len() > fresh.len());
        assert!(buf.starts_with(&fresh));

        printer.clear();
        assert_eq!(printer.get_buffer(), fresh);
    }

    #[tokio::test]
    async fn test_execute_to_device() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        let mut printer = ThermalPrinter::new(&settings(&path)).unwrap();
        printer.println("ok");

        printer.execute().await.unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), printer.get_buffer());
    }

    #[tokio::test]
    async fn test_print_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        image::RgbaImage::from_pixel(16, 4, image::Rgba([0, 0, 0, 255]))
            .save(&path)
            .unwrap();

        let mut printer = ThermalPrinter::new(&settings("tcp://0.0.0.0")).unwrap();
        printer.print_image(&path).await.unwrap();
        let buf = printer.get_buffer();
        let header = [0x1D, 0x76, 0x30, 0x00, 2, 0, 4, 0];
        assert!(buf.windows(header.len()).any(|w| w == header));

        assert!(printer.print_image(&dir.path().join("missing.png")).await.is_err());
    }
}
