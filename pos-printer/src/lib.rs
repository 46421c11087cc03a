//! # pos-printer
//!
//! Thermal receipt printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS and Star line-mode command building
//! - Code page encoding (CP437/850/852/858/866, Windows-125x, GBK)
//! - Table layout and 1-bit raster images
//! - Network printing (TCP port 9100), device paths, Windows spooler queues
//!
//! WHAT to print (the job model and its queue) lives in `pos-agent`.
//!
//! ## Example
//!
//! ```ignore
//! use pos_printer::{PrinterDriver, PrinterSettings, ThermalPrinter};
//!
//! let settings = PrinterSettings {
//!     interface: "tcp://192.168.1.100".into(),
//!     ..Default::default()
//! };
//! let mut printer = ThermalPrinter::new(&settings)?;
//! printer.align_center();
//! printer.bold(true);
//! printer.println("Thank you!");
//! printer.bold(false);
//! printer.cut();
//! printer.execute().await?;
//! ```

mod codepage;
mod driver;
mod encoding;
mod error;
mod escpos;
mod printer;
mod raster;
mod table;

// Re-exports
pub use driver::{PrinterDriver, PrinterSettings, ThermalPrinter};
pub use encoding::CharacterSet;
pub use error::{PrintError, PrintResult};
pub use escpos::{Align, BarcodeOptions, EscPosBuilder, PrinterType, QrOptions, symbology};
pub use printer::{DevicePrinter, Interface, NetworkPrinter, Printer};
pub use raster::RasterImage;
pub use table::{Segment, TableCell};

#[cfg(windows)]
pub use printer::WindowsPrinter;
