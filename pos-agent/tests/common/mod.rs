//! Shared test helpers: a recording printer driver and agent configs

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use pos_agent::AgentConfig;
use pos_agent::printing::DriverFactory;
use pos_printer::{BarcodeOptions, PrintError, PrintResult, PrinterDriver, PrinterSettings, QrOptions, TableCell};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Byte every mock buffer starts with, standing in for `ESC @`
pub const INIT: u8 = b'@';

/// Shared view into every driver a factory built
#[derive(Clone, Default)]
pub struct Probe {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub sent: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Base64 of every image file handed to `print_image`
    pub images: Arc<Mutex<Vec<String>>>,
    pub builds: Arc<AtomicUsize>,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    /// The next `execute` fails once
    pub fail_next: Arc<AtomicBool>,
    /// `execute` hangs until the test gives up
    pub stall: Arc<AtomicBool>,
    /// Driver construction fails with a configuration error
    pub reject_config: Arc<AtomicBool>,
}

impl Probe {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }

    pub fn images(&self) -> Vec<String> {
        self.images.lock().clone()
    }

    pub fn factory(&self) -> DriverFactory {
        let probe = self.clone();
        Arc::new(move |settings: &PrinterSettings| {
            probe.builds.fetch_add(1, Ordering::SeqCst);
            if probe.reject_config.load(Ordering::SeqCst) {
                return Err(PrintError::InvalidConfig("Unsupported interface: lpt9".into()));
            }
            Ok(Box::new(MockDriver::new(probe.clone(), settings.width)) as Box<dyn PrinterDriver>)
        })
    }
}

/// Driver that renders calls as readable bytes and records them
pub struct MockDriver {
    probe: Probe,
    buffer: Vec<u8>,
    width: usize,
}

impl MockDriver {
    pub fn new(probe: Probe, width: usize) -> Self {
        Self {
            probe,
            buffer: vec![INIT],
            width,
        }
    }

    fn record(&mut self, call: impl Into<String>) {
        let call = call.into();
        self.buffer.extend_from_slice(call.as_bytes());
        self.buffer.push(b'\n');
        self.probe.calls.lock().push(call);
    }
}

#[async_trait]
impl PrinterDriver for MockDriver {
    fn clear(&mut self) {
        self.buffer = vec![INIT];
        self.probe.calls.lock().push("clear".into());
    }

    fn bold(&mut self, on: bool) {
        self.record(format!("bold:{on}"));
    }

    fn underline(&mut self, on: bool) {
        self.record(format!("underline:{on}"));
    }

    fn align_left(&mut self) {
        self.record("align:left");
    }

    fn align_center(&mut self) {
        self.record("align:center");
    }

    fn align_right(&mut self) {
        self.record("align:right");
    }

    fn println(&mut self, text: &str) {
        self.record(format!("println:{text}"));
    }

    fn new_line(&mut self) {
        self.record("newline");
    }

    fn table_custom(&mut self, cells: &[TableCell]) {
        let texts: Vec<&str> = cells.iter().map(|c| c.text.as_str()).collect();
        self.record(format!("table:{}", texts.join("|")));
    }

    async fn print_image(&mut self, path: &Path) -> PrintResult<()> {
        use base64::Engine;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PrintError::Image(format!("{}: {}", path.display(), e)))?;
        self.probe
            .images
            .lock()
            .push(base64::engine::general_purpose::STANDARD.encode(bytes));
        self.record("image");
        Ok(())
    }

    fn barcode(&mut self, value: &str, symbology: u8, _options: &BarcodeOptions) -> PrintResult<()> {
        if value.is_empty() {
            return Err(PrintError::InvalidData("empty barcode".into()));
        }
        self.record(format!("barcode:{symbology}:{value}"));
        Ok(())
    }

    fn print_qr(&mut self, value: &str, _options: &QrOptions) -> PrintResult<()> {
        self.record(format!("qr:{value}"));
        Ok(())
    }

    fn raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        self.probe.calls.lock().push(format!("raw:{}", bytes.len()));
    }

    fn cut(&mut self) {
        self.record("cut");
    }

    fn partial_cut(&mut self) {
        self.record("partial_cut");
    }

    fn beep(&mut self) {
        self.record("beep");
    }

    fn open_cash_drawer(&mut self) {
        self.record("drawer");
    }

    async fn execute(&mut self) -> PrintResult<()> {
        let now = self.probe.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.probe.calls.lock().push("execute".into());

        let wait = if self.probe.stall.load(Ordering::SeqCst) {
            Duration::from_secs(30)
        } else {
            Duration::from_millis(20)
        };
        tokio::time::sleep(wait).await;
        self.probe.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.probe.fail_next.swap(false, Ordering::SeqCst) {
            return Err(PrintError::Connection("192.168.1.50:9100: connection refused".into()));
        }
        self.probe.sent.lock().push(self.buffer.clone());
        Ok(())
    }

    fn get_buffer(&self) -> Vec<u8> {
        self.buffer.clone()
    }

    fn width(&self) -> usize {
        self.width
    }
}

/// Production-mode config with a network printer
pub fn hardware_config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.test_mode = false;
    config.printer.interface = "tcp://192.168.1.50:9100".into();
    config.printer.width = 32;
    config
}

/// Test-mode config
pub fn simulate_config() -> AgentConfig {
    AgentConfig {
        test_mode: true,
        ..hardware_config()
    }
}

pub fn simulate_path(work_dir: &Path, config: &AgentConfig) -> PathBuf {
    work_dir.join(&config.simulate_output)
}

/// Small black PNG, base64 without a data URI header
pub fn tiny_png_base64() -> String {
    use base64::Engine;
    let mut png = Vec::new();
    image::RgbaImage::from_pixel(4, 2, image::Rgba([0, 0, 0, 255]))
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode png");
    base64::engine::general_purpose::STANDARD.encode(png)
}
