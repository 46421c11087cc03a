//! Printer transports for sending raw print data
//!
//! Supports:
//! - Network printers (`tcp://host[:port]`, raw TCP port 9100)
//! - Device paths (`/dev/usb/lp0`, `\\host\share`, `COM1`)
//! - Windows driver printers (`printer:NAME`, via Win32 API)

use crate::error::{PrintError, PrintResult};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument};

/// Default raw printing port
pub const DEFAULT_PORT: u16 = 9100;

/// Trait for printer adapters
#[allow(async_fn_in_trait)]
pub trait Printer {
    /// Send raw data to the printer
    async fn print(&self, data: &[u8]) -> PrintResult<()>;
}

/// Network printer (TCP port 9100)
///
/// Most thermal printers support raw TCP printing on port 9100.
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: String,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        if host.is_empty() {
            return Err(PrintError::InvalidConfig("Missing printer host".into()));
        }
        Ok(Self {
            addr: format!("{}:{}", host, port),
            timeout: Duration::from_secs(5),
        })
    }

    /// Create from a `host[:port]` string; the port defaults to 9100
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        match addr.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse()
                    .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;
                Self::new(host, port)
            }
            None => Self::new(addr, DEFAULT_PORT),
        }
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Printer for NetworkPrinter {
    #[instrument(skip(data), fields(addr = %self.addr, data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        info!("Connecting to printer");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;

        info!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", self.addr)))?
        .map_err(|e| {
            PrintError::Io(std::io::Error::new(
                e.kind(),
                format!("Write failed: {}", e),
            ))
        })?;

        info!("Print job sent successfully");
        Ok(())
    }
}

/// Printer reachable through a file path (USB line printer, serial port, share)
#[derive(Debug, Clone)]
pub struct DevicePrinter {
    path: PathBuf,
}

impl DevicePrinter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Printer for DevicePrinter {
    #[instrument(skip(data), fields(path = %self.path.display(), data_len = data.len()))]
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    PrintError::Offline(format!("{}: {}", self.path.display(), e))
                }
                _ => PrintError::Io(e),
            })?;

        file.write_all(data).await?;
        file.flush().await?;

        info!("Print job written to device");
        Ok(())
    }
}

/// Windows driver printer
///
/// Uses Win32 API to print through installed printer drivers.
#[cfg(windows)]
#[derive(Debug, Clone)]
pub struct WindowsPrinter {
    name: String,
}

#[cfg(windows)]
impl WindowsPrinter {
    /// Create a printer with a specific name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    /// Get the printer name
    pub fn name(&self) -> &str {
        &self.name
    }

    fn write_raw(&self, data: &[u8]) -> PrintResult<()> {
        use core::ffi::c_void;
        use windows::Win32::Graphics::Printing::{
            ClosePrinter, DOC_INFO_1W, EndDocPrinter, EndPagePrinter, OpenPrinterW, PRINTER_HANDLE,
            StartDocPrinterW, StartPagePrinter, WritePrinter,
        };
        use windows::core::{PCWSTR, PWSTR};

        fn to_wide(s: &str) -> Vec<u16> {
            s.encode_utf16().chain(std::iter::once(0)).collect()
        }

        unsafe {
            let mut handle: PRINTER_HANDLE = PRINTER_HANDLE::default();
            let name_w = to_wide(&self.name);

            OpenPrinterW(PCWSTR::from_raw(name_w.as_ptr()), &mut handle, None)
                .map_err(|_| PrintError::Offline(format!("OpenPrinterW failed: {}", self.name)))?;

            let doc_name_w = to_wide("POS Receipt");
            let datatype_w = to_wide("RAW");
            let doc_info = DOC_INFO_1W {
                pDocName: PWSTR(doc_name_w.as_ptr() as *mut _),
                pOutputFile: PWSTR::null(),
                pDatatype: PWSTR(datatype_w.as_ptr() as *mut _),
            };

            if StartDocPrinterW(handle, 1, &doc_info as *const DOC_INFO_1W) == 0 {
                let _ = ClosePrinter(handle);
                return Err(PrintError::WindowsPrinter(
                    "StartDocPrinter failed".to_string(),
                ));
            }

            if !StartPagePrinter(handle).as_bool() {
                let _ = EndDocPrinter(handle);
                let _ = ClosePrinter(handle);
                return Err(PrintError::WindowsPrinter(
                    "StartPagePrinter failed".to_string(),
                ));
            }

            let mut written: u32 = 0;
            let ok = WritePrinter(
                handle,
                data.as_ptr() as *const c_void,
                data.len() as u32,
                &mut written,
            );

            let _ = EndPagePrinter(handle);
            let _ = EndDocPrinter(handle);
            let _ = ClosePrinter(handle);

            if !ok.as_bool() {
                return Err(PrintError::WindowsPrinter(
                    "WritePrinter failed".to_string(),
                ));
            }

            if written != data.len() as u32 {
                return Err(PrintError::WindowsPrinter("Incomplete write".to_string()));
            }

            Ok(())
        }
    }
}

#[cfg(windows)]
impl Printer for WindowsPrinter {
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        // Windows printing is synchronous, run in blocking task
        let printer = self.clone();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || printer.write_raw(&data))
            .await
            .map_err(|e| PrintError::WindowsPrinter(format!("Task join failed: {}", e)))?
    }
}

/// A parsed printer interface string
#[derive(Debug, Clone)]
pub enum Interface {
    Network(NetworkPrinter),
    Device(DevicePrinter),
    #[cfg(windows)]
    Windows(WindowsPrinter),
}

impl Interface {
    /// Parse an interface string
    ///
    /// - `tcp://host[:port]` - raw TCP
    /// - `printer:NAME` - Windows spooler queue
    /// - anything else - a device or share path
    pub fn parse(interface: &str, timeout: Duration) -> PrintResult<Self> {
        let interface = interface.trim();
        if interface.is_empty() {
            return Err(PrintError::InvalidConfig("Empty printer interface".into()));
        }

        if let Some(addr) = interface.strip_prefix("tcp://") {
            let addr = addr.trim_end_matches('/');
            let printer = NetworkPrinter::from_addr(addr)?.with_timeout(timeout);
            return Ok(Interface::Network(printer));
        }

        if let Some(name) = interface.strip_prefix("printer:") {
            if name.is_empty() {
                return Err(PrintError::InvalidConfig("Missing printer name".into()));
            }
            #[cfg(windows)]
            {
                return Ok(Interface::Windows(WindowsPrinter::new(name)));
            }
            #[cfg(not(windows))]
            {
                return Err(PrintError::InvalidConfig(format!(
                    "Printer queue '{}' requires Windows; use tcp:// or a device path",
                    name
                )));
            }
        }

        Ok(Interface::Device(DevicePrinter::new(interface)))
    }
}

impl Printer for Interface {
    async fn print(&self, data: &[u8]) -> PrintResult<()> {
        match self {
            Interface::Network(p) => p.print(data).await,
            Interface::Device(p) => p.print(data).await,
            #[cfg(windows)]
            Interface::Windows(p) => p.print(data).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_printer_new() {
        let printer = NetworkPrinter::new("192.168.1.100", 9100).unwrap();
        assert_eq!(printer.addr(), "192.168.1.100:9100");
    }

    #[test]
    fn test_network_printer_from_addr() {
        let printer = NetworkPrinter::from_addr("printer.local").unwrap();
        assert_eq!(printer.addr(), "printer.local:9100");
    }

    #[test]
    fn test_invalid_addr() {
        assert!(NetworkPrinter::from_addr("10.0.0.1:abc").is_err());
        assert!(NetworkPrinter::from_addr(":9100").is_err());
    }

    #[test]
    fn test_parse_interface() {
        let timeout = Duration::from_secs(5);
        assert!(matches!(
            Interface::parse("tcp://192.168.1.50", timeout),
            Ok(Interface::Network(p)) if p.addr() == "192.168.1.50:9100"
        ));
        assert!(matches!(
            Interface::parse("/dev/usb/lp0", timeout),
            Ok(Interface::Device(_))
        ));
        assert!(matches!(
            Interface::parse("  ", timeout),
            Err(PrintError::InvalidConfig(_))
        ));
        assert!(matches!(
            Interface::parse("tcp://host:notaport", timeout),
            Err(PrintError::InvalidConfig(_))
        ));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_printer_queue_needs_windows() {
        let err = Interface::parse("printer:POS-58", Duration::from_secs(1)).unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_device_printer_writes() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let printer = DevicePrinter::new(file.path());
        printer.print(b"\x1b@hello").await.unwrap();
        assert_eq!(std::fs::read(file.path()).unwrap(), b"\x1b@hello");
    }

    #[tokio::test]
    async fn test_device_printer_missing() {
        let printer = DevicePrinter::new("/nonexistent/lp0");
        let err = printer.print(b"x").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_network_printer_sends() {
        use tokio::io::AsyncReadExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let printer = NetworkPrinter::new("127.0.0.1", addr.port()).unwrap();
        printer.print(b"receipt").await.unwrap();
        drop(printer);

        assert_eq!(server.await.unwrap(), b"receipt");
    }
}
