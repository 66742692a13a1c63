use crate::config::SerialConfig;
use std::fmt;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info};

/// GRBL's default line speed
pub const BAUD_RATE: u32 = 115_200;

/// Quiet period that ends a response drain
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Duplex byte channel to the controller
///
/// Anything readable and writable qualifies; the serial port is the production case.
pub trait Transport: Read + Write + Send {}

impl<T: Read + Write + Send> Transport for T {}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to open serial port {path}: {source}")]
    OpenError {
        path: String,
        source: serialport::Error,
    },

    #[error("Transport is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared, closable handle to a [`Transport`]
///
/// Clones refer to the same connection. The lock is held for a single read or write.
/// [`SerialLink::close`] raises the `closing` flag before it asks for the lock, and reads
/// and writes check that flag first, so a close waits for at most the one read already
/// running and the exchange it interrupts ends with [`TransportError::Closed`].
#[derive(Clone)]
pub struct SerialLink {
    name: Arc<str>,
    inner: Arc<Mutex<Option<Box<dyn Transport>>>>,
    closing: Arc<AtomicBool>,
}

impl SerialLink {
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        info!(
            "Opening serial port {} at {} baud (read timeout {:?})",
            config.path, BAUD_RATE, READ_TIMEOUT
        );

        let port = serialport::new(config.path.as_str(), BAUD_RATE)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| {
                error!("Failed to open serial port {}: {}", config.path, source);
                TransportError::OpenError {
                    path: config.path.clone(),
                    source,
                }
            })?;

        info!("Serial port {} open", config.path);
        Ok(Self::from_transport(config.path.as_str(), port))
    }

    pub fn from_transport(name: &str, transport: impl Transport + 'static) -> Self {
        Self {
            name: Arc::from(name),
            inner: Arc::new(Mutex::new(Some(Box::new(transport)))),
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn write_all(&self, bytes: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut guard = self.lock();
        let transport = guard.as_mut().ok_or(TransportError::Closed)?;
        transport.write_all(bytes)?;
        transport.flush()?;
        Ok(())
    }

    pub fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        self.ensure_open()?;
        let mut guard = self.lock();
        let transport = guard.as_mut().ok_or(TransportError::Closed)?;
        Ok(transport.read(buf)?)
    }

    /// Drops the underlying transport; returns `false` if it was already closed
    ///
    /// Blocks until a read in progress on another thread returns, so call it from a
    /// blocking context.
    pub fn close(&self) -> bool {
        self.closing.store(true, Ordering::Release);
        match self.lock().take() {
            Some(transport) => {
                drop(transport);
                info!("Closed connection to {}", self.name);
                true
            }
            None => {
                debug!("Connection to {} already closed", self.name);
                false
            }
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closing.load(Ordering::Acquire) && self.lock().is_some()
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closing.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    // A panic mid-read leaves the handle itself intact
    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Transport>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialLink")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}
