use crate::grbl::transport::{SerialLink, TransportError};
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Size of each chunk read while draining a response
pub const RESPONSE_BUFFER_SIZE: usize = 128;

/// Raw controller reply to one request; never parsed, only logged
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response(String);

impl Response {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.trim_end())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("A request is already in flight")]
    Busy,

    #[error("Failed to write request: {0}")]
    WriteError(#[source] TransportError),
}

/// Line-oriented request/response client for the GRBL controller
///
/// GRBL has no end-of-reply marker, so a reply is everything read until the port's
/// read timeout passes without data. At most one request may be outstanding; a second
/// concurrent [`send`](Self::send) fails with [`ProtocolError::Busy`].
#[derive(Debug, Clone)]
pub struct ProtocolClient {
    link: SerialLink,
    busy: Arc<AtomicBool>,
}

// Clears the busy flag when the exchange ends, including on early return
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ProtocolError> {
        if flag.swap(true, Ordering::AcqRel) {
            return Err(ProtocolError::Busy);
        }
        Ok(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ProtocolClient {
    pub fn new(link: SerialLink) -> Self {
        Self {
            link,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    #[cfg(test)]
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Writes `request` and collects the reply
    ///
    /// A failed write is returned as is and never retried. Read failures while draining
    /// only end the reply.
    pub fn send(&self, request: &str) -> Result<Response, ProtocolError> {
        let _in_flight = InFlight::acquire(&self.busy)?;

        info!("Sending: {}", request.trim_end());
        if let Err(e) = self.link.write_all(request.as_bytes()) {
            warn!("Failed to write {:?} to {}: {}", request, self.link.name(), e);
            return Err(ProtocolError::WriteError(e));
        }

        Ok(self.drain())
    }

    fn drain(&self) -> Response {
        let mut buf = [0u8; RESPONSE_BUFFER_SIZE];
        let mut reply = Vec::new();

        loop {
            match self.link.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    debug!("Read {} bytes", n);
                    reply.extend_from_slice(&buf[..n]);
                }
                Err(e) => {
                    debug!("Response complete: {}", e);
                    break;
                }
            }
        }

        Response(String::from_utf8_lossy(&reply).into_owned())
    }
}
