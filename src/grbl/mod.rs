//! # GRBL Serial Protocol
//!
//! Everything that talks to the motion controller:
//!
//! ```text
//! grbl/
//! ├── command.rs    - Fixed G-code vocabulary
//! ├── protocol.rs   - Request/response client, one request in flight
//! └── transport.rs  - Shared, closable serial connection
//! ```
//!
//! GRBL answers each line with free-form text (`ok`, `error:N`, status reports) and has
//! no end-of-reply marker. Replies are therefore delimited by the serial read timeout
//! and only logged; nothing downstream branches on their content.

pub mod command;
pub mod protocol;
pub mod transport;

pub use command::{Command, STATUS_PROBE};
pub use protocol::{ProtocolClient, ProtocolError, Response};
pub use transport::{SerialLink, Transport, TransportError};
