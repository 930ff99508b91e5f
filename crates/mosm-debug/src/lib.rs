//! Debug tools for mosm - TCP debug server for remote inspection and control
//!
//! Start the debug server in your app:
//! ```ignore
//! let handler = Arc::new(Mutex::new(MyHandler::new()));
//! let _server = DebugServer::start(handler, mosm_debug::DEFAULT_PORT);
//! ```
//!
//! Commands are single JSON lines such as
//! `{"cmd":"CameraPan","params":{"dx":-40.0,"dy":0.0}}`.

pub mod protocol;
pub mod server;

pub use protocol::*;
pub use server::{DebugHandler, DebugServer};

/// Default debug server port
pub const DEFAULT_PORT: u16 = 9743;
