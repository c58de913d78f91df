//! Remote archive sessions.
//!
//! Everything above this module talks to the archive through [`RemoteSession`];
//! [`Connect`] opens (and logs into) a fresh session.

mod ftp;
#[cfg(any(test, feature = "testing"))]
mod memory;

pub use ftp::{FtpConnector, FtpSession};
#[cfg(any(test, feature = "testing"))]
pub use memory::{MemoryArchive, MemorySession};

use std::io::Write;

use crate::error::Result;

pub trait RemoteSession {
    /// Lists the entries directly under `path`, as full paths.
    ///
    /// When `path` names a plain file the reply is that path alone.
    /// A path with nothing to list yields an empty vector.
    fn list(&mut self, path: &str) -> Result<Vec<String>>;

    /// Streams the raw bytes of `path` into `sink`, returning the byte count.
    fn retrieve(&mut self, path: &str, sink: &mut dyn Write) -> Result<u64>;

    fn change_directory(&mut self, path: &str) -> Result<()>;

    /// Ends the session. Later calls fail.
    fn close(&mut self) -> Result<()>;
}

pub trait Connect {
    type Session: RemoteSession;

    /// Connects and authenticates.
    fn connect(&self) -> Result<Self::Session>;

    /// Human readable endpoint, for logs.
    fn endpoint(&self) -> String;
}
