//! Transport implementations
//!
//! Contains LogTransport and FileTransport. Wire clients for the real
//! destination systems plug in through `DestinationTransport`.

mod file;
mod log;

pub use self::file::FileTransport;
pub use self::log::LogTransport;
