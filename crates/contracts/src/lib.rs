//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Record flow
//! `ChangeNotificationRecord` → `Router` → `Transformer` → built-in encoding
//! → `Formatter` / `BatchFormatter` → `DestinationTransport`, with one
//! `RecordOutcome` acknowledged per record.

mod blueprint;
mod digest;
mod error;
mod field_source;
mod outbound;
mod outcome;
mod record;
mod route;
mod serde_base64;
mod stage;
mod transport;
mod value;

pub use blueprint::*;
pub use digest::{Digest, DIGEST_LEN};
pub use error::*;
pub use field_source::{DynamicFieldSource, FailureStrategy};
pub use outbound::*;
pub use outcome::RecordOutcome;
pub use record::*;
pub use route::*;
pub use stage::*;
pub use transport::*;
pub use value::{BinValue, ParticleType};
