//! plausch-core – Gemeinsame ID-Typen und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Plausch-Crates gemeinsam genutzt werden.

pub mod error;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{PlauschError, Result};
pub use types::{ChannelId, ConnectionId, MessageId, SessionId};
