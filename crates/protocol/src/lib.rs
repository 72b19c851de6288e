//! plausch-protocol – Event-Protokoll und Wire-Format
//!
//! Dieses Crate definiert alle Events, Enums und Strukturen die zwischen
//! Client und Hub ausgetauscht werden, sowie das Frame-Format der
//! TCP-Verbindung.

pub mod events;
pub mod wire;

pub use events::{ErrorCode, HubMessage, HubPayload};
pub use wire::FrameCodec;
