//! plausch-hub – Praesenz- und Relay-Kern
//!
//! Dieser Crate implementiert den Hub: Sitzungsverwaltung, Kanaele mit
//! Mitgliedschaften, Nachrichten-Historie, WebRTC-Signal-Weiterleitung
//! und den Fan-Out der Events an alle verbundenen Clients.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (HubServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |  erste Nachricht muss join sein
//!     v
//! MessageDispatcher
//!     |
//!     +-- SessionHandler  (join)
//!     +-- ChatHandler     (send_message)
//!     +-- ChannelHandler  (create_room, switch_channel, join/leave_voice)
//!     +-- SignalHandler   (webrtc_offer, webrtc_answer, webrtc_ice_candidate)
//!
//! SessionRegistry  – wer ist online, in Beitrittsreihenfolge
//! ChannelDirectory – Kanaele und ihre Mitglieder
//! MessageLog       – Ringpuffer der juengsten Nachrichten pro Kanal
//! SignalRelay      – adressierte WebRTC-Weiterleitung
//! EventBroadcaster – Send-Queues der Clients, Fan-Out
//! ```

pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod dispatcher;
pub mod handlers;
pub mod history;
pub mod registry;
pub mod relay;
pub mod state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use directory::ChannelDirectory;
pub use dispatcher::{DispatcherContext, MessageDispatcher};
pub use history::MessageLog;
pub use registry::SessionRegistry;
pub use relay::SignalRelay;
pub use state::{HubConfig, HubState};
pub use tcp::HubServer;
