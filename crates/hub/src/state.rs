//! Hub-Zustand – geteilte Services des Praesenz-Hubs
//!
//! Haelt Register, Kanal-Verzeichnis, Nachrichten-Log, Signal-Relay und
//! Broadcaster als geteilte Referenzen, die sicher zwischen tokio-Tasks
//! geteilt werden koennen.

use plausch_core::error::Result;
use plausch_core::types::ChannelId;
use plausch_protocol::events::ChannelKind;
use std::sync::Arc;
use std::time::Instant;

use crate::broadcast::EventBroadcaster;
use crate::directory::ChannelDirectory;
use crate::history::{MessageLog, STANDARD_KAPAZITAET};
use crate::registry::SessionRegistry;
use crate::relay::SignalRelay;

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Konfiguration fuer den Hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Anzeigename des Hubs
    pub hub_name: String,
    /// Begruessung fuer die Status-API
    pub willkommensnachricht: Option<String>,
    /// Maximale Anzahl gleichzeitiger Sitzungen
    pub max_sitzungen: u32,
    /// Name des beim Start angelegten Text-Kanals; leer schaltet ihn ab
    pub standard_kanal: String,
    /// Ringpuffer-Kapazitaet des Nachrichten-Logs pro Kanal
    pub verlauf_kapazitaet: usize,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer stille Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            hub_name: "Plausch Hub".to_string(),
            willkommensnachricht: None,
            max_sitzungen: 512,
            standard_kanal: "general".to_string(),
            verlauf_kapazitaet: STANDARD_KAPAZITAET,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

// ---------------------------------------------------------------------------
// HubState
// ---------------------------------------------------------------------------

/// Gemeinsamer Hub-Zustand (thread-safe, Arc-geteilt)
///
/// Clone der enthaltenen Services gibt eine Referenz auf denselben
/// inneren Zustand.
pub struct HubState {
    /// Hub-Konfiguration
    pub config: Arc<HubConfig>,
    /// Session-Register (wer ist online)
    pub register: SessionRegistry,
    /// Kanal-Verzeichnis (Kanaele und Mitgliedschaften)
    pub verzeichnis: ChannelDirectory,
    /// Nachrichten-Log (Ringpuffer pro Kanal)
    pub nachrichten: MessageLog,
    /// Signal-Relay (WebRTC-Weiterleitung)
    pub relay: SignalRelay,
    /// Event-Broadcaster (Fan-Out an Clients)
    pub broadcaster: EventBroadcaster,
    /// Beim Start angelegter Text-Kanal, in den neue Sitzungen gesetzt werden
    pub standard_kanal: Option<ChannelId>,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_zeit: Instant,
}

impl HubState {
    /// Erstellt den Hub-Zustand und legt den Standard-Kanal an
    pub fn neu(config: HubConfig) -> Result<Arc<Self>> {
        let register = SessionRegistry::neu();
        let verzeichnis = ChannelDirectory::neu(register.clone());
        let nachrichten = MessageLog::mit_kapazitaet(
            register.clone(),
            verzeichnis.clone(),
            config.verlauf_kapazitaet,
        );

        // Der Standard-Kanal startet ohne Mitglieder
        let standard_kanal = if config.standard_kanal.trim().is_empty() {
            tracing::warn!("Kein Standard-Kanal konfiguriert");
            None
        } else {
            let kanal_id = verzeichnis.vorab_anlegen(&config.standard_kanal, ChannelKind::Text)?;
            tracing::info!(kanal = %kanal_id, name = %config.standard_kanal, "Standard-Kanal angelegt");
            Some(kanal_id)
        };

        Ok(Arc::new(Self {
            relay: SignalRelay::neu(register.clone()),
            broadcaster: EventBroadcaster::neu(),
            config: Arc::new(config),
            register,
            verzeichnis,
            nachrichten,
            standard_kanal,
            start_zeit: Instant::now(),
        }))
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_zeit.elapsed().as_secs()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
