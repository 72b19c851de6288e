//! Event-Broadcaster – Fan-Out von Hub-Events an verbundene Clients
//!
//! Jeder Client haelt eine eigene bounded Send-Queue. Gesendet wird immer
//! non-blocking: ist die Queue eines Clients voll, wird die Nachricht fuer
//! diesen Client verworfen statt den Hub zu blockieren.
//!
//! Kanal-Mitgliedschaften kennt der Broadcaster nicht; wer eine Nachricht
//! an Mitglieder verteilen will, loest die Empfaengerliste vorher ueber
//! das Kanal-Verzeichnis auf.

use dashmap::DashMap;
use plausch_core::types::SessionId;
use plausch_protocol::events::HubMessage;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Groesse der Send-Queue pro Client
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Sende-Seite der Queue eines verbundenen Clients
struct ClientSender {
    session_id: SessionId,
    tx: mpsc::Sender<HubMessage>,
}

impl ClientSender {
    /// Versucht zu senden, ohne zu blockieren
    fn senden(&self, nachricht: HubMessage) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(sitzung = %self.session_id, "Send-Queue voll – Nachricht verworfen");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(sitzung = %self.session_id, "Send-Queue geschlossen");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Verteilt Hub-Events an die Send-Queues der Clients
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    /// Sende-Seiten aller verbundenen Clients
    clients: DashMap<SessionId, ClientSender>,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
            }),
        }
    }

    /// Registriert einen Client und gibt die Empfangsseite seiner Queue zurueck
    ///
    /// Die Verbindungs-Task konsumiert den Receiver und schreibt jede
    /// Nachricht auf den Socket.
    pub fn client_registrieren(&self, session_id: SessionId) -> mpsc::Receiver<HubMessage> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        self.inner
            .clients
            .insert(session_id, ClientSender { session_id, tx });
        tracing::debug!(sitzung = %session_id, "Client beim Broadcaster registriert");
        rx
    }

    /// Entfernt die Queue eines Clients (Verbindung getrennt)
    pub fn client_entfernen(&self, session_id: SessionId) {
        self.inner.clients.remove(&session_id);
    }

    /// Sendet an genau eine Sitzung
    pub fn an_sitzung_senden(&self, session_id: SessionId, nachricht: HubMessage) -> bool {
        match self.inner.clients.get(&session_id) {
            Some(sender) => sender.senden(nachricht),
            None => false,
        }
    }

    /// Sendet an eine explizite Empfaengerliste, liefert die Anzahl Zustellungen
    pub fn an_mehrere_senden(&self, empfaenger: &[SessionId], nachricht: &HubMessage) -> usize {
        let mut gesendet = 0;
        for session_id in empfaenger {
            if let Some(sender) = self.inner.clients.get(session_id) {
                if sender.senden(nachricht.clone()) {
                    gesendet += 1;
                }
            }
        }
        gesendet
    }

    /// Sendet an alle verbundenen Clients
    pub fn an_alle_senden(&self, nachricht: &HubMessage) -> usize {
        let mut gesendet = 0;
        for eintrag in self.inner.clients.iter() {
            if eintrag.value().senden(nachricht.clone()) {
                gesendet += 1;
            }
        }
        gesendet
    }

    /// Sendet an alle verbundenen Clients ausser einem
    pub fn an_alle_ausser_senden(&self, ausser: SessionId, nachricht: &HubMessage) -> usize {
        let mut gesendet = 0;
        for eintrag in self.inner.clients.iter() {
            if eintrag.value().session_id == ausser {
                continue;
            }
            if eintrag.value().senden(nachricht.clone()) {
                gesendet += 1;
            }
        }
        gesendet
    }

    /// Anzahl registrierter Clients
    pub fn client_anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    /// Prueft ob eine Sitzung eine registrierte Queue hat
    pub fn ist_registriert(&self, session_id: SessionId) -> bool {
        self.inner.clients.contains_key(&session_id)
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
