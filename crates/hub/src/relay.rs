//! Signal-Relay – adressierte Weiterleitung von WebRTC-Signalen
//!
//! Offer, Answer und ICE-Kandidaten wandern als opake Payloads von einer
//! Sitzung zu genau einer anderen. Der Relay prueft nur die Adressierung,
//! inspiziert die Payload nie und sendet grundsaetzlich nicht an alle.

use plausch_core::error::{PlauschError, Result};
use plausch_core::types::SessionId;
use plausch_protocol::events::SignalKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::registry::SessionRegistry;

// ---------------------------------------------------------------------------
// SignalUmschlag
// ---------------------------------------------------------------------------

/// Ein adressiertes Signal auf dem Weg durch den Hub
#[derive(Debug, Clone)]
pub struct SignalUmschlag {
    pub von: SessionId,
    pub an: SessionId,
    pub art: SignalKind,
    /// SDP bzw. ICE-Kandidat; wird unveraendert durchgereicht
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// SignalRelay
// ---------------------------------------------------------------------------

/// Prueft und zaehlt Signal-Weiterleitungen zwischen Sitzungen
///
/// Thread-safe via Arc. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SignalRelay {
    inner: Arc<SignalRelayInner>,
}

struct SignalRelayInner {
    register: SessionRegistry,
    /// Laufender Zaehler erfolgreich weitergeleiteter Signale
    weitergeleitet: AtomicU64,
}

impl SignalRelay {
    pub fn neu(register: SessionRegistry) -> Self {
        Self {
            inner: Arc::new(SignalRelayInner {
                register,
                weitergeleitet: AtomicU64::new(0),
            }),
        }
    }

    /// Validiert die Adressierung und liefert das aufgeloeste Ziel
    ///
    /// Absender und Ziel muessen registrierte Sitzungen sein und duerfen
    /// nicht identisch sein. Die eigentliche Zustellung uebernimmt der
    /// Aufrufer ueber den Broadcaster.
    pub fn weiterleiten(&self, umschlag: &SignalUmschlag) -> Result<SessionId> {
        if !self.inner.register.ist_online(umschlag.von) {
            return Err(PlauschError::SitzungNichtGefunden(umschlag.von.to_string()));
        }
        if umschlag.von == umschlag.an {
            return Err(PlauschError::SelbstAdressiert);
        }
        if !self.inner.register.ist_online(umschlag.an) {
            return Err(PlauschError::ZielNichtGefunden(umschlag.an.to_string()));
        }

        self.inner.weitergeleitet.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            von = %umschlag.von,
            an = %umschlag.an,
            art = ?umschlag.art,
            "Signal weitergeleitet"
        );
        Ok(umschlag.an)
    }

    /// Anzahl erfolgreich weitergeleiteter Signale
    pub fn anzahl_weitergeleitet(&self) -> u64 {
        self.inner.weitergeleitet.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use plausch_core::types::ConnectionId;
    use serde_json::json;

    fn aufbau() -> (SessionRegistry, SignalRelay) {
        let register = SessionRegistry::neu();
        let relay = SignalRelay::neu(register.clone());
        (register, relay)
    }

    fn sitzung(register: &SessionRegistry, name: &str) -> SessionId {
        register
            .registrieren(ConnectionId::new(), name, None)
            .unwrap()
            .session_id
    }

    fn umschlag(von: SessionId, an: SessionId) -> SignalUmschlag {
        SignalUmschlag {
            von,
            an,
            art: SignalKind::Offer,
            payload: json!({"sdp": "v=0..."}),
        }
    }

    #[test]
    fn weiterleitung_an_online_ziel() {
        let (register, relay) = aufbau();
        let anna = sitzung(&register, "Anna");
        let ben = sitzung(&register, "Ben");

        let ziel = relay.weiterleiten(&umschlag(anna, ben)).unwrap();
        assert_eq!(ziel, ben);
        assert_eq!(relay.anzahl_weitergeleitet(), 1);
    }

    #[test]
    fn selbst_adressierung_wird_abgelehnt() {
        let (register, relay) = aufbau();
        let anna = sitzung(&register, "Anna");

        let fehler = relay.weiterleiten(&umschlag(anna, anna));
        assert!(matches!(fehler, Err(PlauschError::SelbstAdressiert)));
        assert_eq!(relay.anzahl_weitergeleitet(), 0);
    }

    #[test]
    fn unbekanntes_ziel_wird_abgelehnt() {
        let (register, relay) = aufbau();
        let anna = sitzung(&register, "Anna");

        let fehler = relay.weiterleiten(&umschlag(anna, SessionId::new()));
        assert!(matches!(fehler, Err(PlauschError::ZielNichtGefunden(_))));
    }

    #[test]
    fn unbekannter_absender_wird_abgelehnt() {
        let (register, relay) = aufbau();
        let ben = sitzung(&register, "Ben");

        let fehler = relay.weiterleiten(&umschlag(SessionId::new(), ben));
        assert!(matches!(fehler, Err(PlauschError::SitzungNichtGefunden(_))));
    }

    #[test]
    fn entfernte_sitzung_ist_kein_ziel_mehr() {
        let (register, relay) = aufbau();
        let anna = sitzung(&register, "Anna");
        let ben = sitzung(&register, "Ben");

        relay.weiterleiten(&umschlag(anna, ben)).unwrap();
        register.entfernen(ben);

        let fehler = relay.weiterleiten(&umschlag(anna, ben));
        assert!(matches!(fehler, Err(PlauschError::ZielNichtGefunden(_))));
        assert_eq!(relay.anzahl_weitergeleitet(), 1, "nur Erfolge zaehlen");
    }
}
