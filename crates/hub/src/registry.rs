//! Sitzungs-Register – Besitzer aller Live-Sitzungen
//!
//! Das Register ist die einzige Quelle der Wahrheit darueber, wer gerade
//! online ist. Eine Sitzung entsteht beim ersten `join` einer Verbindung
//! und wird beim Trennen restlos entfernt; alle anderen Komponenten
//! referenzieren Sitzungen ausschliesslich per ID.

use dashmap::DashMap;
use parking_lot::RwLock;
use plausch_core::error::{PlauschError, Result};
use plausch_core::types::{ChannelId, ConnectionId, SessionId};
use std::sync::Arc;
use std::time::Instant;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Maximale Laenge eines Anzeigenamens, Rest wird abgeschnitten
const MAX_NAME_LAENGE: usize = 64;

/// Ersatzname wenn der Client keinen Anzeigenamen mitschickt
const ERSATZ_NAME: &str = "Gast";

// ---------------------------------------------------------------------------
// Sitzung
// ---------------------------------------------------------------------------

/// Anwesenheitszustand einer Sitzung
///
/// `Offline` existiert nur fluechtig: im Abschieds-Schnappschuss den
/// `entfernen` zurueckgibt, bevor die Sitzung endgueltig verschwindet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Praesenz {
    Online,
    Offline,
}

impl Praesenz {
    /// Darstellung fuer das Drahtformat
    pub fn ist_online(&self) -> bool {
        matches!(self, Self::Online)
    }
}

/// Eine verbundene Sitzung
#[derive(Debug, Clone)]
pub struct Sitzung {
    pub session_id: SessionId,
    /// Transport-Verbindung ueber die die Sitzung beigetreten ist
    pub verbindung: ConnectionId,
    pub display_name: String,
    pub avatar: Option<String>,
    pub praesenz: Praesenz,
    /// Aktiver Text-Kanal (hoechstens einer)
    pub text_kanal: Option<ChannelId>,
    /// Aktiver Voice-Kanal, unabhaengig vom Text-Kanal
    pub voice_kanal: Option<ChannelId>,
    pub verbunden_seit: Instant,
}

// ---------------------------------------------------------------------------
// SessionRegistry
// ---------------------------------------------------------------------------

/// Register aller Live-Sitzungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<SessionRegistryInner>,
}

struct SessionRegistryInner {
    /// Alle Live-Sitzungen
    sitzungen: DashMap<SessionId, Sitzung>,
    /// Verbindung -> Sitzung, erkennt doppelte join-Versuche
    verbindungen: DashMap<ConnectionId, SessionId>,
    /// Beitrittsreihenfolge fuer stabile Online-Listen
    reihenfolge: RwLock<Vec<SessionId>>,
}

impl SessionRegistry {
    /// Erstellt ein leeres Register
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(SessionRegistryInner {
                sitzungen: DashMap::new(),
                verbindungen: DashMap::new(),
                reihenfolge: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Legt eine neue Sitzung fuer eine Verbindung an
    ///
    /// Schlaegt mit `DoppelteVerbindung` fehl wenn die Verbindung bereits
    /// eine Sitzung traegt (zweiter `join` auf demselben Socket).
    /// Ansonsten gelingt die Registrierung immer: ein leerer Anzeigename
    /// wird durch einen Ersatznamen ersetzt, ueberlange Namen gekuerzt.
    pub fn registrieren(
        &self,
        verbindung: ConnectionId,
        display_name: &str,
        avatar: Option<String>,
    ) -> Result<Sitzung> {
        let session_id = SessionId::new();

        // Atomarer Check+Insert ueber die Entry-API, damit zwei
        // gleichzeitige join-Versuche derselben Verbindung nicht beide
        // durchrutschen
        match self.inner.verbindungen.entry(verbindung) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                return Err(PlauschError::DoppelteVerbindung(verbindung.to_string()));
            }
            dashmap::mapref::entry::Entry::Vacant(eintrag) => {
                eintrag.insert(session_id);
            }
        }

        let name = normalisierter_name(display_name);
        let sitzung = Sitzung {
            session_id,
            verbindung,
            display_name: name.clone(),
            avatar,
            praesenz: Praesenz::Online,
            text_kanal: None,
            voice_kanal: None,
            verbunden_seit: Instant::now(),
        };

        self.inner.sitzungen.insert(session_id, sitzung.clone());
        self.inner.reihenfolge.write().push(session_id);

        tracing::info!(sitzung = %session_id, name = %name, "Sitzung registriert");
        Ok(sitzung)
    }

    /// Liefert einen Schnappschuss einer Sitzung
    pub fn nachschlagen(&self, session_id: SessionId) -> Result<Sitzung> {
        self.inner
            .sitzungen
            .get(&session_id)
            .map(|eintrag| eintrag.clone())
            .ok_or_else(|| PlauschError::SitzungNichtGefunden(session_id.to_string()))
    }

    /// Alle Online-Sitzungen in Beitrittsreihenfolge
    pub fn alle_online(&self) -> Vec<Sitzung> {
        let reihenfolge = self.inner.reihenfolge.read();
        reihenfolge
            .iter()
            .filter_map(|id| self.inner.sitzungen.get(id).map(|eintrag| eintrag.clone()))
            .collect()
    }

    /// Entfernt eine Sitzung und gibt den letzten Schnappschuss zurueck
    ///
    /// Idempotent: fuer eine unbekannte ID kommt `None`. Der Schnappschuss
    /// traegt bereits `Praesenz::Offline` und eignet sich direkt fuer
    /// Abschieds-Benachrichtigungen.
    pub fn entfernen(&self, session_id: SessionId) -> Option<Sitzung> {
        let (_, mut sitzung) = self.inner.sitzungen.remove(&session_id)?;
        self.inner.verbindungen.remove(&sitzung.verbindung);
        self.inner.reihenfolge.write().retain(|id| *id != session_id);

        sitzung.praesenz = Praesenz::Offline;
        tracing::info!(sitzung = %session_id, name = %sitzung.display_name, "Sitzung entfernt");
        Some(sitzung)
    }

    /// Sitzungs-ID zu einer Verbindung, falls registriert
    pub fn sitzung_von_verbindung(&self, verbindung: ConnectionId) -> Option<SessionId> {
        self.inner.verbindungen.get(&verbindung).map(|e| *e)
    }

    /// Setzt den aktiven Text-Kanal einer Sitzung
    pub fn text_kanal_setzen(&self, session_id: SessionId, kanal: Option<ChannelId>) -> Result<()> {
        let mut eintrag = self
            .inner
            .sitzungen
            .get_mut(&session_id)
            .ok_or_else(|| PlauschError::SitzungNichtGefunden(session_id.to_string()))?;
        eintrag.text_kanal = kanal;
        Ok(())
    }

    /// Setzt den aktiven Voice-Kanal einer Sitzung
    pub fn voice_kanal_setzen(
        &self,
        session_id: SessionId,
        kanal: Option<ChannelId>,
    ) -> Result<()> {
        let mut eintrag = self
            .inner
            .sitzungen
            .get_mut(&session_id)
            .ok_or_else(|| PlauschError::SitzungNichtGefunden(session_id.to_string()))?;
        eintrag.voice_kanal = kanal;
        Ok(())
    }

    /// Prueft ob eine Sitzung online ist
    pub fn ist_online(&self, session_id: SessionId) -> bool {
        self.inner.sitzungen.contains_key(&session_id)
    }

    /// Anzahl der Online-Sitzungen
    pub fn anzahl(&self) -> usize {
        self.inner.sitzungen.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

/// Kuerzt den Anzeigenamen und ersetzt leere Namen
fn normalisierter_name(roh: &str) -> String {
    let getrimmt = roh.trim();
    if getrimmt.is_empty() {
        return ERSATZ_NAME.to_string();
    }
    getrimmt.chars().take(MAX_NAME_LAENGE).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registrieren_und_nachschlagen() {
        let register = SessionRegistry::neu();
        let conn = ConnectionId::new();

        let sitzung = register
            .registrieren(conn, "Anna", Some("🦊".into()))
            .expect("Registrierung muss gelingen");
        assert_eq!(sitzung.display_name, "Anna");
        assert_eq!(sitzung.praesenz, Praesenz::Online);
        assert!(sitzung.text_kanal.is_none());

        let gefunden = register.nachschlagen(sitzung.session_id).unwrap();
        assert_eq!(gefunden.session_id, sitzung.session_id);
    }

    #[test]
    fn doppelte_verbindung_wird_abgelehnt() {
        let register = SessionRegistry::neu();
        let conn = ConnectionId::new();

        register.registrieren(conn, "Anna", None).unwrap();
        let zweiter = register.registrieren(conn, "Anna II", None);
        assert!(matches!(
            zweiter,
            Err(PlauschError::DoppelteVerbindung(_))
        ));
        assert_eq!(register.anzahl(), 1);
    }

    #[test]
    fn online_liste_in_beitrittsreihenfolge() {
        let register = SessionRegistry::neu();
        let namen = ["Erste", "Zweite", "Dritte"];
        for name in namen {
            register
                .registrieren(ConnectionId::new(), name, None)
                .unwrap();
        }

        let online = register.alle_online();
        let gelistet: Vec<&str> = online.iter().map(|s| s.display_name.as_str()).collect();
        assert_eq!(gelistet, namen);
    }

    #[test]
    fn entfernen_ist_idempotent_und_liefert_offline_schnappschuss() {
        let register = SessionRegistry::neu();
        let sitzung = register
            .registrieren(ConnectionId::new(), "Anna", None)
            .unwrap();

        let schnappschuss = register.entfernen(sitzung.session_id).expect("erster Aufruf");
        assert_eq!(schnappschuss.praesenz, Praesenz::Offline);
        assert!(register.entfernen(sitzung.session_id).is_none(), "zweiter Aufruf");

        assert!(matches!(
            register.nachschlagen(sitzung.session_id),
            Err(PlauschError::SitzungNichtGefunden(_))
        ));
        assert!(register.alle_online().is_empty());
    }

    #[test]
    fn verbindung_ist_nach_entfernen_wieder_frei() {
        let register = SessionRegistry::neu();
        let conn = ConnectionId::new();

        let erste = register.registrieren(conn, "Anna", None).unwrap();
        register.entfernen(erste.session_id);

        // Dieselbe Verbindung darf erneut beitreten
        let zweite = register.registrieren(conn, "Anna", None);
        assert!(zweite.is_ok());
    }

    #[test]
    fn leerer_name_faellt_auf_ersatznamen_zurueck() {
        let register = SessionRegistry::neu();
        let sitzung = register
            .registrieren(ConnectionId::new(), "   ", None)
            .unwrap();
        assert_eq!(sitzung.display_name, ERSATZ_NAME);
    }

    #[test]
    fn ueberlanger_name_wird_gekuerzt() {
        let register = SessionRegistry::neu();
        let lang = "x".repeat(200);
        let sitzung = register
            .registrieren(ConnectionId::new(), &lang, None)
            .unwrap();
        assert_eq!(sitzung.display_name.chars().count(), MAX_NAME_LAENGE);
    }

    #[test]
    fn kanal_zeiger_setzen() {
        let register = SessionRegistry::neu();
        let sitzung = register
            .registrieren(ConnectionId::new(), "Anna", None)
            .unwrap();
        let kanal = ChannelId::new();

        register
            .text_kanal_setzen(sitzung.session_id, Some(kanal))
            .unwrap();
        register
            .voice_kanal_setzen(sitzung.session_id, Some(kanal))
            .unwrap();

        let aktuell = register.nachschlagen(sitzung.session_id).unwrap();
        assert_eq!(aktuell.text_kanal, Some(kanal));
        assert_eq!(aktuell.voice_kanal, Some(kanal));

        let fehler = register.text_kanal_setzen(SessionId::new(), None);
        assert!(matches!(fehler, Err(PlauschError::SitzungNichtGefunden(_))));
    }
}
