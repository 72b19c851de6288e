//! Nachrichten-Log – begrenzte Ringpuffer pro Kanal
//!
//! Jeder Kanal haelt die juengsten Nachrichten in einem Ringpuffer fester
//! Kapazitaet; beim Ueberlauf faellt die aelteste Nachricht kommentarlos
//! heraus. Nachrichten sind nach dem Anhaengen unveraenderlich.
//!
//! Die Zustellung an Mitglieder laeuft ueber `anhaengen_mit` unter dem
//! Puffer-Lock des Kanals: konkurrierende Sender koennen die Einreihung
//! dadurch nicht verschraenken und alle Mitglieder beobachten dieselbe
//! Reihenfolge.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use plausch_core::error::{PlauschError, Result};
use plausch_core::types::{ChannelId, MessageId, SessionId};
use plausch_protocol::events::MessageKind;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::directory::ChannelDirectory;
use crate::registry::SessionRegistry;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standard-Kapazitaet des Ringpuffers pro Kanal
pub const STANDARD_KAPAZITAET: usize = 100;

/// Maximale Laenge des Nachrichteninhalts in Zeichen
pub const MAX_INHALT_LAENGE: usize = 4096;

/// Absendername von System-Nachrichten auf dem Draht
pub const SYSTEM_NAME: &str = "system";

// ---------------------------------------------------------------------------
// Nachricht
// ---------------------------------------------------------------------------

/// Urheber einer Nachricht
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Autor {
    Sitzung(SessionId),
    /// Vom Hub erzeugte Hinweise (Beitritte, Abschiede)
    System,
}

impl Autor {
    /// Sitzungs-ID des Urhebers, `None` fuer System-Nachrichten
    pub fn sitzung(&self) -> Option<SessionId> {
        match self {
            Self::Sitzung(id) => Some(*id),
            Self::System => None,
        }
    }
}

/// Eine angehaengte, unveraenderliche Nachricht
#[derive(Debug, Clone)]
pub struct Nachricht {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub autor: Autor,
    /// Anzeigename zum Zeitpunkt des Anhaengens; ueberlebt die Sitzung
    pub autor_name: String,
    pub inhalt: String,
    pub art: MessageKind,
    pub zeitstempel: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// MessageLog
// ---------------------------------------------------------------------------

/// Nachrichten-Log aller Kanaele
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct MessageLog {
    inner: Arc<MessageLogInner>,
}

struct MessageLogInner {
    register: SessionRegistry,
    verzeichnis: ChannelDirectory,
    /// Ringpuffer pro Kanal; der Mutex entkoppelt Anhaenge-Reihenfolge
    /// vom Shard-Lock der Map
    puffer: DashMap<ChannelId, Mutex<VecDeque<Nachricht>>>,
    kapazitaet: usize,
    /// Laufender Zaehler aller jemals angehaengten Nachrichten
    gesamt: AtomicU64,
}

impl MessageLog {
    /// Erstellt ein Log mit Standard-Kapazitaet
    pub fn neu(register: SessionRegistry, verzeichnis: ChannelDirectory) -> Self {
        Self::mit_kapazitaet(register, verzeichnis, STANDARD_KAPAZITAET)
    }

    /// Erstellt ein Log mit eigener Ringpuffer-Kapazitaet
    pub fn mit_kapazitaet(
        register: SessionRegistry,
        verzeichnis: ChannelDirectory,
        kapazitaet: usize,
    ) -> Self {
        Self {
            inner: Arc::new(MessageLogInner {
                register,
                verzeichnis,
                puffer: DashMap::new(),
                kapazitaet: kapazitaet.max(1),
                gesamt: AtomicU64::new(0),
            }),
        }
    }

    /// Haengt eine Nachricht an einen Kanal an
    pub fn anhaengen(
        &self,
        kanal_id: ChannelId,
        autor: Autor,
        inhalt: String,
        art: MessageKind,
    ) -> Result<Nachricht> {
        self.anhaengen_mit(kanal_id, autor, inhalt, art, |_| {})
    }

    /// Haengt eine Nachricht an und ruft `zustellung` unter dem Puffer-Lock
    ///
    /// Der Orchestrator reicht hier die Fan-Out-Einreihung hinein: weil
    /// sie unter demselben Lock laeuft wie das Anhaengen, sehen alle
    /// Mitglieder Nachrichten desselben Kanals in Anhaenge-Reihenfolge.
    /// Die Zustellung darf deshalb nie blockieren (try_send-Queues).
    pub fn anhaengen_mit<F>(
        &self,
        kanal_id: ChannelId,
        autor: Autor,
        inhalt: String,
        art: MessageKind,
        zustellung: F,
    ) -> Result<Nachricht>
    where
        F: FnOnce(&Nachricht),
    {
        inhalt_pruefen(&inhalt)?;
        if !self.inner.verzeichnis.existiert(kanal_id) {
            return Err(PlauschError::KanalNichtGefunden(kanal_id.to_string()));
        }

        // System-Nachrichten umgehen die Urheber-Pruefung
        let autor_name = match autor {
            Autor::System => SYSTEM_NAME.to_string(),
            Autor::Sitzung(id) => self.inner.register.nachschlagen(id)?.display_name,
        };

        let nachricht = Nachricht {
            message_id: MessageId::new(),
            channel_id: kanal_id,
            autor,
            autor_name,
            inhalt,
            art,
            zeitstempel: Utc::now(),
        };

        // Puffer bei Bedarf anlegen, dann nur mit Shard-Read-Lock arbeiten
        if !self.inner.puffer.contains_key(&kanal_id) {
            self.inner
                .puffer
                .entry(kanal_id)
                .or_insert_with(|| Mutex::new(VecDeque::with_capacity(self.inner.kapazitaet)));
        }
        let eintrag = self
            .inner
            .puffer
            .get(&kanal_id)
            .ok_or_else(|| PlauschError::intern("Nachrichtenpuffer verschwunden"))?;

        {
            let mut puffer = eintrag.lock();
            if puffer.len() >= self.inner.kapazitaet {
                puffer.pop_front();
            }
            puffer.push_back(nachricht.clone());
            zustellung(&nachricht);
        }

        self.inner.gesamt.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(kanal = %kanal_id, nachricht = %nachricht.message_id, "Nachricht angehaengt");
        Ok(nachricht)
    }

    /// Haengt eine System-Notiz an (Beitritts- und Abschiedshinweise)
    pub fn system_notiz(&self, kanal_id: ChannelId, inhalt: String) -> Result<Nachricht> {
        self.anhaengen(kanal_id, Autor::System, inhalt, MessageKind::System)
    }

    /// Wie `system_notiz`, mit Zustellung unter dem Puffer-Lock
    pub fn system_notiz_mit<F>(
        &self,
        kanal_id: ChannelId,
        inhalt: String,
        zustellung: F,
    ) -> Result<Nachricht>
    where
        F: FnOnce(&Nachricht),
    {
        self.anhaengen_mit(kanal_id, Autor::System, inhalt, MessageKind::System, zustellung)
    }

    /// Juengste Historie eines Kanals, aelteste zuerst
    ///
    /// Liefert hoechstens `min(limit, kapazitaet)` Eintraege.
    pub fn letzte(&self, kanal_id: ChannelId, limit: usize) -> Result<Vec<Nachricht>> {
        if !self.inner.verzeichnis.existiert(kanal_id) {
            return Err(PlauschError::KanalNichtGefunden(kanal_id.to_string()));
        }

        let eintrag = match self.inner.puffer.get(&kanal_id) {
            Some(eintrag) => eintrag,
            None => return Ok(Vec::new()),
        };

        let puffer = eintrag.lock();
        let n = limit.min(self.inner.kapazitaet).min(puffer.len());
        Ok(puffer.iter().skip(puffer.len() - n).cloned().collect())
    }

    /// Anzahl aller jemals angehaengten Nachrichten
    pub fn gesamt_anzahl(&self) -> u64 {
        self.inner.gesamt.load(Ordering::Relaxed)
    }

    /// Konfigurierte Ringpuffer-Kapazitaet
    pub fn kapazitaet(&self) -> usize {
        self.inner.kapazitaet
    }
}

/// Validiert den Nachrichteninhalt
fn inhalt_pruefen(inhalt: &str) -> Result<()> {
    if inhalt.trim().is_empty() {
        return Err(PlauschError::UngueltigePayload(
            "Nachrichteninhalt darf nicht leer sein".into(),
        ));
    }
    if inhalt.chars().count() > MAX_INHALT_LAENGE {
        return Err(PlauschError::UngueltigePayload(format!(
            "Nachricht zu lang (max. {} Zeichen)",
            MAX_INHALT_LAENGE
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use plausch_core::types::ConnectionId;
    use plausch_protocol::events::ChannelKind;

    fn aufbau() -> (SessionRegistry, ChannelDirectory, MessageLog) {
        let register = SessionRegistry::neu();
        let verzeichnis = ChannelDirectory::neu(register.clone());
        let log = MessageLog::neu(register.clone(), verzeichnis.clone());
        (register, verzeichnis, log)
    }

    fn sitzung_mit_kanal(
        register: &SessionRegistry,
        verzeichnis: &ChannelDirectory,
    ) -> (SessionId, ChannelId) {
        let sitzung = register
            .registrieren(ConnectionId::new(), "Anna", None)
            .unwrap()
            .session_id;
        let kanal = verzeichnis
            .kanal_erstellen("general", ChannelKind::Text, sitzung)
            .unwrap();
        (sitzung, kanal)
    }

    #[test]
    fn anhaengen_und_lesen() {
        let (register, verzeichnis, log) = aufbau();
        let (anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);

        let nachricht = log
            .anhaengen(kanal, Autor::Sitzung(anna), "hallo".into(), MessageKind::Text)
            .unwrap();
        assert_eq!(nachricht.autor_name, "Anna");
        assert_eq!(nachricht.autor.sitzung(), Some(anna));

        let historie = log.letzte(kanal, 50).unwrap();
        assert_eq!(historie.len(), 1);
        assert_eq!(historie[0].inhalt, "hallo");
    }

    #[test]
    fn unbekannter_kanal_wird_abgelehnt() {
        let (register, _verzeichnis, log) = aufbau();
        let anna = register
            .registrieren(ConnectionId::new(), "Anna", None)
            .unwrap()
            .session_id;

        let fehler = log.anhaengen(
            ChannelId::new(),
            Autor::Sitzung(anna),
            "hallo".into(),
            MessageKind::Text,
        );
        assert!(matches!(fehler, Err(PlauschError::KanalNichtGefunden(_))));

        let fehler = log.letzte(ChannelId::new(), 10);
        assert!(matches!(fehler, Err(PlauschError::KanalNichtGefunden(_))));
    }

    #[test]
    fn unbekannter_autor_wird_abgelehnt_system_nicht() {
        let (register, verzeichnis, log) = aufbau();
        let (_anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);

        let fehler = log.anhaengen(
            kanal,
            Autor::Sitzung(SessionId::new()),
            "hallo".into(),
            MessageKind::Text,
        );
        assert!(matches!(fehler, Err(PlauschError::SitzungNichtGefunden(_))));

        // Die System-Kennung umgeht die Urheber-Pruefung
        let notiz = log.system_notiz(kanal, "Anna left".into()).unwrap();
        assert_eq!(notiz.autor, Autor::System);
        assert_eq!(notiz.autor_name, SYSTEM_NAME);
        assert_eq!(notiz.art, MessageKind::System);
    }

    #[test]
    fn ringpuffer_verdraengt_aelteste() {
        let (register, verzeichnis, log) = aufbau();
        let (anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);

        // 105 Nachrichten bei Kapazitaet 100
        for i in 0..105 {
            log.anhaengen(
                kanal,
                Autor::Sitzung(anna),
                format!("nachricht {}", i),
                MessageKind::Text,
            )
            .unwrap();
        }

        let historie = log.letzte(kanal, 100).unwrap();
        assert_eq!(historie.len(), 100);
        assert_eq!(historie.first().unwrap().inhalt, "nachricht 5");
        assert_eq!(historie.last().unwrap().inhalt, "nachricht 104");
        assert_eq!(log.gesamt_anzahl(), 105);
    }

    #[test]
    fn letzte_respektiert_limit_und_reihenfolge() {
        let (register, verzeichnis, log) = aufbau();
        let (anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);

        for i in 0..10 {
            log.anhaengen(
                kanal,
                Autor::Sitzung(anna),
                format!("n{}", i),
                MessageKind::Text,
            )
            .unwrap();
        }

        let historie = log.letzte(kanal, 3).unwrap();
        let inhalte: Vec<&str> = historie.iter().map(|n| n.inhalt.as_str()).collect();
        assert_eq!(inhalte, ["n7", "n8", "n9"], "aelteste zuerst, Suffix");

        // Limit oberhalb der Kapazitaet wird gekappt
        let log_klein = MessageLog::mit_kapazitaet(register.clone(), verzeichnis.clone(), 5);
        for i in 0..10 {
            log_klein
                .anhaengen(kanal, Autor::Sitzung(anna), format!("k{}", i), MessageKind::Text)
                .unwrap();
        }
        assert_eq!(log_klein.letzte(kanal, 999).unwrap().len(), 5);
    }

    #[test]
    fn leerer_kanal_liefert_leere_historie() {
        let (register, verzeichnis, _log) = aufbau();
        let (_anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);
        let log = MessageLog::neu(register, verzeichnis);
        assert!(log.letzte(kanal, 100).unwrap().is_empty());
    }

    #[test]
    fn inhalt_wird_validiert() {
        let (register, verzeichnis, log) = aufbau();
        let (anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);

        let leer = log.anhaengen(kanal, Autor::Sitzung(anna), "  ".into(), MessageKind::Text);
        assert!(matches!(leer, Err(PlauschError::UngueltigePayload(_))));

        let zu_lang = "x".repeat(MAX_INHALT_LAENGE + 1);
        let lang = log.anhaengen(kanal, Autor::Sitzung(anna), zu_lang, MessageKind::Text);
        assert!(matches!(lang, Err(PlauschError::UngueltigePayload(_))));
    }

    #[test]
    fn zustellung_laeuft_unter_dem_puffer_lock() {
        let (register, verzeichnis, log) = aufbau();
        let (anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);

        let mut gesehen = None;
        log.anhaengen_mit(
            kanal,
            Autor::Sitzung(anna),
            "hi".into(),
            MessageKind::Text,
            |nachricht| gesehen = Some(nachricht.message_id),
        )
        .unwrap();

        let historie = log.letzte(kanal, 1).unwrap();
        assert_eq!(gesehen, Some(historie[0].message_id));
    }

    #[test]
    fn autorname_ueberlebt_die_sitzung() {
        let (register, verzeichnis, log) = aufbau();
        let (anna, kanal) = sitzung_mit_kanal(&register, &verzeichnis);

        log.anhaengen(kanal, Autor::Sitzung(anna), "hi".into(), MessageKind::Text)
            .unwrap();
        register.entfernen(anna);

        let historie = log.letzte(kanal, 10).unwrap();
        assert_eq!(historie[0].autor_name, "Anna");
    }
}
