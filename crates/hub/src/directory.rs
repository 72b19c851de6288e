//! Kanal-Verzeichnis – Besitzer aller Kanaele und Mitgliedschaften
//!
//! Das Verzeichnis haelt Kanal-Records mit Mitglieds-Sets aus Sitzungs-IDs.
//! Es kopiert nie Sitzungszustand; Identitaeten werden gegen das Register
//! geprueft und die Kanal-Zeiger der Sitzungen ueber dessen API gepflegt.
//! Kanaele werden fuer die Lebensdauer des Prozesses nie geloescht.
//!
//! ## Beitritts-Semantik
//! - Text: hoechstens ein aktiver Text-Kanal pro Sitzung, ein Beitritt
//!   verlaesst den vorherigen Text-Kanal automatisch
//! - Voice: unabhaengig vom Text-Kanal; ein anderer aktiver Voice-Kanal
//!   muss explizit verlassen werden, sonst wird der Beitritt abgelehnt

use dashmap::DashMap;
use plausch_core::error::{PlauschError, Result};
use plausch_core::types::{ChannelId, SessionId};
use plausch_protocol::events::ChannelKind;
use std::collections::HashSet;
use std::sync::Arc;

use crate::registry::{SessionRegistry, Sitzung};

/// Maximale Laenge eines Kanalnamens
const MAX_KANALNAME_LAENGE: usize = 64;

// ---------------------------------------------------------------------------
// Kanal
// ---------------------------------------------------------------------------

/// Ein Kanal-Record
#[derive(Debug, Clone)]
pub struct Kanal {
    pub channel_id: ChannelId,
    pub name: String,
    pub art: ChannelKind,
    /// Mitglieder als ungeordnetes Set, keine Duplikate
    pub mitglieder: HashSet<SessionId>,
}

impl Kanal {
    fn neu(name: String, art: ChannelKind) -> Self {
        Self {
            channel_id: ChannelId::new(),
            name,
            art,
            mitglieder: HashSet::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelDirectory
// ---------------------------------------------------------------------------

/// Verzeichnis aller Kanaele
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct ChannelDirectory {
    inner: Arc<ChannelDirectoryInner>,
}

struct ChannelDirectoryInner {
    register: SessionRegistry,
    kanaele: DashMap<ChannelId, Kanal>,
}

impl ChannelDirectory {
    /// Erstellt ein leeres Verzeichnis
    pub fn neu(register: SessionRegistry) -> Self {
        Self {
            inner: Arc::new(ChannelDirectoryInner {
                register,
                kanaele: DashMap::new(),
            }),
        }
    }

    /// Legt einen Kanal ohne Ersteller an (Vorab-Provisionierung beim Start)
    pub fn vorab_anlegen(&self, name: &str, art: ChannelKind) -> Result<ChannelId> {
        let name = name_pruefen(name)?;
        let kanal = Kanal::neu(name.clone(), art);
        let kanal_id = kanal.channel_id;
        self.inner.kanaele.insert(kanal_id, kanal);
        tracing::info!(kanal = %kanal_id, name = %name, "Kanal vorab angelegt");
        Ok(kanal_id)
    }

    /// Erstellt einen Kanal und macht den Ersteller zum ersten Mitglied
    ///
    /// Der Beitritt des Erstellers folgt der normalen Beitritts-Semantik:
    /// ein Text-Kanal loest den Wechsel aus dem bisherigen Text-Kanal aus,
    /// ein Voice-Kanal verlangt dass kein anderer Voice-Kanal aktiv ist.
    pub fn kanal_erstellen(
        &self,
        name: &str,
        art: ChannelKind,
        ersteller: SessionId,
    ) -> Result<ChannelId> {
        let name = name_pruefen(name)?;
        // Ersteller-Identitaet vor dem Anlegen pruefen
        let sitzung = self.inner.register.nachschlagen(ersteller)?;
        if art == ChannelKind::Voice {
            if let Some(aktiv) = sitzung.voice_kanal {
                return Err(PlauschError::VoiceBereitsAktiv(aktiv.to_string()));
            }
        }

        let kanal = Kanal::neu(name.clone(), art);
        let kanal_id = kanal.channel_id;
        self.inner.kanaele.insert(kanal_id, kanal);

        if let Err(fehler) = self.beitreten(kanal_id, ersteller) {
            // Der Kanal war noch nicht nach aussen sichtbar, daher darf
            // er hier wieder verschwinden
            self.inner.kanaele.remove(&kanal_id);
            return Err(fehler);
        }

        tracing::info!(kanal = %kanal_id, name = %name, ersteller = %ersteller, "Kanal erstellt");
        Ok(kanal_id)
    }

    /// Fuegt eine Sitzung einem Kanal hinzu
    ///
    /// Idempotent wenn die Sitzung bereits Mitglied ist. Gibt `true`
    /// zurueck wenn sich die Mitgliedschaft tatsaechlich geaendert hat.
    pub fn beitreten(&self, kanal_id: ChannelId, sitzung_id: SessionId) -> Result<bool> {
        let art = self.art_von(kanal_id)?;
        let sitzung = self.inner.register.nachschlagen(sitzung_id)?;

        match art {
            ChannelKind::Text => self.text_beitreten(kanal_id, &sitzung),
            ChannelKind::Voice => self.voice_beitreten(kanal_id, &sitzung),
        }
    }

    fn text_beitreten(&self, kanal_id: ChannelId, sitzung: &Sitzung) -> Result<bool> {
        if sitzung.text_kanal == Some(kanal_id) {
            return Ok(false);
        }

        // Erst den alten Kanal aufgeben, dann den neuen betreten. Die
        // Guards duerfen sich nicht ueberlappen (Shard-Locks).
        if let Some(alter_kanal) = sitzung.text_kanal {
            self.mitglied_austragen(alter_kanal, sitzung.session_id);
        }
        self.mitglied_eintragen(kanal_id, sitzung.session_id)?;
        self.inner
            .register
            .text_kanal_setzen(sitzung.session_id, Some(kanal_id))?;

        tracing::debug!(sitzung = %sitzung.session_id, kanal = %kanal_id, "Text-Kanal gewechselt");
        Ok(true)
    }

    fn voice_beitreten(&self, kanal_id: ChannelId, sitzung: &Sitzung) -> Result<bool> {
        match sitzung.voice_kanal {
            Some(aktiv) if aktiv == kanal_id => return Ok(false),
            Some(aktiv) => return Err(PlauschError::VoiceBereitsAktiv(aktiv.to_string())),
            None => {}
        }

        self.mitglied_eintragen(kanal_id, sitzung.session_id)?;
        self.inner
            .register
            .voice_kanal_setzen(sitzung.session_id, Some(kanal_id))?;

        tracing::debug!(sitzung = %sitzung.session_id, kanal = %kanal_id, "Voice-Kanal betreten");
        Ok(true)
    }

    /// Entfernt eine Sitzung aus einem Kanal
    ///
    /// Idempotent: Nicht-Mitgliedschaft ist kein Fehler. Gibt `true`
    /// zurueck wenn die Sitzung tatsaechlich Mitglied war.
    pub fn verlassen(&self, kanal_id: ChannelId, sitzung_id: SessionId) -> Result<bool> {
        let art = self.art_von(kanal_id)?;
        let war_mitglied = self.mitglied_austragen(kanal_id, sitzung_id);
        if !war_mitglied {
            return Ok(false);
        }

        // Kanal-Zeiger nur zuruecksetzen wenn die Sitzung noch lebt und
        // tatsaechlich auf diesen Kanal zeigt
        if let Ok(sitzung) = self.inner.register.nachschlagen(sitzung_id) {
            match art {
                ChannelKind::Text if sitzung.text_kanal == Some(kanal_id) => {
                    self.inner.register.text_kanal_setzen(sitzung_id, None)?;
                }
                ChannelKind::Voice if sitzung.voice_kanal == Some(kanal_id) => {
                    self.inner.register.voice_kanal_setzen(sitzung_id, None)?;
                }
                _ => {}
            }
        }

        tracing::debug!(sitzung = %sitzung_id, kanal = %kanal_id, "Kanal verlassen");
        Ok(true)
    }

    /// Traegt eine getrennte Sitzung aus allen Kanaelen aus
    ///
    /// Arbeitet auf dem Abschieds-Schnappschuss des Registers; die
    /// Sitzung selbst existiert zu diesem Zeitpunkt schon nicht mehr.
    pub fn mitgliedschaften_entfernen(&self, sitzung: &Sitzung) {
        if let Some(kanal) = sitzung.text_kanal {
            self.mitglied_austragen(kanal, sitzung.session_id);
        }
        if let Some(kanal) = sitzung.voice_kanal {
            self.mitglied_austragen(kanal, sitzung.session_id);
        }
    }

    /// Mitglieder eines Kanals
    pub fn mitglieder(&self, kanal_id: ChannelId) -> Result<Vec<SessionId>> {
        self.inner
            .kanaele
            .get(&kanal_id)
            .map(|kanal| kanal.mitglieder.iter().copied().collect())
            .ok_or_else(|| PlauschError::KanalNichtGefunden(kanal_id.to_string()))
    }

    /// Schnappschuss eines Kanal-Records
    pub fn kanal_info(&self, kanal_id: ChannelId) -> Result<Kanal> {
        self.inner
            .kanaele
            .get(&kanal_id)
            .map(|kanal| kanal.clone())
            .ok_or_else(|| PlauschError::KanalNichtGefunden(kanal_id.to_string()))
    }

    /// Art eines Kanals
    pub fn art_von(&self, kanal_id: ChannelId) -> Result<ChannelKind> {
        self.inner
            .kanaele
            .get(&kanal_id)
            .map(|kanal| kanal.art)
            .ok_or_else(|| PlauschError::KanalNichtGefunden(kanal_id.to_string()))
    }

    /// Prueft ob ein Kanal existiert
    pub fn existiert(&self, kanal_id: ChannelId) -> bool {
        self.inner.kanaele.contains_key(&kanal_id)
    }

    /// Anzahl der Kanaele
    pub fn anzahl(&self) -> usize {
        self.inner.kanaele.len()
    }

    fn mitglied_eintragen(&self, kanal_id: ChannelId, sitzung_id: SessionId) -> Result<()> {
        let mut kanal = self
            .inner
            .kanaele
            .get_mut(&kanal_id)
            .ok_or_else(|| PlauschError::KanalNichtGefunden(kanal_id.to_string()))?;
        kanal.mitglieder.insert(sitzung_id);
        Ok(())
    }

    fn mitglied_austragen(&self, kanal_id: ChannelId, sitzung_id: SessionId) -> bool {
        match self.inner.kanaele.get_mut(&kanal_id) {
            Some(mut kanal) => kanal.mitglieder.remove(&sitzung_id),
            None => false,
        }
    }
}

/// Validiert und normalisiert einen Kanalnamen
fn name_pruefen(roh: &str) -> Result<String> {
    let name = roh.trim();
    if name.is_empty() {
        return Err(PlauschError::UngueltigerName(
            "Kanalname darf nicht leer sein".into(),
        ));
    }
    if name.chars().count() > MAX_KANALNAME_LAENGE {
        return Err(PlauschError::UngueltigerName(format!(
            "Kanalname zu lang (max. {} Zeichen)",
            MAX_KANALNAME_LAENGE
        )));
    }
    Ok(name.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use plausch_core::types::ConnectionId;

    fn aufbau() -> (SessionRegistry, ChannelDirectory) {
        let register = SessionRegistry::neu();
        let verzeichnis = ChannelDirectory::neu(register.clone());
        (register, verzeichnis)
    }

    fn neue_sitzung(register: &SessionRegistry, name: &str) -> SessionId {
        register
            .registrieren(ConnectionId::new(), name, None)
            .expect("Registrierung muss gelingen")
            .session_id
    }

    #[test]
    fn kanal_erstellen_macht_ersteller_zum_mitglied() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");

        let kanal = verzeichnis
            .kanal_erstellen("general", ChannelKind::Text, anna)
            .unwrap();

        assert_eq!(verzeichnis.mitglieder(kanal).unwrap(), vec![anna]);
        let sitzung = register.nachschlagen(anna).unwrap();
        assert_eq!(sitzung.text_kanal, Some(kanal));
    }

    #[test]
    fn leerer_name_wird_abgelehnt() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");

        let fehler = verzeichnis.kanal_erstellen("   ", ChannelKind::Text, anna);
        assert!(matches!(fehler, Err(PlauschError::UngueltigerName(_))));
        assert_eq!(verzeichnis.anzahl(), 0, "kein Kanal darf zurueckbleiben");
    }

    #[test]
    fn unbekannter_ersteller_wird_abgelehnt() {
        let (_register, verzeichnis) = aufbau();
        let fehler = verzeichnis.kanal_erstellen("general", ChannelKind::Text, SessionId::new());
        assert!(matches!(fehler, Err(PlauschError::SitzungNichtGefunden(_))));
        assert_eq!(verzeichnis.anzahl(), 0);
    }

    #[test]
    fn text_beitritt_verlaesst_vorherigen_kanal() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");

        let erster = verzeichnis
            .kanal_erstellen("erster", ChannelKind::Text, anna)
            .unwrap();
        let zweiter = verzeichnis.vorab_anlegen("zweiter", ChannelKind::Text).unwrap();

        let geaendert = verzeichnis.beitreten(zweiter, anna).unwrap();
        assert!(geaendert);
        assert!(verzeichnis.mitglieder(erster).unwrap().is_empty());
        assert_eq!(verzeichnis.mitglieder(zweiter).unwrap(), vec![anna]);
        assert_eq!(register.nachschlagen(anna).unwrap().text_kanal, Some(zweiter));
    }

    #[test]
    fn beitritt_ist_idempotent() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");
        let kanal = verzeichnis
            .kanal_erstellen("general", ChannelKind::Text, anna)
            .unwrap();

        let geaendert = verzeichnis.beitreten(kanal, anna).unwrap();
        assert!(!geaendert, "erneuter Beitritt ist ein No-Op");
        assert_eq!(verzeichnis.mitglieder(kanal).unwrap().len(), 1);
    }

    #[test]
    fn voice_verlangt_explizites_verlassen() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");

        let voice_a = verzeichnis.vorab_anlegen("voice-a", ChannelKind::Voice).unwrap();
        let voice_b = verzeichnis.vorab_anlegen("voice-b", ChannelKind::Voice).unwrap();

        assert!(verzeichnis.beitreten(voice_a, anna).unwrap());
        // Wechsel ohne Verlassen wird abgelehnt
        let fehler = verzeichnis.beitreten(voice_b, anna);
        assert!(matches!(fehler, Err(PlauschError::VoiceBereitsAktiv(_))));

        // Erneuter Beitritt zum selben Voice-Kanal ist ein No-Op
        assert!(!verzeichnis.beitreten(voice_a, anna).unwrap());

        // Nach explizitem Verlassen klappt der Wechsel
        assert!(verzeichnis.verlassen(voice_a, anna).unwrap());
        assert!(verzeichnis.beitreten(voice_b, anna).unwrap());
        assert_eq!(register.nachschlagen(anna).unwrap().voice_kanal, Some(voice_b));
    }

    #[test]
    fn voice_beitritt_beruehrt_text_kanal_nicht() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");

        let text = verzeichnis
            .kanal_erstellen("general", ChannelKind::Text, anna)
            .unwrap();
        let voice = verzeichnis.vorab_anlegen("sprechzimmer", ChannelKind::Voice).unwrap();

        verzeichnis.beitreten(voice, anna).unwrap();

        let sitzung = register.nachschlagen(anna).unwrap();
        assert_eq!(sitzung.text_kanal, Some(text));
        assert_eq!(sitzung.voice_kanal, Some(voice));
        assert_eq!(verzeichnis.mitglieder(text).unwrap().len(), 1);
    }

    #[test]
    fn verlassen_ist_idempotent() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");
        let kanal = verzeichnis.vorab_anlegen("general", ChannelKind::Text).unwrap();

        // Nicht-Mitglied verlaesst: No-Op
        assert!(!verzeichnis.verlassen(kanal, anna).unwrap());

        verzeichnis.beitreten(kanal, anna).unwrap();
        assert!(verzeichnis.verlassen(kanal, anna).unwrap());
        assert!(!verzeichnis.verlassen(kanal, anna).unwrap());

        let fehler = verzeichnis.verlassen(ChannelId::new(), anna);
        assert!(matches!(fehler, Err(PlauschError::KanalNichtGefunden(_))));
    }

    #[test]
    fn mitgliedschaften_entfernen_nach_trennung() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");

        let text = verzeichnis
            .kanal_erstellen("general", ChannelKind::Text, anna)
            .unwrap();
        let voice = verzeichnis.vorab_anlegen("sprechzimmer", ChannelKind::Voice).unwrap();
        verzeichnis.beitreten(voice, anna).unwrap();

        let schnappschuss = register.entfernen(anna).expect("Schnappschuss erwartet");
        verzeichnis.mitgliedschaften_entfernen(&schnappschuss);

        assert!(verzeichnis.mitglieder(text).unwrap().is_empty());
        assert!(verzeichnis.mitglieder(voice).unwrap().is_empty());
    }

    #[test]
    fn doppelte_namen_sind_erlaubt() {
        let (register, verzeichnis) = aufbau();
        let anna = neue_sitzung(&register, "Anna");

        let erster = verzeichnis
            .kanal_erstellen("general", ChannelKind::Text, anna)
            .unwrap();
        let zweiter = verzeichnis
            .kanal_erstellen("general", ChannelKind::Text, anna)
            .unwrap();
        assert_ne!(erster, zweiter);
        assert_eq!(verzeichnis.anzahl(), 2);
    }
}
