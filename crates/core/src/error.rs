//! Fehlertypen fuer Plausch
//!
//! Zentraler Fehler-Enum der alle Ablehnungsgruende des Hubs abdeckt.
//! Jede Operation schlaegt entweder vollstaendig fehl oder wird
//! vollstaendig angewendet; Teilzustaende gibt es nicht.

use thiserror::Error;

/// Globaler Result-Alias fuer Plausch
pub type Result<T> = std::result::Result<T, PlauschError>;

/// Alle moeglichen Fehler im Plausch-Hub
#[derive(Debug, Error)]
pub enum PlauschError {
    // --- Sitzungen ---
    #[error("Sitzung nicht gefunden: {0}")]
    SitzungNichtGefunden(String),

    #[error("Verbindung hat bereits eine Sitzung: {0}")]
    DoppelteVerbindung(String),

    #[error("Server voll: maximale Sitzungsanzahl erreicht")]
    ServerVoll,

    // --- Kanaele ---
    #[error("Kanal nicht gefunden: {0}")]
    KanalNichtGefunden(String),

    #[error("Ungueltiger Kanalname: {0}")]
    UngueltigerName(String),

    #[error("Voice-Kanal bereits aktiv: {0}")]
    VoiceBereitsAktiv(String),

    #[error("Falsche Kanal-Art: {0}")]
    FalscheKanalArt(String),

    // --- Signalisierung ---
    #[error("Signal-Ziel nicht gefunden: {0}")]
    ZielNichtGefunden(String),

    #[error("Signal an die eigene Sitzung ist nicht erlaubt")]
    SelbstAdressiert,

    // --- Protokoll ---
    #[error("Ungueltige Payload: {0}")]
    UngueltigePayload(String),

    // --- Transport & Intern ---
    #[error("E/A-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl PlauschError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Gibt true zurueck wenn der Fehler durch Client-Eingaben verursacht
    /// wurde und nicht auf ein Serverproblem hindeutet
    pub fn ist_client_fehler(&self) -> bool {
        !matches!(self, Self::Io(_) | Self::Intern(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fehler_anzeige() {
        let e = PlauschError::KanalNichtGefunden("channel:abc".into());
        assert_eq!(e.to_string(), "Kanal nicht gefunden: channel:abc");
    }

    #[test]
    fn client_fehler_erkennung() {
        assert!(PlauschError::SelbstAdressiert.ist_client_fehler());
        assert!(PlauschError::UngueltigerName("".into()).ist_client_fehler());
        assert!(!PlauschError::intern("kaputt").ist_client_fehler());
    }

    #[test]
    fn io_fehler_konvertierung() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "weg");
        let e: PlauschError = io.into();
        assert!(!e.ist_client_fehler());
        assert!(e.to_string().starts_with("E/A-Fehler"));
    }
}
