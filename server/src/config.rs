//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use plausch_hub::HubConfig;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServerConfig {
    /// Allgemeine Hub-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Keepalive-Einstellungen
    pub keepalive: KeepaliveEinstellungen,
    /// Nachrichtenverlauf-Einstellungen
    pub verlauf: VerlaufEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Allgemeine Hub-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Hubs
    pub name: String,
    /// Maximale Anzahl gleichzeitiger Sitzungen
    pub max_sitzungen: u32,
    /// Willkommensnachricht fuer die Status-API (optional)
    pub willkommen: Option<String>,
    /// Name des beim Start angelegten Text-Kanals (leer = keiner)
    pub standard_kanal: String,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "Plausch Hub".into(),
            max_sitzungen: 512,
            willkommen: None,
            standard_kanal: "general".into(),
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer alle Listener
    pub bind_adresse: String,
    /// Port fuer die Status-API (HTTP)
    pub http_port: u16,
    /// Port fuer das Hub-Protokoll (TCP)
    pub hub_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            http_port: 3000,
            hub_port: 3001,
        }
    }
}

/// Keepalive-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveEinstellungen {
    /// Ping-Intervall fuer stille Verbindungen in Sekunden
    pub ping_intervall_sek: u64,
    /// Timeout bevor eine stumme Verbindung geschlossen wird, in Sekunden
    pub timeout_sek: u64,
}

impl Default for KeepaliveEinstellungen {
    fn default() -> Self {
        Self {
            ping_intervall_sek: 30,
            timeout_sek: 90,
        }
    }
}

/// Nachrichtenverlauf-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerlaufEinstellungen {
    /// Ringpuffer-Kapazitaet pro Kanal
    pub kapazitaet: usize,
}

impl Default for VerlaufEinstellungen {
    fn default() -> Self {
        Self { kapazitaet: 100 }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Gibt die vollstaendige Bind-Adresse fuer das Hub-Protokoll zurueck
    pub fn hub_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.hub_port)
    }

    /// Gibt die vollstaendige Bind-Adresse fuer die Status-API zurueck
    pub fn http_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.http_port)
    }

    /// Uebersetzt die Server-Konfiguration in die Hub-Konfiguration
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            hub_name: self.server.name.clone(),
            willkommensnachricht: self.server.willkommen.clone(),
            max_sitzungen: self.server.max_sitzungen,
            standard_kanal: self.server.standard_kanal.clone(),
            verlauf_kapazitaet: self.verlauf.kapazitaet,
            keepalive_sek: self.keepalive.ping_intervall_sek,
            verbindungs_timeout_sek: self.keepalive.timeout_sek,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_sitzungen, 512);
        assert_eq!(cfg.server.standard_kanal, "general");
        assert_eq!(cfg.netzwerk.http_port, 3000);
        assert_eq!(cfg.netzwerk.hub_port, 3001);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.hub_bind_adresse(), "0.0.0.0:3001");
        assert_eq!(cfg.http_bind_adresse(), "0.0.0.0:3000");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "Mein Hub"
            max_sitzungen = 100

            [netzwerk]
            hub_port = 10000
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "Mein Hub");
        assert_eq!(cfg.server.max_sitzungen, 100);
        assert_eq!(cfg.netzwerk.hub_port, 10000);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.netzwerk.http_port, 3000);
        assert_eq!(cfg.verlauf.kapazitaet, 100);
    }

    #[test]
    fn hub_config_uebernimmt_die_einstellungen() {
        let mut cfg = ServerConfig::default();
        cfg.server.name = "Testhub".into();
        cfg.server.willkommen = Some("Moin".into());
        cfg.verlauf.kapazitaet = 25;
        cfg.keepalive.timeout_sek = 120;

        let hub = cfg.hub_config();
        assert_eq!(hub.hub_name, "Testhub");
        assert_eq!(hub.willkommensnachricht.as_deref(), Some("Moin"));
        assert_eq!(hub.verlauf_kapazitaet, 25);
        assert_eq!(hub.verbindungs_timeout_sek, 120);
        assert_eq!(hub.keepalive_sek, 30);
    }
}
