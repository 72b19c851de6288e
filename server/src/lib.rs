//! plausch-server – Bibliotheks-Root
//!
//! Verdrahtet Hub-Kern, TCP-Listener und Status-API und stellt den
//! Einstiegspunkt fuer das Binary bereit.

pub mod config;
pub mod status;

use anyhow::{Context, Result};
use config::ServerConfig;
use plausch_hub::{HubServer, HubState};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet alle Server-Subsysteme und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Hub-Zustand aufbauen (Standard-Kanal wird dabei angelegt)
    /// 2. TCP-Listener starten (Hub-Protokoll)
    /// 3. Status-API starten (HTTP)
    /// 4. Auf Ctrl-C warten, dann beide Flaechen herunterfahren
    pub async fn starten(self) -> Result<()> {
        let hub_addr: SocketAddr = self
            .config
            .hub_bind_adresse()
            .parse()
            .context("Ungueltige Hub-Bind-Adresse")?;
        let http_addr: SocketAddr = self
            .config
            .http_bind_adresse()
            .parse()
            .context("Ungueltige HTTP-Bind-Adresse")?;

        tracing::info!(
            hub_name = %self.config.server.name,
            tcp = %hub_addr,
            http = %http_addr,
            "Server startet"
        );

        let state = HubState::neu(self.config.hub_config())?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let hub_server = HubServer::neu(Arc::clone(&state), hub_addr);
        let hub_task = tokio::spawn({
            let shutdown_rx = shutdown_rx.clone();
            async move {
                if let Err(fehler) = hub_server.starten(shutdown_rx).await {
                    tracing::error!(fehler = %fehler, "TCP-Hub beendet sich mit Fehler");
                }
            }
        });

        let status_task = tokio::spawn({
            let state = Arc::clone(&state);
            let shutdown_rx = shutdown_rx.clone();
            async move {
                if let Err(fehler) = status::starten(http_addr, state, shutdown_rx).await {
                    tracing::error!(fehler = %fehler, "Status-API beendet sich mit Fehler");
                }
            }
        });

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);
        let _ = tokio::time::timeout(Duration::from_secs(5), hub_task).await;
        let _ = tokio::time::timeout(Duration::from_secs(5), status_task).await;

        tracing::info!(
            sitzungen = state.register.anzahl(),
            uptime_sek = state.uptime_sek(),
            "Server beendet"
        );
        Ok(())
    }
}
