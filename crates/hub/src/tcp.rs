//! TCP-Listener – bindet den Socket und akzeptiert Verbindungen
//!
//! Der `HubServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer
//! `ClientConnection`. Ueberzaehlige Verbindungen werden vor der
//! Registrierung mit `SERVER_FULL` abgewiesen.

use futures_util::SinkExt;
use plausch_core::error::PlauschError;
use plausch_protocol::events::HubMessage;
use plausch_protocol::wire::FrameCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::codec::Framed;

use crate::connection::ClientConnection;
use crate::state::HubState;

/// TCP-Hub-Server
///
/// Bindet einen TCP-Socket und akzeptiert Verbindungen in einer Loop.
pub struct HubServer {
    state: Arc<HubState>,
    bind_addr: SocketAddr,
}

impl HubServer {
    /// Erstellt einen neuen HubServer
    pub fn neu(state: Arc<HubState>, bind_addr: SocketAddr) -> Self {
        Self { state, bind_addr }
    }

    /// Startet den TCP-Listener und akzeptiert Verbindungen
    ///
    /// Laeuft bis `shutdown_rx` ein `true`-Signal empfaengt.
    pub async fn starten(
        self,
        mut shutdown_rx: watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        let lokale_addr = listener.local_addr()?;

        tracing::info!(adresse = %lokale_addr, "TCP-Hub gestartet");

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            // Sitzungs-Limit vor der Registrierung pruefen
                            let online = self.state.register.anzahl() as u32;
                            if online >= self.state.config.max_sitzungen {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_sitzungen,
                                    "Hub voll – Verbindung abgewiesen"
                                );
                                abweisen(stream);
                                continue;
                            }

                            tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                            let verbindung = ClientConnection::neu(
                                Arc::clone(&self.state),
                                peer_addr,
                            );
                            let shutdown_rx_clone = shutdown_rx.clone();

                            tokio::spawn(async move {
                                verbindung.verarbeiten(stream, shutdown_rx_clone).await;
                            });
                        }
                        Err(fehler) => {
                            tracing::error!(fehler = %fehler, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Hub: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP-Hub gestoppt");
        Ok(())
    }

    /// Gibt die Bind-Adresse zurueck
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }
}

/// Weist eine ueberzaehlige Verbindung mit einem Fehler-Frame ab
fn abweisen(stream: TcpStream) {
    tokio::spawn(async move {
        let mut framed = Framed::new(stream, FrameCodec::new());
        let fehler = HubMessage::error_from(0, &PlauschError::ServerVoll);
        let _ = tokio::time::timeout(Duration::from_secs(1), framed.send(fehler)).await;
    });
}
