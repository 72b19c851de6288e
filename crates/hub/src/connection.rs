//! Client-Connection – verwaltet eine einzelne TCP-Verbindung
//!
//! Jede Verbindung laeuft in einem eigenen tokio-Task: Frames lesen,
//! an den Dispatcher geben, Antworten und Broadcasts zurueckschreiben.
//! Die Send-Queue des Broadcasters wird beim `join` in den Kontext
//! eingehaengt und ab dann hier konsumiert.
//!
//! ## Keepalive
//! - Der Hub sendet alle `keepalive_sek` einen Ping
//! - Ein Client der laenger als `verbindungs_timeout_sek` schweigt wird
//!   getrennt

use futures_util::{SinkExt, StreamExt};
use plausch_protocol::events::{ErrorCode, HubMessage};
use plausch_protocol::wire::FrameCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_util::codec::Framed;

use crate::dispatcher::{DispatcherContext, MessageDispatcher};
use crate::state::HubState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an den `MessageDispatcher`
/// und sendet Antworten zurueck. Laeuft in einem eigenen tokio-Task.
pub struct ClientConnection {
    state: Arc<HubState>,
    peer_addr: SocketAddr,
}

impl ClientConnection {
    /// Erstellt eine neue ClientConnection
    pub fn neu(state: Arc<HubState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung endet oder ein Shutdown-Signal eingeht.
    pub async fn verarbeiten(self, stream: TcpStream, mut shutdown_rx: watch::Receiver<bool>) {
        let peer_addr = self.peer_addr;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let mut framed = Framed::new(stream, FrameCodec::new());
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));
        let mut ctx = DispatcherContext::neu(peer_addr);

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;
        let mut ping_request_id: u32 = 0;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(peer = %peer_addr, "Verbindungs-Timeout");
                break;
            }

            // Naechsten Ping-Zeitpunkt berechnen
            let ping_verzoegerung = if jetzt < naechster_ping {
                naechster_ping.duration_since(jetzt)
            } else {
                Duration::from_millis(1)
            };

            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            letzter_empfang = Instant::now();
                            tracing::trace!(
                                peer = %peer_addr,
                                request_id = nachricht.request_id,
                                "Nachricht empfangen"
                            );

                            if let Some(antwort) = dispatcher.dispatch(nachricht, &mut ctx) {
                                if let Err(fehler) = framed.send(antwort).await {
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        fehler = %fehler,
                                        "Senden fehlgeschlagen"
                                    );
                                    break;
                                }
                            }

                            if ctx.trennung_angefordert {
                                tracing::info!(peer = %peer_addr, "Verbindung regulaer beendet");
                                break;
                            }
                        }
                        Some(Err(fehler)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %fehler,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Broadcast aus der Send-Queue (erst nach dem join aktiv)
                ausgehend = queue_empfangen(&mut ctx.outbound_rx) => {
                    match ausgehend {
                        Some(nachricht) => {
                            if let Err(fehler) = framed.send(nachricht).await {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    fehler = %fehler,
                                    "Broadcast-Senden fehlgeschlagen"
                                );
                                break;
                            }
                        }
                        // Queue serverseitig entfernt
                        None => break,
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    if jetzt >= naechster_ping {
                        ping_request_id = ping_request_id.wrapping_add(1);
                        let ts = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;
                        let ping = HubMessage::ping(ping_request_id, ts);

                        if let Err(fehler) = framed.send(ping).await {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %fehler,
                                "Ping-Senden fehlgeschlagen"
                            );
                            break;
                        }
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        let abschied = HubMessage::error(
                            0,
                            ErrorCode::InternalError,
                            "Hub wird heruntergefahren",
                        );
                        let _ = framed.send(abschied).await;
                        break;
                    }
                }
            }
        }

        // Cleanup beim Verbindungsende; Transport-Close und explizites
        // disconnect duerfen sich ueberholen, der Cleanup laeuft einmal
        if let Some(session_id) = ctx.session_id.take() {
            dispatcher.client_cleanup(session_id);
        }

        tracing::info!(peer = %peer_addr, "Verbindungs-Task beendet");
    }
}

/// Liest aus der Send-Queue sobald sie existiert
///
/// Vor dem `join` gibt es keine Queue; der Zweig bleibt dann dauerhaft
/// anhaengig und der select laeuft ueber die anderen Zweige.
async fn queue_empfangen(rx: &mut Option<mpsc::Receiver<HubMessage>>) -> Option<HubMessage> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
