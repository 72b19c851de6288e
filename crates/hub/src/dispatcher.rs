//! Message-Dispatcher – routet Hub-Nachrichten an die richtigen Handler
//!
//! Der Dispatcher empfaengt HubMessages von einer ClientConnection,
//! bestimmt den richtigen Handler und gibt die Antwort zurueck.
//!
//! ## Zustandspruefung
//! `join` muss das erste Event jeder Verbindung sein. Alle anderen
//! Anfragen vor der Anmeldung werden mit `SESSION_NOT_FOUND` abgelehnt;
//! `ping`/`pong` und `disconnect` sind immer erlaubt.

use plausch_core::types::{ConnectionId, SessionId};
use plausch_protocol::events::{
    ErrorCode, HubMessage, HubPayload, NewMessageEvent, SignalKind, UserOfflineEvent,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::handlers::{
    channel_handler, chat_handler, nachricht_info, session_handler, signal_handler,
};
use crate::state::HubState;

// ---------------------------------------------------------------------------
// DispatcherContext
// ---------------------------------------------------------------------------

/// Dispatcher-Kontext – Zustand der aktuellen Verbindung
pub struct DispatcherContext {
    /// Peer-Adresse fuer Logging
    pub peer_addr: SocketAddr,
    /// Transport-Kennung der Verbindung (vergeben beim Accept)
    pub verbindung: ConnectionId,
    /// Angemeldete Sitzung (None vor dem `join`)
    pub session_id: Option<SessionId>,
    /// Empfangsseite der Send-Queue; der join-Handler setzt sie ein,
    /// die Verbindungs-Task nimmt sie nach dem Dispatch heraus
    pub outbound_rx: Option<mpsc::Receiver<HubMessage>>,
    /// Client hat die Verbindung regulaer beendet
    pub trennung_angefordert: bool,
}

impl DispatcherContext {
    pub fn neu(peer_addr: SocketAddr) -> Self {
        Self {
            peer_addr,
            verbindung: ConnectionId::new(),
            session_id: None,
            outbound_rx: None,
            trennung_angefordert: false,
        }
    }
}

// ---------------------------------------------------------------------------
// MessageDispatcher
// ---------------------------------------------------------------------------

/// Zentraler Message-Dispatcher
///
/// Routet eingehende HubMessages an die entsprechenden Handler und
/// gibt die Antwort-HubMessage zurueck.
pub struct MessageDispatcher {
    state: Arc<HubState>,
}

impl MessageDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<HubState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende Nachricht und gibt die Antwort zurueck
    ///
    /// Gibt `None` zurueck wenn keine Antwort gesendet werden soll
    /// (stille Erfolge; Broadcasts laufen ueber die Send-Queue).
    pub fn dispatch(&self, message: HubMessage, ctx: &mut DispatcherContext) -> Option<HubMessage> {
        let request_id = message.request_id;

        match message.payload {
            // ---------------------------------------------------------------
            // Anmeldung (genau einmal pro Verbindung)
            // ---------------------------------------------------------------
            HubPayload::Join(req) => {
                if ctx.session_id.is_some() {
                    return Some(HubMessage::error(
                        request_id,
                        ErrorCode::DuplicateConnection,
                        "Verbindung hat bereits eine Sitzung",
                    ));
                }

                let (antwort, angemeldet) =
                    session_handler::handle_join(req, request_id, ctx.verbindung, &self.state);

                if let Some((session_id, rx)) = angemeldet {
                    ctx.session_id = Some(session_id);
                    ctx.outbound_rx = Some(rx);
                    tracing::debug!(
                        sitzung = %session_id,
                        peer = %ctx.peer_addr,
                        "Verbindung angemeldet"
                    );
                }

                Some(antwort)
            }

            // ---------------------------------------------------------------
            // Keepalive (immer erlaubt)
            // ---------------------------------------------------------------
            HubPayload::Ping(ping) => {
                let server_ts = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_millis() as u64;
                Some(HubMessage::pong(request_id, ping.timestamp_ms, server_ts))
            }

            HubPayload::Pong(_) => {
                tracing::trace!("Pong empfangen (RTT-Messung)");
                None
            }

            // ---------------------------------------------------------------
            // Regulaeres Verbindungsende (immer erlaubt)
            // ---------------------------------------------------------------
            HubPayload::Disconnect => {
                if let Some(session_id) = ctx.session_id.take() {
                    self.client_cleanup(session_id);
                }
                ctx.trennung_angefordert = true;
                None
            }

            // ---------------------------------------------------------------
            // Alles andere verlangt eine angemeldete Sitzung
            // ---------------------------------------------------------------
            payload => {
                let session_id = match ctx.session_id {
                    Some(id) => id,
                    None => {
                        return Some(HubMessage::error(
                            request_id,
                            ErrorCode::SessionNotFound,
                            "Nicht angemeldet – zuerst join senden",
                        ));
                    }
                };

                self.dispatch_angemeldet(payload, request_id, session_id)
            }
        }
    }

    /// Routet Nachrichten die eine angemeldete Sitzung erfordern
    fn dispatch_angemeldet(
        &self,
        payload: HubPayload,
        request_id: u32,
        session_id: SessionId,
    ) -> Option<HubMessage> {
        match payload {
            // ---------------------------------------------------------------
            // Chat
            // ---------------------------------------------------------------
            HubPayload::SendMessage(req) => {
                chat_handler::handle_send_message(req, request_id, session_id, &self.state)
            }

            // ---------------------------------------------------------------
            // Kanaele
            // ---------------------------------------------------------------
            HubPayload::CreateRoom(req) => Some(channel_handler::handle_create_room(
                req,
                request_id,
                session_id,
                &self.state,
            )),

            HubPayload::SwitchChannel(req) => Some(channel_handler::handle_switch_channel(
                req,
                request_id,
                session_id,
                &self.state,
            )),

            // ---------------------------------------------------------------
            // Voice-Mitgliedschaft
            // ---------------------------------------------------------------
            HubPayload::JoinVoice(req) => {
                channel_handler::handle_join_voice(req, request_id, session_id, &self.state)
            }

            HubPayload::LeaveVoice => {
                channel_handler::handle_leave_voice(request_id, session_id, &self.state)
            }

            // ---------------------------------------------------------------
            // WebRTC-Signalisierung
            // ---------------------------------------------------------------
            HubPayload::WebrtcOffer(req) => {
                signal_handler::handle_signal(req, SignalKind::Offer, session_id, &self.state)
            }

            HubPayload::WebrtcAnswer(req) => {
                signal_handler::handle_signal(req, SignalKind::Answer, session_id, &self.state)
            }

            HubPayload::WebrtcIceCandidate(req) => signal_handler::handle_signal(
                req,
                SignalKind::IceCandidate,
                session_id,
                &self.state,
            ),

            // ---------------------------------------------------------------
            // Unerwartete Hub->Client-Nachrichten
            // ---------------------------------------------------------------
            HubPayload::JoinResponse(_)
            | HubPayload::CreateRoomResponse(_)
            | HubPayload::SwitchChannelResponse(_)
            | HubPayload::UserJoined(_)
            | HubPayload::UserOffline(_)
            | HubPayload::NewMessage(_)
            | HubPayload::RoomCreated(_)
            | HubPayload::VoiceUpdate(_)
            | HubPayload::WebrtcForward(_)
            | HubPayload::Error(_) => {
                tracing::warn!(
                    sitzung = %session_id,
                    request_id,
                    "Unerwartete Hub->Client Nachricht vom Client empfangen"
                );
                Some(HubMessage::error(
                    request_id,
                    ErrorCode::InvalidPayload,
                    "Unerwartete Nachricht",
                ))
            }

            // Oben bereits behandelt
            HubPayload::Join(_)
            | HubPayload::Ping(_)
            | HubPayload::Pong(_)
            | HubPayload::Disconnect => None,
        }
    }

    /// Bereinigt alle Ressourcen einer Sitzung beim Trennen
    ///
    /// Transport-Close und explizites `disconnect` duerfen sich ueberholen:
    /// der zweite Aufruf findet keine Sitzung mehr vor und tut nichts.
    pub fn client_cleanup(&self, session_id: SessionId) {
        let sitzung = match self.state.register.entfernen(session_id) {
            Some(s) => s,
            None => return,
        };

        self.state.broadcaster.client_entfernen(session_id);
        self.state.verzeichnis.mitgliedschaften_entfernen(&sitzung);

        // Abschiedshinweis in den letzten aktiven Text-Kanal
        if let Some(kanal_id) = sitzung.text_kanal {
            let inhalt = format!("{} left", sitzung.display_name);
            let ergebnis = self
                .state
                .nachrichten
                .system_notiz_mit(kanal_id, inhalt, |nachricht| {
                    let event = HubMessage::broadcast(HubPayload::NewMessage(NewMessageEvent {
                        message: nachricht_info(nachricht),
                    }));
                    if let Ok(mitglieder) = self.state.verzeichnis.mitglieder(kanal_id) {
                        self.state.broadcaster.an_mehrere_senden(&mitglieder, &event);
                    }
                });
            if let Err(fehler) = ergebnis {
                tracing::warn!(
                    kanal = %kanal_id,
                    fehler = %fehler,
                    "Abschiedshinweis fehlgeschlagen"
                );
            }
        }

        // user_offline an alle verbleibenden Clients, danach erst ist die
        // Trennung nach aussen sichtbar abgeschlossen
        let offline =
            HubMessage::broadcast(HubPayload::UserOffline(UserOfflineEvent { session_id }));
        self.state.broadcaster.an_alle_senden(&offline);

        tracing::info!(
            sitzung = %session_id,
            name = %sitzung.display_name,
            "Sitzung getrennt"
        );
    }
}
