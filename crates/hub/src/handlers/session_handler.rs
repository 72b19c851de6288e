//! Session-Handler – Anmeldung neuer Sitzungen
//!
//! `join` registriert die Sitzung, setzt sie in den Standard-Kanal und
//! kuendigt sie allen anderen Clients an. Die Antwort an den Joiner
//! enthaelt die Online-Liste ohne ihn selbst sowie die juengste Historie
//! des Standard-Kanals.

use plausch_core::types::{ConnectionId, SessionId};
use plausch_protocol::events::{
    HubMessage, HubPayload, JoinRequest, JoinResponse, UserInfo, UserJoinedEvent,
};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::handlers::{nachricht_info, user_info};
use crate::state::HubState;

/// Ergebnis einer erfolgreichen Anmeldung fuer die Verbindungs-Task
pub type Angemeldet = (SessionId, mpsc::Receiver<HubMessage>);

/// Verarbeitet die Anmeldung einer neuen Sitzung
///
/// Gibt neben der Antwort die Empfangsseite der Send-Queue zurueck,
/// die die Verbindungs-Task ab jetzt konsumiert.
pub fn handle_join(
    request: JoinRequest,
    request_id: u32,
    verbindung: ConnectionId,
    state: &Arc<HubState>,
) -> (HubMessage, Option<Angemeldet>) {
    let sitzung = match state
        .register
        .registrieren(verbindung, &request.display_name, request.avatar)
    {
        Ok(s) => s,
        Err(fehler) => {
            tracing::warn!(verbindung = %verbindung, fehler = %fehler, "Anmeldung abgelehnt");
            return (HubMessage::error_from(request_id, &fehler), None);
        }
    };
    let session_id = sitzung.session_id;

    // Queue registrieren bevor irgendein Broadcast laufen kann
    let rx = state.broadcaster.client_registrieren(session_id);

    // In den Standard-Kanal setzen
    let kanal_id = state.standard_kanal.and_then(|kanal_id| {
        match state.verzeichnis.beitreten(kanal_id, session_id) {
            Ok(_) => Some(kanal_id),
            Err(fehler) => {
                tracing::warn!(
                    kanal = %kanal_id,
                    fehler = %fehler,
                    "Beitritt zum Standard-Kanal fehlgeschlagen"
                );
                None
            }
        }
    });

    // Ein Schnappschuss fuer beide Listen, damit sie konsistent sind
    let online = state.register.alle_online();
    let andere: Vec<UserInfo> = online
        .iter()
        .filter(|s| s.session_id != session_id)
        .map(user_info)
        .collect();
    let alle: Vec<UserInfo> = online.iter().map(user_info).collect();

    // Juengste Historie des Standard-Kanals, aelteste zuerst
    let historie = kanal_id
        .and_then(|k| state.nachrichten.letzte(k, state.nachrichten.kapazitaet()).ok())
        .unwrap_or_default();

    // Alle anderen ueber den Neuzugang informieren
    let ankuendigung = HubMessage::broadcast(HubPayload::UserJoined(UserJoinedEvent {
        user: user_info(&sitzung),
        online_users: alle,
    }));
    state.broadcaster.an_alle_ausser_senden(session_id, &ankuendigung);

    tracing::info!(
        sitzung = %session_id,
        name = %sitzung.display_name,
        online = online.len(),
        "Sitzung angemeldet"
    );

    let antwort = HubMessage::new(
        request_id,
        HubPayload::JoinResponse(JoinResponse {
            session_id,
            channel_id: kanal_id,
            online_users: andere,
            recent_messages: historie.iter().map(nachricht_info).collect(),
        }),
    );
    (antwort, Some((session_id, rx)))
}
