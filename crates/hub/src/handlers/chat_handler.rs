//! Chat-Handler – Nachrichten anhaengen und an Kanal-Mitglieder verteilen
//!
//! Der Fan-Out laeuft unter dem Anhaenge-Lock des Kanals, damit alle
//! Mitglieder Nachrichten in derselben Reihenfolge beobachten. Erfolg
//! wird nicht quittiert: der Absender sieht seine eigene Nachricht wie
//! jedes andere Mitglied ueber den `new_message`-Broadcast.

use plausch_core::types::SessionId;
use plausch_protocol::events::{
    ErrorCode, HubMessage, HubPayload, MessageKind, NewMessageEvent, SendMessageRequest,
};
use std::sync::Arc;

use crate::handlers::nachricht_info;
use crate::history::Autor;
use crate::state::HubState;

/// Verarbeitet eine Chat-Nachricht
pub fn handle_send_message(
    request: SendMessageRequest,
    request_id: u32,
    session_id: SessionId,
    state: &Arc<HubState>,
) -> Option<HubMessage> {
    let art = request.kind.unwrap_or(MessageKind::Text);
    if art == MessageKind::System {
        return Some(HubMessage::error(
            request_id,
            ErrorCode::InvalidPayload,
            "system-Nachrichten sind dem Hub vorbehalten",
        ));
    }

    // Ziel-Kanal: explizit angegeben oder der aktive Text-Kanal des Senders
    let kanal_id = match request.channel_id {
        Some(kanal_id) => kanal_id,
        None => match state.register.nachschlagen(session_id) {
            Ok(sitzung) => match sitzung.text_kanal {
                Some(kanal_id) => kanal_id,
                None => {
                    return Some(HubMessage::error(
                        request_id,
                        ErrorCode::ChannelNotFound,
                        "Kein Ziel-Kanal angegeben und kein aktiver Text-Kanal",
                    ));
                }
            },
            Err(fehler) => return Some(HubMessage::error_from(request_id, &fehler)),
        },
    };

    let mut zugestellt = 0;
    let ergebnis = state.nachrichten.anhaengen_mit(
        kanal_id,
        Autor::Sitzung(session_id),
        request.content,
        art,
        |nachricht| {
            // Mitglieder unter dem Anhaenge-Lock aufloesen und einreihen
            let event = HubMessage::broadcast(HubPayload::NewMessage(NewMessageEvent {
                message: nachricht_info(nachricht),
            }));
            if let Ok(mitglieder) = state.verzeichnis.mitglieder(kanal_id) {
                zugestellt = state.broadcaster.an_mehrere_senden(&mitglieder, &event);
            }
        },
    );

    match ergebnis {
        Ok(nachricht) => {
            tracing::debug!(
                sitzung = %session_id,
                kanal = %kanal_id,
                nachricht = %nachricht.message_id,
                zugestellt,
                "Nachricht verteilt"
            );
            None
        }
        Err(fehler) => {
            tracing::debug!(sitzung = %session_id, fehler = %fehler, "Nachricht abgelehnt");
            Some(HubMessage::error_from(request_id, &fehler))
        }
    }
}
