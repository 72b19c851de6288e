//! Channel-Handler – Kanaele erstellen, Text-Kanal wechseln, Voice-Mitgliedschaft
//!
//! Text-Kanaele folgen der Ein-Kanal-Regel (Beitritt verlaesst den alten
//! Kanal implizit), Voice-Kanaele verlangen ein explizites `leave_voice`.
//! Voice-Aenderungen werden als `voice_update` an alle Clients verteilt.

use plausch_core::error::PlauschError;
use plausch_core::types::{ChannelId, SessionId};
use plausch_protocol::events::{
    ChannelKind, CreateRoomRequest, CreateRoomResponse, HubMessage, HubPayload, JoinVoiceRequest,
    RoomCreatedEvent, SwitchChannelRequest, SwitchChannelResponse, VoiceAction, VoiceUpdateEvent,
};
use std::sync::Arc;

use crate::handlers::{channel_info, nachricht_info};
use crate::state::HubState;

/// Verarbeitet die Erstellung eines Kanals
pub fn handle_create_room(
    request: CreateRoomRequest,
    request_id: u32,
    session_id: SessionId,
    state: &Arc<HubState>,
) -> HubMessage {
    let art = request.kind.unwrap_or(ChannelKind::Text);

    let kanal_id = match state.verzeichnis.kanal_erstellen(&request.name, art, session_id) {
        Ok(id) => id,
        Err(fehler) => {
            tracing::debug!(sitzung = %session_id, fehler = %fehler, "Kanal-Erstellung abgelehnt");
            return HubMessage::error_from(request_id, &fehler);
        }
    };

    // Alle Clients ueber den neuen Kanal informieren
    if let Ok(kanal) = state.verzeichnis.kanal_info(kanal_id) {
        let event = HubMessage::broadcast(HubPayload::RoomCreated(RoomCreatedEvent {
            channel: channel_info(&kanal),
        }));
        state.broadcaster.an_alle_senden(&event);
    }

    tracing::info!(
        sitzung = %session_id,
        kanal = %kanal_id,
        name = %request.name,
        art = ?art,
        "Kanal erstellt"
    );

    HubMessage::new(
        request_id,
        HubPayload::CreateRoomResponse(CreateRoomResponse {
            channel_id: kanal_id,
        }),
    )
}

/// Verarbeitet einen Text-Kanal-Wechsel
pub fn handle_switch_channel(
    request: SwitchChannelRequest,
    request_id: u32,
    session_id: SessionId,
    state: &Arc<HubState>,
) -> HubMessage {
    let kanal_id = request.channel_id;

    match state.verzeichnis.art_von(kanal_id) {
        Ok(ChannelKind::Text) => {}
        Ok(ChannelKind::Voice) => {
            return HubMessage::error_from(
                request_id,
                &PlauschError::FalscheKanalArt(format!("Kanal {} ist kein Text-Kanal", kanal_id)),
            );
        }
        Err(fehler) => return HubMessage::error_from(request_id, &fehler),
    }

    if let Err(fehler) = state.verzeichnis.beitreten(kanal_id, session_id) {
        return HubMessage::error_from(request_id, &fehler);
    }

    let historie = match state.nachrichten.letzte(kanal_id, state.nachrichten.kapazitaet()) {
        Ok(h) => h,
        Err(fehler) => return HubMessage::error_from(request_id, &fehler),
    };

    tracing::debug!(sitzung = %session_id, kanal = %kanal_id, "Text-Kanal gewechselt");

    HubMessage::new(
        request_id,
        HubPayload::SwitchChannelResponse(SwitchChannelResponse {
            channel_id: kanal_id,
            recent_messages: historie.iter().map(nachricht_info).collect(),
        }),
    )
}

/// Verarbeitet einen Voice-Kanal-Beitritt
pub fn handle_join_voice(
    request: JoinVoiceRequest,
    request_id: u32,
    session_id: SessionId,
    state: &Arc<HubState>,
) -> Option<HubMessage> {
    let kanal_id = request.channel_id;

    match state.verzeichnis.art_von(kanal_id) {
        Ok(ChannelKind::Voice) => {}
        Ok(ChannelKind::Text) => {
            return Some(HubMessage::error_from(
                request_id,
                &PlauschError::FalscheKanalArt(format!("Kanal {} ist kein Voice-Kanal", kanal_id)),
            ));
        }
        Err(fehler) => return Some(HubMessage::error_from(request_id, &fehler)),
    }

    match state.verzeichnis.beitreten(kanal_id, session_id) {
        // Erneuter Beitritt in denselben Kanal loest keinen Broadcast aus
        Ok(true) => {
            voice_update_senden(state, kanal_id, session_id, VoiceAction::Joined);
            None
        }
        Ok(false) => None,
        Err(fehler) => Some(HubMessage::error_from(request_id, &fehler)),
    }
}

/// Verarbeitet das Verlassen des aktuellen Voice-Kanals
///
/// Ohne aktiven Voice-Kanal ist das ein stilles No-op.
pub fn handle_leave_voice(
    request_id: u32,
    session_id: SessionId,
    state: &Arc<HubState>,
) -> Option<HubMessage> {
    let sitzung = match state.register.nachschlagen(session_id) {
        Ok(s) => s,
        Err(fehler) => return Some(HubMessage::error_from(request_id, &fehler)),
    };

    let kanal_id = match sitzung.voice_kanal {
        Some(k) => k,
        None => return None,
    };

    match state.verzeichnis.verlassen(kanal_id, session_id) {
        Ok(true) => {
            voice_update_senden(state, kanal_id, session_id, VoiceAction::Left);
            None
        }
        Ok(false) => None,
        Err(fehler) => Some(HubMessage::error_from(request_id, &fehler)),
    }
}

/// Verteilt eine Voice-Mitgliedschaftsaenderung an alle Clients
fn voice_update_senden(
    state: &Arc<HubState>,
    kanal_id: ChannelId,
    session_id: SessionId,
    action: VoiceAction,
) {
    let event = HubMessage::broadcast(HubPayload::VoiceUpdate(VoiceUpdateEvent {
        channel_id: kanal_id,
        session_id,
        action,
    }));
    let empfaenger = state.broadcaster.an_alle_senden(&event);
    tracing::debug!(
        sitzung = %session_id,
        kanal = %kanal_id,
        aktion = ?action,
        empfaenger,
        "Voice-Update verteilt"
    );
}
