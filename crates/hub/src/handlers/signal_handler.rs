//! Signal-Handler – WebRTC-Signale an die Ziel-Sitzung weiterleiten
//!
//! Offer, Answer und ICE-Kandidaten laufen alle durch denselben Pfad:
//! Adressierung pruefen, Absenderkennung anheften, unicast zustellen.
//! Fehlgeschlagene Weiterleitungen werden geloggt und verworfen; der
//! Absender bekommt keine Rueckmeldung.

use plausch_core::types::SessionId;
use plausch_protocol::events::{
    HubMessage, HubPayload, SignalForwardEvent, SignalKind, SignalRequest,
};
use std::sync::Arc;

use crate::relay::SignalUmschlag;
use crate::state::HubState;

/// Leitet ein WebRTC-Signal an die Ziel-Sitzung weiter
pub fn handle_signal(
    request: SignalRequest,
    art: SignalKind,
    session_id: SessionId,
    state: &Arc<HubState>,
) -> Option<HubMessage> {
    let umschlag = SignalUmschlag {
        von: session_id,
        an: request.target_session_id,
        art,
        payload: request.payload,
    };

    match state.relay.weiterleiten(&umschlag) {
        Ok(ziel) => {
            let event = HubMessage::broadcast(HubPayload::WebrtcForward(SignalForwardEvent {
                from_session_id: session_id,
                kind: art,
                payload: umschlag.payload,
            }));
            state.broadcaster.an_sitzung_senden(ziel, event);
            None
        }
        Err(fehler) => {
            // Relay-Fehler werden nie an den Absender gemeldet
            tracing::debug!(
                von = %session_id,
                an = %umschlag.an,
                art = ?art,
                fehler = %fehler,
                "Signal verworfen"
            );
            None
        }
    }
}
