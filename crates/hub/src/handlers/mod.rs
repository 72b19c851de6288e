//! Handler fuer eingehende Hub-Events
//!
//! Jeder Handler ist eine freie Funktion die vom MessageDispatcher
//! aufgerufen wird und die Antwort (falls vorhanden) zurueckgibt.
//! Broadcasts an andere Clients verschicken die Handler selbst ueber
//! den EventBroadcaster.

pub mod channel_handler;
pub mod chat_handler;
pub mod session_handler;
pub mod signal_handler;

use plausch_protocol::events::{ChannelInfo, MessageInfo, UserInfo};

use crate::directory::Kanal;
use crate::history::Nachricht;
use crate::registry::Sitzung;

/// Wandelt eine Sitzung in ihre oeffentliche Draht-Form
pub(crate) fn user_info(sitzung: &Sitzung) -> UserInfo {
    UserInfo {
        session_id: sitzung.session_id,
        display_name: sitzung.display_name.clone(),
        avatar: sitzung.avatar.clone(),
        online: sitzung.praesenz.ist_online(),
    }
}

/// Wandelt einen Kanal-Schnappschuss in seine Draht-Form
pub(crate) fn channel_info(kanal: &Kanal) -> ChannelInfo {
    ChannelInfo {
        channel_id: kanal.channel_id,
        name: kanal.name.clone(),
        kind: kanal.art,
        member_count: kanal.mitglieder.len() as u32,
    }
}

/// Wandelt eine Log-Nachricht in ihre Draht-Form
pub(crate) fn nachricht_info(nachricht: &Nachricht) -> MessageInfo {
    MessageInfo {
        message_id: nachricht.message_id,
        channel_id: nachricht.channel_id,
        sender_id: nachricht.autor.sitzung(),
        sender_name: nachricht.autor_name.clone(),
        content: nachricht.inhalt.clone(),
        kind: nachricht.art,
        timestamp: nachricht.zeitstempel,
    }
}
