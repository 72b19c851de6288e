//! Event-Protokoll des Plausch-Hubs
//!
//! Definiert alle Ereignisse die ueber die persistente TCP-Verbindung
//! zwischen Client und Hub ausgetauscht werden.
//!
//! ## Design
//! - Request/Response Pattern: jede Nachricht hat eine `request_id: u32`,
//!   Antworten spiegeln die ID des Requests, Broadcasts tragen die ID 0
//! - JSON-Serialisierung via serde
//! - Geschlossenes Tagged Enum: unbekannte Event-Typen scheitern bereits
//!   beim Dekodieren, nicht erst zur Laufzeit
//! - Jedes Event hat ein explizites Schema; Client-Objekte werden nie
//!   ungefiltert in Broadcasts uebernommen

use chrono::{DateTime, Utc};
use plausch_core::error::PlauschError;
use plausch_core::types::{ChannelId, MessageId, SessionId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Fehler-Codes
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Codes fuer Error-Responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Allgemein
    InternalError,
    InvalidPayload,
    ServerFull,
    // Sitzungen
    SessionNotFound,
    DuplicateConnection,
    // Kanaele
    ChannelNotFound,
    InvalidName,
    AlreadyInVoice,
    WrongChannelKind,
    // Signalisierung
    TargetNotFound,
    SelfTarget,
}

impl From<&PlauschError> for ErrorCode {
    fn from(fehler: &PlauschError) -> Self {
        match fehler {
            PlauschError::SitzungNichtGefunden(_) => Self::SessionNotFound,
            PlauschError::DoppelteVerbindung(_) => Self::DuplicateConnection,
            PlauschError::ServerVoll => Self::ServerFull,
            PlauschError::KanalNichtGefunden(_) => Self::ChannelNotFound,
            PlauschError::UngueltigerName(_) => Self::InvalidName,
            PlauschError::VoiceBereitsAktiv(_) => Self::AlreadyInVoice,
            PlauschError::FalscheKanalArt(_) => Self::WrongChannelKind,
            PlauschError::ZielNichtGefunden(_) => Self::TargetNotFound,
            PlauschError::SelbstAdressiert => Self::SelfTarget,
            PlauschError::UngueltigePayload(_) => Self::InvalidPayload,
            PlauschError::Io(_) | PlauschError::Intern(_) => Self::InternalError,
        }
    }
}

// ---------------------------------------------------------------------------
// Gemeinsame Enums
// ---------------------------------------------------------------------------

/// Art eines Kanals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Text,
    Voice,
}

/// Art einer Chat-Nachricht
///
/// `System` ist dem Hub vorbehalten; Clients duerfen nur `Text` und
/// `Attachment` senden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    System,
    Attachment,
}

/// Art eines WebRTC-Signals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

/// Richtung einer Voice-Mitgliedschaftsaenderung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceAction {
    Joined,
    Left,
}

// ---------------------------------------------------------------------------
// Info-Strukturen (Hub -> Client)
// ---------------------------------------------------------------------------

/// Oeffentlich sichtbare Sitzungsdaten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub session_id: SessionId,
    pub display_name: String,
    pub avatar: Option<String>,
    pub online: bool,
}

/// Kanal-Informationen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub channel_id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub member_count: u32,
}

/// Eine einzelne Chat-Nachricht auf dem Draht
///
/// `sender_id` ist `None` fuer System-Nachrichten des Hubs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub message_id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: Option<SessionId>,
    pub sender_name: String,
    pub content: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Sitzungs-Nachrichten
// ---------------------------------------------------------------------------

/// Beitrittsanfrage, muss das erste Event jeder Verbindung sein
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Anzeigename (leer faellt serverseitig auf "Gast" zurueck)
    pub display_name: String,
    /// Avatar-Kennung (URL oder Emoji, wird nicht interpretiert)
    pub avatar: Option<String>,
}

/// Erfolgreiche Beitrittsantwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    /// Zugewiesene Sitzungs-ID
    pub session_id: SessionId,
    /// Standard-Kanal in den die Sitzung gesetzt wurde
    pub channel_id: Option<ChannelId>,
    /// Alle anderen Online-Sitzungen in Beitrittsreihenfolge
    pub online_users: Vec<UserInfo>,
    /// Juengste Historie des Standard-Kanals, aelteste zuerst
    pub recent_messages: Vec<MessageInfo>,
}

/// Broadcast: eine neue Sitzung ist online gegangen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJoinedEvent {
    pub user: UserInfo,
    /// Aktualisierte Online-Liste inklusive der neuen Sitzung
    pub online_users: Vec<UserInfo>,
}

/// Broadcast: eine Sitzung ist offline gegangen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOfflineEvent {
    pub session_id: SessionId,
}

// ---------------------------------------------------------------------------
// Chat-Nachrichten
// ---------------------------------------------------------------------------

/// Chat-Nachricht senden
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Ziel-Kanal; ohne Angabe der aktuelle Text-Kanal des Senders
    pub channel_id: Option<ChannelId>,
    pub content: String,
    /// Ohne Angabe `text`; `system` wird abgelehnt
    pub kind: Option<MessageKind>,
}

/// Broadcast: neue Nachricht an alle Kanal-Mitglieder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub message: MessageInfo,
}

// ---------------------------------------------------------------------------
// Kanal-Nachrichten
// ---------------------------------------------------------------------------

/// Kanal erstellen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    /// Ohne Angabe wird ein Text-Kanal angelegt
    pub kind: Option<ChannelKind>,
}

/// Antwort auf Kanal-Erstellung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub channel_id: ChannelId,
}

/// Broadcast: ein Kanal wurde erstellt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedEvent {
    pub channel: ChannelInfo,
}

/// Aktiven Text-Kanal wechseln
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchChannelRequest {
    pub channel_id: ChannelId,
}

/// Antwort auf Kanalwechsel mit der Historie des neuen Kanals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchChannelResponse {
    pub channel_id: ChannelId,
    /// Aelteste zuerst
    pub recent_messages: Vec<MessageInfo>,
}

/// Voice-Kanal beitreten
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinVoiceRequest {
    pub channel_id: ChannelId,
}

/// Broadcast: Voice-Mitgliedschaft hat sich geaendert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceUpdateEvent {
    pub channel_id: ChannelId,
    pub session_id: SessionId,
    pub action: VoiceAction,
}

// ---------------------------------------------------------------------------
// WebRTC-Signalisierung
// ---------------------------------------------------------------------------

/// Signal an eine andere Sitzung weiterleiten lassen
///
/// Die Payload (SDP bzw. ICE-Kandidat) wird vom Hub nicht interpretiert
/// und unveraendert durchgereicht.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRequest {
    pub target_session_id: SessionId,
    pub payload: serde_json::Value,
}

/// Unicast: weitergeleitetes Signal mit Absenderkennung
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalForwardEvent {
    pub from_session_id: SessionId,
    pub kind: SignalKind,
    pub payload: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

/// Ping (Client -> Hub oder Hub -> Client)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingMessage {
    /// Unix-Timestamp in Millisekunden fuer RTT-Messung
    pub timestamp_ms: u64,
}

/// Pong-Antwort (spiegelt Timestamp zurueck)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongMessage {
    /// Originaler Timestamp aus dem Ping
    pub echo_timestamp_ms: u64,
    /// Hub-eigener Timestamp
    pub server_timestamp_ms: u64,
}

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Standardisierte Fehler-Antwort
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
    /// Optionale maschinenlesbare Details
    pub details: Option<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Haupt-Enum: HubPayload
// ---------------------------------------------------------------------------

/// Alle moeglichen Hub-Events (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HubPayload {
    // Client -> Hub
    Join(JoinRequest),
    SendMessage(SendMessageRequest),
    CreateRoom(CreateRoomRequest),
    SwitchChannel(SwitchChannelRequest),
    JoinVoice(JoinVoiceRequest),
    LeaveVoice,
    WebrtcOffer(SignalRequest),
    WebrtcAnswer(SignalRequest),
    WebrtcIceCandidate(SignalRequest),
    Disconnect,

    // Hub -> Client (Antworten)
    JoinResponse(JoinResponse),
    CreateRoomResponse(CreateRoomResponse),
    SwitchChannelResponse(SwitchChannelResponse),

    // Hub -> Client (Broadcasts)
    UserJoined(UserJoinedEvent),
    UserOffline(UserOfflineEvent),
    NewMessage(NewMessageEvent),
    RoomCreated(RoomCreatedEvent),
    VoiceUpdate(VoiceUpdateEvent),
    WebrtcForward(SignalForwardEvent),

    // Keepalive
    Ping(PingMessage),
    Pong(PongMessage),

    // Fehler
    Error(ErrorResponse),
}

// ---------------------------------------------------------------------------
// Hub-Frame (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Hub-Nachricht mit Request/Response-Zuordnung
///
/// Jede Anfrage traegt eine `request_id` die der Client vergibt.
/// Der Hub kopiert die ID in die Antwort damit der Client Request
/// und Response zuordnen kann. Broadcasts tragen die ID 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubMessage {
    /// Zuordnungs-ID fuer Request/Response
    pub request_id: u32,
    /// Inhalt der Nachricht
    pub payload: HubPayload,
}

impl HubMessage {
    /// Erstellt eine neue Hub-Nachricht
    pub fn new(request_id: u32, payload: HubPayload) -> Self {
        Self {
            request_id,
            payload,
        }
    }

    /// Erstellt einen Broadcast (request_id 0)
    pub fn broadcast(payload: HubPayload) -> Self {
        Self::new(0, payload)
    }

    /// Erstellt eine Ping-Nachricht
    pub fn ping(request_id: u32, timestamp_ms: u64) -> Self {
        Self::new(request_id, HubPayload::Ping(PingMessage { timestamp_ms }))
    }

    /// Erstellt eine Pong-Antwort
    pub fn pong(request_id: u32, echo_timestamp_ms: u64, server_timestamp_ms: u64) -> Self {
        Self::new(
            request_id,
            HubPayload::Pong(PongMessage {
                echo_timestamp_ms,
                server_timestamp_ms,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort
    pub fn error(request_id: u32, code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(
            request_id,
            HubPayload::Error(ErrorResponse {
                code,
                message: message.into(),
                details: None,
            }),
        )
    }

    /// Erstellt eine Fehler-Antwort direkt aus einem `PlauschError`
    pub fn error_from(request_id: u32, fehler: &PlauschError) -> Self {
        Self::error(request_id, ErrorCode::from(fehler), fehler.to_string())
    }

    /// Serialisiert die Nachricht als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert eine Nachricht aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_request_serialisierung() {
        let msg = HubMessage::new(
            1,
            HubPayload::Join(JoinRequest {
                display_name: "Anna".to_string(),
                avatar: Some("🦊".to_string()),
            }),
        );
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"join\""));

        let decoded = HubMessage::from_json(&json).unwrap();
        assert_eq!(decoded.request_id, 1);
        if let HubPayload::Join(j) = decoded.payload {
            assert_eq!(j.display_name, "Anna");
            assert_eq!(j.avatar.as_deref(), Some("🦊"));
        } else {
            panic!("Erwartet Join-Payload");
        }
    }

    #[test]
    fn error_response_serialisierung() {
        let msg = HubMessage::error(42, ErrorCode::ChannelNotFound, "Kanal existiert nicht");
        let json = msg.to_json().unwrap();
        assert!(json.contains("CHANNEL_NOT_FOUND"));

        let decoded = HubMessage::from_json(&json).unwrap();
        assert_eq!(decoded.request_id, 42);
        if let HubPayload::Error(e) = decoded.payload {
            assert_eq!(e.code, ErrorCode::ChannelNotFound);
            assert_eq!(e.message, "Kanal existiert nicht");
        } else {
            panic!("Erwartet Error-Payload");
        }
    }

    #[test]
    fn error_code_aus_plausch_fehler() {
        let f = PlauschError::SelbstAdressiert;
        assert_eq!(ErrorCode::from(&f), ErrorCode::SelfTarget);

        let f = PlauschError::ZielNichtGefunden("session:x".into());
        assert_eq!(ErrorCode::from(&f), ErrorCode::TargetNotFound);

        let f = PlauschError::intern("kaputt");
        assert_eq!(ErrorCode::from(&f), ErrorCode::InternalError);
    }

    #[test]
    fn signal_payload_bleibt_opak() {
        let payload = serde_json::json!({
            "sdp": "v=0\r\no=- 4611731400430051336 2 IN IP4 127.0.0.1",
            "type": "offer"
        });
        let ziel = SessionId::new();
        let msg = HubMessage::new(
            7,
            HubPayload::WebrtcOffer(SignalRequest {
                target_session_id: ziel,
                payload: payload.clone(),
            }),
        );

        let json = msg.to_json().unwrap();
        let decoded = HubMessage::from_json(&json).unwrap();
        if let HubPayload::WebrtcOffer(s) = decoded.payload {
            assert_eq!(s.target_session_id, ziel);
            assert_eq!(s.payload, payload);
        } else {
            panic!("Erwartet WebrtcOffer-Payload");
        }
    }

    #[test]
    fn leave_voice_ohne_koerper() {
        let msg = HubMessage::new(3, HubPayload::LeaveVoice);
        let json = msg.to_json().unwrap();
        let decoded = HubMessage::from_json(&json).unwrap();
        assert!(matches!(decoded.payload, HubPayload::LeaveVoice));
    }

    #[test]
    fn unbekannter_typ_wird_abgelehnt() {
        let json = r#"{"request_id":1,"payload":{"type":"kaffee_kochen"}}"#;
        assert!(HubMessage::from_json(json).is_err());
    }

    #[test]
    fn message_kind_drahtnamen() {
        assert_eq!(
            serde_json::to_string(&MessageKind::Attachment).unwrap(),
            "\"attachment\""
        );
        assert_eq!(
            serde_json::to_string(&SignalKind::IceCandidate).unwrap(),
            "\"ice_candidate\""
        );
        assert_eq!(
            serde_json::to_string(&VoiceAction::Left).unwrap(),
            "\"left\""
        );
    }

    #[test]
    fn voice_update_round_trip() {
        let ev = VoiceUpdateEvent {
            channel_id: ChannelId::new(),
            session_id: SessionId::new(),
            action: VoiceAction::Joined,
        };
        let msg = HubMessage::broadcast(HubPayload::VoiceUpdate(ev));
        assert_eq!(msg.request_id, 0);

        let json = msg.to_json().unwrap();
        let decoded = HubMessage::from_json(&json).unwrap();
        if let HubPayload::VoiceUpdate(v) = decoded.payload {
            assert_eq!(v.action, VoiceAction::Joined);
        } else {
            panic!("Erwartet VoiceUpdate-Payload");
        }
    }

    #[test]
    fn error_codes_serialisierbar() {
        let codes = [
            ErrorCode::InternalError,
            ErrorCode::DuplicateConnection,
            ErrorCode::AlreadyInVoice,
            ErrorCode::SelfTarget,
        ];
        for code in &codes {
            let json = serde_json::to_string(code).unwrap();
            let decoded: ErrorCode = serde_json::from_str(&json).unwrap();
            assert_eq!(*code, decoded);
        }
    }
}
