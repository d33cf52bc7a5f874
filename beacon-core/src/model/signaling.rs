use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::ProtocolError;
use crate::model::connection::ConnectionId;
use crate::model::room::RoomId;

/// Which negotiation step an envelope carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    Candidate,
}

impl SignalKind {
    /// Event name used on the wire for this kind.
    pub fn event(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::Candidate => "ice-candidate",
        }
    }
}

/// One offer/answer/candidate in transit between two connections.
///
/// `from` is always filled in by the server. `payload` is the raw JSON the
/// sender attached and is never inspected.
#[derive(Debug, Clone)]
pub struct SignalEnvelope {
    pub from: ConnectionId,
    pub to: ConnectionId,
    pub kind: SignalKind,
    pub payload: Box<RawValue>,
}

/// Frames a client may send.
#[derive(Debug)]
pub enum ClientMessage {
    JoinRoom(RoomId),
    LeaveRoom(RoomId),
    Signal {
        to: ConnectionId,
        kind: SignalKind,
        payload: Box<RawValue>,
    },
}

#[derive(Deserialize)]
struct Frame {
    event: String,
    #[serde(default)]
    data: Option<Box<RawValue>>,
}

#[derive(Deserialize)]
struct SignalData {
    to: String,
    #[serde(default)]
    offer: Option<Box<RawValue>>,
    #[serde(default)]
    answer: Option<Box<RawValue>>,
    #[serde(default)]
    candidate: Option<Box<RawValue>>,
}

impl ClientMessage {
    /// Parses one `{"event": ..., "data": ...}` text frame.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let frame: Frame = serde_json::from_str(text)?;

        match frame.event.as_str() {
            "join-room" => Ok(ClientMessage::JoinRoom(room_from(frame.data)?)),
            "leave-room" => Ok(ClientMessage::LeaveRoom(room_from(frame.data)?)),
            "offer" => signal_from(SignalKind::Offer, frame.data),
            "answer" => signal_from(SignalKind::Answer, frame.data),
            "ice-candidate" => signal_from(SignalKind::Candidate, frame.data),
            _ => Err(ProtocolError::UnknownEvent(frame.event)),
        }
    }
}

fn room_from(data: Option<Box<RawValue>>) -> Result<RoomId, ProtocolError> {
    let raw = data.ok_or(ProtocolError::InvalidRoomId)?;
    let name: String =
        serde_json::from_str(raw.get()).map_err(|_| ProtocolError::InvalidRoomId)?;
    RoomId::parse(name)
}

fn signal_from(
    kind: SignalKind,
    data: Option<Box<RawValue>>,
) -> Result<ClientMessage, ProtocolError> {
    let raw = data.unwrap_or_else(null_payload);
    let data: SignalData = serde_json::from_str(raw.get())?;
    let to = data.to.parse()?;

    let payload = match kind {
        SignalKind::Offer => data.offer,
        SignalKind::Answer => data.answer,
        SignalKind::Candidate => data.candidate,
    };

    Ok(ClientMessage::Signal {
        to,
        kind,
        payload: payload.unwrap_or_else(null_payload),
    })
}

fn null_payload() -> Box<RawValue> {
    RawValue::NULL.to_owned()
}

/// Frames the server sends.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// The receiving connection's own id, sent once after the upgrade.
    Welcome(ConnectionId),
    RoomParticipants(Vec<ConnectionId>),
    UserConnected(ConnectionId),
    UserDisconnected(ConnectionId),
    Offer {
        from: ConnectionId,
        offer: Box<RawValue>,
    },
    Answer {
        from: ConnectionId,
        answer: Box<RawValue>,
    },
    IceCandidate {
        from: ConnectionId,
        candidate: Box<RawValue>,
    },
    Error(String),
}

impl ServerMessage {
    pub fn relay(envelope: SignalEnvelope) -> Self {
        let SignalEnvelope {
            from,
            kind,
            payload,
            ..
        } = envelope;

        match kind {
            SignalKind::Offer => ServerMessage::Offer {
                from,
                offer: payload,
            },
            SignalKind::Answer => ServerMessage::Answer {
                from,
                answer: payload,
            },
            SignalKind::Candidate => ServerMessage::IceCandidate {
                from,
                candidate: payload,
            },
        }
    }

    pub fn to_text(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
