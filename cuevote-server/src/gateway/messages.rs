use cuevote_collab::{RoomData, Visibility};
use cuevote_core::{CommandError, RoomEvent, TrackId, Vote};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    schemas::CreateRoomSchema,
    serialized::{HistoryTrack, Room, RoomState, ToSerialized, Track, User},
};

/// A message sent by a client, as `{ "type": ..., "payload": ... }`
#[derive(Debug, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    ResumeSession {
        token: String,
        /// A guest id the client generated and wants to keep if the token is no longer valid
        #[serde(default)]
        guest_id: Option<String>,
    },
    Logout {},
    DeleteAccount {},
    ListRooms {
        #[serde(default)]
        visibility: Option<Visibility>,
    },
    CreateRoom(CreateRoomSchema),
    JoinRoom {
        room_id: String,
        #[serde(default)]
        password: Option<String>,
    },
    LeaveRoom {},
    SuggestSong {
        query: String,
    },
    Vote {
        track_id: TrackId,
        direction: Vote,
    },
    DeleteSong {
        track_id: TrackId,
    },
}

impl ClientMessage {
    /// Parses a text frame. A missing or null payload is read as an empty object.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let mut envelope: Value = serde_json::from_str(text)?;

        if let Value::Object(fields) = &mut envelope {
            let payload = fields.entry("payload").or_insert(Value::Null);

            if payload.is_null() {
                *payload = Value::Object(Default::default());
            }
        }

        serde_json::from_value(envelope)
    }
}

/// A message sent to a client
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Event(ServerEvent),
    Notice(Notice),
}

/// Messages that carry their data in a `payload`
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    LoginSuccess {
        user: User,
    },
    LoggedOut,
    AccountDeleted,
    RoomList {
        rooms: Vec<Room>,
    },
    /// The payload is the room itself
    RoomCreated(Room),
    /// The full state of a room, only ever sent to the connection that joined
    #[serde(rename = "state")]
    State(RoomState),
    TrackAdded {
        track: Track,
    },
    QueueUpdated {
        queue: Vec<Track>,
    },
    TrackRemoved {
        track_id: String,
    },
    /// Votes on the currently playing track changed
    TrackUpdated {
        track: Track,
    },
    NowPlaying {
        track: Option<Track>,
        /// Unix timestamp in milliseconds
        started_at: Option<i64>,
    },
    HistoryUpdated {
        track: HistoryTrack,
    },
    Listeners {
        count: usize,
    },
}

/// Messages that carry a top level `message`
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Notice {
    Info {
        message: String,
    },
    Error {
        message: String,
        code: &'static str,
        retryable: bool,
    },
}

impl ServerMessage {
    pub fn info(message: impl Into<String>) -> Self {
        Self::Notice(Notice::Info {
            message: message.into(),
        })
    }

    pub fn error(error: &CommandError) -> Self {
        Self::Notice(Notice::Error {
            message: error.to_string(),
            code: error.code(),
            retryable: error.is_retryable(),
        })
    }

    /// Translates an event of the room the connection is subscribed to
    pub fn from_room_event(event: RoomEvent, room: &RoomData) -> Self {
        let event = match event {
            RoomEvent::Snapshot(snapshot) => ServerEvent::State(RoomState::new(room, &snapshot)),
            RoomEvent::TrackAdded { track } => ServerEvent::TrackAdded {
                track: track.to_serialized(),
            },
            RoomEvent::QueueUpdated { queue } => ServerEvent::QueueUpdated {
                queue: queue.to_serialized(),
            },
            RoomEvent::TrackRemoved { track_id } => ServerEvent::TrackRemoved {
                track_id: track_id.to_string(),
            },
            RoomEvent::CurrentTrackUpdated { track } => ServerEvent::TrackUpdated {
                track: track.to_serialized(),
            },
            RoomEvent::NowPlaying { track, started_at } => ServerEvent::NowPlaying {
                track: track.to_serialized(),
                started_at: started_at.map(|t| t.timestamp_millis()),
            },
            RoomEvent::HistoryAppended { track } => ServerEvent::HistoryUpdated {
                track: track.to_serialized(),
            },
            RoomEvent::ListenersUpdated { count } => ServerEvent::Listeners { count },
        };

        Self::Event(event)
    }
}

impl From<ServerEvent> for ServerMessage {
    fn from(event: ServerEvent) -> Self {
        Self::Event(event)
    }
}
