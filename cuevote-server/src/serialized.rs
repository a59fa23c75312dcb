//! All schemas that are exposed to clients are defined here
//! along with the conversions from collab types

use std::collections::HashMap;

use cuevote_collab::{RoomData, RoomSummary, UserData};
use cuevote_core::{PlayedTrack, Role, RoomSnapshot, Track as CoreTrack, Vote};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: String,
    email: String,
    name: String,
    picture: String,
    #[schema(value_type = String, example = "user")]
    role: Role,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: String,
    name: String,
    description: String,
    owner_id: String,
    is_public: bool,
    has_password: bool,
    color: String,
    music_only: bool,
    /// Unix timestamp in milliseconds
    last_active_at: i64,
    /// Unix timestamp in milliseconds
    created_at: i64,
    /// Connections subscribed to the room right now
    listeners: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    id: String,
    video_id: String,
    title: String,
    artist: String,
    thumbnail: String,
    /// Length in seconds
    duration: u32,
    category: String,
    suggested_by_username: String,
    score: i64,
    upvotes: usize,
    downvotes: usize,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryTrack {
    #[serde(flatten)]
    track: Track,
    /// Unix timestamp in milliseconds
    played_at: i64,
}

/// Everything a client needs to render a room it just joined
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomState {
    room: Room,
    current_track: Option<Track>,
    started_at: Option<i64>,
    queue: Vec<Track>,
    history: Vec<HistoryTrack>,
    listeners: usize,
    /// Track id to the viewer's own vote
    my_votes: HashMap<String, Vote>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
            name: self.display_name().to_string(),
            picture: self.picture.clone(),
            role: self.role,
        }
    }
}

impl ToSerialized<Room> for RoomData {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            owner_id: self.owner_id.clone(),
            is_public: self.is_public,
            has_password: self.has_password(),
            color: self.color.clone(),
            music_only: self.music_only,
            last_active_at: self.last_active_at.timestamp_millis(),
            created_at: self.created_at.timestamp_millis(),
            listeners: 0,
        }
    }
}

impl ToSerialized<Room> for RoomSummary {
    fn to_serialized(&self) -> Room {
        Room {
            listeners: self.listeners,
            ..self.room.to_serialized()
        }
    }
}

impl ToSerialized<Track> for CoreTrack {
    fn to_serialized(&self) -> Track {
        let metadata = &self.metadata;

        Track {
            id: self.id.to_string(),
            video_id: metadata.content_id.clone(),
            title: metadata.title.clone(),
            artist: metadata.artist.clone(),
            thumbnail: metadata.thumbnail.clone(),
            duration: metadata.duration,
            category: metadata.category.clone(),
            suggested_by_username: self.suggested_by_name.clone(),
            score: self.score(),
            upvotes: self.votes.iter().filter(|(_, v)| **v == Vote::Up).count(),
            downvotes: self.votes.iter().filter(|(_, v)| **v == Vote::Down).count(),
        }
    }
}

impl ToSerialized<HistoryTrack> for PlayedTrack {
    fn to_serialized(&self) -> HistoryTrack {
        HistoryTrack {
            track: self.track.to_serialized(),
            played_at: self.completed_at.timestamp_millis(),
        }
    }
}

impl RoomState {
    pub fn new(room: &RoomData, snapshot: &RoomSnapshot) -> Self {
        Self {
            room: Room {
                listeners: snapshot.listeners,
                ..room.to_serialized()
            },
            current_track: snapshot.current.to_serialized(),
            started_at: snapshot.started_at.map(|t| t.timestamp_millis()),
            queue: snapshot.queue.to_serialized(),
            history: snapshot.history.to_serialized(),
            listeners: snapshot.listeners,
            my_votes: snapshot
                .my_votes
                .iter()
                .map(|(track_id, vote)| (track_id.to_string(), *vote))
                .collect(),
        }
    }
}
