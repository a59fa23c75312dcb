use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::{PlayedTrack, Track, TrackId, Vote};

/// A full view of a room, sent to a connection when it joins
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub current: Option<Track>,
    pub started_at: Option<DateTime<Utc>>,
    pub queue: Vec<Track>,
    pub history: Vec<PlayedTrack>,
    pub listeners: usize,
    /// The votes the joining user has cast on tracks that are still votable
    pub my_votes: HashMap<TrackId, Vote>,
}

/// Something that happened in a room, in the order it was applied
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Sent only to the connection that joined
    Snapshot(RoomSnapshot),
    TrackAdded {
        track: Track,
    },
    /// The queue in its new order
    QueueUpdated {
        queue: Vec<Track>,
    },
    TrackRemoved {
        track_id: TrackId,
    },
    /// The votes on the current track changed
    CurrentTrackUpdated {
        track: Track,
    },
    /// The current track changed. [None] means the room is now empty.
    NowPlaying {
        track: Option<Track>,
        started_at: Option<DateTime<Utc>>,
    },
    HistoryAppended {
        track: PlayedTrack,
    },
    ListenersUpdated {
        count: usize,
    },
}

impl RoomEvent {
    pub(crate) fn queue_updated(queue: &[Track]) -> Self {
        Self::QueueUpdated {
            queue: queue.to_vec(),
        }
    }
}
