use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Id, UserKey, Vote, VoteLedger};

pub type TrackId = Id<Track>;

/// Canonical metadata of a piece of content, as returned by the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentMetadata {
    /// The provider's id of the content
    pub content_id: String,
    pub title: String,
    pub artist: String,
    pub thumbnail: String,
    /// Length in seconds. Zero means the content has no known end, like a live stream.
    pub duration: u32,
    /// The provider category, used for room policies
    pub category: String,
}

/// A single suggestion in a room.
///
/// The same content can be suggested more than once, each suggestion is its own track.
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub metadata: ContentMetadata,
    pub suggested_by: UserKey,
    pub suggested_by_name: String,
    /// Insertion order within the room, used to break ties between equal scores
    pub sequence: u64,
    pub votes: VoteLedger,
}

impl Track {
    pub fn new(
        metadata: ContentMetadata,
        suggested_by: UserKey,
        suggested_by_name: String,
        sequence: u64,
    ) -> Self {
        Self {
            id: TrackId::new(),
            metadata,
            suggested_by,
            suggested_by_name,
            sequence,
            votes: VoteLedger::default(),
        }
    }

    pub fn score(&self) -> i64 {
        self.votes.score()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.metadata.duration as u64)
    }

    /// Records a vote on this track, returning true if anything changed
    pub fn vote(&mut self, voter: UserKey, vote: Vote) -> bool {
        self.votes.cast(voter, vote)
    }
}
