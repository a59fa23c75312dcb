mod timeline;

use std::time::Duration;

pub use timeline::*;

/// The phase a room is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Nothing is playing and the queue is empty
    Empty,
    Playing,
}

/// Describes the timer the room needs for the track that is currently playing.
/// The timer must hand the generation back when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackTicket {
    pub generation: u64,
    pub duration: Duration,
}
