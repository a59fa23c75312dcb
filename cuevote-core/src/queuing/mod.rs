mod track;
mod vote;

pub use track::*;
pub use vote::*;

use crate::UserKey;

/// The upcoming tracks of a room, kept sorted by score.
///
/// Higher scores come first. Equal scores keep suggestion order, so nothing gets starved by a later suggestion.
#[derive(Debug, Default)]
pub struct Queue {
    items: Vec<Track>,
    /// The last sequence number handed out. Never reused, even after removals.
    last_sequence: u64,
}

impl Queue {
    /// Appends a new suggestion and re-sorts, returning a copy of the new track
    pub fn push(
        &mut self,
        metadata: ContentMetadata,
        suggested_by: UserKey,
        suggested_by_name: String,
    ) -> Track {
        self.last_sequence += 1;

        let track = Track::new(
            metadata,
            suggested_by,
            suggested_by_name,
            self.last_sequence,
        );

        self.items.push(track.clone());
        self.sort();

        track
    }

    /// Records a vote on a queued track.
    /// Returns [None] if the track isn't queued, otherwise whether the ledger changed.
    pub fn vote(&mut self, track_id: TrackId, voter: UserKey, vote: Vote) -> Option<bool> {
        let changed = self.get_mut(track_id)?.vote(voter, vote);

        if changed {
            self.sort();
        }

        Some(changed)
    }

    /// Removes a track, if it is queued
    pub fn remove(&mut self, track_id: TrackId) -> Option<Track> {
        let index = self.items.iter().position(|t| t.id == track_id)?;
        Some(self.items.remove(index))
    }

    /// Takes the highest ranked track off the queue
    pub fn pop_next(&mut self) -> Option<Track> {
        if self.items.is_empty() {
            return None;
        }

        Some(self.items.remove(0))
    }

    pub fn get(&self, track_id: TrackId) -> Option<&Track> {
        self.items.iter().find(|t| t.id == track_id)
    }

    fn get_mut(&mut self, track_id: TrackId) -> Option<&mut Track> {
        self.items.iter_mut().find(|t| t.id == track_id)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn sort(&mut self) {
        self.items.sort_by(|a, b| {
            b.score()
                .cmp(&a.score())
                .then_with(|| a.sequence.cmp(&b.sequence))
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub fn metadata(title: &str) -> ContentMetadata {
        ContentMetadata {
            content_id: format!("{title}-id"),
            title: title.to_string(),
            artist: "Artist".to_string(),
            thumbnail: String::new(),
            duration: 180,
            category: "10".to_string(),
        }
    }

    fn titles(queue: &Queue) -> Vec<&str> {
        queue
            .tracks()
            .iter()
            .map(|t| t.metadata.title.as_str())
            .collect()
    }

    #[test]
    fn test_sequence_is_strictly_increasing() {
        let mut queue = Queue::default();

        let a = queue.push(metadata("a"), "u".into(), "U".into());
        let b = queue.push(metadata("b"), "u".into(), "U".into());
        queue.remove(b.id);
        let c = queue.push(metadata("c"), "u".into(), "U".into());

        assert!(a.sequence < b.sequence);
        assert!(b.sequence < c.sequence);
    }

    #[test]
    fn test_order_is_score_then_sequence() {
        let mut queue = Queue::default();

        let a = queue.push(metadata("A"), "u".into(), "U".into());
        let b = queue.push(metadata("B"), "u".into(), "U".into());
        let c = queue.push(metadata("C"), "u".into(), "U".into());

        // A and B at 2, C at 3
        for voter in ["1", "2"] {
            queue.vote(a.id, voter.into(), Vote::Up);
            queue.vote(b.id, voter.into(), Vote::Up);
        }
        for voter in ["1", "2", "3"] {
            queue.vote(c.id, voter.into(), Vote::Up);
        }

        assert_eq!(titles(&queue), ["C", "A", "B"]);
    }

    #[test]
    fn test_down_votes_sink() {
        let mut queue = Queue::default();

        let a = queue.push(metadata("A"), "u".into(), "U".into());
        queue.push(metadata("B"), "u".into(), "U".into());

        queue.vote(a.id, "x".into(), Vote::Down);
        assert_eq!(titles(&queue), ["B", "A"]);

        // Flip it back up
        queue.vote(a.id, "x".into(), Vote::Up);
        assert_eq!(titles(&queue), ["A", "B"]);
    }

    #[test]
    fn test_vote_on_missing_track() {
        let mut queue = Queue::default();
        assert_eq!(queue.vote(TrackId::new(), "x".into(), Vote::Up), None);
    }

    #[test]
    fn test_pop_next_takes_head() {
        let mut queue = Queue::default();

        queue.push(metadata("A"), "u".into(), "U".into());
        let b = queue.push(metadata("B"), "u".into(), "U".into());
        queue.vote(b.id, "x".into(), Vote::Up);

        assert_eq!(queue.pop_next().map(|t| t.id), Some(b.id));
        assert_eq!(queue.len(), 1);
    }
}
