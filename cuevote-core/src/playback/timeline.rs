use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::Track;

/// A track that finished playing
#[derive(Debug, Clone)]
pub struct PlayedTrack {
    pub track: Track,
    pub completed_at: DateTime<Utc>,
}

/// The playback side of a room: what is playing, since when, and what already played.
#[derive(Debug)]
pub struct Timeline {
    current: Option<(Track, DateTime<Utc>)>,
    history: VecDeque<PlayedTrack>,
    history_limit: usize,
    /// Bumped whenever the current track changes, so timers armed for an older track can be told apart
    generation: u64,
}

impl Timeline {
    /// Creates an idle timeline that keeps at most `history_limit` played tracks
    pub fn new(history_limit: usize) -> Self {
        Self {
            current: None,
            history: VecDeque::new(),
            history_limit,
            generation: 0,
        }
    }

    /// Starts playing a track. The caller must make sure nothing is playing.
    pub fn start(&mut self, track: Track, started_at: DateTime<Utc>) {
        debug_assert!(self.current.is_none(), "Started a track while another was playing");

        self.current = Some((track, started_at));
        self.generation += 1;
    }

    /// Moves the current track into history, returning a copy of it
    pub fn complete(&mut self, completed_at: DateTime<Utc>) -> Option<PlayedTrack> {
        let (track, _) = self.current.take()?;
        let played = PlayedTrack {
            track,
            completed_at,
        };

        self.generation += 1;
        self.history.push_back(played.clone());

        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }

        Some(played)
    }

    /// Drops the current track without recording it as played
    pub fn skip(&mut self) -> Option<Track> {
        let (track, _) = self.current.take()?;
        self.generation += 1;

        Some(track)
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref().map(|(t, _)| t)
    }

    pub fn current_mut(&mut self) -> Option<&mut Track> {
        self.current.as_mut().map(|(t, _)| t)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.current.as_ref().map(|(_, s)| *s)
    }

    /// Played tracks, oldest first
    pub fn history(&self) -> impl Iterator<Item = &PlayedTrack> + '_ {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ContentMetadata;

    fn track(title: &str, sequence: u64) -> Track {
        let metadata = ContentMetadata {
            content_id: title.to_string(),
            title: title.to_string(),
            artist: String::new(),
            thumbnail: String::new(),
            duration: 60,
            category: "10".to_string(),
        };

        Track::new(metadata, "u".into(), "U".into(), sequence)
    }

    #[test]
    fn test_history_is_append_only_in_completion_order() {
        let mut timeline = Timeline::new(50);
        let now = Utc::now();

        timeline.start(track("a", 1), now);
        timeline.complete(now);
        timeline.start(track("b", 2), now);
        timeline.complete(now);

        let titles: Vec<_> = timeline
            .history()
            .map(|p| p.track.metadata.title.as_str())
            .collect();

        assert_eq!(titles, ["a", "b"]);
        assert!(timeline.current().is_none());
    }

    #[test]
    fn test_generation_changes_with_current_track() {
        let mut timeline = Timeline::new(50);
        let now = Utc::now();

        let before = timeline.generation();
        timeline.start(track("a", 1), now);
        let playing = timeline.generation();
        timeline.skip();

        assert!(playing > before);
        assert!(timeline.generation() > playing);
        assert_eq!(timeline.history_len(), 0);
    }

    #[test]
    fn test_complete_when_idle() {
        let mut timeline = Timeline::new(50);
        let generation = timeline.generation();

        assert!(timeline.complete(Utc::now()).is_none());
        assert_eq!(timeline.generation(), generation);
    }

    #[test]
    fn test_history_drops_oldest_past_limit() {
        let mut timeline = Timeline::new(2);
        let now = Utc::now();

        for (sequence, title) in ["a", "b", "c"].into_iter().enumerate() {
            timeline.start(track(title, sequence as u64), now);
            timeline.complete(now);
        }

        let titles: Vec<_> = timeline
            .history()
            .map(|p| p.track.metadata.title.as_str())
            .collect();

        assert_eq!(titles, ["b", "c"]);
    }
}
