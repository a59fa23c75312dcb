mod limiter;

use std::{collections::HashMap, time::Instant};

use chrono::{DateTime, Utc};
pub use limiter::*;

use crate::{
    CommandError, CommandResult, Config, ContentMetadata, Id, Identity, PlaybackTicket, Queue,
    RoomEvent, RoomPhase, RoomSnapshot, Timeline, Track, TrackId, Vote,
};

pub type ListenerId = Id<Listener>;

/// A connection subscribed to a room
#[derive(Debug, Clone)]
pub struct Listener {
    pub id: ListenerId,
    pub identity: Identity,
}

impl Listener {
    pub fn new(identity: Identity) -> Self {
        Self {
            id: ListenerId::new(),
            identity,
        }
    }
}

/// The authoritative state of a single room.
///
/// Every operation is applied as a whole or not at all, and returns the events
/// subscribers need to see, in the order they happened. This type does no I/O
/// and keeps no timers, the owner is expected to arm a timer according to
/// [RoomState::playback_ticket] and call [RoomState::advance] when it fires.
#[derive(Debug)]
pub struct RoomState {
    owner_id: String,
    queue: Queue,
    timeline: Timeline,
    listeners: HashMap<ListenerId, Listener>,
    limiter: SuggestionLimiter,
}

impl RoomState {
    pub fn new(owner_id: impl Into<String>, config: &Config) -> Self {
        Self {
            owner_id: owner_id.into(),
            queue: Queue::default(),
            timeline: Timeline::new(config.history_limit),
            listeners: HashMap::new(),
            limiter: SuggestionLimiter::new(config.suggestion_limit, config.suggestion_window),
        }
    }

    /// Subscribes a listener, returning the snapshot meant only for them
    pub fn join(&mut self, listener: Listener) -> (RoomSnapshot, Vec<RoomEvent>) {
        let snapshot_key = listener.identity.key();

        self.listeners.insert(listener.id, listener);
        let snapshot = self.snapshot(&snapshot_key);

        (snapshot, vec![self.listeners_updated()])
    }

    /// Unsubscribes a listener. Their votes and suggestions stay.
    pub fn leave(&mut self, listener_id: ListenerId) -> Vec<RoomEvent> {
        if self.listeners.remove(&listener_id).is_none() {
            return vec![];
        }

        vec![self.listeners_updated()]
    }

    /// Adds already resolved content to the queue.
    ///
    /// If nothing was playing, the new track starts right away.
    pub fn suggest(
        &mut self,
        identity: &Identity,
        metadata: ContentMetadata,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> CommandResult<(Track, Vec<RoomEvent>)> {
        let key = identity.key();

        if !self.limiter.check(&key, now) {
            return Err(CommandError::validation(
                "You are suggesting too quickly, please wait a moment.",
            ));
        }

        self.limiter.record(key.clone(), now);

        let track = self
            .queue
            .push(metadata, key, identity.display_name().to_string());
        let mut events = vec![RoomEvent::TrackAdded {
            track: track.clone(),
        }];

        if self.phase() == RoomPhase::Empty {
            events.push(self.promote(wall));
        }

        events.push(RoomEvent::queue_updated(self.queue.tracks()));
        Ok((track, events))
    }

    /// Casts a vote on a queued track or on the one that is playing.
    /// Played tracks can no longer be voted on.
    pub fn vote(
        &mut self,
        identity: &Identity,
        track_id: TrackId,
        vote: Vote,
    ) -> CommandResult<Vec<RoomEvent>> {
        let key = identity.key();

        if self.queue.vote(track_id, key.clone(), vote).is_some() {
            return Ok(vec![RoomEvent::queue_updated(self.queue.tracks())]);
        }

        match self.timeline.current_mut() {
            Some(track) if track.id == track_id => {
                track.vote(key, vote);

                Ok(vec![RoomEvent::CurrentTrackUpdated {
                    track: track.clone(),
                }])
            }
            _ => Err(CommandError::not_found("track")),
        }
    }

    /// Removes a track. Removing the one that is playing skips to the next.
    pub fn delete(
        &mut self,
        requester: &Identity,
        track_id: TrackId,
        wall: DateTime<Utc>,
    ) -> CommandResult<Vec<RoomEvent>> {
        let track = self
            .queue
            .get(track_id)
            .or_else(|| self.timeline.current().filter(|t| t.id == track_id))
            .ok_or(CommandError::not_found("track"))?;

        if !self.may_delete(requester, track) {
            return Err(CommandError::unauthorized(
                "Only the room owner, a moderator, or the suggester may remove this track.",
            ));
        }

        let mut events = vec![RoomEvent::TrackRemoved { track_id }];

        if self.queue.remove(track_id).is_none() {
            self.timeline.skip();
            events.push(self.promote(wall));
        }

        events.push(RoomEvent::queue_updated(self.queue.tracks()));
        Ok(events)
    }

    /// Finishes the current track and starts the next one.
    ///
    /// Does nothing if `generation` no longer matches the current track,
    /// which is how timers armed for a replaced track are discarded.
    pub fn advance(&mut self, generation: u64, wall: DateTime<Utc>) -> Vec<RoomEvent> {
        if generation != self.timeline.generation() {
            return vec![];
        }

        let Some(played) = self.timeline.complete(wall) else {
            return vec![];
        };

        let mut events = vec![RoomEvent::HistoryAppended { track: played }];
        let had_next = !self.queue.is_empty();

        events.push(self.promote(wall));

        if had_next {
            events.push(RoomEvent::queue_updated(self.queue.tracks()));
        }

        events
    }

    pub fn snapshot(&self, viewer_key: &str) -> RoomSnapshot {
        let my_votes = self
            .queue
            .tracks()
            .iter()
            .chain(self.timeline.current())
            .filter_map(|t| t.votes.vote_of(viewer_key).map(|v| (t.id, v)))
            .collect();

        RoomSnapshot {
            current: self.timeline.current().cloned(),
            started_at: self.timeline.started_at(),
            queue: self.queue.tracks().to_vec(),
            history: self.timeline.history().cloned().collect(),
            listeners: self.listeners.len(),
            my_votes,
        }
    }

    pub fn phase(&self) -> RoomPhase {
        if self.timeline.current().is_some() {
            RoomPhase::Playing
        } else {
            RoomPhase::Empty
        }
    }

    /// The timer that should be armed for the current track, if anything is playing
    pub fn playback_ticket(&self) -> Option<PlaybackTicket> {
        self.timeline.current().map(|t| PlaybackTicket {
            generation: self.timeline.generation(),
            duration: t.duration(),
        })
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn queue(&self) -> &Queue {
        &self.queue
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    fn may_delete(&self, requester: &Identity, track: &Track) -> bool {
        let is_owner = requester.user_id() == Some(self.owner_id.as_str());
        let is_moderator = requester.role().is_some_and(|r| r.is_moderator());

        is_owner || is_moderator || track.suggested_by == requester.key()
    }

    fn promote(&mut self, wall: DateTime<Utc>) -> RoomEvent {
        match self.queue.pop_next() {
            Some(track) => {
                self.timeline.start(track.clone(), wall);

                RoomEvent::NowPlaying {
                    track: Some(track),
                    started_at: Some(wall),
                }
            }
            None => RoomEvent::NowPlaying {
                track: None,
                started_at: None,
            },
        }
    }

    fn listeners_updated(&self) -> RoomEvent {
        RoomEvent::ListenersUpdated {
            count: self.listeners.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::Role;

    fn metadata(title: &str) -> ContentMetadata {
        ContentMetadata {
            content_id: format!("{title}-id"),
            title: title.to_string(),
            artist: "Artist".to_string(),
            thumbnail: String::new(),
            duration: 200,
            category: "10".to_string(),
        }
    }

    fn user(id: &str) -> Identity {
        Identity::User {
            id: id.to_string(),
            name: id.to_uppercase(),
            role: Role::User,
        }
    }

    fn room() -> RoomState {
        RoomState::new("owner", &Config::default())
    }

    fn suggest(room: &mut RoomState, who: &Identity, title: &str) -> Track {
        let (track, _) = room
            .suggest(who, metadata(title), Instant::now(), Utc::now())
            .expect("suggestion is accepted");

        track
    }

    fn queue_titles(room: &RoomState) -> Vec<String> {
        room.queue()
            .tracks()
            .iter()
            .map(|t| t.metadata.title.clone())
            .collect()
    }

    #[test]
    fn test_first_suggestion_starts_playing() {
        let mut room = room();
        assert_eq!(room.phase(), RoomPhase::Empty);

        let (track, events) = room
            .suggest(&user("a"), metadata("first"), Instant::now(), Utc::now())
            .unwrap();

        assert_eq!(room.phase(), RoomPhase::Playing);
        assert_eq!(room.timeline().current().map(|t| t.id), Some(track.id));
        assert!(room.queue().is_empty());

        assert!(matches!(events[0], RoomEvent::TrackAdded { .. }));
        assert!(matches!(
            &events[1],
            RoomEvent::NowPlaying { track: Some(t), .. } if t.id == track.id
        ));
    }

    #[test]
    fn test_second_suggestion_is_queued() {
        let mut room = room();

        suggest(&mut room, &user("a"), "first");
        let second = suggest(&mut room, &user("a"), "second");

        assert_eq!(room.queue().len(), 1);
        assert!(room.queue().get(second.id).is_some());
    }

    #[test]
    fn test_votes_reorder_queue() {
        let mut room = room();

        suggest(&mut room, &user("a"), "playing");
        let a = suggest(&mut room, &user("a"), "A");
        let b = suggest(&mut room, &user("a"), "B");
        let c = suggest(&mut room, &user("a"), "C");

        for voter in ["1", "2"] {
            room.vote(&user(voter), a.id, Vote::Up).unwrap();
            room.vote(&user(voter), b.id, Vote::Up).unwrap();
        }
        for voter in ["1", "2", "3"] {
            room.vote(&user(voter), c.id, Vote::Up).unwrap();
        }

        assert_eq!(queue_titles(&room), ["C", "A", "B"]);
    }

    #[test]
    fn test_revote_same_direction_keeps_score() {
        let mut room = room();

        suggest(&mut room, &user("a"), "playing");
        let a = suggest(&mut room, &user("a"), "A");

        room.vote(&user("x"), a.id, Vote::Up).unwrap();
        let events = room.vote(&user("x"), a.id, Vote::Up).unwrap();

        assert_eq!(room.queue().get(a.id).map(|t| t.score()), Some(1));
        assert!(matches!(events[0], RoomEvent::QueueUpdated { .. }));
    }

    #[test]
    fn test_vote_on_current_track() {
        let mut room = room();
        let playing = suggest(&mut room, &user("a"), "playing");

        let events = room.vote(&user("x"), playing.id, Vote::Down).unwrap();

        assert!(matches!(
            &events[0],
            RoomEvent::CurrentTrackUpdated { track } if track.score() == -1
        ));
    }

    #[test]
    fn test_vote_on_played_track_is_rejected() {
        let mut room = room();
        let playing = suggest(&mut room, &user("a"), "playing");

        let generation = room.playback_ticket().unwrap().generation;
        room.advance(generation, Utc::now());

        assert_eq!(
            room.vote(&user("x"), playing.id, Vote::Up).unwrap_err(),
            CommandError::not_found("track")
        );
    }

    #[test]
    fn test_advance_moves_exactly_one_track() {
        let mut room = room();

        let first = suggest(&mut room, &user("a"), "first");
        let second = suggest(&mut room, &user("a"), "second");

        let generation = room.playback_ticket().unwrap().generation;
        room.advance(generation, Utc::now());

        // A repeated advance for the same generation is stale
        assert!(room.advance(generation, Utc::now()).is_empty());

        let history: Vec<_> = room.timeline().history().map(|p| p.track.id).collect();
        assert_eq!(history, [first.id]);
        assert_eq!(room.timeline().current().map(|t| t.id), Some(second.id));
        assert!(room.queue().is_empty());
    }

    #[test]
    fn test_advance_to_empty() {
        let mut room = room();
        suggest(&mut room, &user("a"), "only");

        let generation = room.playback_ticket().unwrap().generation;
        let events = room.advance(generation, Utc::now());

        assert_eq!(room.phase(), RoomPhase::Empty);
        assert!(room.playback_ticket().is_none());
        assert!(matches!(
            events.last(),
            Some(RoomEvent::NowPlaying { track: None, .. })
        ));
    }

    #[test]
    fn test_snapshot_history_is_bounded() {
        let config = Config {
            history_limit: 1,
            ..Default::default()
        };

        let mut room = RoomState::new("owner", &config);
        suggest(&mut room, &user("a"), "first");
        let second = suggest(&mut room, &user("a"), "second");

        for _ in 0..2 {
            let generation = room.playback_ticket().unwrap().generation;
            room.advance(generation, Utc::now());
        }

        let snapshot = room.snapshot("user:a");
        let history: Vec<_> = snapshot.history.iter().map(|p| p.track.id).collect();

        assert_eq!(history, [second.id]);
    }

    #[test]
    fn test_delete_requires_privilege() {
        let mut room = room();

        suggest(&mut room, &user("a"), "playing");
        let track = suggest(&mut room, &user("a"), "queued");

        let stranger = room.delete(&user("b"), track.id, Utc::now());
        assert!(matches!(stranger, Err(CommandError::Unauthorized(_))));
        assert_eq!(room.queue().len(), 1);

        let moderator = Identity::User {
            id: "m".into(),
            name: "M".into(),
            role: Role::Mod,
        };

        room.delete(&moderator, track.id, Utc::now()).unwrap();
        assert!(room.queue().is_empty());
    }

    #[test]
    fn test_owner_and_suggester_may_delete() {
        let mut room = room();

        suggest(&mut room, &user("a"), "playing");
        let one = suggest(&mut room, &user("a"), "one");
        let two = suggest(&mut room, &user("b"), "two");

        room.delete(&user("a"), one.id, Utc::now()).unwrap();
        room.delete(&user("owner"), two.id, Utc::now()).unwrap();

        assert!(room.queue().is_empty());
    }

    #[test]
    fn test_delete_current_skips_and_invalidates_timer() {
        let mut room = room();

        let playing = suggest(&mut room, &user("a"), "playing");
        let next = suggest(&mut room, &user("a"), "next");
        let stale = room.playback_ticket().unwrap().generation;

        room.delete(&user("a"), playing.id, Utc::now()).unwrap();

        assert_eq!(room.timeline().current().map(|t| t.id), Some(next.id));
        assert_eq!(room.timeline().history_len(), 0);

        // The timer armed for the deleted track must not advance the new one
        assert!(room.advance(stale, Utc::now()).is_empty());
        assert_eq!(room.timeline().current().map(|t| t.id), Some(next.id));
    }

    #[test]
    fn test_delete_unknown_track() {
        let mut room = room();

        assert_eq!(
            room.delete(&user("owner"), TrackId::new(), Utc::now())
                .unwrap_err(),
            CommandError::not_found("track")
        );
    }

    #[test]
    fn test_rate_limit_rejects_without_mutation() {
        let config = Config {
            suggestion_limit: 2,
            suggestion_window: Duration::from_secs(60),
            ..Default::default()
        };

        let mut room = RoomState::new("owner", &config);
        let now = Instant::now();

        for title in ["a", "b"] {
            room.suggest(&user("x"), metadata(title), now, Utc::now())
                .unwrap();
        }

        let result = room.suggest(&user("x"), metadata("c"), now, Utc::now());

        assert!(matches!(result, Err(CommandError::Validation(_))));
        assert_eq!(room.queue().len(), 1);

        // Others are unaffected
        assert!(room
            .suggest(&user("y"), metadata("d"), now, Utc::now())
            .is_ok());
    }

    #[test]
    fn test_join_and_leave_track_listeners() {
        let mut room = room();
        let listener = Listener::new(Identity::guest("g"));
        let id = listener.id;

        let (snapshot, events) = room.join(listener);
        assert_eq!(snapshot.listeners, 1);
        assert!(matches!(events[0], RoomEvent::ListenersUpdated { count: 1 }));

        let events = room.leave(id);
        assert!(matches!(events[0], RoomEvent::ListenersUpdated { count: 0 }));

        // Leaving twice is harmless
        assert!(room.leave(id).is_empty());
    }

    #[test]
    fn test_votes_survive_rejoin() {
        let mut room = room();
        let voter = user("v");

        suggest(&mut room, &user("a"), "playing");
        let queued = suggest(&mut room, &user("a"), "queued");

        let listener = Listener::new(voter.clone());
        let first_connection = listener.id;
        room.join(listener);
        room.vote(&voter, queued.id, Vote::Up).unwrap();
        room.leave(first_connection);

        let (snapshot, _) = room.join(Listener::new(voter));

        assert_eq!(snapshot.my_votes.get(&queued.id), Some(&Vote::Up));
        assert_eq!(snapshot.queue[0].score(), 1);
    }
}
