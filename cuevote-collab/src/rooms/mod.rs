mod actor;
mod connection;
mod handle;

use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Utc};
use cuevote_core::{CommandError, CommandResult, Identity};
use dashmap::mapref::entry::Entry;
use log::info;
use rand::rngs::OsRng;
use serde::Deserialize;

pub use connection::*;
pub use handle::*;

use crate::{util::random_string, CollabContext, NewRoom, RoomData};

use actor::RoomActor;

/// Owns the lifetime of every loaded room
pub struct RoomRegistry {
    context: CollabContext,
}

/// Which rooms to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    /// Rooms owned by the viewer, regardless of activity
    Mine,
}

/// What a user fills in to create a room
#[derive(Debug, Clone, Default)]
pub struct NewRoomSpec {
    pub name: String,
    pub description: String,
    pub color: String,
    pub is_private: bool,
    pub password: Option<String>,
    pub music_only: bool,
}

/// A room as shown in a listing
#[derive(Debug, Clone)]
pub struct RoomSummary {
    pub room: RoomData,
    /// Connections subscribed right now, zero if the room isn't loaded
    pub listeners: usize,
}

impl RoomRegistry {
    const ID_LENGTH: usize = 12;
    const MAX_NAME_LENGTH: usize = 64;
    const MAX_DESCRIPTION_LENGTH: usize = 500;
    const DEFAULT_COLOR: &'static str = "from-gray-700 to-black";

    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Returns the live room, loading it from the database if it isn't in memory
    pub async fn get_or_load(&self, room_id: &str) -> CommandResult<RoomHandle> {
        if let Some(handle) = self.context.rooms.get(room_id) {
            if !handle.is_closed() {
                return Ok(handle.clone());
            }
        }

        let data = self.context.database.room_by_id(room_id).await?;

        // Someone else may have loaded it while we were reading
        let handle = match self.context.rooms.entry(data.id.clone()) {
            Entry::Occupied(entry) if !entry.get().is_closed() => entry.get().clone(),
            Entry::Occupied(mut entry) => {
                let handle = RoomActor::spawn(&self.context, data);
                entry.insert(handle.clone());
                handle
            }
            Entry::Vacant(entry) => entry
                .insert(RoomActor::spawn(&self.context, data))
                .clone(),
        };

        Ok(handle)
    }

    /// Creates a room owned by an authenticated user
    pub async fn create_room(&self, owner: &Identity, spec: NewRoomSpec) -> CommandResult<RoomData> {
        let Some(owner_id) = owner.user_id() else {
            return Err(CommandError::unauthorized(
                "You must be logged in to create a room.",
            ));
        };

        let name = spec.name.trim();
        let description = spec.description.trim();

        if name.is_empty() {
            return Err(CommandError::validation("Room name cannot be empty."));
        }

        if name.chars().count() > Self::MAX_NAME_LENGTH {
            return Err(CommandError::validation(format!(
                "Room name cannot be longer than {} characters.",
                Self::MAX_NAME_LENGTH
            )));
        }

        if description.chars().count() > Self::MAX_DESCRIPTION_LENGTH {
            return Err(CommandError::validation(format!(
                "Room description cannot be longer than {} characters.",
                Self::MAX_DESCRIPTION_LENGTH
            )));
        }

        let password_hash = spec
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(hash_password)
            .transpose()?;

        let color = match spec.color.trim() {
            "" => Self::DEFAULT_COLOR.to_string(),
            color => color.to_string(),
        };

        let room = self
            .context
            .database
            .create_room(NewRoom {
                id: random_string(Self::ID_LENGTH),
                name: name.to_string(),
                description: description.to_string(),
                owner_id: owner_id.to_string(),
                is_public: !spec.is_private,
                password_hash,
                color,
                music_only: spec.music_only,
            })
            .await?;

        info!("{} created room {} ({})", owner.display_name(), room.name, room.id);
        Ok(room)
    }

    /// Joins a room on behalf of a connection, enforcing the room's access rules
    pub async fn join_room(
        &self,
        room_id: &str,
        identity: Identity,
        password: Option<&str>,
    ) -> CommandResult<RoomConnection> {
        let handle = self.get_or_load(room_id).await?;
        let data = handle.data();
        let is_owner = identity.user_id() == Some(data.owner_id.as_str());

        if !data.is_public && !identity.is_authenticated() {
            return Err(CommandError::unauthorized(
                "You must be logged in to join a private room.",
            ));
        }

        if let Some(hash) = data.password_hash.as_deref() {
            let matches = password.is_some_and(|p| verify_password(p, hash));

            if !is_owner && !matches {
                return Err(CommandError::unauthorized("Incorrect room password."));
            }
        }

        handle.join(identity)
    }

    /// Lists rooms that were active within the retention window
    pub async fn list(
        &self,
        visibility: Visibility,
        viewer: &Identity,
    ) -> CommandResult<Vec<RoomSummary>> {
        let active_since = Utc::now()
            .checked_sub_signed(self.context.config.retention())
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let database = &self.context.database;

        let rooms = match (visibility, viewer.user_id()) {
            (Visibility::Public, _) => database.list_public_rooms(active_since).await?,
            (Visibility::Private, Some(_)) => database.list_private_rooms(active_since).await?,
            (Visibility::Mine, Some(user_id)) => database.list_user_rooms(user_id).await?,
            (_, None) => {
                return Err(CommandError::unauthorized(
                    "You must be logged in to see these rooms.",
                ))
            }
        };

        let summaries = rooms
            .into_iter()
            .map(|room| RoomSummary {
                listeners: self.listener_count(&room.id),
                room,
            })
            .collect();

        Ok(summaries)
    }

    /// Unloads rooms nobody has listened to for longer than the idle timeout.
    /// Returns how many were unloaded.
    pub fn evict_idle(&self) -> usize {
        let timeout = self.context.config.room_idle_timeout;
        let before = self.context.rooms.len();

        self.context.rooms.retain(|_, handle| {
            let is_idle = handle.listener_count() == 0 && handle.idle_for() >= timeout;

            if is_idle {
                handle.shutdown();
            }

            !is_idle && !handle.is_closed()
        });

        let evicted = before.saturating_sub(self.context.rooms.len());

        if evicted > 0 {
            info!("Evicted {} idle room(s)", evicted);
        }

        evicted
    }

    /// Unloads every room owned by a user, used when their account is deleted
    pub fn unload_owned_by(&self, user_id: &str) {
        self.context.rooms.retain(|_, handle| {
            let is_owned = handle.data().owner_id == user_id;

            if is_owned {
                handle.shutdown();
            }

            !is_owned
        });
    }

    /// Returns the room if it is currently in memory
    pub fn loaded(&self, room_id: &str) -> Option<RoomHandle> {
        self.context.rooms.get(room_id).map(|r| r.clone())
    }

    fn listener_count(&self, room_id: &str) -> usize {
        self.context
            .rooms
            .get(room_id)
            .map(|r| r.listener_count())
            .unwrap_or(0)
    }
}

fn hash_password(password: &str) -> CommandResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CommandError::transient(format!("Failed to hash password: {e}")))
}

fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::parse(hash, Encoding::default())
        .and_then(|hash| Argon2::default().verify_password(password.as_bytes(), &hash))
        .is_ok()
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use cuevote_core::{Config, Role, RoomEvent, Track, Vote};
    use tokio::time;

    use super::*;
    use crate::{Collab, ContentDetails, Database, MemoryDatabase, NewUser, StaticProvider};

    fn catalogue() -> Vec<ContentDetails> {
        vec![
            StaticProvider::details("aaaaaaaaaaa", "First song", 180, "10"),
            StaticProvider::details("bbbbbbbbbbb", "Second song", 240, "10"),
            StaticProvider::details("ccccccccccc", "Third song", 200, "10"),
            StaticProvider::details("ddddddddddd", "Cat video", 30, "15"),
        ]
    }

    fn user(id: &str) -> Identity {
        Identity::User {
            id: id.to_string(),
            name: id.to_uppercase(),
            role: Role::User,
        }
    }

    async fn setup(config: Config, provider: StaticProvider) -> (Collab, RoomData) {
        let database = Arc::new(MemoryDatabase::default());

        database
            .upsert_user(NewUser {
                id: "owner".to_string(),
                email: "owner@example.com".to_string(),
                name: "Owner".to_string(),
                picture: String::new(),
            })
            .await
            .unwrap();

        let collab = Collab::from_parts(config, database, Arc::new(provider));
        let room = collab
            .rooms
            .create_room(
                &user("owner"),
                NewRoomSpec {
                    name: "Test room".to_string(),
                    music_only: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        (collab, room)
    }

    async fn default_setup() -> (Collab, RoomData) {
        setup(Config::default(), StaticProvider::new(catalogue())).await
    }

    /// Skips events until one matches
    async fn wait_for<F>(connection: &mut RoomConnection, mut predicate: F) -> RoomEvent
    where
        F: FnMut(&RoomEvent) -> bool,
    {
        loop {
            let event = connection.next_event().await.expect("room is alive");

            if predicate(&event) {
                return event;
            }
        }
    }

    async fn suggest(collab: &Collab, room: &RoomHandle, who: &str, query: &str) -> Track {
        collab
            .suggest(room, &user(who), query)
            .await
            .expect("suggestion is accepted")
    }

    #[tokio::test]
    async fn test_join_starts_with_snapshot() {
        let (collab, room) = default_setup().await;

        let mut connection = collab
            .rooms
            .join_room(&room.id, user("a"), None)
            .await
            .unwrap();

        assert!(matches!(
            connection.next_event().await,
            Some(RoomEvent::Snapshot(snapshot)) if snapshot.listeners == 1
        ));
        assert!(matches!(
            connection.next_event().await,
            Some(RoomEvent::ListenersUpdated { count: 1 })
        ));
    }

    #[tokio::test]
    async fn test_unknown_room() {
        let (collab, _) = default_setup().await;

        let result = collab.rooms.join_room("nope", user("a"), None).await;
        assert_eq!(result.err().map(|e| e.code()), Some("ROOM_NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_first_suggestion_plays_immediately() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        let track = suggest(&collab, &handle, "a", "first song").await;
        let snapshot = handle.snapshot(user("a")).await.unwrap();

        assert_eq!(snapshot.current.map(|t| t.id), Some(track.id));
        assert!(snapshot.queue.is_empty());
    }

    #[tokio::test]
    async fn test_policy_rejection_leaves_queue_untouched() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        suggest(&collab, &handle, "a", "first song").await;

        let error = collab
            .suggest(&handle, &user("a"), "cat video")
            .await
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Only music videos are allowed in this channel."
        );

        let snapshot = handle.snapshot(user("a")).await.unwrap();
        assert!(snapshot.queue.is_empty());
    }

    #[tokio::test]
    async fn test_events_follow_application_order() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        let mut connection = handle.join(user("watcher")).unwrap();
        suggest(&collab, &handle, "a", "first song").await;

        let mut kinds = vec![];

        while kinds.len() < 5 {
            let kind = match connection.next_event().await.unwrap() {
                RoomEvent::Snapshot(_) => "snapshot",
                RoomEvent::ListenersUpdated { .. } => "listeners",
                RoomEvent::TrackAdded { .. } => "added",
                RoomEvent::NowPlaying { .. } => "playing",
                RoomEvent::QueueUpdated { .. } => "queue",
                _ => "other",
            };

            kinds.push(kind);
        }

        assert_eq!(kinds, ["snapshot", "listeners", "added", "playing", "queue"]);
    }

    #[tokio::test]
    async fn test_concurrent_votes_are_not_lost() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        suggest(&collab, &handle, "a", "first song").await;
        let queued = suggest(&collab, &handle, "a", "second song").await;

        let votes = (0..20).map(|i| {
            let handle = handle.clone();
            tokio::spawn(async move {
                handle
                    .vote(user(&format!("voter{i}")), queued.id, Vote::Up)
                    .await
            })
        });

        for vote in votes.collect::<Vec<_>>() {
            vote.await.unwrap().unwrap();
        }

        let snapshot = handle.snapshot(user("a")).await.unwrap();
        assert_eq!(snapshot.queue[0].score(), 20);
    }

    #[tokio::test]
    async fn test_votes_survive_reconnect() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();
        let voter = user("voter");

        suggest(&collab, &handle, "a", "first song").await;
        let queued = suggest(&collab, &handle, "a", "second song").await;

        let connection = handle.join(voter.clone()).unwrap();
        handle.vote(voter.clone(), queued.id, Vote::Down).await.unwrap();
        drop(connection);

        let mut connection = handle.join(voter).unwrap();

        match connection.next_event().await {
            Some(RoomEvent::Snapshot(snapshot)) => {
                assert_eq!(snapshot.my_votes.get(&queued.id), Some(&Vote::Down));
                assert_eq!(snapshot.listeners, 1);
            }
            _ => panic!("expected a snapshot first"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_advances_through_queue() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();
        let mut connection = handle.join(user("watcher")).unwrap();

        let first = suggest(&collab, &handle, "a", "first song").await;
        let second = suggest(&collab, &handle, "a", "second song").await;

        // 180 seconds elapse instantly with the clock paused
        let event = wait_for(&mut connection, |e| {
            matches!(e, RoomEvent::HistoryAppended { .. })
        })
        .await;

        assert!(matches!(
            event,
            RoomEvent::HistoryAppended { track } if track.track.id == first.id
        ));

        let event = wait_for(&mut connection, |e| matches!(e, RoomEvent::NowPlaying { .. })).await;
        assert!(matches!(
            event,
            RoomEvent::NowPlaying { track: Some(t), .. } if t.id == second.id
        ));

        // And then the room runs dry
        let event = wait_for(&mut connection, |e| matches!(e, RoomEvent::NowPlaying { .. })).await;
        assert!(matches!(event, RoomEvent::NowPlaying { track: None, .. }));

        let snapshot = handle.snapshot(user("a")).await.unwrap();
        let history: Vec<_> = snapshot.history.iter().map(|p| p.track.id).collect();

        assert_eq!(history, [first.id, second.id]);
        assert!(snapshot.current.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deleting_current_track_does_not_double_advance() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        let first = suggest(&collab, &handle, "a", "first song").await;
        let second = suggest(&collab, &handle, "a", "second song").await;
        let third = suggest(&collab, &handle, "a", "third song").await;

        // Halfway through the first track, the owner removes it
        time::sleep(Duration::from_secs(90)).await;
        handle.delete(user("owner"), first.id).await.unwrap();

        // The timer of the first track would have fired at 180 seconds
        time::sleep(Duration::from_secs(100)).await;

        let snapshot = handle.snapshot(user("a")).await.unwrap();
        assert_eq!(snapshot.current.map(|t| t.id), Some(second.id));
        assert_eq!(snapshot.queue.iter().map(|t| t.id).collect::<Vec<_>>(), [third.id]);
        assert!(snapshot.history.is_empty());

        // The second track runs its full length from when it started
        time::sleep(Duration::from_secs(150)).await;

        let snapshot = handle.snapshot(user("a")).await.unwrap();
        assert_eq!(snapshot.current.map(|t| t.id), Some(third.id));
        assert_eq!(snapshot.history.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_by_stranger_is_unauthorized() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        suggest(&collab, &handle, "a", "first song").await;
        let queued = suggest(&collab, &handle, "a", "second song").await;

        let error = handle.delete(user("b"), queued.id).await.unwrap_err();
        assert_eq!(error.code(), "UNAUTHORIZED");

        let snapshot = handle.snapshot(user("a")).await.unwrap();
        assert_eq!(snapshot.queue.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_suggestion_times_out_without_stalling_room() {
        let config = Config {
            resolve_timeout: Duration::from_secs(5),
            ..Default::default()
        };

        let (collab, room) = setup(config, StaticProvider::stalled()).await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        let error = collab
            .suggest(&handle, &user("a"), "anything")
            .await
            .unwrap_err();

        assert!(error.is_retryable());
        assert_eq!(
            handle.snapshot(user("a")).await.unwrap().queue.len(),
            0
        );
    }

    #[tokio::test]
    async fn test_private_rooms_and_passwords() {
        let (collab, _) = default_setup().await;

        let room = collab
            .rooms
            .create_room(
                &user("owner"),
                NewRoomSpec {
                    name: "Secret".to_string(),
                    is_private: true,
                    password: Some("hunter2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let guest = collab
            .rooms
            .join_room(&room.id, Identity::guest("g"), Some("hunter2"))
            .await;
        assert_eq!(guest.err().map(|e| e.code()), Some("UNAUTHORIZED"));

        let wrong = collab
            .rooms
            .join_room(&room.id, user("b"), Some("hunter3"))
            .await;
        assert_eq!(wrong.err().map(|e| e.code()), Some("UNAUTHORIZED"));

        assert!(collab
            .rooms
            .join_room(&room.id, user("b"), Some("hunter2"))
            .await
            .is_ok());

        // The owner never needs the password
        assert!(collab
            .rooms
            .join_room(&room.id, user("owner"), None)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_room_validation() {
        let (collab, _) = default_setup().await;

        let guest = collab
            .rooms
            .create_room(&Identity::guest("g"), NewRoomSpec::default())
            .await;
        assert_eq!(guest.err().map(|e| e.code()), Some("UNAUTHORIZED"));

        let empty = collab
            .rooms
            .create_room(
                &user("owner"),
                NewRoomSpec {
                    name: "   ".to_string(),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(empty.err().map(|e| e.code()), Some("BAD_REQUEST"));
    }

    #[tokio::test]
    async fn test_listing_includes_live_listener_counts() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        let mut connection = handle.join(user("a")).unwrap();
        wait_for(&mut connection, |e| matches!(e, RoomEvent::ListenersUpdated { .. })).await;

        let rooms = collab
            .rooms
            .list(Visibility::Public, &Identity::guest("g"))
            .await
            .unwrap();

        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0].listeners, 1);

        let private = collab
            .rooms
            .list(Visibility::Private, &Identity::guest("g"))
            .await;
        assert!(private.is_err());
    }

    #[tokio::test]
    async fn test_listing_with_huge_retention() {
        let config = Config {
            retention_days: u32::MAX,
            ..Default::default()
        };

        let (collab, _) = setup(config, StaticProvider::new(catalogue())).await;
        let rooms = collab
            .rooms
            .list(Visibility::Public, &Identity::guest("g"))
            .await
            .unwrap();

        assert_eq!(rooms.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_rooms_are_evicted_and_reloaded() {
        let (collab, room) = default_setup().await;
        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();

        let mut connection = handle.join(user("a")).unwrap();
        wait_for(&mut connection, |e| matches!(e, RoomEvent::ListenersUpdated { .. })).await;

        // Listened to rooms are never evicted
        time::sleep(Duration::from_secs(60 * 60 * 2)).await;
        assert_eq!(collab.rooms.evict_idle(), 0);

        drop(connection);
        handle.snapshot(user("a")).await.unwrap();
        time::sleep(Duration::from_secs(60 * 60 * 2)).await;

        assert_eq!(collab.rooms.evict_idle(), 1);
        assert!(collab.rooms.loaded(&room.id).is_none());

        // The old handle no longer reaches a room
        let error = handle.snapshot(user("a")).await.unwrap_err();
        assert_eq!(error.code(), "ROOM_NOT_FOUND");

        // But the durable record brings it back
        let reloaded = collab.rooms.get_or_load(&room.id).await.unwrap();
        let snapshot = reloaded.snapshot(user("a")).await.unwrap();
        assert!(snapshot.current.is_none());
    }
}
