use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cuevote_core::Role;
use parking_lot::Mutex;

use crate::{
    Database, DatabaseError, DatabaseResult, NewRoom, NewSession, NewUser, Result, RoomData,
    SessionData, UserData, VideoData,
};

/// An ephemeral database, for development and tests.
/// Nothing survives a restart.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
}

#[derive(Default)]
struct Tables {
    users: HashMap<String, UserData>,
    sessions: HashMap<String, NewSession>,
    rooms: HashMap<String, RoomData>,
    videos: HashMap<String, VideoData>,
    search_cache: HashMap<String, String>,
}

fn not_found(resource: &'static str, identifier: &'static str) -> DatabaseError {
    DatabaseError::NotFound {
        resource,
        identifier,
    }
}

impl MemoryDatabase {
    fn rooms_where(&self, predicate: impl Fn(&RoomData) -> bool) -> Vec<RoomData> {
        let tables = self.tables.lock();

        let mut rooms: Vec<_> = tables
            .rooms
            .values()
            .filter(|r| predicate(r))
            .cloned()
            .collect();

        rooms.sort_by(|a, b| b.last_active_at.cmp(&a.last_active_at));
        rooms
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn upsert_user(&self, user: NewUser) -> Result<UserData> {
        let mut tables = self.tables.lock();

        let role = tables
            .users
            .get(&user.id)
            .map(|u| u.role)
            .unwrap_or(Role::User);

        let data = UserData {
            id: user.id.clone(),
            email: user.email,
            name: user.name,
            picture: user.picture,
            role,
        };

        tables.users.insert(user.id, data.clone());
        Ok(data)
    }

    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        self.tables
            .lock()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| not_found("user", "id"))
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut tables = self.tables.lock();

        tables
            .users
            .remove(user_id)
            .ok_or_else(|| not_found("user", "id"))?;

        tables.sessions.retain(|_, s| s.user_id != user_id);
        tables.rooms.retain(|_, r| r.owner_id != user_id);

        Ok(())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let tables = self.tables.lock();

        let session = tables
            .sessions
            .get(token)
            .ok_or_else(|| not_found("session", "token"))?;

        let user = tables
            .users
            .get(&session.user_id)
            .cloned()
            .ok_or_else(|| not_found("session", "token"))?;

        Ok(SessionData {
            token: session.token.clone(),
            expires_at: session.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        let token = new_session.token.clone();

        {
            let mut tables = self.tables.lock();

            if !tables.users.contains_key(&new_session.user_id) {
                return Err(not_found("user", "id"));
            }

            tables.sessions.insert(token.clone(), new_session);
        }

        self.session_by_token(&token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        self.tables
            .lock()
            .sessions
            .remove(token)
            .map(|_| ())
            .ok_or_else(|| not_found("session", "token"))
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();

        self.tables
            .lock()
            .sessions
            .retain(|_, s| s.expires_at > now);

        Ok(())
    }

    async fn room_by_id(&self, room_id: &str) -> Result<RoomData> {
        self.tables
            .lock()
            .rooms
            .get(room_id)
            .cloned()
            .ok_or_else(|| not_found("room", "id"))
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_id(&new_room.id)
            .await
            .conflict_or_ok("room", "id", &new_room.id)?;

        let now = Utc::now();
        let data = RoomData {
            id: new_room.id,
            name: new_room.name,
            description: new_room.description,
            owner_id: new_room.owner_id,
            is_public: new_room.is_public,
            password_hash: new_room.password_hash,
            color: new_room.color,
            music_only: new_room.music_only,
            last_active_at: now,
            created_at: now,
        };

        self.tables
            .lock()
            .rooms
            .insert(data.id.clone(), data.clone());

        Ok(data)
    }

    async fn list_public_rooms(&self, active_since: DateTime<Utc>) -> Result<Vec<RoomData>> {
        Ok(self.rooms_where(|r| r.is_public && r.last_active_at >= active_since))
    }

    async fn list_private_rooms(&self, active_since: DateTime<Utc>) -> Result<Vec<RoomData>> {
        Ok(self.rooms_where(|r| !r.is_public && r.last_active_at >= active_since))
    }

    async fn list_user_rooms(&self, owner_id: &str) -> Result<Vec<RoomData>> {
        Ok(self.rooms_where(|r| r.owner_id == owner_id))
    }

    async fn update_room_activity(&self, room_id: &str, at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.tables.lock();

        let room = tables
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| not_found("room", "id"))?;

        room.last_active_at = at;
        Ok(())
    }

    async fn upsert_video(&self, video: VideoData) -> Result<()> {
        self.tables.lock().videos.insert(video.id.clone(), video);
        Ok(())
    }

    async fn video_by_id(&self, video_id: &str) -> Result<VideoData> {
        self.tables
            .lock()
            .videos
            .get(video_id)
            .cloned()
            .ok_or_else(|| not_found("video", "id"))
    }

    async fn cache_search_term(&self, term: &str, video_id: &str) -> Result<()> {
        self.tables
            .lock()
            .search_cache
            .insert(term.to_string(), video_id.to_string());

        Ok(())
    }

    async fn search_term_video(&self, term: &str) -> Result<VideoData> {
        let tables = self.tables.lock();

        tables
            .search_cache
            .get(term)
            .and_then(|id| tables.videos.get(id))
            .cloned()
            .ok_or_else(|| not_found("search term", "term"))
    }
}
