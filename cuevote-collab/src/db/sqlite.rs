use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    query, query_as,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    Error as SqlxError, FromRow, SqlitePool,
};

use crate::{
    Database, DatabaseError, DatabaseResult, IntoDatabaseError, NewRoom, NewSession, NewUser,
    Result, RoomData, SessionData, UserData, VideoData,
};

/// A SQLite database implementation for cuevote
pub struct SqliteDatabase {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    name: String,
    picture: String,
    role: String,
}

#[derive(FromRow)]
struct SessionRow {
    token: String,
    expires_at: i64,
    #[sqlx(flatten)]
    user: UserRow,
}

#[derive(FromRow)]
struct RoomRow {
    id: String,
    name: String,
    description: String,
    owner_id: String,
    is_public: bool,
    password_hash: Option<String>,
    color: String,
    music_only: bool,
    last_active_at: i64,
    created_at: i64,
}

#[derive(FromRow)]
struct VideoRow {
    id: String,
    title: String,
    artist: String,
    thumbnail: String,
    duration: i64,
    category_id: String,
    fetched_at: i64,
}

impl SqliteDatabase {
    /// Connects to a database file, creating it if needed, and runs pending migrations
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| e.any())?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        Self::migrate(pool).await
    }

    /// Creates a migrated database that only lives in memory
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| e.any())?
            .foreign_keys(true);

        // Every connection to :memory: is its own database, so the pool must never replace its only one
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| e.any())?;

        Self::migrate(pool).await
    }

    async fn migrate(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }

    async fn list_rooms(&self, is_public: bool, active_since: DateTime<Utc>) -> Result<Vec<RoomData>> {
        let rows = query_as::<_, RoomRow>(
            "SELECT * FROM rooms
            WHERE is_public = ? AND last_active_at >= ?
            ORDER BY last_active_at DESC",
        )
        .bind(is_public)
        .bind(active_since.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl Database for SqliteDatabase {
    async fn upsert_user(&self, user: NewUser) -> Result<UserData> {
        query(
            "INSERT INTO users (id, email, name, picture) VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                picture = excluded.picture",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.picture)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.user_by_id(&user.id).await
    }

    async fn user_by_id(&self, user_id: &str) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT id, email, name, picture, role FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("user", "id"))
    }

    async fn delete_user(&self, user_id: &str) -> Result<()> {
        // Ensure user exists
        let _ = self.user_by_id(user_id).await?;

        let mut transaction = self.pool.begin().await.map_err(|e| e.any())?;

        for statement in [
            "DELETE FROM sessions WHERE user_id = ?",
            "DELETE FROM rooms WHERE owner_id = ?",
            "DELETE FROM users WHERE id = ?",
        ] {
            query(statement)
                .bind(user_id)
                .execute(&mut *transaction)
                .await
                .map_err(|e| e.any())?;
        }

        transaction.commit().await.map_err(|e| e.any())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        query_as::<_, SessionRow>(
            "SELECT
                sessions.token,
                sessions.expires_at,
                users.id,
                users.email,
                users.name,
                users.picture,
                users.role
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = ?",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("session", "token"))
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&new_session.token)
            .bind(&new_session.user_id)
            .bind(new_session.expires_at.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let result = query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn room_by_id(&self, room_id: &str) -> Result<RoomData> {
        query_as::<_, RoomRow>("SELECT * FROM rooms WHERE id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("room", "id"))
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_id(&new_room.id)
            .await
            .conflict_or_ok("room", "id", &new_room.id)?;

        let now = Utc::now().timestamp();

        query(
            "INSERT INTO rooms (
                id, name, description, owner_id, is_public,
                password_hash, color, music_only, last_active_at, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&new_room.id)
        .bind(&new_room.name)
        .bind(&new_room.description)
        .bind(&new_room.owner_id)
        .bind(new_room.is_public)
        .bind(&new_room.password_hash)
        .bind(&new_room.color)
        .bind(new_room.music_only)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())?;

        self.room_by_id(&new_room.id).await
    }

    async fn list_public_rooms(&self, active_since: DateTime<Utc>) -> Result<Vec<RoomData>> {
        self.list_rooms(true, active_since).await
    }

    async fn list_private_rooms(&self, active_since: DateTime<Utc>) -> Result<Vec<RoomData>> {
        self.list_rooms(false, active_since).await
    }

    async fn list_user_rooms(&self, owner_id: &str) -> Result<Vec<RoomData>> {
        let rows = query_as::<_, RoomRow>(
            "SELECT * FROM rooms WHERE owner_id = ? ORDER BY last_active_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_room_activity(&self, room_id: &str, at: DateTime<Utc>) -> Result<()> {
        let result = query("UPDATE rooms SET last_active_at = ? WHERE id = ?")
            .bind(at.timestamp())
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn upsert_video(&self, video: VideoData) -> Result<()> {
        query(
            "INSERT INTO videos (id, title, artist, thumbnail, duration, category_id, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                artist = excluded.artist,
                thumbnail = excluded.thumbnail,
                duration = excluded.duration,
                category_id = excluded.category_id,
                fetched_at = excluded.fetched_at",
        )
        .bind(&video.id)
        .bind(&video.title)
        .bind(&video.artist)
        .bind(&video.thumbnail)
        .bind(video.duration as i64)
        .bind(&video.category_id)
        .bind(video.fetched_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn video_by_id(&self, video_id: &str) -> Result<VideoData> {
        query_as::<_, VideoRow>("SELECT * FROM videos WHERE id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("video", "id"))
    }

    async fn cache_search_term(&self, term: &str, video_id: &str) -> Result<()> {
        query(
            "INSERT INTO search_cache (term, video_id, created_at) VALUES (?, ?, ?)
            ON CONFLICT(term) DO UPDATE SET
                video_id = excluded.video_id,
                created_at = excluded.created_at",
        )
        .bind(term)
        .bind(video_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn search_term_video(&self, term: &str) -> Result<VideoData> {
        query_as::<_, VideoRow>(
            "SELECT videos.* FROM search_cache
                INNER JOIN videos ON search_cache.video_id = videos.id
            WHERE term = ?",
        )
        .bind(term)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("search term", "term"))
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}

fn from_unix(seconds: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(seconds, 0).unwrap_or_default()
}

impl From<UserRow> for UserData {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            picture: row.picture,
            role: row.role.parse().unwrap_or_default(),
        }
    }
}

impl From<SessionRow> for SessionData {
    fn from(row: SessionRow) -> Self {
        Self {
            token: row.token,
            expires_at: from_unix(row.expires_at),
            user: row.user.into(),
        }
    }
}

impl From<RoomRow> for RoomData {
    fn from(row: RoomRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            is_public: row.is_public,
            password_hash: row.password_hash,
            color: row.color,
            music_only: row.music_only,
            last_active_at: from_unix(row.last_active_at),
            created_at: from_unix(row.created_at),
        }
    }
}

impl From<VideoRow> for VideoData {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            artist: row.artist,
            thumbnail: row.thumbnail,
            duration: u32::try_from(row.duration.max(0)).unwrap_or(u32::MAX),
            category_id: row.category_id,
            fetched_at: from_unix(row.fetched_at),
        }
    }
}
