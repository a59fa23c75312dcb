mod auth;
mod db;
mod resolver;
mod rooms;
mod util;

use std::sync::Arc;

use cuevote_core::{CommandError, CommandResult, Config, Identity, Track};
use dashmap::DashMap;
use log::info;
use tokio::{task::JoinHandle, time};

pub use auth::*;
pub use db::*;
pub use resolver::*;
pub use rooms::*;

pub type Store<K, V> = Arc<DashMap<K, V>>;

/// The cuevote collab system, facilitating sessions, rooms, and content resolution.
pub struct Collab {
    context: CollabContext,

    pub auth: SessionManager,
    pub rooms: RoomRegistry,
    pub resolver: MetadataResolver,
}

/// A type passed to various components of the collab system, to access shared state.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Arc<Config>,
    pub database: Arc<dyn Database>,
    pub provider: Arc<dyn ContentProvider>,

    pub rooms: Store<RoomId, RoomHandle>,
}

impl From<DatabaseError> for CommandError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::NotFound { resource, .. } => CommandError::not_found(resource),
            e => {
                log::warn!("Database error: {}", e);
                CommandError::transient("Something went wrong, please try again.")
            }
        }
    }
}

impl Collab {
    pub fn new(
        config: Config,
        database: impl Database + 'static,
        provider: impl ContentProvider + 'static,
    ) -> Self {
        Self::from_parts(config, Arc::new(database), Arc::new(provider))
    }

    /// Creates the collab system from already shared collaborators
    pub fn from_parts(
        config: Config,
        database: Arc<dyn Database>,
        provider: Arc<dyn ContentProvider>,
    ) -> Self {
        let context = CollabContext {
            config: Arc::new(config),
            database,
            provider,

            rooms: Default::default(),
        };

        Self {
            auth: SessionManager::new(&context),
            rooms: RoomRegistry::new(&context),
            resolver: MetadataResolver::new(&context),
            context,
        }
    }

    /// Resolves a query and submits the result to a room.
    ///
    /// Resolution happens before the room sees the command, so a slow lookup never holds up the room.
    pub async fn suggest(
        &self,
        room: &RoomHandle,
        identity: &Identity,
        query: &str,
    ) -> CommandResult<Track> {
        let metadata = self
            .resolver
            .resolve(query, room.data().music_only)
            .await?;

        room.submit(identity.clone(), metadata).await
    }

    /// Deletes an account along with its sessions and rooms, unloading the rooms from memory
    pub async fn delete_account(&self, user_id: &str) -> CommandResult<()> {
        self.auth.delete_account(user_id).await.map_err(|e| match e {
            SessionError::Db(e) => e.into(),
            _ => CommandError::not_found("user"),
        })?;

        self.rooms.unload_owned_by(user_id);
        Ok(())
    }

    /// Periodically evicts idle rooms and clears expired sessions
    pub fn spawn_maintenance(self: &Arc<Self>) -> JoinHandle<()> {
        let collab = self.clone();

        tokio::spawn(async move {
            let mut interval = time::interval(collab.context.config.eviction_interval);
            info!("Room maintenance started");

            loop {
                interval.tick().await;

                collab.rooms.evict_idle();
                collab.auth.clear_expired().await;
            }
        })
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn context(&self) -> &CollabContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_account_unloads_owned_rooms() {
        let collab = Collab::new(
            Config::default(),
            MemoryDatabase::default(),
            StaticProvider::default(),
        );

        let session = collab
            .auth
            .login(VerifiedProfile {
                id: "a".to_string(),
                email: "a@example.com".to_string(),
                name: "A".to_string(),
                picture: String::new(),
            })
            .await
            .unwrap();

        let owner = session.user.identity();
        let room = collab
            .rooms
            .create_room(
                &owner,
                NewRoomSpec {
                    name: "Mine".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let handle = collab.rooms.get_or_load(&room.id).await.unwrap();
        collab.delete_account("a").await.unwrap();

        assert!(collab.rooms.loaded(&room.id).is_none());
        assert_eq!(
            handle.snapshot(owner.clone()).await.unwrap_err().code(),
            "ROOM_NOT_FOUND"
        );
        assert_eq!(
            collab.rooms.get_or_load(&room.id).await.err().map(|e| e.code()),
            Some("ROOM_NOT_FOUND")
        );
        assert!(matches!(
            collab.auth.validate(&session.token).await,
            Err(SessionError::NotFound)
        ));
    }

    #[test]
    fn test_database_errors_map_to_commands() {
        let missing = DatabaseError::NotFound {
            resource: "room",
            identifier: "id",
        };

        assert_eq!(CommandError::from(missing).code(), "ROOM_NOT_FOUND");

        let conflict = DatabaseError::Conflict {
            resource: "room",
            field: "id",
            value: "x".to_string(),
        };

        assert!(CommandError::from(conflict).is_retryable());
    }
}
