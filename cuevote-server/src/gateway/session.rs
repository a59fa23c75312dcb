use cuevote_collab::{RoomConnection, RoomHandle};
use cuevote_core::{CommandError, CommandResult, Identity};
use log::{debug, info};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use tokio::{sync::mpsc, task::JoinHandle};
use validator::Validate;

use crate::{serialized::ToSerialized, ServerContext};

use super::{ClientMessage, ServerEvent, ServerMessage};

pub type Outgoing = mpsc::UnboundedSender<ServerMessage>;

/// The state of one gateway connection: who it is, and which room it listens to
pub struct GatewaySession {
    context: ServerContext,
    identity: Identity,
    token: Option<String>,
    outgoing: Outgoing,
    subscription: Option<Subscription>,
}

/// Forwards room events to the connection until dropped
struct Subscription {
    room: RoomHandle,
    task: JoinHandle<()>,
}

impl Subscription {
    fn new(mut connection: RoomConnection, outgoing: Outgoing) -> Self {
        let room = connection.room().clone();
        let data = room.data().clone();

        let task = tokio::spawn(async move {
            while let Some(event) = connection.next_event().await {
                if outgoing
                    .send(ServerMessage::from_room_event(event, &data))
                    .is_err()
                {
                    break;
                }
            }
        });

        Self { room, task }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Dropping the task drops the connection, which leaves the room
        self.task.abort();
    }
}

const GUEST_ID_LENGTH: usize = 16;

fn guest_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GUEST_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// A guest id doubles as the guest's credential, so it must be hard to guess
fn is_valid_guest_id(id: &str) -> bool {
    (GUEST_ID_LENGTH..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl GatewaySession {
    pub fn new(context: ServerContext, outgoing: Outgoing) -> Self {
        Self {
            context,
            identity: Identity::guest(guest_id()),
            token: None,
            outgoing,
            subscription: None,
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn send(&self, message: impl Into<ServerMessage>) {
        self.outgoing.send(message.into()).ok();
    }

    /// Handles a message from the client. Failures are only reported back to this connection.
    pub async fn handle(&mut self, message: ClientMessage) {
        if let Err(e) = self.dispatch(message).await {
            debug!("Gateway command by {} failed: {}", self.identity.key(), e);
            self.send(ServerMessage::error(&e));
        }
    }

    async fn dispatch(&mut self, message: ClientMessage) -> CommandResult<()> {
        let collab = self.context.collab.clone();

        match message {
            ClientMessage::ResumeSession { token, guest_id } => {
                match collab.auth.validate(&token).await {
                    Ok(session) => {
                        self.identity = session.user.identity();
                        self.token = Some(token);
                        self.send(ServerEvent::LoginSuccess {
                            user: session.user.to_serialized(),
                        });
                    }
                    // Stays a guest without telling the client
                    Err(e) => {
                        debug!("Could not resume session: {}", e);

                        let guest_id = guest_id.filter(|id| is_valid_guest_id(id));

                        if let (Some(id), false) = (guest_id, self.identity.is_authenticated()) {
                            self.identity = Identity::guest(id);
                        }
                    }
                }
            }
            ClientMessage::Logout {} => {
                if let Some(token) = self.token.take() {
                    if let Err(e) = collab.auth.revoke(&token).await {
                        debug!("Could not revoke session: {}", e);
                    }
                }

                self.identity = Identity::guest(guest_id());
                self.send(ServerEvent::LoggedOut);
            }
            ClientMessage::DeleteAccount {} => {
                let user_id = self
                    .identity
                    .user_id()
                    .ok_or_else(|| {
                        CommandError::unauthorized("You must be logged in to delete your account.")
                    })?
                    .to_string();

                self.subscription = None;
                collab.delete_account(&user_id).await?;

                info!("Deleted account {}", user_id);

                self.token = None;
                self.identity = Identity::guest(guest_id());
                self.send(ServerEvent::AccountDeleted);
            }
            ClientMessage::ListRooms { visibility } => {
                let rooms = collab
                    .rooms
                    .list(visibility.unwrap_or_default(), &self.identity)
                    .await?;

                self.send(ServerEvent::RoomList {
                    rooms: rooms.to_serialized(),
                });
            }
            ClientMessage::CreateRoom(schema) => {
                schema
                    .validate()
                    .map_err(|_| CommandError::validation("Room details are invalid."))?;

                let room = collab.rooms.create_room(&self.identity, schema.into()).await?;

                self.send(ServerEvent::RoomCreated(room.to_serialized()));
            }
            ClientMessage::JoinRoom { room_id, password } => {
                // A connection listens to one room at a time
                self.subscription = None;

                let connection = collab
                    .rooms
                    .join_room(&room_id, self.identity.clone(), password.as_deref())
                    .await?;

                self.subscription = Some(Subscription::new(connection, self.outgoing.clone()));
            }
            ClientMessage::LeaveRoom {} => {
                self.subscription = None;
            }
            ClientMessage::SuggestSong { query } => {
                let room = self.room()?.clone();
                let identity = self.identity.clone();
                let outgoing = self.outgoing.clone();

                self.send(ServerMessage::info("Submitted"));

                // Runs to completion even if this connection goes away
                tokio::spawn(async move {
                    if let Err(e) = collab.suggest(&room, &identity, &query).await {
                        debug!("Suggestion {:?} by {} failed: {}", query, identity.key(), e);
                        outgoing.send(ServerMessage::error(&e)).ok();
                    }
                });
            }
            ClientMessage::Vote {
                track_id,
                direction,
            } => {
                self.room()?
                    .vote(self.identity.clone(), track_id, direction)
                    .await?;
            }
            ClientMessage::DeleteSong { track_id } => {
                self.room()?.delete(self.identity.clone(), track_id).await?;
            }
        }

        Ok(())
    }

    fn room(&self) -> CommandResult<&RoomHandle> {
        self.subscription
            .as_ref()
            .map(|s| &s.room)
            .ok_or_else(|| CommandError::validation("You are not in a room."))
    }
}
