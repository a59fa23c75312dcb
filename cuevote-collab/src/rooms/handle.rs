use std::sync::Arc;

use crossbeam::atomic::AtomicCell;
use cuevote_core::{
    CommandError, CommandResult, ContentMetadata, Identity, Listener, ListenerId, RoomEvent,
    RoomSnapshot, Track, TrackId, Vote,
};
use tokio::{
    sync::{mpsc, oneshot},
    time::{Duration, Instant},
};

use crate::RoomData;

use super::RoomConnection;

pub type RoomId = String;

/// A message in a room actor's mailbox
pub(crate) enum RoomCommand {
    Join {
        listener: Listener,
        events: mpsc::UnboundedSender<RoomEvent>,
    },
    Leave {
        listener_id: ListenerId,
    },
    Suggest {
        identity: Identity,
        metadata: ContentMetadata,
        reply: oneshot::Sender<CommandResult<Track>>,
    },
    Vote {
        identity: Identity,
        track_id: TrackId,
        vote: Vote,
        reply: oneshot::Sender<CommandResult<()>>,
    },
    Delete {
        identity: Identity,
        track_id: TrackId,
        reply: oneshot::Sender<CommandResult<()>>,
    },
    /// Posted by the playback timer
    Advance {
        generation: u64,
    },
    Snapshot {
        viewer: Identity,
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Shutdown,
}

/// Activity of a room that others can read without going through the mailbox
pub(crate) struct RoomActivity {
    pub listeners: AtomicCell<usize>,
    pub last_active: AtomicCell<Instant>,
}

impl RoomActivity {
    pub fn new() -> Self {
        Self {
            listeners: AtomicCell::new(0),
            last_active: AtomicCell::new(Instant::now()),
        }
    }
}

/// A cheap, cloneable way to talk to a loaded room.
///
/// Every method fails with a room not found error once the room is unloaded.
#[derive(Clone)]
pub struct RoomHandle {
    data: Arc<RoomData>,
    sender: mpsc::UnboundedSender<RoomCommand>,
    activity: Arc<RoomActivity>,
}

impl RoomHandle {
    pub(crate) fn new(
        data: Arc<RoomData>,
        sender: mpsc::UnboundedSender<RoomCommand>,
        activity: Arc<RoomActivity>,
    ) -> Self {
        Self {
            data,
            sender,
            activity,
        }
    }

    /// Subscribes to the room. The first event on the connection is always a snapshot.
    pub fn join(&self, identity: Identity) -> CommandResult<RoomConnection> {
        let listener = Listener::new(identity);
        let listener_id = listener.id;
        let (events, receiver) = mpsc::unbounded_channel();

        self.send(RoomCommand::Join { listener, events })?;

        Ok(RoomConnection::new(self.clone(), listener_id, receiver))
    }

    /// Adds resolved content to the queue
    pub async fn submit(&self, identity: Identity, metadata: ContentMetadata) -> CommandResult<Track> {
        self.request(|reply| RoomCommand::Suggest {
            identity,
            metadata,
            reply,
        })
        .await?
    }

    pub async fn vote(&self, identity: Identity, track_id: TrackId, vote: Vote) -> CommandResult<()> {
        self.request(|reply| RoomCommand::Vote {
            identity,
            track_id,
            vote,
            reply,
        })
        .await?
    }

    pub async fn delete(&self, identity: Identity, track_id: TrackId) -> CommandResult<()> {
        self.request(|reply| RoomCommand::Delete {
            identity,
            track_id,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self, viewer: Identity) -> CommandResult<RoomSnapshot> {
        self.request(|reply| RoomCommand::Snapshot { viewer, reply })
            .await
    }

    pub fn data(&self) -> &RoomData {
        &self.data
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    /// How many connections are subscribed right now
    pub fn listener_count(&self) -> usize {
        self.activity.listeners.load()
    }

    /// How long ago anything happened in the room
    pub fn idle_for(&self) -> Duration {
        self.activity.last_active.load().elapsed()
    }

    /// Returns true if the actor behind this handle has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    pub(crate) fn shutdown(&self) {
        self.sender.send(RoomCommand::Shutdown).ok();
    }

    pub(crate) fn send(&self, command: RoomCommand) -> CommandResult<()> {
        self.sender
            .send(command)
            .map_err(|_| CommandError::not_found("room"))
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> CommandResult<T> {
        let (reply, response) = oneshot::channel();
        self.send(command(reply))?;

        response.await.map_err(|_| CommandError::not_found("room"))
    }
}
