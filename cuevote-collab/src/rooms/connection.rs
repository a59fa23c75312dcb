use cuevote_core::{ListenerId, RoomEvent};
use tokio::sync::mpsc;

use super::{RoomCommand, RoomHandle};

/// A subscription to a room, which when dropped removes the listener from the room
pub struct RoomConnection {
    room: RoomHandle,
    listener_id: ListenerId,
    events: mpsc::UnboundedReceiver<RoomEvent>,
}

impl RoomConnection {
    pub(crate) fn new(
        room: RoomHandle,
        listener_id: ListenerId,
        events: mpsc::UnboundedReceiver<RoomEvent>,
    ) -> Self {
        Self {
            room,
            listener_id,
            events,
        }
    }

    /// Waits for the next room event. Returns [None] once the room is unloaded.
    pub async fn next_event(&mut self) -> Option<RoomEvent> {
        self.events.recv().await
    }

    pub fn room(&self) -> &RoomHandle {
        &self.room
    }

    pub fn listener_id(&self) -> ListenerId {
        self.listener_id
    }
}

impl Drop for RoomConnection {
    fn drop(&mut self) {
        self.room
            .send(RoomCommand::Leave {
                listener_id: self.listener_id,
            })
            .ok();
    }
}
