use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use cuevote_core::{ListenerId, PlaybackTicket, RoomEvent, RoomState};
use log::{debug, info, warn};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

use crate::{CollabContext, RoomData};

use super::{RoomActivity, RoomCommand, RoomHandle};

/// Owns the state of one room and applies its commands one at a time
pub(crate) struct RoomActor {
    context: CollabContext,
    data: Arc<RoomData>,
    state: RoomState,
    activity: Arc<RoomActivity>,
    subscribers: HashMap<ListenerId, mpsc::UnboundedSender<RoomEvent>>,
    /// Posts timer commands back into the mailbox without keeping the room alive
    mailbox: mpsc::WeakUnboundedSender<RoomCommand>,
    timer: Option<(u64, JoinHandle<()>)>,
    last_persisted: Option<Instant>,
}

impl RoomActor {
    /// Spawns an actor for the room, returning the handle to reach it
    pub fn spawn(context: &CollabContext, data: RoomData) -> RoomHandle {
        let (sender, receiver) = mpsc::unbounded_channel();
        let data = Arc::new(data);
        let activity = Arc::new(RoomActivity::new());

        let actor = Self {
            context: context.clone(),
            state: RoomState::new(data.owner_id.clone(), &context.config),
            data: data.clone(),
            activity: activity.clone(),
            subscribers: HashMap::new(),
            mailbox: sender.downgrade(),
            timer: None,
            last_persisted: None,
        };

        info!("Loaded room {} ({})", actor.data.name, actor.data.id);
        tokio::spawn(actor.run(receiver));

        RoomHandle::new(data, sender, activity)
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<RoomCommand>) {
        while let Some(command) = receiver.recv().await {
            if !self.handle(command) {
                break;
            }
        }

        if let Some((_, timer)) = self.timer.take() {
            timer.abort();
        }

        info!("Unloaded room {} ({})", self.data.name, self.data.id);
    }

    /// Applies a single command. Returns false if the actor should stop.
    fn handle(&mut self, command: RoomCommand) -> bool {
        match command {
            RoomCommand::Join { listener, events } => {
                let listener_id = listener.id;
                let (snapshot, broadcast) = self.state.join(listener);

                events.send(RoomEvent::Snapshot(snapshot)).ok();
                self.subscribers.insert(listener_id, events);

                self.broadcast(broadcast);
                self.sync_listeners();
                self.touch();
            }
            RoomCommand::Leave { listener_id } => {
                self.subscribers.remove(&listener_id);

                let events = self.state.leave(listener_id);
                self.broadcast(events);
                self.sync_listeners();
                self.touch();
            }
            RoomCommand::Suggest {
                identity,
                metadata,
                reply,
            } => {
                let result =
                    self.state
                        .suggest(&identity, metadata, Instant::now().into_std(), Utc::now());

                let result = match result {
                    Ok((track, events)) => {
                        debug!(
                            "{} suggested {} in {}",
                            identity.display_name(),
                            track.metadata.title,
                            self.data.name
                        );

                        self.apply(events);
                        Ok(track)
                    }
                    Err(e) => {
                        debug!("Rejected suggestion in {}: {}", self.data.name, e);
                        Err(e)
                    }
                };

                reply.send(result).ok();
            }
            RoomCommand::Vote {
                identity,
                track_id,
                vote,
                reply,
            } => {
                let result = self
                    .state
                    .vote(&identity, track_id, vote)
                    .map(|events| self.apply(events));

                reply.send(result).ok();
            }
            RoomCommand::Delete {
                identity,
                track_id,
                reply,
            } => {
                let result = self
                    .state
                    .delete(&identity, track_id, Utc::now())
                    .map(|events| self.apply(events));

                reply.send(result).ok();
            }
            RoomCommand::Advance { generation } => {
                let events = self.state.advance(generation, Utc::now());

                if events.is_empty() {
                    debug!("Discarded stale advance in {}", self.data.name);
                } else {
                    self.apply(events);
                }
            }
            RoomCommand::Snapshot { viewer, reply } => {
                reply.send(self.state.snapshot(&viewer.key())).ok();
            }
            RoomCommand::Shutdown => return false,
        }

        true
    }

    /// Fans out the events of an accepted command and reacts to playback changes
    fn apply(&mut self, events: Vec<RoomEvent>) {
        for event in &events {
            if let RoomEvent::NowPlaying { track, .. } = event {
                match track {
                    Some(track) => info!("Now playing {} in {}", track.metadata.title, self.data.name),
                    None => info!("Queue in {} is exhausted", self.data.name),
                }
            }
        }

        self.broadcast(events);
        self.arm_timer();
        self.touch();
    }

    fn broadcast(&mut self, events: Vec<RoomEvent>) {
        for event in events {
            for subscriber in self.subscribers.values() {
                subscriber.send(event.clone()).ok();
            }
        }
    }

    /// Makes sure exactly one timer runs for the current playback generation
    fn arm_timer(&mut self) {
        let ticket = self.state.playback_ticket();

        let is_armed = matches!(
            (&self.timer, ticket),
            (Some((armed, _)), Some(ticket)) if *armed == ticket.generation
        );

        if is_armed {
            return;
        }

        if let Some((_, timer)) = self.timer.take() {
            timer.abort();
        }

        if let Some(PlaybackTicket {
            generation,
            duration,
        }) = ticket
        {
            let mailbox = self.mailbox.clone();

            let timer = tokio::spawn(async move {
                time::sleep(duration).await;

                if let Some(sender) = mailbox.upgrade() {
                    sender.send(RoomCommand::Advance { generation }).ok();
                }
            });

            self.timer = Some((generation, timer));
        }
    }

    fn sync_listeners(&self) {
        self.activity.listeners.store(self.state.listener_count());
    }

    /// Records activity, persisting it at most once per debounce interval
    fn touch(&mut self) {
        let now = Instant::now();
        self.activity.last_active.store(now);

        let debounced = self
            .last_persisted
            .is_some_and(|at| now.duration_since(at) < self.context.config.activity_debounce);

        if debounced {
            return;
        }

        self.last_persisted = Some(now);

        let database = self.context.database.clone();
        let room_id = self.data.id.clone();

        tokio::spawn(async move {
            if let Err(e) = database.update_room_activity(&room_id, Utc::now()).await {
                warn!("Failed to persist activity of room {}: {}", room_id, e);
            }
        });
    }
}
