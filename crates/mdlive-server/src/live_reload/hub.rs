//! Broadcast hub for live reload clients.
//!
//! The hub is an actor: a single task owns the client registry and processes
//! register, unregister and publish commands in submission order. Callers
//! hold a cloneable [`Hub`] handle and never touch the registry directly.
//!
//! ```text
//! ChangeDetector --publish--> Hub task --try_send--> client channel --> event stream
//!                                ^
//! refresh handler --register/unregister--+
//! ```

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Capacity of each client's delivery channel.
///
/// A client that falls this far behind has further messages dropped until
/// it catches up.
pub(crate) const CLIENT_CHANNEL_CAPACITY: usize = 8;

/// Opaque identifier of one registered client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Receiving side of one client registration.
///
/// The channel closes once the hub has removed the client from its registry.
#[derive(Debug)]
pub struct ClientRegistration {
    id: ClientId,
    receiver: mpsc::Receiver<String>,
}

impl ClientRegistration {
    /// Identifier to pass to [`Hub::unregister`].
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Wait for the next message.
    ///
    /// Returns `None` after the client has been unregistered.
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Requests processed by the hub task.
#[derive(Debug)]
enum HubCommand {
    Register {
        id: ClientId,
        sender: mpsc::Sender<String>,
    },
    Unregister(ClientId),
    Publish(String),
    ClientCount(oneshot::Sender<usize>),
    CloseAll,
}

/// Handle to the broadcast hub task.
///
/// Cloning is cheap. The task stops once every handle has been dropped.
#[derive(Clone, Debug)]
pub struct Hub {
    commands: mpsc::UnboundedSender<HubCommand>,
}

impl Hub {
    /// Spawn the hub task on the current tokio runtime.
    #[must_use]
    pub fn spawn() -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        tokio::spawn(HubActor::new(receiver).run());
        Self { commands }
    }

    /// Register a new client.
    ///
    /// The client receives every message published after this call.
    #[must_use]
    pub fn register(&self) -> ClientRegistration {
        let (sender, receiver) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        let id = ClientId::new();
        self.submit(HubCommand::Register { id, sender });
        ClientRegistration { id, receiver }
    }

    /// Remove a client and close its channel.
    ///
    /// Unknown or already removed ids are ignored.
    pub fn unregister(&self, id: ClientId) {
        self.submit(HubCommand::Unregister(id));
    }

    /// Deliver a message to every currently registered client.
    pub fn publish(&self, message: impl Into<String>) {
        self.submit(HubCommand::Publish(message.into()));
    }

    /// Remove every client and close all channels.
    ///
    /// The hub stays closed: later registrations get an already closed
    /// channel.
    pub fn close_all(&self) {
        self.submit(HubCommand::CloseAll);
    }

    /// Number of registered clients once all earlier commands are processed.
    pub async fn client_count(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        self.submit(HubCommand::ClientCount(tx));
        rx.await.unwrap_or(0)
    }

    fn submit(&self, command: HubCommand) {
        if self.commands.send(command).is_err() {
            tracing::debug!("Hub task has stopped, dropping command");
        }
    }
}

/// State owned by the hub task.
struct HubActor {
    commands: mpsc::UnboundedReceiver<HubCommand>,
    clients: HashMap<ClientId, mpsc::Sender<String>>,
    closed: bool,
}

impl HubActor {
    fn new(commands: mpsc::UnboundedReceiver<HubCommand>) -> Self {
        Self {
            commands,
            clients: HashMap::new(),
            closed: false,
        }
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }
        tracing::debug!("Hub task stopped");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Register { id, .. } if self.closed => {
                // Dropping the sender closes the new client's channel.
                tracing::debug!(client = %id, "Hub is closed, rejecting client");
            }
            HubCommand::Register { id, sender } => {
                self.clients.insert(id, sender);
                tracing::info!(client = %id, clients = self.clients.len(), "Added new client");
            }
            HubCommand::Unregister(id) => {
                // Dropping the sender closes the client's channel.
                if self.clients.remove(&id).is_some() {
                    tracing::info!(client = %id, clients = self.clients.len(), "Removed client");
                } else {
                    tracing::debug!(client = %id, "Ignoring unregister of unknown client");
                }
            }
            HubCommand::Publish(message) => self.broadcast(&message),
            HubCommand::ClientCount(reply) => {
                let _ = reply.send(self.clients.len());
            }
            HubCommand::CloseAll => {
                let closed = self.clients.len();
                self.clients.clear();
                self.closed = true;
                tracing::info!(clients = closed, "Closed all clients");
            }
        }
    }

    /// Offer a message to every client without waiting on any of them.
    fn broadcast(&mut self, message: &str) {
        let mut delivered = 0usize;
        let mut gone = Vec::new();

        for (id, sender) in &self.clients {
            match sender.try_send(message.to_owned()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(client = %id, "Client is not keeping up, dropping message");
                }
                Err(TrySendError::Closed(_)) => gone.push(*id),
            }
        }

        for id in gone {
            self.clients.remove(&id);
            tracing::debug!(client = %id, "Removed client with closed channel");
        }

        tracing::info!(clients = delivered, "Broadcast message");
    }
}
