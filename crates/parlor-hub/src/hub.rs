//! The hub actor: sole writer of the participant registry and sole
//! dispatcher of broadcasts.
//!
//! Every mutation and every broadcast is a command on one channel,
//! processed in order by a single task. Reads (`get`, `participants`)
//! go straight to the registry under a read lock and never wait for the
//! loop.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use parlor_protocol::{Data, GameId, PlayerId, RenderError, Renderer, UserId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::{HubError, Participant};

/// Hook run on every outgoing payload after the hub has merged the
/// recipient in. Returning `None` vetoes delivery to that recipient.
pub type WrapFn<P> = Arc<dyn Fn(Data, &P) -> Option<Data> + Send + Sync>;

type FilterFn<P> = Box<dyn Fn(&P) -> bool + Send + Sync>;
type PayloadFn<P> = Box<dyn Fn(&P) -> Option<Data> + Send + Sync>;
type RenderFn = Box<dyn Fn(&Data) -> Result<Vec<u8>, RenderError> + Send + Sync>;
type UpdateFn<P> = Box<dyn FnOnce(&P) + Send>;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

enum Payload<P> {
    /// The same data for everyone (copied per recipient).
    Shared(Data),
    /// Built per recipient; `None` skips that recipient.
    PerParticipant(PayloadFn<P>),
}

enum Render {
    Fragment(String),
    Custom(RenderFn),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    User,
    Player,
}

struct Broadcast<P> {
    filter: FilterFn<P>,
    payload: Payload<P>,
    render: Render,
    scope: Scope,
}

enum HubCommand<P> {
    Register(Arc<P>),
    Unregister(UserId),
    Update(UserId, UpdateFn<P>),
    Broadcast(Broadcast<P>),
    Flush(oneshot::Sender<()>),
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct HubShared<P> {
    registry: RwLock<HashMap<UserId, Arc<P>>>,
    renderer: Arc<dyn Renderer>,
    wrap: Option<WrapFn<P>>,
}

impl<P: Participant> HubShared<P> {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<UserId, Arc<P>>> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, participant: Arc<P>) {
        let id = participant.id().clone();
        let replaced = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), participant)
            .is_some();
        info!(user_id = %id, replaced, "participant registered");
    }

    fn remove(&self, id: &UserId) {
        let removed = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if removed {
            info!(user_id = %id, "participant unregistered");
        } else {
            debug!(user_id = %id, "unregister for unknown participant");
        }
    }

    fn update(&self, id: &UserId, update: UpdateFn<P>) {
        let participant = self.read().get(id).cloned();
        match participant {
            Some(participant) => update(&participant),
            None => debug!(user_id = %id, "update for unknown participant"),
        }
    }

    /// Merges the recipient into `data` and runs the construction hook.
    fn wrap(&self, mut data: Data, participant: &P, scope: Scope) -> Option<Data> {
        data.insert("user", participant);
        if let Some(game_id) = participant.game_id() {
            data.insert("game_id", game_id);
        }
        if scope == Scope::Player {
            if let Some(player_id) = participant.player_id() {
                data.insert("player_id", player_id);
            }
        }
        match &self.wrap {
            Some(wrap) => wrap(data, participant),
            None => Some(data),
        }
    }

    fn render(&self, render: &Render, data: &Data) -> Result<Vec<u8>, RenderError> {
        match render {
            Render::Fragment(name) => self.renderer.render(name, data),
            Render::Custom(f) => f(data),
        }
    }

    /// Delivers one broadcast. A failure for one recipient is logged and
    /// never stops delivery to the others.
    async fn fan_out(&self, broadcast: Broadcast<P>) {
        let recipients: Vec<Arc<P>> = {
            let registry = self.read();
            registry
                .values()
                .filter(|p| p.is_active() && (broadcast.filter)(p.as_ref()))
                .cloned()
                .collect()
        };

        let fragment = match &broadcast.render {
            Render::Fragment(name) => name.as_str(),
            Render::Custom(_) => "<custom>",
        };
        trace!(fragment, recipients = recipients.len(), "broadcast");

        for participant in recipients {
            let data = match &broadcast.payload {
                Payload::Shared(data) => data.clone(),
                Payload::PerParticipant(build) => match build(&participant) {
                    Some(data) => data,
                    None => continue,
                },
            };
            let Some(data) = self.wrap(data, &participant, broadcast.scope) else {
                trace!(user_id = %participant.id(), fragment, "delivery vetoed");
                continue;
            };
            let bytes = match self.render(&broadcast.render, &data) {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(user_id = %participant.id(), fragment, error = %e, "render failed");
                    continue;
                }
            };
            if bytes.is_empty() {
                continue;
            }
            if let Err(e) = participant.connection().send(bytes).await {
                debug!(user_id = %participant.id(), fragment, error = %e, "delivery failed");
            }
        }
    }
}

async fn run<P: Participant>(shared: Arc<HubShared<P>>, mut commands: mpsc::UnboundedReceiver<HubCommand<P>>) {
    debug!("hub loop started");
    while let Some(command) = commands.recv().await {
        match command {
            HubCommand::Register(participant) => shared.insert(participant),
            HubCommand::Unregister(id) => shared.remove(&id),
            HubCommand::Update(id, update) => shared.update(&id, update),
            HubCommand::Broadcast(broadcast) => shared.fan_out(broadcast).await,
            HubCommand::Flush(reply) => {
                let _ = reply.send(());
            }
        }
    }
    debug!("hub loop stopped");
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to the hub. Cheap to clone; the loop runs until every handle
/// is dropped.
///
/// All mutating and broadcasting methods enqueue a command and return
/// immediately. Commands are processed in the order they were enqueued,
/// so a broadcast issued after a register reaches the new participant.
pub struct Hub<P: Participant> {
    commands: mpsc::UnboundedSender<HubCommand<P>>,
    shared: Arc<HubShared<P>>,
}

impl<P: Participant> Clone for Hub<P> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<P: Participant> Hub<P> {
    /// Spawns the hub loop. Must be called inside a Tokio runtime.
    pub fn new(renderer: Arc<dyn Renderer>) -> Self {
        Self::spawn(renderer, None)
    }

    /// Like [`new`](Self::new), with a construction hook applied to every
    /// payload after the recipient has been merged in.
    pub fn with_wrap(renderer: Arc<dyn Renderer>, wrap: WrapFn<P>) -> Self {
        Self::spawn(renderer, Some(wrap))
    }

    fn spawn(renderer: Arc<dyn Renderer>, wrap: Option<WrapFn<P>>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(HubShared {
            registry: RwLock::new(HashMap::new()),
            renderer,
            wrap,
        });
        tokio::spawn(run(Arc::clone(&shared), rx));
        Self {
            commands: tx,
            shared,
        }
    }

    fn enqueue(&self, command: HubCommand<P>) {
        if self.commands.send(command).is_err() {
            warn!("hub loop is gone, command dropped");
        }
    }

    // -- Registry ----------------------------------------------------------

    /// Adds or replaces a participant (keyed by its id).
    pub fn register(&self, participant: Arc<P>) {
        self.enqueue(HubCommand::Register(participant));
    }

    pub fn unregister(&self, id: &UserId) {
        self.enqueue(HubCommand::Unregister(id.clone()));
    }

    /// Applies `update` to participant `id` on the loop, after every
    /// command enqueued before it and before any enqueued after it.
    pub fn update(&self, id: &UserId, update: impl FnOnce(&P) + Send + 'static) {
        self.enqueue(HubCommand::Update(id.clone(), Box::new(update)));
    }

    /// Waits until every command enqueued before this call has been
    /// processed.
    pub async fn flush(&self) -> Result<(), HubError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(HubCommand::Flush(tx))
            .map_err(|_| HubError::Unavailable)?;
        rx.await.map_err(|_| HubError::Unavailable)
    }

    pub fn get(&self, id: &UserId) -> Result<Arc<P>, HubError> {
        self.shared
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| HubError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.shared.read().contains_key(id)
    }

    /// Snapshot of every registered participant.
    pub fn participants(&self) -> Vec<Arc<P>> {
        self.shared.read().values().cloned().collect()
    }

    /// Snapshot of the participants matching `predicate`.
    pub fn filter(&self, predicate: impl Fn(&P) -> bool) -> Vec<Arc<P>> {
        self.shared
            .read()
            .values()
            .filter(|p| predicate(p))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.shared.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.read().is_empty()
    }

    // -- Broadcasts --------------------------------------------------------

    fn broadcast(
        &self,
        scope: Scope,
        render: Render,
        filter: FilterFn<P>,
        payload: Payload<P>,
    ) {
        self.enqueue(HubCommand::Broadcast(Broadcast {
            filter,
            payload,
            render,
            scope,
        }));
    }

    /// Renders `name` for one user.
    pub fn broadcast_to_user(&self, name: &str, id: &UserId, data: Data) {
        let id = id.clone();
        self.broadcast(
            Scope::User,
            Render::Fragment(name.to_owned()),
            Box::new(move |p| *p.id() == id),
            Payload::Shared(data),
        );
    }

    pub fn broadcast_to_user_with(
        &self,
        name: &str,
        id: &UserId,
        build: impl Fn(&P) -> Option<Data> + Send + Sync + 'static,
    ) {
        let id = id.clone();
        self.broadcast(
            Scope::User,
            Render::Fragment(name.to_owned()),
            Box::new(move |p| *p.id() == id),
            Payload::PerParticipant(Box::new(build)),
        );
    }

    /// Renders `name` for one seat. Reaches the user only while they still
    /// sit in that game.
    pub fn broadcast_to_player(&self, name: &str, id: &PlayerId, data: Data) {
        let id = id.clone();
        self.broadcast(
            Scope::Player,
            Render::Fragment(name.to_owned()),
            Box::new(move |p| p.player_id().as_ref() == Some(&id)),
            Payload::Shared(data),
        );
    }

    /// Renders `name` for every active participant.
    pub fn broadcast_to_users(&self, name: &str, data: Data) {
        self.broadcast(
            Scope::User,
            Render::Fragment(name.to_owned()),
            Box::new(|_| true),
            Payload::Shared(data),
        );
    }

    pub fn broadcast_to_users_with(
        &self,
        name: &str,
        build: impl Fn(&P) -> Option<Data> + Send + Sync + 'static,
    ) {
        self.broadcast(
            Scope::User,
            Render::Fragment(name.to_owned()),
            Box::new(|_| true),
            Payload::PerParticipant(Box::new(build)),
        );
    }

    /// Renders `name` for every active participant sitting in a game.
    pub fn broadcast_to_players(&self, name: &str, data: Data) {
        self.broadcast(
            Scope::Player,
            Render::Fragment(name.to_owned()),
            Box::new(|p| p.game_id().is_some()),
            Payload::Shared(data),
        );
    }

    /// Renders `name` for every active participant browsing the lobby.
    pub fn broadcast_to_not_playing(&self, name: &str, data: Data) {
        self.broadcast(
            Scope::User,
            Render::Fragment(name.to_owned()),
            Box::new(|p| p.game_id().is_none()),
            Payload::Shared(data),
        );
    }

    pub fn broadcast_to_not_playing_with(
        &self,
        name: &str,
        build: impl Fn(&P) -> Option<Data> + Send + Sync + 'static,
    ) {
        self.broadcast(
            Scope::User,
            Render::Fragment(name.to_owned()),
            Box::new(|p| p.game_id().is_none()),
            Payload::PerParticipant(Box::new(build)),
        );
    }

    /// Alias of [`broadcast_to_players`](Self::broadcast_to_players) in
    /// participant terms.
    pub fn broadcast_to_playing(&self, name: &str, data: Data) {
        self.broadcast_to_players(name, data);
    }

    /// Renders `name` for every active participant currently in `game_id`.
    pub fn broadcast_to_game_players(&self, name: &str, game_id: &GameId, data: Data) {
        let game_id = game_id.clone();
        self.broadcast(
            Scope::Player,
            Render::Fragment(name.to_owned()),
            Box::new(move |p| p.game_id().as_ref() == Some(&game_id)),
            Payload::Shared(data),
        );
    }

    pub fn broadcast_to_game_players_with(
        &self,
        name: &str,
        game_id: &GameId,
        build: impl Fn(&P) -> Option<Data> + Send + Sync + 'static,
    ) {
        let game_id = game_id.clone();
        self.broadcast(
            Scope::Player,
            Render::Fragment(name.to_owned()),
            Box::new(move |p| p.game_id().as_ref() == Some(&game_id)),
            Payload::PerParticipant(Box::new(build)),
        );
    }

    /// Delivers to every active participant accepted by `filter`, rendering
    /// with `render` instead of the hub's renderer.
    pub fn broadcast_render(
        &self,
        filter: impl Fn(&P) -> bool + Send + Sync + 'static,
        data: Data,
        render: impl Fn(&Data) -> Result<Vec<u8>, RenderError> + Send + Sync + 'static,
    ) {
        self.broadcast(
            Scope::User,
            Render::Custom(Box::new(render)),
            Box::new(filter),
            Payload::Shared(data),
        );
    }
}
