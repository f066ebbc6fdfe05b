//! Participants: the logical identities the hub fans out to.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use parlor_protocol::{GameId, PlayerId, Profile, UserId};
use parlor_transport::{Connection, ConnectionConfig, ConnectionHandler, Socket};
use serde::{Serialize, Serializer};

/// Anything the hub can register and deliver to.
///
/// `Serialize` is required because every broadcast merges the recipient
/// into the template data under `"user"`.
pub trait Participant: Serialize + Send + Sync + 'static {
    fn id(&self) -> &UserId;

    /// The game this participant currently sits in, if any.
    fn game_id(&self) -> Option<GameId>;

    /// The connection fragments are delivered through.
    fn connection(&self) -> &Connection;

    /// The participant's seat in its current game.
    fn player_id(&self) -> Option<PlayerId> {
        self.game_id().map(|game_id| PlayerId::new(game_id, self.id().clone()))
    }

    /// `true` iff a live socket is attached.
    fn is_active(&self) -> bool {
        self.connection().is_active()
    }

    /// Active and sitting in a game.
    fn is_playing(&self) -> bool {
        self.is_active() && self.game_id().is_some()
    }

    /// Active and not in any game (browsing the lobby).
    fn is_not_playing(&self) -> bool {
        self.is_active() && self.game_id().is_none()
    }
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

struct UserState {
    profile: Profile,
    game_id: Option<GameId>,
}

/// The standard participant: a browser user with a profile, an optional
/// current game, and one reopenable connection.
///
/// Registry membership is managed by the hub loop; the fields here are
/// the participant's own state and can be updated from anywhere. Game
/// membership is written directly by the coordinator, so reads such as
/// [`Participant::game_id`] always see the latest seat while broadcasts
/// already queued pick it up on delivery.
pub struct User {
    id: UserId,
    state: RwLock<UserState>,
    connection: Connection,
}

impl User {
    /// Creates a user whose connection reports back through `handler`.
    /// The connection starts closed; call [`connect`](Self::connect).
    pub fn new(
        id: UserId,
        profile: Profile,
        config: ConnectionConfig,
        handler: Arc<dyn ConnectionHandler>,
    ) -> Self {
        let connection = Connection::new(id.to_string(), config, handler);
        Self {
            id,
            state: RwLock::new(UserState {
                profile,
                game_id: None,
            }),
            connection,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, UserState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, UserState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn profile(&self) -> Profile {
        self.read().profile.clone()
    }

    pub fn name(&self) -> String {
        self.read().profile.name.clone()
    }

    pub fn set_profile(&self, profile: Profile) {
        self.write().profile = profile;
    }

    pub fn set_name(&self, name: impl Into<String>) {
        self.write().profile.name = name.into();
    }

    /// Seats the user in `game_id` immediately, not through the hub loop.
    ///
    /// Broadcasts resolve targets when the loop delivers them, so any
    /// broadcast still queued sees the new game, including ones enqueued
    /// before this call. Callers set the game before enqueuing that game's
    /// fragments.
    pub fn set_game_id(&self, game_id: GameId) {
        self.write().game_id = Some(game_id);
    }

    /// Clears the current game immediately. Queued game broadcasts no
    /// longer reach this user.
    pub fn unset_game_id(&self) {
        self.write().game_id = None;
    }

    /// Attaches a fresh socket, replacing any previous one.
    pub async fn connect<S: Socket>(&self, socket: S) {
        self.connection.open(socket).await;
    }

    /// Closes the current socket. Registry membership and game seat are
    /// kept, so a reload picks up where the user left off.
    pub async fn disconnect(&self) {
        self.connection.close().await;
    }
}

impl Participant for User {
    fn id(&self) -> &UserId {
        &self.id
    }

    fn game_id(&self) -> Option<GameId> {
        self.read().game_id.clone()
    }

    fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[derive(Serialize)]
struct UserView<'a> {
    id: &'a UserId,
    name: &'a str,
    avatar: u8,
    language: &'static str,
    active: bool,
    game_id: Option<&'a GameId>,
}

impl Serialize for User {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let state = self.read();
        UserView {
            id: &self.id,
            name: &state.profile.name,
            avatar: state.profile.avatar.0,
            language: state.profile.language.as_str(),
            active: self.connection.is_active(),
            game_id: state.game_id.as_ref(),
        }
        .serialize(serializer)
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &state.profile.name)
            .field("game_id", &state.game_id)
            .field("active", &self.connection.is_active())
            .finish()
    }
}
