//! The coordinator: wires the hub, the game service and the renderer.
//!
//! The service reports lifecycle changes through callbacks; this module
//! turns each one into the fragments the affected participants need.
//! Nothing here blocks: service calls are in-memory and every broadcast
//! is a command queued on the hub.

use std::sync::Arc;

use parlor_game::{Game, GameOf, GamePlugin, GameService, GameStatus, Player};
use parlor_hub::{Hub, Identity, Participant, User, WrapFn};
use parlor_protocol::{Data, GameId, Renderer, UserId};
use parlor_transport::{ConnectionConfig, Socket};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::handler::UserEvents;
use crate::ParlorError;

/// Fragment names pushed to clients.
pub mod fragment {
    pub const SELECT_GAME: &str = "select-game";
    pub const GAME_LAYOUT: &str = "game-layout";
    pub const PLAYERS: &str = "players";
    pub const BOARD: &str = "board";
    pub const INFO: &str = "info";
    pub const ERROR: &str = "error";
    pub const USER: &str = "user";
}

/// Runs one game variant for every connected user.
pub struct GameServer<P: GamePlugin> {
    pub(crate) hub: Hub<User>,
    pub(crate) service: Arc<GameService<P>>,
    config: ConnectionConfig,
    connecting: Mutex<()>,
}

impl<P: GamePlugin> GameServer<P> {
    /// Builds the coordinator and spawns its hub. Must be called inside a
    /// Tokio runtime.
    pub fn new(plugin: P, renderer: Arc<dyn Renderer>, config: ConnectionConfig) -> Arc<Self> {
        let service = Arc::new(GameService::new(plugin));
        let hub = Hub::with_wrap(renderer, game_wrap(Arc::clone(&service)));
        let server = Arc::new(Self {
            hub,
            service: Arc::clone(&service),
            config,
            connecting: Mutex::new(()),
        });

        let weak = Arc::downgrade(&server);
        service.on_join(move |game, user_id| {
            if let Some(server) = weak.upgrade() {
                server.joined(game, user_id);
            }
        });
        let weak = Arc::downgrade(&server);
        service.on_game(move |game| {
            if let Some(server) = weak.upgrade() {
                server.game_changed(game);
            }
        });
        let weak = Arc::downgrade(&server);
        service.on_leave(move |game, user_id| {
            if let Some(server) = weak.upgrade() {
                server.left(game, user_id);
            }
        });

        server
    }

    pub fn hub(&self) -> &Hub<User> {
        &self.hub
    }

    pub fn service(&self) -> &GameService<P> {
        &self.service
    }

    /// Attaches `socket` to the user named by `identity`, registering the
    /// user on first sight, then sends the page they should land on.
    pub async fn connect<S: Socket>(
        self: &Arc<Self>,
        identity: Identity,
        socket: S,
    ) -> Result<Arc<User>, ParlorError> {
        let user = {
            let _guard = self.connecting.lock().await;
            match self.hub.get(&identity.user_id) {
                Ok(user) => {
                    user.set_profile(identity.profile);
                    user
                }
                Err(_) => {
                    let handler = Arc::new(UserEvents::new(
                        identity.user_id.clone(),
                        Arc::downgrade(self),
                    ));
                    let user = Arc::new(User::new(
                        identity.user_id,
                        identity.profile,
                        self.config.clone(),
                        handler,
                    ));
                    self.hub.register(Arc::clone(&user));
                    self.hub.flush().await?;
                    user
                }
            }
        };

        user.connect(socket).await;
        info!(user_id = %user.id(), game_id = ?user.game_id(), "user connected");
        self.send_landing(&user);
        Ok(user)
    }

    /// The lobby for users without a game, the game screen otherwise.
    fn send_landing(&self, user: &User) {
        if let Some(game_id) = user.game_id() {
            match self.service.get_game(&game_id) {
                Ok(game) if game.has_player(user.id()) => {
                    self.hub.broadcast_to_user(fragment::GAME_LAYOUT, user.id(), Data::new());
                    self.hub.broadcast_to_user(fragment::PLAYERS, user.id(), self.players_data(&game));
                    self.hub.broadcast_to_user(fragment::BOARD, user.id(), board_data(&game));
                    return;
                }
                _ => {
                    debug!(user_id = %user.id(), %game_id, "stale game reference cleared");
                    user.unset_game_id();
                }
            }
        }
        let service = Arc::clone(&self.service);
        self.hub
            .broadcast_to_user_with(fragment::SELECT_GAME, user.id(), move |u: &User| {
                Some(lobby_data(&service, u.id()))
            });
    }

    // -- Service callbacks -------------------------------------------------
    //
    // Seats are written directly on the user before the matching fragments
    // are enqueued, so the next inbound action already sees them.

    fn joined(&self, game: &GameOf<P>, user_id: &UserId) {
        if let Ok(user) = self.hub.get(user_id) {
            user.set_game_id(game.id().clone());
        }
        self.hub.broadcast_to_user(fragment::GAME_LAYOUT, user_id, Data::new());
        self.game_changed(game);
    }

    fn game_changed(&self, game: &GameOf<P>) {
        self.hub
            .broadcast_to_game_players(fragment::PLAYERS, game.id(), self.players_data(game));
        self.hub
            .broadcast_to_game_players(fragment::BOARD, game.id(), board_data(game));
        self.broadcast_lobby();
    }

    /// The leaver is back in the lobby, so the lobby broadcast reaches them
    /// along with everyone else browsing.
    fn left(&self, game: &GameOf<P>, user_id: &UserId) {
        if let Ok(user) = self.hub.get(user_id) {
            user.unset_game_id();
        }
        self.game_changed(game);
    }

    /// Called when a user's connection goes up or down.
    pub(crate) fn user_changed(&self, user_id: &UserId) {
        let Ok(user) = self.hub.get(user_id) else {
            return;
        };
        self.hub.broadcast_to_user(fragment::USER, user_id, Data::new());
        if let Some(game_id) = user.game_id() {
            if let Ok(game) = self.service.get_game(&game_id) {
                self.hub
                    .broadcast_to_game_players(fragment::PLAYERS, &game_id, self.players_data(&game));
            }
        }
        self.broadcast_lobby();
    }

    /// Clears every reference to a deleted game.
    pub(crate) fn game_deleted(&self, game_id: &GameId) {
        for user in self.hub.filter(|u| u.game_id().as_ref() == Some(game_id)) {
            user.unset_game_id();
        }
        self.broadcast_lobby();
    }

    /// Announces the outcome of a finished game to its players.
    pub(crate) fn announce_results(&self, game: &GameOf<P>) {
        let winners: Vec<&str> = game.winners().map(|p| p.profile.name.as_str()).collect();
        let info = match winners.as_slice() {
            [] => "tie".to_owned(),
            [one] => format!("{one} wins"),
            many => format!("{} win", many.join(", ")),
        };
        info!(game_id = %game.id(), %info, "game over");
        self.hub.broadcast_to_game_players(
            fragment::INFO,
            game.id(),
            Data::new().with("info", info).with("winners", winners),
        );
    }

    fn broadcast_lobby(&self) {
        let service = Arc::clone(&self.service);
        self.hub
            .broadcast_to_not_playing_with(fragment::SELECT_GAME, move |u: &User| {
                Some(lobby_data(&service, u.id()))
            });
    }

    // -- Fragment data -----------------------------------------------------

    fn players_data(&self, game: &GameOf<P>) -> Data {
        let players: Vec<Seated<'_, P::Seat>> = game
            .players()
            .map(|player| Seated {
                active: self
                    .hub
                    .get(player.user_id())
                    .map(|u| u.is_active())
                    .unwrap_or(false),
                current: game.is_round_player(player.user_id()),
                player,
            })
            .collect();
        Data::new().with("players", players)
    }
}

#[derive(Serialize)]
struct Seated<'a, S> {
    #[serde(flatten)]
    player: &'a Player<S>,
    active: bool,
    current: bool,
}

#[derive(Serialize)]
struct GameSummary<'a> {
    id: &'a GameId,
    status: GameStatus,
    created_at: u64,
    players: Vec<&'a str>,
}

fn summaries<B, S>(games: &[Game<B, S>]) -> Vec<GameSummary<'_>> {
    games
        .iter()
        .map(|game| GameSummary {
            id: game.id(),
            status: game.status(),
            created_at: game.created_at(),
            players: game.players().map(|p| p.profile.name.as_str()).collect(),
        })
        .collect()
}

fn lobby_data<P: GamePlugin>(service: &GameService<P>, user_id: &UserId) -> Data {
    let joinable = service.joinable_games();
    let mine = service.non_joinable_games(user_id);
    Data::new()
        .with("joinable_games", summaries(&joinable))
        .with("user_games", summaries(&mine))
}

fn board_data<B: Serialize, S>(game: &Game<B, S>) -> Data {
    Data::new()
        .with("board", game.board())
        .with("status", game.status())
        .with("round", game.round())
        .with("round_players", game.round_player_ids())
}

/// Adds the recipient's language, game and seat to every payload, and
/// vetoes delivery when the referenced game or seat is gone.
fn game_wrap<P: GamePlugin>(service: Arc<GameService<P>>) -> WrapFn<User> {
    Arc::new(move |mut data: Data, user: &User| {
        data.insert("lang", user.profile().language.as_str());
        let Some(game_id) = user.game_id() else {
            return Some(data);
        };
        let game = service.get_game(&game_id).ok()?;
        let player = game.player(user.id())?;
        data.insert("player", player);
        data.insert("game", &game);
        Some(data)
    })
}
