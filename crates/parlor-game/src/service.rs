//! Lifecycle orchestration over a plugin and a store.
//!
//! Every mutating operation runs the same steps: status guard, plugin
//! pre-check, plugin mutation, joinability recomputation, save, then the
//! registered callbacks. Operations are serialized by one service-level
//! lock so concurrent requests against the same game apply one after the
//! other. Callbacks run after the lock is released, on the saved
//! snapshot, and are where the web layer hooks its broadcasts in.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use parlor_protocol::{GameId, UserId};
use tracing::{debug, info};

use crate::{GameError, GameOf, GamePlugin, GameStore, Member, MemoryGameStore};

type MemberCallback<P> = Arc<dyn Fn(&GameOf<P>, &UserId) + Send + Sync>;
type GameCallback<P> = Arc<dyn Fn(&GameOf<P>) + Send + Sync>;

struct Callbacks<P: GamePlugin> {
    on_join: Vec<MemberCallback<P>>,
    on_game: Vec<GameCallback<P>>,
    on_leave: Vec<MemberCallback<P>>,
}

impl<P: GamePlugin> Default for Callbacks<P> {
    fn default() -> Self {
        Self {
            on_join: Vec::new(),
            on_game: Vec::new(),
            on_leave: Vec::new(),
        }
    }
}

/// Runs game lifecycle operations for one variant.
pub struct GameService<P: GamePlugin> {
    plugin: P,
    store: Arc<dyn GameStore<P::Board, P::Seat>>,
    ops: Mutex<()>,
    callbacks: RwLock<Callbacks<P>>,
}

impl<P: GamePlugin> GameService<P> {
    /// A service backed by a fresh [`MemoryGameStore`].
    pub fn new(plugin: P) -> Self {
        Self::with_store(plugin, Arc::new(MemoryGameStore::new()))
    }

    pub fn with_store(plugin: P, store: Arc<dyn GameStore<P::Board, P::Seat>>) -> Self {
        Self {
            plugin,
            store,
            ops: Mutex::new(()),
            callbacks: RwLock::new(Callbacks::default()),
        }
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.ops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Callbacks ---------------------------------------------------------

    /// Called after a member was seated (create or join).
    pub fn on_join(&self, f: impl Fn(&GameOf<P>, &UserId) + Send + Sync + 'static) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .on_join
            .push(Arc::new(f));
    }

    /// Called after the game changed (start, stop, play).
    pub fn on_game(&self, f: impl Fn(&GameOf<P>) + Send + Sync + 'static) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .on_game
            .push(Arc::new(f));
    }

    /// Called after a member left. The game may already be deleted.
    pub fn on_leave(&self, f: impl Fn(&GameOf<P>, &UserId) + Send + Sync + 'static) {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .on_leave
            .push(Arc::new(f));
    }

    fn fire_join(&self, game: &GameOf<P>, user_id: &UserId) {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .on_join
            .clone();
        for f in callbacks {
            f(game, user_id);
        }
    }

    fn fire_game(&self, game: &GameOf<P>) {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .on_game
            .clone();
        for f in callbacks {
            f(game);
        }
    }

    fn fire_leave(&self, game: &GameOf<P>, user_id: &UserId) {
        let callbacks = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .on_leave
            .clone();
        for f in callbacks {
            f(game, user_id);
        }
    }

    // -- Queries -----------------------------------------------------------

    pub fn get_game(&self, id: &GameId) -> Result<GameOf<P>, GameError> {
        self.store.get(id)
    }

    /// Games still accepting players, newest first.
    pub fn joinable_games(&self) -> Vec<GameOf<P>> {
        let mut games: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|g| g.status().is_joinable())
            .collect();
        sort_newest_first(&mut games);
        games
    }

    /// Full, running and finished games `user_id` sits in, newest first.
    pub fn non_joinable_games(&self, user_id: &UserId) -> Vec<GameOf<P>> {
        let mut games: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|g| {
                !g.status().is_joinable()
                    && !g.status().is_marked_for_deletion()
                    && g.has_player(user_id)
            })
            .collect();
        sort_newest_first(&mut games);
        games
    }

    // -- Lifecycle ---------------------------------------------------------

    /// Creates a game with `member` seated in it.
    pub fn create_game(&self, member: &Member) -> Result<GameOf<P>, GameError> {
        let game = {
            let _guard = self.lock();
            self.plugin.can_create_game(member)?;
            let id = self.fresh_id();
            let game = self.plugin.create_game(id, member)?;
            info!(game_id = %game.id(), user_id = %member.user_id, "game created");
            self.save(game)?
        };
        self.fire_join(&game, &member.user_id);
        Ok(game)
    }

    fn fresh_id(&self) -> GameId {
        loop {
            let id = GameId::generate();
            if self.store.get(&id).is_err() {
                return id;
            }
        }
    }

    /// Seats `member` in `game_id`. Joining a game one already sits in
    /// changes nothing but still notifies, so the client re-renders.
    pub fn join_game(&self, game_id: &GameId, member: &Member) -> Result<GameOf<P>, GameError> {
        let game = {
            let _guard = self.lock();
            let mut game = self.store.get(game_id)?;
            game.status().can_join()?;
            if game.has_player(&member.user_id) {
                debug!(%game_id, user_id = %member.user_id, "already in game");
                game
            } else {
                self.plugin.can_join_game(&game, member)?;
                self.plugin.join_game(&mut game, member)?;
                game.update_join_status();
                info!(%game_id, user_id = %member.user_id, status = %game.status(), "player joined");
                self.save(game)?
            }
        };
        self.fire_join(&game, &member.user_id);
        Ok(game)
    }

    pub fn start_game(&self, game_id: &GameId, user_id: &UserId) -> Result<GameOf<P>, GameError> {
        let game = {
            let _guard = self.lock();
            let mut game = self.store.get(game_id)?;
            game.status().can_start()?;
            require_player(&game, user_id)?;
            self.plugin.can_start_game(&game)?;
            self.plugin.start_game(&mut game)?;
            info!(%game_id, %user_id, players = game.player_count(), "game started");
            self.save(game)?
        };
        self.fire_game(&game);
        Ok(game)
    }

    pub fn stop_game(&self, game_id: &GameId, user_id: &UserId) -> Result<GameOf<P>, GameError> {
        let game = {
            let _guard = self.lock();
            let mut game = self.store.get(game_id)?;
            game.status().can_stop()?;
            require_player(&game, user_id)?;
            self.plugin.can_stop_game(&game)?;
            self.plugin.stop_game(&mut game)?;
            info!(%game_id, %user_id, "game stopped");
            self.save(game)?
        };
        self.fire_game(&game);
        Ok(game)
    }

    /// Takes `user_id` out of `game_id`. The returned snapshot may describe
    /// a game that has just been deleted (last player out).
    pub fn leave_game(&self, game_id: &GameId, user_id: &UserId) -> Result<GameOf<P>, GameError> {
        let game = {
            let _guard = self.lock();
            let mut game = self.store.get(game_id)?;
            game.status().can_leave()?;
            require_player(&game, user_id)?;
            self.plugin.can_leave_game(&game, user_id)?;
            self.plugin.leave_game(&mut game, user_id)?;
            game.update_join_status();
            info!(%game_id, %user_id, status = %game.status(), "player left");
            self.save(game)?
        };
        self.fire_leave(&game, user_id);
        Ok(game)
    }

    /// Removes a game that is not running. Returns the removed game.
    pub fn delete_game(&self, game_id: &GameId, user_id: &UserId) -> Result<GameOf<P>, GameError> {
        let _guard = self.lock();
        let game = self.store.get(game_id)?;
        game.status().can_delete()?;
        require_player(&game, user_id)?;
        self.plugin.can_delete_game(&game, user_id)?;
        self.store.delete(game_id)?;
        info!(%game_id, %user_id, "game deleted");
        Ok(game)
    }

    /// Applies a parsed move for `user_id`.
    pub fn play(&self, game_id: &GameId, user_id: &UserId, mv: P::Move) -> Result<GameOf<P>, GameError> {
        let game = {
            let _guard = self.lock();
            let mut game = self.store.get(game_id)?;
            game.status().can_play()?;
            let player = game.player(user_id).ok_or(GameError::PlayerNotInGame)?;
            if !player.is_playing() {
                return Err(GameError::WrongPlayer);
            }
            self.plugin.play(&mut game, user_id, mv)?;
            debug!(%game_id, %user_id, round = game.round(), status = %game.status(), "move played");
            self.save(game)?
        };
        self.fire_game(&game);
        Ok(game)
    }

    /// Persists `game`, or deletes it if it is marked for deletion.
    /// Returns the game either way.
    pub fn save_game(&self, game: GameOf<P>) -> Result<GameOf<P>, GameError> {
        let _guard = self.lock();
        self.save(game)
    }

    fn save(&self, game: GameOf<P>) -> Result<GameOf<P>, GameError> {
        if game.status().is_marked_for_deletion() {
            match self.store.delete(game.id()) {
                Ok(()) | Err(GameError::GameNotFound(_)) => {}
                Err(e) => return Err(e),
            }
            info!(game_id = %game.id(), "game deleted after last player left");
            return Ok(game);
        }
        self.store.set(game.clone())?;
        Ok(game)
    }
}

fn require_player<B, S>(game: &crate::Game<B, S>, user_id: &UserId) -> Result<(), GameError> {
    if game.has_player(user_id) {
        Ok(())
    } else {
        Err(GameError::PlayerNotInGame)
    }
}

fn sort_newest_first<B, S>(games: &mut [crate::Game<B, S>]) {
    games.sort_by(|a, b| b.age_key().cmp(&a.age_key()));
}
