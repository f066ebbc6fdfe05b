//! The `GamePlugin` trait: the extension point for game variants.
//!
//! The [`GameService`](crate::GameService) owns the lifecycle (guards,
//! persistence, callbacks). A plugin supplies the rules: what the board
//! looks like, what a seat carries, which extra checks apply, and what a
//! move does. Every hook except [`new_board`](GamePlugin::new_board),
//! [`parse_move`](GamePlugin::parse_move) and [`play`](GamePlugin::play)
//! has a default that fits a plain sequential-turn game.

use parlor_protocol::{GameId, InboundMessage, PlayerId, Profile, UserId};
use serde::Serialize;

use crate::{Game, GameError, Player, PlayerBounds};

/// The game type a plugin works on.
pub type GameOf<P> = Game<<P as GamePlugin>::Board, <P as GamePlugin>::Seat>;

/// Who is asking to create or join a game.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub user_id: UserId,
    pub profile: Profile,
}

impl Member {
    pub fn new(user_id: UserId, profile: Profile) -> Self {
        Self { user_id, profile }
    }
}

/// Rules of one game variant.
///
/// `can_*` hooks run after the status guard and before any mutation; an
/// error from them leaves the stored game untouched.
pub trait GamePlugin: Sized + Send + Sync + 'static {
    /// Variant state shared by the whole table (cells, decks, missions).
    type Board: Clone + Serialize + Send + Sync + 'static;

    /// Variant state attached to each seat (a symbol, a hand of cards).
    type Seat: Clone + Default + Serialize + Send + Sync + 'static;

    /// A parsed move, ready for [`play`](Self::play).
    type Move: Send + 'static;

    fn bounds(&self) -> PlayerBounds {
        PlayerBounds::default()
    }

    /// The board of a freshly created game.
    fn new_board(&self) -> Self::Board;

    // -- Create / join -----------------------------------------------------

    fn can_create_game(&self, _member: &Member) -> Result<(), GameError> {
        Ok(())
    }

    /// Builds a new game with `member` already seated.
    fn create_game(&self, id: GameId, member: &Member) -> Result<GameOf<Self>, GameError> {
        let mut game = Game::new(id, self.bounds(), self.new_board());
        self.join_game(&mut game, member)?;
        Ok(game)
    }

    fn can_join_game(&self, _game: &GameOf<Self>, _member: &Member) -> Result<(), GameError> {
        Ok(())
    }

    /// Seats `member` with a default seat.
    fn join_game(&self, game: &mut GameOf<Self>, member: &Member) -> Result<(), GameError> {
        let id = PlayerId::new(game.id().clone(), member.user_id.clone());
        game.attach_player(Player::new(id, member.profile.clone(), Self::Seat::default()));
        Ok(())
    }

    // -- Start / stop ------------------------------------------------------

    fn can_start_game(&self, game: &GameOf<Self>) -> Result<(), GameError> {
        if game.player_count() < self.bounds().min {
            return Err(GameError::MissingPlayers);
        }
        Ok(())
    }

    fn start_game(&self, game: &mut GameOf<Self>) -> Result<(), GameError> {
        game.default_start();
        Ok(())
    }

    fn can_stop_game(&self, _game: &GameOf<Self>) -> Result<(), GameError> {
        Ok(())
    }

    fn stop_game(&self, game: &mut GameOf<Self>) -> Result<(), GameError> {
        game.stop();
        Ok(())
    }

    // -- Leave / delete ----------------------------------------------------

    fn can_leave_game(&self, _game: &GameOf<Self>, _user_id: &UserId) -> Result<(), GameError> {
        Ok(())
    }

    fn leave_game(&self, game: &mut GameOf<Self>, user_id: &UserId) -> Result<(), GameError> {
        game.default_leave(user_id);
        Ok(())
    }

    fn can_delete_game(&self, _game: &GameOf<Self>, _user_id: &UserId) -> Result<(), GameError> {
        Ok(())
    }

    // -- Play --------------------------------------------------------------

    /// Turns an inbound action into a move.
    ///
    /// `Ok(None)` means the action is not one of this variant's. Missing
    /// or malformed fields are errors. Parsing never sees the game, so a
    /// bad message cannot change state.
    fn parse_move(
        &self,
        action: &str,
        message: &InboundMessage,
    ) -> Result<Option<Self::Move>, GameError>;

    /// Applies a move by a player whose turn it is. Responsible for
    /// advancing rounds and for ending the game (results + stop).
    fn play(
        &self,
        game: &mut GameOf<Self>,
        user_id: &UserId,
        mv: Self::Move,
    ) -> Result<(), GameError>;
}
