//! Per-user connection callbacks and inbound action dispatch.

use std::sync::{Arc, Weak};

use parlor_game::{GameError, GamePlugin, Member};
use parlor_hub::{Participant, User};
use parlor_protocol::{Data, GameId, InboundMessage, ProtocolError, UserId};
use parlor_transport::ConnectionHandler;
use tracing::debug;

use crate::game_server::{fragment, GameServer};
use crate::ParlorError;

/// Inbound actions every game understands. Anything else is handed to
/// the plugin as a move.
pub mod action {
    pub const CREATE_GAME: &str = "create-game";
    pub const JOIN_GAME: &str = "join-game";
    pub const START_GAME: &str = "start-game";
    pub const STOP_GAME: &str = "stop-game";
    pub const LEAVE_GAME: &str = "leave-game";
    pub const DELETE_GAME: &str = "delete-game";
    pub const SET_NAME: &str = "set-name";
}

/// Routes one user's connection events back to the coordinator.
///
/// Holds the coordinator weakly: the coordinator owns the hub, which owns
/// the user, which owns the connection holding this handler.
pub(crate) struct UserEvents<P: GamePlugin> {
    user_id: UserId,
    server: Weak<GameServer<P>>,
}

impl<P: GamePlugin> UserEvents<P> {
    pub(crate) fn new(user_id: UserId, server: Weak<GameServer<P>>) -> Self {
        Self { user_id, server }
    }
}

impl<P: GamePlugin> ConnectionHandler for UserEvents<P> {
    fn on_message(&self, message: Vec<u8>) {
        if let Some(server) = self.server.upgrade() {
            server.handle_message(&self.user_id, &message);
        }
    }

    fn on_update(&self, active: bool) {
        debug!(user_id = %self.user_id, active, "user activity changed");
        if let Some(server) = self.server.upgrade() {
            server.user_changed(&self.user_id);
        }
    }

    fn on_close(&self) {
        debug!(user_id = %self.user_id, "user connection closing");
    }
}

impl<P: GamePlugin> GameServer<P> {
    /// Handles one inbound message. Failures are answered with an "error"
    /// fragment to the sender only.
    pub fn handle_message(&self, user_id: &UserId, message: &[u8]) {
        let user = match self.hub.get(user_id) {
            Ok(user) => user,
            Err(e) => {
                debug!(%user_id, error = %e, "message from unregistered user");
                return;
            }
        };
        if let Err(e) = self.dispatch(&user, message) {
            debug!(%user_id, error = %e, "action failed");
            self.hub
                .broadcast_to_user(fragment::ERROR, user_id, Data::new().with("error", e.to_string()));
        }
    }

    fn dispatch(&self, user: &Arc<User>, message: &[u8]) -> Result<(), ParlorError> {
        let message = InboundMessage::decode(message)?;
        let name = message.require_action()?;
        debug!(user_id = %user.id(), action = name, "inbound action");

        match name {
            action::CREATE_GAME => {
                if user.game_id().is_some() {
                    return Err(GameError::AlreadyInGame.into());
                }
                self.service.create_game(&member(user))?;
            }
            action::JOIN_GAME => {
                let game_id = message.game_id().ok_or(ProtocolError::Missing("game id"))?;
                if user.game_id().is_some_and(|seated| seated != game_id) {
                    return Err(GameError::AlreadyInGame.into());
                }
                self.service.join_game(&game_id, &member(user))?;
            }
            action::START_GAME => {
                self.service.start_game(&current_game(user)?, user.id())?;
            }
            action::STOP_GAME => {
                self.service.stop_game(&current_game(user)?, user.id())?;
            }
            action::LEAVE_GAME => {
                self.service.leave_game(&current_game(user)?, user.id())?;
            }
            action::DELETE_GAME => {
                let game_id = message
                    .game_id()
                    .or_else(|| user.game_id())
                    .ok_or(ProtocolError::Missing("game id"))?;
                self.service.delete_game(&game_id, user.id())?;
                self.game_deleted(&game_id);
            }
            action::SET_NAME => {
                let name = message.name().ok_or(ProtocolError::MissingUserName)?.to_owned();
                self.hub.update(user.id(), move |u: &User| u.set_name(name));
                self.user_changed(user.id());
            }
            other => {
                let mv = self
                    .service
                    .plugin()
                    .parse_move(other, &message)?
                    .ok_or(ProtocolError::MissingAction)?;
                let game = self.service.play(&current_game(user)?, user.id(), mv)?;
                if game.status().is_stopped() {
                    self.announce_results(&game);
                }
            }
        }
        Ok(())
    }
}

fn member(user: &User) -> Member {
    Member::new(user.id().clone(), user.profile())
}

fn current_game(user: &User) -> Result<GameId, GameError> {
    user.game_id().ok_or(GameError::PlayerNotInGame)
}
