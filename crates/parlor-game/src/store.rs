//! Game persistence.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use parlor_protocol::GameId;

use crate::{Game, GameError};

/// Where games live between operations.
///
/// Implementations hand out copies: a game returned by `get` is a
/// snapshot, and changes only land through `set`.
pub trait GameStore<B, S>: Send + Sync + 'static {
    fn get(&self, id: &GameId) -> Result<Game<B, S>, GameError>;

    /// Inserts or replaces the game with the same id.
    fn set(&self, game: Game<B, S>) -> Result<(), GameError>;

    fn delete(&self, id: &GameId) -> Result<(), GameError>;

    /// Every stored game, in no particular order.
    fn list(&self) -> Vec<Game<B, S>>;
}

/// In-memory store: a map behind a read/write lock.
pub struct MemoryGameStore<B, S> {
    games: RwLock<HashMap<GameId, Game<B, S>>>,
}

impl<B, S> MemoryGameStore<B, S> {
    pub fn new() -> Self {
        Self {
            games: RwLock::new(HashMap::new()),
        }
    }
}

impl<B, S> Default for MemoryGameStore<B, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B, S> GameStore<B, S> for MemoryGameStore<B, S>
where
    B: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
    fn get(&self, id: &GameId) -> Result<Game<B, S>, GameError> {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| GameError::GameNotFound(id.clone()))
    }

    fn set(&self, game: Game<B, S>) -> Result<(), GameError> {
        self.games
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(game.id().clone(), game);
        Ok(())
    }

    fn delete(&self, id: &GameId) -> Result<(), GameError> {
        self.games
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| GameError::GameNotFound(id.clone()))
    }

    fn list(&self) -> Vec<Game<B, S>> {
        self.games
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlayerBounds;

    fn game(id: &str) -> Game<u8, ()> {
        Game::new(GameId::new(id).unwrap(), PlayerBounds::default(), 0)
    }

    #[test]
    fn test_memory_store_set_get_delete() {
        let store = MemoryGameStore::new();
        store.set(game("GAMEAA")).unwrap();
        let id = GameId::new("GAMEAA").unwrap();

        let mut snapshot = store.get(&id).unwrap();
        *snapshot.board_mut() = 7;
        // The snapshot is detached from the store.
        assert_eq!(*store.get(&id).unwrap().board(), 0);

        store.set(snapshot).unwrap();
        assert_eq!(*store.get(&id).unwrap().board(), 7);
        assert_eq!(store.list().len(), 1);

        store.delete(&id).unwrap();
        assert!(matches!(store.get(&id), Err(GameError::GameNotFound(_))));
        assert!(matches!(store.delete(&id), Err(GameError::GameNotFound(_))));
    }
}
