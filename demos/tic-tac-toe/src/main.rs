use std::sync::Arc;

use parlor::prelude::*;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Game types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
enum Cell {
    #[default]
    Empty,
    X,
    O,
}

#[derive(Clone, Default, Serialize)]
struct Grid {
    cells: [[Cell; 3]; 3],
}

/// A 1-based cell, as sent by the page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Move {
    row: usize,
    column: usize,
}

// ---------------------------------------------------------------------------
// Game rules
// ---------------------------------------------------------------------------

struct TicTacToe;

impl GamePlugin for TicTacToe {
    type Board = Grid;
    type Seat = Cell; // the player's symbol
    type Move = Move;

    fn bounds(&self) -> PlayerBounds {
        PlayerBounds::new(2, 2)
    }

    fn new_board(&self) -> Grid {
        Grid::default()
    }

    /// Random order; the first to play is X.
    fn start_game(&self, game: &mut GameOf<Self>) -> Result<(), GameError> {
        game.default_start();
        let order: Vec<UserId> = game.ordered_player_ids().cloned().collect();
        for (id, symbol) in order.iter().zip([Cell::X, Cell::O]) {
            if let Some(player) = game.player_mut(id) {
                player.seat = symbol;
            }
        }
        Ok(())
    }

    fn parse_move(&self, action: &str, message: &InboundMessage) -> Result<Option<Move>, GameError> {
        if action != "play" {
            return Ok(None);
        }
        let row = message.require(Field::Row)? as usize;
        let column = message.require(Field::Column)? as usize;
        if row > 3 || column > 3 {
            return Err(GameError::rule("row and column must be 1-3"));
        }
        Ok(Some(Move { row, column }))
    }

    fn play(&self, game: &mut GameOf<Self>, user_id: &UserId, mv: Move) -> Result<(), GameError> {
        let symbol = game
            .player(user_id)
            .map(|p| p.seat)
            .ok_or(GameError::PlayerNotInGame)?;
        let cell = &mut game.board_mut().cells[mv.row - 1][mv.column - 1];
        if *cell != Cell::Empty {
            return Err(GameError::rule("cell is taken"));
        }
        *cell = symbol;

        let cells = game.board().cells;
        if has_line(&cells, symbol) {
            tracing::debug!(game_id = %game.id(), %user_id, "line completed");
            game.set_winners(std::slice::from_ref(user_id));
            game.stop();
        } else if is_full(&cells) {
            game.set_tie();
            game.stop();
        } else {
            game.next_round();
            game.set_playing_round_players();
        }
        Ok(())
    }
}

fn has_line(b: &[[Cell; 3]; 3], m: Cell) -> bool {
    (0..3).any(|i| (0..3).all(|j| b[i][j] == m))
        || (0..3).any(|j| (0..3).all(|i| b[i][j] == m))
        || (0..3).all(|i| b[i][i] == m)
        || (0..3).all(|i| b[i][2 - i] == m)
}

fn is_full(b: &[[Cell; 3]; 3]) -> bool {
    b.iter().all(|row| row.iter().all(|c| *c != Cell::Empty))
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    parlor::init_tracing();
    let addr = std::env::var("PARLOR_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let server = ParlorServerBuilder::new()
        .bind(&addr)
        .app("tic-tac-toe")
        .build(TicTacToe, QueryIdentifier, Arc::new(JsonRenderer::new()))
        .await?;
    tracing::info!(addr = %server.local_addr()?, "tic-tac-toe ready");

    server.run().await?;
    Ok(())
}
