//! The generic game: status, seats, turn order, ranking and results.
//!
//! Variants plug their own board (`B`) and per-seat payload (`S`) in;
//! everything else about a match lives here and is shared by all of them.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{SystemTime, UNIX_EPOCH};

use parlor_protocol::{GameId, UserId};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{GameStatus, Player, PlayerBounds, PlayerRank, PlayerResult, PlayerStatus};

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One match of some game variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game<B, S> {
    id: GameId,
    status: GameStatus,
    /// Milliseconds since the Unix epoch.
    created_at: u64,
    /// Creation sequence; breaks ties between games created in the same
    /// millisecond.
    #[serde(skip)]
    serial: u64,
    bounds: PlayerBounds,
    players: BTreeMap<UserId, Player<S>>,
    order: Vec<Vec<UserId>>,
    round: u32,
    board: B,
}

impl<B, S> Game<B, S> {
    /// Creates an empty game. Its status is derived from zero players.
    pub fn new(id: GameId, bounds: PlayerBounds, board: B) -> Self {
        Self {
            id,
            status: GameStatus::from_player_count(0, bounds),
            created_at: now_millis(),
            serial: NEXT_SERIAL.fetch_add(1, AtomicOrdering::Relaxed),
            bounds,
            players: BTreeMap::new(),
            order: Vec::new(),
            round: 0,
            board,
        }
    }

    // -- Accessors ---------------------------------------------------------

    pub fn id(&self) -> &GameId {
        &self.id
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Sort key for "newest first" listings.
    pub(crate) fn age_key(&self) -> (u64, u64) {
        (self.created_at, self.serial)
    }

    pub fn bounds(&self) -> PlayerBounds {
        self.bounds
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    /// 1-based once started, 0 before.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn has_player(&self, user_id: &UserId) -> bool {
        self.players.contains_key(user_id)
    }

    pub fn player(&self, user_id: &UserId) -> Option<&Player<S>> {
        self.players.get(user_id)
    }

    pub fn player_mut(&mut self, user_id: &UserId) -> Option<&mut Player<S>> {
        self.players.get_mut(user_id)
    }

    pub fn players(&self) -> impl Iterator<Item = &Player<S>> {
        self.players.values()
    }

    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut Player<S>> {
        self.players.values_mut()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_ids(&self) -> Vec<UserId> {
        self.players.keys().cloned().collect()
    }

    pub fn winners(&self) -> impl Iterator<Item = &Player<S>> {
        self.players.values().filter(|p| p.result.is_win())
    }

    // -- Seats -------------------------------------------------------------

    /// Seats `player` (replacing any previous seat for the same user) and
    /// recomputes joinability.
    pub fn attach_player(&mut self, player: Player<S>) {
        self.players.insert(player.user_id().clone(), player);
        self.update_join_status();
    }

    /// Removes a seat, drops it from the turn order, and recomputes
    /// joinability.
    pub fn detach_player(&mut self, user_id: &UserId) -> Option<Player<S>> {
        let player = self.players.remove(user_id)?;
        for group in &mut self.order {
            group.retain(|id| id != user_id);
        }
        self.order.retain(|group| !group.is_empty());
        self.update_join_status();
        Some(player)
    }

    /// Re-derives the pre-start status and player statuses from the player
    /// count. Does nothing once the game has started, stopped or been
    /// marked for deletion.
    pub fn update_join_status(&mut self) {
        if !self.status.is_pending() {
            return;
        }
        self.status = GameStatus::from_player_count(self.players.len(), self.bounds);
        let status = if self.players.len() < self.bounds.min {
            PlayerStatus::WaitingToJoin
        } else {
            PlayerStatus::WaitingToStart
        };
        for player in self.players.values_mut() {
            player.status = status;
        }
    }

    // -- Lifecycle ---------------------------------------------------------

    pub fn start(&mut self) {
        debug!(game_id = %self.id, "game started");
        self.status = GameStatus::Started;
    }

    /// Stops the game. Nobody is `Playing` afterwards.
    pub fn stop(&mut self) {
        debug!(game_id = %self.id, "game stopped");
        self.status = GameStatus::Stopped;
        for player in self.players.values_mut() {
            player.status = PlayerStatus::WaitingToPlay;
        }
    }

    pub fn mark_for_deletion(&mut self) {
        debug!(game_id = %self.id, "game marked for deletion");
        self.status = GameStatus::MarkedForDeletion;
    }

    /// Starts a sequential-turn game: random order with one player per
    /// round, first round, first player playing.
    pub fn default_start(&mut self) {
        self.start();
        self.set_random_order(1);
        self.first_round();
        self.set_playing_round_players();
    }

    /// Removes `user_id` the standard way:
    ///
    /// - stopped: nothing changes, the seat stays for the record;
    /// - started: the leaver loses, everyone else wins, the game stops;
    /// - not started: the seat is freed, and the game is marked for
    ///   deletion if it was the last one.
    pub fn default_leave(&mut self, user_id: &UserId) {
        match self.status {
            GameStatus::Stopped | GameStatus::MarkedForDeletion => {}
            GameStatus::Started => {
                self.set_loosers(std::slice::from_ref(user_id));
                self.stop();
            }
            _ => {
                self.detach_player(user_id);
                if self.players.is_empty() {
                    self.mark_for_deletion();
                }
            }
        }
    }

    // -- Turn order --------------------------------------------------------

    /// Shuffles the seated players into rounds of `group_size` (the last
    /// group may be smaller). Group size 1 gives sequential turns.
    pub fn set_random_order(&mut self, group_size: usize) {
        let mut ids = self.player_ids();
        ids.shuffle(&mut rand::rng());
        self.order = ids
            .chunks(group_size.max(1))
            .map(<[UserId]>::to_vec)
            .collect();
    }

    /// The round groups, in play order.
    pub fn order(&self) -> &[Vec<UserId>] {
        &self.order
    }

    /// Every ordered player id, flattened.
    pub fn ordered_player_ids(&self) -> impl Iterator<Item = &UserId> {
        self.order.iter().flatten()
    }

    pub fn first_round(&mut self) {
        self.round = 1;
    }

    pub fn next_round(&mut self) {
        self.round += 1;
    }

    /// The players whose round it is. Round 1 is the first group; rounds
    /// wrap around the order. Empty before the game starts.
    pub fn round_player_ids(&self) -> &[UserId] {
        if self.round == 0 || self.order.is_empty() {
            return &[];
        }
        let index = (self.round as usize - 1) % self.order.len();
        &self.order[index]
    }

    pub fn is_round_player(&self, user_id: &UserId) -> bool {
        self.round_player_ids().contains(user_id)
    }

    /// Sets the current round's players to `Playing` and everyone else to
    /// `WaitingToPlay`.
    ///
    /// # Panics
    ///
    /// If the turn order names a player who is not seated.
    pub fn set_playing_round_players(&mut self) {
        let ids = self.round_player_ids().to_vec();
        self.set_playing_players(&ids);
    }

    /// Sets exactly `ids` to `Playing`, everyone else to `WaitingToPlay`.
    ///
    /// # Panics
    ///
    /// If any id is not seated in this game.
    pub fn set_playing_players(&mut self, ids: &[UserId]) {
        for player in self.players.values_mut() {
            player.status = PlayerStatus::WaitingToPlay;
        }
        for id in ids {
            match self.players.get_mut(id) {
                Some(player) => player.status = PlayerStatus::Playing,
                None => panic!("player {id} is not in game {}", self.id),
            }
        }
    }

    // -- Scores and ranks --------------------------------------------------

    /// Applies `update` to every player, then re-ranks by descending score.
    pub fn update_scores(&mut self, mut update: impl FnMut(&mut Player<S>)) {
        for player in self.players.values_mut() {
            update(player);
        }
        self.update_ranks();
    }

    /// Ranks by descending score.
    pub fn update_ranks(&mut self) {
        self.update_ranks_by(|a, b| b.score.cmp(&a.score));
    }

    /// Ranks players by `compare` (best first). Players comparing equal
    /// share a rank; the next distinct player gets the next rank.
    pub fn update_ranks_by(&mut self, compare: impl Fn(&Player<S>, &Player<S>) -> Ordering) {
        let mut sorted: Vec<&Player<S>> = self.players.values().collect();
        sorted.sort_by(|a, b| compare(a, b));

        let mut ranks = Vec::with_capacity(sorted.len());
        let mut rank = 0u8;
        let mut previous: Option<&Player<S>> = None;
        for player in sorted {
            if previous.is_none_or(|prev| compare(prev, player) != Ordering::Equal) {
                rank = rank.saturating_add(1);
            }
            ranks.push((player.user_id().clone(), rank));
            previous = Some(player);
        }

        for (id, rank) in ranks {
            if let Some(player) = self.players.get_mut(&id) {
                player.rank = PlayerRank(rank);
            }
        }
    }

    // -- Results -----------------------------------------------------------

    /// `winners` win, everyone else loses.
    pub fn set_winners(&mut self, winners: &[UserId]) {
        for (id, player) in &mut self.players {
            player.result = if winners.contains(id) {
                PlayerResult::Win
            } else {
                PlayerResult::Loose
            };
        }
    }

    /// `loosers` lose, everyone else wins.
    pub fn set_loosers(&mut self, loosers: &[UserId]) {
        for (id, player) in &mut self.players {
            player.result = if loosers.contains(id) {
                PlayerResult::Loose
            } else {
                PlayerResult::Win
            };
        }
    }

    pub fn set_tie(&mut self) {
        for player in self.players.values_mut() {
            player.result = PlayerResult::Tie;
        }
    }

    /// Derives results from ranks: a lone first wins, several firsts tie,
    /// everyone else loses. Unranked games end in a tie.
    pub fn set_results_by_rank(&mut self) {
        let firsts: Vec<UserId> = self
            .players
            .values()
            .filter(|p| p.rank == PlayerRank(1))
            .map(|p| p.user_id().clone())
            .collect();
        match firsts.len() {
            0 => self.set_tie(),
            1 => self.set_winners(&firsts),
            _ => {
                for (id, player) in &mut self.players {
                    player.result = if firsts.contains(id) {
                        PlayerResult::Tie
                    } else {
                        PlayerResult::Loose
                    };
                }
            }
        }
    }
}
