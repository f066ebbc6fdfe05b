//! Integration tests for the coordinator: lobby and game flows over
//! in-memory sockets, inbound errors, and one full WebSocket round trip.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parlor::prelude::*;
use parlor_transport::memory::{self, MemoryPeer};
use parlor_transport::TransportError;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Test game: play a card, a 7 wins
// =========================================================================

struct Sevens;

#[derive(Clone, Default, Serialize)]
struct Table {
    played: Vec<u32>,
}

impl GamePlugin for Sevens {
    type Board = Table;
    type Seat = ();
    type Move = u32;

    fn new_board(&self) -> Table {
        Table::default()
    }

    fn parse_move(&self, action: &str, message: &InboundMessage) -> Result<Option<u32>, GameError> {
        match action {
            "play-card" => Ok(Some(message.require(Field::Card)?)),
            _ => Ok(None),
        }
    }

    fn play(&self, game: &mut GameOf<Self>, user_id: &UserId, card: u32) -> Result<(), GameError> {
        game.board_mut().played.push(card);
        if card == 7 {
            game.set_winners(std::slice::from_ref(user_id));
            game.stop();
        } else {
            game.next_round();
            game.set_playing_round_players();
        }
        Ok(())
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn server() -> Arc<GameServer<Sevens>> {
    GameServer::new(
        Sevens,
        Arc::new(JsonRenderer::new()),
        ConnectionConfig::default(),
    )
}

fn identity(id: &str, name: &str) -> Identity {
    Identity {
        user_id: UserId::new(id).unwrap(),
        profile: Profile::new(name),
    }
}

fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

async fn join(server: &Arc<GameServer<Sevens>>, id: &str, name: &str) -> MemoryPeer {
    let (socket, mut peer) = memory::pair();
    server.connect(identity(id, name), socket).await.unwrap();
    until(&mut peer, fragment::SELECT_GAME).await;
    peer
}

async fn next(peer: &mut MemoryPeer) -> Option<Value> {
    let text = timeout(Duration::from_secs(2), peer.recv_text())
        .await
        .ok()??;
    Some(serde_json::from_str(&text).unwrap())
}

/// Reads fragments until one named `name` arrives and returns its data.
async fn until(peer: &mut MemoryPeer, name: &str) -> Value {
    loop {
        let fragment = next(peer)
            .await
            .unwrap_or_else(|| panic!("no {name} fragment delivered"));
        if fragment["fragment"] == name {
            return fragment["data"].clone();
        }
    }
}

/// Discards everything already queued for `peer`.
async fn drain(peer: &mut MemoryPeer) {
    while let Ok(Some(_)) = timeout(Duration::from_millis(100), peer.recv_text()).await {}
}

/// Fragment names delivered to `peer` until it goes quiet.
async fn received(peer: &mut MemoryPeer) -> Vec<String> {
    let mut names = Vec::new();
    while let Ok(Some(text)) = timeout(Duration::from_millis(150), peer.recv_text()).await {
        let value: Value = serde_json::from_str(&text).unwrap();
        names.push(value["fragment"].as_str().unwrap_or_default().to_owned());
    }
    names
}

/// Two users seated in one started game. Returns the game id and the
/// peers ordered (playing, waiting).
async fn started_game(
    server: &Arc<GameServer<Sevens>>,
) -> (GameId, (UserId, MemoryPeer), (UserId, MemoryPeer)) {
    let mut ada = join(server, "U1", "Ada").await;
    let mut bob = join(server, "U2", "Bob").await;

    ada.send_text(r#"{"action":"create-game"}"#);
    until(&mut ada, fragment::GAME_LAYOUT).await;
    let game_id = server.hub().get(&uid("U1")).unwrap().game_id().unwrap();

    bob.send_text(json!({"action": "join-game", "game": game_id.as_str()}).to_string());
    until(&mut bob, fragment::GAME_LAYOUT).await;

    ada.send_text(r#"{"action":"start-game"}"#);
    until(&mut ada, fragment::BOARD).await;
    let game = loop {
        let game = server.service().get_game(&game_id).unwrap();
        if game.status().is_started() {
            break game;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    drain(&mut ada).await;
    drain(&mut bob).await;

    if game.is_round_player(&uid("U1")) {
        (game_id, (uid("U1"), ada), (uid("U2"), bob))
    } else {
        (game_id, (uid("U2"), bob), (uid("U1"), ada))
    }
}

// =========================================================================
// Lobby
// =========================================================================

#[tokio::test]
async fn test_connect_new_user_lands_in_lobby() {
    let server = server();
    let (socket, mut peer) = memory::pair();
    let user = server.connect(identity("U1", "Ada"), socket).await.unwrap();

    let lobby = until(&mut peer, fragment::SELECT_GAME).await;
    assert_eq!(lobby["joinable_games"], json!([]));
    assert_eq!(lobby["user_games"], json!([]));
    assert_eq!(lobby["user"]["name"], "Ada");
    assert_eq!(lobby["lang"], "fr");
    assert!(user.is_active());
    assert!(server.hub().contains(&uid("U1")));
}

#[tokio::test]
async fn test_connect_same_user_twice_keeps_one_participant() {
    let server = server();
    let _first = join(&server, "U1", "Ada").await;
    let _second = join(&server, "U1", "Ada L.").await;

    assert_eq!(server.hub().len(), 1);
    assert_eq!(server.hub().get(&uid("U1")).unwrap().name(), "Ada L.");
}

#[tokio::test]
async fn test_create_game_is_listed_for_lobby_users() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;
    let mut bob = join(&server, "U2", "Bob").await;
    drain(&mut bob).await;

    ada.send_text(r#"{"action":"create-game"}"#);

    until(&mut ada, fragment::GAME_LAYOUT).await;
    let players = until(&mut ada, fragment::PLAYERS).await;
    assert_eq!(players["players"].as_array().unwrap().len(), 1);
    assert_eq!(players["players"][0]["profile"]["name"], "Ada");
    assert_eq!(players["players"][0]["active"], true);
    let board = until(&mut ada, fragment::BOARD).await;
    assert_eq!(board["status"], "joinable-not-startable");
    assert_eq!(board["board"]["played"], json!([]));
    assert_eq!(board["player"]["profile"]["name"], "Ada");

    let lobby = until(&mut bob, fragment::SELECT_GAME).await;
    let joinable = lobby["joinable_games"].as_array().unwrap();
    assert_eq!(joinable.len(), 1);
    assert_eq!(joinable[0]["players"], json!(["Ada"]));
}

#[tokio::test]
async fn test_join_game_updates_both_players() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;
    let mut bob = join(&server, "U2", "Bob").await;
    drain(&mut bob).await;

    ada.send_text(r#"{"action":"create-game"}"#);
    until(&mut ada, fragment::BOARD).await;
    let lobby = until(&mut bob, fragment::SELECT_GAME).await;
    let game_id = lobby["joinable_games"][0]["id"].as_str().unwrap().to_owned();

    bob.send_text(json!({"action": "join-game", "game": game_id}).to_string());

    until(&mut bob, fragment::GAME_LAYOUT).await;
    for peer in [&mut ada, &mut bob] {
        let players = until(peer, fragment::PLAYERS).await;
        assert_eq!(players["players"].as_array().unwrap().len(), 2);
        let board = until(peer, fragment::BOARD).await;
        assert_eq!(board["status"], "not-joinable-and-startable");
    }
}

#[tokio::test]
async fn test_join_game_without_id_answers_error() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;

    ada.send_text(r#"{"action":"join-game"}"#);

    let error = until(&mut ada, fragment::ERROR).await;
    assert_eq!(error["error"], "missing game id");
}

#[tokio::test]
async fn test_set_name_updates_profile() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;

    ada.send_text(r#"{"action":"set-name","name":"  Lovelace "}"#);

    let data = until(&mut ada, fragment::USER).await;
    assert_eq!(data["user"]["name"], "Lovelace");
}

// =========================================================================
// Inbound errors
// =========================================================================

#[tokio::test]
async fn test_unknown_action_answers_missing_action() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;
    let mut bob = join(&server, "U2", "Bob").await;
    drain(&mut bob).await;

    ada.send_text(r#"{"action":"dance"}"#);

    let error = until(&mut ada, fragment::ERROR).await;
    assert_eq!(error["error"], "missing action");
    assert!(!received(&mut bob).await.contains(&"error".to_owned()));
}

#[tokio::test]
async fn test_malformed_message_keeps_connection_open() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;

    ada.send_text("not json");

    let error = until(&mut ada, fragment::ERROR).await;
    assert!(error["error"].as_str().unwrap().starts_with("decode failed"));

    ada.send_text(r#"{"action":"create-game"}"#);
    until(&mut ada, fragment::GAME_LAYOUT).await;
}

#[tokio::test]
async fn test_play_card_without_card_changes_nothing() {
    let server = server();
    let (game_id, (_, mut playing), (_, mut waiting)) = started_game(&server).await;
    let before = server.service().get_game(&game_id).unwrap();

    playing.send_text(r#"{"action":"play-card"}"#);

    let error = until(&mut playing, fragment::ERROR).await;
    assert_eq!(error["error"], "missing card index");
    let after = server.service().get_game(&game_id).unwrap();
    assert!(after.board().played.is_empty());
    assert_eq!(after.round(), before.round());
    assert!(received(&mut waiting).await.is_empty());
}

#[tokio::test]
async fn test_play_out_of_turn_is_rejected() {
    let server = server();
    let (game_id, _, (_, mut waiting)) = started_game(&server).await;

    waiting.send_text(r#"{"action":"play-card","card":"3"}"#);

    let error = until(&mut waiting, fragment::ERROR).await;
    assert_eq!(error["error"], "wrong player");
    assert!(server.service().get_game(&game_id).unwrap().board().played.is_empty());
}

#[tokio::test]
async fn test_start_game_alone_is_rejected() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;
    ada.send_text(r#"{"action":"create-game"}"#);
    until(&mut ada, fragment::BOARD).await;

    ada.send_text(r#"{"action":"start-game"}"#);

    let error = until(&mut ada, fragment::ERROR).await;
    assert_eq!(error["error"], "game not startable");
}

#[tokio::test]
async fn test_start_game_outside_game_is_rejected() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;

    ada.send_text(r#"{"action":"start-game"}"#);

    let error = until(&mut ada, fragment::ERROR).await;
    assert_eq!(error["error"], "player not in game");
}

#[tokio::test]
async fn test_create_game_while_seated_is_rejected() {
    let server = server();
    let (game_id, (mover, mut moving), _) = started_game(&server).await;

    moving.send_text(r#"{"action":"create-game"}"#);

    let error = until(&mut moving, fragment::ERROR).await;
    assert_eq!(error["error"], "player already in game");
    assert_eq!(server.hub().get(&mover).unwrap().game_id(), Some(game_id.clone()));
    assert!(server.service().joinable_games().is_empty());
    assert_eq!(server.service().non_joinable_games(&mover).len(), 1);

    moving.send_text(r#"{"action":"leave-game"}"#);
    until(&mut moving, fragment::SELECT_GAME).await;
    let game = server.service().get_game(&game_id).unwrap();
    assert!(game.status().is_stopped());
}

#[tokio::test]
async fn test_join_other_game_while_seated_is_rejected() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;
    let mut bob = join(&server, "U2", "Bob").await;

    ada.send_text(r#"{"action":"create-game"}"#);
    until(&mut ada, fragment::BOARD).await;
    bob.send_text(r#"{"action":"create-game"}"#);
    until(&mut bob, fragment::BOARD).await;
    let ada_game = server.hub().get(&uid("U1")).unwrap().game_id().unwrap();
    let bob_game = server.hub().get(&uid("U2")).unwrap().game_id().unwrap();
    drain(&mut ada).await;

    ada.send_text(json!({"action": "join-game", "game": bob_game.as_str()}).to_string());

    let error = until(&mut ada, fragment::ERROR).await;
    assert_eq!(error["error"], "player already in game");
    assert_eq!(server.hub().get(&uid("U1")).unwrap().game_id(), Some(ada_game));
    let other = server.service().get_game(&bob_game).unwrap();
    assert_eq!(other.player_count(), 1);
    assert!(!other.has_player(&uid("U1")));
}

#[tokio::test]
async fn test_join_own_game_again_re_renders() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;
    ada.send_text(r#"{"action":"create-game"}"#);
    until(&mut ada, fragment::BOARD).await;
    let game_id = server.hub().get(&uid("U1")).unwrap().game_id().unwrap();
    drain(&mut ada).await;

    ada.send_text(json!({"action": "join-game", "game": game_id.as_str()}).to_string());

    let names = received(&mut ada).await;
    assert!(names.contains(&fragment::GAME_LAYOUT.to_owned()), "{names:?}");
    assert!(!names.contains(&fragment::ERROR.to_owned()), "{names:?}");
    assert_eq!(server.service().get_game(&game_id).unwrap().player_count(), 1);
}

// =========================================================================
// Game flow
// =========================================================================

#[tokio::test]
async fn test_play_advances_turn_for_both_players() {
    let server = server();
    let (game_id, (first, mut playing), (second, mut waiting)) = started_game(&server).await;

    playing.send_text(r#"{"action":"play-card","card":"3"}"#);

    for peer in [&mut playing, &mut waiting] {
        let board = until(peer, fragment::BOARD).await;
        assert_eq!(board["board"]["played"], json!([3]));
        assert_eq!(board["round_players"], json!([second.as_str()]));
    }
    let game = server.service().get_game(&game_id).unwrap();
    assert!(!game.player(&first).unwrap().is_playing());
    assert!(game.player(&second).unwrap().is_playing());
}

#[tokio::test]
async fn test_winning_move_announces_winner() {
    let server = server();
    let (game_id, (first, mut playing), (_, mut waiting)) = started_game(&server).await;
    let winner = server.hub().get(&first).unwrap().name();

    playing.send_text(r#"{"action":"play-card","card":"7"}"#);

    for peer in [&mut playing, &mut waiting] {
        let info = until(peer, fragment::INFO).await;
        assert_eq!(info["info"], format!("{winner} wins"));
        assert_eq!(info["winners"], json!([winner]));
    }
    assert!(server.service().get_game(&game_id).unwrap().status().is_stopped());
}

#[tokio::test]
async fn test_leave_started_game_stops_it() {
    let server = server();
    let (game_id, (leaver, mut leaving), (stayer, mut staying)) = started_game(&server).await;

    leaving.send_text(r#"{"action":"leave-game"}"#);

    until(&mut leaving, fragment::SELECT_GAME).await;
    let board = until(&mut staying, fragment::BOARD).await;
    assert_eq!(board["status"], "stopped");
    let game = server.service().get_game(&game_id).unwrap();
    assert_eq!(game.player(&stayer).unwrap().result, PlayerResult::Win);
    assert_eq!(game.player(&leaver).unwrap().result, PlayerResult::Loose);
    assert_eq!(server.hub().get(&leaver).unwrap().game_id(), None);
}

#[tokio::test]
async fn test_last_player_leaving_deletes_game() {
    let server = server();
    let mut ada = join(&server, "U1", "Ada").await;
    ada.send_text(r#"{"action":"create-game"}"#);
    until(&mut ada, fragment::BOARD).await;
    let game_id = server.hub().get(&uid("U1")).unwrap().game_id().unwrap();

    ada.send_text(r#"{"action":"leave-game"}"#);

    let lobby = until(&mut ada, fragment::SELECT_GAME).await;
    assert_eq!(lobby["joinable_games"], json!([]));
    assert!(matches!(
        server.service().get_game(&game_id),
        Err(GameError::GameNotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_game_clears_player_references() {
    let server = server();
    let (game_id, (first, mut playing), (second, mut waiting)) = started_game(&server).await;
    playing.send_text(r#"{"action":"play-card","card":"7"}"#);
    until(&mut waiting, fragment::INFO).await;
    drain(&mut playing).await;
    drain(&mut waiting).await;

    waiting.send_text(json!({"action": "delete-game", "game": game_id.as_str()}).to_string());

    until(&mut waiting, fragment::SELECT_GAME).await;
    until(&mut playing, fragment::SELECT_GAME).await;
    assert!(server.service().get_game(&game_id).is_err());
    assert_eq!(server.hub().get(&first).unwrap().game_id(), None);
    assert_eq!(server.hub().get(&second).unwrap().game_id(), None);
}

#[tokio::test]
async fn test_delete_running_game_is_rejected() {
    let server = server();
    let (game_id, (_, mut playing), _) = started_game(&server).await;

    playing.send_text(r#"{"action":"delete-game"}"#);

    let error = until(&mut playing, fragment::ERROR).await;
    assert_eq!(error["error"], "game not stopped");
    assert!(server.service().get_game(&game_id).is_ok());
}

// =========================================================================
// Connection state
// =========================================================================

#[tokio::test]
async fn test_reconnect_restores_game_screen() {
    let server = server();
    let (game_id, (first, _playing), _) = started_game(&server).await;
    let user = server.hub().get(&first).unwrap();
    user.disconnect().await;

    let (socket, mut peer) = memory::pair();
    let name = user.name();
    server.connect(identity(first.as_str(), &name), socket).await.unwrap();

    until(&mut peer, fragment::GAME_LAYOUT).await;
    let players = until(&mut peer, fragment::PLAYERS).await;
    assert_eq!(players["players"].as_array().unwrap().len(), 2);
    let board = until(&mut peer, fragment::BOARD).await;
    assert_eq!(board["game"]["id"], game_id.as_str());
}

#[tokio::test]
async fn test_read_failure_marks_player_inactive_once() {
    let server = server();
    let (_, (first, playing), (_, mut other)) = started_game(&server).await;

    playing.fail(TransportError::ReceiveFailed(std::io::Error::other("reset")));

    let players = until(&mut other, fragment::PLAYERS).await;
    let seat = players["players"]
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["id"].as_str().unwrap().ends_with(first.as_str()))
        .unwrap()
        .clone();
    assert_eq!(seat["active"], false);
    assert!(!received(&mut other).await.contains(&"players".to_owned()));
    assert!(!server.hub().get(&first).unwrap().is_active());
    assert!(server.hub().get(&first).unwrap().game_id().is_some());
}

// =========================================================================
// WebSocket
// =========================================================================

#[tokio::test]
async fn test_websocket_connect_and_create_game() {
    let server = ParlorServerBuilder::new()
        .bind("127.0.0.1:0")
        .app("sevens")
        .build(Sevens, QueryIdentifier, Arc::new(JsonRenderer::new()))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    let game_server = Arc::clone(server.game_server());
    tokio::spawn(server.run());

    let url = format!("ws://{addr}/sevens/htmx/connect?user=U1&name=Ada");
    let (mut ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();

    async fn until_ws<S>(ws: &mut S, name: &str) -> Value
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        loop {
            let message = timeout(Duration::from_secs(2), ws.next())
                .await
                .expect("no message in time")
                .expect("stream ended")
                .unwrap();
            if let Message::Text(text) = message {
                let value: Value = serde_json::from_str(&text).unwrap();
                if value["fragment"] == name {
                    return value["data"].clone();
                }
            }
        }
    }

    let lobby = until_ws(&mut ws, fragment::SELECT_GAME).await;
    assert_eq!(lobby["user"]["name"], "Ada");

    ws.send(Message::text(r#"{"action":"create-game"}"#)).await.unwrap();
    until_ws(&mut ws, fragment::GAME_LAYOUT).await;
    let board = until_ws(&mut ws, fragment::BOARD).await;
    assert_eq!(board["status"], "joinable-not-startable");

    let user = game_server.hub().get(&uid("U1")).unwrap();
    assert!(user.game_id().is_some());
}

#[tokio::test]
async fn test_websocket_wrong_route_is_rejected() {
    let server = ParlorServerBuilder::new()
        .bind("127.0.0.1:0")
        .app("sevens")
        .build(Sevens, QueryIdentifier, Arc::new(JsonRenderer::new()))
        .await
        .unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());

    let url = format!("ws://{addr}/other/htmx/connect");
    assert!(tokio_tungstenite::connect_async(url).await.is_err());
}
