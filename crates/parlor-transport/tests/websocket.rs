//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on a random port and talk to it with a
//! `tokio-tungstenite` client, so the whole upgrade path (route check,
//! query string, cookie header) and the frame mapping get exercised.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use parlor_transport::{
        Connection, ConnectionConfig, ConnectionHandler, Transport,
        WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;

    #[derive(Default)]
    struct Inbox(Mutex<Vec<String>>);

    impl ConnectionHandler for Inbox {
        fn on_message(&self, message: Vec<u8>) {
            self.0
                .lock()
                .unwrap()
                .push(String::from_utf8(message).unwrap());
        }
    }

    async fn bind(route: &str) -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_route(route);
        let addr = transport.local_addr().expect("should have addr").to_string();
        (transport, addr)
    }

    #[tokio::test]
    async fn test_websocket_accept_captures_handshake() {
        let (mut transport, addr) = bind("/ttt/htmx/connect").await;

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut request = format!("ws://{addr}/ttt/htmx/connect?user=AB12CD")
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("cookie", "lang=en; user=AB12CD".parse().unwrap());
        let (_client, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("client should connect");

        let (_socket, handshake) = server.await.unwrap();
        assert_eq!(handshake.path, "/ttt/htmx/connect");
        assert_eq!(handshake.query_param("user").as_deref(), Some("AB12CD"));
        assert_eq!(handshake.cookie_value("lang").as_deref(), Some("en"));
        assert!(handshake.peer.is_some());
    }

    #[tokio::test]
    async fn test_websocket_wrong_route_is_rejected() {
        let (mut transport, addr) = bind("/ttt/htmx/connect").await;

        let server = tokio::spawn(async move { transport.accept().await });

        let result =
            tokio_tungstenite::connect_async(format!("ws://{addr}/elsewhere"))
                .await;
        assert!(result.is_err(), "client should see the 404");

        let accepted = server.await.unwrap();
        assert!(accepted.is_err());
    }

    #[tokio::test]
    async fn test_websocket_connection_round_trip() {
        let (mut transport, addr) = bind("/ttt/htmx/connect").await;

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let (mut client, _) = tokio_tungstenite::connect_async(format!(
            "ws://{addr}/ttt/htmx/connect"
        ))
        .await
        .expect("client should connect");
        let (socket, _) = server.await.unwrap();

        let inbox = Arc::new(Inbox::default());
        let conn = Connection::new("U1", ConnectionConfig::default(), inbox.clone());
        conn.open(socket).await;

        // Server → client
        conn.send(b"<div id=\"board\"></div>".to_vec()).await.unwrap();
        let received = client.next().await.unwrap().unwrap();
        assert_eq!(received, Message::text("<div id=\"board\"></div>"));

        // Client → server
        client
            .send(Message::text(r#"{"action":"start-game"}"#))
            .await
            .unwrap();
        for _ in 0..100 {
            if !inbox.0.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            *inbox.0.lock().unwrap(),
            vec![r#"{"action":"start-game"}"#.to_string()]
        );

        // Close from the server side: the client sees a close frame.
        conn.close().await;
        let closing = client.next().await.unwrap().unwrap();
        assert!(matches!(closing, Message::Close(_)));
        assert!(!conn.is_active());
    }

    #[tokio::test]
    async fn test_websocket_client_disconnect_deactivates() {
        let (mut transport, addr) = bind("/ttt/htmx/connect").await;

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let (client, _) = tokio_tungstenite::connect_async(format!(
            "ws://{addr}/ttt/htmx/connect"
        ))
        .await
        .expect("client should connect");
        let (socket, _) = server.await.unwrap();

        let conn = Connection::new(
            "U1",
            ConnectionConfig::default(),
            Arc::new(Inbox::default()),
        );
        conn.open(socket).await;
        drop(client);

        for _ in 0..200 {
            if conn.is_closed() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(conn.is_closed());
        assert!(!conn.is_active());
    }
}
