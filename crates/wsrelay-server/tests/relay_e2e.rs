//! Full relay over real sockets: two clients, one echoing upstream

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message};
use wsrelay_config::Config;
use wsrelay_hub::{BridgeStatus, HubHandle};
use wsrelay_server::{create_router, spawn_core, AppState};

const WAIT: Duration = Duration::from_secs(5);

/// An upstream that echoes every data frame back to its sender
async fn spawn_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let Ok(mut ws) = accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    let data = message.is_text() || message.is_binary();
                    if data && ws.send(message).await.is_err() {
                        break;
                    }
                }
            });
        }
    });

    addr
}

async fn spawn_relay(upstream: SocketAddr) -> (SocketAddr, HubHandle) {
    let mut config = Config::default();
    config.upstream.url = format!("ws://{upstream}");
    config.upstream.retry_delay_secs = 1;

    let hub = spawn_core(&config);
    let app = create_router(AppState::new(hub.clone()), &config.server.ws_path);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, hub)
}

#[tokio::test]
async fn test_message_is_echoed_to_all_clients() {
    let upstream = spawn_echo_upstream().await;
    let (relay, hub) = spawn_relay(upstream).await;

    let mut status = hub.subscribe_upstream_status();
    timeout(WAIT, status.wait_for(|s| *s == BridgeStatus::Connected))
        .await
        .expect("relay never reached upstream")
        .unwrap();

    let url = format!("ws://{relay}/ws");
    let (mut alice, _) = connect_async(url.as_str()).await.unwrap();
    let (mut bob, _) = connect_async(url.as_str()).await.unwrap();

    let mut stats = hub.subscribe_stats();
    timeout(WAIT, stats.wait_for(|s| s.clients == 2))
        .await
        .expect("clients never registered")
        .unwrap();

    alice.send(Message::Text("ping".into())).await.unwrap();

    for client in [&mut alice, &mut bob] {
        let received = timeout(WAIT, client.next())
            .await
            .expect("no broadcast arrived")
            .unwrap()
            .unwrap();
        assert_eq!(received, Message::Text("ping".into()));
    }

    alice.close(None).await.unwrap();
    timeout(WAIT, stats.wait_for(|s| s.clients == 1))
        .await
        .expect("closed client was not deregistered")
        .unwrap();
}

#[tokio::test]
async fn test_health_endpoint_over_tcp() {
    let upstream = spawn_echo_upstream().await;
    let (relay, hub) = spawn_relay(upstream).await;

    let mut status = hub.subscribe_upstream_status();
    timeout(WAIT, status.wait_for(|s| *s == BridgeStatus::Connected))
        .await
        .expect("relay never reached upstream")
        .unwrap();

    // plain HTTP/1.0 keeps the test free of an HTTP client dependency
    let mut stream = tokio::net::TcpStream::connect(relay).await.unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut stream, b"GET /health HTTP/1.0\r\n\r\n")
        .await
        .unwrap();
    let mut response = String::new();
    timeout(
        WAIT,
        tokio::io::AsyncReadExt::read_to_string(&mut stream, &mut response),
    )
    .await
    .expect("health check hung")
    .unwrap();

    assert!(response.starts_with("HTTP/1.0 200"));
    assert!(response.contains("\"status\":\"healthy\""));
}
