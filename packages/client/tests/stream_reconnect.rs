//! Stats stream client against the stub backend over real WebSockets.

use std::time::Duration;

use jetty_client::{BackoffPolicy, StreamClient, StreamConfig};
use jetty_devserver::{DevServer, DevServerConfig, DevServerHandle};
use serde_json::{Value, json};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> DevServerHandle {
    let config = DevServerConfig {
        push_interval: Duration::from_millis(50),
        ..DevServerConfig::default()
    };
    DevServer::new(config)
        .spawn("127.0.0.1:0")
        .await
        .expect("Failed to start stub backend")
}

/// Log in as staff and return the access token for the stream
async fn staff_token(server: &DevServerHandle) -> String {
    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/auth/login", server.base_url()))
        .json(&json!({"username": "admin", "password": "admin"}))
        .send()
        .await
        .expect("Failed to log in")
        .json()
        .await
        .expect("Failed to decode login response");
    body["access_token"]
        .as_str()
        .expect("Login response without access token")
        .to_string()
}

fn fast_config(origin: String) -> StreamConfig {
    StreamConfig {
        backoff: BackoffPolicy::new(Duration::from_millis(50), Duration::from_millis(200)),
        ..StreamConfig::new(origin)
    }
}

async fn authorized_config(server: &DevServerHandle) -> StreamConfig {
    fast_config(server.base_url()).with_token(staff_token(server).await)
}

/// Poll `condition` until it holds or `WAIT` elapses
async fn eventually(condition: impl Fn() -> bool) -> bool {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_stream_delivers_snapshots() {
    // テスト項目: 接続後にサーバーから送られたスナップショットを受け取れる
    // given (前提条件):
    let server = start_server().await;
    let client: StreamClient = StreamClient::spawn(authorized_config(&server).await);

    // when (操作):
    let received = eventually(|| client.latest_snapshot().is_some()).await;

    // then (期待する結果):
    assert!(received);
    assert!(client.is_connected());
    let stats = client.latest_snapshot().unwrap();
    assert!(stats.ticket_count > 0);
    assert_eq!(stats.active_ferries, 4);
}

#[tokio::test]
async fn test_stream_reconnects_after_server_drop() {
    // テスト項目: サーバーに切断されても自動で再接続し、リトライ回数が 0 に戻る
    // given (前提条件):
    let server = start_server().await;
    let client: StreamClient = StreamClient::spawn(authorized_config(&server).await);
    assert!(eventually(|| client.is_connected()).await);

    // when (操作):
    server.kick_streams();
    let reconnected = eventually(|| server.streams_accepted() >= 2 && client.is_connected()).await;

    // then (期待する結果):
    assert!(reconnected);
    assert_eq!(client.state().retry_count, 0);
    assert_eq!(server.streams_live(), 1);
}

#[tokio::test]
async fn test_teardown_closes_server_side_stream() {
    // テスト項目: close するとサーバー側の接続も閉じられ、その後再接続されない
    // given (前提条件):
    let server = start_server().await;
    let client: StreamClient = StreamClient::spawn(authorized_config(&server).await);
    assert!(eventually(|| server.streams_live() == 1).await);

    // when (操作):
    client.close();
    client.closed().await;
    let released = eventually(|| server.streams_live() == 0).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    // then (期待する結果):
    assert!(released);
    assert!(!client.is_connected());
    assert_eq!(server.streams_accepted(), 1);
}

#[tokio::test]
async fn test_unreachable_server_keeps_retrying() {
    // テスト項目: サーバーに接続できない間も例外にならず、バックオフしながら再試行を続ける
    // given (前提条件):
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    // when (操作):
    let client: StreamClient = StreamClient::spawn(fast_config(origin));
    let retrying = eventually(|| client.state().retry_count >= 3).await;

    // then (期待する結果):
    assert!(retrying);
    assert!(!client.is_connected());
    assert!(client.latest_snapshot().is_none());
}

#[tokio::test]
async fn test_stream_without_token_is_rejected() {
    // テスト項目: トークンなしの接続はサーバーに拒否され、スナップショットは届かないまま再試行が続く
    // given (前提条件):
    let server = start_server().await;

    // when (操作):
    let client: StreamClient = StreamClient::spawn(fast_config(server.base_url()));
    let retried = eventually(|| server.streams_rejected() >= 2).await;

    // then (期待する結果):
    assert!(retried);
    assert_eq!(server.streams_accepted(), 0);
    assert!(client.latest_snapshot().is_none());
}

#[tokio::test]
async fn test_stalled_handshake_times_out_and_retries() {
    // テスト項目: TCP は受け付けるがハンドシェイクに応答しないサーバーでも、タイムアウトして再試行を続ける
    // given (前提条件):
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let origin = format!("http://{}", listener.local_addr().unwrap());
    let holder = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    let config = StreamConfig {
        connect_timeout: Duration::from_millis(100),
        ..fast_config(origin)
    };

    // when (操作):
    let client: StreamClient = StreamClient::spawn(config);
    let retrying = eventually(|| client.state().retry_count >= 3).await;

    // then (期待する結果):
    assert!(retrying);
    assert!(!client.is_connected());
    holder.abort();
}
