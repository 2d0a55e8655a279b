//! Transcript channel integration tests
//!
//! Runs the channel task against a local WebSocket server.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_test::assert_ok;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use voice_assist::channel::{self, ChannelHandle, ChannelStatus, ClientMessage};
use voice_assist::config::ChannelConfig;
use voice_assist::events::{InboxReceiver, inbox};
use voice_assist::{Event, TranscriptSource};

/// Local server the channel connects to
struct Backend {
    listener: TcpListener,
    url: Url,
}

impl Backend {
    async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = Url::parse(&format!("ws://{addr}/ws")).unwrap();
        Self { listener, url }
    }

    async fn accept(&self) -> WebSocketStream<TcpStream> {
        let (stream, _) = self.listener.accept().await.unwrap();
        tokio_tungstenite::accept_async(stream).await.unwrap()
    }
}

fn connect(backend: &Backend) -> (ChannelHandle, InboxReceiver) {
    let (tx, rx) = inbox();
    let config = ChannelConfig {
        reconnect_attempts: 3,
        reconnect_delay: Duration::from_millis(50),
    };
    let (handle, _task) = channel::spawn(backend.url.clone(), config, tx);
    (handle, rx)
}

async fn next_event(rx: &mut InboxReceiver) -> Event {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no event")
        .expect("inbox closed")
}

async fn next_frame(ws: &mut WebSocketStream<TcpStream>) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("no frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn expect_status(rx: &mut InboxReceiver, expected: &ChannelStatus) {
    match next_event(rx).await {
        Event::Channel(status) => assert_eq!(&status, expected),
        other => panic!("expected {expected:?}, got {other:?}"),
    }
}

#[tokio::test]
async fn test_connect_and_announce_recording() {
    let backend = Backend::bind().await;
    let (handle, mut rx) = connect(&backend);

    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;
    assert!(handle.is_connected());

    assert_ok!(handle.send(ClientMessage::StartRecording));
    assert_eq!(next_frame(&mut ws).await, json!({"event": "start_recording"}));

    assert_ok!(handle.send(ClientMessage::StopRecording));
    assert_eq!(next_frame(&mut ws).await, json!({"event": "stop_recording"}));
}

#[tokio::test]
async fn test_audio_chunk_frame() {
    let backend = Backend::bind().await;
    let (handle, mut rx) = connect(&backend);
    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;

    assert_ok!(handle.send(ClientMessage::wav_chunk(b"RIFF".to_vec())));
    let frame = next_frame(&mut ws).await;

    assert_eq!(frame["event"], "audio_chunk");
    assert_eq!(frame["data"]["final"], true);
    assert_eq!(frame["data"]["format"], "wav");
    assert_eq!(frame["data"]["audio"], json!([82, 73, 70, 70]));
}

#[tokio::test]
async fn test_server_transcript_reaches_inbox() {
    let backend = Backend::bind().await;
    let (_handle, mut rx) = connect(&backend);
    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;

    ws.send(Message::Text(r#"{"event":"connected"}"#.into()))
        .await
        .unwrap();
    ws.send(Message::Text(
        r#"{"event":"transcript","data":{"text":"scroll down","final":true}}"#.into(),
    ))
    .await
    .unwrap();

    match next_event(&mut rx).await {
        Event::Transcript(t) => {
            assert_eq!(t.text, "scroll down");
            assert!(t.is_final);
            assert_eq!(t.source, TranscriptSource::Server);
        }
        other => panic!("expected transcript, got {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_reported() {
    let backend = Backend::bind().await;
    let (_handle, mut rx) = connect(&backend);
    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;

    ws.send(Message::Text(
        r#"{"event":"error","data":{"message":"model unavailable"}}"#.into(),
    ))
    .await
    .unwrap();

    expect_status(
        &mut rx,
        &ChannelStatus::ServerError("model unavailable".to_string()),
    )
    .await;
}

#[tokio::test]
async fn test_reconnect_reannounces_recording() {
    let backend = Backend::bind().await;
    let (handle, mut rx) = connect(&backend);

    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;

    handle.set_recording_intent(true);
    ws.close(None).await.unwrap();
    drop(ws);
    expect_status(&mut rx, &ChannelStatus::Disconnected).await;

    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;
    assert_eq!(next_frame(&mut ws).await, json!({"event": "start_recording"}));
}

#[tokio::test]
async fn test_reconnect_without_intent_stays_quiet() {
    let backend = Backend::bind().await;
    let (handle, mut rx) = connect(&backend);

    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;
    ws.close(None).await.unwrap();
    drop(ws);
    expect_status(&mut rx, &ChannelStatus::Disconnected).await;

    let mut ws = backend.accept().await;
    expect_status(&mut rx, &ChannelStatus::Connected).await;

    handle.send(ClientMessage::StopRecording).unwrap();
    assert_eq!(next_frame(&mut ws).await, json!({"event": "stop_recording"}));
}
