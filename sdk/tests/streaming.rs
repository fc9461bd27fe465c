use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
    },
};
use watson_sdk::{
    CallArgs, CancelHandle, ChannelHandler, ChannelState, Client, Credentials, Error, ServiceKind,
    stream::{recognize_start, synthesize_message},
};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Open,
    Message(Vec<u8>),
    Text(String),
    Error,
    Close,
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<Event>>,
    cancel_on_message: Mutex<Option<CancelHandle>>,
}

impl Recorder {
    fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }
}

impl ChannelHandler for Recorder {
    fn on_open(&self) {
        self.events.lock().push(Event::Open);
    }

    fn on_message(&self, data: Bytes) {
        self.events.lock().push(Event::Message(data.to_vec()));
        if let Some(handle) = self.cancel_on_message.lock().take() {
            handle.cancel();
        }
    }

    fn on_text(&self, text: &str) {
        self.events.lock().push(Event::Text(text.to_string()));
    }

    fn on_error(&self, _error: &Error) {
        self.events.lock().push(Event::Error);
    }

    fn on_close(&self) {
        self.events.lock().push(Event::Close);
    }
}

struct Handshake {
    uri: String,
    authorization: Option<String>,
}

async fn accept(
    listener: &TcpListener,
) -> (
    tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>,
    Handshake,
) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut handshake = Handshake {
        uri: String::new(),
        authorization: None,
    };
    let ws = accept_hdr_async(stream, |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        handshake.uri = req.uri().to_string();
        handshake.authorization = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(resp)
    })
    .await
    .unwrap();
    (ws, handshake)
}

async fn bind(kind: ServiceKind) -> (TcpListener, Client) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = Client::builder(Credentials::bearer_token("stream-token").unwrap())
        .url(kind, format!("http://{addr}/{}/api", kind.name()))
        .build()
        .unwrap();
    (listener, client)
}

#[tokio::test]
async fn test_synthesize_stream_delivers_frames_in_order() {
    let (listener, client) = bind(ServiceKind::TextToSpeech).await;

    let server = tokio::spawn(async move {
        let (mut ws, handshake) = accept(&listener).await;

        let init = match ws.next().await {
            Some(Ok(Message::Text(text))) => text.to_string(),
            other => panic!("expected init frame, got {other:?}"),
        };

        ws.send(Message::Binary(Bytes::from_static(b"b1"))).await.unwrap();
        ws.send(Message::Binary(Bytes::from_static(b"b2"))).await.unwrap();
        ws.send(Message::Close(None)).await.unwrap();
        while let Some(Ok(_)) = ws.next().await {}

        (handshake, init)
    });

    let recorder = Arc::new(Recorder::default());
    let channel = client
        .text_to_speech()
        .open_channel(
            "synthesize_stream",
            CallArgs::new().arg("voice", "en-US_AllisonV3Voice"),
            Some(synthesize_message("hello", "audio/wav")),
            recorder.clone(),
        )
        .await
        .unwrap();

    let state = tokio::time::timeout(Duration::from_secs(5), channel.wait())
        .await
        .unwrap();
    assert_eq!(state, ChannelState::Closed);
    assert_eq!(
        recorder.events(),
        vec![
            Event::Open,
            Event::Message(b"b1".to_vec()),
            Event::Message(b"b2".to_vec()),
            Event::Close,
        ]
    );

    let (handshake, init) = server.await.unwrap();
    assert_eq!(
        handshake.uri,
        "/text-to-speech/api/v1/synthesize?voice=en-US_AllisonV3Voice"
    );
    assert_eq!(handshake.authorization.as_deref(), Some("Bearer stream-token"));
    let init: serde_json::Value = serde_json::from_str(&init).unwrap();
    assert_eq!(init["text"], "hello");
    assert_eq!(init["accept"], "audio/wav");

    assert!(matches!(
        channel.send_text("late").await,
        Err(Error::ChannelClosed)
    ));
}

#[tokio::test]
async fn test_cancel_stops_callbacks() {
    let (listener, client) = bind(ServiceKind::TextToSpeech).await;

    let server = tokio::spawn(async move {
        let (mut ws, _) = accept(&listener).await;
        // Wait for the client to be ready before streaming.
        let _ = ws.next().await;
        for i in 0..5u8 {
            if ws.send(Message::Binary(Bytes::from(vec![i]))).await.is_err() {
                break;
            }
        }
        while let Some(Ok(_)) = ws.next().await {}
    });

    let recorder = Arc::new(Recorder::default());
    let channel = client
        .text_to_speech()
        .open_channel("synthesize_stream", CallArgs::new(), None, recorder.clone())
        .await
        .unwrap();

    *recorder.cancel_on_message.lock() = Some(channel.cancel_handle());
    channel.send_text("go").await.unwrap();

    let state = tokio::time::timeout(Duration::from_secs(5), channel.wait())
        .await
        .unwrap();
    assert_eq!(state, ChannelState::Closed);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(recorder.events(), vec![Event::Open, Event::Message(vec![0])]);

    drop(channel);
    let _ = tokio::time::timeout(Duration::from_secs(5), server).await;
}

#[tokio::test]
async fn test_recognize_stream_error_frame() {
    let (listener, client) = bind(ServiceKind::SpeechToText).await;

    tokio::spawn(async move {
        let (mut ws, _) = accept(&listener).await;
        let _ = ws.next().await;
        ws.send(Message::Text(r#"{"state":"listening"}"#.into()))
            .await
            .unwrap();
        ws.send(Message::Text(r#"{"error":"No speech detected for 30s."}"#.into()))
            .await
            .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    });

    let recorder = Arc::new(Recorder::default());
    let channel = client
        .speech_to_text()
        .open_channel(
            "recognize_stream",
            CallArgs::new().arg("model", "en-US_BroadbandModel"),
            Some(recognize_start("audio/l16;rate=16000", false)),
            recorder.clone(),
        )
        .await
        .unwrap();

    let state = tokio::time::timeout(Duration::from_secs(5), channel.wait())
        .await
        .unwrap();
    assert_eq!(state, ChannelState::Error);
    assert_eq!(
        recorder.events(),
        vec![
            Event::Open,
            Event::Text(r#"{"state":"listening"}"#.to_string()),
            Event::Error,
        ]
    );
}

#[tokio::test]
async fn test_rest_operation_cannot_open_channel() {
    let (_listener, client) = bind(ServiceKind::TextToSpeech).await;
    let err = client
        .text_to_speech()
        .open_channel(
            "synthesize",
            CallArgs::new(),
            None,
            Arc::new(Recorder::default()),
        )
        .await
        .err()
        .unwrap();
    assert!(err.is_argument());
}
