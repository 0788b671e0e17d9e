//! In-process mock browser for integration tests.
//!
//! Listens on `127.0.0.1:0`, accepts one WebSocket client, records every
//! frame the client sends and writes whatever the test scripts.

#![allow(dead_code)]

use std::time::Duration;

use cdp_mux::{Client, ClientBuilder};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// How long a test waits for anything before failing.
pub const WAIT: Duration = Duration::from_secs(5);

enum Outbound {
    Text(String),
    Close,
}

/// Scripted browser end of one WebSocket.
pub struct MockBrowser {
    url: String,
    frames: mpsc::UnboundedReceiver<Value>,
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl MockBrowser {
    /// Binds and starts accepting in the background.
    pub async fn start() -> Self {
        init_tracing();

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!(
            "ws://{}/devtools/browser/mock",
            listener.local_addr().expect("local addr")
        );

        let (frames_tx, frames) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let Ok(ws) = accept_async(stream).await else {
                return;
            };
            let (mut write, mut read) = ws.split();

            loop {
                tokio::select! {
                    message = read.next() => match message {
                        Some(Ok(Message::Text(text))) => {
                            let value: Value = serde_json::from_str(text.as_str()).expect("client sent JSON");
                            let _ = frames_tx.send(value);
                        }
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        _ => {}
                    },
                    command = outbound_rx.recv() => match command {
                        Some(Outbound::Text(text)) => {
                            if write.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        Some(Outbound::Close) | None => {
                            let _ = write.close().await;
                            break;
                        }
                    },
                }
            }
        });

        Self {
            url,
            frames,
            outbound,
        }
    }

    /// WebSocket URL to connect to.
    pub fn ws_url(&self) -> &str {
        &self.url
    }

    /// Next frame the client wrote.
    pub async fn expect_frame(&mut self) -> Value {
        timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("mock connection ended")
    }

    /// Next frame, asserting its method.
    pub async fn expect_method(&mut self, method: &str) -> Value {
        let frame = self.expect_frame().await;
        assert_eq!(frame["method"], method, "unexpected frame {frame}");
        frame
    }

    /// Asserts the client writes nothing for `wait`.
    pub async fn assert_no_frame(&mut self, wait: Duration) {
        if let Ok(Some(frame)) = timeout(wait, self.frames.recv()).await {
            panic!("unexpected client frame {frame}");
        }
    }

    /// Answers `frame` with `result`, echoing its `sessionId`.
    pub fn reply(&self, frame: &Value, result: Value) {
        let mut response = json!({"id": frame["id"], "result": result});
        if let Some(session_id) = frame.get("sessionId") {
            response["sessionId"] = session_id.clone();
        }
        self.send_json(&response);
    }

    /// Answers `frame` with a protocol error.
    pub fn reply_error(&self, frame: &Value, code: i64, message: &str) {
        let mut response = json!({"id": frame["id"], "error": {"code": code, "message": message}});
        if let Some(session_id) = frame.get("sessionId") {
            response["sessionId"] = session_id.clone();
        }
        self.send_json(&response);
    }

    /// Sends an event, optionally tagged with a session.
    pub fn emit(&self, method: &str, params: Value, session_id: Option<&str>) {
        let mut event = json!({"method": method, "params": params});
        if let Some(session_id) = session_id {
            event["sessionId"] = json!(session_id);
        }
        self.send_json(&event);
    }

    /// Sends `Target.attachedToTarget` for `session_id`/`target_id`.
    pub fn emit_attached(&self, session_id: &str, target_id: &str) {
        self.emit(
            "Target.attachedToTarget",
            json!({
                "sessionId": session_id,
                "targetInfo": {
                    "targetId": target_id,
                    "type": "page",
                    "title": "",
                    "url": "about:blank",
                    "attached": true
                },
                "waitingForDebugger": false
            }),
            None,
        );
    }

    /// Sends raw text.
    pub fn send_raw(&self, text: &str) {
        let _ = self.outbound.send(Outbound::Text(text.to_string()));
    }

    /// Closes the socket from the browser side.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    fn send_json(&self, value: &Value) {
        self.send_raw(&value.to_string());
    }
}

/// Connects a client with the bundled descriptor and short timeouts.
pub async fn connect(mock: &MockBrowser) -> Client {
    builder().connect(mock.ws_url()).await.expect("connect")
}

/// Builder tuned for tests.
pub fn builder() -> ClientBuilder {
    Client::builder()
        .command_timeout(WAIT)
        .connect_timeout(WAIT)
}

/// Attaches to `target_id`, answering as the browser with `session_id`.
pub async fn attach(client: &Client, mock: &mut MockBrowser, target_id: &str, session_id: &str) -> cdp_mux::Session {
    let attaching = {
        let client = client.clone();
        let target_id = target_id.to_string();
        tokio::spawn(async move { client.attach(target_id.as_str()).await })
    };

    let frame = mock.expect_method("Target.attachToTarget").await;
    assert_eq!(frame["params"], json!({"targetId": target_id, "flatten": true}));
    assert!(frame.get("sessionId").is_none());

    mock.emit_attached(session_id, target_id);
    mock.reply(&frame, json!({"sessionId": session_id}));

    attaching.await.expect("attach task").expect("attach")
}

/// Waits until every frame the mock sent so far has been routed.
///
/// Frames are handled in order, so once a marker event reaches a root
/// listener everything before it has been dispatched.
pub async fn sync(client: &Client, mock: &MockBrowser) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    client
        .once("Inspector", "detached", move |_| {
            let _ = tx.send(());
            Ok(())
        })
        .expect("subscribe marker");

    mock.emit("Inspector.detached", json!({"reason": "sync"}), None);

    timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for marker")
        .expect("marker listener dropped");
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
