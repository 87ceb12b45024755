use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

/// Canned behavior for the mock completion API.
#[derive(Clone)]
pub enum UpstreamBehavior {
    /// Stream the fragments as SSE chat-completion chunks, then `[DONE]`.
    Stream(Vec<String>),
    /// Fail before any streaming starts.
    Error { status: u16, message: String },
}

impl UpstreamBehavior {
    pub fn stream(fragments: &[&str]) -> Self {
        UpstreamBehavior::Stream(fragments.iter().map(|s| s.to_string()).collect())
    }
}

#[derive(Clone)]
struct MockState {
    behavior: UpstreamBehavior,
    hits: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
}

/// Mock upstream completion server. Counts requests and records the last
/// request body so tests can assert what the relay actually sent.
pub struct MockUpstream {
    pub url: String,
    hits: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockUpstream {
    pub async fn start(behavior: UpstreamBehavior) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let last_body = Arc::new(Mutex::new(None));
        let state = MockState {
            behavior,
            hits: hits.clone(),
            last_body: last_body.clone(),
        };

        let app = Router::new()
            .route("/chat/completions", post(chat_completions_handler))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
                .unwrap();
        });

        MockUpstream {
            url: format!("http://{}", addr),
            hits,
            last_body,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn last_body(&self) -> Option<Value> {
        self.last_body.lock().unwrap().clone()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn chat_completions_handler(
    State(state): State<MockState>,
    Json(body): Json<Value>,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().unwrap() = Some(body);

    match state.behavior {
        UpstreamBehavior::Stream(fragments) => {
            let mut frames: Vec<Result<String, Infallible>> = fragments
                .iter()
                .map(|fragment| {
                    let chunk = json!({"choices": [{"delta": {"content": fragment}}]});
                    Ok(format!("data: {}\n\n", chunk))
                })
                .collect();
            frames.push(Ok("data: [DONE]\n\n".to_string()));
            Response::builder()
                .header("content-type", "text/event-stream")
                .body(Body::from_stream(futures_util::stream::iter(frames)))
                .unwrap()
        }
        UpstreamBehavior::Error { status, message } => {
            let status = StatusCode::from_u16(status).unwrap();
            (status, Json(json!({"error": {"message": message}}))).into_response()
        }
    }
}
