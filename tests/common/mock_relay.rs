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

/// Canned behavior for a mock relay endpoint, as seen by `ChatSession`.
#[derive(Clone)]
pub enum RelayBehavior {
    /// Stream the fragments verbatim as a plain-text body.
    Stream(Vec<String>),
    /// Return a structured `{"error": ...}` body with the given status.
    Error { status: u16, error: String },
}

impl RelayBehavior {
    pub fn stream(fragments: &[&str]) -> Self {
        RelayBehavior::Stream(fragments.iter().map(|s| s.to_string()).collect())
    }
}

#[derive(Clone)]
struct MockState {
    behavior: RelayBehavior,
    hits: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
}

pub struct MockRelay {
    pub url: String,
    hits: Arc<AtomicUsize>,
    last_body: Arc<Mutex<Option<Value>>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockRelay {
    pub async fn start(behavior: RelayBehavior) -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let last_body = Arc::new(Mutex::new(None));
        let state = MockState {
            behavior,
            hits: hits.clone(),
            last_body: last_body.clone(),
        };

        let app = Router::new()
            .route("/api/chat", post(chat_handler))
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

        MockRelay {
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

impl Drop for MockRelay {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn chat_handler(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_body.lock().unwrap() = Some(body);

    match state.behavior {
        RelayBehavior::Stream(fragments) => {
            let frames: Vec<Result<String, Infallible>> =
                fragments.iter().map(|fragment| Ok(fragment.clone())).collect();
            Response::builder()
                .header("content-type", "text/plain; charset=utf-8")
                .body(Body::from_stream(futures_util::stream::iter(frames)))
                .unwrap()
        }
        RelayBehavior::Error { status, error } => {
            let status = StatusCode::from_u16(status).unwrap();
            (status, Json(json!({"error": error}))).into_response()
        }
    }
}
