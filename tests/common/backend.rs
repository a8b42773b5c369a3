//! Mock backend lifecycle management
//!
//! Spawns an in-process HTTP server that mimics the Aivi backend. Each test
//! gets an isolated instance with scripted responses and request counters.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// Bearer token the mock accepts.
pub const TEST_TOKEN: &str = "test-token";
pub const TEST_EMAIL: &str = "ada@example.com";
pub const TEST_PASS: &str = "hunter2";
/// Verification code `/users/verify-email` accepts.
pub const TEST_CODE: &str = "123456";

/// What the audio proxy should answer with.
pub enum AudioBody {
    /// A blob with the given content type.
    Blob {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
    /// HTTP 200 whose body is a JSON error payload.
    DisguisedError { message: &'static str },
    /// A failing status with a JSON `error` body.
    HttpError {
        status: StatusCode,
        message: &'static str,
    },
}

/// Shared mutable state behind the mock's routes.
pub struct BackendState {
    /// Scripted `/chat/generate-beat/status` responses, consumed in order.
    /// The last one is repeated once the queue runs dry.
    pub status_script: Mutex<VecDeque<Value>>,
    /// Response for `/chat/generate-beat`.
    pub submit_response: Mutex<Value>,
    /// 201 body for `/users/register`.
    pub register_response: Mutex<Value>,
    /// Response for `/recommend/youtube-search`.
    pub search_response: Mutex<Value>,
    /// Response for `/recommend/youtube-audio`.
    pub audio_body: Mutex<AudioBody>,
    /// Profile returned by `/users/me`.
    pub profile: Mutex<Value>,
    /// Saved songs, keyed by video id for duplicate detection.
    pub saved_songs: Mutex<Vec<Value>>,
    /// When set, every authenticated route answers 401.
    pub reject_auth: AtomicBool,

    pub status_polls: AtomicUsize,
    pub audio_hits: AtomicUsize,
    pub analyze_hits: AtomicUsize,
    pub search_hits: AtomicUsize,
}

impl Default for BackendState {
    fn default() -> Self {
        Self {
            status_script: Mutex::new(VecDeque::new()),
            submit_response: Mutex::new(json!({
                "success": true,
                "request_id": "abc123"
            })),
            register_response: Mutex::new(json!({
                "detail": {
                    "requires_verification": true,
                    "message": "Check your inbox for a verification code",
                    "email": TEST_EMAIL
                }
            })),
            search_response: Mutex::new(json!({ "results": [] })),
            audio_body: Mutex::new(AudioBody::Blob {
                content_type: "audio/mpeg",
                bytes: b"ID3-not-really-audio".to_vec(),
            }),
            profile: Mutex::new(json!({
                "id": 1,
                "username": "ada",
                "email": TEST_EMAIL,
                "name": null,
                "avatar_url": null,
                "account_type": "free",
                "daily_usage": 0,
                "remaining_analyses": 5,
                "is_verified": true,
                "provider": null,
                "created_at": null
            })),
            saved_songs: Mutex::new(Vec::new()),
            reject_auth: AtomicBool::new(false),
            status_polls: AtomicUsize::new(0),
            audio_hits: AtomicUsize::new(0),
            analyze_hits: AtomicUsize::new(0),
            search_hits: AtomicUsize::new(0),
        }
    }
}

impl BackendState {
    /// Queue one status response.
    pub fn push_status(&self, value: Value) {
        self.status_script.lock().unwrap().push_back(value);
    }

    /// Queue `count` pending statuses.
    pub fn push_pending(&self, count: usize) {
        for _ in 0..count {
            self.push_status(json!({ "success": true, "status": { "status": "pending" } }));
        }
    }
}

/// Mock backend instance bound to a random local port.
///
/// When dropped, the server shuts down.
pub struct MockBackend {
    pub base_url: String,
    pub state: Arc<BackendState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockBackend {
    pub async fn spawn() -> Self {
        let state = Arc::new(BackendState::default());

        let app = Router::new()
            .route("/users/register", post(register))
            .route("/users/verify-email", post(verify_email))
            .route("/users/resend-verification", post(resend_verification))
            .route("/users/login", post(login))
            .route("/users/me", get(profile))
            .route("/users/update-profile", put(update_profile))
            .route("/chat/analyze-media", post(analyze_media))
            .route("/chat/get-recommendations", post(get_recommendations))
            .route("/chat/generate-beat", post(generate_beat))
            .route("/chat/generate-beat/status", post(beat_status))
            .route(
                "/media/saved-songs",
                get(list_saved_songs).post(add_saved_song),
            )
            .route("/media/saved-songs/{video_id}", delete(remove_saved_song))
            .route("/recommend/youtube-search", get(youtube_search))
            .route("/recommend/youtube-audio", get(youtube_audio))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .expect("Mock backend failed");
        });

        Self {
            base_url,
            state,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn status_polls(&self) -> usize {
        self.state.status_polls.load(Ordering::SeqCst)
    }

    pub fn audio_hits(&self) -> usize {
        self.state.audio_hits.load(Ordering::SeqCst)
    }

    pub fn analyze_hits(&self) -> usize {
        self.state.analyze_hits.load(Ordering::SeqCst)
    }

    pub fn search_hits(&self) -> usize {
        self.state.search_hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn authorized(state: &BackendState, headers: &HeaderMap) -> bool {
    if state.reject_auth.load(Ordering::SeqCst) {
        return false;
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TEST_TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Not authenticated" })),
    )
        .into_response()
}

fn session_token() -> Value {
    json!({
        "access_token": TEST_TOKEN,
        "token_type": "bearer",
        "user": {
            "id": 1,
            "email": TEST_EMAIL,
            "username": "ada",
            "is_active": true,
            "is_verified": true
        }
    })
}

async fn register(State(state): State<Arc<BackendState>>, Json(_body): Json<Value>) -> Response {
    (
        StatusCode::CREATED,
        Json(state.register_response.lock().unwrap().clone()),
    )
        .into_response()
}

async fn verify_email(State(_state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    if body["verification_code"].as_str() != Some(TEST_CODE) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Invalid verification code" })),
        )
            .into_response();
    }
    Json(session_token()).into_response()
}

async fn resend_verification(
    State(_state): State<Arc<BackendState>>,
    Json(_body): Json<Value>,
) -> Response {
    Json(json!({ "message": "Verification code sent" })).into_response()
}

async fn login(State(_state): State<Arc<BackendState>>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();
    if email != TEST_EMAIL || password != TEST_PASS {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Invalid credentials" })),
        )
            .into_response();
    }
    Json(session_token()).into_response()
}

async fn profile(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(state.profile.lock().unwrap().clone()).into_response()
}

async fn update_profile(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let mut profile = state.profile.lock().unwrap();
    if let Some(name) = body.get("name") {
        profile["name"] = name.clone();
    }
    if let Some(avatar_url) = body.get("avatar_url") {
        profile["avatar_url"] = avatar_url.clone();
    }
    Json(profile.clone()).into_response()
}

async fn analyze_media(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    _body: axum::body::Bytes,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    state.analyze_hits.fetch_add(1, Ordering::SeqCst);
    Json(json!({
        "mood": "serene",
        "description": "calm evening by the lake",
        "emotions": ["peaceful", "nostalgic"],
        "energy_level": 0.3,
        "valence": 0.7,
        "danceability": 0.2,
        "tempo": 0.4,
        "genres": ["ambient"]
    }))
    .into_response()
}

async fn get_recommendations(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(_body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(json!({
        "personal": {
            "recommended_tracks": [
                { "name": "Weightless", "artist": "Marconi Union", "reason": "slow and calm" },
                { "name": "Porcelain", "artist": "Moby", "reason": "soft textures" }
            ],
            "explanation": "matched to a serene mood",
            "alternative_genres": ["downtempo"]
        },
        "global": {
            "recommended_tracks": [
                { "name": "Intro", "artist": "The xx", "reason": "widely loved" }
            ],
            "explanation": "",
            "alternative_genres": []
        }
    }))
    .into_response()
}

async fn generate_beat(
    State(state): State<Arc<BackendState>>,
    Json(_body): Json<Value>,
) -> Response {
    Json(state.submit_response.lock().unwrap().clone()).into_response()
}

async fn beat_status(State(state): State<Arc<BackendState>>, Json(_body): Json<Value>) -> Response {
    state.status_polls.fetch_add(1, Ordering::SeqCst);
    let mut script = state.status_script.lock().unwrap();
    let value = if script.len() > 1 {
        script.pop_front().unwrap()
    } else {
        // Keep answering with the last entry so late polls stay consistent.
        script
            .front()
            .cloned()
            .unwrap_or_else(|| json!({ "success": true, "status": { "status": "pending" } }))
    };
    Json(value).into_response()
}

async fn list_saved_songs(State(state): State<Arc<BackendState>>, headers: HeaderMap) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    Json(Value::Array(state.saved_songs.lock().unwrap().clone())).into_response()
}

async fn add_saved_song(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let video_id = body["youtube_video_id"].as_str().unwrap_or_default();
    let mut saved = state.saved_songs.lock().unwrap();
    if saved
        .iter()
        .any(|s| s["youtube_video_id"].as_str() == Some(video_id))
    {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "detail": "Song already saved" })),
        )
            .into_response();
    }
    let song = json!({
        "id": saved.len() as i64 + 1,
        "user_id": 1,
        "youtube_video_id": video_id,
        "title": body["title"],
        "artist": body["artist"],
        "date_saved": "2026-08-30T12:00:00Z"
    });
    saved.push(song.clone());
    (StatusCode::CREATED, Json(song)).into_response()
}

async fn remove_saved_song(
    State(state): State<Arc<BackendState>>,
    headers: HeaderMap,
    Path(video_id): Path<String>,
) -> Response {
    if !authorized(&state, &headers) {
        return unauthorized();
    }
    let mut saved = state.saved_songs.lock().unwrap();
    let before = saved.len();
    saved.retain(|s| s["youtube_video_id"].as_str() != Some(video_id.as_str()));
    if saved.len() == before {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "detail": "Song not found" })),
        )
            .into_response();
    }
    StatusCode::NO_CONTENT.into_response()
}

#[derive(serde::Deserialize)]
struct SearchParams {
    #[allow(dead_code)]
    q: String,
    #[allow(dead_code)]
    max_results: usize,
}

async fn youtube_search(
    State(state): State<Arc<BackendState>>,
    Query(_params): Query<SearchParams>,
) -> Response {
    state.search_hits.fetch_add(1, Ordering::SeqCst);
    Json(state.search_response.lock().unwrap().clone()).into_response()
}

#[derive(serde::Deserialize)]
struct AudioParams {
    #[allow(dead_code)]
    video_id: String,
}

async fn youtube_audio(
    State(state): State<Arc<BackendState>>,
    Query(_params): Query<AudioParams>,
) -> Response {
    state.audio_hits.fetch_add(1, Ordering::SeqCst);
    match &*state.audio_body.lock().unwrap() {
        AudioBody::Blob {
            content_type,
            bytes,
        } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, *content_type)],
            bytes.clone(),
        )
            .into_response(),
        AudioBody::DisguisedError { message } => {
            Json(json!({ "error": message })).into_response()
        }
        AudioBody::HttpError { status, message } => {
            (*status, Json(json!({ "error": message }))).into_response()
        }
    }
}
