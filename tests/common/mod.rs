//! Common test infrastructure
//!
//! This module provides the mock Aivi backend used in the end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{MockBackend, TEST_EMAIL, TEST_PASS};
//!
//! #[tokio::test]
//! async fn test_login() {
//!     let backend = MockBackend::spawn().await;
//!     // point a BackendClient at backend.base_url ...
//! }
//! ```

mod backend;

// Public API - this is what tests import
pub use backend::{AudioBody, BackendState, MockBackend, TEST_CODE, TEST_EMAIL, TEST_PASS, TEST_TOKEN};

use std::sync::Arc;
use std::time::Duration;

use aivi_studio::api::{BackendClient, MoodAnalysis, Token, User};
use aivi_studio::generation::PollerSettings;
use aivi_studio::state::{SqliteStateStore, StateStore, KEY_SESSION, KEY_STUDIO};
use aivi_studio::studio::{StudioSession, StudioState};

/// Poll timings short enough for tests.
pub fn fast_poller() -> PollerSettings {
    PollerSettings {
        poll_interval: Duration::from_millis(20),
        max_duration: Duration::from_secs(5),
    }
}

/// A studio session backed by an in-memory state store.
///
/// The store handle is returned alongside so tests can seed or inspect the
/// persisted state directly.
pub fn test_session(backend: &MockBackend) -> (StudioSession, Arc<SqliteStateStore>) {
    let client = BackendClient::new(&backend.base_url, 5).expect("Failed to build client");
    let store = Arc::new(SqliteStateStore::in_memory().expect("Failed to open state store"));
    let session = StudioSession::new(client, store.clone(), "en".to_string(), fast_poller());
    (session, store)
}

/// A mood analysis matching what the mock's analyze route returns.
pub fn serene_analysis() -> MoodAnalysis {
    MoodAnalysis {
        mood: "serene".to_string(),
        description: "calm evening by the lake".to_string(),
        emotions: vec!["peaceful".to_string(), "nostalgic".to_string()],
        energy_level: 0.3,
        valence: 0.7,
        danceability: 0.2,
        tempo: 0.4,
        genres: vec!["ambient".to_string()],
    }
}

/// Persist a valid session token, as if `login` had run.
pub fn seed_login(store: &SqliteStateStore) {
    let token = Token {
        access_token: TEST_TOKEN.to_string(),
        token_type: "bearer".to_string(),
        user: User {
            id: 1,
            email: TEST_EMAIL.to_string(),
            username: "ada".to_string(),
            is_active: true,
            is_verified: true,
        },
    };
    let store: &dyn StateStore = store;
    store
        .put_json(KEY_SESSION, &token)
        .expect("Failed to seed session");
}

/// Persist a studio state that already holds an analysis.
pub fn seed_analysis(store: &SqliteStateStore) {
    let state = StudioState {
        mood_analysis: Some(serene_analysis()),
        ..StudioState::default()
    };
    let store: &dyn StateStore = store;
    store
        .put_json(KEY_STUDIO, &state)
        .expect("Failed to seed studio state");
}
