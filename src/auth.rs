//! Account registration and sign-in.
//!
//! [`AuthProvider`] is the credential backend; [`AuthController`] turns its
//! answers into an observable [`AuthState`] and keeps the durable session in
//! step with it.
use std::{
    collections::HashMap,
    future::Future,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::watch;

use crate::{read_json_file, write_json_atomic, NotesError, Result, SessionContext, SessionManager};

/// Registers and validates owner credentials.
pub trait AuthProvider: Send + Sync {
    /// Returns `false` when the identity is already registered
    fn register(&self, email: &str, password: &str) -> impl Future<Output = Result<bool>> + Send;

    fn login(&self, email: &str, password: &str) -> impl Future<Output = Result<bool>> + Send;

    fn has_any_accounts(&self) -> impl Future<Output = Result<bool>> + Send;

    fn is_email_taken(&self, email: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// A stored account. Only the password hash is kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// SHA-256 of the password, lowercase hex
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Accounts persisted in a single JSON file keyed by email.
pub struct JsonAccountStore {
    path: PathBuf,
    users: Mutex<HashMap<String, User>>,
}

impl JsonAccountStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let users: Vec<User> = read_json_file(&path)?.unwrap_or_default();
        info!("Loaded {} accounts", users.len());
        Ok(Self {
            path,
            users: Mutex::new(users.into_iter().map(|u| (u.email.clone(), u)).collect()),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, User>>> {
        self.users
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on accounts".to_string(),
            })
    }

    fn register_user(&self, email: &str, password: &str) -> Result<bool> {
        let mut users = self.lock()?;
        if users.contains_key(email) {
            return Ok(false);
        }

        let user = User {
            email: email.to_string(),
            password_hash: hash_password(password),
            created_at: Utc::now(),
        };
        let mut all: Vec<&User> = users.values().collect();
        all.push(&user);
        all.sort_by(|a, b| a.email.cmp(&b.email));
        write_json_atomic(&self.path, &all)?;

        users.insert(email.to_string(), user);
        info!("Registered account {}", email);
        Ok(true)
    }

    fn check_credentials(&self, email: &str, password: &str) -> Result<bool> {
        let users = self.lock()?;
        Ok(users
            .get(email)
            .is_some_and(|user| user.password_hash == hash_password(password)))
    }
}

impl AuthProvider for JsonAccountStore {
    async fn register(&self, email: &str, password: &str) -> Result<bool> {
        self.register_user(email, password)
    }

    async fn login(&self, email: &str, password: &str) -> Result<bool> {
        self.check_credentials(email, password)
    }

    async fn has_any_accounts(&self) -> Result<bool> {
        Ok(!self.lock()?.is_empty())
    }

    async fn is_email_taken(&self, email: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(email))
    }
}

/// Progress of the last register/login attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Idle,
    Loading,
    Success,
    Error(String),
}

/// Drives sign-up, sign-in and sign-out against an [`AuthProvider`].
pub struct AuthController<P: AuthProvider> {
    provider: P,
    sessions: SessionManager,
    state_tx: watch::Sender<AuthState>,
    authenticated_tx: watch::Sender<bool>,
}

impl<P: AuthProvider> AuthController<P> {
    pub fn new(provider: P, sessions: SessionManager) -> Result<Self> {
        let logged_in = sessions.is_logged_in()?;
        let (state_tx, _) = watch::channel(AuthState::Idle);
        let (authenticated_tx, _) = watch::channel(logged_in);
        Ok(Self {
            provider,
            sessions,
            state_tx,
            authenticated_tx,
        })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn auth_state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    pub fn observe_auth_state(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        *self.authenticated_tx.borrow()
    }

    pub fn observe_authenticated(&self) -> watch::Receiver<bool> {
        self.authenticated_tx.subscribe()
    }

    pub async fn register(&self, email: &str, password: &str) -> AuthState {
        self.state_tx.send_replace(AuthState::Loading);
        let state = match self.provider.register(email, password).await {
            Ok(true) => self.sign_in(email),
            Ok(false) => AuthState::Error("Email already registered".to_string()),
            Err(e) => AuthState::Error(format!("Registration failed: {}", e)),
        };
        self.finish(state)
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthState {
        self.state_tx.send_replace(AuthState::Loading);
        let state = match self.provider.login(email, password).await {
            Ok(true) => self.sign_in(email),
            Ok(false) => AuthState::Error("Invalid credentials".to_string()),
            Err(e) => AuthState::Error(format!("Login failed: {}", e)),
        };
        self.finish(state)
    }

    pub fn logout(&self) -> Result<()> {
        self.sessions.clear_session()?;
        self.authenticated_tx.send_replace(false);
        self.state_tx.send_replace(AuthState::Idle);
        info!("Signed out");
        Ok(())
    }

    pub fn reset_auth_state(&self) {
        self.state_tx.send_replace(AuthState::Idle);
    }

    /// Context for the note organizer of the current session
    pub fn session_context(&self) -> Result<SessionContext> {
        self.sessions.context()
    }

    fn sign_in(&self, email: &str) -> AuthState {
        match self.sessions.save_user_session(email) {
            Ok(()) => {
                self.authenticated_tx.send_replace(true);
                AuthState::Success
            }
            Err(e) => {
                warn!("Failed to save session for {}: {}", email, e);
                AuthState::Error(format!("Could not save session: {}", e))
            }
        }
    }

    fn finish(&self, state: AuthState) -> AuthState {
        self.state_tx.send_replace(state.clone());
        state
    }
}
