use async_trait::async_trait;
use std::{collections::HashSet, sync::Mutex};
use uuid::Uuid;

pub const SESSION_COOKIE_NAME: &str = "caption_session";

const SESSION_KEY_CONTEXT: &str = "image-caption-service 2024 session cookie";

/// Per-session "free caption already used" flags.
///
/// Flags only ever go from unset to set.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn is_used(&self, session_id: &str) -> bool;

    /// Set the flag, returning `true` only for the call that actually set it.
    async fn mark_used(&self, session_id: &str) -> bool;
}

#[derive(Default)]
pub struct MemorySessionStore {
    used: Mutex<HashSet<String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn is_used(&self, session_id: &str) -> bool {
        match self.used.lock() {
            Ok(used) => used.contains(session_id),
            Err(poisoned) => poisoned.into_inner().contains(session_id),
        }
    }

    async fn mark_used(&self, session_id: &str) -> bool {
        match self.used.lock() {
            Ok(mut used) => used.insert(session_id.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(session_id.to_string()),
        }
    }
}

/// Signs session ids so clients cannot pick or forge them.
pub struct SessionKey {
    key: [u8; 32],
}

impl SessionKey {
    pub fn new(secret: &str) -> Self {
        Self {
            key: blake3::derive_key(SESSION_KEY_CONTEXT, secret.as_bytes()),
        }
    }

    fn sign(&self, session_id: &str) -> blake3::Hash {
        blake3::keyed_hash(&self.key, session_id.as_bytes())
    }

    pub fn new_session_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Cookie value in the form `<session id>.<hex signature>`.
    pub fn encode(&self, session_id: &str) -> String {
        format!("{}.{}", session_id, self.sign(session_id).to_hex())
    }

    pub fn decode(&self, value: &str) -> Option<String> {
        let (session_id, signature) = value.rsplit_once('.')?;
        Uuid::parse_str(session_id).ok()?;
        let signature = blake3::Hash::from_hex(signature).ok()?;

        // Hash equality is constant time
        (self.sign(session_id) == signature).then(|| session_id.to_string())
    }

    /// Find and verify our cookie in a `Cookie` request header.
    pub fn from_cookie_header(&self, header: &str) -> Option<String> {
        header
            .split(';')
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| *name == SESSION_COOKIE_NAME)
            .find_map(|(_, value)| self.decode(value))
    }

    pub fn set_cookie_header(&self, session_id: &str) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/",
            SESSION_COOKIE_NAME,
            self.encode(session_id)
        )
    }
}
