use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::models::{BookingRecord, SlotKey, TokenId, TokenState};
use crate::store::{BookingStore, StoreError};

const TOKENS_FILE: &str = "tokens.json";
const BOOKINGS_FILE: &str = "bookings.json";

#[derive(Default)]
struct Inner {
    tokens: HashMap<TokenId, TokenState>,
    bookings: Vec<BookingRecord>,
}

/// Token map and booking list behind a single `RwLock`. Optionally
/// bound to a data directory, in which case every mutation rewrites
/// `tokens.json` and `bookings.json` so the state survives restarts.
pub struct MemoryStore {
    inner: RwLock<Inner>,
    data_dir: Option<PathBuf>,
}

impl MemoryStore {
    /// Purely in-memory store, nothing persisted. Used by tests and as
    /// a scratch backend.
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(Inner::default()),
            data_dir: None,
        }
    }

    /// File-backed store rooted at `data_dir`. Missing files initialize
    /// to empty collections, matching first-run behavior.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;

        let tokens = match load_json::<HashMap<String, TokenState>>(&data_dir.join(TOKENS_FILE))? {
            Some(raw) => raw
                .into_iter()
                .map(|(token, state)| (TokenId::new(token), state))
                .collect(),
            None => HashMap::new(),
        };
        let bookings = load_json::<Vec<BookingRecord>>(&data_dir.join(BOOKINGS_FILE))?
            .unwrap_or_default();

        log::info!(
            "Loaded file store from {}: {} tokens, {} bookings",
            data_dir.display(),
            tokens.len(),
            bookings.len()
        );

        Ok(MemoryStore {
            inner: RwLock::new(Inner { tokens, bookings }),
            data_dir: Some(data_dir),
        })
    }

    fn persist_tokens(&self, inner: &Inner) -> Result<(), StoreError> {
        if let Some(dir) = &self.data_dir {
            let raw: HashMap<&str, TokenState> = inner
                .tokens
                .iter()
                .map(|(token, state)| (token.as_str(), *state))
                .collect();
            write_json(&dir.join(TOKENS_FILE), &raw)?;
        }
        Ok(())
    }

    fn persist_bookings(&self, inner: &Inner) -> Result<(), StoreError> {
        if let Some(dir) = &self.data_dir {
            write_json(&dir.join(BOOKINGS_FILE), &inner.bookings)?;
        }
        Ok(())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&text)?))
}

/// Write to a sibling temp file, then rename over the target. A crash
/// mid-write leaves the old file intact instead of a truncated one.
fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(value)?)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[async_trait::async_trait]
impl BookingStore for MemoryStore {
    async fn register_token(&self, token: &TokenId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let prior = inner.tokens.insert(token.clone(), TokenState::Free);
        if let Err(e) = self.persist_tokens(&inner) {
            // Failed writes must leave memory matching the files.
            match prior {
                Some(state) => inner.tokens.insert(token.clone(), state),
                None => inner.tokens.remove(token),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn token_state(&self, token: &TokenId) -> Result<TokenState, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tokens
            .get(token)
            .copied()
            .unwrap_or(TokenState::Unregistered))
    }

    async fn mark_token_used(&self, token: &TokenId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let prior = match inner.tokens.get(token) {
            None => return Err(StoreError::NotFound),
            Some(TokenState::Used) => return Err(StoreError::AlreadyUsed),
            Some(state) => *state,
        };
        inner.tokens.insert(token.clone(), TokenState::Used);
        if let Err(e) = self.persist_tokens(&inner) {
            inner.tokens.insert(token.clone(), prior);
            return Err(e);
        }
        Ok(())
    }

    async fn slot_exists(&self, key: &SlotKey) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.bookings.iter().any(|b| &b.slot_key() == key))
    }

    async fn append_booking(&self, record: &BookingRecord) -> Result<String, StoreError> {
        let mut inner = self.inner.write().await;
        let key = record.slot_key();
        if inner.bookings.iter().any(|b| b.slot_key() == key) {
            return Err(StoreError::SlotTaken);
        }
        inner.bookings.push(record.clone());
        if let Err(e) = self.persist_bookings(&inner) {
            // A booking that never reached disk must not hold the slot.
            inner.bookings.pop();
            return Err(e);
        }
        Ok(record.id.clone())
    }

    async fn remove_booking(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let pos = match inner.bookings.iter().position(|b| b.id == id) {
            Some(pos) => pos,
            None => return Ok(()),
        };
        let removed = inner.bookings.remove(pos);
        if let Err(e) = self.persist_bookings(&inner) {
            inner.bookings.insert(pos, removed);
            return Err(e);
        }
        Ok(())
    }

    async fn list_bookings(&self) -> Result<Vec<BookingRecord>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.bookings.clone())
    }
}
