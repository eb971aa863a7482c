use std::sync::Arc;
use tokio::sync::Mutex;

use crate::catalog::Catalog;
use crate::models::{BookingRecord, BookingRequest, TokenState};
use crate::store::{BookingStore, StoreError};

/// Admission outcome surfaced to the caller. Each cause keeps its own
/// variant; the HTTP layer maps them to distinct statuses.
#[derive(Debug)]
pub enum AdmissionError {
    MalformedRequest(String),
    InvalidToken,
    TokenAlreadyUsed,
    SlotTaken,
    StoreUnavailable(String),
}

impl std::fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionError::MalformedRequest(reason) => write!(f, "malformed request: {}", reason),
            AdmissionError::InvalidToken => write!(f, "booking token is not valid"),
            AdmissionError::TokenAlreadyUsed => write!(f, "booking token was already used"),
            AdmissionError::SlotTaken => write!(f, "slot is already booked"),
            AdmissionError::StoreUnavailable(e) => write!(f, "store unavailable: {}", e),
        }
    }
}

impl std::error::Error for AdmissionError {}

/// The booking admission state machine: validate token, check the
/// slot, commit the record, consume the token. The whole sequence runs
/// under one in-process gate so two concurrent admissions for the same
/// token or the same slot can never both succeed.
pub struct AdmissionService {
    store: Arc<dyn BookingStore>,
    catalog: Catalog,
    gate: Mutex<()>,
}

impl AdmissionService {
    pub fn new(store: Arc<dyn BookingStore>, catalog: Catalog) -> Self {
        AdmissionService {
            store,
            catalog,
            gate: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        &self.store
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub async fn admit(&self, request: BookingRequest) -> Result<BookingRecord, AdmissionError> {
        // Malformed input never touches state.
        request
            .validate()
            .map_err(AdmissionError::MalformedRequest)?;

        let _gate = self.gate.lock().await;

        // Step 1: token must exist and still be free.
        match self
            .store
            .token_state(&request.token)
            .await
            .map_err(store_unavailable)?
        {
            TokenState::Unregistered => {
                log::warn!("Rejected booking with unregistered token {}", request.token);
                return Err(AdmissionError::InvalidToken);
            }
            TokenState::Used => {
                log::warn!("Rejected booking with consumed token {}", request.token);
                return Err(AdmissionError::TokenAlreadyUsed);
            }
            TokenState::Free => {}
        }

        // Step 2: slot must be unoccupied.
        let key = request.slot_key();
        if self
            .store
            .slot_exists(&key)
            .await
            .map_err(store_unavailable)?
        {
            log::warn!("Rejected booking for occupied slot {}", key);
            return Err(AdmissionError::SlotTaken);
        }

        // Step 3: commit the record, enriched with display names when
        // the catalog knows them.
        let token = request.token.clone();
        let mut record = request.into_record();
        record.service_name = self
            .catalog
            .resolve_display_name(&record.service)
            .map(str::to_string);
        record.addon_name = record
            .addon
            .as_deref()
            .and_then(|id| self.catalog.resolve_display_name(id))
            .map(str::to_string);

        match self.store.append_booking(&record).await {
            Ok(_) => {}
            Err(StoreError::SlotTaken) => return Err(AdmissionError::SlotTaken),
            Err(e) => return Err(store_unavailable(e)),
        }

        // Step 4: consume the token. If this fails the slot row must
        // not survive with a still-free token, so the append is rolled
        // back while the gate is still held.
        if let Err(e) = self.store.mark_token_used(&token).await {
            log::error!(
                "Failed to consume token {} after committing booking {}: {}",
                token,
                record.id,
                e
            );
            if let Err(rollback_err) = self.store.remove_booking(&record.id).await {
                log::error!(
                    "Rollback of booking {} failed, state is inconsistent: {}",
                    record.id,
                    rollback_err
                );
            }
            return Err(match e {
                StoreError::NotFound => AdmissionError::InvalidToken,
                StoreError::AlreadyUsed => AdmissionError::TokenAlreadyUsed,
                other => store_unavailable(other),
            });
        }

        log::info!(
            "Booking {} committed for slot {} (token {})",
            record.id,
            record.slot_key(),
            token
        );
        Ok(record)
    }
}

fn store_unavailable(e: StoreError) -> AdmissionError {
    AdmissionError::StoreUnavailable(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SlotKey, TokenId};
    use crate::store::MemoryStore;

    fn request(token: &str, date: &str, start: &str) -> BookingRequest {
        BookingRequest {
            name: "A".to_string(),
            phone: Some("12345678".to_string()),
            service: "lash-fill".to_string(),
            addon: None,
            total_price: 500.0,
            date: date.to_string(),
            start_time: start.to_string(),
            end_time: Some("10:30".to_string()),
            token: TokenId::new(token),
        }
    }

    async fn service_with_tokens(tokens: &[&str]) -> AdmissionService {
        let store = Arc::new(MemoryStore::new());
        for t in tokens {
            store.register_token(&TokenId::new(*t)).await.unwrap();
        }
        AdmissionService::new(store, Catalog::empty())
    }

    #[tokio::test]
    async fn token_is_single_use() {
        let service = service_with_tokens(&["tok-1"]).await;

        service.admit(request("tok-1", "2024-05-01", "10:00")).await.unwrap();

        // Same token, different slot: still rejected.
        let err = service
            .admit(request("tok-1", "2024-05-02", "12:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::TokenAlreadyUsed));
    }

    #[tokio::test]
    async fn slot_is_single_occupancy() {
        let service = service_with_tokens(&["tok-1", "tok-2"]).await;

        service.admit(request("tok-1", "2024-05-01", "10:00")).await.unwrap();

        // Different valid token, same slot: rejected.
        let err = service
            .admit(request("tok-2", "2024-05-01", "10:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::SlotTaken));
        assert_eq!(service.store().list_bookings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unregistered_token_rejected() {
        let service = service_with_tokens(&[]).await;
        let err = service
            .admit(request("ghost", "2024-05-01", "10:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::InvalidToken));
        assert!(service.store().list_bookings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reregistration_allows_a_new_booking() {
        let service = service_with_tokens(&["tok-1"]).await;
        service.admit(request("tok-1", "2024-05-01", "10:00")).await.unwrap();

        service
            .store()
            .register_token(&TokenId::new("tok-1"))
            .await
            .unwrap();

        service.admit(request("tok-1", "2024-05-02", "10:00")).await.unwrap();
        assert_eq!(service.store().list_bookings().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn malformed_request_leaves_state_untouched() {
        let service = service_with_tokens(&["tok-1"]).await;
        let mut req = request("tok-1", "2024-05-01", "10:00");
        req.name = "".to_string();

        let err = service.admit(req).await.unwrap_err();
        assert!(matches!(err, AdmissionError::MalformedRequest(_)));

        let state = service
            .store()
            .token_state(&TokenId::new("tok-1"))
            .await
            .unwrap();
        assert_eq!(state, TokenState::Free);
    }

    #[tokio::test]
    async fn concurrent_race_on_same_slot_admits_exactly_one() {
        let service = Arc::new(service_with_tokens(&["tok-1", "tok-2"]).await);

        let a = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.admit(request("tok-1", "2024-05-01", "10:00")).await })
        };
        let b = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.admit(request("tok-2", "2024-05-01", "10:00")).await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser.unwrap_err(), AdmissionError::SlotTaken));
        assert_eq!(service.store().list_bookings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_race_on_same_token_admits_exactly_one() {
        let service = Arc::new(service_with_tokens(&["tok-1"]).await);

        let a = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.admit(request("tok-1", "2024-05-01", "10:00")).await })
        };
        let b = {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.admit(request("tok-1", "2024-05-02", "12:00")).await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(loser.unwrap_err(), AdmissionError::TokenAlreadyUsed));
    }

    #[tokio::test]
    async fn failed_token_consumption_rolls_back_the_booking() {
        struct FlakyStore {
            inner: MemoryStore,
        }

        #[async_trait::async_trait]
        impl BookingStore for FlakyStore {
            async fn register_token(&self, token: &TokenId) -> Result<(), StoreError> {
                self.inner.register_token(token).await
            }
            async fn token_state(&self, token: &TokenId) -> Result<TokenState, StoreError> {
                self.inner.token_state(token).await
            }
            async fn mark_token_used(&self, _token: &TokenId) -> Result<(), StoreError> {
                Err(StoreError::Unavailable("disk full".to_string()))
            }
            async fn slot_exists(&self, key: &SlotKey) -> Result<bool, StoreError> {
                self.inner.slot_exists(key).await
            }
            async fn append_booking(&self, record: &BookingRecord) -> Result<String, StoreError> {
                self.inner.append_booking(record).await
            }
            async fn remove_booking(&self, id: &str) -> Result<(), StoreError> {
                self.inner.remove_booking(id).await
            }
            async fn list_bookings(&self) -> Result<Vec<BookingRecord>, StoreError> {
                self.inner.list_bookings().await
            }
        }

        let store = Arc::new(FlakyStore {
            inner: MemoryStore::new(),
        });
        store.register_token(&TokenId::new("tok-1")).await.unwrap();
        let service = AdmissionService::new(store, Catalog::empty());

        let err = service
            .admit(request("tok-1", "2024-05-01", "10:00"))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmissionError::StoreUnavailable(_)));

        // No committed slot may survive with a still-free token.
        assert!(service.store().list_bookings().await.unwrap().is_empty());
        assert_eq!(
            service
                .store()
                .token_state(&TokenId::new("tok-1"))
                .await
                .unwrap(),
            TokenState::Free
        );
    }

    #[tokio::test]
    async fn catalog_enriches_display_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offers.json");
        std::fs::write(
            &path,
            r#"[{"id":"lash-fill","name":"Lash Fill","price":500}]"#,
        )
        .unwrap();

        let store = Arc::new(MemoryStore::new());
        store.register_token(&TokenId::new("tok-1")).await.unwrap();
        let service = AdmissionService::new(store, Catalog::load(&path));

        let record = service
            .admit(request("tok-1", "2024-05-01", "10:00"))
            .await
            .unwrap();
        assert_eq!(record.service_name.as_deref(), Some("Lash Fill"));
        assert_eq!(record.addon_name, None);
    }
}
