use std::sync::Arc;

use crate::admission::AdmissionService;
use crate::catalog::Catalog;
use crate::store::BookingStore;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    admission: Arc<AdmissionService>,
}

impl AppState {
    pub fn new(store: Arc<dyn BookingStore>, catalog: Catalog) -> Self {
        AppState {
            admission: Arc::new(AdmissionService::new(store, catalog)),
        }
    }

    pub fn admission(&self) -> &AdmissionService {
        &self.admission
    }

    pub fn store(&self) -> &Arc<dyn BookingStore> {
        self.admission.store()
    }

    pub fn catalog(&self) -> &Catalog {
        self.admission.catalog()
    }
}
