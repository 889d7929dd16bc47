use std::sync::Arc;

use crate::application::repos::Database;
use crate::cache::Cache;

/// Shared by every handler; each request opens its own store session.
pub struct AppState<D> {
    pub db: Arc<D>,
    pub cache: Arc<dyn Cache>,
}

impl<D: Database> AppState<D> {
    pub fn new(db: Arc<D>, cache: Arc<dyn Cache>) -> Self {
        Self { db, cache }
    }
}

// Derived `Clone` would demand `D: Clone`.
impl<D> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            cache: Arc::clone(&self.cache),
        }
    }
}
