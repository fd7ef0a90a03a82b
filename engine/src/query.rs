use crate::app::{Application, QueryRequest, QueryResponse};
use crate::errors::{EngineError, EngineResult};
use echomint_store::MultiStore;
use echomint_types::Height;
use std::sync::Arc;

/// A cloneable handle for concurrent read-only queries against the embedded
/// application. Any number of these may run while injection is in progress:
/// the requested height is resolved through the multi-store bound before the
/// application sees it, so an in-progress, unflushed height is never
/// observable.
#[derive(Clone)]
pub struct QueryClient {
    app: Arc<dyn Application>,
    store: Arc<MultiStore>,
}

impl QueryClient {
    pub(crate) fn new(app: Arc<dyn Application>, store: Arc<MultiStore>) -> Self {
        Self { app, store }
    }

    pub fn query(&self, path: impl Into<String>, data: Vec<u8>, height: Option<Height>) -> EngineResult<QueryResponse> {
        let bound = self.store.query_bound(height);
        self.app
            .query(QueryRequest { path: path.into(), data, height: bound })
            .map_err(EngineError::app("query", bound))
    }

    pub fn committed_height(&self) -> Option<Height> {
        self.store.committed_height()
    }

    pub fn multi_store(&self) -> &Arc<MultiStore> {
        &self.store
    }
}
