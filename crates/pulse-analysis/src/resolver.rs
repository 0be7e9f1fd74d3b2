//! Tenant-checked scope resolution.

use pulse_core::{AnalysisScope, Document};

use crate::error::AnalysisError;
use crate::store::AnalysisStore;

pub struct ScopeResolver<'a> {
    store: &'a dyn AnalysisStore,
}

impl<'a> ScopeResolver<'a> {
    #[must_use]
    pub fn new(store: &'a dyn AnalysisStore) -> Self {
        Self { store }
    }

    /// Check every source in the scope, in order. The first inaccessible id
    /// fails the whole resolution.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::AccessDenied`] for the first inaccessible
    /// source, or [`AnalysisError::Persistence`] on a store failure.
    pub async fn validate_access(
        &self,
        tenant_id: i64,
        scope: &AnalysisScope,
    ) -> Result<(), AnalysisError> {
        for &source_id in scope.source_ids() {
            if !self.store.is_source_accessible(tenant_id, source_id).await? {
                return Err(AnalysisError::AccessDenied { source_id });
            }
        }
        Ok(())
    }

    /// Access check plus count, without loading documents.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_access`].
    pub async fn count_in_scope(
        &self,
        tenant_id: i64,
        scope: &AnalysisScope,
    ) -> Result<i64, AnalysisError> {
        self.validate_access(tenant_id, scope).await?;
        Ok(self.store.count_documents(scope).await?)
    }

    /// Access check plus full fetch, ordered by `published_at`. The store
    /// applies the same predicate as [`Self::count_in_scope`]; nothing is
    /// filtered again here.
    ///
    /// # Errors
    ///
    /// See [`Self::validate_access`].
    pub async fn fetch_in_scope(
        &self,
        tenant_id: i64,
        scope: &AnalysisScope,
    ) -> Result<Vec<Document>, AnalysisError> {
        self.validate_access(tenant_id, scope).await?;
        Ok(self.store.fetch_documents(scope).await?)
    }
}
