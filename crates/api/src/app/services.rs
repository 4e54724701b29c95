use std::sync::Arc;

use kitroom_infra::{AppConfig, CatalogService, CheckoutViews, CheckoutWorkflow, Clock, Storage};

/// Service graph shared by all handlers of one router.
///
/// Every service holds the same storage engine and clock.
pub struct AppServices<S: Storage> {
    storage: Arc<S>,
    workflow: CheckoutWorkflow<S>,
    views: CheckoutViews<S>,
    catalog: CatalogService<S>,
    history_limit: i64,
}

impl<S: Storage> AppServices<S> {
    pub fn new(storage: Arc<S>, clock: Arc<dyn Clock>, config: &AppConfig) -> Self {
        Self {
            workflow: CheckoutWorkflow::new(storage.clone(), clock.clone())
                .with_loan_days(config.default_loan_days),
            views: CheckoutViews::new(storage.clone(), clock.clone()),
            catalog: CatalogService::new(storage.clone(), clock)
                .with_locations(config.location_whitelist()),
            storage,
            history_limit: config.history_limit(),
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn workflow(&self) -> &CheckoutWorkflow<S> {
        &self.workflow
    }

    pub fn views(&self) -> &CheckoutViews<S> {
        &self.views
    }

    pub fn catalog(&self) -> &CatalogService<S> {
        &self.catalog
    }

    /// History page size used when a request names none.
    pub fn history_limit(&self, requested: Option<i64>) -> Option<i64> {
        Some(requested.unwrap_or(self.history_limit))
    }
}
