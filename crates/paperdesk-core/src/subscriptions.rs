//! Per-user category subscriptions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::store::{StoreError, SubscriptionBackend};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub owner_id: String,
    /// arXiv subject class, e.g. `cs.LG`.
    pub category: String,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum SubscriptionError {
    #[error("invalid category {0:?}")]
    InvalidCategory(String),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Clone)]
pub struct SubscriptionStore {
    backend: Arc<dyn SubscriptionBackend>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionStore {
    pub fn new(backend: Arc<dyn SubscriptionBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Oldest first.
    pub async fn list(&self, owner: &str) -> Result<Vec<Subscription>, SubscriptionError> {
        Ok(self.backend.list_subscriptions(owner).await?)
    }

    /// Create a subscription with a fresh id. Blank keywords are dropped.
    pub async fn add(
        &self,
        owner: &str,
        category: &str,
        keywords: Vec<String>,
    ) -> Result<Subscription, SubscriptionError> {
        let category = category.trim();
        if category.is_empty() || category.chars().any(char::is_whitespace) {
            return Err(SubscriptionError::InvalidCategory(category.to_string()));
        }

        let subscription = Subscription {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.to_string(),
            category: category.to_string(),
            keywords: keywords
                .into_iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
            created_at: self.clock.now(),
        };
        self.backend.insert_subscription(&subscription).await?;
        tracing::debug!(owner, id = %subscription.id, category, "subscription added");
        Ok(subscription)
    }

    /// Remove by id. Unknown ids are not an error.
    pub async fn remove(&self, owner: &str, id: &str) -> Result<(), SubscriptionError> {
        self.backend.delete_subscription(owner, id).await?;
        Ok(())
    }
}
