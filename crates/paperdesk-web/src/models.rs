use paperdesk_core::{CollectionItem, Record, RecordPage, SearchCriteria, Subscription};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// `GET /search` query string. `search` carries a raw catalog query and,
/// when present, takes precedence over the structured fields.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub search: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub start: Option<u32>,
    pub max_results: Option<u32>,
}

impl SearchParams {
    pub fn criteria(&self) -> SearchCriteria {
        SearchCriteria {
            title: self.title.clone(),
            author: self.author.clone(),
            category: self.category.clone(),
            date_from: self.date_from.clone(),
            date_to: self.date_to.clone(),
        }
    }

    pub fn raw_query(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<Record>,
    pub total_results: u64,
    pub start: u32,
    pub max_results: u32,
    pub page_count: u64,
}

impl SearchResponse {
    pub fn new(page: RecordPage, start: u32, max_results: u32) -> Self {
        Self {
            page_count: page.page_count(max_results),
            total_results: page.total_results,
            items: page.items,
            start,
            max_results,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub limit: Option<usize>,
}

/// One entry of a favorites or history listing.
#[derive(Debug, Serialize)]
pub struct ItemJson {
    pub id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub added_at: String,
}

impl From<CollectionItem> for ItemJson {
    fn from(item: CollectionItem) -> Self {
        Self {
            id: item.item_id,
            title: item.title,
            authors: item.authors,
            added_at: item.added_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpsertResponse {
    pub success: bool,
    /// False when an existing item was refreshed.
    pub created: bool,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct NewSubscription {
    pub category: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionJson {
    pub id: String,
    pub category: String,
    pub keywords: Vec<String>,
    pub created_at: String,
}

impl From<Subscription> for SubscriptionJson {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id,
            category: sub.category,
            keywords: sub.keywords,
            created_at: sub.created_at.to_rfc3339(),
        }
    }
}
