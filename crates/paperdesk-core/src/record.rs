//! Typed catalog records.
//!
//! Upstream Atom entries are normalized into these shapes at the catalog
//! boundary so nothing downstream handles raw feed data.

use serde::{Deserialize, Serialize};

/// A link attached to a record (abstract page, PDF, DOI, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A single catalog record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Bare catalog identifier, e.g. `2101.00001v2` or `hep-th/9901001v1`.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_category: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Record {
    /// The `YYYY-MM-DD` part of the publication timestamp.
    pub fn published_date(&self) -> Option<&str> {
        self.published.as_deref().map(|p| p.get(..10).unwrap_or(p))
    }

    /// First link with the given relation (and title, when provided).
    pub fn link(&self, rel: &str, title: Option<&str>) -> Option<&Link> {
        self.links
            .iter()
            .find(|l| l.rel == rel && (title.is_none() || l.title.as_deref() == title))
    }

    pub fn pdf_url(&self) -> Option<&str> {
        self.link("related", Some("pdf")).map(|l| l.href.as_str())
    }

    pub fn abstract_url(&self) -> Option<&str> {
        self.link("alternate", None).map(|l| l.href.as_str())
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPage {
    pub items: Vec<Record>,
    /// Total number of matches reported by the catalog.
    pub total_results: u64,
    pub start_index: u64,
    pub items_per_page: u64,
}

impl RecordPage {
    /// Number of pages of `page_size` needed to cover every match.
    pub fn page_count(&self, page_size: u32) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.total_results.div_ceil(u64::from(page_size))
    }
}
