//! Structured search filters and their translation into arXiv's query grammar.
//!
//! Translation is total and deterministic: the same criteria always produce
//! the same query string, which is what makes the search cache key stable.
//! Dates are expected as `YYYY-MM-DD`; malformed dates are passed through
//! unchanged. Callers that want them rejected use [`SearchCriteria::validate`].

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query that matches every record in the catalog.
pub const MATCH_ALL: &str = "all";

const AND: &str = " AND ";
const WORD_JOIN: &str = "_";
const START_OF_DAY: &str = "0000";
const END_OF_DAY: &str = "2359";

/// Filters a user can apply to a search. Every field is optional; blank
/// fields are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub date_from: Option<String>,
    #[serde(default)]
    pub date_to: Option<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TranslationError {
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("date range is inverted: {from} is after {to}")]
    InvertedRange { from: String, to: String },
}

impl SearchCriteria {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn date_from(mut self, date: impl Into<String>) -> Self {
        self.date_from = Some(date.into());
        self
    }

    pub fn date_to(mut self, date: impl Into<String>) -> Self {
        self.date_to = Some(date.into());
        self
    }

    /// True when no field would produce a clause.
    pub fn is_empty(&self) -> bool {
        [
            &self.title,
            &self.author,
            &self.category,
            &self.date_from,
            &self.date_to,
        ]
        .iter()
        .all(|f| present(f).is_none())
    }

    /// Strict check for the date fields. [`translate`] never calls this.
    pub fn validate(&self) -> Result<(), TranslationError> {
        let from = present(&self.date_from).map(parse_date).transpose()?;
        let to = present(&self.date_to).map(parse_date).transpose()?;
        if let (Some(from), Some(to)) = (from, to)
            && from > to
        {
            return Err(TranslationError::InvertedRange {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}

/// Translate `criteria` using today's local date for open-ended ranges.
pub fn translate(criteria: &SearchCriteria) -> String {
    translate_on(criteria, Local::now().date_naive())
}

/// Translate `criteria`, closing a `date_from`-only range at the end of `today`.
pub fn translate_on(criteria: &SearchCriteria, today: NaiveDate) -> String {
    let mut terms: Vec<String> = Vec::new();

    if let Some(title) = present(&criteria.title) {
        terms.push(format!("ti:{}", join_words(title)));
    }
    if let Some(author) = present(&criteria.author) {
        terms.push(format!("au:{}", join_words(author)));
    }
    if let Some(category) = present(&criteria.category) {
        terms.push(format!("cat:{category}"));
    }

    let from = present(&criteria.date_from);
    let to = present(&criteria.date_to);
    let range = match (from, to) {
        (Some(from), Some(to)) => Some((
            format!("{}{START_OF_DAY}", compact_date(from)),
            format!("{}{END_OF_DAY}", compact_date(to)),
        )),
        (Some(from), None) => Some((
            format!("{}{START_OF_DAY}", compact_date(from)),
            format!("{}{END_OF_DAY}", today.format("%Y%m%d")),
        )),
        (None, Some(to)) => Some(("*".to_string(), format!("{}{END_OF_DAY}", compact_date(to)))),
        (None, None) => None,
    };
    if let Some((lower, upper)) = range {
        terms.push(format!("submittedDate:[{lower} TO {upper}]"));
    }

    if terms.is_empty() {
        MATCH_ALL.to_string()
    } else {
        terms.join(AND)
    }
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn join_words(term: &str) -> String {
    term.split_whitespace().collect::<Vec<_>>().join(WORD_JOIN)
}

fn compact_date(date: &str) -> String {
    date.replace('-', "")
}

fn parse_date(date: &str) -> Result<NaiveDate, TranslationError> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| TranslationError::InvalidDate(date.to_string()))
}
