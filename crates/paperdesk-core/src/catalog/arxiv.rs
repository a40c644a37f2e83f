//! arXiv export API client.

use std::time::Duration;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::{CatalogClient, CatalogError, CatalogFuture};
use crate::record::{Link, Record, RecordPage};

pub const DEFAULT_BASE_URL: &str = "http://export.arxiv.org/api/query";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const ABS_PREFIXES: [&str; 2] = ["http://arxiv.org/abs/", "https://arxiv.org/abs/"];
const ERROR_ID_MARKER: &str = "/api/errors";

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ArxivClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Per-request timeout. Bounds how long a slow upstream can block a caller.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn search_url(&self, query: &str, offset: u32, page_size: u32) -> String {
        format!(
            "{}?search_query={}&start={}&max_results={}&sortBy=submittedDate&sortOrder=descending",
            self.base_url,
            urlencoding::encode(query),
            offset,
            page_size
        )
    }

    pub fn id_url(&self, id: &str) -> String {
        format!("{}?id_list={}", self.base_url, urlencoding::encode(id))
    }

    async fn get_feed(&self, url: &str) -> Result<RecordPage, CatalogError> {
        tracing::debug!(url, "arXiv request");
        let resp = self.client.get(url).timeout(self.timeout).send().await?;

        if !resp.status().is_success() {
            return Err(CatalogError::Status(resp.status().as_u16()));
        }

        let body = resp.text().await?;
        parse_feed(&body)
    }
}

impl CatalogClient for ArxivClient {
    fn name(&self) -> &str {
        "arXiv"
    }

    fn query<'a>(
        &'a self,
        query: &'a str,
        offset: u32,
        page_size: u32,
    ) -> CatalogFuture<'a, RecordPage> {
        Box::pin(async move {
            let url = self.search_url(query, offset, page_size);
            self.get_feed(&url).await
        })
    }

    fn fetch_by_id<'a>(&'a self, id: &'a str) -> CatalogFuture<'a, Option<Record>> {
        Box::pin(async move {
            let url = self.id_url(id);
            let page = self.get_feed(&url).await?;
            Ok(page.items.into_iter().next())
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    None,
    Id,
    Title,
    Summary,
    Published,
    Updated,
    AuthorName,
    TotalResults,
    StartIndex,
    ItemsPerPage,
}

/// Parse an arXiv Atom feed into a [`RecordPage`].
///
/// Entries without an id are dropped. An error entry (arXiv reports bad
/// queries as a feed with a single entry under `/api/errors`) becomes
/// [`CatalogError::Api`].
pub fn parse_feed(xml: &str) -> Result<RecordPage, CatalogError> {
    let mut reader = Reader::from_str(xml);

    let mut page = RecordPage::default();
    let mut entry: Option<Record> = None;
    let mut in_author = false;
    let mut field = Field::None;
    let mut text = String::new();

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                match (local.as_ref(), entry.is_some()) {
                    (b"entry", false) => {
                        entry = Some(Record::default());
                    }
                    (b"id", true) => field = Field::Id,
                    (b"title", true) => field = Field::Title,
                    (b"summary", true) => field = Field::Summary,
                    (b"published", true) => field = Field::Published,
                    (b"updated", true) => field = Field::Updated,
                    (b"author", true) => in_author = true,
                    (b"name", true) if in_author => field = Field::AuthorName,
                    (b"totalResults", false) => field = Field::TotalResults,
                    (b"startIndex", false) => field = Field::StartIndex,
                    (b"itemsPerPage", false) => field = Field::ItemsPerPage,
                    _ => {}
                }
                if let Some(record) = entry.as_mut() {
                    read_entry_attributes(e, record);
                }
                text.clear();
            }
            Ok(Event::Empty(ref e)) => {
                if let Some(record) = entry.as_mut() {
                    read_entry_attributes(e, record);
                }
            }
            Ok(Event::Text(ref e)) => {
                if field != Field::None {
                    let chunk = e
                        .unescape()
                        .map_err(|err| CatalogError::Parse(err.to_string()))?;
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(ref e)) => {
                if field != Field::None {
                    text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => {
                let local = e.local_name();
                if local.as_ref() == b"entry" {
                    if let Some(record) = entry.take() {
                        if record.id.contains(ERROR_ID_MARKER) {
                            return Err(CatalogError::Api(record.summary));
                        }
                        if !record.id.is_empty() {
                            page.items.push(record);
                        }
                    }
                } else if local.as_ref() == b"author" {
                    in_author = false;
                } else if field != Field::None {
                    store_field(field, &text, &mut page, entry.as_mut())?;
                    field = Field::None;
                    text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(CatalogError::Parse(format!("XML parse error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    Ok(page)
}

fn store_field(
    field: Field,
    text: &str,
    page: &mut RecordPage,
    entry: Option<&mut Record>,
) -> Result<(), CatalogError> {
    let value = text.trim();
    match (field, entry) {
        (Field::TotalResults, _) => page.total_results = parse_count(value)?,
        (Field::StartIndex, _) => page.start_index = parse_count(value)?,
        (Field::ItemsPerPage, _) => page.items_per_page = parse_count(value)?,
        (Field::Id, Some(record)) => record.id = bare_id(value).to_string(),
        (Field::Title, Some(record)) => record.title = collapse_whitespace(value),
        (Field::Summary, Some(record)) => record.summary = collapse_whitespace(value),
        (Field::Published, Some(record)) => record.published = Some(value.to_string()),
        (Field::Updated, Some(record)) => record.updated = Some(value.to_string()),
        (Field::AuthorName, Some(record)) if !value.is_empty() => {
            record.authors.push(value.to_string())
        }
        _ => {}
    }
    Ok(())
}

/// Pick up attribute-only elements inside an entry: links and categories.
fn read_entry_attributes(e: &BytesStart, record: &mut Record) {
    match e.local_name().as_ref() {
        b"link" => {
            if let Some(href) = attr(e, b"href") {
                record.links.push(Link {
                    rel: attr(e, b"rel").unwrap_or_else(|| "alternate".to_string()),
                    href,
                    title: attr(e, b"title"),
                    content_type: attr(e, b"type"),
                });
            }
        }
        b"category" => {
            if let Some(term) = attr(e, b"term")
                && !record.categories.contains(&term)
            {
                record.categories.push(term);
            }
        }
        b"primary_category" => {
            record.primary_category = attr(e, b"term");
        }
        _ => {}
    }
}

fn attr(e: &BytesStart, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).to_string())
}

fn parse_count(value: &str) -> Result<u64, CatalogError> {
    if value.is_empty() {
        return Ok(0);
    }
    value
        .parse()
        .map_err(|_| CatalogError::Parse(format!("invalid count {value:?}")))
}

fn bare_id(id: &str) -> &str {
    ABS_PREFIXES
        .iter()
        .find_map(|prefix| id.strip_prefix(prefix))
        .unwrap_or(id)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
