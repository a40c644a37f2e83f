use std::io::Write;

use owo_colors::OwoColorize;
use paperdesk_core::{CollectionItem, CollectionKind, Record, RecordPage};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

const MAX_AUTHORS: usize = 3;

fn author_line(authors: &[String]) -> String {
    if authors.len() > MAX_AUTHORS {
        format!("{} et al.", authors[..MAX_AUTHORS].join(", "))
    } else {
        authors.join(", ")
    }
}

/// Print one page of search results, numbered from `start + 1`.
pub fn print_page(
    w: &mut dyn Write,
    page: &RecordPage,
    start: u32,
    page_size: u32,
    color: ColorMode,
) -> std::io::Result<()> {
    if page.items.is_empty() {
        writeln!(w, "No results.")?;
        return Ok(());
    }

    for (i, record) in page.items.iter().enumerate() {
        let n = u64::from(start) + i as u64 + 1;
        let date = record.published_date().unwrap_or("");
        if color.enabled() {
            writeln!(w, "{:>3}. {} {}", n, record.title.bold(), record.id.cyan())?;
            writeln!(w, "     {} {}", author_line(&record.authors), date.dimmed())?;
        } else {
            writeln!(w, "{:>3}. {} [{}]", n, record.title, record.id)?;
            writeln!(w, "     {} {}", author_line(&record.authors), date)?;
        }
    }

    let page_count = page.page_count(page_size);
    let current = if page_size == 0 { 0 } else { start / page_size + 1 };
    writeln!(w)?;
    let summary = format!(
        "{} results, page {} of {}",
        page.total_results, current, page_count
    );
    if color.enabled() {
        writeln!(w, "{}", summary.dimmed())?;
    } else {
        writeln!(w, "{}", summary)?;
    }
    Ok(())
}

/// Print a single record in full.
pub fn print_record(w: &mut dyn Write, record: &Record, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", record.title.bold())?;
    } else {
        writeln!(w, "{}", record.title)?;
    }
    writeln!(w, "{}", record.authors.join(", "))?;
    writeln!(w)?;

    writeln!(w, "id:        {}", record.id)?;
    if let Some(date) = record.published_date() {
        writeln!(w, "published: {}", date)?;
    }
    if let Some(category) = &record.primary_category {
        writeln!(w, "category:  {}", category)?;
    }
    if let Some(url) = record.abstract_url() {
        writeln!(w, "abstract:  {}", url)?;
    }
    if let Some(url) = record.pdf_url() {
        writeln!(w, "pdf:       {}", url)?;
    }

    if !record.summary.is_empty() {
        writeln!(w)?;
        writeln!(w, "{}", record.summary)?;
    }
    Ok(())
}

/// Print a favorites or history listing.
pub fn print_items(
    w: &mut dyn Write,
    kind: CollectionKind,
    items: &[CollectionItem],
    color: ColorMode,
) -> std::io::Result<()> {
    if items.is_empty() {
        writeln!(w, "No {} yet.", kind)?;
        return Ok(());
    }

    for item in items {
        let when = item.added_at.format("%Y-%m-%d %H:%M");
        if color.enabled() {
            writeln!(
                w,
                "{} {} {}",
                when.dimmed(),
                item.item_id.cyan(),
                item.title.bold()
            )?;
        } else {
            writeln!(w, "{} {} {}", when, item.item_id, item.title)?;
        }
        if !item.authors.is_empty() {
            writeln!(w, "                 {}", author_line(&item.authors))?;
        }
    }
    Ok(())
}

/// Print a one-line status message.
pub fn print_status(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", message.green())
    } else {
        writeln!(w, "{}", message)
    }
}
