//! Reports listing page parsing.
//!
//! The DMC site lists reports in a table, newest first: one row per report
//! with a title cell, date and time cells, and a download link. Rows are not
//! guaranteed to be sorted, so the latest entry is chosen by parsed date.

use crate::dates;
use crate::policy::ReportPolicy;
use chrono::NaiveDateTime;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::LazyLock;

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").unwrap());

const DOCUMENT_EXTENSIONS: [&str; 3] = [".pdf", ".html", ".htm"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingEntry {
    pub title: String,
    /// Absolute document URL
    pub href: String,
    pub published: Option<NaiveDateTime>,
    /// Index among qualifying links, in page order
    pub position: usize,
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: &ElementRef) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn is_document_link(href: &str) -> bool {
    let path = href.split(['?', '#']).next().unwrap_or(href).to_lowercase();
    DOCUMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Resolve a listing href against the site base URL
pub fn resolve_url(base_url: &str, href: &str) -> String {
    let href = href.trim().replace(' ', "%20");
    if href.starts_with("http://") || href.starts_with("https://") {
        href
    } else if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}

/// Title and publication time from the table row holding the link
fn row_metadata(row: &ElementRef) -> (Option<String>, Option<NaiveDateTime>) {
    let cells: Vec<String> = row
        .select(&CELL_SELECTOR)
        .map(|cell| element_text(&cell))
        .filter(|text| !text.is_empty())
        .collect();

    // Leading serial-number cell is skipped
    let title = cells
        .iter()
        .find(|cell| {
            !cell.chars().all(|c| c.is_ascii_digit() || c == '.')
                && dates::find_date(cell).is_none()
                && !cell.eq_ignore_ascii_case("download")
        })
        .cloned();

    let published = dates::find_datetime(&cells.join(" "));
    (title, published)
}

/// All links on the listing page that qualify for `policy`, in page order
pub fn parse_listing(html: &str, base_url: &str, policy: &ReportPolicy) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for link in document.select(&LINK_SELECTOR) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        let text = element_text(&link);
        if !is_document_link(href) || !policy.matches_listing_link(&text, href) {
            continue;
        }

        let url = resolve_url(base_url, href);
        if !seen.insert(url.clone()) {
            continue;
        }

        let row = link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "tr");
        let (row_title, row_published) = match row {
            Some(row) => row_metadata(&row),
            None => (None, None),
        };

        let published = row_published
            .or_else(|| dates::find_datetime(&text))
            .or_else(|| dates::datetime_from_filename(href));

        let title = row_title
            .or_else(|| (!text.is_empty()).then(|| text.clone()))
            .unwrap_or_else(|| {
                href.rsplit('/')
                    .next()
                    .unwrap_or(href)
                    .to_string()
            });

        entries.push(ListingEntry {
            title,
            href: url,
            published,
            position: entries.len(),
        });
    }

    entries
}

/// The most recent entry by parsed date; ties and undated rows keep listing order
pub fn latest_entry(entries: &[ListingEntry]) -> Option<&ListingEntry> {
    let mut best: Option<&ListingEntry> = None;
    for entry in entries {
        best = match best {
            None => Some(entry),
            Some(current) if entry.published > current.published => Some(entry),
            keep => keep,
        };
    }
    best
}
