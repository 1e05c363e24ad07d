// src/services/extractor.rs

//! Article record extraction.
//!
//! Turns a listing page snapshot into [`ArticleRecord`]s using the configured
//! CSS selectors. Pure transform: no I/O happens here.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{ArticleRecord, ListingSelectors};
use crate::utils::normalize_whitespace;

/// Records extracted from one document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extraction {
    /// Non-pinned records in document order, at most the requested cap
    pub records: Vec<ArticleRecord>,
    /// Pinned entries that were skipped
    pub pinned: usize,
    /// Entries dropped for a missing title or href, or a repeated href
    pub skipped: usize,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

struct CompiledSelectors {
    row: Selector,
    pinned: Selector,
    title: Selector,
    author: Selector,
    category: Selector,
    posted_at: Selector,
    article_link: Selector,
    any_link: Selector,
}

/// Extracts article records from listing markup.
pub struct RecordExtractor {
    selectors: CompiledSelectors,
    attr_name: String,
    origin: String,
}

impl RecordExtractor {
    /// Compile the listing selectors. Fails on an invalid selector.
    pub fn new(selectors: &ListingSelectors, origin: &str) -> Result<Self> {
        let compiled = CompiledSelectors {
            row: Self::parse_selector(&selectors.row_selector)?,
            pinned: Self::parse_selector(&selectors.pinned_selector)?,
            title: Self::parse_selector(&selectors.title_selector)?,
            author: Self::parse_selector(&selectors.author_selector)?,
            category: Self::parse_selector(&selectors.category_selector)?,
            posted_at: Self::parse_selector(&selectors.posted_at_selector)?,
            article_link: Self::parse_selector(&selectors.article_link_selector())?,
            any_link: Self::parse_selector("a")?,
        };

        Ok(Self {
            selectors: compiled,
            attr_name: selectors.attr_name.clone(),
            origin: origin.to_string(),
        })
    }

    /// Extract up to `cap` non-pinned records in document order.
    ///
    /// Pinned entries and entries without a title or href do not count toward `cap`.
    pub fn extract(&self, markup: &str, cap: usize) -> Result<Extraction> {
        if markup.trim().is_empty() {
            return Err(AppError::parse("document is empty"));
        }
        let document = Html::parse_document(markup);

        let mut extraction = Extraction::default();
        let mut seen = HashSet::new();

        for row in document.select(&self.selectors.row) {
            if extraction.records.len() >= cap {
                break;
            }

            if row.select(&self.selectors.pinned).next().is_some() {
                log::debug!(
                    "Skipping pinned entry: '{}'",
                    Self::text_of(row, &self.selectors.title)
                );
                extraction.pinned += 1;
                continue;
            }

            match self.parse_row(row) {
                Some(record) if seen.insert(record.href.clone()) => {
                    extraction.records.push(record);
                }
                Some(record) => {
                    log::debug!("Skipping repeated entry: {}", record.href);
                    extraction.skipped += 1;
                }
                None => extraction.skipped += 1,
            }
        }

        Ok(extraction)
    }

    fn parse_row(&self, row: ElementRef<'_>) -> Option<ArticleRecord> {
        let mut title = Self::text_of(row, &self.selectors.title);
        if title.is_empty() {
            title = self.first_link_text(row);
        }
        if title.is_empty() {
            log::debug!("Skipping entry without a title");
            return None;
        }

        let href = self.href_of(row);
        if href.is_empty() {
            log::warn!("Entry '{}' has no link, skipping", title);
            return None;
        }

        let mut record = ArticleRecord::new(title, href, &self.origin);
        record.author = Self::text_of(row, &self.selectors.author);
        record.category = Self::text_of(row, &self.selectors.category);
        record.posted_at = Self::text_of(row, &self.selectors.posted_at);
        Some(record)
    }

    /// The row's own link if it is an anchor, else the first article link inside it.
    fn href_of(&self, row: ElementRef<'_>) -> String {
        let own = (row.value().name() == "a")
            .then(|| row.value().attr(&self.attr_name))
            .flatten();

        own.or_else(|| {
            row.select(&self.selectors.article_link)
                .find_map(|a| a.value().attr(&self.attr_name))
        })
        .map(str::trim)
        .unwrap_or("")
        .to_string()
    }

    /// Text of the first link inside the row. An anchor row's own text is
    /// never used, since it spans the author and date fields too.
    fn first_link_text(&self, row: ElementRef<'_>) -> String {
        row.select(&self.selectors.any_link)
            .next()
            .map(Self::joined_text)
            .unwrap_or_default()
    }

    fn text_of(row: ElementRef<'_>, selector: &Selector) -> String {
        row.select(selector)
            .next()
            .map(Self::joined_text)
            .unwrap_or_default()
    }

    fn joined_text(el: ElementRef<'_>) -> String {
        normalize_whitespace(&el.text().collect::<Vec<_>>().join(" "))
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}
