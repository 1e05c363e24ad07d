// src/models/selectors.rs

//! CSS selectors for scraping the article listing.

use serde::{Deserialize, Serialize};

/// CSS selectors for scraping the article listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListingSelectors {
    /// Selector for each entry in the listing
    #[serde(default = "default_row")]
    pub row_selector: String,

    /// Selector that marks an entry as pinned/official when it matches inside the row
    #[serde(default = "default_pinned")]
    pub pinned_selector: String,

    /// Selector for the dedicated title element within a row
    #[serde(default = "default_title")]
    pub title_selector: String,

    /// Selector for the author element within a row
    #[serde(default = "default_author")]
    pub author_selector: String,

    /// Selector for the category element within a row
    #[serde(default = "default_category")]
    pub category_selector: String,

    /// Selector for the posted time element within a row
    #[serde(default = "default_posted_at")]
    pub posted_at_selector: String,

    /// Path prefix of article links (e.g. "/article/")
    #[serde(default = "default_article_path")]
    pub article_path_prefix: String,

    /// HTML attribute name for extracting links (usually "href")
    #[serde(default = "default_attr_name")]
    pub attr_name: String,
}

fn default_row() -> String {
    "a.articleItem, div.articleItem".to_string()
}

fn default_pinned() -> String {
    "div.articleItem__titles svg".to_string()
}

fn default_title() -> String {
    "div.articleItem__title".to_string()
}

fn default_author() -> String {
    ".articleItem__nickname, .articleItem__author".to_string()
}

fn default_category() -> String {
    ".articleItem__category, .articleItem__tag".to_string()
}

fn default_posted_at() -> String {
    ".articleItem__datetime .articleItem__number".to_string()
}

fn default_article_path() -> String {
    "/article/".to_string()
}

fn default_attr_name() -> String {
    "href".to_string()
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            row_selector: default_row(),
            pinned_selector: default_pinned(),
            title_selector: default_title(),
            author_selector: default_author(),
            category_selector: default_category(),
            posted_at_selector: default_posted_at(),
            article_path_prefix: default_article_path(),
            attr_name: default_attr_name(),
        }
    }
}

impl ListingSelectors {
    /// Selector for descendant links pointing at an article.
    pub fn article_link_selector(&self) -> String {
        format!("a[{}*=\"{}\"]", self.attr_name, self.article_path_prefix)
    }
}
