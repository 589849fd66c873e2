//! Core data structures for the wiki.
//!
//! These structs are the shared language between the storage engine (SQL),
//! the service façade, and the output layer (serde_json). Plain data, no
//! persistence logic; row mapping lives in `store`.

use serde::Serialize;

/// A named wiki article. `title` is always the normalized key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Page {
    pub id: i64,
    pub title: String,
    pub note: Option<String>,
}

/// One immutable snapshot of a page's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Revision {
    pub id: i64,
    pub page_id: i64,
    pub content: String,
    /// Unix epoch seconds.
    pub timestamp: i64,
}

/// A page as listed on the home page.
#[derive(Debug, Clone, Serialize)]
pub struct PageSummary {
    pub page: Page,
    pub display_title: String,
    pub revision_count: i64,
}

/// Aggregate view of the whole store.
#[derive(Debug, Clone, Serialize)]
pub struct HomepageSummary {
    pub pages: Vec<PageSummary>,
    pub total_page_count: i64,
    pub total_revision_count: i64,
    /// Revisions not accounted for by any live page. Zero in a healthy store.
    pub abandoned_revision_count: i64,
}

/// Everything needed to render a single page.
#[derive(Debug, Clone, Serialize)]
pub struct PageDisplay {
    pub page: Page,
    pub latest_revision: Revision,
    pub display_title: String,
    pub revision_count: i64,
}

/// A page together with its full history, latest revision first.
#[derive(Debug, Clone, Serialize)]
pub struct PageHistory {
    pub page: Page,
    pub display_title: String,
    pub revisions: Vec<Revision>,
}

/// Result of a delete request, as reported to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeleteOutcome {
    Deleted {
        id: i64,
        title: String,
        revisions_removed: i64,
    },
    DoesNotExist {
        id: i64,
    },
}

impl DeleteOutcome {
    /// Human-readable message for the boundary layer.
    pub fn message(&self) -> String {
        match self {
            Self::Deleted {
                id,
                title,
                revisions_removed,
            } => format!(
                "Deleted page {} '{}' and {} revision(s)",
                id, title, revisions_removed
            ),
            Self::DoesNotExist { id } => format!("Page {} does not exist", id),
        }
    }
}

impl std::fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}
