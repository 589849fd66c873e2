//! Page/revision service: the only entry point the CLI talks to.
//!
//! `Wiki` owns the connection and composes `store` primitives into the
//! operations a front end needs. Every operation runs inside its own
//! transaction; writes use `BEGIN IMMEDIATE` so SQLite serializes them. A
//! `Transaction` that is dropped without `commit` rolls back, so an early
//! return through `?` leaves the store exactly as it was.

use crate::db::{self, WikiError};
use crate::models::{DeleteOutcome, HomepageSummary, Page, PageDisplay, PageHistory, PageSummary, Revision};
use crate::store;
use crate::title;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;

const SAMPLE_PAGES: [(&str, &str); 3] = [
    (
        "Wiki",
        "A wiki is a website on which users collaboratively modify content and structure directly from a web browser.",
    ),
    (
        "Website",
        "A website is a collection of related web pages, typically identified with a common domain name.",
    ),
    (
        "Stock Market",
        "A stock market is the aggregation of buyers and sellers of stocks, which represent ownership claims on businesses.",
    ),
];

/// Current time as Unix epoch seconds.
fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Blank notes become `None`; any other note is kept exactly as given.
fn clean_note(note: Option<&str>) -> Option<&str> {
    note.filter(|n| !n.trim().is_empty())
}

fn require_content(content: &str) -> Result<(), WikiError> {
    if content.trim().is_empty() {
        return Err(WikiError::Validation("Content must not be empty".to_string()));
    }
    Ok(())
}

/// Finds a page by id when `title_or_id` is numeric, falling back to a title
/// lookup so that pages with numeric titles stay reachable.
fn resolve_page(conn: &Connection, title_or_id: &str) -> Result<Page, WikiError> {
    let needle = title_or_id.trim();

    if let Ok(id) = needle.parse::<i64>() {
        if let Some(page) = store::get_page_by_id(conn, id)? {
            return Ok(page);
        }
    }

    let key = title::normalize(needle);
    if !key.is_empty() {
        if let Some(page) = store::get_page_by_title(conn, &key)? {
            return Ok(page);
        }
    }

    Err(WikiError::NotFound(format!("No page matches '{}'", needle)))
}

/// A wiki backed by one SQLite connection.
pub struct Wiki {
    conn: Connection,
}

impl Wiki {
    /// Opens (creating if needed) the database at `path` and brings its
    /// schema up to date.
    pub fn open(path: &Path) -> Result<Self, WikiError> {
        let conn = db::open_connection_at(path)?;
        Self::from_connection(conn)
    }

    /// A throwaway wiki in memory.
    pub fn open_in_memory() -> Result<Self, WikiError> {
        Self::from_connection(db::open_in_memory()?)
    }

    /// Wraps an already-configured connection, running migrations once.
    pub fn from_connection(mut conn: Connection) -> Result<Self, WikiError> {
        db::run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Closes the underlying connection, reporting any error SQLite raises.
    pub fn close(self) -> Result<(), WikiError> {
        self.conn.close().map_err(|(_, e)| WikiError::Db(e))
    }

    fn write_tx(&self) -> Result<Transaction<'_>, WikiError> {
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?)
    }

    fn read_tx(&self) -> Result<Transaction<'_>, WikiError> {
        Ok(Transaction::new_unchecked(&self.conn, TransactionBehavior::Deferred)?)
    }

    /// Creates a page together with its first revision.
    ///
    /// Both rows are written in one transaction: either the page exists with
    /// exactly one revision afterwards, or nothing changed.
    ///
    /// # Errors
    /// - `WikiError::Validation` if the title or content is blank.
    /// - `WikiError::DuplicateTitle` if the normalized title is taken.
    /// - `WikiError::Conflict` if the new page already carries revisions.
    pub fn create_new_page(
        &self,
        title: &str,
        note: Option<&str>,
        first_content: &str,
    ) -> Result<Page, WikiError> {
        if title::normalize(title).is_empty() {
            return Err(WikiError::Validation("Title must not be empty".to_string()));
        }
        require_content(first_content)?;

        let tx = self.write_tx()?;
        let page = store::create_page(&tx, title, clean_note(note))?;

        let existing = store::count_revisions(&tx, page.id)?;
        if existing != 0 {
            return Err(WikiError::Conflict(format!(
                "new page '{}' already has {} revision(s)",
                page.title, existing
            )));
        }

        store::add_revision(&tx, page.id, first_content, now())?;
        tx.commit()?;

        log::info!("created page {} '{}'", page.id, page.title);
        Ok(page)
    }

    /// Updates a page's title and note in place and appends a revision.
    ///
    /// # Errors
    /// - `WikiError::NotFound` if the page doesn't exist.
    /// - `WikiError::Validation` if the content or title is blank.
    /// - `WikiError::DuplicateTitle` if the new title belongs to another page.
    pub fn edit_page(
        &self,
        page_id: i64,
        new_title: &str,
        new_note: Option<&str>,
        new_content: &str,
    ) -> Result<Revision, WikiError> {
        let tx = self.write_tx()?;

        if store::get_page_by_id(&tx, page_id)?.is_none() {
            return Err(WikiError::NotFound(format!("Page with ID {} not found", page_id)));
        }
        require_content(new_content)?;

        let page = store::update_page(&tx, page_id, new_title, clean_note(new_note))?;
        let revision = store::add_revision(&tx, page.id, new_content, now())?;
        tx.commit()?;

        log::info!("page {} '{}' now at revision {}", page.id, page.title, revision.id);
        Ok(revision)
    }

    /// Deletes a page and its revisions. A missing page is an outcome, not
    /// an error.
    pub fn delete_page_by_id(&self, page_id: i64) -> Result<DeleteOutcome, WikiError> {
        let page = match store::get_page_by_id(&self.conn, page_id)? {
            Some(page) => page,
            None => return Ok(DeleteOutcome::DoesNotExist { id: page_id }),
        };

        match store::delete_page(&self.conn, page_id) {
            Ok(revisions_removed) => {
                log::info!("deleted page {} '{}'", page.id, page.title);
                Ok(DeleteOutcome::Deleted {
                    id: page.id,
                    title: page.title,
                    revisions_removed,
                })
            }
            Err(WikiError::NotFound(_)) => Ok(DeleteOutcome::DoesNotExist { id: page_id }),
            Err(e) => Err(e),
        }
    }

    /// Every page with its revision count, plus store-wide totals.
    ///
    /// All counts come from one read transaction. A nonzero
    /// `abandoned_revision_count` is logged and returned as-is.
    pub fn homepage_summary(&self) -> Result<HomepageSummary, WikiError> {
        let tx = self.read_tx()?;

        let pages = store::list_pages(&tx)?;
        let counts: HashMap<i64, i64> = store::revision_counts(&tx)?.into_iter().collect();
        let total_page_count = store::count_pages(&tx)?;
        let total_revision_count = store::count_all_revisions(&tx)?;
        tx.commit()?;

        let accounted: i64 = counts.values().sum();
        let abandoned_revision_count = total_revision_count - accounted;
        if abandoned_revision_count != 0 {
            log::warn!(
                "{} revision(s) do not belong to any page",
                abandoned_revision_count
            );
        }

        let pages = pages
            .into_iter()
            .map(|page| PageSummary {
                display_title: title::prettify(&page.title),
                revision_count: counts.get(&page.id).copied().unwrap_or(0),
                page,
            })
            .collect();

        Ok(HomepageSummary {
            pages,
            total_page_count,
            total_revision_count,
            abandoned_revision_count,
        })
    }

    /// The page with this exact id.
    pub fn page(&self, page_id: i64) -> Result<Page, WikiError> {
        store::get_page_by_id(&self.conn, page_id)?
            .ok_or_else(|| WikiError::NotFound(format!("Page with ID {} not found", page_id)))
    }

    /// A page and its latest revision, looked up by id or title.
    ///
    /// # Errors
    /// - `WikiError::NotFound` if nothing matches.
    /// - `WikiError::Integrity` if the page has no revisions.
    pub fn page_for_display(&self, title_or_id: &str) -> Result<PageDisplay, WikiError> {
        let tx = self.read_tx()?;

        let page = resolve_page(&tx, title_or_id)?;
        let latest_revision = store::latest_revision(&tx, page.id)?.ok_or_else(|| {
            WikiError::Integrity(format!("page {} '{}' has no revisions", page.id, page.title))
        })?;
        let revision_count = store::count_revisions(&tx, page.id)?;
        tx.commit()?;

        Ok(PageDisplay {
            display_title: title::prettify(&page.title),
            page,
            latest_revision,
            revision_count,
        })
    }

    /// A page and all of its revisions, latest first.
    pub fn page_history(&self, title_or_id: &str) -> Result<PageHistory, WikiError> {
        let tx = self.read_tx()?;

        let page = resolve_page(&tx, title_or_id)?;
        let revisions = store::list_revisions(&tx, page.id)?;
        tx.commit()?;

        Ok(PageHistory {
            display_title: title::prettify(&page.title),
            page,
            revisions,
        })
    }

    /// Fails with `WikiError::Integrity` if any revision is orphaned or any
    /// page has no revisions. Reports only; nothing is repaired.
    pub fn check_integrity(&self) -> Result<HomepageSummary, WikiError> {
        let summary = self.homepage_summary()?;

        if summary.abandoned_revision_count != 0 {
            return Err(WikiError::Integrity(format!(
                "{} abandoned revision(s) found",
                summary.abandoned_revision_count
            )));
        }

        let empty: Vec<&str> = summary
            .pages
            .iter()
            .filter(|p| p.revision_count == 0)
            .map(|p| p.page.title.as_str())
            .collect();
        if !empty.is_empty() {
            return Err(WikiError::Integrity(format!(
                "page(s) without revisions: {}",
                empty.join(", ")
            )));
        }

        Ok(summary)
    }

    /// Fills an empty wiki with a few sample pages.
    ///
    /// # Errors
    /// Returns `WikiError::Conflict` if the wiki already has pages.
    pub fn seed_sample_pages(&self) -> Result<Vec<Page>, WikiError> {
        let tx = self.write_tx()?;

        let existing = store::count_pages(&tx)?;
        if existing != 0 {
            return Err(WikiError::Conflict(format!(
                "wiki already has {} page(s); sample pages are only added to an empty wiki",
                existing
            )));
        }

        let timestamp = now();
        let mut pages = Vec::with_capacity(SAMPLE_PAGES.len());
        for (name, content) in SAMPLE_PAGES {
            let page = store::create_page(&tx, name, None)?;
            store::add_revision(&tx, page.id, content, timestamp)?;
            pages.push(page);
        }
        tx.commit()?;

        log::info!("seeded {} sample page(s)", pages.len());
        Ok(pages)
    }
}
