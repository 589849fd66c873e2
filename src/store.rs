//! Storage engine: all SQL for pages and revisions.
//!
//! Plain functions over `rusqlite::Connection`. Each takes the connection as
//! its first parameter and returns `Result<T, WikiError>`. A `Transaction`
//! derefs to a `Connection`, so the service façade runs several of these
//! inside one transaction when an operation spans more than one statement.
//!
//! The exception is `delete_page`, which opens its own transaction because
//! the cascade must be atomic no matter who calls it.

use crate::db::WikiError;
use crate::models::{Page, Revision};
use crate::title;
use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};

/// Map a row of `id, title, note` to a Page.
fn row_to_page(row: &rusqlite::Row) -> Result<Page, rusqlite::Error> {
    Ok(Page {
        id: row.get(0)?,
        title: row.get(1)?,
        note: row.get(2)?,
    })
}

/// Map a row of `id, page_id, content, timestamp` to a Revision.
fn row_to_revision(row: &rusqlite::Row) -> Result<Revision, rusqlite::Error> {
    Ok(Revision {
        id: row.get(0)?,
        page_id: row.get(1)?,
        content: row.get(2)?,
        timestamp: row.get(3)?,
    })
}

/// True if `e` is SQLite rejecting a row because of a UNIQUE constraint.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
                && err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn normalized_or_invalid(raw: &str) -> Result<String, WikiError> {
    let key = title::normalize(raw);
    if key.is_empty() {
        return Err(WikiError::Validation("Title must not be empty".to_string()));
    }
    Ok(key)
}

// =============================================================================
// Pages
// =============================================================================

/// Inserts a new page under the normalized form of `raw_title`.
///
/// # Errors
/// - `WikiError::Validation` if the title normalizes to nothing.
/// - `WikiError::DuplicateTitle` if a page with the same normalized title
///   exists, including when a concurrent writer wins the UNIQUE constraint.
pub fn create_page(conn: &Connection, raw_title: &str, note: Option<&str>) -> Result<Page, WikiError> {
    let key = normalized_or_invalid(raw_title)?;

    if get_page_by_title(conn, &key)?.is_some() {
        return Err(WikiError::DuplicateTitle(key));
    }

    conn.execute(
        "INSERT INTO pages (title, note) VALUES (?1, ?2)",
        rusqlite::params![key, note],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            WikiError::DuplicateTitle(key.clone())
        } else {
            WikiError::Db(e)
        }
    })?;

    let page = Page {
        id: conn.last_insert_rowid(),
        title: key,
        note: note.map(|s| s.to_string()),
    };
    log::debug!("created page {} '{}'", page.id, page.title);
    Ok(page)
}

/// Retrieves a page by id. `Ok(None)` if there is no such page.
pub fn get_page_by_id(conn: &Connection, id: i64) -> Result<Option<Page>, WikiError> {
    let page = conn
        .query_row("SELECT id, title, note FROM pages WHERE id = ?1", [id], row_to_page)
        .optional()?;
    Ok(page)
}

/// Retrieves a page by title. The title is normalized before the lookup, so
/// both `"My Page"` and `"my_page"` find the same row.
pub fn get_page_by_title(conn: &Connection, title: &str) -> Result<Option<Page>, WikiError> {
    let key = title::normalize(title);
    let page = conn
        .query_row("SELECT id, title, note FROM pages WHERE title = ?1", [&key], row_to_page)
        .optional()?;
    Ok(page)
}

/// Lists all pages, ordered by title.
pub fn list_pages(conn: &Connection) -> Result<Vec<Page>, WikiError> {
    let mut stmt = conn.prepare("SELECT id, title, note FROM pages ORDER BY title, id")?;

    let pages = stmt
        .query_map([], row_to_page)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(pages)
}

/// Number of pages in the store.
pub fn count_pages(conn: &Connection) -> Result<i64, WikiError> {
    let count = conn.query_row("SELECT COUNT(*) FROM pages", [], |row| row.get(0))?;
    Ok(count)
}

/// Renames and/or re-annotates a page in place.
///
/// `raw_title` is normalized; `note` replaces the current note (`None`
/// clears it).
///
/// # Errors
/// - `WikiError::NotFound` if the page doesn't exist.
/// - `WikiError::Validation` if the title normalizes to nothing.
/// - `WikiError::DuplicateTitle` if another page already has the title.
pub fn update_page(
    conn: &Connection,
    id: i64,
    raw_title: &str,
    note: Option<&str>,
) -> Result<Page, WikiError> {
    let key = normalized_or_invalid(raw_title)?;

    if let Some(other) = get_page_by_title(conn, &key)? {
        if other.id != id {
            return Err(WikiError::DuplicateTitle(key));
        }
    }

    let rows_affected = conn
        .execute(
            "UPDATE pages SET title = ?1, note = ?2 WHERE id = ?3",
            rusqlite::params![key, note, id],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                WikiError::DuplicateTitle(key.clone())
            } else {
                WikiError::Db(e)
            }
        })?;

    if rows_affected == 0 {
        return Err(WikiError::NotFound(format!("Page with ID {} not found", id)));
    }

    Ok(Page {
        id,
        title: key,
        note: note.map(|s| s.to_string()),
    })
}

/// Deletes a page and every revision it owns as one atomic unit.
///
/// Runs in its own immediate transaction: revisions first, then the page.
/// Any failure drops the transaction, which rolls both deletes back.
///
/// # Returns
/// The number of revisions removed.
///
/// # Errors
/// Returns `WikiError::NotFound` if the page doesn't exist.
pub fn delete_page(conn: &Connection, id: i64) -> Result<i64, WikiError> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    if get_page_by_id(&tx, id)?.is_none() {
        return Err(WikiError::NotFound(format!("Page with ID {} not found", id)));
    }

    let revisions_removed = tx.execute("DELETE FROM revisions WHERE page_id = ?1", [id])?;
    tx.execute("DELETE FROM pages WHERE id = ?1", [id])?;

    tx.commit()?;

    log::debug!("deleted page {} and {} revision(s)", id, revisions_removed);
    Ok(revisions_removed as i64)
}

// =============================================================================
// Revisions
// =============================================================================

/// Appends a revision to a page.
///
/// # Errors
/// - `WikiError::Validation` if `content` is empty.
/// - `WikiError::NotFound` if `page_id` doesn't reference a page.
pub fn add_revision(
    conn: &Connection,
    page_id: i64,
    content: &str,
    timestamp: i64,
) -> Result<Revision, WikiError> {
    if content.is_empty() {
        return Err(WikiError::Validation("Content must not be empty".to_string()));
    }
    if get_page_by_id(conn, page_id)?.is_none() {
        return Err(WikiError::NotFound(format!("Page with ID {} not found", page_id)));
    }

    conn.execute(
        "INSERT INTO revisions (page_id, content, timestamp) VALUES (?1, ?2, ?3)",
        rusqlite::params![page_id, content, timestamp],
    )?;

    let revision = Revision {
        id: conn.last_insert_rowid(),
        page_id,
        content: content.to_string(),
        timestamp,
    };
    log::debug!("added revision {} to page {}", revision.id, page_id);
    Ok(revision)
}

/// Lists a page's revisions, latest first (timestamp, then id, descending).
pub fn list_revisions(conn: &Connection, page_id: i64) -> Result<Vec<Revision>, WikiError> {
    let mut stmt = conn.prepare(
        "SELECT id, page_id, content, timestamp FROM revisions
         WHERE page_id = ?1
         ORDER BY timestamp DESC, id DESC",
    )?;

    let revisions = stmt
        .query_map([page_id], row_to_revision)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(revisions)
}

/// The latest revision of a page, or `None` if it has none.
pub fn latest_revision(conn: &Connection, page_id: i64) -> Result<Option<Revision>, WikiError> {
    let revision = conn
        .query_row(
            "SELECT id, page_id, content, timestamp FROM revisions
             WHERE page_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT 1",
            [page_id],
            row_to_revision,
        )
        .optional()?;
    Ok(revision)
}

/// Number of revisions a page has.
pub fn count_revisions(conn: &Connection, page_id: i64) -> Result<i64, WikiError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM revisions WHERE page_id = ?1",
        [page_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Number of revisions in the whole store, orphans included.
pub fn count_all_revisions(conn: &Connection) -> Result<i64, WikiError> {
    let count = conn.query_row("SELECT COUNT(*) FROM revisions", [], |row| row.get(0))?;
    Ok(count)
}

/// Revision count for every live page as `(page_id, count)`, by page id.
pub fn revision_counts(conn: &Connection) -> Result<Vec<(i64, i64)>, WikiError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, COUNT(r.id) FROM pages p
         LEFT JOIN revisions r ON r.page_id = p.id
         GROUP BY p.id
         ORDER BY p.id",
    )?;

    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(counts)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_test_db() -> Connection {
        let mut conn = db::open_in_memory().expect("Failed to create in-memory database");
        db::run_migrations(&mut conn).expect("Failed to run migrations");
        conn
    }

    fn page_with_revision(conn: &Connection, title: &str, content: &str, ts: i64) -> Page {
        let page = create_page(conn, title, None).expect("Failed to create page");
        add_revision(conn, page.id, content, ts).expect("Failed to add revision");
        page
    }

    #[test]
    fn test_create_and_get_page() {
        let conn = setup_test_db();

        let page = create_page(&conn, "My Page", Some("a note")).expect("Failed to create page");
        assert_eq!(page.title, "my_page");
        assert_eq!(page.note.as_deref(), Some("a note"));
        assert!(page.id > 0);

        let by_id = get_page_by_id(&conn, page.id).unwrap().expect("page by id");
        assert_eq!(by_id, page);

        let by_title = get_page_by_title(&conn, "my_page").unwrap().expect("page by title");
        assert_eq!(by_title, page);
    }

    #[test]
    fn test_get_page_by_title_normalizes_lookup() {
        let conn = setup_test_db();
        let page = create_page(&conn, "Stock Market", None).unwrap();

        let found = get_page_by_title(&conn, "  STOCK   market ").unwrap();
        assert_eq!(found, Some(page));
    }

    #[test]
    fn test_get_missing_page_is_none() {
        let conn = setup_test_db();
        assert!(get_page_by_id(&conn, 42).unwrap().is_none());
        assert!(get_page_by_title(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn test_create_page_duplicate_normalized_title() {
        let conn = setup_test_db();
        create_page(&conn, "My Page", None).unwrap();

        let result = create_page(&conn, "my_page", None);
        assert!(matches!(result, Err(WikiError::DuplicateTitle(ref t)) if t == "my_page"));
        assert_eq!(count_pages(&conn).unwrap(), 1);
    }

    #[test]
    fn test_unique_constraint_maps_to_duplicate_title() {
        let conn = setup_test_db();
        conn.execute("INSERT INTO pages (title) VALUES ('raced')", []).unwrap();

        let err = conn
            .execute("INSERT INTO pages (title) VALUES ('raced')", [])
            .unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_create_page_rejects_blank_title() {
        let conn = setup_test_db();
        let result = create_page(&conn, "   ", None);
        assert!(matches!(result, Err(WikiError::Validation(_))));
    }

    #[test]
    fn test_add_revision_to_missing_page() {
        let conn = setup_test_db();
        let result = add_revision(&conn, 99, "content", 1);
        assert!(matches!(result, Err(WikiError::NotFound(_))));
        assert_eq!(count_all_revisions(&conn).unwrap(), 0);
    }

    #[test]
    fn test_add_revision_rejects_empty_content() {
        let conn = setup_test_db();
        let page = create_page(&conn, "wiki", None).unwrap();
        let result = add_revision(&conn, page.id, "", 1);
        assert!(matches!(result, Err(WikiError::Validation(_))));
    }

    #[test]
    fn test_list_revisions_latest_first() {
        let conn = setup_test_db();
        let page = create_page(&conn, "wiki", None).unwrap();
        add_revision(&conn, page.id, "first", 100).unwrap();
        add_revision(&conn, page.id, "third", 300).unwrap();
        add_revision(&conn, page.id, "second", 200).unwrap();

        let contents: Vec<String> = list_revisions(&conn, page.id)
            .unwrap()
            .into_iter()
            .map(|r| r.content)
            .collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[test]
    fn test_latest_revision_breaks_ties_by_id() {
        let conn = setup_test_db();
        let page = create_page(&conn, "wiki", None).unwrap();
        add_revision(&conn, page.id, "a", 500).unwrap();
        let b = add_revision(&conn, page.id, "b", 500).unwrap();

        let latest = latest_revision(&conn, page.id).unwrap().expect("latest");
        assert_eq!(latest, b);
        assert_eq!(list_revisions(&conn, page.id).unwrap()[0], b);
    }

    #[test]
    fn test_latest_revision_none_without_revisions() {
        let conn = setup_test_db();
        let page = create_page(&conn, "empty", None).unwrap();
        assert!(latest_revision(&conn, page.id).unwrap().is_none());
    }

    #[test]
    fn test_counts() {
        let conn = setup_test_db();
        let a = page_with_revision(&conn, "a", "one", 1);
        add_revision(&conn, a.id, "two", 2).unwrap();
        let b = page_with_revision(&conn, "b", "one", 1);
        let c = create_page(&conn, "c", None).unwrap();

        assert_eq!(count_pages(&conn).unwrap(), 3);
        assert_eq!(count_revisions(&conn, a.id).unwrap(), 2);
        assert_eq!(count_revisions(&conn, b.id).unwrap(), 1);
        assert_eq!(count_all_revisions(&conn).unwrap(), 3);
        assert_eq!(
            revision_counts(&conn).unwrap(),
            vec![(a.id, 2), (b.id, 1), (c.id, 0)]
        );
    }

    #[test]
    fn test_list_pages_ordered_by_title() {
        let conn = setup_test_db();
        create_page(&conn, "Website", None).unwrap();
        create_page(&conn, "Apple", None).unwrap();
        create_page(&conn, "Stock Market", None).unwrap();

        let titles: Vec<String> = list_pages(&conn).unwrap().into_iter().map(|p| p.title).collect();
        assert_eq!(titles, vec!["apple", "stock_market", "website"]);
    }

    #[test]
    fn test_update_page_renames_and_clears_note() {
        let conn = setup_test_db();
        let page = create_page(&conn, "old name", Some("note")).unwrap();

        let updated = update_page(&conn, page.id, "New Name", None).unwrap();
        assert_eq!(updated.title, "new_name");
        assert_eq!(updated.note, None);
        assert_eq!(get_page_by_id(&conn, page.id).unwrap(), Some(updated));
    }

    #[test]
    fn test_update_page_same_title_is_allowed() {
        let conn = setup_test_db();
        let page = create_page(&conn, "wiki", None).unwrap();
        let updated = update_page(&conn, page.id, "WIKI", Some("n")).unwrap();
        assert_eq!(updated.title, "wiki");
    }

    #[test]
    fn test_update_page_rejects_other_pages_title() {
        let conn = setup_test_db();
        create_page(&conn, "taken", None).unwrap();
        let page = create_page(&conn, "mine", None).unwrap();

        let result = update_page(&conn, page.id, "Taken", None);
        assert!(matches!(result, Err(WikiError::DuplicateTitle(_))));
        assert_eq!(get_page_by_id(&conn, page.id).unwrap().unwrap().title, "mine");
    }

    #[test]
    fn test_update_missing_page() {
        let conn = setup_test_db();
        let result = update_page(&conn, 7, "anything", None);
        assert!(matches!(result, Err(WikiError::NotFound(_))));
    }

    #[test]
    fn test_delete_page_cascades_revisions() {
        let conn = setup_test_db();
        let keep = page_with_revision(&conn, "keep", "k", 1);
        let gone = page_with_revision(&conn, "gone", "g1", 1);
        add_revision(&conn, gone.id, "g2", 2).unwrap();

        let removed = delete_page(&conn, gone.id).unwrap();
        assert_eq!(removed, 2);
        assert!(get_page_by_id(&conn, gone.id).unwrap().is_none());
        assert_eq!(count_revisions(&conn, gone.id).unwrap(), 0);
        assert_eq!(count_all_revisions(&conn).unwrap(), 1);
        assert_eq!(count_revisions(&conn, keep.id).unwrap(), 1);
    }

    #[test]
    fn test_delete_missing_page() {
        let conn = setup_test_db();
        let result = delete_page(&conn, 1234);
        assert!(matches!(result, Err(WikiError::NotFound(_))));
    }

    #[test]
    fn test_deleted_ids_are_not_reused() {
        let conn = setup_test_db();
        let first = page_with_revision(&conn, "first", "x", 1);
        delete_page(&conn, first.id).unwrap();

        let second = create_page(&conn, "second", None).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn test_foreign_keys_reject_direct_page_delete() {
        let conn = setup_test_db();
        let page = page_with_revision(&conn, "wiki", "hello", 1);

        let result = conn.execute("DELETE FROM pages WHERE id = ?1", [page.id]);
        assert!(result.is_err(), "deleting a page with revisions must not orphan them");
        assert_eq!(count_all_revisions(&conn).unwrap(), 1);
    }

    #[test]
    fn test_failed_delete_leaves_page_and_revisions() {
        let conn = setup_test_db();
        let page = page_with_revision(&conn, "wiki", "one", 1);
        add_revision(&conn, page.id, "two", 2).unwrap();
        // Fails the page delete after the revisions are already gone.
        conn.execute_batch(
            "CREATE TRIGGER block_page_delete BEFORE DELETE ON pages
             BEGIN SELECT RAISE(ABORT, 'page delete blocked'); END;",
        )
        .unwrap();

        let result = delete_page(&conn, page.id);

        assert!(matches!(result, Err(WikiError::Db(_))));
        assert_eq!(count_revisions(&conn, page.id).unwrap(), 2);
        assert_eq!(get_page_by_id(&conn, page.id).unwrap(), Some(page));
        assert!(conn.is_autocommit(), "the failed delete must not leave a transaction open");
    }
}
