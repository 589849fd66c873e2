//! Output formatting for the wiki CLI.
//!
//! Two modes:
//! - **JSON**: compact, one document per command (default)
//! - **Pretty**: labeled fields for humans (`--pretty`)

use crate::models::{DeleteOutcome, HomepageSummary, Page, PageDisplay, PageHistory, Revision};
use serde::Serialize;

/// Longest revision preview shown in history listings, in bytes.
const PREVIEW_LEN: usize = 60;

/// Output mode for CLI results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Compact JSON output.
    Json,
    /// Human-readable formatted output.
    Pretty,
}

/// Serialize a value to compact JSON and print to stdout.
///
/// # Panics
///
/// Panics if serialization fails, which only happens with a broken
/// `Serialize` implementation.
pub fn print_json<T: Serialize>(value: &T) {
    let json = serde_json::to_string(value).expect("failed to serialize to JSON");
    println!("{}", json);
}

/// Renders an epoch timestamp as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn format_timestamp(ts: i64) -> String {
    match chrono::DateTime::<chrono::Utc>::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}

/// First line of `content`, cut at `PREVIEW_LEN` bytes on a char boundary.
pub fn preview(content: &str) -> String {
    let line = content.lines().next().unwrap_or("");
    if line.len() <= PREVIEW_LEN && line.len() == content.trim_end().len() {
        return line.to_string();
    }
    let mut end = line.len().min(PREVIEW_LEN);
    while end > 0 && !line.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &line[..end])
}

/// Print a page's metadata.
///
/// ```text
/// Title:  The Sunken Ship (the_sunken_ship)
/// ID:     3
/// Note:   maritime
/// ```
pub fn print_pretty_page(page: &Page) {
    println!("Title:  {} ({})", crate::title::prettify(&page.title), page.title);
    println!("ID:     {}", page.id);
    println!("Note:   {}", page.note.as_deref().unwrap_or("(none)"));
}

/// Print a single revision header line.
pub fn print_pretty_revision(revision: &Revision) {
    println!(
        "Revision {} of page {} at {}",
        revision.id,
        revision.page_id,
        format_timestamp(revision.timestamp)
    );
}

/// Print a page with its latest content.
pub fn print_pretty_display(display: &PageDisplay) {
    println!("{}", display.display_title);
    println!("{}", "=".repeat(display.display_title.chars().count()));
    println!("ID:        {}", display.page.id);
    if let Some(ref note) = display.page.note {
        println!("Note:      {}", note);
    }
    println!("Revisions: {}", display.revision_count);
    println!("Updated:   {}", format_timestamp(display.latest_revision.timestamp));
    println!();
    println!("{}", display.latest_revision.content);
}

/// Print a page's revisions, one per line, latest first.
///
/// Format: `<revision id> | <timestamp> | <preview>`
pub fn print_pretty_history(history: &PageHistory) {
    println!("{} (page {})", history.display_title, history.page.id);
    if history.revisions.is_empty() {
        println!("(no revisions)");
        return;
    }
    for revision in &history.revisions {
        println!(
            "{} | {} | {}",
            revision.id,
            format_timestamp(revision.timestamp),
            preview(&revision.content)
        );
    }
}

/// Print the home page: one line per page, then totals.
///
/// Format: `<id> | <display title> | <n> revision(s)`
pub fn print_pretty_summary(summary: &HomepageSummary) {
    if summary.pages.is_empty() {
        println!("(no pages)");
    }
    for entry in &summary.pages {
        println!(
            "{} | {} | {} revision(s)",
            entry.page.id, entry.display_title, entry.revision_count
        );
    }
    println!();
    println!("Pages:     {}", summary.total_page_count);
    println!("Revisions: {}", summary.total_revision_count);
    if summary.abandoned_revision_count != 0 {
        println!("Abandoned: {} (store needs attention)", summary.abandoned_revision_count);
    } else {
        println!("Abandoned: 0");
    }
}

/// Print a delete outcome's message.
pub fn print_pretty_delete(outcome: &DeleteOutcome) {
    println!("{}", outcome.message());
}

/// Dispatch between JSON serialization and a pretty-print closure.
///
/// ```ignore
/// print(mode, &page, || print_pretty_page(&page));
/// ```
pub fn print<T: Serialize>(mode: OutputMode, value: &T, pretty_fn: impl FnOnce()) {
    match mode {
        OutputMode::Json => print_json(value),
        OutputMode::Pretty => pretty_fn(),
    }
}
