//! Wiki CLI: create, edit, show, and delete wiki pages from the shell.
//!
//! Every command goes through `wiki::Wiki`. Output is JSON by default, with
//! `--pretty` for human-readable text. Errors go to stderr as JSON and the
//! process exits with status 1.

use clap::{Parser, Subcommand};
use std::io::{self, Read as _};
use std::path::PathBuf;
use std::process;
use wiki::output::{self, OutputMode};
use wiki::{db, logger, Wiki, WikiError};

/// Input limits enforced before anything reaches the store.
mod validation {
    use wiki::WikiError;

    pub const MAX_TITLE_LEN: usize = 500;
    pub const MAX_NOTE_LEN: usize = 2000;
    pub const MAX_BODY_LEN: usize = 10_000_000; // 10 MB

    pub fn validate_title(title: &str) -> Result<(), WikiError> {
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(WikiError::Validation(format!("Title too long (max {} characters)", MAX_TITLE_LEN)));
        }
        Ok(())
    }

    pub fn validate_note(note: &str) -> Result<(), WikiError> {
        if note.chars().count() > MAX_NOTE_LEN {
            return Err(WikiError::Validation(format!("Note too long (max {} characters)", MAX_NOTE_LEN)));
        }
        Ok(())
    }

    pub fn validate_body(body: &str) -> Result<(), WikiError> {
        if body.len() > MAX_BODY_LEN {
            return Err(WikiError::Validation(format!("Body too long (max {} bytes)", MAX_BODY_LEN)));
        }
        Ok(())
    }
}

/// A minimal wiki with per-page revision history.
///
/// Pages are stored under a normalized title (lowercase, words joined by
/// underscores). Every edit adds a revision; nothing is overwritten.
#[derive(Parser)]
#[command(name = "wiki", version, about)]
struct Cli {
    /// Output in human-readable format instead of JSON.
    #[arg(long, global = true)]
    pretty: bool,

    /// Database file (default: $WIKI_PATH or ~/.wiki/wiki.db).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log more to stderr (-v info, -vv debug). $WIKI_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database if needed and bring its schema up to date.
    Init,
    /// Create a page with its first revision.
    Create {
        /// Page title.
        #[arg(long)]
        title: String,
        /// Optional note attached to the page.
        #[arg(long)]
        note: Option<String>,
        /// Page content. Omit to use --stdin.
        #[arg(long)]
        body: Option<String>,
        /// Read content from stdin.
        #[arg(long)]
        stdin: bool,
    },
    /// Add a revision to a page, optionally renaming it or changing its note.
    Edit {
        /// The page ID.
        id: i64,
        /// New title (default: unchanged).
        #[arg(long)]
        title: Option<String>,
        /// New note (default: unchanged).
        #[arg(long, conflicts_with = "clear_note")]
        note: Option<String>,
        /// Remove the page's note.
        #[arg(long)]
        clear_note: bool,
        /// New content. Omit to use --stdin.
        #[arg(long)]
        body: Option<String>,
        /// Read content from stdin.
        #[arg(long)]
        stdin: bool,
    },
    /// Show a page's latest revision.
    Show {
        /// Page ID or title.
        page: String,
    },
    /// List a page's revisions, latest first.
    History {
        /// Page ID or title.
        page: String,
    },
    /// Delete a page and all of its revisions.
    Delete {
        /// The page ID.
        id: i64,
    },
    /// List all pages with revision counts.
    #[command(alias = "summary")]
    List,
    /// Verify that every revision belongs to a page and every page has content.
    Check,
    /// Add sample pages to an empty wiki.
    Seed,
}

/// Read content from --body or --stdin.
fn read_body(body: &Option<String>, stdin: bool) -> Result<String, WikiError> {
    if stdin {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).map_err(WikiError::Io)?;
        Ok(buf)
    } else if let Some(b) = body {
        Ok(b.clone())
    } else {
        Err(WikiError::Validation(
            "No content given. Use --body or --stdin.".to_string(),
        ))
    }
}

fn run(cli: Cli) -> Result<(), WikiError> {
    let mode = if cli.pretty {
        OutputMode::Pretty
    } else {
        OutputMode::Json
    };

    let path = db::db_path(cli.db.as_deref())?;
    let wiki = Wiki::open(&path)?;

    match &cli.command {
        Commands::Init => {
            let summary = wiki.homepage_summary()?;
            let msg = serde_json::json!({
                "path": path.display().to_string(),
                "pages": summary.total_page_count,
            });
            output::print(mode, &msg, || {
                println!("Wiki ready at {} ({} page(s))", path.display(), summary.total_page_count)
            });
        }
        Commands::Create {
            title,
            note,
            body,
            stdin,
        } => {
            validation::validate_title(title)?;
            if let Some(ref n) = note {
                validation::validate_note(n)?;
            }
            let content = read_body(body, *stdin)?;
            validation::validate_body(&content)?;

            let page = wiki.create_new_page(title, note.as_deref(), &content)?;
            output::print(mode, &page, || output::print_pretty_page(&page));
        }
        Commands::Edit {
            id,
            title,
            note,
            clear_note,
            body,
            stdin,
        } => {
            if let Some(ref t) = title {
                validation::validate_title(t)?;
            }
            if let Some(ref n) = note {
                validation::validate_note(n)?;
            }
            let content = read_body(body, *stdin)?;
            validation::validate_body(&content)?;

            let current = wiki.page(*id)?;
            let new_title = title.as_deref().unwrap_or(&current.title);
            let new_note = if *clear_note {
                None
            } else {
                note.as_deref().or(current.note.as_deref())
            };

            let revision = wiki.edit_page(*id, new_title, new_note, &content)?;
            output::print(mode, &revision, || output::print_pretty_revision(&revision));
        }
        Commands::Show { page } => {
            let display = wiki.page_for_display(page)?;
            output::print(mode, &display, || output::print_pretty_display(&display));
        }
        Commands::History { page } => {
            let history = wiki.page_history(page)?;
            output::print(mode, &history, || output::print_pretty_history(&history));
        }
        Commands::Delete { id } => {
            let outcome = wiki.delete_page_by_id(*id)?;
            output::print(mode, &outcome, || output::print_pretty_delete(&outcome));
        }
        Commands::List => {
            let summary = wiki.homepage_summary()?;
            output::print(mode, &summary, || output::print_pretty_summary(&summary));
        }
        Commands::Check => {
            let summary = wiki.check_integrity()?;
            output::print(mode, &summary, || {
                println!(
                    "OK: {} page(s), {} revision(s), no abandoned revisions",
                    summary.total_page_count, summary.total_revision_count
                )
            });
        }
        Commands::Seed => {
            let pages = wiki.seed_sample_pages()?;
            output::print(mode, &pages, || {
                for page in &pages {
                    output::print_pretty_page(page);
                    println!();
                }
            });
        }
    }

    wiki.close()
}

fn main() {
    let cli = Cli::parse();

    let env_level = std::env::var(logger::LEVEL_ENV).ok();
    let level = logger::resolve_level(cli.verbose, env_level.as_deref());
    if let Err(e) = logger::init(level) {
        eprintln!("warning: logging disabled: {}", e);
    }

    if let Err(e) = run(cli) {
        log::debug!("command failed: {:?}", e);
        let error_json = serde_json::json!({
            "error": e.to_string(),
            "kind": e.kind(),
        });
        eprintln!("{}", error_json);
        process::exit(1);
    }
}
