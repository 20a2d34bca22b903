use anyhow::Result;
use owo_colors::OwoColorize;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{error, info, warn};

use crate::db::{Database, Episode, Row};
use crate::query::use_color;
use crate::table::render_table;
use crate::whitelist::Whitelist;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanSummary {
    pub deleted: usize,
    pub missing: usize,
    pub failed: usize,
}

fn episodes_to_delete(db_path: &Path, whitelist_path: &Path) -> Result<(Database, Vec<Row>)> {
    let whitelist = Whitelist::load(whitelist_path)?;
    let db = Database::open(db_path)?;
    let rows = db.episodes_to_delete(whitelist.ids());
    Ok((db, rows))
}

fn warn_failed_queries(db: &Database) {
    if db.failed_queries() > 0 {
        warn!(
            "{} query(ies) against {} failed; results may be incomplete",
            db.failed_queries(),
            db.path().display()
        );
    }
}

/// Deletes the video file of every watched episode outside the whitelist.
/// A failure on one file is logged and the next file is tried.
pub fn clean(db_path: &Path, whitelist_path: &Path) -> Result<CleanSummary> {
    let (db, rows) = episodes_to_delete(db_path, whitelist_path)?;
    warn_failed_queries(&db);
    drop(db);

    let mut summary = CleanSummary::default();
    for row in &rows {
        let Some(episode) = Episode::from_row(row) else {
            error!("Skipping episode without a file path: {:?}", row);
            summary.failed += 1;
            continue;
        };

        match std::fs::remove_file(&episode.file_path) {
            Ok(()) => {
                info!(
                    "{} - S{}E{} deleted.",
                    episode.tvshow, episode.season, episode.episode
                );
                summary.deleted += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                error!("Error while deleting, file not found:\n {}", episode.file_path);
                summary.missing += 1;
            }
            Err(e) => {
                error!("Error while deleting {}: {:?}", episode.file_path, e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "Summary: {} deleted, {} not found, {} errors",
        summary.deleted, summary.missing, summary.failed
    );
    Ok(summary)
}

/// Reports what `clean` would delete without touching the filesystem.
pub fn simulate<W: Write>(
    db_path: &Path,
    whitelist_path: &Path,
    json: bool,
    out: &mut W,
) -> Result<usize> {
    let (db, rows) = episodes_to_delete(db_path, whitelist_path)?;
    warn_failed_queries(&db);
    drop(db);

    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?;
        return Ok(rows.len());
    }

    let heading = format!("Number of episodes to delete: {}", rows.len());
    if use_color() {
        writeln!(out, "{}\n", heading.bold())?;
    } else {
        writeln!(out, "{}\n", heading)?;
    }
    writeln!(out, "{}", render_table(&rows))?;
    Ok(rows.len())
}
