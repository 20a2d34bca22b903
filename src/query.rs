use anyhow::Result;
use std::io::{IsTerminal, Write};
use std::path::Path;

use crate::db::{Database, Row};
use crate::editor;
use crate::table::render_table;
use crate::whitelist::Whitelist;

pub fn use_color() -> bool {
    std::io::stdout().is_terminal()
}

fn print_rows<W: Write>(rows: &[Row], json: bool, out: &mut W) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(rows)?)?;
    } else {
        writeln!(out, "{}", render_table(rows))?;
    }
    Ok(())
}

pub fn list_tvshows<W: Write>(db_path: &Path, json: bool, out: &mut W) -> Result<usize> {
    let db = Database::open(db_path)?;
    let shows = db.list_shows(None, None);
    drop(db);

    print_rows(&shows, json, out)?;
    Ok(shows.len())
}

pub fn show_whitelist<W: Write>(
    db_path: &Path,
    whitelist_path: &Path,
    json: bool,
    out: &mut W,
) -> Result<usize> {
    let whitelist = Whitelist::load(whitelist_path)?;

    if !json {
        return Ok(editor::display(db_path, &whitelist, out)?.len());
    }
    if whitelist.is_empty() {
        writeln!(out, "[]")?;
        return Ok(0);
    }

    let db = Database::open(db_path)?;
    let shows = db.list_shows(Some(whitelist.ids()), None);
    print_rows(&shows, true, out)?;
    Ok(shows.len())
}
