use anyhow::{Context, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, ToSql};
use serde_json::{Map, Value};
use std::cell::Cell;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::table::render_table;

/// One result row, keyed by column name in select order.
pub type Row = Map<String, Value>;

pub type ShowId = i64;

pub struct Database {
    conn: Connection,
    path: PathBuf,
    failed: Cell<usize>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| {
            format!("Connection to the database failed. Check the path: {}", path.display())
        })?;

        // Opening is lazy in SQLite; touch the schema so a non-database file fails here.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| row.get::<_, i64>(0))
            .with_context(|| {
                format!("Connection to the database failed. Check the path: {}", path.display())
            })?;

        debug!("Connection to the database successful: {}", path.display());
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            failed: Cell::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of queries that failed since the database was opened.
    pub fn failed_queries(&self) -> usize {
        self.failed.get()
    }

    /// Runs a statement and returns its rows. A failing statement is logged,
    /// counted, and yields no rows.
    pub fn query(&self, sql: &str, params: &[&dyn ToSql], label: &str) -> Vec<Row> {
        match self.try_query(sql, params) {
            Ok(rows) => {
                debug!("Query to fetch {} successful: {} rows", label, rows.len());
                debug!("\n{}", render_table(&rows));
                rows
            }
            Err(e) => {
                error!("Query to fetch {} failed: {:#}", label, e);
                error!("{}", sql);
                self.failed.set(self.failed.get() + 1);
                Vec::new()
            }
        }
    }

    fn try_query(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let rows = stmt.query_map(params, |row| {
            let mut out = Row::new();
            for (i, name) in columns.iter().enumerate() {
                out.insert(name.clone(), to_json(row.get_ref(i)?));
            }
            Ok(out)
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Distinct shows in the library, optionally restricted to `include`
    /// and/or excluding `exclude`.
    pub fn list_shows(&self, include: Option<&[ShowId]>, exclude: Option<&[ShowId]>) -> Vec<Row> {
        if include.is_some_and(|ids| ids.is_empty()) {
            return Vec::new();
        }

        let mut sql = String::from(
            "SELECT DISTINCT
                ep.idShow   AS id,
                ep.strTitle AS title
             FROM episode_view ep",
        );
        let mut clauses = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(ids) = include {
            clauses.push(format!("ep.idShow IN ({})", placeholders(ids.len())));
            params.extend(ids.iter().map(|id| id as &dyn ToSql));
        }
        if let Some(ids) = exclude.filter(|ids| !ids.is_empty()) {
            clauses.push(format!("ep.idShow NOT IN ({})", placeholders(ids.len())));
            params.extend(ids.iter().map(|id| id as &dyn ToSql));
        }

        if !clauses.is_empty() {
            sql.push_str("\n             WHERE ");
            sql.push_str(&clauses.join("\n               AND "));
        }
        sql.push_str("\n             ORDER BY ep.strTitle, ep.idShow");

        self.query(&sql, &params, "tvshows list")
    }

    /// Watched episodes whose show is not whitelisted.
    pub fn episodes_to_delete(&self, whitelist: &[ShowId]) -> Vec<Row> {
        let mut sql = String::from(
            "SELECT
                ep.strTitle                AS tvshow,
                CAST(ep.c12 AS INTEGER)    AS season,
                CAST(ep.c13 AS INTEGER)    AS episode,
                ep.c18                     AS file_path
             FROM episode_view ep
             WHERE ep.playCount >= 1",
        );
        if !whitelist.is_empty() {
            sql.push_str(&format!(
                "\n               AND ep.idShow NOT IN ({})",
                placeholders(whitelist.len())
            ));
        }
        sql.push_str("\n             ORDER BY ep.strTitle, season, episode");

        let params: Vec<&dyn ToSql> = whitelist.iter().map(|id| id as &dyn ToSql).collect();
        self.query(&sql, &params, "tvshows to be deleted")
    }
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<BLOB {} bytes>", bytes.len())),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Show {
    pub id: ShowId,
    pub title: String,
}

impl Show {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            id: id_value(row.get("id")?)?,
            title: row.get("title").map(crate::table::cell_text).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Episode {
    pub tvshow: String,
    pub season: i64,
    pub episode: i64,
    pub file_path: String,
}

impl Episode {
    pub fn from_row(row: &Row) -> Option<Self> {
        Some(Self {
            tvshow: row.get("tvshow").map(crate::table::cell_text).unwrap_or_default(),
            season: row.get("season").and_then(Value::as_i64).unwrap_or_default(),
            episode: row.get("episode").and_then(Value::as_i64).unwrap_or_default(),
            file_path: row.get("file_path")?.as_str()?.to_string(),
        })
    }
}

/// Reads a show id stored either as an integer or as a numeric string.
pub fn id_value(value: &Value) -> Option<ShowId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn show_ids(rows: &[Row]) -> Vec<ShowId> {
    rows.iter()
        .filter_map(|row| row.get("id").and_then(id_value))
        .collect()
}
