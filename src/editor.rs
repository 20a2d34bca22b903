use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::db::{show_ids, Database, Row, Show, ShowId};
use crate::table::render_table;
use crate::whitelist::Whitelist;

const ADD_PROMPT: &str = "\
Select a tvshow to add to the whitelist by entering its number
comma-separated for multiple
q to quit";

const REMOVE_PROMPT: &str = "\
Select a tvshow to remove from the whitelist by entering its number
comma-separated for multiple
q to quit";

pub const EMPTY_WHITELIST: &str = "No tvshow in the whitelist.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The whitelist was written with this many ids added or removed.
    Saved(usize),
    /// The user typed `q` or closed input; nothing was written.
    Quit,
    /// There was nothing to choose from.
    Nothing,
}

/// Line-based prompt reading from `input` and echoing to `out`.
pub struct Prompt<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }

    pub fn out(&mut self) -> &mut W {
        &mut self.out
    }

    /// Asks until every entered id is one of `valid`. Returns `None` on `q`
    /// or end of input.
    pub fn select(&mut self, message: &str, valid: &[ShowId]) -> Result<Option<Vec<ShowId>>> {
        writeln!(self.out, "\n{}", message)?;
        loop {
            self.out.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }

            match parse_selection(&line, valid) {
                Selection::Quit => return Ok(None),
                Selection::Valid(ids) => return Ok(Some(ids)),
                Selection::Invalid => {
                    debug!("Rejected selection: {:?}", line.trim());
                    writeln!(self.out, "Wrong input.\nTry again or type 'q' to quit:")?;
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Quit,
    Valid(Vec<ShowId>),
    Invalid,
}

fn parse_selection(line: &str, valid: &[ShowId]) -> Selection {
    let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
    if tokens.first() == Some(&"q") {
        return Selection::Quit;
    }

    let mut ids = Vec::with_capacity(tokens.len());
    for token in tokens {
        match token.parse::<ShowId>() {
            Ok(id) if valid.contains(&id) => ids.push(id),
            _ => return Selection::Invalid,
        }
    }
    Selection::Valid(ids)
}

fn titles(shows: &[Row], choice: &[ShowId]) -> String {
    shows
        .iter()
        .filter_map(Show::from_row)
        .filter(|show| choice.contains(&show.id))
        .map(|show| show.title)
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn add<R: BufRead, W: Write>(
    db_path: &Path,
    whitelist_path: &Path,
    prompt: &mut Prompt<R, W>,
) -> Result<EditOutcome> {
    let mut whitelist = Whitelist::load(whitelist_path)?;
    let db = Database::open(db_path)?;

    let shows = db.list_shows(None, Some(whitelist.ids()));
    writeln!(prompt.out(), "{}", render_table(&shows))?;
    if shows.is_empty() {
        return Ok(EditOutcome::Nothing);
    }

    let Some(choice) = prompt.select(ADD_PROMPT, &show_ids(&shows))? else {
        return Ok(EditOutcome::Quit);
    };

    whitelist.add(&choice);
    whitelist.save(whitelist_path)?;
    info!("{} tvshow(s) were added to the whitelist", choice.len());
    debug!("Added: {}", titles(&shows, &choice));
    Ok(EditOutcome::Saved(choice.len()))
}

/// Prints the whitelisted shows and returns them. Opens the database only
/// when the whitelist has entries.
pub fn display<W: Write>(db_path: &Path, whitelist: &Whitelist, out: &mut W) -> Result<Vec<Row>> {
    if whitelist.is_empty() {
        writeln!(out, "{}", EMPTY_WHITELIST)?;
        return Ok(Vec::new());
    }

    let db = Database::open(db_path)?;
    let shows = db.list_shows(Some(whitelist.ids()), None);
    writeln!(out, "Tvshows in the white list:\n")?;
    writeln!(out, "{}", render_table(&shows))?;
    Ok(shows)
}

pub fn remove<R: BufRead, W: Write>(
    db_path: &Path,
    whitelist_path: &Path,
    prompt: &mut Prompt<R, W>,
) -> Result<EditOutcome> {
    let mut whitelist = Whitelist::load(whitelist_path)?;

    let shows = display(db_path, &whitelist, prompt.out())?;
    if shows.is_empty() {
        return Ok(EditOutcome::Nothing);
    }

    let Some(choice) = prompt.select(REMOVE_PROMPT, &show_ids(&shows))? else {
        return Ok(EditOutcome::Quit);
    };

    whitelist.remove(&choice);
    whitelist.save(whitelist_path)?;
    info!("{} tvshow(s) were removed from the whitelist", choice.len());
    debug!("Removed: {}", titles(&shows, &choice));
    Ok(EditOutcome::Saved(choice.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::{fixture_db, FIXTURE};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn prompt(input: &str) -> Prompt<Cursor<Vec<u8>>, Vec<u8>> {
        Prompt::new(Cursor::new(input.as_bytes().to_vec()), Vec::new())
    }

    fn output(prompt: Prompt<Cursor<Vec<u8>>, Vec<u8>>) -> String {
        String::from_utf8(prompt.out).unwrap()
    }

    #[test]
    fn parses_valid_invalid_and_quit() {
        let valid = [1, 2, 3];
        assert_eq!(parse_selection("1, 3\n", &valid), Selection::Valid(vec![1, 3]));
        assert_eq!(parse_selection("q\n", &valid), Selection::Quit);
        assert_eq!(parse_selection(" q , 1", &valid), Selection::Quit);
        assert_eq!(parse_selection("1,4", &valid), Selection::Invalid);
        assert_eq!(parse_selection("one", &valid), Selection::Invalid);
        assert_eq!(parse_selection("1,", &valid), Selection::Invalid);
        assert_eq!(parse_selection("\n", &valid), Selection::Invalid);
    }

    #[test]
    fn select_reprompts_until_valid() {
        let mut p = prompt("7\nabc\n2\n");
        let choice = p.select("pick", &[1, 2]).unwrap();
        assert_eq!(choice, Some(vec![2]));
        assert_eq!(output(p).matches("Wrong input.").count(), 2);
    }

    #[test]
    fn end_of_input_counts_as_quit() {
        let mut p = prompt("9\n");
        assert_eq!(p.select("pick", &[1]).unwrap(), None);
    }

    #[test]
    fn add_without_whitelist_file_writes_selection() {
        let tmp = TempDir::new().unwrap();
        let db_path = fixture_db(tmp.path(), FIXTURE);
        let wl_path = tmp.path().join("whitelist.json");

        let mut p = prompt("1,2\n");
        let outcome = add(&db_path, &wl_path, &mut p).unwrap();

        assert_eq!(outcome, EditOutcome::Saved(2));
        assert_eq!(Whitelist::load(&wl_path).unwrap().ids(), &[1, 2]);
        let shown = output(p);
        assert!(shown.contains("Columbo"));
        assert!(shown.contains("The Expanse"));
    }

    #[test]
    fn add_only_offers_shows_outside_whitelist() {
        let tmp = TempDir::new().unwrap();
        let db_path = fixture_db(tmp.path(), FIXTURE);
        let wl_path = tmp.path().join("whitelist.json");
        Whitelist::from_ids(vec![1]).save(&wl_path).unwrap();

        let mut p = prompt("1\n3\n");
        let outcome = add(&db_path, &wl_path, &mut p).unwrap();

        assert_eq!(outcome, EditOutcome::Saved(1));
        assert_eq!(Whitelist::load(&wl_path).unwrap().ids(), &[1, 3]);
        let shown = output(p);
        assert!(!shown.contains("Dark"));
        assert!(shown.contains("Wrong input."));
    }

    #[test]
    fn remove_drops_selected_show() {
        let tmp = TempDir::new().unwrap();
        let db_path = fixture_db(tmp.path(), FIXTURE);
        let wl_path = tmp.path().join("whitelist.json");
        Whitelist::from_ids(vec![1, 2]).save(&wl_path).unwrap();

        let mut p = prompt("1\n");
        let outcome = remove(&db_path, &wl_path, &mut p).unwrap();

        assert_eq!(outcome, EditOutcome::Saved(1));
        assert_eq!(Whitelist::load(&wl_path).unwrap().ids(), &[2]);
        assert!(output(p).contains("Tvshows in the white list:"));
    }

    #[test]
    fn quitting_remove_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let db_path = fixture_db(tmp.path(), FIXTURE);
        let wl_path = tmp.path().join("whitelist.json");
        Whitelist::from_ids(vec![1, 2]).save(&wl_path).unwrap();

        let mut p = prompt("q\n");
        assert_eq!(remove(&db_path, &wl_path, &mut p).unwrap(), EditOutcome::Quit);
        assert_eq!(Whitelist::load(&wl_path).unwrap().ids(), &[1, 2]);
    }

    #[test]
    fn remove_with_empty_whitelist_does_nothing() {
        let tmp = TempDir::new().unwrap();
        let wl_path = tmp.path().join("whitelist.json");

        let mut p = prompt("");
        let outcome = remove(&tmp.path().join("absent.db"), &wl_path, &mut p).unwrap();

        assert_eq!(outcome, EditOutcome::Nothing);
        assert!(output(p).contains(EMPTY_WHITELIST));
        assert!(!wl_path.exists());
    }

    #[test]
    fn display_lists_only_whitelisted_shows() {
        let tmp = TempDir::new().unwrap();
        let db_path = fixture_db(tmp.path(), FIXTURE);

        let mut out = Vec::new();
        let shows = display(&db_path, &Whitelist::from_ids(vec![3]), &mut out).unwrap();

        assert_eq!(show_ids(&shows), vec![3]);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Columbo"));
        assert!(!text.contains("Dark"));
    }
}
