use anyhow::{Context, Result};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

use crate::db::{id_value, ShowId};

/// Shows that are never cleaned. Order is preserved and duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Whitelist {
    ids: Vec<ShowId>,
}

impl Whitelist {
    pub fn from_ids(ids: Vec<ShowId>) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &[ShowId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn add(&mut self, selection: &[ShowId]) {
        self.ids.extend_from_slice(selection);
    }

    /// Removes the first occurrence of each selected id.
    pub fn remove(&mut self, selection: &[ShowId]) {
        for id in selection {
            if let Some(pos) = self.ids.iter().position(|x| x == id) {
                self.ids.remove(pos);
            }
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No json file at {}", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read whitelist from {}", path.display()))?;
        let entries: Vec<Value> = serde_json::from_str(&content)
            .with_context(|| format!("Malformed whitelist in {}", path.display()))?;

        let mut ids = Vec::with_capacity(entries.len());
        for entry in entries {
            match id_value(&entry) {
                Some(id) => ids.push(id),
                None => warn!("Ignoring whitelist entry that is not a show id: {}", entry),
            }
        }

        debug!("Loaded white list from {}", path.display());
        Ok(Self::from_ids(ids))
    }

    /// Writes the whitelist as pretty JSON, replacing the file in one rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut content = pretty_json(&self.ids)?;
        content.push('\n');

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = std::fs::File::create(&tmp)
                .with_context(|| format!("Could not write {}", tmp.display()))?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Could not replace {}", path.display()))?;

        debug!("Saved {} whitelist entries to {}", self.len(), path.display());
        Ok(())
    }
}

fn pretty_json(ids: &[ShowId]) -> Result<String> {
    use serde::Serialize;

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    ids.serialize(&mut ser)?;
    Ok(String::from_utf8(buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let list = Whitelist::load(&tmp.path().join("whitelist.json")).unwrap();
        assert!(list.is_empty());
    }

    #[test]
    fn save_then_load_is_identity() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("whitelist.json");

        let list = Whitelist::from_ids(vec![42, 7, 7, 1]);
        list.save(&path).unwrap();
        assert_eq!(Whitelist::load(&path).unwrap(), list);

        let reloaded = Whitelist::load(&path).unwrap();
        reloaded.save(&path).unwrap();
        assert_eq!(Whitelist::load(&path).unwrap(), list);
        assert!(!tmp.path().join("whitelist.json.tmp").exists());
    }

    #[test]
    fn saves_indented_json_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("whitelist.json");
        Whitelist::from_ids(vec![1, 2]).save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[\n    1,\n    2\n]\n");
    }

    #[test]
    fn numeric_strings_normalize_to_ids() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("whitelist.json");
        std::fs::write(&path, r#"["3", 4, "x", null]"#).unwrap();

        let list = Whitelist::load(&path).unwrap();
        assert_eq!(list.ids(), &[3, 4]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("whitelist.json");
        std::fs::write(&path, "{\"not\": \"an array\"}").unwrap();
        assert!(Whitelist::load(&path).is_err());
    }

    #[test]
    fn remove_drops_first_occurrence_only() {
        let mut list = Whitelist::from_ids(vec![1, 2, 1, 3]);
        list.remove(&[1, 9]);
        assert_eq!(list.ids(), &[2, 1, 3]);

        list.add(&[5, 6]);
        assert_eq!(list.ids(), &[2, 1, 3, 5, 6]);
        assert_eq!(list.len(), 5);
    }
}
