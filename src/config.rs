use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

pub const CONFIG_FILE: &str = "config.json";
pub const WHITELIST_FILE: &str = "whitelist.json";
pub const LOG_FILE: &str = "EpCleansing.log";

/// Directory holding the config, whitelist and log files.
#[derive(Debug, Clone)]
pub struct AppPaths {
    base: PathBuf,
}

impl AppPaths {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn beside_executable() -> Result<Self> {
        let exe = std::env::current_exe().context("could not locate the running executable")?;
        let exe = exe.canonicalize().unwrap_or(exe);
        match exe.parent() {
            Some(dir) => Ok(Self::new(dir)),
            None => bail!("executable has no parent directory: {}", exe.display()),
        }
    }

    pub fn config(&self) -> PathBuf {
        self.base.join(CONFIG_FILE)
    }

    pub fn whitelist(&self) -> PathBuf {
        self.base.join(WHITELIST_FILE)
    }

    pub fn log(&self) -> PathBuf {
        self.base.join(LOG_FILE)
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(rename = "kodiPaths")]
    pub kodi_paths: HashMap<String, Vec<String>>,

    #[serde(rename = "dbNames")]
    pub db_names: Vec<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            bail!("Could not load config from {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config from {}", path.display()))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Malformed config in {}", path.display()))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Finds the Kodi database file for the platform we are running on.
    pub fn resolve_database(&self) -> Result<PathBuf> {
        self.resolve_database_for(&platform_name())
    }

    pub fn resolve_database_for(&self, platform: &str) -> Result<PathBuf> {
        let candidates = match self.kodi_paths.get(platform) {
            Some(c) if !c.is_empty() => c,
            _ => bail!("No Kodi data directory configured for platform {}", platform),
        };

        let mut data_dir = None;
        for candidate in candidates {
            let expanded = expand_path(candidate);
            if expanded.is_dir() {
                debug!("Kodi's data directory exists: {}", expanded.display());
                data_dir = Some(expanded);
                break;
            }
            error!("Kodi's data directory could not be found: {}", expanded.display());
        }
        let Some(data_dir) = data_dir else {
            bail!("None of the configured Kodi data directories exist");
        };

        if self.db_names.is_empty() {
            bail!("No database name configured in dbNames");
        }

        for name in &self.db_names {
            let db_path = data_dir.join(name);
            if db_path.is_file() {
                debug!("Kodi's database exists: {}", db_path.display());
                return Ok(db_path);
            }
            error!("Kodi's database could not be found: {}", db_path.display());
        }

        bail!("No configured Kodi database exists in {}", data_dir.display())
    }
}

/// Platform key used in `kodiPaths`.
pub fn platform_name() -> String {
    match std::env::consts::OS {
        "linux" => "Linux".to_string(),
        "windows" => "Windows".to_string(),
        "macos" => "Darwin".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

pub fn expand_path(raw: &str) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(expand_percent_vars(raw))
    } else {
        PathBuf::from(expand_dollar_vars(&expand_home(raw)))
    }
}

fn expand_home(raw: &str) -> String {
    let Some(rest) = raw.strip_prefix('~') else {
        return raw.to_string();
    };

    let (user, tail) = match rest.find('/') {
        Some(pos) => (&rest[..pos], &rest[pos + 1..]),
        None => (rest, ""),
    };
    let home = if user.is_empty() {
        dirs::home_dir()
    } else {
        user_home(user, Path::new("/etc/passwd"))
    };

    match home {
        Some(home) if tail.is_empty() => home.to_string_lossy().into_owned(),
        Some(home) => home.join(tail).to_string_lossy().into_owned(),
        None => raw.to_string(),
    }
}

/// Home directory of `user` according to a passwd-format file.
fn user_home(user: &str, passwd: &Path) -> Option<PathBuf> {
    let content = std::fs::read_to_string(passwd).ok()?;
    content.lines().find_map(|line| {
        let fields: Vec<&str> = line.split(':').collect();
        (fields.len() >= 6 && fields[0] == user).then(|| PathBuf::from(fields[5]))
    })
}

fn expand_dollar_vars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        let (name, consumed) = if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) => (&braced[..end], end + 2),
                None => ("", 0),
            }
        } else {
            let end = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            (&after[..end], end)
        };

        match std::env::var(name) {
            Ok(value) if !name.is_empty() => out.push_str(&value),
            _ => out.push_str(&rest[pos..pos + 1 + consumed]),
        }
        rest = &after[consumed..];
    }

    out.push_str(rest);
    out
}

fn expand_percent_vars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) => {
                let name = &after[..end];
                match std::env::var(name) {
                    Ok(value) if !name.is_empty() => out.push_str(&value),
                    _ => out.push_str(&rest[start..start + end + 2]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}
