//! Connection locators: `scheme://provider:target`, `scheme://@name`, or a
//! bare path.
//!
//! ```text
//! gnc://sqlite:/home/me/books.db     SQLite file /home/me/books.db
//! sqlite:///home/me/books            SQLite file /home/me/books.db
//! gnc://@office                      named connection from the config file
//! /home/me/books.db                  SQLite file, default provider
//! gnc://pgsql:ledger                 recognized form, unsupported provider
//! ```

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use thiserror::Error;

use bookdb_sqlite::SQLITE_SUFFIX;

const SQLITE_PROVIDERS: [&str; 2] = ["sqlite", "sqlite3"];
const MEMORY_TARGET: &str = ":memory:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    #[error("empty connection locator")]
    Empty,
    #[error("connection name missing after '@' in {0}")]
    MissingName(String),
    #[error("no database target in {0}")]
    MissingTarget(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    Memory,
    /// `<dir>/<name>.db`; `name` never carries the suffix.
    File { dir: PathBuf, name: String },
}

impl SqliteTarget {
    fn from_target(target: &str) -> SqliteTarget {
        if target == MEMORY_TARGET {
            return SqliteTarget::Memory;
        }
        let path = Path::new(target);
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let suffix = format!(".{}", SQLITE_SUFFIX);
        let name = base.strip_suffix(&suffix).unwrap_or(&base).to_string();
        SqliteTarget::File { dir, name }
    }

    /// The file opened for this target, `None` for in-memory databases.
    pub fn path(&self) -> Option<PathBuf> {
        match self {
            SqliteTarget::Memory => None,
            SqliteTarget::File { dir, name } => {
                Some(dir.join(format!("{}.{}", name, SQLITE_SUFFIX)))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    /// A connection defined under `[connections]` in the config file.
    Named(String),
    Sqlite(SqliteTarget),
    /// Well-formed, but no backend exists for the provider.
    Unsupported { provider: String, target: String },
}

fn is_sqlite(provider: &str) -> bool {
    SQLITE_PROVIDERS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(provider))
}

impl Locator {
    pub fn parse(s: &str) -> Result<Locator, LocatorError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(LocatorError::Empty);
        }

        let Some((scheme, rest)) = s.split_once("://") else {
            return Ok(Locator::Sqlite(SqliteTarget::from_target(s)));
        };

        if let Some(name) = rest.strip_prefix('@') {
            if name.is_empty() {
                return Err(LocatorError::MissingName(s.to_string()));
            }
            return Ok(Locator::Named(name.to_string()));
        }

        let (provider, target) = match rest.split_once(':') {
            // A Windows drive letter or `:memory:` is not a provider.
            Some((provider, target)) if provider.len() > 1 => (provider, target),
            _ => (scheme, rest),
        };
        if target.is_empty() {
            return Err(LocatorError::MissingTarget(s.to_string()));
        }

        if is_sqlite(provider) {
            Ok(Locator::Sqlite(SqliteTarget::from_target(target)))
        } else if is_sqlite(scheme) {
            Ok(Locator::Sqlite(SqliteTarget::from_target(rest)))
        } else {
            Ok(Locator::Unsupported {
                provider: provider.to_string(),
                target: target.to_string(),
            })
        }
    }
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Named(name) => write!(f, "@{}", name),
            Locator::Sqlite(target) => match target.path() {
                Some(path) => write!(f, "sqlite://{}", path.display()),
                None => write!(f, "sqlite://{}", MEMORY_TARGET),
            },
            Locator::Unsupported { provider, target } => write!(f, "{}:{}", provider, target),
        }
    }
}
