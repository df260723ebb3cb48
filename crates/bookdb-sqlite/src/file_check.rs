use std::{fs::File, io::Read, path::Path};

/// File suffix the SQLite provider appends to every database name.
pub const SQLITE_SUFFIX: &str = "db";

/// Leading bytes of every SQLite database file.
pub const SQLITE_HEADER: &[u8] = b"SQLite format";

/// Decide whether a file path can be handed to the SQLite provider.
///
/// A path that does not exist yet is always acceptable. An existing file is
/// acceptable only if it carries the `.db` suffix and the SQLite header.
pub fn check_sqlite_file(path: &Path) -> bool {
    if path.as_os_str().is_empty() {
        return false;
    }
    if !path.exists() {
        return true;
    }

    let has_suffix = path.extension().map_or(false, |ext| ext == SQLITE_SUFFIX);
    if !has_suffix {
        tracing::debug!(path = %path.display(), "existing file without database suffix rejected");
        return false;
    }

    let mut header = [0u8; 50];
    let read = match File::open(path).and_then(|mut f| f.read(&mut header)) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unable to read file header");
            return false;
        }
    };
    header[..read].starts_with(SQLITE_HEADER)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn missing_files_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_sqlite_file(&dir.path().join("new.db")));
        assert!(check_sqlite_file(&dir.path().join("new.gnucash")));
    }

    #[test]
    fn foreign_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("notes.txt");
        File::create(&plain).unwrap().write_all(b"hello").unwrap();
        assert!(!check_sqlite_file(&plain));

        let fake = dir.path().join("fake.db");
        File::create(&fake).unwrap().write_all(b"<?xml version=\"1.0\"?>").unwrap();
        assert!(!check_sqlite_file(&fake));
    }

    #[test]
    fn sqlite_files_with_suffix_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER);").unwrap();
        drop(conn);
        assert!(check_sqlite_file(&path));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(!check_sqlite_file(Path::new("")));
    }
}
