//! Creates empty up/down script pairs for a new migration

use crate::migration::source::{DOWN_SUFFIX, UP_SUFFIX};
use crate::migration::{Migration, MigrationError, ScriptRef};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs::{self, File};
use std::path::Path;
use std::time::SystemTime;

static LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("label pattern is valid"));

/// Create `<millis>_<label>.up.sql` and `<millis>_<label>.down.sql` in `dir`
///
/// The directory is created if needed. Existing files with the same names are
/// kept and only have their modification time bumped.
///
/// # Errors
///
/// Returns `MigrationError::InvalidName` for a label outside `[a-zA-Z0-9_]`
/// and `MigrationError::Io` if the directory or files cannot be created.
pub fn create_migration(dir: impl AsRef<Path>, label: &str) -> Result<Migration, MigrationError> {
    create_migration_at(dir, label, Utc::now())
}

/// [`create_migration`] with an explicit creation time
pub fn create_migration_at(
    dir: impl AsRef<Path>,
    label: &str,
    now: DateTime<Utc>,
) -> Result<Migration, MigrationError> {
    if !LABEL.is_match(label) {
        return Err(MigrationError::InvalidName {
            name: label.to_string(),
            reason: "labels may contain only letters, digits and \"_\"",
        });
    }

    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(MigrationError::io(dir))?;

    let name = format!("{}_{label}", now.timestamp_millis());
    let up = dir.join(format!("{name}{UP_SUFFIX}"));
    let down = dir.join(format!("{name}{DOWN_SUFFIX}"));
    touch(&up)?;
    touch(&down)?;

    tracing::info!(migration = %name, dir = %dir.display(), "Created migration");

    Ok(Migration {
        name,
        up: ScriptRef::File(up),
        down: ScriptRef::File(down),
    })
}

fn touch(path: &Path) -> Result<(), MigrationError> {
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .map_err(MigrationError::io(path))?;
    file.set_modified(SystemTime::now())
        .map_err(MigrationError::io(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration::{DirectorySource, MigrationSource};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_creates_empty_pair() {
        let dir = TempDir::new().unwrap();
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        let migration = create_migration_at(dir.path(), "create_users", now).unwrap();

        assert_eq!(migration.name, "1700000000123_create_users");
        assert_eq!(migration.up.load().unwrap(), "");
        assert_eq!(migration.down.load().unwrap(), "");
        assert!(dir.path().join("1700000000123_create_users.up.sql").is_file());
        assert!(dir.path().join("1700000000123_create_users.down.sql").is_file());
    }

    #[test]
    fn test_created_pair_is_listed() {
        let dir = TempDir::new().unwrap();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        create_migration_at(dir.path(), "a", now).unwrap();

        let declared = DirectorySource::new(dir.path()).list().unwrap();
        assert_eq!(declared.len(), 1);
        assert_eq!(declared[0].name, "1700000000000_a");
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("db").join("migrations");

        create_migration(&nested, "init").unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_keeps_existing_content() {
        let dir = TempDir::new().unwrap();
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        fs::write(dir.path().join("1700000000000_a.up.sql"), "CREATE TABLE a ();").unwrap();

        let migration = create_migration_at(dir.path(), "a", now).unwrap();
        assert_eq!(migration.up.load().unwrap(), "CREATE TABLE a ();");
    }

    #[test]
    fn test_rejects_bad_labels() {
        let dir = TempDir::new().unwrap();
        for label in ["", "add-users", "a.b", "with space"] {
            assert!(
                matches!(
                    create_migration(dir.path(), label),
                    Err(MigrationError::InvalidName { .. })
                ),
                "Should reject: {label:?}"
            );
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
