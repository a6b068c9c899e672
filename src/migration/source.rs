//! Declared migrations: discovery from a directory or from embedded scripts

use crate::migration::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

pub(crate) const UP_SUFFIX: &str = ".up.sql";
pub(crate) const DOWN_SUFFIX: &str = ".down.sql";

static FILE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.]+$").expect("file name pattern is valid"));

/// Where the text of an up or down script lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptRef {
    /// A file, read when the migration is applied
    File(PathBuf),
    /// Text carried in memory (e.g. `include_str!`)
    Inline(Cow<'static, str>),
}

impl ScriptRef {
    /// Read the script text
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::NotFound` if a referenced file is missing and
    /// `MigrationError::Io` for other read failures.
    pub fn load(&self) -> Result<String, MigrationError> {
        match self {
            ScriptRef::File(path) => fs::read_to_string(path).map_err(MigrationError::io(path)),
            ScriptRef::Inline(text) => Ok(text.to_string()),
        }
    }
}

/// A declared migration: a unique, ordered name plus its two scripts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Sort key and identity, e.g. `1700000000000_create_users`
    pub name: String,
    pub up: ScriptRef,
    pub down: ScriptRef,
}

/// Produces the declared migrations, ascending by name
pub trait MigrationSource {
    /// # Errors
    ///
    /// `NotFound`, `InvalidName` or `Malformed` when the declared set cannot
    /// be read or is not a well-formed ordered sequence.
    fn list(&self) -> Result<Vec<Migration>, MigrationError>;
}

/// Migrations stored as `<name>.up.sql` / `<name>.down.sql` pairs in one directory
///
/// Only files ending in `.up.sql` or `.down.sql` are considered; everything
/// else (including subdirectories) is ignored. The byte-wise sort of the file
/// names is the migration order, so `<name>.down.sql` always precedes
/// `<name>.up.sql`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl MigrationSource for DirectorySource {
    fn list(&self) -> Result<Vec<Migration>, MigrationError> {
        if !self.dir.is_dir() {
            return Err(MigrationError::NotFound(format!(
                "migrations directory {} not found",
                self.dir.display()
            )));
        }

        let entries = fs::read_dir(&self.dir).map_err(MigrationError::io(&self.dir))?;

        let mut file_names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(MigrationError::io(&self.dir))?;
            let file_type = entry.file_type().map_err(MigrationError::io(entry.path()))?;
            if file_type.is_dir() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !(file_name.ends_with(UP_SUFFIX) || file_name.ends_with(DOWN_SUFFIX)) {
                continue;
            }
            if !FILE_NAME.is_match(&file_name) {
                return Err(MigrationError::InvalidName {
                    name: file_name,
                    reason: "only letters, digits, \"_\" and \".\" are allowed",
                });
            }
            file_names.push(file_name);
        }

        file_names.sort();
        pair_files(&self.dir, &file_names)
    }
}

/// Group sorted file names into down/up pairs
fn pair_files(dir: &Path, sorted: &[String]) -> Result<Vec<Migration>, MigrationError> {
    let mut migrations = Vec::with_capacity(sorted.len() / 2);
    let mut files = sorted.iter();

    while let Some(down_file) = files.next() {
        let Some(name) = down_file.strip_suffix(DOWN_SUFFIX) else {
            return Err(MigrationError::Malformed(format!(
                "no down script for \"{down_file}\""
            )));
        };
        if name.is_empty() {
            return Err(MigrationError::Malformed(format!(
                "\"{down_file}\" has no migration name"
            )));
        }

        let up_file = files
            .next()
            .filter(|up_file| up_file.strip_suffix(UP_SUFFIX) == Some(name))
            .ok_or_else(|| {
                MigrationError::Malformed(format!("no up script for \"{down_file}\""))
            })?;

        migrations.push(Migration {
            name: name.to_string(),
            up: ScriptRef::File(dir.join(up_file)),
            down: ScriptRef::File(dir.join(down_file)),
        });
    }

    Ok(migrations)
}

/// Migrations compiled into the program
///
/// ```
/// use pgshift::migration::{EmbeddedSource, MigrationSource};
///
/// let source = EmbeddedSource::new()
///     .with_migration("0001_users", "CREATE TABLE users (id INT);", "DROP TABLE users;")
///     .with_migration("0002_posts", "CREATE TABLE posts (id INT);", "DROP TABLE posts;");
///
/// let declared = source.list().unwrap();
/// assert_eq!(declared[1].name, "0002_posts");
/// ```
#[derive(Debug, Clone, Default)]
pub struct EmbeddedSource {
    migrations: Vec<Migration>,
}

impl EmbeddedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a migration; names must be added in ascending order
    pub fn with_migration(
        mut self,
        name: impl Into<String>,
        up: impl Into<Cow<'static, str>>,
        down: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.migrations.push(Migration {
            name: name.into(),
            up: ScriptRef::Inline(up.into()),
            down: ScriptRef::Inline(down.into()),
        });
        self
    }
}

impl MigrationSource for EmbeddedSource {
    fn list(&self) -> Result<Vec<Migration>, MigrationError> {
        if let Some(bad) = self.migrations.iter().find(|m| !FILE_NAME.is_match(&m.name)) {
            return Err(MigrationError::InvalidName {
                name: bad.name.clone(),
                reason: "only letters, digits, \"_\" and \".\" are allowed",
            });
        }
        if let Some(pair) = self.migrations.windows(2).find(|w| w[0].name >= w[1].name) {
            return Err(MigrationError::Malformed(format!(
                "\"{}\" is declared after \"{}\"; names must be unique and ascending",
                pair[1].name, pair[0].name
            )));
        }
        Ok(self.migrations.clone())
    }
}
