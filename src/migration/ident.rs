//! Validated SQL identifiers for the history table
//!
//! Schema and table names come from configuration and end up inside statement
//! text, so they are checked once, here, against an allow-list and only ever
//! rendered in double-quoted form.

use crate::migration::MigrationError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::str::FromStr;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("identifier pattern is valid"));

/// PostgreSQL truncates identifiers longer than `NAMEDATALEN - 1` bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

/// A schema or table name that matched `^[A-Za-z0-9_]+$`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidConfig` for empty, over-long or
    /// non-allow-listed names.
    pub fn new(raw: &str) -> Result<Self, MigrationError> {
        if raw.len() > MAX_IDENTIFIER_LEN {
            return Err(MigrationError::InvalidConfig(format!(
                "identifier \"{raw}\" is longer than {MAX_IDENTIFIER_LEN} bytes"
            )));
        }
        if !IDENTIFIER.is_match(raw) {
            return Err(MigrationError::InvalidConfig(format!(
                "identifier \"{raw}\" may contain only letters, digits and \"_\""
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The form used inside statements: `"name"`
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl FromStr for Identifier {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Schema-qualified location of the history table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualifiedTable {
    schema: Identifier,
    table: Identifier,
}

impl QualifiedTable {
    pub fn new(schema: Identifier, table: Identifier) -> Self {
        Self { schema, table }
    }

    /// Validate both parts in one go
    ///
    /// # Errors
    ///
    /// Returns `MigrationError::InvalidConfig` if either part is rejected.
    pub fn parse(schema: &str, table: &str) -> Result<Self, MigrationError> {
        Ok(Self::new(Identifier::new(schema)?, Identifier::new(table)?))
    }

    pub fn schema(&self) -> &Identifier {
        &self.schema
    }

    pub fn table(&self) -> &Identifier {
        &self.table
    }

    /// `"schema"."table"`
    pub fn quoted(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }

    /// Name of the primary key constraint, quoted: `"table_pk"`
    pub fn primary_key_name(&self) -> String {
        format!("\"{}_pk\"", self.table.as_str())
    }
}

impl fmt::Display for QualifiedTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}
