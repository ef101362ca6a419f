//! Destination table identifiers.

use serde::Serialize;
use std::fmt;

/// Maximum identifier length in bytes accepted by PostgreSQL (NAMEDATALEN - 1).
pub const MAX_IDENTIFIER_BYTES: usize = 63;

/// Name of a destination table in the spatial store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TableName(String);

impl TableName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted identifier, safe to interpolate into SQL.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_escapes_embedded_quotes() {
        assert_eq!(TableName::new("geojson_a").quoted(), "\"geojson_a\"");
        assert_eq!(TableName::new("we\"ird").quoted(), "\"we\"\"ird\"");
    }
}
