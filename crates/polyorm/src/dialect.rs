//! SQL dialects and their capability sets.
//!
//! The dialect is always supplied explicitly (builder construction, executor,
//! or [`OrmConfig`](crate::OrmConfig)). Names are matched case-insensitively
//! against a fixed list; there is no guessing from connection strings.

use crate::condition::split_placeholders;
use crate::error::OrmError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A supported SQL dialect.
///
/// Deserializes through [`FromStr`], so configuration files accept the same
/// case-insensitive names and aliases as `str::parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL and MariaDB.
    MySql,
    /// PostgreSQL.
    Postgres,
    /// SQLite 3.35+.
    Sqlite,
}

/// How a dialect spells an upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertSyntax {
    /// `INSERT IGNORE` / `ON DUPLICATE KEY UPDATE col = VALUES(col)`
    OnDuplicateKey,
    /// `ON CONFLICT (targets) DO NOTHING | DO UPDATE SET col = excluded.col`
    OnConflict,
}

impl Dialect {
    pub const ALL: [Dialect; 3] = [Dialect::MySql, Dialect::Postgres, Dialect::Sqlite];

    /// Identifier quote character.
    pub const fn quote_char(self) -> char {
        match self {
            Dialect::Postgres => '"',
            Dialect::MySql | Dialect::Sqlite => '`',
        }
    }

    /// Whether `INSERT ... RETURNING` is available.
    pub const fn supports_returning(self) -> bool {
        matches!(self, Dialect::Postgres | Dialect::Sqlite)
    }

    /// Whether `OFFSET` may appear without a `LIMIT`.
    pub const fn supports_offset_without_limit(self) -> bool {
        matches!(self, Dialect::Postgres)
    }

    /// Literal used as LIMIT when only an OFFSET was requested.
    pub const fn max_rows_limit(self) -> &'static str {
        match self {
            Dialect::MySql => "18446744073709551615",
            Dialect::Sqlite => "-1",
            Dialect::Postgres => "ALL",
        }
    }

    pub const fn upsert_syntax(self) -> UpsertSyntax {
        match self {
            Dialect::MySql => UpsertSyntax::OnDuplicateKey,
            Dialect::Postgres | Dialect::Sqlite => UpsertSyntax::OnConflict,
        }
    }

    /// Whether multi-row INSERT can report one generated id per row through
    /// the "last insert id" capability (ids are handed out consecutively).
    pub const fn sequential_insert_ids(self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Quote an identifier, one dot-separated segment at a time.
    ///
    /// `*`, numeric literals, names that already start with a quote character
    /// and anything containing parentheses, string quotes or whitespace are
    /// passed through untouched. A quote character inside a segment is
    /// doubled.
    pub fn quote_ident(self, ident: &str) -> String {
        let mut out = String::with_capacity(ident.len() + 4);
        self.write_ident(&mut out, ident);
        out
    }

    pub(crate) fn write_ident(self, out: &mut String, ident: &str) {
        if ident.is_empty() || is_passthrough(ident) {
            out.push_str(ident);
            return;
        }
        let q = self.quote_char();
        for (i, segment) in ident.split('.').enumerate() {
            if i > 0 {
                out.push('.');
            }
            if segment == "*" {
                out.push('*');
                continue;
            }
            out.push(q);
            for c in segment.chars() {
                if c == q {
                    out.push(q);
                }
                out.push(c);
            }
            out.push(q);
        }
    }

    /// Quote and join a column list with `", "`.
    pub fn quote_list<S: AsRef<str>>(self, idents: &[S]) -> String {
        let mut out = String::new();
        for (i, ident) in idents.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_ident(&mut out, ident.as_ref());
        }
        out
    }

    /// Rewrite `?` placeholders into the driver's native form.
    ///
    /// PostgreSQL drivers expect `$1, $2, ...`; MySQL and SQLite take `?` as is.
    pub fn native_placeholders(self, sql: &str) -> String {
        match self {
            Dialect::MySql | Dialect::Sqlite => sql.to_string(),
            Dialect::Postgres => {
                let pieces = split_placeholders(sql);
                let mut out = String::with_capacity(sql.len() + pieces.len() * 2);
                for (i, piece) in pieces.iter().enumerate() {
                    if i > 0 {
                        out.push('$');
                        out.push_str(&i.to_string());
                    }
                    out.push_str(piece);
                }
                out
            }
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }
}

fn is_passthrough(ident: &str) -> bool {
    ident == "*"
        || ident.bytes().all(|b| b.is_ascii_digit())
        || ident.starts_with(['"', '`'])
        || ident
            .chars()
            .any(|c| matches!(c, '(' | ')' | '\'' | '[') || c.is_whitespace())
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            "sqlite" => Ok(Dialect::Sqlite),
            other => Err(OrmError::invalid_config(format!(
                "unknown SQL dialect '{other}' (expected mysql, postgres or sqlite)"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for Dialect {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(Dialect::MySql.quote_ident("users"), "`users`");
        assert_eq!(Dialect::Postgres.quote_ident("public.users"), "\"public\".\"users\"");
        assert_eq!(Dialect::Sqlite.quote_ident("u.*"), "`u`.*");
        assert_eq!(Dialect::Postgres.quote_ident("*"), "*");
        assert_eq!(Dialect::Postgres.quote_ident("COUNT(*)"), "COUNT(*)");
        assert_eq!(Dialect::Postgres.quote_ident("\"Mixed\""), "\"Mixed\"");
        assert_eq!(Dialect::MySql.quote_ident("users u"), "users u");
        assert_eq!(Dialect::MySql.quote_ident("1"), "1");
    }

    #[test]
    fn test_quote_ident_escapes_quote_char() {
        assert_eq!(Dialect::Postgres.quote_ident("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::MySql.quote_ident("a`b"), "`a``b`");
        assert_eq!(Dialect::Sqlite.quote_ident("t.x`y"), "`t`.`x``y`");
        assert_eq!(Dialect::Postgres.quote_ident("weird`name"), "\"weird`name\"");
        assert_eq!(Dialect::MySql.quote_ident("`already`"), "`already`");
    }

    #[test]
    fn test_serde_matches_from_str() {
        let d: Dialect = serde_json::from_str(r#""PostgreSQL""#).unwrap();
        assert_eq!(d, Dialect::Postgres);
        let d: Dialect = serde_json::from_str(r#""MariaDB""#).unwrap();
        assert_eq!(d, Dialect::MySql);
        assert!(serde_json::from_str::<Dialect>(r#""oracle""#).is_err());
        assert_eq!(serde_json::to_string(&Dialect::Sqlite).unwrap(), r#""sqlite""#);
    }

    #[test]
    fn test_native_placeholders() {
        let sql = "SELECT * FROM t WHERE a = ? AND b = '?' AND c = ?";
        assert_eq!(
            Dialect::Postgres.native_placeholders(sql),
            "SELECT * FROM t WHERE a = $1 AND b = '?' AND c = $2"
        );
        assert_eq!(Dialect::MySql.native_placeholders(sql), sql);
    }

    #[test]
    fn test_from_str_is_exact() {
        assert_eq!("PostgreSQL".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert_eq!("mariadb".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert!("my-sqlite-conn".parse::<Dialect>().is_err());
    }

    #[test]
    fn test_capabilities() {
        assert!(!Dialect::MySql.supports_returning());
        assert!(Dialect::Sqlite.supports_returning());
        assert!(Dialect::Postgres.supports_offset_without_limit());
        assert_eq!(Dialect::Sqlite.max_rows_limit(), "-1");
        assert_eq!(Dialect::MySql.upsert_syntax(), UpsertSyntax::OnDuplicateKey);
    }
}
