//! Backend selection and connection parameters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which backend to construct, and how to reach it.
///
/// Internally tagged by `backend`, so a TOML table looks like:
///
/// ```toml
/// backend = "sqlite"
/// path = "/var/lib/fixity"
/// name = "fixity.db"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Process-local map; nothing is persisted.
    #[default]
    Memory,
    Sqlite(SqliteConfig),
    Postgres(PostgresConfig),
}

/// A single database file, `path/name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Directory containing the database file. Must already exist.
    #[serde(deserialize_with = "lenient::path")]
    pub path: PathBuf,
    /// File name of the database inside `path`.
    #[serde(deserialize_with = "lenient::string")]
    pub name: String,
}

impl SqliteConfig {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self { path: path.into(), name: name.into() }
    }

    pub fn file(&self) -> PathBuf {
        self.path.join(&self.name)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    #[serde(deserialize_with = "lenient::string")]
    pub host: String,
    #[serde(default = "PostgresConfig::default_port")]
    pub port: u16,
    #[serde(deserialize_with = "lenient::string")]
    pub dbname: String,
    #[serde(deserialize_with = "lenient::string")]
    pub user: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub password: String,
}

impl PostgresConfig {
    const fn default_port() -> u16 {
        5432
    }

    pub fn new(
        host: impl Into<String>,
        dbname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: Self::default_port(),
            dbname: dbname.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

// Keep the password out of logs and error output.
impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Text fields that also accept numbers and booleans.
///
/// Environment providers type `FIXITY_CACHE__PASSWORD=123456` as an integer,
/// and the internally tagged [`BackendConfig`] sees the value before any
/// coercion back to text could happen.
mod lenient {
    use serde::Deserializer;
    use serde::de::{Error, Visitor};
    use std::fmt;
    use std::path::PathBuf;

    struct Text;

    impl Visitor<'_> for Text {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string")
        }

        fn visit_str<E: Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_owned())
        }

        fn visit_string<E: Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_u64<E: Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_bool<E: Error>(self, v: bool) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    pub(super) fn string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        deserializer.deserialize_any(Text)
    }

    pub(super) fn path<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PathBuf, D::Error> {
        string(deserializer).map(PathBuf::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_file_joins_path_and_name() {
        let config = SqliteConfig::new("/tmp", "tacl-verifier.db");
        assert_eq!(config.file(), PathBuf::from("/tmp/tacl-verifier.db"));
    }

    #[test]
    fn test_postgres_debug_redacts_password() {
        let config = PostgresConfig::new("localhost", "apilib_db", "apilib_user", "hunter2");
        let debug = format!("{config:?}");
        assert!(debug.contains("apilib_user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_numbers_are_accepted_as_text() {
        use serde::de::value::{Error, I64Deserializer, StrDeserializer, U64Deserializer};

        let text = lenient::string(U64Deserializer::<Error>::new(123456)).unwrap();
        assert_eq!(text, "123456");
        let text = lenient::string(StrDeserializer::<Error>::new("hunter2")).unwrap();
        assert_eq!(text, "hunter2");
        let path = lenient::path(I64Deserializer::<Error>::new(2024)).unwrap();
        assert_eq!(path, PathBuf::from("2024"));
    }

    #[test]
    fn test_default_backend_is_memory() {
        assert_eq!(BackendConfig::default(), BackendConfig::Memory);
    }
}
