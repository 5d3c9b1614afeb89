//! Configuration: TOML file plus CLI overrides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::Error;

/// Which relational backend to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Postgres,
    Mysql,
    Sqlite,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Postgres => "postgres",
            BackendKind::Mysql => "mysql",
            BackendKind::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(BackendKind::Postgres),
            "mysql" => Ok(BackendKind::Mysql),
            "sqlite" => Ok(BackendKind::Sqlite),
            other => Err(Error::Config(format!("unknown database type: {other}"))),
        }
    }
}

/// TLS behavior for the backend connection.
///
/// `Enable` encrypts but skips certificate verification; that is a
/// deliberate, insecure escape hatch for lab setups. `Require` verifies
/// the chain and pins the server name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TlsMode {
    #[default]
    Disable,
    Enable,
    Require,
}

impl FromStr for TlsMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "disable" => Ok(TlsMode::Disable),
            "enable" => Ok(TlsMode::Enable),
            "require" => Ok(TlsMode::Require),
            other => Err(Error::Config(format!("unknown tls mode: {other}"))),
        }
    }
}

/// Connection parameters for one backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub backend: BackendKind,
    /// Host for postgres/mysql, file path for sqlite.
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: String,
    #[serde(default)]
    pub tls_mode: TlsMode,
    #[serde(default)]
    pub tls_ca_cert: Option<PathBuf>,
}

impl DatabaseConfig {
    /// Sanity-check the parts every backend needs before a connection
    /// attempt is made.
    pub fn validate(&self) -> crate::Result<()> {
        match self.backend {
            BackendKind::Sqlite => {
                if self.address.is_empty() {
                    return Err(Error::Config("no sqlite file path set".to_string()));
                }
            }
            BackendKind::Postgres | BackendKind::Mysql => {
                if self.database.is_empty() {
                    return Err(Error::Config("no database set".to_string()));
                }
            }
        }
        Ok(())
    }
}

/// On-disk config file shape. Everything is optional; CLI flags win.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphmemConfig {
    pub database: Option<DatabaseConfig>,
    pub http_bind: Option<String>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("graphmem.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<GraphmemConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: GraphmemConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("postgres".parse::<BackendKind>().unwrap(), BackendKind::Postgres);
        assert_eq!("mysql".parse::<BackendKind>().unwrap(), BackendKind::Mysql);
        assert_eq!("sqlite".parse::<BackendKind>().unwrap(), BackendKind::Sqlite);
        assert!(matches!(
            "oracle".parse::<BackendKind>(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_tls_mode_parse() {
        assert_eq!("".parse::<TlsMode>().unwrap(), TlsMode::Disable);
        assert_eq!("enable".parse::<TlsMode>().unwrap(), TlsMode::Enable);
        assert_eq!("require".parse::<TlsMode>().unwrap(), TlsMode::Require);
        assert!("tsl".parse::<TlsMode>().is_err());
    }

    #[test]
    fn test_validate_requires_database_name() {
        let cfg = DatabaseConfig {
            backend: BackendKind::Postgres,
            address: "localhost".to_string(),
            port: Some(5432),
            user: None,
            password: None,
            database: String::new(),
            tls_mode: TlsMode::Disable,
            tls_ca_cert: None,
        };
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_config_file_roundtrip() {
        let toml_src = r#"
            http_bind = "0.0.0.0:5432"

            [database]
            type = "sqlite"
            address = "graphmem.db"
        "#;
        let cfg: GraphmemConfig = toml::from_str(toml_src).unwrap();
        let db = cfg.database.unwrap();
        assert_eq!(db.backend, BackendKind::Sqlite);
        assert_eq!(db.address, "graphmem.db");
        assert_eq!(db.tls_mode, TlsMode::Disable);
    }
}
