//! Connection configuration

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Settings for a MySQL-family server.
///
/// Deserializes from any serde format; missing keys take the defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub username: String,
    pub password: String,
    /// `host:port`
    pub address: String,
    pub database: String,
    pub charset: String,
    pub connect_timeout_secs: u64,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            password: String::new(),
            address: "127.0.0.1:3306".to_string(),
            database: String::new(),
            charset: "utf8".to_string(),
            connect_timeout_secs: 5,
            max_connections: 10,
        }
    }
}

impl DatabaseConfig {
    /// Check the settings a connection cannot do without
    pub fn validate(&self) -> Result<()> {
        if self.username.trim().is_empty() {
            return Err(Error::config("username must not be empty"));
        }
        if self.database.trim().is_empty() {
            return Err(Error::config("database must not be empty"));
        }
        match self.address.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {}
            _ => {
                return Err(Error::config(format!(
                    "address must be host:port, got '{}'",
                    self.address
                )))
            }
        }
        if self.max_connections == 0 {
            return Err(Error::config("max_connections must be at least 1"));
        }
        Ok(())
    }

    /// Connection URL for the sqlx MySQL driver
    pub fn mysql_url(&self) -> String {
        self.url_with_password(&percent_encode(&self.password))
    }

    /// [`mysql_url`](Self::mysql_url) with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        let mask = if self.password.is_empty() { "" } else { "***" };
        self.url_with_password(mask)
    }

    fn url_with_password(&self, password: &str) -> String {
        format!(
            "mysql://{}:{}@{}/{}?charset={}",
            percent_encode(&self.username),
            password,
            self.address,
            self.database,
            self.charset
        )
    }
}

// RFC 3986 unreserved characters stay verbatim in userinfo
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn percent_encode(input: &str) -> String {
    utf8_percent_encode(input, USERINFO).to_string()
}
