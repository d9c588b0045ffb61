use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::boards::BoardDirectory;
use crate::error::TrelloError;
use crate::parser::extract::TagConvention;
use crate::trello::{TrelloClient, DEFAULT_BASE_URL};

/// Defaults, then the optional config file, then `TRELLO_*` / `DOCKET_*` env vars.
#[derive(Clone, Deserialize)]
pub struct Settings {
    pub listen_addr: SocketAddr,
    pub convention: TagConvention,
    pub trello_base_url: String,
    #[serde(default)]
    pub trello_api_key: String,
    #[serde(default)]
    pub trello_api_token: String,
    /// Owner → board id. Empty means the built-in table.
    #[serde(default)]
    pub boards: BTreeMap<String, String>,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("listen_addr", "0.0.0.0:8080")?
            .set_default("convention", "responsible")?
            .set_default("trello_base_url", DEFAULT_BASE_URL)?;
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder
            .add_source(Environment::with_prefix("TRELLO").keep_prefix(true))
            .add_source(Environment::with_prefix("DOCKET"))
            .build()?
            .try_deserialize()
    }

    pub fn board_directory(&self) -> BoardDirectory {
        if self.boards.is_empty() {
            BoardDirectory::default()
        } else {
            BoardDirectory::new(&self.boards)
        }
    }

    pub fn trello_client(&self) -> Result<TrelloClient, TrelloError> {
        TrelloClient::new(
            &self.trello_base_url,
            &self.trello_api_key,
            &self.trello_api_token,
        )
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &str| if s.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("Settings")
            .field("listen_addr", &self.listen_addr)
            .field("convention", &self.convention)
            .field("trello_base_url", &self.trello_base_url)
            .field("trello_api_key", &redact(&self.trello_api_key))
            .field("trello_api_token", &redact(&self.trello_api_token))
            .field("boards", &self.boards)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    fn from_toml(toml: &str) -> Settings {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        Settings::load(Some(file.path())).unwrap()
    }

    #[test]
    #[serial]
    fn file_overrides_defaults() {
        let s = from_toml(
            "listen_addr = \"127.0.0.1:9000\"\nconvention = \"board_name\"\n\n[boards]\nbia = \"5f0a\"\ncaio = \"6e1b\"\n",
        );
        assert_eq!(s.listen_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(s.convention, TagConvention::BoardName);

        let dir = s.board_directory();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.lookup("BIA"), Some("5f0a"));
        assert_eq!(dir.lookup("ANA"), None);
    }

    #[test]
    #[serial]
    fn empty_board_table_uses_builtin() {
        let s = from_toml("convention = \"responsible\"\n");
        assert_eq!(s.board_directory(), BoardDirectory::default());
    }

    #[test]
    #[serial]
    fn debug_hides_credentials() {
        let mut s = from_toml("");
        s.trello_api_key = "abc".into();
        s.trello_api_token = "secret-token".into();
        let shown = format!("{:?}", s);
        assert!(!shown.contains("secret-token"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn env_overrides_file() {
        std::env::set_var("TRELLO_API_KEY", "env-key");
        std::env::set_var("TRELLO_API_TOKEN", "env-token");
        std::env::set_var("DOCKET_LISTEN_ADDR", "127.0.0.1:7070");

        let s = from_toml("listen_addr = \"127.0.0.1:9000\"\ntrello_api_key = \"file-key\"\n");

        std::env::remove_var("TRELLO_API_KEY");
        std::env::remove_var("TRELLO_API_TOKEN");
        std::env::remove_var("DOCKET_LISTEN_ADDR");

        assert_eq!(s.listen_addr, "127.0.0.1:7070".parse().unwrap());
        assert_eq!(s.trello_api_key, "env-key");
        assert_eq!(s.trello_api_token, "env-token");
        assert!(s.trello_client().is_ok());
    }
}
