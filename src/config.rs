use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use url::Url;

pub const DEFAULT_MODEL: &str = "deepseek-r1:8b";

#[derive(Debug, Clone, Parser)]
#[command(name = "chat-relay", version, about)]
pub struct Config {
    /// SQLite database holding chats and messages
    #[arg(long, env = "CHAT_RELAY_DATABASE", default_value = "chat_histories.db", global = true)]
    pub database: PathBuf,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve(ServeArgs),

    /// Copy chats from the legacy multi-chat JSON file into the database
    ImportHistories {
        #[arg(long, env = "CHAT_RELAY_HISTORIES_FILE", default_value = "chat_histories.json")]
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Parser)]
pub struct ServeArgs {
    #[arg(long, env = "CHAT_RELAY_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Base URL of the Ollama server
    #[arg(long, env = "CHAT_RELAY_UPSTREAM_URL", default_value = "http://localhost:11434")]
    pub upstream_url: Url,

    /// Model used when a request does not name one
    #[arg(long, env = "CHAT_RELAY_DEFAULT_MODEL", default_value = DEFAULT_MODEL)]
    pub default_model: String,

    /// Single-conversation JSON document behind /api/history
    #[arg(long, env = "CHAT_RELAY_HISTORY_FILE", default_value = "chat_history.json")]
    pub history_file: PathBuf,

    #[arg(long, env = "CHAT_RELAY_INDEX_PAGE", default_value = "static/index.html")]
    pub index_page: PathBuf,
}

impl Config {
    /// The selected command, falling back to `serve` with its defaults.
    pub fn command(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Serve(ServeArgs::parse_from(["serve"])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_serve() {
        let config = Config::parse_from(["chat-relay"]);
        assert_eq!(config.database, PathBuf::from("chat_histories.db"));
        match config.command() {
            Command::Serve(args) => {
                assert_eq!(args.bind.port(), 5000);
                assert_eq!(args.default_model, DEFAULT_MODEL);
                assert_eq!(args.upstream_url.as_str(), "http://localhost:11434/");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_import_subcommand() {
        let config = Config::parse_from([
            "chat-relay",
            "--database",
            "/tmp/x.db",
            "import-histories",
            "--file",
            "old.json",
        ]);
        assert_eq!(config.database, PathBuf::from("/tmp/x.db"));
        assert!(matches!(
            config.command(),
            Command::ImportHistories { file } if file == PathBuf::from("old.json")
        ));
    }

    #[test]
    fn test_rejects_bad_upstream_url() {
        let result = Config::try_parse_from(["chat-relay", "serve", "--upstream-url", "not a url"]);
        assert!(result.is_err());
    }
}
