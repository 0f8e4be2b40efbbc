//! Command-line and environment configuration.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Git Browser - Serve every repository below a directory as a JSON API
#[derive(Parser, Debug, Clone)]
#[command(name = "git-browser")]
#[command(about = "A read-only HTTP browser for git repositories", long_about = None)]
pub struct ServerConfig {
    /// Directory holding the repositories (may itself be a repository)
    #[arg(value_name = "ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8088)]
    pub port: u16,

    /// Address to bind to
    #[arg(long = "bind", env = "BIND_ADDR", default_value = "127.0.0.1")]
    pub bind_addr: IpAddr,

    /// Branch shown when a URL names no revision
    #[arg(long, value_name = "BRANCH", default_value = "master")]
    pub default_branch: String,

    /// Upper bound on a single history walk, in milliseconds
    #[arg(long, value_name = "MS", default_value_t = 10_000)]
    pub history_timeout_ms: u64,

    /// Open repositories on every request instead of caching handles
    #[arg(long)]
    pub no_cache: bool,
}

impl ServerConfig {
    pub fn history_timeout(&self) -> Duration {
        Duration::from_millis(self.history_timeout_ms)
    }

    /// Defaults for everything except the root directory.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            port: 8088,
            bind_addr: IpAddr::from([127, 0, 0, 1]),
            default_branch: "master".to_string(),
            history_timeout_ms: 10_000,
            no_cache: false,
        }
    }
}
