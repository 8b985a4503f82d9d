//! # config
//!
//! why: let deployments choose where the log lives and which port serves it
//! relations: parsed in main.rs, consumed by lib.rs::run
//! what: Args (cli flags with env fallbacks), ServerConfig

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use worklog_storage::RetryPolicy;

pub const DEFAULT_PORT: u16 = 3000;
pub const LOG_FILE_NAME: &str = "log.json";
pub const PUBLIC_DIR_NAME: &str = "public";

/// landing page shipped with this crate, used when nothing sits next to the executable
const BUNDLED_PUBLIC_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/public");

#[derive(Parser, Debug, Clone)]
#[command(name = "worklog-server", version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
    /// Address to bind
    #[arg(long, env = "WORKLOG_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "WORKLOG_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Log file location (default: log.json next to the executable)
    #[arg(long = "log-file", env = "WORKLOG_LOG_FILE", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Directory of static files served at / (default: public next to the executable,
    /// else the landing page bundled with the source tree)
    #[arg(long = "public-dir", env = "WORKLOG_PUBLIC_DIR", value_name = "PATH")]
    pub public_dir: Option<PathBuf>,

    /// Lock retries before a save or clear gives up
    #[arg(long = "lock-retries", env = "WORKLOG_LOCK_RETRIES", default_value_t = 5)]
    pub lock_retries: u32,

    /// Optional log filter (e.g. info, debug), overrides RUST_LOG
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,
}

/// fully resolved server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub log_file: PathBuf,
    pub public_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl ServerConfig {
    /// settings rooted at `dir`, as used when running from an install directory
    pub fn in_dir(dir: &Path, port: u16) -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            log_file: dir.join(LOG_FILE_NAME),
            public_dir: dir.join(PUBLIC_DIR_NAME),
            retry: RetryPolicy::default(),
        }
    }
}

impl Args {
    pub fn into_config(self) -> Result<ServerConfig> {
        let needs_exe_dir = self.log_file.is_none() || self.public_dir.is_none();
        let base = if needs_exe_dir { exe_dir()? } else { PathBuf::new() };

        Ok(ServerConfig {
            addr: SocketAddr::new(self.host, self.port),
            log_file: self.log_file.unwrap_or_else(|| base.join(LOG_FILE_NAME)),
            public_dir: self.public_dir.unwrap_or_else(|| default_public_dir(&base)),
            retry: RetryPolicy::new(self.lock_retries, Duration::from_millis(25)),
        })
    }
}

fn exe_dir() -> Result<PathBuf> {
    let exe = env::current_exe().context("failed to locate the running executable")?;
    Ok(exe.parent().map(Path::to_path_buf).unwrap_or_default())
}

fn default_public_dir(exe_dir: &Path) -> PathBuf {
    let beside = exe_dir.join(PUBLIC_DIR_NAME);
    if beside.is_dir() {
        beside
    } else {
        PathBuf::from(BUNDLED_PUBLIC_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_flags_win() {
        let args = Args::try_parse_from([
            "worklog-server",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--log-file",
            "/tmp/w/log.json",
            "--public-dir",
            "/tmp/w/static",
            "--lock-retries",
            "9",
        ])
        .unwrap();
        let config = args.into_config().unwrap();

        assert_eq!(config.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.log_file, PathBuf::from("/tmp/w/log.json"));
        assert_eq!(config.public_dir, PathBuf::from("/tmp/w/static"));
        assert_eq!(config.retry.max_retries, 9);
    }

    #[test]
    fn defaults_sit_next_to_executable() {
        let args = Args::try_parse_from(["worklog-server", "--port", "3000"]).unwrap();
        let config = args.into_config().unwrap();
        let exe_dir = exe_dir().unwrap();

        assert_eq!(config.addr.port(), DEFAULT_PORT);
        assert_eq!(config.log_file, exe_dir.join("log.json"));
        assert_eq!(config.public_dir, default_public_dir(&exe_dir));
    }

    #[test]
    fn public_dir_beside_executable_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("public")).unwrap();

        assert_eq!(default_public_dir(dir.path()), dir.path().join("public"));
    }

    #[test]
    fn missing_public_dir_falls_back_to_bundled_page() {
        let dir = tempfile::tempdir().unwrap();

        let public = default_public_dir(dir.path());

        assert_eq!(public, PathBuf::from(BUNDLED_PUBLIC_DIR));
        assert!(public.join("index.html").is_file());
    }
}
