// src/config.rs
use std::{fmt::Display, net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub template_path: PathBuf,
    pub public_dir: PathBuf,
    /// Requests per client per window; 0 turns limiting off.
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3000)),
            template_path: PathBuf::from("template/dashboard.html"),
            public_dir: PathBuf::from("public"),
            rate_limit_max: 50,
            rate_limit_window: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let host = lookup("HOST").unwrap_or_else(|| defaults.bind.ip().to_string());
        let port: u16 = parsed(&lookup, "PORT", defaults.bind.port())?;
        let bind = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid HOST={host}"))?;

        Ok(Self {
            bind,
            template_path: lookup("TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_path),
            public_dir: lookup("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.public_dir),
            rate_limit_max: parsed(&lookup, "RATE_LIMIT_MAX", defaults.rate_limit_max)?,
            rate_limit_window: Duration::from_secs(parsed(
                &lookup,
                "RATE_LIMIT_WINDOW_SECS",
                defaults.rate_limit_window.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parsed(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
        })
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key}={raw}: {e}")),
        None => Ok(default),
    }
}
