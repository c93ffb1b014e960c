//! Connection parameters for a Bitcoin Core RPC endpoint.
//!
//! [`RpcConfig`] is passed by value to the client constructor. It can also be
//! read from (and rendered to) the `key=value` text format used by
//! `bitcoin.conf`, limited to the RPC keys this crate cares about.

use std::fmt;
use std::fmt::Write as _;
use std::net::Ipv6Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::CoreError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8332;
/// Long-running calls (`generatetoaddress`, rescans) routinely exceed the
/// usual 30 second HTTP timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3600);
pub const DEFAULT_BATCH_CHUNK_SIZE: usize = 50;

// ==============================================================================
// Config
// ==============================================================================

#[derive(Clone, PartialEq, Eq)]
pub struct RpcConfig {
    /// Host name or address. May carry an `http://`/`https://` scheme, in
    /// which case it is used as the URL base.
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub cookie_file: Option<PathBuf>,
    pub timeout: Duration,
    pub requests_per_second: Option<u32>,
    pub batch_chunk_size: usize,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            user: None,
            password: None,
            cookie_file: None,
            timeout: DEFAULT_TIMEOUT,
            requests_per_second: None,
            batch_chunk_size: DEFAULT_BATCH_CHUNK_SIZE,
        }
    }
}

impl fmt::Debug for RpcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("cookie_file", &self.cookie_file)
            .field("timeout", &self.timeout)
            .field("requests_per_second", &self.requests_per_second)
            .field("batch_chunk_size", &self.batch_chunk_size)
            .finish()
    }
}

impl RpcConfig {
    /// Parse `key=value` lines on top of the defaults.
    ///
    /// Blank lines, `#` comments and `[section]` headers are skipped. Unknown
    /// keys are ignored and a repeated key overrides the earlier value.
    pub fn from_conf_str(text: &str) -> Result<Self, CoreError> {
        let mut config = Self::default();

        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| CoreError::ConfParse {
                line: line_no,
                message: format!("expected `key=value`, got `{line}`"),
            })?;
            let key = key.trim();
            let value = value.trim();

            match key {
                "rpcuser" => config.user = Some(value.to_owned()),
                "rpcpassword" => config.password = Some(value.to_owned()),
                "rpchost" | "rpcconnect" => config.host = value.to_owned(),
                "rpcport" => {
                    config.port = value.parse().map_err(|e| CoreError::ConfParse {
                        line: line_no,
                        message: format!("invalid rpcport `{value}`: {e}"),
                    })?;
                }
                "rpctimeout" => {
                    let secs: u64 = value.parse().map_err(|e| CoreError::ConfParse {
                        line: line_no,
                        message: format!("invalid rpctimeout `{value}`: {e}"),
                    })?;
                    config.timeout = Duration::from_secs(secs);
                }
                "rpccookiefile" => config.cookie_file = Some(PathBuf::from(value)),
                other => debug!(line = line_no, key = other, "ignoring unknown config key"),
            }
        }

        Ok(config)
    }

    pub fn from_conf_file(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_conf_str(&text)
    }

    /// Render the conf-representable fields as `key=value` lines.
    pub fn to_conf_string(&self) -> String {
        let mut out = String::new();
        if let Some(user) = &self.user {
            let _ = writeln!(out, "rpcuser={user}");
        }
        if let Some(password) = &self.password {
            let _ = writeln!(out, "rpcpassword={password}");
        }
        let _ = writeln!(out, "rpcport={}", self.port);
        let _ = writeln!(out, "rpchost={}", self.host);
        // Round up so a fractional timeout never renders as zero.
        let timeout_secs = self.timeout.as_secs() + u64::from(self.timeout.subsec_nanos() > 0);
        let _ = writeln!(out, "rpctimeout={timeout_secs}");
        if let Some(cookie) = &self.cookie_file {
            let _ = writeln!(out, "rpccookiefile={}", cookie.display());
        }
        out
    }

    /// Endpoint URL for the daemon.
    ///
    /// A port carried in the host itself (`rpcconnect=127.0.0.1:18443`) takes
    /// precedence over `port`.
    pub fn url(&self) -> String {
        let host = self.host.trim_end_matches('/');

        if let Some((scheme, rest)) = host.split_once("://") {
            let authority = rest.split('/').next().unwrap_or(rest);
            if authority_has_port(authority) {
                return host.to_owned();
            }
            let path = &rest[authority.len()..];
            return format!("{scheme}://{authority}:{}{path}", self.port);
        }

        if host.parse::<Ipv6Addr>().is_ok() {
            return format!("http://[{host}]:{}", self.port);
        }
        if embedded_port(host).is_some() {
            return format!("http://{host}");
        }
        format!("http://{host}:{}", self.port)
    }

    /// Pick credentials for HTTP basic auth.
    ///
    /// Precedence:
    /// 1. explicit `user` + `password`
    /// 2. cookie file (`username:password` on its first line)
    /// 3. no auth
    pub fn resolve_auth(&self) -> Result<Option<(String, String)>, CoreError> {
        match (&self.user, &self.password) {
            (Some(u), Some(p)) => return Ok(Some((u.clone(), p.clone()))),
            (Some(_), None) | (None, Some(_)) => {
                return Err(CoreError::Config(
                    "both rpc user and rpc password must be set together".to_owned(),
                ));
            }
            (None, None) => {}
        }

        let Some(cookie_file) = &self.cookie_file else {
            return Ok(None);
        };
        read_cookie_file(cookie_file).map(Some)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host.trim().is_empty() {
            return Err(CoreError::Config("rpc host must not be empty".to_owned()));
        }
        if self.port == 0 {
            return Err(CoreError::Config("rpc port must be non-zero".to_owned()));
        }
        if let Some(port) = embedded_port(self.host.trim_end_matches('/')) {
            let (name, _) = self.host.rsplit_once(':').unwrap_or_default();
            let bad_name = name.contains(':') && !name.starts_with('[');
            if bad_name || !matches!(port.parse::<u16>(), Ok(p) if p != 0) {
                return Err(CoreError::Config(format!(
                    "rpc host `{}` must be `host`, `host:port` or `[ipv6]:port`",
                    self.host
                )));
            }
        }
        if self.timeout < Duration::from_secs(1) {
            return Err(CoreError::Config(
                "rpc timeout must be at least one second".to_owned(),
            ));
        }
        if self.batch_chunk_size == 0 {
            return Err(CoreError::Config(
                "rpc batch chunk size must be at least 1".to_owned(),
            ));
        }
        if self.requests_per_second == Some(0) {
            return Err(CoreError::Config(
                "requests_per_second must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Port suffix of a scheme-less `host:port` or `[ipv6]:port`.
fn embedded_port(host: &str) -> Option<&str> {
    if host.contains("://") || host.parse::<Ipv6Addr>().is_ok() || !authority_has_port(host) {
        return None;
    }
    host.rsplit_once(':').map(|(_, port)| port)
}

fn authority_has_port(authority: &str) -> bool {
    match authority.rfind(']') {
        Some(idx) => authority[idx..].contains(':'),
        None => authority.contains(':'),
    }
}

fn read_cookie_file(cookie_file: &Path) -> Result<(String, String), CoreError> {
    let content = std::fs::read_to_string(cookie_file).map_err(|e| {
        CoreError::Config(format!(
            "failed to read rpc cookie file {}: {e}",
            cookie_file.display()
        ))
    })?;
    let line = content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .ok_or_else(|| {
            CoreError::Config(format!("rpc cookie file {} is empty", cookie_file.display()))
        })?;

    let (cookie_user, cookie_pass) = line.split_once(':').ok_or_else(|| {
        CoreError::Config(format!(
            "rpc cookie file {} must contain `username:password`",
            cookie_file.display()
        ))
    })?;
    if cookie_user.is_empty() || cookie_pass.is_empty() {
        return Err(CoreError::Config(format!(
            "rpc cookie file {} must contain non-empty `username:password`",
            cookie_file.display()
        )));
    }

    Ok((cookie_user.to_owned(), cookie_pass.to_owned()))
}
