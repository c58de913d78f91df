use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::grammar::CEDA_BASE_PATH;
use crate::util::strip_quotes;

/// CEDA FTP address.
pub const CEDA_FTP_HOST: &str = "ftp.ceda.ac.uk";
pub const DEFAULT_FTP_PORT: u16 = 21;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Asks on the terminal for whatever is missing. The username is echoed, the password is not.
    pub fn prompt(username: Option<String>, password: Option<String>) -> Result<Self> {
        let username = match username.filter(|u| !u.is_empty()) {
            Some(u) => u,
            None => dialoguer::Input::<String>::new()
                .with_prompt(" Username")
                .interact_text()
                .map_err(|e| Error::Config(format!("failed to read username: {}", e)))?,
        };
        let password = match password.filter(|p| !p.is_empty()) {
            Some(p) => p,
            None => dialoguer::Password::new()
                .with_prompt(" Password")
                .interact()
                .map_err(|e| Error::Config(format!("failed to read password: {}", e)))?,
        };
        Ok(Self { username, password })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub host: String,
    pub port: u16,
    /// Root of the convention-named tree on the server.
    pub base_path: String,
    pub credentials: Credentials,
}

/// Values given explicitly (e.g. on the command line). They win over everything else.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_path: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct RcConfig {
    host: Option<String>,
    port: Option<u16>,
    base_path: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

/// Resolves the archive configuration, in order of precedence:
/// - explicit overrides
/// - environment variables `CEDA_FTP_HOST` / `CEDA_USERNAME` / `CEDA_PASSWORD`
/// - config file from `CEDA_RC` or `.cedarc`
/// - an interactive prompt for missing credentials
pub fn load_config(overrides: ConfigOverrides) -> Result<ArchiveConfig> {
    resolve_config(
        overrides,
        |name| std::env::var(name).ok(),
        &rc_candidates(),
        Credentials::prompt,
    )
}

pub(crate) fn resolve_config<E, P>(
    overrides: ConfigOverrides,
    env: E,
    rc_candidates: &[PathBuf],
    prompt: P,
) -> Result<ArchiveConfig>
where
    E: Fn(&str) -> Option<String>,
    P: FnOnce(Option<String>, Option<String>) -> Result<Credentials>,
{
    let mut host = overrides.host.or_else(|| env("CEDA_FTP_HOST"));
    let mut username = overrides.username.or_else(|| env("CEDA_USERNAME"));
    let mut password = overrides.password.or_else(|| env("CEDA_PASSWORD"));
    let mut port = overrides.port;
    let mut base_path = overrides.base_path;

    for rc_path in rc_candidates {
        if rc_path.exists() {
            let cfg = read_rc(rc_path)?;
            host = host.or(cfg.host);
            port = port.or(cfg.port);
            base_path = base_path.or(cfg.base_path);
            username = username.or(cfg.username);
            password = password.or(cfg.password);
            break;
        }
    }

    let have = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    let credentials = if have(&username) && have(&password) {
        Credentials {
            username: username.unwrap_or_default(),
            password: password.unwrap_or_default(),
        }
    } else {
        prompt(username, password)?
    };

    Ok(ArchiveConfig {
        host: host.unwrap_or_else(|| CEDA_FTP_HOST.to_string()),
        port: port.unwrap_or(DEFAULT_FTP_PORT),
        base_path: base_path.unwrap_or_else(|| CEDA_BASE_PATH.to_string()),
        credentials,
    })
}

fn read_rc(path: &Path) -> Result<RcConfig> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_rc(&text).map_err(|reason| {
        Error::Config(format!(
            "invalid configuration file {}: {}",
            path.display(),
            reason
        ))
    })
}

fn parse_rc(text: &str) -> std::result::Result<RcConfig, String> {
    let mut cfg = RcConfig::default();

    for (lineno, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((k, v)) = line.split_once(':') else {
            return Err(format!("line {}: expected `key: value`", lineno + 1));
        };
        let v = strip_quotes(v.trim());
        if v.is_empty() {
            continue;
        }
        match k.trim() {
            "host" => cfg.host = Some(v.to_string()),
            "port" => {
                let port = v
                    .parse()
                    .map_err(|_| format!("line {}: invalid port {:?}", lineno + 1, v))?;
                cfg.port = Some(port);
            }
            "base_path" => cfg.base_path = Some(v.to_string()),
            "username" => cfg.username = Some(v.to_string()),
            "password" => cfg.password = Some(v.to_string()),
            other => tracing::warn!("ignoring unknown configuration key {:?}", other),
        }
    }

    Ok(cfg)
}

fn rc_candidates() -> Vec<PathBuf> {
    // 1) CEDA_RC (explicit)
    // 2) ./.cedarc
    // 3) ~/.cedarc
    if let Ok(p) = std::env::var("CEDA_RC") {
        return vec![PathBuf::from(p)];
    }

    let mut v = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        v.push(cwd.join(".cedarc"));
    }
    if let Some(home) = dirs::home_dir() {
        v.push(home.join(".cedarc"));
    }
    v
}
