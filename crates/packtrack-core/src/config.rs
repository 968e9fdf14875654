use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

pub const DEFAULT_TRACK17_API_BASE: &str = "https://api.17track.net/track/v2.2";

/// Typed process configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Credentials
    pub telegram_bot_token: String,
    pub track17_api_key: String,
    pub cron_secret: String,

    // Provider
    pub track17_api_base: String,
    pub provider_timeout: Duration,

    // HTTP
    pub http_addr: SocketAddr,

    // Persistence
    pub store_path: PathBuf,
    pub io_timeout: Duration,

    // Reconciliation
    pub poll_delay: Duration,
    /// `None` disables the in-process ticker; passes then come from the
    /// HTTP trigger only.
    pub reconcile_interval: Option<Duration>,

    // Intake
    pub dialog_ttl: Duration,
    pub dialog_capacity: usize,

    // Telegram
    pub telegram_use_webhook: bool,
    pub telegram_safe_limit: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            get(key).and_then(non_empty).ok_or_else(|| {
                Error::Config(format!("{key} environment variable is required"))
            })
        };
        let parsed_u64 = |key: &str| get(key).and_then(|s| s.trim().parse::<u64>().ok());
        let parsed_usize = |key: &str| get(key).and_then(|s| s.trim().parse::<usize>().ok());

        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let track17_api_key = required("TRACK17_API_KEY")?;
        let cron_secret = required("CRON_SECRET")?;

        let track17_api_base = get("TRACK17_API_BASE")
            .and_then(non_empty)
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_TRACK17_API_BASE.to_string());
        let provider_timeout =
            Duration::from_millis(parsed_u64("PROVIDER_TIMEOUT_MS").unwrap_or(10_000));

        let host = get("HTTP_HOST")
            .and_then(non_empty)
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = get("PORT")
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or(3000);
        let http_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| Error::Config(format!("invalid HTTP_HOST/PORT {host}:{port}: {e}")))?;

        let store_path = PathBuf::from(
            get("STORE_PATH")
                .and_then(non_empty)
                .unwrap_or_else(|| "packtrack-store.json".to_string()),
        );
        let io_timeout = Duration::from_millis(parsed_u64("IO_TIMEOUT_MS").unwrap_or(5_000));

        let poll_delay = Duration::from_millis(parsed_u64("POLL_DELAY_MS").unwrap_or(1_000));
        let reconcile_interval = parsed_u64("RECONCILE_INTERVAL_SECS")
            .filter(|s| *s > 0)
            .map(Duration::from_secs);

        let dialog_ttl = Duration::from_secs(parsed_u64("DIALOG_TTL_SECS").unwrap_or(1_800));
        let dialog_capacity = parsed_usize("DIALOG_CAPACITY").unwrap_or(10_000).max(1);

        let telegram_use_webhook = get("TELEGRAM_USE_WEBHOOK")
            .map(|s| parse_bool(&s))
            .unwrap_or(false);
        let telegram_safe_limit = parsed_usize("TELEGRAM_SAFE_LIMIT").unwrap_or(4000);

        Ok(Self {
            telegram_bot_token,
            track17_api_key,
            cron_secret,
            track17_api_base,
            provider_timeout,
            http_addr,
            store_path,
            io_timeout,
            poll_delay,
            reconcile_interval,
            dialog_ttl,
            dialog_capacity,
            telegram_use_webhook,
            telegram_safe_limit,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, unquote(v.trim()));
    }
}

/// Strip one pair of matching surrounding quotes.
fn unquote(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        &val[1..val.len() - 1]
    } else {
        val
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("TRACK17_API_KEY", "key"),
        ("CRON_SECRET", "s3cret"),
    ];

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(cfg.track17_api_base, DEFAULT_TRACK17_API_BASE);
        assert_eq!(cfg.http_addr, "0.0.0.0:3000".parse().unwrap());
        assert_eq!(cfg.store_path, PathBuf::from("packtrack-store.json"));
        assert_eq!(cfg.poll_delay, Duration::from_secs(1));
        assert_eq!(cfg.reconcile_interval, None);
        assert_eq!(cfg.dialog_ttl, Duration::from_secs(1800));
        assert_eq!(cfg.dialog_capacity, 10_000);
        assert!(!cfg.telegram_use_webhook);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "8080"),
            ("HTTP_HOST", "127.0.0.1"),
            ("TRACK17_API_BASE", "http://localhost:9000/v2/"),
            ("RECONCILE_INTERVAL_SECS", "900"),
            ("TELEGRAM_USE_WEBHOOK", "yes"),
            ("POLL_DELAY_MS", "250"),
        ]);
        let cfg = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(cfg.http_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(cfg.track17_api_base, "http://localhost:9000/v2");
        assert_eq!(cfg.reconcile_interval, Some(Duration::from_secs(900)));
        assert!(cfg.telegram_use_webhook);
        assert_eq!(cfg.poll_delay, Duration::from_millis(250));
    }

    #[test]
    fn missing_secret_is_a_config_error() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(matches!(err, Error::Config(m) if m.contains("CRON_SECRET")));
    }

    #[test]
    fn unquote_strips_matching_quotes_only() {
        assert_eq!(unquote("\"abc\""), "abc");
        assert_eq!(unquote("'abc'"), "abc");
        assert_eq!(unquote("\"abc'"), "\"abc'");
    }
}
