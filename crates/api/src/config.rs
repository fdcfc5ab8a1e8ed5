//! Process configuration read from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use labstock_inventory::StockPolicy;
use labstock_observability::LogFormat;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://labstock.db?mode=rwc";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_RECENT_TRANSACTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// `sqlite://...` or `postgres://...`.
    pub database_url: String,
    pub bind_addr: String,
    pub upload_dir: PathBuf,
    /// Number of transactions returned by `/stats`.
    pub recent_transactions: u32,
    pub stock_policy: StockPolicy,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            recent_transactions: DEFAULT_RECENT_TRANSACTIONS,
            stock_policy: StockPolicy::AllowNegative,
            log_format: LogFormat::Json,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };

        let allow_negative = parsed(&lookup, "ALLOW_NEGATIVE_STOCK", true, parse_bool);
        let recent_transactions = parsed(
            &lookup,
            "RECENT_TRANSACTIONS",
            defaults.recent_transactions,
            |v| u32::from_str(v).ok().filter(|n| *n > 0),
        );

        Self {
            database_url: text("DATABASE_URL", defaults.database_url),
            bind_addr: text("BIND_ADDR", defaults.bind_addr),
            upload_dir: PathBuf::from(text(
                "UPLOAD_DIR",
                defaults.upload_dir.to_string_lossy().into_owned(),
            )),
            recent_transactions,
            stock_policy: if allow_negative {
                StockPolicy::AllowNegative
            } else {
                StockPolicy::RejectNegative
            },
            log_format: parsed(&lookup, "LOG_FORMAT", defaults.log_format, |v| v.parse().ok()),
        }
    }
}

fn parsed<T: std::fmt::Debug>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    let Some(raw) = lookup(key) else {
        return default;
    };
    match parse(raw.trim()) {
        Some(value) => value,
        None => {
            tracing::warn!(key, value = %raw, default = ?default, "invalid config value; using default");
            default
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> AppConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(config(&[]), AppConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let cfg = config(&[
            ("DATABASE_URL", "postgres://lab@localhost/lab"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("UPLOAD_DIR", "/var/lib/labstock/uploads"),
            ("RECENT_TRANSACTIONS", "25"),
            ("ALLOW_NEGATIVE_STOCK", "false"),
            ("LOG_FORMAT", "pretty"),
        ]);
        assert_eq!(cfg.database_url, "postgres://lab@localhost/lab");
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000");
        assert_eq!(cfg.upload_dir, PathBuf::from("/var/lib/labstock/uploads"));
        assert_eq!(cfg.recent_transactions, 25);
        assert_eq!(cfg.stock_policy, StockPolicy::RejectNegative);
        assert_eq!(cfg.log_format, LogFormat::Pretty);
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = config(&[
            ("RECENT_TRANSACTIONS", "0"),
            ("ALLOW_NEGATIVE_STOCK", "maybe"),
            ("LOG_FORMAT", "xml"),
            ("DATABASE_URL", "   "),
        ]);
        assert_eq!(cfg.recent_transactions, DEFAULT_RECENT_TRANSACTIONS);
        assert_eq!(cfg.stock_policy, StockPolicy::AllowNegative);
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.database_url, DEFAULT_DATABASE_URL);
    }
}
