use crate::core::error::Error;
use anyhow::{Context, Result};
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Pump.Fun bonding-curve program. Public on-chain identity, not a credential.
pub const PUMP_FUN_PROGRAM_ID: &str = "6EF8rrecthR5Dkzon8Nwu78hRvfCKubJ14M5uBEwF6P";

pub const DEFAULT_MIN_MARKET_CAP: f64 = 8000.0;
pub const DEFAULT_STREAM_NAME: &str = "pumpfun-sniper";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl FromStr for Commitment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(anyhow::anyhow!(
                "unknown commitment level '{}' (expected processed, confirmed or finalized)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintFilterKind {
    Permissive,
    SplInitialized,
}

impl FromStr for MintFilterKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Ok(MintFilterKind::Permissive),
            "spl-initialized" | "spl_initialized" => Ok(MintFilterKind::SplInitialized),
            other => Err(anyhow::anyhow!(
                "unknown mint filter '{}' (expected permissive or spl-initialized)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub stream_endpoint: String,
    pub auth_token: String,
    pub rpc_http_url: String,
    pub keypair_path: PathBuf,
    pub min_market_cap: f64,
    pub program_id: Pubkey,
    pub stream_name: String,
    pub commitment: Commitment,
    pub unit_price_usd: f64,
    pub mint_filter: MintFilterKind,
    pub reconnect_initial_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_jitter_max_ms: u64,
    pub connect_timeout_seconds: u64,
    pub stream_idle_timeout_seconds: u64,
    pub update_channel_size: usize,
    pub dispatch_queue_size: usize,
    pub dispatch_workers: usize,
    pub rpc_timeout_seconds: u64,
    pub buy_compute_units: u32,
    pub priority_fee_per_cu: u64,
    pub dry_run: bool,
    pub event_bus_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` is this over the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let required = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("{} environment variable is required", key)))
        };

        fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T>
        where
            T::Err: std::fmt::Display,
        {
            match value {
                Some(raw) => raw
                    .trim()
                    .parse()
                    .map_err(|e| anyhow::anyhow!("Invalid {} value '{}': {}", key, raw, e)),
                None => Ok(default),
            }
        }

        let keypair_path = match get("KEYPAIR_PATH") {
            Some(path) => PathBuf::from(path),
            None => default_keypair_path()?,
        };

        let program_id = match get("PROGRAM_ID") {
            Some(raw) => raw,
            None => PUMP_FUN_PROGRAM_ID.to_string(),
        };
        let program_id = Pubkey::from_str(program_id.trim())
            .with_context(|| format!("Invalid PROGRAM_ID value: {}", program_id))?;

        let config = Config {
            stream_endpoint: required("STREAM_ENDPOINT")?,
            auth_token: required("AUTH_TOKEN")?,
            rpc_http_url: required("RPC_HTTP_URL")?,
            keypair_path,
            min_market_cap: parse_or(get("MIN_MARKET_CAP"), "MIN_MARKET_CAP", DEFAULT_MIN_MARKET_CAP)?,
            program_id,
            stream_name: get("STREAM_NAME").unwrap_or_else(|| DEFAULT_STREAM_NAME.to_string()),
            commitment: parse_or(get("COMMITMENT"), "COMMITMENT", Commitment::Confirmed)?,
            unit_price_usd: parse_or(get("UNIT_PRICE_USD"), "UNIT_PRICE_USD", 0.01f64)?,
            mint_filter: parse_or(get("MINT_FILTER"), "MINT_FILTER", MintFilterKind::Permissive)?,
            reconnect_initial_delay_ms: parse_or(
                get("RECONNECT_INITIAL_DELAY_MS"),
                "RECONNECT_INITIAL_DELAY_MS",
                5000u64,
            )?,
            reconnect_max_delay_ms: parse_or(
                get("RECONNECT_MAX_DELAY_MS"),
                "RECONNECT_MAX_DELAY_MS",
                60_000u64,
            )?,
            reconnect_jitter_max_ms: parse_or(
                get("RECONNECT_JITTER_MAX_MS"),
                "RECONNECT_JITTER_MAX_MS",
                1000u64,
            )?,
            connect_timeout_seconds: parse_or(
                get("CONNECT_TIMEOUT_SECONDS"),
                "CONNECT_TIMEOUT_SECONDS",
                10u64,
            )?,
            stream_idle_timeout_seconds: parse_or(
                get("STREAM_IDLE_TIMEOUT_SECONDS"),
                "STREAM_IDLE_TIMEOUT_SECONDS",
                60u64,
            )?,
            update_channel_size: parse_or(get("UPDATE_CHANNEL_SIZE"), "UPDATE_CHANNEL_SIZE", 4096usize)?,
            dispatch_queue_size: parse_or(get("DISPATCH_QUEUE_SIZE"), "DISPATCH_QUEUE_SIZE", 256usize)?,
            dispatch_workers: parse_or(get("DISPATCH_WORKERS"), "DISPATCH_WORKERS", 4usize)?,
            rpc_timeout_seconds: parse_or(get("RPC_TIMEOUT_SECONDS"), "RPC_TIMEOUT_SECONDS", 10u64)?,
            buy_compute_units: parse_or(get("BUY_COMPUTE_UNITS"), "BUY_COMPUTE_UNITS", 200_000u32)?,
            priority_fee_per_cu: parse_or(get("PRIORITY_FEE_PER_CU"), "PRIORITY_FEE_PER_CU", 1000u64)?,
            dry_run: parse_or(get("DRY_RUN"), "DRY_RUN (must be 'true' or 'false')", true)?,
            event_bus_buffer_size: parse_or(
                get("EVENT_BUS_BUFFER_SIZE"),
                "EVENT_BUS_BUFFER_SIZE",
                1024usize,
            )?,
        };

        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.stream_endpoint.starts_with("ws://") && !self.stream_endpoint.starts_with("wss://") {
            return Err(anyhow::anyhow!(
                "STREAM_ENDPOINT must start with ws:// or wss://"
            ));
        }

        if !self.rpc_http_url.starts_with("http://") && !self.rpc_http_url.starts_with("https://") {
            return Err(anyhow::anyhow!(
                "RPC_HTTP_URL must start with http:// or https://"
            ));
        }

        if !self.min_market_cap.is_finite() || self.min_market_cap < 0.0 {
            return Err(anyhow::anyhow!(
                "MIN_MARKET_CAP must be a finite value >= 0.0, got: {}",
                self.min_market_cap
            ));
        }

        if !self.unit_price_usd.is_finite() || self.unit_price_usd < 0.0 {
            return Err(anyhow::anyhow!(
                "UNIT_PRICE_USD must be a finite value >= 0.0, got: {}",
                self.unit_price_usd
            ));
        }

        if self.reconnect_initial_delay_ms == 0 {
            return Err(anyhow::anyhow!("RECONNECT_INITIAL_DELAY_MS must be > 0"));
        }

        if self.reconnect_max_delay_ms < self.reconnect_initial_delay_ms {
            return Err(anyhow::anyhow!(
                "RECONNECT_MAX_DELAY_MS ({}) must be >= RECONNECT_INITIAL_DELAY_MS ({})",
                self.reconnect_max_delay_ms,
                self.reconnect_initial_delay_ms
            ));
        }

        if self.connect_timeout_seconds == 0 || self.stream_idle_timeout_seconds == 0 {
            return Err(anyhow::anyhow!(
                "CONNECT_TIMEOUT_SECONDS and STREAM_IDLE_TIMEOUT_SECONDS must be > 0"
            ));
        }

        if self.update_channel_size == 0 || self.dispatch_queue_size == 0 || self.event_bus_buffer_size == 0 {
            return Err(anyhow::anyhow!(
                "UPDATE_CHANNEL_SIZE, DISPATCH_QUEUE_SIZE and EVENT_BUS_BUFFER_SIZE must be > 0"
            ));
        }

        if self.dispatch_workers == 0 || self.dispatch_workers > 64 {
            return Err(anyhow::anyhow!(
                "DISPATCH_WORKERS must be between 1 and 64, got: {}",
                self.dispatch_workers
            ));
        }

        if self.rpc_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("RPC_TIMEOUT_SECONDS must be > 0"));
        }

        if self.rpc_timeout_seconds > 30 {
            log::warn!(
                "⚠️  RPC_TIMEOUT_SECONDS={} is very high (>30s) - a hung submission holds a dispatch worker that long",
                self.rpc_timeout_seconds
            );
        }

        if self.min_market_cap == 0.0 {
            log::warn!("⚠️  MIN_MARKET_CAP=0: every new mint from the program will be dispatched");
        }

        if self.priority_fee_per_cu == 0 {
            log::warn!("⚠️  PRIORITY_FEE_PER_CU is 0, transactions may land late or be dropped");
        }

        if !self.dry_run {
            log::warn!("⚠️  DRY_RUN=false: Bot will send REAL transactions to blockchain!");
        }

        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_seconds)
    }
}

fn default_keypair_path() -> Result<PathBuf> {
    let home = env::var("HOME").context("KEYPAIR_PATH not set and HOME is unavailable")?;
    Ok(PathBuf::from(home).join("solana").join("id.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert("STREAM_ENDPOINT", "wss://stream.example.org".to_string());
        vars.insert("AUTH_TOKEN", "token".to_string());
        vars.insert("RPC_HTTP_URL", "https://rpc.example.org".to_string());
        vars.insert("KEYPAIR_PATH", "/tmp/id.json".to_string());
        vars
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<Config> {
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied_to_optional_values() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.min_market_cap, DEFAULT_MIN_MARKET_CAP);
        assert_eq!(config.program_id.to_string(), PUMP_FUN_PROGRAM_ID);
        assert_eq!(config.commitment, Commitment::Confirmed);
        assert_eq!(config.stream_name, DEFAULT_STREAM_NAME);
        assert_eq!(config.mint_filter, MintFilterKind::Permissive);
        assert!(config.dry_run);
        assert_eq!(config.keypair_path, PathBuf::from("/tmp/id.json"));
    }

    #[test]
    fn test_required_values_are_not_defaulted() {
        for key in ["STREAM_ENDPOINT", "AUTH_TOKEN", "RPC_HTTP_URL"] {
            let mut vars = base_env();
            vars.remove(key);
            let err = load(&vars).unwrap_err();
            assert!(err.to_string().contains(key), "unexpected error: {}", err);
        }
    }

    #[test]
    fn test_blank_required_value_rejected() {
        let mut vars = base_env();
        vars.insert("AUTH_TOKEN", "   ".to_string());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_invalid_program_id_is_fatal() {
        let mut vars = base_env();
        vars.insert("PROGRAM_ID", "not-a-pubkey".to_string());
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let cases = [
            ("MIN_MARKET_CAP", "-1"),
            ("MIN_MARKET_CAP", "abc"),
            ("COMMITMENT", "eventual"),
            ("STREAM_ENDPOINT", "https://not-a-socket"),
            ("DISPATCH_WORKERS", "0"),
            ("RECONNECT_MAX_DELAY_MS", "10"),
        ];
        for (key, value) in cases {
            let mut vars = base_env();
            vars.insert(key, value.to_string());
            assert!(load(&vars).is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn test_overrides_parsed() {
        let mut vars = base_env();
        vars.insert("MIN_MARKET_CAP", "12500.5".to_string());
        vars.insert("COMMITMENT", "Finalized".to_string());
        vars.insert("MINT_FILTER", "spl-initialized".to_string());
        vars.insert("DRY_RUN", "false".to_string());
        let config = load(&vars).unwrap();
        assert_eq!(config.min_market_cap, 12500.5);
        assert_eq!(config.commitment, Commitment::Finalized);
        assert_eq!(config.mint_filter, MintFilterKind::SplInitialized);
        assert!(!config.dry_run);
    }
}
