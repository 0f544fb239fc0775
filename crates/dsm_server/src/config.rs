//! Environment-sourced configuration, validated at the boundary: parse
//! once at startup, then trust the struct everywhere else rather than
//! re-checking environment variables throughout the request path.

use std::env;
use std::net::SocketAddr;

use dsm_algo::schulze::TiePolicy;
use dsm_state::EngineConfig;

const DEFAULT_NUM_CANDIDATES: usize = 16;
const DEFAULT_RETRY_LIMIT: u32 = 3;
const DEFAULT_CRITIQUE_ROUNDS: u32 = 1;
const DEFAULT_WORKER_COUNT: usize = 4;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// `DATABASE_URL`-equivalent. Only an in-memory store is implemented;
    /// when set, this is accepted and logged as ignored, marking where a
    /// relational `Store` would be wired in.
    pub store_url: Option<String>,
    pub text_model_endpoint: Option<String>,
    pub text_model_id: String,
    pub credential_salt: String,
    pub num_candidates: usize,
    pub default_critique_rounds: u32,
    pub retry_limit: u32,
    pub worker_count: usize,
    pub verbose: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl Config {
    /// Read and validate configuration from the process environment.
    /// Unset variables fall back to documented defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("DSM_BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                var: "DSM_BIND_ADDR",
                reason: e.to_string(),
            })?;

        let store_url = env::var("DATABASE_URL").ok();
        let text_model_endpoint = env::var("DSM_TEXT_MODEL_ENDPOINT").ok();
        let text_model_id = env::var("DSM_TEXT_MODEL_ID").unwrap_or_else(|_| "mock".to_string());
        let credential_salt = env::var("DSM_CREDENTIAL_SALT")
            .unwrap_or_else(|_| "dev-only-salt-change-me".to_string());

        let num_candidates = parse_env_or("DSM_NUM_CANDIDATES", DEFAULT_NUM_CANDIDATES)?;
        if !(2..=64).contains(&num_candidates) {
            return Err(ConfigError::Invalid {
                var: "DSM_NUM_CANDIDATES",
                reason: "must be within 2..=64".to_string(),
            });
        }

        let default_critique_rounds =
            parse_env_or("DSM_DEFAULT_CRITIQUE_ROUNDS", DEFAULT_CRITIQUE_ROUNDS)?;
        let retry_limit = parse_env_or("DSM_RETRY_LIMIT", DEFAULT_RETRY_LIMIT)?;
        let worker_count = parse_env_or("DSM_WORKER_COUNT", DEFAULT_WORKER_COUNT)?;
        let verbose = env::var("DSM_VERBOSE").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);

        if store_url.is_some() {
            tracing::warn!("DATABASE_URL is set but this build only has an in-memory Store; ignoring");
        }

        Ok(Self {
            bind_addr,
            store_url,
            text_model_endpoint,
            text_model_id,
            credential_salt,
            num_candidates,
            default_critique_rounds,
            retry_limit,
            worker_count,
            verbose,
        })
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            num_candidates: self.num_candidates,
            retry_limit: self.retry_limit,
            tie_policy: TiePolicy::Tbrc,
            credential_salt: self.credential_salt.clone(),
            worker_count: self.worker_count,
        }
    }
}

fn parse_env_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
