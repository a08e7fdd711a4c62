//! Process configuration
//!
//! Read once at start-up from the environment. A `.env` file in the working
//! directory is loaded first when present.

use crate::runtime::ToolFailurePolicy;
use crate::state_machine::state::DEFAULT_MAX_STEPS;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TEMPERATURE: f32 = 0.5;
pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 5;
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key (`GOOGLE_API_KEY`, falling back to `GEMINI_API_KEY`)
    pub google_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub model: String,
    /// Optional system instruction sent with every model request
    pub system_prompt: Option<String>,
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
    pub search_max_results: usize,
    pub max_steps: u32,
    pub tool_failure_policy: ToolFailurePolicy,
    pub host: IpAddr,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; blank values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            google_api_key: get("GOOGLE_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            tavily_api_key: get("TAVILY_API_KEY"),
            model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            system_prompt: get("SYSTEM_PROMPT"),
            temperature: parse(get("MODEL_TEMPERATURE"), "MODEL_TEMPERATURE", DEFAULT_TEMPERATURE)?,
            max_output_tokens: get("MAX_OUTPUT_TOKENS")
                .map(|v| parse(Some(v), "MAX_OUTPUT_TOKENS", 0))
                .transpose()?,
            search_max_results: parse(
                get("SEARCH_MAX_RESULTS"),
                "SEARCH_MAX_RESULTS",
                DEFAULT_SEARCH_MAX_RESULTS,
            )?,
            max_steps: parse(get("MAX_STEPS"), "MAX_STEPS", DEFAULT_MAX_STEPS)?,
            tool_failure_policy: parse(
                get("TOOL_FAILURE_POLICY"),
                "TOOL_FAILURE_POLICY",
                ToolFailurePolicy::default(),
            )?,
            host: parse(get("HOST"), "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse(get("PORT"), "PORT", DEFAULT_PORT)?,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}
