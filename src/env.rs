//! Environment configuration for building the race client.

use std::{env, path::PathBuf};

use cep_race::{
    cep::{self, Cep},
    config::{parse_deadline_ms, parse_provider_list, ProviderConfig, RaceConfig},
    RaceClient,
};
use color_eyre::Result;

pub const DEADLINE_VAR: &str = "CEP_RACE_DEADLINE_MS";
pub const PROVIDERS_VAR: &str = "CEP_RACE_PROVIDERS";
pub const DISABLE_DEFAULTS_VAR: &str = "CEP_RACE_DISABLE_DEFAULTS";
pub const CEP_VAR: &str = "CEP_RACE_CEP";
pub const LOG_FILE_VAR: &str = "CEP_RACE_LOG_FILE";

fn flag_from_env(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
        .unwrap_or(false)
}

/// Collects providers: the stock CEP services unless disabled, then any extras
/// listed as `name=url` pairs.
pub fn providers_from_env() -> Result<Vec<ProviderConfig>> {
    let mut providers = Vec::new();

    if !flag_from_env(DISABLE_DEFAULTS_VAR) {
        providers.extend(cep::default_providers());
    }
    if let Ok(raw) = env::var(PROVIDERS_VAR) {
        providers.extend(parse_provider_list(&raw)?);
    }

    if providers.is_empty() {
        color_eyre::eyre::bail!(
            "No providers configured.\n\
             Unset {DISABLE_DEFAULTS_VAR} or list providers in {PROVIDERS_VAR} as name=url"
        );
    }

    Ok(providers)
}

/// Reads the race configuration, falling back to the defaults.
pub fn race_config_from_env() -> Result<RaceConfig> {
    let cfg = RaceConfig::default();
    match env::var(DEADLINE_VAR) {
        Ok(raw) => Ok(cfg.with_deadline(parse_deadline_ms(&raw)?)),
        Err(_) => Ok(cfg),
    }
}

/// CEP the dashboard looks up.
pub fn cep_from_env() -> Result<Cep> {
    let raw = env::var(CEP_VAR).unwrap_or_else(|_| cep::DEFAULT_CEP.to_string());
    Ok(Cep::parse(&raw)?)
}

pub fn log_file_from_env() -> Option<PathBuf> {
    env::var_os(LOG_FILE_VAR).map(PathBuf::from)
}

/// Builds a race client from environment variables.
///
/// Looks for the following environment variables:
/// - `CEP_RACE_DEADLINE_MS`
/// - `CEP_RACE_PROVIDERS`
/// - `CEP_RACE_DISABLE_DEFAULTS`
///
/// Returns an error if no providers are configured.
pub fn build_client_from_env() -> Result<(RaceClient, Vec<ProviderConfig>)> {
    let providers = providers_from_env()?;
    let cfg = race_config_from_env()?;

    let client = RaceClient::new(providers.clone(), cfg)?;
    Ok((client, providers))
}
