// SPDX-FileCopyrightText: 2026 Ecocode Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! `./ecocode.toml` > `~/.config/ecocode/ecocode.toml` > `/etc/ecocode/ecocode.toml`,
//! with `ECOCODE_*` environment variables on top.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::EcocodeConfig;

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/ecocode/ecocode.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "ecocode.toml";

/// Sections recognised in `ECOCODE_<SECTION>_<KEY>` variables.
const ENV_SECTIONS: &[&str] = &["backend", "polling", "gateway", "logging"];

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ecocode").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/ecocode/ecocode.toml`
/// 3. `~/.config/ecocode/ecocode.toml`
/// 4. `./ecocode.toml`
/// 5. `ECOCODE_*` environment variables
pub fn load_config() -> Result<EcocodeConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only, without files or env vars.
pub fn load_config_from_str(toml_content: &str) -> Result<EcocodeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EcocodeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<EcocodeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(EcocodeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The Figment used by [`load_config`], before extraction.
pub fn build_figment() -> Figment {
    let mut figment = Figment::new()
        .merge(Serialized::defaults(EcocodeConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH));
    if let Some(user) = user_config_path() {
        figment = figment.merge(Toml::file(user));
    }
    figment
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Env provider mapping `ECOCODE_BACKEND_BASE_URL` to `backend.base_url`.
///
/// Only the first underscore after a known section name becomes a dot, so
/// keys that contain underscores survive intact.
fn env_provider() -> Env {
    Env::prefixed("ECOCODE_").map(|key| env_key_to_path(key.as_str()).into())
}

fn env_key_to_path(key: &str) -> String {
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(env_key_to_path("backend_base_url"), "backend.base_url");
        assert_eq!(env_key_to_path("polling_max_attempts"), "polling.max_attempts");
        assert_eq!(env_key_to_path("gateway_session_cookie"), "gateway.session_cookie");
        assert_eq!(
            env_key_to_path("gateway_session_idle_secs"),
            "gateway.session_idle_secs"
        );
        assert_eq!(env_key_to_path("logging_level"), "logging.level");
    }

    #[test]
    fn unknown_env_sections_pass_through() {
        assert_eq!(env_key_to_path("something_else"), "something_else");
    }

    #[test]
    fn string_overrides_defaults() {
        let config = load_config_from_str("[polling]\nmax_attempts = 8\ninterval_ms = 3000\n")
            .expect("valid toml");
        assert_eq!(config.polling.max_attempts, 8);
        assert_eq!(config.polling.interval_ms, 3000);
        assert_eq!(config.backend.base_url, "http://localhost:5000");
    }
}
