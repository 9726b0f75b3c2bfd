// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration module.
//!
//! Handles loading and merging of credential configuration from:
//! - Environment variables: ORG_URL, PROJECT, PAT, AUTH_TYPE, TENANT_ID, CLIENT_ID,
//!   AZURE_FEDERATED_TOKEN_FILE
//! - Workspace config: devlink.json, .devlink.json, devlink.yaml, or .devlink/config.json
//! - Global config: ~/.devlink/config.json
//!
//! Sources are merged first-non-empty-wins (env > workspace > global > defaults).
//! The result is loaded once and injected into the connection provider.

mod loader;
mod merger;
mod types;

// Re-export public types
pub use loader::{
    get_global_config_dir, get_global_config_path, load_config_file, load_global_config,
    load_optional_config, load_workspace_config, CONFIG_FILES, GLOBAL_CONFIG_DIR, GLOBAL_CONFIG_FILE,
};

pub use merger::{
    merge_config, EnvSnapshot, ENV_AUTH_TYPE, ENV_CLIENT_ID, ENV_FEDERATED_TOKEN_FILE, ENV_KEYS,
    ENV_ORG_URL, ENV_PAT, ENV_PROJECT, ENV_TENANT_ID,
};

pub use types::{CredentialConfig, FileConfig, DEFAULT_AUTH_TYPE};

use crate::error::ConfigError;
use std::path::Path;

/// Load configuration for a working directory from the process environment
/// and config files.
///
/// This is the main entry point for configuration loading.
pub fn load_config(workspace_root: &Path) -> Result<CredentialConfig, ConfigError> {
    load_config_with_env(workspace_root, &EnvSnapshot::from_process())
}

/// Load configuration using an explicit environment snapshot and the
/// user's global config file.
pub fn load_config_with_env(
    workspace_root: &Path,
    env: &EnvSnapshot,
) -> Result<CredentialConfig, ConfigError> {
    let global_path = get_global_config_path();
    load_config_with_sources(workspace_root, global_path.as_deref(), env)
}

/// Load configuration from explicit sources.
///
/// `global_path` replaces `~/.devlink/config.json`; `None` skips the global
/// file entirely. A missing global file is not an error.
pub fn load_config_with_sources(
    workspace_root: &Path,
    global_path: Option<&Path>,
    env: &EnvSnapshot,
) -> Result<CredentialConfig, ConfigError> {
    let workspace = load_workspace_config(workspace_root)?;
    let global = match global_path {
        Some(path) => load_optional_config(path)?,
        None => None,
    };

    Ok(merge_config(env, workspace.as_ref(), global.as_ref()))
}

/// Load configuration from an explicit config file path plus the environment.
///
/// The global config is not consulted when a file is named explicitly.
pub fn load_config_from_file(
    path: &Path,
    env: &EnvSnapshot,
) -> Result<CredentialConfig, ConfigError> {
    let file = load_config_file(path)?;
    Ok(merge_config(env, Some(&file), None))
}
