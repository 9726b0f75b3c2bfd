// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration merging.
//!
//! Environment variables are consulted first, then the workspace file, then
//! the global file. The first non-empty value wins for each key; a later
//! source never overrides an earlier one.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use super::types::{CredentialConfig, FileConfig, DEFAULT_AUTH_TYPE};

/// Default organization endpoint.
pub const ENV_ORG_URL: &str = "ORG_URL";
/// Default project name.
pub const ENV_PROJECT: &str = "PROJECT";
/// Personal access token secret.
pub const ENV_PAT: &str = "PAT";
/// Auth type tag.
pub const ENV_AUTH_TYPE: &str = "AUTH_TYPE";
/// Platform identity tenant.
pub const ENV_TENANT_ID: &str = "TENANT_ID";
/// Platform identity client id.
pub const ENV_CLIENT_ID: &str = "CLIENT_ID";
/// Federated token file for workload identity.
pub const ENV_FEDERATED_TOKEN_FILE: &str = "AZURE_FEDERATED_TOKEN_FILE";

/// All environment keys read during config loading.
pub const ENV_KEYS: &[&str] = &[
    ENV_ORG_URL,
    ENV_PROJECT,
    ENV_PAT,
    ENV_AUTH_TYPE,
    ENV_TENANT_ID,
    ENV_CLIENT_ID,
    ENV_FEDERATED_TOKEN_FILE,
];

/// Captured environment values.
///
/// Built once from the process environment, or explicitly in tests, so that
/// nothing after load reads ambient state.
#[derive(Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
}

impl EnvSnapshot {
    /// Capture the configuration keys from the process environment.
    pub fn from_process() -> Self {
        let vars = ENV_KEYS
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|value| (key.to_string(), value)))
            .collect();
        Self { vars }
    }

    /// Build a snapshot from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a non-empty value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).and_then(non_empty)
    }
}

impl fmt::Debug for EnvSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.vars.keys().collect();
        keys.sort();
        f.debug_struct("EnvSnapshot").field("keys", &keys).finish()
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Return the first non-empty candidate.
fn first_present<'a>(candidates: impl IntoIterator<Item = Option<&'a str>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find_map(non_empty)
        .map(str::to_string)
}

/// Merge configuration sources.
///
/// Precedence (highest to lowest):
/// 1. Environment variables
/// 2. Workspace config file
/// 3. Global config file (~/.devlink/config.json)
/// 4. Defaults (`AUTH_TYPE` = `pat`)
pub fn merge_config(
    env: &EnvSnapshot,
    workspace: Option<&FileConfig>,
    global: Option<&FileConfig>,
) -> CredentialConfig {
    let files: Vec<&FileConfig> = workspace.into_iter().chain(global).collect();

    CredentialConfig {
        organization_url: pick(env.get(ENV_ORG_URL), &files, |f| f.org_url.as_deref()),
        project: pick(env.get(ENV_PROJECT), &files, |f| f.project.as_deref()),
        pat: pick(env.get(ENV_PAT), &files, |f| f.pat.as_deref()),
        auth_type: pick(env.get(ENV_AUTH_TYPE), &files, |f| f.auth_type.as_deref())
            .unwrap_or_else(|| DEFAULT_AUTH_TYPE.to_string()),
        tenant_id: pick(env.get(ENV_TENANT_ID), &files, |f| f.tenant_id.as_deref()),
        client_id: pick(env.get(ENV_CLIENT_ID), &files, |f| f.client_id.as_deref()),
        federated_token_file: env.get(ENV_FEDERATED_TOKEN_FILE).map(PathBuf::from),
    }
}

fn pick(
    env_value: Option<&str>,
    files: &[&FileConfig],
    field: fn(&FileConfig) -> Option<&str>,
) -> Option<String> {
    first_present(std::iter::once(env_value).chain(files.iter().map(|file| field(file))))
}
