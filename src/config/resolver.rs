//! Credential and configuration value resolution
//!
//! Values are looked up across four tiers in fixed priority order:
//! CLI option, process environment, `.env` in the working directory, then
//! the namespaced per chain/market env file. First hit wins.

use std::collections::HashMap;

use tracing::debug;

use crate::config::envfile;
use crate::errors::{CredentialError, SnapshotterResult};

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Explicit CLI option
    CliOption,
    /// Process environment variable
    ProcessEnv,
    /// `.env` file in the working directory
    CwdEnvFile,
    /// Namespaced `.env.{chain}.{market}.{source}` file
    NamespacedEnvFile,
}

impl std::fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::CliOption => write!(f, "command line option"),
            CredentialSource::ProcessEnv => write!(f, "environment variable"),
            CredentialSource::CwdEnvFile => write!(f, ".env file"),
            CredentialSource::NamespacedEnvFile => write!(f, "namespaced env file"),
        }
    }
}

/// A resolved value together with the tier that supplied it
#[derive(Debug, Clone)]
pub struct ResolvedValue {
    pub value: String,
    pub source: CredentialSource,
}

/// Resolver scoped to one chain/market/source-chain triple
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    chain: String,
    /// Explicit CLI-provided overrides, keyed by variable name
    cli_values: HashMap<String, String>,
    /// Variables loaded from the working directory `.env`, if present
    cwd_env: HashMap<String, String>,
    /// Variables loaded from the namespaced env file, if present
    namespaced_env: HashMap<String, String>,
}

impl CredentialResolver {
    /// Build a resolver for a chain/market/source triple, loading the
    /// working directory `.env` and the namespaced env file if they exist.
    pub fn load(chain: &str, market: &str, source_chain: &str) -> SnapshotterResult<Self> {
        let cwd_env_path = std::env::current_dir()?.join(".env");
        let cwd_env = if cwd_env_path.is_file() {
            envfile::parse_env_file(&cwd_env_path)?
        } else {
            HashMap::new()
        };

        let namespaced_env =
            match envfile::find_namespaced_env_file(chain, market, source_chain)? {
                Some(path) => {
                    debug!(file = %path.display(), "Loaded namespaced env file");
                    envfile::parse_env_file(&path)?
                }
                None => HashMap::new(),
            };

        Ok(Self {
            chain: chain.to_uppercase(),
            cli_values: HashMap::new(),
            cwd_env,
            namespaced_env,
        })
    }

    /// Build a resolver from in-memory maps. Used by tests and callers that
    /// manage file loading themselves.
    pub fn from_parts(
        chain: &str,
        cwd_env: HashMap<String, String>,
        namespaced_env: HashMap<String, String>,
    ) -> Self {
        Self {
            chain: chain.to_uppercase(),
            cli_values: HashMap::new(),
            cwd_env,
            namespaced_env,
        }
    }

    /// Register a CLI-provided override for a variable.
    pub fn set_cli_value(&mut self, variable: &str, value: Option<&str>) {
        if let Some(value) = value {
            if !value.trim().is_empty() {
                self.cli_values
                    .insert(variable.to_string(), value.trim().to_string());
            }
        }
    }

    /// All variables from the namespaced env file, for seeding instance envs.
    pub fn namespaced_vars(&self) -> &HashMap<String, String> {
        &self.namespaced_env
    }

    /// Resolve a variable across all four tiers, or `None` if absent.
    pub fn resolve_optional(&self, variable: &str) -> Option<ResolvedValue> {
        if let Some(value) = self.cli_values.get(variable) {
            return Some(ResolvedValue {
                value: value.clone(),
                source: CredentialSource::CliOption,
            });
        }
        if let Ok(value) = std::env::var(variable) {
            if !value.trim().is_empty() {
                return Some(ResolvedValue {
                    value: value.trim().to_string(),
                    source: CredentialSource::ProcessEnv,
                });
            }
        }
        if let Some(value) = non_empty(self.cwd_env.get(variable)) {
            return Some(ResolvedValue {
                value,
                source: CredentialSource::CwdEnvFile,
            });
        }
        if let Some(value) = non_empty(self.namespaced_env.get(variable)) {
            return Some(ResolvedValue {
                value,
                source: CredentialSource::NamespacedEnvFile,
            });
        }
        None
    }

    /// Resolve a variable, erroring with the searched tiers when absent.
    pub fn resolve(&self, variable: &str) -> SnapshotterResult<ResolvedValue> {
        self.resolve_optional(variable).ok_or_else(|| {
            CredentialError::with_variable(
                format!(
                    "{variable} not found. Checked: command line option, \
                     environment variable, .env file, namespaced env file"
                ),
                variable,
                self.chain.clone(),
            )
            .into()
        })
    }

    /// Resolve the source chain RPC URL.
    ///
    /// Checked in order: the chain specific `SOURCE_RPC_{CHAIN}` variable
    /// across all tiers, then the generic `SOURCE_RPC_URL`.
    pub fn resolve_source_rpc(&self, source_chain: &str) -> SnapshotterResult<ResolvedValue> {
        let specific = source_rpc_variable(source_chain);
        if let Some(hit) = self.resolve_optional(&specific) {
            return Ok(hit);
        }
        if let Some(hit) = self.resolve_optional("SOURCE_RPC_URL") {
            return Ok(hit);
        }
        Err(CredentialError::with_variable(
            format!(
                "Source RPC URL for {source_chain} not found. \
                 Set {specific} or SOURCE_RPC_URL, or run `plcli configure`"
            ),
            specific,
            self.chain.clone(),
        )
        .into())
    }
}

/// Chain specific source RPC variable name, e.g. `SOURCE_RPC_ETH_MAINNET`.
pub fn source_rpc_variable(source_chain: &str) -> String {
    format!(
        "SOURCE_RPC_{}",
        source_chain.to_uppercase().replace('-', "_")
    )
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_with(
        cwd: &[(&str, &str)],
        namespaced: &[(&str, &str)],
    ) -> CredentialResolver {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<HashMap<_, _>>()
        };
        CredentialResolver::from_parts("MAINNET", to_map(cwd), to_map(namespaced))
    }

    #[test]
    fn test_cli_option_wins() {
        let mut resolver = resolver_with(
            &[("WALLET_HOLDER_ADDRESS", "0xcwd")],
            &[("WALLET_HOLDER_ADDRESS", "0xns")],
        );
        resolver.set_cli_value("WALLET_HOLDER_ADDRESS", Some("0xcli"));

        let hit = resolver.resolve("WALLET_HOLDER_ADDRESS").unwrap();
        assert_eq!(hit.value, "0xcli");
        assert_eq!(hit.source, CredentialSource::CliOption);
    }

    #[test]
    fn test_cwd_env_beats_namespaced() {
        let resolver = resolver_with(
            &[("SIGNER_ACCOUNT_ADDRESS", "0xcwd")],
            &[("SIGNER_ACCOUNT_ADDRESS", "0xns")],
        );
        let hit = resolver.resolve("SIGNER_ACCOUNT_ADDRESS").unwrap();
        assert_eq!(hit.value, "0xcwd");
        assert_eq!(hit.source, CredentialSource::CwdEnvFile);
    }

    #[test]
    fn test_namespaced_is_last_resort() {
        let resolver = resolver_with(&[], &[("SIGNER_ACCOUNT_PRIVATE_KEY", "0xkey")]);
        let hit = resolver.resolve("SIGNER_ACCOUNT_PRIVATE_KEY").unwrap();
        assert_eq!(hit.value, "0xkey");
        assert_eq!(hit.source, CredentialSource::NamespacedEnvFile);
    }

    #[test]
    fn test_missing_reports_tiers() {
        let resolver = resolver_with(&[], &[]);
        let err = resolver.resolve("WALLET_HOLDER_ADDRESS").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("WALLET_HOLDER_ADDRESS"));
        assert!(msg.contains("command line option"));
        assert!(msg.contains("namespaced env file"));
    }

    #[test]
    fn test_empty_cli_value_ignored() {
        let mut resolver = resolver_with(&[("KEY", "real")], &[]);
        resolver.set_cli_value("KEY", Some("   "));
        let hit = resolver.resolve("KEY").unwrap();
        assert_eq!(hit.value, "real");
        assert_eq!(hit.source, CredentialSource::CwdEnvFile);
    }

    #[test]
    fn test_source_rpc_specific_variable_first() {
        let resolver = resolver_with(
            &[
                ("SOURCE_RPC_ETH_MAINNET", "https://specific"),
                ("SOURCE_RPC_URL", "https://generic"),
            ],
            &[],
        );
        let hit = resolver.resolve_source_rpc("ETH-MAINNET").unwrap();
        assert_eq!(hit.value, "https://specific");
    }

    #[test]
    fn test_source_rpc_generic_fallback() {
        let resolver = resolver_with(&[("SOURCE_RPC_URL", "https://generic")], &[]);
        let hit = resolver.resolve_source_rpc("ETH-MAINNET").unwrap();
        assert_eq!(hit.value, "https://generic");
    }

    #[test]
    fn test_source_rpc_variable_name() {
        assert_eq!(source_rpc_variable("eth-mainnet"), "SOURCE_RPC_ETH_MAINNET");
        assert_eq!(source_rpc_variable("BASE"), "SOURCE_RPC_BASE");
    }

    #[test]
    fn test_source_rpc_missing() {
        let resolver = resolver_with(&[], &[]);
        let err = resolver.resolve_source_rpc("ETH-MAINNET").unwrap_err();
        assert!(err.to_string().contains("SOURCE_RPC_ETH_MAINNET"));
    }
}
