//! Deployment orchestration library for Powerloom snapshotter nodes
//!
//! Provides the building blocks behind the `plcli` binary: the remote
//! markets manifest, credential resolution across env file tiers, slot
//! ownership queries against the protocol chain, and the staged rollout of
//! node instances via git, screen and docker.

pub mod cli;
pub mod config;
pub mod core;
pub mod deploy;
pub mod errors;
pub mod evm;

pub use config::{
    fetch_markets_config, ChainConfig, ChainMarkets, MarketConfig, MarketsContext,
    PowerloomChainConfig, RepoConfig,
};
pub use config::resolver::{CredentialResolver, CredentialSource, ResolvedValue};
pub use deploy::{run_staged_rollout, DeployPlan, DeploySummary, InstancePorts};
pub use errors::{SnapshotterError, SnapshotterResult};
pub use evm::fetch_owned_slots;
