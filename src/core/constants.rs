//! Constants used throughout the snapshotter deployment toolkit

/// URL of the curated data markets manifest
pub const MARKETS_CONFIG_URL: &str =
    "https://raw.githubusercontent.com/powerloom/curated-datamarkets/main/sources.json";

/// Default repository cloned for each node instance
pub const SNAPSHOTTER_LITE_REPO_URL: &str =
    "https://github.com/powerloom/snapshotter-lite-v2.git";

/// Default branch of the node template repository
pub const SNAPSHOTTER_LITE_BRANCH: &str = "main";

/// Root directory (under the working directory) holding deployed instances
pub const DEPLOYMENT_ROOT_DIR: &str = "snapshotter-lite-v2";

/// Temp directory name for the shared base clone during a deploy run
pub const BASE_CLONE_DIR: &str = ".tmp_snapshotter_base_clone";

/// Prefix of screen sessions managed by this toolkit
pub const SCREEN_SESSION_PREFIX: &str = "pl_";

/// Legacy screen session prefixes still recognized by status/diagnose
pub const LEGACY_SESSION_PREFIXES: [&str; 2] = ["powerloom-", "snapshotter-lite-v2-"];

/// Default local collector gRPC port
pub const DEFAULT_LOCAL_COLLECTOR_PORT: u16 = 50051;

/// Default core API port for the first instance
pub const DEFAULT_CORE_API_PORT: u16 = 8002;

/// Default docker subnet third octet for the first instance
pub const DEFAULT_SUBNET_THIRD_OCTET: u8 = 1;

/// Number of slots served by one collector before a new one is started
pub const COLLECTOR_SLOT_THRESHOLD: usize = 200;

/// Default maximum gRPC stream pool size
pub const DEFAULT_MAX_STREAM_POOL_SIZE: u32 = 2;

/// Default stream pool health check interval (seconds)
pub const DEFAULT_STREAM_POOL_HEALTH_CHECK_INTERVAL: u32 = 30;

/// Default connection refresh interval (seconds)
pub const DEFAULT_CONNECTION_REFRESH_INTERVAL_SEC: u32 = 60;

/// Default telegram notification cooldown (seconds)
pub const DEFAULT_TELEGRAM_NOTIFICATION_COOLDOWN: u32 = 300;

/// Default number of parallel deployment workers after the first slot
pub const DEFAULT_DEPLOY_WORKERS: usize = 4;

/// Settle delay after launching the first (collector-bearing) slot
pub const LEADER_SETTLE_DELAY_SECS: u64 = 30;

/// Stagger delay between follower launch batches
pub const FOLLOWER_STAGGER_DELAY_SECS: u64 = 10;

/// Maximum time to wait for in-flight launches to drain between batches
pub const LAUNCH_DRAIN_TIMEOUT_SECS: u64 = 300;

/// Poll interval while waiting for launches to drain
pub const LAUNCH_POLL_INTERVAL_SECS: u64 = 5;

/// Name of the per-instance lockfile present while build.sh is launching
pub const LAUNCH_LOCKFILE_NAME: &str = ".launching.lock";

/// Timeout for short external tool probes (docker info, screen -ls)
pub const TOOL_PROBE_TIMEOUT_SECS: u64 = 15;

/// Timeout for the markets manifest HTTP fetch
pub const MANIFEST_FETCH_TIMEOUT_SECS: u64 = 30;

/// Application directory name under the platform config dir
pub const APP_CONFIG_DIR_NAME: &str = "snapshotter-rs";
