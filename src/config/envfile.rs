//! Reading and writing `.env` style files
//!
//! Namespaced env files carry per chain/market credentials and live in the
//! user config directory. Legacy layouts kept them in the working directory;
//! those are still read but never written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::constants;
use crate::errors::{CredentialError, SnapshotterResult};

/// Parse a `KEY=VALUE` env file into a map.
///
/// Blank lines and `#` comments are skipped. Only the first `=` splits, so
/// values may themselves contain `=`. Keys and values are trimmed.
pub fn parse_env_file(path: &Path) -> SnapshotterResult<HashMap<String, String>> {
    let contents = std::fs::read_to_string(path)?;
    Ok(parse_env_str(&contents))
}

/// Parse env file contents already held in memory.
pub fn parse_env_str(contents: &str) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            vars.insert(key.to_string(), value.trim().to_string());
        }
    }
    vars
}

/// Serialize a set of variables back into env file form.
///
/// Keys are emitted in the order given, one `KEY=VALUE` per line.
pub fn render_env_contents(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in pairs {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// File name of the namespaced env file for a chain/market/source triple.
///
/// Components are lowercased and dashes in the source chain become
/// underscores, e.g. `.env.mainnet.uniswapv2.eth_mainnet`.
pub fn namespaced_env_filename(chain: &str, market: &str, source_chain: &str) -> String {
    format!(
        ".env.{}.{}.{}",
        chain.to_lowercase(),
        market.to_lowercase(),
        source_chain.to_lowercase().replace('-', "_")
    )
}

/// The application config directory, created on demand.
pub fn app_config_dir() -> SnapshotterResult<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        CredentialError::new("Could not determine the platform config directory")
    })?;
    let dir = base.join(constants::APP_CONFIG_DIR_NAME);
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Created config directory");
    }
    Ok(dir)
}

/// Locate the namespaced env file for a triple, if one exists.
///
/// The config directory is checked first; the working directory is a legacy
/// fallback that triggers a warning when hit.
pub fn find_namespaced_env_file(
    chain: &str,
    market: &str,
    source_chain: &str,
) -> SnapshotterResult<Option<PathBuf>> {
    let filename = namespaced_env_filename(chain, market, source_chain);

    let config_path = app_config_dir()?.join(&filename);
    if config_path.is_file() {
        return Ok(Some(config_path));
    }

    let cwd_path = std::env::current_dir()?.join(&filename);
    if cwd_path.is_file() {
        warn!(
            file = %cwd_path.display(),
            "Using legacy env file from the working directory. \
             Run `plcli configure` to migrate it to the config directory."
        );
        return Ok(Some(cwd_path));
    }

    Ok(None)
}

/// Enumerate all namespaced env files visible to the toolkit.
///
/// Config directory entries come first, then legacy working directory ones
/// whose file name is not already present.
pub fn list_namespaced_env_files() -> SnapshotterResult<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut seen_names = Vec::new();

    let config_dir = app_config_dir()?;
    collect_env_files(&config_dir, &mut found, &mut seen_names)?;

    let cwd = std::env::current_dir()?;
    let mut legacy = Vec::new();
    collect_env_files(&cwd, &mut legacy, &mut seen_names)?;
    if !legacy.is_empty() {
        warn!(
            count = legacy.len(),
            "Found legacy env files in the working directory"
        );
        found.extend(legacy);
    }

    found.sort();
    Ok(found)
}

fn collect_env_files(
    dir: &Path,
    out: &mut Vec<PathBuf>,
    seen_names: &mut Vec<String>,
) -> SnapshotterResult<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        // Namespaced files look like .env.{chain}.{market}.{source}
        if name.starts_with(".env.")
            && name.matches('.').count() >= 4
            && entry.path().is_file()
            && !seen_names.contains(&name)
        {
            seen_names.push(name);
            out.push(entry.path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_pairs() {
        let vars = parse_env_str("FOO=bar\nBAZ=qux\n");
        assert_eq!(vars.get("FOO").map(String::as_str), Some("bar"));
        assert_eq!(vars.get("BAZ").map(String::as_str), Some("qux"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let vars = parse_env_str("# a comment\n\n  \nKEY=value\n# KEY2=ignored\n");
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("KEY").map(String::as_str), Some("value"));
    }

    #[test]
    fn test_parse_splits_on_first_equals() {
        let vars = parse_env_str("SOURCE_RPC_URL=https://rpc.example.com/key?a=b\n");
        assert_eq!(
            vars.get("SOURCE_RPC_URL").map(String::as_str),
            Some("https://rpc.example.com/key?a=b")
        );
    }

    #[test]
    fn test_parse_trims_whitespace() {
        let vars = parse_env_str("  KEY  =  value  \n");
        assert_eq!(vars.get("KEY").map(String::as_str), Some("value"));
    }

    #[test]
    fn test_parse_ignores_empty_keys() {
        let vars = parse_env_str("=value\nKEY=ok\n");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_namespaced_filename_lowercases() {
        assert_eq!(
            namespaced_env_filename("MAINNET", "UNISWAPV2", "ETH-MAINNET"),
            ".env.mainnet.uniswapv2.eth_mainnet"
        );
    }

    #[test]
    fn test_render_round_trip() {
        let pairs = vec![
            ("A".to_string(), "1".to_string()),
            ("B".to_string(), "two=2".to_string()),
        ];
        let rendered = render_env_contents(&pairs);
        let parsed = parse_env_str(&rendered);
        assert_eq!(parsed.get("A").map(String::as_str), Some("1"));
        assert_eq!(parsed.get("B").map(String::as_str), Some("two=2"));
    }

    #[test]
    fn test_parse_env_file_missing() {
        let result = parse_env_file(Path::new("/nonexistent/.env"));
        assert!(result.is_err());
    }
}
