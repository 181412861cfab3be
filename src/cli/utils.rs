//! CLI utility functions for terminal interaction and formatting.

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use console::{style, Term};
use dialoguer::{Confirm, Input, Password};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Prompt for confirmation with default behavior based on `no_prompt` flag.
/// If `no_prompt` is true, returns true without prompting.
pub fn confirm(message: &str, no_prompt: bool) -> bool {
    if no_prompt {
        return true;
    }

    Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// Prompt for password input (hidden characters).
pub fn prompt_password(message: &str) -> String {
    Password::new()
        .with_prompt(message)
        .interact()
        .unwrap_or_default()
}

/// Prompt for text input.
pub fn prompt_input(message: &str) -> String {
    Input::new()
        .with_prompt(message)
        .interact_text()
        .unwrap_or_default()
}

/// Prompt for text input with a default value.
pub fn prompt_input_with_default(message: &str, default: &str) -> String {
    Input::new()
        .with_prompt(message)
        .default(default.to_string())
        .interact_text()
        .unwrap_or_else(|_| default.to_string())
}

/// Prompt for optional text input. Returns None if empty.
pub fn prompt_input_optional(message: &str) -> Option<String> {
    let value: String = Input::new()
        .with_prompt(message)
        .allow_empty(true)
        .interact_text()
        .unwrap_or_default();
    if value.trim().is_empty() {
        None
    } else {
        Some(value.trim().to_string())
    }
}

/// Create a spinner progress bar with message.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.blue} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print success message in green.
pub fn print_success(message: &str) {
    let term = Term::stdout();
    let _ = term.write_line(&format!("{} {}", style("✓").green().bold(), message));
}

/// Print error message in red.
pub fn print_error(message: &str) {
    let term = Term::stderr();
    let _ = term.write_line(&format!("{} {}", style("✗").red().bold(), message));
}

/// Print info message in blue.
pub fn print_info(message: &str) {
    let term = Term::stdout();
    let _ = term.write_line(&format!("{} {}", style("ℹ").blue().bold(), message));
}

/// Print warning message in yellow.
pub fn print_warning(message: &str) {
    let term = Term::stdout();
    let _ = term.write_line(&format!("{} {}", style("⚠").yellow().bold(), message));
}

/// Create a styled table for CLI output.
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a table with custom headers.
pub fn create_table_with_headers(headers: &[&str]) -> Table {
    let mut table = create_table();
    table.set_header(headers.iter().map(|h| style(*h).bold().to_string()));
    table
}

/// Mask a secret for display, keeping the first and last four characters.
///
/// Counts characters, not bytes, so multibyte values from hand-edited env
/// files mask cleanly.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

/// Parse a selection string like `"1,3-5,7"` into sorted 0-based indices.
///
/// Input positions are 1-based. Whitespace around items is tolerated.
/// Ranges must be ascending and every position must fall within
/// `1..=list_len`. Duplicates collapse.
pub fn parse_selection_string(input: &str, list_len: usize) -> anyhow::Result<Vec<usize>> {
    let mut indices = std::collections::BTreeSet::new();

    for item in input.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        if let Some((start, end)) = item.split_once('-') {
            let start: usize = start
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid range start '{}'", start.trim()))?;
            let end: usize = end
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid range end '{}'", end.trim()))?;
            if start == 0 || end == 0 {
                anyhow::bail!("Selections are 1-based, got 0 in '{item}'");
            }
            if start > end {
                anyhow::bail!("Range '{item}' is not ascending");
            }
            if end > list_len {
                anyhow::bail!("Selection {end} is out of range (1-{list_len})");
            }
            for pos in start..=end {
                indices.insert(pos - 1);
            }
        } else {
            let pos: usize = item
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid selection '{item}'"))?;
            if pos == 0 {
                anyhow::bail!("Selections are 1-based, got 0");
            }
            if pos > list_len {
                anyhow::bail!("Selection {pos} is out of range (1-{list_len})");
            }
            indices.insert(pos - 1);
        }
    }

    if indices.is_empty() {
        anyhow::bail!("Empty selection");
    }
    Ok(indices.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_selection_single() {
        assert_eq!(parse_selection_string("3", 5).unwrap(), vec![2]);
    }

    #[test]
    fn test_parse_selection_list_and_range() {
        assert_eq!(
            parse_selection_string("1,3-5,7", 10).unwrap(),
            vec![0, 2, 3, 4, 6]
        );
    }

    #[test]
    fn test_parse_selection_whitespace_and_duplicates() {
        assert_eq!(
            parse_selection_string(" 2 , 2 , 1 - 3 ", 5).unwrap(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn test_parse_selection_out_of_range() {
        assert!(parse_selection_string("6", 5).is_err());
        assert!(parse_selection_string("1-6", 5).is_err());
    }

    #[test]
    fn test_parse_selection_rejects_zero_and_garbage() {
        assert!(parse_selection_string("0", 5).is_err());
        assert!(parse_selection_string("a", 5).is_err());
        assert!(parse_selection_string("3-1", 5).is_err());
        assert!(parse_selection_string("", 5).is_err());
        assert!(parse_selection_string(",,", 5).is_err());
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("0x1234567890abcdef"), "0x12...cdef");
        assert_eq!(mask_secret("short"), "*****");
        assert_eq!(mask_secret(""), "");
    }

    #[test]
    fn test_mask_secret_multibyte() {
        assert_eq!(mask_secret("日本語の秘密鍵です"), "日本語の...密鍵です");
        assert_eq!(mask_secret("秘密です"), "****");
        assert_eq!(mask_secret("ключ-секрет"), "ключ...крет");
    }
}
