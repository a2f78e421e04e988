//! Configuration file editor command.

use crate::config::{get_config_path, VoxmemoConfig};
use std::process::Command;

/// Opens the config file in the user's editor, creating it with defaults first if needed.
///
/// Tries `$EDITOR`, then nano, then vi. The edited file is loaded again
/// afterwards so mistakes are reported right away.
///
/// # Errors
/// - If no editor can be found or executed
/// - If the editor exits with an error
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = get_config_path()?;
    if !config_path.exists() {
        VoxmemoConfig::default().save()?;
    }

    tracing::info!("Opening config file: {}", config_path.display());
    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    match VoxmemoConfig::load_from(&config_path) {
        Ok(_) => tracing::info!("Config file edited successfully"),
        Err(e) => {
            tracing::warn!("Edited config is invalid: {e}");
            eprintln!("Warning: {e}");
        }
    }
    Ok(())
}

fn find_editor() -> anyhow::Result<String> {
    let from_env = std::env::var("EDITOR").ok();
    pick_editor(from_env.as_deref(), is_editor_available)
        .ok_or_else(|| anyhow::anyhow!("No editor found. Please set the $EDITOR environment variable."))
}

fn pick_editor(from_env: Option<&str>, available: impl Fn(&str) -> bool) -> Option<String> {
    if let Some(editor) = from_env.filter(|e| !e.trim().is_empty()) {
        return Some(editor.to_string());
    }
    ["nano", "vi"]
        .into_iter()
        .find(|editor| available(editor))
        .map(String::from)
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
