//! Guided recording.
//!
//! Loads configuration, runs the recording flow against the system's audio
//! devices, and writes the accepted recording to disk.

use crate::config::VoxmemoConfig;
use crate::recording::{AudioBlob, CpalBackend, FlowOutcome, RecordingFlow};
use crate::session::SessionController;
use crate::ui::{ErrorScreen, Theme};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options for the record command.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    /// Team identifier for color theming; overrides the config file
    pub team: Option<String>,
    /// Device to preselect; overrides the config file
    pub device: Option<String>,
    /// Where to write the accepted recording
    pub output: Option<PathBuf>,
}

/// Runs the guided recording flow.
///
/// # Errors
/// - If configuration cannot be loaded
/// - If the terminal UI fails
/// - If the accepted recording cannot be written
pub async fn handle_record(options: RecordOptions) -> Result<(), anyhow::Error> {
    tracing::info!("=== voxmemo recorder started ===");

    let config = match VoxmemoConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            let error_message = format!(
                "Configuration Error:\n\n{err}\n\nPlease check your ~/.config/voxmemo/voxmemo.toml file and try again."
            );
            let mut error_screen = ErrorScreen::new()?;
            error_screen.show_error(&error_message)?;
            error_screen.cleanup()?;
            return Err(anyhow::anyhow!("Configuration error: {err}"));
        }
    };

    let team = options.team.unwrap_or_else(|| config.theme.team.clone());
    let device = options
        .device
        .unwrap_or_else(|| config.audio.device.clone());
    tracing::info!(
        "Configuration loaded: device={}, team={}, analyser={} samples",
        device,
        team,
        config.audio.analyser_size
    );

    let backend = Arc::new(CpalBackend::new(config.audio.analyser_size));
    let controller = SessionController::with_preferred_device(backend, Some(device));
    let flow = RecordingFlow::new(controller, config.visualization, Theme::for_team(&team))?;

    let output = options
        .output
        .unwrap_or_else(|| default_output_path(&config.output_dir()));

    let outcome = flow.run(|blob| {
        write_recording(&blob, &output)?;
        println!("{}", output.display());
        Ok(())
    })?;

    if outcome == FlowOutcome::Cancelled {
        eprintln!("Recording discarded.");
    }
    Ok(())
}

/// Timestamped file name inside `dir`.
fn default_output_path(dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    dir.join(format!("voxmemo-{stamp}.wav"))
}

/// Writes the blob's WAV bytes to `path`, creating parent directories.
fn write_recording(blob: &AudioBlob, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, blob.bytes())
        .map_err(|e| anyhow::anyhow!("Failed to write {}: {e}", path.display()))?;
    tracing::info!(
        "Wrote {} bytes ({}) to {}",
        blob.bytes().len(),
        blob.mime(),
        path.display()
    );
    Ok(())
}
