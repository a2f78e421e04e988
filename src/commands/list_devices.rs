//! List available audio input devices.

use crate::recording::cpal_backend::{probe_input_devices, DeviceInfo};

/// Lists all available audio input devices on the system.
///
/// # Errors
/// - If the audio host cannot enumerate its devices
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let devices = probe_input_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();
    for (index, info) in devices.iter().enumerate() {
        print!("{}", describe(index, info));
    }

    Ok(())
}

/// Text block for one device, as printed by `list-devices`.
fn describe(index: usize, info: &DeviceInfo) -> String {
    let default_indicator = if info.is_default { " [DEFAULT]" } else { "" };
    let config_info = match info.native_config {
        Some((sample_rate, channels)) => format!(" ({sample_rate}Hz, {channels} channels)"),
        None => " (configuration unavailable)".to_string(),
    };
    format!(
        "  ID: {index}\n    Name: {}{default_indicator}\n    Config:{config_info}\n\n",
        info.device.id
    )
}
