//! cpal implementation of the audio backend.
//!
//! `cpal::Stream` is not `Send`, so each opened stream lives on its own thread.
//! The thread reports readiness over a oneshot channel, then parks until its
//! tracks are stopped. Multi-channel input is mixed down to mono i16.

use super::backend::{Analyser, AudioBackend, AudioDevice, InputStream};
use crate::error::{CaptureError, DeviceError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex};
use std::thread;
use tokio::sync::{mpsc, oneshot};

#[cfg(target_os = "linux")]
use std::fs::OpenOptions;
#[cfg(target_os = "linux")]
use std::os::unix::io::AsRawFd;

/// An input device with the details `list-devices` prints.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub device: AudioDevice,
    pub is_default: bool,
    /// Native (sample rate, channels), if the device reports them
    pub native_config: Option<(u32, u16)>,
}

/// Audio backend over the default cpal host.
pub struct CpalBackend {
    analyser_size: usize,
}

impl CpalBackend {
    pub fn new(analyser_size: usize) -> Self {
        Self { analyser_size }
    }
}

#[async_trait::async_trait]
impl AudioBackend for CpalBackend {
    async fn input_devices(&self) -> Result<Vec<AudioDevice>, DeviceError> {
        let infos = tokio::task::spawn_blocking(probe_input_devices)
            .await
            .map_err(|e| DeviceError::Task(e.to_string()))??;
        Ok(infos.into_iter().map(|info| info.device).collect())
    }

    async fn open_stream(
        &self,
        device_id: Option<&str>,
    ) -> Result<Box<dyn InputStream>, CaptureError> {
        let device_spec = device_id.unwrap_or("default").to_string();
        let analyser = Analyser::new(self.analyser_size);
        let shared = Arc::new(StreamShared::default());
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();

        let thread_analyser = analyser.clone();
        let thread_shared = shared.clone();
        let thread = thread::Builder::new()
            .name("voxmemo-capture".to_string())
            .spawn(move || {
                run_stream_thread(
                    &device_spec,
                    thread_analyser,
                    thread_shared,
                    ready_tx,
                    shutdown_rx,
                )
            })
            .map_err(|e| CaptureError::Acquisition(e.to_string()))?;

        let sample_rate = ready_rx
            .await
            .map_err(|_| CaptureError::Acquisition("capture thread exited".to_string()))??;

        Ok(Box::new(CpalInputStream {
            sample_rate,
            analyser,
            shared,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        }))
    }
}

/// State shared between the stream thread's callback and the stream handle.
#[derive(Default)]
struct StreamShared {
    paused: AtomicBool,
    listener: Mutex<Option<mpsc::UnboundedSender<Vec<i16>>>>,
}

struct CpalInputStream {
    sample_rate: u32,
    analyser: Analyser,
    shared: Arc<StreamShared>,
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl InputStream for CpalInputStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn analyser(&self) -> Analyser {
        self.analyser.clone()
    }

    fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Vec<i16>> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut listener) = self.shared.listener.lock() {
            *listener = Some(tx);
        }
        rx
    }

    fn set_paused(&mut self, paused: bool) {
        self.shared.paused.store(paused, Ordering::SeqCst);
    }

    fn stop_tracks(&mut self) -> Result<(), CaptureError> {
        if let Ok(mut listener) = self.shared.listener.lock() {
            *listener = None;
        }
        let Some(shutdown) = self.shutdown.take() else {
            return Ok(());
        };
        // The thread may already be gone if the stream failed; joining reports that.
        let _ = shutdown.send(());
        if let Some(thread) = self.thread.take() {
            thread
                .join()
                .map_err(|_| CaptureError::Teardown("capture thread panicked".to_string()))?;
        }
        tracing::debug!("Audio tracks stopped");
        Ok(())
    }
}

impl Drop for CpalInputStream {
    fn drop(&mut self) {
        if let Err(e) = self.stop_tracks() {
            tracing::warn!("Ignoring teardown failure: {}", e);
        }
    }
}

fn run_stream_thread(
    device_spec: &str,
    analyser: Analyser,
    shared: Arc<StreamShared>,
    ready_tx: oneshot::Sender<Result<u32, CaptureError>>,
    shutdown_rx: std_mpsc::Receiver<()>,
) {
    let (stream, sample_rate) = match open_input(device_spec, analyser, shared) {
        Ok(opened) => opened,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(CaptureError::Stream(e.to_string())));
        return;
    }

    if ready_tx.send(Ok(sample_rate)).is_err() {
        tracing::debug!("Stream requester went away; releasing device");
        return;
    }

    tracing::debug!("Audio stream started");
    // Parks until stop_tracks() or until the stream handle is dropped.
    let _ = shutdown_rx.recv();
    drop(stream);
    tracing::debug!("Audio stream released");
}

fn open_input(
    device_spec: &str,
    analyser: Analyser,
    shared: Arc<StreamShared>,
) -> Result<(cpal::Stream, u32), CaptureError> {
    let device = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        if device_spec == "default" {
            host.default_input_device()
                .ok_or(CaptureError::NoDefaultDevice)
        } else {
            find_device_by_name(&host, device_spec)
        }
    })?;

    let device_name = device
        .name()
        .unwrap_or_else(|_| "Unknown device".to_string());
    tracing::info!("Recording device: {}", device_name);

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::Acquisition(e.to_string()))?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels() as usize;
    let sample_format = supported.sample_format();

    tracing::debug!(
        "Device configuration: {}Hz, {} channels, {:?}",
        sample_rate,
        channels,
        sample_format
    );

    let config: cpal::StreamConfig = supported.config();
    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            build_stream::<f32>(&device, &config, channels, analyser, shared)
        }
        cpal::SampleFormat::I16 => {
            build_stream::<i16>(&device, &config, channels, analyser, shared)
        }
        cpal::SampleFormat::U16 => {
            build_stream::<u16>(&device, &config, channels, analyser, shared)
        }
        cpal::SampleFormat::I32 => {
            build_stream::<i32>(&device, &config, channels, analyser, shared)
        }
        format => {
            return Err(CaptureError::Acquisition(format!(
                "Unsupported sample format: {format:?}"
            )))
        }
    }?;

    Ok((stream, sample_rate))
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    analyser: Analyser,
    shared: Arc<StreamShared>,
) -> Result<cpal::Stream, CaptureError>
where
    T: cpal::SizedSample + Send + 'static,
    i16: cpal::FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if shared.paused.load(Ordering::Relaxed) {
                    return;
                }
                let mono = mix_to_mono(data, channels);
                analyser.push(&mono);
                if let Ok(listener) = shared.listener.lock() {
                    if let Some(tx) = listener.as_ref() {
                        let _ = tx.send(mono);
                    }
                }
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| CaptureError::Acquisition(e.to_string()))
}

/// Converts interleaved frames to mono by averaging all channels.
fn mix_to_mono<T>(data: &[T], channels: usize) -> Vec<i16>
where
    T: Copy,
    i16: cpal::FromSample<T>,
{
    let channels = channels.max(1);
    if channels == 1 {
        return data
            .iter()
            .map(|&s| <i16 as cpal::FromSample<T>>::from_sample_(s))
            .collect();
    }
    data.chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame
                .iter()
                .map(|&s| <i16 as cpal::FromSample<T>>::from_sample_(s) as i32)
                .sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Lists input devices with their native configuration.
///
/// Devices whose name cannot be queried are skipped and the system default
/// comes first. The device name doubles as its id, which is what
/// `open_stream` matches on.
///
/// # Errors
/// - If the audio host cannot enumerate input devices
pub fn probe_input_devices() -> Result<Vec<DeviceInfo>, DeviceError> {
    suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());
        let devices = host
            .input_devices()
            .map_err(|e| DeviceError::Enumeration(e.to_string()))?;

        let mut infos: Vec<DeviceInfo> = devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                let native_config = device
                    .default_input_config()
                    .ok()
                    .map(|config| (config.sample_rate().0, config.channels()));
                let is_default = default_name.as_deref() == Some(name.as_str());
                let label = if is_default {
                    format!("{name} (default)")
                } else {
                    name.clone()
                };
                Some(DeviceInfo {
                    device: AudioDevice::new(name, label),
                    is_default,
                    native_config,
                })
            })
            .collect();
        // Default device first, so "default" and index 0 agree.
        infos.sort_by_key(|info| !info.is_default);
        Ok(infos)
    })
}

/// Finds an audio input device by name or numeric index.
///
/// # Errors
/// - If no device with the specified name/index is found
fn find_device_by_name(host: &cpal::Host, device_spec: &str) -> Result<cpal::Device, CaptureError> {
    let mut devices = host
        .input_devices()
        .map_err(|e| CaptureError::Acquisition(format!("Failed to enumerate devices: {e}")))?;

    if let Ok(index) = device_spec.parse::<usize>() {
        return devices
            .nth(index)
            .ok_or_else(|| CaptureError::DeviceNotFound(device_spec.to_string()));
    }

    devices
        .find(|device| device.name().map(|n| n == device_spec).unwrap_or(false))
        .ok_or_else(|| CaptureError::DeviceNotFound(device_spec.to_string()))
}

/// Runs `f` with stderr redirected to /dev/null to hide ALSA's probing noise.
///
/// If the redirect cannot be set up, `f` simply runs with stderr untouched.
#[cfg(target_os = "linux")]
fn suppress_alsa_warnings<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    let dev_null = match OpenOptions::new().write(true).open("/dev/null") {
        Ok(file) => file,
        Err(e) => {
            tracing::debug!("Not suppressing ALSA warnings: {}", e);
            return f();
        }
    };

    let old_stderr = unsafe { libc::dup(libc::STDERR_FILENO) };
    if old_stderr == -1 {
        return f();
    }

    if unsafe { libc::dup2(dev_null.as_raw_fd(), libc::STDERR_FILENO) } == -1 {
        unsafe { libc::close(old_stderr) };
        return f();
    }

    let result = f();

    unsafe {
        libc::dup2(old_stderr, libc::STDERR_FILENO);
        libc::close(old_stderr);
    }

    result
}

#[cfg(not(target_os = "linux"))]
fn suppress_alsa_warnings<F, T>(f: F) -> T
where
    F: FnOnce() -> T,
{
    f()
}
