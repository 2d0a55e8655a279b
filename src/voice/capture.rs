//! Audio capture from microphone
//!
//! A cpal stream is not `Send`, so [`CpalSource`] owns it on a dedicated
//! thread and hands mono frames to whatever sink is attached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, StreamConfig};

use super::encoder::{SAMPLE_RATE, downmix};
use crate::{Error, Result};

/// Receives mono frames from the capture thread
pub type FrameSink = Box<dyn FnMut(&[f32]) + Send>;

/// Shape of the captured stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    /// Frames per second delivered to the sink
    pub sample_rate: u32,
    /// Device channel count before downmixing
    pub channels: u16,
}

/// An open microphone stream
pub trait AudioSource: Send {
    /// Stream format
    fn format(&self) -> StreamFormat;

    /// Deliver frames to `sink`, replacing any previous sink
    fn attach(&mut self, sink: FrameSink);

    /// Stop delivering frames; the stream stays open
    fn detach(&mut self);

    /// Release the device; repeated calls are no-ops
    fn close(&mut self);

    /// Whether the stream is still producing audio
    fn is_active(&self) -> bool;
}

/// Opens microphone streams
pub trait AudioSourceFactory: Send + Sync {
    /// Open `device`, or the default input device when `None`
    ///
    /// # Errors
    ///
    /// Returns error if the device is missing or refuses a stream
    fn open(&self, device: Option<&str>) -> Result<Box<dyn AudioSource>>;
}

type SinkSlot = Arc<Mutex<Option<FrameSink>>>;

/// Microphone stream backed by cpal
pub struct CpalSource {
    format: StreamFormat,
    sink: SinkSlot,
    active: Arc<AtomicBool>,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for CpalSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalSource")
            .field("format", &self.format)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

impl CpalSource {
    /// Open an input device and start streaming
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn open(device: Option<&str>) -> Result<Self> {
        let sink: SinkSlot = Arc::new(Mutex::new(None));
        let active = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();
        let (stop_tx, stop_rx) = mpsc::channel();

        let thread = {
            let sink = Arc::clone(&sink);
            let active = Arc::clone(&active);
            let device = device.map(str::to_string);
            std::thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || run_stream(device.as_deref(), &sink, &active, &ready_tx, &stop_rx))
                .map_err(|e| Error::Audio(format!("failed to start capture thread: {e}")))?
        };

        match ready_rx.recv() {
            Ok(Ok(format)) => Ok(Self {
                format,
                sink,
                active,
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(Error::Audio("capture thread exited".to_string()))
            }
        }
    }
}

impl AudioSource for CpalSource {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn attach(&mut self, sink: FrameSink) {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = Some(sink);
        }
    }

    fn detach(&mut self) {
        if let Ok(mut slot) = self.sink.lock() {
            *slot = None;
        }
    }

    fn close(&mut self) {
        self.detach();
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("audio capture thread panicked");
            }
            tracing::debug!("audio capture stopped");
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_stream(
    device: Option<&str>,
    sink: &SinkSlot,
    active: &Arc<AtomicBool>,
    ready: &mpsc::Sender<Result<StreamFormat>>,
    stop: &mpsc::Receiver<()>,
) {
    let stream = match build_stream(device, sink, active) {
        Ok((stream, format)) => {
            active.store(true, Ordering::Release);
            let _ = ready.send(Ok(format));
            stream
        }
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    // Blocks until close() or the owner is dropped
    let _ = stop.recv();

    drop(stream);
    active.store(false, Ordering::Release);
}

fn build_stream(
    device: Option<&str>,
    sink: &SinkSlot,
    active: &Arc<AtomicBool>,
) -> Result<(cpal::Stream, StreamFormat)> {
    let device = find_device(device)?;
    let config = select_config(&device)?;
    let channels = config.channels;

    let format = StreamFormat {
        sample_rate: config.sample_rate.0,
        channels,
    };

    let sink = Arc::clone(sink);
    let errored = Arc::clone(active);

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = downmix(data, channels);
                if let Ok(mut slot) = sink.lock() {
                    if let Some(deliver) = slot.as_mut() {
                        deliver(&mono);
                    }
                }
            },
            move |err| {
                tracing::error!(error = %err, "audio capture error");
                errored.store(false, Ordering::Release);
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    tracing::debug!(
        device = device.name().unwrap_or_default(),
        sample_rate = format.sample_rate,
        channels,
        "audio capture started"
    );

    Ok((stream, format))
}

fn find_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    match name {
        Some(name) => host
            .input_devices()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|d| d.name().is_ok_and(|n| n == name))
            .ok_or_else(|| Error::Audio(format!("input device not found: {name}"))),
        None => host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string())),
    }
}

/// Prefer an f32 config that can run at 16 kHz, else the device default
fn select_config(device: &Device) -> Result<StreamConfig> {
    let preferred = device
        .supported_input_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.sample_format() == SampleFormat::F32
                && c.min_sample_rate() <= SampleRate(SAMPLE_RATE)
                && c.max_sample_rate() >= SampleRate(SAMPLE_RATE)
        });

    if let Some(range) = preferred {
        return Ok(range.with_sample_rate(SampleRate(SAMPLE_RATE)).config());
    }

    let default = device
        .default_input_config()
        .map_err(|e| Error::Audio(e.to_string()))?;
    if default.sample_format() != SampleFormat::F32 {
        return Err(Error::Audio(format!(
            "unsupported sample format: {:?}",
            default.sample_format()
        )));
    }
    Ok(default.config())
}

/// Opens [`CpalSource`] streams
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalSourceFactory;

impl AudioSourceFactory for CpalSourceFactory {
    fn open(&self, device: Option<&str>) -> Result<Box<dyn AudioSource>> {
        Ok(Box::new(CpalSource::open(device)?))
    }
}

/// Names of the available input devices
///
/// # Errors
///
/// Returns error if the audio host cannot enumerate devices
pub fn list_input_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| Error::Audio(e.to_string()))?;

    Ok(devices.filter_map(|d| d.name().ok()).collect())
}
