//! Audio peripheral drivers
//!
//! Microphone capture and speaker playback behind the traits the pipeline
//! polls. Both sides speak 16-bit little-endian mono PCM bytes, matching
//! what the cloud stages consume and produce.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig};

use crate::audio::wav::WavSpec;
use crate::{Error, Result};

/// Polled source of PCM bytes
pub trait CaptureSource {
    /// Open the input device and start filling the internal buffer.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened.
    fn start(&mut self) -> Result<()>;

    /// Drain whatever has arrived since the last call.
    ///
    /// # Errors
    ///
    /// Returns error if the device failed mid-capture.
    fn read(&mut self) -> Result<Vec<u8>>;

    /// Stop the input stream
    fn stop(&mut self);
}

/// Sink for PCM bytes
pub trait PlaybackSink {
    /// Prepare the output device for a clip with the given layout.
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened.
    fn begin(&mut self, spec: WavSpec) -> Result<()>;

    /// Queue the next chunk of the clip.
    ///
    /// # Errors
    ///
    /// Returns error if the device failed mid-playback.
    fn write(&mut self, pcm: &[u8]) -> Result<()>;

    /// Block until everything queued has been played.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream fails.
    fn finish(&mut self) -> Result<()>;
}

/// Captures from the default input device via cpal
pub struct CpalCapture {
    sample_rate: u32,
    buffer: Arc<Mutex<Vec<f32>>>,
    stream: Option<Stream>,
}

impl CpalCapture {
    /// Create a capture driver for the given sample rate
    #[must_use]
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            buffer: Arc::new(Mutex::new(Vec::new())),
            stream: None,
        }
    }
}

impl CaptureSource for CpalCapture {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Audio("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(self.sample_rate)
                    && c.max_sample_rate() >= SampleRate(self.sample_rate)
            })
            .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

        let config: StreamConfig = supported_config
            .with_sample_rate(SampleRate(self.sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            "audio capture initialized"
        );

        let buffer = Arc::clone(&self.buffer);
        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut buf) = buffer.lock() {
                        buf.extend_from_slice(data);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        let samples = self
            .buffer
            .lock()
            .map(|mut buf| std::mem::take(&mut *buf))
            .unwrap_or_default();

        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        Ok(bytes)
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
        if let Ok(mut buf) = self.buffer.lock() {
            buf.clear();
        }
    }
}

/// Plays to the default output device via cpal
#[derive(Default)]
pub struct CpalPlayback {
    spec: Option<WavSpec>,
    samples: Vec<f32>,
}

impl CpalPlayback {
    /// Create a playback driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PlaybackSink for CpalPlayback {
    fn begin(&mut self, spec: WavSpec) -> Result<()> {
        if spec.bits_per_sample != 16 || spec.channels != 1 {
            return Err(Error::Audio(format!(
                "unsupported playback layout: {} ch / {} bit",
                spec.channels, spec.bits_per_sample
            )));
        }
        self.spec = Some(spec);
        self.samples.clear();
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        for pair in pcm.chunks_exact(2) {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            self.samples.push(f32::from(value) / 32768.0);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let spec = self
            .spec
            .take()
            .ok_or_else(|| Error::Audio("playback not begun".to_string()))?;
        let samples = std::mem::take(&mut self.samples);
        if samples.is_empty() {
            return Ok(());
        }
        play_samples_blocking(&samples, spec.sample_rate)
    }
}

/// Drive the output stream until every sample has been rendered
fn play_samples_blocking(samples: &[f32], sample_rate: u32) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

    let supported_config = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| {
            c.channels() == 1
                && c.min_sample_rate() <= SampleRate(sample_rate)
                && c.max_sample_rate() >= SampleRate(sample_rate)
        })
        .or_else(|| {
            // fallback: stereo output, mono content duplicated per frame
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
        })
        .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

    let config: StreamConfig = supported_config
        .with_sample_rate(SampleRate(sample_rate))
        .config();
    let channels = config.channels as usize;

    let queue = Arc::new(Mutex::new(samples.to_vec()));
    let position = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(false));

    let queue_cb = Arc::clone(&queue);
    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let queue = queue_cb.lock().unwrap();
                let mut pos = position_cb.lock().unwrap();

                for frame in data.chunks_mut(channels) {
                    let sample = if *pos < queue.len() {
                        queue[*pos]
                    } else {
                        *finished_cb.lock().unwrap() = true;
                        0.0
                    };
                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                    if *pos < queue.len() {
                        *pos += 1;
                    }
                }
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Audio(e.to_string()))?;

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate);
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(duration_ms + 500);

    while !*finished.lock().unwrap() {
        if start.elapsed() > timeout {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(50));
    }

    // let the device drain its last buffer
    std::thread::sleep(std::time::Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");
    Ok(())
}
