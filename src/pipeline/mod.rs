//! Voice pipeline orchestrator
//!
//! One state machine sequences every interaction cycle: capture →
//! recognition → inference → synthesis → playback. Inputs are sampled once
//! per tick; cloud calls and peripheral transfers run to completion inside
//! the tick that issues them, so at most one call is ever outstanding and
//! the active clip is exclusively owned for the whole cycle. Every stage
//! failure lands in `Fault`, which recovers to `Ready` on a timer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::audio::buffer::{AudioClip, CaptureBuffer};
use crate::audio::io::{CaptureSource, PlaybackSink};
use crate::audio::wav::{self, WavSpec};
use crate::cloud::PipelineStages;
use crate::codec::{self, StreamEncoder};
use crate::config::{AudioConfig, CredentialStore, Timings};
use crate::display::StatusDisplay;
use crate::error::FaultKind;
use crate::net::NetworkLink;
use crate::{Error, Result};

/// Read size when streaming a clip through the encoder or to playback.
///
/// Not a multiple of three, so the encoder's carry is active on every
/// chunked clip.
const STREAM_CHUNK: usize = 4096;

/// Externally visible pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    AwaitingNetwork,
    NetworkReady,
    Ready,
    Capturing,
    Recognizing,
    Inferring,
    Synthesizing,
    Playing,
    Fault,
}

/// A stage failure being shown to the operator
#[derive(Debug, Clone)]
pub struct FaultRecord {
    /// Class of the failure
    pub kind: FaultKind,

    /// Short human-readable message
    pub message: String,
}

impl FaultRecord {
    fn from_error(error: &Error) -> Self {
        Self {
            kind: error.fault_kind(),
            message: error.to_string(),
        }
    }
}

/// Snapshot of the physical inputs, sampled once per tick
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSample {
    /// Capture trigger is asserted this tick
    pub talk_pressed: bool,

    /// Config-entry input is held down this tick
    pub config_held: bool,
}

/// Request to leave the pipeline for an external collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    /// Hand control to the config portal; the caller re-enters the
    /// pipeline at `Idle` afterwards
    ConfigPortal,
}

/// Everything the orchestrator drives, behind seams
pub struct Collaborators {
    pub stages: Box<dyn PipelineStages>,
    pub display: Box<dyn StatusDisplay>,
    pub network: Box<dyn NetworkLink>,
    pub capture: Box<dyn CaptureSource>,
    pub playback: Box<dyn PlaybackSink>,
    pub credentials: Arc<dyn CredentialStore>,
}

/// Current state plus the data that travels with it
enum Phase {
    Idle,
    AwaitingNetwork { since: Instant },
    NetworkReady { since: Instant },
    Ready,
    Capturing { buffer: CaptureBuffer, started: Instant },
    Recognizing { clip: AudioClip },
    Inferring { transcript: String },
    Synthesizing { reply: String },
    Playing { clip: AudioClip, offset: usize },
    Fault { record: FaultRecord, since: Instant },
}

impl Phase {
    const fn state(&self) -> PipelineState {
        match self {
            Self::Idle => PipelineState::Idle,
            Self::AwaitingNetwork { .. } => PipelineState::AwaitingNetwork,
            Self::NetworkReady { .. } => PipelineState::NetworkReady,
            Self::Ready => PipelineState::Ready,
            Self::Capturing { .. } => PipelineState::Capturing,
            Self::Recognizing { .. } => PipelineState::Recognizing,
            Self::Inferring { .. } => PipelineState::Inferring,
            Self::Synthesizing { .. } => PipelineState::Synthesizing,
            Self::Playing { .. } => PipelineState::Playing,
            Self::Fault { .. } => PipelineState::Fault,
        }
    }
}

/// The voice pipeline state machine
pub struct Orchestrator {
    timings: Timings,
    audio: AudioConfig,
    spool_dir: PathBuf,
    collab: Collaborators,
    phase: Phase,
    last_trigger: Option<Instant>,
    config_held_since: Option<Instant>,
}

impl Orchestrator {
    /// Create an orchestrator in `Idle`
    #[must_use]
    pub fn new(
        timings: Timings,
        audio: AudioConfig,
        spool_dir: PathBuf,
        collab: Collaborators,
    ) -> Self {
        Self {
            timings,
            audio,
            spool_dir,
            collab,
            phase: Phase::Idle,
            last_trigger: None,
            config_held_since: None,
        }
    }

    /// Current pipeline state
    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.phase.state()
    }

    /// The active fault, if the pipeline is in `Fault`
    #[must_use]
    pub fn fault(&self) -> Option<&FaultRecord> {
        match &self.phase {
            Phase::Fault { record, .. } => Some(record),
            _ => None,
        }
    }

    /// Return to `Idle`, e.g. after the config portal hands control back
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.last_trigger = None;
        self.config_held_since = None;
    }

    /// Advance the state machine by one polled tick.
    ///
    /// Runs to completion: any cloud call or peripheral transfer issued by
    /// this tick blocks until it finishes. Returns an [`Escape`] when
    /// control must pass to the config portal.
    #[allow(clippy::future_not_send)]
    pub async fn tick(&mut self, now: Instant, input: InputSample) -> Option<Escape> {
        // The long-press escape hatch is its own continuously-sampled timer,
        // reset the moment the input is released. At boot (`Idle`) the
        // config input enters the portal immediately instead.
        if matches!(self.phase, Phase::Idle) {
            self.config_held_since = None;
        } else if input.config_held {
            let held_since = *self.config_held_since.get_or_insert(now);
            if now.duration_since(held_since) >= self.timings.config_hold {
                self.config_held_since = None;
                self.collab.capture.stop();
                self.collab.display.show("Entering setup...");
                self.phase = Phase::Idle;
                return Some(Escape::ConfigPortal);
            }
        } else {
            self.config_held_since = None;
        }

        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        let (next, escape) = self.advance(phase, now, input).await;
        self.phase = next;
        escape
    }

    async fn advance(
        &mut self,
        phase: Phase,
        now: Instant,
        input: InputSample,
    ) -> (Phase, Option<Escape>) {
        match phase {
            Phase::Idle => {
                if input.config_held {
                    self.collab.display.show("Entering setup...");
                    return (Phase::Idle, Some(Escape::ConfigPortal));
                }
                let credentials = match self.collab.credentials.read_credentials() {
                    Ok(credentials) => credentials,
                    Err(e) => {
                        tracing::warn!(error = %e, "credential read failed");
                        return (Phase::Idle, Some(Escape::ConfigPortal));
                    }
                };
                if !credentials.has_networks() {
                    tracing::info!("no networks configured");
                    return (Phase::Idle, Some(Escape::ConfigPortal));
                }
                self.collab.network.begin_join(&credentials.networks);
                self.collab.display.show("Connecting...");
                (Phase::AwaitingNetwork { since: now }, None)
            }

            Phase::AwaitingNetwork { since } => {
                if self.collab.network.is_joined() {
                    self.collab.display.show("Network up");
                    (Phase::NetworkReady { since: now }, None)
                } else if now.duration_since(since) >= self.timings.join_timeout {
                    tracing::warn!(error = %Error::JoinTimeout, "escaping to config portal");
                    self.collab.display.show("Entering setup...");
                    (Phase::Idle, Some(Escape::ConfigPortal))
                } else {
                    (Phase::AwaitingNetwork { since }, None)
                }
            }

            Phase::NetworkReady { since } => {
                if now.duration_since(since) >= self.timings.link_dwell {
                    self.show_ready();
                    (Phase::Ready, None)
                } else {
                    (Phase::NetworkReady { since }, None)
                }
            }

            Phase::Ready => {
                if input.talk_pressed && self.debounced(now) {
                    self.last_trigger = Some(now);
                    match self.begin_capture(now) {
                        Ok(next) => (next, None),
                        Err(e) => (self.enter_fault(now, &e), None),
                    }
                } else {
                    (Phase::Ready, None)
                }
            }

            Phase::Capturing { mut buffer, started } => {
                match self.collab.capture.read() {
                    Ok(bytes) => {
                        if let Err(e) = buffer.append(&bytes) {
                            self.collab.capture.stop();
                            return (self.enter_fault(now, &e), None);
                        }
                    }
                    Err(e) => {
                        self.collab.capture.stop();
                        return (self.enter_fault(now, &e), None);
                    }
                }

                if now.duration_since(started) < self.timings.capture_duration {
                    return (Phase::Capturing { buffer, started }, None);
                }

                self.collab.capture.stop();
                match buffer.finalize() {
                    Ok(clip) if clip.is_empty() => {
                        release_quietly(clip);
                        (self.enter_fault(now, &Error::EmptyAudio), None)
                    }
                    Ok(clip) => {
                        self.collab.display.show("Transcribing...");
                        (Phase::Recognizing { clip }, None)
                    }
                    Err(e) => (self.enter_fault(now, &e), None),
                }
            }

            Phase::Recognizing { mut clip } => {
                let sample_rate = clip.spec().sample_rate;
                let audio = match encode_clip(&mut clip) {
                    Ok(audio) => audio,
                    Err(e) => {
                        release_quietly(clip);
                        return (self.enter_fault(now, &e), None);
                    }
                };
                release_quietly(clip);

                match self.collab.stages.recognize(&audio, sample_rate).await {
                    Ok(transcript) => {
                        self.collab.display.show("Thinking...");
                        (Phase::Inferring { transcript }, None)
                    }
                    Err(e) => (self.enter_fault(now, &e), None),
                }
            }

            Phase::Inferring { transcript } => {
                match self.collab.stages.infer(&transcript).await {
                    Ok(reply) => {
                        self.collab.display.show("Rendering speech...");
                        (Phase::Synthesizing { reply }, None)
                    }
                    Err(e) => (self.enter_fault(now, &e), None),
                }
            }

            Phase::Synthesizing { reply } => match self.synthesize_clip(&reply).await {
                Ok(clip) => {
                    if let Err(e) = self.collab.playback.begin(clip.spec()) {
                        release_quietly(clip);
                        return (self.enter_fault(now, &e), None);
                    }
                    self.collab.display.show("Playing...");
                    (Phase::Playing { clip, offset: 0 }, None)
                }
                Err(e) => (self.enter_fault(now, &e), None),
            },

            Phase::Playing { mut clip, offset } => {
                let chunk = match clip.read_chunk(offset, STREAM_CHUNK) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        release_quietly(clip);
                        return (self.enter_fault(now, &e), None);
                    }
                };

                if chunk.is_empty() {
                    let drained = self.collab.playback.finish();
                    release_quietly(clip);
                    if let Err(e) = drained {
                        return (self.enter_fault(now, &e), None);
                    }
                    self.show_ready();
                    return (Phase::Ready, None);
                }

                if let Err(e) = self.collab.playback.write(&chunk) {
                    release_quietly(clip);
                    return (self.enter_fault(now, &e), None);
                }
                (
                    Phase::Playing {
                        clip,
                        offset: offset + chunk.len(),
                    },
                    None,
                )
            }

            Phase::Fault { record, since } => {
                if now.duration_since(since) >= self.timings.fault_dwell {
                    self.show_ready();
                    (Phase::Ready, None)
                } else {
                    (Phase::Fault { record, since }, None)
                }
            }
        }
    }

    /// A trigger counts only if enough time passed since the last accepted one
    fn debounced(&self, now: Instant) -> bool {
        self.last_trigger
            .is_none_or(|last| now.duration_since(last) >= self.timings.debounce)
    }

    fn begin_capture(&mut self, now: Instant) -> Result<Phase> {
        let buffer = CaptureBuffer::begin_capture(
            self.audio.backing,
            self.timings.capture_duration,
            self.audio.sample_rate,
            self.audio.bits_per_sample,
            &self.spool_dir,
        )?;
        self.collab.capture.start()?;
        self.collab.display.show("Listening...");
        Ok(Phase::Capturing {
            buffer,
            started: now,
        })
    }

    /// Decode a synthesis payload into a playback clip.
    ///
    /// LINEAR16 responses arrive wrapped in a RIFF container; anything else
    /// is treated as raw PCM at the configured playback rate.
    async fn synthesize_clip(&mut self, reply: &str) -> Result<AudioClip> {
        let content = self.collab.stages.synthesize(reply).await?;
        let bytes = codec::decode(&content);
        if bytes.is_empty() {
            return Err(Error::EmptyAudio);
        }

        if bytes.len() > wav::HEADER_LEN && bytes.starts_with(b"RIFF") {
            let mut cursor = std::io::Cursor::new(&bytes);
            let (spec, data_len) = wav::read_header(&mut cursor)?;
            let end = (wav::HEADER_LEN + data_len as usize).min(bytes.len());
            let pcm = &bytes[wav::HEADER_LEN..end];
            if pcm.is_empty() {
                return Err(Error::EmptyAudio);
            }
            AudioClip::from_pcm(pcm, spec)
        } else {
            AudioClip::from_pcm(
                &bytes,
                WavSpec {
                    channels: 1,
                    sample_rate: self.audio.playback_sample_rate,
                    bits_per_sample: self.audio.bits_per_sample,
                },
            )
        }
    }

    fn enter_fault(&mut self, now: Instant, error: &Error) -> Phase {
        let record = FaultRecord::from_error(error);
        tracing::error!(kind = ?record.kind, message = %record.message, "pipeline fault");
        self.collab.display.show(&format!("Error: {}", record.message));
        Phase::Fault { record, since: now }
    }

    fn show_ready(&mut self) {
        self.collab.display.show("Ready\nPress to talk");
    }
}

/// Stream a whole clip through the encoder, chunk by chunk
fn encode_clip(clip: &mut AudioClip) -> Result<String> {
    let mut encoder = StreamEncoder::new();
    let mut text = String::with_capacity(clip.len().div_ceil(3) * 4 + 4);
    let mut offset = 0;
    loop {
        let chunk = clip.read_chunk(offset, STREAM_CHUNK)?;
        if chunk.is_empty() {
            break;
        }
        offset += chunk.len();
        text.push_str(&encoder.encode_chunk(&chunk));
    }
    text.push_str(&encoder.finish());
    Ok(text)
}

/// Release a clip whose cycle is over; a failed spool removal is not a fault
fn release_quietly(clip: AudioClip) {
    if let Err(e) = clip.release() {
        tracing::warn!(error = %e, "clip release failed");
    }
}
