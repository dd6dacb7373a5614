//! Shared test doubles for the pipeline collaborators
//!
//! Everything is driven without audio hardware or a network: stages are
//! scripted, capture produces a fixed chunk per poll, playback collects
//! bytes, and the clock is whatever `Instant` the test passes to `tick`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use secrecy::SecretString;

use chime::audio::io::{CaptureSource, PlaybackSink};
use chime::audio::{ClipBacking, WavSpec};
use chime::cloud::PipelineStages;
use chime::config::{
    AudioConfig, CredentialStore, DeviceCredentials, NetworkCandidate, Timings,
};
use chime::display::StatusDisplay;
use chime::net::NetworkLink;
use chime::pipeline::Collaborators;
use chime::{Error, Orchestrator, Result};

/// Scripted outcome of one cloud stage
#[derive(Clone)]
pub enum Outcome {
    Ok(String),
    HttpStatus(u16),
    EmptyResponse,
}

/// Scripted cloud stages that record call order
pub struct StubStages {
    pub recognize: Outcome,
    pub infer: Outcome,
    pub synthesize: Outcome,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl StubStages {
    pub fn new(recognize: Outcome, infer: Outcome, synthesize: Outcome) -> Self {
        Self {
            recognize,
            infer,
            synthesize,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// All three stages succeed; synthesize returns `audio_b64`
    pub fn happy(audio_b64: String) -> Self {
        Self::new(
            Outcome::Ok("what time is it".to_string()),
            Outcome::Ok("It is noon.".to_string()),
            Outcome::Ok(audio_b64),
        )
    }

    fn resolve(outcome: &Outcome, empty: Error) -> Result<String> {
        match outcome {
            Outcome::Ok(value) => Ok(value.clone()),
            Outcome::HttpStatus(code) => Err(Error::HttpStatus(*code)),
            Outcome::EmptyResponse => Err(empty),
        }
    }
}

#[async_trait]
impl PipelineStages for StubStages {
    async fn recognize(&self, _audio_b64: &str, _sample_rate_hz: u32) -> Result<String> {
        self.calls.lock().unwrap().push("recognize");
        Self::resolve(&self.recognize, Error::NoTranscription)
    }

    async fn infer(&self, _transcript: &str) -> Result<String> {
        self.calls.lock().unwrap().push("infer");
        Self::resolve(&self.infer, Error::NoCandidate)
    }

    async fn synthesize(&self, _text: &str) -> Result<String> {
        self.calls.lock().unwrap().push("synthesize");
        Self::resolve(&self.synthesize, Error::NoAudioContent)
    }
}

/// Display that records every status line
struct RecordingDisplay(Arc<Mutex<Vec<String>>>);

impl StatusDisplay for RecordingDisplay {
    fn show(&mut self, text: &str) {
        self.0.lock().unwrap().push(text.to_string());
    }
}

/// Network whose join outcome is scripted
struct ScriptedNetwork {
    join_succeeds: bool,
    joined: Arc<AtomicBool>,
}

impl NetworkLink for ScriptedNetwork {
    fn begin_join(&mut self, _candidates: &[NetworkCandidate]) {
        self.joined.store(self.join_succeeds, Ordering::SeqCst);
    }

    fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }
}

/// Capture source that yields a fixed chunk per poll
struct FixedCapture {
    chunk: Vec<u8>,
    starts: Arc<AtomicUsize>,
    running: bool,
}

impl CaptureSource for FixedCapture {
    fn start(&mut self) -> Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Vec<u8>> {
        if self.running {
            Ok(self.chunk.clone())
        } else {
            Ok(Vec::new())
        }
    }

    fn stop(&mut self) {
        self.running = false;
    }
}

/// Playback sink that collects everything written
struct CollectingPlayback {
    spec: Arc<Mutex<Option<WavSpec>>>,
    written: Arc<Mutex<Vec<u8>>>,
    finished: Arc<AtomicBool>,
}

impl PlaybackSink for CollectingPlayback {
    fn begin(&mut self, spec: WavSpec) -> Result<()> {
        *self.spec.lock().unwrap() = Some(spec);
        Ok(())
    }

    fn write(&mut self, pcm: &[u8]) -> Result<()> {
        self.written.lock().unwrap().extend_from_slice(pcm);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory credential store
struct FixedCredentials {
    networks: usize,
}

impl CredentialStore for FixedCredentials {
    fn read_credentials(&self) -> Result<DeviceCredentials> {
        Ok(DeviceCredentials {
            networks: (0..self.networks)
                .map(|i| NetworkCandidate {
                    ssid: format!("net{i}"),
                    passphrase: SecretString::from(String::new()),
                })
                .collect(),
            recognize_key: SecretString::from("rk".to_string()),
            infer_key: SecretString::from("ik".to_string()),
            synthesize_key: SecretString::from("sk".to_string()),
        })
    }

    fn write_credentials(&self, _credentials: &DeviceCredentials) -> Result<()> {
        Ok(())
    }
}

/// An orchestrator wired to test doubles, plus their inspection handles
pub struct Harness {
    pub orchestrator: Orchestrator,
    pub shown: Arc<Mutex<Vec<String>>>,
    pub capture_starts: Arc<AtomicUsize>,
    pub played: Arc<Mutex<Vec<u8>>>,
    pub playback_spec: Arc<Mutex<Option<WavSpec>>>,
    pub playback_finished: Arc<AtomicBool>,
    pub stage_calls: Arc<Mutex<Vec<&'static str>>>,
}

pub struct HarnessOptions {
    pub stages: StubStages,
    pub join_succeeds: bool,
    pub networks: usize,
    pub capture_chunk: Vec<u8>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            stages: StubStages::happy(String::new()),
            join_succeeds: true,
            networks: 1,
            // 100 ms of 16 kHz mono PCM per poll
            capture_chunk: vec![0x42; 3200],
        }
    }
}

pub fn harness(options: HarnessOptions) -> Harness {
    let shown = Arc::new(Mutex::new(Vec::new()));
    let capture_starts = Arc::new(AtomicUsize::new(0));
    let played = Arc::new(Mutex::new(Vec::new()));
    let playback_spec = Arc::new(Mutex::new(None));
    let playback_finished = Arc::new(AtomicBool::new(false));
    let stage_calls = Arc::clone(&options.stages.calls);

    let collab = Collaborators {
        stages: Box::new(options.stages),
        display: Box::new(RecordingDisplay(Arc::clone(&shown))),
        network: Box::new(ScriptedNetwork {
            join_succeeds: options.join_succeeds,
            joined: Arc::new(AtomicBool::new(false)),
        }),
        capture: Box::new(FixedCapture {
            chunk: options.capture_chunk,
            starts: Arc::clone(&capture_starts),
            running: false,
        }),
        playback: Box::new(CollectingPlayback {
            spec: Arc::clone(&playback_spec),
            written: Arc::clone(&played),
            finished: Arc::clone(&playback_finished),
        }),
        credentials: Arc::new(FixedCredentials {
            networks: options.networks,
        }),
    };

    let orchestrator = Orchestrator::new(
        Timings::default(),
        AudioConfig {
            sample_rate: 16_000,
            bits_per_sample: 16,
            playback_sample_rate: 24_000,
            backing: ClipBacking::Memory,
        },
        std::env::temp_dir(),
        collab,
    );

    Harness {
        orchestrator,
        shown,
        capture_starts,
        played,
        playback_spec,
        playback_finished,
        stage_calls,
    }
}
