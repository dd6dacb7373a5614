//! Configuration management for the chime appliance
//!
//! Runtime configuration is assembled from built-in defaults overlaid with
//! an optional TOML file. Credentials (network candidates and the three API
//! keys) are persisted separately and owned by a [`CredentialStore`]; the
//! pipeline core only ever reads them.

pub mod file;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use secrecy::{ExposeSecret, SecretString};

use crate::audio::ClipBacking;
use crate::{Error, Result};

/// Capture/recognition sample rate (16 kHz for speech)
pub const DEFAULT_SAMPLE_RATE: u32 = 16_000;

/// Sample width for capture and playback
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;

/// Playback rate assumed for synthesis payloads without a container header
pub const DEFAULT_PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// Maximum number of stored network candidates
pub const MAX_NETWORKS: usize = 3;

/// Default speech recognition endpoint
pub const DEFAULT_RECOGNIZE_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

/// Default language model endpoint
pub const DEFAULT_INFER_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent";

/// Default speech synthesis endpoint
pub const DEFAULT_SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Default synthesis voice
pub const DEFAULT_VOICE: &str = "en-US-Wavenet-D";

/// Default recognition/synthesis language
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Default config portal listen address
pub const DEFAULT_PORTAL_LISTEN: &str = "0.0.0.0:8780";

/// Chime appliance configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Data directory (credentials, clip spool)
    pub data_dir: PathBuf,

    /// Audio capture/playback parameters
    pub audio: AudioConfig,

    /// Voice and language selection for the cloud stages
    pub voice: VoiceConfig,

    /// Cloud stage endpoints
    pub endpoints: Endpoints,

    /// State machine timing constants
    pub timings: Timings,

    /// Config portal listen address
    pub portal_listen: SocketAddr,
}

/// Audio parameters
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Sample width in bits (16-bit PCM)
    pub bits_per_sample: u16,

    /// Fallback playback rate for headerless synthesis payloads
    pub playback_sample_rate: u32,

    /// Clip storage backing for the capture path
    pub backing: ClipBacking,
}

/// Voice selection for the cloud stages
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// BCP-47 language code
    pub language: String,

    /// Synthesis voice identifier
    pub voice: String,
}

/// Cloud stage endpoint base URLs (API key is appended per request)
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub recognize: String,
    pub infer: String,
    pub synthesize: String,
}

/// State machine timing constants
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    /// Input poll interval
    pub tick_interval: Duration,

    /// How long a join attempt may run before escaping to the portal
    pub join_timeout: Duration,

    /// Confirmation dwell after the link comes up
    pub link_dwell: Duration,

    /// Fixed utterance capture length
    pub capture_duration: Duration,

    /// How long a fault is displayed before auto-recovery
    pub fault_dwell: Duration,

    /// Minimum spacing between accepted capture triggers
    pub debounce: Duration,

    /// Config input hold time for the escape hatch
    pub config_hold: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            join_timeout: Duration::from_secs(30),
            link_dwell: Duration::from_secs(2),
            capture_duration: Duration::from_millis(5000),
            fault_dwell: Duration::from_secs(5),
            debounce: Duration::from_millis(200),
            config_hold: Duration::from_secs(3),
        }
    }
}

impl Config {
    /// Load configuration from the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns error if the platform directories cannot be determined or the
    /// data directory cannot be created.
    pub fn load() -> Result<Self> {
        let dirs = ProjectDirs::from("dev", "omni", "chime")
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?;
        let data_dir = dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let overlay = file::load_config_file(&dirs.config_dir().join("config.toml"));
        Ok(Self::from_overlay(data_dir, &overlay))
    }

    /// Built-in defaults rooted at the given data directory
    #[must_use]
    pub fn with_defaults(data_dir: PathBuf) -> Self {
        Self::from_overlay(data_dir, &file::ChimeConfigFile::default())
    }

    fn from_overlay(data_dir: PathBuf, overlay: &file::ChimeConfigFile) -> Self {
        let defaults = Timings::default();
        let ms = Duration::from_millis;

        let portal_listen = overlay
            .portal
            .listen
            .as_deref()
            .and_then(|addr| match addr.parse() {
                Ok(listen) => Some(listen),
                Err(e) => {
                    tracing::warn!(addr, error = %e, "invalid portal listen address, using default");
                    None
                }
            })
            .unwrap_or_else(|| {
                DEFAULT_PORTAL_LISTEN
                    .parse()
                    .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8780)))
            });

        Self {
            data_dir,
            audio: AudioConfig {
                sample_rate: overlay.audio.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
                bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
                playback_sample_rate: overlay
                    .audio
                    .playback_sample_rate
                    .unwrap_or(DEFAULT_PLAYBACK_SAMPLE_RATE),
                backing: overlay.audio.backing.unwrap_or_default(),
            },
            voice: VoiceConfig {
                language: overlay
                    .voice
                    .language
                    .clone()
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
                voice: overlay
                    .voice
                    .voice
                    .clone()
                    .unwrap_or_else(|| DEFAULT_VOICE.to_string()),
            },
            endpoints: Endpoints {
                recognize: overlay
                    .endpoints
                    .recognize
                    .clone()
                    .unwrap_or_else(|| DEFAULT_RECOGNIZE_URL.to_string()),
                infer: overlay
                    .endpoints
                    .infer
                    .clone()
                    .unwrap_or_else(|| DEFAULT_INFER_URL.to_string()),
                synthesize: overlay
                    .endpoints
                    .synthesize
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SYNTHESIZE_URL.to_string()),
            },
            timings: Timings {
                tick_interval: defaults.tick_interval,
                join_timeout: overlay
                    .timings
                    .join_timeout_ms
                    .map_or(defaults.join_timeout, ms),
                link_dwell: overlay.timings.link_dwell_ms.map_or(defaults.link_dwell, ms),
                capture_duration: overlay
                    .timings
                    .capture_ms
                    .map_or(defaults.capture_duration, ms),
                fault_dwell: overlay.timings.fault_dwell_ms.map_or(defaults.fault_dwell, ms),
                debounce: overlay.timings.debounce_ms.map_or(defaults.debounce, ms),
                config_hold: overlay
                    .timings
                    .config_hold_ms
                    .map_or(defaults.config_hold, ms),
            },
            portal_listen,
        }
    }

    /// Path of the persisted credentials file
    #[must_use]
    pub fn credentials_path(&self) -> PathBuf {
        self.data_dir.join("credentials.toml")
    }
}

/// One stored network to try joining
#[derive(Debug)]
pub struct NetworkCandidate {
    pub ssid: String,
    pub passphrase: SecretString,
}

/// Persisted join candidates and cloud API keys.
///
/// Read-only to the pipeline core; written only by the portal and the setup
/// wizard through a [`CredentialStore`].
#[derive(Debug)]
pub struct DeviceCredentials {
    pub networks: Vec<NetworkCandidate>,
    pub recognize_key: SecretString,
    pub infer_key: SecretString,
    pub synthesize_key: SecretString,
}

impl DeviceCredentials {
    /// Credentials with nothing configured
    #[must_use]
    pub fn empty() -> Self {
        Self {
            networks: Vec::new(),
            recognize_key: SecretString::from(String::new()),
            infer_key: SecretString::from(String::new()),
            synthesize_key: SecretString::from(String::new()),
        }
    }

    /// Whether at least one network candidate is stored
    #[must_use]
    pub fn has_networks(&self) -> bool {
        !self.networks.is_empty()
    }

    /// Whether all three API keys are present
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        !self.recognize_key.expose_secret().is_empty()
            && !self.infer_key.expose_secret().is_empty()
            && !self.synthesize_key.expose_secret().is_empty()
    }
}

/// Persisted credential storage (the appliance's settings store)
pub trait CredentialStore: Send + Sync {
    /// Load credentials; missing backing storage yields empty credentials.
    ///
    /// # Errors
    ///
    /// Returns error if the store exists but cannot be read or parsed.
    fn read_credentials(&self) -> Result<DeviceCredentials>;

    /// Persist credentials, replacing the stored set.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written.
    fn write_credentials(&self, credentials: &DeviceCredentials) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_pipeline() {
        let config = Config::with_defaults(PathBuf::from("/tmp/chime-test"));
        assert_eq!(config.audio.sample_rate, 16_000);
        assert_eq!(config.timings.capture_duration, Duration::from_millis(5000));
        assert_eq!(config.timings.fault_dwell, Duration::from_secs(5));
        assert_eq!(config.timings.debounce, Duration::from_millis(200));
        assert!(config.endpoints.recognize.contains("speech"));
    }

    #[test]
    fn empty_credentials_are_not_provisioned() {
        let credentials = DeviceCredentials::empty();
        assert!(!credentials.is_provisioned());
        assert!(!credentials.has_networks());
    }
}
