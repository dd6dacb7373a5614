//! TOML configuration overlay and credential persistence
//!
//! `config.toml` is a partial overlay on top of built-in defaults; every
//! field is optional. Credentials live in their own file under the data
//! directory so the config file can be shared freely.

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::audio::ClipBacking;
use crate::config::{CredentialStore, DeviceCredentials, MAX_NETWORKS, NetworkCandidate};
use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ChimeConfigFile {
    /// Audio parameters
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Voice and language selection
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Cloud stage endpoint overrides (self-hosted proxies)
    #[serde(default)]
    pub endpoints: EndpointsFileConfig,

    /// Timing overrides, all in milliseconds
    #[serde(default)]
    pub timings: TimingsFileConfig,

    /// Config portal settings
    #[serde(default)]
    pub portal: PortalFileConfig,
}

/// Audio configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Fallback playback rate for headerless synthesis payloads
    pub playback_sample_rate: Option<u32>,

    /// Clip storage backing: "memory" or "spooled"
    pub backing: Option<ClipBacking>,
}

/// Voice configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// BCP-47 language code (e.g. "en-US")
    pub language: Option<String>,

    /// Synthesis voice identifier
    pub voice: Option<String>,
}

/// Endpoint overrides
#[derive(Debug, Default, Deserialize)]
pub struct EndpointsFileConfig {
    pub recognize: Option<String>,
    pub infer: Option<String>,
    pub synthesize: Option<String>,
}

/// Timing overrides in milliseconds
#[derive(Debug, Default, Deserialize)]
pub struct TimingsFileConfig {
    pub join_timeout_ms: Option<u64>,
    pub link_dwell_ms: Option<u64>,
    pub capture_ms: Option<u64>,
    pub fault_dwell_ms: Option<u64>,
    pub debounce_ms: Option<u64>,
    pub config_hold_ms: Option<u64>,
}

/// Config portal settings
#[derive(Debug, Default, Deserialize)]
pub struct PortalFileConfig {
    /// Listen address, e.g. "0.0.0.0:8780"
    pub listen: Option<String>,
}

/// Load the TOML config file from the given path.
///
/// Returns `ChimeConfigFile::default()` if the file doesn't exist or can't
/// be parsed.
#[must_use]
pub fn load_config_file(path: &Path) -> ChimeConfigFile {
    if !path.exists() {
        return ChimeConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ChimeConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file, using defaults"
            );
            ChimeConfigFile::default()
        }
    }
}

/// On-disk credentials schema
#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    networks: Vec<NetworkEntry>,

    #[serde(default)]
    recognize_key: String,

    #[serde(default)]
    infer_key: String,

    #[serde(default)]
    synthesize_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct NetworkEntry {
    ssid: String,

    #[serde(default)]
    passphrase: String,
}

/// Credential storage backed by a TOML file in the data directory
pub struct TomlCredentialStore {
    path: PathBuf,
}

impl TomlCredentialStore {
    /// Create a store backed by the given file path
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for TomlCredentialStore {
    fn read_credentials(&self) -> Result<DeviceCredentials> {
        if !self.path.exists() {
            return Ok(DeviceCredentials::empty());
        }

        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))?;
        let parsed: CredentialsFile = toml::from_str(&content)?;

        let networks = parsed
            .networks
            .into_iter()
            .take(MAX_NETWORKS)
            .filter(|n| !n.ssid.is_empty())
            .map(|n| NetworkCandidate {
                ssid: n.ssid,
                passphrase: SecretString::from(n.passphrase),
            })
            .collect();

        Ok(DeviceCredentials {
            networks,
            recognize_key: SecretString::from(parsed.recognize_key),
            infer_key: SecretString::from(parsed.infer_key),
            synthesize_key: SecretString::from(parsed.synthesize_key),
        })
    }

    fn write_credentials(&self, credentials: &DeviceCredentials) -> Result<()> {
        let file = CredentialsFile {
            networks: credentials
                .networks
                .iter()
                .take(MAX_NETWORKS)
                .map(|n| NetworkEntry {
                    ssid: n.ssid.clone(),
                    passphrase: n.passphrase.expose_secret().to_owned(),
                })
                .collect(),
            recognize_key: credentials.recognize_key.expose_secret().to_owned(),
            infer_key: credentials.infer_key.expose_secret().to_owned(),
            synthesize_key: credentials.synthesize_key.expose_secret().to_owned(),
        };

        let content =
            toml::to_string_pretty(&file).map_err(|e| Error::Config(e.to_string()))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(&self.path, content)
            .map_err(|e| Error::Storage(format!("{}: {e}", self.path.display())))?;

        tracing::info!(path = %self.path.display(), "credentials saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlCredentialStore::new(dir.path().join("credentials.toml"));

        let credentials = DeviceCredentials {
            networks: vec![NetworkCandidate {
                ssid: "upstairs".to_string(),
                passphrase: SecretString::from("hunter2".to_string()),
            }],
            recognize_key: SecretString::from("rk".to_string()),
            infer_key: SecretString::from("ik".to_string()),
            synthesize_key: SecretString::from("sk".to_string()),
        };
        store.write_credentials(&credentials).unwrap();

        let read = store.read_credentials().unwrap();
        assert_eq!(read.networks.len(), 1);
        assert_eq!(read.networks[0].ssid, "upstairs");
        assert_eq!(read.networks[0].passphrase.expose_secret(), "hunter2");
        assert!(read.is_provisioned());
    }

    #[test]
    fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlCredentialStore::new(dir.path().join("nope.toml"));
        let read = store.read_credentials().unwrap();
        assert!(!read.has_networks());
        assert!(!read.is_provisioned());
    }

    #[test]
    fn extra_networks_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlCredentialStore::new(dir.path().join("credentials.toml"));

        let networks = (0..5)
            .map(|i| NetworkCandidate {
                ssid: format!("net{i}"),
                passphrase: SecretString::from(String::new()),
            })
            .collect();
        let credentials = DeviceCredentials {
            networks,
            ..DeviceCredentials::empty()
        };
        store.write_credentials(&credentials).unwrap();

        assert_eq!(store.read_credentials().unwrap().networks.len(), MAX_NETWORKS);
    }

    #[test]
    fn overlay_parses_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timings]\ncapture_ms = 3000\n").unwrap();

        let overlay = load_config_file(&path);
        assert_eq!(overlay.timings.capture_ms, Some(3000));
        assert!(overlay.audio.sample_rate.is_none());
    }
}
