//! Cloud client construction tests
//!
//! Stage request/response handling is covered by unit tests next to each
//! stage; these cover the client's credential validation.

use secrecy::SecretString;

use chime::cloud::PipelineClient;
use chime::config::{DeviceCredentials, Endpoints, NetworkCandidate, VoiceConfig};
use chime::Error;

fn endpoints() -> Endpoints {
    Endpoints {
        recognize: "http://127.0.0.1:1/recognize".to_string(),
        infer: "http://127.0.0.1:1/infer".to_string(),
        synthesize: "http://127.0.0.1:1/synthesize".to_string(),
    }
}

fn voice() -> VoiceConfig {
    VoiceConfig {
        language: "en-US".to_string(),
        voice: "en-US-Wavenet-D".to_string(),
    }
}

fn provisioned() -> DeviceCredentials {
    DeviceCredentials {
        networks: vec![NetworkCandidate {
            ssid: "net".to_string(),
            passphrase: SecretString::from(String::new()),
        }],
        recognize_key: SecretString::from("rk".to_string()),
        infer_key: SecretString::from("ik".to_string()),
        synthesize_key: SecretString::from("sk".to_string()),
    }
}

#[test]
fn client_builds_with_all_keys() {
    assert!(PipelineClient::new(&provisioned(), &voice(), endpoints()).is_ok());
}

#[test]
fn client_rejects_missing_keys() {
    let mut credentials = provisioned();
    credentials.infer_key = SecretString::from(String::new());
    assert!(matches!(
        PipelineClient::new(&credentials, &voice(), endpoints()),
        Err(Error::Config(_))
    ));

    assert!(matches!(
        PipelineClient::new(&DeviceCredentials::empty(), &voice(), endpoints()),
        Err(Error::Config(_))
    ));
}
