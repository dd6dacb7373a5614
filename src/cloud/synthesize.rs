//! Synthesize stage: reply text to base64 audio

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::PipelineClient;

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    #[serde(rename = "audioConfig")]
    audio_config: SynthesisAudioConfig<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct VoiceSelection<'a> {
    #[serde(rename = "languageCode")]
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct SynthesisAudioConfig<'a> {
    #[serde(rename = "audioEncoding")]
    audio_encoding: &'a str,
    #[serde(rename = "speakingRate")]
    speaking_rate: f64,
    pitch: f64,
}

#[derive(Deserialize)]
struct SynthesizeResponse {
    #[serde(rename = "audioContent")]
    audio_content: Option<String>,
}

/// Pull the audio content field out of a response body
fn parse_audio_content(body: &str) -> Result<String> {
    let response: SynthesizeResponse = serde_json::from_str(body)?;
    match response.audio_content {
        Some(content) if !content.is_empty() => Ok(content),
        _ => Err(Error::NoAudioContent),
    }
}

impl PipelineClient {
    pub(super) async fn synthesize_stage(&self, text: &str) -> Result<String> {
        tracing::debug!(text_chars = text.len(), voice = %self.voice, "starting synthesis");

        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language,
                name: &self.voice,
            },
            audio_config: SynthesisAudioConfig {
                audio_encoding: "LINEAR16",
                speaking_rate: 1.0,
                pitch: 0.0,
            },
        };

        let url = self.keyed_url(&self.endpoints.synthesize, &self.synthesize_key);
        let body = self.post_json(&url, &request).await?;
        let content = parse_audio_content(&body)?;

        tracing::info!(audio_chars = content.len(), "synthesis complete");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_is_bit_exact() {
        let request = SynthesizeRequest {
            input: SynthesisInput { text: "It is noon." },
            voice: VoiceSelection {
                language_code: "en-US",
                name: "en-US-Wavenet-D",
            },
            audio_config: SynthesisAudioConfig {
                audio_encoding: "LINEAR16",
                speaking_rate: 1.0,
                pitch: 0.0,
            },
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"input":{"text":"It is noon."},"voice":{"languageCode":"en-US","name":"en-US-Wavenet-D"},"audioConfig":{"audioEncoding":"LINEAR16","speakingRate":1.0,"pitch":0.0}}"#
        );
    }

    #[test]
    fn parses_audio_content() {
        assert_eq!(
            parse_audio_content(r#"{"audioContent":"TWFu"}"#).unwrap(),
            "TWFu"
        );
    }

    #[test]
    fn missing_or_empty_content_is_no_audio_content() {
        assert!(matches!(
            parse_audio_content("{}"),
            Err(Error::NoAudioContent)
        ));
        assert!(matches!(
            parse_audio_content(r#"{"audioContent":""}"#),
            Err(Error::NoAudioContent)
        ));
    }

    #[test]
    fn malformed_body_is_parse_error() {
        assert!(matches!(
            parse_audio_content("audio"),
            Err(Error::Parse(_))
        ));
    }
}
