//! Recognize stage: LINEAR16 audio to transcript

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::PipelineClient;

#[derive(Serialize)]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio<'a>,
}

#[derive(Serialize)]
struct RecognitionConfig<'a> {
    encoding: &'a str,
    #[serde(rename = "sampleRateHertz")]
    sample_rate_hertz: u32,
    #[serde(rename = "languageCode")]
    language_code: &'a str,
}

#[derive(Serialize)]
struct RecognitionAudio<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
}

/// Pull the first alternative of the first result out of a response body
fn parse_transcript(body: &str) -> Result<String> {
    let response: RecognizeResponse = serde_json::from_str(body)?;
    response
        .results
        .into_iter()
        .next()
        .and_then(|result| result.alternatives.into_iter().next())
        .map(|alternative| alternative.transcript)
        .ok_or(Error::NoTranscription)
}

impl PipelineClient {
    pub(super) async fn recognize_stage(
        &self,
        audio_b64: &str,
        sample_rate_hz: u32,
    ) -> Result<String> {
        tracing::debug!(
            audio_chars = audio_b64.len(),
            sample_rate_hz,
            "starting recognition"
        );

        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: sample_rate_hz,
                language_code: &self.language,
            },
            audio: RecognitionAudio { content: audio_b64 },
        };

        let url = self.keyed_url(&self.endpoints.recognize, &self.recognize_key);
        let body = self.post_json(&url, &request).await?;
        let transcript = parse_transcript(&body)?;

        tracing::info!(transcript = %transcript, "recognition complete");
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_is_bit_exact() {
        let request = RecognizeRequest {
            config: RecognitionConfig {
                encoding: "LINEAR16",
                sample_rate_hertz: 16_000,
                language_code: "en-US",
            },
            audio: RecognitionAudio { content: "TWFu" },
        };
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"config":{"encoding":"LINEAR16","sampleRateHertz":16000,"languageCode":"en-US"},"audio":{"content":"TWFu"}}"#
        );
    }

    #[test]
    fn parses_first_alternative() {
        let body = r#"{"results":[{"alternatives":[{"transcript":"hello there","confidence":0.92},{"transcript":"hollow there"}]}]}"#;
        assert_eq!(parse_transcript(body).unwrap(), "hello there");
    }

    #[test]
    fn absent_results_is_no_transcription() {
        assert!(matches!(
            parse_transcript("{}"),
            Err(Error::NoTranscription)
        ));
        assert!(matches!(
            parse_transcript(r#"{"results":[]}"#),
            Err(Error::NoTranscription)
        ));
        assert!(matches!(
            parse_transcript(r#"{"results":[{"alternatives":[]}]}"#),
            Err(Error::NoTranscription)
        ));
    }

    #[test]
    fn malformed_body_is_parse_error() {
        assert!(matches!(
            parse_transcript("not json"),
            Err(Error::Parse(_))
        ));
    }
}
