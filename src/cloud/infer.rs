//! Infer stage: transcript to language model reply

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

use super::PipelineClient;

#[derive(Serialize)]
struct InferRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct InferResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Pull the first part of the first candidate out of a response body
fn parse_reply(body: &str) -> Result<String> {
    let response: InferResponse = serde_json::from_str(body)?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or(Error::NoCandidate)
}

impl PipelineClient {
    pub(super) async fn infer_stage(&self, transcript: &str) -> Result<String> {
        tracing::debug!(transcript = %transcript, "starting inference");

        let request = InferRequest {
            contents: [Content {
                parts: [Part { text: transcript }],
            }],
        };

        let url = self.keyed_url(&self.endpoints.infer, &self.infer_key);
        let body = self.post_json(&url, &request).await?;
        let reply = parse_reply(&body)?;

        tracing::info!(reply_chars = reply.len(), "inference complete");
        Ok(reply)
    }
}
