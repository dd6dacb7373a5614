//! Chime - push-to-talk voice assistant appliance
//!
//! One button press runs one interaction cycle: capture a short utterance,
//! transcribe it via a cloud speech API, send the transcript to a cloud
//! language model, synthesize the reply, play it back.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                     Appliance                        │
//! │   tick loop  │  inputs  │  display  │  portal escape │
//! └───────────────────────┬──────────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────────┐
//! │                    Orchestrator                      │
//! │  Ready → Capturing → Recognizing → Inferring →       │
//! │          Synthesizing → Playing → Ready   (Fault ⟲)  │
//! └───────────────────────┬──────────────────────────────┘
//!                         │
//! ┌───────────────────────▼──────────────────────────────┐
//! │  Bounded clip buffer ⇄ streaming base64 ⇄ cloud API  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! The pipeline runs on a single logical worker: inputs are polled once per
//! tick and every cloud call or peripheral transfer blocks its tick to
//! completion, so no two calls are ever outstanding at once.

pub mod audio;
pub mod cloud;
pub mod codec;
pub mod config;
pub mod daemon;
pub mod display;
pub mod error;
pub mod input;
pub mod net;
pub mod pipeline;
pub mod portal;
pub mod setup;

pub use config::Config;
pub use daemon::Appliance;
pub use error::{Error, FaultKind, Result};
pub use pipeline::{
    Collaborators, Escape, FaultRecord, InputSample, Orchestrator, PipelineState,
};
