//! Appliance runtime
//!
//! Wires the collaborators together and runs the orchestrator's tick loop.
//! The pipeline and every collaborator call share one task, so all pipeline
//! state stays confined to a single logical worker; escapes hand control to
//! the config portal and then re-enter the pipeline from `Idle`.

use std::sync::Arc;
use std::time::Instant;

use tokio::time::MissedTickBehavior;

use crate::audio::{CpalCapture, CpalPlayback};
use crate::cloud::PipelineClient;
use crate::config::file::TomlCredentialStore;
use crate::config::CredentialStore;
use crate::display::ConsoleDisplay;
use crate::input::{InputSource, TermInput};
use crate::net::HostNetworkLink;
use crate::pipeline::{Collaborators, Escape, Orchestrator};
use crate::portal;
use crate::{Config, Result};

/// The chime appliance: one voice pipeline plus its escape hatch
pub struct Appliance {
    config: Config,
}

impl Appliance {
    /// Create an appliance from loaded configuration
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run until interrupted.
    ///
    /// # Errors
    ///
    /// Returns error on fatal initialization or portal failures; pipeline
    /// stage failures are handled inside the state machine and never
    /// propagate here.
    pub async fn run(self) -> Result<()> {
        let store: Arc<dyn CredentialStore> =
            Arc::new(TomlCredentialStore::new(self.config.credentials_path()));

        loop {
            match self.run_pipeline(Arc::clone(&store)).await? {
                Some(Escape::ConfigPortal) => {
                    let updated =
                        portal::run_portal(self.config.portal_listen, Arc::clone(&store)).await?;
                    tracing::info!(
                        networks = updated.networks.len(),
                        provisioned = updated.is_provisioned(),
                        "credentials updated, rejoining"
                    );
                }
                None => return Ok(()),
            }
        }
    }

    /// Drive the orchestrator until it escapes or the process is interrupted
    #[allow(clippy::future_not_send)]
    async fn run_pipeline(&self, store: Arc<dyn CredentialStore>) -> Result<Option<Escape>> {
        let credentials = store.read_credentials()?;
        if !credentials.is_provisioned() {
            tracing::warn!("API keys missing, opening config portal");
            return Ok(Some(Escape::ConfigPortal));
        }

        let stages = PipelineClient::new(
            &credentials,
            &self.config.voice,
            self.config.endpoints.clone(),
        )?;

        let collab = Collaborators {
            stages: Box::new(stages),
            display: Box::new(ConsoleDisplay::default()),
            network: Box::new(HostNetworkLink::new()),
            capture: Box::new(CpalCapture::new(self.config.audio.sample_rate)),
            playback: Box::new(CpalPlayback::new()),
            credentials: store,
        };

        let mut orchestrator = Orchestrator::new(
            self.config.timings,
            self.config.audio.clone(),
            self.config.data_dir.clone(),
            collab,
        );
        let mut input = TermInput::spawn(self.config.timings.config_hold);

        let mut ticker = tokio::time::interval(self.config.timings.tick_interval);
        // a blocking cloud call can overrun many ticks; don't replay them
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("appliance running, 't' + Enter to talk, 'c' + Enter for setup");

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("shutdown requested");
                    return Ok(None);
                }
                _ = ticker.tick() => {
                    if let Some(escape) = orchestrator.tick(Instant::now(), input.sample()).await {
                        return Ok(Some(escape));
                    }
                }
            }
        }
    }
}
