//! Credential provisioning portal
//!
//! A small HTTP form over the persisted credentials, served whenever the
//! pipeline escapes for reconfiguration. The portal owns its own
//! request/response cycle; once a save succeeds it shuts down and hands the
//! updated credentials back to the caller, which re-enters the pipeline.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Form, State};
use axum::response::Html;
use axum::routing::{get, post};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

use crate::config::{CredentialStore, DeviceCredentials, MAX_NETWORKS, NetworkCandidate};
use crate::Result;

#[derive(Clone)]
struct PortalState {
    store: Arc<dyn CredentialStore>,
    done: Arc<Notify>,
}

/// Form fields posted by the settings page
#[derive(Debug, Deserialize)]
struct SaveForm {
    #[serde(default)]
    ssid1: String,
    #[serde(default)]
    pass1: String,
    #[serde(default)]
    ssid2: String,
    #[serde(default)]
    pass2: String,
    #[serde(default)]
    ssid3: String,
    #[serde(default)]
    pass3: String,
    #[serde(default)]
    recognize_key: String,
    #[serde(default)]
    infer_key: String,
    #[serde(default)]
    synthesize_key: String,
}

/// Serve the portal until credentials are saved, then return the new set.
///
/// # Errors
///
/// Returns error if the listener cannot bind or the server fails.
pub async fn run_portal(
    listen: SocketAddr,
    store: Arc<dyn CredentialStore>,
) -> Result<DeviceCredentials> {
    let done = Arc::new(Notify::new());
    let state = PortalState {
        store: Arc::clone(&store),
        done: Arc::clone(&done),
    };

    let app = Router::new()
        .route("/", get(show_form))
        .route("/save", post(save))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(listen).await?;
    tracing::info!(addr = %listen, "config portal listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { done.notified().await })
        .await?;

    tracing::info!("config portal closed");
    store.read_credentials()
}

async fn show_form(State(state): State<PortalState>) -> Html<String> {
    let current = state
        .store
        .read_credentials()
        .unwrap_or_else(|_| DeviceCredentials::empty());
    Html(render_form(&current))
}

async fn save(State(state): State<PortalState>, Form(form): Form<SaveForm>) -> Html<&'static str> {
    let current = state
        .store
        .read_credentials()
        .unwrap_or_else(|_| DeviceCredentials::empty());
    let credentials = merge(&current, form);

    match state.store.write_credentials(&credentials) {
        Ok(()) => {
            state.done.notify_one();
            Html("Configuration saved. The appliance is rejoining the network.")
        }
        Err(e) => {
            tracing::error!(error = %e, "credential save failed");
            Html("Failed to save configuration; check the appliance log.")
        }
    }
}

/// Build the new credential set; blank passphrases and keys keep the
/// previously stored value.
fn merge(current: &DeviceCredentials, form: SaveForm) -> DeviceCredentials {
    let submitted = [
        (form.ssid1, form.pass1),
        (form.ssid2, form.pass2),
        (form.ssid3, form.pass3),
    ];

    let networks = submitted
        .into_iter()
        .take(MAX_NETWORKS)
        .filter(|(ssid, _)| !ssid.trim().is_empty())
        .map(|(ssid, passphrase)| {
            let ssid = ssid.trim().to_string();
            let passphrase = if passphrase.is_empty() {
                current
                    .networks
                    .iter()
                    .find(|n| n.ssid == ssid)
                    .map_or_else(String::new, |n| n.passphrase.expose_secret().to_owned())
            } else {
                passphrase
            };
            NetworkCandidate {
                ssid,
                passphrase: SecretString::from(passphrase),
            }
        })
        .collect();

    let keep = |submitted: String, current: &SecretString| {
        if submitted.is_empty() {
            SecretString::from(current.expose_secret().to_owned())
        } else {
            SecretString::from(submitted)
        }
    };

    DeviceCredentials {
        networks,
        recognize_key: keep(form.recognize_key, &current.recognize_key),
        infer_key: keep(form.infer_key, &current.infer_key),
        synthesize_key: keep(form.synthesize_key, &current.synthesize_key),
    }
}

fn render_form(current: &DeviceCredentials) -> String {
    let mut network_rows = String::new();
    for i in 0..MAX_NETWORKS {
        let ssid = current
            .networks
            .get(i)
            .map_or("", |n| n.ssid.as_str());
        let n = i + 1;
        network_rows.push_str(&format!(
            "<input type='text' name='ssid{n}' placeholder='Network {n}' value='{}'>\n\
             <input type='password' name='pass{n}' placeholder='Passphrase {n} (blank keeps current)'>\n",
            escape_attr(ssid)
        ));
    }

    let key_row = |name: &str, label: &str, set: bool| {
        let hint = if set { " (set, blank keeps current)" } else { "" };
        format!("<input type='text' name='{name}' placeholder='{label}{hint}'>\n")
    };

    format!(
        "<!DOCTYPE html>\n<html><head><title>Chime Setup</title>\n\
         <style>\n\
           body {{ font-family: sans-serif; margin: 2em; max-width: 32em; }}\n\
           h1 {{ color: #444; }}\n\
           input {{ width: 100%; padding: 8px; margin: 4px 0 12px; box-sizing: border-box; }}\n\
           input[type='submit'] {{ background: #4CAF50; color: white; border: none; padding: 12px; }}\n\
         </style></head><body>\n\
         <h1>Chime Setup</h1>\n\
         <form method='post' action='/save'>\n\
         <h3>Networks</h3>\n{network_rows}\
         <h3>API keys</h3>\n{}{}{}\
         <input type='submit' value='Save'>\n\
         </form></body></html>\n",
        key_row(
            "recognize_key",
            "Speech recognition key",
            !current.recognize_key.expose_secret().is_empty()
        ),
        key_row(
            "infer_key",
            "Language model key",
            !current.infer_key.expose_secret().is_empty()
        ),
        key_row(
            "synthesize_key",
            "Speech synthesis key",
            !current.synthesize_key.expose_secret().is_empty()
        ),
    )
}

fn escape_attr(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\'', "&#39;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> DeviceCredentials {
        DeviceCredentials {
            networks: vec![NetworkCandidate {
                ssid: "upstairs".to_string(),
                passphrase: SecretString::from("hunter2".to_string()),
            }],
            recognize_key: SecretString::from("rk".to_string()),
            infer_key: SecretString::from("ik".to_string()),
            synthesize_key: SecretString::from("sk".to_string()),
        }
    }

    fn empty_form() -> SaveForm {
        SaveForm {
            ssid1: String::new(),
            pass1: String::new(),
            ssid2: String::new(),
            pass2: String::new(),
            ssid3: String::new(),
            pass3: String::new(),
            recognize_key: String::new(),
            infer_key: String::new(),
            synthesize_key: String::new(),
        }
    }

    #[test]
    fn blank_fields_keep_current_values() {
        let mut form = empty_form();
        form.ssid1 = "upstairs".to_string();
        let merged = merge(&stored(), form);

        assert_eq!(merged.networks.len(), 1);
        assert_eq!(merged.networks[0].passphrase.expose_secret(), "hunter2");
        assert_eq!(merged.recognize_key.expose_secret(), "rk");
    }

    #[test]
    fn submitted_values_replace_current() {
        let mut form = empty_form();
        form.ssid1 = "garage".to_string();
        form.pass1 = "opensesame".to_string();
        form.infer_key = "new-ik".to_string();
        let merged = merge(&stored(), form);

        assert_eq!(merged.networks[0].ssid, "garage");
        assert_eq!(merged.networks[0].passphrase.expose_secret(), "opensesame");
        assert_eq!(merged.infer_key.expose_secret(), "new-ik");
        // untouched keys survive
        assert_eq!(merged.synthesize_key.expose_secret(), "sk");
    }

    #[test]
    fn blank_ssids_are_dropped() {
        let merged = merge(&stored(), empty_form());
        assert!(merged.networks.is_empty());
    }

    #[test]
    fn form_escapes_stored_ssids() {
        let mut credentials = stored();
        credentials.networks[0].ssid = "a'b<c>".to_string();
        let html = render_form(&credentials);
        assert!(html.contains("a&#39;b&lt;c&gt;"));
        assert!(!html.contains("a'b<c>"));
        // passphrases and keys never render
        assert!(!html.contains("hunter2"));
        assert!(!html.contains("value='rk'"));
    }
}
