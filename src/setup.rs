//! Interactive first-run setup wizard (`chime setup`)

use dialoguer::{Confirm, Input, Password};
use secrecy::{ExposeSecret, SecretString};

use crate::config::file::TomlCredentialStore;
use crate::config::{
    Config, CredentialStore, DeviceCredentials, MAX_NETWORKS, NetworkCandidate,
};

/// Run the interactive setup wizard.
///
/// # Errors
///
/// Returns error if user input fails or credentials cannot be written.
pub fn run_setup(config: &Config) -> anyhow::Result<()> {
    println!("Chime Setup\n");

    let store = TomlCredentialStore::new(config.credentials_path());
    let existing = store
        .read_credentials()
        .unwrap_or_else(|_| DeviceCredentials::empty());

    // 1. Networks
    println!("Networks (up to {MAX_NETWORKS}, blank SSID to stop)");
    let mut networks = Vec::new();
    for i in 0..MAX_NETWORKS {
        let current = existing.networks.get(i);
        let prompt = current.map_or_else(
            || format!("SSID {}", i + 1),
            |n| format!("SSID {} (current: {})", i + 1, n.ssid),
        );

        let ssid: String = Input::new()
            .with_prompt(&prompt)
            .allow_empty(true)
            .interact_text()?;
        let ssid = if ssid.is_empty() {
            let Some(n) = current else { break };
            let keep = Confirm::new()
                .with_prompt(format!("Keep \"{}\"?", n.ssid))
                .default(true)
                .interact()?;
            if !keep {
                break;
            }
            n.ssid.clone()
        } else {
            ssid
        };

        let passphrase: String = Password::new()
            .with_prompt(format!("Passphrase for {ssid} (blank keeps current)"))
            .allow_empty_password(true)
            .interact()?;
        let passphrase = if passphrase.is_empty() {
            current.map_or_else(String::new, |n| n.passphrase.expose_secret().to_owned())
        } else {
            passphrase
        };

        networks.push(NetworkCandidate {
            ssid,
            passphrase: SecretString::from(passphrase),
        });
    }

    // 2. API keys
    let recognize_key = prompt_key("Speech recognition API key", &existing.recognize_key)?;
    let infer_key = prompt_key("Language model API key", &existing.infer_key)?;
    let synthesize_key = prompt_key("Speech synthesis API key", &existing.synthesize_key)?;

    let credentials = DeviceCredentials {
        networks,
        recognize_key,
        infer_key,
        synthesize_key,
    };
    store.write_credentials(&credentials)?;

    println!("\nSaved to {}", config.credentials_path().display());
    if !credentials.is_provisioned() {
        println!("Some API keys are still missing; the appliance will open the portal at boot.");
    }
    Ok(())
}

/// Prompt for one API key, keeping the existing value on blank input
fn prompt_key(label: &str, existing: &SecretString) -> anyhow::Result<SecretString> {
    let current = existing.expose_secret();
    let masked = mask(current);
    let prompt = masked.map_or_else(
        || label.to_string(),
        |m| format!("{label} (current: {m}, blank keeps it)"),
    );

    let input: String = Input::new()
        .with_prompt(&prompt)
        .allow_empty(true)
        .interact_text()?;

    Ok(if input.is_empty() {
        SecretString::from(current.to_owned())
    } else {
        SecretString::from(input)
    })
}

fn mask(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    Some(if key.len() > 8 {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        "****".to_string()
    })
}
