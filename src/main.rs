use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use chime::audio::io::{CaptureSource, PlaybackSink};
use chime::audio::{CpalCapture, CpalPlayback, WavSpec, wav};
use chime::cloud::{PipelineClient, PipelineStages};
use chime::config::file::TomlCredentialStore;
use chime::config::{CredentialStore, DEFAULT_PLAYBACK_SAMPLE_RATE};
use chime::{Appliance, Config};

/// Chime - push-to-talk voice assistant appliance
#[derive(Parser)]
#[command(name = "chime", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the data directory (credentials, clip spool)
    #[arg(long, env = "CHIME_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive first-run setup
    Setup,
    /// Run only the credential portal
    Portal,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Synthesize a line of text and play it (or save it)
    Say {
        /// Text to speak
        #[arg(default_value = "Hello! This is a test of the voice pipeline.")]
        text: String,

        /// Write the audio to a container file instead of playing it
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,chime=info",
        1 => "info,chime=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        std::fs::create_dir_all(&data_dir)?;
        config.data_dir = data_dir;
    }

    match cli.command {
        None => {
            tracing::info!(
                data_dir = %config.data_dir.display(),
                sample_rate = config.audio.sample_rate,
                "starting chime appliance"
            );
            Appliance::new(config).run().await?;
        }
        Some(Command::Setup) => chime::setup::run_setup(&config)?,
        Some(Command::Portal) => {
            let store: Arc<dyn CredentialStore> =
                Arc::new(TomlCredentialStore::new(config.credentials_path()));
            let updated = chime::portal::run_portal(config.portal_listen, store).await?;
            println!(
                "Saved {} network(s); keys {}.",
                updated.networks.len(),
                if updated.is_provisioned() {
                    "complete"
                } else {
                    "incomplete"
                }
            );
        }
        Some(Command::TestMic { duration }) => test_mic(&config, duration)?,
        Some(Command::TestSpeaker) => test_speaker()?,
        Some(Command::Say { text, out }) => say(&config, &text, out.as_deref()).await?,
    }

    Ok(())
}

/// Test microphone input with a console level meter
fn test_mic(config: &Config, duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = CpalCapture::new(config.audio.sample_rate);
    capture.start()?;
    println!("Sample rate: {} Hz", config.audio.sample_rate);
    println!("---");

    for i in 0..duration {
        std::thread::sleep(Duration::from_secs(1));

        let bytes = capture.read()?;
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        let rms = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (rms * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!("[{:2}s] RMS: {rms:.4} | Peak: {peak:5} | [{meter}]", i + 1);
    }

    capture.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working.");
    println!("If RMS stayed near 0, check your input device and levels.");
    Ok(())
}

/// RMS of normalized samples
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let v = f32::from(s) / 32768.0;
            v * v
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = DEFAULT_PLAYBACK_SAMPLE_RATE;
    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let num_samples = sample_rate as usize * 2;

    let mut pcm = Vec::with_capacity(num_samples * 2);
    for i in 0..num_samples {
        #[allow(clippy::cast_precision_loss)]
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3;
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample * 32767.0) as i16;
        pcm.extend_from_slice(&value.to_le_bytes());
    }

    let mut playback = CpalPlayback::new();
    playback.begin(WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
    })?;
    playback.write(&pcm)?;
    playback.finish()?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working.");
    Ok(())
}

/// Synthesize text and play it, or write it to a container file
async fn say(config: &Config, text: &str, out: Option<&std::path::Path>) -> anyhow::Result<()> {
    let store = TomlCredentialStore::new(config.credentials_path());
    let credentials = store.read_credentials()?;
    let client = PipelineClient::new(&credentials, &config.voice, config.endpoints.clone())?;

    println!("Synthesizing: \"{text}\"");
    let content = client.synthesize(text).await?;
    let bytes = chime::codec::decode(&content);
    anyhow::ensure!(!bytes.is_empty(), "synthesis returned no audio");

    // LINEAR16 responses arrive in a RIFF container; fall back to raw PCM
    let (spec, pcm) = if bytes.len() > wav::HEADER_LEN && bytes.starts_with(b"RIFF") {
        let mut cursor = std::io::Cursor::new(&bytes);
        let (spec, data_len) = wav::read_header(&mut cursor)?;
        let end = (wav::HEADER_LEN + data_len as usize).min(bytes.len());
        (spec, bytes[wav::HEADER_LEN..end].to_vec())
    } else {
        (
            WavSpec {
                channels: 1,
                sample_rate: config.audio.playback_sample_rate,
                bits_per_sample: 16,
            },
            bytes,
        )
    };

    println!("Got {} bytes of PCM at {} Hz", pcm.len(), spec.sample_rate);

    if let Some(path) = out {
        let mut file = std::fs::File::create(path)?;
        #[allow(clippy::cast_possible_truncation)]
        wav::write_header(&mut file, spec, pcm.len() as u32)?;
        std::io::Write::write_all(&mut file, &pcm)?;
        println!("Wrote {}", path.display());
    } else {
        let mut playback = CpalPlayback::new();
        playback.begin(spec)?;
        playback.write(&pcm)?;
        playback.finish()?;
        println!("Done.");
    }

    Ok(())
}
