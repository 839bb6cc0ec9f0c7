use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
#[cfg(feature = "live-input")]
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rta_autoeq::audio::synth::DEFAULT_NOISE_AMPLITUDE;
use rta_autoeq::audio::{Resonance, SelfTestSignal, WavReplay, BLOCK_SIZE};
use rta_autoeq::console::RecordedMessage;
use rta_autoeq::{AppConfig, ApplyOutcome, Cluster, EngineHandle, EqBand};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "rta_autoeq",
    about = "Dual-channel analyser that derives corrective console EQ bands"
)]
struct Cli {
    /// JSON configuration file (defaults to assets/rta_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a stereo WAV (ch0 measurement, ch1 reference) and report the bands found
    Analyse {
        #[arg(long)]
        wav: PathBuf,
        #[command(flatten)]
        detect: DetectArgs,
    },
    /// Run the synthetic self-test signal through the pipeline
    Selftest {
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Blocks of 8192 frames to generate
        #[arg(long, default_value_t = 24)]
        blocks: usize,
        /// Peak amplitude of the noise (full scale = 1.0)
        #[arg(long, default_value_t = DEFAULT_NOISE_AMPLITUDE)]
        amplitude: f32,
        /// Also write the generated pair to a WAV file
        #[arg(long)]
        write_wav: Option<PathBuf>,
        /// Send the console self-test routing before analysing
        #[arg(long)]
        prepare_console: bool,
        #[command(flatten)]
        detect: DetectArgs,
    },
    /// Capture live input for a while, then detect
    #[cfg(feature = "live-input")]
    Live {
        #[arg(long, default_value_t = 5)]
        seconds: u64,
        /// Input device name (defaults to the system input)
        #[arg(long)]
        device: Option<String>,
        #[command(flatten)]
        detect: DetectArgs,
    },
    /// List input devices
    #[cfg(feature = "live-input")]
    Devices,
}

#[derive(Args, Debug, Clone)]
struct DetectArgs {
    /// Peak threshold (0.5-1.0); defaults to the configured value
    #[arg(long)]
    threshold: Option<f32>,
    /// Cluster cap (1-5); defaults to the configured value
    #[arg(long)]
    max_clusters: Option<usize>,
    /// Send the derived bands to the console
    #[arg(long)]
    apply: bool,
    /// Record console traffic in the report instead of sending it
    #[arg(long)]
    dry_run: bool,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

/// Resonances the self-test imposes on the measurement channel
const SELF_TEST_RESONANCES: [Resonance; 2] = [
    Resonance {
        frequency_hz: 1000.0,
        q: 2.0,
        gain_db: 9.0,
    },
    Resonance {
        frequency_hz: 6300.0,
        q: 3.0,
        gain_db: 8.0,
    },
];

/// Self-test runs sit slightly above the equal-level line so filter ripple is ignored
const SELF_TEST_THRESHOLD: f32 = 0.55;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Analyse { wav, detect } => run_analyse(config, &wav, &detect),
        Commands::Selftest {
            seed,
            blocks,
            amplitude,
            write_wav,
            prepare_console,
            detect,
        } => {
            let signal = SelfTestSignal::new(seed, &SELF_TEST_RESONANCES)
                .with_amplitude(amplitude);
            run_selftest(config, seed, signal, blocks, write_wav, prepare_console, &detect)
        }
        #[cfg(feature = "live-input")]
        Commands::Live {
            seconds,
            device,
            detect,
        } => run_live(config, seconds, device.as_deref(), &detect),
        #[cfg(feature = "live-input")]
        Commands::Devices => run_devices(),
    }
}

/// Console traffic goes to the desk only for `--apply` without `--dry-run`
fn build_engine(
    config: AppConfig,
    detect: &DetectArgs,
) -> Result<(EngineHandle, Option<std::sync::Arc<rta_autoeq::console::RecordingTransport>>)> {
    if detect.apply && !detect.dry_run {
        let engine = EngineHandle::connect(config).context("opening console transport")?;
        Ok((engine, None))
    } else {
        let (engine, transport) = EngineHandle::with_recording(config);
        Ok((engine, Some(transport)))
    }
}

fn run_analyse(config: AppConfig, wav: &Path, detect: &DetectArgs) -> Result<ExitCode> {
    let replay =
        WavReplay::open(wav).with_context(|| format!("opening {}", wav.display()))?;
    let (mut engine, recorder) = build_engine(config, detect)?;
    let published = engine
        .process_wav(&replay)
        .context("replaying WAV through the pipeline")?;

    let source = format!("wav:{}", wav.display());
    finish(&mut engine, recorder, detect, source, replay.frames(), published, None)
}

fn run_selftest(
    config: AppConfig,
    seed: u64,
    mut signal: SelfTestSignal,
    blocks: usize,
    write_wav: Option<PathBuf>,
    prepare_console: bool,
    detect: &DetectArgs,
) -> Result<ExitCode> {
    let (mut engine, recorder) = build_engine(config, detect)?;
    if prepare_console {
        engine.prepare_self_test();
    }

    let (measurement, reference) = signal.render(blocks * BLOCK_SIZE);
    if let Some(path) = &write_wav {
        WavReplay::from_channels(measurement.clone(), reference.clone())
            .write(path)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    let published = engine
        .process_offline(&measurement, &reference)
        .context("running self-test signal through the pipeline")?;

    if detect.threshold.is_none() {
        engine.set_threshold(SELF_TEST_THRESHOLD);
    }
    finish(
        &mut engine,
        recorder,
        detect,
        format!("selftest:seed={seed}"),
        measurement.len(),
        published,
        Some(SELF_TEST_RESONANCES.to_vec()),
    )
}

#[cfg(feature = "live-input")]
fn run_live(
    config: AppConfig,
    seconds: u64,
    device: Option<&str>,
    detect: &DetectArgs,
) -> Result<ExitCode> {
    use rta_autoeq::audio::AudioEngine;

    let (mut engine, recorder) = build_engine(config, detect)?;
    let accumulator = engine.start_analysis().context("starting analysis thread")?;
    let published_ref = accumulator.published_blocks_ref();
    let mut input = AudioEngine::start(device, accumulator).context("opening input device")?;

    std::thread::sleep(Duration::from_secs(seconds));
    input.stop();
    engine.stop_analysis().context("stopping analysis thread")?;

    let blocks = published_ref.load(std::sync::atomic::Ordering::Relaxed) as usize;
    let generation = engine.generation();
    let source = format!("live:{}", input.device_name());
    finish(
        &mut engine,
        recorder,
        detect,
        source,
        blocks * BLOCK_SIZE,
        generation,
        None,
    )
}

#[cfg(feature = "live-input")]
fn run_devices() -> Result<ExitCode> {
    let devices = rta_autoeq::audio::list_input_devices().context("listing input devices")?;
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(ExitCode::SUCCESS)
}

#[derive(Serialize)]
struct AnalysisReport {
    source: String,
    frames: usize,
    curves_published: u64,
    threshold: f32,
    max_clusters: usize,
    peaks: Vec<usize>,
    clusters: Vec<Cluster>,
    bands: Vec<EqBand>,
    applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    resonances: Option<Vec<Resonance>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    console_messages: Vec<RecordedMessage>,
}

fn finish(
    engine: &mut EngineHandle,
    recorder: Option<std::sync::Arc<rta_autoeq::console::RecordingTransport>>,
    detect: &DetectArgs,
    source: String,
    frames: usize,
    curves_published: u64,
    resonances: Option<Vec<Resonance>>,
) -> Result<ExitCode> {
    if let Some(threshold) = detect.threshold {
        engine.set_threshold(threshold);
    }
    if let Some(max_clusters) = detect.max_clusters {
        engine.set_max_clusters(max_clusters);
    }

    if curves_published == 0 {
        tracing::warn!(
            "No smoothed curve was produced; input is shorter than the averaging window"
        );
    }

    let detection = engine.detect();
    let bands = if detect.apply {
        match engine.apply() {
            ApplyOutcome::Applied(bands) => bands,
            ApplyOutcome::NotDetected => Vec::new(),
        }
    } else {
        engine.plan_bands()
    };

    let report = AnalysisReport {
        source,
        frames,
        curves_published,
        threshold: engine.threshold(),
        max_clusters: engine.max_clusters(),
        peaks: detection.peaks,
        clusters: detection.clusters,
        bands,
        applied: detect.apply,
        resonances,
        console_messages: recorder.map(|r| r.messages()).unwrap_or_default(),
    };

    let json = serde_json::to_string_pretty(&report)?;
    match &detect.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?
        }
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}
