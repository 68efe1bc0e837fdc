// src/main.rs
// ─────────────────────────────────────────────────────────────────────────────
// Supertonic reference CLI
//
//  ❯ cargo run --release -- --assets assets/onnx speak --text "Hello world!"
//  ❯ cargo run --release -- speak --voice M1 --format m4a --file story.txt
//  ❯ cargo run --release -- mix --a F1 --b M1 --weight 0.6 --name Blend
//  ❯ cargo run --release -- mix --presets
// ─────────────────────────────────────────────────────────────────────────────

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use supertonic::{
    AssetPaths, AudioFormat, DEFAULT_PREFIX, EngineSettings, StylePack, VoiceId, VoiceLibrary,
};

/// CLI switches.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding `tts.json`, `unicode_indexer.json`, the stage
    /// models and `voice_styles/`.
    #[arg(long, default_value = "assets/onnx", global = true)]
    assets: PathBuf,

    /// Optional engine settings JSON (chunk length, silence, threads).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synthesize text and save it as an audio file.
    Speak {
        /// Text to speak.
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file instead.
        #[arg(long)]
        file: Option<PathBuf>,

        /// Voice style name (file stem under `voice_styles/`).
        #[arg(long, default_value = "F1")]
        voice: String,

        /// Language code: en, ko, es, pt or fr.
        #[arg(long, default_value = "en")]
        lang: String,

        /// Speaking rate, 0.5 to 2.0.
        #[arg(long, default_value_t = 1.05)]
        speed: f32,

        /// Denoising steps, 1 to 20.
        #[arg(long, default_value_t = 5)]
        steps: u32,

        /// Sampling seed (wall-clock time if omitted).
        #[arg(long)]
        seed: Option<i64>,

        /// Output container: wav or m4a.
        #[arg(long, default_value = "wav")]
        format: AudioFormat,

        /// Directory the file is written to.
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,

        /// File name prefix.
        #[arg(long, default_value = DEFAULT_PREFIX)]
        prefix: String,
    },
    /// List the available voice styles.
    Voices,
    /// Blend two voices into a new voice style, or write the built-in presets.
    Mix {
        #[arg(long, required_unless_present = "presets")]
        a: Option<String>,
        #[arg(long, required_unless_present = "presets")]
        b: Option<String>,
        /// Weight of voice `a`; `b` gets `1 - weight`.
        #[arg(long, default_value_t = 0.5)]
        weight: f32,
        /// Name of the new voice.
        #[arg(long, required_unless_present = "presets")]
        name: Option<String>,
        /// Write here instead of into `voice_styles/`.
        #[arg(long, conflicts_with = "presets")]
        out: Option<PathBuf>,
        /// Save the ten preset blends of F1, F2, M1 and M2 into `voice_styles/`.
        #[arg(long, conflicts_with_all = ["a", "b", "name"])]
        presets: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let paths = AssetPaths::new(&args.assets);
    let settings = match &args.settings {
        Some(path) => EngineSettings::load(path)
            .with_context(|| format!("reading settings {}", path.display()))?,
        None => EngineSettings::default(),
    };

    match args.command {
        Command::Voices => {
            let library = VoiceLibrary::new(paths.voice_styles());
            for voice in library.list()? {
                println!("{voice}");
            }
        }
        Command::Mix {
            presets: true, ..
        } => {
            let library = VoiceLibrary::new(paths.voice_styles());
            for preset in library.generate_presets()? {
                println!("{}", library.save(&preset)?.display());
            }
        }
        Command::Mix {
            a: Some(a),
            b: Some(b),
            weight,
            name: Some(name),
            out,
            ..
        } => {
            let library = VoiceLibrary::new(paths.voice_styles());
            let (first, second) = (library.load(&a)?, library.load(&b)?);
            let mixed = StylePack::interpolate(&first, &second, weight, VoiceId::new(name))?;
            let path = match out {
                Some(path) => {
                    std::fs::write(&path, mixed.to_json()?)
                        .with_context(|| format!("writing {}", path.display()))?;
                    path
                }
                None => library.save(&mixed)?,
            };
            tracing::info!(a = %a, b = %b, weight, "• voices mixed");
            println!("{}", path.display());
        }
        Command::Mix { .. } => bail!("mix needs --a, --b and --name, or --presets"),
        Command::Speak {
            text,
            file,
            voice,
            lang,
            speed,
            steps,
            seed,
            format,
            out_dir,
            prefix,
        } => {
            let text = match (text, file) {
                (Some(text), _) => text,
                (None, Some(file)) => std::fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?,
                (None, None) => bail!("pass --text or --file"),
            };
            let request = supertonic::GenerationRequest::new(text)
                .with_style(VoiceLibrary::new(paths.voice_styles()).load(&voice)?)
                .with_language(lang)
                .with_speed(speed)
                .with_steps(steps);
            let request = match seed {
                Some(seed) => request.with_seed(seed),
                None => request,
            };
            speak(&paths, settings, request, format, &out_dir, &prefix).await?;
        }
    }
    Ok(())
}

#[cfg(feature = "onnx")]
async fn speak(
    paths: &AssetPaths,
    settings: EngineSettings,
    request: supertonic::GenerationRequest,
    format: AudioFormat,
    out_dir: &std::path::Path,
    prefix: &str,
) -> Result<()> {
    use supertonic::{CancelFlag, SupertonicTts, SynthesisWorker, save_audio};

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {msg}")
            .with_context(|| "Failed to create progress bar template")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("loading models");

    let load_paths = paths.clone();
    let engine =
        tokio::task::spawn_blocking(move || SupertonicTts::from_assets(&load_paths, settings))
            .await??;
    let worker = SynthesisWorker::new(engine);

    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("• interrupt received, stopping after the current chunk");
            on_interrupt.cancel();
        }
    });

    let outcome = async {
        spinner.set_message("synthesizing");
        let speech = worker.generate_with_cancel(request, cancel).await?;
        spinner.set_message(format!("encoding {format}"));
        let container = worker.export(&speech, format).await?;
        let path = save_audio(&container, out_dir, prefix)?;
        Ok::<_, supertonic::VoiceError>((speech, path))
    }
    .await;
    // the engine is released on every path
    let shutdown = worker.shutdown().await;
    spinner.finish_and_clear();
    let (speech, path) = outcome?;
    shutdown?;

    let meta = &speech.metadata;
    tracing::info!(
        chunks = meta.chunk_count(),
        seed = speech.seed_used,
        audio_secs = %format!("{:.2}", meta.audio_duration_secs()),
        rtf = %format!("{:.3}", meta.real_time_factor()),
        "• done"
    );
    println!("{}", path.display());
    Ok(())
}

#[cfg(not(feature = "onnx"))]
async fn speak(
    _paths: &AssetPaths,
    _settings: EngineSettings,
    _request: supertonic::GenerationRequest,
    _format: AudioFormat,
    _out_dir: &std::path::Path,
    _prefix: &str,
) -> Result<()> {
    bail!("this build has no inference backend; enable the `onnx` feature")
}
