use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hrsim_lib::{
    config::DEFAULT_CONFIG_FILE, load_path, Analysis, BaselineClass, CancelToken, Config, Dataset,
    EventRegion, HrvSummary, IngestMode, PipelineKind,
};
use hrsim_run::{Frame, PlaybackState, Session, SessionEvent};
use log::info;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "hrsim",
    version,
    about = "hrsim: ECG/CTG analysis and playback simulation"
)]
struct Cli {
    /// JSON configuration file; created with defaults when missing
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Mode {
    Auto,
    Ecg,
    Ctg,
}

impl From<Mode> for IngestMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Auto => IngestMode::Auto,
            Mode::Ecg => IngestMode::Ecg,
            Mode::Ctg => IngestMode::Ctg,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a CSV recording and print the analysis summary as JSON
    Analyze {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "auto")]
        mode: Mode,
        /// Sampling-rate hint, used when the file has no usable time column
        #[arg(long)]
        fs: Option<f64>,
        /// Print the HRV summary as text instead of JSON
        #[arg(long)]
        text: bool,
    },
    /// Detect accelerations and decelerations in an FHR recording
    Events {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        fs: Option<f64>,
    },
    /// Load a recording in the background and replay it, one JSON line per frame
    Simulate {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, value_enum, default_value = "auto")]
        mode: Mode,
        #[arg(long)]
        fs: Option<f64>,
        /// Playback speed; defaults to the first preset for the recording kind
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long, default_value_t = 20.0)]
        period_ms: f64,
        /// Number of ticks to run; 0 runs until the end of the data
        #[arg(long, default_value_t = 100)]
        ticks: u64,
        /// Print every n-th frame (the final frame is always printed)
        #[arg(long, default_value_t = 1)]
        every: u64,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let cfg = Config::load_or_init(&cli.config)
        .with_context(|| format!("loading configuration from {}", cli.config.display()))?;
    match cli.command {
        Commands::Analyze {
            input,
            mode,
            fs,
            text,
        } => analyze(&input, mode.into(), fs, text, &cfg),
        Commands::Events { input, fs } => events(&input, fs, &cfg),
        Commands::Simulate {
            input,
            mode,
            fs,
            speed,
            period_ms,
            ticks,
            every,
        } => simulate(
            &input,
            mode.into(),
            fs,
            SimulateOptions {
                speed,
                period_ms,
                ticks,
                every,
            },
            cfg,
        ),
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&cfg)?);
            Ok(())
        }
    }
}

fn load(input: &Path, mode: IngestMode, fs: Option<f64>, cfg: &Config) -> Result<Dataset> {
    load_path(input, mode, fs, cfg, &CancelToken::new())
        .with_context(|| format!("analysing {}", input.display()))
}

#[derive(Serialize)]
struct AnalyzeOutput<'a> {
    kind: PipelineKind,
    fs: f64,
    samples: usize,
    duration_sec: f64,
    repeats: usize,
    skipped_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    ecg: Option<EcgSummary<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ctg: Option<CtgSummary<'a>>,
}

#[derive(Serialize)]
struct EcgSummary<'a> {
    beats: usize,
    peak_times: &'a [f64],
    rr: &'a [f64],
    hrv: Option<HrvSummary>,
}

#[derive(Serialize)]
struct CtgSummary<'a> {
    baseline: Option<f64>,
    baseline_class: Option<BaselineClass>,
    mean_stv: Option<f64>,
    accelerations: &'a [EventRegion],
    decelerations: &'a [EventRegion],
}

fn analyze(
    input: &Path,
    mode: IngestMode,
    fs: Option<f64>,
    text: bool,
    cfg: &Config,
) -> Result<()> {
    let dataset = load(input, mode, fs, cfg)?;
    if text {
        match &dataset.analysis {
            Analysis::Ecg(ecg) => match &ecg.hrv {
                Some(hrv) => print!("{hrv}"),
                None => println!("HRV unavailable: {} beat(s) detected", ecg.peaks.len()),
            },
            Analysis::Ctg(_) => bail!("text summary is only available for ECG recordings"),
        }
        return Ok(());
    }

    let (ecg, ctg) = match &dataset.analysis {
        Analysis::Ecg(ecg) => (
            Some(EcgSummary {
                beats: ecg.peaks.len(),
                peak_times: &ecg.peak_times,
                rr: &ecg.rr.rr,
                hrv: ecg.hrv,
            }),
            None,
        ),
        Analysis::Ctg(ctg) => {
            let mean_stv = (!ctg.stv.is_empty())
                .then(|| ctg.stv.iter().sum::<f64>() / ctg.stv.len() as f64);
            (
                None,
                Some(CtgSummary {
                    baseline: ctg.events.baseline,
                    baseline_class: ctg.baseline_class,
                    mean_stv,
                    accelerations: &ctg.events.accelerations,
                    decelerations: &ctg.events.decelerations,
                }),
            )
        }
    };
    let output = AnalyzeOutput {
        kind: dataset.kind(),
        fs: dataset.fs,
        samples: dataset.len(),
        duration_sec: dataset.duration(),
        repeats: dataset.repeats,
        skipped_rows: dataset.skipped_rows,
        ecg,
        ctg,
    };
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

fn events(input: &Path, fs: Option<f64>, cfg: &Config) -> Result<()> {
    let dataset = load(input, IngestMode::Ctg, fs, cfg)?;
    let Analysis::Ctg(ctg) = &dataset.analysis else {
        return Err(anyhow!("{} did not produce a CTG analysis", input.display()));
    };
    println!("{}", serde_json::to_string(&ctg.events)?);
    Ok(())
}

struct SimulateOptions {
    speed: Option<f64>,
    period_ms: f64,
    ticks: u64,
    every: u64,
}

#[derive(Serialize)]
struct FrameLine {
    tick: u64,
    index: usize,
    time: f64,
    state: PlaybackState,
    speed: f64,
    range: (f64, f64),
    visible: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    beats: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accelerations: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decelerations: Option<usize>,
}

const LOAD_TIMEOUT: Duration = Duration::from_secs(120);

fn simulate(
    input: &Path,
    mode: IngestMode,
    fs: Option<f64>,
    opts: SimulateOptions,
    cfg: Config,
) -> Result<()> {
    if !(opts.period_ms.is_finite() && opts.period_ms > 0.0) {
        bail!("--period-ms must be positive, got {}", opts.period_ms);
    }
    let mut session = Session::new(cfg);
    session.submit_path(input, mode, fs)?;
    match session.wait(LOAD_TIMEOUT) {
        Some(SessionEvent::Loaded(dataset)) => {
            info!("replaying {} samples", dataset.len())
        }
        Some(SessionEvent::Failed(err)) => {
            return Err(err).with_context(|| format!("analysing {}", input.display()))
        }
        None => bail!("timed out loading {}", input.display()),
    }

    let playback = session
        .playback_mut()
        .ok_or_else(|| anyhow!("no playback after a successful load"))?;
    if let Some(speed) = opts.speed {
        playback.set_speed(speed);
    }
    playback.play();

    let every = opts.every.max(1);
    let mut tick = 0u64;
    while opts.ticks == 0 || tick < opts.ticks {
        tick += 1;
        let view = playback.tick(opts.period_ms);
        let finished = view.state == PlaybackState::Stopped;
        let last = finished || tick == opts.ticks;
        if tick % every == 0 || last {
            let (visible, beats, accelerations, decelerations) = match &view.frame {
                Frame::Ecg(frame) => (frame.time.len(), Some(frame.peak_times.len()), None, None),
                Frame::Ctg(frame) => (
                    frame.time.len(),
                    None,
                    Some(frame.accelerations.len()),
                    Some(frame.decelerations.len()),
                ),
            };
            let line = FrameLine {
                tick,
                index: view.index,
                time: view.time,
                state: view.state,
                speed: view.speed,
                range: view.range,
                visible,
                beats,
                accelerations,
                decelerations,
            };
            println!("{}", serde_json::to_string(&line)?);
        }
        if finished {
            break;
        }
    }
    Ok(())
}
