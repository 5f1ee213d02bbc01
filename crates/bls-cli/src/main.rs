use std::fs;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use bls_core::{
    BlsEvent, Drivers, EmotionSample, EngineConfig, EventEnvelope, ManualClock, ManualScheduler,
    RuleCatalog, SessionController, SessionPhase,
};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::Receiver;

/// Host frame interval for simulated playback (~60 Hz).
const FRAME_MS: f64 = 16.0;

#[derive(Parser)]
#[command(name = "bls-cli", about = "Adaptive bilateral-stimulation engine tools")]
struct Cli {
    /// Engine configuration (TOML). BLS_* environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay telemetry through a session and print every event as JSON
    Simulate {
        /// JSON-lines telemetry script; a built-in scenario runs when omitted
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = Scenario::RisingArousal)]
        scenario: Scenario,
        #[arg(long, default_value = "desensitization")]
        phase: SessionPhase,
        /// Keep pumping frames this long after the last sample
        #[arg(long, default_value_t = 2000)]
        tail_ms: u64,
        /// Include per-frame transition progress and morphing updates
        #[arg(long)]
        progress: bool,
    },
    /// Print the default engine configuration as TOML
    DefaultConfig {},
    /// List the built-in rule catalog
    Rules {
        /// Emit full rules (conditions and patches) as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Scenario {
    /// Arousal climbs from 0.2 to 0.95 at low valence
    RisingArousal,
    /// Settled mid-range readings
    Calm,
    /// Panic markers arrive mid-session, then ease off
    Panic,
}

impl Scenario {
    fn samples(self) -> Vec<EmotionSample> {
        match self {
            Scenario::RisingArousal => (0..5)
                .map(|i| EmotionSample::new(i * 500, 0.2 + 0.1875 * i as f32, 0.15))
                .collect(),
            Scenario::Calm => (0..10)
                .map(|i| EmotionSample::new(i * 1000, 0.45 + 0.02 * (i % 3) as f32, 0.55))
                .collect(),
            Scenario::Panic => vec![
                EmotionSample::new(0, 0.5, 0.5),
                EmotionSample::new(1500, 0.7, 0.35),
                EmotionSample::new(3000, 0.88, 0.2).with_affect("Afraid", 65.0),
                EmotionSample::new(3400, 0.93, 0.1).with_affect("Afraid", 80.0),
                EmotionSample::new(8000, 0.6, 0.4),
                EmotionSample::new(12000, 0.4, 0.6),
            ],
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => EngineConfig::from_file_with_env(p)?,
        None => {
            let mut c = EngineConfig::default();
            c.apply_env_overrides()?;
            c.validate()?;
            c
        }
    };
    Ok(config)
}

fn read_script(path: &PathBuf) -> Result<Vec<EmotionSample>, Box<dyn std::error::Error>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut samples = Vec::new();
    for (n, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let sample: EmotionSample = serde_json::from_str(trimmed)
            .map_err(|e| format!("{}:{}: {}", path.display(), n + 1, e))?;
        samples.push(sample);
    }
    Ok(samples)
}

fn flush_events(
    rx: &Receiver<EventEnvelope>,
    out: &mut impl Write,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    for env in rx.try_iter() {
        let per_frame = matches!(
            env.event,
            BlsEvent::TransitionProgress { .. } | BlsEvent::MorphingUpdate { .. }
        );
        if per_frame && !progress {
            continue;
        }
        writeln!(out, "{}", serde_json::to_string(&env)?)?;
    }
    Ok(())
}

fn simulate(
    config: EngineConfig,
    samples: Vec<EmotionSample>,
    phase: SessionPhase,
    tail_ms: u64,
    progress: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = ManualClock::new(0.0);
    let mut ctl =
        SessionController::new(config, Drivers::null(), ManualScheduler::new(), clock.clone())?;
    ctl.set_phase(phase);
    let rx = ctl.subscribe();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let origin = samples.first().map(|s| s.timestamp_ms).unwrap_or(0);
    let mut now = 0.0;
    ctl.start();

    for sample in samples {
        // Pump frames up to the sample's arrival time
        let arrival = (sample.timestamp_ms - origin) as f64;
        while now + FRAME_MS <= arrival {
            now += FRAME_MS;
            clock.set(now);
            ctl.scheduler_mut().take_pending();
            ctl.frame();
        }
        if arrival > now {
            now = arrival;
            clock.set(now);
        }
        match ctl.ingest(sample) {
            Some(outcome) => log::debug!("outcome: {:?}", outcome.rule_id()),
            None => log::debug!("sample rejected"),
        }
        flush_events(&rx, &mut out, progress)?;
    }

    let end = now + tail_ms as f64;
    while now < end {
        now += FRAME_MS;
        clock.set(now);
        ctl.scheduler_mut().take_pending();
        ctl.frame();
        flush_events(&rx, &mut out, progress)?;
    }
    ctl.stop();

    let assessment = ctl.assessment();
    log::info!(
        "session {} finished: {} change(s), {} crisis override(s), stability {:.3}",
        ctl.id(),
        assessment.change_count,
        assessment.crisis_overrides,
        assessment.stability
    );
    writeln!(out, "{}", serde_json::to_string(&assessment)?)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Simulate {
            script,
            scenario,
            phase,
            tail_ms,
            progress,
        } => {
            let config = load_config(cli.config.as_ref())?;
            let samples = match script {
                Some(path) => read_script(&path)?,
                None => scenario.samples(),
            };
            if samples.is_empty() {
                return Err("telemetry script has no samples".into());
            }
            simulate(config, samples, phase, tail_ms, progress)?;
        }
        Commands::DefaultConfig {} => {
            let config = load_config(cli.config.as_ref())?;
            print!("{}", config.to_toml_string()?);
        }
        Commands::Rules { json } => {
            let catalog = RuleCatalog::builtin();
            for rule in catalog.iter() {
                if json {
                    println!("{}", serde_json::to_string(rule)?);
                } else {
                    println!(
                        "{:>3}  {:<32} {:<16} {}",
                        rule.priority,
                        rule.id,
                        format!("{:?}", rule.intent),
                        rule.rationale
                    );
                }
            }
        }
    }
    Ok(())
}
