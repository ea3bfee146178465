//! Tactile CLI
//!
//! Plays haptic clips against simulated backends that log every driver call,
//! and inspects the rendering artifacts derived from a clip.

mod simulated;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use simulated::{SimulatedCurveEngine, SimulatedMotor, SimulatedPresets};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tactile_core::{Clock, DeviceCapability, HapticClip, RumblePattern, SystemClock};
use tactile_playback::timeline::ClipEventKind;
use tactile_playback::{
    Backends, ContinuousCurvePlayer, PlayOutcome, PlaybackConfig, PlaybackController,
    PlaybackEvent, StreamingEngine, StreamingThread, Timeline,
};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Longest sleep between controller updates
const MAX_POLL_INTERVAL: Duration = Duration::from_millis(16);

#[derive(Parser)]
#[command(name = "tactile")]
#[command(about = "Haptic clip playback against simulated devices", long_about = None)]
struct Cli {
    /// Playback configuration file (TOML, JSON or YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a clip until it finishes
    Play {
        /// Path to a .haptic JSON clip
        clip: PathBuf,

        /// Simulated device
        #[arg(short, long, value_enum, default_value_t = Device::Continuous)]
        device: Device,

        /// Clip level (gain, >= 0)
        #[arg(long, default_value_t = 1.0)]
        level: f32,

        /// Frequency shift (-1.0 to 1.0)
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        shift: f32,

        /// Start this many seconds into the clip
        #[arg(long)]
        seek: Option<f32>,

        /// Loop, stopping after this many seconds
        #[arg(long = "loop-for")]
        loop_for: Option<f32>,

        /// Voice priority (0 = highest, 256 = lowest)
        #[arg(long)]
        priority: Option<u16>,

        /// Preset played when nothing else can render the clip
        #[arg(long)]
        preset: Option<String>,
    },

    /// Print the rumble pattern derived from a clip
    Rumble {
        /// Path to a .haptic JSON clip
        clip: PathBuf,

        /// Derive an on/off pattern with this amplitude threshold instead
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Print the continuous-curve events of a clip
    Timeline {
        /// Path to a .haptic JSON clip
        clip: PathBuf,

        /// Start offset in seconds
        #[arg(long, default_value_t = 0.0)]
        offset: f32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Device {
    /// Continuous-curve engine with transients
    Continuous,

    /// On/off vibration motor
    OnOff,

    /// Two-motor gamepad, no built-in actuator
    Gamepad,

    /// Preset vibrations only
    Preset,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tactile=info,tactile_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PlaybackConfig::load(cli.config.as_deref())
        .context("failed to load playback configuration")?;
    debug!(?config, "Loaded configuration");

    match cli.command {
        Commands::Play {
            clip,
            device,
            level,
            shift,
            seek,
            loop_for,
            priority,
            preset,
        } => {
            let options = PlayOptions {
                device,
                level,
                shift,
                seek,
                loop_for: loop_for.map(Duration::from_secs_f32),
                priority,
                preset,
            };
            play(config, &clip, options)
        }
        Commands::Rumble { clip, threshold } => print_rumble(&read_clip(&clip)?, threshold),
        Commands::Timeline { clip, offset } => {
            print_timeline(&read_clip(&clip)?, offset);
            Ok(())
        }
    }
}

struct PlayOptions {
    device: Device,
    level: f32,
    shift: f32,
    seek: Option<f32>,
    loop_for: Option<Duration>,
    priority: Option<u16>,
    preset: Option<String>,
}

fn read_clip(path: &Path) -> Result<HapticClip> {
    let data =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    HapticClip::from_slice(&data).with_context(|| format!("invalid clip {}", path.display()))
}

fn backends(device: Device, config: &PlaybackConfig, clock: &Arc<dyn Clock>) -> Result<Backends> {
    let backends = match device {
        Device::Continuous => {
            let engine = SimulatedCurveEngine::new(clock.clone());
            let player = ContinuousCurvePlayer::new(Box::new(engine), clock.clone(), config);
            let thread = StreamingThread::spawn(StreamingEngine::new(player), clock.clone(), || {
                debug!("Streaming thread started");
            })?;
            Backends::new(DeviceCapability::continuous()).with_streaming(Box::new(thread))
        }
        Device::OnOff => Backends::new(DeviceCapability::on_off())
            .with_vibrator(Box::new(SimulatedMotor::new("vibrator", clock.clone()))),
        Device::Gamepad => Backends::new(DeviceCapability::none())
            .with_gamepad(Box::new(SimulatedMotor::new("gamepad", clock.clone()))),
        Device::Preset => {
            Backends::new(DeviceCapability::none()).with_presets(Box::new(SimulatedPresets))
        }
    };
    Ok(backends)
}

fn play(config: PlaybackConfig, path: &Path, options: PlayOptions) -> Result<()> {
    let clip = read_clip(path)?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let backends = backends(options.device, &config, &clock)?;

    let mut controller = PlaybackController::new(config, backends, clock);
    controller.init()?;
    controller.load(clip);

    controller.set_clip_level(options.level)?;
    controller.set_frequency_shift(options.shift)?;
    if options.preset.is_some() {
        controller.set_fallback_preset(options.preset);
    }
    if let Some(offset) = options.seek {
        controller.seek(offset)?;
    }
    controller.set_looping(options.loop_for.is_some());

    let priority = options
        .priority
        .unwrap_or(controller.config().default_priority);
    match controller.play_with_priority(priority)? {
        PlayOutcome::Started(backend) => info!(backend = backend.name(), "Playing"),
        PlayOutcome::FinishedImmediately => info!("Nothing left to play"),
        PlayOutcome::Denied => bail!("play request denied"),
    }

    let loop_deadline = options.loop_for.map(|d| Instant::now() + d);
    'pump: loop {
        controller.update();
        for event in controller.drain_events() {
            info!(event = event.name(), ?event, "Playback event");
            if event == PlaybackEvent::PlaybackStopped {
                break 'pump;
            }
        }

        if loop_deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            info!("Loop time elapsed");
            controller.stop();
            continue;
        }

        let wait = controller
            .next_deadline()
            .map_or(MAX_POLL_INTERVAL, |d| d.min(MAX_POLL_INTERVAL));
        std::thread::sleep(wait);
    }

    controller.shutdown();
    Ok(())
}

fn print_rumble(clip: &HapticClip, threshold: Option<f32>) -> Result<()> {
    let pattern = match threshold {
        Some(threshold) => RumblePattern::on_off_from_clip(clip, threshold),
        None => RumblePattern::from_clip(clip),
    };

    println!(
        "{} entries, {} ms (clip: {:.3} s)",
        pattern.len(),
        pattern.total_duration_ms(),
        clip.duration()
    );
    println!("{}", serde_json::to_string_pretty(&pattern)?);
    Ok(())
}

fn print_timeline(clip: &HapticClip, offset: f32) {
    let timeline = Timeline::from_clip(clip, offset);
    println!("{} events from {offset:.3} s", timeline.len());

    for event in timeline.events() {
        match event.kind {
            ClipEventKind::Amplitude(a) => {
                let emphasis = a
                    .emphasis
                    .map(|e| format!(" emphasis ({:.2}, {:.2})", e.amplitude, e.frequency))
                    .unwrap_or_default();
                println!(
                    "{:>8.3}s  amplitude -> {:.3} over {:.3}s{emphasis}",
                    event.time, a.amplitude, a.duration
                );
            }
            ClipEventKind::Frequency(f) => println!(
                "{:>8.3}s  frequency -> {:.3} over {:.3}s",
                event.time, f.frequency, f.duration
            ),
        }
    }
}
