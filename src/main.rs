use clap::{Parser, Subcommand};
use keystyle::messaging::{NotificationConsumer, create_notification_channel};
use keystyle::midi::{MidiDeviceManager, MidiInput, MidirOutputPort};
use keystyle::player::PlayerEvent;
use keystyle::recorder::save_recording;
use keystyle::track::TrackStore;
use keystyle::{EngineConfig, LiveRecorder, MultiTrackPlayer, OutputDevice, OutputHandle};
use ringbuf::traits::{Consumer, Producer};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

/// How often the front end drains player events
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(author, version, about = "Multi-track MIDI player with live tempo change", long_about = None)]
struct Cli {
    /// Config file (defaults to <config dir>/keystyle/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play every note track of a MIDI file
    Play {
        file: PathBuf,
        /// Playback tempo; the file's own tempo when absent
        #[arg(long)]
        bpm: Option<f64>,
        /// Output port name; the first port when absent
        #[arg(long)]
        port: Option<String>,
    },
    /// Record the keyboard into a MIDI file
    Record {
        output: PathBuf,
        #[arg(long)]
        seconds: u64,
        #[arg(long)]
        bpm: Option<f64>,
        /// Input port name; the first port when absent
        #[arg(long)]
        port: Option<String>,
    },
    /// List MIDI ports
    Ports,
    /// Show the folders and tracks of a catalog
    Catalog {
        /// Catalog file; the configured catalog when absent
        path: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keystyle=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => EngineConfig::load(path),
        None => EngineConfig::load_default(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "config ignored, using defaults");
            EngineConfig::default()
        }
    };

    let result = match cli.command {
        Command::Play { file, bpm, port } => play(&config, file, bpm, port),
        Command::Record {
            output,
            seconds,
            bpm,
            port,
        } => record(&config, output, seconds, bpm, port),
        Command::Ports => {
            ports();
            Ok(())
        }
        Command::Catalog { path } => catalog(&config, path),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn play(config: &EngineConfig, file: PathBuf, bpm: Option<f64>, port: Option<String>) -> CliResult {
    let mut store = TrackStore::new();
    let folder = store.import_file(&file, None)?;
    let original_bpm = folder
        .tracks
        .first()
        .map_or(config.default_bpm, |t| t.original_bpm());
    let bpm = bpm.unwrap_or(original_bpm);

    for track in store.tracks() {
        println!("  {:<24} {:?}", track.display_name, track.track_type);
    }

    let port = port.or_else(|| config.output_port.clone());
    let device = OutputDevice::new(MidirOutputPort::open(port.as_deref())?);
    let mut player = MultiTrackPlayer::new(device.handle(), config.player_config());
    let (mut notifications_tx, mut notifications) =
        create_notification_channel(config.notification_capacity);
    player.add_listener(move |event| {
        if let Some(notification) = event.notification() {
            let _ = notifications_tx.try_push(notification);
        }
    });

    player.apply_bpm_change_before_playback(store.tracks_mut(), bpm);
    println!("Playing {} at {:.1} BPM", file.display(), bpm);
    if !player.start() {
        player.poll_events();
        print_notifications(&mut notifications);
        return Ok(());
    }

    loop {
        thread::sleep(POLL_INTERVAL);
        let events = player.poll_events();
        print_notifications(&mut notifications);
        let done = events
            .iter()
            .any(|e| matches!(e, PlayerEvent::PlaybackFinished | PlayerEvent::DeviceLost));
        if done || !player.is_playing() {
            break;
        }
    }
    player.stop();
    Ok(())
}

fn print_notifications(notifications: &mut NotificationConsumer) {
    while let Some(notification) = notifications.try_pop() {
        println!("{}", notification);
    }
}

fn record(
    config: &EngineConfig,
    output: PathBuf,
    seconds: u64,
    bpm: Option<f64>,
    port: Option<String>,
) -> CliResult {
    let mut recorder = LiveRecorder::new(OutputHandle::detached(), config.timer_period());
    let sink = recorder.input();
    let input = MidiInput::connect(port.as_deref(), move |message| sink.push(message))?;

    println!("Recording from {} for {}s...", input.port_name(), seconds);
    recorder.start_recording();
    thread::sleep(Duration::from_secs(seconds));
    let count = recorder.stop_recording();
    drop(input);

    let bpm = bpm.unwrap_or(config.default_bpm);
    save_recording(
        &output,
        &recorder.recorded_events(),
        bpm,
        config.export_ticks_per_quarter,
    )?;
    println!("{} events written to {}", count, output.display());
    Ok(())
}

fn ports() {
    let manager = MidiDeviceManager::new();
    println!("Inputs:");
    for port in manager.list_input_ports() {
        println!("  {}{}", port.name, if port.is_default { " (default)" } else { "" });
    }
    println!("Outputs:");
    for port in manager.list_output_ports() {
        println!("  {}{}", port.name, if port.is_default { " (default)" } else { "" });
    }
}

fn catalog(config: &EngineConfig, path: Option<PathBuf>) -> CliResult {
    let Some(path) = path.or_else(|| config.catalog_path.clone()) else {
        return Err("no catalog given and none configured".into());
    };
    let store = keystyle::load_catalog(&path)?;
    for folder in store.folders() {
        println!("{} ({})", folder.folder_name, folder.file_path.display());
        for track in &folder.tracks {
            let changes = track.changes().map_or(0, |c| c.len());
            println!(
                "  [{}] {:<24} {:?}, {} change(s)",
                track.track_index, track.display_name, track.track_type, changes
            );
        }
    }
    Ok(())
}
