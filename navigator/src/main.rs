mod events;
mod route_loader;

use std::{fs::OpenOptions, path::{Path, PathBuf}, sync::Arc};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use events::EventRecord;
use route_tracker_lib::units::UnitSystem;
use route_tracker_navigation::{
    feed::{LiveFeed, LocationFeed, NmeaProvider, NmeaSource, SimulatedFeed},
    format,
    reference_tracker::ReferenceTracker,
    NavigationConfig, RouteTrackingSession, SessionEvent,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "navigator")]
#[command(about = "Follow a route with live or recorded GPS", long_about = None)]
struct Cli {
    /// Also write logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Navigate a GPX route until arrival or Ctrl-C
    Navigate(NavigateArgs),
    /// Print the maneuvers of a GPX route
    Inspect { route: PathBuf },
}

#[derive(Args)]
struct NavigateArgs {
    /// GPX file with the route to follow
    route: PathBuf,
    /// `key = value` navigation config
    #[arg(long)]
    config: Option<PathBuf>,
    /// Replay this recording from the recordings directory instead of using a receiver
    #[arg(long)]
    simulate: Option<String>,
    #[arg(long)]
    recordings_dir: Option<PathBuf>,
    /// Read NMEA sentences from a TCP endpoint, e.g. 127.0.0.1:10110
    #[arg(long, conflicts_with = "nmea_file")]
    nmea_tcp: Option<String>,
    /// Read NMEA sentences from a serial device or log file
    #[arg(long)]
    nmea_file: Option<PathBuf>,
    #[arg(long)]
    units: Option<UnitSystem>,
    /// Print events as JSON lines
    #[arg(long)]
    events_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Navigate(args) => navigate(args).await,
        Commands::Inspect { route } => inspect(&route),
    }
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {:?}", path))?;
            Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "navigator=info,route_tracker_navigation=info".into())
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    Ok(())
}

async fn navigate(args: NavigateArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => NavigationConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))?,
        None => NavigationConfig::default(),
    };
    if let Some(track) = args.simulate {
        config.simulate_gps = true;
        config.simulation_track_name = Some(track);
    }
    if let Some(dir) = args.recordings_dir {
        config.recordings_dir = dir;
    }
    if let Some(units) = args.units {
        config.voice_guidance_unit_system = units;
    }

    let route = route_loader::load_route(&args.route)?;

    let feed: Box<dyn LocationFeed> = if let Some(feed) = SimulatedFeed::from_config(&config)? {
        tracing::info!("Replaying {} recorded fixes", feed.len());
        Box::new(feed)
    } else if let Some(address) = args.nmea_tcp {
        Box::new(LiveFeed::new(NmeaProvider::new(NmeaSource::Tcp(address))))
    } else if let Some(path) = args.nmea_file {
        Box::new(LiveFeed::new(NmeaProvider::new(NmeaSource::File(path))))
    } else {
        bail!("No location source, pass --simulate <track>, --nmea-tcp or --nmea-file");
    };

    let tracker = Arc::new(ReferenceTracker::new(&route));
    let session = RouteTrackingSession::new(config);

    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let json = args.events_json;
    let _subscription = session.subscribe(move |event| {
        let record = EventRecord::from(event);
        if json {
            match serde_json::to_string(&record) {
                Ok(line) => println!("{}", line),
                Err(err) => tracing::warn!("Failed to serialize event: {}", err),
            }
        } else {
            println!("{}", record);
        }

        if matches!(event, SessionEvent::DestinationReached | SessionEvent::Cancelled) {
            let _ = done_tx.send(());
        }
    });

    session.start(route, feed, tracker).await?;

    tokio::select! {
        _ = done_rx.recv() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Interrupted");
            session.cancel();
        }
    }

    Ok(())
}

fn inspect(path: &Path) -> anyhow::Result<()> {
    let route = route_loader::load_route(path)?;
    let units = UnitSystem::default();

    println!("{}", route.name);
    for (i, maneuver) in route.maneuvers.iter().enumerate() {
        println!("{:>3}  {:<40} {}", i, maneuver.text, format::maneuver_distance_text(maneuver.length_m, units));
    }
    println!("{}", format::summary_text(route.total_length_m, route.total_time_s, units));

    Ok(())
}
