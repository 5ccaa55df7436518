use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use navigation_route::{
    LocationMatcherResult, MetersPerSecond, NavigationRoute, RouteLegProgress, RouteProgress,
    RouteProgressState,
};
use route_parsing_queue::ParsingTaskCoordinator;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use traffic_override::{TrafficOverrideOptions, TrafficOverrideSession};

#[derive(Parser, Debug)]
#[command(name = "traffic-override-cli", author, version, about, long_about = None)]
struct Cli {
    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Feed recorded location samples through a traffic override session, printing one JSON line per sample
    Replay {
        /// Route JSON file
        #[arg(long, env = "TRAFFIC_OVERRIDE_ROUTE")]
        route: PathBuf,
        /// JSON lines file with one location sample per line
        #[arg(long, env = "TRAFFIC_OVERRIDE_SAMPLES")]
        samples: PathBuf,
        /// Traffic override options (JSON); defaults are used for anything missing
        #[arg(long, env = "TRAFFIC_OVERRIDE_OPTIONS")]
        options: Option<PathBuf>,
    },
}

/// One recorded tick: where the route-following engine placed the vehicle, and how fast it was going.
#[derive(Deserialize, Debug)]
struct LocationSample {
    #[serde(default = "tracking")]
    state: RouteProgressState,
    leg_progress: Option<RouteLegProgress>,
    speed: Option<MetersPerSecond>,
}

fn tracking() -> RouteProgressState {
    RouteProgressState::Tracking
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read {what} at {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Invalid JSON in {what}"))
}

async fn replay(route: &Path, samples: &Path, options: Option<&Path>) -> anyhow::Result<()> {
    let route: NavigationRoute = read_json(route, "route")?;
    let options = match options {
        Some(path) => read_json(path, "options")?,
        None => TrafficOverrideOptions::default(),
    };
    let session = TrafficOverrideSession::new(options, Arc::new(ParsingTaskCoordinator::new()))
        .context("Invalid traffic override options")?;
    info!(route_id = route.id(), legs = route.legs().len(), "Replaying samples");
    session.set_route(route);

    let samples = fs::read_to_string(samples)
        .with_context(|| format!("Failed to read samples at {}", samples.display()))?;
    let mut published = 0;
    for (line_index, line) in samples.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let sample: LocationSample = serde_json::from_str(line)
            .with_context(|| format!("Invalid sample on line {}", line_index + 1))?;
        let route = session
            .current_route()
            .context("The session lost its route")?;

        let progress = RouteProgress {
            state: sample.state,
            route,
            current_leg_progress: sample.leg_progress,
        };
        let location = LocationMatcherResult {
            speed: sample.speed,
        };
        let outcome = session.on_location_update(&progress, &location).await;
        if outcome.published.is_some() {
            published += 1;
        }

        let congestion = sample.leg_progress.and_then(|leg_progress| {
            session
                .current_route()?
                .leg(leg_progress.leg_index)?
                .congestion_numeric()
                .map(<[_]>::to_vec)
        });
        println!(
            "{}",
            serde_json::json!({
                "tick": line_index,
                "analysis": outcome.analysis.to_string(),
                "action": outcome.action,
                "congestion": congestion,
            })
        );
    }

    info!(published, "Replay finished");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            route,
            samples,
            options,
        } => replay(&route, &samples, options.as_deref()).await,
    }
}
