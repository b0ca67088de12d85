use std::path::PathBuf;

use anyhow::{Context, anyhow};
use chrono::{DateTime, FixedOffset, Local, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use geo::Point;
use route_traffic::directions::{DirectionsProvider, FileDirectionsProvider, RouteOptions};
use route_traffic::forecast::ForecastRequest;
use route_traffic::oracle::HttpOracle;
use route_traffic::{EngineConfig, PlanRequest, RouteTrafficEngine, ScoringPreferences};
use route_traffic_response::{ForecastResponse, PlanResponse, RouteSummary};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "route-traffic", author, version, about, long_about = None)]
struct Cli {
    /// Path to an engine configuration file (JSON). Defaults are used when omitted.
    #[arg(env = "ROUTE_TRAFFIC_CONFIG", long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the traffic prediction service.
    #[arg(
        env = "ROUTE_TRAFFIC_ORACLE_URL",
        long,
        global = true,
        default_value = "http://localhost:5001"
    )]
    oracle_url: String,

    /// Subcommand/tool to run
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank recorded route alternatives and suggest one
    Plan {
        /// JSON file with an array of route alternatives
        routes: PathBuf,
        /// Origin as lat,lng
        #[arg(long, value_parser = parse_lat_lng)]
        origin: Point,
        /// Destination as lat,lng
        #[arg(long, value_parser = parse_lat_lng)]
        destination: Point,
        /// Departure time (RFC 3339). Defaults to now.
        #[arg(long, value_parser = DateTime::parse_from_rfc3339)]
        departure: Option<DateTime<FixedOffset>>,
        #[arg(long)]
        prioritize_time: bool,
        #[arg(long)]
        prioritize_traffic: bool,
        /// Route index the traveler is currently following
        #[arg(long)]
        selected: Option<usize>,
    },
    /// Estimate traffic along a single recorded route
    Analyze {
        /// JSON file with an array of route alternatives
        routes: PathBuf,
        /// Index of the route to analyze
        #[arg(long, default_value_t = 0)]
        index: usize,
        /// Departure time (RFC 3339). Defaults to now.
        #[arg(long, value_parser = DateTime::parse_from_rfc3339)]
        departure: Option<DateTime<FixedOffset>>,
    },
    /// Forecast travel time over the coming hours
    Forecast {
        /// Origin as lat,lng
        #[arg(long, value_parser = parse_lat_lng)]
        origin: Point,
        /// Destination as lat,lng
        #[arg(long, value_parser = parse_lat_lng)]
        destination: Point,
        /// Free-flow travel time, in minutes
        #[arg(long)]
        base_duration: f64,
        /// First forecast instant (RFC 3339). Defaults to now.
        #[arg(long, value_parser = DateTime::parse_from_rfc3339)]
        start: Option<DateTime<FixedOffset>>,
        /// How far ahead to forecast, in minutes. Defaults to the configured horizon.
        #[arg(long)]
        horizon: Option<i64>,
        /// Minutes between forecast points. Defaults to the configured interval.
        #[arg(long)]
        interval: Option<i64>,
        #[arg(long, default_value = "route")]
        route_id: String,
    },
}

/// Parses `lat,lng` into a point (x = longitude, y = latitude).
fn parse_lat_lng(input: &str) -> anyhow::Result<Point> {
    let (lat, lng) = input
        .split_once(',')
        .ok_or_else(|| anyhow!("Expected a coordinate in the form lat,lng"))?;
    let lat: f64 = lat.trim().parse().context("invalid latitude")?;
    let lng: f64 = lng.trim().parse().context("invalid longitude")?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(anyhow!("Coordinate {lat},{lng} is out of range"));
    }
    Ok(Point::new(lng, lat))
}

/// A duration given in whole minutes, or `default` when absent.
fn minutes_or(minutes: Option<i64>, default: TimeDelta) -> anyhow::Result<TimeDelta> {
    match minutes {
        Some(minutes) => TimeDelta::try_minutes(minutes)
            .ok_or_else(|| anyhow!("{minutes} minutes is out of range")),
        None => Ok(default),
    }
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        // Standard logger, configured via the RUST_LOG env variable
        .with(tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env()))
        .init();

    let cli = Cli::parse();

    let config = if let Some(path) = &cli.config {
        info!(path = %path.display(), "Using engine configuration");
        EngineConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config at {}", path.display()))?
    } else {
        EngineConfig::default()
    };
    let oracle = HttpOracle::new(&cli.oracle_url, config.call_timeout)?;
    info!(endpoint = %oracle.endpoint(), "Using prediction oracle");
    let engine = RouteTrafficEngine::boxed(oracle, config);

    match cli.command {
        Commands::Plan {
            routes,
            origin,
            destination,
            departure,
            prioritize_time,
            prioritize_traffic,
            selected,
        } => {
            let directions = FileDirectionsProvider::new(routes);
            let request = PlanRequest {
                origin,
                destination,
                options: RouteOptions::departing_at(departure.unwrap_or_else(now)),
                preferences: ScoringPreferences {
                    prioritize_time,
                    prioritize_traffic,
                },
            };

            let mut selector = engine.selector();
            if let Some(route_id) = selected {
                selector.select_manually(route_id);
            }

            let plan = engine.plan(&directions, &request, &mut selector).await?;
            print_json(&PlanResponse::new(&plan, Utc::now()))
        }
        Commands::Analyze {
            routes,
            index,
            departure,
        } => {
            let departure = departure.unwrap_or_else(now);
            let directions = FileDirectionsProvider::new(&routes);
            // Recorded routes don't depend on the endpoints.
            let origin = Point::new(0.0, 0.0);
            let route = directions
                .routes(origin, origin, &RouteOptions::departing_at(departure))
                .await?
                .into_iter()
                .nth(index)
                .ok_or_else(|| {
                    anyhow!("No route at index {index} in {}", routes.display())
                })?;

            let evaluation = engine
                .analyze_route(route, departure, ScoringPreferences::default())
                .await;
            print_json(&RouteSummary::from(&evaluation))
        }
        Commands::Forecast {
            origin,
            destination,
            base_duration,
            start,
            horizon,
            interval,
            route_id,
        } => {
            let forecast_config = &engine.config().forecast;
            let request = ForecastRequest {
                route_id,
                origin,
                destination,
                base_duration_min: base_duration,
                start: start.unwrap_or_else(now),
                horizon: minutes_or(horizon, forecast_config.horizon())
                    .context("invalid --horizon")?,
                interval: minutes_or(interval, forecast_config.interval())
                    .context("invalid --interval")?,
            };

            let forecast = engine.forecast(&request).await?;
            print_json(&ForecastResponse::from(forecast))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lat_lng() {
        let point = parse_lat_lng("12.97, 77.59").expect("valid coordinate");
        assert_eq!(point, Point::new(77.59, 12.97));

        assert!(parse_lat_lng("12.97").is_err());
        assert!(parse_lat_lng("north,77.59").is_err());
        assert!(parse_lat_lng("95.0,77.59").is_err());
    }

    #[test]
    fn test_minutes_or() {
        let default = TimeDelta::hours(6);
        assert_eq!(minutes_or(None, default).unwrap(), default);
        assert_eq!(minutes_or(Some(90), default).unwrap(), TimeDelta::minutes(90));
        assert!(minutes_or(Some(i64::MAX), default).is_err());
        assert!(minutes_or(Some(i64::MIN), default).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_plan_args() {
        let cli = Cli::try_parse_from([
            "route-traffic",
            "plan",
            "routes.json",
            "--origin",
            "12.97,77.59",
            "--destination",
            "12.93,77.62",
            "--departure",
            "2025-03-14T08:30:00+05:30",
            "--prioritize-traffic",
        ])
        .expect("valid arguments");

        let Commands::Plan {
            departure,
            prioritize_traffic,
            prioritize_time,
            selected,
            ..
        } = cli.command
        else {
            panic!("expected the plan subcommand");
        };
        assert_eq!(
            departure.map(|d| d.to_rfc3339()),
            Some("2025-03-14T08:30:00+05:30".to_string())
        );
        assert!(prioritize_traffic);
        assert!(!prioritize_time);
        assert_eq!(selected, None);
    }
}
