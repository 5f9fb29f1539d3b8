use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};

use engine::progress::{ProgressEvent, ProgressSink};
use model::base_types::{LocationId, VehicleId};
use model::config::Config;
use model::io::csv_loader;

/// Runs the fleet placement & assignment engine against the five §6.1 CSV
/// tables and writes the §6.3 JSON output. Stands in for "shell helpers".
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Locations table (id;name;lat;long;is_hub)
    #[arg(long)]
    locations: PathBuf,

    /// Location-relations table (id;id_loc_1;id_loc_2;dist;time)
    #[arg(long)]
    relations: PathBuf,

    /// Vehicles table (id;registration;brand;service_interval_km;...)
    #[arg(long)]
    vehicles: PathBuf,

    /// Routes table (id;start_datetime;end_datetime;distance_km)
    #[arg(long)]
    routes: PathBuf,

    /// Segments table (id;route_id;seq;start_loc_id;end_loc_id;...)
    #[arg(long)]
    segments: PathBuf,

    /// Optional JSON config override; defaults used for any omitted group.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the JSON run output. Defaults to stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Suppress the summary table printed to stderr after the run.
    #[arg(long)]
    quiet: bool,
}

/// Forwards progress events to a terminal bar. The hot loop never blocks on
/// this (§5 "Suspension points"): `ProgressBar` updates are lock-free
/// counter bumps.
struct CliProgress {
    bar: ProgressBar,
}

impl ProgressSink for CliProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::PlacementComplete { vehicles_placed } => {
                self.bar.set_message(format!("placed {vehicles_placed} vehicles"));
            }
            ProgressEvent::RouteProcessed { routes_processed, routes_total, .. } => {
                self.bar.set_length(routes_total);
                self.bar.set_position(routes_processed);
            }
            ProgressEvent::DayBoundaryCrossed { day } => {
                self.bar.set_message(format!("crossed {}", day.format("%Y-%m-%d")));
            }
            ProgressEvent::RunComplete { unassigned, .. } => {
                self.bar.finish_with_message(format!("done, {unassigned} unassigned"));
            }
        }
    }
}

fn placement_table(placement: &HashMap<VehicleId, LocationId>) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["vehicle_id", "location_id"]);
    let mut rows: Vec<_> = placement.iter().collect();
    rows.sort_by_key(|(v, _)| v.0);
    for (vehicle, location) in rows {
        table.add_row(vec![vehicle.0.to_string(), location.0.to_string()]);
    }
    table
}

fn summary_table(summary: &solver::RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["metric", "value"]);
    table.add_row(vec!["total_cost", &format!("{:.2}", summary.total_cost)]);
    table.add_row(vec!["relocation_cost", &format!("{:.2}", summary.total_relocation_cost)]);
    table.add_row(vec!["overage_cost", &format!("{:.2}", summary.total_overage_cost)]);
    table.add_row(vec!["service_cost", &format!("{:.2}", summary.total_service_cost)]);
    table.add_row(vec!["relocations", &summary.relocations.to_string()]);
    table.add_row(vec!["services", &summary.services.to_string()]);
    table.add_row(vec!["overage_km", &summary.overage_km.to_string()]);
    table.add_row(vec!["assigned_routes", &summary.assigned_routes.to_string()]);
    table.add_row(vec!["unassigned_routes", &summary.unassigned_routes.to_string()]);
    table.add_row(vec!["wall_clock_seconds", &format!("{:.3}", summary.wall_clock_seconds)]);
    table
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
            let value: serde_json::Value = serde_json::from_str(&raw).context("config file is not valid JSON")?;
            Config::from_json(&value).context("config file does not match the recognized options (§6.2)")?
        }
        None => Config::default(),
    };
    let cache_capacity = config.performance.use_relation_cache.then_some(model::io::DEFAULT_RELATION_CACHE_CAPACITY);

    let instance = csv_loader::load(
        cli.locations.to_str().context("locations path is not valid UTF-8")?,
        cli.relations.to_str().context("relations path is not valid UTF-8")?,
        cli.vehicles.to_str().context("vehicles path is not valid UTF-8")?,
        cli.routes.to_str().context("routes path is not valid UTF-8")?,
        cli.segments.to_str().context("segments path is not valid UTF-8")?,
        cache_capacity,
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    let bar = ProgressBar::new(instance.routes.len() as u64);
    bar.set_style(ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}").unwrap());
    let progress = CliProgress { bar };

    let result = solver::run_driver::execute(
        &instance.vehicle_specs,
        &instance.locations,
        instance.graph.as_ref(),
        &instance.routes,
        &config,
        &progress,
        || false,
        None,
    )
    .map_err(|e| anyhow::anyhow!("{e}"))?;

    if !cli.quiet {
        eprintln!("{}", placement_table(&result.placement));
        eprintln!("{}", summary_table(&result.summary));
    }

    let output = serde_json::json!({
        "summary": result.summary,
        "assignments": result.assignments,
        "vehicle_states": result.vehicle_states,
    });
    let rendered = serde_json::to_string_pretty(&output)?;

    match cli.output {
        Some(path) => fs::write(&path, rendered).with_context(|| format!("writing output to {}", path.display()))?,
        None => println!("{rendered}"),
    }

    Ok(())
}
