//! lagosnet CLI - lake network tracing and watershed accumulation

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use geo::MultiPolygon;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use lagosnet_algorithms::network::{
    ConnectivityClassifier, ConnectivityParams, Direction, ExternalIds, FlowGraphParams, FlowGraphStore,
    HydroNetwork, LakeFilterParams, LakePopulation, LakePopulationFilter, TraceConfiguration,
};
use lagosnet_algorithms::vector::GeoEngine;
use lagosnet_algorithms::watershed::{
    flag_network_equivalence, AccumulationMode, AccumulationParams, BatchReport, CatchmentKeys,
    WatershedAccumulator,
};
use lagosnet_core::io::{
    read_flow_table, read_polygons, read_segment_table, read_waterbody_table, write_polygons, FlowColumns,
    SegmentColumns, WaterbodyColumns,
};
use lagosnet_core::vector::PolygonFeature;
use lagosnet_core::{Algorithm, CatchmentStore, Waterbody};
use lagosnet_parallel::{set_num_threads, ProcessingMode};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lagosnet")]
#[command(author, version, about = "Lake network tracing and watershed accumulation", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads for batch accumulation (default: all cores)
    #[arg(short = 'j', long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the lake population from a waterbody table
    Lakes {
        #[command(flatten)]
        waterbodies: WaterbodyArgs,
        #[command(flatten)]
        lakes: LakeArgs,
        /// Output CSV (lake_id, area_km2); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Trace the network up or downstream
    Trace {
        #[command(flatten)]
        subregion: SubregionArgs,
        /// Start waterbody ids
        #[arg(short = 'w', long = "waterbody")]
        start_waterbodies: Vec<String>,
        /// Start segment ids
        #[arg(short = 's', long = "segment")]
        start_segments: Vec<String>,
        #[arg(short, long, value_enum, default_value = "up")]
        direction: DirectionArg,
        /// Waterbodies whose segments stop the trace
        #[arg(long = "stop")]
        stops: Vec<String>,
        /// Stop at every lake of at least this size, km²
        #[arg(long)]
        stop_threshold: Option<f64>,
        #[command(flatten)]
        lakes: LakeArgs,
        /// Output CSV (id); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify the connectivity of every lake
    Classify {
        #[command(flatten)]
        subregion: SubregionArgs,
        #[command(flatten)]
        lakes: LakeArgs,
        /// Lakes of at least this size count as upstream lakes, km²
        #[arg(short, long, default_value = "0.1")]
        threshold: f64,
        /// Output CSV (lake_id, connectivity); stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List subregion outlets and inlets
    Outlets {
        #[command(flatten)]
        subregion: SubregionArgs,
    },
    /// Accumulate lake watersheds from local catchments
    Accumulate {
        #[command(flatten)]
        subregion: SubregionArgs,
        #[command(flatten)]
        lakes: LakeArgs,
        /// Local catchment polygons (GeoJSON)
        #[arg(long)]
        catchments: PathBuf,
        /// Id property of the catchment features
        #[arg(long, default_value = "NHDPlusID")]
        catchment_id_field: String,
        /// Lake footprint polygons (GeoJSON)
        #[arg(long)]
        footprints: Option<PathBuf>,
        /// Id property of the footprint features
        #[arg(long, default_value = "NHDPlusID")]
        footprint_id_field: String,
        #[arg(short, long, value_enum, default_value = "network")]
        mode: ModeArg,
        /// Interlake stop threshold, km²
        #[arg(short, long, default_value = "0.1")]
        threshold: f64,
        /// Area difference under which interlake equals network, polygon units
        #[arg(long, default_value = "10.0")]
        tolerance: f64,
        /// Catchments and footprints are keyed by raw source ids
        #[arg(long)]
        raw_keys: bool,
        /// Restrict the batch to these lake ids
        #[arg(long = "lake-id")]
        lake_ids: Vec<String>,
        /// Output watersheds (GeoJSON)
        output: PathBuf,
        /// Per-lake status report (CSV)
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Up,
    Down,
}

impl From<DirectionArg> for Direction {
    fn from(d: DirectionArg) -> Self {
        match d {
            DirectionArg::Up => Direction::Up,
            DirectionArg::Down => Direction::Down,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ModeArg {
    Network,
    Interlake,
    Both,
}

// ─── Shared arguments ───────────────────────────────────────────────────

#[derive(Args)]
struct WaterbodyArgs {
    /// Waterbody table (CSV)
    #[arg(long)]
    waterbodies: PathBuf,
    #[arg(long, default_value = "NHDPlusID")]
    waterbody_id_column: String,
    #[arg(long, default_value = "AreaSqKm")]
    area_column: String,
    #[arg(long, default_value = "FCode")]
    waterbody_fcode_column: String,
    /// Raw source id column of the waterbody table
    #[arg(long, default_value = "Permanent_Identifier")]
    waterbody_source_column: String,
}

#[derive(Args)]
struct SubregionArgs {
    /// Flow relation table (CSV)
    #[arg(long)]
    flows: PathBuf,
    /// Segment table (CSV); without it the graph is built from the flow table alone
    #[arg(long)]
    segments: Option<PathBuf>,
    #[command(flatten)]
    waterbodies: WaterbodyArgs,
    #[arg(long, default_value = "FromNHDPID")]
    from_column: String,
    #[arg(long, default_value = "ToNHDPID")]
    to_column: String,
    #[arg(long, default_value = "NHDPlusID")]
    segment_id_column: String,
    /// Segment column holding the associated waterbody id
    #[arg(long, default_value = "WBArea_Permanent_Identifier")]
    segment_waterbody_column: String,
    /// Drop intermittent and ephemeral streams
    #[arg(long)]
    exclude_intermittent: bool,
    /// Keep flow rows naming segments outside the segment table as boundary nodes
    #[arg(long)]
    allow_external: bool,
}

#[derive(Args)]
struct LakeArgs {
    /// Use the 0.01 km² lake cutoff instead of 0.009 km²
    #[arg(long)]
    strict: bool,
    /// File of waterbody ids always counted as lakes, one per line
    #[arg(long)]
    force_include: Option<PathBuf>,
    /// Minimum size for reservoirs, km²
    #[arg(long, default_value = "0.1")]
    reservoir_min: f64,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn read_id_list(path: &Path) -> Result<HashSet<String>> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

fn load_waterbodies(args: &WaterbodyArgs) -> Result<Vec<Waterbody>> {
    let columns = WaterbodyColumns {
        id: args.waterbody_id_column.clone(),
        area: args.area_column.clone(),
        fcode: args.waterbody_fcode_column.clone(),
        source_id: Some(args.waterbody_source_column.clone()),
    };
    read_waterbody_table(&args.waterbodies, &columns).context("Failed to read waterbody table")
}

fn load_subregion(args: &SubregionArgs) -> Result<HydroNetwork> {
    let pb = spinner("Reading subregion tables...");
    let flow_columns = FlowColumns {
        from: args.from_column.clone(),
        to: args.to_column.clone(),
    };
    let flows = read_flow_table(&args.flows, &flow_columns).context("Failed to read flow table")?;

    let segments = match &args.segments {
        Some(path) => {
            let columns = SegmentColumns {
                id: args.segment_id_column.clone(),
                waterbody: Some(args.segment_waterbody_column.clone()),
                ..Default::default()
            };
            read_segment_table(path, &columns).context("Failed to read segment table")?
        }
        None => Vec::new(),
    };
    let waterbodies = load_waterbodies(&args.waterbodies)?;
    pb.finish_and_clear();

    let params = FlowGraphParams {
        external_ids: if args.allow_external {
            ExternalIds::AsBoundary
        } else {
            ExternalIds::Reject
        },
        ..Default::default()
    };
    let store = FlowGraphStore::new(flows, segments, params);
    let net = HydroNetwork::from_store(&store, waterbodies, args.exclude_intermittent)
        .context("Failed to build the flow graph")?;
    info!(
        "Subregion: {} segments, {} edges, {} waterbodies",
        net.graph().len(),
        net.graph().edge_count(),
        net.waterbodies().len()
    );
    Ok(net)
}

fn lake_population(waterbodies: &[Waterbody], args: &LakeArgs) -> Result<LakePopulation> {
    let force_include = match &args.force_include {
        Some(path) => read_id_list(path)?,
        None => HashSet::new(),
    };
    let params = LakeFilterParams {
        strict_min_size: args.strict,
        force_include,
        reservoir_min_km2: args.reservoir_min,
        ..Default::default()
    };
    let lakes = LakePopulationFilter.execute(waterbodies.to_vec(), params)?;
    info!("Lakes: {} of {} waterbodies", lakes.len(), waterbodies.len());
    Ok(lakes)
}

/// Write rows as CSV to `output`, or to stdout.
fn write_rows<I>(output: Option<&Path>, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer: csv::Writer<Box<dyn std::io::Write>> = match output {
        Some(path) => csv::Writer::from_writer(Box::new(
            std::fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        )),
        None => csv::Writer::from_writer(Box::new(std::io::stdout())),
    };
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

fn watershed_features(report: &BatchReport<MultiPolygon<f64>>) -> Vec<PolygonFeature> {
    report
        .watersheds
        .iter()
        .map(|ws| {
            PolygonFeature::new(ws.polygon.clone())
                .with_property("lake_id", ws.lake_id.as_str())
                .with_property("mode", ws.mode.label())
                .with_property("subtype", ws.subtype.label())
                .with_property("area", ws.area)
                .with_property("includes_subregion_inlet", ws.includes_subregion_inlet)
                .with_property("equals_network_watershed", ws.equals_network_watershed)
                .with_property("trace_size", ws.trace_size as i64)
        })
        .collect()
}

fn report_rows(report: &BatchReport<MultiPolygon<f64>>) -> Vec<Vec<String>> {
    let mode = report.mode.label();
    let row = |id: &str, status: &str, detail: &str| {
        vec![id.to_string(), mode.to_string(), status.to_string(), detail.to_string()]
    };
    let islands: HashSet<&str> = report.islands.iter().map(String::as_str).collect();

    let mut rows = Vec::new();
    for ws in &report.watersheds {
        let status = if islands.contains(ws.lake_id.as_str()) { "island" } else { "ok" };
        rows.push(row(&ws.lake_id, status, ws.subtype.label()));
    }
    rows.extend(report.skipped.iter().map(|id| row(id, "skipped", "not in subregion")));
    rows.extend(report.failed.iter().map(|(id, err)| row(id, "failed", err)));
    rows.extend(report.empty.iter().map(|id| row(id, "empty", "")));
    rows
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;
    if let Some(threads) = cli.threads {
        set_num_threads(threads);
    }

    match cli.command {
        // ── Lakes ────────────────────────────────────────────────────
        Commands::Lakes {
            waterbodies,
            lakes,
            output,
        } => {
            let start = Instant::now();
            let table = load_waterbodies(&waterbodies)?;
            let population = lake_population(&table, &lakes)?;
            let rows = population
                .iter()
                .map(|(id, area)| vec![id.to_string(), area.to_string()]);
            write_rows(output.as_deref(), &["lake_id", "area_km2"], rows)?;
            if let Some(path) = &output {
                done("Lake population", path, start.elapsed());
            }
        }

        // ── Trace ────────────────────────────────────────────────────
        Commands::Trace {
            subregion,
            start_waterbodies,
            start_segments,
            direction,
            stops,
            stop_threshold,
            lakes,
            output,
        } => {
            if start_waterbodies.is_empty() && start_segments.is_empty() {
                anyhow::bail!("Give at least one --waterbody or --segment to trace from");
            }
            let start = Instant::now();
            let net = load_subregion(&subregion)?;
            let direction = Direction::from(direction);

            let mut config = TraceConfiguration::new().with_stop_ids(&net, stops.iter().map(String::as_str));
            if let Some(threshold) = stop_threshold {
                let population = lake_population(net.waterbodies(), &lakes)?;
                config = config.with_size_threshold_stops(&net, &population, threshold);
            }

            let tracer = net.tracer(&config);
            let mut ids = BTreeSet::new();
            for wb in &start_waterbodies {
                let trace = tracer.trace_waterbody(wb, direction);
                if trace.is_empty() {
                    warn!("waterbody {} is not in this subregion", wb);
                }
                ids.extend(trace.ids(&net));
            }
            for seg in &start_segments {
                let traced = match direction {
                    Direction::Up => tracer.trace_up(seg),
                    Direction::Down => tracer.trace_down(seg),
                };
                ids.extend(traced);
            }
            info!("Trace: {} ids", ids.len());

            write_rows(output.as_deref(), &["id"], ids.into_iter().map(|id| vec![id]))?;
            if let Some(path) = &output {
                done("Trace", path, start.elapsed());
            }
        }

        // ── Classify ─────────────────────────────────────────────────
        Commands::Classify {
            subregion,
            lakes,
            threshold,
            output,
        } => {
            let start = Instant::now();
            let net = load_subregion(&subregion)?;
            let population = lake_population(net.waterbodies(), &lakes)?;

            let pb = spinner("Classifying lakes...");
            let classifier = ConnectivityClassifier::new(
                &net,
                &population,
                &ConnectivityParams {
                    lake_threshold_km2: threshold,
                },
            );
            let classes = classifier.classify_all(&population);
            pb.finish_and_clear();

            let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
            for class in classes.values() {
                *counts.entry(class.label()).or_default() += 1;
            }
            for (label, n) in &counts {
                info!("  {}: {}", label, n);
            }

            let rows = classes
                .iter()
                .map(|(id, class)| vec![id.clone(), class.label().to_string()]);
            write_rows(output.as_deref(), &["lake_id", "connectivity"], rows)?;
            if let Some(path) = &output {
                done("Connectivity", path, start.elapsed());
            }
        }

        // ── Outlets ──────────────────────────────────────────────────
        Commands::Outlets { subregion } => {
            let net = load_subregion(&subregion)?;
            let graph = net.graph();
            println!("Outlets ({}):", net.subregion_outlets().len());
            for &s in net.subregion_outlets() {
                println!("  {}", graph.id(s));
            }
            println!("Inlets ({}):", net.subregion_inlets().len());
            for &s in net.subregion_inlets() {
                println!("  {}", graph.id(s));
            }
        }

        // ── Accumulate ───────────────────────────────────────────────
        Commands::Accumulate {
            subregion,
            lakes,
            catchments,
            catchment_id_field,
            footprints,
            footprint_id_field,
            mode,
            threshold,
            tolerance,
            raw_keys,
            lake_ids,
            output,
            report,
        } => {
            let start = Instant::now();
            let net = load_subregion(&subregion)?;
            let population = lake_population(net.waterbodies(), &lakes)?;

            let pb = spinner("Reading polygons...");
            let catchment_map =
                read_polygons(&catchments, &catchment_id_field).context("Failed to read catchments")?;
            let footprint_map = match &footprints {
                Some(path) => read_polygons(path, &footprint_id_field).context("Failed to read footprints")?,
                None => HashMap::new(),
            };
            pb.finish_and_clear();
            let store = CatchmentStore::from_maps(catchment_map, footprint_map);
            info!(
                "Polygons: {} catchments, {} footprints",
                store.catchment_count(),
                store.footprint_count()
            );

            let batch: Vec<String> = if lake_ids.is_empty() {
                population.ids().map(String::from).collect()
            } else {
                lake_ids
            };

            let base = AccumulationParams {
                lake_threshold_km2: threshold,
                area_tolerance: tolerance,
                catchment_keys: if raw_keys {
                    CatchmentKeys::Raw
                } else {
                    CatchmentKeys::Canonical
                },
                processing: ProcessingMode::Parallel,
                ..Default::default()
            };
            let run = |m: AccumulationMode| {
                let pb = spinner(&format!("Accumulating {} watersheds...", m));
                let params = AccumulationParams {
                    mode: m,
                    ..base.clone()
                };
                let accumulator = WatershedAccumulator::new(&net, &store, &GeoEngine, &population, params);
                let result = accumulator.accumulate_batch(&batch);
                pb.finish_and_clear();
                result.log_summary();
                result
            };

            let reports = match mode {
                ModeArg::Network => vec![run(AccumulationMode::Network)],
                ModeArg::Interlake => vec![run(AccumulationMode::Interlake)],
                ModeArg::Both => {
                    let network = run(AccumulationMode::Network);
                    let mut interlake = run(AccumulationMode::Interlake);
                    flag_network_equivalence(&mut interlake.watersheds, &network.watersheds, tolerance);
                    vec![network, interlake]
                }
            };

            let features: Vec<PolygonFeature> = reports.iter().flat_map(watershed_features).collect();
            write_polygons(&output, &features).context("Failed to write watersheds")?;

            if let Some(path) = &report {
                let rows: Vec<Vec<String>> = reports.iter().flat_map(report_rows).collect();
                write_rows(Some(path), &["lake_id", "mode", "status", "detail"], rows)?;
            }
            done("Watersheds", &output, start.elapsed());
        }
    }

    Ok(())
}
