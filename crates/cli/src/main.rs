//! regionbuf CLI - buffer a named region of a boundary shapefile

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use regionbuf_algorithms::engine::NativeGeoprocessor;
use regionbuf_algorithms::vector::{area, extent};
use regionbuf_algorithms::workflow::{
    buffer_named_region, BufferOutcome, PublishStatus, RegionBufferParams,
};
use regionbuf_core::io::read_shapefile;
use regionbuf_core::project::ProjectRef;
use regionbuf_core::vector::geometry_kind;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "regionbuf")]
#[command(author, version, about = "Buffer a named region of a boundary shapefile", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select a feature by attribute, buffer it (dissolve all) and write a shapefile
    Buffer {
        /// Input boundary shapefile
        #[arg(default_value = "CA_Counties.shp")]
        source: PathBuf,
        /// Output shapefile (default: <source dir>/<value>_buffer.shp)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Buffer distance with unit, e.g. "0.5 Miles", "800 Meters"
        #[arg(short, long, default_value = "0.5 Miles")]
        distance: String,
        /// Attribute field to match
        #[arg(short, long, default_value = "NAME")]
        field: String,
        /// Value the field must equal
        #[arg(short, long, default_value = "Fresno")]
        target: String,
        /// Fail instead of replacing an existing output
        #[arg(long)]
        no_overwrite: bool,
        /// Add the output to the first map of a project
        #[arg(long)]
        publish: bool,
        /// Project document to publish into (default: the active project)
        #[arg(long, requires = "publish")]
        project: Option<PathBuf>,
        /// Project document that is active in this session
        #[arg(long, env = "REGIONBUF_ACTIVE_PROJECT")]
        active_project: Option<PathBuf>,
    },
    /// Show information about a shapefile
    Info {
        /// Input shapefile
        input: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn run_buffer(params: RegionBufferParams) -> Result<()> {
    let start = Instant::now();
    let mut engine = NativeGeoprocessor::new();

    let pb = spinner("Buffering...");
    let outcome = buffer_named_region(&mut engine, &params);
    pb.finish_and_clear();

    match outcome.context("Buffer failed")? {
        BufferOutcome::NoMatch { .. } => println!("No output produced"),
        BufferOutcome::Created {
            output,
            summary,
            publish,
        } => {
            println!("Success: {}", output.display());
            println!(
                "  {} input features, distance {:.3} dataset units, area {:.1}",
                summary.input_features, summary.distance, summary.area
            );
            match publish {
                PublishStatus::Skipped => {}
                PublishStatus::Published { project, map } => {
                    println!("  Added to map '{}' in {}", map, project.display())
                }
                PublishStatus::NoMaps { project } => {
                    println!("  Not published: {} has no maps", project.display())
                }
                PublishStatus::Failed(reason) => println!("  Not published: {}", reason),
            }
            println!("  Processing time: {:.2?}", start.elapsed());
        }
    }
    Ok(())
}

fn run_info(input: PathBuf) -> Result<()> {
    let pb = spinner("Reading shapefile...");
    let dataset = read_shapefile(&input).context("Failed to read shapefile")?;
    pb.finish_and_clear();
    info!("Input: {} features", dataset.len());

    let geoms: Vec<_> = dataset
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .collect();
    let mut kinds: Vec<&str> = geoms.iter().map(|g| geometry_kind(g)).collect();
    kinds.sort_unstable();
    kinds.dedup();

    println!("File: {}", input.display());
    println!("Features: {}", dataset.len());
    println!("Geometry: {}", if kinds.is_empty() { "none".to_string() } else { kinds.join(", ") });
    match &dataset.crs {
        Some(crs) => println!("CRS: {} ({:?})", crs, crs.kind()),
        None => println!("CRS: unknown"),
    }
    if let Some(bb) = extent(geoms.iter().copied()) {
        println!(
            "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
            bb.min_x, bb.min_y, bb.max_x, bb.max_y
        );
    }
    let total_area: f64 = geoms.iter().map(|g| area(g)).sum();
    if total_area > 0.0 {
        println!("Total area: {:.3}", total_area);
    }
    println!("Fields:");
    for field in &dataset.fields {
        println!("  {:<11} {:?}({})", field.name, field.kind, field.length);
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Buffer {
            source,
            output,
            distance,
            field,
            target,
            no_overwrite,
            publish,
            project,
            active_project,
        } => {
            let publish = publish.then(|| project.map_or(ProjectRef::Current, ProjectRef::Path));
            run_buffer(RegionBufferParams {
                source,
                output,
                buffer_distance: distance,
                field_name: field,
                target_value: target,
                overwrite: !no_overwrite,
                publish,
                active_project,
            })
        }
        Commands::Info { input } => run_info(input),
    };

    if let Err(e) = &result {
        println!("Failed: {:#}", e);
    }
    result
}
