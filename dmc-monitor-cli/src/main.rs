use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

// Import from dmc-monitor-core
use dmc_monitor_core::{
    FileSnapshotStore, Monitor, MonitorConfig, PipelineStages, ReportPolicy, ReportType,
    SnapshotStore,
};

// Import CLI utilities
use dmc_monitor_cli::summary;

#[derive(Parser)]
#[command(name = "dmc-monitor")]
#[command(about = "Fetch, diff and export Sri Lanka DMC disaster reports")]
struct Cli {
    /// Path to custom config file (YAML format)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Snapshot directory (overrides `store.data_dir` from the config)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the newest report, diff it against the last snapshot and store it
    Refresh {
        /// situation, landslide, river_flood or weather
        report_type: ReportType,

        /// Dump all intermediate pipeline stage outputs to this directory
        #[arg(long)]
        dump_stages: Option<PathBuf>,

        /// Enable detailed profiling of all pipeline steps
        #[arg(long)]
        profile: bool,

        /// Also write the snapshot as GeoJSON to this file
        #[arg(long)]
        geojson: Option<PathBuf>,

        /// Print the full outcome as JSON instead of the summary
        #[arg(long)]
        json: bool,
    },
    /// Totals of every stored snapshot, oldest first
    History {
        report_type: ReportType,
    },
    /// Run locate → extract → normalize on a local PDF or HTML report
    Extract {
        report_type: ReportType,

        /// Path to the report file
        file: PathBuf,

        /// Write the snapshot to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: snapshot, geojson, or flat
        #[arg(short = 'f', long, default_value = "snapshot")]
        output_format: String,

        /// Dump all intermediate pipeline stage outputs to this directory
        #[arg(long)]
        dump_stages: Option<PathBuf>,

        /// Enable detailed profiling of all pipeline steps
        #[arg(long)]
        profile: bool,
    },
    /// Print the effective configuration and policy table as YAML
    ShowConfigs,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);

    match cli.command {
        Commands::Refresh {
            report_type,
            dump_stages,
            profile,
            geojson,
            json,
        } => refresh(
            &config,
            report_type,
            dump_stages.as_deref(),
            profile,
            geojson.as_deref(),
            json,
        ),
        Commands::History { report_type } => history(&config, report_type),
        Commands::Extract {
            report_type,
            file,
            output,
            output_format,
            dump_stages,
            profile,
        } => extract(
            &config,
            report_type,
            &file,
            output.as_deref(),
            &output_format,
            dump_stages.as_deref(),
            profile,
        ),
        Commands::ShowConfigs => show_configs(&config),
    }
}

fn load_config(cli: &Cli) -> MonitorConfig {
    let mut config = MonitorConfig::load_with_fallback(cli.config.as_deref());

    if let Some(config_path) = &cli.config {
        println!("📋 Loaded config from: {}", config_path);
    }

    // Apply CLI overrides to config
    if let Some(data_dir) = &cli.data_dir {
        config.store.data_dir = Some(data_dir.clone());
    }
    config
}

fn refresh(
    config: &MonitorConfig,
    report_type: ReportType,
    dump_stages: Option<&Path>,
    profile: bool,
    geojson: Option<&Path>,
    json: bool,
) -> Result<()> {
    let monitor = Monitor::from_config(config)?.with_profiling(profile);
    let policy = monitor.policy(report_type)?;
    let data_dir = config.store.resolved_data_dir();
    let mut store = FileSnapshotStore::new(&data_dir)?;

    if !json {
        println!("🔄 Refreshing {} ({})", report_type.display_name(), data_dir.display());
    }

    let (outcome, stages) = match monitor.refresh_capture_stages(report_type, &mut store) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("❌ {e}");
            if let Some(raw_region) = e.source.raw_region() {
                eprintln!("   Located region text:\n{}", indent(raw_region));
            }
            std::process::exit(1);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", summary::render_outcome(&outcome, policy));
    }

    if let Some(dir) = dump_stages {
        save_stages(&stages, dir)?;
        println!("✅ All stages dumped to: {}", dir.display());
    }

    if let Some(path) = geojson {
        outcome.snapshot.save_with_format(path, "geojson", policy)?;
        println!("🗺️  GeoJSON saved to: {}", path.display());
    }

    Ok(())
}

fn history(config: &MonitorConfig, report_type: ReportType) -> Result<()> {
    let table = config.policy_table();
    let policy = table
        .get(report_type)
        .with_context(|| format!("no policy for {report_type} reports"))?;
    let store = FileSnapshotStore::new(config.store.resolved_data_dir())?;
    let snapshots = store.history(report_type)?;

    println!(
        "🗂️  {} history ({} snapshots)",
        report_type.display_name(),
        snapshots.len()
    );
    println!("{}", summary::render_history(&snapshots, policy));
    Ok(())
}

fn extract(
    config: &MonitorConfig,
    report_type: ReportType,
    file: &Path,
    output: Option<&Path>,
    output_format: &str,
    dump_stages: Option<&Path>,
    profile: bool,
) -> Result<()> {
    if !file.exists() {
        println!("⚠️  Report file not found at: {}", file.display());
        println!("   Please check the file path.");
        std::process::exit(1);
    }

    let monitor = Monitor::from_config(config)?.with_profiling(profile);
    let policy = monitor.policy(report_type)?;
    let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;

    println!("📄 Processing: {}", file.display());
    let stages = match monitor.extract_document(report_type, bytes, &file.to_string_lossy()) {
        Ok(stages) => stages,
        Err(e) => {
            eprintln!("❌ Extraction failed at {} stage: {e}", e.stage());
            if let Some(raw_region) = e.raw_region() {
                eprintln!("   Located region text:\n{}", indent(raw_region));
            }
            std::process::exit(1);
        }
    };

    println!("{}", summary::render_snapshot_header(&stages.snapshot));
    println!(
        "   {} via {} extractor: {} raw rows",
        stages.region_description,
        stages.extractor,
        stages.raw_table.rows.len()
    );
    if let Some(totals) = summary::render_totals(&stages.snapshot, policy) {
        println!("{totals}");
    }
    if let Some(warnings) = summary::render_warnings(&stages.warnings) {
        println!("{warnings}");
    }

    if let Some(dir) = dump_stages {
        save_stages(&stages, dir)?;
        println!("✅ All stages dumped to: {}", dir.display());
    }

    if let Some(path) = output {
        stages
            .snapshot
            .save_with_format(path, output_format, policy)?;
        match output_format {
            "geojson" => println!("💾 GeoJSON saved to: {}", path.display()),
            "flat" => println!("💾 Flat format saved to: {}", path.display()),
            "snapshot" => println!("💾 Snapshot saved to: {}", path.display()),
            _ => {
                println!("⚠️  Unknown output format '{}', using snapshot format", output_format);
                println!("💾 Snapshot saved to: {}", path.display());
            }
        }
    }

    Ok(())
}

fn show_configs(config: &MonitorConfig) -> Result<()> {
    println!("\n📋 Effective configuration:");
    println!("{}", serde_yaml::to_string(config)?);

    println!("📋 Policy table:");
    let table = config.policy_table();
    let policies: Vec<&ReportPolicy> = table.iter().collect();
    println!("{}", serde_yaml::to_string(&policies)?);

    println!("📁 Snapshot directory: {}", config.store.resolved_data_dir().display());

    println!("\n📝 Usage Examples:");
    println!("  dmc-monitor refresh situation");
    println!("  dmc-monitor refresh landslide --geojson landslide.geojson");
    println!("  dmc-monitor refresh river_flood --dump-stages stages/ --profile");
    println!("  dmc-monitor extract situation report.pdf -o snapshot.json -f flat");
    println!("  dmc-monitor history situation --data-dir ./data");
    Ok(())
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("     {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn save_stages(stages: &PipelineStages, output_dir: &Path) -> Result<()> {
    use std::fs;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating {}", output_dir.display()))?;

    // Stage 0: Listing entry
    if let Some(entry) = &stages.listing_entry {
        let entry_path = output_dir.join("stage0_listing_entry.json");
        fs::write(&entry_path, serde_json::to_string_pretty(entry)?)?;
        println!("  💾 {}", entry_path.display());
    }

    // Stage 1: Positioned XHTML (PDF reports only)
    if let Some(markup) = &stages.markup {
        let markup_path = output_dir.join("stage1_markup.xhtml");
        fs::write(&markup_path, markup)?;
        println!("  💾 {} ({} bytes)", markup_path.display(), markup.len());
    }

    // Stage 2: Located region
    let region_path = output_dir.join("stage2_region.txt");
    fs::write(
        &region_path,
        format!("# {}\n{}\n", stages.region_description, stages.region_text),
    )?;
    println!("  💾 {}", region_path.display());

    // Stage 3: Raw rows
    let rows_path = output_dir.join("stage3_raw_table.json");
    fs::write(&rows_path, serde_json::to_string_pretty(&stages.raw_table)?)?;
    println!("  💾 {} ({} rows)", rows_path.display(), stages.raw_table.rows.len());

    // Stage 4: Snapshot
    let snapshot_path = output_dir.join("stage4_snapshot.json");
    fs::write(&snapshot_path, serde_json::to_string_pretty(&stages.snapshot)?)?;
    println!(
        "  💾 {} ({} records)",
        snapshot_path.display(),
        stages.snapshot.records().len()
    );

    // Summary file: quick reference for validation scripts
    let summary = serde_json::json!({
        "source_url": stages.snapshot.source_url(),
        "captured_at": chrono::Utc::now().to_rfc3339(),
        "extractor": stages.extractor,
        "region": stages.region_description,
        "stage_counts": {
            "markup_bytes": stages.markup.as_ref().map_or(0, String::len),
            "raw_rows": stages.raw_table.rows.len(),
            "records": stages.snapshot.records().len(),
            "warnings": stages.warnings.len(),
        },
        "warnings": stages.warnings,
    });
    let summary_path = output_dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(&summary)?)?;
    println!("  💾 {}", summary_path.display());

    Ok(())
}
