use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use grouppack::config::{ContainerFormat, DatasetConfig};
use grouppack::dataset::GroupDataset;
use grouppack::decode::RawDecoder;
use grouppack::metrics::ReadStats;
use grouppack::reader::{RawRecord, ReadError};
use grouppack::Error;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "grouppack", about = "Inspect grouped image container datasets")]
struct Cli {
    /// Log every read
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatasetArgs {
    /// Dataset root (holds metadata.txt and the container files)
    #[arg(long, required_unless_present = "config")]
    root: Option<PathBuf>,
    /// Records per container file
    #[arg(short, long, default_value = "1")]
    group_size: usize,
    /// Records per read; 0 reads whole groups
    #[arg(short, long, default_value = "0")]
    read_group_size: usize,
    #[arg(short, long, value_enum, default_value = "packed")]
    format: FormatArg,
    /// JSON config file; overrides the flags above
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Packed,
    Folder,
}

#[derive(Subcommand)]
enum Commands {
    /// Show classes, group count and pack layout
    Info {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Dump the whole index as JSON
        #[arg(long)]
        json: bool,
    },
    /// List records with their byte ranges
    List {
        #[command(flatten)]
        dataset: DatasetArgs,
        /// Only this group
        #[arg(long)]
        group: Option<String>,
    },
    /// Write the raw records behind one flat index to a directory
    Extract {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[arg(short, long)]
        index: usize,
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
    /// Read every group with both readers and compare record digests
    Verify {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { dataset, json } => {
            let config = dataset.into_config()?;
            let ds = GroupDataset::open(&config, RawDecoder)?;
            if json {
                println!("{}", ds.index().to_json()?);
                return Ok(());
            }
            let layout = ds.layout();
            println!("── grouppack dataset ────────────────────────────────────");
            println!("  Root            {}", config.root.display());
            println!("  Format          {}", config.format.name());
            println!("  Group size      {}", layout.group_size());
            println!("  Pack size       {}", layout.pack_size());
            println!("  Packs / group   {}", layout.packs_per_group());
            println!("  Groups          {}", ds.index().groups().len());
            println!("  Records         {}", ds.index().total_records());
            println!("  Dataset length  {}", ds.len());
            println!("  Classes ({}):", ds.index().classes().len());
            for (i, name) in ds.index().classes().iter() {
                println!("    {i:>5}  {name}");
            }
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { dataset, group } => {
            let config = dataset.into_config()?;
            let ds = GroupDataset::open(&config, RawDecoder)?;
            println!("{:<24} {:<24} {:<16} {:>12} {:>10}",
                     "Group", "Record", "Class", "Start", "Size");
            for g in ds.index().groups() {
                if group.as_deref().is_some_and(|name| name != g.name) {
                    continue;
                }
                for r in &g.records {
                    println!("{:<24} {:<24} {:<16} {:>12} {:>10}",
                             g.name, r.record_id, r.class_name, r.start, r.size);
                }
            }
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { dataset, index, output } => {
            let config = dataset.into_config()?;
            let ds = GroupDataset::open(&config, RawDecoder)?;
            std::fs::create_dir_all(&output)?;
            let records = ds.read_raw(index)?;
            for r in &records {
                let file_name = r.record_id.replace(['/', '\\'], "_");
                std::fs::write(output.join(&file_name), &r.bytes)?;
                println!("  wrote  {file_name}  ({} B, class {})", r.bytes.len(), r.class_index);
            }
            println!("Extracted {} record(s) to {}", records.len(), output.display());
        }

        // ── Verify ───────────────────────────────────────────────────────────
        Commands::Verify { dataset } => {
            let config = dataset.into_config()?;
            let stats = Arc::new(ReadStats::new());
            let ds = GroupDataset::open(&config, RawDecoder)?.with_observer(stats.clone());
            let runtime = tokio::runtime::Runtime::new()?;

            let mut failures = 0usize;
            for (gi, group) in ds.index().groups().iter().enumerate() {
                let outcome = runtime.block_on(async {
                    let blocking = ds.reader().read_group(group)?;
                    let nonblocking = ds.async_reader().read_group(group).await?;
                    let mut packed = Vec::with_capacity(blocking.len());
                    for p in 0..ds.layout().packs_per_group() {
                        packed.extend(ds.reader().read_pack(group, ds.layout().pack_size(), p)?);
                    }
                    Ok::<_, ReadError>(
                        digests(&blocking) == digests(&nonblocking)
                            && digests(&blocking) == digests(&packed),
                    )
                });
                match outcome {
                    Ok(true) => info!(group = %group.name, "ok"),
                    Ok(false) => {
                        failures += 1;
                        error!(group = %group.name, index = gi, "reader outputs differ");
                    }
                    Err(e) => {
                        failures += 1;
                        error!(group = %group.name, index = gi, error = %e, "read failed");
                    }
                }
            }

            let snap = stats.snapshot();
            println!("Verified {} group(s): {} failure(s)", ds.index().groups().len(), failures);
            println!("  opens {}  reads {}  bytes {}  read time {:?}",
                     snap.opens, snap.reads, snap.bytes_read, snap.read_time);
            if failures > 0 {
                return Err(format!("{failures} group(s) failed verification").into());
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

impl DatasetArgs {
    fn into_config(self) -> Result<DatasetConfig, Error> {
        if let Some(path) = self.config {
            return Ok(DatasetConfig::from_json_file(path)?);
        }
        let format = match self.format {
            FormatArg::Packed => ContainerFormat::Packed,
            FormatArg::Folder => ContainerFormat::Folder,
        };
        let root = self.root.unwrap_or_default();
        Ok(DatasetConfig::new(root, self.group_size)
            .with_read_group_size(self.read_group_size)
            .with_format(format))
    }
}

fn digests(records: &[RawRecord]) -> Vec<(String, String)> {
    records.iter()
        .map(|r| (r.record_id.clone(), hex::encode(blake3::hash(&r.bytes).as_bytes())))
        .collect()
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("logging disabled: {e}");
    }
}
