use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::path::PathBuf;
use std::sync::Mutex;

use ceda_fetch::filter::parse_constraint;
use ceda_fetch::{
    Archive, Campaign, ConfigOverrides, DatasetAxes, EmptyListing, FtpConnector, PathGrammar,
    SavePathTemplate, SegmentFilter, load_config,
};

#[derive(Parser)]
#[command(name = "ceda-fetch")]
#[command(about = "Batch download CMIP5 output from the CEDA FTP archive", long_about = None)]
struct Cli {
    #[command(flatten)]
    remote: RemoteArgs,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Hide per-dataset progress bars.
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct RemoteArgs {
    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    /// Root of the CMIP5 tree on the server.
    #[arg(long, global = true)]
    base_path: Option<String>,

    #[arg(short, long, global = true)]
    username: Option<String>,
}

#[derive(Args)]
struct FilterArgs {
    /// Keep only these values, e.g. `--include model=MIROC5,NorESM1-M`. Repeatable.
    #[arg(long = "include", value_name = "SEGMENT=VALUES")]
    includes: Vec<String>,

    /// Drop these values, e.g. `--exclude experiment=piControl`. Repeatable.
    #[arg(long = "exclude", value_name = "SEGMENT=VALUES")]
    excludes: Vec<String>,

    /// Skip directories with empty listings instead of aborting.
    #[arg(long)]
    skip_empty: bool,
}

impl FilterArgs {
    fn filter(&self) -> Result<SegmentFilter> {
        let mut filter = SegmentFilter::new();
        for c in &self.includes {
            let (segment, values) = parse_constraint(c)?;
            filter = filter.include(segment, values);
        }
        for c in &self.excludes {
            let (segment, values) = parse_constraint(c)?;
            filter = filter.exclude(segment, values);
        }
        Ok(filter)
    }

    fn empty_listing(&self) -> EmptyListing {
        if self.skip_empty {
            EmptyListing::Skip
        } else {
            EmptyListing::Abort
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run every set of a campaign file.
    Run {
        campaign: PathBuf,
    },

    /// Discover variable paths and print them.
    Walk {
        #[command(flatten)]
        filter: FilterArgs,

        /// Keep only these variables. Comma-delimited, repeatable.
        #[arg(long = "variable", value_delimiter = ',')]
        variables: Vec<String>,

        /// Write the paths as a JSON array to this file.
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Download the Cartesian product of explicit axis values.
    Get {
        /// `GROUP/MODEL` pair. Repeatable.
        #[arg(long = "group-model", required = true, value_parser = parse_group_model)]
        group_models: Vec<(String, String)>,
        #[arg(long = "experiment", required = true, value_delimiter = ',')]
        experiments: Vec<String>,
        #[arg(long = "freq", required = true, value_delimiter = ',')]
        freqs: Vec<String>,
        #[arg(long = "realm", required = true, value_delimiter = ',')]
        realms: Vec<String>,
        #[arg(long = "cmor-table", required = true, value_delimiter = ',')]
        cmor_tables: Vec<String>,
        #[arg(long = "ensemble", required = true, value_delimiter = ',')]
        ensembles: Vec<String>,
        #[arg(long = "variable", required = true, value_delimiter = ',')]
        variables: Vec<String>,

        /// Local directory pattern, e.g. `cmip5/{experiment}/{model}`.
        #[arg(long)]
        save_path: String,

        /// Keep files that already exist locally.
        #[arg(long)]
        no_overwrite: bool,
    },

    /// Break dataset paths down into their segments (no connection needed).
    Parse {
        /// Accept partial paths and print whatever segments they name.
        #[arg(long)]
        lenient: bool,

        paths: Vec<String>,
    },
}

fn parse_group_model(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once('/') {
        Some((g, m)) if !g.is_empty() && !m.is_empty() => Ok((g.to_string(), m.to_string())),
        _ => Err(format!("expected GROUP/MODEL, got {:?}", s)),
    }
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn connect(remote: RemoteArgs, progress: bool, on_empty: EmptyListing) -> Result<Archive<FtpConnector>> {
    let config = load_config(ConfigOverrides {
        host: remote.host,
        port: remote.port,
        base_path: remote.base_path,
        username: remote.username,
        password: None,
    })?;
    Ok(Archive::new(FtpConnector::new(&config), PathGrammar::new(&config.base_path))
        .with_progress(progress)
        .with_empty_listing(on_empty))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_ref())?;
    let progress = !cli.no_progress;

    match cli.cmd {
        Commands::Run { campaign } => {
            let campaign = Campaign::load(&campaign)?;
            let archive = connect(cli.remote, progress, EmptyListing::Abort)?;
            let summary = campaign.run(&archive)?;
            println!(
                "{} dataset(s), {} file(s) downloaded, {} skipped",
                summary.datasets, summary.downloaded, summary.skipped
            );
        }
        Commands::Walk {
            filter,
            variables,
            output,
        } => {
            let archive = connect(cli.remote, progress, filter.empty_listing())?;
            let leaves = if variables.is_empty() {
                archive.walk(&filter.filter()?)?
            } else {
                let wanted: std::collections::BTreeSet<String> = variables.into_iter().collect();
                archive
                    .discover(&filter.filter()?, &wanted)?
                    .iter()
                    .map(|d| archive.grammar().build(d))
                    .collect()
            };
            match output {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    serde_json::to_writer_pretty(file, &leaves)?;
                    println!("Wrote {} path(s) to {}", leaves.len(), path.display());
                }
                None => {
                    for leaf in &leaves {
                        println!("{}", leaf);
                    }
                }
            }
        }
        Commands::Get {
            group_models,
            experiments,
            freqs,
            realms,
            cmor_tables,
            ensembles,
            variables,
            save_path,
            no_overwrite,
        } => {
            let template = SavePathTemplate::new(&save_path)?;
            let axes = DatasetAxes {
                group_models,
                experiments,
                freqs,
                realms,
                cmor_tables,
                ensembles,
                variables,
            };
            let archive = connect(cli.remote, progress, EmptyListing::Abort)?;
            let summary = archive.fetch(axes, &template, !no_overwrite)?;
            println!(
                "{} dataset(s), {} file(s) downloaded, {} skipped",
                summary.datasets, summary.downloaded, summary.skipped
            );
        }
        Commands::Parse { lenient, paths } => {
            let grammar = PathGrammar::new(
                cli.remote
                    .base_path
                    .as_deref()
                    .unwrap_or(ceda_fetch::CEDA_BASE_PATH),
            );
            for path in &paths {
                let json = if lenient {
                    serde_json::to_string(&grammar.parse(path))?
                } else {
                    serde_json::to_string(&grammar.descriptor(path)?)?
                };
                println!("{}", json);
            }
        }
    }

    Ok(())
}
