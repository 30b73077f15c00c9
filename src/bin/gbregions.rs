use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use gbregions::{
    FeatureWriter, LocationExpression,
    config::ExtractionConfig,
    organism::{self, OrganismJob, OrganismReport},
    parse_location,
    source::{AccessionData, LocalFeatureSource},
};
use serde::Serialize;
use std::{fs, path::PathBuf};

#[derive(Parser)]
#[command(name = "gbregions")]
#[command(about = "Extract functional regions from annotated nucleotide records")]
#[command(version)]
#[command(long_about = "
Decodes GenBank feature locations (simple, complement, join, complement(join))
and writes the sequences of one region type to per-organism text files.

Examples:
  gbregions extract --organism 'Escherichia coli' --accession NC_000913 \\
      --xml NC_000913.xml --fasta NC_000913.fasta --region CDS
  gbregions fetch --jobs organisms.json --source-dir downloads --region tRNA --select Bacteria
  gbregions parse 'complement(join(12..80,120..340))'
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Root directory of the organism tree (overrides the configuration)
    #[arg(long, global = true)]
    output_root: Option<PathBuf>,

    /// Log every extracted sequence (needs -v)
    #[arg(long, global = true)]
    log_sequences: bool,

    /// Verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one region type from a single accession
    Extract {
        #[arg(long)]
        organism: String,
        #[arg(long)]
        accession: String,
        /// 1-based position of the accession in the organism's list
        #[arg(long, default_value_t = 1)]
        accession_index: usize,
        /// Lineage directory below the output root
        #[arg(long)]
        lineage: Option<PathBuf>,
        #[arg(long)]
        region: String,
        /// GBSet/GBSeq XML feature table
        #[arg(long, conflicts_with = "genbank", required_unless_present = "genbank")]
        xml: Option<PathBuf>,
        /// Reference FASTA (defaults to the sequence embedded in the XML)
        #[arg(long, requires = "xml")]
        fasta: Option<PathBuf>,
        /// GenBank flat file providing both sequence and features
        #[arg(long)]
        genbank: Option<PathBuf>,
    },
    /// Extract one region type for every accession of the selected organisms
    Fetch {
        #[arg(long)]
        region: String,
        /// Directory holding <accession>.xml/.fasta or <accession>.gb files
        #[arg(long)]
        source_dir: PathBuf,
        /// Organism list (JSON array of {name, path, accessions})
        #[arg(long, conflicts_with = "organism")]
        jobs: Option<PathBuf>,
        /// Only organisms at or below this lineage path
        #[arg(long, requires = "jobs")]
        select: Option<PathBuf>,
        #[arg(long, requires = "accession")]
        organism: Option<String>,
        #[arg(long)]
        accession: Vec<String>,
        #[arg(long)]
        lineage: Option<PathBuf>,
    },
    /// Decode a location expression and print it as JSON
    Parse { location: String },
    /// List the known functional region types
    Regions,
    /// Show which organisms of a list already have output files
    Status {
        #[arg(long)]
        jobs: PathBuf,
    },
}

#[derive(Serialize)]
struct ParseSummary {
    location: String,
    expression: LocationExpression,
    reverse: bool,
    valid: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct StatusRow {
    name: String,
    output_dir: String,
    downloaded: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Could not serialize JSON output")?;
    println!("{text}");
    Ok(())
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn load_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut config = match &cli.config {
        Some(path) => ExtractionConfig::from_json_file(path)?,
        None => ExtractionConfig::default(),
    };
    if let Some(root) = &cli.output_root {
        config.output_root = root.clone();
    }
    config.log_sequences |= cli.log_sequences;
    Ok(config)
}

fn check_region(config: &ExtractionConfig, region: &str) {
    if !config.is_known_region(region) {
        log::warn!(
            "Region type '{region}' is not one of: {}",
            config.region_types.join(", ")
        );
    }
}

fn run_jobs(
    jobs: &[&OrganismJob],
    source_dir: PathBuf,
    region: &str,
    config: &ExtractionConfig,
) -> Result<Vec<OrganismReport>> {
    let source = LocalFeatureSource::new(source_dir);
    let mut reports = Vec::with_capacity(jobs.len());
    for job in jobs {
        let report = organism::fetch_organism(job, &source, region, config)
            .with_context(|| format!("Extraction failed for organism '{}'", job.name))?;
        reports.push(report);
    }
    let found = reports.iter().filter(|r| !r.is_not_found()).count();
    log::info!("{found} of {} organism(s) had {region} regions", reports.len());
    Ok(reports)
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Extract {
            organism: organism_name,
            accession,
            accession_index,
            lineage,
            region,
            xml,
            fasta,
            genbank,
        } => {
            if accession_index == 0 {
                bail!("--accession-index is 1-based");
            }
            check_region(&config, &region);
            let data = match (xml, genbank) {
                (Some(xml), None) => {
                    AccessionData::from_fasta_and_xml(&accession, fasta.as_deref(), &xml)?
                }
                (None, Some(genbank)) => AccessionData::from_genbank_file(Some(&accession), &genbank)?,
                _ => return Err(anyhow!("Give either --xml or --genbank")),
            };
            let job = OrganismJob {
                name: organism_name,
                path: lineage.unwrap_or_default(),
                accessions: vec![accession.clone()],
            };
            let output_dir = job.output_dir(&config.output_root);
            fs::create_dir_all(&output_dir).with_context(|| {
                format!("Could not create output directory '{}'", output_dir.display())
            })?;
            let output_path = output_dir.join(organism::output_file_name(
                &job.directory_name(),
                &region,
                accession_index,
            ));
            let report = FeatureWriter::new()
                .with_sequence_logging(config.log_sequences)
                .process(
                    &accession,
                    &data.reference,
                    &data.features,
                    &region,
                    &output_path,
                )?;
            if report.is_not_found() {
                log::warn!(
                    "Selected functional region [{region}] not found for organism [{}]",
                    job.name
                );
            }
            print_json(&report)
        }
        Commands::Fetch {
            region,
            source_dir,
            jobs,
            select,
            organism: organism_name,
            accession,
            lineage,
        } => {
            check_region(&config, &region);
            let all_jobs = match (jobs, organism_name) {
                (Some(path), None) => organism::load_jobs(&path)?,
                (None, Some(name)) => vec![OrganismJob {
                    name,
                    path: lineage.unwrap_or_default(),
                    accessions: accession,
                }],
                _ => bail!("Give either --jobs or --organism with --accession"),
            };
            let selected: Vec<&OrganismJob> = match &select {
                Some(selection) => organism::select_jobs(&all_jobs, selection),
                None => all_jobs.iter().collect(),
            };
            if selected.is_empty() {
                bail!("No organism selected");
            }
            let reports = run_jobs(&selected, source_dir, &region, &config)?;
            print_json(&reports)
        }
        Commands::Parse { location } => {
            let expression = parse_location(&location)?;
            let validation = expression.validate();
            print_json(&ParseSummary {
                reverse: expression.is_reverse(),
                valid: validation.is_ok(),
                error: validation.err().map(|e| e.to_string()),
                location,
                expression,
            })
        }
        Commands::Regions => {
            for region in &config.region_types {
                println!("{region}");
            }
            Ok(())
        }
        Commands::Status { jobs } => {
            let rows: Vec<StatusRow> = organism::load_jobs(&jobs)?
                .iter()
                .map(|job| StatusRow {
                    name: job.name.clone(),
                    output_dir: job.output_dir(&config.output_root).display().to_string(),
                    downloaded: job.is_downloaded(&config.output_root),
                })
                .collect();
            print_json(&rows)
        }
    }
}
