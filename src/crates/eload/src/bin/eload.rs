//! eload CLI - staged ingestion of variant submissions
//!
//! Main entry point for the eload command-line tool.

use clap::{Parser, Subcommand};
use colored::Colorize;
use eload::cli::{self, CliContext};
use eload::{Aggregation, DetectRequest, EloadId, IngestionRequest, Stage};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "eload")]
#[command(about = "Staged ingestion of ELOAD variant submissions", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file layered over ~/.eload/eload.toml
    #[arg(long, global = true, env = "ELOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ingestion stages for a submission
    Ingest {
        /// Submission number or ELOAD_<n>
        #[arg(long)]
        eload: EloadId,

        /// Stages to run (default: all)
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        tasks: Vec<Stage>,

        /// Aggregation of the submitted VCFs: none or basic
        #[arg(long)]
        aggregation: Option<Aggregation>,

        /// Accessioning instance id
        #[arg(long)]
        instance_id: Option<u32>,

        /// VEP version used for annotation
        #[arg(long, requires = "vep_cache_version")]
        vep_version: Option<u32>,

        /// VEP cache version used for annotation
        #[arg(long, requires = "vep_version")]
        vep_cache_version: Option<u32>,

        /// Variant database to load into, registered if needed
        #[arg(long)]
        db_name: Option<String>,
    },

    /// Record submitted files and assembly facts
    Detect {
        /// Submission number or ELOAD_<n>
        #[arg(long)]
        eload: EloadId,

        /// Reference assembly accession; give it once
        #[arg(long = "assembly-accession")]
        assembly_accessions: Vec<String>,

        #[arg(long)]
        taxonomy_id: Option<u32>,

        #[arg(long)]
        scientific_name: Option<String>,
    },

    /// Show recorded progress of a submission
    Status {
        /// Submission number or ELOAD_<n>
        #[arg(long)]
        eload: EloadId,

        /// Output format: text (default), json
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Add an external reference to a project
    AddExtReference {
        /// The project associated with the external reference
        #[arg(long)]
        project_accession: String,

        /// The database the external reference relates to
        #[arg(long, default_value = "PubMed")]
        source_database: String,

        /// The identifier of the external reference
        #[arg(long)]
        identifier: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = eload::config::load_config(cli.config.clone()).await?;
    eload::logging::init(&config.logging, cli.debug)?;
    let context = CliContext::new(config);

    let result = match cli.command {
        Commands::Ingest {
            eload,
            tasks,
            aggregation,
            instance_id,
            vep_version,
            vep_cache_version,
            db_name,
        } => {
            let request = IngestionRequest {
                stages: tasks,
                aggregation,
                instance_id,
                vep: None,
                db_name,
            };
            let request = match (vep_version, vep_cache_version) {
                (Some(version), Some(cache_version)) => request.with_vep(version, cache_version),
                _ => request,
            };
            cli::ingest::handle_ingest(&context, eload, request).await
        }
        Commands::Detect {
            eload,
            assembly_accessions,
            taxonomy_id,
            scientific_name,
        } => {
            let request = DetectRequest {
                assembly_accessions,
                taxonomy_id,
                scientific_name,
            };
            cli::detect::handle_detect(&context, eload, request).await
        }
        Commands::Status { eload, format } => cli::status::handle_status(&context, eload, &format).await,
        Commands::AddExtReference {
            project_accession,
            source_database,
            identifier,
        } => cli::ext_reference::handle_add(&context, &project_accession, &source_database, &identifier).await,
    };

    if let Err(e) = &result {
        eprintln!("{} {}", "✗".red().bold(), e);
    }
    result.map_err(Into::into)
}
