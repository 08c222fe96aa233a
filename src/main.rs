use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use company_directory::entities::company::COMPANY_HEADERS;
use company_directory::entities::region::seed_regions;
use company_directory::tabular::write_template;
use company_directory::{
    logging, open_database, CompanyDataset, Config, Dataset, ImportMode, ImportReport, Importer,
    PclDataset, UploadedFile,
};

#[derive(Parser)]
#[clap(author, version, about = "Company directory import tool")]
struct Cli {
    /// TOML config file
    #[clap(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides the config file)
    #[clap(short, long, global = true)]
    database: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DatasetKind {
    Companies,
    Pcl,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and its tables
    InitDb,
    /// Load districts and villages from a `Kecamatan,Desa` CSV
    SeedRegions { csv: PathBuf },
    /// Import a spreadsheet (xlsx, xls or csv)
    Import {
        file: PathBuf,
        #[clap(short, long, default_value = "append")]
        mode: ImportMode,
        #[clap(long, value_enum, default_value = "companies")]
        dataset: DatasetKind,
    },
    /// Write an empty CSV template with the company headers
    Template { out: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    logging::init(&config.log_level);

    match cli.command {
        Commands::InitDb => {
            open_database(&config.database_path)?;
            println!("✓ Database ready at {:?}", config.database_path);
        }
        Commands::SeedRegions { csv } => {
            let bytes = fs::read(&csv).with_context(|| format!("Failed to read {:?}", csv))?;
            let mut conn = open_database(&config.database_path)?;
            let summary = seed_regions(&mut conn, &bytes)?;
            println!(
                "✓ {} rows: {} new districts, {} new villages",
                summary.rows, summary.districts_added, summary.villages_added
            );
        }
        Commands::Import {
            file,
            mode,
            dataset,
        } => {
            let report = match dataset {
                DatasetKind::Companies => run_import(&config, &file, mode, &CompanyDataset)?,
                DatasetKind::Pcl => run_import(&config, &file, mode, &PclDataset)?,
            };

            if report.is_success() {
                println!("✅ {}", report.summary());
            } else {
                eprintln!("❌ {}", report.summary());
                eprintln!("{}", serde_json::to_string_pretty(&report)?);
                std::process::exit(2);
            }
        }
        Commands::Template { out } => {
            let bytes = write_template(&COMPANY_HEADERS)?;
            fs::write(&out, bytes).with_context(|| format!("Failed to write {:?}", out))?;
            println!("✓ Template written to {:?} ({} columns)", out, COMPANY_HEADERS.len());
        }
    }

    Ok(())
}

fn run_import<D: Dataset>(
    config: &Config,
    path: &Path,
    mode: ImportMode,
    dataset: &D,
) -> Result<ImportReport> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    let content_type = mime_guess::from_path(path).first_or_octet_stream();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    info!(dataset = dataset.name(), %mode, file = %file_name, "importing from disk");

    let upload = UploadedFile::new(file_name, content_type.essence_str(), bytes);
    let mut conn = open_database(&config.database_path)?;

    let importer = Importer::from_config(config).with_actor("cli");
    let report = importer
        .import_upload(&mut conn, dataset, &upload, mode)
        .with_context(|| format!("Import of {:?} failed", path))?;

    Ok(report)
}
