use anyhow::{bail, Context, Result};
use edu_demographics::{
    cli::{Cli, Commands},
    download::CensusClient,
    filter::resolve_tables,
    inspect,
    load::{self, BoundaryOptions, BoundarySource},
    migrate::{self, Destination, MySqlDestination, SqliteDestination},
    schema::{table_names, ALL_TABLES},
    server::{self, ServerConfig, Store},
    ui::{LogUi, SilentUi, Ui},
    writer::{table_exists, SqliteWriter},
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if cli.quiet {
        run(cli, &mut SilentUi::new())
    } else {
        run(cli, &mut LogUi::new())
    }
}

fn run(cli: Cli, ui: &mut impl Ui) -> Result<()> {
    let db = cli.db;
    let start = Instant::now();

    match cli.command {
        Commands::Setup {
            colleges,
            coordinates,
            census,
        } => {
            let client = CensusClient::new(census.census_api_url, census.census_api_key)?;
            let summary = load::setup(&colleges, &coordinates, &client, &db, ui)?;
            println!(
                "\nDatabase setup complete in {:.1}s: {} colleges, {} ZIP coordinates, {} ZIP demographics",
                start.elapsed().as_secs_f64(),
                summary.colleges,
                summary.zip_coordinates,
                summary.demographics.rows
            );
        }

        Commands::LoadColleges { csv } => {
            let count = load::load_colleges(&csv, &db, ui)?;
            println!("Loaded {} colleges into {:?}", count, db);
        }

        Commands::LoadCoordinates { csv } => {
            let count = load::load_zip_coordinates(&csv, &db, ui)?;
            println!("Loaded {} ZIP coordinates into {:?}", count, db);
        }

        Commands::LoadDemographics { census } => {
            let client = CensusClient::new(census.census_api_url, census.census_api_key)?;
            let report = load::load_demographics(&client, &db, ui)?;
            println!("Loaded demographics for {} ZIP codes", report.rows);
        }

        Commands::LoadBoundaries {
            url,
            archive,
            shapefile,
            zip_field,
            scratch_dir,
        } => {
            let source = match (shapefile, archive) {
                (Some(path), _) => BoundarySource::Shapefile(path),
                (None, Some(path)) => BoundarySource::Archive(path),
                (None, None) => BoundarySource::Url(url),
            };
            let options = BoundaryOptions {
                zip_field,
                scratch_base: scratch_dir,
            };
            let count = load::load_boundaries(&source, &db, &options, ui)?;
            println!(
                "Stored {} ZIP boundaries in {:.1}s",
                count,
                start.elapsed().as_secs_f64()
            );
        }

        Commands::Serve {
            port,
            bind,
            static_dir,
            cache,
        } => {
            let config = ServerConfig {
                bind_addr: bind,
                port,
                db_path: db,
                static_dir: Some(static_dir),
                cache,
            };
            runtime()?.block_on(server::serve(config))?;
        }

        Commands::Migrate {
            mysql,
            to_sqlite,
            include,
            exclude,
            batch_size,
            json,
        } => {
            let tables = resolve_tables(include, exclude)?;

            let report = runtime()?.block_on(async {
                let mut dest: Box<dyn Destination> = match to_sqlite {
                    Some(path) => Box::new(SqliteDestination::open(&path)?),
                    None => {
                        let Some(config) = mysql.into_config() else {
                            bail!("Set MYSQL_DATABASE or --mysql-database, or use --to-sqlite");
                        };
                        Box::new(MySqlDestination::connect(&config).await?)
                    }
                };
                migrate::migrate(&db, dest.as_mut(), &tables, batch_size, ui).await
            })?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }

        Commands::Inspect { sample, limit } => {
            let conn = Store::new(db.clone()).connect()?;

            println!("{}", inspect::summarize(&conn)?);

            if table_exists(&conn, "zip_demographics")? {
                print!("{}", inspect::bucket_distribution(&conn)?);

                if table_exists(&conn, "zip_coordinates")? {
                    let coverage = inspect::zip_coverage(&conn)?;
                    println!(
                        "{} of {} ZIP codes have demographics",
                        coverage.zips_with_demographics, coverage.total_zips
                    );
                }
            }

            if let Some(table) = sample {
                let rows = inspect::sample(&conn, &table, limit)?;
                println!("\nSample from {}:", table);
                println!("{}", serde_json::to_string_pretty(&rows)?);
            }
        }

        Commands::AddIndexes => {
            let writer = SqliteWriter::open(&db)?;
            let created = writer.ensure_indexes(ALL_TABLES)?;
            writer.finalize()?;
            println!("Ensured {} indexes on {:?}", created, db);
        }

        Commands::ListTables => {
            println!("Available tables:");
            for name in table_names() {
                println!("  {}", name);
            }
        }
    }

    Ok(())
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
