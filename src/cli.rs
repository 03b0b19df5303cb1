use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::download::{CENSUS_API_URL, ZCTA_SHAPEFILE_URL};
use crate::load::DEFAULT_ZIP_FIELD;
use crate::migrate::{MySqlConfig, DEFAULT_BATCH_SIZE};
use crate::server::CachePolicy;

#[derive(Parser, Debug)]
#[command(name = "edu-demographics")]
#[command(version, about = "Load colleges and ZIP code demographics into SQLite and serve them to a map")]
pub struct Cli {
    /// SQLite store path
    #[arg(long, global = true, env = "EDU_DB", default_value = "education_demographics.db")]
    pub db: PathBuf,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct CensusArgs {
    /// Census API key
    #[arg(long, env = "CENSUS_API_KEY", hide_env_values = true)]
    pub census_api_key: String,

    /// ACS 5-year endpoint
    #[arg(long, env = "CENSUS_API_URL", default_value = CENSUS_API_URL)]
    pub census_api_url: String,
}

#[derive(Args, Debug, Clone)]
pub struct MySqlArgs {
    #[arg(long = "mysql-host", env = "MYSQL_HOST", default_value = "localhost")]
    pub host: String,

    #[arg(long = "mysql-port", env = "MYSQL_PORT", default_value_t = 3306)]
    pub port: u16,

    #[arg(long = "mysql-user", env = "MYSQL_USER", default_value = "root")]
    pub user: String,

    #[arg(long = "mysql-password", env = "MYSQL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    #[arg(long = "mysql-database", env = "MYSQL_DATABASE")]
    pub database: Option<String>,
}

impl MySqlArgs {
    /// None when no database name was given
    pub fn into_config(self) -> Option<MySqlConfig> {
        Some(MySqlConfig {
            host: self.host,
            port: self.port,
            user: self.user,
            password: self.password,
            database: self.database?,
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load colleges, ZIP centroids and Census demographics in one go
    Setup {
        /// College locations CSV
        #[arg(long, default_value = "colleges.csv")]
        colleges: PathBuf,

        /// ZIP code centroid CSV
        #[arg(long, default_value = "zip_coordinates.csv")]
        coordinates: PathBuf,

        #[command(flatten)]
        census: CensusArgs,
    },

    /// Replace the colleges table from a CSV export
    LoadColleges {
        csv: PathBuf,
    },

    /// Replace the ZIP centroid table from a CSV
    LoadCoordinates {
        csv: PathBuf,
    },

    /// Fetch Census demographics for every ZIP and replace the table
    LoadDemographics {
        #[command(flatten)]
        census: CensusArgs,
    },

    /// Load ZCTA boundary polygons for ZIPs that have demographics
    LoadBoundaries {
        /// Zipped shapefile to download when no local file is given
        #[arg(long, env = "ZCTA_URL", default_value = ZCTA_SHAPEFILE_URL)]
        url: String,

        /// Local zipped shapefile
        #[arg(long, conflicts_with = "shapefile")]
        archive: Option<PathBuf>,

        /// Local extracted .shp file
        #[arg(long)]
        shapefile: Option<PathBuf>,

        /// Attribute holding the ZIP code
        #[arg(long, default_value = DEFAULT_ZIP_FIELD)]
        zip_field: String,

        /// Where to put the temporary download directory
        #[arg(long)]
        scratch_dir: Option<PathBuf>,
    },

    /// Serve the map and its JSON endpoints
    Serve {
        #[arg(long, env = "PORT", default_value_t = 5000)]
        port: u16,

        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
        bind: String,

        /// Front-end assets served under /static
        #[arg(long, env = "STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,

        #[arg(long, env = "CACHE_POLICY", value_enum, default_value_t = CachePolicy::Lazy)]
        cache: CachePolicy,
    },

    /// Copy the store into MySQL (or another SQLite file)
    Migrate {
        #[command(flatten)]
        mysql: MySqlArgs,

        /// Write to this SQLite file instead of MySQL
        #[arg(long)]
        to_sqlite: Option<PathBuf>,

        /// Only include these tables (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        include: Option<Vec<String>>,

        /// Exclude these tables (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        exclude: Option<Vec<String>>,

        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show tables, row counts and bucket distributions
    Inspect {
        /// Also print the first rows of this table
        #[arg(long)]
        sample: Option<String>,

        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Create any missing indexes
    AddIndexes,

    /// List all table names
    ListTables,
}

impl Cli {
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
