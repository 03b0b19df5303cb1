pub mod bucket;
pub mod cli;
pub mod download;
pub mod error;
pub mod filter;
pub mod inspect;
pub mod load;
pub mod migrate;
pub mod parser;
pub mod schema;
pub mod server;
pub mod ui;
pub mod writer;

pub use bucket::{IncomeBucket, PopulationBucket};
pub use cli::{Cli, Commands};
pub use error::Error;
pub use ui::{LogUi, Phase, SilentUi, Ui};
