pub mod delimited;
pub mod record;

pub use delimited::*;
pub use record::*;
