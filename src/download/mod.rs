pub mod client;
pub mod extract;
pub mod scratch;

pub use client::*;
pub use extract::*;
pub use scratch::*;
