pub mod answers;
pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod io;
pub mod paths;
pub mod report;
pub mod store;
pub mod wizard;

pub use error::{EstimatorError, Result};
