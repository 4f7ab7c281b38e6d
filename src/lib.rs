pub mod cli;
pub mod config;
pub mod executor;
pub mod harvest;
pub mod model;
pub mod output;
pub mod runner;
pub mod survey;
pub mod traits;

// Re-export common types for convenience
pub use config::*;
pub use executor::*;
pub use model::*;
pub use traits::*;
