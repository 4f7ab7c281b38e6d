//! Survey log format implementations.
//!
//! Each format implements [`LogParser`](crate::traits::LogParser).
//!
//! - `dados_trecho` - `DadosTrecho` XML logs from the road-survey vehicle

pub mod dados_trecho;

pub use dados_trecho::DadosTrechoParser;
