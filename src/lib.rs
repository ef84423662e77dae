pub mod models;
pub mod sources;
pub mod services;
pub mod display;
pub mod errors;
pub mod config;

#[doc(hidden)]
pub mod util;

pub use config::{Config, ProbeMode};
pub use errors::{LookbackError, Result};
pub use models::{Identifier, PriceRecord};
pub use services::{LookbackFetcher, LookbackReport};
pub use sources::{DataGoKrSource, PriceSource, SourceResponse};
