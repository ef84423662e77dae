pub mod base;
pub mod data_go_kr;

pub use base::{PriceSource, SourceResponse};
pub use data_go_kr::DataGoKrSource;
