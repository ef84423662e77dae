pub mod lookback;

pub use lookback::{Attempt, AttemptOutcome, LookbackFetcher, LookbackReport};
