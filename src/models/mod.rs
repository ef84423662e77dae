pub mod identifier;
pub mod price;

pub use identifier::Identifier;
pub use price::{Direction, PriceRecord};
