pub mod types;

pub use types::{ApiMovie, RankedHit, TitleKind, TitleRecord};
