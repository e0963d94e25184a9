//! Value screening: per-ticker scoring, ranking, and exchange universes.

pub mod ranker;
pub mod scorer;
pub mod universe;

pub use ranker::{rank, screen, TickerLookup};
pub use scorer::{score, score_ticker};
pub use universe::{ExchangeUniverse, ListingConfig};
