pub mod snapshot;
pub mod tiingo;

pub use snapshot::{market_snapshot, MarketSnapshot};
pub use tiingo::TiingoClient;
