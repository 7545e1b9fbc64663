pub mod client;
pub mod lookup;
pub mod parsers;
pub mod snapshot;

pub use client::EdgarClient;
pub use lookup::TickerCikLookup;
pub use snapshot::{edgar_snapshot, EdgarSnapshot};
