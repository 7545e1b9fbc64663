pub mod scorecard;

pub use scorecard::score;
