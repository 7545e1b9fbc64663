pub mod rules;

pub use rules::generate;
