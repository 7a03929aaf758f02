pub mod driver;
pub mod paginator;
pub mod parser;
pub mod reconcile;
pub mod selector;

pub use driver::{CombinationDriver, RunSummary};
