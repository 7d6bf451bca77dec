pub mod chain;
pub mod dispatch;
pub mod report;
mod sig;

pub use chain::{ChainStatus, ChainTracker};
pub use dispatch::verify;
pub use report::VerificationReport;
