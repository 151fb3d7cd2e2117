//! Visual check worker: turns a queued `CheckSpec` into screenshots,
//! comparisons, and a results document, publishing progress as it goes.

pub mod error;
pub mod handler;
pub mod pipeline;

pub use error::{CheckError, CheckStage};
pub use handler::CheckHandler;
pub use pipeline::{run_check, CheckConfig, CheckDeps, CheckOutcome};
