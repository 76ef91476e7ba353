//! Utility modules

pub mod logger;
pub mod timer;

pub use logger::{init_logger, try_init_logger, LogLevel};
pub use timer::{SuiteBudget, Timer};
