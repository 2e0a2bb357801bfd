//! Progress reporting for rewrite passes and step execution

mod handler;
mod logging;

pub use handler::{
    CollectingHandler, FanOutHandler, NoOpHandler, ProgressEvent, ProgressHandler, SkipReason,
};
pub use logging::LoggingHandler;
