#![forbid(unsafe_code)]

pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod ledger;
pub mod model;
pub mod time;
pub mod validator;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod testing;

pub use config::{AnswerPolicy, ConfigError, EngineConfig, IdleCap};
pub use engine::{AnswerOutcome, SessionEngine, Transition};
pub use error::EngineError;
pub use graph::DialogueGraph;
pub use ledger::LedgerViolation;
pub use time::Clock;
pub use validator::Feedback;
