//! fileorg - sort a directory's files into category folders
//!
//! This library classifies files by extension against a rule table, decides a
//! collision-free destination for each one and moves it (or only reports the
//! move in simulation mode). Runs are pull-based event streams that can be
//! cancelled between files, and can be driven from a background worker for
//! progress reporting.

pub mod cli;
pub mod config;
pub mod engine;
pub mod logging;
pub mod output;
pub mod resolver;
pub mod rules;
pub mod scanner;
pub mod session;
pub mod stats;

pub use config::{ConfigError, Settings};
pub use engine::{
    CancelToken, Engine, MoveErrorKind, OutcomeEvent, Run, RunMode, run_move, run_simulate,
};
pub use resolver::{ResolvedDestination, Resolver};
pub use rules::{Category, RuleTable, RulesError};
pub use scanner::{FilterConfig, enumerate};
pub use session::{Session, SessionHandle, SessionReport};
pub use stats::{Stats, StatsSnapshot};

pub use cli::{Args, CliError, CliOutcome, run};
