//! Machining worksheet calculator
//!
//! Reads a job file of rough/finish passes per part, computes geometry,
//! machining time and cost for each pass and emits one worksheet row per
//! pass.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod report;
pub mod sequencer;
pub mod validator;
pub mod worksheet;

pub use parser::{parse_job, ParseError};
pub use report::{append_csv, write_json, CsvWriter, ReportError, ReportFormat};
pub use sequencer::{BatchReport, PartOutcome, PartSpec, Sequencer, WorksheetRow};
pub use validator::{SheetDefaults, ValidationError, Validator};
pub use worksheet::{
    MaterialPresets, OperationInput, OperationResult, OperationType, Pass, WorksheetCalculator,
    WorksheetError,
};

/// Log to stderr; `RUST_LOG` overrides the default `info` level
pub fn init_logging() -> Result<(), tracing_subscriber::util::TryInitError> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
}
