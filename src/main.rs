use ariadne::{Label, Report, ReportKind, Source};
use std::fs;
use std::io;
use std::process::ExitCode;
use thiserror::Error;
use turnsheet::report::{self, CsvWriter};
use turnsheet::worksheet::PresetError;
use turnsheet::{MaterialPresets, ReportFormat, Sequencer, Validator};

const DEFAULT_CSV: &str = "turning_sheet.csv";
const DEFAULT_JSON: &str = "turning_sheet.json";

#[derive(Error, Debug)]
enum Error {
    #[error("{0}")]
    Usage(String),

    #[error("cannot read {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error(transparent)]
    Presets(#[from] PresetError),

    #[error("{0} error(s) in job file")]
    Job(usize),

    #[error(transparent)]
    Report(#[from] report::ReportError),

    #[error("{0} part(s) could not be computed")]
    PartsFailed(usize),
}

#[derive(Debug, PartialEq)]
struct Args {
    input: String,
    output: Option<String>, // "-" writes to stdout
    format: ReportFormat,
    presets: Option<String>,
}

fn parse_args(args: &[String]) -> Result<Args, Error> {
    let mut positional = Vec::new();
    let mut format = ReportFormat::Csv;
    let mut presets = None;

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => format = ReportFormat::Json,
            "--presets" => match iter.next() {
                Some(path) => presets = Some(path.clone()),
                None => return Err(Error::Usage("--presets needs a file".to_string())),
            },
            flag if flag.starts_with("--") => {
                return Err(Error::Usage(format!("unknown option {}", flag)))
            }
            _ => positional.push(arg.clone()),
        }
    }

    let mut positional = positional.into_iter();
    let input = positional
        .next()
        .ok_or_else(|| Error::Usage("missing job file".to_string()))?;
    let output = positional.next();
    if let Some(extra) = positional.next() {
        return Err(Error::Usage(format!("unexpected argument {}", extra)));
    }

    Ok(Args {
        input,
        output,
        format,
        presets,
    })
}

/// Print a source diagnostic for a job file error
fn report_error(path: &str, source: &str, message: String, span: std::ops::Range<usize>) {
    let printed = Report::build(ReportKind::Error, path, span.start)
        .with_message(&message)
        .with_label(Label::new((path, span)).with_message(message))
        .finish()
        .eprint((path, Source::from(source)));
    if let Err(e) = printed {
        eprintln!("cannot print diagnostic: {}", e);
    }
}

fn run(args: &[String]) -> Result<(), Error> {
    let args = parse_args(args)?;

    let mut presets = MaterialPresets::builtin();
    if let Some(path) = &args.presets {
        presets.extend(MaterialPresets::from_file(path)?);
    }

    let source = fs::read_to_string(&args.input).map_err(|source| Error::Read {
        path: args.input.clone(),
        source,
    })?;

    // Parse
    let job = match turnsheet::parse_job(&source) {
        Ok(job) => job,
        Err(e) => {
            report_error(&args.input, &source, e.to_string(), e.span());
            return Err(Error::Job(1));
        }
    };

    // Resolve settings and materials
    let sequencer = Sequencer::with_presets(presets);
    let parts = match Validator::new(sequencer.presets()).resolve(&job) {
        Ok(parts) => parts,
        Err(errors) => {
            for e in &errors {
                report_error(&args.input, &source, e.to_string(), e.span());
            }
            return Err(Error::Job(errors.len()));
        }
    };

    // Compute
    let batch = sequencer.run_batch(&parts);

    // Write rows
    let to_stdout = args.output.as_deref() == Some("-");
    match (args.format, to_stdout) {
        (ReportFormat::Csv, true) => {
            let mut writer = CsvWriter::new(io::stdout().lock());
            writer.write_rows(&batch.rows).map_err(report::ReportError::from)?;
            let _out = writer.finish().map_err(report::ReportError::from)?;
        }
        (ReportFormat::Json, true) => report::write_json(io::stdout().lock(), &batch.rows)?,
        (ReportFormat::Csv, false) => {
            let path = args.output.as_deref().unwrap_or(DEFAULT_CSV);
            report::append_csv(path, &batch.rows)?;
            println!("Appended {} row(s) to {}", batch.rows.len(), path);
        }
        (ReportFormat::Json, false) => {
            let path = args.output.as_deref().unwrap_or(DEFAULT_JSON);
            let file = fs::File::create(path).map_err(report::ReportError::from)?;
            report::write_json(io::BufWriter::new(file), &batch.rows)?;
            println!("Wrote {} row(s) to {}", batch.rows.len(), path);
        }
    }

    if !to_stdout {
        for part in &batch.parts {
            println!("\n{}", report::part_summary(part));
        }
    }

    for failure in &batch.failures {
        eprintln!("part '{}' skipped: {}", failure.part, failure.error);
    }
    if batch.is_clean() {
        Ok(())
    } else {
        Err(Error::PartsFailed(batch.failures.len()))
    }
}

fn main() -> ExitCode {
    if let Err(e) = turnsheet::init_logging() {
        eprintln!("logging disabled: {}", e);
    }

    let args: Vec<String> = std::env::args().collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Error::Usage(message)) => {
            eprintln!("{}", message);
            eprintln!();
            eprintln!("Usage: turnsheet <job.sheet> [output] [--json] [--presets <file.json>]");
            eprintln!();
            eprintln!("Example:");
            eprintln!("  turnsheet shaft.sheet turning_sheet.csv");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
