//! Worksheet row output
//!
//! Rows are written against a fixed column layout shared with the shop
//! spreadsheet. CSV files are appended to; the header is only written when
//! the file is new or empty.

use crate::sequencer::{PartOutcome, WorksheetRow};
use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

/// Worksheet header, in column order
pub const COLUMNS: [&str; 25] = [
    "Row",
    "Part",
    "Pass",
    "Operation",
    "Material",
    "Tool Type (HCD)",
    "Dimension (in.) lw",
    "Dimension (in.) da",
    "Dimension (in.) db",
    "Area (in.^2) Am",
    "Volume (in.^3) vm",
    "Specific Cutting Energy (hp min/in.^3) ps",
    "Available Power (hp) Pm",
    "Machining Time Max Power (min) tmp",
    "Rate of Surface Generation (in.^2/min) vf",
    "Machining Time Recommended conditions (min) tmc",
    "Time Corrected for Tool Wear (min) tm",
    "Time Corrected for Extra Tool Travel (min) t'm",
    "Stock Weight (lb)",
    "Material Cost",
    "Setup Cost Per Part",
    "Non-productive Cost",
    "Machining Cost",
    "Total Cost Per Part",
    "Notes",
];

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("cannot write report: {0}")]
    Io(#[from] io::Error),

    #[error("cannot serialize report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format for the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

/// Cell values for one row, matching [`COLUMNS`]
pub fn row_cells(row: &WorksheetRow) -> Vec<String> {
    let input = &row.input;
    let result = &row.result;
    let notes = result
        .issues
        .iter()
        .map(|i| i.code.as_str())
        .collect::<Vec<_>>()
        .join(";");

    vec![
        row.id.to_string(),
        row.part.clone(),
        row.pass.to_string(),
        input.operation.to_string(),
        row.material.clone(),
        input.tool_type.code().to_string(),
        num(input.l_w),
        num(input.d_a),
        num(input.d_b),
        num(result.a_m),
        num(result.v_m),
        num(input.p_s),
        num(input.p_m),
        num(result.t_mp),
        num(input.v_f),
        num(result.t_mc),
        num(result.t_m),
        num(result.t_m_prime),
        num(result.stock_weight),
        money(result.material_cost),
        money(result.setup_cost_per_part),
        money(result.non_productive_cost),
        money(result.machining_cost),
        money(result.total_cost_per_part),
        notes,
    ]
}

fn num(value: f64) -> String {
    format!("{:.4}", value)
}

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Quote a cell if it holds a separator, quote or line break
fn escape(cell: &str) -> Cow<'_, str> {
    if cell.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", cell.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(cell)
    }
}

fn csv_line(cells: impl IntoIterator<Item = impl AsRef<str>>) -> String {
    cells
        .into_iter()
        .map(|c| escape(c.as_ref()).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}

/// Streams rows as CSV, writing the header before the first row or on
/// `finish` when no row was written
pub struct CsvWriter<W: Write> {
    out: W,
    header_pending: bool,
}

impl<W: Write> CsvWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_pending: true,
        }
    }

    /// Writer for a target that already carries the header
    pub fn appending(out: W) -> Self {
        Self {
            out,
            header_pending: false,
        }
    }

    fn write_header(&mut self) -> io::Result<()> {
        if self.header_pending {
            writeln!(self.out, "{}", csv_line(COLUMNS))?;
            self.header_pending = false;
        }
        Ok(())
    }

    pub fn write_row(&mut self, row: &WorksheetRow) -> io::Result<()> {
        self.write_header()?;
        writeln!(self.out, "{}", csv_line(row_cells(row)))
    }

    pub fn write_rows<'a>(
        &mut self,
        rows: impl IntoIterator<Item = &'a WorksheetRow>,
    ) -> io::Result<()> {
        for row in rows {
            self.write_row(row)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.write_header()?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Append rows to a CSV file, creating it with a header if needed
pub fn append_csv(path: impl AsRef<Path>, rows: &[WorksheetRow]) -> Result<(), ReportError> {
    let path = path.as_ref();
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    let mut writer = if needs_header {
        CsvWriter::new(io::BufWriter::new(file))
    } else {
        CsvWriter::appending(io::BufWriter::new(file))
    };
    writer.write_rows(rows)?;
    writer.finish()?;
    Ok(())
}

pub fn write_json<W: Write>(out: W, rows: &[WorksheetRow]) -> Result<(), ReportError> {
    serde_json::to_writer_pretty(out, rows)?;
    Ok(())
}

/// Human-readable cost summary for one part
pub fn part_summary(part: &PartOutcome) -> String {
    let c = &part.costing;
    let mut lines = vec![
        format!("=== {} ({}) ===", part.name, part.material),
        format!("Material removed:      ${:>10.2}", c.material_cost),
        format!("Setup cost per part:   ${:>10.2}", c.setup_cost_per_part),
        format!("Non-productive cost:   ${:>10.2}", c.non_productive_cost),
        format!(
            "Machining cost:        ${:>10.2}  ({:.3} min)",
            c.machining_cost, c.machining_minutes
        ),
        format!("TOTAL cost per part:   ${:>10.2}", c.total_cost_per_part),
        format!(
            "With stock blank:      ${:>10.2}  (weight {:.2} lb)",
            c.total_with_stock(),
            c.stock_weight
        ),
    ];
    for note in &part.notes {
        lines.push(format!("note: {}", note));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::{PartSpec, Sequencer};
    use crate::worksheet::tests::turn_input;
    use pretty_assertions::assert_eq;

    fn rows() -> Vec<WorksheetRow> {
        let mut finish = turn_input();
        finish.d_b = 0.75;
        let spec = PartSpec {
            name: "shaft, short".to_string(),
            material: "carbon steel".to_string(),
            rough: turn_input(),
            finish: Some(finish),
        };
        Sequencer::default().run_batch(&[spec]).rows
    }

    #[test]
    fn test_cells_match_columns() {
        for row in rows() {
            assert_eq!(row_cells(&row).len(), COLUMNS.len());
        }
    }

    #[test]
    fn test_csv_layout() {
        let mut writer = CsvWriter::new(Vec::new());
        writer.write_rows(&rows()).unwrap();
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        let lines: Vec<_> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Row,Part,Pass,Operation,Material,Tool Type (HCD),"));
        assert!(lines[1].starts_with("1,\"shaft, short\",Rough,turn,carbon steel,C,2.0000,1.0000,0.8000,5.0265,0.5655,"));
        assert!(lines[2].starts_with("2,\"shaft, short\",Finish,turn,carbon steel,C,2.0000,0.8000,0.7500,"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_append_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        let rows = rows();

        append_csv(&path, &rows).unwrap();
        append_csv(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let headers = text.lines().filter(|l| l.starts_with("Row,")).count();
        assert_eq!(headers, 1);
        assert_eq!(text.lines().count(), 1 + 2 * rows.len());
    }

    #[test]
    fn test_empty_sheet_still_gets_header() {
        let writer = CsvWriter::new(Vec::new());
        let text = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(text, format!("{}\n", csv_line(COLUMNS)));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        append_csv(&path, &[]).unwrap();
        append_csv(&path, &[]).unwrap();
        append_csv(&path, &rows()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Row,Part,Pass,"));
        assert!(lines[1].starts_with("1,"));
    }

    #[test]
    fn test_json_rows() {
        let mut out = Vec::new();
        write_json(&mut out, &rows()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let first = &value[0];
        assert_eq!(first["id"], 1);
        assert_eq!(first["pass"], "Rough");
        assert_eq!(first["input"]["operation"], "turn");
    }

    #[test]
    fn test_summary_mentions_total() {
        let mut finish = turn_input();
        finish.d_b = 0.75;
        let spec = PartSpec {
            name: "shaft".to_string(),
            material: "carbon steel".to_string(),
            rough: turn_input(),
            finish: Some(finish),
        };
        let report = Sequencer::default().run_batch(&[spec]);
        let summary = part_summary(&report.parts[0]);
        assert!(summary.starts_with("=== shaft (carbon steel) ==="));
        assert!(summary.contains("TOTAL cost per part:"));
        assert!(summary.contains("note: [INFO] INHERITED_DIAMETER"));
    }
}
