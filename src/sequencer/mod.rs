//! Pass sequencing
//!
//! Runs the rough pass of each part, then the optional finish pass with the
//! rough target diameter carried over, and numbers the resulting rows in
//! submission order. A failing part is reported and skipped; its siblings are
//! unaffected.

use crate::worksheet::{
    validators, MaterialPresets, OperationInput, OperationResult, PartCosting, Pass, PassContext,
    ValidationIssue, WorksheetCalculator, WorksheetError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One physical part: a mandatory rough pass and an optional finish pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSpec {
    pub name: String,
    pub material: String,
    pub rough: OperationInput,
    pub finish: Option<OperationInput>,
}

/// Input and result of one executed pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRecord {
    pub pass: Pass,
    pub input: OperationInput,
    pub result: OperationResult,
}

/// Progress of a single part through its passes
#[derive(Debug, Clone, PartialEq)]
pub enum PartState {
    Start,
    RoughComputed(PassRecord),
    FinishComputed(PassRecord, PassRecord),
    Finalized(PartOutcome),
}

/// Finished part, ready for row emission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartOutcome {
    pub name: String,
    pub material: String,
    pub passes: Vec<PassRecord>,
    pub costing: PartCosting,
    pub notes: Vec<ValidationIssue>,
}

/// One emitted worksheet row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorksheetRow {
    pub id: usize,
    pub part: String,
    pub material: String,
    pub pass: Pass,
    pub input: OperationInput,
    pub result: OperationResult,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartFailure {
    pub index: usize,
    pub part: String,
    pub error: WorksheetError,
}

/// Rows for all successful parts plus the parts that failed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub rows: Vec<WorksheetRow>,
    pub parts: Vec<PartOutcome>,
    pub failures: Vec<PartFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn collect(specs: &[PartSpec], outcomes: Vec<Result<PartOutcome, WorksheetError>>) -> Self {
        let mut report = BatchReport::default();
        for (index, (spec, outcome)) in specs.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok(part) => {
                    for record in &part.passes {
                        report.rows.push(WorksheetRow {
                            id: report.rows.len() + 1,
                            part: part.name.clone(),
                            material: part.material.clone(),
                            pass: record.pass,
                            input: record.input.clone(),
                            result: record.result.clone(),
                        });
                    }
                    report.parts.push(part);
                }
                Err(error) => {
                    warn!(part = %spec.name, "part skipped: {}", error);
                    report.failures.push(PartFailure {
                        index,
                        part: spec.name.clone(),
                        error,
                    });
                }
            }
        }
        report
    }
}

/// Chains passes per part and parts per batch
#[derive(Debug, Clone, Default)]
pub struct Sequencer {
    calculator: WorksheetCalculator,
    presets: MaterialPresets,
}

impl Sequencer {
    pub fn new(calculator: WorksheetCalculator, presets: MaterialPresets) -> Self {
        Self {
            calculator,
            presets,
        }
    }

    pub fn with_presets(presets: MaterialPresets) -> Self {
        Self::new(WorksheetCalculator::default(), presets)
    }

    /// Material table used to resolve job inputs
    pub fn presets(&self) -> &MaterialPresets {
        &self.presets
    }

    /// Walk one part from `Start` to `Finalized`
    pub fn run_part(&self, spec: &PartSpec) -> Result<PartOutcome, WorksheetError> {
        let mut notes = Vec::new();
        let mut state = PartState::Start;

        loop {
            state = match state {
                PartState::Start => {
                    let result = self.calculator.compute(&spec.rough, Pass::Rough)?;
                    PartState::RoughComputed(PassRecord {
                        pass: Pass::Rough,
                        input: spec.rough.clone(),
                        result,
                    })
                }
                PartState::RoughComputed(rough) => match &spec.finish {
                    Some(finish) => {
                        let (input, note) = carry_over(&rough.input, finish);
                        notes.extend(note);
                        let result = self.calculator.compute(&input, Pass::Finish)?;
                        let finish = PassRecord {
                            pass: Pass::Finish,
                            input,
                            result,
                        };
                        PartState::FinishComputed(rough, finish)
                    }
                    None => PartState::Finalized(finalize(spec, vec![rough], &mut notes)),
                },
                PartState::FinishComputed(rough, finish) => {
                    PartState::Finalized(finalize(spec, vec![rough, finish], &mut notes))
                }
                PartState::Finalized(outcome) => {
                    debug!(
                        part = %outcome.name,
                        passes = outcome.passes.len(),
                        total = outcome.costing.total_cost_per_part,
                        "part finalized"
                    );
                    return Ok(outcome);
                }
            };
        }
    }

    /// Evaluate parts independently; rows keep submission order
    pub fn run_batch(&self, parts: &[PartSpec]) -> BatchReport {
        let outcomes = self.evaluate(parts);
        let report = BatchReport::collect(parts, outcomes);
        info!(
            parts = parts.len(),
            rows = report.rows.len(),
            failed = report.failures.len(),
            "batch computed"
        );
        report
    }

    #[cfg(feature = "parallel")]
    fn evaluate(&self, parts: &[PartSpec]) -> Vec<Result<PartOutcome, WorksheetError>> {
        parts.par_iter().map(|part| self.run_part(part)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn evaluate(&self, parts: &[PartSpec]) -> Vec<Result<PartOutcome, WorksheetError>> {
        parts.iter().map(|part| self.run_part(part)).collect()
    }
}

/// Build the finish input: diameter-based passes of the same family start
/// where the rough pass ended. Facing and milling keep their own dimensions.
pub fn carry_over(
    rough: &OperationInput,
    finish: &OperationInput,
) -> (OperationInput, Option<ValidationIssue>) {
    if !finish.operation.continues_from(rough.operation) {
        return (finish.clone(), None);
    }

    let mut input = finish.clone();
    input.d_a = rough.d_b;
    let note = (finish.d_a != rough.d_b).then(|| {
        validators::inherited_diameter(
            PassContext::new(finish.operation, Pass::Finish),
            finish.d_a,
            rough.d_b,
        )
    });
    (input, note)
}

fn finalize(
    spec: &PartSpec,
    passes: Vec<PassRecord>,
    notes: &mut Vec<ValidationIssue>,
) -> PartOutcome {
    let results: Vec<OperationResult> = passes.iter().map(|p| p.result.clone()).collect();
    PartOutcome {
        name: spec.name.clone(),
        material: spec.material.clone(),
        costing: PartCosting::from_results(&results, spec.rough.costs.cost_per_lb),
        passes,
        notes: std::mem::take(notes),
    }
}
