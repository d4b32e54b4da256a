//! Worksheet calculation engine
//!
//! Evaluates the closed-form machining formulas for one pass of one part:
//! - Machined area and removed volume per operation family
//! - Power-limited, recommended, wear-corrected and travel-corrected times
//! - Stock weight, material, setup, non-productive and machining cost
//!
//! Units follow the shop worksheet: inches, in^2/min surface generation rate,
//! hp and hp·min/in^3, lb/in^3, times in minutes unless a field says otherwise.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

pub mod costing;
pub mod geometry;
pub mod materials;
pub mod timing;
pub mod validators;

pub use costing::*;
pub use geometry::Removal;
pub use materials::*;
pub use timing::PassTimes;
pub use validators::{Severity, ValidationIssue};

/// Seconds of extra tool travel charged to turning-style passes
pub const TRAVEL_ALLOWANCE_SECONDS: f64 = 5.4;

/// Machining operation performed by a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Turn,
    Face,
    Bore,
    Drill,
    Tap,
    Ream,
    Thread,
    Cutoff,
    Mill,
}

/// Formula family an operation belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationFamily {
    OuterDiameter, // turn, thread, cutoff
    InnerDiameter, // bore, drill, tap, ream
    Facing,
    Milling,
}

impl OperationType {
    pub const ALL: [OperationType; 9] = [
        OperationType::Turn,
        OperationType::Face,
        OperationType::Bore,
        OperationType::Drill,
        OperationType::Tap,
        OperationType::Ream,
        OperationType::Thread,
        OperationType::Cutoff,
        OperationType::Mill,
    ];

    pub fn family(self) -> OperationFamily {
        match self {
            OperationType::Turn | OperationType::Thread | OperationType::Cutoff => {
                OperationFamily::OuterDiameter
            }
            OperationType::Bore
            | OperationType::Drill
            | OperationType::Tap
            | OperationType::Ream => OperationFamily::InnerDiameter,
            OperationType::Face => OperationFamily::Facing,
            OperationType::Mill => OperationFamily::Milling,
        }
    }

    /// Whether the pass pays the extra tool travel allowance
    pub fn adds_travel(self) -> bool {
        matches!(
            self,
            OperationType::Turn | OperationType::Face | OperationType::Bore | OperationType::Cutoff
        )
    }

    /// Diameter-based passes hand their target diameter on to the next pass
    pub fn is_diameter_based(self) -> bool {
        matches!(
            self.family(),
            OperationFamily::OuterDiameter | OperationFamily::InnerDiameter
        )
    }

    /// A finish pass of this kind starts where a `rough` pass left off
    pub fn continues_from(self, rough: OperationType) -> bool {
        self.is_diameter_based() && self.family() == rough.family()
    }

    pub fn name(self) -> &'static str {
        match self {
            OperationType::Turn => "turn",
            OperationType::Face => "face",
            OperationType::Bore => "bore",
            OperationType::Drill => "drill",
            OperationType::Tap => "tap",
            OperationType::Ream => "ream",
            OperationType::Thread => "thread",
            OperationType::Cutoff => "cutoff",
            OperationType::Mill => "mill",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        OperationType::ALL
            .into_iter()
            .find(|op| op.name() == lower)
            .ok_or_else(|| format!("Unknown operation: {}", s))
    }
}

/// Pass within a part
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Pass {
    Rough,
    Finish,
}

impl fmt::Display for Pass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pass::Rough => write!(f, "Rough"),
            Pass::Finish => write!(f, "Finish"),
        }
    }
}

/// Cutting tool material; recorded on the sheet, not used by the formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToolType {
    #[serde(rename = "hss", alias = "HSS")]
    Hss,
    #[serde(rename = "carbide", alias = "CARBIDE")]
    #[default]
    Carbide,
    #[serde(rename = "diamond", alias = "cbn", alias = "pcd")]
    Diamond, // Ceramic/CBN/PCD
}

impl ToolType {
    /// Single-letter code used in the worksheet column (H/C/D)
    pub fn code(self) -> char {
        match self {
            ToolType::Hss => 'H',
            ToolType::Carbide => 'C',
            ToolType::Diamond => 'D',
        }
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolType::Hss => write!(f, "HSS"),
            ToolType::Carbide => write!(f, "Carbide"),
            ToolType::Diamond => write!(f, "Diamond/CBN/PCD"),
        }
    }
}

/// Costing inputs shared by every pass of a part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostInputs {
    pub cost_per_lb: f64,
    pub setup_cost: f64, // per batch
    pub batch_size: i64,
    pub load_unload_time: f64,   // seconds
    pub tool_position_time: f64, // seconds
    pub machine_rate: f64,       // per hour
    pub stock_volume: f64,       // in^3, full workpiece stock
}

/// Inputs for one executed pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationInput {
    pub operation: OperationType,
    pub l_w: f64, // engaged length
    pub d_a: f64, // starting diameter (milling: width)
    pub d_b: f64, // target diameter (milling: depth of cut)
    pub v_f: f64, // surface generation rate
    pub p_m: f64, // available power
    pub p_s: f64, // specific cutting energy
    pub n: f64,   // tool wear exponent
    pub tool_type: ToolType,
    pub density: f64,
    pub costs: CostInputs,
}

/// Everything computed for one pass. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub pass: Pass,
    pub a_m: f64,
    pub v_m: f64,
    pub t_mp: f64,
    pub t_mc: f64,
    pub t_m: f64,
    pub t_m_prime: f64,
    pub stock_weight: f64,
    pub material_cost: f64,
    pub setup_cost_per_part: f64,
    pub non_productive_cost: f64,
    pub machining_cost: f64,
    pub total_cost_per_part: f64,
    pub issues: Vec<ValidationIssue>,
}

impl OperationResult {
    pub fn removes_material(&self) -> bool {
        self.v_m > 0.0 || self.a_m > 0.0
    }

    pub fn has_issue(&self, code: &str) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

/// Operation and pass an error or issue refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PassContext {
    pub operation: OperationType,
    pub pass: Pass,
}

impl PassContext {
    pub fn new(operation: OperationType, pass: Pass) -> Self {
        Self { operation, pass }
    }
}

impl fmt::Display for PassContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pass, self.operation)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorksheetError {
    #[error("invalid geometry in {context} pass: {field} = {value} ({reason})")]
    InvalidGeometry {
        context: PassContext,
        field: &'static str,
        value: f64,
        reason: String,
    },

    #[error("division by zero in {context} pass: {field} must be non-zero")]
    DivisionByZero {
        context: PassContext,
        field: &'static str,
    },

    #[error("invalid batch size in {context} pass: {batch_size} (must be at least 1)")]
    InvalidBatchSize { context: PassContext, batch_size: i64 },

    #[error("invalid parameter in {context} pass: {field} = {value}")]
    InvalidParameter {
        context: PassContext,
        field: &'static str,
        value: f64,
    },
}

impl WorksheetError {
    pub fn context(&self) -> PassContext {
        match self {
            WorksheetError::InvalidGeometry { context, .. }
            | WorksheetError::DivisionByZero { context, .. }
            | WorksheetError::InvalidBatchSize { context, .. }
            | WorksheetError::InvalidParameter { context, .. } => *context,
        }
    }

    /// Name of the input field that needs correcting
    pub fn field(&self) -> &'static str {
        match self {
            WorksheetError::InvalidGeometry { field, .. }
            | WorksheetError::DivisionByZero { field, .. }
            | WorksheetError::InvalidParameter { field, .. } => field,
            WorksheetError::InvalidBatchSize { .. } => "batch_size",
        }
    }
}

/// Rejects negative or non-finite values for fields the formulas divide or scale by
pub(crate) fn non_negative(
    context: PassContext,
    field: &'static str,
    value: f64,
) -> Result<f64, WorksheetError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(WorksheetError::InvalidParameter {
            context,
            field,
            value,
        })
    }
}

/// Evaluates one pass at a time
#[derive(Debug, Clone)]
pub struct WorksheetCalculator {
    travel_allowance_s: f64,
}

impl Default for WorksheetCalculator {
    fn default() -> Self {
        Self {
            travel_allowance_s: TRAVEL_ALLOWANCE_SECONDS,
        }
    }
}

impl WorksheetCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute geometry, times and costs for a single pass.
    ///
    /// Setup and non-productive cost are charged on the rough pass only;
    /// a finish pass reports them as zero so a part never pays them twice.
    pub fn compute(
        &self,
        input: &OperationInput,
        pass: Pass,
    ) -> Result<OperationResult, WorksheetError> {
        let context = PassContext::new(input.operation, pass);

        let removal = geometry::resolve(context, input.l_w, input.d_a, input.d_b)?;
        let mut issues = Vec::new();
        if removal.is_zero() {
            issues.push(validators::zero_removal(context, input.d_a, input.d_b));
        }

        let times = timing::compute_times(context, &removal, input, self.travel_allowance_s)?;
        if let Some(issue) = validators::check_power_ceiling(context, &times) {
            issues.push(issue);
        }
        issues.extend(validators::check_wear_exponent(context, input.n));

        let overhead = match pass {
            Pass::Rough => Overhead::Charged,
            Pass::Finish => Overhead::AlreadyCharged,
        };
        let costs = costing::compute_costs(context, input, removal.v_m, times.t_m_prime, overhead)?;

        for issue in &issues {
            warn!(pass = %context, code = %issue.code, "{}", issue.message);
        }
        debug!(
            pass = %context,
            a_m = removal.a_m,
            v_m = removal.v_m,
            t_m_prime = times.t_m_prime,
            total = costs.total_cost_per_part,
            "pass computed"
        );

        Ok(OperationResult {
            pass,
            a_m: removal.a_m,
            v_m: removal.v_m,
            t_mp: times.t_mp,
            t_mc: times.t_mc,
            t_m: times.t_m,
            t_m_prime: times.t_m_prime,
            stock_weight: costs.stock_weight,
            material_cost: costs.material_cost,
            setup_cost_per_part: costs.setup_cost_per_part,
            non_productive_cost: costs.non_productive_cost,
            machining_cost: costs.machining_cost,
            total_cost_per_part: costs.total_cost_per_part,
            issues,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    pub(crate) fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol
    }

    /// Turning pass from the shop scenario: 2" long, 1.0" down to 0.8"
    pub(crate) fn turn_input() -> OperationInput {
        OperationInput {
            operation: OperationType::Turn,
            l_w: 2.0,
            d_a: 1.0,
            d_b: 0.8,
            v_f: 50.0,
            p_m: 1.0,
            p_s: 1.0,
            n: 0.1,
            tool_type: ToolType::Carbide,
            density: 0.283,
            costs: CostInputs {
                cost_per_lb: 2.0,
                setup_cost: 15.0,
                batch_size: 10,
                load_unload_time: 45.0,
                tool_position_time: 10.0,
                machine_rate: 60.0,
                stock_volume: 3.1416,
            },
        }
    }

    #[test]
    fn test_turn_scenario() {
        let calc = WorksheetCalculator::new();
        let result = calc.compute(&turn_input(), Pass::Rough).unwrap();

        assert!(close(result.a_m, 5.0265, 1e-4), "A_m = {}", result.a_m);
        assert!(close(result.v_m, 0.5655, 1e-4), "V_m = {}", result.v_m);
        assert!(close(result.t_mc, 6.0319, 1e-4), "t_mc = {}", result.t_mc);
        assert!(close(result.t_m, 6.635, 1e-3), "t_m = {}", result.t_m);
        assert!(close(result.t_m_prime, 6.725, 1e-3), "t'_m = {}", result.t_m_prime);
    }

    #[test]
    fn test_power_ceiling_is_warning_only() {
        // t_mp = 60 * 1 * 0.5655 / 1 ≈ 33.93 > t_mc, so no warning here
        let calc = WorksheetCalculator::new();
        let result = calc.compute(&turn_input(), Pass::Rough).unwrap();
        assert!(!result.has_issue("POWER_LIMITED"));

        // Plenty of rate, almost no power budget per unit time: still computed
        let mut input = turn_input();
        input.v_f = 0.5;
        let result = calc.compute(&input, Pass::Rough).unwrap();
        assert!(result.has_issue("POWER_LIMITED"));
        assert!(close(result.t_mc, 60.0 * result.a_m / 0.5, 1e-9));
    }

    #[test]
    fn test_rough_pass_totals_equal_its_costs() {
        let calc = WorksheetCalculator::new();
        let r = calc.compute(&turn_input(), Pass::Rough).unwrap();
        let sum = r.material_cost + r.setup_cost_per_part + r.non_productive_cost + r.machining_cost;
        assert!(close(r.total_cost_per_part, sum, 1e-12));
        assert!(r.setup_cost_per_part > 0.0);
        assert!(r.non_productive_cost > 0.0);
    }

    #[test]
    fn test_finish_pass_does_not_recharge_overhead() {
        let calc = WorksheetCalculator::new();
        let mut input = turn_input();
        input.d_a = 0.8;
        input.d_b = 0.75;
        let f = calc.compute(&input, Pass::Finish).unwrap();
        assert_eq!(f.setup_cost_per_part, 0.0);
        assert_eq!(f.non_productive_cost, 0.0);
        assert!(close(f.total_cost_per_part, f.material_cost + f.machining_cost, 1e-12));
    }

    #[test]
    fn test_zero_removal_flagged_not_failed() {
        let calc = WorksheetCalculator::new();
        let mut input = turn_input();
        input.d_b = input.d_a;
        let result = calc.compute(&input, Pass::Rough).unwrap();

        assert_eq!(result.a_m, 0.0);
        assert_eq!(result.v_m, 0.0);
        assert_eq!(result.t_mc, 0.0);
        assert_eq!(result.t_m_prime, 0.0);
        assert_eq!(result.machining_cost, 0.0);
        assert!(result.has_issue("ZERO_REMOVAL"));
        assert!(!result.removes_material());
    }

    #[test]
    fn test_error_context_names_field() {
        let calc = WorksheetCalculator::new();
        let mut input = turn_input();
        input.p_m = 0.0;
        let err = calc.compute(&input, Pass::Finish).unwrap_err();

        assert_eq!(
            err,
            WorksheetError::DivisionByZero {
                context: PassContext::new(OperationType::Turn, Pass::Finish),
                field: "p_m",
            }
        );
        assert_eq!(err.field(), "p_m");
        assert_eq!(
            err.to_string(),
            "division by zero in Finish turn pass: p_m must be non-zero"
        );
    }

    #[test]
    fn test_operation_names_round_trip() {
        for op in OperationType::ALL {
            assert_eq!(op.name().parse::<OperationType>(), Ok(op));
        }
        assert!("knurl".parse::<OperationType>().is_err());
        assert_eq!("CUTOFF".parse::<OperationType>(), Ok(OperationType::Cutoff));
    }

    #[test]
    fn test_travel_membership() {
        let with_travel: Vec<_> = OperationType::ALL
            .into_iter()
            .filter(|op| op.adds_travel())
            .collect();
        assert_eq!(
            with_travel,
            vec![
                OperationType::Turn,
                OperationType::Face,
                OperationType::Bore,
                OperationType::Cutoff
            ]
        );
    }

    #[test]
    fn test_tool_codes() {
        assert_eq!(ToolType::Hss.code(), 'H');
        assert_eq!(ToolType::Carbide.code(), 'C');
        assert_eq!(ToolType::Diamond.code(), 'D');
    }
}
