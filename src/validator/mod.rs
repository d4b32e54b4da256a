//! Resolves a parsed job into part specs.
//!
//! Settings are layered top to bottom: shop defaults, then job-level
//! settings in the order they appear, then the part's own. Only values the
//! calculator does not check itself are rejected here; geometry and batch
//! size are left to the calculator so a bad part fails on its own.

use crate::ast::{Item, Job, MaterialRef, PartDecl, PassDecl, Setting, Spanned};
use crate::sequencer::PartSpec;
use crate::worksheet::{
    costing, CostInputs, MaterialPreset, MaterialPresets, OperationFamily, OperationInput,
    OperationType, Pass, ToolType,
};
use logos::Span;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("unknown material '{name}'")]
    UnknownMaterial { name: String, span: Span },

    #[error("{setting} out of range: {value} (expected {expected})")]
    OutOfRange {
        setting: &'static str,
        value: f64,
        expected: &'static str,
        span: Span,
    },

    #[error("batch size must be a whole number, got {value}")]
    NotWholeNumber { value: f64, span: Span },

    #[error("part '{part}' has no {setting} setting")]
    MissingSetting {
        part: String,
        setting: &'static str,
        span: Span,
    },

    #[error("part '{part}' has no rough pass")]
    MissingRoughPass { part: String, span: Span },

    #[error("part '{part}' has more than one {pass} pass")]
    DuplicatePass { part: String, pass: Pass, span: Span },

    #[error("{operation} pass in part '{part}' needs a 'from' diameter")]
    MissingStartDiameter {
        part: String,
        operation: OperationType,
        span: Span,
    },
}

impl ValidationError {
    pub fn span(&self) -> Span {
        match self {
            ValidationError::UnknownMaterial { span, .. }
            | ValidationError::OutOfRange { span, .. }
            | ValidationError::NotWholeNumber { span, .. }
            | ValidationError::MissingSetting { span, .. }
            | ValidationError::MissingRoughPass { span, .. }
            | ValidationError::DuplicatePass { span, .. }
            | ValidationError::MissingStartDiameter { span, .. } => span.clone(),
        }
    }
}

/// Shop defaults for settings a job may leave out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetDefaults {
    pub power: f64,           // hp
    pub wear_exponent: f64,
    pub setup_hours: f64,     // per batch
    pub load_unload_s: f64,
    pub tool_position_s: f64,
    pub batch_size: i64,
    pub tool: ToolType,
}

impl Default for SheetDefaults {
    fn default() -> Self {
        Self {
            power: 5.0,
            wear_exponent: 0.2,
            setup_hours: 0.25,
            load_unload_s: 45.0,
            tool_position_s: 10.0,
            batch_size: 1,
            tool: ToolType::Carbide,
        }
    }
}

/// Settings in effect at one point of the job
#[derive(Debug, Clone)]
struct Layer {
    material: Option<(String, MaterialPreset)>,
    tool: ToolType,
    power: f64,
    wear: f64,
    stock: Option<(f64, f64)>, // length, diameter
    cost_per_lb: Option<f64>,
    rate: Option<f64>,
    batch: i64,
    setup_hours: f64,
    load: f64,
    position: f64,
    // settings whose last value was rejected; not reported again as missing
    rejected: BTreeSet<&'static str>,
}

impl Layer {
    fn new(defaults: &SheetDefaults) -> Self {
        Self {
            material: None,
            tool: defaults.tool,
            power: defaults.power,
            wear: defaults.wear_exponent,
            stock: None,
            cost_per_lb: None,
            rate: None,
            batch: defaults.batch_size,
            setup_hours: defaults.setup_hours,
            load: defaults.load_unload_s,
            position: defaults.tool_position_s,
            rejected: BTreeSet::new(),
        }
    }
}

pub struct Validator<'a> {
    presets: &'a MaterialPresets,
    defaults: SheetDefaults,
}

impl<'a> Validator<'a> {
    pub fn new(presets: &'a MaterialPresets) -> Self {
        Self::with_defaults(presets, SheetDefaults::default())
    }

    pub fn with_defaults(presets: &'a MaterialPresets, defaults: SheetDefaults) -> Self {
        Self { presets, defaults }
    }

    /// Resolve every part of the job, or report every problem found
    pub fn resolve(&self, job: &Job) -> Result<Vec<PartSpec>, Vec<ValidationError>> {
        let mut errors = Vec::new();
        let mut parts = Vec::new();
        let mut layer = Layer::new(&self.defaults);

        for item in &job.items {
            match item {
                Item::Setting(setting) => self.apply(&mut layer, setting, &mut errors),
                Item::Part(part) => {
                    if let Some(spec) = self.resolve_part(&layer, part, &mut errors) {
                        parts.push(spec);
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(parts)
        } else {
            Err(errors)
        }
    }

    fn apply(
        &self,
        layer: &mut Layer,
        setting: &Spanned<Setting>,
        errors: &mut Vec<ValidationError>,
    ) {
        let span = &setting.span;
        let keyword = setting.node.keyword();
        let before = errors.len();

        match &setting.node {
            Setting::Material(MaterialRef::Preset(name)) => match self.presets.get(name) {
                Some(preset) => layer.material = Some((name.clone(), *preset)),
                None => errors.push(ValidationError::UnknownMaterial {
                    name: name.clone(),
                    span: span.clone(),
                }),
            },
            Setting::Material(MaterialRef::Custom { density, p_s }) => {
                let density = positive("density", *density, span, errors);
                let p_s = positive("ps", *p_s, span, errors);
                if let (Some(density), Some(p_s)) = (density, p_s) {
                    layer.material = Some(("custom".to_string(), MaterialPreset { density, p_s }));
                }
            }
            Setting::Tool(tool) => layer.tool = *tool,
            Setting::Power(power) => layer.power = *power,
            Setting::Wear(n) => {
                if (0.0..1.0).contains(n) {
                    layer.wear = *n;
                } else {
                    errors.push(ValidationError::OutOfRange {
                        setting: "wear",
                        value: *n,
                        expected: "0 <= n < 1",
                        span: span.clone(),
                    });
                }
            }
            Setting::Stock { length, diameter } => {
                let length = positive("stock length", *length, span, errors);
                let diameter = positive("stock dia", *diameter, span, errors);
                if let (Some(length), Some(diameter)) = (length, diameter) {
                    layer.stock = Some((length, diameter));
                }
            }
            Setting::Cost(cost) => {
                if let Some(cost) = non_negative("cost", *cost, span, errors) {
                    layer.cost_per_lb = Some(cost);
                }
            }
            Setting::Rate(rate) => {
                if let Some(rate) = non_negative("rate", *rate, span, errors) {
                    layer.rate = Some(rate);
                }
            }
            Setting::Batch(batch) => {
                if batch.is_finite() && batch.fract() == 0.0 {
                    layer.batch = *batch as i64;
                } else {
                    errors.push(ValidationError::NotWholeNumber {
                        value: *batch,
                        span: span.clone(),
                    });
                }
            }
            Setting::Setup(hours) => {
                if let Some(hours) = non_negative("setup", *hours, span, errors) {
                    layer.setup_hours = hours;
                }
            }
            Setting::Load(seconds) => {
                if let Some(seconds) = non_negative("load", *seconds, span, errors) {
                    layer.load = seconds;
                }
            }
            Setting::Position(seconds) => {
                if let Some(seconds) = non_negative("position", *seconds, span, errors) {
                    layer.position = seconds;
                }
            }
        }

        if errors.len() > before {
            layer.rejected.insert(keyword);
        } else {
            layer.rejected.remove(keyword);
        }
    }

    fn resolve_part(
        &self,
        base: &Layer,
        part: &PartDecl,
        errors: &mut Vec<ValidationError>,
    ) -> Option<PartSpec> {
        let before = errors.len();
        let mut layer = base.clone();
        for setting in &part.settings {
            self.apply(&mut layer, setting, errors);
        }

        let mut rough: Option<&Spanned<PassDecl>> = None;
        let mut finish: Option<&Spanned<PassDecl>> = None;
        for pass in &part.passes {
            let slot = match pass.node.pass {
                Pass::Rough => &mut rough,
                Pass::Finish => &mut finish,
            };
            if slot.is_some() {
                errors.push(ValidationError::DuplicatePass {
                    part: part.name.clone(),
                    pass: pass.node.pass,
                    span: pass.span.clone(),
                });
            } else {
                *slot = Some(pass);
            }
            if let Some(p_s) = pass.node.p_s {
                positive("ps", p_s, &pass.span, errors);
            }
        }
        if rough.is_none() {
            errors.push(ValidationError::MissingRoughPass {
                part: part.name.clone(),
                span: part.span.clone(),
            });
        }

        // An inner-diameter pass cannot start from the stock OD
        let continued = [(rough, None), (finish, rough)];
        for (pass, after) in continued {
            let Some(pass) = pass else { continue };
            let decl = &pass.node;
            let inherits = after.is_some_and(|r| decl.operation.continues_from(r.node.operation));
            if decl.operation.family() == OperationFamily::InnerDiameter
                && decl.from.is_none()
                && !inherits
            {
                errors.push(ValidationError::MissingStartDiameter {
                    part: part.name.clone(),
                    operation: decl.operation,
                    span: pass.span.clone(),
                });
            }
        }

        let required = [
            ("material", layer.material.is_some()),
            ("stock", layer.stock.is_some()),
            ("cost", layer.cost_per_lb.is_some()),
            ("rate", layer.rate.is_some()),
        ];
        for (setting, present) in required {
            if !present && !layer.rejected.contains(setting) {
                errors.push(ValidationError::MissingSetting {
                    part: part.name.clone(),
                    setting,
                    span: part.span.clone(),
                });
            }
        }

        if errors.len() > before {
            return None;
        }
        let (rough, (material, preset), (stock_length, stock_dia), cost_per_lb, rate) = (
            rough?,
            layer.material.clone()?,
            layer.stock?,
            layer.cost_per_lb?,
            layer.rate?,
        );

        let costs = CostInputs {
            cost_per_lb,
            setup_cost: layer.setup_hours * rate,
            batch_size: layer.batch,
            load_unload_time: layer.load,
            tool_position_time: layer.position,
            machine_rate: rate,
            stock_volume: costing::stock_volume_cylinder(stock_length, stock_dia),
        };
        let input = |decl: &PassDecl, d_a: f64, p_s: f64| OperationInput {
            operation: decl.operation,
            l_w: decl.length,
            d_a,
            d_b: decl.to,
            v_f: decl.v_f,
            p_m: layer.power,
            p_s,
            n: layer.wear,
            tool_type: layer.tool,
            density: preset.density,
            costs: costs.clone(),
        };

        let rough = &rough.node;
        let rough_p_s = rough.p_s.unwrap_or(preset.p_s);
        let rough_input = input(rough, rough.from.unwrap_or(stock_dia), rough_p_s);

        let finish_input = finish.map(|finish| {
            let finish = &finish.node;
            let start = if finish.operation.continues_from(rough.operation) {
                rough.to
            } else {
                stock_dia
            };
            let d_a = finish.from.unwrap_or(start);
            input(finish, d_a, finish.p_s.unwrap_or(rough_p_s))
        });

        debug!(
            part = %part.name,
            material = %material,
            finish = finish_input.is_some(),
            "part resolved"
        );
        Some(PartSpec {
            name: part.name.clone(),
            material,
            rough: rough_input,
            finish: finish_input,
        })
    }
}

fn positive(
    setting: &'static str,
    value: f64,
    span: &Span,
    errors: &mut Vec<ValidationError>,
) -> Option<f64> {
    if value > 0.0 && value.is_finite() {
        return Some(value);
    }
    errors.push(ValidationError::OutOfRange {
        setting,
        value,
        expected: "> 0",
        span: span.clone(),
    });
    None
}

fn non_negative(
    setting: &'static str,
    value: f64,
    span: &Span,
    errors: &mut Vec<ValidationError>,
) -> Option<f64> {
    if value >= 0.0 && value.is_finite() {
        return Some(value);
    }
    errors.push(ValidationError::OutOfRange {
        setting,
        value,
        expected: ">= 0",
        span: span.clone(),
    });
    None
}
