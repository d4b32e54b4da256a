//! Per-part cost figures

use super::*;
use std::f64::consts::PI;
use uom::si::f64::Time;
use uom::si::time::{hour, minute, second};

/// Whether a pass carries the part's setup and non-productive cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overhead {
    Charged,
    AlreadyCharged,
}

/// Cost figures for one pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassCosts {
    pub stock_weight: f64,
    pub material_cost: f64,
    pub setup_cost_per_part: f64,
    pub non_productive_cost: f64,
    pub machining_cost: f64,
    pub total_cost_per_part: f64,
}

/// Volume of round bar stock: (π/4)·d²·L
pub fn stock_volume_cylinder(length: f64, diameter: f64) -> f64 {
    (PI / 4.0) * diameter * diameter * length
}

pub fn stock_weight(density: f64, stock_volume: f64) -> f64 {
    density * stock_volume
}

/// Cost of the material this pass removes
pub fn material_cost(density: f64, v_m: f64, cost_per_lb: f64) -> f64 {
    density * v_m * cost_per_lb
}

pub fn setup_cost_per_part(
    context: PassContext,
    setup_cost: f64,
    batch_size: i64,
) -> Result<f64, WorksheetError> {
    if batch_size <= 0 {
        return Err(WorksheetError::InvalidBatchSize {
            context,
            batch_size,
        });
    }
    Ok(setup_cost / batch_size as f64)
}

/// Load/unload and tool positioning (seconds) at the machine rate (per hour)
pub fn non_productive_cost(load_unload_s: f64, tool_position_s: f64, machine_rate: f64) -> f64 {
    let idle = Time::new::<second>(load_unload_s + tool_position_s);
    idle.get::<hour>() * machine_rate
}

/// Corrected machining time (minutes) at the machine rate (per hour)
pub fn machining_cost(t_m_prime: f64, machine_rate: f64) -> f64 {
    Time::new::<minute>(t_m_prime).get::<hour>() * machine_rate
}

pub fn compute_costs(
    context: PassContext,
    input: &OperationInput,
    v_m: f64,
    t_m_prime: f64,
    overhead: Overhead,
) -> Result<PassCosts, WorksheetError> {
    let costs = &input.costs;
    let density = non_negative(context, "density", input.density)?;
    let cost_per_lb = non_negative(context, "cost_per_lb", costs.cost_per_lb)?;
    let setup_cost = non_negative(context, "setup_cost", costs.setup_cost)?;
    let load = non_negative(context, "load_unload_time", costs.load_unload_time)?;
    let position = non_negative(context, "tool_position_time", costs.tool_position_time)?;
    let rate = non_negative(context, "machine_rate", costs.machine_rate)?;
    let stock_volume = non_negative(context, "stock_volume", costs.stock_volume)?;

    let setup = setup_cost_per_part(context, setup_cost, costs.batch_size)?;
    let (setup, idle) = match overhead {
        Overhead::Charged => (setup, non_productive_cost(load, position, rate)),
        Overhead::AlreadyCharged => (0.0, 0.0),
    };

    let material = material_cost(density, v_m, cost_per_lb);
    let machining = machining_cost(t_m_prime, rate);

    Ok(PassCosts {
        stock_weight: stock_weight(density, stock_volume),
        material_cost: material,
        setup_cost_per_part: setup,
        non_productive_cost: idle,
        machining_cost: machining,
        total_cost_per_part: material + setup + idle + machining,
    })
}

/// Cost roll-up for one physical part across its passes
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PartCosting {
    pub stock_weight: f64,
    pub stock_material_cost: f64,
    pub material_cost: f64,
    pub setup_cost_per_part: f64,
    pub non_productive_cost: f64,
    pub machining_cost: f64,
    pub total_cost_per_part: f64,
    pub machining_minutes: f64,
}

impl PartCosting {
    /// Sum pass results. Overhead appears on the rough pass only, so plain
    /// sums never double-count it.
    pub fn from_results(results: &[OperationResult], cost_per_lb: f64) -> Self {
        let mut costing = PartCosting::default();
        for r in results {
            costing.material_cost += r.material_cost;
            costing.setup_cost_per_part += r.setup_cost_per_part;
            costing.non_productive_cost += r.non_productive_cost;
            costing.machining_cost += r.machining_cost;
            costing.total_cost_per_part += r.total_cost_per_part;
            costing.machining_minutes += r.t_m_prime;
        }
        if let Some(first) = results.first() {
            costing.stock_weight = first.stock_weight;
            costing.stock_material_cost = first.stock_weight * cost_per_lb;
        }
        costing
    }

    /// Part cost including the whole stock blank, not just removed material
    pub fn total_with_stock(&self) -> f64 {
        self.total_cost_per_part + self.stock_material_cost
    }
}
