//! Machined area and removed volume per operation family

use super::*;
use std::f64::consts::PI;

/// Surface generated and material removed by one pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Removal {
    pub a_m: f64, // in^2
    pub v_m: f64, // in^3
}

impl Removal {
    pub const NONE: Removal = Removal { a_m: 0.0, v_m: 0.0 };

    pub fn is_zero(&self) -> bool {
        self.a_m == 0.0 && self.v_m == 0.0
    }
}

/// Resolve `A_m` and `V_m` for an operation.
///
/// A pass that removes nothing (start equals target, or zero milling depth)
/// resolves to [`Removal::NONE`] rather than an error. Cuts running the wrong
/// way for their family are rejected.
pub fn resolve(
    context: PassContext,
    l_w: f64,
    d_a: f64,
    d_b: f64,
) -> Result<Removal, WorksheetError> {
    let invalid = |field: &'static str, value: f64, reason: &str| WorksheetError::InvalidGeometry {
        context,
        field,
        value,
        reason: reason.to_string(),
    };

    if !l_w.is_finite() || l_w <= 0.0 {
        return Err(invalid("l_w", l_w, "engaged length must be positive"));
    }
    if !d_a.is_finite() || d_a <= 0.0 {
        return Err(invalid("d_a", d_a, "starting dimension must be positive"));
    }
    if !d_b.is_finite() || d_b < 0.0 {
        return Err(invalid("d_b", d_b, "target dimension must not be negative"));
    }

    let removal = match context.operation.family() {
        OperationFamily::OuterDiameter => {
            if d_b > d_a {
                return Err(invalid(
                    "d_b",
                    d_b,
                    "target diameter exceeds starting diameter for an outside cut",
                ));
            }
            if d_a == d_b {
                return Ok(Removal::NONE);
            }
            outer_diameter(l_w, d_a, d_b)
        }
        OperationFamily::InnerDiameter => {
            if d_a > d_b {
                return Err(invalid(
                    "d_b",
                    d_b,
                    "target diameter is smaller than starting diameter for an inside cut",
                ));
            }
            if d_a == d_b {
                return Ok(Removal::NONE);
            }
            inner_diameter(l_w, d_a, d_b)
        }
        OperationFamily::Facing => {
            if d_b > d_a {
                return Err(invalid(
                    "d_b",
                    d_b,
                    "inner facing diameter exceeds outer diameter",
                ));
            }
            if d_a == d_b {
                return Ok(Removal::NONE);
            }
            facing(l_w, d_a, d_b)
        }
        OperationFamily::Milling => {
            if d_b == 0.0 {
                return Ok(Removal::NONE);
            }
            milling(l_w, d_a, d_b)
        }
    };

    Ok(removal)
}

/// Turn, thread and cutoff: A = π·l·d_b, V = (π/4)·l·(d_a² − d_b²)
pub fn outer_diameter(l_w: f64, d_a: f64, d_b: f64) -> Removal {
    Removal {
        a_m: PI * l_w * d_b,
        v_m: (PI / 4.0) * l_w * (d_a * d_a - d_b * d_b),
    }
}

/// Bore, drill, tap and ream: A = π·l·d_a, V = (π/4)·l·(d_b² − d_a²)
pub fn inner_diameter(l_w: f64, d_a: f64, d_b: f64) -> Removal {
    Removal {
        a_m: PI * l_w * d_a,
        v_m: (PI / 4.0) * l_w * (d_b * d_b - d_a * d_a),
    }
}

/// Facing from d_a in to d_b: A = (π/2)·d_a·(d_a − d_b), V = A·l
pub fn facing(l_w: f64, d_a: f64, d_b: f64) -> Removal {
    let a_m = (PI / 2.0) * d_a * (d_a - d_b);
    Removal {
        a_m,
        v_m: a_m * l_w,
    }
}

/// Milling with d_a as width and d_b as depth of cut
pub fn milling(l_w: f64, width: f64, depth: f64) -> Removal {
    Removal {
        a_m: l_w * width,
        v_m: l_w * width * depth,
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::close;
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx(op: OperationType) -> PassContext {
        PassContext::new(op, Pass::Rough)
    }

    #[test]
    fn test_turn_family_volume() {
        for op in [OperationType::Turn, OperationType::Thread, OperationType::Cutoff] {
            let r = resolve(ctx(op), 2.0, 1.0, 0.8).unwrap();
            assert!(close(r.a_m, PI * 2.0 * 0.8, 1e-12));
            assert!(close(r.v_m, (PI / 4.0) * 2.0 * (1.0 - 0.64), 1e-12));
            assert!(r.v_m > 0.0);
        }
    }

    #[test]
    fn test_turn_rejects_growing_diameter() {
        let err = resolve(ctx(OperationType::Turn), 2.0, 0.8, 1.0).unwrap_err();
        assert!(matches!(
            err,
            WorksheetError::InvalidGeometry { field: "d_b", .. }
        ));
    }

    #[test]
    fn test_bore_family() {
        for op in [
            OperationType::Bore,
            OperationType::Drill,
            OperationType::Tap,
            OperationType::Ream,
        ] {
            let r = resolve(ctx(op), 1.5, 0.5, 0.75).unwrap();
            assert!(close(r.a_m, PI * 1.5 * 0.5, 1e-12));
            assert!(close(r.v_m, (PI / 4.0) * 1.5 * (0.5625 - 0.25), 1e-12));
        }
        assert!(resolve(ctx(OperationType::Bore), 1.5, 0.75, 0.5).is_err());
    }

    #[test]
    fn test_face() {
        let r = resolve(ctx(OperationType::Face), 0.05, 2.0, 0.0).unwrap();
        assert!(close(r.a_m, (PI / 2.0) * 2.0 * 2.0, 1e-12));
        assert!(close(r.v_m, (PI / 2.0) * 0.05 * 2.0 * 2.0, 1e-12));
    }

    #[test]
    fn test_mill() {
        let r = resolve(ctx(OperationType::Mill), 4.0, 0.5, 0.1).unwrap();
        assert!(close(r.a_m, 2.0, 1e-12));
        assert!(close(r.v_m, 0.2, 1e-12));

        let none = resolve(ctx(OperationType::Mill), 4.0, 0.5, 0.0).unwrap();
        assert_eq!(none, Removal::NONE);
    }

    #[test]
    fn test_equal_diameters_remove_nothing() {
        for op in OperationType::ALL {
            if op == OperationType::Mill {
                continue;
            }
            assert_eq!(resolve(ctx(op), 2.0, 1.0, 1.0).unwrap(), Removal::NONE, "{}", op);
        }
    }

    #[test]
    fn test_non_positive_inputs() {
        let turn = ctx(OperationType::Turn);
        assert!(resolve(turn, 0.0, 1.0, 0.8).is_err());
        assert!(resolve(turn, 2.0, -1.0, 0.8).is_err());
        assert!(resolve(turn, 2.0, 1.0, -0.1).is_err());
        assert!(resolve(turn, f64::NAN, 1.0, 0.8).is_err());
    }
}
