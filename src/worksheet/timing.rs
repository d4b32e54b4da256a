//! Machining time per pass

use super::*;
use uom::si::f64::Time;
use uom::si::time::{minute, second};

/// The four worksheet times, in minutes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PassTimes {
    pub t_mp: f64,      // power-limited
    pub t_mc: f64,      // recommended, from V_f
    pub t_m: f64,       // corrected for tool wear
    pub t_m_prime: f64, // corrected for wear and extra travel
}

impl PassTimes {
    pub const ZERO: PassTimes = PassTimes {
        t_mp: 0.0,
        t_mc: 0.0,
        t_m: 0.0,
        t_m_prime: 0.0,
    };

    /// Requested surface rate needs more time than the power ceiling allows
    pub fn exceeds_power_limit(&self) -> bool {
        self.t_mc > self.t_mp
    }
}

/// t_mp = 60·p_s·V_m / P_m
pub fn power_limited_time(
    context: PassContext,
    p_s: f64,
    v_m: f64,
    p_m: f64,
) -> Result<f64, WorksheetError> {
    let p_s = non_negative(context, "p_s", p_s)?;
    let p_m = non_negative(context, "p_m", p_m)?;
    if p_m == 0.0 {
        return Err(WorksheetError::DivisionByZero {
            context,
            field: "p_m",
        });
    }
    Ok(60.0 * p_s * v_m / p_m)
}

/// t_mc = 60·A_m / V_f
pub fn recommended_time(context: PassContext, a_m: f64, v_f: f64) -> Result<f64, WorksheetError> {
    let v_f = non_negative(context, "v_f", v_f)?;
    if v_f == 0.0 {
        return Err(WorksheetError::DivisionByZero {
            context,
            field: "v_f",
        });
    }
    Ok(60.0 * a_m / v_f)
}

/// t_m = t_mc·(1 + n)
pub fn wear_corrected_time(t_mc: f64, n: f64) -> f64 {
    t_mc * (1.0 + n)
}

/// Travel allowance converted from seconds to worksheet minutes
pub fn travel_allowance(operation: OperationType, seconds: f64) -> f64 {
    if operation.adds_travel() {
        Time::new::<second>(seconds).get::<minute>()
    } else {
        0.0
    }
}

/// Derive all four times for a pass.
///
/// `t_mc` always drives the corrected times; `t_mp` is reported alongside
/// as a ceiling check only.
pub fn compute_times(
    context: PassContext,
    removal: &Removal,
    input: &OperationInput,
    travel_seconds: f64,
) -> Result<PassTimes, WorksheetError> {
    let t_mp = power_limited_time(context, input.p_s, removal.v_m, input.p_m)?;
    let t_mc = recommended_time(context, removal.a_m, input.v_f)?;
    let n = non_negative(context, "n", input.n)?;

    if removal.is_zero() {
        return Ok(PassTimes::ZERO);
    }

    let t_m = wear_corrected_time(t_mc, n);
    let t_m_prime = t_m + travel_allowance(context.operation, travel_seconds);

    Ok(PassTimes {
        t_mp,
        t_mc,
        t_m,
        t_m_prime,
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{close, turn_input};
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> PassContext {
        PassContext::new(OperationType::Turn, Pass::Rough)
    }

    #[test]
    fn test_recommended_time_inverse_in_rate() {
        let slow = recommended_time(ctx(), 5.0, 25.0).unwrap();
        let fast = recommended_time(ctx(), 5.0, 50.0).unwrap();
        assert!(close(slow, 2.0 * fast, 1e-12));
    }

    #[test]
    fn test_no_wear_means_no_correction() {
        assert_eq!(wear_corrected_time(6.0319, 0.0), 6.0319);
        assert!(close(wear_corrected_time(10.0, 0.25), 12.5, 1e-12));
    }

    #[test]
    fn test_travel_allowance_per_operation() {
        for op in OperationType::ALL {
            let extra = travel_allowance(op, TRAVEL_ALLOWANCE_SECONDS);
            match op {
                OperationType::Turn
                | OperationType::Face
                | OperationType::Bore
                | OperationType::Cutoff => assert!(close(extra, 0.09, 1e-12), "{}", op),
                _ => assert_eq!(extra, 0.0, "{}", op),
            }
        }
    }

    #[test]
    fn test_travel_added_to_wear_time() {
        let input = turn_input();
        let removal = geometry::resolve(ctx(), input.l_w, input.d_a, input.d_b).unwrap();
        let times = compute_times(ctx(), &removal, &input, TRAVEL_ALLOWANCE_SECONDS).unwrap();
        assert!(close(times.t_m_prime - times.t_m, 5.4 / 60.0, 1e-12));

        let thread = PassContext::new(OperationType::Thread, Pass::Rough);
        let times = compute_times(thread, &removal, &input, TRAVEL_ALLOWANCE_SECONDS).unwrap();
        assert_eq!(times.t_m_prime, times.t_m);
    }

    #[test]
    fn test_zero_denominators() {
        assert_eq!(
            power_limited_time(ctx(), 1.0, 0.3, 0.0),
            Err(WorksheetError::DivisionByZero {
                context: ctx(),
                field: "p_m"
            })
        );
        assert_eq!(
            recommended_time(ctx(), 5.0, 0.0),
            Err(WorksheetError::DivisionByZero {
                context: ctx(),
                field: "v_f"
            })
        );
        assert!(matches!(
            recommended_time(ctx(), 5.0, -1.0),
            Err(WorksheetError::InvalidParameter { field: "v_f", .. })
        ));
    }

    #[test]
    fn test_power_ceiling() {
        let times = PassTimes {
            t_mp: 2.0,
            t_mc: 3.0,
            t_m: 3.3,
            t_m_prime: 3.39,
        };
        assert!(times.exceeds_power_limit());
        assert!(!PassTimes::ZERO.exceeds_power_limit());
    }
}
