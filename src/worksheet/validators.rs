//! Non-fatal checks attached to pass results

use super::*;

/// Issue found while computing a pass. Never stops the calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.code, self.message)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

/// Pass with matching start and target removes nothing
pub fn zero_removal(context: PassContext, d_a: f64, d_b: f64) -> ValidationIssue {
    let message = match context.operation.family() {
        OperationFamily::Milling => format!("{} pass has zero depth of cut", context),
        _ => format!(
            "{} pass starts and ends at {:.4}\"; nothing is removed",
            context, d_a
        ),
    };
    ValidationIssue {
        severity: Severity::Warning,
        code: "ZERO_REMOVAL".to_string(),
        message,
        suggestion: Some(format!(
            "Check d_a ({:.4}) and d_b ({:.4}) for this pass",
            d_a, d_b
        )),
    }
}

/// Recommended time above the power-limited time means the requested
/// surface rate asks for more power than the machine has
pub fn check_power_ceiling(context: PassContext, times: &PassTimes) -> Option<ValidationIssue> {
    if !times.exceeds_power_limit() {
        return None;
    }
    Some(ValidationIssue {
        severity: Severity::Warning,
        code: "POWER_LIMITED".to_string(),
        message: format!(
            "{} pass: recommended time {:.3} min exceeds power-limited time {:.3} min",
            context, times.t_mc, times.t_mp
        ),
        suggestion: Some("Raise available power or lower the surface generation rate".to_string()),
    })
}

/// Wear exponents of 1 or more are outside the usual tooling range
pub fn check_wear_exponent(context: PassContext, n: f64) -> Option<ValidationIssue> {
    if n < 1.0 {
        return None;
    }
    Some(ValidationIssue {
        severity: Severity::Warning,
        code: "WEAR_EXPONENT_HIGH".to_string(),
        message: format!("{} pass: tool wear exponent n = {} is not below 1", context, n),
        suggestion: Some("Typical values are 0.1 to 0.4".to_string()),
    })
}

/// Finish pass start diameter replaced by the rough pass target
pub fn inherited_diameter(context: PassContext, given: f64, inherited: f64) -> ValidationIssue {
    ValidationIssue {
        severity: Severity::Info,
        code: "INHERITED_DIAMETER".to_string(),
        message: format!(
            "{} pass starts at rough diameter {:.4}\" instead of {:.4}\"",
            context, inherited, given
        ),
        suggestion: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx() -> PassContext {
        PassContext::new(OperationType::Turn, Pass::Rough)
    }

    #[test]
    fn test_power_ceiling_only_when_exceeded() {
        let ok = PassTimes {
            t_mp: 17.0,
            t_mc: 6.0,
            t_m: 6.6,
            t_m_prime: 6.69,
        };
        assert_eq!(check_power_ceiling(ctx(), &ok), None);

        let over = PassTimes { t_mc: 20.0, ..ok };
        let issue = check_power_ceiling(ctx(), &over).unwrap();
        assert_eq!(issue.code, "POWER_LIMITED");
        assert_eq!(issue.severity, Severity::Warning);
    }

    #[test]
    fn test_wear_exponent_range() {
        assert!(check_wear_exponent(ctx(), 0.2).is_none());
        assert!(check_wear_exponent(ctx(), 0.0).is_none());
        assert!(check_wear_exponent(ctx(), 1.0).is_some());
    }

    #[test]
    fn test_issue_display() {
        let issue = zero_removal(ctx(), 1.0, 1.0);
        assert_eq!(
            issue.to_string(),
            "[WARNING] ZERO_REMOVAL: Rough turn pass starts and ends at 1.0000\"; nothing is removed \
             (Check d_a (1.0000) and d_b (1.0000) for this pass)"
        );
    }
}
