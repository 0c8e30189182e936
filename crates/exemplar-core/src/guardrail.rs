//! Pass/fail/warn thresholds applied to fidelity metrics.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ExemplarError, Result};

pub const DEFAULT_MEAN_DIFF_THRESHOLD_M: f64 = 50.0;
pub const DEFAULT_INTERIOR_DIFF_THRESHOLD_M: f64 = 100.0;
pub const DEFAULT_SPIKE_WARNING_THRESHOLD_M: f64 = 750.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardrailThresholds {
    /// Limit on `|mean difference|`.
    pub mean_diff_m: f64,
    /// Limit on the interior max absolute difference.
    pub interior_diff_m: f64,
    /// Max absolute difference above which a spike warning is raised.
    pub spike_warning_m: f64,
}

impl Default for GuardrailThresholds {
    fn default() -> Self {
        Self {
            mean_diff_m: DEFAULT_MEAN_DIFF_THRESHOLD_M,
            interior_diff_m: DEFAULT_INTERIOR_DIFF_THRESHOLD_M,
            spike_warning_m: DEFAULT_SPIKE_WARNING_THRESHOLD_M,
        }
    }
}

impl GuardrailThresholds {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("mean diff threshold", self.mean_diff_m),
            ("interior diff threshold", self.interior_diff_m),
            ("spike warning threshold", self.spike_warning_m),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(ExemplarError::Configuration(format!(
                    "{name} must be a finite non-negative number, got {v}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
    Warn,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Pass => "PASS",
            Verdict::Fail => "FAIL",
            Verdict::Warn => "WARN",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailKind {
    MeanDiff,
    InteriorDiff,
    SpikeWarning,
}

impl GuardrailKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::MeanDiff => "|mean_diff_m|",
            Self::InteriorDiff => "interior max_abs_diff_m",
            Self::SpikeWarning => "spike max_abs_diff_m",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardrailCheck {
    pub kind: GuardrailKind,
    pub value: f64,
    pub threshold: f64,
    pub verdict: Verdict,
}

impl fmt::Display for GuardrailCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let relation = if self.verdict == Verdict::Pass {
            "within"
        } else {
            "exceeds"
        };
        write!(
            f,
            "[{}] {}={:.3} {relation} {:.3}",
            self.verdict,
            self.kind.label(),
            self.value,
            self.threshold
        )
    }
}

/// Evaluate all three guardrails. A value equal to its threshold passes; a
/// NaN value (nothing scored) never trips a check.
pub fn evaluate(mean_diff: f64, max_abs_diff: f64, thresholds: &GuardrailThresholds) -> Vec<GuardrailCheck> {
    let exceeds = |value: f64, limit: f64| value > limit;
    let abs_mean = mean_diff.abs();
    vec![
        GuardrailCheck {
            kind: GuardrailKind::MeanDiff,
            value: abs_mean,
            threshold: thresholds.mean_diff_m,
            verdict: if exceeds(abs_mean, thresholds.mean_diff_m) {
                Verdict::Fail
            } else {
                Verdict::Pass
            },
        },
        GuardrailCheck {
            kind: GuardrailKind::InteriorDiff,
            value: max_abs_diff,
            threshold: thresholds.interior_diff_m,
            verdict: if exceeds(max_abs_diff, thresholds.interior_diff_m) {
                Verdict::Fail
            } else {
                Verdict::Pass
            },
        },
        GuardrailCheck {
            kind: GuardrailKind::SpikeWarning,
            value: max_abs_diff,
            threshold: thresholds.spike_warning_m,
            verdict: if exceeds(max_abs_diff, thresholds.spike_warning_m) {
                Verdict::Warn
            } else {
                Verdict::Pass
            },
        },
    ]
}

pub fn any_failed(checks: &[GuardrailCheck]) -> bool {
    checks.iter().any(|c| c.verdict == Verdict::Fail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdicts(checks: &[GuardrailCheck]) -> Vec<Verdict> {
        checks.iter().map(|c| c.verdict).collect()
    }

    #[test]
    fn exactly_at_threshold_passes() {
        let t = GuardrailThresholds::default();
        let checks = evaluate(-50.0, 100.0, &t);
        assert_eq!(verdicts(&checks), vec![Verdict::Pass; 3]);
        assert!(!any_failed(&checks));
    }

    #[test]
    fn checks_are_independent() {
        let t = GuardrailThresholds::default();
        let checks = evaluate(10.0, 800.0, &t);
        assert_eq!(verdicts(&checks), vec![Verdict::Pass, Verdict::Fail, Verdict::Warn]);

        let checks = evaluate(-60.0, 20.0, &t);
        assert_eq!(verdicts(&checks), vec![Verdict::Fail, Verdict::Pass, Verdict::Pass]);
    }

    #[test]
    fn spike_only_warns() {
        let t = GuardrailThresholds {
            mean_diff_m: 1e9,
            interior_diff_m: 1e9,
            spike_warning_m: 1.0,
        };
        let checks = evaluate(0.0, 5.0, &t);
        assert!(!any_failed(&checks));
        assert_eq!(checks[2].verdict, Verdict::Warn);
        assert!(checks[2].to_string().starts_with("[WARN]"));
    }

    #[test]
    fn negative_or_nan_thresholds_are_rejected() {
        let mut t = GuardrailThresholds::default();
        assert!(t.validate().is_ok());
        t.spike_warning_m = -1.0;
        assert!(t.validate().is_err());
        t.spike_warning_m = f64::NAN;
        assert!(t.validate().is_err());
    }
}
