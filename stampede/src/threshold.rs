//! Threshold expressions and end-of-run evaluation.
use crate::aggregate::Snapshot;
use crate::error::Error;
use std::fmt;

/// A pass/fail predicate over one metric's aggregated distribution.
///
/// Expressions use the familiar k6 grammar: an aggregate selector (`p(95)`,
/// `avg`, `med`, `min`, `max`), a comparison operator (`<`, `<=`, `>`, `>=`)
/// and a numeric bound in the metric's native unit (milliseconds for
/// iteration durations). Parsing happens at configuration time; a malformed
/// expression refuses to start the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub metric: String,
    expr: String,
    aggregate: Aggregate,
    op: Op,
    bound: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Aggregate {
    Percentile(f64),
    Avg,
    Med,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Threshold {
    pub fn parse(metric: &str, expr: &str) -> Result<Self, Error> {
        let invalid = |reason: &str| Error::InvalidThreshold {
            metric: metric.to_string(),
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();

        // Two-character operators have to be probed first.
        let (op, op_idx, op_len) = if let Some(idx) = compact.find("<=") {
            (Op::Le, idx, 2)
        } else if let Some(idx) = compact.find(">=") {
            (Op::Ge, idx, 2)
        } else if let Some(idx) = compact.find('<') {
            (Op::Lt, idx, 1)
        } else if let Some(idx) = compact.find('>') {
            (Op::Gt, idx, 1)
        } else {
            return Err(invalid("expected one of `<`, `<=`, `>`, `>=`"));
        };

        let aggregate = match &compact[..op_idx] {
            "avg" => Aggregate::Avg,
            "med" => Aggregate::Med,
            "min" => Aggregate::Min,
            "max" => Aggregate::Max,
            selector => {
                let inner = selector
                    .strip_prefix("p(")
                    .and_then(|s| s.strip_suffix(')'))
                    .ok_or_else(|| invalid("unknown aggregate selector"))?;
                let pct: f64 = inner
                    .parse()
                    .map_err(|_| invalid("percentile is not a number"))?;
                if !(0. ..=100.).contains(&pct) {
                    return Err(invalid("percentile out of range 0..=100"));
                }
                Aggregate::Percentile(pct)
            }
        };

        let bound: f64 = compact[op_idx + op_len..]
            .parse()
            .map_err(|_| invalid("bound is not a number"))?;

        Ok(Self {
            metric: metric.to_string(),
            expr: expr.to_string(),
            aggregate,
            op,
            bound,
        })
    }

    /// Evaluate against a snapshot. Never panics: a threshold whose metric
    /// has no samples is indeterminate and reported as failed (fail-closed),
    /// with `observed` left empty.
    pub fn evaluate(&self, snapshot: &Snapshot) -> ThresholdOutcome {
        let observed = snapshot
            .get(&self.metric)
            .filter(|metric| metric.count > 0)
            .map(|metric| match self.aggregate {
                Aggregate::Percentile(pct) => metric.quantile(pct / 100.),
                Aggregate::Avg => metric.avg,
                Aggregate::Med => metric.quantile(0.5),
                Aggregate::Min => metric.min,
                Aggregate::Max => metric.max,
            });

        let passed = match observed {
            Some(value) => match self.op {
                Op::Lt => value < self.bound,
                Op::Le => value <= self.bound,
                Op::Gt => value > self.bound,
                Op::Ge => value >= self.bound,
            },
            None => false,
        };

        ThresholdOutcome {
            threshold: self.clone(),
            passed,
            observed,
        }
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.metric, self.expr)
    }
}

/// The verdict for a single threshold.
#[derive(Debug, Clone)]
pub struct ThresholdOutcome {
    pub threshold: Threshold,
    pub passed: bool,
    /// The aggregate value the predicate was compared against; `None` when
    /// the metric had no samples.
    pub observed: Option<f64>,
}

/// The outcome of a whole run: per-threshold verdicts plus the final
/// snapshot they were computed from.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub pass: bool,
    pub outcomes: Vec<ThresholdOutcome>,
    pub snapshot: Snapshot,
}

impl RunResult {
    /// Process exit status for this run: 0 when every threshold passed.
    pub fn exit_code(&self) -> i32 {
        if self.pass {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for RunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", if self.pass { "PASS" } else { "FAIL" })?;
        for outcome in &self.outcomes {
            let mark = if outcome.passed { "ok  " } else { "FAIL" };
            match outcome.observed {
                Some(value) => {
                    writeln!(f, "  [{mark}] {} (observed {value:.2})", outcome.threshold)?
                }
                None => writeln!(f, "  [{mark}] {} (no samples)", outcome.threshold)?,
            }
        }
        write!(f, "{}", self.snapshot)
    }
}

pub(crate) fn evaluate(thresholds: &[Threshold], snapshot: Snapshot) -> RunResult {
    let outcomes: Vec<_> = thresholds
        .iter()
        .map(|threshold| threshold.evaluate(&snapshot))
        .collect();

    RunResult {
        pass: outcomes.iter().all(|outcome| outcome.passed),
        outcomes,
        snapshot,
    }
}
