//! Typed audience criteria and the compiled predicate they evaluate to.
//!
//! Every customer field belongs to exactly one kind (numeric, relative date,
//! text) and each kind carries its own closed operator set, so a criterion
//! such as "email > 5" cannot be built through this API.

use chrono::{DateTime, Duration, Utc};
use reach_core::types::Customer;

// ─── Fields ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericField {
    TotalSpends,
    Visits,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateField {
    LastVisit,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Email,
    Name,
}

impl NumericField {
    fn read(self, customer: &Customer) -> f64 {
        match self {
            NumericField::TotalSpends => customer.total_spends,
            NumericField::Visits => customer.visits as f64,
        }
    }
}

impl DateField {
    fn read(self, customer: &Customer) -> DateTime<Utc> {
        match self {
            DateField::LastVisit => customer.last_visit,
            DateField::CreatedAt => customer.created_at,
        }
    }
}

impl TextField {
    fn read(self, customer: &Customer) -> &str {
        match self {
            TextField::Email => &customer.email,
            TextField::Name => &customer.name,
        }
    }
}

// ─── Operators ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericOp {
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Equals,
    NotEquals,
}

/// Operators on "days ago" values. `MoreThan(30)` means the event happened
/// more than 30 days in the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaysOp {
    MoreThan,
    LessThan,
    AtLeast,
    AtMost,
    Exactly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextOp {
    Contains,
    Equals,
    StartsWith,
    EndsWith,
    NotContains,
}

impl NumericOp {
    pub fn parse(symbol: &str) -> Option<Self> {
        Some(match symbol {
            ">" => NumericOp::GreaterThan,
            "<" => NumericOp::LessThan,
            ">=" => NumericOp::GreaterThanOrEqual,
            "<=" => NumericOp::LessThanOrEqual,
            "=" => NumericOp::Equals,
            "!=" => NumericOp::NotEquals,
            _ => return None,
        })
    }
}

impl DaysOp {
    pub fn parse(symbol: &str) -> Option<Self> {
        Some(match symbol {
            ">" => DaysOp::MoreThan,
            "<" => DaysOp::LessThan,
            ">=" => DaysOp::AtLeast,
            "<=" => DaysOp::AtMost,
            "=" => DaysOp::Exactly,
            _ => return None,
        })
    }
}

impl TextOp {
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "contains" => TextOp::Contains,
            "equals" => TextOp::Equals,
            "startsWith" => TextOp::StartsWith,
            "endsWith" => TextOp::EndsWith,
            "notContains" => TextOp::NotContains,
            _ => return None,
        })
    }
}

// ─── Criteria ──────────────────────────────────────────────────────────────

/// One field/operator/value triple, independent of any clock.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    Numeric {
        field: NumericField,
        op: NumericOp,
        value: f64,
    },
    RelativeDate {
        field: DateField,
        op: DaysOp,
        days: i64,
    },
    Text {
        field: TextField,
        op: TextOp,
        value: String,
    },
}

impl Criterion {
    /// Resolve relative dates against `now`, yielding a concrete condition.
    ///
    /// The days operators flip when turned into timestamp bounds: "more than
    /// N days ago" is a timestamp *before* `now - N days`.
    pub fn bind(&self, now: DateTime<Utc>) -> Condition {
        match self {
            Criterion::Numeric { field, op, value } => Condition::Numeric {
                field: *field,
                op: *op,
                value: *value,
            },
            Criterion::RelativeDate { field, op, days } => {
                let threshold = days_before(now, *days);
                let bound = match op {
                    DaysOp::MoreThan => TimeBound::Before(threshold),
                    DaysOp::LessThan => TimeBound::After(threshold),
                    DaysOp::AtLeast => TimeBound::OnOrBefore(threshold),
                    DaysOp::AtMost => TimeBound::OnOrAfter(threshold),
                    DaysOp::Exactly => TimeBound::Between {
                        from: threshold
                            .checked_sub_signed(Duration::days(1))
                            .unwrap_or(threshold),
                        to: threshold
                            .checked_add_signed(Duration::days(1))
                            .unwrap_or(threshold),
                    },
                };
                Condition::Timestamp {
                    field: *field,
                    bound,
                }
            }
            Criterion::Text { field, op, value } => Condition::Text {
                field: *field,
                op: *op,
                value: value.clone(),
            },
        }
    }
}

/// `now - days`, saturating to `now` when the offset is out of range.
fn days_before(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    Duration::try_days(days)
        .and_then(|d| now.checked_sub_signed(d))
        .unwrap_or(now)
}

// ─── Compiled predicate ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    Before(DateTime<Utc>),
    After(DateTime<Utc>),
    OnOrBefore(DateTime<Utc>),
    OnOrAfter(DateTime<Utc>),
    /// Inclusive on both ends.
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl TimeBound {
    fn admits(&self, at: DateTime<Utc>) -> bool {
        match *self {
            TimeBound::Before(t) => at < t,
            TimeBound::After(t) => at > t,
            TimeBound::OnOrBefore(t) => at <= t,
            TimeBound::OnOrAfter(t) => at >= t,
            TimeBound::Between { from, to } => at >= from && at <= to,
        }
    }
}

/// Single-field condition over a customer record.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Numeric {
        field: NumericField,
        op: NumericOp,
        value: f64,
    },
    Timestamp {
        field: DateField,
        bound: TimeBound,
    },
    Text {
        field: TextField,
        op: TextOp,
        value: String,
    },
}

impl Condition {
    pub fn matches(&self, customer: &Customer) -> bool {
        match self {
            Condition::Numeric { field, op, value } => {
                compare_numbers(field.read(customer), *op, *value)
            }
            Condition::Timestamp { field, bound } => bound.admits(field.read(customer)),
            Condition::Text { field, op, value } => compare_text(field.read(customer), *op, value),
        }
    }
}

/// Boolean expression over one customer.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// No rules: every customer qualifies.
    MatchAll,
    Condition(Condition),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn matches(&self, customer: &Customer) -> bool {
        match self {
            Predicate::MatchAll => true,
            Predicate::Condition(c) => c.matches(customer),
            Predicate::All(parts) => parts.iter().all(|p| p.matches(customer)),
            Predicate::Any(parts) => parts.iter().any(|p| p.matches(customer)),
        }
    }

    /// Number of leaf conditions in the tree.
    pub fn condition_count(&self) -> usize {
        match self {
            Predicate::MatchAll => 0,
            Predicate::Condition(_) => 1,
            Predicate::All(parts) | Predicate::Any(parts) => {
                parts.iter().map(Predicate::condition_count).sum()
            }
        }
    }
}

pub fn compare_numbers(actual: f64, op: NumericOp, expected: f64) -> bool {
    match op {
        NumericOp::GreaterThan => actual > expected,
        NumericOp::LessThan => actual < expected,
        NumericOp::GreaterThanOrEqual => actual >= expected,
        NumericOp::LessThanOrEqual => actual <= expected,
        NumericOp::Equals => actual == expected,
        NumericOp::NotEquals => actual != expected,
    }
}

/// Everything except `Equals` ignores case.
pub fn compare_text(actual: &str, op: TextOp, expected: &str) -> bool {
    let (folded, needle) = (actual.to_lowercase(), expected.to_lowercase());
    match op {
        TextOp::Equals => actual == expected,
        TextOp::Contains => folded.contains(&needle),
        TextOp::NotContains => !folded.contains(&needle),
        TextOp::StartsWith => folded.starts_with(&needle),
        TextOp::EndsWith => folded.ends_with(&needle),
    }
}
