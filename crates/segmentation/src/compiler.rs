//! Rule compiler — ordered wire rules to a single customer predicate.
//!
//! Rules are lowered one by one into typed criteria, split into groups at
//! every `OR` connector and ANDed within a group. Groups are then joined
//! according to [`GroupJoin`]; the default joins them with AND as well, so
//! `A OR B` narrows the audience exactly like `A AND B` does. Clients have
//! been built against that behavior and it is kept unless the `any` join is
//! configured.
//!
//! The compiler never fails: unknown fields are skipped, unknown operators
//! fall back to the per-kind default and unparsable values degrade to zero.

use chrono::{DateTime, Utc};
use reach_core::config::GroupJoin;
use reach_core::types::{LogicalOperator, Rule};
use tracing::{debug, warn};

use crate::predicates::{
    Condition, Criterion, DateField, DaysOp, NumericField, NumericOp, Predicate, TextField, TextOp,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleCompiler {
    group_join: GroupJoin,
}

impl RuleCompiler {
    pub fn new(group_join: GroupJoin) -> Self {
        Self { group_join }
    }

    pub fn compile(&self, rules: &[Rule]) -> Predicate {
        self.compile_at(rules, Utc::now())
    }

    /// Compile against a fixed reference instant for relative-date rules.
    pub fn compile_at(&self, rules: &[Rule], now: DateTime<Utc>) -> Predicate {
        let mut groups: Vec<Vec<Condition>> = Vec::new();

        for rule in rules {
            let Some(criterion) = lower_rule(rule) else {
                continue;
            };
            let condition = criterion.bind(now);
            match groups.last_mut() {
                Some(current) if rule.logical_operator != Some(LogicalOperator::Or) => {
                    current.push(condition);
                }
                _ => groups.push(vec![condition]),
            }
        }

        let total: usize = groups.iter().map(Vec::len).sum();
        match total {
            0 => Predicate::MatchAll,
            1 => groups
                .pop()
                .and_then(|mut g| g.pop())
                .map(Predicate::Condition)
                .unwrap_or(Predicate::MatchAll),
            _ => {
                let groups: Vec<Predicate> = groups.into_iter().map(group_predicate).collect();
                match self.group_join {
                    GroupJoin::All => Predicate::All(groups),
                    GroupJoin::Any => Predicate::Any(groups),
                }
            }
        }
    }
}

/// Compile with the default (AND-of-groups) join.
pub fn compile(rules: &[Rule]) -> Predicate {
    RuleCompiler::default().compile(rules)
}

fn group_predicate(mut group: Vec<Condition>) -> Predicate {
    if group.len() == 1 {
        if let Some(only) = group.pop() {
            return Predicate::Condition(only);
        }
    }
    Predicate::All(group.into_iter().map(Predicate::Condition).collect())
}

/// Lower one wire rule into a typed criterion. `None` for unknown fields.
pub fn lower_rule(rule: &Rule) -> Option<Criterion> {
    let criterion = match rule.field.as_str() {
        "totalSpends" => Criterion::Numeric {
            field: NumericField::TotalSpends,
            op: numeric_op(rule),
            value: leading_float(&rule.value).unwrap_or(0.0),
        },
        "visits" => Criterion::Numeric {
            field: NumericField::Visits,
            op: numeric_op(rule),
            value: leading_int(&rule.value).unwrap_or(0) as f64,
        },
        "lastVisit" => Criterion::RelativeDate {
            field: DateField::LastVisit,
            op: days_op(rule),
            days: leading_int(&rule.value).unwrap_or(0),
        },
        "createdAt" => Criterion::RelativeDate {
            field: DateField::CreatedAt,
            op: days_op(rule),
            days: leading_int(&rule.value).unwrap_or(0),
        },
        "email" => Criterion::Text {
            field: TextField::Email,
            op: text_op(rule),
            value: rule.value.clone(),
        },
        "name" => Criterion::Text {
            field: TextField::Name,
            op: text_op(rule),
            value: rule.value.clone(),
        },
        other => {
            debug!(rule_id = rule.id, field = other, "Skipping rule with unknown field");
            return None;
        }
    };
    Some(criterion)
}

fn numeric_op(rule: &Rule) -> NumericOp {
    NumericOp::parse(&rule.operator).unwrap_or_else(|| {
        warn!(rule_id = rule.id, operator = %rule.operator, field = %rule.field, "Unknown numeric operator, using =");
        NumericOp::Equals
    })
}

fn days_op(rule: &Rule) -> DaysOp {
    DaysOp::parse(&rule.operator).unwrap_or_else(|| {
        warn!(rule_id = rule.id, operator = %rule.operator, field = %rule.field, "Unknown date operator, using on-or-before");
        DaysOp::AtLeast
    })
}

fn text_op(rule: &Rule) -> TextOp {
    TextOp::parse(&rule.operator).unwrap_or_else(|| {
        warn!(rule_id = rule.id, operator = %rule.operator, field = %rule.field, "Unknown text operator, using contains");
        TextOp::Contains
    })
}

/// Parse the longest numeric prefix (`"250rs"` → 250.0). Leading whitespace
/// is ignored; anything without a leading number is `None`.
pub fn leading_float(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if frac_end > frac_start || digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return None;
    }
    // Optional exponent, only when followed by digits.
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+') | Some(b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    s[..end].parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the leading integer (`"30 days"` → 30, `"12.9"` → 12).
pub fn leading_int(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end == digits_start {
        return None;
    }
    s[..end].parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicates::TimeBound;
    use chrono::Duration;
    use reach_core::types::Customer;

    fn rule(id: i64, field: &str, op: &str, value: &str, conn: Option<LogicalOperator>) -> Rule {
        Rule::new(id, field, op, value, conn)
    }

    fn and() -> Option<LogicalOperator> {
        Some(LogicalOperator::And)
    }

    fn or() -> Option<LogicalOperator> {
        Some(LogicalOperator::Or)
    }

    fn cond(p: &Predicate) -> &Condition {
        match p {
            Predicate::Condition(c) => c,
            other => panic!("expected bare condition, got {other:?}"),
        }
    }

    #[test]
    fn empty_rules_match_everything() {
        assert_eq!(compile(&[]), Predicate::MatchAll);
    }

    #[test]
    fn single_rule_is_unwrapped() {
        let p = compile(&[rule(1, "totalSpends", ">", "10000", None)]);
        assert_eq!(
            *cond(&p),
            Condition::Numeric {
                field: NumericField::TotalSpends,
                op: NumericOp::GreaterThan,
                value: 10000.0,
            }
        );
    }

    #[test]
    fn compiling_twice_is_deterministic() {
        let rules = vec![
            rule(1, "lastVisit", ">", "30", None),
            rule(2, "email", "contains", "gmail", and()),
            rule(3, "visits", "<=", "4", or()),
        ];
        let now = Utc::now();
        let compiler = RuleCompiler::default();
        assert_eq!(compiler.compile_at(&rules, now), compiler.compile_at(&rules, now));
    }

    #[test]
    fn or_opens_a_new_group_and_groups_are_anded() {
        let now = Utc::now();
        let rules = vec![
            rule(1, "totalSpends", ">", "100", None),
            rule(2, "visits", ">", "2", and()),
            rule(3, "name", "contains", "a", or()),
            rule(4, "email", "endsWith", ".io", and()),
        ];
        let p = RuleCompiler::default().compile_at(&rules, now);

        let expected = Predicate::All(vec![
            Predicate::All(vec![
                Predicate::Condition(lower_rule(&rules[0]).unwrap().bind(now)),
                Predicate::Condition(lower_rule(&rules[1]).unwrap().bind(now)),
            ]),
            Predicate::All(vec![
                Predicate::Condition(lower_rule(&rules[2]).unwrap().bind(now)),
                Predicate::Condition(lower_rule(&rules[3]).unwrap().bind(now)),
            ]),
        ]);
        assert_eq!(p, expected);
    }

    #[test]
    fn a_or_b_still_requires_both() {
        let rules = vec![
            rule(1, "totalSpends", ">", "1000", None),
            rule(2, "visits", ">", "10", or()),
        ];
        let p = compile(&rules);
        let mut c = Customer::new("Kiran", "kiran@x.io", Utc::now());
        c.total_spends = 5000.0;
        c.visits = 1;
        assert!(!p.matches(&c));
        c.visits = 11;
        assert!(p.matches(&c));

        let disjunctive = RuleCompiler::new(GroupJoin::Any).compile(&rules);
        c.visits = 1;
        assert!(disjunctive.matches(&c));
    }

    #[test]
    fn two_anded_rules_keep_single_group_wrapper() {
        let now = Utc::now();
        let rules = vec![
            rule(1, "visits", ">", "1", None),
            rule(2, "visits", "<", "9", and()),
        ];
        match RuleCompiler::default().compile_at(&rules, now) {
            Predicate::All(groups) => {
                assert_eq!(groups.len(), 1);
                assert!(matches!(&groups[0], Predicate::All(inner) if inner.len() == 2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_fields_are_skipped() {
        let rules = vec![
            rule(1, "favouriteColour", "=", "teal", None),
            rule(2, "visits", ">=", "3", and()),
        ];
        let p = compile(&rules);
        assert_eq!(p.condition_count(), 1);
        assert!(matches!(p, Predicate::Condition(_)));
        assert_eq!(compile(&[rule(1, "phone", "=", "1", None)]), Predicate::MatchAll);
    }

    #[test]
    fn malformed_values_degrade_to_zero_and_now() {
        let now = Utc::now();
        let p = RuleCompiler::default().compile_at(&[rule(1, "totalSpends", ">", "lots", None)], now);
        assert!(matches!(cond(&p), Condition::Numeric { value, .. } if *value == 0.0));

        let p = RuleCompiler::default().compile_at(&[rule(1, "lastVisit", ">", "", None)], now);
        assert_eq!(
            *cond(&p),
            Condition::Timestamp {
                field: DateField::LastVisit,
                bound: TimeBound::Before(now),
            }
        );
    }

    #[test]
    fn unknown_operators_use_kind_defaults() {
        let now = Utc::now();
        let c = RuleCompiler::default();
        let p = c.compile_at(&[rule(1, "visits", "~", "4", None)], now);
        assert!(matches!(cond(&p), Condition::Numeric { op: NumericOp::Equals, .. }));

        let p = c.compile_at(&[rule(1, "createdAt", "!=", "10", None)], now);
        assert_eq!(
            *cond(&p),
            Condition::Timestamp {
                field: DateField::CreatedAt,
                bound: TimeBound::OnOrBefore(now - Duration::days(10)),
            }
        );

        let p = c.compile_at(&[rule(1, "name", "like", "ann", None)], now);
        assert!(matches!(cond(&p), Condition::Text { op: TextOp::Contains, .. }));
    }

    #[test]
    fn spend_threshold_matches_strictly_above() {
        let p = compile(&[rule(1, "totalSpends", ">", "10000", None)]);
        let mut c = Customer::new("A", "a@x.io", Utc::now());
        c.total_spends = 10000.0;
        assert!(!p.matches(&c));
        c.total_spends = 10001.0;
        assert!(p.matches(&c));
    }

    #[test]
    fn inactive_for_thirty_days() {
        let p = compile(&[rule(1, "lastVisit", ">", "30", None)]);
        let mut c = Customer::new("A", "a@x.io", Utc::now() - Duration::days(90));
        c.last_visit = Utc::now() - Duration::days(31);
        assert!(p.matches(&c));
        c.last_visit = Utc::now() - Duration::days(29);
        assert!(!p.matches(&c));
    }

    #[test]
    fn lenient_number_prefixes() {
        assert_eq!(leading_float("250rs"), Some(250.0));
        assert_eq!(leading_float("  -1.5e2x"), Some(-150.0));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("abc"), None);
        assert_eq!(leading_float("."), None);
        assert_eq!(leading_int("30 days"), Some(30));
        assert_eq!(leading_int("12.9"), Some(12));
        assert_eq!(leading_int("-"), None);
    }
}
