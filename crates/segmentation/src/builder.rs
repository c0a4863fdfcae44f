//! Rule builder — fluent API for assembling wire rule lists.
//!
//! Keeps the connector invariant for free: the first rule gets no
//! connector, every later one gets `AND` or `OR`. Ids count from 1.

use reach_core::types::{LogicalOperator, Rule};

use crate::predicates::{DaysOp, NumericOp, TextOp};

pub struct RuleBuilder {
    rules: Vec<Rule>,
    next_connector: LogicalOperator,
}

impl RuleBuilder {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            next_connector: LogicalOperator::And,
        }
    }

    /// Join the next rule with `OR`.
    pub fn or(mut self) -> Self {
        self.next_connector = LogicalOperator::Or;
        self
    }

    /// Join the next rule with `AND` (the default).
    pub fn and(mut self) -> Self {
        self.next_connector = LogicalOperator::And;
        self
    }

    pub fn total_spends(self, op: NumericOp, value: f64) -> Self {
        self.push("totalSpends", numeric_symbol(op), format_number(value))
    }

    pub fn visits(self, op: NumericOp, value: u64) -> Self {
        self.push("visits", numeric_symbol(op), value.to_string())
    }

    pub fn last_visit_days(self, op: DaysOp, days: i64) -> Self {
        self.push("lastVisit", days_symbol(op), days.to_string())
    }

    pub fn created_days(self, op: DaysOp, days: i64) -> Self {
        self.push("createdAt", days_symbol(op), days.to_string())
    }

    pub fn email(self, op: TextOp, value: impl Into<String>) -> Self {
        self.push("email", text_name(op), value.into())
    }

    pub fn name(self, op: TextOp, value: impl Into<String>) -> Self {
        self.push("name", text_name(op), value.into())
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn build(self) -> Vec<Rule> {
        self.rules
    }

    fn push(mut self, field: &str, operator: &str, value: String) -> Self {
        let connector = if self.rules.is_empty() {
            None
        } else {
            Some(self.next_connector)
        };
        let id = self.rules.len() as i64 + 1;
        self.rules.push(Rule::new(id, field, operator, value, connector));
        self.next_connector = LogicalOperator::And;
        self
    }
}

impl Default for RuleBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

pub fn numeric_symbol(op: NumericOp) -> &'static str {
    match op {
        NumericOp::GreaterThan => ">",
        NumericOp::LessThan => "<",
        NumericOp::GreaterThanOrEqual => ">=",
        NumericOp::LessThanOrEqual => "<=",
        NumericOp::Equals => "=",
        NumericOp::NotEquals => "!=",
    }
}

pub fn days_symbol(op: DaysOp) -> &'static str {
    match op {
        DaysOp::MoreThan => ">",
        DaysOp::LessThan => "<",
        DaysOp::AtLeast => ">=",
        DaysOp::AtMost => "<=",
        DaysOp::Exactly => "=",
    }
}

pub fn text_name(op: TextOp) -> &'static str {
    match op {
        TextOp::Contains => "contains",
        TextOp::Equals => "equals",
        TextOp::StartsWith => "startsWith",
        TextOp::EndsWith => "endsWith",
        TextOp::NotContains => "notContains",
    }
}
