//! Plain-English audience descriptions to rules via a fixed pattern table.
//!
//! This is the offline path used when no language-model service is wired
//! in. Every pattern that matches contributes one rule, in table order.
//! Rules after the first are joined with `OR` when the text contains the
//! word "or", otherwise with `AND`.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use reach_core::types::Rule;
use tracing::debug;

use crate::builder::RuleBuilder;
use crate::predicates::{DaysOp, NumericOp, TextOp};

#[derive(Debug, Clone, Copy)]
enum Target {
    Spends(NumericOp),
    Visits(NumericOp),
    LastVisit(DaysOp),
    Created(DaysOp),
    Email(TextOp),
    Name(TextOp),
}

#[derive(Debug, Clone, Copy)]
enum Extract {
    /// First capture group as a count.
    Number,
    /// First capture group in months, converted to days.
    Months,
    Fixed(u64),
    /// First capture group verbatim.
    Text,
    FixedText(&'static str),
}

struct Pattern {
    regex: Regex,
    target: Target,
    extract: Extract,
}

enum Value {
    Number(u64),
    Text(String),
}

fn pattern(re: &str, target: Target, extract: Extract) -> Pattern {
    Pattern {
        regex: Regex::new(re).expect("static pattern compiles"),
        target,
        extract,
    }
}

lazy_static! {
    static ref PATTERNS: Vec<Pattern> = vec![
        // Spending
        pattern(r"(?i)spent?\s+(?:more than|over|above|greater than|>)\s*₹?(\d+)", Target::Spends(NumericOp::GreaterThan), Extract::Number),
        pattern(r"(?i)spent?\s+(?:less than|under|below|smaller than|<)\s*₹?(\d+)", Target::Spends(NumericOp::LessThan), Extract::Number),
        pattern(r"(?i)spent?\s+(?:exactly|equal to|=)\s*₹?(\d+)", Target::Spends(NumericOp::Equals), Extract::Number),
        pattern(r"(?i)(?:high value|premium|vip)\s+customers?", Target::Spends(NumericOp::GreaterThan), Extract::Fixed(15000)),
        pattern(r"(?i)(?:low value|budget|economy)\s+customers?", Target::Spends(NumericOp::LessThan), Extract::Fixed(5000)),
        // Visits
        pattern(r"(?i)(?:visited|shopped|ordered)\s+(?:more than|over|above|>)\s*(\d+)", Target::Visits(NumericOp::GreaterThan), Extract::Number),
        pattern(r"(?i)(?:visited|shopped|ordered)\s+(?:less than|under|below|<)\s*(\d+)", Target::Visits(NumericOp::LessThan), Extract::Number),
        pattern(r"(?i)(?:frequent|loyal|regular)\s+(?:customers?|shoppers?)", Target::Visits(NumericOp::GreaterThan), Extract::Fixed(5)),
        // Inactivity
        pattern(r"(?i)(?:haven't|have not|no).*(?:visited|shopped|bought).*(?:in|for|since)\s*(\d+)\s*days?", Target::LastVisit(DaysOp::MoreThan), Extract::Number),
        pattern(r"(?i)(?:haven't|have not|no).*(?:visited|shopped|bought).*(?:in|for|since)\s*(\d+)\s*months?", Target::LastVisit(DaysOp::MoreThan), Extract::Months),
        pattern(r"(?i)(?:inactive|dormant).*(?:for|since)\s*(\d+)\s*days?", Target::LastVisit(DaysOp::MoreThan), Extract::Number),
        pattern(r"(?i)(?:inactive|dormant).*(?:for|since)\s*(\d+)\s*months?", Target::LastVisit(DaysOp::MoreThan), Extract::Months),
        // Recently joined
        pattern(r"(?i)(?:new|recent)\s+customers?", Target::Created(DaysOp::LessThan), Extract::Fixed(30)),
        pattern(r"(?i)customers?\s+(?:joined|registered|signed up)\s+(?:in|within)\s*(?:last\s*)?(\d+)\s*days?", Target::Created(DaysOp::LessThan), Extract::Number),
        pattern(r"(?i)customers?\s+(?:joined|registered|signed up)\s+(?:in|within)\s*(?:last\s*)?(\d+)\s*months?", Target::Created(DaysOp::LessThan), Extract::Months),
        // Email
        pattern(r"(?i)gmail\s+(?:users?|customers?)", Target::Email(TextOp::Contains), Extract::FixedText("gmail.com")),
        pattern(r#"(?i)email.*contains?\s*['"“”]([^'"“”]+)['"“”]?"#, Target::Email(TextOp::Contains), Extract::Text),
        // Name
        pattern(r#"(?i)(?:customers?|users?)\s+(?:named|called)\s+['"“”]([^'"“”]+)['"“”]?"#, Target::Name(TextOp::Contains), Extract::Text),
    ];
    static ref OR_WORD: Regex = Regex::new(r"(?i)\bor\b").expect("static pattern compiles");
}

/// Turn free text into rules. Never empty: with no match the result is the
/// catch-all `totalSpends > 0`.
pub fn parse_natural_language(text: &str) -> Vec<Rule> {
    let join_with_or = OR_WORD.is_match(text);
    let mut builder = RuleBuilder::new();

    for p in PATTERNS.iter() {
        let Some(caps) = p.regex.captures(text) else {
            continue;
        };
        let Some(value) = extract(&caps, p.extract) else {
            continue;
        };
        if join_with_or {
            builder = builder.or();
        }
        builder = apply(builder, p.target, value);
    }

    if builder.is_empty() {
        debug!("No audience pattern matched, using catch-all rule");
        return RuleBuilder::new()
            .total_spends(NumericOp::GreaterThan, 0.0)
            .build();
    }
    let rules = builder.build();
    debug!(rules = rules.len(), or = join_with_or, "Parsed audience description");
    rules
}

fn extract(caps: &Captures<'_>, how: Extract) -> Option<Value> {
    let captured = || caps.get(1).map(|m| m.as_str());
    Some(match how {
        Extract::Number => Value::Number(captured()?.parse().ok()?),
        Extract::Months => Value::Number(captured()?.parse::<u64>().ok()?.checked_mul(30)?),
        Extract::Fixed(n) => Value::Number(n),
        Extract::Text => Value::Text(captured()?.trim().to_string()),
        Extract::FixedText(s) => Value::Text(s.to_string()),
    })
}

fn apply(builder: RuleBuilder, target: Target, value: Value) -> RuleBuilder {
    match (target, value) {
        (Target::Spends(op), Value::Number(n)) => builder.total_spends(op, n as f64),
        (Target::Visits(op), Value::Number(n)) => builder.visits(op, n),
        (Target::LastVisit(op), Value::Number(n)) => builder.last_visit_days(op, n as i64),
        (Target::Created(op), Value::Number(n)) => builder.created_days(op, n as i64),
        (Target::Email(op), Value::Text(s)) => builder.email(op, s),
        (Target::Name(op), Value::Text(s)) => builder.name(op, s),
        // The table never pairs a text extractor with a numeric field.
        (_, _) => builder,
    }
}
