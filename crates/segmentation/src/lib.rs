//! Audience segmentation — typed rule criteria, the rule compiler, the
//! segment evaluator, the plain-English rule fallback and template message
//! suggestions.

pub mod builder;
pub mod compiler;
pub mod evaluator;
pub mod messages;
pub mod natural;
pub mod predicates;

pub use builder::RuleBuilder;
pub use compiler::{compile, RuleCompiler};
pub use evaluator::{SegmentEvaluator, SegmentPreview, MAX_PREVIEW};
pub use messages::{suggest_messages, MessageSuggestion};
pub use natural::parse_natural_language;
pub use predicates::Predicate;
