//! Template message suggestions for an audience, picked from what its rules
//! say about the segment.
//!
//! Each recognised segment contributes three variants in a fixed order
//! (VIP, win-back, frequent, new); only the first three suggestions are
//! returned. Rules that describe none of them get the general set.

use reach_core::types::Rule;
use serde::Serialize;

/// One suggested message. Bodies carry the `{name}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageSuggestion {
    pub message: &'static str,
    pub variant: &'static str,
    pub focus: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Vip,
    WinBack,
    Frequent,
    New,
    General,
}

const fn suggestion(
    message: &'static str,
    variant: &'static str,
    focus: &'static str,
) -> MessageSuggestion {
    MessageSuggestion {
        message,
        variant,
        focus,
    }
}

static VIP: [MessageSuggestion; 3] = [
    suggestion(
        "Hi {name}, exclusive VIP offer: 15% off + free shipping on your next premium purchase!",
        "VIP",
        "Exclusivity and premium treatment",
    ),
    suggestion(
        "{name}, thank you for your loyalty! Early access to our new collection with 20% off.",
        "Loyalty",
        "Appreciation and early access",
    ),
    suggestion(
        "Hello {name}, special invitation: Private sale event with up to 25% off luxury items!",
        "Exclusive",
        "Private access and luxury",
    ),
];

static WIN_BACK: [MessageSuggestion; 3] = [
    suggestion(
        "Hi {name}, we miss you! Come back with 30% off - valid for 48 hours only!",
        "Win-back",
        "Urgency and substantial discount",
    ),
    suggestion(
        "{name}, it's been too long! Here's ₹500 off on orders above ₹2000 to welcome you back.",
        "Welcome Back",
        "Specific monetary incentive",
    ),
    suggestion(
        "We've saved something special for you, {name}! Return and discover 25% off your favorites.",
        "Personal",
        "Personalization and favorites",
    ),
];

static FREQUENT: [MessageSuggestion; 3] = [
    suggestion(
        "Hi {name}, you're our star customer! Enjoy free express shipping on your next order.",
        "Recognition",
        "Recognition and free service",
    ),
    suggestion(
        "{name}, thanks for your loyalty! Double reward points on all purchases this week.",
        "Rewards",
        "Loyalty program benefits",
    ),
    suggestion(
        "Hello {name}, first access to our flash sale - 15% off everything before anyone else!",
        "Priority",
        "Priority access and timing",
    ),
];

static NEW: [MessageSuggestion; 3] = [
    suggestion(
        "Welcome {name}! Complete your profile and get ₹300 off your next purchase.",
        "Welcome",
        "Onboarding incentive",
    ),
    suggestion(
        "Hi {name}, thanks for joining us! Here's 20% off to get you started - use code WELCOME20.",
        "Getting Started",
        "Easy start with clear code",
    ),
    suggestion(
        "{name}, explore our bestsellers with 25% off - perfect for your first big order!",
        "Discovery",
        "Product discovery and first purchase",
    ),
];

static GENERAL: [MessageSuggestion; 3] = [
    suggestion(
        "Hi {name}, don't miss our weekend special - 20% off everything!",
        "General",
        "Time-bound general offer",
    ),
    suggestion(
        "{name}, your favorites are back in stock! Shop now before they're gone again.",
        "Stock Alert",
        "Product availability and urgency",
    ),
    suggestion(
        "Hello {name}, flash sale alert! Up to 40% off on trending items - 24 hours only!",
        "Flash Sale",
        "Limited time and trending products",
    ),
];

/// Maximum number of suggestions returned.
pub const SUGGESTION_LIMIT: usize = 3;

impl Segment {
    fn templates(self) -> &'static [MessageSuggestion; 3] {
        match self {
            Segment::Vip => &VIP,
            Segment::WinBack => &WIN_BACK,
            Segment::Frequent => &FREQUENT,
            Segment::New => &NEW,
            Segment::General => &GENERAL,
        }
    }
}

/// Segments the rules describe, in suggestion order. Frequent shoppers are
/// only addressed as such when the rules do not also target inactivity.
pub fn classify(rules: &[Rule]) -> Vec<Segment> {
    let has = |field: &str, op: &str, test: fn(i64) -> bool| {
        rules.iter().any(|r| {
            r.field == field && r.operator == op && leading_int(&r.value).is_some_and(test)
        })
    };

    let high_spend = has("totalSpends", ">", |v| v > 10_000);
    let inactive = has("lastVisit", ">", |v| v > 30);
    let frequent = has("visits", ">", |v| v > 5);
    let new = has("createdAt", "<", |v| v < 60);

    let mut segments = Vec::new();
    if high_spend {
        segments.push(Segment::Vip);
    }
    if inactive {
        segments.push(Segment::WinBack);
    }
    if frequent && !inactive {
        segments.push(Segment::Frequent);
    }
    if new {
        segments.push(Segment::New);
    }
    if segments.is_empty() {
        segments.push(Segment::General);
    }
    segments
}

pub fn suggest_messages(rules: &[Rule]) -> Vec<MessageSuggestion> {
    classify(rules)
        .into_iter()
        .flat_map(|s| s.templates().iter().cloned())
        .take(SUGGESTION_LIMIT)
        .collect()
}

/// The integer a value starts with: `"10000.5"` reads as 10000, `"abc"` as
/// nothing.
fn leading_int(value: &str) -> Option<i64> {
    let value = value.trim_start();
    let digits_start = usize::from(value.starts_with(['-', '+']));
    let end = value[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value.len(), |i| i + digits_start);
    if end == digits_start {
        return None;
    }
    value[..end].parse().ok()
}
