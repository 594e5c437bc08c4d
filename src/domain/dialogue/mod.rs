//! Dialogue domain: classifying inbound messages against the funnel, and
//! the housekeeping due on sessions that went quiet.

mod classifier;
mod upkeep;

pub use classifier::{
    classify, AdvanceTrigger, Capture, Classification, Decision, TurnInput, DEFAULT_HUMAN_KEYWORDS,
    DEFAULT_PLANS,
};
pub use upkeep::{due_upkeep, BusinessHours, Upkeep, UpkeepPolicy, DEFAULT_CART_MESSAGE};
