//! Stream combinators for result subscriptions

mod throttle;

pub use throttle::{Throttle, ThrottleExt};
