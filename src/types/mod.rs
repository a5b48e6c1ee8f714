//! Core types for round tracking.
//!
//! - [`Position`] identifies a round in the remote network
//! - [`PollResult`] is the record published after each successful iteration
//! - [`UpdateRate`] controls how often subscribers see those records
//!
//! ```rust
//! use roundwatch::types::{PollResult, Position};
//! use std::time::Duration;
//!
//! let result = PollResult::new(Position(101), Duration::from_millis(200), 3);
//! assert_eq!(result.position.next(), Position(102));
//! assert_eq!(result.elapsed_ms, 200);
//! ```

mod poll_result;
mod position;
mod update_rate;

pub use poll_result::PollResult;
pub use position::Position;
pub use update_rate::UpdateRate;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn lead_over_is_never_negative(a in any::<u64>(), b in any::<u64>()) {
            let lead = Position(a).lead_over(Position(b));
            if a > b {
                prop_assert_eq!(lead, a - b);
            } else {
                prop_assert_eq!(lead, 0);
            }
        }

        #[test]
        fn positions_serialize_as_bare_integers(round in any::<u64>()) {
            let json = serde_json::to_string(&Position(round)).unwrap();
            prop_assert_eq!(json, round.to_string());
        }
    }
}
