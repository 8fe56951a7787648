//! Runtime invariant checks with contract-test support
//!
//! Negotiation and the capture state machine state their invariants with
//! [`check_invariant!`]. Every checked invariant is recorded per thread so a
//! test can assert that a code path actually verified the contracts it is
//! supposed to uphold.
//!
//! ```rust,ignore
//! use lensgate::check_invariant;
//!
//! check_invariant!(
//!     device.supports_camera_mode(mode),
//!     "Selected device supports the selected mode",
//!     "negotiation::resolve"
//! );
//!
//! #[test]
//! fn contract_negotiation() {
//!     // ... run a negotiation ...
//!     contract_test("negotiation", &["Selected device supports the selected mode"]);
//! }
//! ```

use std::cell::RefCell;
use std::collections::HashSet;
use std::thread_local;

thread_local! {
    static INVARIANT_LOG: RefCell<HashSet<String>> = RefCell::new(HashSet::new());
}

/// Check an invariant and record it for contract testing.
///
/// A violation is logged at error level. Debug builds also panic.
#[macro_export]
macro_rules! check_invariant {
    ($condition:expr, $message:expr) => {
        $crate::invariants::__check_invariant_impl($condition, $message, None)
    };
    ($condition:expr, $message:expr, $context:expr) => {
        $crate::invariants::__check_invariant_impl($condition, $message, Some($context))
    };
}

#[doc(hidden)]
pub fn __check_invariant_impl(condition: bool, message: &str, context: Option<&str>) {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().insert(message.to_string());
    });

    if !condition {
        let ctx = context.unwrap_or("unknown");
        log::error!("Invariant violated [{}]: {}", ctx, message);
        if cfg!(debug_assertions) {
            panic!("INVARIANT VIOLATION [{}]: {}", ctx, message);
        }
    }
}

/// Panics unless every invariant in `required_invariants` was checked on
/// this thread since the last [`clear_invariant_log`].
pub fn contract_test(test_name: &str, required_invariants: &[&str]) {
    let log = INVARIANT_LOG.with(|log| log.borrow().clone());

    let missing: Vec<&str> = required_invariants
        .iter()
        .copied()
        .filter(|invariant| !log.contains(*invariant))
        .collect();

    if !missing.is_empty() {
        panic!(
            "CONTRACT FAILURE [{}]: The following invariants were not checked:\n  - {}",
            test_name,
            missing.join("\n  - ")
        );
    }
}

pub fn clear_invariant_log() {
    INVARIANT_LOG.with(|log| {
        log.borrow_mut().clear();
    });
}
