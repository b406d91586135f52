//! Failover candidate selection.
//!
//! # Responsibilities
//! - Find an upstream that has not been tried yet for this request
//! - Bound the number of random selections spent looking for one
//!
//! # Design Decisions
//! - Selection is injected as a closure so the budget is testable without I/O
//! - "No candidate at all" ends the search immediately; "already tried"
//!   consumes one attempt and selects again

/// Draw candidates from `select` until one satisfies `is_untried`, spending
/// at most `attempts` draws.
pub fn select_untried<U>(
    mut select: impl FnMut() -> Option<U>,
    is_untried: impl Fn(&U) -> bool,
    attempts: u32,
) -> Option<U> {
    for _ in 0..attempts {
        let candidate = select()?;
        if is_untried(&candidate) {
            return Some(candidate);
        }
    }
    None
}
