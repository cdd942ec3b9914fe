// src/guard.rs
//
// Re-entrant retap depth counter with a "closed while busy" latch.
//
// Retaps nest: an outer refresh calls listener callbacks which may request
// another retap before the first one unwinds. The counter tracks that nesting;
// the latch remembers a close that arrived while the counter was non-zero so
// the last `end()` can hand teardown back to the caller, exactly once.

use std::cell::Cell;

use crate::error::GuardUnderflow;

/// Outcome of `RetapGuard::end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetapRelease {
    /// Still inside an outer retap
    Nested { depth: usize },
    /// Depth reached zero with no close pending
    Idle,
    /// Depth reached zero and a close was pending: the caller must tear down now
    Teardown,
}

/// Outcome of `RetapGuard::request_close`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseRequest {
    /// No retap in flight: tear down now
    Immediate,
    /// Teardown will be handed out by the `end()` that reaches depth zero
    Deferred { depth: usize },
    /// A close was already requested
    AlreadyRequested,
}

#[derive(Debug, Default)]
pub struct RetapGuard {
    depth: Cell<usize>,
    close_requested: Cell<bool>,
    teardown_issued: Cell<bool>,
}

impl RetapGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter a retap. Returns the new depth.
    pub fn begin(&self) -> usize {
        let depth = self.depth.get() + 1;
        self.depth.set(depth);
        depth
    }

    /// Leave a retap.
    ///
    /// At depth zero this returns `GuardUnderflow` and leaves the depth at zero;
    /// whether that is fatal is the caller's call.
    pub fn end(&self) -> Result<RetapRelease, GuardUnderflow> {
        let depth = self.depth.get();
        if depth == 0 {
            return Err(GuardUnderflow);
        }
        let depth = depth - 1;
        self.depth.set(depth);

        if depth > 0 {
            return Ok(RetapRelease::Nested { depth });
        }
        if self.close_requested.get() && self.issue_teardown() {
            Ok(RetapRelease::Teardown)
        } else {
            Ok(RetapRelease::Idle)
        }
    }

    /// Record a close. Only the first request counts.
    pub fn request_close(&self) -> CloseRequest {
        if self.close_requested.replace(true) {
            return CloseRequest::AlreadyRequested;
        }
        match self.depth.get() {
            0 => {
                let first = self.issue_teardown();
                debug_assert!(first, "teardown issued before any close was requested");
                CloseRequest::Immediate
            }
            depth => CloseRequest::Deferred { depth },
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    pub fn is_busy(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn is_close_requested(&self) -> bool {
        self.close_requested.get()
    }

    /// True once teardown has been handed out.
    pub fn teardown_issued(&self) -> bool {
        self.teardown_issued.get()
    }

    fn issue_teardown(&self) -> bool {
        !self.teardown_issued.replace(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_close_when_idle_is_immediate() {
        let guard = RetapGuard::new();
        assert_eq!(guard.request_close(), CloseRequest::Immediate);
        assert_eq!(guard.request_close(), CloseRequest::AlreadyRequested);
        assert!(guard.teardown_issued());
    }

    #[test]
    fn test_nested_close_defers_to_outermost_end() {
        let guard = RetapGuard::new();
        assert_eq!(guard.begin(), 1);
        assert_eq!(guard.request_close(), CloseRequest::Deferred { depth: 1 });
        assert_eq!(guard.begin(), 2);
        assert_eq!(guard.end(), Ok(RetapRelease::Nested { depth: 1 }));
        assert!(!guard.teardown_issued());
        assert_eq!(guard.end(), Ok(RetapRelease::Teardown));
        assert!(guard.teardown_issued());
    }

    #[test]
    fn test_teardown_handed_out_once() {
        let guard = RetapGuard::new();
        guard.begin();
        guard.request_close();
        assert_eq!(guard.end(), Ok(RetapRelease::Teardown));

        // A retap that starts afterwards (e.g. triggered by the session) ends idle.
        guard.begin();
        assert_eq!(guard.end(), Ok(RetapRelease::Idle));
    }

    #[test]
    fn test_underflow_is_reported_and_clamped() {
        let guard = RetapGuard::new();
        assert_eq!(guard.end(), Err(GuardUnderflow));
        assert_eq!(guard.depth(), 0);
        assert_eq!(guard.begin(), 1);
    }

    #[derive(Clone, Debug)]
    enum Step {
        Begin,
        End,
        Close,
    }

    fn step() -> impl Strategy<Value = Step> {
        prop_oneof![
            3 => Just(Step::Begin),
            3 => Just(Step::End),
            1 => Just(Step::Close),
        ]
    }

    proptest! {
        #[test]
        fn prop_depth_tracks_pairs_and_teardown_fires_once(steps in prop::collection::vec(step(), 0..64)) {
            let guard = RetapGuard::new();
            let mut model_depth: usize = 0;
            let mut teardowns = 0;

            for step in steps {
                match step {
                    Step::Begin => {
                        model_depth += 1;
                        prop_assert_eq!(guard.begin(), model_depth);
                    }
                    Step::End if model_depth == 0 => {
                        prop_assert_eq!(guard.end(), Err(GuardUnderflow));
                    }
                    Step::End => {
                        model_depth -= 1;
                        match guard.end().unwrap() {
                            RetapRelease::Teardown => {
                                prop_assert_eq!(model_depth, 0);
                                teardowns += 1;
                            }
                            RetapRelease::Idle => prop_assert_eq!(model_depth, 0),
                            RetapRelease::Nested { depth } => prop_assert_eq!(depth, model_depth),
                        }
                    }
                    Step::Close => {
                        if guard.request_close() == CloseRequest::Immediate {
                            prop_assert_eq!(model_depth, 0);
                            teardowns += 1;
                        }
                    }
                }
                prop_assert_eq!(guard.depth(), model_depth);
            }

            prop_assert!(teardowns <= 1);
            if guard.is_close_requested() && model_depth == 0 {
                prop_assert_eq!(teardowns, 1);
            }
        }
    }
}
