//! The processing-unit protocol shared by every pipeline stage.
//!
//! Per the coroutine-style design note: each stage is a resumable state
//! machine (an enum-valued `proc_state` field plus a dispatching match)
//! rather than a heap-allocated trait object. `ProcessingUnit` gives every
//! stage struct a uniform surface for construction and testing; the
//! scheduler itself (`crate::scheduler`) owns concrete stage variants in a
//! sum type and dispatches by exhaustive match, never through `dyn`.

use crate::arena::Arena;
use crate::diag::Diagnostics;
use crate::resource::Voice;
use crate::ring::CharBuffer;

/// `reset(mode)` granularity: `Full` re-binds knowledge bases from the
/// voice, `Soft` only clears transient buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetMode {
    Full = 0,
    Soft = 16,
}

/// Outcome of one `step` call. Distinct from [`crate::error::MurmurError`]:
/// this is scheduler flow control, not a host-facing error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// No input available, or no pending work: nothing to do right now.
    Idle,
    /// Made progress; may be rescheduled.
    Busy,
    /// In the middle of an indivisible multi-item emission; the scheduler
    /// must call back in without changing focus.
    Atomic,
    /// `cb_out` could not accept produced data; downstream must drain.
    OutFull,
    /// Unrecoverable: an exception has been raised on the diagnostics
    /// registry and the caller should reset or tear down the engine.
    Error,
}

/// The three-operation contract every stage obeys (§4.5).
pub trait ProcessingUnit {
    /// May be called any number of times between construction and
    /// destruction. Must clear internal buffers; `Full` additionally
    /// re-reads derived data from `voice`'s knowledge bases, found at their
    /// recorded offsets inside `arena`.
    fn initialize(&mut self, mode: ResetMode, voice: &Voice, arena: &Arena);

    /// Runs a bounded amount of work and returns. Must never block on I/O
    /// or loop unboundedly across an indefinite input.
    fn step(
        &mut self,
        cb_in: &mut CharBuffer,
        cb_out: &mut CharBuffer,
        voice: &Voice,
        arena: &Arena,
        diag: &mut Diagnostics,
    ) -> StepResult;

    /// Idempotent.
    fn terminate(&mut self);
}
