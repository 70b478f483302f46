//! Per-engine exception/warning registry.
//!
//! This is a flow-control mechanism, not a Rust error type: a stage that
//! fails stores a code and message here and returns `StepResult::Error` to
//! the scheduler instead of unwinding (see [`crate::pu::StepResult`]).
//! Nothing in this module allocates.

use tracing::{error, warn};

/// Upper bound on the warning ring; the source's `MaxNumWarnings`.
pub const MAX_NUM_WARNINGS: usize = 32;

const MSG_CAP: usize = 128;

/// Numeric codes for exceptions (severe) and warnings (preserved output).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Code {
    NullPtrAccess,
    InvalidHandle,
    InvalidArgument,
    OutOfMem,
    IndexOutOfRange,
    BufOverflow,
    BufUnderflow,
    CantOpenFile,
    UnexpectedFileType,
    FileCorrupt,
    ResourceBusy,
    KbMissing,
    NumericFormat,

    IncompleteOutput,
    FallbackUsed,
    KbOverwrite,
    DuplicateResourceLoad,
    VectorOutOfRange,
    ClassificationMiss,
    IrregularItem,
    InvalidMarkupTag,
    TooManyWarnings,
}

impl Code {
    pub fn is_exception(self) -> bool {
        !matches!(
            self,
            Code::IncompleteOutput
                | Code::FallbackUsed
                | Code::KbOverwrite
                | Code::DuplicateResourceLoad
                | Code::VectorOutOfRange
                | Code::ClassificationMiss
                | Code::IrregularItem
                | Code::InvalidMarkupTag
                | Code::TooManyWarnings
        )
    }
}

struct BoundedMsg {
    code: Code,
    text: [u8; MSG_CAP],
    len: usize,
}

impl BoundedMsg {
    fn new(code: Code, msg: &str) -> Self {
        let mut text = [0u8; MSG_CAP];
        let bytes = msg.as_bytes();
        let len = bytes.len().min(MSG_CAP);
        text[..len].copy_from_slice(&bytes[..len]);
        Self { code, text, len }
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(&self.text[..self.len]).unwrap_or("")
    }
}

/// One exception slot (first raise wins) plus a bounded warning ring.
pub struct Diagnostics {
    exception: Option<BoundedMsg>,
    warnings: Vec<BoundedMsg>,
    warnings_overflowed: bool,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    pub fn new() -> Self {
        Self {
            exception: None,
            warnings: Vec::with_capacity(MAX_NUM_WARNINGS),
            warnings_overflowed: false,
        }
    }

    /// Stores the first exception raised since the last `reset`; later
    /// raises are ignored.
    pub fn raise_exception(&mut self, code: Code, msg: &str) {
        if self.exception.is_none() {
            error!(code = ?code, message = msg, "exception raised");
            self.exception = Some(BoundedMsg::new(code, msg));
        }
    }

    /// Appends to the warning ring; once full, the last slot becomes a
    /// "too many warnings" marker instead of growing further.
    pub fn raise_warning(&mut self, code: Code, msg: &str) {
        warn!(code = ?code, message = msg, "warning raised");
        if self.warnings.len() < MAX_NUM_WARNINGS {
            self.warnings.push(BoundedMsg::new(code, msg));
        } else {
            self.warnings_overflowed = true;
            if let Some(last) = self.warnings.last_mut() {
                *last = BoundedMsg::new(Code::TooManyWarnings, "too many warnings");
            }
        }
    }

    pub fn get_exception_code(&self) -> Option<Code> {
        self.exception.as_ref().map(|e| e.code)
    }

    pub fn get_exception_message(&self) -> Option<&str> {
        self.exception.as_ref().map(|e| e.as_str())
    }

    pub fn num_warnings(&self) -> usize {
        self.warnings.len()
    }

    pub fn warning_code(&self, i: usize) -> Option<Code> {
        self.warnings.get(i).map(|w| w.code)
    }

    pub fn warning_message(&self, i: usize) -> Option<&str> {
        self.warnings.get(i).map(|w| w.as_str())
    }

    pub fn has_exception(&self) -> bool {
        self.exception.is_some()
    }

    pub fn warnings_overflowed(&self) -> bool {
        self.warnings_overflowed
    }

    /// Clears both the exception slot and the warning ring.
    pub fn reset(&mut self) {
        self.exception = None;
        self.warnings.clear();
        self.warnings_overflowed = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_exception_wins() {
        let mut d = Diagnostics::new();
        d.raise_exception(Code::OutOfMem, "first");
        d.raise_exception(Code::InvalidHandle, "second");
        assert_eq!(d.get_exception_code(), Some(Code::OutOfMem));
        assert_eq!(d.get_exception_message(), Some("first"));
    }

    #[test]
    fn warnings_ring_overflow_marker() {
        let mut d = Diagnostics::new();
        for i in 0..MAX_NUM_WARNINGS + 5 {
            d.raise_warning(Code::ClassificationMiss, &format!("w{i}"));
        }
        assert_eq!(d.num_warnings(), MAX_NUM_WARNINGS);
        assert!(d.warnings_overflowed());
        assert_eq!(d.warning_code(MAX_NUM_WARNINGS - 1), Some(Code::TooManyWarnings));
    }

    #[test]
    fn reset_clears_everything() {
        let mut d = Diagnostics::new();
        d.raise_exception(Code::OutOfMem, "x");
        d.raise_warning(Code::FallbackUsed, "y");
        d.reset();
        assert!(!d.has_exception());
        assert_eq!(d.num_warnings(), 0);
    }
}
