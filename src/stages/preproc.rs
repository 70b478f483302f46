//! Preproc stage (§4.9): "rewrites Token(Digit/Seq/Char) runs into
//! Token(LetterV) runs using substitution rules from a knowledge base;
//! forwards everything else."
//!
//! The substitution table itself is knowledge-base content (out of scope
//! per `spec.md` §1); this stage ships a tiny built-in table (digit →
//! spelled-out word) as the stand-in, falling back to a verbatim pass
//! (with a `FallbackUsed` warning) for anything it doesn't recognize.
//!
//! This stage also does the grapheme-to-word grouping the distilled spec
//! leaves implicit: consecutive letter-class tokens are accumulated into
//! one `WordGraph` item, flushed on any non-letter item (space, `Punc`,
//! `Cmd`, `Bound`), which `word_analysis` downstream then consumes. See
//! `DESIGN.md` for this Open-Question resolution.

use std::collections::VecDeque;

use crate::arena::Arena;
use crate::diag::{Code, Diagnostics};
use crate::item::{Item, ItemType};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};

/// Left shorter than the item payload cap (255) so `word_analysis` has
/// room to prepend a POS-set header without overflowing.
const MAX_WORD_LEN: usize = 250;

/// Token `info1` class codes, mirroring `tokenizer::CharClass`'s discriminants.
const CLASS_LETTER: u8 = 0;
const CLASS_DIGIT: u8 = 1;
const CLASS_SEQUENCE: u8 = 2;
const CLASS_SPACE: u8 = 3;
const CLASS_CHAR: u8 = 4;
const CLASS_UNDEFINED: u8 = 5;

fn digit_substitution(b: u8) -> Option<&'static str> {
    Some(match b {
        b'0' => "zero",
        b'1' => "one",
        b'2' => "two",
        b'3' => "three",
        b'4' => "four",
        b'5' => "five",
        b'6' => "six",
        b'7' => "seven",
        b'8' => "eight",
        b'9' => "nine",
        _ => return None,
    })
}

pub struct Preproc {
    word_buf: Vec<u8>,
    pending_emit: VecDeque<Item>,
}

impl Default for Preproc {
    fn default() -> Self {
        Self::new()
    }
}

impl Preproc {
    pub fn new() -> Self {
        Self {
            word_buf: Vec::new(),
            pending_emit: VecDeque::new(),
        }
    }

    fn push_letters(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.word_buf.len() >= MAX_WORD_LEN {
                self.flush_word();
            }
            self.word_buf.push(b);
        }
    }

    fn flush_word(&mut self) {
        if self.word_buf.is_empty() {
            return;
        }
        let payload = std::mem::take(&mut self.word_buf);
        if let Some(item) = Item::new(ItemType::WordGraph, 0, 0, payload) {
            self.pending_emit.push_back(item);
        }
    }

    fn handle_token(&mut self, item: &Item, diag: &mut Diagnostics) {
        match item.info1 {
            CLASS_LETTER => self.push_letters(&item.payload),
            CLASS_DIGIT => {
                let mut spelled = Vec::new();
                for &b in &item.payload {
                    match digit_substitution(b) {
                        Some(word) => {
                            if !spelled.is_empty() {
                                spelled.push(b' ');
                            }
                            spelled.extend_from_slice(word.as_bytes());
                        }
                        None => {
                            diag.raise_warning(Code::FallbackUsed, "no digit substitution rule");
                            spelled.push(b);
                        }
                    }
                }
                self.push_letters(&spelled);
            }
            CLASS_SEQUENCE | CLASS_CHAR => {
                diag.raise_warning(Code::FallbackUsed, "no substitution rule, passing through");
                self.push_letters(&item.payload);
            }
            CLASS_SPACE => self.flush_word(),
            CLASS_UNDEFINED => {
                diag.raise_warning(Code::ClassificationMiss, "undefined character class dropped");
            }
            _ => {
                diag.raise_warning(Code::ClassificationMiss, "unrecognized token class");
            }
        }
    }
}

impl ProcessingUnit for Preproc {
    fn initialize(&mut self, _mode: ResetMode, _voice: &Voice, _arena: &Arena) {
        self.word_buf.clear();
        self.pending_emit.clear();
    }

    fn step(
        &mut self,
        cb_in: &mut CharBuffer,
        cb_out: &mut CharBuffer,
        _voice: &Voice,
        _arena: &Arena,
        diag: &mut Diagnostics,
    ) -> StepResult {
        if let Some(item) = self.pending_emit.front() {
            return match cb_out.put_item(item) {
                Ok(()) => {
                    self.pending_emit.pop_front();
                    if self.pending_emit.is_empty() {
                        StepResult::Busy
                    } else {
                        StepResult::Atomic
                    }
                }
                Err(RingError::BufOverflow) => StepResult::OutFull,
                Err(_) => StepResult::Error,
            };
        }

        match cb_in.get_item() {
            Ok(item) => {
                match item.kind() {
                    Some(ItemType::Token) => self.handle_token(&item, diag),
                    _ => {
                        self.flush_word();
                        self.pending_emit.push_back(item);
                    }
                }
                StepResult::Busy
            }
            Err(RingError::Eof) | Err(RingError::BufUnderflow) => StepResult::Idle,
        }
    }

    fn terminate(&mut self) {
        self.word_buf.clear();
        self.pending_emit.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_voice() -> Voice {
        crate::resource::test_support::minimal_voice("v").1
    }

    fn drain_all(stage: &mut Preproc, cb_in: &mut CharBuffer, cb_out: &mut CharBuffer, voice: &Voice, diag: &mut Diagnostics) {
        let arena = Arena::new(4096).unwrap();
        loop {
            match stage.step(cb_in, cb_out, voice, &arena, diag) {
                StepResult::Idle => break,
                StepResult::Error => panic!("preproc error"),
                _ => continue,
            }
        }
    }

    #[test]
    fn letter_tokens_become_one_word_graph() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(256);
        let mut cb_out = CharBuffer::new(256);
        cb_in.put_item(&Item::new(ItemType::Token, CLASS_LETTER, 0, b"hello".to_vec()).unwrap()).unwrap();
        cb_in.put_item(&Item::new(ItemType::Punc, 0, 0, vec![b'.']).unwrap()).unwrap();

        let mut stage = Preproc::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let word = cb_out.get_item().unwrap();
        assert_eq!(word.kind(), Some(ItemType::WordGraph));
        assert_eq!(word.payload, b"hello");
        let punc = cb_out.get_item().unwrap();
        assert_eq!(punc.kind(), Some(ItemType::Punc));
    }

    #[test]
    fn digit_run_spelled_out() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(256);
        let mut cb_out = CharBuffer::new(256);
        cb_in.put_item(&Item::new(ItemType::Token, CLASS_DIGIT, 0, b"12".to_vec()).unwrap()).unwrap();
        cb_in.put_item(&Item::new(ItemType::Cmd, 0, 0, vec![]).unwrap()).unwrap();

        let mut stage = Preproc::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let word = cb_out.get_item().unwrap();
        assert_eq!(word.kind(), Some(ItemType::WordGraph));
        assert_eq!(word.payload, b"one two");
    }

    #[test]
    fn space_flushes_without_emitting_token() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(256);
        let mut cb_out = CharBuffer::new(256);
        cb_in.put_item(&Item::new(ItemType::Token, CLASS_LETTER, 0, b"hi".to_vec()).unwrap()).unwrap();
        cb_in.put_item(&Item::new(ItemType::Token, CLASS_SPACE, 0, b" ".to_vec()).unwrap()).unwrap();
        cb_in.put_item(&Item::new(ItemType::Token, CLASS_LETTER, 0, b"there".to_vec()).unwrap()).unwrap();

        let mut stage = Preproc::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let w1 = cb_out.get_item().unwrap();
        assert_eq!(w1.payload, b"hi");
        let w2 = cb_out.get_item().unwrap();
        assert_eq!(w2.payload, b"there");
    }
}
