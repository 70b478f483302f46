//! Sentence analysis stage (§4.9): "POS-disambiguates spans of words
//! bounded by Punc items (a single unambiguous POS replaces POS sets)."
//!
//! Buffers `WordIndex`/`WordGraph` items (both carry a POS set, see
//! `word_analysis::decode_pos_word`) until a `Punc` (or any other
//! non-word item, which also closes the current span) arrives, then
//! resolves each buffered word to its first POS candidate and re-emits it
//! as a `WordIndex` with exactly one POS, in order, followed by the item
//! that closed the span.

use std::collections::VecDeque;

use crate::arena::Arena;
use crate::diag::Diagnostics;
use crate::item::{Item, ItemType};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};
use crate::stages::word_analysis::decode_pos_word;

pub struct SentenceAnalysis {
    span: Vec<(u8, Vec<u8>)>,
    pending_emit: VecDeque<Item>,
}

impl Default for SentenceAnalysis {
    fn default() -> Self {
        Self::new()
    }
}

impl SentenceAnalysis {
    pub fn new() -> Self {
        Self {
            span: Vec::new(),
            pending_emit: VecDeque::new(),
        }
    }

    fn flush_span(&mut self) {
        for (pos, word) in self.span.drain(..) {
            let mut payload = Vec::with_capacity(1 + word.len());
            payload.push(pos);
            payload.extend_from_slice(&word);
            if let Some(item) = Item::new(ItemType::WordIndex, 1, 0, payload) {
                self.pending_emit.push_back(item);
            }
        }
    }
}

impl ProcessingUnit for SentenceAnalysis {
    fn initialize(&mut self, _mode: ResetMode, _voice: &Voice, _arena: &Arena) {
        self.span.clear();
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
                    Some(ItemType::WordIndex) | Some(ItemType::WordGraph) => {
                        match decode_pos_word(&item) {
                            Some((pos, word)) => {
                                let first = *pos.first().unwrap_or(&(crate::stages::Pos::Other as u8));
                                self.span.push((first, word.to_vec()));
                            }
                            None => diag.raise_warning(
                                crate::diag::Code::IrregularItem,
                                "word item missing POS header",
                            ),
                        }
                    }
                    _ => {
                        self.flush_span();
                        self.pending_emit.push_back(item);
                    }
                }
                StepResult::Busy
            }
            Err(RingError::Eof) | Err(RingError::BufUnderflow) => StepResult::Idle,
        }
    }

    fn terminate(&mut self) {
        self.span.clear();
        self.pending_emit.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Pos;

    fn empty_voice() -> Voice {
        crate::resource::test_support::minimal_voice("v").1
    }

    fn drain_all(stage: &mut SentenceAnalysis, cb_in: &mut CharBuffer, cb_out: &mut CharBuffer, voice: &Voice, diag: &mut Diagnostics) {
        let arena = Arena::new(4096).unwrap();
        loop {
            match stage.step(cb_in, cb_out, voice, &arena, diag) {
                StepResult::Idle => break,
                StepResult::Error => panic!("sentence analysis error"),
                _ => continue,
            }
        }
    }

    #[test]
    fn span_resolves_to_single_pos_per_word() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(512);
        let mut cb_out = CharBuffer::new(512);
        let w1 = Item::new(ItemType::WordIndex, 1, 0, vec![Pos::Verb as u8, b'i', b's']).unwrap();
        let w2 = Item::new(ItemType::WordGraph, 1, 0, vec![Pos::Noun as u8, b'f', b'o', b'o']).unwrap();
        cb_in.put_item(&w1).unwrap();
        cb_in.put_item(&w2).unwrap();
        cb_in.put_item(&Item::new(ItemType::Punc, 0, 0, vec![b'.']).unwrap()).unwrap();

        let mut stage = SentenceAnalysis::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let out1 = cb_out.get_item().unwrap();
        assert_eq!(out1.kind(), Some(ItemType::WordIndex));
        assert_eq!(out1.payload[0], Pos::Verb as u8);
        let out2 = cb_out.get_item().unwrap();
        assert_eq!(out2.payload[0], Pos::Noun as u8);
        let out3 = cb_out.get_item().unwrap();
        assert_eq!(out3.kind(), Some(ItemType::Punc));
    }
}
