//! Accent/phrasing stage (§4.9): "turns single-POS `WordIndex` items into
//! `WordPhon` items carrying an accent mark, and inserts `Bound` items at
//! sentence/phrase boundaries."
//!
//! Input `WordIndex` items carry the single-POS wire format emitted by
//! `sentence_analysis`: `u8 pos, word bytes...` (no `num_pos` prefix,
//! since there is exactly one POS by this point). `Punc` items close the
//! current phrase/sentence; the closing punctuation byte selects the
//! `Bound` strength and type (§4.9's closed `{SBeg,SEnd,Term,Phr1,Phr2,
//! Phr3}` × `{P,T,Q,E}` space). The accent rule itself is knowledge-base
//! content (out of scope); this stage ships a one-rule stand-in: content
//! words (`Noun`/`Verb`/`Adjective`/`Adverb`) are accented, `Other` is not.

use std::collections::VecDeque;

use crate::arena::Arena;
use crate::diag::{Code, Diagnostics};
use crate::item::{bound_item, BoundStrength, BoundType, Item, ItemType};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};
use crate::stages::Pos;

fn decode_single_pos(item: &Item) -> Option<(u8, &[u8])> {
    let pos = *item.payload.first()?;
    Some((pos, &item.payload[1..]))
}

fn is_accented(pos: u8) -> bool {
    !matches!(Pos::from_u8(pos), Pos::Other)
}

fn word_phon_item(accented: bool, word: &[u8]) -> Option<Item> {
    Item::new(ItemType::WordPhon, accented as u8, 0, word.to_vec())
}

/// Maps a closing punctuation byte to its `(strength, type)` pair.
fn punc_bound(b: u8) -> (BoundStrength, BoundType) {
    match b {
        b'.' => (BoundStrength::Term, BoundType::T),
        b'!' => (BoundStrength::Term, BoundType::E),
        b'?' => (BoundStrength::Term, BoundType::Q),
        b',' | b';' => (BoundStrength::Phr1, BoundType::P),
        b':' => (BoundStrength::Phr2, BoundType::P),
        _ => (BoundStrength::Phr3, BoundType::P),
    }
}

pub struct AccentPhrasing {
    sentence_open: bool,
    pending_emit: VecDeque<Item>,
}

impl Default for AccentPhrasing {
    fn default() -> Self {
        Self::new()
    }
}

impl AccentPhrasing {
    pub fn new() -> Self {
        Self {
            sentence_open: false,
            pending_emit: VecDeque::new(),
        }
    }
}

impl ProcessingUnit for AccentPhrasing {
    fn initialize(&mut self, _mode: ResetMode, _voice: &Voice, _arena: &Arena) {
        self.sentence_open = false;
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
                    Some(ItemType::WordIndex) => match decode_single_pos(&item) {
                        Some((pos, word)) => {
                            if !self.sentence_open {
                                self.pending_emit
                                    .push_back(bound_item(BoundStrength::SBeg, BoundType::P));
                                self.sentence_open = true;
                            }
                            match word_phon_item(is_accented(pos), word) {
                                Some(phon) => self.pending_emit.push_back(phon),
                                None => diag.raise_warning(
                                    Code::IrregularItem,
                                    "word too long to become word-phon",
                                ),
                            }
                        }
                        None => diag.raise_warning(Code::IrregularItem, "word index missing POS byte"),
                    },
                    Some(ItemType::Punc) => {
                        let b = item.payload.first().copied().unwrap_or(b'.');
                        let (strength, kind) = punc_bound(b);
                        self.pending_emit.push_back(bound_item(strength, kind));
                        if strength.terminates_sentence() {
                            self.pending_emit
                                .push_back(bound_item(BoundStrength::SEnd, kind));
                            self.sentence_open = false;
                        }
                    }
                    _ => self.pending_emit.push_back(item),
                }
                StepResult::Busy
            }
            Err(RingError::Eof) | Err(RingError::BufUnderflow) => StepResult::Idle,
        }
    }

    fn terminate(&mut self) {
        self.sentence_open = false;
        self.pending_emit.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_voice() -> Voice {
        crate::resource::test_support::minimal_voice("v").1
    }

    fn drain_all(stage: &mut AccentPhrasing, cb_in: &mut CharBuffer, cb_out: &mut CharBuffer, voice: &Voice, diag: &mut Diagnostics) {
        let arena = Arena::new(4096).unwrap();
        loop {
            match stage.step(cb_in, cb_out, voice, &arena, diag) {
                StepResult::Idle => break,
                StepResult::Error => panic!("accent phrasing error"),
                _ => continue,
            }
        }
    }

    #[test]
    fn first_word_opens_sentence_with_sbeg() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(512);
        let mut cb_out = CharBuffer::new(512);
        let w = Item::new(ItemType::WordIndex, 0, 0, {
            let mut p = vec![Pos::Noun as u8];
            p.extend_from_slice(b"cat");
            p
        })
        .unwrap();
        cb_in.put_item(&w).unwrap();
        cb_in
            .put_item(&Item::new(ItemType::Punc, 0, 0, vec![b'.']).unwrap())
            .unwrap();

        let mut stage = AccentPhrasing::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let sbeg = cb_out.get_item().unwrap();
        assert_eq!(sbeg.kind(), Some(ItemType::Bound));
        assert_eq!(sbeg.info1, BoundStrength::SBeg as u8);

        let phon = cb_out.get_item().unwrap();
        assert_eq!(phon.kind(), Some(ItemType::WordPhon));
        assert_eq!(phon.info1, 1);
        assert_eq!(phon.payload, b"cat");

        let term = cb_out.get_item().unwrap();
        assert_eq!(term.info1, BoundStrength::Term as u8);
        assert_eq!(term.info2, BoundType::T as u8);

        let send = cb_out.get_item().unwrap();
        assert_eq!(send.info1, BoundStrength::SEnd as u8);
    }

    #[test]
    fn other_pos_is_not_accented() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(256);
        let mut cb_out = CharBuffer::new(256);
        let w = Item::new(ItemType::WordIndex, 0, 0, {
            let mut p = vec![Pos::Other as u8];
            p.extend_from_slice(b"the");
            p
        })
        .unwrap();
        cb_in.put_item(&w).unwrap();

        let mut stage = AccentPhrasing::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let _sbeg = cb_out.get_item().unwrap();
        let phon = cb_out.get_item().unwrap();
        assert_eq!(phon.info1, 0);
    }
}
