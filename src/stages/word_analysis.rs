//! Word analysis stage (§4.9): "for each WordGraph, consults the lexicon;
//! on hit emits WordIndex with one POS per lexical match; on miss emits
//! WordGraph annotated with a POS set predicted by a decision tree."
//!
//! Wire format shared by both outputs: `u8 num_pos, num_pos POS bytes,
//! word bytes` (the word is whatever remains after the POS list, since
//! `num_pos` pins its start). The lexicon and decision tree are
//! knowledge-base content (out of scope); this stage ships a tiny
//! built-in lexicon and a one-rule fallback predictor as the stand-in.

use crate::arena::Arena;
use crate::diag::Diagnostics;
use crate::item::{Item, ItemType};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};
use crate::stages::Pos;

fn lexicon_lookup(word: &[u8]) -> Option<Vec<u8>> {
    let s = std::str::from_utf8(word).ok()?.to_ascii_lowercase();
    Some(match s.as_str() {
        "the" | "a" | "an" => vec![Pos::Other as u8],
        "is" | "are" | "was" | "were" => vec![Pos::Verb as u8],
        "hello" | "hi" | "bye" | "yes" | "no" => vec![Pos::Other as u8],
        "quick" | "big" | "small" => vec![Pos::Adjective as u8],
        _ => return None,
    })
}

/// Stand-in decision tree: capitalized words are predicted proper nouns,
/// everything else falls to `Other`.
fn predict_pos(word: &[u8]) -> u8 {
    if word.first().map(|b| b.is_ascii_uppercase()).unwrap_or(false) {
        Pos::Noun as u8
    } else {
        Pos::Other as u8
    }
}

fn encode(pos: &[u8], word: &[u8]) -> Option<Vec<u8>> {
    let mut payload = Vec::with_capacity(1 + pos.len() + word.len());
    payload.push(pos.len() as u8);
    payload.extend_from_slice(pos);
    payload.extend_from_slice(word);
    if payload.len() > crate::item::MAX_PAYLOAD {
        None
    } else {
        Some(payload)
    }
}

/// Decodes the `num_pos, pos..., word...` layout shared by `WordIndex`
/// and annotated `WordGraph` items.
pub fn decode_pos_word(item: &Item) -> Option<(Vec<u8>, &[u8])> {
    let num_pos = *item.payload.first()? as usize;
    if item.payload.len() < 1 + num_pos {
        return None;
    }
    let pos = item.payload[1..1 + num_pos].to_vec();
    let word = &item.payload[1 + num_pos..];
    Some((pos, word))
}

#[derive(Default)]
pub struct WordAnalysis;

impl WordAnalysis {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessingUnit for WordAnalysis {
    fn initialize(&mut self, _mode: ResetMode, _voice: &Voice, _arena: &Arena) {}

    fn step(
        &mut self,
        cb_in: &mut CharBuffer,
        cb_out: &mut CharBuffer,
        _voice: &Voice,
        _arena: &Arena,
        diag: &mut Diagnostics,
    ) -> StepResult {
        match cb_in.get_item() {
            Ok(item) => {
                let out = match item.kind() {
                    Some(ItemType::WordGraph) => {
                        let word = &item.payload;
                        let (kind, pos) = match lexicon_lookup(word) {
                            Some(pos) => (ItemType::WordIndex, pos),
                            None => (ItemType::WordGraph, vec![predict_pos(word)]),
                        };
                        match encode(&pos, word) {
                            Some(payload) => Item::new(kind, pos.len() as u8, 0, payload),
                            None => {
                                diag.raise_warning(
                                    crate::diag::Code::IrregularItem,
                                    "word graph payload too large to annotate",
                                );
                                None
                            }
                        }
                    }
                    _ => Some(item),
                };
                match out {
                    Some(item) => match cb_out.put_item(&item) {
                        Ok(()) => StepResult::Busy,
                        Err(RingError::BufOverflow) => StepResult::OutFull,
                        Err(_) => StepResult::Error,
                    },
                    None => StepResult::Busy,
                }
            }
            Err(RingError::Eof) | Err(RingError::BufUnderflow) => StepResult::Idle,
        }
    }

    fn terminate(&mut self) {}
}
