//! Sentence-phoneme stage (§4.9): "expands `WordPhon` into `SyllPhon`
//! items: one per syllable, carrying the syllable's phoneme-id sequence
//! and its accent level."
//!
//! The grapheme-to-phoneme rules and syllabification are knowledge-base
//! content (out of scope); this stage ships a deterministic stand-in:
//! every vowel byte (`a e i o u y`, case-insensitive) opens a new
//! syllable boundary, and each input byte maps to a phoneme id through a
//! fixed 256-entry identity-ish table (`byte as phoneme id`), which keeps
//! the mapping total and reversible enough for the downstream stand-ins
//! to exercise real data instead of placeholders.
//!
//! Wire format: `u8 accent_level, u8 num_phonemes, phoneme ids...`
//! (`info1` on the `SyllPhon` item duplicates `accent_level` so
//! `phonetic_acoustic` can dispatch on it without decoding the payload).

use std::collections::VecDeque;

use crate::arena::Arena;
use crate::diag::{Code, Diagnostics};
use crate::item::{Item, ItemType};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};

fn is_vowel(b: u8) -> bool {
    matches!(b.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u' | b'y')
}

fn phoneme_id(b: u8) -> u8 {
    b
}

/// Splits `word` into syllables: a new syllable starts at each vowel
/// after the first, consonants preceding a vowel stay with that vowel.
fn syllabify(word: &[u8]) -> Vec<Vec<u8>> {
    if word.is_empty() {
        return Vec::new();
    }
    let mut syllables: Vec<Vec<u8>> = Vec::new();
    let mut current: Vec<u8> = Vec::new();
    let mut seen_vowel_in_current = false;
    for &b in word {
        if is_vowel(b) && seen_vowel_in_current {
            syllables.push(std::mem::take(&mut current));
            seen_vowel_in_current = false;
        }
        if is_vowel(b) {
            seen_vowel_in_current = true;
        }
        current.push(b);
    }
    if !current.is_empty() {
        syllables.push(current);
    }
    syllables
}

fn syll_phon_item(accented: bool, syllable: &[u8]) -> Option<Item> {
    let accent_level: u8 = if accented { 1 } else { 0 };
    let mut payload = Vec::with_capacity(2 + syllable.len());
    payload.push(accent_level);
    payload.push(syllable.len() as u8);
    for &b in syllable {
        payload.push(phoneme_id(b));
    }
    Item::new(ItemType::SyllPhon, accent_level, 0, payload)
}

/// Decodes a `SyllPhon` payload built by [`syll_phon_item`].
pub fn decode_syll_phon(item: &Item) -> Option<(u8, Vec<u8>)> {
    let accent_level = *item.payload.first()?;
    let num = *item.payload.get(1)? as usize;
    if item.payload.len() < 2 + num {
        return None;
    }
    Some((accent_level, item.payload[2..2 + num].to_vec()))
}

pub struct SentencePhonemes {
    pending_emit: VecDeque<Item>,
}

impl Default for SentencePhonemes {
    fn default() -> Self {
        Self::new()
    }
}

impl SentencePhonemes {
    pub fn new() -> Self {
        Self {
            pending_emit: VecDeque::new(),
        }
    }
}

impl ProcessingUnit for SentencePhonemes {
    fn initialize(&mut self, _mode: ResetMode, _voice: &Voice, _arena: &Arena) {
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
                    Some(ItemType::WordPhon) => {
                        let accented = item.info1 != 0;
                        let syllables = syllabify(&item.payload);
                        if syllables.is_empty() {
                            diag.raise_warning(Code::IrregularItem, "empty word-phon payload");
                        }
                        for syll in &syllables {
                            match syll_phon_item(accented, syll) {
                                Some(out) => self.pending_emit.push_back(out),
                                None => diag.raise_warning(
                                    Code::IrregularItem,
                                    "syllable too long to become syll-phon",
                                ),
                            }
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
        self.pending_emit.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_voice() -> Voice {
        crate::resource::test_support::minimal_voice("v").1
    }

    fn drain_all(stage: &mut SentencePhonemes, cb_in: &mut CharBuffer, cb_out: &mut CharBuffer, voice: &Voice, diag: &mut Diagnostics) {
        let arena = Arena::new(4096).unwrap();
        loop {
            match stage.step(cb_in, cb_out, voice, &arena, diag) {
                StepResult::Idle => break,
                StepResult::Error => panic!("sentence phonemes error"),
                _ => continue,
            }
        }
    }

    #[test]
    fn two_vowel_word_splits_into_two_syllables() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(256);
        let mut cb_out = CharBuffer::new(256);
        cb_in
            .put_item(&Item::new(ItemType::WordPhon, 1, 0, b"banana".to_vec()).unwrap())
            .unwrap();

        let mut stage = SentencePhonemes::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let mut count = 0;
        while let Ok(item) = cb_out.get_item() {
            assert_eq!(item.kind(), Some(ItemType::SyllPhon));
            let (accent, _phonemes) = decode_syll_phon(&item).unwrap();
            assert_eq!(accent, 1);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn non_word_phon_items_forward_unchanged() {
        let voice = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(256);
        let mut cb_out = CharBuffer::new(256);
        cb_in
            .put_item(&Item::new(ItemType::Bound, 0, 0, vec![]).unwrap())
            .unwrap();

        let mut stage = SentencePhonemes::new();
        drain_all(&mut stage, &mut cb_in, &mut cb_out, &voice, &mut diag);

        let out = cb_out.get_item().unwrap();
        assert_eq!(out.kind(), Some(ItemType::Bound));
    }
}
