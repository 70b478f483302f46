//! Phonetic/acoustic stage (§4.9 + §4.8 "Codebook layout"): "expands
//! `SyllPhon` into `Phone` items, each carrying a 5-state `PhoneState`
//! record (§4.8) that the cepstral smoother consumes directly."
//!
//! Per-phoneme duration and codebook-vector selection are knowledge-base
//! content (out of scope); this stage ships a deterministic stand-in: a
//! fixed 5-state frame-count template (`BASE_STATE_FRAMES`), scaled by
//! the active `Cmd(Speed)` factor (§4.9 "level 20-2000, default 100;
//! `factor = 100 / level`" — a level below 100 slows speech down,
//! matching the published "absolute percentage" semantics), and codebook
//! vector indices derived from the phoneme byte and accent level, taken
//! modulo the voice's actual `Updflfz`/`Updfmgc` vector counts so every
//! index the smoother sees is in range by construction.

use std::collections::VecDeque;

use crate::arena::Arena;
use crate::diag::Diagnostics;
use crate::item::{phone_item, Item, ItemType, KbId, PhoneState};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};
use crate::smoother::codebook::PdfCodebook;
use crate::stages::sentence_phonemes::decode_syll_phon;

/// Frame counts for the 5 HMM-style states of a phone (onset, two steady
/// states, release, tail), scaled by the active speed factor.
const BASE_STATE_FRAMES: [u8; 5] = [1, 2, 2, 2, 1];

const DEFAULT_SPEED_LEVEL: u16 = 100;

fn speed_factor(level: u16) -> f32 {
    100.0 / (level.max(1) as f32)
}

pub struct PhoneticAcoustic {
    speed_level: u16,
    num_lfz_vectors: usize,
    num_mgc_vectors: usize,
    pending_emit: VecDeque<Item>,
}

impl Default for PhoneticAcoustic {
    fn default() -> Self {
        Self::new()
    }
}

impl PhoneticAcoustic {
    pub fn new() -> Self {
        Self {
            speed_level: DEFAULT_SPEED_LEVEL,
            num_lfz_vectors: 1,
            num_mgc_vectors: 1,
            pending_emit: VecDeque::new(),
        }
    }

    fn build_phone(&self, phoneme_id: u8, accent_level: u8) -> Option<Item> {
        let factor = speed_factor(self.speed_level);
        let states: Vec<PhoneState> = BASE_STATE_FRAMES
            .iter()
            .map(|&base| {
                let frames = ((base as f32) * factor).round().max(1.0) as u8;
                let lfz_index = ((phoneme_id as usize + accent_level as usize) % self.num_lfz_vectors) as u16;
                let mgc_index = (phoneme_id as usize % self.num_mgc_vectors) as u16;
                PhoneState {
                    frames,
                    lfz_index,
                    mgc_index,
                }
            })
            .collect();
        phone_item(phoneme_id, &states)
    }
}

impl ProcessingUnit for PhoneticAcoustic {
    fn initialize(&mut self, _mode: ResetMode, voice: &Voice, arena: &Arena) {
        self.speed_level = DEFAULT_SPEED_LEVEL;
        self.pending_emit.clear();
        self.num_lfz_vectors = voice
            .kb(KbId::Updflfz)
            .and_then(|kb| PdfCodebook::parse(arena.payload(kb.arena_off, kb.len)))
            .map(|cb| cb.num_vectors().max(1))
            .unwrap_or(1);
        self.num_mgc_vectors = voice
            .kb(KbId::Updfmgc)
            .and_then(|kb| PdfCodebook::parse(arena.payload(kb.arena_off, kb.len)))
            .map(|cb| cb.num_vectors().max(1))
            .unwrap_or(1);
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
                    Some(ItemType::SyllPhon) => match decode_syll_phon(&item) {
                        Some((accent_level, phonemes)) => {
                            for p in phonemes {
                                match self.build_phone(p, accent_level) {
                                    Some(phone) => self.pending_emit.push_back(phone),
                                    None => diag.raise_warning(
                                        crate::diag::Code::IrregularItem,
                                        "phone payload too large to encode",
                                    ),
                                }
                            }
                        }
                        None => diag.raise_warning(
                            crate::diag::Code::IrregularItem,
                            "syll-phon payload malformed",
                        ),
                    },
                    Some(ItemType::Cmd) => {
                        if let Some(crate::item::CmdKind::Speed) = crate::item::CmdKind::from_u8(item.info1) {
                            self.speed_level = match (item.payload.first(), item.payload.get(1)) {
                                (Some(&lo), Some(&hi)) => u16::from_le_bytes([lo, hi]),
                                _ => DEFAULT_SPEED_LEVEL,
                            };
                        }
                        self.pending_emit.push_back(item);
                    }
                    _ => self.pending_emit.push_back(item),
                }
                StepResult::Busy
            }
            Err(RingError::Eof) | Err(RingError::BufUnderflow) => StepResult::Idle,
        }
    }

    fn terminate(&mut self) {
        self.speed_level = DEFAULT_SPEED_LEVEL;
    }
}
