//! Cepstral smoother stage (§4.8): the hard core of the acoustic pipeline.
//!
//! Consumes `Phone` items (each phone spread over one or more frame-states,
//! §4.8 "Codebook layout"), buffers whole-sentence windows bounded by
//! `Bound` items that terminate a sentence, smooths every LFZ and MGC
//! trajectory coefficient against the voice's `Updflfz`/`Updfmgc`
//! codebooks (see [`solver::smooth_coefficient`]), and emits one
//! `FramePar` item per output frame. Every other item type passes through
//! untouched.
//!
//! The window is capped at [`MAX_WINDOW`] frames (`picocep.c`'s
//! `PICOCEP_MAXWINLEN`): a sentence that runs longer than that is smoothed
//! in successive chunks rather than growing the buffer without bound
//! (§8 property 6).

pub mod codebook;
pub mod fixedpoint;
pub mod solver;

use std::collections::VecDeque;

use crate::arena::Arena;
use crate::diag::{Code, Diagnostics};
use crate::item::{
    bound_item, frame_par_item, phone_states, BoundStrength, BoundType, F0Triple, Item, ItemType,
};
use crate::item::KbId;
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};

use codebook::{Class, PdfCodebook};
use solver::FrameCoeffs;

/// `picocep.c`'s `PICOCEP_MAXWINLEN`.
pub const MAX_WINDOW: usize = 10000;

const LFZ_INVPOW: u32 = 31;
const MGC_INVPOW: u32 = 24;
const LFZ_DOUBLE_DEC: bool = true;
const MGC_DOUBLE_DEC: bool = false;

#[derive(Debug, Clone, Copy)]
struct FrameRef {
    phone_id: u8,
    lfz_index: u16,
    mgc_index: u16,
}

pub struct Smoother {
    window: Vec<FrameRef>,
    pending_out: VecDeque<Item>,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new()
    }
}

impl Smoother {
    pub fn new() -> Self {
        Self {
            window: Vec::new(),
            pending_out: VecDeque::new(),
        }
    }

    fn push_frame(&mut self, phone_id: u8, lfz_index: u16, mgc_index: u16, voice: &Voice, arena: &Arena, diag: &mut Diagnostics) {
        self.window.push(FrameRef { phone_id, lfz_index, mgc_index });
        if self.window.len() >= MAX_WINDOW {
            self.flush(voice, arena, diag);
        }
    }

    /// Smooths the buffered window and appends the resulting `FramePar`
    /// items to the output queue, clearing the window. A no-op on an empty
    /// window.
    fn flush(&mut self, voice: &Voice, arena: &Arena, diag: &mut Diagnostics) {
        if self.window.is_empty() {
            return;
        }
        let window = std::mem::take(&mut self.window);

        let lfz_kb = voice.kb(KbId::Updflfz).map(|kb| arena.payload(kb.arena_off, kb.len));
        let mgc_kb = voice.kb(KbId::Updfmgc).map(|kb| arena.payload(kb.arena_off, kb.len));

        let lfz_cb = lfz_kb.and_then(PdfCodebook::parse);
        let mgc_cb = mgc_kb.and_then(PdfCodebook::parse);

        let mgc_cb = match mgc_cb {
            Some(cb) => cb,
            None => {
                diag.raise_exception(Code::KbMissing, "cepstral smoother has no MGC codebook");
                return;
            }
        };

        let lfz_ceporder = lfz_cb.map(|cb| cb.ceporder as usize).unwrap_or(0);
        let mgc_ceporder = mgc_cb.ceporder as usize;

        let mgc_indices: Vec<usize> = window
            .iter()
            .map(|f| clamp_index(f.mgc_index as usize, mgc_cb.num_vectors(), diag))
            .collect();
        let lfz_indices: Vec<usize> = window
            .iter()
            .map(|f| match lfz_cb {
                Some(cb) => clamp_index(f.lfz_index as usize, cb.num_vectors(), diag),
                None => 0,
            })
            .collect();

        let voiced: Vec<bool> = mgc_indices.iter().map(|&idx| mgc_cb.voicing(idx)).collect();

        let lfz_smoothed: Vec<Vec<i32>> = (0..lfz_ceporder)
            .map(|coeff| {
                let cb = lfz_cb.expect("lfz_ceporder > 0 implies a parsed codebook");
                let frames: Vec<FrameCoeffs> = lfz_indices.iter().map(|&idx| frame_coeffs(&cb, idx, coeff)).collect();
                solver::smooth_coefficient(&frames, cb.bigpow, LFZ_INVPOW, LFZ_DOUBLE_DEC)
            })
            .collect();

        let mgc_smoothed: Vec<Vec<i32>> = (0..mgc_ceporder)
            .map(|coeff| {
                let frames: Vec<FrameCoeffs> = mgc_indices.iter().map(|&idx| frame_coeffs(&mgc_cb, idx, coeff)).collect();
                solver::smooth_coefficient(&frames, mgc_cb.bigpow, MGC_INVPOW, MGC_DOUBLE_DEC)
            })
            .collect();

        for (i, f) in window.iter().enumerate() {
            let is_voiced = voiced[i];
            let lfz_bigpow = lfz_cb.map(|cb| cb.bigpow).unwrap_or(0);
            let lfz: Vec<F0Triple> = (0..lfz_ceporder)
                .map(|c| {
                    let f0 = if is_voiced {
                        solver::round_to_int(lfz_smoothed[c][i], lfz_bigpow) as i16
                    } else {
                        0
                    };
                    F0Triple { f0, voiced: is_voiced, f0_copy: f0 }
                })
                .collect();
            let mgc: Vec<i16> = (0..mgc_ceporder)
                .map(|c| solver::round_to_int(mgc_smoothed[c][i], mgc_cb.bigpow) as i16)
                .collect();

            match frame_par_item(f.phone_id, &lfz, &mgc, f.mgc_index) {
                Some(item) => self.pending_out.push_back(item),
                None => diag.raise_warning(Code::IrregularItem, "frame parameter payload too large to encode"),
            }
        }
    }
}

/// Clamps a phone's codebook vector index into the codebook's actual range,
/// raising a warning (not an exception: §4.8 treats this as recoverable,
/// per the "vector out of range" diagnostic code) when a `Phone` item
/// references a vector the loaded codebook does not have.
fn clamp_index(idx: usize, num_vectors: usize, diag: &mut Diagnostics) -> usize {
    if num_vectors == 0 {
        return 0;
    }
    if idx >= num_vectors {
        diag.raise_warning(Code::VectorOutOfRange, "codebook vector index out of range");
        num_vectors - 1
    } else {
        idx
    }
}

/// Reads one coefficient's static/delta/delta² mean+ivar triple for frame
/// `index` out of `cb`, rescaled into `cb`'s working `bigpow` basis.
fn frame_coeffs(cb: &PdfCodebook, index: usize, coeff: usize) -> FrameCoeffs {
    let meanpow = cb.meanpow;
    let classes = [Class::Static, Class::Delta, Class::Delta2];
    let mut ivar = [0u32; 3];
    let mut mean = [0i32; 3];
    for (slot, class) in classes.iter().enumerate() {
        mean[slot] = cb.to_bigpow(cb.mean(index, coeff, *class), meanpow);
        ivar[slot] = cb.ivar(index, coeff, *class);
    }
    FrameCoeffs { ivar, mean }
}

impl ProcessingUnit for Smoother {
    fn initialize(&mut self, _mode: ResetMode, _voice: &Voice, _arena: &Arena) {
        self.window.clear();
        self.pending_out.clear();
    }

    fn step(
        &mut self,
        cb_in: &mut CharBuffer,
        cb_out: &mut CharBuffer,
        voice: &Voice,
        arena: &Arena,
        diag: &mut Diagnostics,
    ) -> StepResult {
        if let Some(item) = self.pending_out.front() {
            return match cb_out.put_item(item) {
                Ok(()) => {
                    self.pending_out.pop_front();
                    if self.pending_out.is_empty() {
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
            Ok(item) => match item.kind() {
                Some(ItemType::Phone) => {
                    let states = phone_states(&item);
                    for s in states {
                        let frames = s.frames.max(1);
                        for _ in 0..frames {
                            self.push_frame(item.info1, s.lfz_index, s.mgc_index, voice, arena, diag);
                        }
                    }
                    if diag.has_exception() {
                        StepResult::Error
                    } else {
                        StepResult::Busy
                    }
                }
                Some(ItemType::Bound) => {
                    let terminates = BoundStrength::from_u8(item.info1)
                        .map(BoundStrength::terminates_sentence)
                        .unwrap_or(false);
                    if terminates {
                        self.flush(voice, arena, diag);
                    }
                    let kind = BoundType::from_u8(item.info2).unwrap_or(BoundType::P);
                    let strength = BoundStrength::from_u8(item.info1).unwrap_or(BoundStrength::Phr1);
                    self.pending_out.push_back(bound_item(strength, kind));
                    if diag.has_exception() {
                        StepResult::Error
                    } else {
                        StepResult::Busy
                    }
                }
                _ => {
                    self.pending_out.push_back(item);
                    StepResult::Busy
                }
            },
            Err(RingError::Eof) | Err(RingError::BufUnderflow) => StepResult::Idle,
        }
    }

    fn terminate(&mut self) {
        self.window.clear();
        self.pending_out.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{bound_item, phone_item, BoundStrength, BoundType, PhoneState};
    use crate::resource::test_support::build_resource_bytes;
    use crate::resource::ResourceManager;

    fn voice_with_codebooks(ceporder: u8) -> (ResourceManager, Arena, Voice) {
        let mut arena = Arena::new(1 << 20).unwrap();
        let mut mgr = ResourceManager::new();
        let lfz_bytes = codebook::test_codebook_bytes(ceporder, 8, 8, 2, &[(1200, 10), (1200, 10), (1200, 10), (1200, 10)]);
        let mgc_bytes = codebook::test_codebook_bytes(ceporder, 8, 8, 2, &[(500, 20), (500, 20), (500, 20), (500, 20)]);
        let bytes = build_resource_bytes(&[(KbId::Updflfz, &lfz_bytes), (KbId::Updfmgc, &mgc_bytes)]);
        let mut cursor = std::io::Cursor::new(bytes);
        mgr.load_resource("voice-data", &mut cursor, &mut arena).unwrap();
        mgr.create_voice_definition("v").unwrap();
        mgr.add_resource_to_voice_definition("v", "voice-data").unwrap();
        let voice = mgr.create_voice("v").unwrap();
        (mgr, arena, voice)
    }

    #[test]
    fn sentence_boundary_triggers_exactly_one_flush() {
        let (_mgr, arena, voice) = voice_with_codebooks(1);
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(4096);
        let mut cb_out = CharBuffer::new(4096);

        let states = [
            PhoneState { frames: 2, lfz_index: 0, mgc_index: 0 },
            PhoneState { frames: 2, lfz_index: 1, mgc_index: 1 },
        ];
        cb_in.put_item(&phone_item(1, &states).unwrap()).unwrap();
        cb_in.put_item(&bound_item(BoundStrength::SEnd, BoundType::T)).unwrap();

        let mut smoother = Smoother::new();
        smoother.initialize(ResetMode::Full, &voice, &arena);

        let mut frame_pars = 0;
        let mut bounds = 0;
        loop {
            match smoother.step(&mut cb_in, &mut cb_out, &voice, &arena, &mut diag) {
                StepResult::Idle => break,
                StepResult::Error => panic!("smoother error: {:?}", diag.get_exception_message()),
                _ => {}
            }
        }
        while let Ok(item) = cb_out.get_item() {
            match item.kind() {
                Some(ItemType::FramePar) => frame_pars += 1,
                Some(ItemType::Bound) => bounds += 1,
                _ => {}
            }
        }
        assert_eq!(frame_pars, 4);
        assert_eq!(bounds, 1);
        assert!(!diag.has_exception());
    }

    #[test]
    fn unvoiced_frame_emits_zero_f0() {
        let mut arena = Arena::new(1 << 20).unwrap();
        let mut mgr = ResourceManager::new();
        let mgc_bytes = codebook::test_codebook_bytes(1, 8, 8, 2, &[(500, 20)]);
        // overwrite the voicing byte of the single vector with 0 (unvoiced).
        let mut mgc_bytes = mgc_bytes;
        let voicing_idx = 8; // header is 8 bytes, voicing byte follows immediately
        mgc_bytes[voicing_idx] = 0;
        let lfz_bytes = codebook::test_codebook_bytes(1, 8, 8, 2, &[(1200, 10)]);
        let bytes = build_resource_bytes(&[(KbId::Updflfz, &lfz_bytes), (KbId::Updfmgc, &mgc_bytes)]);
        let mut cursor = std::io::Cursor::new(bytes);
        mgr.load_resource("voice-data", &mut cursor, &mut arena).unwrap();
        mgr.create_voice_definition("v").unwrap();
        mgr.add_resource_to_voice_definition("v", "voice-data").unwrap();
        let voice = mgr.create_voice("v").unwrap();

        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(4096);
        let mut cb_out = CharBuffer::new(4096);
        let states = [PhoneState { frames: 1, lfz_index: 0, mgc_index: 0 }];
        cb_in.put_item(&phone_item(3, &states).unwrap()).unwrap();
        cb_in.put_item(&bound_item(BoundStrength::Term, BoundType::T)).unwrap();

        let mut smoother = Smoother::new();
        smoother.initialize(ResetMode::Full, &voice, &arena);
        loop {
            match smoother.step(&mut cb_in, &mut cb_out, &voice, &arena, &mut diag) {
                StepResult::Idle => break,
                StepResult::Error => panic!("smoother error"),
                _ => {}
            }
        }
        let frame = cb_out.get_item().unwrap();
        assert_eq!(frame.kind(), Some(ItemType::FramePar));
        let (_, lfz, _, _) = crate::item::frame_par_fields(&frame, 1, 1).unwrap();
        assert!(!lfz[0].voiced);
        assert_eq!(lfz[0].f0, 0);
    }
}
