//! Signal-generator stand-in (SPEC_FULL §4.10): "turns `FramePar` items
//! into fixed-size `Frame` PCM items; a `Bound` item produces one frame
//! of silence, preserving the gap a real vocoder would leave."
//!
//! Grounded on the teacher's phase-accumulator oscillator
//! (`dsp/oscillator.rs`'s `Phasor`): a single `f32` phase in `[0, 1)`,
//! advanced by `freq / SAMPLE_RATE` each sample and wrapped, driving a
//! sine-ish stand-in waveform. PolyBLEP anti-aliasing and the teacher's
//! richer waveform set are deliberately not carried over — §1's
//! Non-goals place DSP/vocoder fidelity out of scope; only the frame
//! length and the voiced/unvoiced amplitude contract (§8 S3) need to
//! hold.

use crate::arena::Arena;
use crate::diag::Diagnostics;
use crate::item::{frame_par_fields, Item, ItemType, KbId};
use crate::pu::{ProcessingUnit, ResetMode, StepResult};
use crate::resource::Voice;
use crate::ring::{CharBuffer, RingError};
use crate::smoother::codebook::PdfCodebook;

pub const SAMPLE_RATE: u32 = 16_000;
/// 4ms at 16kHz; keeps one frame's payload (`FRAME_SAMPLES * 2` bytes)
/// well under the 255-byte item cap.
pub const FRAME_SAMPLES: usize = 64;

const VOICED_AMPLITUDE: f32 = 8000.0;
const MIN_FREQ_HZ: f32 = 50.0;
const MAX_FREQ_HZ: f32 = 500.0;

fn clamp_freq(f0: i16) -> f32 {
    (f0 as f32).clamp(MIN_FREQ_HZ, MAX_FREQ_HZ)
}

pub struct SignalGen {
    phase: f32,
    lfz_ceporder: usize,
    mgc_ceporder: usize,
}

impl Default for SignalGen {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGen {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            lfz_ceporder: 1,
            mgc_ceporder: 1,
        }
    }

    fn render_voiced(&mut self, freq_hz: f32) -> [i16; FRAME_SAMPLES] {
        let mut out = [0i16; FRAME_SAMPLES];
        let dt = freq_hz / SAMPLE_RATE as f32;
        for s in out.iter_mut() {
            let sample = (self.phase * std::f32::consts::TAU).sin() * VOICED_AMPLITUDE;
            *s = sample.round() as i16;
            self.phase += dt;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
        out
    }

    fn render_silence(&self) -> [i16; FRAME_SAMPLES] {
        [0i16; FRAME_SAMPLES]
    }

    fn frame_item(samples: &[i16; FRAME_SAMPLES]) -> Item {
        let mut payload = Vec::with_capacity(FRAME_SAMPLES * 2);
        for &s in samples {
            payload.extend_from_slice(&s.to_le_bytes());
        }
        Item::new(ItemType::Frame, 0, 0, payload).expect(
            "FRAME_SAMPLES*2 bytes fits the 255-byte item payload cap by construction",
        )
    }
}

impl ProcessingUnit for SignalGen {
    fn initialize(&mut self, _mode: ResetMode, voice: &Voice, arena: &Arena) {
        self.phase = 0.0;
        self.lfz_ceporder = voice
            .kb(KbId::Updflfz)
            .and_then(|kb| PdfCodebook::parse(arena.payload(kb.arena_off, kb.len)))
            .map(|cb| cb.ceporder as usize)
            .unwrap_or(1)
            .max(1);
        self.mgc_ceporder = voice
            .kb(KbId::Updfmgc)
            .and_then(|kb| PdfCodebook::parse(arena.payload(kb.arena_off, kb.len)))
            .map(|cb| cb.ceporder as usize)
            .unwrap_or(1)
            .max(1);
    }

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
                    Some(ItemType::FramePar) => {
                        match frame_par_fields(&item, self.lfz_ceporder, self.mgc_ceporder) {
                            Some((_phone_id, lfz, _mgc, _mgc_index)) => {
                                let voiced = lfz.first().map(|t| t.voiced && t.f0 > 0).unwrap_or(false);
                                let samples = if voiced {
                                    self.render_voiced(clamp_freq(lfz[0].f0))
                                } else {
                                    self.render_silence()
                                };
                                Some(Self::frame_item(&samples))
                            }
                            None => {
                                diag.raise_warning(
                                    crate::diag::Code::IrregularItem,
                                    "frame-par payload malformed",
                                );
                                None
                            }
                        }
                    }
                    Some(ItemType::Bound) => {
                        self.pending_bound_passthrough(&item, cb_out, diag)
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

    fn terminate(&mut self) {
        self.phase = 0.0;
    }
}

impl SignalGen {
    /// `Bound` items need two outputs (a silence `Frame` then the bound
    /// itself); since this stage otherwise emits at most one item per
    /// step, the silence frame is written directly here and the bound
    /// handed back to `step` for its own `put_item` call.
    fn pending_bound_passthrough(
        &self,
        item: &Item,
        cb_out: &mut CharBuffer,
        diag: &mut Diagnostics,
    ) -> Option<Item> {
        let silence = Self::frame_item(&self.render_silence());
        if let Err(e) = cb_out.put_item(&silence) {
            if !matches!(e, RingError::BufOverflow) {
                diag.raise_warning(crate::diag::Code::IrregularItem, "failed to emit silence frame");
            }
        }
        Some(item.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{bound_item, frame_par_item, BoundStrength, BoundType, F0Triple};

    fn empty_voice() -> (Arena, Voice) {
        crate::resource::test_support::minimal_voice("v")
    }

    #[test]
    fn voiced_frame_par_yields_nonzero_samples() {
        let (arena, voice) = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(512);
        let mut cb_out = CharBuffer::new(512);

        let lfz = [F0Triple { f0: 120, voiced: true, f0_copy: 120 }];
        let item = frame_par_item(1, &lfz, &[0i16], 0).unwrap();
        cb_in.put_item(&item).unwrap();

        let mut stage = SignalGen::new();
        stage.initialize(ResetMode::Full, &voice, &arena);
        stage.step(&mut cb_in, &mut cb_out, &voice, &arena, &mut diag);

        let frame = cb_out.get_item().unwrap();
        assert_eq!(frame.kind(), Some(ItemType::Frame));
        assert_eq!(frame.payload.len(), FRAME_SAMPLES * 2);
        let has_nonzero = frame.payload.chunks(2).any(|c| i16::from_le_bytes([c[0], c[1]]) != 0);
        assert!(has_nonzero);
    }

    #[test]
    fn unvoiced_frame_par_yields_all_zero_samples() {
        let (arena, voice) = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(512);
        let mut cb_out = CharBuffer::new(512);

        let lfz = [F0Triple { f0: 0, voiced: false, f0_copy: 0 }];
        let item = frame_par_item(1, &lfz, &[0i16], 0).unwrap();
        cb_in.put_item(&item).unwrap();

        let mut stage = SignalGen::new();
        stage.initialize(ResetMode::Full, &voice, &arena);
        stage.step(&mut cb_in, &mut cb_out, &voice, &arena, &mut diag);

        let frame = cb_out.get_item().unwrap();
        assert!(frame.payload.iter().all(|&b| b == 0));
    }

    #[test]
    fn bound_item_emits_silence_frame_then_bound() {
        let (arena, voice) = empty_voice();
        let mut diag = Diagnostics::new();
        let mut cb_in = CharBuffer::new(512);
        let mut cb_out = CharBuffer::new(512);

        cb_in
            .put_item(&bound_item(BoundStrength::SEnd, BoundType::T))
            .unwrap();

        let mut stage = SignalGen::new();
        stage.initialize(ResetMode::Full, &voice, &arena);
        stage.step(&mut cb_in, &mut cb_out, &voice, &arena, &mut diag);

        let silence = cb_out.get_item().unwrap();
        assert_eq!(silence.kind(), Some(ItemType::Frame));
        assert!(silence.payload.iter().all(|&b| b == 0));
        let bound = cb_out.get_item().unwrap();
        assert_eq!(bound.kind(), Some(ItemType::Bound));
    }
}
