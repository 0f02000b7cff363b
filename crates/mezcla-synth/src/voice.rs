//! Voice and voice-pool management for polyphonic synthesis.
//!
//! A [`Voice`] is the composition of two oscillators, a control-rate-ramped
//! lowpass filter, a formant resonator, amplitude and filter envelopes, two
//! LFOs, and a modulation-offset ramp. The [`VoiceManager`] owns a
//! preallocated pool of voices and maps incoming notes onto them with a
//! deterministic stealing policy.
//!
//! Rendering is additive: each voice accumulates into the bus of the channel
//! that owns its note, so a FREE voice contributes exactly zero by never
//! touching the buffer.

use crate::envelope::{AdsrEnvelope, EnvelopeCurve, EnvelopeState};
use crate::mod_matrix::{ModDestination, ModMatrix, ModOffsetRamp, ModSources};
use crate::oscillator::{Oscillator, Waveform};
use libm::powf;
use mezcla_core::{
    Biquad, CoeffRamp, FormantResonator, Lfo, LfoWaveform, SmoothedParam, lowpass_coefficients,
};

#[cfg(not(feature = "std"))]
extern crate alloc;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Identity of a sounding note: MIDI channel plus note number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoteId {
    /// MIDI channel, 0..=15.
    pub channel: u8,
    /// MIDI note number, 0..=127.
    pub note: u8,
}

impl NoteId {
    /// Construct, masking the channel to 0..=15 and the note to 0..=127.
    pub fn new(channel: u8, note: u8) -> Self {
        Self {
            channel: channel & 0x0F,
            note: note & 0x7F,
        }
    }
}

/// Lifecycle state of a voice, derived from its amplitude envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceState {
    /// Not sounding; available for allocation.
    Free,
    /// Envelope in its attack phase.
    Attacking,
    /// Envelope in decay or sustain; gate still held.
    Sustaining,
    /// Gate released; envelope decaying to silence.
    Releasing,
}

/// Per-block synthesis configuration, assembled by the engine from the
/// parameter store and handed to the voice pool as a plain value snapshot.
#[derive(Debug, Clone)]
pub struct SynthParams {
    /// Oscillator 1 waveform.
    pub osc1_waveform: Waveform,
    /// Oscillator 2 waveform.
    pub osc2_waveform: Waveform,
    /// Oscillator 1 level, [0, 1].
    pub osc1_level: f32,
    /// Oscillator 2 level, [0, 1].
    pub osc2_level: f32,
    /// Oscillator 2 detune in cents.
    pub osc2_detune_cents: f32,
    /// Unison detune spread in cents; each voice randomizes within ±spread.
    pub unison_spread_cents: f32,
    /// Glide (portamento) time in milliseconds; 0 disables.
    pub glide_ms: f32,
    /// Legato: overlapping notes on a channel share envelopes and glide.
    pub legato: bool,

    /// Filter cutoff, normalized [0, 1] over 20 Hz..20 kHz (log).
    pub filter_cutoff: f32,
    /// Filter resonance Q, [0.5, 10].
    pub filter_resonance: f32,
    /// Filter envelope amount, normalized cutoff offset [-1, 1].
    pub filter_env_amount: f32,

    /// Amplitude envelope attack in milliseconds.
    pub amp_attack_ms: f32,
    /// Amplitude envelope decay in milliseconds.
    pub amp_decay_ms: f32,
    /// Amplitude envelope sustain level [0, 1].
    pub amp_sustain: f32,
    /// Amplitude envelope release in milliseconds.
    pub amp_release_ms: f32,

    /// Filter envelope attack in milliseconds.
    pub filter_attack_ms: f32,
    /// Filter envelope decay in milliseconds.
    pub filter_decay_ms: f32,
    /// Filter envelope sustain level [0, 1].
    pub filter_sustain: f32,
    /// Filter envelope release in milliseconds.
    pub filter_release_ms: f32,

    /// Transition curve for both envelopes.
    pub env_curve: EnvelopeCurve,
    /// Velocity sensitivity for the amplitude envelope, [0, 1].
    pub velocity_sensitivity: f32,

    /// LFO 1 rate in Hz.
    pub lfo1_rate_hz: f32,
    /// LFO 1 waveform.
    pub lfo1_waveform: LfoWaveform,
    /// LFO 2 rate in Hz.
    pub lfo2_rate_hz: f32,
    /// LFO 2 waveform.
    pub lfo2_waveform: LfoWaveform,

    /// Formant resonator center frequency in Hz.
    pub formant_freq_hz: f32,
    /// Formant resonator bandwidth in Hz.
    pub formant_bandwidth_hz: f32,
    /// Formant wet mix, [0, 1]; 0 bypasses the resonator.
    pub formant_mix: f32,
}

impl Default for SynthParams {
    fn default() -> Self {
        Self {
            osc1_waveform: Waveform::Sine,
            osc2_waveform: Waveform::Sine,
            osc1_level: 1.0,
            osc2_level: 0.0,
            osc2_detune_cents: 0.0,
            unison_spread_cents: 0.0,
            glide_ms: 0.0,
            legato: false,
            filter_cutoff: 1.0,
            filter_resonance: 0.707,
            filter_env_amount: 0.0,
            amp_attack_ms: 10.0,
            amp_decay_ms: 100.0,
            amp_sustain: 0.7,
            amp_release_ms: 200.0,
            filter_attack_ms: 10.0,
            filter_decay_ms: 100.0,
            filter_sustain: 0.7,
            filter_release_ms: 200.0,
            env_curve: EnvelopeCurve::Exponential,
            velocity_sensitivity: 0.0,
            lfo1_rate_hz: 5.0,
            lfo1_waveform: LfoWaveform::Sine,
            lfo2_rate_hz: 0.5,
            lfo2_waveform: LfoWaveform::Sine,
            formant_freq_hz: 1000.0,
            formant_bandwidth_hz: 200.0,
            formant_mix: 0.0,
        }
    }
}

/// Convert MIDI note number to frequency in Hz (A4 = 440 Hz).
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * powf(2.0, (f32::from(note) - 69.0) / 12.0)
}

/// Convert cents to a frequency ratio (100 cents = 1 semitone).
#[inline]
pub fn cents_to_ratio(cents: f32) -> f32 {
    powf(2.0, cents / 1200.0)
}

/// Map normalized cutoff [0, 1] onto 20 Hz..20 kHz logarithmically.
#[inline]
pub fn cutoff_to_hz(normalized: f32) -> f32 {
    20.0 * powf(1000.0, normalized.clamp(0.0, 1.0))
}

/// A single polyphonic voice.
#[derive(Debug, Clone)]
pub struct Voice {
    osc1: Oscillator,
    osc2: Oscillator,
    filter: Biquad,
    filter_ramp: CoeffRamp,
    formant: FormantResonator,
    amp_env: AdsrEnvelope,
    filter_env: AdsrEnvelope,
    lfo1: Lfo,
    lfo2: Lfo,
    sources: ModSources,
    offset_ramp: ModOffsetRamp,

    /// Glide state: current pitch in Hz, approached exponentially.
    glide: SmoothedParam,

    note: NoteId,
    velocity: f32,
    /// Samples elapsed since the trigger.
    age_samples: u64,
    /// Randomized unison detune for this trigger, in cents.
    unison_detune_cents: f32,

    sample_rate: f32,
}

impl Voice {
    /// Create a silent voice at the given sample rate.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            osc1: Oscillator::new(sample_rate),
            osc2: Oscillator::new(sample_rate),
            filter: Biquad::new(),
            filter_ramp: CoeffRamp::new(lowpass_coefficients(20000.0, 0.707, sample_rate)),
            formant: FormantResonator::new(sample_rate),
            amp_env: AdsrEnvelope::new(sample_rate),
            filter_env: AdsrEnvelope::new(sample_rate),
            lfo1: Lfo::new(sample_rate, 5.0),
            lfo2: Lfo::new(sample_rate, 0.5),
            sources: ModSources::new(),
            offset_ramp: ModOffsetRamp::new(),
            glide: SmoothedParam::new(440.0),
            note: NoteId::new(0, 0),
            velocity: 0.0,
            age_samples: 0,
            unison_detune_cents: 0.0,
            sample_rate,
        }
    }

    /// Update the sample rate on every component.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.osc1.set_sample_rate(sample_rate);
        self.osc2.set_sample_rate(sample_rate);
        self.formant.set_sample_rate(sample_rate);
        self.amp_env.set_sample_rate(sample_rate);
        self.filter_env.set_sample_rate(sample_rate);
        self.lfo1.set_sample_rate(sample_rate);
        self.lfo2.set_sample_rate(sample_rate);
        self.glide.set_sample_rate(sample_rate);
    }

    /// Lifecycle state, derived from the amplitude envelope.
    pub fn state(&self) -> VoiceState {
        match self.amp_env.state() {
            EnvelopeState::Off => VoiceState::Free,
            EnvelopeState::Attack => VoiceState::Attacking,
            EnvelopeState::Decay | EnvelopeState::Sustain => VoiceState::Sustaining,
            EnvelopeState::Release => VoiceState::Releasing,
        }
    }

    /// True when the voice can be allocated without stealing.
    pub fn is_free(&self) -> bool {
        self.state() == VoiceState::Free
    }

    /// The note this voice is (or was last) sounding.
    pub fn note(&self) -> NoteId {
        self.note
    }

    /// Normalized velocity of the trigger.
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Samples elapsed since the trigger.
    pub fn age_samples(&self) -> u64 {
        self.age_samples
    }

    /// Current amplitude envelope level — the stealing score for sustaining
    /// voices.
    pub fn amplitude(&self) -> f32 {
        self.amp_env.level()
    }

    /// Trigger this voice for a note.
    ///
    /// Resets oscillator phases (waveform switches land here, so any
    /// discontinuity is masked by the attack), restarts both envelopes from
    /// the current level, and snaps or glides pitch depending on whether the
    /// voice was already sounding.
    pub fn trigger(
        &mut self,
        note: NoteId,
        velocity: f32,
        unison_detune_cents: f32,
        params: &SynthParams,
    ) {
        let was_active = !self.is_free();

        self.note = note;
        self.velocity = velocity.clamp(0.0, 1.0);
        self.age_samples = 0;
        self.unison_detune_cents = unison_detune_cents;

        self.apply_params(params);

        let freq = midi_to_freq(note.note);
        self.glide.set_smoothing_time_ms(params.glide_ms);
        if was_active && params.glide_ms > 0.0 {
            self.glide.set_target(freq);
        } else {
            self.glide.set_immediate(freq);
        }

        self.osc1.reset();
        self.osc2.reset();
        if !was_active {
            self.filter.clear();
            self.formant.reset();
            self.lfo1.reset();
            self.lfo2.reset();
            self.offset_ramp.snap(&[0.0; crate::mod_matrix::NUM_DESTINATIONS]);
        }

        self.sources.velocity = self.velocity;
        self.sources.set_key_track_from_note(note.note);

        self.amp_env.gate_on(self.velocity);
        self.filter_env.gate_on(self.velocity);
    }

    /// Legato pitch update: glide to a new note without retriggering.
    pub fn retarget(&mut self, note: NoteId, params: &SynthParams) {
        self.note = note;
        self.glide.set_smoothing_time_ms(params.glide_ms);
        let freq = midi_to_freq(note.note);
        if params.glide_ms > 0.0 {
            self.glide.set_target(freq);
        } else {
            self.glide.set_immediate(freq);
        }
        self.sources.set_key_track_from_note(note.note);
    }

    /// Move the voice to its release phase.
    pub fn release(&mut self) {
        self.amp_env.gate_off();
        self.filter_env.gate_off();
    }

    /// Force the voice to FREE immediately.
    pub fn kill(&mut self) {
        self.amp_env.reset();
        self.filter_env.reset();
        self.filter.clear();
        self.formant.reset();
    }

    fn apply_params(&mut self, params: &SynthParams) {
        self.osc1.set_waveform(params.osc1_waveform);
        self.osc2.set_waveform(params.osc2_waveform);

        self.amp_env.set_attack_ms(params.amp_attack_ms);
        self.amp_env.set_decay_ms(params.amp_decay_ms);
        self.amp_env.set_sustain(params.amp_sustain);
        self.amp_env.set_release_ms(params.amp_release_ms);
        self.amp_env.set_curve(params.env_curve);
        self.amp_env
            .set_velocity_sensitivity(params.velocity_sensitivity);

        self.filter_env.set_attack_ms(params.filter_attack_ms);
        self.filter_env.set_decay_ms(params.filter_decay_ms);
        self.filter_env.set_sustain(params.filter_sustain);
        self.filter_env.set_release_ms(params.filter_release_ms);
        self.filter_env.set_curve(params.env_curve);

        self.lfo1.set_waveform(params.lfo1_waveform);
        self.lfo2.set_waveform(params.lfo2_waveform);
    }

    /// Render one control period and accumulate into `out`.
    ///
    /// `out` is the owning channel's bus segment; its length is at most one
    /// control period. A FREE voice returns before touching the buffer.
    #[allow(clippy::too_many_arguments)]
    pub fn process_period(
        &mut self,
        matrix: &ModMatrix,
        params: &SynthParams,
        macros: &[f32; 8],
        pitch_bend_semitones: f32,
        out: &mut [f32],
    ) {
        if self.is_free() {
            return;
        }

        let len = out.len() as u32;

        // Control-rate work: advance LFOs to the period boundary, refresh
        // source values, re-evaluate the matrix, retarget the ramps.
        let prev_offsets = *self.offset_ramp.current();
        self.lfo1.set_frequency(
            params.lfo1_rate_hz + prev_offsets[ModDestination::Lfo1Rate.index()] * 10.0,
        );
        self.lfo2.set_frequency(
            params.lfo2_rate_hz + prev_offsets[ModDestination::Lfo2Rate.index()] * 10.0,
        );
        self.sources.lfo1 = self.lfo1.advance_by(len);
        self.sources.lfo2 = self.lfo2.advance_by(len);
        self.sources.env_amp = self.amp_env.level();
        self.sources.env_filter = self.filter_env.level();
        self.sources.macros = *macros;

        let offsets = matrix.evaluate(&self.sources);
        self.offset_ramp.retarget(&offsets);

        // Pitch ratio for this period: bend plus matrix pitch offset, where
        // a full-scale offset spans one octave.
        let pitch_semis =
            pitch_bend_semitones + offsets[ModDestination::OscPitch.index()] * 12.0;
        let pitch_ratio = cents_to_ratio(pitch_semis * 100.0);
        let unison_up = cents_to_ratio(self.unison_detune_cents);
        let osc2_ratio = cents_to_ratio(params.osc2_detune_cents - self.unison_detune_cents);

        // Filter target for this period, from base cutoff, filter envelope
        // and matrix offset, ramped across the period.
        let cutoff_norm = (params.filter_cutoff
            + self.filter_env.level() * params.filter_env_amount
            + offsets[ModDestination::FilterCutoff.index()])
        .clamp(0.0, 1.0);
        let q = (params.filter_resonance
            + offsets[ModDestination::FilterResonance.index()] * 5.0)
            .clamp(0.5, 10.0);
        self.filter_ramp.retarget(
            lowpass_coefficients(cutoff_to_hz(cutoff_norm), q, self.sample_rate),
            len,
        );

        self.formant
            .set_parameters(params.formant_freq_hz, params.formant_bandwidth_hz);
        let formant_mix = params.formant_mix.clamp(0.0, 1.0);

        for slot in out.iter_mut() {
            let offsets = self.offset_ramp.advance();
            let amp_offset = offsets[ModDestination::Amplitude.index()];

            let base_freq = self.glide.advance() * pitch_ratio;
            self.osc1.set_frequency(base_freq * unison_up);
            self.osc2.set_frequency(base_freq * osc2_ratio);

            let raw = self.osc1.advance() * params.osc1_level
                + self.osc2.advance() * params.osc2_level;

            self.filter.set_coeffs(self.filter_ramp.advance());
            let filtered = self.filter.process(raw);

            let shaped = if formant_mix > 0.0 {
                let wet = self.formant.process(filtered);
                filtered + (wet - filtered) * formant_mix
            } else {
                filtered
            };

            let env = self.amp_env.advance();
            self.filter_env.advance();
            let gain = env * (1.0 + amp_offset).max(0.0);

            *slot += shaped * gain;
        }

        self.age_samples += u64::from(len);
    }
}

/// Voice pool with deterministic allocation and stealing.
///
/// # Stealing policy
///
/// 1. A FREE voice, if any.
/// 2. Else the oldest RELEASING voice.
/// 3. Else the lowest-amplitude held voice, ties broken by greatest age.
///
/// # Example
///
/// ```rust
/// use mezcla_synth::{NoteId, SynthParams, VoiceManager};
///
/// let params = SynthParams::default();
/// let mut mgr = VoiceManager::new(48000.0, 8);
/// mgr.note_on(NoteId::new(0, 60), 0.8, &params);
/// assert_eq!(mgr.active_voice_count(), 1);
/// mgr.note_off(NoteId::new(0, 60));
/// ```
#[derive(Debug)]
pub struct VoiceManager {
    voices: Vec<Voice>,
    sample_rate: f32,
    /// Xorshift state for unison detune randomization.
    rng_state: u32,
    /// Countdown until remaining voices are forced FREE after AllNotesOff.
    panic_deadline: Option<u64>,
    /// Voices forcibly freed by the panic deadline since the last take.
    forced_frees: u32,
}

impl VoiceManager {
    /// Create a pool of `polyphony` preallocated voices.
    ///
    /// This is the only allocation the synthesis pipeline ever performs;
    /// call it from the control thread at prepare time.
    pub fn new(sample_rate: f32, polyphony: usize) -> Self {
        let polyphony = polyphony.max(1);
        let mut voices = Vec::with_capacity(polyphony);
        for _ in 0..polyphony {
            voices.push(Voice::new(sample_rate));
        }
        Self {
            voices,
            sample_rate,
            rng_state: 0x9E3779B9,
            panic_deadline: None,
            forced_frees: 0,
        }
    }

    /// Update the sample rate on every voice.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for voice in &mut self.voices {
            voice.set_sample_rate(sample_rate);
        }
    }

    /// Pool size.
    pub fn polyphony(&self) -> usize {
        self.voices.len()
    }

    /// Number of voices currently not FREE.
    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|v| !v.is_free()).count()
    }

    /// Read access to the voices.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// True when any non-releasing voice holds the note.
    pub fn holds_note(&self, note: NoteId) -> bool {
        self.voices
            .iter()
            .any(|v| !v.is_free() && v.state() != VoiceState::Releasing && v.note() == note)
    }

    /// Handle a note-on.
    pub fn note_on(&mut self, note: NoteId, velocity: f32, params: &SynthParams) {
        self.panic_deadline = None;

        // Legato: an already-held voice on the channel glides instead of
        // retriggering.
        if params.legato {
            if let Some(voice) = self
                .voices
                .iter_mut()
                .find(|v| v.note().channel == note.channel && v.amp_env_held())
            {
                voice.retarget(note, params);
                return;
            }
        }

        let detune = if params.unison_spread_cents > 0.0 {
            (self.next_random() * 2.0 - 1.0) * params.unison_spread_cents
        } else {
            0.0
        };

        let idx = self.allocate();
        self.voices[idx].trigger(note, velocity, detune, params);
    }

    /// Handle a note-off: release every held voice on the note.
    pub fn note_off(&mut self, note: NoteId) {
        for voice in &mut self.voices {
            if !voice.is_free() && voice.state() != VoiceState::Releasing && voice.note() == note {
                voice.release();
            }
        }
    }

    /// Release every sounding voice. Voices that have not reached FREE
    /// after twice the configured release time are forced there.
    pub fn all_notes_off(&mut self, params: &SynthParams) {
        let mut any = false;
        for voice in &mut self.voices {
            if !voice.is_free() {
                voice.release();
                any = true;
            }
        }
        if any {
            let release_samples =
                (params.amp_release_ms * self.sample_rate / 1000.0).max(1.0) as u64;
            self.panic_deadline = Some(release_samples * 2);
        }
    }

    /// Force every voice FREE immediately and clear panic state.
    pub fn reset(&mut self) {
        for voice in &mut self.voices {
            voice.kill();
        }
        self.panic_deadline = None;
    }

    /// Number of voices forcibly freed since the last call.
    pub fn take_forced_frees(&mut self) -> u32 {
        core::mem::take(&mut self.forced_frees)
    }

    /// Render one control period into the flat channel-bus buffer.
    ///
    /// `buses` is laid out channel-major: channel `c` occupies
    /// `buses[c * block_size .. (c + 1) * block_size]`, and this call fills
    /// the `offset..offset + len` window of each channel a voice plays into.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        matrix: &ModMatrix,
        params: &SynthParams,
        macros: &[f32; 8],
        pitch_bend: &[f32; 16],
        buses: &mut [f32],
        block_size: usize,
        offset: usize,
        len: usize,
        channels: usize,
    ) {
        for voice in &mut self.voices {
            if voice.is_free() {
                continue;
            }
            let ch = usize::from(voice.note().channel);
            if ch >= channels {
                continue;
            }
            let start = ch * block_size + offset;
            let bend = pitch_bend[usize::from(voice.note().channel)];
            voice.process_period(matrix, params, macros, bend, &mut buses[start..start + len]);
        }

        if let Some(deadline) = self.panic_deadline {
            let remaining = deadline.saturating_sub(len as u64);
            if remaining == 0 {
                for voice in &mut self.voices {
                    if !voice.is_free() {
                        voice.kill();
                        self.forced_frees += 1;
                    }
                }
                self.panic_deadline = None;
            } else {
                self.panic_deadline = Some(remaining);
            }
        }
    }

    /// Pick a voice index for a new note per the stealing policy.
    fn allocate(&mut self) -> usize {
        if let Some(idx) = self.voices.iter().position(|v| v.is_free()) {
            return idx;
        }

        // Oldest releasing voice first.
        if let Some((idx, _)) = self
            .voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.state() == VoiceState::Releasing)
            .max_by_key(|(_, v)| v.age_samples())
        {
            return idx;
        }

        // Lowest amplitude; greatest age breaks ties.
        self.voices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                a.amplitude()
                    .partial_cmp(&b.amplitude())
                    .unwrap_or(core::cmp::Ordering::Equal)
                    .then(b.age_samples().cmp(&a.age_samples()))
            })
            .map_or(0, |(idx, _)| idx)
    }

    fn next_random(&mut self) -> f32 {
        // Xorshift32
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        (x >> 8) as f32 / 16_777_216.0
    }
}

impl Voice {
    /// True while the gate is held (attacking or sustaining).
    fn amp_env_held(&self) -> bool {
        matches!(
            self.state(),
            VoiceState::Attacking | VoiceState::Sustaining
        )
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;
    use alloc::vec;

    use super::*;
    use crate::mod_matrix::{ModConnection, ModSource};

    const SR: f32 = 48000.0;

    fn render_once(mgr: &mut VoiceManager, params: &SynthParams, buses: &mut [f32], bs: usize) {
        let matrix = ModMatrix::new();
        let macros = [0.0; 8];
        let bend = [0.0; 16];
        let mut offset = 0;
        while offset < bs {
            let len = 32.min(bs - offset);
            mgr.render(
                &matrix, params, &macros, &bend, buses, bs, offset, len, 2,
            );
            offset += len;
        }
    }

    #[test]
    fn midi_pitch_helpers() {
        assert!((midi_to_freq(69) - 440.0).abs() < 0.01);
        assert!((midi_to_freq(60) - 261.63).abs() < 0.1);
        assert!((cents_to_ratio(1200.0) - 2.0).abs() < 0.001);
        assert!((cents_to_ratio(0.0) - 1.0).abs() < 0.001);
    }

    #[test]
    fn cutoff_mapping_spans_audio_band() {
        assert!((cutoff_to_hz(0.0) - 20.0).abs() < 0.1);
        assert!((cutoff_to_hz(1.0) - 20000.0).abs() < 10.0);
        assert!((cutoff_to_hz(0.5) - 632.45).abs() < 1.0);
    }

    #[test]
    fn free_voice_contributes_exact_zero() {
        let params = SynthParams::default();
        let mut mgr = VoiceManager::new(SR, 4);
        let mut buses = vec![0.0_f32; 2 * 128];
        render_once(&mut mgr, &params, &mut buses, 128);
        assert!(buses.iter().all(|&s| s == 0.0), "free pool must be silent");
    }

    #[test]
    fn triggered_voice_produces_output_on_its_channel() {
        let params = SynthParams::default();
        let mut mgr = VoiceManager::new(SR, 4);
        mgr.note_on(NoteId::new(1, 60), 1.0, &params);

        let mut buses = vec![0.0_f32; 2 * 256];
        render_once(&mut mgr, &params, &mut buses, 256);

        let ch0: f32 = buses[..256].iter().map(|s| s.abs()).sum();
        let ch1: f32 = buses[256..].iter().map(|s| s.abs()).sum();
        assert_eq!(ch0, 0.0, "channel 0 untouched");
        assert!(ch1 > 0.0, "channel 1 should sound");
    }

    #[test]
    fn polyphony_is_bounded() {
        let params = SynthParams::default();
        let mut mgr = VoiceManager::new(SR, 4);
        for (i, note) in [60, 62, 64, 65, 67].iter().enumerate() {
            mgr.note_on(NoteId::new(0, *note), 1.0, &params);
            assert!(
                mgr.active_voice_count() <= 4,
                "voice count exceeded polyphony after note {i}"
            );
        }
        assert_eq!(mgr.active_voice_count(), 4);
    }

    #[test]
    fn stealing_takes_oldest_note() {
        // Short attack/decay so every voice settles to the same sustain
        // amplitude; the age tiebreak then decides the steal.
        let mut params = SynthParams::default();
        params.amp_attack_ms = 1.0;
        params.amp_decay_ms = 1.0;

        let mut mgr = VoiceManager::new(SR, 4);
        let mut buses = vec![0.0_f32; 1 * 128];
        let matrix = ModMatrix::new();

        for note in [60, 62, 64, 65] {
            mgr.note_on(NoteId::new(0, note), 1.0, &params);
            // Age the sounding voices past attack and decay.
            for _ in 0..4 {
                buses.fill(0.0);
                mgr.render(
                    &matrix,
                    &params,
                    &[0.0; 8],
                    &[0.0; 16],
                    &mut buses,
                    128,
                    0,
                    32,
                    1,
                );
            }
        }

        mgr.note_on(NoteId::new(0, 67), 1.0, &params);
        assert!(
            !mgr.holds_note(NoteId::new(0, 60)),
            "oldest note should have been stolen"
        );
        assert!(mgr.holds_note(NoteId::new(0, 67)));
    }

    #[test]
    fn releasing_voices_are_stolen_first() {
        let params = SynthParams::default();
        let mut mgr = VoiceManager::new(SR, 2);

        mgr.note_on(NoteId::new(0, 60), 1.0, &params);
        mgr.note_on(NoteId::new(0, 64), 1.0, &params);
        mgr.note_off(NoteId::new(0, 64));

        // 64 is releasing; the next note must take its voice, not 60's.
        mgr.note_on(NoteId::new(0, 67), 1.0, &params);
        assert!(mgr.holds_note(NoteId::new(0, 60)));
        assert!(mgr.holds_note(NoteId::new(0, 67)));
    }

    #[test]
    fn note_off_releases_all_matching_voices() {
        let params = SynthParams::default();
        let mut mgr = VoiceManager::new(SR, 4);
        mgr.note_on(NoteId::new(0, 60), 1.0, &params);
        mgr.note_on(NoteId::new(0, 64), 1.0, &params);

        mgr.note_off(NoteId::new(0, 60));
        assert!(!mgr.holds_note(NoteId::new(0, 60)));
        assert!(mgr.holds_note(NoteId::new(0, 64)));
    }

    #[test]
    fn all_notes_off_reaches_free_within_deadline() {
        let mut params = SynthParams::default();
        params.amp_release_ms = 50.0;

        let mut mgr = VoiceManager::new(SR, 4);
        mgr.note_on(NoteId::new(0, 60), 1.0, &params);
        mgr.note_on(NoteId::new(0, 64), 1.0, &params);
        mgr.all_notes_off(&params);

        // 2 x 50 ms at 48 kHz = 4800 samples of periods.
        let mut buses = vec![0.0_f32; 1 * 128];
        let matrix = ModMatrix::new();
        let mut rendered = 0;
        while rendered < 4900 {
            buses.fill(0.0);
            mgr.render(
                &matrix,
                &params,
                &[0.0; 8],
                &[0.0; 16],
                &mut buses,
                128,
                0,
                32,
                1,
            );
            rendered += 32;
        }
        assert_eq!(mgr.active_voice_count(), 0, "all voices must reach FREE");
    }

    #[test]
    fn legato_glides_instead_of_retriggering() {
        let mut params = SynthParams::default();
        params.legato = true;
        params.glide_ms = 100.0;

        let mut mgr = VoiceManager::new(SR, 4);
        mgr.note_on(NoteId::new(0, 60), 1.0, &params);
        assert_eq!(mgr.active_voice_count(), 1);

        mgr.note_on(NoteId::new(0, 72), 1.0, &params);
        assert_eq!(
            mgr.active_voice_count(),
            1,
            "legato must reuse the held voice"
        );
        assert!(mgr.holds_note(NoteId::new(0, 72)));
    }

    #[test]
    fn modulated_amplitude_follows_macro() {
        let params = SynthParams::default();
        let mut matrix = ModMatrix::new();
        matrix.add(ModConnection::new(
            ModSource::Macro(0),
            ModDestination::Amplitude,
            -1.0,
        ));

        let mut mgr = VoiceManager::new(SR, 1);
        mgr.note_on(NoteId::new(0, 69), 1.0, &params);

        // With macro 0 at 1.0 and amount -1.0, gain becomes (1 - 1) = 0.
        let macros = [1.0; 8];
        let bend = [0.0; 16];
        let mut buses = vec![0.0_f32; 256];
        // First periods still ramp the offset in; skip them, then measure.
        for _ in 0..8 {
            buses.fill(0.0);
            mgr.render(&matrix, &params, &macros, &bend, &mut buses, 256, 0, 32, 1);
        }
        buses.fill(0.0);
        mgr.render(&matrix, &params, &macros, &bend, &mut buses, 256, 0, 32, 1);
        let energy: f32 = buses.iter().map(|s| s.abs()).sum();
        assert!(energy < 1e-3, "fully negative amp mod should mute: {energy}");
    }

    #[test]
    fn pitch_bend_shifts_frequency() {
        let params = SynthParams::default();
        let matrix = ModMatrix::new();
        let macros = [0.0; 8];

        // Render one second at bend = +12 semitones and count crossings.
        let mut bend = [0.0_f32; 16];
        bend[0] = 12.0;

        let mut mgr = VoiceManager::new(SR, 1);
        mgr.note_on(NoteId::new(0, 69), 1.0, &params); // A4 = 440

        let mut buses = vec![0.0_f32; 32];
        let mut crossings = 0;
        let mut prev = 0.0_f32;
        for _ in 0..(48000 / 32) {
            buses.fill(0.0);
            mgr.render(&matrix, &params, &macros, &bend, &mut buses, 32, 0, 32, 1);
            for &s in buses.iter() {
                if prev <= 0.0 && s > 0.0 {
                    crossings += 1;
                }
                prev = s;
            }
        }
        assert!(
            (crossings - 880_i32).abs() <= 5,
            "expected ~880 Hz with +12 bend, got {crossings}"
        );
    }
}
