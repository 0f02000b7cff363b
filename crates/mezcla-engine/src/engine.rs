//! The engine: control handle + audio processor.
//!
//! [`Engine::new`] builds the parameter registry, the event queue, the
//! snapshot cells and the preallocated voice/strip pools. [`Engine::prepare`]
//! sizes the audio buffers for a sample rate and block size (the only other
//! allocation point). [`Engine::into_parts`] then splits the instance into:
//!
//! - [`EngineHandle`] — the single thread-safe entry point for parameter
//!   writes, events, presets, mute/solo and meter reads; and
//! - [`AudioProcessor`] — the real-time half whose [`process`] is invoked by
//!   the audio driver. It never allocates, locks, or blocks.
//!
//! Internally a block is processed in control periods of
//! [`CONTROL_PERIOD`] samples: events apply at the period containing their
//! offset, parameter smoothing steps once, the voices render, and after the
//! last period the console runs over the whole block. Because every
//! decision happens on this 32-sample grid, identical event streams produce
//! identical audio at every block size from 32 to 2048.
//!
//! [`process`]: AudioProcessor::process

use crate::console::{ConsoleSnapshot, MixConsole};
use crate::event::{Event, EventReceiver, EventSender, TimedEvent, event_queue};
use crate::meter::{MeterBank, MeterKind, MeterTarget};
use crate::params::{ParamSpec, ParamTable, SmootherBank};
use crate::preset::Preset;
use crate::telemetry::Telemetry;
use crate::Error;
use arc_swap::ArcSwap;
use mezcla_core::{CONTROL_PERIOD, LfoWaveform};
use mezcla_strip::{ChannelStrip, ConsoleMode};
use mezcla_synth::{EnvelopeCurve, ModMatrix, NoteId, SynthParams, VoiceManager, Waveform};
use std::sync::Arc;

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Mixer channels preallocated for the session.
    pub channels: usize,
    /// Voice pool size.
    pub polyphony: usize,
    /// Event ring capacity; size for one second at peak event rate.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channels: 4,
            polyphony: 16,
            event_capacity: 4096,
        }
    }
}

/// Dense indices of the global synthesis parameters.
#[derive(Debug, Clone)]
struct SynthIx {
    osc1_waveform: usize,
    osc2_waveform: usize,
    osc1_level: usize,
    osc2_level: usize,
    osc2_detune: usize,
    unison_spread: usize,
    glide_time: usize,
    legato: usize,
    filter_cutoff: usize,
    filter_resonance: usize,
    filter_env_amount: usize,
    amp_attack: usize,
    amp_decay: usize,
    amp_sustain: usize,
    amp_release: usize,
    filter_attack: usize,
    filter_decay: usize,
    filter_sustain: usize,
    filter_release: usize,
    env_curve: usize,
    velocity_sens: usize,
    lfo1_rate: usize,
    lfo1_waveform: usize,
    lfo2_rate: usize,
    lfo2_waveform: usize,
    formant_freq: usize,
    formant_bandwidth: usize,
    formant_mix: usize,
    pitch_bend_range: usize,
    master_volume: usize,
}

/// Dense indices of one strip's parameters.
#[derive(Debug, Clone)]
struct StripIx {
    input_trim: usize,
    drive: usize,
    drive_enabled: usize,
    console_mode: usize,
    eq_low_freq: usize,
    eq_low_gain: usize,
    eq_mid_freq: usize,
    eq_mid_gain: usize,
    eq_mid_q: usize,
    eq_high_freq: usize,
    eq_high_gain: usize,
    comp_threshold: usize,
    comp_ratio: usize,
    comp_attack: usize,
    comp_release: usize,
    comp_makeup: usize,
    lim_threshold: usize,
    pan: usize,
    output_trim: usize,
}

/// Spec accumulator: pushes specs and hands back their dense indices.
struct Registry {
    specs: Vec<ParamSpec>,
}

impl Registry {
    fn new() -> Self {
        Self { specs: Vec::new() }
    }

    fn smooth(&mut self, id: String, min: f32, max: f32, default: f32) -> usize {
        self.specs.push(ParamSpec::smooth(id, min, max, default));
        self.specs.len() - 1
    }

    fn stepped(&mut self, id: String, min: f32, max: f32, default: f32) -> usize {
        self.specs.push(ParamSpec::stepped(id, min, max, default));
        self.specs.len() - 1
    }

    fn strip(&mut self, prefix: &str) -> StripIx {
        let p = |name: &str| format!("{prefix}{name}");
        StripIx {
            input_trim: self.smooth(p("input_trim"), -24.0, 24.0, 0.0),
            drive: self.smooth(p("drive"), 0.0, 1.0, 0.0),
            drive_enabled: self.stepped(p("drive_enabled"), 0.0, 1.0, 0.0),
            console_mode: self.stepped(p("console_mode"), 0.0, 2.0, 0.0),
            eq_low_freq: self.smooth(p("eq_low_freq"), 20.0, 500.0, 100.0),
            eq_low_gain: self.smooth(p("eq_low_gain"), -12.0, 12.0, 0.0),
            eq_mid_freq: self.smooth(p("eq_mid_freq"), 200.0, 5000.0, 1000.0),
            eq_mid_gain: self.smooth(p("eq_mid_gain"), -12.0, 12.0, 0.0),
            eq_mid_q: self.smooth(p("eq_mid_q"), 0.5, 5.0, 1.0),
            eq_high_freq: self.smooth(p("eq_high_freq"), 1000.0, 16000.0, 8000.0),
            eq_high_gain: self.smooth(p("eq_high_gain"), -12.0, 12.0, 0.0),
            comp_threshold: self.smooth(p("comp_threshold"), -60.0, 0.0, 0.0),
            comp_ratio: self.smooth(p("comp_ratio"), 1.0, 20.0, 4.0),
            comp_attack: self.smooth(p("comp_attack"), 0.1, 100.0, 10.0),
            comp_release: self.smooth(p("comp_release"), 10.0, 1000.0, 100.0),
            comp_makeup: self.smooth(p("comp_makeup"), 0.0, 24.0, 0.0),
            lim_threshold: self.smooth(p("lim_threshold"), -30.0, 0.0, 0.0),
            pan: self.smooth(p("pan"), -1.0, 1.0, 0.0),
            output_trim: self.smooth(p("output_trim"), -24.0, 24.0, 0.0),
        }
    }

    fn synth(&mut self) -> SynthIx {
        let s = |name: &str| name.to_string();
        SynthIx {
            osc1_waveform: self.stepped(s("osc1_waveform"), 0.0, 3.0, 0.0),
            osc2_waveform: self.stepped(s("osc2_waveform"), 0.0, 3.0, 0.0),
            osc1_level: self.smooth(s("osc1_level"), 0.0, 1.0, 1.0),
            osc2_level: self.smooth(s("osc2_level"), 0.0, 1.0, 0.0),
            osc2_detune: self.smooth(s("osc2_detune"), -100.0, 100.0, 0.0),
            unison_spread: self.smooth(s("unison_spread"), 0.0, 50.0, 0.0),
            glide_time: self.smooth(s("glide_time"), 0.0, 2000.0, 0.0),
            legato: self.stepped(s("legato"), 0.0, 1.0, 0.0),
            filter_cutoff: self.smooth(s("filter_cutoff"), 0.0, 1.0, 1.0),
            filter_resonance: self.smooth(s("filter_resonance"), 0.5, 10.0, 0.707),
            filter_env_amount: self.smooth(s("filter_env_amount"), -1.0, 1.0, 0.0),
            amp_attack: self.smooth(s("amp_attack"), 0.1, 5000.0, 10.0),
            amp_decay: self.smooth(s("amp_decay"), 0.1, 5000.0, 100.0),
            amp_sustain: self.smooth(s("amp_sustain"), 0.0, 1.0, 0.7),
            amp_release: self.smooth(s("amp_release"), 0.1, 5000.0, 200.0),
            filter_attack: self.smooth(s("filter_attack"), 0.1, 5000.0, 10.0),
            filter_decay: self.smooth(s("filter_decay"), 0.1, 5000.0, 100.0),
            filter_sustain: self.smooth(s("filter_sustain"), 0.0, 1.0, 0.7),
            filter_release: self.smooth(s("filter_release"), 0.1, 5000.0, 200.0),
            env_curve: self.stepped(s("env_curve"), 0.0, 2.0, 1.0),
            velocity_sens: self.smooth(s("velocity_sens"), 0.0, 1.0, 0.0),
            lfo1_rate: self.smooth(s("lfo1_rate"), 0.0, 40.0, 5.0),
            lfo1_waveform: self.stepped(s("lfo1_waveform"), 0.0, 3.0, 0.0),
            lfo2_rate: self.smooth(s("lfo2_rate"), 0.0, 40.0, 0.5),
            lfo2_waveform: self.stepped(s("lfo2_waveform"), 0.0, 3.0, 0.0),
            formant_freq: self.smooth(s("formant_freq"), 20.0, 8000.0, 1000.0),
            formant_bandwidth: self.smooth(s("formant_bandwidth"), 10.0, 2000.0, 200.0),
            formant_mix: self.smooth(s("formant_mix"), 0.0, 1.0, 0.0),
            pitch_bend_range: self.smooth(s("pitch_bend_range"), 0.0, 24.0, 2.0),
            master_volume: self.smooth(s("master_volume"), 0.0, 2.0, 1.0),
        }
    }
}

/// Control-thread half of the engine.
///
/// The single thread-safe entry point: every mutation arriving from preset
/// loaders, RPC surfaces or MIDI goes through here.
pub struct EngineHandle {
    params: Arc<ParamTable>,
    sender: EventSender,
    console_snap: Arc<ArcSwap<ConsoleSnapshot>>,
    matrix_snap: Arc<ArcSwap<ModMatrix>>,
    /// Retired matrix snapshots, kept two deep before dropping so an audio
    /// block that still reads an old snapshot never frees it.
    retired_matrices: Vec<Arc<ModMatrix>>,
    meters: Arc<MeterBank>,
    telemetry: Arc<Telemetry>,
    channels: usize,
}

impl EngineHandle {
    /// Write a parameter's base value; it becomes audible within one block
    /// and smooths over its configured time constant. Unknown ids are
    /// ignored with a telemetry count.
    pub fn set_parameter(&self, id: &str, value: f32) {
        if !self.params.set_by_id(id, value) {
            self.telemetry.count_unknown_param();
        }
    }

    /// Read a parameter's base value.
    pub fn get_parameter(&self, id: &str) -> Option<f32> {
        let value = self.params.get_by_id(id);
        if value.is_none() {
            self.telemetry.count_unknown_param();
        }
        value
    }

    /// Enqueue a timed event. Returns `false` if a droppable event was
    /// rejected by a full queue.
    pub fn submit_event(&mut self, event: TimedEvent) -> bool {
        self.sender.send(event)
    }

    /// Schedule a sample-accurate parameter change.
    pub fn schedule_parameter(&mut self, id: &str, value: f32, offset: u32) -> bool {
        match self.params.index_of(id) {
            Some(index) => self.submit_event(TimedEvent {
                offset,
                event: Event::ParameterSet { index, value },
            }),
            None => {
                self.telemetry.count_unknown_param();
                false
            }
        }
    }

    /// Note-on with normalized velocity at a block offset.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: f32, offset: u32) -> bool {
        self.submit_event(TimedEvent {
            offset,
            event: Event::NoteOn {
                note: NoteId::new(channel, note),
                velocity,
            },
        })
    }

    /// Note-off at a block offset.
    pub fn note_off(&mut self, channel: u8, note: u8, offset: u32) -> bool {
        self.submit_event(TimedEvent {
            offset,
            event: Event::NoteOff {
                note: NoteId::new(channel, note),
            },
        })
    }

    /// Release every voice.
    pub fn all_notes_off(&mut self) -> bool {
        self.submit_event(TimedEvent {
            offset: 0,
            event: Event::AllNotesOff,
        })
    }

    /// Set a macro slot, [0, 1].
    pub fn set_macro(&mut self, index: u8, value: f32) -> bool {
        self.submit_event(TimedEvent {
            offset: 0,
            event: Event::MacroSet {
                index,
                value: value.clamp(0.0, 1.0),
            },
        })
    }

    /// MIDI note-on; velocity 0 is a note-off per the MIDI convention.
    pub fn midi_note_on(&mut self, channel: u8, note: u8, velocity: u8) -> bool {
        if velocity == 0 {
            self.note_off(channel, note, 0)
        } else {
            self.note_on(channel, note, f32::from(velocity) / 127.0, 0)
        }
    }

    /// MIDI note-off.
    pub fn midi_note_off(&mut self, channel: u8, note: u8) -> bool {
        self.note_off(channel, note, 0)
    }

    /// 14-bit MIDI pitch bend, center 8192.
    pub fn midi_pitch_bend(&mut self, channel: u8, value: u16) -> bool {
        let normalized = (f32::from(value.min(16383)) - 8192.0) / 8192.0;
        self.submit_event(TimedEvent {
            offset: 0,
            event: Event::PitchBend {
                channel,
                value: normalized,
            },
        })
    }

    /// MIDI control change. CC 123 (all notes off) is honored; other
    /// controllers are out of scope here and ignored.
    pub fn midi_control_change(&mut self, _channel: u8, controller: u8, _value: u8) -> bool {
        if controller == 123 {
            self.all_notes_off()
        } else {
            true
        }
    }

    /// Set a channel's mute flag via snapshot swap.
    pub fn set_mute(&mut self, channel: usize, mute: bool) {
        self.update_console(|snap| {
            if let Some(flags) = snap.flags.get_mut(channel) {
                flags.mute = mute;
            }
        });
    }

    /// Set a channel's solo flag via snapshot swap.
    pub fn set_solo(&mut self, channel: usize, solo: bool) {
        self.update_console(|snap| {
            if let Some(flags) = snap.flags.get_mut(channel) {
                flags.solo = solo;
            }
        });
    }

    /// Change how many channels participate in the mix. Ids stay stable;
    /// strips beyond the count fall silent.
    pub fn set_active_channels(&mut self, count: usize) {
        let max = self.channels;
        self.update_console(|snap| {
            snap.active_channels = count.min(max);
        });
    }

    /// Current mute flag of a channel (from the latest snapshot).
    pub fn mute(&self, channel: usize) -> bool {
        self.console_snap.load().flags.get(channel).is_some_and(|f| f.mute)
    }

    /// Current solo flag of a channel.
    pub fn solo(&self, channel: usize) -> bool {
        self.console_snap.load().flags.get(channel).is_some_and(|f| f.solo)
    }

    /// Replace the modulation matrix via snapshot swap.
    pub fn set_modulation(&mut self, matrix: ModMatrix) {
        let old = self.matrix_snap.swap(Arc::new(matrix));
        self.retired_matrices.push(old);
        // Two blocks of grace before an old snapshot can drop.
        while self.retired_matrices.len() > 2 {
            self.retired_matrices.remove(0);
        }
    }

    /// Apply a preset: every parameter write is atomic, smoothing carries
    /// the audible values over, and the modulation matrix swaps whole.
    pub fn apply_preset(&mut self, preset: &Preset) {
        for (id, value) in &preset.parameters {
            self.set_parameter(id, *value);
        }
        let (matrix, skipped) = preset.to_matrix();
        for _ in 0..skipped {
            self.telemetry.count_unknown_param();
        }
        self.set_modulation(matrix);
        tracing::debug!(
            name = %preset.name,
            parameters = preset.parameters.len(),
            connections = preset.modulation.len(),
            skipped,
            "preset applied"
        );
    }

    /// Snapshot the current parameter and modulation state.
    pub fn dump_preset(&self, name: impl Into<String>) -> Preset {
        let mut preset = Preset::new(name);
        for (id, value) in self.params.iter() {
            preset.parameters.insert(id.to_string(), value);
        }
        preset.modulation = Preset::entries_from_matrix(&self.matrix_snap.load());
        preset
    }

    /// Read a meter value.
    pub fn meter(&self, target: MeterTarget, kind: MeterKind) -> f32 {
        if let MeterTarget::Channel(ch) = target {
            if ch >= self.channels {
                self.telemetry.count_unknown_param();
                return 0.0;
            }
        }
        self.meters.read(target, kind)
    }

    /// Telemetry counters.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Number of preallocated channels.
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    fn update_console(&mut self, f: impl FnOnce(&mut ConsoleSnapshot)) {
        let mut next = ConsoleSnapshot::clone(&self.console_snap.load());
        f(&mut next);
        self.console_snap.store(Arc::new(next));
    }
}

/// Audio-thread half of the engine.
pub struct AudioProcessor {
    params: Arc<ParamTable>,
    smoothers: SmootherBank,
    receiver: EventReceiver,
    console_snap: Arc<ArcSwap<ConsoleSnapshot>>,
    matrix_snap: Arc<ArcSwap<ModMatrix>>,
    meters: Arc<MeterBank>,
    telemetry: Arc<Telemetry>,

    voices: VoiceManager,
    console: MixConsole,
    /// Channel-major voice bus: `channels * block_size` samples.
    buses: Vec<f32>,
    /// Master strip output scratch.
    master_l: Vec<f32>,
    master_r: Vec<f32>,

    synth_params: SynthParams,
    macros: [f32; 8],
    /// Per-channel pitch bend in semitones.
    pitch_bend: [f32; 16],
    master_volume: mezcla_core::SmoothedParam,

    synth_ix: SynthIx,
    strip_ix: Vec<StripIx>,
    master_ix: StripIx,

    channels: usize,
    sample_rate: f32,
    block_size: usize,
    prepared: bool,
}

impl AudioProcessor {
    /// Real-time audio generation: render one block into the output slices.
    ///
    /// `out_l.len()` must not exceed the prepared block size; shorter
    /// blocks are allowed (drivers deliver ragged tails). Unprepared
    /// processors emit silence.
    pub fn process(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        let len = out_l.len().min(out_r.len());
        if !self.prepared || len == 0 || len > self.block_size {
            out_l.iter_mut().for_each(|s| *s = 0.0);
            out_r.iter_mut().for_each(|s| *s = 0.0);
            return;
        }

        // Clear the voice buses for this block.
        for ch in 0..self.channels {
            let start = ch * self.block_size;
            self.buses[start..start + len].fill(0.0);
        }

        // Overflow-rescued note-offs apply at block start; their sub-block
        // offset was sacrificed to keep them alive.
        while let Some(ev) = self.receiver.pop_reserve() {
            Self::apply_event(
                &mut self.voices,
                &self.params,
                &self.synth_ix,
                &mut self.macros,
                &mut self.pitch_bend,
                &self.synth_params,
                ev.event,
            );
        }

        let matrix_guard = self.matrix_snap.load();

        let mut offset = 0;
        while offset < len {
            let n = CONTROL_PERIOD.min(len - offset);
            let period_end = offset + n;
            let final_period = period_end >= len;

            // Apply events due in this period. Events with offsets past the
            // block end land in the final period rather than leaking into
            // the next block.
            loop {
                let due = match self.receiver.peek_offset() {
                    Some(off) => (off as usize) < period_end || final_period,
                    None => false,
                };
                if !due {
                    break;
                }
                if let Some(ev) = self.receiver.pop() {
                    Self::apply_event(
                        &mut self.voices,
                        &self.params,
                        &self.synth_ix,
                        &mut self.macros,
                        &mut self.pitch_bend,
                        &self.synth_params,
                        ev.event,
                    );
                }
            }

            self.smoothers.step(&self.params);
            self.synth_params = build_synth_params(&self.smoothers, &self.synth_ix);

            self.voices.render(
                &matrix_guard,
                &self.synth_params,
                &self.macros,
                &self.pitch_bend,
                &mut self.buses,
                self.block_size,
                offset,
                n,
                self.channels,
            );

            offset = period_end;
        }

        self.telemetry
            .count_forced_frees(u64::from(self.voices.take_forced_frees()));

        // Push smoothed strip parameters, then run the console.
        for ch in 0..self.channels {
            push_strip_params(self.console.strip_mut(ch), &self.smoothers, &self.strip_ix[ch]);
        }
        push_strip_params(self.console.master_mut(), &self.smoothers, &self.master_ix);

        let snapshot = self.console_snap.load();
        self.console.process_block(
            &self.buses,
            len,
            self.block_size,
            &snapshot,
            &self.meters,
            &mut self.master_l,
            &mut self.master_r,
        );

        self.master_volume
            .set_target(self.params.get(self.synth_ix.master_volume));
        for i in 0..len {
            let volume = self.master_volume.advance();
            out_l[i] = self.master_l[i] * volume;
            out_r[i] = self.master_r[i] * volume;
        }
    }

    /// Sample rate the processor was prepared with.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Block size the processor was prepared with (0 before prepare).
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Idle-bypass counter of one channel strip.
    pub fn idle_samples(&self, channel: usize) -> u64 {
        self.console.strip(channel).idle_samples()
    }

    /// Number of voices currently sounding.
    pub fn active_voice_count(&self) -> usize {
        self.voices.active_voice_count()
    }

    /// Whether any voice currently holds the note.
    pub fn holds_note(&self, note: NoteId) -> bool {
        self.voices.holds_note(note)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_event(
        voices: &mut VoiceManager,
        params: &ParamTable,
        synth_ix: &SynthIx,
        macros: &mut [f32; 8],
        pitch_bend: &mut [f32; 16],
        synth_params: &SynthParams,
        event: Event,
    ) {
        match event {
            Event::NoteOn { note, velocity } => {
                voices.note_on(note, velocity, synth_params);
            }
            Event::NoteOff { note } => {
                voices.note_off(note);
            }
            Event::PitchBend { channel, value } => {
                // Bend range is a parameter; read the base directly — the
                // audible glide comes from the voice's per-period ratio.
                let range = params.get(synth_ix.pitch_bend_range);
                pitch_bend[usize::from(channel & 0x0F)] = value.clamp(-1.0, 1.0) * range;
            }
            Event::AllNotesOff => {
                voices.all_notes_off(synth_params);
            }
            Event::ParameterSet { index, value } => {
                if index < params.len() {
                    params.set(index, value);
                }
            }
            Event::MacroSet { index, value } => {
                macros[usize::from(index) % 8] = value.clamp(0.0, 1.0);
            }
        }
    }
}

/// Assemble the voice pipeline's parameter snapshot from smoothed values.
fn build_synth_params(smoothers: &SmootherBank, ix: &SynthIx) -> SynthParams {
    SynthParams {
        osc1_waveform: Waveform::from_index(smoothers.value(ix.osc1_waveform) as u32),
        osc2_waveform: Waveform::from_index(smoothers.value(ix.osc2_waveform) as u32),
        osc1_level: smoothers.value(ix.osc1_level),
        osc2_level: smoothers.value(ix.osc2_level),
        osc2_detune_cents: smoothers.value(ix.osc2_detune),
        unison_spread_cents: smoothers.value(ix.unison_spread),
        glide_ms: smoothers.value(ix.glide_time),
        legato: smoothers.value(ix.legato) > 0.5,
        filter_cutoff: smoothers.value(ix.filter_cutoff),
        filter_resonance: smoothers.value(ix.filter_resonance),
        filter_env_amount: smoothers.value(ix.filter_env_amount),
        amp_attack_ms: smoothers.value(ix.amp_attack),
        amp_decay_ms: smoothers.value(ix.amp_decay),
        amp_sustain: smoothers.value(ix.amp_sustain),
        amp_release_ms: smoothers.value(ix.amp_release),
        filter_attack_ms: smoothers.value(ix.filter_attack),
        filter_decay_ms: smoothers.value(ix.filter_decay),
        filter_sustain: smoothers.value(ix.filter_sustain),
        filter_release_ms: smoothers.value(ix.filter_release),
        env_curve: EnvelopeCurve::from_index(smoothers.value(ix.env_curve) as u32),
        velocity_sensitivity: smoothers.value(ix.velocity_sens),
        lfo1_rate_hz: smoothers.value(ix.lfo1_rate),
        lfo1_waveform: lfo_waveform_from_index(smoothers.value(ix.lfo1_waveform) as u32),
        lfo2_rate_hz: smoothers.value(ix.lfo2_rate),
        lfo2_waveform: lfo_waveform_from_index(smoothers.value(ix.lfo2_waveform) as u32),
        formant_freq_hz: smoothers.value(ix.formant_freq),
        formant_bandwidth_hz: smoothers.value(ix.formant_bandwidth),
        formant_mix: smoothers.value(ix.formant_mix),
    }
}

fn lfo_waveform_from_index(index: u32) -> LfoWaveform {
    match index {
        1 => LfoWaveform::Triangle,
        2 => LfoWaveform::Saw,
        3 => LfoWaveform::Square,
        _ => LfoWaveform::Sine,
    }
}

/// Push one strip's smoothed parameter values into its DSP stages.
fn push_strip_params(strip: &mut ChannelStrip, smoothers: &SmootherBank, ix: &StripIx) {
    strip.set_input_trim_db(smoothers.value(ix.input_trim));
    strip.set_drive_amount(smoothers.value(ix.drive));
    strip.set_drive_enabled(smoothers.value(ix.drive_enabled) > 0.5);
    strip.set_console_mode(ConsoleMode::from_index(
        smoothers.value(ix.console_mode) as u32
    ));
    strip.set_eq_low(smoothers.value(ix.eq_low_freq), smoothers.value(ix.eq_low_gain));
    strip.set_eq_mid(
        smoothers.value(ix.eq_mid_freq),
        smoothers.value(ix.eq_mid_gain),
        smoothers.value(ix.eq_mid_q),
    );
    strip.set_eq_high(
        smoothers.value(ix.eq_high_freq),
        smoothers.value(ix.eq_high_gain),
    );
    strip.set_comp_threshold_db(smoothers.value(ix.comp_threshold));
    strip.set_comp_ratio(smoothers.value(ix.comp_ratio));
    strip.set_comp_attack_ms(smoothers.value(ix.comp_attack));
    strip.set_comp_release_ms(smoothers.value(ix.comp_release));
    strip.set_comp_makeup_db(smoothers.value(ix.comp_makeup));
    strip.set_limiter_threshold_db(smoothers.value(ix.lim_threshold));
    strip.set_pan(smoothers.value(ix.pan));
    strip.set_output_trim_db(smoothers.value(ix.output_trim));
}

/// A complete engine instance: control handle plus audio processor.
///
/// # Example
///
/// ```rust
/// use mezcla_engine::{Engine, EngineConfig};
///
/// let mut engine = Engine::new(EngineConfig::default());
/// engine.prepare(48000.0, 128).unwrap();
///
/// engine.handle_mut().note_on(0, 60, 1.0, 0);
/// let mut left = [0.0_f32; 128];
/// let mut right = [0.0_f32; 128];
/// engine.process(&mut left, &mut right);
/// ```
pub struct Engine {
    handle: EngineHandle,
    processor: AudioProcessor,
}

impl Engine {
    /// Allocate an engine with the given configuration. The instance is
    /// not yet prepared; [`prepare`](Self::prepare) must run before
    /// processing.
    pub fn new(config: EngineConfig) -> Self {
        let channels = config.channels.clamp(1, 16);
        let polyphony = config.polyphony.max(1);

        let mut registry = Registry::new();
        let synth_ix = registry.synth();
        let strip_ix: Vec<StripIx> = (0..channels)
            .map(|ch| registry.strip(&format!("ch{ch}_")))
            .collect();
        let master_ix = registry.strip("master_");

        let params = Arc::new(ParamTable::new(registry.specs));
        let telemetry = Arc::new(Telemetry::new());
        let meters = Arc::new(MeterBank::new(channels));
        let (sender, receiver) = event_queue(config.event_capacity, telemetry.clone());
        let console_snap = Arc::new(ArcSwap::from_pointee(ConsoleSnapshot::new(channels)));
        let matrix_snap = Arc::new(ArcSwap::from_pointee(ModMatrix::new()));

        let sample_rate = 48000.0;
        let smoothers = SmootherBank::new(&params, sample_rate, CONTROL_PERIOD);

        let handle = EngineHandle {
            params: params.clone(),
            sender,
            console_snap: console_snap.clone(),
            matrix_snap: matrix_snap.clone(),
            retired_matrices: Vec::new(),
            meters: meters.clone(),
            telemetry: telemetry.clone(),
            channels,
        };

        let processor = AudioProcessor {
            params,
            smoothers,
            receiver,
            console_snap,
            matrix_snap,
            meters,
            telemetry,
            voices: VoiceManager::new(sample_rate, polyphony),
            console: MixConsole::new(sample_rate, channels),
            buses: Vec::new(),
            master_l: Vec::new(),
            master_r: Vec::new(),
            synth_params: SynthParams::default(),
            macros: [0.0; 8],
            pitch_bend: [0.0; 16],
            master_volume: mezcla_core::SmoothedParam::fast(1.0, sample_rate),
            synth_ix,
            strip_ix,
            master_ix,
            channels,
            sample_rate,
            block_size: 0,
            prepared: false,
        };

        Self { handle, processor }
    }

    /// Configure DSP for a sample rate and block size. Allocates; control
    /// thread only. The block size must be a power of two in 32..=2048.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) -> Result<(), Error> {
        if !(8000.0..=384000.0).contains(&sample_rate) {
            return Err(Error::InvalidSampleRate(sample_rate));
        }
        if !(32..=2048).contains(&block_size) || !block_size.is_power_of_two() {
            return Err(Error::InvalidBlockSize(block_size));
        }

        let p = &mut self.processor;
        p.sample_rate = sample_rate;
        p.block_size = block_size;
        p.voices.set_sample_rate(sample_rate);
        p.console.prepare(sample_rate, block_size);
        p.buses = vec![0.0; p.channels * block_size];
        p.master_l = vec![0.0; block_size];
        p.master_r = vec![0.0; block_size];
        p.smoothers = SmootherBank::new(&p.params, sample_rate, CONTROL_PERIOD);
        p.smoothers.snap_all(&p.params);
        p.master_volume = mezcla_core::SmoothedParam::fast(p.params.get(p.synth_ix.master_volume), sample_rate);
        p.synth_params = build_synth_params(&p.smoothers, &p.synth_ix);
        p.prepared = true;
        Ok(())
    }

    /// The control half.
    pub fn handle(&self) -> &EngineHandle {
        &self.handle
    }

    /// The control half, mutably (event submission, snapshot swaps).
    pub fn handle_mut(&mut self) -> &mut EngineHandle {
        &mut self.handle
    }

    /// The audio half (tests and offline rendering drive it directly).
    pub fn processor_mut(&mut self) -> &mut AudioProcessor {
        &mut self.processor
    }

    /// Read access to the audio half.
    pub fn processor(&self) -> &AudioProcessor {
        &self.processor
    }

    /// Split into the two halves: hand the processor to the audio driver,
    /// keep the handle on the control thread.
    pub fn into_parts(self) -> (EngineHandle, AudioProcessor) {
        (self.handle, self.processor)
    }

    /// Process one block (convenience for the unsplit engine).
    pub fn process(&mut self, out_l: &mut [f32], out_r: &mut [f32]) {
        self.processor.process(out_l, out_r);
    }
}
