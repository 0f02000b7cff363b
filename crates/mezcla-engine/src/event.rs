//! Sample-accurate event delivery from the control thread to the audio
//! thread.
//!
//! A single-producer/single-consumer lock-free ring ([`rtrb`]) carries
//! every event type. A second, smaller ring is reserved for NoteOff: when
//! the main ring overflows, droppable events are rejected (counted, the
//! caller sees `false`) but NoteOff is diverted into the reserve lane so a
//! stuck note is impossible short of both rings overflowing — and the
//! reserve only ever holds NoteOffs, so its capacity bounds simultaneous
//! releases, not event rate.

use crate::telemetry::Telemetry;
use mezcla_synth::NoteId;
use std::sync::Arc;

/// An engine event. Offsets live in [`TimedEvent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// Start a note with normalized velocity in [0, 1].
    NoteOn {
        /// Note identity (channel + note number).
        note: NoteId,
        /// Normalized velocity.
        velocity: f32,
    },
    /// Release a note. Never dropped by the queue.
    NoteOff {
        /// Note identity (channel + note number).
        note: NoteId,
    },
    /// Pitch bend for one channel, normalized to [-1, 1].
    PitchBend {
        /// MIDI channel.
        channel: u8,
        /// Normalized bend.
        value: f32,
    },
    /// Release every sounding voice.
    AllNotesOff,
    /// Sample-accurate parameter change; `index` is a dense index resolved
    /// by the control half before submission.
    ParameterSet {
        /// Dense parameter index.
        index: usize,
        /// New base value (clamped on application).
        value: f32,
    },
    /// Set one macro slot, [0, 1].
    MacroSet {
        /// Macro slot, 0..=7.
        index: u8,
        /// New value.
        value: f32,
    },
}

impl Event {
    /// NoteOff must survive queue pressure; everything else may drop.
    pub fn is_droppable(&self) -> bool {
        !matches!(self, Event::NoteOff { .. })
    }
}

/// An event scheduled at a sample offset within the next audio block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedEvent {
    /// Sample offset within the next block. Offsets past the end of the
    /// block apply in its final control period.
    pub offset: u32,
    /// The event payload.
    pub event: Event,
}

/// Capacity of the NoteOff reserve lane.
const NOTEOFF_RESERVE: usize = 256;

/// Create a connected sender/receiver pair.
///
/// `capacity` sizes the main ring; size it for at least one second of
/// events at peak rate.
pub fn event_queue(capacity: usize, telemetry: Arc<Telemetry>) -> (EventSender, EventReceiver) {
    let (main_tx, main_rx) = rtrb::RingBuffer::new(capacity.max(16));
    let (reserve_tx, reserve_rx) = rtrb::RingBuffer::new(NOTEOFF_RESERVE);
    (
        EventSender {
            main: main_tx,
            reserve: reserve_tx,
            telemetry,
        },
        EventReceiver {
            main: main_rx,
            reserve: reserve_rx,
        },
    )
}

/// Control-thread half of the queue.
pub struct EventSender {
    main: rtrb::Producer<TimedEvent>,
    reserve: rtrb::Producer<TimedEvent>,
    telemetry: Arc<Telemetry>,
}

impl EventSender {
    /// Enqueue an event.
    ///
    /// Returns `false` when a droppable event was rejected because the ring
    /// is full (the drop is counted in telemetry). NoteOff falls back to
    /// the reserve lane and only fails if that is full too.
    pub fn send(&mut self, event: TimedEvent) -> bool {
        match self.main.push(event) {
            Ok(()) => true,
            Err(rtrb::PushError::Full(rejected)) => {
                if rejected.event.is_droppable() {
                    self.telemetry.count_dropped_event();
                    false
                } else {
                    match self.reserve.push(rejected) {
                        Ok(()) => true,
                        Err(_) => {
                            self.telemetry.count_dropped_event();
                            false
                        }
                    }
                }
            }
        }
    }
}

/// Audio-thread half of the queue.
pub struct EventReceiver {
    main: rtrb::Consumer<TimedEvent>,
    reserve: rtrb::Consumer<TimedEvent>,
}

impl EventReceiver {
    /// Pop every queued reserve-lane NoteOff. Called once at block start;
    /// overflow NoteOffs lose their sub-block offset but never their
    /// effect.
    pub fn pop_reserve(&mut self) -> Option<TimedEvent> {
        self.reserve.pop().ok()
    }

    /// Offset of the next main-lane event without consuming it.
    pub fn peek_offset(&mut self) -> Option<u32> {
        self.main.peek().ok().map(|ev| ev.offset)
    }

    /// Consume the next main-lane event.
    pub fn pop(&mut self) -> Option<TimedEvent> {
        self.main.pop().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(n: u8) -> NoteId {
        NoteId::new(0, n)
    }

    #[test]
    fn events_arrive_in_fifo_order() {
        let telemetry = Arc::new(Telemetry::new());
        let (mut tx, mut rx) = event_queue(64, telemetry);

        for n in 0..10 {
            assert!(tx.send(TimedEvent {
                offset: n,
                event: Event::NoteOn {
                    note: note(60 + n as u8),
                    velocity: 1.0
                },
            }));
        }

        for n in 0..10 {
            let ev = rx.pop().expect("event present");
            assert_eq!(ev.offset, n);
        }
        assert!(rx.pop().is_none());
    }

    #[test]
    fn droppable_events_drop_when_full() {
        let telemetry = Arc::new(Telemetry::new());
        let (mut tx, _rx) = event_queue(16, telemetry.clone());

        let mut accepted = 0;
        for n in 0..40 {
            if tx.send(TimedEvent {
                offset: 0,
                event: Event::MacroSet {
                    index: 0,
                    value: n as f32 / 40.0,
                },
            }) {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 16, "ring capacity bounds acceptance");
        assert_eq!(telemetry.dropped_events(), 40 - 16);
    }

    #[test]
    fn note_off_survives_main_ring_overflow() {
        let telemetry = Arc::new(Telemetry::new());
        let (mut tx, mut rx) = event_queue(16, telemetry);

        // Fill the main ring with droppable events.
        for _ in 0..16 {
            tx.send(TimedEvent {
                offset: 0,
                event: Event::PitchBend {
                    channel: 0,
                    value: 0.5,
                },
            });
        }

        // NoteOff must still be accepted.
        assert!(tx.send(TimedEvent {
            offset: 0,
            event: Event::NoteOff { note: note(60) },
        }));

        // And must come out of the reserve lane.
        let rescued = rx.pop_reserve().expect("reserved note-off");
        assert_eq!(rescued.event, Event::NoteOff { note: note(60) });
    }

    #[test]
    fn peek_does_not_consume() {
        let telemetry = Arc::new(Telemetry::new());
        let (mut tx, mut rx) = event_queue(16, telemetry);

        tx.send(TimedEvent {
            offset: 42,
            event: Event::AllNotesOff,
        });

        assert_eq!(rx.peek_offset(), Some(42));
        assert_eq!(rx.peek_offset(), Some(42));
        assert!(rx.pop().is_some());
        assert_eq!(rx.peek_offset(), None);
    }
}
