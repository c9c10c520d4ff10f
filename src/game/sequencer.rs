use std::time::Duration;
use tracing::debug;

use super::catalog::{Beat, RhythmPattern};
use super::timeline::Timeline;
use crate::audio::ToneSink;
use crate::config::ToneConfig;

/// A scheduled moment of one playback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStep {
    Beat { run: u64, index: usize },
    Settle { run: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    Beat { index: usize, beat: Beat },
    Finished,
}

/// Plays a pattern beat by beat on the session timeline.
pub struct Sequencer {
    beat_period: Duration,
    settle: Duration,
    tones: ToneConfig,
    playing: Option<&'static RhythmPattern>,
    animating_beat: Option<usize>,
    run: u64,
}

impl Sequencer {
    pub fn new(beat_period: Duration, settle: Duration, tones: ToneConfig) -> Self {
        Self {
            beat_period,
            settle,
            tones,
            playing: None,
            animating_beat: None,
            run: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    pub fn animating_beat(&self) -> Option<usize> {
        self.animating_beat
    }

    /// Schedule every beat of `pattern`. Returns false (and does nothing) if a
    /// pattern is already playing.
    pub fn play<T: From<PlaybackStep>>(
        &mut self,
        pattern: &'static RhythmPattern,
        timeline: &mut Timeline<T>,
    ) -> bool {
        if self.is_playing() {
            return false;
        }

        self.run += 1;
        self.playing = Some(pattern);
        self.animating_beat = Some(0);

        let run = self.run;
        for index in 0..pattern.beats.len() {
            timeline.schedule_in(self.slot_offset(index), PlaybackStep::Beat { run, index }.into());
        }

        let last_slot = self.slot_offset(pattern.beats.len().saturating_sub(1));
        timeline.schedule_in(last_slot + self.settle, PlaybackStep::Settle { run }.into());

        debug!(pattern = pattern.id, run, beats = pattern.beats.len(), "playback started");
        true
    }

    /// Run a step that came due. Steps from an earlier run are ignored.
    pub fn on_step(&mut self, step: PlaybackStep, tones: &dyn ToneSink) -> Option<PlaybackEvent> {
        let pattern = self.playing?;

        match step {
            PlaybackStep::Beat { run, index } if run == self.run => {
                let beat = *pattern.beats.get(index)?;
                self.animating_beat = Some(index);
                if let Some(action) = beat.action() {
                    tones.emit(self.tones.tone_for(action));
                }
                Some(PlaybackEvent::Beat { index, beat })
            }
            PlaybackStep::Settle { run } if run == self.run => {
                self.halt();
                debug!(pattern = pattern.id, run, "playback finished");
                Some(PlaybackEvent::Finished)
            }
            _ => None,
        }
    }

    /// Drop the current run without waiting for its steps.
    pub fn halt(&mut self) {
        self.playing = None;
        self.animating_beat = None;
    }

    fn slot_offset(&self, index: usize) -> Duration {
        self.beat_period * index as u32
    }
}
