use super::catalog::{Action, RhythmPattern};
use crate::audio::ToneSink;
use crate::config::ToneConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    Correct,
    Incorrect,
}

/// Exact, order-sensitive comparison; no partial credit.
pub fn evaluate(input: &[Action], expected: &[Action]) -> Match {
    if input == expected {
        Match::Correct
    } else {
        Match::Incorrect
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// Input already holds a full attempt.
    Ignored,
    Recorded,
    Evaluated(Match),
}

/// Collects the player's taps for the pattern currently being practised.
pub struct InputRecorder {
    taps: Vec<Action>,
    expected: Vec<Action>,
    tones: ToneConfig,
}

impl InputRecorder {
    pub fn new(tones: ToneConfig) -> Self {
        Self {
            taps: Vec::new(),
            expected: Vec::new(),
            tones,
        }
    }

    /// Expect the taps of `pattern` from now on, discarding any partial input.
    pub fn arm(&mut self, pattern: &RhythmPattern) {
        self.expected = pattern.expected_actions();
        self.taps.clear();
    }

    /// Append a tap, sound its feedback tone and evaluate once the attempt is
    /// as long as the expected sequence.
    pub fn record(&mut self, action: Action, tones: &dyn ToneSink) -> TapOutcome {
        if self.is_full() {
            return TapOutcome::Ignored;
        }

        self.taps.push(action);
        tones.emit(self.tones.tone_for(action));

        if self.taps.len() == self.expected.len() {
            TapOutcome::Evaluated(evaluate(&self.taps, &self.expected))
        } else {
            TapOutcome::Recorded
        }
    }

    pub fn clear(&mut self) {
        self.taps.clear();
    }

    pub fn taps(&self) -> &[Action] {
        &self.taps
    }

    pub fn expected_len(&self) -> usize {
        self.expected.len()
    }

    pub fn is_full(&self) -> bool {
        self.taps.len() >= self.expected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{SilentTones, Tone};
    use crate::game::catalog::{self, Level};
    use Action::{Clap, Stamp};
    use std::cell::RefCell;

    #[test]
    fn test_exact_match_is_correct() {
        assert_eq!(evaluate(&[Clap, Stamp, Clap], &[Clap, Stamp, Clap]), Match::Correct);
        assert_eq!(evaluate(&[], &[]), Match::Correct);
    }

    #[test]
    fn test_any_edit_is_incorrect() {
        let expected = [Clap, Clap, Stamp, Clap];

        // transposition
        assert_eq!(evaluate(&[Clap, Stamp, Clap, Clap], &expected), Match::Incorrect);
        // substitution
        assert_eq!(evaluate(&[Clap, Clap, Clap, Clap], &expected), Match::Incorrect);
        // deletion
        assert_eq!(evaluate(&[Clap, Clap, Stamp], &expected), Match::Incorrect);
        // insertion
        assert_eq!(
            evaluate(&[Clap, Clap, Stamp, Clap, Clap], &expected),
            Match::Incorrect
        );
    }

    #[test]
    fn test_evaluates_when_lengths_match() {
        let mut recorder = InputRecorder::new(ToneConfig::default());
        recorder.arm(catalog::get(Level::FIRST));
        assert_eq!(recorder.expected_len(), 2);

        assert_eq!(recorder.record(Clap, &SilentTones), TapOutcome::Recorded);
        assert_eq!(
            recorder.record(Clap, &SilentTones),
            TapOutcome::Evaluated(Match::Correct)
        );
        assert_eq!(recorder.taps(), &[Clap, Clap]);
    }

    #[test]
    fn test_wrong_order_is_incorrect() {
        let mut recorder = InputRecorder::new(ToneConfig::default());
        recorder.arm(catalog::get(Level::FIRST));

        recorder.record(Stamp, &SilentTones);
        assert_eq!(
            recorder.record(Clap, &SilentTones),
            TapOutcome::Evaluated(Match::Incorrect)
        );
    }

    #[test]
    fn test_full_input_ignores_taps_until_cleared() {
        let mut recorder = InputRecorder::new(ToneConfig::default());
        recorder.arm(catalog::get(Level::FIRST));
        recorder.record(Clap, &SilentTones);
        recorder.record(Clap, &SilentTones);

        assert_eq!(recorder.record(Stamp, &SilentTones), TapOutcome::Ignored);
        assert_eq!(recorder.taps().len(), 2);

        recorder.clear();
        assert_eq!(recorder.record(Stamp, &SilentTones), TapOutcome::Recorded);
    }

    #[test]
    fn test_each_tap_sounds_its_tone() {
        struct Recorder(RefCell<Vec<Tone>>);
        impl ToneSink for Recorder {
            fn emit(&self, tone: Tone) {
                self.0.borrow_mut().push(tone);
            }
        }

        let config = ToneConfig::default();
        let tones = Recorder(RefCell::new(Vec::new()));
        let mut recorder = InputRecorder::new(config.clone());
        recorder.arm(catalog::get(Level::LAST));

        recorder.record(Clap, &tones);
        recorder.record(Stamp, &tones);

        assert_eq!(
            *tones.0.borrow(),
            vec![config.tone_for(Clap), config.tone_for(Stamp)]
        );
    }

    #[test]
    fn test_arm_discards_partial_input() {
        let mut recorder = InputRecorder::new(ToneConfig::default());
        recorder.arm(catalog::get(Level::LAST));
        recorder.record(Clap, &SilentTones);

        recorder.arm(catalog::get(Level::FIRST));
        assert!(recorder.taps().is_empty());
        assert_eq!(recorder.expected_len(), 2);
    }
}
