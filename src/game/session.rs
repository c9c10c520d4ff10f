use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use super::catalog::{self, Action, Level, RhythmPattern};
use super::completion::{CompletionEvent, CompletionNotifier};
use super::matcher::{InputRecorder, Match, TapOutcome};
use super::sequencer::{PlaybackEvent, PlaybackStep, Sequencer};
use super::timeline::Timeline;
use crate::audio::ToneSink;
use crate::config::{GameConfig, TimingConfig};

const PRACTICE_PROMPT: &str = "Now you try! Tap the buttons to copy the rhythm.";
const SIMON_PROMPT: &str = "Simon says: copy this rhythm!";
const SUCCESS_MESSAGE: &str = "Perfect! You got it right!";
const RETRY_MESSAGE: &str = "Not quite right. Watch again and try!";
const SIMON_UNLOCKED_MESSAGE: &str = "Amazing! Now let's try Simon Says mode!";

/// Patterns that must be completed before Simon Says can be chosen early.
const SIMON_UNLOCK_COUNT: usize = 3;
/// Points per correct match are this times the current level.
const POINTS_PER_LEVEL: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Intro,
    Watch,
    Practice,
    Simon,
    Complete,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Intro => "intro",
            Stage::Watch => "watch",
            Stage::Practice => "practice",
            Stage::Simon => "simon",
            Stage::Complete => "complete",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Learn,
    Simon,
}

/// The game's mutable aggregate. Only [`Session`] mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub stage: Stage,
    pub current_pattern: Option<&'static RhythmPattern>,
    pub game_mode: GameMode,
    pub score: u32,
    pub level: Level,
    pub completed_pattern_ids: BTreeSet<u8>,
    pub feedback: String,
    pub simon_round: u32,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            stage: Stage::Intro,
            current_pattern: None,
            game_mode: GameMode::Learn,
            score: 0,
            level: Level::FIRST,
            completed_pattern_ids: BTreeSet::new(),
            feedback: String::new(),
            simon_round: 0,
        }
    }
}

/// Deferred work on the session timeline. Everything except playback steps
/// carries the stage epoch it was scheduled in and is dropped once the
/// session has moved on. Match resolutions also carry the attempt they
/// resolve and are dropped once a newer attempt has been evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    Playback(PlaybackStep),
    StartDemo { epoch: u64 },
    OpenPractice { epoch: u64 },
    ResolveSuccess { epoch: u64, attempt: u64 },
    ResolveMiss { epoch: u64, attempt: u64 },
}

impl From<PlaybackStep> for Task {
    fn from(step: PlaybackStep) -> Self {
        Task::Playback(step)
    }
}

/// Read-only snapshot handed to the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView<'a> {
    pub stage: Stage,
    pub game_mode: GameMode,
    pub pattern: Option<&'static RhythmPattern>,
    pub animating_beat: Option<usize>,
    pub input: &'a [Action],
    pub expected_len: usize,
    pub score: u32,
    pub level: Level,
    pub feedback: &'a str,
    pub completed_count: usize,
    pub simon_round: u32,
    pub is_playing: bool,
    pub can_start_simon: bool,
    pub can_complete: bool,
}

pub struct Session {
    state: SessionState,
    epoch: u64,
    attempt: u64,
    /// A correct match is waiting for its level advance.
    advancing: bool,
    timeline: Timeline<Task>,
    sequencer: Sequencer,
    input: InputRecorder,
    tones: Box<dyn ToneSink>,
    notifier: CompletionNotifier,
    timing: TimingConfig,
    rng: StdRng,
}

impl Session {
    pub fn new(
        config: &GameConfig,
        tones: Box<dyn ToneSink>,
        notifier: CompletionNotifier,
    ) -> Self {
        Self {
            state: SessionState::default(),
            epoch: 0,
            attempt: 0,
            advancing: false,
            timeline: Timeline::new(),
            sequencer: Sequencer::new(
                config.timing.beat_period(),
                config.timing.settle(),
                config.tones.clone(),
            ),
            input: InputRecorder::new(config.tones.clone()),
            tones,
            notifier,
            timing: config.timing.clone(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the Simon Says pattern choices, for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn stage(&self) -> Stage {
        self.state.stage
    }

    pub fn is_playing(&self) -> bool {
        self.sequencer.is_playing()
    }

    pub fn elapsed(&self) -> Duration {
        self.timeline.now()
    }

    pub fn view(&self) -> SessionView<'_> {
        SessionView {
            stage: self.state.stage,
            game_mode: self.state.game_mode,
            pattern: self.state.current_pattern,
            animating_beat: self.sequencer.animating_beat(),
            input: self.input.taps(),
            expected_len: self.input.expected_len(),
            score: self.state.score,
            level: self.state.level,
            feedback: &self.state.feedback,
            completed_count: self.state.completed_pattern_ids.len(),
            simon_round: self.state.simon_round,
            is_playing: self.sequencer.is_playing(),
            can_start_simon: self.can_start_simon(),
            can_complete: self.can_complete(),
        }
    }

    // ───── user actions ─────

    /// Leave the intro and begin learn mode at the current level.
    pub fn start(&mut self) -> bool {
        if self.state.stage != Stage::Intro {
            return false;
        }

        info!("session started");
        self.sync_pattern_to_level();
        self.enter_stage(Stage::Watch);
        true
    }

    /// Record a clap or stamp. Ignored outside practice, during playback and
    /// while a correct match waits for its advance.
    pub fn tap(&mut self, action: Action) -> bool {
        if !self.accepts_input() || self.sequencer.is_playing() {
            return false;
        }

        match self.input.record(action, self.tones.as_ref()) {
            TapOutcome::Ignored => false,
            TapOutcome::Recorded => true,
            TapOutcome::Evaluated(outcome) => {
                self.on_match(outcome);
                true
            }
        }
    }

    pub fn tap_clap(&mut self) -> bool {
        self.tap(Action::Clap)
    }

    pub fn tap_stamp(&mut self) -> bool {
        self.tap(Action::Stamp)
    }

    pub fn reset_input(&mut self) -> bool {
        if !self.accepts_input() {
            return false;
        }
        self.input.clear();
        true
    }

    /// Play the current pattern again on request.
    pub fn replay_pattern(&mut self) -> bool {
        if matches!(self.state.stage, Stage::Intro | Stage::Complete) {
            return false;
        }
        self.play_current()
    }

    pub fn can_start_simon(&self) -> bool {
        self.state.game_mode == GameMode::Learn
            && self.state.completed_pattern_ids.len() >= SIMON_UNLOCK_COUNT
            && matches!(self.state.stage, Stage::Watch | Stage::Practice)
    }

    /// Switch to Simon Says early, once enough patterns are done.
    pub fn start_simon_mode(&mut self) -> bool {
        if !self.can_start_simon() {
            return false;
        }

        info!(completed = self.state.completed_pattern_ids.len(), "simon mode chosen");
        self.state.game_mode = GameMode::Simon;
        self.begin_simon_round(1, String::new());
        true
    }

    pub fn can_complete(&self) -> bool {
        self.state.completed_pattern_ids.len() == usize::from(Level::MAX)
            && matches!(
                self.state.stage,
                Stage::Watch | Stage::Practice | Stage::Simon
            )
    }

    /// Finish the activity and publish the completion event. Terminal.
    pub fn complete_activity(&mut self) -> Option<CompletionEvent> {
        if !self.can_complete() {
            return None;
        }

        self.timeline.clear();
        self.sequencer.halt();
        self.enter_stage(Stage::Complete);
        Some(self.notifier.notify(&self.state))
    }

    // ───── time ─────

    /// Move the session clock forward by `delta`, running every task that
    /// comes due on the way, in order.
    pub fn advance(&mut self, delta: Duration) {
        let until = self.timeline.now().saturating_add(delta);
        self.advance_to(until);
    }

    pub fn advance_to(&mut self, until: Duration) {
        while let Some(task) = self.timeline.pop_due(until) {
            self.run_task(task);
        }
        self.timeline.settle_at(until);
    }

    fn run_task(&mut self, task: Task) {
        if self.state.stage == Stage::Complete {
            return;
        }

        match task {
            Task::Playback(step) => {
                let event = self.sequencer.on_step(step, self.tones.as_ref());
                if event == Some(PlaybackEvent::Finished) {
                    debug!(stage = %self.state.stage, "demo finished");
                }
            }
            Task::StartDemo { epoch } if epoch == self.epoch => {
                self.play_current();
            }
            Task::OpenPractice { epoch } if epoch == self.epoch => {
                self.state.feedback = match self.state.game_mode {
                    GameMode::Learn => PRACTICE_PROMPT,
                    GameMode::Simon => SIMON_PROMPT,
                }
                .to_string();
                self.enter_stage(Stage::Practice);
            }
            Task::ResolveSuccess { epoch, attempt }
                if epoch == self.epoch && attempt == self.attempt =>
            {
                self.resolve_success()
            }
            Task::ResolveMiss { epoch, attempt }
                if epoch == self.epoch && attempt == self.attempt =>
            {
                self.state.feedback.clear();
                self.play_current();
            }
            stale => debug!(?stale, epoch = self.epoch, "dropping stale task"),
        }
    }

    // ───── transitions ─────

    fn enter_stage(&mut self, stage: Stage) {
        debug!(from = %self.state.stage, to = %stage, "stage change");
        self.state.stage = stage;
        self.epoch += 1;
        self.advancing = false;

        if matches!(stage, Stage::Watch | Stage::Simon) && self.state.current_pattern.is_some() {
            let epoch = self.epoch;
            self.timeline
                .schedule_in(self.timing.demo_delay(), Task::StartDemo { epoch });
            self.timeline
                .schedule_in(self.timing.practice_after(), Task::OpenPractice { epoch });
        }
    }

    fn accepts_input(&self) -> bool {
        self.state.stage == Stage::Practice && !self.advancing
    }

    fn on_match(&mut self, outcome: Match) {
        let Some(pattern) = self.state.current_pattern else {
            return;
        };
        self.attempt += 1;

        match outcome {
            Match::Correct => {
                self.advancing = true;
                let points = POINTS_PER_LEVEL * u32::from(self.state.level.get());
                self.state.score += points;
                self.state.completed_pattern_ids.insert(pattern.id);
                self.state.feedback = SUCCESS_MESSAGE.to_string();
                info!(
                    pattern = pattern.id,
                    points,
                    score = self.state.score,
                    "pattern matched"
                );
                self.timeline.schedule_in(
                    self.timing.success_delay(),
                    Task::ResolveSuccess {
                        epoch: self.epoch,
                        attempt: self.attempt,
                    },
                );
            }
            Match::Incorrect => {
                info!(pattern = pattern.id, "pattern missed, replaying");
                self.state.feedback = RETRY_MESSAGE.to_string();
                self.input.clear();
                self.timeline.schedule_in(
                    self.timing.retry_delay(),
                    Task::ResolveMiss {
                        epoch: self.epoch,
                        attempt: self.attempt,
                    },
                );
            }
        }
    }

    fn resolve_success(&mut self) {
        self.input.clear();

        match self.state.game_mode {
            GameMode::Learn => match self.state.level.next() {
                Some(next) => {
                    self.state.level = next;
                    self.sync_pattern_to_level();
                    self.state.feedback.clear();
                    info!(new_level = %next, "level up");
                    self.enter_stage(Stage::Watch);
                }
                None => {
                    info!("all levels cleared, entering simon mode");
                    self.state.game_mode = GameMode::Simon;
                    self.begin_simon_round(1, SIMON_UNLOCKED_MESSAGE.to_string());
                }
            },
            GameMode::Simon => {
                let round = self.state.simon_round + 1;
                self.begin_simon_round(round, String::new());
            }
        }
    }

    fn begin_simon_round(&mut self, round: u32, feedback: String) {
        let pool = catalog::simon_pool();
        let pattern = &pool[self.rng.gen_range(0..pool.len())];

        self.state.simon_round = round;
        self.state.feedback = feedback;
        self.set_pattern(pattern);
        debug!(round, pattern = pattern.id, "simon round");
        self.enter_stage(Stage::Simon);
    }

    /// Learn mode always practises the catalog entry for the current level.
    fn sync_pattern_to_level(&mut self) {
        if self.state.game_mode == GameMode::Learn {
            self.set_pattern(catalog::get(self.state.level));
        }
    }

    /// Switching patterns stops any playback of the previous one.
    fn set_pattern(&mut self, pattern: &'static RhythmPattern) {
        if self.state.current_pattern != Some(pattern) {
            self.sequencer.halt();
        }
        self.state.current_pattern = Some(pattern);
        self.input.arm(pattern);
    }

    fn play_current(&mut self) -> bool {
        match self.state.current_pattern {
            Some(pattern) => self.sequencer.play(pattern, &mut self.timeline),
            None => false,
        }
    }
}
