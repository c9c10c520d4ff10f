use anyhow::{Context, Result, anyhow};
use crossbeam::channel::Sender;
use serde::Serialize;
use std::io::Write;
use std::sync::Mutex;
use tracing::{info, warn};

use super::session::{GameMode, SessionState};

pub const EVENT_TYPE: &str = "BLOCK_COMPLETION";
pub const BLOCK_ID: &str = "6853cc587405ab9cb3e4cfbb";
/// Fixed by the host contract, not derived from the catalog.
pub const MAX_SCORE: u32 = 250;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub block_id: &'static str,
    pub completed: bool,
    pub score: u32,
    pub max_score: u32,
    /// Wall-clock milliseconds since the Unix epoch at emission.
    pub time_spent: i64,
    pub data: CompletionData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionData {
    pub level: u8,
    pub completed_patterns: usize,
    pub game_mode: GameMode,
}

impl CompletionEvent {
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            kind: EVENT_TYPE,
            block_id: BLOCK_ID,
            completed: true,
            score: state.score,
            max_score: MAX_SCORE,
            time_spent: chrono::Utc::now().timestamp_millis(),
            data: CompletionData {
                level: state.level.get(),
                completed_patterns: state.completed_pattern_ids.len(),
                game_mode: state.game_mode,
            },
        }
    }
}

/// Something in the hosting environment that wants the completion event.
pub trait CompletionListener {
    fn publish(&self, event: &CompletionEvent) -> Result<()>;
}

/// Delivers the event in-process, e.g. to the terminal UI.
pub struct ChannelListener {
    sender: Sender<CompletionEvent>,
}

impl ChannelListener {
    pub fn new(sender: Sender<CompletionEvent>) -> Self {
        Self { sender }
    }
}

impl CompletionListener for ChannelListener {
    fn publish(&self, event: &CompletionEvent) -> Result<()> {
        self.sender
            .try_send(event.clone())
            .map_err(|e| anyhow!("completion channel closed: {}", e))
    }
}

/// Writes each event as one JSON line, for a host reading a file or pipe.
pub struct JsonLinesListener<W: Write> {
    writer: Mutex<W>,
}

impl<W: Write> JsonLinesListener<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write> CompletionListener for JsonLinesListener<W> {
    fn publish(&self, event: &CompletionEvent) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("completion writer lock poisoned"))?;
        serde_json::to_writer(&mut *writer, event).context("serializing completion event")?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Fans the completion event out to every registered listener. Delivery is
/// best effort: a failing listener is logged and skipped, never retried.
#[derive(Default)]
pub struct CompletionNotifier {
    listeners: Vec<Box<dyn CompletionListener>>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(mut self, listener: impl CompletionListener + 'static) -> Self {
        self.register(listener);
        self
    }

    pub fn register(&mut self, listener: impl CompletionListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify(&self, state: &SessionState) -> CompletionEvent {
        let event = CompletionEvent::from_state(state);

        let mut delivered = 0;
        for listener in &self.listeners {
            match listener.publish(&event) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(error = %e, "completion listener failed"),
            }
        }

        info!(
            score = event.score,
            completed = event.data.completed_patterns,
            delivered,
            listeners = self.listeners.len(),
            "completion event published"
        );

        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::Level;
    use crossbeam::channel;
    use serde_json::Value;

    fn finished_state() -> SessionState {
        let mut state = SessionState::default();
        state.score = 150;
        state.level = Level::LAST;
        state.game_mode = GameMode::Simon;
        state.completed_pattern_ids.extend(1..=5);
        state
    }

    struct Broken;

    impl CompletionListener for Broken {
        fn publish(&self, _event: &CompletionEvent) -> Result<()> {
            Err(anyhow!("host went away"))
        }
    }

    #[test]
    fn test_payload_shape() {
        let event = CompletionEvent::from_state(&finished_state());
        let json: Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "BLOCK_COMPLETION");
        assert_eq!(json["blockId"], BLOCK_ID);
        assert_eq!(json["completed"], true);
        assert_eq!(json["score"], 150);
        assert_eq!(json["maxScore"], 250);
        assert!(json["timeSpent"].as_i64().unwrap() > 0);
        assert_eq!(json["data"]["level"], 5);
        assert_eq!(json["data"]["completedPatterns"], 5);
        assert_eq!(json["data"]["gameMode"], "simon");
    }

    #[test]
    fn test_json_lines_listener_writes_one_line() {
        let listener = JsonLinesListener::new(Vec::new());
        let event = CompletionEvent::from_state(&finished_state());
        listener.publish(&event).unwrap();

        let written = String::from_utf8(listener.into_inner()).unwrap();
        assert_eq!(written.lines().count(), 1);
        let parsed: Value = serde_json::from_str(written.trim_end()).unwrap();
        assert_eq!(parsed["maxScore"], 250);
    }

    #[test]
    fn test_failing_listener_does_not_stop_others() {
        let (sender, receiver) = channel::unbounded();
        let notifier = CompletionNotifier::new()
            .with_listener(Broken)
            .with_listener(ChannelListener::new(sender));
        assert_eq!(notifier.listener_count(), 2);

        let event = notifier.notify(&finished_state());
        assert_eq!(receiver.try_recv().unwrap(), event);
    }

    #[test]
    fn test_closed_channel_is_error() {
        let (sender, receiver) = channel::unbounded();
        drop(receiver);
        let listener = ChannelListener::new(sender);
        let event = CompletionEvent::from_state(&finished_state());
        assert!(listener.publish(&event).is_err());
    }

    #[test]
    fn test_no_listeners_is_fine() {
        let event = CompletionNotifier::new().notify(&finished_state());
        assert_eq!(event.max_score, MAX_SCORE);
    }
}
