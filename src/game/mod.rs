pub mod catalog;
pub mod completion;
pub mod matcher;
pub mod sequencer;
pub mod session;
pub mod timeline;

pub use catalog::{Action, Beat, Level, RhythmPattern};
pub use completion::{
    ChannelListener, CompletionEvent, CompletionListener, CompletionNotifier, JsonLinesListener,
};
pub use matcher::{Match, evaluate};
pub use sequencer::Sequencer;
pub use session::{GameMode, Session, SessionState, SessionView, Stage};
pub use timeline::Timeline;
