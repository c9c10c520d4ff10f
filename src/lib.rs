pub mod audio;
pub mod config;
pub mod game;
pub mod ui;

pub use config::GameConfig;
pub use game::{Session, Stage};
pub use ui::TerminalUI;
