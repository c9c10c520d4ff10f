//! Plays a full learn-mode run without a terminal or sound card, then
//! prints the completion event as a JSON line on stdout.
//!
//! cargo run --example headless_session

use anyhow::{Result, bail};
use rhythm_detective::audio::SilentTones;
use rhythm_detective::game::{CompletionNotifier, JsonLinesListener, Stage};
use rhythm_detective::{GameConfig, Session};
use std::io;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(100);

fn wait_for_practice(session: &mut Session) -> Result<()> {
    for _ in 0..200 {
        if session.stage() == Stage::Practice && !session.is_playing() {
            return Ok(());
        }
        session.advance(TICK);
    }
    bail!("practice never opened (stage: {})", session.stage())
}

fn main() -> Result<()> {
    let config = GameConfig::default();
    let notifier = CompletionNotifier::new().with_listener(JsonLinesListener::new(io::stdout()));
    let mut session = Session::new(&config, Box::new(SilentTones), notifier).with_seed(7);

    session.start();

    while !session.can_complete() {
        wait_for_practice(&mut session)?;

        let Some(pattern) = session.state().current_pattern else {
            bail!("no pattern to copy");
        };
        eprintln!(
            "level {} {} {}: copying {:?}",
            session.state().level,
            pattern.character,
            pattern.name,
            pattern.expected_actions()
        );
        for action in pattern.expected_actions() {
            session.tap(action);
        }

        session.advance(config.timing.success_delay());
    }

    eprintln!(
        "finished after {:.1}s of session time with {} points",
        session.elapsed().as_secs_f32(),
        session.state().score
    );

    if session.complete_activity().is_none() {
        bail!("activity could not be completed");
    }
    Ok(())
}
