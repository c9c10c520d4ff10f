use crossbeam::channel::Receiver;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
};
use std::{
    io,
    time::{Duration, Instant},
};
use tracing::debug;

use crate::game::catalog::{self, Action, Beat, Level, RhythmPattern};
use crate::game::{CompletionEvent, GameMode, Session, SessionView, Stage};

/// What a key press asks the session to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UiCommand {
    Start,
    Tap(Action),
    ResetInput,
    Replay,
    SimonMode,
    Complete,
    Quit,
}

fn command_for(stage: Stage, key: KeyCode) -> Option<UiCommand> {
    match key {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(UiCommand::Quit),
        KeyCode::Enter | KeyCode::Char(' ') if stage == Stage::Intro => Some(UiCommand::Start),
        KeyCode::Char('c') | KeyCode::Char('C') | KeyCode::Left => {
            Some(UiCommand::Tap(Action::Clap))
        }
        KeyCode::Char('s') | KeyCode::Char('S') | KeyCode::Right => {
            Some(UiCommand::Tap(Action::Stamp))
        }
        KeyCode::Char('r') | KeyCode::Char('R') => Some(UiCommand::ResetInput),
        KeyCode::Char('p') | KeyCode::Char('P') => Some(UiCommand::Replay),
        KeyCode::Char('m') | KeyCode::Char('M') => Some(UiCommand::SimonMode),
        KeyCode::Char('f') | KeyCode::Char('F') => Some(UiCommand::Complete),
        _ => None,
    }
}

/// `#RRGGBB` display token to a terminal colour.
fn parse_hex_color(token: &str) -> Option<Color> {
    let hex = token.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some(Color::Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

fn beat_label(beat: Beat) -> &'static str {
    match beat {
        Beat::Clap => " CLAP ",
        Beat::Stamp => " STAMP ",
        Beat::Pause => "  --  ",
    }
}

fn beat_color(beat: Beat) -> Color {
    match beat {
        Beat::Clap => Color::LightRed,
        Beat::Stamp => Color::Cyan,
        Beat::Pause => Color::DarkGray,
    }
}

fn action_beat(action: Action) -> Beat {
    match action {
        Action::Clap => Beat::Clap,
        Action::Stamp => Beat::Stamp,
    }
}

pub struct TerminalUI {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    session: Session,
    completion_receiver: Receiver<CompletionEvent>,
    is_running: bool,
    started_at: Instant,
    last_update: Instant,
    output_device_name: String,
    // Header status system
    header_status: Option<String>,
    status_timer: Option<Instant>,
    delivered: Option<CompletionEvent>,
}

impl TerminalUI {
    pub fn new(
        session: Session,
        completion_receiver: Receiver<CompletionEvent>,
        output_device_name: Option<&str>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(Self {
            terminal,
            session,
            completion_receiver,
            is_running: true,
            started_at: Instant::now(),
            last_update: Instant::now(),
            output_device_name: output_device_name.unwrap_or("muted").to_string(),
            header_status: None,
            status_timer: None,
            delivered: None,
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        while self.is_running {
            self.process_events()?;

            // Session time follows the wall clock
            self.session.advance_to(self.started_at.elapsed());

            self.check_status_timer();

            if self.last_update.elapsed() >= Duration::from_millis(50) {
                self.draw()?;
                self.last_update = Instant::now();
            }

            std::thread::sleep(Duration::from_millis(1));
        }

        Ok(())
    }

    fn process_events(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if event::poll(Duration::from_millis(0))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            self.handle_key_event(key);
        }

        while let Ok(event) = self.completion_receiver.try_recv() {
            self.show_status(&format!("Result sent: {} points", event.score));
            self.delivered = Some(event);
        }

        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        let stage = self.session.stage();
        let Some(command) = command_for(stage, key.code) else {
            return;
        };
        debug!(?command, %stage, "key command");

        match command {
            UiCommand::Quit => self.is_running = false,
            UiCommand::Start => {
                self.session.start();
            }
            UiCommand::Tap(action) => {
                if !self.session.tap(action) && stage != Stage::Practice {
                    self.show_status("Watch first, your turn is coming!");
                }
            }
            UiCommand::ResetInput => {
                if self.session.reset_input() {
                    self.show_status("Input cleared");
                }
            }
            UiCommand::Replay => {
                self.session.replay_pattern();
            }
            UiCommand::SimonMode => {
                if !self.session.start_simon_mode() {
                    self.show_status("Simon Says unlocks after 3 patterns");
                }
            }
            UiCommand::Complete => {
                if self.session.complete_activity().is_none() {
                    self.show_status("Finish all 5 patterns first");
                }
            }
        }
    }

    fn show_status(&mut self, message: &str) {
        self.header_status = Some(message.to_string());
        self.status_timer = Some(Instant::now());
    }

    fn check_status_timer(&mut self) {
        if let Some(timer) = self.status_timer
            && timer.elapsed() >= Duration::from_secs(3)
        {
            self.header_status = None;
            self.status_timer = None;
        }
    }

    fn draw(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let view = self.session.view();
        let header_status = self.header_status.clone();
        let device_name = self.output_device_name.clone();
        let delivered = self.delivered.is_some();

        self.terminal.draw(|f| match view.stage {
            Stage::Intro => Self::draw_intro_static(f, f.area()),
            Stage::Complete => Self::draw_complete_static(f, f.area(), &view, delivered),
            _ => {
                let chunks = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints([
                        Constraint::Length(3), // Header
                        Constraint::Length(7), // Pattern
                        Constraint::Length(5), // Player input
                        Constraint::Min(3),    // Feedback
                        Constraint::Length(4), // Footer
                    ])
                    .split(f.area());

                Self::draw_header_static(f, chunks[0], &view, &device_name, &header_status);
                Self::draw_pattern_static(f, chunks[1], &view);
                Self::draw_input_static(f, chunks[2], &view);
                Self::draw_feedback_static(f, chunks[3], &view);
                Self::draw_footer_static(f, chunks[4], &view);
            }
        })?;
        Ok(())
    }

    fn draw_intro_static(f: &mut Frame, area: Rect) {
        let title_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);
        let text = vec![
            Line::from(Span::styled("Rhythm Detective!", title_style)),
            Line::from(""),
            Line::from("Solve the rhythm mysteries by copying the beats you see and hear."),
            Line::from(""),
            Line::from("1. Watch the pattern play"),
            Line::from("2. Copy it with CLAP (c) and STAMP (s)"),
            Line::from("3. Clear all 5 levels to become a Rhythm Master"),
            Line::from("4. Try Simon Says mode for an extra challenge"),
            Line::from(""),
            Line::from(Span::styled(
                "Press Enter to start the mission  |  q to quit",
                Style::default().fg(Color::Green),
            )),
        ];

        let intro = Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Rhythm Detective"));
        f.render_widget(intro, area);
    }

    fn draw_complete_static(f: &mut Frame, area: Rect, view: &SessionView, delivered: bool) {
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let text = vec![
            Line::from(Span::styled(
                "Congratulations, Rhythm Detective!",
                bold.fg(Color::Yellow),
            )),
            Line::from(""),
            Line::from(format!("Final score: {} points", view.score)),
            Line::from(format!(
                "Patterns completed: {}/{}",
                view.completed_count,
                catalog::all().len()
            )),
            Line::from(format!("Level reached: {}", view.level)),
            Line::from(""),
            Line::from(if delivered {
                "Your result has been sent."
            } else {
                "Sending your result..."
            }),
            Line::from(""),
            Line::from(Span::styled("Press q to quit", Style::default().fg(Color::Green))),
        ];

        let done = Paragraph::new(text)
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title("Mission Complete"));
        f.render_widget(done, area);
    }

    fn draw_header_static(
        f: &mut Frame,
        area: Rect,
        view: &SessionView,
        device_name: &str,
        header_status: &Option<String>,
    ) {
        let header_text = match header_status {
            Some(message) => format!("✓ {}", message),
            None => {
                let mode = match view.game_mode {
                    GameMode::Learn => format!("Level {}/{}", view.level, Level::MAX),
                    GameMode::Simon => format!("Simon round {}", view.simon_round),
                };
                format!(
                    "{} | Score: {} | Completed: {}/{} | Audio: {}",
                    mode,
                    view.score,
                    view.completed_count,
                    catalog::all().len(),
                    device_name
                )
            }
        };

        let header = Paragraph::new(header_text)
            .style(
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Rhythm Detective"),
            );
        f.render_widget(header, area);
    }

    fn draw_pattern_static(f: &mut Frame, area: Rect, view: &SessionView) {
        let Some(pattern) = view.pattern else {
            f.render_widget(Block::default().borders(Borders::ALL), area);
            return;
        };

        let block = Block::default().borders(Borders::ALL).title("Pattern");
        let inner = block.inner(area);
        f.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2), Constraint::Min(1)])
            .split(inner);

        let character_color = parse_hex_color(pattern.character_color).unwrap_or(Color::White);
        let title = Line::from(vec![
            Span::styled(
                format!("{} ", pattern.character),
                Style::default().fg(character_color),
            ),
            Span::styled(
                pattern.name,
                Style::default()
                    .fg(character_color)
                    .add_modifier(Modifier::BOLD),
            ),
        ]);
        f.render_widget(Paragraph::new(title).alignment(Alignment::Center), chunks[0]);

        f.render_widget(
            Paragraph::new(Self::beats_line(pattern, view.animating_beat))
                .alignment(Alignment::Center),
            chunks[1],
        );

        let status = match (view.stage, view.is_playing) {
            (_, true) => "Playing...",
            (Stage::Watch, false) | (Stage::Simon, false) => "Get ready to watch",
            _ => "p = play pattern again",
        };
        f.render_widget(
            Paragraph::new(status)
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center),
            chunks[2],
        );
    }

    fn beats_line(pattern: &RhythmPattern, animating: Option<usize>) -> Line<'static> {
        let mut spans = Vec::with_capacity(pattern.beats.len() * 2);
        for (index, &beat) in pattern.beats.iter().enumerate() {
            let style = if animating == Some(index) {
                Style::default()
                    .bg(Color::Yellow)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(beat_color(beat))
            };
            spans.push(Span::styled(format!("[{}]", beat_label(beat)), style));
            spans.push(Span::raw(" "));
        }
        Line::from(spans)
    }

    fn draw_input_static(f: &mut Frame, area: Rect, view: &SessionView) {
        let block = Block::default().borders(Borders::ALL).title("Your Turn");

        if view.stage != Stage::Practice {
            f.render_widget(block, area);
            return;
        }

        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Length(1), Constraint::Min(0)])
            .split(inner);

        let taps: Vec<Span> = view
            .input
            .iter()
            .flat_map(|&action| {
                let beat = action_beat(action);
                [
                    Span::styled(
                        format!("[{}]", beat_label(beat)),
                        Style::default().fg(beat_color(beat)),
                    ),
                    Span::raw(" "),
                ]
            })
            .collect();
        f.render_widget(
            Paragraph::new(Line::from(taps)).alignment(Alignment::Center),
            rows[0],
        );

        let ratio = if view.expected_len == 0 {
            0.0
        } else {
            (view.input.len() as f64 / view.expected_len as f64).min(1.0)
        };
        let progress = Gauge::default()
            .gauge_style(Style::default().fg(Color::Green))
            .ratio(ratio)
            .label(format!("{}/{}", view.input.len(), view.expected_len));
        f.render_widget(progress, rows[1]);
    }

    fn draw_feedback_static(f: &mut Frame, area: Rect, view: &SessionView) {
        let feedback = Paragraph::new(view.feedback)
            .style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(feedback, area);
    }

    fn draw_footer_static(f: &mut Frame, area: Rect, view: &SessionView) {
        let key_color = Color::Yellow;
        let desc_color = Color::White;
        let sep_color = Color::DarkGray;

        let key_desc = |key: &str, desc: &str| -> Vec<Span> {
            vec![
                Span::styled(
                    key.to_string(),
                    Style::default().fg(key_color).add_modifier(Modifier::BOLD),
                ),
                Span::styled("=".to_string(), Style::default().fg(sep_color)),
                Span::styled(desc.to_string(), Style::default().fg(desc_color)),
            ]
        };
        let separator = || Span::styled(" | ".to_string(), Style::default().fg(sep_color));

        let mut line1_spans = Vec::new();
        line1_spans.extend(key_desc("C/←", "Clap"));
        line1_spans.push(separator());
        line1_spans.extend(key_desc("S/→", "Stamp"));
        line1_spans.push(separator());
        line1_spans.extend(key_desc("R", "Reset"));
        line1_spans.push(separator());
        line1_spans.extend(key_desc("P", "Play Pattern"));

        let mut line2_spans = Vec::new();
        if view.can_start_simon {
            line2_spans.extend(key_desc("M", "Simon Says"));
            line2_spans.push(separator());
        }
        if view.can_complete {
            line2_spans.extend(key_desc("F", "Complete Activity"));
            line2_spans.push(separator());
        }
        line2_spans.extend(key_desc("Q", "Quit"));

        let footer = Paragraph::new(vec![Line::from(line1_spans), Line::from(line2_spans)])
            .block(Block::default().borders(Borders::ALL).title("Controls"));
        f.render_widget(footer, area);
    }
}

impl Drop for TerminalUI {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enter_only_starts_from_intro() {
        assert_eq!(command_for(Stage::Intro, KeyCode::Enter), Some(UiCommand::Start));
        assert_eq!(command_for(Stage::Practice, KeyCode::Enter), None);
    }

    #[test]
    fn test_tap_keys() {
        assert_eq!(
            command_for(Stage::Practice, KeyCode::Char('c')),
            Some(UiCommand::Tap(Action::Clap))
        );
        assert_eq!(
            command_for(Stage::Practice, KeyCode::Right),
            Some(UiCommand::Tap(Action::Stamp))
        );
        assert_eq!(command_for(Stage::Watch, KeyCode::Char('x')), None);
        assert_eq!(command_for(Stage::Complete, KeyCode::Esc), Some(UiCommand::Quit));
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF6B6B"), Some(Color::Rgb(0xFF, 0x6B, 0x6B)));
        assert_eq!(parse_hex_color("FF6B6B"), None);
        assert_eq!(parse_hex_color("#FFF"), None);
        assert_eq!(parse_hex_color("#GG0000"), None);
    }

    #[test]
    fn test_catalog_colors_parse() {
        for pattern in catalog::all() {
            assert!(parse_hex_color(pattern.character_color).is_some());
        }
    }

    #[test]
    fn test_beats_line_highlights_animating_beat() {
        let pattern = catalog::get(Level::FIRST);
        let line = TerminalUI::beats_line(pattern, Some(1));
        // beat + spacer per slot
        assert_eq!(line.spans.len(), pattern.beats.len() * 2);
        assert_eq!(line.spans[2].style.bg, Some(Color::Yellow));
        assert_eq!(line.spans[0].style.bg, None);
    }
}
