//! Guided recording flow in the terminal.
//!
//! Walks the user through picking a microphone, recording with a live
//! waveform, previewing the take against its replayed waveform, and accepting
//! or re-recording it. All session logic lives in the [`SessionController`];
//! this module maps keys to session events and keeps the waveform producer in
//! step with the session state.

use super::blob::AudioBlob;
use super::playback::{PlaybackElement, PreviewPlayer};
use super::visualizations::{
    BufferSurface, LiveSampler, Producer, ReplayReconstructor, SampleMetadata, WaveformView,
};
use crate::config::VisualizationConfig;
use crate::session::{RecordingPhase, SessionController, SessionEvent, SessionState};
use crate::ui::{render_error, Theme};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph},
};
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

/// Seconds moved by one seek key press in the preview.
const SEEK_STEP_SECS: f32 = 2.0;
const INPUT_POLL: Duration = Duration::from_millis(30);

/// How the flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The user accepted a recording and it was handed to the completion callback
    Accepted,
    /// The user left without accepting anything
    Cancelled,
}

/// What a key press asks the flow to do.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Action {
    Cancel,
    Retry,
    Start,
    ChangeDevice,
    MoveSelection(isize),
    ConfirmSelection,
    LeaveSelection,
    Pause,
    Resume,
    Stop,
    TogglePlayback,
    Seek(f32),
    Accept,
    Restart,
}

/// Maps a key press to an action valid in `state`.
fn key_action(state: &SessionState, key: KeyEvent) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Cancel);
    }
    let action = match (state, key.code) {
        (SessionState::Selecting, KeyCode::Up | KeyCode::Char('k')) => Action::MoveSelection(-1),
        (SessionState::Selecting, KeyCode::Down | KeyCode::Char('j')) => Action::MoveSelection(1),
        (SessionState::Selecting, KeyCode::Enter) => Action::ConfirmSelection,
        (SessionState::Selecting, KeyCode::Esc | KeyCode::Char('q')) => Action::LeaveSelection,
        (_, KeyCode::Esc | KeyCode::Char('q')) => Action::Cancel,

        (SessionState::Error(_), KeyCode::Char('r')) => Action::Retry,
        (SessionState::Ready, KeyCode::Enter | KeyCode::Char(' ')) => Action::Start,
        (SessionState::Ready, KeyCode::Char('d')) => Action::ChangeDevice,

        (SessionState::Recording(RecordingPhase::Playing), KeyCode::Char(' ')) => Action::Pause,
        (SessionState::Recording(RecordingPhase::Paused), KeyCode::Char(' ')) => Action::Resume,
        (
            SessionState::Recording(RecordingPhase::Playing | RecordingPhase::Paused),
            KeyCode::Enter,
        ) => Action::Stop,

        (SessionState::Done, KeyCode::Char(' ')) => Action::TogglePlayback,
        (SessionState::Done, KeyCode::Left) => Action::Seek(-SEEK_STEP_SECS),
        (SessionState::Done, KeyCode::Right) => Action::Seek(SEEK_STEP_SECS),
        (SessionState::Done, KeyCode::Enter) => Action::Accept,
        (SessionState::Done, KeyCode::Char('r')) => Action::Restart,
        _ => return None,
    };
    Some(action)
}

/// Splits the screen into header, waveform and footer.
fn layout(area: Rect) -> [Rect; 3] {
    Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area)
}

/// Splits the footer into a status area sized to `status` and the help area.
fn footer_areas(footer: Rect, status: &Line) -> [Rect; 2] {
    let width = u16::try_from(status.width()).unwrap_or(u16::MAX);
    Layout::horizontal([Constraint::Length(width), Constraint::Min(0)]).areas(footer)
}

fn format_time(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Terminal UI driving one recording session from device selection to acceptance.
pub struct RecordingFlow {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    controller: SessionController,
    config: VisualizationConfig,
    theme: Theme,
    view: WaveformView,
    player: Option<PreviewPlayer>,
    device_cursor: usize,
    restored: bool,
}

impl RecordingFlow {
    /// Enters the alternate screen and takes over the terminal.
    ///
    /// # Errors
    /// - If raw mode or the alternate screen cannot be entered
    pub fn new(
        controller: SessionController,
        config: VisualizationConfig,
        theme: Theme,
    ) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            controller,
            config,
            theme,
            view: WaveformView::new(config),
            player: None,
            device_cursor: 0,
            restored: false,
        })
    }

    /// Runs the flow until the user accepts or leaves.
    ///
    /// `on_recording_complete` is called exactly once, after the terminal has
    /// been restored, if and only if a recording was accepted.
    ///
    /// # Errors
    /// - If drawing or input handling fails
    /// - If `on_recording_complete` fails
    pub fn run<F>(mut self, on_recording_complete: F) -> anyhow::Result<FlowOutcome>
    where
        F: FnOnce(AudioBlob) -> anyhow::Result<()>,
    {
        let accepted = self.event_loop();
        self.cleanup()?;
        match accepted? {
            Some(blob) => {
                tracing::info!(
                    "Recording accepted ({:.2}s)",
                    blob.duration().as_secs_f32()
                );
                on_recording_complete(blob)?;
                Ok(FlowOutcome::Accepted)
            }
            None => {
                tracing::info!("Recording flow cancelled");
                Ok(FlowOutcome::Cancelled)
            }
        }
    }

    fn event_loop(&mut self) -> anyhow::Result<Option<AudioBlob>> {
        let mut last_frame = Instant::now();
        loop {
            self.controller.pump();
            self.sync_view()?;

            let now = Instant::now();
            self.controller.tick(now.duration_since(last_frame));
            last_frame = now;
            if let Some(player) = self.player.as_mut() {
                player.tick();
            }

            self.draw()?;

            if !event::poll(INPUT_POLL)? {
                continue;
            }
            let Event::Key(key) = event::read()? else {
                continue;
            };
            if key.kind != KeyEventKind::Press {
                continue;
            }
            let Some(action) = key_action(self.controller.state(), key) else {
                continue;
            };
            tracing::debug!("Key {:?} -> {:?}", key.code, action);

            match action {
                Action::Cancel => return Ok(None),
                Action::Accept => match self.controller.accept() {
                    Ok(blob) => return Ok(Some(blob)),
                    Err(e) => tracing::warn!("{}", e),
                },
                action => self.apply(action),
            }
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::Retry => {
                self.dispatch(SessionEvent::Retry);
            }
            Action::Start => {
                self.dispatch(SessionEvent::Start);
            }
            Action::ChangeDevice => {
                let session = self.controller.session();
                if session.audio_devices.is_empty() {
                    tracing::debug!("No devices to choose from");
                    return;
                }
                self.device_cursor = session
                    .selected_device
                    .as_ref()
                    .and_then(|s| session.audio_devices.iter().position(|d| d == s))
                    .unwrap_or(0);
                self.dispatch(SessionEvent::ChangeDevice);
            }
            Action::MoveSelection(delta) => {
                let count = self.controller.session().audio_devices.len();
                if count > 0 {
                    let next = self.device_cursor as isize + delta;
                    self.device_cursor = next.clamp(0, count as isize - 1) as usize;
                }
            }
            Action::ConfirmSelection => {
                let devices = &self.controller.session().audio_devices;
                if let Some(device) = devices.get(self.device_cursor).cloned() {
                    self.dispatch(SessionEvent::Select(device));
                }
            }
            Action::LeaveSelection => {
                let session = self.controller.session();
                let current = session
                    .selected_device
                    .clone()
                    .or_else(|| session.audio_devices.first().cloned());
                if let Some(device) = current {
                    self.dispatch(SessionEvent::Select(device));
                }
            }
            Action::Pause => {
                if self.dispatch(SessionEvent::Pause) {
                    if let Some(sampler) = self.view.live_mut() {
                        sampler.pause();
                    }
                }
            }
            Action::Resume => {
                if self.dispatch(SessionEvent::Resume) {
                    if let Some(sampler) = self.view.live_mut() {
                        sampler.resume();
                    }
                }
            }
            Action::Stop => {
                let metadata = match self.view.detach() {
                    Some(Producer::Live(sampler)) => sampler.finish(),
                    _ => SampleMetadata::new(),
                };
                self.dispatch(SessionEvent::Stop(metadata));
            }
            Action::TogglePlayback => {
                if let Some(player) = self.player.as_mut() {
                    player.toggle();
                }
            }
            Action::Seek(delta) => {
                if let Some(player) = self.player.as_mut() {
                    player.seek_by(delta);
                }
            }
            Action::Restart => {
                self.dispatch(SessionEvent::Restart);
            }
            Action::Cancel | Action::Accept => {}
        }
    }

    /// Dispatches `event`, logging a rejection. Returns whether it was applied.
    fn dispatch(&mut self, event: SessionEvent) -> bool {
        match self.controller.dispatch(event) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("{}", e);
                false
            }
        }
    }

    fn waveform_area(&self) -> anyhow::Result<Rect> {
        let size = self.terminal.size()?;
        let [_, waveform, _] = layout(Rect::new(0, 0, size.width, size.height));
        Ok(waveform)
    }

    /// Attaches the producer the current state needs and drops the ones it does not.
    fn sync_view(&mut self) -> anyhow::Result<()> {
        match self.controller.state() {
            SessionState::Recording(phase @ (RecordingPhase::Playing | RecordingPhase::Paused)) => {
                let paused = *phase == RecordingPhase::Paused;
                if self.view.live_mut().is_some() {
                    return Ok(());
                }
                let Some(analyser) = self
                    .controller
                    .session()
                    .capture_handle
                    .as_ref()
                    .map(|h| h.analyser.clone())
                else {
                    return Ok(());
                };
                let area = self.waveform_area()?;
                let mut sampler =
                    LiveSampler::new(self.config, analyser, area.width as f32, area.height as f32);
                if paused {
                    sampler.pause();
                }
                self.view.attach_live(sampler);
            }
            SessionState::Recording(RecordingPhase::Stopping) => {}
            SessionState::Done => {
                if self.view.replay_mut().is_some() {
                    return Ok(());
                }
                let session = self.controller.session();
                let (Some(blob), Some(metadata)) = (&session.audio_blob, &session.metadata) else {
                    return Ok(());
                };
                let mut player = PreviewPlayer::new(blob);
                let area = self.waveform_area()?;
                let mut replay = ReplayReconstructor::new(
                    self.config,
                    metadata,
                    area.width as f32,
                    area.height as f32,
                );
                replay.attach(&mut player);
                self.view.attach_replay(replay);
                self.player = Some(player);
            }
            _ => {
                if self.view.detach().is_some() {
                    tracing::debug!("Waveform detached");
                }
                self.player = None;
            }
        }
        Ok(())
    }

    fn draw(&mut self) -> anyhow::Result<()> {
        let Self {
            terminal,
            controller,
            theme,
            view,
            player,
            device_cursor,
            ..
        } = self;
        let session = controller.session();
        let theme = *theme;
        let base = Style::default().fg(theme.foreground).bg(theme.background);

        terminal.draw(|frame| {
            if let SessionState::Error(fault) = &session.state {
                render_error(frame, &fault.to_string(), "r retry · q quit");
                return;
            }

            let area = frame.area();
            let [header, body, footer] = layout(area);
            frame.buffer_mut().set_style(area, base);

            let device = session
                .selected_device
                .as_ref()
                .map(|d| d.label.as_str())
                .unwrap_or("system default");
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    Span::styled(" voxmemo ", Style::default().fg(theme.background).bg(theme.accent)),
                    Span::raw(format!("  {}  ", session.state)),
                    Span::styled(device, Style::default().fg(theme.muted)),
                ]))
                .style(base),
                header,
            );

            let mut status = Line::default();
            let help = match &session.state {
                SessionState::GettingDevices => {
                    centered(frame, body, "Looking for microphones…", base);
                    "q quit".to_string()
                }
                SessionState::Ready => {
                    centered(frame, body, &format!("Microphone: {device}"), base);
                    "Enter record · d change microphone · q quit".to_string()
                }
                SessionState::Selecting => {
                    let items: Vec<ListItem> = session
                        .audio_devices
                        .iter()
                        .map(|d| ListItem::new(format!("  {}", d.label)))
                        .collect();
                    let list = List::new(items)
                        .style(base)
                        .highlight_style(Style::default().fg(theme.background).bg(theme.accent));
                    let mut state = ListState::default().with_selected(Some(*device_cursor));
                    frame.render_stateful_widget(list, body, &mut state);
                    "↑/↓ choose · Enter select · Esc back".to_string()
                }
                SessionState::Recording(phase) => {
                    let mut surface =
                        BufferSurface::new(
                        frame.buffer_mut(),
                        body,
                        theme.accent,
                        theme.muted,
                        theme.background,
                    );
                    view.tick(&mut surface);
                    let (indicator, color) = match phase {
                        RecordingPhase::Playing => ("● ", Color::Red),
                        RecordingPhase::Paused => ("⏸ ", Color::Yellow),
                        RecordingPhase::Stopping => ("■ ", theme.muted),
                    };
                    status = Line::from(vec![
                        Span::styled(indicator, Style::default().fg(color)),
                        Span::styled(
                            format_time(session.elapsed),
                            Style::default().fg(theme.timer_color(session.elapsed)),
                        ),
                        Span::raw("  "),
                    ]);
                    let help = match phase {
                        RecordingPhase::Playing => "Space pause · Enter stop · q discard",
                        RecordingPhase::Paused => "Space resume · Enter stop · q discard",
                        RecordingPhase::Stopping => "Finishing recording…",
                    };
                    help.to_string()
                }
                SessionState::Done => {
                    let mut surface =
                        BufferSurface::new(
                        frame.buffer_mut(),
                        body,
                        theme.accent,
                        theme.muted,
                        theme.background,
                    );
                    view.tick(&mut surface);
                    if let Some(player) = player.as_ref() {
                        let icon = if player.is_playing() { "▶ " } else { "⏸ " };
                        let mut spans = vec![
                            Span::styled(icon, Style::default().fg(theme.accent)),
                            Span::raw(format!(
                                "{} / {}",
                                format_time(player.position()),
                                format_time(player.duration())
                            )),
                        ];
                        if !player.is_audible() {
                            spans.push(Span::styled(" (no audio output)", Style::default().fg(theme.muted)));
                        }
                        spans.push(Span::raw("  "));
                        status = Line::from(spans);
                    }
                    "Space play/pause · ←/→ seek · Enter accept · r re-record · q discard"
                        .to_string()
                }
                SessionState::Error(_) => String::new(),
            };
            let [status_area, help_area] = footer_areas(footer, &status);
            frame.render_widget(Paragraph::new(status).style(base), status_area);
            frame.render_widget(
                Paragraph::new(Span::styled(help, Style::default().fg(theme.muted)))
                    .alignment(Alignment::Right),
                help_area,
            );
        })?;
        Ok(())
    }

    /// Restores the terminal.
    ///
    /// # Errors
    /// - If raw mode cannot be disabled or the cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for RecordingFlow {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn centered(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let line_area = Rect {
        y: area.y + area.height / 2,
        height: area.height.min(1),
        ..area
    };
    frame.render_widget(
        Paragraph::new(text).style(style).alignment(Alignment::Center),
        line_area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionFault;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_space_follows_recording_phase() {
        let playing = SessionState::Recording(RecordingPhase::Playing);
        let paused = SessionState::Recording(RecordingPhase::Paused);
        let stopping = SessionState::Recording(RecordingPhase::Stopping);

        assert_eq!(key_action(&playing, press(KeyCode::Char(' '))), Some(Action::Pause));
        assert_eq!(key_action(&paused, press(KeyCode::Char(' '))), Some(Action::Resume));
        assert_eq!(key_action(&stopping, press(KeyCode::Char(' '))), None);
        assert_eq!(key_action(&stopping, press(KeyCode::Enter)), None);
    }

    #[test]
    fn test_escape_leaves_selection_instead_of_quitting() {
        assert_eq!(
            key_action(&SessionState::Selecting, press(KeyCode::Esc)),
            Some(Action::LeaveSelection)
        );
        assert_eq!(
            key_action(&SessionState::Ready, press(KeyCode::Esc)),
            Some(Action::Cancel)
        );
    }

    #[test]
    fn test_ctrl_c_always_cancels() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(key_action(&SessionState::Selecting, key), Some(Action::Cancel));
        assert_eq!(key_action(&SessionState::Done, key), Some(Action::Cancel));
    }

    #[test]
    fn test_preview_keys_only_in_done() {
        assert_eq!(
            key_action(&SessionState::Done, press(KeyCode::Left)),
            Some(Action::Seek(-SEEK_STEP_SECS))
        );
        assert_eq!(
            key_action(&SessionState::Done, press(KeyCode::Enter)),
            Some(Action::Accept)
        );
        assert_eq!(key_action(&SessionState::Ready, press(KeyCode::Left)), None);
        assert_eq!(
            key_action(
                &SessionState::Error(SessionFault::Enumeration("x".to_string())),
                press(KeyCode::Char('r'))
            ),
            Some(Action::Retry)
        );
    }

    #[test]
    fn test_layout_reserves_header_and_footer() {
        let [header, body, footer] = layout(Rect::new(0, 0, 80, 24));
        assert_eq!(header.height, 1);
        assert_eq!(body, Rect::new(0, 1, 80, 22));
        assert_eq!(footer.y, 23);
    }

    #[test]
    fn test_footer_keeps_status_clear_of_help() {
        let status = Line::from(vec![Span::raw("● "), Span::raw("1:05"), Span::raw("  ")]);

        let [status_area, help_area] = footer_areas(Rect::new(0, 23, 80, 1), &status);
        assert_eq!(status_area, Rect::new(0, 23, 8, 1));
        assert_eq!(help_area, Rect::new(8, 23, 72, 1));

        // On a narrow terminal the status keeps its cells and help gets what is left.
        let [status_area, help_area] = footer_areas(Rect::new(0, 23, 10, 1), &status);
        assert_eq!(status_area.width, 8);
        assert_eq!(help_area.x, 8);
        assert_eq!(help_area.width, 2);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(Duration::from_secs(75)), "1:15");
        assert_eq!(format_time(Duration::from_millis(999)), "0:00");
    }
}
