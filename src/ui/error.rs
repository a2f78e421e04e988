//! Full-screen error display.
//!
//! [`render_error`] paints the red error page into a frame; the recording
//! flow uses it for its recoverable error state. [`ErrorScreen`] wraps it for
//! fatal errors raised before the flow starts.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use std::io::{self, Stdout};

const ERROR_BG: Color = Color::Rgb(255, 0, 0);
const ERROR_FG: Color = Color::Rgb(255, 255, 255);

/// Fills `frame` with red and centers `message` above `hint`.
///
/// Text wraps to 80% of the screen width.
pub fn render_error(frame: &mut Frame, message: &str, hint: &str) {
    let area = frame.area();
    let background = Style::default().bg(ERROR_BG);
    frame.buffer_mut().set_style(area, background);

    let text_style = Style::default().fg(ERROR_FG).bg(ERROR_BG);
    let lines = vec![
        Line::from(Span::styled(message, text_style.add_modifier(Modifier::BOLD))),
        Line::raw(""),
        Line::from(Span::styled(hint, text_style)),
    ];
    let paragraph = Paragraph::new(lines)
        .style(background)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    let padding_x = area.width / 10;
    let centered_area = Rect {
        x: area.x + padding_x,
        y: area.y + area.height / 3,
        width: (area.width * 80) / 100,
        height: area.height - area.height / 3,
    };
    frame.render_widget(paragraph, centered_area);
}

/// Standalone error page that owns the terminal until a key is pressed.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Enters the alternate screen in raw mode.
    ///
    /// # Errors
    /// - If the terminal cannot be initialized
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;

        Ok(ErrorScreen { terminal })
    }

    /// Shows `error_message` until any key is pressed.
    ///
    /// # Errors
    /// - If terminal rendering or input polling fails
    pub fn show_error(&mut self, error_message: &str) -> anyhow::Result<()> {
        loop {
            self.terminal
                .draw(|frame| render_error(frame, error_message, "Press any key to exit"))?;

            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Restores the terminal.
    ///
    /// # Errors
    /// - If raw mode cannot be disabled or the cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}
