//! TUI implementation for hookchat

use crossterm::event::EventStream;
use futures::StreamExt;
use hookchat_core::{ChatWidget, ScrollOrigin, SharedSurface, WidgetConfig, WidgetEvent};
use hookchat_tui::{
    TerminalSession, Theme,
    input::{Action, event_to_action},
    widgets::{InputBox, Spinner, Transcript},
};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Work that runs while the loop keeps drawing
enum Job {
    /// Restore history or greet
    Start,
    /// Send a user message
    Send(String),
}

/// What the loop should do after an input action
enum Flow {
    Continue,
    Quit,
}

/// TUI application state
pub struct TuiState {
    input: InputBox,
    theme: Theme,
    bot_name: String,
    header: String,
    /// Status shown while idle
    status: String,
    /// Label of the spinner while a job runs
    busy_label: Option<String>,
    spinner_start: Instant,
    /// Animation ticks
    tick: u64,
    /// Height of the transcript pane at the last draw
    viewport: u16,
}

impl TuiState {
    pub fn new(config: &WidgetConfig) -> Self {
        let name = config.branding.name.trim();
        let bot_name = if name.is_empty() { "Assistant" } else { name }.to_string();
        let header = if config.branding.response_time_text.is_empty() {
            bot_name.clone()
        } else {
            format!("{} · {}", bot_name, config.branding.response_time_text)
        };
        Self {
            input: InputBox::new(),
            theme: Theme::from_style(&config.style),
            bot_name,
            header,
            status: "Ready".to_string(),
            busy_label: None,
            spinner_start: Instant::now(),
            tick: 0,
            viewport: 0,
        }
    }

    fn begin(&mut self, label: &str) {
        self.busy_label = Some(label.to_string());
        self.spinner_start = Instant::now();
    }

    fn end(&mut self) {
        self.busy_label = None;
    }

    /// Handle widget events
    pub fn handle_widget_event(&mut self, event: WidgetEvent) {
        match event {
            WidgetEvent::SendStart { .. } => self.status = "Sending".to_string(),
            WidgetEvent::Fragment { .. } => {}
            WidgetEvent::Completed { .. } => self.status = "Ready".to_string(),
            WidgetEvent::Failed { label, timeout } => {
                self.status = if timeout {
                    "Timed out".to_string()
                } else {
                    label
                };
            }
            WidgetEvent::HistoryRestored { entries } => {
                self.status = format!("Restored {} messages", entries);
            }
        }
    }

    /// Scrolling and editing, allowed at any time
    fn handle_shared_action(&mut self, action: &Action, surface: &SharedSurface, width: u16) {
        let page = self.viewport.saturating_sub(1).max(1) as isize;
        let delta = match action {
            Action::Scroll(rows) => *rows,
            Action::PageUp => -page,
            Action::PageDown => page,
            _ => {
                self.input.handle_action(action, width);
                return;
            }
        };
        surface.lock().scroll_by(delta, ScrollOrigin::User);
    }

    pub fn render(&mut self, frame: &mut Frame, surface: &SharedSurface) {
        // Layout: header (1), transcript (flex), status bar (1), input (3)
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(3),
            ])
            .split(frame.area());

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                self.header.as_str(),
                self.theme.primary_bold(),
            ))),
            chunks[0],
        );

        let area = chunks[1];
        let (transcript, controls) = {
            let mut s = surface.lock();
            let transcript =
                Transcript::layout(s.entries(), &self.theme, &self.bot_name, area.width, self.tick);
            s.set_metrics(transcript.height(), area.height as usize);
            let offset = s.scroll().offset;
            (transcript.offset(offset), s.input().clone())
        };
        self.viewport = area.height;
        frame.render_widget(transcript, area);

        self.render_status(frame, chunks[2]);
        self.input
            .render(chunks[3], frame.buffer_mut(), &self.theme, &controls);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        if let Some(label) = &self.busy_label {
            let spinner = Spinner::new(label, &self.theme).with_start_time(self.spinner_start);
            frame.render_widget(spinner, area);
            return;
        }

        let left_content = self.status.as_str();
        let right_content = "Ctrl+L: clear │ Esc: stop │ Ctrl+C: quit";
        let left_width = left_content.chars().count();
        let right_width = right_content.chars().count();
        let available = area.width as usize;

        let line = if left_width + right_width + 2 <= available {
            let spacing = available - left_width - right_width;
            Line::from(vec![
                Span::styled(left_content, self.theme.dim_style()),
                Span::raw(" ".repeat(spacing)),
                Span::styled(right_content, self.theme.border_style()),
            ])
        } else {
            Line::from(Span::styled(left_content, self.theme.dim_style()))
        };
        frame.render_widget(Paragraph::new(line), area);
    }
}

/// Run the TUI application
pub async fn run_tui(widget: &mut ChatWidget) -> anyhow::Result<()> {
    let mut session = TerminalSession::enter()?;
    let mut state = TuiState::new(widget.config());
    let waiting = widget.config().labels.waiting_for_response.clone();

    let surface = Arc::clone(widget.surface());
    let abort = widget.handle();
    let mut widget_rx = widget.subscribe();
    let mut event_stream = EventStream::new();

    // Tick interval for animations (80ms for smooth spinner)
    let mut tick_interval = tokio::time::interval(Duration::from_millis(80));

    let mut pending = Some(Job::Start);

    loop {
        if let Some(job) = pending.take() {
            match &job {
                Job::Start => state.begin("Loading conversation..."),
                Job::Send(_) => state.begin(&waiting),
            }

            // Only the job borrows the widget; the loop uses the surface and handle
            let work = async {
                match job {
                    Job::Start => widget.start_conversation().await.map(|_| ()),
                    Job::Send(text) => widget.send(&text).await.map(|_| ()),
                }
            };
            let mut work = std::pin::pin!(work);

            let flow = loop {
                session.terminal().draw(|frame| state.render(frame, &surface))?;
                let width = session.terminal().size()?.width;

                tokio::select! {
                    biased;

                    result = &mut work => {
                        if let Err(e) = result {
                            tracing::debug!("job failed: {}", e);
                        }
                        break Flow::Continue;
                    }

                    event = widget_rx.recv() => {
                        if let Ok(event) = event {
                            state.handle_widget_event(event);
                        }
                    }

                    event = event_stream.next() => {
                        match event {
                            Some(Ok(event)) => match event_to_action(event) {
                                Some(Action::Interrupt | Action::Escape) => {
                                    abort.abort();
                                    state.begin("Cancelling...");
                                }
                                Some(Action::Quit) => break Flow::Quit,
                                // no submitting or clearing while a job runs
                                Some(Action::Submit | Action::ClearHistory) | None => {}
                                Some(action) => state.handle_shared_action(&action, &surface, width),
                            },
                            Some(Err(_)) | None => break Flow::Quit,
                        }
                    }

                    _ = tick_interval.tick() => state.tick += 1,
                }
            };

            while let Ok(event) = widget_rx.try_recv() {
                state.handle_widget_event(event);
            }
            state.end();
            if matches!(flow, Flow::Quit) {
                return Ok(());
            }
            continue;
        }

        session.terminal().draw(|frame| state.render(frame, &surface))?;
        let width = session.terminal().size()?.width;

        tokio::select! {
            biased;

            event = widget_rx.recv() => {
                if let Ok(event) = event {
                    state.handle_widget_event(event);
                }
            }

            event = event_stream.next() => {
                let event = match event {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => return Err(anyhow::anyhow!("Event error: {}", e)),
                    None => return Ok(()),
                };
                match event_to_action(event) {
                    Some(Action::Submit) => {
                        if !state.input.is_empty() && surface.lock().input().enabled {
                            pending = Some(Job::Send(state.input.take()));
                        }
                    }
                    Some(Action::Quit | Action::Interrupt) => return Ok(()),
                    Some(Action::Escape) | None => {}
                    Some(Action::ClearHistory) => match widget.clear_history() {
                        Ok(id) => {
                            let short: String = id.chars().take(8).collect();
                            state.status = format!("Cleared │ new session {}", short);
                        }
                        Err(e) => state.status = format!("Clear failed: {}", e),
                    },
                    Some(action) => state.handle_shared_action(&action, &surface, width),
                }
            }

            _ = tick_interval.tick() => state.tick += 1,
        }
    }
}
