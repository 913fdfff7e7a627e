//! The chat widget: one instance per surface, one send at a time

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use hookchat_wire::{
    ChatRequest, Frame, PreviousRole, PreviousSession, WebhookTransport, frame_stream,
    parse_previous_session, summary_text,
};

use crate::{
    config::WidgetConfig,
    error::{Error, Result},
    events::WidgetEvent,
    format::{Formatter, MarkupFormatter, render_with, user_markup},
    handle::{RunningGuard, WidgetHandle},
    history::{HistoryEntry, HistoryStore, Role, restore_view},
    loading::LoadingScheduler,
    renderer::StreamingRenderer,
    sequencer::{ChunkSequencer, FragmentSink},
    session_id::SessionIdProvider,
    surface::{EntryKind, InputLease, ScrollOrigin, SharedSurface},
};

/// A chat widget mounted on a surface
pub struct ChatWidget {
    surface: SharedSurface,
    config: WidgetConfig,
    transport: Arc<dyn WebhookTransport>,
    formatter: Arc<dyn Formatter>,
    history: Box<dyn HistoryStore>,
    session_ids: Box<dyn SessionIdProvider>,
    event_tx: broadcast::Sender<WidgetEvent>,
    handle: WidgetHandle,
}

impl ChatWidget {
    /// Mount a widget on a surface. A surface hosts at most one widget.
    pub fn mount(
        surface: SharedSurface,
        config: WidgetConfig,
        transport: Arc<dyn WebhookTransport>,
        history: Box<dyn HistoryStore>,
        session_ids: Box<dyn SessionIdProvider>,
    ) -> Result<Self> {
        {
            let mut s = surface.lock();
            if s.is_mounted() {
                return Err(Error::AlreadyMounted);
            }
            s.set_mounted(true);
            s.set_input(true, config.labels.input_placeholder.as_str());
        }

        let (event_tx, _) = broadcast::channel(256);
        let mut widget = Self {
            surface,
            config,
            transport,
            formatter: Arc::new(MarkupFormatter),
            history,
            session_ids,
            event_tx,
            handle: WidgetHandle::new(),
        };

        if let Err(e) = widget.history.prune_corrupt() {
            tracing::warn!("Failed to prune history: {}", e);
        }
        tracing::debug!(session_id = widget.session_id(), "chat widget mounted");
        Ok(widget)
    }

    /// Replace the bot message formatter
    pub fn with_formatter(mut self, formatter: Arc<dyn Formatter>) -> Self {
        self.formatter = formatter;
        self
    }

    /// Subscribe to widget events
    pub fn subscribe(&self) -> broadcast::Receiver<WidgetEvent> {
        self.event_tx.subscribe()
    }

    /// Get a handle to abort the current send from outside
    pub fn handle(&self) -> WidgetHandle {
        self.handle.clone()
    }

    pub fn surface(&self) -> &SharedSurface {
        &self.surface
    }

    pub fn config(&self) -> &WidgetConfig {
        &self.config
    }

    pub fn session_id(&self) -> &str {
        self.session_ids.current()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_running()
    }

    fn emit(&self, event: WidgetEvent) {
        let _ = self.event_tx.send(event);
    }

    fn record(&mut self, text: &str, role: Role) {
        let session_id = self.session_ids.current().to_string();
        if let Err(e) = self.history.append(text, role, &session_id) {
            tracing::warn!("Failed to record history entry: {}", e);
        }
    }

    /// Show the stored history of the current session. Returns how many
    /// entries were restored; the transcript is left alone when there are none.
    pub fn restore_history(&mut self) -> Result<usize> {
        let all = self.history.load_all()?;
        let view = restore_view(&all, self.session_ids.current());
        if view.is_empty() {
            return Ok(0);
        }

        {
            let mut surface = self.surface.lock();
            surface.clear();
            for entry in &view {
                match entry.role {
                    Some(Role::Agent) => {
                        let markup = render_with(self.formatter.as_ref(), &entry.text);
                        surface.push(EntryKind::Bot, entry.text.as_str(), markup)
                    }
                    _ => surface.push(EntryKind::User, entry.text.as_str(), user_markup(&entry.text)),
                };
            }
            surface.scroll_to_bottom(ScrollOrigin::Programmatic);
        }

        let count = view.len();
        tracing::debug!(count, "restored history");
        self.emit(WidgetEvent::HistoryRestored { entries: count });
        Ok(count)
    }

    /// Open the conversation: restore history, or greet and optionally ask
    /// the webhook to replay the previous session
    pub async fn start_conversation(&mut self) -> Result<()> {
        if self.restore_history()? > 0 {
            return Ok(());
        }
        tracing::debug!("no history for this session, starting fresh");

        if let Some(greeting) = self.config.initial_message.greeting().map(str::to_string) {
            self.show_bot_message(&greeting);
            self.record(&greeting, Role::Agent);
        }

        if self.config.initial_message.load_previous_session {
            let _lease = InputLease::acquire(
                &self.surface,
                &self.config.labels.waiting_for_response,
                &self.config.labels.input_placeholder,
            );
            if let Err(e) = self.load_previous_session().await {
                tracing::warn!("Failed to load previous session: {}", e);
            }
        }
        Ok(())
    }

    async fn load_previous_session(&mut self) -> Result<()> {
        let request = ChatRequest::load_previous_session(
            self.session_ids.current(),
            self.config.webhook.route.as_str(),
        );
        let body = self.transport.post(&request).await?.into_text().await?;
        let value: Value = serde_json::from_str(&body)?;

        match parse_previous_session(&value) {
            PreviousSession::Transcript(messages) => {
                let session_id = self.session_ids.current().to_string();
                let now = chrono::Utc::now();
                let total = messages.len() as i64;
                let entries: Vec<HistoryEntry> = messages
                    .iter()
                    .enumerate()
                    .map(|(index, msg)| {
                        let role = match msg.role {
                            PreviousRole::User => Role::User,
                            PreviousRole::Agent => Role::Agent,
                        };
                        let at = now - chrono::Duration::minutes(total - index as i64);
                        HistoryEntry::at(msg.content.as_str(), role, session_id.as_str(), at)
                    })
                    .collect();

                {
                    let mut surface = self.surface.lock();
                    surface.clear();
                    for entry in &entries {
                        match entry.role {
                            Some(Role::User) => {
                                surface.push(EntryKind::User, entry.text.as_str(), user_markup(&entry.text))
                            }
                            _ => {
                                let markup = render_with(self.formatter.as_ref(), &entry.text);
                                surface.push(EntryKind::Bot, entry.text.as_str(), markup)
                            }
                        };
                    }
                    surface.scroll_to_bottom(ScrollOrigin::Programmatic);
                }

                let count = entries.len();
                if count > 0 {
                    self.history.replace_all(entries)?;
                    tracing::debug!(count, "reconstructed previous session");
                }
                self.emit(WidgetEvent::HistoryRestored { entries: count });
            }
            PreviousSession::Single(text) => {
                self.record(&text, Role::Agent);
                self.show_bot_message(&text);
            }
            PreviousSession::Empty => {
                tracing::debug!("previous session returned nothing to show");
            }
        }
        Ok(())
    }

    fn show_bot_message(&self, text: &str) {
        let markup = render_with(self.formatter.as_ref(), text);
        let mut surface = self.surface.lock();
        surface.push(EntryKind::Bot, text, markup);
        surface.scroll_to_bottom(ScrollOrigin::Programmatic);
    }

    /// Forget the conversation: clear stored history and the transcript and
    /// start a new session id. Returns the new id.
    pub fn clear_history(&mut self) -> Result<String> {
        self.history.clear()?;
        self.surface.lock().clear();
        let id = self.session_ids.rotate()?;
        tracing::debug!(session_id = %id, "history cleared");
        Ok(id)
    }

    /// Send a user message and render the answer as it streams in.
    ///
    /// Returns the final answer text. Blank messages are ignored. Failures
    /// are shown on the surface and returned; input controls are re-enabled
    /// on every exit path.
    pub async fn send(&mut self, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(String::new());
        }

        self.emit(WidgetEvent::SendStart {
            message: message.to_string(),
        });
        self.record(message, Role::User);
        {
            let mut surface = self.surface.lock();
            surface.push(EntryKind::User, message, user_markup(message));
            surface.scroll_to_bottom(ScrollOrigin::Programmatic);
        }

        let _lease = InputLease::acquire(
            &self.surface,
            &self.config.labels.waiting_for_response,
            &self.config.labels.input_placeholder,
        );
        let (_running, cancel) = RunningGuard::enter(&self.handle);

        let mut renderer =
            StreamingRenderer::new(Arc::clone(&self.surface), Arc::clone(&self.formatter));
        let typing = renderer.show_typing();
        let mut loading = LoadingScheduler::start(
            Arc::clone(&self.surface),
            typing,
            self.config.loading_messages.clone(),
            self.config.loading_delay(),
            self.config.loading_interval(),
        );

        let request = ChatRequest::send_message(
            self.session_ids.current(),
            self.config.webhook.route.as_str(),
            message,
            self.config.webhook.streaming,
        );
        tracing::debug!(streaming = request.is_streaming(), "sending message");

        let outcome = {
            let mut sink = SessionSink {
                renderer: &mut renderer,
                loading: &mut loading,
                events: &self.event_tx,
                first: true,
            };
            guarded(
                pump(self.transport.as_ref(), &request, &mut sink),
                &cancel,
                self.config.timeout(),
            )
            .await
        };

        match outcome {
            Ok(summary) => {
                let text = if renderer.fragments_applied() == 0 {
                    match summary.as_ref().and_then(summary_text) {
                        Some(text) if !text.trim().is_empty() => {
                            loading.wait_for_minimum_display().await;
                            loading.cleanup();
                            renderer.render_complete(&text);
                            text
                        }
                        _ => {
                            tracing::warn!("webhook answered without any content");
                            loading.cleanup();
                            renderer.finish()
                        }
                    }
                } else {
                    if summary.is_some() {
                        tracing::debug!("ignoring final summary after streamed content");
                    }
                    loading.cleanup();
                    renderer.finish()
                };

                self.record(&text, Role::Agent);
                self.emit(WidgetEvent::Completed { text: text.clone() });
                Ok(text)
            }
            Err(e) => {
                loading.cleanup();
                let label = if e.is_timeout() || e.is_aborted() {
                    &self.config.labels.connection_error_message
                } else {
                    &self.config.labels.error_message
                };
                tracing::warn!("Chat request failed: {}", e);
                renderer.fail(label);
                self.emit(WidgetEvent::Failed {
                    label: label.clone(),
                    timeout: e.is_timeout(),
                });
                Err(e)
            }
        }
    }
}

impl Drop for ChatWidget {
    fn drop(&mut self) {
        self.surface.lock().set_mounted(false);
    }
}

/// Race a session against cancellation and the optional deadline
async fn guarded<F>(session: F, cancel: &CancellationToken, timeout: Option<Duration>) -> Result<Option<Value>>
where
    F: Future<Output = Result<Option<Value>>>,
{
    let deadline = async {
        match timeout {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!("send aborted");
            Err(hookchat_wire::Error::Aborted.into())
        }
        _ = deadline => {
            tracing::debug!(?timeout, "send timed out");
            Err(hookchat_wire::Error::Timeout.into())
        }
        result = session => result,
    }
}

/// Read the response and feed content through the sequencer. Returns the
/// last final summary seen, if any.
async fn pump(
    transport: &dyn WebhookTransport,
    request: &ChatRequest,
    sink: &mut SessionSink<'_>,
) -> Result<Option<Value>> {
    let body = transport.post(request).await?;
    let mut frames = frame_stream(body);
    let sequencer = ChunkSequencer::new();

    let reader = async {
        let mut summary = None;
        let mut result = Ok(());
        while let Some(frame) = frames.next().await {
            match frame {
                Ok(Frame::Content { text }) => sequencer.enqueue(text),
                Ok(Frame::FinalSummary { payload }) => summary = Some(payload),
                Ok(Frame::Control { signal }) => tracing::trace!(?signal, "control frame"),
                Ok(Frame::Unparseable { raw }) => tracing::trace!(%raw, "skipping unparseable frame"),
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        sequencer.close();
        result.map(|()| summary)
    };

    let (read, applied) = tokio::join!(reader, sequencer.run(sink));
    tracing::debug!(applied, "response stream finished");
    Ok(read?)
}

/// Applies fragments of one send to the renderer
struct SessionSink<'a> {
    renderer: &'a mut StreamingRenderer,
    loading: &'a mut LoadingScheduler,
    events: &'a broadcast::Sender<WidgetEvent>,
    first: bool,
}

#[async_trait]
impl FragmentSink for SessionSink<'_> {
    async fn apply(&mut self, fragment: String) {
        if self.first {
            self.first = false;
            self.loading.wait_for_minimum_display().await;
            self.loading.cleanup();
        }
        self.renderer.apply_fragment(&fragment);
        let _ = self.events.send(WidgetEvent::Fragment { text: fragment });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryHistory;
    use crate::session_id::FixedSessionId;
    use crate::surface::Surface;
    use hookchat_wire::ResponseBody;
    use parking_lot::Mutex;
    use tokio::time::{Instant, sleep};

    #[derive(Clone)]
    enum Reply {
        Chunks(Vec<&'static str>, Duration),
        Text(&'static str),
        Hang,
        Status(u16),
    }

    struct MockTransport {
        reply: Reply,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    impl MockTransport {
        fn new(reply: Reply) -> Self {
            Self {
                reply,
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl WebhookTransport for MockTransport {
        async fn post(&self, request: &ChatRequest) -> hookchat_wire::Result<ResponseBody> {
            self.requests.lock().push(request.clone());
            match self.reply.clone() {
                Reply::Chunks(chunks, delay) => Ok(ResponseBody::Stream(Box::pin(async_stream::stream! {
                    for chunk in chunks {
                        sleep(delay).await;
                        yield Ok::<_, hookchat_wire::Error>(chunk.as_bytes().to_vec());
                    }
                }))),
                Reply::Text(text) => Ok(ResponseBody::Text(text.to_string())),
                Reply::Hang => std::future::pending().await,
                Reply::Status(status) => Err(hookchat_wire::Error::Status {
                    status,
                    body: String::new(),
                }),
            }
        }
    }

    struct Fixture {
        widget: ChatWidget,
        surface: SharedSurface,
        history: MemoryHistory,
        requests: Arc<Mutex<Vec<ChatRequest>>>,
    }

    fn fixture_with(reply: Reply, config: WidgetConfig, history: MemoryHistory) -> Fixture {
        let surface = Surface::shared();
        let transport = MockTransport::new(reply);
        let requests = Arc::clone(&transport.requests);
        let widget = ChatWidget::mount(
            Arc::clone(&surface),
            config,
            Arc::new(transport),
            Box::new(history.clone()),
            Box::new(FixedSessionId::new("s1")),
        )
        .unwrap();
        Fixture {
            widget,
            surface,
            history,
            requests,
        }
    }

    fn fixture(reply: Reply) -> Fixture {
        fixture_with(
            reply,
            WidgetConfig::with_url("http://localhost/hook"),
            MemoryHistory::new(),
        )
    }

    fn kinds(surface: &SharedSurface) -> Vec<EntryKind> {
        surface.lock().entries().iter().map(|e| e.kind).collect()
    }

    fn agent_texts(history: &MemoryHistory) -> Vec<String> {
        history
            .snapshot()
            .into_iter()
            .filter(|e| e.role == Some(Role::Agent))
            .map(|e| e.text)
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ndjson_stream_ignores_trailing_summary() {
        let mut f = fixture(Reply::Chunks(
            vec![
                "{\"type\":\"begin\"}\n{\"type\":\"item\",\"content\":\"Hi\"}\n",
                "{\"type\":\"item\",\"content\":\" there\"}\n{\"type\":\"end\"}\n",
                "{\"output\":\"Hi there\"}",
            ],
            Duration::from_millis(10),
        ));

        let text = f.widget.send("Hello").await.unwrap();
        assert_eq!(text, "Hi there");
        assert_eq!(kinds(&f.surface), vec![EntryKind::User, EntryKind::Bot]);

        let s = f.surface.lock();
        let bot = &s.entries()[1];
        assert_eq!(bot.text, "Hi there");
        assert!(!bot.cursor);
        assert!(!bot.streaming);
        drop(s);
        assert_eq!(agent_texts(&f.history), vec!["Hi there"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sse_stream_accumulates() {
        let mut f = fixture(Reply::Chunks(
            vec!["data: {\"content\":\"A\"}\nda", "ta: {\"content\":\"B\"}\ndata: [DONE]\n"],
            Duration::from_millis(10),
        ));
        assert_eq!(f.widget.send("go").await.unwrap(), "AB");
        assert_eq!(f.surface.lock().entries()[1].text, "AB");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_streaming_json_body() {
        let mut config = WidgetConfig::with_url("http://localhost/hook");
        config.webhook.streaming = false;
        let mut f = fixture_with(Reply::Text(r#"{"output":"Done"}"#), config, MemoryHistory::new());

        assert_eq!(f.widget.send("do it").await.unwrap(), "Done");
        assert_eq!(kinds(&f.surface), vec![EntryKind::User, EntryKind::Bot]);
        let s = f.surface.lock();
        assert_eq!(s.entries()[1].text, "Done");
        assert!(s.entries().iter().all(|e| e.phrase.is_none()));
        drop(s);

        let requests = f.requests.lock();
        assert!(!requests[0].is_streaming());
        assert_eq!(requests[0].chat_input, "do it");
        assert_eq!(requests[0].session_id, "s1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_wins_when_no_fragments() {
        let mut f = fixture(Reply::Chunks(
            vec!["{\"type\":\"begin\"}\n{\"type\":\"end\"}\n", "[{\"output\":\"Only\"}]\n"],
            Duration::from_millis(10),
        ));
        assert_eq!(f.widget.send("q").await.unwrap(), "Only");
        assert_eq!(f.surface.lock().entries()[1].text, "Only");
    }

    #[tokio::test(start_paused = true)]
    async fn test_plain_text_body_is_shown() {
        let mut f = fixture(Reply::Text("just text"));
        assert_eq!(f.widget.send("q").await.unwrap(), "just text");
        assert_eq!(kinds(&f.surface), vec![EntryKind::User, EntryKind::Bot]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_shows_connection_error_and_reenables_input() {
        let mut config = WidgetConfig::with_url("http://localhost/hook");
        config.webhook.timeout_ms = 1000;
        let mut f = fixture_with(Reply::Hang, config, MemoryHistory::new());
        let mut events = f.widget.subscribe();

        let start = Instant::now();
        let err = f.widget.send("anyone?").await.unwrap_err();
        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_millis(1000));

        let s = f.surface.lock();
        assert_eq!(s.count(EntryKind::Typing), 0);
        let last = s.entries().last().unwrap();
        assert_eq!(last.kind, EntryKind::Error);
        assert_eq!(last.text, f.widget.config().labels.connection_error_message);
        assert!(s.input().enabled);
        assert_eq!(s.input().placeholder, "Type your message here...");
        drop(s);

        assert!(agent_texts(&f.history).is_empty());
        assert!(!f.widget.is_running());

        let mut saw_failure = false;
        while let Ok(event) = events.try_recv() {
            if let WidgetEvent::Failed { timeout, .. } = event {
                assert!(timeout);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_error_shows_generic_error() {
        let mut f = fixture(Reply::Status(500));
        let err = f.widget.send("hi").await.unwrap_err();
        assert!(!err.is_timeout());
        let s = f.surface.lock();
        let last = s.entries().last().unwrap();
        assert_eq!(last.kind, EntryKind::Error);
        assert_eq!(last.text, "An error occurred while receiving the response.");
        assert!(s.input().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_from_handle() {
        let mut f = fixture(Reply::Hang);
        let handle = f.widget.handle();

        let (result, _) = tokio::join!(f.widget.send("hi"), async {
            sleep(Duration::from_millis(100)).await;
            assert!(handle.is_running());
            handle.abort();
        });
        let err = result.unwrap_err();
        assert!(err.is_aborted());
        assert!(!err.is_timeout());
        let s = f.surface.lock();
        assert_eq!(s.count(EntryKind::Error), 1);
        let last = s.entries().last().unwrap();
        assert_eq!(last.kind, EntryKind::Error);
        assert_eq!(last.text, f.widget.config().labels.connection_error_message);
        assert!(s.input().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_disabled_while_waiting() {
        let mut f = fixture(Reply::Chunks(
            vec!["{\"type\":\"item\",\"content\":\"x\"}\n"],
            Duration::from_millis(500),
        ));
        let surface = Arc::clone(&f.surface);

        let (result, _) = tokio::join!(f.widget.send("hi"), async {
            sleep(Duration::from_millis(100)).await;
            let s = surface.lock();
            assert!(!s.input().enabled);
            assert_eq!(s.input().placeholder, "Waiting for response...");
            assert_eq!(s.count(EntryKind::Typing), 1);
        });
        result.unwrap();
        assert!(f.surface.lock().input().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fragment_waits_for_loading_phrase() {
        // phrase visible at 5000 + 850, so content may not replace it before 8850
        let mut f = fixture(Reply::Chunks(
            vec!["{\"type\":\"item\",\"content\":\"late\"}\n"],
            Duration::from_millis(6000),
        ));
        let start = Instant::now();
        assert_eq!(f.widget.send("slow?").await.unwrap(), "late");
        assert!(start.elapsed() >= Duration::from_millis(8850));
        assert!(f.surface.lock().entries().iter().all(|e| e.phrase.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_message_is_ignored() {
        let mut f = fixture(Reply::Text("unused"));
        assert_eq!(f.widget.send("   ").await.unwrap(), "");
        assert!(f.surface.lock().entries().is_empty());
        assert!(f.requests.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_in_order() {
        let mut f = fixture(Reply::Chunks(
            vec!["{\"type\":\"item\",\"content\":\"a\"}\n{\"type\":\"item\",\"content\":\"b\"}\n"],
            Duration::from_millis(10),
        ));
        let mut events = f.widget.subscribe();
        f.widget.send("hi").await.unwrap();

        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        assert_eq!(
            seen,
            vec![
                WidgetEvent::SendStart {
                    message: "hi".into()
                },
                WidgetEvent::Fragment { text: "a".into() },
                WidgetEvent::Fragment { text: "b".into() },
                WidgetEvent::Completed { text: "ab".into() },
            ]
        );
        assert!(seen.last().is_some_and(WidgetEvent::is_terminal));
    }

    #[test]
    fn test_second_mount_is_rejected() {
        let surface = Surface::shared();
        let mount = || {
            ChatWidget::mount(
                Arc::clone(&surface),
                WidgetConfig::with_url("http://localhost/hook"),
                Arc::new(MockTransport::new(Reply::Hang)),
                Box::new(MemoryHistory::new()),
                Box::new(FixedSessionId::new("s1")),
            )
        };
        let first = mount().unwrap();
        assert!(matches!(mount(), Err(Error::AlreadyMounted)));
        drop(first);
        assert!(mount().is_ok());
    }

    #[test]
    fn test_restore_history_filters_session_and_corrupt() {
        let entries = vec![
            HistoryEntry::new("mine", Role::User, "s1"),
            HistoryEntry::new("other session", Role::User, "s2"),
            HistoryEntry {
                role: None,
                ..HistoryEntry::new("no role", Role::User, "s1")
            },
            HistoryEntry {
                text: String::new(),
                ..HistoryEntry::new("x", Role::Agent, "s1")
            },
            HistoryEntry::new("reply", Role::Agent, "s1"),
        ];
        let mut f = fixture_with(
            Reply::Hang,
            WidgetConfig::with_url("http://localhost/hook"),
            MemoryHistory::with_entries(entries),
        );

        // corrupt entries were pruned on mount
        assert_eq!(f.history.snapshot().len(), 3);

        assert_eq!(f.widget.restore_history().unwrap(), 2);
        let s = f.surface.lock();
        let texts: Vec<&str> = s.entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["mine", "reply"]);
        assert_eq!(s.entries()[1].kind, EntryKind::Bot);
    }

    #[tokio::test]
    async fn test_start_conversation_shows_greeting() {
        let mut config = WidgetConfig::with_url("http://localhost/hook");
        config.initial_message.enabled = true;
        config.initial_message.text = "Welcome!".into();
        let mut f = fixture_with(Reply::Hang, config, MemoryHistory::new());

        f.widget.start_conversation().await.unwrap();
        assert_eq!(kinds(&f.surface), vec![EntryKind::Bot]);
        assert_eq!(agent_texts(&f.history), vec!["Welcome!"]);
        assert!(f.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_start_conversation_prefers_history() {
        let mut config = WidgetConfig::with_url("http://localhost/hook");
        config.initial_message.enabled = true;
        config.initial_message.text = "Welcome!".into();
        config.initial_message.load_previous_session = true;
        let mut f = fixture_with(
            Reply::Hang,
            config,
            MemoryHistory::with_entries(vec![HistoryEntry::new("earlier", Role::User, "s1")]),
        );

        f.widget.start_conversation().await.unwrap();
        assert_eq!(f.surface.lock().entries()[0].text, "earlier");
        assert_eq!(f.surface.lock().entries().len(), 1);
        assert!(f.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_load_previous_session_transcript() {
        let mut config = WidgetConfig::with_url("http://localhost/hook");
        config.initial_message.enabled = true;
        config.initial_message.text = "Welcome!".into();
        config.initial_message.load_previous_session = true;
        let body = r#"{"data": [
            {"id": ["langchain", "schema", "HumanMessage"], "kwargs": {"content": "Question"}},
            {"id": ["langchain", "schema", "AIMessage"], "kwargs": {"content": "Answer"}}
        ]}"#;
        let mut f = fixture_with(Reply::Text(body), config, MemoryHistory::new());

        f.widget.start_conversation().await.unwrap();

        assert_eq!(kinds(&f.surface), vec![EntryKind::User, EntryKind::Bot]);
        let stored = f.history.snapshot();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].role, Some(Role::User));
        assert!(stored[0].timestamp < stored[1].timestamp);
        assert!(stored.iter().all(|e| e.session_id == "s1"));

        let requests = f.requests.lock();
        assert_eq!(requests[0].action, hookchat_wire::ChatAction::LoadPreviousSession);
        assert!(!requests[0].is_streaming());
        drop(requests);
        assert!(f.surface.lock().input().enabled);
    }

    #[tokio::test]
    async fn test_load_previous_session_skips_errors() {
        let mut config = WidgetConfig::with_url("http://localhost/hook");
        config.initial_message.load_previous_session = true;
        let mut f = fixture_with(
            Reply::Text(r#"{"type": "error", "content": "boom"}"#),
            config,
            MemoryHistory::new(),
        );
        f.widget.start_conversation().await.unwrap();
        assert!(f.surface.lock().entries().is_empty());
        assert!(f.history.snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_history_rotates_session() {
        let mut f = fixture(Reply::Text(r#"{"output":"ok"}"#));
        f.widget.send("hi").await.unwrap();
        assert_eq!(f.history.snapshot().len(), 2);

        let new_id = f.widget.clear_history().unwrap();
        assert_ne!(new_id, "s1");
        assert_eq!(f.widget.session_id(), new_id);
        assert!(f.history.snapshot().is_empty());
        assert!(f.surface.lock().entries().is_empty());

        f.widget.send("again").await.unwrap();
        assert_eq!(f.requests.lock()[1].session_id, new_id);
    }
}
