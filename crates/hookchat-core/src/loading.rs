//! Rotating "thinking" phrases on the typing indicator
//!
//! Purely decorative. When the first fragment takes longer than the
//! configured delay, the typing indicator starts showing a random phrase,
//! replaced every interval with a short fade. Once real content arrives the
//! orchestrator lets the current phrase stay up for [`MINIMUM_DISPLAY`] and
//! then tears the scheduler down.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until};
use tokio_util::sync::CancellationToken;

use crate::{
    config::LoadingMessage,
    surface::{Entry, EntryId, PhraseView, ScrollOrigin, SharedSurface, Surface},
};

/// Pause between activation and the first phrase
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);
/// Fade-out before a phrase is swapped
pub const FADE_OUT: Duration = Duration::from_millis(300);
/// Fade-in after a phrase is swapped
pub const FADE_IN: Duration = Duration::from_millis(50);
/// A shown phrase stays up at least this long
pub const MINIMUM_DISPLAY: Duration = Duration::from_millis(3000);

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadingPhase {
    Inactive,
    Active,
    /// Waiting out the minimum display time; no new phrases
    TearingDown,
}

#[derive(Debug)]
struct State {
    phase: LoadingPhase,
    shown_at: Option<Instant>,
}

/// Handle to the loading-phrase task of one session
pub struct LoadingScheduler {
    state: Arc<Mutex<State>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
    surface: SharedSurface,
    typing: EntryId,
}

impl LoadingScheduler {
    /// Arm the scheduler for a typing indicator. With no phrases the
    /// scheduler is inert.
    pub fn start(
        surface: SharedSurface,
        typing: EntryId,
        phrases: Vec<LoadingMessage>,
        delay: Duration,
        interval: Duration,
    ) -> Self {
        let state = Arc::new(Mutex::new(State {
            phase: LoadingPhase::Inactive,
            shown_at: None,
        }));
        let cancel = CancellationToken::new();

        let task = if phrases.is_empty() {
            None
        } else {
            let runner = Runner {
                state: Arc::clone(&state),
                cancel: cancel.clone(),
                surface: Arc::clone(&surface),
                typing,
            };
            Some(tokio::spawn(runner.run(phrases, delay, interval)))
        };

        Self {
            state,
            cancel,
            task,
            surface,
            typing,
        }
    }

    pub fn phase(&self) -> LoadingPhase {
        self.state.lock().phase
    }

    /// If a phrase is up, wait until it has been visible for
    /// [`MINIMUM_DISPLAY`]. Stops the rotation either way.
    pub async fn wait_for_minimum_display(&self) {
        let shown_at = {
            let mut state = self.state.lock();
            if state.phase == LoadingPhase::Active {
                state.phase = LoadingPhase::TearingDown;
            }
            state.shown_at
        };

        let Some(shown_at) = shown_at else {
            return;
        };
        let remaining = MINIMUM_DISPLAY.saturating_sub(shown_at.elapsed());
        if !remaining.is_zero() {
            tracing::debug!(?remaining, "holding loading message for minimum display time");
            sleep(remaining).await;
        }
    }

    /// Cancel the timers and remove the phrase. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        {
            let mut state = self.state.lock();
            if self.cancel.is_cancelled() {
                return;
            }
            self.cancel.cancel();
            state.phase = LoadingPhase::Inactive;
            state.shown_at = None;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.surface.lock().update(self.typing, |entry| entry.phrase = None);
    }
}

impl Drop for LoadingScheduler {
    fn drop(&mut self) {
        self.cleanup();
    }
}

struct Runner {
    state: Arc<Mutex<State>>,
    cancel: CancellationToken,
    surface: SharedSurface,
    typing: EntryId,
}

impl Runner {
    async fn run(self, phrases: Vec<LoadingMessage>, delay: Duration, interval: Duration) {
        if !self.pause(delay).await {
            return;
        }

        let typing = self.typing;
        let activated = self.locked(|state, surface| {
            let present = surface.update(typing, |entry| entry.phrase = Some(PhraseView::default()));
            if present {
                state.phase = LoadingPhase::Active;
            }
            present
        });
        if activated != Some(true) {
            tracing::debug!("typing indicator gone before loading messages started");
            return;
        }
        tracing::debug!("loading messages active");

        if !self.pause(SETTLE_DELAY).await {
            return;
        }

        loop {
            let phrase = pick(&phrases).to_string();
            let cycle_start = Instant::now();

            let faded = self.locked(|state, surface| {
                state.phase == LoadingPhase::Active
                    && surface.update(typing, |entry| set_visible(entry, false))
            });
            if faded != Some(true) || !self.pause(FADE_OUT).await {
                return;
            }

            // teardown during the fade keeps the outgoing phrase
            let swapped = self.locked(|state, surface| {
                if state.phase != LoadingPhase::Active {
                    surface.update(typing, |entry| {
                        if entry.phrase.as_ref().is_some_and(|p| !p.text.is_empty()) {
                            set_visible(entry, true);
                        }
                    });
                    return false;
                }
                surface.update(typing, |entry| {
                    entry.phrase = Some(PhraseView {
                        text: phrase,
                        visible: false,
                    })
                })
            });
            if swapped != Some(true) || !self.pause(FADE_IN).await {
                return;
            }

            let shown = self.locked(|state, surface| {
                if state.phase != LoadingPhase::Active {
                    return false;
                }
                let present = surface.update(typing, |entry| set_visible(entry, true));
                if present {
                    state.shown_at = Some(Instant::now());
                    surface.scroll_to_bottom(ScrollOrigin::Programmatic);
                }
                present
            });
            if shown != Some(true) {
                return;
            }

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return,
                _ = sleep_until(cycle_start + interval) => {}
            }
        }
    }

    /// Sleep unless cancelled first
    async fn pause(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            _ = sleep(duration) => true,
        }
    }

    /// Run a mutation under the state lock, unless cleanup already ran
    fn locked<R>(&self, f: impl FnOnce(&mut State, &mut Surface) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if self.cancel.is_cancelled() {
            return None;
        }
        let mut surface = self.surface.lock();
        Some(f(&mut state, &mut surface))
    }
}

fn set_visible(entry: &mut Entry, visible: bool) {
    if let Some(phrase) = entry.phrase.as_mut() {
        phrase.visible = visible;
    }
}

fn pick(phrases: &[LoadingMessage]) -> &LoadingMessage {
    let roll = getrandom::u32().unwrap_or(0) as usize;
    &phrases[roll % phrases.len()]
}
