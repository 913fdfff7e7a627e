//! Headless chat surface
//!
//! The surface is what a browser widget would keep in its DOM: the list of
//! transcript entries, the scroll position of the message pane and the state
//! of the input controls. The runtime mutates it; views render it and report
//! user scrolls and layout metrics back.

use parking_lot::Mutex;
use std::sync::Arc;

/// A surface shared between the runtime and its views
pub type SharedSurface = Arc<Mutex<Surface>>;

/// Rows from the end of the transcript that still count as "at the bottom"
pub const AT_BOTTOM_THRESHOLD: usize = 2;

/// Stable identifier of a transcript entry
pub type EntryId = u64;

/// What a transcript entry shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    User,
    Bot,
    /// Typing indicator, optionally carrying a loading phrase
    Typing,
    Error,
}

/// Loading phrase attached to a typing indicator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhraseView {
    pub text: String,
    /// False while fading between two phrases
    pub visible: bool,
}

/// One transcript entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub id: EntryId,
    pub kind: EntryKind,
    /// Text as received
    pub text: String,
    /// Formatted markup for `text`
    pub markup: String,
    /// Still receiving fragments
    pub streaming: bool,
    /// Streaming cursor shown after the text
    pub cursor: bool,
    pub phrase: Option<PhraseView>,
}

/// Who moved the scroll position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollOrigin {
    User,
    Programmatic,
}

/// Scroll metrics of the message pane, in rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    /// Rows scrolled past the top
    pub offset: usize,
    /// Total rendered height of the transcript
    pub content_height: usize,
    /// Visible rows
    pub viewport_height: usize,
    /// Follow the end of the transcript on the next layout
    pub pinned: bool,
}

impl ScrollState {
    pub fn max_offset(&self) -> usize {
        self.content_height.saturating_sub(self.viewport_height)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.max_offset().saturating_sub(self.offset) < AT_BOTTOM_THRESHOLD
    }
}

/// Text box and send button state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputControls {
    pub enabled: bool,
    pub placeholder: String,
}

impl Default for InputControls {
    fn default() -> Self {
        Self {
            enabled: true,
            placeholder: String::new(),
        }
    }
}

/// The chat surface
#[derive(Debug, Default)]
pub struct Surface {
    entries: Vec<Entry>,
    next_id: EntryId,
    scroll: ScrollState,
    last_scroll_origin: Option<ScrollOrigin>,
    user_left_bottom: bool,
    input: InputControls,
    mounted: bool,
    revision: u64,
}

impl Surface {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fresh surface behind a shared lock
    pub fn shared() -> SharedSurface {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Bumped on every mutation, so views can skip redundant redraws
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    // ---- entries ----

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: EntryId) -> bool {
        self.entry(id).is_some()
    }

    /// Append an entry and return its id
    pub fn push(&mut self, kind: EntryKind, text: impl Into<String>, markup: impl Into<String>) -> EntryId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            kind,
            text: text.into(),
            markup: markup.into(),
            streaming: false,
            cursor: false,
            phrase: None,
        });
        self.touch();
        id
    }

    /// Mutate an entry in place. Returns false if it no longer exists.
    pub fn update(&mut self, id: EntryId, f: impl FnOnce(&mut Entry)) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) else {
            return false;
        };
        f(entry);
        self.touch();
        true
    }

    pub fn remove(&mut self, id: EntryId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        let removed = self.entries.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.scroll.offset = 0;
        self.scroll.pinned = true;
        self.touch();
    }

    pub fn count(&self, kind: EntryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }

    // ---- scrolling ----

    pub fn scroll(&self) -> ScrollState {
        self.scroll
    }

    pub fn last_scroll_origin(&self) -> Option<ScrollOrigin> {
        self.last_scroll_origin
    }

    pub fn is_at_bottom(&self) -> bool {
        self.scroll.is_at_bottom()
    }

    /// Views report their layout here. A pinned pane snaps to the new end.
    pub fn set_metrics(&mut self, content_height: usize, viewport_height: usize) {
        if self.scroll.content_height == content_height && self.scroll.viewport_height == viewport_height {
            return;
        }
        self.scroll.content_height = content_height;
        self.scroll.viewport_height = viewport_height;
        let max = self.scroll.max_offset();
        if self.scroll.pinned {
            self.scroll.offset = max;
        } else {
            self.scroll.offset = self.scroll.offset.min(max);
        }
        self.touch();
    }

    /// Jump to the end of the transcript and keep following it
    pub fn scroll_to_bottom(&mut self, origin: ScrollOrigin) {
        self.scroll.offset = self.scroll.max_offset();
        self.scroll.pinned = true;
        self.last_scroll_origin = Some(origin);
        self.touch();
    }

    /// Scroll by a number of rows (negative is up)
    pub fn scroll_by(&mut self, delta: isize, origin: ScrollOrigin) {
        let max = self.scroll.max_offset();
        self.scroll.offset = self.scroll.offset.saturating_add_signed(delta).min(max);
        self.scroll.pinned = false;
        self.last_scroll_origin = Some(origin);
        if origin == ScrollOrigin::User && !self.scroll.is_at_bottom() {
            self.user_left_bottom = true;
        }
        self.touch();
    }

    /// Whether a user scroll left the bottom region since the last reset
    pub fn user_left_bottom(&self) -> bool {
        self.user_left_bottom
    }

    /// Forget earlier user scrolls; called when a stream starts
    pub fn reset_user_scroll(&mut self) {
        self.user_left_bottom = false;
    }

    // ---- input controls ----

    pub fn input(&self) -> &InputControls {
        &self.input
    }

    pub fn set_input(&mut self, enabled: bool, placeholder: impl Into<String>) {
        self.input = InputControls {
            enabled,
            placeholder: placeholder.into(),
        };
        self.touch();
    }

    // ---- mounting ----

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub(crate) fn set_mounted(&mut self, mounted: bool) {
        self.mounted = mounted;
    }
}

/// Keeps the input controls disabled until dropped
pub struct InputLease {
    surface: SharedSurface,
    idle_placeholder: String,
}

impl InputLease {
    /// Disable input with the waiting placeholder
    pub fn acquire(surface: &SharedSurface, waiting: &str, idle: &str) -> Self {
        surface.lock().set_input(false, waiting);
        Self {
            surface: Arc::clone(surface),
            idle_placeholder: idle.to_string(),
        }
    }
}

impl Drop for InputLease {
    fn drop(&mut self) {
        self.surface.lock().set_input(true, self.idle_placeholder.as_str());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tall_surface() -> Surface {
        let mut s = Surface::new();
        s.set_metrics(100, 20);
        s.scroll_to_bottom(ScrollOrigin::Programmatic);
        s
    }

    #[test]
    fn test_push_update_remove() {
        let mut s = Surface::new();
        let a = s.push(EntryKind::User, "hi", "hi");
        let b = s.push(EntryKind::Typing, "", "");
        assert_ne!(a, b);
        assert!(s.update(b, |e| e.phrase = Some(PhraseView::default())));
        assert!(s.remove(b));
        assert!(!s.remove(b));
        assert!(!s.update(b, |e| e.cursor = true));
        assert_eq!(s.entries().len(), 1);
        assert_eq!(s.entry(a).map(|e| e.kind), Some(EntryKind::User));
    }

    #[test]
    fn test_ids_are_not_reused_after_clear() {
        let mut s = Surface::new();
        let a = s.push(EntryKind::User, "a", "a");
        s.clear();
        let b = s.push(EntryKind::User, "b", "b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_at_bottom_threshold() {
        let mut s = tall_surface();
        assert_eq!(s.scroll().offset, 80);
        assert!(s.is_at_bottom());
        s.scroll_by(-1, ScrollOrigin::User);
        assert!(s.is_at_bottom());
        s.scroll_by(-1, ScrollOrigin::User);
        assert!(!s.is_at_bottom());
    }

    #[test]
    fn test_user_scroll_away_sets_latch() {
        let mut s = tall_surface();
        s.scroll_by(-10, ScrollOrigin::User);
        assert!(s.user_left_bottom());
        assert_eq!(s.last_scroll_origin(), Some(ScrollOrigin::User));
        s.reset_user_scroll();
        assert!(!s.user_left_bottom());
    }

    #[test]
    fn test_programmatic_scroll_never_sets_latch() {
        let mut s = tall_surface();
        s.scroll_by(-10, ScrollOrigin::Programmatic);
        assert!(!s.user_left_bottom());
    }

    #[test]
    fn test_pinned_follows_new_metrics() {
        let mut s = tall_surface();
        s.set_metrics(130, 20);
        assert_eq!(s.scroll().offset, 110);

        s.scroll_by(-30, ScrollOrigin::User);
        s.set_metrics(150, 20);
        assert_eq!(s.scroll().offset, 80);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut s = tall_surface();
        s.scroll_by(-1000, ScrollOrigin::User);
        assert_eq!(s.scroll().offset, 0);
        s.scroll_by(1000, ScrollOrigin::User);
        assert_eq!(s.scroll().offset, 80);
    }

    #[test]
    fn test_short_transcript_is_always_at_bottom() {
        let mut s = Surface::new();
        s.set_metrics(5, 20);
        s.scroll_by(-3, ScrollOrigin::User);
        assert!(s.is_at_bottom());
        assert!(!s.user_left_bottom());
    }

    #[test]
    fn test_input_lease_restores_on_drop() {
        let surface = Surface::shared();
        {
            let _lease = InputLease::acquire(&surface, "Waiting...", "Type here");
            let input = surface.lock().input().clone();
            assert!(!input.enabled);
            assert_eq!(input.placeholder, "Waiting...");
        }
        let input = surface.lock().input().clone();
        assert!(input.enabled);
        assert_eq!(input.placeholder, "Type here");
    }

    #[test]
    fn test_revision_bumps_on_mutation() {
        let mut s = Surface::new();
        let r0 = s.revision();
        s.push(EntryKind::Bot, "x", "x");
        assert!(s.revision() > r0);
        let r1 = s.revision();
        s.set_metrics(0, 0);
        assert_eq!(s.revision(), r1);
    }
}
