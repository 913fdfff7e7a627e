//! Incremental rendering of the bot message

use std::sync::Arc;

use crate::{
    format::{Formatter, render_with},
    surface::{EntryId, EntryKind, ScrollOrigin, SharedSurface, Surface},
};

/// Autoscroll decision for one streaming session.
///
/// Follows the end of the transcript until a user scroll leaves the bottom
/// region; after that it stays off for the rest of the session.
#[derive(Debug)]
pub struct ScrollFollow {
    following: bool,
}

impl ScrollFollow {
    /// Start following; earlier user scrolls are forgotten
    pub fn start(surface: &mut Surface) -> Self {
        surface.reset_user_scroll();
        Self { following: true }
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// Called after every render
    pub fn after_render(&mut self, surface: &mut Surface) {
        if self.following && surface.user_left_bottom() {
            tracing::debug!("user scrolled away from the bottom, autoscroll off");
            self.following = false;
        }
        if self.following {
            surface.scroll_to_bottom(ScrollOrigin::Programmatic);
        }
    }
}

/// Owns the in-progress bot message of one session
pub struct StreamingRenderer {
    surface: SharedSurface,
    formatter: Arc<dyn Formatter>,
    accumulated: String,
    fragments: usize,
    typing: Option<EntryId>,
    bot: Option<EntryId>,
    follow: ScrollFollow,
}

impl StreamingRenderer {
    pub fn new(surface: SharedSurface, formatter: Arc<dyn Formatter>) -> Self {
        let follow = ScrollFollow::start(&mut surface.lock());
        Self {
            surface,
            formatter,
            accumulated: String::new(),
            fragments: 0,
            typing: None,
            bot: None,
            follow,
        }
    }

    /// Append the typing indicator and bring it into view
    pub fn show_typing(&mut self) -> EntryId {
        let mut surface = self.surface.lock();
        let id = surface.push(EntryKind::Typing, "", "");
        surface.scroll_to_bottom(ScrollOrigin::Programmatic);
        self.typing = Some(id);
        id
    }

    /// Typing indicator, while it is still shown
    pub fn typing_entry(&self) -> Option<EntryId> {
        self.typing
    }

    pub fn bot_entry(&self) -> Option<EntryId> {
        self.bot
    }

    /// Text received so far
    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Number of fragments applied in this session
    pub fn fragments_applied(&self) -> usize {
        self.fragments
    }

    pub fn is_following(&self) -> bool {
        self.follow.is_following()
    }

    /// Add one fragment and re-render the whole message
    pub fn apply_fragment(&mut self, fragment: &str) {
        self.accumulated.push_str(fragment);
        self.fragments += 1;

        let markup = render_with(self.formatter.as_ref(), &self.accumulated);
        let text = self.accumulated.clone();

        let mut surface = self.surface.lock();
        let bot = match self.bot {
            Some(id) if surface.contains(id) => id,
            _ => {
                if let Some(typing) = self.typing.take() {
                    surface.remove(typing);
                }
                let id = surface.push(EntryKind::Bot, "", "");
                self.bot = Some(id);
                id
            }
        };
        surface.update(bot, |entry| {
            entry.text = text;
            entry.markup = markup;
            entry.streaming = true;
            entry.cursor = true;
        });
        self.follow.after_render(&mut surface);
    }

    /// Show a complete, non-streamed answer as one finished message
    pub fn render_complete(&mut self, text: &str) {
        self.accumulated = text.to_string();
        let markup = render_with(self.formatter.as_ref(), text);

        let mut surface = self.surface.lock();
        if let Some(typing) = self.typing.take() {
            surface.remove(typing);
        }
        let id = surface.push(EntryKind::Bot, text, markup);
        self.bot = Some(id);
        surface.scroll_to_bottom(ScrollOrigin::Programmatic);
    }

    /// End the stream: drop the cursor and streaming state, keep the text
    pub fn finish(&mut self) -> String {
        let mut surface = self.surface.lock();
        if let Some(typing) = self.typing.take() {
            surface.remove(typing);
        }
        if let Some(bot) = self.bot {
            surface.update(bot, |entry| {
                entry.streaming = false;
                entry.cursor = false;
            });
        }
        self.accumulated.clone()
    }

    /// Replace whatever was shown with an error
    pub fn fail(&mut self, label: &str) {
        let markup = format!("<em>{}</em>", label);
        let mut surface = self.surface.lock();
        if let Some(typing) = self.typing.take() {
            surface.remove(typing);
        }
        let replaced = self.bot.is_some_and(|bot| {
            surface.update(bot, |entry| {
                entry.kind = EntryKind::Error;
                entry.text = label.to_string();
                entry.markup = markup.clone();
                entry.streaming = false;
                entry.cursor = false;
            })
        });
        if !replaced {
            self.bot = Some(surface.push(EntryKind::Error, label, markup));
        }
        surface.scroll_to_bottom(ScrollOrigin::Programmatic);
    }
}
