//! Custom widgets for the chat TUI

pub mod input_box;
pub mod markdown;
pub mod spinner;
pub mod transcript;

pub use input_box::InputBox;
pub use spinner::Spinner;
pub use transcript::Transcript;
