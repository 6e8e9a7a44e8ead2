//! Block type implementations

mod answer;
mod checklist;
mod clue;
mod display;
mod quiz;
mod sorting;

pub use answer::{AnswerBlock, PincodeBlock};
pub use checklist::{ChecklistBlock, ChecklistItem};
pub use clue::{ClueBlock, RandomClueBlock};
pub use display::{AlertBlock, ButtonBlock, DividerBlock, HeaderBlock, ImageBlock, MarkdownBlock};
pub use quiz::{QuizBlock, QuizOption};
pub use sorting::{ScoringScheme, SortingBlock, SortingItem};
