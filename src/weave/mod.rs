//! 选择与改写
//!
//! - `selection` - 候选打分、选择策略、间距约束
//! - `rewrite` - 内联标记与偏移换算

pub mod rewrite;
pub mod selection;

pub use rewrite::{render_marker, ForeignWord, ReplacementOutput, ReplacementStats, Replacer};
pub use selection::{Candidate, SelectionConfig, SelectionStrategy};
