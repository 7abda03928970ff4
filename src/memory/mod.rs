//! Conversation memory: tier selection, summarization, enhancement and
//! window compaction.

mod compact;
mod enhancer;
mod parser;
mod summarizer;
mod tier;
mod types;

pub use compact::{compact_window, window_size, MIN_WINDOW_SIZE};
pub use enhancer::{apply_recency, render_brief, render_prompt_block, DEFAULT_BRIEF_ITEMS};
pub use parser::{
    extract_pattern_facts, merge_facts, parse_structured_output, placeholder_summary,
    CONFIDENCE_SUMMARY_ONLY, CONFIDENCE_WITH_ITEMS, MIN_BULLET_CHARS,
};
pub use summarizer::{
    placeholder_plain_summary, Summarizer, DEGRADED_CONFIDENCE, MAX_TRANSCRIPT_CHARS,
};
pub use tier::{pick_tier, SummaryTier};
pub use types::{Clock, MemoryMetadata, StructuredMemory, SystemClock, RECENT_TAG};
