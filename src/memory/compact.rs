//! Window compaction: how many recent raw turns travel alongside the
//! injected memory block.
//!
//! The window grows with the estimated token volume of the conversation:
//!   k = clamp(round(tokens / 500) + 3, MIN_WINDOW_SIZE, max_k)
//! and the last `k` turns are kept.

use crate::transcript::Turn;
use tracing::debug;

/// Approximate tokens that earn one extra retained turn
const TOKENS_PER_EXTRA_TURN: f64 = 500.0;

/// Turns always kept on top of the volume-based share
const BASE_WINDOW_TURNS: usize = 3;

/// Smallest window ever produced (when the transcript is long enough)
pub const MIN_WINDOW_SIZE: usize = 4;

/// Window size for a given token estimate, before limiting to transcript
/// length. A `max_k` below [`MIN_WINDOW_SIZE`] is raised to it.
pub fn window_size(approx_token_count: f64, max_k: usize) -> usize {
    let extra = (approx_token_count.max(0.0) / TOKENS_PER_EXTRA_TURN).round() as usize;
    let max_k = max_k.max(MIN_WINDOW_SIZE);
    extra.saturating_add(BASE_WINDOW_TURNS).clamp(MIN_WINDOW_SIZE, max_k)
}

/// The trailing slice of `turns` to keep next to the memory block
pub fn compact_window(turns: &[Turn], approx_token_count: f64, max_k: usize) -> &[Turn] {
    let k = window_size(approx_token_count, max_k);
    let start = turns.len().saturating_sub(k);

    debug!(
        "Window compaction: ~{:.0} tokens -> keeping last {} of {} turns",
        approx_token_count,
        turns.len() - start,
        turns.len()
    );

    &turns[start..]
}
