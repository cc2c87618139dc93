//! Generation statistics for vllm-chat
//!
//! Per-response numbers come from a `Completion`; the session keeps running
//! totals. Rates are client-side estimates from delta arrival timing.

use crate::streaming::Completion;
use std::time::Duration;

/// Rate at which the speed bar reads 100%
pub const FULL_SCALE_TOKENS_PER_SECOND: u64 = 100;

/// Coarse speed classification for display
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpeedTier {
    Slow,
    Moderate,
    Fast,
    Blazing,
}

impl SpeedTier {
    pub fn from_rate(tokens_per_second: u64) -> Self {
        match tokens_per_second {
            70.. => SpeedTier::Blazing,
            40..=69 => SpeedTier::Fast,
            20..=39 => SpeedTier::Moderate,
            _ => SpeedTier::Slow,
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            SpeedTier::Blazing => "🚀",
            SpeedTier::Fast => "⚡",
            SpeedTier::Moderate => "🔆",
            SpeedTier::Slow => "🔸",
        }
    }
}

/// Share of full scale, capped at 100
pub fn speed_percentage(tokens_per_second: u64) -> u64 {
    (tokens_per_second * 100 / FULL_SCALE_TOKENS_PER_SECOND).min(100)
}

/// Text bar of `width` cells filled in proportion to the rate
pub fn speed_bar(tokens_per_second: u64, width: usize) -> String {
    let filled = (speed_percentage(tokens_per_second) as usize * width) / 100;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// Numbers for one finished response
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationStats {
    pub token_count: u64,
    pub tokens_per_second: u64,
    pub elapsed: Duration,
    pub truncated: bool,
}

impl GenerationStats {
    pub fn from_completion(completion: &Completion) -> Self {
        Self {
            token_count: completion.token_count,
            tokens_per_second: completion.tokens_per_second,
            elapsed: completion.elapsed,
            truncated: completion.is_truncated(),
        }
    }

    pub fn tier(&self) -> SpeedTier {
        SpeedTier::from_rate(self.tokens_per_second)
    }

    /// One-line summary shown after a response
    pub fn summary(&self) -> String {
        format!(
            "Generated {} tokens in {:.1}s ({} tokens/s)",
            self.token_count,
            self.elapsed.as_secs_f64(),
            self.tokens_per_second
        )
    }
}

/// Running totals across a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStats {
    pub responses: usize,
    pub failures: usize,
    pub truncated: usize,
    pub total_tokens: u64,
    pub total_time: Duration,
    pub last: Option<GenerationStats>,
}

impl SessionStats {
    pub fn record(&mut self, completion: &Completion) {
        let stats = GenerationStats::from_completion(completion);
        self.responses += 1;
        if stats.truncated {
            self.truncated += 1;
        }
        self.total_tokens += stats.token_count;
        self.total_time += stats.elapsed;
        self.last = Some(stats);
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
    }

    /// Tokens over total streaming time, across all responses
    pub fn average_tokens_per_second(&self) -> u64 {
        crate::streaming::tokens_per_second(self.total_tokens, self.total_time)
    }
}
