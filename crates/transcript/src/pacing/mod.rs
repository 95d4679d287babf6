//! Typewriter pacing: decouples network arrival rate from visual reveal rate.
//!
//! Incoming chunks are absorbed into a backlog and drained a slice at a time
//! by a timer-driven tick. Two dials control pacing, both step functions of
//! the backlog size: the slice taken per tick and the delay until the next
//! tick. A small backlog reveals at a slow, readable speed; a growing one
//! shifts into catch-up pacing so the reveal never falls unboundedly behind;
//! once the producer signals end-of-stream the remainder is flushed with an
//! accelerating burst.

mod buffer;
mod channels;

pub use buffer::{PacingBuffer, TickHook};
pub use channels::ChannelPacer;

use std::time::Duration;
use unicode_segmentation::UnicodeSegmentation;

/// Backlog size (in graphemes) above which pacing shifts from the normal
/// band into catch-up; three times this value marks the emergency band.
const CATCHUP_THRESHOLD: usize = 160;

const NORMAL_DELAY_MAX_MS: f64 = 80.0;
const NORMAL_DELAY_MIN_MS: f64 = 30.0;
const CATCHUP_DELAY_MIN_MS: f64 = 12.0;
const EMERGENCY_DELAY_MS: f64 = 8.0;
/// Fastest band: end-of-stream flush with a large backlog.
const FLUSH_DELAY_MS: f64 = 4.0;

/// Slice size for one tick, as a step function of backlog size.
///
/// CJK text carries more visual weight per character than Latin text, so the
/// thresholds and slices are lowered when the front of the backlog is CJK to
/// keep the perceived reveal speed comparable across scripts.
pub(crate) fn chars_to_take(backlog: usize, cjk: bool, finished: bool) -> usize {
    let (t1, t2, t3) = if cjk { (24, 96, 320) } else { (48, 192, 640) };
    let base = if backlog <= t1 {
        if cjk {
            1
        } else {
            2
        }
    } else if backlog <= t2 {
        if cjk {
            3
        } else {
            6
        }
    } else if backlog <= t3 {
        if cjk {
            8
        } else {
            16
        }
    } else if cjk {
        24
    } else {
        48
    };
    if finished {
        base * 4
    } else {
        base
    }
}

/// Delay until the next tick, inversely related to backlog size.
///
/// Three bands (≤T, (T,3T], >3T) map to the normal, catch-up and emergency
/// ranges; within a band the delay interpolates linearly with how far into
/// the band the backlog sits.
pub(crate) fn tick_delay(backlog: usize, finished: bool) -> Duration {
    let t = CATCHUP_THRESHOLD;
    if finished && backlog > t {
        return Duration::from_micros((FLUSH_DELAY_MS * 1000.0) as u64);
    }
    let ms = if backlog <= t {
        lerp(
            NORMAL_DELAY_MAX_MS,
            NORMAL_DELAY_MIN_MS,
            backlog as f64 / t as f64,
        )
    } else if backlog <= 3 * t {
        lerp(
            NORMAL_DELAY_MIN_MS,
            CATCHUP_DELAY_MIN_MS,
            (backlog - t) as f64 / (2 * t) as f64,
        )
    } else {
        EMERGENCY_DELAY_MS
    };
    Duration::from_micros((ms * 1000.0) as u64)
}

fn lerp(from: f64, to: f64, frac: f64) -> f64 {
    from + (to - from) * frac.clamp(0.0, 1.0)
}

/// CJK detection for the character at the front of the backlog.
pub(crate) fn is_cjk_char(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF          // Hiragana, Katakana
        | 0x3400..=0x4DBF        // CJK Extension A
        | 0x4E00..=0x9FFF        // CJK Unified Ideographs
        | 0xAC00..=0xD7AF        // Hangul Syllables
        | 0xF900..=0xFAFF        // CJK Compatibility Ideographs
        | 0xFF00..=0xFFEF        // Fullwidth forms
    )
}

pub(crate) fn grapheme_len(s: &str) -> usize {
    s.graphemes(true).count()
}

/// Byte offset just past the first `n` graphemes of `s`.
pub(crate) fn byte_offset_after(s: &str, n: usize) -> usize {
    s.grapheme_indices(true)
        .nth(n)
        .map(|(offset, _)| offset)
        .unwrap_or(s.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slice_size_grows_with_backlog() {
        assert!(chars_to_take(10, false, false) < chars_to_take(100, false, false));
        assert!(chars_to_take(100, false, false) < chars_to_take(400, false, false));
        assert!(chars_to_take(400, false, false) < chars_to_take(2000, false, false));
    }

    #[test]
    fn slice_size_escalates_earlier_for_cjk() {
        // The same backlog sits in a higher band when the text is CJK.
        assert_eq!(chars_to_take(100, false, false), 6);
        assert_eq!(chars_to_take(100, true, false), 8);
    }

    #[test]
    fn finished_multiplies_slice_size() {
        assert_eq!(
            chars_to_take(100, false, true),
            chars_to_take(100, false, false) * 4
        );
    }

    #[test]
    fn delay_is_inverse_to_backlog() {
        let low = tick_delay(10, false);
        let mid = tick_delay(CATCHUP_THRESHOLD * 2, false);
        let high = tick_delay(CATCHUP_THRESHOLD * 4, false);
        assert!(low > mid);
        assert!(mid > high);
        assert_eq!(high, Duration::from_micros(8_000));
    }

    #[test]
    fn delay_interpolates_within_the_normal_band() {
        let at_zero = tick_delay(0, false);
        let halfway = tick_delay(CATCHUP_THRESHOLD / 2, false);
        let at_threshold = tick_delay(CATCHUP_THRESHOLD, false);
        assert_eq!(at_zero, Duration::from_micros(80_000));
        assert_eq!(at_threshold, Duration::from_micros(30_000));
        assert!(halfway < at_zero && halfway > at_threshold);
    }

    #[test]
    fn finished_with_large_backlog_uses_fastest_band() {
        assert_eq!(
            tick_delay(CATCHUP_THRESHOLD * 2, true),
            Duration::from_micros(4_000)
        );
        // Small remaining backlog keeps readable pacing even when finished.
        assert!(tick_delay(10, true) > Duration::from_micros(30_000));
    }

    #[test]
    fn grapheme_slicing_never_splits_clusters() {
        let s = "a\u{1F469}\u{200D}\u{1F4BB}b"; // woman-technologist ZWJ cluster
        assert_eq!(grapheme_len(s), 3);
        let offset = byte_offset_after(s, 2);
        assert_eq!(&s[..1], "a");
        assert_eq!(&s[offset..], "b");
    }
}
