use chrono::{Duration, NaiveTime};

const MINUTES_PER_DAY: i64 = 24 * 60;

/// Tiles `[start, end)` into back-to-back windows of `slot_minutes`.
///
/// A trailing remainder shorter than one window is dropped, and no window
/// wraps past midnight. Non-positive lengths produce nothing.
pub fn slot_windows(start: NaiveTime, end: NaiveTime, slot_minutes: i64) -> Vec<(NaiveTime, NaiveTime)> {
    let mut windows = Vec::new();
    if slot_minutes <= 0 || slot_minutes > MINUTES_PER_DAY {
        return windows;
    }

    let step = Duration::minutes(slot_minutes);
    let mut cursor = start;

    loop {
        let (next, wrapped_secs) = cursor.overflowing_add_signed(step);
        if wrapped_secs != 0 || next > end {
            break;
        }
        windows.push((cursor, next));
        cursor = next;
    }

    windows
}
