//! Byte progress to displayed percentage.

/// Percentage shown for `sent` of `total` bytes, keeping `reserve` points for finalize.
///
/// Never exceeds `100 - reserve`, so the bar only reaches 100 once the server
/// has acknowledged the upload.
pub fn displayed_percent(sent: u64, total: u64, reserve: u8) -> u8 {
    let ceiling = 100u8.saturating_sub(reserve.min(100));
    if total == 0 {
        return ceiling;
    }
    let sent = sent.min(total) as u128;
    ((sent * ceiling as u128) / total as u128) as u8
}
