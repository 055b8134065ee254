//! Millisecond timestamp codec for human-editable offset fields
//!
//! Converts between integer milliseconds and `HH:MM:SS[.mmm]` strings.
//! Parsing never fails: input that does not match the format resolves to
//! zero so that half-typed UI fields stay usable.

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;

/// Format milliseconds as `HH:MM:SS`, appending `.mmm` only when the
/// millisecond part is non-zero.
///
/// Negative values are formatted by magnitude with the sign re-applied.
/// Hours are not wrapped at 24.
///
/// # Examples
///
/// ```
/// use tapevault_common::timestamp::ms_to_timestamp;
///
/// assert_eq!(ms_to_timestamp(90_000), "00:01:30");
/// assert_eq!(ms_to_timestamp(-1_500), "-00:00:01.500");
/// ```
pub fn ms_to_timestamp(ms: i64) -> String {
    let is_negative = ms < 0;
    let abs_ms = ms.unsigned_abs();

    let hours = abs_ms / MS_PER_HOUR;
    let minutes = (abs_ms % MS_PER_HOUR) / MS_PER_MINUTE;
    let seconds = (abs_ms % MS_PER_MINUTE) / MS_PER_SECOND;
    let millis = abs_ms % MS_PER_SECOND;

    let mut formatted = format!("{:02}:{:02}:{:02}", hours, minutes, seconds);
    if millis != 0 {
        formatted.push_str(&format!(".{:03}", millis));
    }

    if is_negative {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Parse `[-]H[H]:M[M]:S[S][.mmm]` into milliseconds.
///
/// Returns 0 for anything that does not match.
///
/// # Examples
///
/// ```
/// use tapevault_common::timestamp::timestamp_to_ms;
///
/// assert_eq!(timestamp_to_ms("00:01:30"), 90_000);
/// assert_eq!(timestamp_to_ms("1:2:3.045"), 3_723_045);
/// assert_eq!(timestamp_to_ms("not-a-time"), 0);
/// ```
pub fn timestamp_to_ms(input: &str) -> i64 {
    parse_timestamp(input).unwrap_or(0)
}

/// Strict counterpart of [`timestamp_to_ms`]: `None` unless the whole
/// (trimmed) input matches the format. For committed values, where a typo
/// must not turn into zero.
///
/// # Examples
///
/// ```
/// use tapevault_common::timestamp::parse_timestamp;
///
/// assert_eq!(parse_timestamp("00:03:00"), Some(180_000));
/// assert_eq!(parse_timestamp("3:00"), None);
/// ```
pub fn parse_timestamp(input: &str) -> Option<i64> {
    let input = input.trim();
    let (is_negative, body) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };

    let mut fields = body.split(':');
    let hours = parse_field(fields.next()?)?;
    let minutes = parse_field(fields.next()?)?;
    let last = fields.next()?;
    if fields.next().is_some() {
        return None;
    }

    let (seconds, millis) = match last.split_once('.') {
        Some((seconds, millis)) => {
            if millis.len() != 3 || !millis.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            (parse_field(seconds)?, millis.parse::<u64>().ok()?)
        }
        None => (parse_field(last)?, 0),
    };

    let total = hours * MS_PER_HOUR + minutes * MS_PER_MINUTE + seconds * MS_PER_SECOND + millis;
    let total = total as i64;

    Some(if is_negative { -total } else { total })
}

/// One or two ASCII digits
fn parse_field(field: &str) -> Option<u64> {
    if field.is_empty() || field.len() > 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}
