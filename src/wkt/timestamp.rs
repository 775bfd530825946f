use prost_reflect::{DynamicMessage, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use super::{TIMESTAMP, get_i32, get_i64, set};
use crate::{Error, Iter, ProtoOptions, Result, Stream, iter::ValueType};

const MIN_SECONDS: i64 = -62_135_596_800; // 0001-01-01T00:00:00Z
const MAX_SECONDS: i64 = 253_402_300_799; // 9999-12-31T23:59:59Z

/// Fractional seconds with 0, 3, 6 or 9 digits.
pub(super) fn format_nanos(nanos: u32) -> String {
    if nanos == 0 {
        String::new()
    } else if nanos % 1_000_000 == 0 {
        format!(".{:03}", nanos / 1_000_000)
    } else if nanos % 1_000 == 0 {
        format!(".{:06}", nanos / 1_000)
    } else {
        format!(".{nanos:09}")
    }
}

/// RFC 3339 in UTC with a `Z` suffix.
pub fn format_timestamp(seconds: i64, nanos: i32) -> Result<String> {
    if !(MIN_SECONDS..=MAX_SECONDS).contains(&seconds) {
        return Err(Error::range(
            TIMESTAMP,
            format!("seconds out of range {seconds}"),
        ));
    }
    let nanos = u32::try_from(nanos)
        .ok()
        .filter(|n| *n < 1_000_000_000)
        .ok_or_else(|| Error::range(TIMESTAMP, format!("nanos out of range {nanos}")))?;
    let t = OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|e| Error::range(TIMESTAMP, e))?;
    Ok(format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}Z",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        format_nanos(nanos),
    ))
}

/// Parse an RFC 3339 timestamp with any offset into seconds and nanos.
pub fn parse_timestamp(s: &str) -> Result<(i64, i32)> {
    let invalid = || Error::format(TIMESTAMP, format!("invalid value {s:?}"));
    if let (Some(dot), Some(end)) = (s.rfind('.'), s.rfind(['Z', 'z', '+', '-'])) {
        if end > dot && end - dot > ".999999999".len() {
            return Err(invalid());
        }
    }
    let t = OffsetDateTime::parse(s, &Rfc3339).map_err(|_| invalid())?;
    let seconds = t.unix_timestamp();
    if !(MIN_SECONDS..=MAX_SECONDS).contains(&seconds) {
        return Err(Error::range(TIMESTAMP, format!("{s:?} out of range")));
    }
    Ok((seconds, t.nanosecond() as i32))
}

pub(super) fn encode(_: &ProtoOptions, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
    let s = format_timestamp(get_i64(msg, 1)?, get_i32(msg, 2)?)?;
    stream.write_string(&s);
    Ok(())
}

pub(super) fn decode(_: &ProtoOptions, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
    if iter.what_is_next() != ValueType::String {
        return Err(Error::format(TIMESTAMP, "expect string"));
    }
    let (seconds, nanos) = parse_timestamp(&iter.read_string()?)?;
    set(msg, 1, Value::I64(seconds))?;
    set(msg, 2, Value::I32(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(
            format_timestamp(1654808629, 560_000_000).unwrap(),
            "2022-06-09T21:03:49.560Z"
        );
        assert_eq!(format_timestamp(0, 0).unwrap(), "1970-01-01T00:00:00Z");
        assert_eq!(
            format_timestamp(0, 1_000).unwrap(),
            "1970-01-01T00:00:00.000001Z"
        );
        assert_eq!(
            format_timestamp(0, 1).unwrap(),
            "1970-01-01T00:00:00.000000001Z"
        );
        assert_eq!(
            format_timestamp(MIN_SECONDS, 0).unwrap(),
            "0001-01-01T00:00:00Z"
        );
        assert!(format_timestamp(MAX_SECONDS + 1, 0).is_err());
        assert!(format_timestamp(0, -1).is_err());
        assert!(format_timestamp(0, 1_000_000_000).is_err());
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(
            parse_timestamp("2022-06-09T21:03:49.560Z").unwrap(),
            (1654808629, 560_000_000)
        );
        assert_eq!(
            parse_timestamp("1970-01-01T01:00:00+01:00").unwrap(),
            (0, 0)
        );
        assert_eq!(
            parse_timestamp("9999-12-31T23:59:59.999999999Z").unwrap(),
            (MAX_SECONDS, 999_999_999)
        );
        assert!(parse_timestamp("1970-01-01T00:00:00.0000000001Z").is_err());
        assert!(parse_timestamp("1970-01-01T00:00:00").is_err());
        assert!(parse_timestamp("0000-12-31T23:59:59Z").is_err());
    }
}
