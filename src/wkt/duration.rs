use prost_reflect::{DynamicMessage, Value};

use super::{DURATION, get_i32, get_i64, set, timestamp::format_nanos};
use crate::{Error, Iter, ProtoOptions, Result, Stream, iter::ValueType};

/// About 10,000 years.
const MAX_SECONDS: i64 = 315_576_000_000;
const MAX_NANOS: i32 = 999_999_999;

/// Seconds with 0, 3, 6 or 9 fractional digits and an `s` suffix.
pub fn format_duration(seconds: i64, nanos: i32) -> Result<String> {
    if !(-MAX_SECONDS..=MAX_SECONDS).contains(&seconds) {
        return Err(Error::range(
            DURATION,
            format!("seconds out of range {seconds}"),
        ));
    }
    if !(-MAX_NANOS..=MAX_NANOS).contains(&nanos) {
        return Err(Error::range(DURATION, format!("nanos out of range {nanos}")));
    }
    if (seconds > 0 && nanos < 0) || (seconds < 0 && nanos > 0) {
        return Err(Error::consistency(
            DURATION,
            format!("signs of seconds ({seconds}) and nanos ({nanos}) do not match"),
        ));
    }
    let sign = if seconds < 0 || nanos < 0 { "-" } else { "" };
    Ok(format!(
        "{sign}{}{}s",
        seconds.unsigned_abs(),
        format_nanos(nanos.unsigned_abs())
    ))
}

/// Parse `[+-]seconds[.fraction]s` with at most nine fractional digits.
pub fn parse_duration(input: &str) -> Result<(i64, i32)> {
    let invalid = || Error::format(DURATION, format!("invalid value {input:?}"));
    let body = input.strip_suffix('s').ok_or_else(invalid)?;
    let (negative, body) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body.strip_prefix('+').unwrap_or(body)),
    };
    let (int_part, frac_part) = match body.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (body, None),
    };
    let is_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_none())
        || !is_digits(int_part)
        || (int_part.len() > 1 && int_part.starts_with('0'))
    {
        return Err(invalid());
    }
    let seconds: i64 = match int_part {
        "" => 0,
        digits => digits
            .parse()
            .map_err(|_| Error::range(DURATION, format!("{input:?} out of range")))?,
    };
    let nanos: i32 = match frac_part {
        None => 0,
        Some(frac) if frac.len() <= 9 && is_digits(frac) => {
            format!("{frac:0<9}").parse().map_err(|_| invalid())?
        }
        Some(_) => return Err(invalid()),
    };
    if seconds > MAX_SECONDS {
        return Err(Error::range(DURATION, format!("{input:?} out of range")));
    }
    Ok(if negative {
        (-seconds, -nanos)
    } else {
        (seconds, nanos)
    })
}

pub(super) fn encode(_: &ProtoOptions, msg: &DynamicMessage, stream: &mut Stream<'_>) -> Result<()> {
    let s = format_duration(get_i64(msg, 1)?, get_i32(msg, 2)?)?;
    stream.write_string(&s);
    Ok(())
}

pub(super) fn decode(_: &ProtoOptions, msg: &mut DynamicMessage, iter: &mut Iter<'_>) -> Result<()> {
    if iter.what_is_next() != ValueType::String {
        return Err(Error::format(DURATION, "expect string"));
    }
    let (seconds, nanos) = parse_duration(&iter.read_string()?)?;
    set(msg, 1, Value::I64(seconds))?;
    set(msg, 2, Value::I32(nanos))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(36, 0).unwrap(), "36s");
        assert_eq!(format_duration(1, 500_000_000).unwrap(), "1.500s");
        assert_eq!(format_duration(-1, -1_000).unwrap(), "-1.000001s");
        assert_eq!(format_duration(0, -1).unwrap(), "-0.000000001s");
        assert!(matches!(
            format_duration(1, -1),
            Err(Error::Consistency { .. })
        ));
        assert!(matches!(
            format_duration(MAX_SECONDS + 1, 0),
            Err(Error::Range { .. })
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1.500s").unwrap(), (1, 500_000_000));
        assert_eq!(parse_duration("-0.5s").unwrap(), (0, -500_000_000));
        assert_eq!(parse_duration("36s").unwrap(), (36, 0));
        assert_eq!(parse_duration(".5s").unwrap(), (0, 500_000_000));
        assert_eq!(
            parse_duration("315576000000.999999999s").unwrap(),
            (MAX_SECONDS, MAX_NANOS)
        );
        assert!(parse_duration("1").is_err());
        assert!(parse_duration("01s").is_err());
        assert_eq!(parse_duration("+1.5s").unwrap(), (1, 500_000_000));
        assert!(parse_duration("+s").is_err());
        assert!(parse_duration("+-1s").is_err());
        assert!(parse_duration("1.0000000001s").is_err());
        assert!(parse_duration("s").is_err());
        assert!(matches!(
            parse_duration("315576000001s"),
            Err(Error::Range { .. })
        ));
    }
}
