//! TP-VP / TP-SCTS timestamp fields.
//!
//! Two wire forms share one string representation: a relative validity
//! period (`"+<seconds>"`, one quantized octet per 3GPP TS 23.040 clause
//! 9.2.3.12.1) and an absolute service-centre timestamp (7 semi-octet
//! swapped BCD octets, timezone in signed quarter-hours).

use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::common::errors::EncodeErr;

const DAY: u32 = 86_400;

/// Swap a two-digit value into its semi-octet BCD form.
fn swap_bcd(v: u8) -> u8 {
    ((v % 10) << 4) | (v / 10)
}

fn unswap_bcd(b: u8) -> u8 {
    (b & 0x0F) * 10 + (b >> 4)
}

/// Quantize a relative validity period to its single-octet wire value:
/// 5-minute steps up to 12 h, 30-minute steps to 24 h, days to 30 d, weeks
/// beyond (saturating at 255).
fn relative_validity_byte(n: u32) -> u8 {
    let v = if n > 30 * DAY {
        192 + (n + 6 * DAY) / (7 * DAY)
    } else if n > DAY {
        166 + n.div_ceil(DAY)
    } else if n > 43_200 {
        143 + (n - 43_200).div_ceil(1_800)
    } else {
        ((n + 299) / 300).saturating_sub(1)
    };
    v.min(255) as u8
}

fn relative_validity_seconds(v: u8) -> u32 {
    let n = v as u32;
    if n < 144 {
        (n + 1) * 300
    } else if n < 168 {
        43_200 + (n - 143) * 1_800
    } else if n < 197 {
        (n - 166) * DAY
    } else {
        (n - 192) * 7 * DAY
    }
}

/// Digit runs in a timestamp string, each with the character right before it
/// (so the timezone sign survives the split).
fn scan_fields(s: &str) -> Vec<(char, u32)> {
    let mut fields: Vec<(char, u32)> = Vec::new();
    let mut in_run = false;
    let mut prev = ' ';
    for ch in s.chars() {
        if let Some(d) = ch.to_digit(10) {
            if in_run {
                let last = fields.last_mut().unwrap();
                last.1 = last.1.saturating_mul(10).saturating_add(d);
            } else {
                fields.push((prev, d));
                in_run = true;
            }
        } else {
            in_run = false;
            prev = ch;
        }
    }
    fields
}

/// Encode a timestamp string to its wire form.
///
/// Empty input encodes to nothing. `"+<seconds>"` yields the one-octet
/// relative form; `[YY]YY-MM-DD HH:MM:SS[±HH:MM]` yields the 7-octet
/// absolute form.
pub fn encode_timestamp(stamp: &str) -> Result<Vec<u8>, EncodeErr> {
    if stamp.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(rest) = stamp.strip_prefix('+') {
        let n: u32 = rest.trim().parse().map_err(|_| EncodeErr::BadTimestamp {
            reason: "relative validity must be +<seconds>",
        })?;
        return Ok(vec![relative_validity_byte(n)]);
    }

    let fields = scan_fields(stamp);
    if fields.len() < 6 {
        return Err(EncodeErr::BadTimestamp {
            reason: "absolute timestamp needs YY-MM-DD HH:MM:SS",
        });
    }
    let mut out = Vec::with_capacity(7);
    for &(_, v) in fields.iter().take(6) {
        out.push(swap_bcd((v % 100) as u8));
    }
    // timezone: quarter-hours, sign carried in bit 3 of the tens semi-octet
    let negative = fields.get(6).map(|&(sign, _)| sign == '-').unwrap_or(false);
    let tzh = fields.get(6).map(|f| f.1).unwrap_or(0);
    let tzm = fields.get(7).map(|f| f.1).unwrap_or(0);
    let qh = (tzh * 4 + tzm / 15).min(79) as u8;
    let mut tz = ((qh % 10) << 4) | (qh / 10);
    if negative {
        tz |= 0x08;
    }
    out.push(tz);
    Ok(out)
}

/// Decode a wire timestamp. A 1-octet buffer is always the relative form, a
/// 7-octet buffer the absolute form; anything else decodes to the empty
/// (unset) string.
pub fn decode_timestamp(bytes: &[u8]) -> String {
    match bytes.len() {
        1 => format!("+{}", relative_validity_seconds(bytes[0])),
        7 => {
            let f: Vec<u8> = bytes[..6].iter().map(|&b| unswap_bcd(b)).collect();
            let tz = bytes[6];
            let qh = ((tz & 0x07) * 10 + (tz >> 4)) as u32;
            let mut out = format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                2000 + f[0] as u32,
                f[1],
                f[2],
                f[3],
                f[4],
                f[5]
            );
            if qh != 0 {
                out.push(if tz & 0x08 != 0 { '-' } else { '+' });
                out.push_str(&format!("{:02}:{:02}", qh / 4, (qh % 4) * 15));
            }
            out
        }
        _ => String::new(),
    }
}

/// Interpret an absolute timestamp string as calendar time. Relative
/// (`"+N"`) and empty timestamps have no instant to map to.
pub fn timestamp_to_datetime(stamp: &str) -> Option<OffsetDateTime> {
    if stamp.is_empty() || stamp.starts_with('+') {
        return None;
    }
    let fields = scan_fields(stamp);
    if fields.len() < 6 {
        return None;
    }
    let year = if fields[0].1 < 100 {
        2000 + fields[0].1
    } else {
        fields[0].1
    } as i32;
    let date = Date::from_calendar_date(
        year,
        Month::try_from(fields[1].1 as u8).ok()?,
        fields[2].1 as u8,
    )
    .ok()?;
    let tod = Time::from_hms(fields[3].1 as u8, fields[4].1 as u8, fields[5].1 as u8).ok()?;
    let negative = fields.get(6).map(|&(sign, _)| sign == '-').unwrap_or(false);
    let tzh = fields.get(6).map(|f| f.1).unwrap_or(0) as i32;
    let tzm = fields.get(7).map(|f| f.1).unwrap_or(0) as i32;
    let mut secs = tzh * 3600 + tzm * 60;
    if negative {
        secs = -secs;
    }
    let offset = UtcOffset::from_whole_seconds(secs).ok()?;
    Some(PrimitiveDateTime::new(date, tod).assume_offset(offset))
}

/// Render calendar time in the absolute timestamp string form.
pub fn datetime_to_timestamp(dt: OffsetDateTime) -> String {
    let mut out = format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        dt.year(),
        dt.month() as u8,
        dt.day(),
        dt.hour(),
        dt.minute(),
        dt.second()
    );
    let minutes = dt.offset().whole_minutes();
    if minutes != 0 {
        let a = minutes.unsigned_abs();
        out.push(if minutes < 0 { '-' } else { '+' });
        out.push_str(&format!("{:02}:{:02}", a / 60, a % 60));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_validity_boundaries() {
        // 12h exactly is the last 5-minute-step value
        assert_eq!(encode_timestamp("+43200").unwrap(), vec![143]);
        // zero floors at the minimum valid octet
        assert_eq!(encode_timestamp("+0").unwrap(), vec![0]);
        assert_eq!(encode_timestamp("+43201").unwrap(), vec![144]);
        assert_eq!(encode_timestamp("+86400").unwrap(), vec![167]);
        assert_eq!(encode_timestamp("+86401").unwrap(), vec![168]);
        assert_eq!(encode_timestamp("+2592000").unwrap(), vec![196]);
        assert_eq!(encode_timestamp("+2592001").unwrap(), vec![197]);
    }

    #[test]
    fn relative_roundtrip_within_one_step() {
        for n in [0u32, 299, 300, 43_200, 50_000, 86_400, 600_000, 3_000_000] {
            let enc = encode_timestamp(&format!("+{}", n)).unwrap();
            let dec = decode_timestamp(&enc);
            let m: u32 = dec[1..].parse().unwrap();
            let step = match enc[0] {
                0..=143 => 300,
                144..=167 => 1_800,
                168..=196 => DAY,
                _ => 7 * DAY,
            };
            assert!(m >= n && m - n <= step, "n={} decoded to {}", n, m);
        }
    }

    #[test]
    fn absolute_roundtrip() {
        for stamp in [
            "2026-08-06 14:30:00",
            "2026-08-06 14:30:00+02:00",
            "2026-12-31 23:59:59-05:30",
        ] {
            let enc = encode_timestamp(stamp).unwrap();
            assert_eq!(enc.len(), 7);
            assert_eq!(decode_timestamp(&enc), stamp);
        }
    }

    #[test]
    fn two_digit_year_is_accepted() {
        let enc = encode_timestamp("26-08-06 14:30:00").unwrap();
        assert_eq!(decode_timestamp(&enc), "2026-08-06 14:30:00");
    }

    #[test]
    fn empty_and_garbage() {
        assert!(encode_timestamp("").unwrap().is_empty());
        assert_eq!(decode_timestamp(&[]), "");
        assert!(encode_timestamp("soon").is_err());
        assert!(encode_timestamp("+soon").is_err());
    }

    #[test]
    fn datetime_bridge() {
        let dt = timestamp_to_datetime("2026-08-06 14:30:00+02:00").unwrap();
        assert_eq!(dt.offset(), UtcOffset::from_hms(2, 0, 0).unwrap());
        assert_eq!(datetime_to_timestamp(dt), "2026-08-06 14:30:00+02:00");
        assert!(timestamp_to_datetime("+300").is_none());
    }
}
