//! Clock access and the TTL it implies.
//!
//! Reading the current time makes output cacheable only until the
//! smallest unit actually read rolls over, so every read path reports a
//! TTL ceiling: a format string is scanned for the finest specifier it
//! contains, and a structured time value reports per field, lazily, as
//! fields are read. Values constructed from an explicit timestamp are
//! not tied to the current moment and report nothing.

pub const TTL_SECOND: u64 = 1;
pub const TTL_MINUTE: u64 = 60;
pub const TTL_HOUR: u64 = 3600;
pub const TTL_HALF_DAY: u64 = 43200;
pub const TTL_DAY: u64 = 86400;
pub const TTL_MONTH: u64 = 2678400;
pub const TTL_YEAR: u64 = 31622400;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockParts {
    pub year: i64,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub min: u32,
    pub sec: u32,
    /// Day of week, 1 = Sunday.
    pub wday: u32,
    /// Day of year, 1-based.
    pub yday: u32,
}

/// A structured time value handed to scripts. Field reads on a live
/// table (one derived from the current clock) report that field's TTL;
/// a table built from an explicit timestamp stays silent.
pub struct TimeTable {
    pub parts: ClockParts,
    pub live: bool,
}

/// TTL implied by a strftime-style format string, or `None` when the
/// format reads no time unit at all.
pub fn format_ttl(fmt: &str) -> Option<u64> {
    let mut ttl: Option<u64> = None;
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            continue;
        }
        let Some(spec) = chars.next() else { break };
        let unit = match spec {
            '%' => continue,
            'S' | 'T' | 'X' | 'c' | 'r' | 's' => TTL_SECOND,
            'M' | 'R' => TTL_MINUTE,
            'H' | 'I' => TTL_HOUR,
            'p' => TTL_HALF_DAY,
            'd' | 'e' | 'j' | 'a' | 'A' | 'w' | 'u' | 'x' | 'D' | 'F' => TTL_DAY,
            'm' | 'b' | 'B' | 'h' => TTL_MONTH,
            'y' | 'Y' | 'C' | 'g' | 'G' => TTL_YEAR,
            // Unrecognized specifier: assume the finest granularity.
            _ => TTL_SECOND,
        };
        ttl = Some(ttl.map_or(unit, |t| t.min(unit)));
    }
    ttl
}

/// TTL implied by reading one field of a structured time value.
pub fn field_ttl(name: &str) -> Option<u64> {
    match name {
        "sec" => Some(TTL_SECOND),
        "min" => Some(TTL_MINUTE),
        "hour" => Some(TTL_HOUR),
        "day" | "wday" | "yday" => Some(TTL_DAY),
        "month" => Some(TTL_MONTH),
        "year" => Some(TTL_YEAR),
        _ => None,
    }
}

impl ClockParts {
    pub fn from_unix(secs: i64) -> Self {
        let days = secs.div_euclid(86400);
        let rem = secs.rem_euclid(86400);
        let (year, month, day) = civil_from_days(days);
        let wday = ((days + 4).rem_euclid(7) + 1) as u32;
        let jan1 = days_from_civil(year, 1, 1);
        Self {
            year,
            month,
            day,
            hour: (rem / 3600) as u32,
            min: (rem % 3600 / 60) as u32,
            sec: (rem % 60) as u32,
            wday,
            yday: (days - jan1 + 1) as u32,
        }
    }

    pub fn to_unix(&self) -> i64 {
        days_from_civil(self.year, self.month, self.day) * 86400
            + i64::from(self.hour) * 3600
            + i64::from(self.min) * 60
            + i64::from(self.sec)
    }

    pub fn field(&self, name: &str) -> Option<i64> {
        match name {
            "year" => Some(self.year),
            "month" => Some(i64::from(self.month)),
            "day" => Some(i64::from(self.day)),
            "hour" => Some(i64::from(self.hour)),
            "min" => Some(i64::from(self.min)),
            "sec" => Some(i64::from(self.sec)),
            "wday" => Some(i64::from(self.wday)),
            "yday" => Some(i64::from(self.yday)),
            _ => None,
        }
    }
}

/// Renders the supported strftime subset; unrecognized specifiers pass
/// through verbatim.
pub fn format_date(fmt: &str, parts: &ClockParts) -> String {
    let mut out = String::with_capacity(fmt.len() + 8);
    let mut chars = fmt.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('%') => out.push('%'),
            Some('Y') => out.push_str(&parts.year.to_string()),
            Some('y') => out.push_str(&format!("{:02}", parts.year.rem_euclid(100))),
            Some('m') => out.push_str(&format!("{:02}", parts.month)),
            Some('d') => out.push_str(&format!("{:02}", parts.day)),
            Some('e') => out.push_str(&format!("{:2}", parts.day)),
            Some('H') => out.push_str(&format!("{:02}", parts.hour)),
            Some('I') => {
                let h = parts.hour % 12;
                out.push_str(&format!("{:02}", if h == 0 { 12 } else { h }));
            }
            Some('M') => out.push_str(&format!("{:02}", parts.min)),
            Some('S') => out.push_str(&format!("{:02}", parts.sec)),
            Some('p') => out.push_str(if parts.hour < 12 { "AM" } else { "PM" }),
            Some('j') => out.push_str(&format!("{:03}", parts.yday)),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

// Civil calendar conversions, days relative to 1970-01-01.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = z - era * 146097;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

fn days_from_civil(y: i64, m: u32, d: u32) -> i64 {
    let y = if m <= 2 { y - 1 } else { y };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400;
    let mp = i64::from(if m > 2 { m - 3 } else { m + 9 });
    let doy = (153 * mp + 2) / 5 + i64::from(d) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe - 719468
}
