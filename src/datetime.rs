//! Packed DOS date/time fields as used in Squish message headers.
//!
//! Date word: `yyyyyyym mmmddddd` (years since 1980, 1-based month, day).
//! Time word: `hhhhhmmm mmmsssss` (seconds stored halved).
//!
//! Years before 1980 were written by some tools with the 7-bit year field
//! wrapping, so a decoded year offset above 127 (years since 1900) is pulled
//! back by 128.  Downstream indexes depend on that exact mapping.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// A decoded date/time tuple, not yet normalised.  Fields may be out of
/// range (day 0, month index -1, hour 31) exactly as the packed bits say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarTime {
    /// Full year, 1900..=2027.
    pub year:   i32,
    /// Zero-based month index, -1..=14.
    pub month0: i8,
    pub day:    u8,
    pub hour:   u8,
    pub minute: u8,
    pub second: u8,
}

pub fn decode_packed_datetime(date: u16, time: u16) -> CalendarTime {
    let mut year_offset = i32::from((date >> 9) & 0x7f) + 80;
    if year_offset > 127 {
        year_offset -= 128;
    }
    CalendarTime {
        year:   1900 + year_offset,
        month0: ((date >> 5) & 0x0f) as i8 - 1,
        day:    (date & 0x1f) as u8,
        hour:   ((time >> 11) & 0x1f) as u8,
        minute: ((time >> 5) & 0x3f) as u8,
        second: ((time & 0x1f) << 1) as u8,
    }
}

impl CalendarTime {
    /// One-based month as stored in the packed field.
    pub fn month(&self) -> i32 {
        i32::from(self.month0) + 1
    }

    /// Encode back into `(date, time)` words.
    pub fn pack(&self) -> (u16, u16) {
        let years = (self.year - 1980).rem_euclid(128) as u16;
        let date = (years << 9) | ((self.month() as u16 & 0x0f) << 5) | (u16::from(self.day) & 0x1f);
        let time = (u16::from(self.hour) << 11)
            | ((u16::from(self.minute) & 0x3f) << 5)
            | (u16::from(self.second >> 1) & 0x1f);
        (date, time)
    }

    /// Normalise the fields into a calendar time the way C `mktime` does:
    /// overflowing months, days, hours and minutes carry into the next unit.
    pub fn to_naive(&self) -> Option<NaiveDateTime> {
        let months = self.year * 12 + i32::from(self.month0);
        let first = NaiveDate::from_ymd_opt(months.div_euclid(12), months.rem_euclid(12) as u32 + 1, 1)?;
        let secs = (i64::from(self.day) - 1) * 86_400
            + i64::from(self.hour) * 3_600
            + i64::from(self.minute) * 60
            + i64::from(self.second);
        first.and_hms_opt(0, 0, 0)?.checked_add_signed(Duration::seconds(secs))
    }

    /// Interpret as wall-clock time in `tz`.  A time skipped by a DST jump
    /// moves forward one hour; anything unresolvable becomes the Unix epoch.
    pub fn in_zone<Tz: TimeZone>(&self, tz: &Tz) -> DateTime<Tz> {
        self.to_naive()
            .and_then(|naive| {
                tz.from_local_datetime(&naive).earliest().or_else(|| {
                    tz.from_local_datetime(&(naive + Duration::hours(1))).earliest()
                })
            })
            .unwrap_or_else(|| epoch().with_timezone(tz))
    }

    pub fn to_local(&self) -> DateTime<Local> {
        self.in_zone(&Local)
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.in_zone(&Utc)
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.from_utc_datetime(&NaiveDateTime::default())
}

// ── UTC offsets ──────────────────────────────────────────────────────────────

/// Minutes east of UTC for the zone `instant` is expressed in, derived by
/// comparing its wall-clock fields with the UTC fields.
pub fn utc_offset_minutes<Tz: TimeZone>(instant: &DateTime<Tz>) -> i32 {
    let local = instant.naive_local();
    let gm = instant.naive_utc();

    let day_count = |t: &NaiveDateTime| i64::from(t.year() - 1900) * 366 + i64::from(t.ordinal0());
    let mut local_minutes = (local.hour() * 60 + local.minute()) as i32;
    let mut gm_minutes = (gm.hour() * 60 + gm.minute()) as i32;

    let (local_days, gm_days) = (day_count(&local), day_count(&gm));
    if gm_days < local_days {
        local_minutes += 1440;
    } else if gm_days > local_days {
        gm_minutes += 1440;
    }
    local_minutes - gm_minutes
}

/// Offset of the host zone at `now`.
pub fn local_utc_offset_minutes(now: DateTime<Utc>) -> i32 {
    utc_offset_minutes(&now.with_timezone(&Local))
}

/// Render minutes as a `TZUTC` kludge value: signed `hhmm`, at least four digits.
pub fn format_tzutc(minutes: i32) -> String {
    let sign = if minutes < 0 { "-" } else { "" };
    let abs = minutes.unsigned_abs();
    format!("{sign}{:04}", (abs / 60) * 100 + abs % 60)
}

/// Parse a `TZUTC` kludge value back into minutes east of UTC.
pub fn parse_tzutc(value: &str) -> Option<i32> {
    let value = value.trim();
    let (sign, digits) = match value.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None       => (1, value.strip_prefix('+').unwrap_or(value)),
    };
    if !(3..=4).contains(&digits.len()) || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hhmm: i32 = digits.parse().ok()?;
    let (hours, minutes) = (hhmm / 100, hhmm % 100);
    if minutes >= 60 {
        return None;
    }
    Some(sign * (hours * 60 + minutes))
}
