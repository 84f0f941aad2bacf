// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Local civil time handling.
//!
//! Every calendar day the engine works with is a [`LocalDay`]: a date in the
//! configured zone, anchored at its local midnight as a zone-aware instant.
//! Conversions to the store's UTC representation happen only at the I/O
//! boundary through the helpers in this module.

use chrono::{
    DateTime, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, TimeZone,
    Utc,
};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Zone used when the configuration does not name one
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

/// Wall-clock time at which daily aggregates are stamped
const CANONICAL_TIME: (u32, u32, u32) = (23, 59, 59);

/// Longest spring-forward gap we step across when localizing (minutes)
const MAX_GAP_MINUTES: i64 = 180;

/// Attach a zone to a naive local wall-clock time.
///
/// Ambiguous times (the repeated hour when clocks fall back) resolve to the
/// earliest instant. Times inside a spring-forward gap move forward to the
/// first wall-clock time that exists.
pub fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt,
        LocalResult::None => {
            let mut minutes = 15;
            while minutes <= MAX_GAP_MINUTES {
                if let Some(dt) = tz
                    .from_local_datetime(&(naive + TimeDelta::minutes(minutes)))
                    .earliest()
                {
                    return dt;
                }
                minutes += 15;
            }
            // No zone has a gap this long; read the wall clock as UTC instead.
            tz.from_utc_datetime(&naive)
        }
    }
}

/// Convert a naive local wall-clock time to UTC
pub fn local_to_utc(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    localize(tz, naive).with_timezone(&Utc)
}

/// Convert a UTC instant to the local zone
pub fn utc_to_local(tz: Tz, instant: DateTime<Utc>) -> DateTime<Tz> {
    instant.with_timezone(&tz)
}

/// Parse an IANA zone name such as `Europe/Prague`
pub fn parse_timezone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

/// Point-in-time handed to a store write.
///
/// A `Local` timestamp carries no zone and is read as wall-clock time in the
/// store's configured zone; a `Zoned` one is converted directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timestamp {
    Local(NaiveDateTime),
    Zoned(DateTime<FixedOffset>),
}

impl Timestamp {
    /// Current wall-clock time
    pub fn now() -> Self {
        Self::Zoned(Utc::now().fixed_offset())
    }

    pub fn to_utc(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            Self::Local(naive) => local_to_utc(tz, *naive),
            Self::Zoned(dt) => dt.with_timezone(&Utc),
        }
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(instant: DateTime<Utc>) -> Self {
        Self::Zoned(instant.fixed_offset())
    }
}

impl From<DateTime<Tz>> for Timestamp {
    fn from(instant: DateTime<Tz>) -> Self {
        Self::Zoned(instant.fixed_offset())
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(naive: NaiveDateTime) -> Self {
        Self::Local(naive)
    }
}

/// A calendar day in a fixed local zone.
///
/// Internally the day is its local midnight (or the first valid instant after
/// it when midnight falls inside a DST gap). Moving between days always goes
/// through the calendar date and re-localizes, so a day is one civil day even
/// when it lasts 23 or 25 hours of real time.
#[derive(Clone)]
pub struct LocalDay {
    start: DateTime<Tz>,
}

impl LocalDay {
    pub fn new(date: NaiveDate, tz: Tz) -> Self {
        Self {
            start: localize(tz, date.and_time(NaiveTime::MIN)),
        }
    }

    /// The local day an instant falls on
    pub fn containing(instant: DateTime<Utc>, tz: Tz) -> Self {
        Self::new(utc_to_local(tz, instant).date_naive(), tz)
    }

    /// The current local day according to the wall clock
    pub fn today(tz: Tz) -> Self {
        Self::containing(Utc::now(), tz)
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn timezone(&self) -> Tz {
        self.start.timezone()
    }

    /// Day `days` civil days away from this one
    pub fn offset(&self, days: i64) -> Self {
        let date = self
            .date()
            .checked_add_signed(TimeDelta::days(days))
            .unwrap_or(if days < 0 {
                NaiveDate::MIN
            } else {
                NaiveDate::MAX
            });
        Self::new(date, self.timezone())
    }

    pub fn succ(&self) -> Self {
        self.offset(1)
    }

    pub fn pred(&self) -> Self {
        self.offset(-1)
    }

    /// First instant of the day
    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    /// First instant of the following day (exclusive end)
    pub fn end(&self) -> DateTime<Tz> {
        self.succ().start
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        self.end().with_timezone(&Utc)
    }

    /// Real elapsed time of the day: 24h normally, 23h or 25h across DST changes
    pub fn length(&self) -> TimeDelta {
        self.end_utc() - self.start_utc()
    }

    /// Instant a daily aggregate for this day is stamped with (local 23:59:59)
    pub fn canonical_instant(&self) -> DateTime<Tz> {
        let (h, m, s) = CANONICAL_TIME;
        let time = NaiveTime::from_hms_opt(h, m, s).unwrap_or(NaiveTime::MIN);
        localize(self.timezone(), self.date().and_time(time))
    }

    /// Number of civil days from `self` to `other` (negative when `other` is earlier)
    pub fn days_until(&self, other: &Self) -> i64 {
        (other.date() - self.date()).num_days()
    }
}

// Identity is (date, zone), the same key `Ord` uses
impl PartialEq for LocalDay {
    fn eq(&self, other: &Self) -> bool {
        self.date() == other.date() && self.timezone() == other.timezone()
    }
}

impl Eq for LocalDay {}

impl Hash for LocalDay {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.date().hash(state);
        self.timezone().hash(state);
    }
}

impl PartialOrd for LocalDay {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LocalDay {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date()
            .cmp(&other.date())
            .then_with(|| self.timezone().name().cmp(other.timezone().name()))
    }
}

impl fmt::Display for LocalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.date().format("%Y-%m-%d"))
    }
}

impl fmt::Debug for LocalDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalDay({} {})", self, self.timezone().name())
    }
}
