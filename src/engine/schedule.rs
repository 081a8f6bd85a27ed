//! Pickup and delivery window rules.
//!
//! Windows travel as timestamps. Older clients still send the display form
//! `"Viernes, 16 de octubre, 10:00"`; [`parse_window`] turns that into a
//! timestamp at the API edge and [`format_window`] renders it back for people.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const MONTHS: [&str; 12] = [
    "enero",
    "febrero",
    "marzo",
    "abril",
    "mayo",
    "junio",
    "julio",
    "agosto",
    "septiembre",
    "octubre",
    "noviembre",
    "diciembre",
];

const WEEKDAYS: [&str; 7] = [
    "Lunes",
    "Martes",
    "Miércoles",
    "Jueves",
    "Viernes",
    "Sábado",
    "Domingo",
];

/// Shortest month token accepted; three letters keep "mar" and "may" apart.
const MIN_MONTH_PREFIX: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleRejection {
    #[error("pickup window `{0}` is not a valid date and time")]
    UnparsablePickup(String),

    #[error("delivery window `{0}` is not a valid date and time")]
    UnparsableDelivery(String),

    #[error("pickup must be at least {0} minutes from now")]
    PickupTooSoon(i64),

    #[error("delivery must be at least {0} minutes from now")]
    DeliveryTooSoon(i64),

    #[error("pickup must be before delivery")]
    PickupNotBeforeDelivery,

    #[error("delivery must be at least {0} minutes after pickup")]
    GapTooShort(i64),
}

impl ScheduleRejection {
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleRejection::UnparsablePickup(_) => "pickup_window_unparsable",
            ScheduleRejection::UnparsableDelivery(_) => "delivery_window_unparsable",
            ScheduleRejection::PickupTooSoon(_) => "pickup_too_soon",
            ScheduleRejection::DeliveryTooSoon(_) => "delivery_too_soon",
            ScheduleRejection::PickupNotBeforeDelivery => "pickup_not_before_delivery",
            ScheduleRejection::GapTooShort(_) => "window_gap_too_short",
        }
    }
}

/// A window as a client may send it: an RFC 3339 timestamp, or the legacy
/// display string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WindowInput {
    At(DateTime<FixedOffset>),
    Display(String),
}

impl WindowInput {
    fn describe(&self) -> String {
        match self {
            WindowInput::At(at) => at.to_rfc3339(),
            WindowInput::Display(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledWindows {
    pub pickup_at: DateTime<Utc>,
    pub delivery_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ScheduleValidator {
    lead_time: Duration,
    min_gap: Duration,
    offset: FixedOffset,
}

impl ScheduleValidator {
    pub fn new(lead_time: Duration, min_gap: Duration, offset: FixedOffset) -> Self {
        Self {
            lead_time,
            min_gap,
            offset,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Applies the rules in order and reports only the first one violated.
    pub fn validate(
        &self,
        pickup: &WindowInput,
        delivery: &WindowInput,
        now: DateTime<Utc>,
    ) -> Result<ScheduledWindows, ScheduleRejection> {
        let pickup_at = self
            .resolve(pickup, now)
            .ok_or_else(|| ScheduleRejection::UnparsablePickup(pickup.describe()))?;
        let delivery_at = self
            .resolve(delivery, now)
            .ok_or_else(|| ScheduleRejection::UnparsableDelivery(delivery.describe()))?;

        self.check(pickup_at, delivery_at, now)?;

        Ok(ScheduledWindows {
            pickup_at,
            delivery_at,
        })
    }

    fn resolve(&self, input: &WindowInput, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match input {
            WindowInput::At(at) => Some(at.with_timezone(&Utc)),
            WindowInput::Display(text) => parse_window(text, now, self.offset),
        }
    }

    fn check(
        &self,
        pickup_at: DateTime<Utc>,
        delivery_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), ScheduleRejection> {
        let earliest = now + self.lead_time;

        if pickup_at < earliest {
            return Err(ScheduleRejection::PickupTooSoon(self.lead_time.num_minutes()));
        }
        if delivery_at < earliest {
            return Err(ScheduleRejection::DeliveryTooSoon(
                self.lead_time.num_minutes(),
            ));
        }
        if pickup_at >= delivery_at {
            return Err(ScheduleRejection::PickupNotBeforeDelivery);
        }
        if delivery_at - pickup_at < self.min_gap {
            return Err(ScheduleRejection::GapTooShort(self.min_gap.num_minutes()));
        }

        Ok(())
    }
}

/// Parses `"<weekday>, <D> de <Month>, <HH[:MM]>"` in the given local offset.
///
/// Only the last two comma segments are read; the weekday is not checked
/// against the date. The year is the nearest one in which that date and time
/// is not already past, so a time earlier today means next year. Returns
/// `None` instead of guessing.
pub fn parse_window(text: &str, now: DateTime<Utc>, offset: FixedOffset) -> Option<DateTime<Utc>> {
    let segments: Vec<&str> = text.trim().split(", ").collect();
    if segments.len() < 3 {
        return None;
    }

    let (day, month) = parse_day_month(segments[segments.len() - 2])?;
    let (hour, minute) = parse_time(segments[segments.len() - 1])?;

    let year = now.with_timezone(&offset).year();
    (year..=year + 4)
        .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, 0))
        .filter_map(|naive| naive.and_local_timezone(offset).single())
        .map(|local| local.with_timezone(&Utc))
        .find(|at| *at >= now)
}

fn parse_day_month(segment: &str) -> Option<(u32, u32)> {
    let tokens: Vec<&str> = segment.split_whitespace().collect();
    let [day, de, month] = tokens.as_slice() else {
        return None;
    };

    if !de.eq_ignore_ascii_case("de") {
        return None;
    }

    let day = parse_number(day, 2)?;
    if !(1..=31).contains(&day) {
        return None;
    }

    Some((day, month_number(month)?))
}

fn month_number(token: &str) -> Option<u32> {
    let token = token.to_lowercase();
    if token.chars().count() < MIN_MONTH_PREFIX {
        return None;
    }

    MONTHS
        .iter()
        .position(|name| name.starts_with(token.as_str()))
        .map(|index| index as u32 + 1)
}

fn parse_time(segment: &str) -> Option<(u32, u32)> {
    let segment = segment.trim();
    let (hour, minute) = match segment.split_once(':') {
        Some((hour, minute)) if minute.len() == 2 => (parse_number(hour, 2)?, parse_number(minute, 2)?),
        Some(_) => return None,
        None => (parse_number(segment, 2)?, 0),
    };

    (hour < 24 && minute < 60).then_some((hour, minute))
}

fn parse_number(raw: &str, max_digits: usize) -> Option<u32> {
    if raw.is_empty() || raw.len() > max_digits || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

/// Renders a window for display, e.g. `"Viernes, 16 de octubre, 10:00"`.
pub fn format_window(at: DateTime<Utc>, offset: FixedOffset) -> String {
    let local = at.with_timezone(&offset);
    let weekday = WEEKDAYS[local.weekday().num_days_from_monday() as usize];
    let month = MONTHS[local.month0() as usize];

    format!(
        "{weekday}, {} de {month}, {}",
        local.day(),
        local.format("%H:%M")
    )
}
