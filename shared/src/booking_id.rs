//! Booking references of the form `DTC-{ddmmyy}{seq}`.
//!
//! `seq` is a per-day counter, zero-padded to three digits, starting at 001.
//! Past 999 it simply grows wider (`DTC-1810261000`).

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

use crate::TransferError;

pub const BOOKING_ID_PREFIX: &str = "DTC-";
const DATE_LEN: usize = 6;
const MIN_SEQ_WIDTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BookingId {
    pub date: NaiveDate,
    pub sequence: u32,
}

/// `ddmmyy` day key used in booking IDs and the per-day GSI
pub fn day_key(date: NaiveDate) -> String {
    date.format("%d%m%y").to_string()
}

impl BookingId {
    pub fn new(date: NaiveDate, sequence: u32) -> Self {
        Self { date, sequence }
    }

    pub fn day_key(&self) -> String {
        day_key(self.date)
    }

    /// The following sequence on the same day
    pub fn successor(&self) -> Result<Self, TransferError> {
        self.sequence
            .checked_add(1)
            .map(|sequence| Self::new(self.date, sequence))
            .ok_or_else(|| {
                TransferError::Conflict(format!("No booking IDs left for {}", self.day_key()))
            })
    }

    pub fn parse(value: &str) -> Result<Self, TransferError> {
        let invalid = || TransferError::ValidationError(format!("Invalid booking ID: {}", value));

        let rest = value.strip_prefix(BOOKING_ID_PREFIX).ok_or_else(invalid)?;
        if rest.len() < DATE_LEN + MIN_SEQ_WIDTH || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let (date_part, seq_part) = rest.split_at(DATE_LEN);
        let date = NaiveDate::parse_from_str(date_part, "%d%m%y").map_err(|_| invalid())?;
        let sequence: u32 = seq_part.parse().map_err(|_| invalid())?;
        if sequence == 0 {
            return Err(invalid());
        }
        // Only the canonical rendering is accepted, so "DTC-1810260001" is not seq 1
        if seq_part.len() > MIN_SEQ_WIDTH && seq_part.starts_with('0') {
            return Err(invalid());
        }

        Ok(Self { date, sequence })
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{:0width$}",
            BOOKING_ID_PREFIX,
            self.day_key(),
            self.sequence,
            width = MIN_SEQ_WIDTH
        )
    }
}

impl FromStr for BookingId {
    type Err = TransferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BookingId::parse(s)
    }
}

/// Next ID for `date`, one past the highest same-day sequence in `existing`.
/// Malformed IDs and IDs from other days are ignored.
pub fn next_booking_id<'a, I>(date: NaiveDate, existing: I) -> Result<BookingId, TransferError>
where
    I: IntoIterator<Item = &'a str>,
{
    let highest = existing
        .into_iter()
        .filter_map(|id| BookingId::parse(id).ok())
        .filter(|id| id.date == date)
        .map(|id| id.sequence)
        .max()
        .unwrap_or(0);

    BookingId::new(date, highest).successor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn test_format() {
        assert_eq!(BookingId::new(day(), 1).to_string(), "DTC-181026001");
        assert_eq!(BookingId::new(day(), 42).to_string(), "DTC-181026042");
        assert_eq!(BookingId::new(day(), 1000).to_string(), "DTC-1810261000");
    }

    #[test]
    fn test_parse() {
        let id = BookingId::parse("DTC-181026007").unwrap();
        assert_eq!(id.date, day());
        assert_eq!(id.sequence, 7);
        assert_eq!(BookingId::parse("DTC-1810261000").unwrap().sequence, 1000);

        assert!(BookingId::parse("DTC-18102601").is_err());
        assert!(BookingId::parse("DTC-181026000").is_err());
        assert!(BookingId::parse("DTC-321026001").is_err());
        assert!(BookingId::parse("ABC-181026001").is_err());
        assert!(BookingId::parse("DTC-18102600a").is_err());
        assert!(BookingId::parse("DTC-1810260001").is_err());
    }

    #[test]
    fn test_first_booking_of_the_day() {
        assert_eq!(next_booking_id(day(), Vec::<&str>::new()).unwrap().to_string(), "DTC-181026001");
    }

    #[test]
    fn test_next_uses_highest_not_count() {
        let existing = ["DTC-181026001", "DTC-181026005", "DTC-181026002"];
        assert_eq!(next_booking_id(day(), existing).unwrap().to_string(), "DTC-181026006");
    }

    #[test]
    fn test_next_ignores_other_days_and_garbage() {
        let existing = ["DTC-171026009", "not-an-id", "DTC-181026003"];
        assert_eq!(next_booking_id(day(), existing).unwrap().to_string(), "DTC-181026004");
    }

    #[test]
    fn test_sequence_rolls_past_three_digits() {
        let existing = ["DTC-181026999"];
        assert_eq!(next_booking_id(day(), existing).unwrap().to_string(), "DTC-1810261000");
    }

    #[test]
    fn test_exhausted_sequence_is_a_conflict() {
        let last = format!("DTC-181026{}", u32::MAX);
        assert_eq!(BookingId::parse(&last).unwrap().sequence, u32::MAX);

        let err = next_booking_id(day(), [last.as_str()]).unwrap_err();
        assert!(matches!(err, TransferError::Conflict(_)));
        assert_eq!(err.status_code(), 409);
    }
}
