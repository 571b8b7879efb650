use std::collections::BTreeMap;
use std::fmt;
use chrono::NaiveDate;
use staysearch_shared::SearchCriteria;

/// Textual date format used on the wire and in storage.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Field name -> message, as returned to API clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(pub BTreeMap<String, String>);

impl ValidationErrors {
    fn add(&mut self, field: &str, message: &str) {
        self.0.entry(field.to_string()).or_insert_with(|| message.to_string());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|(field, msg)| format!("{}: {}", field, msg))
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

impl std::error::Error for ValidationErrors {}

/// Parse a `dd/MM/yyyy` date strictly: two-digit day and month, four-digit
/// year, and a date that actually exists (no 31/02 rollover).
pub fn parse_search_date(value: &str) -> Option<NaiveDate> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[2] == b'/'
        && bytes[5] == b'/'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !shape_ok {
        return None;
    }

    let date = NaiveDate::parse_from_str(value, DATE_FORMAT).ok()?;
    // Reject anything chrono accepted but would render differently.
    (date.format(DATE_FORMAT).to_string() == value).then_some(date)
}

/// Boundary checks applied before a search enters the pipeline.
pub fn validate_criteria(criteria: &SearchCriteria) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if criteria.hotel_id.trim().is_empty() {
        errors.add("hotelId", "hotelId is required");
    }

    let check_in = parse_search_date(&criteria.check_in);
    if check_in.is_none() {
        errors.add("checkIn", "checkIn date must be a real date in the format dd/MM/yyyy");
    }

    let check_out = parse_search_date(&criteria.check_out);
    if check_out.is_none() {
        errors.add("checkOut", "checkOut date must be a real date in the format dd/MM/yyyy");
    }

    if let (Some(check_in), Some(check_out)) = (check_in, check_out) {
        if check_in >= check_out {
            errors.add("checkOut", "Check-in date must be before check-out date");
        }
    }

    if criteria.ages.is_empty() {
        errors.add("ages", "Ages list cannot be empty");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
