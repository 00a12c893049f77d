//! Timestamps are stored as integer microseconds since the Unix epoch so
//! that `ORDER BY created_at` is numeric and lossless.

use chrono::{DateTime, Utc};

use crate::error::DbError;

pub(crate) const fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

pub(crate) fn from_micros(table: &'static str, micros: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| DbError::corrupt(table, format!("timestamp {micros} out of range")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn micros_preserve_sub_second_order() {
        let now = Utc::now();
        let back = from_micros("t", to_micros(now)).unwrap();
        assert_eq!(back.timestamp_micros(), now.timestamp_micros());
    }
}
