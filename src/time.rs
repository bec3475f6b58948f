use chrono::{DateTime, Datelike, FixedOffset, Utc};

pub fn to_fixed_offset(time: DateTime<Utc>) -> DateTime<FixedOffset> {
    let converted = time.fixed_offset();
    assert_eq!(
        converted.offset().local_minus_utc(),
        0,
        "Offset conversion failed"
    );
    assert!(converted.year() >= 1970, "Timestamp predates Unix epoch");
    converted
}

/// Current time as stored in `timestamp with time zone` columns (always UTC).
pub fn fixed_now() -> DateTime<FixedOffset> {
    to_fixed_offset(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_now_is_utc() {
        let now = fixed_now();
        assert_eq!(now.offset().local_minus_utc(), 0);
        assert!((Utc::now() - now.with_timezone(&Utc)).num_seconds() < 5);
    }
}
