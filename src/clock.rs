use time::{Duration, OffsetDateTime};

/// Current UTC time at microsecond precision, the resolution PostgreSQL keeps.
pub fn now() -> OffsetDateTime {
    let t = OffsetDateTime::now_utc();
    t.replace_nanosecond(t.nanosecond() / 1_000 * 1_000)
        .unwrap_or(t)
}

/// A timestamp strictly later than `prev`, normally just `now()`.
pub fn after(prev: OffsetDateTime) -> OffsetDateTime {
    let t = now();
    if t > prev {
        t
    } else {
        prev + Duration::microseconds(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_is_truncated_to_micros() {
        assert_eq!(now().nanosecond() % 1_000, 0);
    }

    #[test]
    fn after_is_strictly_monotonic() {
        let future = now() + Duration::hours(1);
        assert_eq!(after(future), future + Duration::microseconds(1));
        let past = now() - Duration::hours(1);
        assert!(after(past) > past);
    }
}
