// crates/hpcjudge-core/src/clock.rs
// ============================================================================
// Module: HPC Judge Clock
// Description: Wall-clock timestamp helper shared by every crate that
// stamps a wire message or needs to back-date one by a fixed offset.
// Purpose: Give `ReportMessage.timestamp` and the command-report watchdog's
// back-dating logic (§9) one conversion point instead of each reimplementing
// `OffsetDateTime` math.
// Dependencies: time
// ============================================================================

use time::OffsetDateTime;

/// Returns the current wall-clock time as microseconds since the Unix
/// epoch.
#[must_use]
pub fn now_micros() -> i64 {
    to_micros(OffsetDateTime::now_utc())
}

/// Returns `now_micros()` shifted earlier by `millis`, used by the
/// command-report watchdog to back-date a synthetic failure verdict so a
/// real, slightly-late verdict from the judge script still wins downstream
/// ordering (§9, deliberate — do not "fix").
#[must_use]
pub fn backdated_micros(millis: i64) -> i64 {
    now_micros() - millis.saturating_mul(1_000)
}

fn to_micros(timestamp: OffsetDateTime) -> i64 {
    let seconds = timestamp.unix_timestamp();
    let subsec_micros = i64::from(timestamp.microsecond());
    seconds.saturating_mul(1_000_000).saturating_add(subsec_micros)
}

#[cfg(test)]
mod tests {
    use super::backdated_micros;
    use super::now_micros;

    #[test]
    fn backdated_is_earlier_than_now() {
        let now = now_micros();
        let backdated = backdated_micros(100);
        assert!(backdated <= now);
        assert!(now - backdated >= 100_000);
    }
}
