//! Maps wall-clock time to the integer "day number" the scheduler reasons
//! in, relative to a deck-wide creation epoch and rollover hour. Grounded in
//! the teacher's `helpers::get_start_end_local_date` day-boundary math.

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};

pub const DEFAULT_ROLLOVER_HOUR: u32 = 4;

/// Deck-wide day/time reference point. `today()` and `day_cutoff()` are
/// always computed relative to `created_at` and `rollover_hour`.
#[derive(Clone, Copy, Debug)]
pub struct Clock {
    created_at: DateTime<Utc>,
    rollover_hour: u32,
}

impl Clock {
    pub fn new(created_at: DateTime<Utc>, rollover_hour: u32) -> Self {
        Clock {
            created_at,
            rollover_hour,
        }
    }

    pub fn with_default_rollover(created_at: DateTime<Utc>) -> Self {
        Clock::new(created_at, DEFAULT_ROLLOVER_HOUR)
    }

    /// The local calendar date `at` belongs to once the rollover hour is
    /// taken into account: a moment before today's rollover still belongs
    /// to yesterday's "day".
    fn rollover_date(&self, at: DateTime<Utc>) -> NaiveDate {
        let local = at.with_timezone(&Local).naive_local();
        let rollover_today = local
            .date()
            .and_hms_opt(self.rollover_hour, 0, 0)
            .expect("rollover_hour is always a valid hour-of-day");
        if local >= rollover_today {
            local.date()
        } else {
            local.date() - chrono::Duration::days(1)
        }
    }

    /// The current day number: whole rollover-adjusted days since
    /// `created_at`.
    pub fn today_at(&self, now: DateTime<Utc>) -> i64 {
        (self.rollover_date(now) - self.rollover_date(self.created_at)).num_days()
    }

    pub fn today(&self) -> i64 {
        self.today_at(Utc::now())
    }

    /// Unix time of the next rollover after `now`.
    pub fn day_cutoff_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let next_date = self.rollover_date(now) + chrono::Duration::days(1);
        let naive = next_date
            .and_hms_opt(self.rollover_hour, 0, 0)
            .expect("rollover_hour is always a valid hour-of-day");
        Local
            .from_local_datetime(&naive)
            .single()
            .unwrap_or_else(|| Local.from_utc_datetime(&naive))
            .with_timezone(&Utc)
    }

    pub fn day_cutoff(&self) -> DateTime<Utc> {
        self.day_cutoff_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn today_advances_by_one_each_day() {
        let created = Utc::now() - chrono::Duration::hours(1);
        let clock = Clock::with_default_rollover(created);
        let t0 = clock.today();
        let t1 = clock.today_at(Utc::now() + chrono::Duration::days(1));
        assert_eq!(t1, t0 + 1);
    }

    #[test]
    fn day_cutoff_is_in_the_future() {
        let clock = Clock::with_default_rollover(Utc::now() - chrono::Duration::days(3));
        assert!(clock.day_cutoff() > Utc::now());
    }
}
