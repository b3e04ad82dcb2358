// region:    --- Imports
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::{interval, Duration, MissedTickBehavior};

// endregion: --- Imports

// region:    --- Countdown

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownStatus {
    Scheduled,
    Running,
    Ended,
}

/// Remaining-time breakdown plus the derived status. Advisory only: the
/// submit path checks the server-confirmed auction status, never this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub status: CountdownStatus,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
    pub total_seconds: i64,
}

/// Pure derivation from the auction window and a clock reading.
pub fn countdown(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Countdown {
    let (status, remaining) = if now < start {
        (CountdownStatus::Scheduled, start - now)
    } else if now < end {
        (CountdownStatus::Running, end - now)
    } else {
        (CountdownStatus::Ended, chrono::Duration::zero())
    };

    let total_seconds = remaining.num_seconds().max(0);
    Countdown {
        status,
        days: total_seconds / 86_400,
        hours: (total_seconds % 86_400) / 3_600,
        minutes: (total_seconds % 3_600) / 60,
        seconds: total_seconds % 60,
        total_seconds,
    }
}

// endregion: --- Countdown

// region:    --- Ticker

/// Recomputes the countdown once per second into a watch channel while
/// mounted; dropping the ticker stops the task and releases the timer.
pub struct CountdownTicker {
    rx: watch::Receiver<Countdown>,
    handle: tokio::task::JoinHandle<()>,
}

impl CountdownTicker {
    pub fn start(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let (tx, rx) = watch::channel(countdown(start, end, Utc::now()));
        let handle = tokio::spawn(async move {
            let mut tick = interval(Duration::from_secs(1));
            tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let current = countdown(start, end, Utc::now());
                if tx.send(current).is_err() {
                    break;
                }
                if current.status == CountdownStatus::Ended {
                    break;
                }
            }
        });
        Self { rx, handle }
    }

    pub fn subscribe(&self) -> watch::Receiver<Countdown> {
        self.rx.clone()
    }

    pub fn current(&self) -> Countdown {
        *self.rx.borrow()
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// endregion: --- Ticker

// region:    --- Tests

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn status_matches_the_window() {
        let now = Utc::now();

        let running = countdown(now - ChronoDuration::seconds(1), now + ChronoDuration::seconds(5), now);
        assert_eq!(running.status, CountdownStatus::Running);
        assert!(running.total_seconds <= 5);

        let scheduled = countdown(
            now + ChronoDuration::seconds(5),
            now + ChronoDuration::seconds(10),
            now,
        );
        assert_eq!(scheduled.status, CountdownStatus::Scheduled);

        let ended = countdown(
            now - ChronoDuration::seconds(10),
            now - ChronoDuration::seconds(1),
            now,
        );
        assert_eq!(ended.status, CountdownStatus::Ended);
        assert_eq!(ended.total_seconds, 0);
    }

    #[test]
    fn breakdown_splits_the_remaining_time() {
        let now = Utc::now();
        let end = now + ChronoDuration::days(1) + ChronoDuration::hours(2) + ChronoDuration::minutes(3);
        let c = countdown(now - ChronoDuration::seconds(1), end, now);
        assert_eq!(c.days, 1);
        assert_eq!(c.hours, 2);
        assert!(c.minutes == 3 || c.minutes == 2);
    }

    #[test]
    fn start_is_inclusive_and_end_is_exclusive() {
        let now = Utc::now();
        // now == start: running. now == end: ended.
        assert_eq!(
            countdown(now, now + ChronoDuration::seconds(5), now).status,
            CountdownStatus::Running
        );
        assert_eq!(
            countdown(now - ChronoDuration::seconds(5), now, now).status,
            CountdownStatus::Ended
        );
    }

    #[tokio::test]
    async fn ticker_reports_and_stops_on_drop() {
        let now = Utc::now();
        let ticker = CountdownTicker::start(now - ChronoDuration::seconds(1), now + ChronoDuration::hours(1));
        let current = ticker.current();
        assert_eq!(current.status, CountdownStatus::Running);

        let handle_ref = ticker.subscribe();
        drop(ticker);
        // The watch sender side is owned by the aborted task; the last
        // value stays readable, no further updates arrive.
        assert_eq!(handle_ref.borrow().status, CountdownStatus::Running);
    }
}

// endregion: --- Tests
