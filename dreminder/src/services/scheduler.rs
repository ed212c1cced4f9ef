//! Due-check scheduler
//!
//! Once per tick every reminder in the latest snapshot is compared with the
//! current time. The tick is a single-shot timer re-armed after each run,
//! so a slow tick pushes every later tick back.

use crate::config::TICK_INTERVAL;
use crate::database::ReminderId;
use crate::services::reminders::Snapshot;
use chrono::{DateTime, Datelike, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;
use tokio::time::{Instant, Sleep};

/// How a deadline is matched against the current time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DueCheckMode {
    /// Every calendar field down to the second must be equal. A reminder is
    /// missed if no tick lands in its due second.
    #[default]
    ExactSecond,
    /// `deadline <= now < deadline + tick`
    Window,
}

impl FromStr for DueCheckMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exact-second" | "exact" => Ok(DueCheckMode::ExactSecond),
            "window" => Ok(DueCheckMode::Window),
            other => Err(format!(
                "Invalid due-check mode '{}'. Use 'exact-second' or 'window'",
                other
            )),
        }
    }
}

/// Compares deadlines with the current time
#[derive(Debug, Clone, Copy)]
pub struct DueCheck {
    mode: DueCheckMode,
    tick: Duration,
}

impl Default for DueCheck {
    fn default() -> Self {
        Self::new(DueCheckMode::default(), TICK_INTERVAL)
    }
}

impl DueCheck {
    pub fn new(mode: DueCheckMode, tick: Duration) -> Self {
        Self { mode, tick }
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Whether a reminder due at `deadline_ms` fires at `now`
    pub fn is_due<Tz: TimeZone>(&self, deadline_ms: i64, now: &DateTime<Tz>) -> bool {
        match self.mode {
            DueCheckMode::ExactSecond => now
                .timezone()
                .timestamp_millis_opt(deadline_ms)
                .single()
                .is_some_and(|deadline| same_calendar_second(&deadline, now)),
            DueCheckMode::Window => {
                let now_ms = now.timestamp_millis();
                let tick_ms = i64::try_from(self.tick.as_millis()).unwrap_or(i64::MAX);
                deadline_ms <= now_ms && now_ms < deadline_ms.saturating_add(tick_ms)
            }
        }
    }

    /// Ids of every due reminder in snapshot order. Malformed entries are
    /// skipped.
    pub fn scan<Tz: TimeZone>(&self, snapshot: &Snapshot, now: &DateTime<Tz>) -> Vec<ReminderId> {
        snapshot
            .iter()
            .filter_map(|(id, reminder)| {
                let reminder = reminder?;
                self.is_due(reminder.datetime, now).then(|| id.to_string())
            })
            .collect()
    }
}

/// Field-by-field comparison down to the second. The weekday check is
/// implied by the date but kept as part of the match.
fn same_calendar_second<Tz: TimeZone>(a: &DateTime<Tz>, b: &DateTime<Tz>) -> bool {
    a.year() == b.year()
        && a.month() == b.month()
        && a.day() == b.day()
        && a.weekday() == b.weekday()
        && a.hour() == b.hour()
        && a.minute() == b.minute()
        && a.second() == b.second()
}

/// Self-rescheduling single-shot timer
pub struct Ticker {
    interval: Duration,
    sleep: Pin<Box<Sleep>>,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            sleep: Box::pin(tokio::time::sleep(interval)),
        }
    }

    /// Wait for the armed timer to fire
    pub async fn fired(&mut self) {
        self.sleep.as_mut().await;
    }

    /// Arm the timer one interval from now
    pub fn rearm(&mut self) {
        self.sleep.as_mut().reset(Instant::now() + self.interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const DUE: i64 = 1_700_000_123_000;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).single().unwrap()
    }

    fn snapshot(entries: &[(&str, serde_json::Value)]) -> Snapshot {
        let entries: BTreeMap<_, _> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        Snapshot {
            version: 1,
            entries: Arc::new(entries),
        }
    }

    #[test]
    fn test_exact_second_boundaries() {
        let check = DueCheck::default();

        assert!(check.is_due(DUE, &at(DUE)));
        assert!(check.is_due(DUE, &at(DUE + 999)));
        assert!(!check.is_due(DUE, &at(DUE - 1_000)));
        assert!(!check.is_due(DUE, &at(DUE + 1_000)));
    }

    #[test]
    fn test_exact_second_ignores_subsecond_deadline() {
        let check = DueCheck::default();
        // due at .250, tick at .900 of the same second
        assert!(check.is_due(DUE + 250, &at(DUE + 900)));
        // a tick in the previous second misses it even though it is close
        assert!(!check.is_due(DUE + 250, &at(DUE - 100)));
    }

    #[test]
    fn test_exact_second_misses_late_tick() {
        let check = DueCheck::default();
        assert!(!check.is_due(DUE, &at(DUE + 2_000)));
    }

    #[test]
    fn test_window_mode() {
        let check = DueCheck::new(DueCheckMode::Window, Duration::from_secs(1));

        assert!(check.is_due(DUE, &at(DUE)));
        assert!(check.is_due(DUE, &at(DUE + 999)));
        assert!(!check.is_due(DUE, &at(DUE + 1_000)));
        assert!(!check.is_due(DUE, &at(DUE - 1)));
    }

    #[test]
    fn test_scan_collects_due_ids_in_order() {
        let check = DueCheck::default();
        let snap = snapshot(&[
            ("b", json!({ "message": "two", "datetime": DUE })),
            ("a", json!({ "message": "one", "datetime": DUE + 500 })),
            ("c", json!({ "message": "later", "datetime": DUE + 60_000 })),
            ("d", json!("malformed")),
        ]);

        assert_eq!(check.scan(&snap, &at(DUE)), vec!["a", "b"]);
        assert!(check.scan(&snap, &at(DUE + 1_000)).is_empty());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("exact-second".parse::<DueCheckMode>().unwrap(), DueCheckMode::ExactSecond);
        assert_eq!("Window".parse::<DueCheckMode>().unwrap(), DueCheckMode::Window);
        assert!("range".parse::<DueCheckMode>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_rearms_after_firing() {
        let mut ticker = Ticker::new(Duration::from_secs(1));
        let start = Instant::now();

        ticker.fired().await;
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        // work inside a tick delays the next one
        tokio::time::advance(Duration::from_millis(300)).await;
        ticker.rearm();
        ticker.fired().await;
        assert_eq!(start.elapsed(), Duration::from_millis(2_300));
    }
}
