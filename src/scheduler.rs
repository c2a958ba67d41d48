use std::time::Duration;

use chrono::{DateTime, Duration as Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::aggregator::Aggregator;
use crate::config::AppConfig;

/// Refreshes once at startup (when enabled) and then every day at
/// `refresh_hour` local time.
pub fn spawn(aggregator: Aggregator, config: &AppConfig) -> JoinHandle<()> {
    let tz = config.tz();
    let hour = config.refresh_hour.min(23);
    let on_startup = config.refresh_on_startup;

    tokio::spawn(async move {
        if on_startup {
            run_refresh(&aggregator, "startup").await;
        }
        loop {
            let wait = until_next_run(Utc::now(), hour, tz);
            info!(minutes = wait.as_secs() / 60, "next scheduled refresh");
            tokio::time::sleep(wait).await;
            run_refresh(&aggregator, "daily").await;
        }
    })
}

async fn run_refresh(aggregator: &Aggregator, trigger: &'static str) {
    match aggregator.refresh().await {
        Ok(outcome) => info!(
            trigger,
            total = outcome.summary.total,
            "scheduled refresh finished"
        ),
        Err(err) => error!(trigger, "scheduled refresh failed: {err:#}"),
    }
}

pub fn until_next_run(now: DateTime<Utc>, hour: u32, tz: Tz) -> Duration {
    let local_today = now.with_timezone(&tz).date_naive();
    for offset in 0..=2 {
        let day = local_today + Days::days(offset);
        if let Some(run_at) = local_run_time(day, hour, tz) {
            if run_at > now {
                return (run_at - now).to_std().unwrap_or(Duration::ZERO);
            }
        }
    }
    Duration::from_secs(24 * 60 * 60)
}

fn local_run_time(day: NaiveDate, hour: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(hour.min(23), 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}
