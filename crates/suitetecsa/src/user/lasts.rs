use chrono::{Datelike, Local};

use super::scraper::UserPortal;
use super::types::{ActionKind, Lasts, Record, Summary, Totals};
use crate::scraper::ScraperError;

/// The month before `(year, month)`.
pub fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month <= 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

/// How many of each month's records to take, newest month first.
///
/// Only the oldest month that is needed can be partial.
fn assign_quotas(summaries: &[Summary], large: u32) -> Vec<u32> {
    let mut remaining = large;
    summaries
        .iter()
        .map(|summary| {
            let quota = summary.count.min(remaining);
            remaining -= quota;
            quota
        })
        .collect()
}

impl UserPortal {
    /// The `large` most recent `action` records, newest first, counting back
    /// from the current month.
    pub async fn get_lasts(&self, action: ActionKind, large: u32) -> Result<Lasts, ScraperError> {
        let now = Local::now();
        self.get_lasts_from(action, large, now.year(), now.month())
            .await
    }

    /// Like [`UserPortal::get_lasts`], counting back from `(year, month)`.
    pub async fn get_lasts_from(
        &self,
        action: ActionKind,
        large: u32,
        year: i32,
        month: u32,
    ) -> Result<Lasts, ScraperError> {
        self.require_action(action)?;
        if large == 0 {
            return Ok(Lasts {
                summary: Totals::from_records(action, &[]),
                records: Vec::new(),
            });
        }

        // Newest first.
        let mut summaries: Vec<Summary> = Vec::new();
        let mut covered = 0u32;
        let (mut year, mut month) = (year, month);
        for _ in 0..self.config.lasts_max_months {
            let summary = self.get_summary(action, year, month).await?;
            covered = covered.saturating_add(summary.count);
            summaries.push(summary);
            if covered >= large {
                break;
            }
            (year, month) = previous_month(year, month);
        }
        if covered < large {
            log::info!(
                "Only {} {} found in the last {} month(s), {} requested",
                covered,
                action,
                summaries.len(),
                large
            );
        }

        let quotas = assign_quotas(&summaries, large);
        let mut batches: Vec<Vec<Record>> = Vec::with_capacity(summaries.len());
        for (summary, &quota) in summaries.iter().zip(&quotas).rev() {
            if quota == 0 {
                continue;
            }
            let bound = if quota == summary.count { 0 } else { quota };
            log::debug!(
                "Taking {} of {} {} from {}",
                quota,
                summary.count,
                action,
                summary.year_month_selected
            );
            let records = self
                .get_records(action, 0, 0, Some(summary), bound, true)
                .await?;
            batches.push(records);
        }

        let mut records: Vec<Record> = batches.into_iter().rev().flatten().collect();
        records.sort_by(|a, b| b.date().cmp(&a.date()));

        Ok(Lasts {
            summary: Totals::from_records(action, &records),
            records,
        })
    }
}
