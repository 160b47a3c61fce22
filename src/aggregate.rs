//! Derived metrics over a list of normalized runs.
//!
//! Calendar days are taken in the process-local time zone. Each function takes
//! `today` explicitly; the HTTP path passes [`local_today`].

use crate::models::{Conclusion, RunStatus, SuccessfulDeployment, WorkflowActivity, WorkflowRun, WorkflowStats};
use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use std::collections::BTreeMap;

pub const WINDOW_DAYS: usize = 7;

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Local).date_naive()
}

/// The `WINDOW_DAYS` dates ending at `today`, oldest first.
pub fn window(today: NaiveDate) -> Vec<NaiveDate> {
    (0..WINDOW_DAYS as u64)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back)))
        .collect()
}

/// Totals over all runs. Among successful runs sharing the latest `created_at`,
/// the highest `run_id` wins.
pub fn compute_stats(runs: &[WorkflowRun], repository: &str, now: DateTime<Utc>) -> WorkflowStats {
    let success_count = runs
        .iter()
        .filter(|r| r.conclusion == Some(Conclusion::Success))
        .count() as u64;
    let failure_count = runs
        .iter()
        .filter(|r| r.conclusion == Some(Conclusion::Failure))
        .count() as u64;
    let last_successful_run_id = runs
        .iter()
        .filter(|r| r.conclusion == Some(Conclusion::Success))
        .max_by_key(|r| (r.created_at, r.run_id))
        .map(|r| r.run_id);

    WorkflowStats {
        repository: repository.to_string(),
        total_runs: runs.len() as u64,
        success_count,
        failure_count,
        last_successful_run_id,
        last_updated: now,
    }
}

pub fn compute_activity(runs: &[WorkflowRun], repository: &str, today: NaiveDate) -> Vec<WorkflowActivity> {
    let mut buckets: BTreeMap<NaiveDate, u32> = window(today).into_iter().map(|d| (d, 0)).collect();
    for run in runs {
        if let Some(count) = buckets.get_mut(&local_date(run.created_at)) {
            *count += 1;
        }
    }

    buckets
        .into_iter()
        .map(|(date, run_count)| WorkflowActivity {
            repository: repository.to_string(),
            date,
            run_count,
        })
        .collect()
}

pub fn compute_deployments(runs: &[WorkflowRun], repository: &str, today: NaiveDate) -> Vec<SuccessfulDeployment> {
    // date -> (completed, succeeded)
    let mut buckets: BTreeMap<NaiveDate, (u32, u32)> = window(today).into_iter().map(|d| (d, (0, 0))).collect();
    for run in runs.iter().filter(|r| r.status == RunStatus::Completed) {
        if let Some((completed, succeeded)) = buckets.get_mut(&local_date(run.created_at)) {
            *completed += 1;
            if run.conclusion == Some(Conclusion::Success) {
                *succeeded += 1;
            }
        }
    }

    buckets
        .into_iter()
        .map(|(date, (completed, succeeded))| SuccessfulDeployment {
            repository: repository.to_string(),
            date,
            success_count: succeeded,
            failure_count: completed.saturating_sub(succeeded),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    /// A run created at local noon `days_ago` days before `today()`.
    fn run(run_id: u64, days_ago: u64, status: RunStatus, conclusion: Option<Conclusion>) -> WorkflowRun {
        let date = today().checked_sub_days(Days::new(days_ago)).unwrap();
        let created_at = Local
            .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
            .earliest()
            .unwrap()
            .with_timezone(&Utc);
        WorkflowRun {
            run_id,
            name: "CI".to_string(),
            status,
            conclusion,
            html_url: String::new(),
            created_at,
            updated_at: created_at + Duration::hours(1),
            triggered_by: "push".to_string(),
            head_sha: "abc".to_string(),
            run_number: run_id,
            run_attempt: 1,
            duration_in_seconds: None,
            repository: "A/B".to_string(),
        }
    }

    fn done(run_id: u64, days_ago: u64, conclusion: Conclusion) -> WorkflowRun {
        run(run_id, days_ago, RunStatus::Completed, Some(conclusion))
    }

    #[test]
    fn window_ends_today() {
        let dates = window(today());
        assert_eq!(dates.len(), WINDOW_DAYS);
        assert_eq!(dates[0], NaiveDate::from_ymd_opt(2026, 10, 10).unwrap());
        assert_eq!(dates[6], today());
    }

    #[test]
    fn stats_count_conclusions() {
        let runs = vec![
            done(1, 0, Conclusion::Success),
            done(2, 1, Conclusion::Failure),
            done(3, 2, Conclusion::Success),
            done(4, 3, Conclusion::Cancelled),
            run(5, 0, RunStatus::InProgress, None),
        ];
        let stats = compute_stats(&runs, "A/B", Utc::now());
        assert_eq!(stats.total_runs, 5);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.last_successful_run_id, Some(1));
        assert_eq!(stats.success_rate(), 40);
    }

    #[test]
    fn stats_of_nothing() {
        let stats = compute_stats(&[], "A/B", Utc::now());
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.last_successful_run_id, None);
        assert_eq!(stats.success_rate(), 0);
    }

    #[test]
    fn last_success_tie_breaks_on_run_id() {
        let runs = vec![
            done(10, 1, Conclusion::Success),
            done(30, 1, Conclusion::Success),
            done(20, 1, Conclusion::Success),
        ];
        assert_eq!(compute_stats(&runs, "A/B", Utc::now()).last_successful_run_id, Some(30));
    }

    #[test]
    fn activity_always_has_seven_buckets() {
        let empty = compute_activity(&[], "A/B", today());
        assert_eq!(empty.len(), WINDOW_DAYS);
        assert!(empty.iter().all(|a| a.run_count == 0));

        let runs = vec![
            done(1, 0, Conclusion::Success),
            run(2, 0, RunStatus::Queued, None),
            done(3, 6, Conclusion::Failure),
            done(4, 7, Conclusion::Success),
            done(5, 30, Conclusion::Success),
        ];
        let activity = compute_activity(&runs, "A/B", today());
        assert_eq!(activity.len(), WINDOW_DAYS);
        assert_eq!(activity[6].date, today());
        assert_eq!(activity[6].run_count, 2);
        assert_eq!(activity[0].run_count, 1);
        assert_eq!(activity.iter().map(|a| a.run_count).sum::<u32>(), 3);
    }

    #[test]
    fn deployments_split_completed_runs() {
        let runs = vec![
            done(1, 0, Conclusion::Success),
            done(2, 0, Conclusion::Failure),
            done(3, 0, Conclusion::Cancelled),
            run(4, 0, RunStatus::InProgress, None),
            done(5, 2, Conclusion::Success),
        ];
        let deployments = compute_deployments(&runs, "A/B", today());
        assert_eq!(deployments.len(), WINDOW_DAYS);
        assert_eq!((deployments[6].success_count, deployments[6].failure_count), (1, 2));
        assert_eq!((deployments[4].success_count, deployments[4].failure_count), (1, 0));
    }

    #[test]
    fn deployments_with_no_runs_are_all_zero() {
        let deployments = compute_deployments(&[], "A/B", today());
        assert_eq!(deployments.len(), WINDOW_DAYS);
        assert!(deployments.iter().all(|d| d.success_count == 0 && d.failure_count == 0));
    }

    #[test]
    fn deployment_failures_never_negative() {
        // a success conclusion on a non-completed run is malformed and ignored
        let runs = vec![run(1, 0, RunStatus::InProgress, Some(Conclusion::Success))];
        let deployments = compute_deployments(&runs, "A/B", today());
        assert!(deployments.iter().all(|d| d.failure_count == 0 && d.success_count == 0));
    }
}
