//! Inactivity Sweeper (C6): stops projects idle past the configured threshold.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pomodex_core::db::ProjectStatus;
use pomodex_core::scheduler::{Job, JobHandle, Scheduler};
use tracing::{error, info, warn};

use crate::orchestrator::Orchestrator;

/// Registers the sweep job on `scheduler` and returns its handle, which
/// the caller keeps around only to be able to cancel it on shutdown.
pub async fn spawn(scheduler: &Scheduler, orchestrator: Arc<Orchestrator>) -> JobHandle {
    let interval = Duration::from_secs(orchestrator.config.sweeper.interval_secs);
    let job = Job::new("inactivity_sweeper", interval);

    scheduler
        .schedule(job, move || {
            let orchestrator = orchestrator.clone();
            async move { sweep_once(&orchestrator).await }
        })
        .await
}

async fn sweep_once(orchestrator: &Orchestrator) {
    let cutoff = Utc::now().timestamp() - orchestrator.config.sweeper.idle_threshold_secs;

    let running = match orchestrator.db.projects().list_by_status(ProjectStatus::Running).await {
        Ok(projects) => projects,
        Err(e) => {
            error!(error = %e, "sweeper failed to list running projects");
            return;
        }
    };

    let idle: Vec<_> = running.into_iter().filter(|p| is_idle(p.last_connection_at, cutoff)).collect();

    if idle.is_empty() {
        return;
    }

    info!(count = idle.len(), "sweeper stopping idle projects");

    for project in idle {
        match orchestrator.stop_project_unscoped(&project.id).await {
            Ok(()) => info!(project_id = %project.id, "sweeper stopped idle project"),
            Err(e) => warn!(project_id = %project.id, error = %e, "sweeper failed to stop idle project, leaving for next tick or operator"),
        }
    }
}

/// A project with no recorded connection is treated as idle rather than
/// skipped, so projects that were created but never connected to still
/// get swept.
fn is_idle(last_connection_at: Option<i64>, cutoff: i64) -> bool {
    last_connection_at.map(|t| t < cutoff).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_past_cutoff_is_idle() {
        assert!(is_idle(Some(100), 200));
    }

    #[test]
    fn project_at_or_after_cutoff_is_not_idle() {
        assert!(!is_idle(Some(200), 200));
        assert!(!is_idle(Some(300), 200));
    }

    #[test]
    fn project_with_no_connection_history_is_idle() {
        assert!(is_idle(None, 200));
    }
}
