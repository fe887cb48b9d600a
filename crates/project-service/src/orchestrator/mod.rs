//! Orchestrator (C5): the project state machine and its four sagas.
//!
//! Generalizes the do/undo rollback the teacher writes inline in
//! `create_container` (compensate network+volume if the container step
//! fails) into a reusable step list, since every saga here needs the same
//! shape: run steps in order, and on failure undo whatever already
//! succeeded, in reverse.

mod create;
mod delete;
mod saga;
mod start;
mod stop;

pub use saga::{SagaError, SagaRunner, SagaStep};

use std::sync::Arc;

use pomodex_core::cloud::GcpIamManager;
use pomodex_core::db::Database;
use pomodex_core::docker::DockerManager;

use crate::config::Configuration;

/// Holds the dependencies every saga needs. `db`/`docker` are shared with
/// the HTTP layer via `Arc`, since neither `Database` nor `DockerManager`
/// implements `Clone` but both are already internally synchronized.
pub struct Orchestrator {
    pub db: Arc<Database>,
    pub docker: Arc<DockerManager>,
    pub iam: GcpIamManager,
    pub config: Configuration,
}

impl Orchestrator {
    pub fn new(db: Arc<Database>, docker: Arc<DockerManager>, iam: GcpIamManager, config: Configuration) -> Self {
        Self { db, docker, iam, config }
    }

    pub async fn create_project(&self, user_id: &str, display_name: &str) -> pomodex_core::Result<create::CreatedProject> {
        create::run(self, user_id, display_name).await
    }

    pub async fn stop_project(&self, project_id: &str, user_id: &str) -> pomodex_core::Result<()> {
        stop::run(self, project_id, user_id).await
    }

    pub async fn start_project(&self, project_id: &str, user_id: &str) -> pomodex_core::Result<()> {
        start::run(self, project_id, user_id).await
    }

    pub async fn delete_project(&self, project_id: &str, user_id: &str) -> pomodex_core::Result<()> {
        delete::run(self, project_id, user_id).await
    }

    /// Used by the sweeper, which already holds a trusted project id and
    /// doesn't have a user id to scope against.
    pub async fn stop_project_unscoped(&self, project_id: &str) -> pomodex_core::Result<()> {
        stop::run_unscoped(self, project_id).await
    }
}
