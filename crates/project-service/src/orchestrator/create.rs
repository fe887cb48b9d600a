use async_trait::async_trait;
use chrono::Utc;
use pomodex_core::auth::generate_ssh_keypair;
use pomodex_core::db::{Project, ProjectStatus};
use pomodex_core::docker::ContainerConfig;
use pomodex_core::error::{PomodexError, Result};
use pomodex_core::ids;
use uuid::Uuid;

use super::{Orchestrator, SagaRunner, SagaStep};

pub struct CreatedProject {
    pub project: Project,
}

struct Ctx<'a> {
    orch: &'a Orchestrator,
    project_id: String,
    user_id: String,
    display_name: String,
    ssh_host_port: u16,
}

/// 1. Generate project id and keypair; write the DB row as `creating`.
struct WriteRow;
#[async_trait]
impl<'a> SagaStep<Ctx<'a>> for WriteRow {
    fn name(&self) -> &'static str {
        "write_row"
    }

    async fn run(&self, ctx: &Ctx<'a>) -> Result<()> {
        let keypair = generate_ssh_keypair()?;
        let now = Utc::now().timestamp();
        let project = Project {
            id: ctx.project_id.clone(),
            user_id: ctx.user_id.clone(),
            display_name: ctx.display_name.clone(),
            status: ProjectStatus::Creating,
            container_name: ids::container_name(&ctx.project_id),
            volume_name: ids::volume_name(&ctx.project_id),
            ssh_host_port: Some(ctx.ssh_host_port as i64),
            ssh_public_key: keypair.public_key,
            ssh_private_key: keypair.private_key,
            cloud_sa_email: None,
            cloud_sa_key: None,
            object_store_prefix: ids::object_prefix(&ctx.project_id),
            snapshot_image_ref: None,
            last_snapshot_at: None,
            created_at: now,
            last_active_at: Some(now),
            last_backup_at: None,
            last_connection_at: None,
        };
        ctx.orch.db.projects().create(&project).await
    }

    async fn compensate(&self, ctx: &Ctx<'a>) {
        let _ = ctx.orch.db.projects().delete(&ctx.project_id).await;
    }
}

/// 2. Call C3: create the service account, mint a key, apply IAM bindings.
struct ProvisionIam;
#[async_trait]
impl<'a> SagaStep<Ctx<'a>> for ProvisionIam {
    fn name(&self) -> &'static str {
        "provision_iam"
    }

    async fn run(&self, ctx: &Ctx<'a>) -> Result<()> {
        let credential = ctx.orch.iam.provision_for_project(&ctx.project_id).await?;
        // Persisted immediately so a mid-saga crash still leaves a
        // recoverable trail: the sweeper/operator can see which SA a
        // half-created project owns.
        ctx.orch
            .db
            .projects()
            .set_cloud_credential(&ctx.project_id, &credential.email, &credential.key_json)
            .await
    }

    async fn compensate(&self, ctx: &Ctx<'a>) {
        if let Ok(Some(project)) = ctx.orch.db.projects().find_by_id(&ctx.project_id).await {
            if let Some(email) = project.cloud_sa_email {
                let _ = ctx.orch.iam.delete_service_account(&email).await;
            }
        }
    }
}

/// 3. Call C2: create network, volume, container.
struct CreateSandbox;
#[async_trait]
impl<'a> SagaStep<Ctx<'a>> for CreateSandbox {
    fn name(&self) -> &'static str {
        "create_sandbox"
    }

    async fn run(&self, ctx: &Ctx<'a>) -> Result<()> {
        let docker_config = ctx.orch.docker.config();
        let container_config = ContainerConfig {
            container_name: ids::container_name(&ctx.project_id),
            volume_name: ids::volume_name(&ctx.project_id),
            network_name: ids::network_name(&ctx.project_id),
            image: docker_config.base_image.clone(),
            agent_home: "/home/agent".to_string(),
            ttyd_port: docker_config.ttyd_port,
            ssh_host_port: ctx.ssh_host_port,
            memory_limit_bytes: docker_config.memory_limit_bytes,
            cpu_quota: docker_config.cpu_quota,
            cpu_period: docker_config.cpu_period,
            env: Vec::new(),
        };
        ctx.orch.docker.create_sandbox(&ctx.project_id, container_config).await?;
        ctx.orch.docker.start_container(&ctx.project_id).await
    }

    async fn compensate(&self, ctx: &Ctx<'a>) {
        let _ = ctx.orch.docker.cleanup_project_resources(&ctx.project_id).await;
    }
}

/// 4. Mark the project running.
struct MarkRunning;
#[async_trait]
impl<'a> SagaStep<Ctx<'a>> for MarkRunning {
    fn name(&self) -> &'static str {
        "mark_running"
    }

    async fn run(&self, ctx: &Ctx<'a>) -> Result<()> {
        ctx.orch
            .db
            .projects()
            .set_container_info(&ctx.project_id, Some(ctx.ssh_host_port as i64), ProjectStatus::Running)
            .await
    }

    async fn compensate(&self, ctx: &Ctx<'a>) {
        let _ = ctx.orch.db.projects().set_status(&ctx.project_id, ProjectStatus::Error).await;
    }
}

pub async fn run(orch: &Orchestrator, user_id: &str, display_name: &str) -> Result<CreatedProject> {
    let project_id = Uuid::new_v4().to_string();
    let ssh_host_port = orch.docker.allocate_port()?;

    let ctx = Ctx { orch, project_id: project_id.clone(), user_id: user_id.to_string(), display_name: display_name.to_string(), ssh_host_port };

    let saga = SagaRunner::new()
        .step(Box::new(WriteRow))
        .step(Box::new(ProvisionIam))
        .step(Box::new(CreateSandbox))
        .step(Box::new(MarkRunning));

    saga.run(&ctx).await.map_err(|e| e.source)?;

    let project = orch
        .db
        .projects()
        .find_by_id(&project_id)
        .await?
        .ok_or_else(|| PomodexError::Backend("project vanished after create saga".into()))?;

    Ok(CreatedProject { project })
}
