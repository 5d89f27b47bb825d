use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::clients::{
    tolerate_already_done, with_deadline, AnalyticsIds, BuildSettings, ClientError, DnsRecord,
    Deployment, DeploymentState, FieldUpdates, Project, RepoRef, Repository,
};
use crate::error::ProvisionError;
use crate::jobs::{JobStatus, JobStep, JobUpdate, JobWriter, ProvisionStep, StepStatus, WorkflowResult};
use crate::poller::{ReadinessConfig, ReadinessPoller};
use crate::workflow::input::{TemplateConfig, WorkflowInput};
use crate::workflow::Collaborators;

/// Records pointing at this address are served by the deployment platform.
pub const PLATFORM_APEX_IP: &str = "76.76.21.21";
pub const PLATFORM_CNAME_TARGET: &str = "cname.vercel-dns.com";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Aborts the workflow.
    Fatal,
    /// Logged on the step; the site stays reachable at its platform URL.
    Recoverable,
}

pub fn classify_failure(step: ProvisionStep) -> FailureClass {
    match step {
        ProvisionStep::DatabaseSetup
        | ProvisionStep::TemplateConfiguration
        | ProvisionStep::RepositoryCreation
        | ProvisionStep::Deployment => FailureClass::Fatal,
        ProvisionStep::DomainConfiguration | ProvisionStep::FinalTesting => {
            FailureClass::Recoverable
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub readiness: ReadinessConfig,
    pub call_timeout: Duration,
    pub build: BuildSettings,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            readiness: ReadinessConfig::default(),
            call_timeout: Duration::from_secs(30),
            build: BuildSettings::default(),
        }
    }
}

/// Everything the steps produce, threaded through the run.
#[derive(Default)]
struct RunState {
    steps: Vec<JobStep>,
    record_id: Option<String>,
    template: Option<TemplateConfig>,
    repository: Option<Repository>,
    project_name: Option<String>,
    deployment: Option<Deployment>,
    domain_attached: bool,
    analytics: Option<AnalyticsIds>,
}

impl RunState {
    fn mark(&mut self, step: ProvisionStep, status: StepStatus, error: Option<String>) {
        if let Some(s) = self.steps.get_mut(step.index()) {
            s.status = status;
            s.error = error;
        }
    }

    fn platform_url(&self) -> Option<String> {
        self.deployment.as_ref().map(|d| https(&d.url))
    }
}

fn https(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

fn step_message(step: ProvisionStep) -> &'static str {
    match step {
        ProvisionStep::DatabaseSetup => "Setting up website record...",
        ProvisionStep::TemplateConfiguration => "Configuring website template...",
        ProvisionStep::RepositoryCreation => "Creating source repository...",
        ProvisionStep::Deployment => "Deploying website...",
        ProvisionStep::DomainConfiguration => "Configuring custom domain...",
        ProvisionStep::FinalTesting => "Running final checks...",
    }
}

/// Runs the six provisioning steps for one job, in order.
pub struct StepExecutor {
    collaborators: Collaborators,
    poller: ReadinessPoller,
    settings: WorkflowSettings,
}

impl StepExecutor {
    pub fn new(collaborators: Collaborators, settings: WorkflowSettings) -> Self {
        let poller = ReadinessPoller::new(collaborators.source.clone(), settings.readiness.clone());
        Self {
            collaborators,
            poller,
            settings,
        }
    }

    /// Drives the job to a terminal state and returns its outcome.
    ///
    /// Consumes the writer: once this returns nobody writes the job again.
    pub async fn run(self: Arc<Self>, writer: JobWriter, input: WorkflowInput) -> WorkflowResult {
        let job_id = writer.job_id().to_string();
        let started = std::time::Instant::now();
        tracing::info!(job_id = %job_id, website = %input.website_name, "provisioning started");

        let mut state = RunState {
            steps: JobStep::all_pending(),
            ..Default::default()
        };

        writer
            .update(JobUpdate {
                status: Some(JobStatus::Processing),
                message: Some("Starting website creation...".to_string()),
                progress: Some(5),
                steps: Some(state.steps.clone()),
                ..Default::default()
            })
            .await;

        let outcome = self.run_steps(&writer, &input, &mut state).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                let result = self.success_result(&input, &state);
                writer
                    .update(JobUpdate {
                        status: Some(JobStatus::Completed),
                        message: Some("Website created successfully".to_string()),
                        progress: Some(100),
                        steps: Some(state.steps.clone()),
                        result: Some(result.clone()),
                        ..Default::default()
                    })
                    .await;
                self.mirror_success(&job_id, &state, &result).await;
                tracing::info!(
                    job_id = %job_id,
                    website_url = result.website_url.as_deref().unwrap_or("-"),
                    elapsed_ms,
                    "provisioning completed"
                );
                result
            }
            Err(err) => {
                let message = err.user_message();
                writer
                    .update(JobUpdate {
                        status: Some(JobStatus::Failed),
                        message: Some("Website creation failed".to_string()),
                        steps: Some(state.steps.clone()),
                        error: Some(message.clone()),
                        ..Default::default()
                    })
                    .await;
                self.mirror_failure(&job_id, &state, &message).await;
                tracing::error!(
                    job_id = %job_id,
                    code = err.code(),
                    error = %err,
                    elapsed_ms,
                    "provisioning failed"
                );
                WorkflowResult::failed(message)
            }
        }
    }

    async fn run_steps(
        &self,
        writer: &JobWriter,
        input: &WorkflowInput,
        state: &mut RunState,
    ) -> Result<(), ProvisionError> {
        for step in ProvisionStep::ALL {
            state.mark(step, StepStatus::InProgress, None);
            writer
                .update(JobUpdate {
                    message: Some(step_message(step).to_string()),
                    progress: Some(step.progress()),
                    steps: Some(state.steps.clone()),
                    ..Default::default()
                })
                .await;
            tracing::debug!(job_id = %writer.job_id(), step = step.name(), "step started");

            let res = match step {
                ProvisionStep::DatabaseSetup => self.database_setup(writer.job_id(), input, state).await,
                ProvisionStep::TemplateConfiguration => self.template_configuration(input, state).await,
                ProvisionStep::RepositoryCreation => self.repository_creation(writer.job_id(), input, state).await,
                ProvisionStep::Deployment => self.deployment(state).await,
                ProvisionStep::DomainConfiguration => self.domain_configuration(input, state).await,
                ProvisionStep::FinalTesting => self.final_testing(input, state).await,
            };

            match res {
                Ok(()) => {
                    state.mark(step, StepStatus::Completed, None);
                    tracing::debug!(job_id = %writer.job_id(), step = step.name(), "step completed");
                }
                Err(err) => {
                    state.mark(step, StepStatus::Failed, Some(err.user_message()));
                    match classify_failure(step) {
                        FailureClass::Fatal => return Err(err),
                        FailureClass::Recoverable => {
                            tracing::warn!(
                                job_id = %writer.job_id(),
                                step = step.name(),
                                error = %err,
                                "step failed, continuing"
                            );
                        }
                    }
                }
            }

            writer
                .update(JobUpdate {
                    steps: Some(state.steps.clone()),
                    ..Default::default()
                })
                .await;
        }

        Ok(())
    }

    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, ProvisionError>
    where
        F: std::future::Future<Output = Result<T, ClientError>>,
    {
        with_deadline(operation, self.settings.call_timeout, fut)
            .await
            .map_err(|e| ProvisionError::collaborator(operation, e))
    }

    // ----------------------------
    // Steps
    // ----------------------------

    async fn database_setup(
        &self,
        job_id: &str,
        input: &WorkflowInput,
        state: &mut RunState,
    ) -> Result<(), ProvisionError> {
        let records = &self.collaborators.records;
        let now = Utc::now().to_rfc3339();

        let record_id = match &input.record_id {
            Some(id) => {
                let mut fields = FieldUpdates::new();
                fields.insert("status".into(), json!("provisioning"));
                fields.insert("jobId".into(), json!(job_id));
                fields.insert("updatedAt".into(), json!(now));
                self.call("update site record", records.update_fields(id, fields))
                    .await?;
                id.clone()
            }
            None => {
                let mut fields = FieldUpdates::new();
                fields.insert("websiteName".into(), json!(input.website_name));
                fields.insert("companyName".into(), json!(input.company_name));
                fields.insert("userEmail".into(), json!(input.user_email));
                fields.insert("domainName".into(), json!(input.domain()));
                fields.insert("status".into(), json!("provisioning"));
                fields.insert("jobId".into(), json!(job_id));
                fields.insert("createdAt".into(), json!(now));
                self.call("create site record", records.create_record(fields))
                    .await?
            }
        };

        state.record_id = Some(record_id);
        Ok(())
    }

    async fn template_configuration(
        &self,
        input: &WorkflowInput,
        state: &mut RunState,
    ) -> Result<(), ProvisionError> {
        let template = TemplateConfig::from_input(input);

        if let Some(record_id) = &state.record_id {
            let mut fields = FieldUpdates::new();
            fields.insert(
                "template".into(),
                serde_json::to_value(&template).unwrap_or(Value::Null),
            );
            let res = self
                .call(
                    "store template config",
                    self.collaborators.records.update_fields(record_id, fields),
                )
                .await;
            if let Err(e) = res {
                tracing::warn!(record_id = %record_id, error = %e, "template config not stored on record");
            }
        }

        state.template = Some(template);
        Ok(())
    }

    async fn repository_creation(
        &self,
        job_id: &str,
        input: &WorkflowInput,
        state: &mut RunState,
    ) -> Result<(), ProvisionError> {
        let name = repository_name(job_id);
        let description = format!("Website for {}", input.website_name.trim());

        let repo = self
            .call(
                "create repository",
                self.collaborators.source.create_repository(&name, &description),
            )
            .await?;

        tracing::info!(repo = %repo.html_url, "repository created");
        state.repository = Some(repo);
        Ok(())
    }

    async fn deployment(&self, state: &mut RunState) -> Result<(), ProvisionError> {
        let repo = state
            .repository
            .clone()
            .ok_or_else(|| ProvisionError::Validation("deployment needs a repository".into()))?;
        let full_name = format!("{}/{}", repo.owner, repo.name);

        let ready = self.poller.wait_until_ready(&full_name).await?;
        let repo_ref = RepoRef {
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            branch: ready.branch,
        };

        let mut build = self.settings.build.clone();
        if let Some(template) = &state.template {
            build.environment.extend(template.environment());
        }

        let platform = &self.collaborators.platform;
        let project_name = repo.name.clone();
        let created = self
            .call(
                "create project",
                platform.create_project(&project_name, &repo_ref, &build),
            )
            .await;
        let project = match created {
            Ok(p) => p,
            Err(ProvisionError::Collaborator { source, .. }) if source.is_already_done() => {
                tracing::info!(project = %project_name, "project already exists");
                Project {
                    id: project_name.clone(),
                    name: project_name.clone(),
                }
            }
            Err(e) => return Err(e),
        };

        let deployment = self
            .call(
                "create deployment",
                platform.create_deployment(&project.name, &repo_ref),
            )
            .await?;

        tracing::info!(deployment_id = %deployment.id, url = %deployment.url, "deployment triggered");
        state.project_name = Some(project.name);
        state.deployment = Some(deployment);
        Ok(())
    }

    async fn domain_configuration(
        &self,
        input: &WorkflowInput,
        state: &mut RunState,
    ) -> Result<(), ProvisionError> {
        let Some(project) = state.project_name.clone() else {
            return Err(ProvisionError::Validation("no deployment project".into()));
        };
        let domain = input.domain();
        let www = format!("www.{domain}");
        let platform = &self.collaborators.platform;
        let mut first_error = None;

        for (name, is_apex) in [(&domain, true), (&www, false)] {
            let res = with_deadline(
                "attach domain",
                self.settings.call_timeout,
                platform.add_domain_to_project(&project, name),
            )
            .await;

            match tolerate_already_done(res) {
                Ok(already) => {
                    if already {
                        tracing::info!(domain = %name, "domain already attached");
                    }
                    if is_apex {
                        state.domain_attached = true;
                    }
                }
                Err(e) => {
                    tracing::warn!(domain = %name, error = %e, "domain attachment failed");
                    first_error.get_or_insert(ProvisionError::collaborator("attach domain", e));
                }
            }
        }

        if input.manage_dns {
            let records = dns_records();
            let res = self
                .call(
                    "configure dns",
                    self.collaborators.registrar.set_dns_records(&domain, &records),
                )
                .await;
            if let Err(e) = res {
                tracing::warn!(domain = %domain, error = %e, "dns configuration failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn final_testing(
        &self,
        input: &WorkflowInput,
        state: &mut RunState,
    ) -> Result<(), ProvisionError> {
        let mut first_error = None;

        if let Some(deployment) = &state.deployment {
            let status = self
                .call(
                    "deployment status",
                    self.collaborators.platform.get_deployment_status(&deployment.id),
                )
                .await;
            match status {
                Ok(DeploymentState::Ready) => {}
                Ok(s @ (DeploymentState::Error | DeploymentState::Canceled)) => {
                    first_error.get_or_insert(ProvisionError::collaborator(
                        "deployment status",
                        ClientError::Rejected(format!("deployment finished in state {s:?}")),
                    ));
                }
                Ok(s) => {
                    tracing::info!(deployment_id = %deployment.id, state = ?s, "deployment still building");
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let site_url = self.public_url(input, state).unwrap_or_default();
        let analytics = self
            .call(
                "create analytics property",
                self.collaborators
                    .analytics
                    .create_property(input.website_name.trim(), &site_url),
            )
            .await;
        match analytics {
            Ok(ids) => state.analytics = Some(ids),
            Err(e) => {
                tracing::warn!(error = %e, "analytics wiring failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // ----------------------------
    // Outcome
    // ----------------------------

    fn public_url(&self, input: &WorkflowInput, state: &RunState) -> Option<String> {
        if state.domain_attached {
            Some(format!("https://{}", input.domain()))
        } else {
            state.platform_url()
        }
    }

    fn success_result(&self, input: &WorkflowInput, state: &RunState) -> WorkflowResult {
        WorkflowResult {
            success: true,
            website_url: self.public_url(input, state),
            platform_url: state.platform_url(),
            alias: state.deployment.as_ref().and_then(|d| d.alias.clone()),
            repository_url: state.repository.as_ref().map(|r| r.html_url.clone()),
            deployment_id: state.deployment.as_ref().map(|d| d.id.clone()),
            analytics: state.analytics.clone(),
            error: None,
        }
    }

    async fn mirror_success(&self, job_id: &str, state: &RunState, result: &WorkflowResult) {
        let Some(record_id) = &state.record_id else {
            return;
        };
        let now = Utc::now().to_rfc3339();
        let mut fields = FieldUpdates::new();
        fields.insert("status".into(), json!("active"));
        fields.insert("deploymentStatus".into(), json!("completed"));
        fields.insert("urls.website".into(), json!(result.website_url));
        fields.insert("urls.platform".into(), json!(result.platform_url));
        fields.insert("urls.repository".into(), json!(result.repository_url));
        fields.insert("deployment.id".into(), json!(result.deployment_id));
        fields.insert("deployment.alias".into(), json!(result.alias));
        if let Some(ids) = &result.analytics {
            fields.insert("analytics.measurementId".into(), json!(ids.measurement_id));
            fields.insert("analytics.propertyId".into(), json!(ids.property_id));
        }
        fields.insert("jobId".into(), json!(job_id));
        fields.insert("updatedAt".into(), json!(now));
        fields.insert("completedAt".into(), json!(now));

        self.mirror(record_id, fields).await;
    }

    async fn mirror_failure(&self, job_id: &str, state: &RunState, message: &str) {
        let Some(record_id) = &state.record_id else {
            return;
        };
        let mut fields = FieldUpdates::new();
        fields.insert("status".into(), json!("failed"));
        fields.insert("deploymentStatus".into(), json!("failed"));
        fields.insert("error".into(), json!(message));
        fields.insert("jobId".into(), json!(job_id));
        fields.insert("updatedAt".into(), json!(Utc::now().to_rfc3339()));

        self.mirror(record_id, fields).await;
    }

    /// Secondary write; never changes the workflow outcome.
    async fn mirror(&self, record_id: &str, fields: FieldUpdates) {
        let res = self
            .call(
                "mirror site record",
                self.collaborators.records.update_fields(record_id, fields),
            )
            .await;
        if let Err(e) = res {
            tracing::warn!(record_id = %record_id, error = %e, "site record not updated");
        }
    }
}

/// `acme_1739812345678` → `acme-1739812345678`.
pub fn repository_name(job_id: &str) -> String {
    job_id.replace('_', "-")
}

pub fn dns_records() -> Vec<DnsRecord> {
    vec![
        DnsRecord::new("A", "@", PLATFORM_APEX_IP),
        DnsRecord::new("CNAME", "www", PLATFORM_CNAME_TARGET),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_domain_and_final_steps_are_recoverable() {
        let recoverable: Vec<_> = ProvisionStep::ALL
            .into_iter()
            .filter(|s| classify_failure(*s) == FailureClass::Recoverable)
            .collect();
        assert_eq!(
            recoverable,
            vec![ProvisionStep::DomainConfiguration, ProvisionStep::FinalTesting]
        );
    }

    #[test]
    fn repository_name_comes_from_job_id() {
        assert_eq!(repository_name("acme_1739812345678"), "acme-1739812345678");
    }

    #[test]
    fn dns_points_at_platform() {
        let records = dns_records();
        assert_eq!(records[0].record_type, "A");
        assert_eq!(records[0].value, PLATFORM_APEX_IP);
        assert_eq!(records[1].host, "www");
        assert_eq!(records[1].value, PLATFORM_CNAME_TARGET);
    }
}
