use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clients::AnalyticsIds;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

/// The six provisioning steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvisionStep {
    DatabaseSetup,
    TemplateConfiguration,
    RepositoryCreation,
    Deployment,
    DomainConfiguration,
    FinalTesting,
}

impl ProvisionStep {
    pub const ALL: [ProvisionStep; 6] = [
        ProvisionStep::DatabaseSetup,
        ProvisionStep::TemplateConfiguration,
        ProvisionStep::RepositoryCreation,
        ProvisionStep::Deployment,
        ProvisionStep::DomainConfiguration,
        ProvisionStep::FinalTesting,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProvisionStep::DatabaseSetup => "Database Setup",
            ProvisionStep::TemplateConfiguration => "Template Configuration",
            ProvisionStep::RepositoryCreation => "Repository Creation",
            ProvisionStep::Deployment => "Deployment",
            ProvisionStep::DomainConfiguration => "Domain Configuration",
            ProvisionStep::FinalTesting => "Final Testing",
        }
    }

    /// Progress reported when the step starts.
    pub fn progress(&self) -> u8 {
        match self {
            ProvisionStep::DatabaseSetup => 10,
            ProvisionStep::TemplateConfiguration => 25,
            ProvisionStep::RepositoryCreation => 40,
            ProvisionStep::Deployment => 60,
            ProvisionStep::DomainConfiguration => 80,
            ProvisionStep::FinalTesting => 95,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            ProvisionStep::DatabaseSetup => 0,
            ProvisionStep::TemplateConfiguration => 1,
            ProvisionStep::RepositoryCreation => 2,
            ProvisionStep::Deployment => 3,
            ProvisionStep::DomainConfiguration => 4,
            ProvisionStep::FinalTesting => 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStep {
    pub name: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobStep {
    pub fn pending(step: ProvisionStep) -> Self {
        Self {
            name: step.name().to_string(),
            status: StepStatus::Pending,
            error: None,
        }
    }

    pub fn all_pending() -> Vec<JobStep> {
        ProvisionStep::ALL.iter().copied().map(JobStep::pending).collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<AnalyticsIds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkflowResult {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub job_id: String,
    pub website_name: String,
    pub status: JobStatus,
    pub message: String,
    pub progress: u8,
    pub steps: Vec<JobStep>,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<WorkflowResult>,
}

/// Fields supplied when a job record is first written.
#[derive(Debug, Clone, Default)]
pub struct NewJob {
    pub website_name: String,
    pub message: Option<String>,
    pub steps: Vec<JobStep>,
}

/// Partial update merged into an existing job.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub message: Option<String>,
    pub progress: Option<u8>,
    pub steps: Option<Vec<JobStep>>,
    pub error: Option<String>,
    pub result: Option<WorkflowResult>,
}

impl Job {
    pub fn new(job_id: &str, fields: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.to_string(),
            website_name: fields.website_name,
            status: JobStatus::Pending,
            message: fields
                .message
                .unwrap_or_else(|| "Job created, waiting to start".to_string()),
            progress: 0,
            steps: fields.steps,
            started_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
            result: None,
        }
    }

    /// Merge a partial update.
    ///
    /// Progress never moves backwards. Terminal statuses are sticky: once a job
    /// is completed or failed, later status changes are ignored, and `completed_at`
    /// is stamped on that first terminal transition only.
    pub fn apply(&mut self, update: JobUpdate, now: DateTime<Utc>) {
        if let Some(status) = update.status {
            if self.status.is_terminal() && status != self.status {
                tracing::warn!(
                    job_id = %self.job_id,
                    from = self.status.as_str(),
                    to = status.as_str(),
                    "ignoring status change on finished job"
                );
            } else {
                self.status = status;
            }
        }
        if let Some(message) = update.message {
            self.message = message;
        }
        if let Some(progress) = update.progress {
            self.progress = self.progress.max(progress.min(100));
        }
        if let Some(steps) = update.steps {
            self.steps = steps;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(result) = update.result {
            self.result = Some(result);
        }

        if self.status == JobStatus::Completed {
            self.progress = 100;
        }
        if self.status.is_terminal() && self.completed_at.is_none() {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn job() -> Job {
        Job::new(
            "acme_1",
            NewJob {
                website_name: "acme".into(),
                steps: JobStep::all_pending(),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn progress_never_decreases() {
        let mut j = job();
        j.apply(
            JobUpdate {
                progress: Some(60),
                ..Default::default()
            },
            Utc::now(),
        );
        j.apply(
            JobUpdate {
                progress: Some(25),
                ..Default::default()
            },
            Utc::now(),
        );
        assert_eq!(j.progress, 60);
    }

    #[test]
    fn completed_at_is_stamped_once() {
        let mut j = job();
        let first = Utc::now();
        j.apply(
            JobUpdate {
                status: Some(JobStatus::Failed),
                error: Some("boom".into()),
                ..Default::default()
            },
            first,
        );
        assert_eq!(j.completed_at, Some(first));

        j.apply(
            JobUpdate {
                status: Some(JobStatus::Failed),
                message: Some("still failed".into()),
                ..Default::default()
            },
            first + Duration::seconds(30),
        );
        assert_eq!(j.completed_at, Some(first));
    }

    #[test]
    fn finished_job_cannot_be_reopened() {
        let mut j = job();
        let done = Utc::now();
        j.apply(
            JobUpdate {
                status: Some(JobStatus::Failed),
                error: Some("boom".into()),
                ..Default::default()
            },
            done,
        );

        for late in [JobStatus::Processing, JobStatus::Pending, JobStatus::Completed] {
            j.apply(
                JobUpdate {
                    status: Some(late),
                    ..Default::default()
                },
                done + Duration::seconds(5),
            );
            assert_eq!(j.status, JobStatus::Failed);
            assert_eq!(j.completed_at, Some(done));
        }
    }

    #[test]
    fn serializes_with_camel_case_and_kebab_steps() {
        let mut j = job();
        j.steps[0].status = StepStatus::InProgress;
        let v = serde_json::to_value(&j).unwrap();

        assert_eq!(v["jobId"], "acme_1");
        assert_eq!(v["status"], "pending");
        assert_eq!(v["steps"][0]["name"], "Database Setup");
        assert_eq!(v["steps"][0]["status"], "in-progress");
        assert!(v.get("completedAt").is_none());
        assert_eq!(v["steps"].as_array().unwrap().len(), 6);
    }
}
