pub mod id;
pub mod maintenance;
pub mod model;
pub mod repo;
pub mod store;
pub mod writer;

pub use id::JobIdGenerator;
pub use model::{Job, JobStatus, JobStep, JobUpdate, NewJob, ProvisionStep, StepStatus, WorkflowResult};
pub use repo::PgJobStore;
pub use store::{job_key, InMemoryJobStore, JobStore, DEFAULT_JOB_TTL};
pub use writer::{ActiveJobs, JobLease, JobWriter};
