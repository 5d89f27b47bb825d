//! In-process collaborator fakes for tests and local runs.
//!
//! Every fake records what it was asked to do and can be told to fail.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::clients::{
    AnalyticsIds, AnalyticsProvider, BuildSettings, ClientError, DeploymentPlatform,
    DeploymentState, Deployment, DnsRecord, DomainAvailability, DomainRegistrar, FieldUpdates,
    Project, RegistrantInfo, Registration, RepoRef, Repository, SiteRecordStore,
    SourceControlHost,
};
use crate::workflow::Collaborators;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn rejected(msg: &Option<String>) -> Result<(), ClientError> {
    match msg {
        Some(m) => Err(ClientError::Rejected(m.clone())),
        None => Ok(()),
    }
}

// ----------------------------
// Source-control host
// ----------------------------

/// Branch visibility is driven by the number of primary-branch lookups seen.
pub struct FakeSourceHost {
    owner: String,
    /// `None` means the repository never gets a commit.
    visible_after: Option<u32>,
    visible_branch: String,
    lookups: AtomicU32,
    create_error: Mutex<Option<String>>,
    created: Mutex<Vec<String>>,
}

impl FakeSourceHost {
    /// Branch `main` becomes visible on the `k`-th attempt (1-based).
    pub fn ready_after(k: u32) -> Self {
        Self {
            owner: "sites".to_string(),
            visible_after: Some(k.max(1)),
            visible_branch: "main".to_string(),
            lookups: AtomicU32::new(0),
            create_error: Mutex::new(None),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn never_ready() -> Self {
        Self {
            visible_after: None,
            ..Self::ready_after(1)
        }
    }

    /// Only `branch` ever resolves.
    pub fn ready_on_branch(mut self, branch: &str) -> Self {
        self.visible_branch = branch.to_string();
        self
    }

    pub fn fail_create(&self, msg: &str) {
        *lock(&self.create_error) = Some(msg.to_string());
    }

    /// Attempts made so far, counted by primary-branch lookups.
    pub fn attempts(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn created_repositories(&self) -> Vec<String> {
        lock(&self.created).clone()
    }
}

#[async_trait]
impl SourceControlHost for FakeSourceHost {
    async fn create_repository(
        &self,
        name: &str,
        _description: &str,
    ) -> Result<Repository, ClientError> {
        rejected(&lock(&self.create_error))?;
        lock(&self.created).push(name.to_string());
        Ok(Repository {
            owner: self.owner.clone(),
            name: name.to_string(),
            html_url: format!("https://github.com/{}/{}", self.owner, name),
            default_branch: self.visible_branch.clone(),
        })
    }

    async fn branch_exists(&self, _repo: &str, branch: &str) -> Result<Option<String>, ClientError> {
        let attempt = if branch == "main" {
            self.lookups.fetch_add(1, Ordering::SeqCst) + 1
        } else {
            self.lookups.load(Ordering::SeqCst)
        };

        let visible = match self.visible_after {
            Some(k) => attempt >= k && branch == self.visible_branch,
            None => false,
        };
        Ok(visible.then(|| format!("commit-{attempt}")))
    }
}

// ----------------------------
// Deployment platform
// ----------------------------

#[derive(Default)]
struct PlatformFailures {
    project: Option<String>,
    deployment: Option<String>,
    domain: Option<String>,
}

pub struct FakePlatform {
    failures: Mutex<PlatformFailures>,
    status: Mutex<DeploymentState>,
    latency: Mutex<Duration>,
    domains: Mutex<Vec<(String, String)>>,
    projects: Mutex<Vec<String>>,
}

impl Default for FakePlatform {
    fn default() -> Self {
        Self {
            failures: Mutex::new(PlatformFailures::default()),
            status: Mutex::new(DeploymentState::Ready),
            latency: Mutex::new(Duration::ZERO),
            domains: Mutex::new(Vec::new()),
            projects: Mutex::new(Vec::new()),
        }
    }
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_project(&self, msg: &str) {
        lock(&self.failures).project = Some(msg.to_string());
    }

    pub fn fail_deployment(&self, msg: &str) {
        lock(&self.failures).deployment = Some(msg.to_string());
    }

    pub fn fail_domain(&self, msg: &str) {
        lock(&self.failures).domain = Some(msg.to_string());
    }

    pub fn set_status(&self, status: DeploymentState) {
        *lock(&self.status) = status;
    }

    /// Delay applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    /// `(project, domain)` pairs that were attached.
    pub fn attached_domains(&self) -> Vec<(String, String)> {
        lock(&self.domains).clone()
    }

    pub fn projects(&self) -> Vec<String> {
        lock(&self.projects).clone()
    }

    async fn delay(&self) {
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DeploymentPlatform for FakePlatform {
    async fn create_project(
        &self,
        name: &str,
        _repo: &RepoRef,
        _build: &BuildSettings,
    ) -> Result<Project, ClientError> {
        self.delay().await;
        rejected(&lock(&self.failures).project)?;
        lock(&self.projects).push(name.to_string());
        Ok(Project {
            id: format!("prj_{name}"),
            name: name.to_string(),
        })
    }

    async fn create_deployment(
        &self,
        project_name: &str,
        _repo: &RepoRef,
    ) -> Result<Deployment, ClientError> {
        self.delay().await;
        rejected(&lock(&self.failures).deployment)?;
        Ok(Deployment {
            id: format!("dpl_{project_name}"),
            url: format!("{project_name}.vercel.app"),
            alias: Some(format!("{project_name}-git-main.vercel.app")),
            state: DeploymentState::Queued,
        })
    }

    async fn add_domain_to_project(
        &self,
        project_name: &str,
        domain: &str,
    ) -> Result<(), ClientError> {
        self.delay().await;
        let failure = lock(&self.failures).domain.clone();
        match failure {
            // Already-attached still counts as attached on the platform side.
            Some(msg) if msg.to_lowercase().contains("already") => {
                lock(&self.domains).push((project_name.to_string(), domain.to_string()));
                Err(ClientError::Rejected(msg))
            }
            Some(msg) => Err(ClientError::Rejected(msg)),
            None => {
                lock(&self.domains).push((project_name.to_string(), domain.to_string()));
                Ok(())
            }
        }
    }

    async fn get_deployment_status(
        &self,
        _deployment_id: &str,
    ) -> Result<DeploymentState, ClientError> {
        self.delay().await;
        Ok(*lock(&self.status))
    }
}

// ----------------------------
// Registrar
// ----------------------------

pub struct FakeRegistrar {
    available: Mutex<bool>,
    registration: Mutex<Result<Registration, String>>,
    dns_error: Mutex<Option<String>>,
    registered: Mutex<Vec<String>>,
    dns_calls: Mutex<Vec<(String, Vec<DnsRecord>)>>,
}

impl Default for FakeRegistrar {
    fn default() -> Self {
        Self {
            available: Mutex::new(true),
            registration: Mutex::new(Ok(Registration {
                success: true,
                order_id: Some("order-1".to_string()),
                reason: None,
            })),
            dns_error: Mutex::new(None),
            registered: Mutex::new(Vec::new()),
            dns_calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        *lock(&self.available) = available;
    }

    pub fn set_registration(&self, registration: Registration) {
        *lock(&self.registration) = Ok(registration);
    }

    /// Register call errors out instead of answering.
    pub fn fail_registration(&self, msg: &str) {
        *lock(&self.registration) = Err(msg.to_string());
    }

    pub fn fail_dns(&self, msg: &str) {
        *lock(&self.dns_error) = Some(msg.to_string());
    }

    pub fn registered(&self) -> Vec<String> {
        lock(&self.registered).clone()
    }

    pub fn dns_calls(&self) -> Vec<(String, Vec<DnsRecord>)> {
        lock(&self.dns_calls).clone()
    }
}

#[async_trait]
impl DomainRegistrar for FakeRegistrar {
    async fn check_availability(&self, domain: &str) -> Result<DomainAvailability, ClientError> {
        Ok(DomainAvailability {
            domain: domain.to_string(),
            available: *lock(&self.available),
            premium: Some(false),
            price: Some(12.99),
        })
    }

    async fn register(
        &self,
        domain: &str,
        _years: u32,
        _registrant: &RegistrantInfo,
    ) -> Result<Registration, ClientError> {
        let registration = lock(&self.registration).clone();
        let registration = registration.map_err(ClientError::Rejected)?;
        if registration.success {
            lock(&self.registered).push(domain.to_string());
        }
        Ok(registration)
    }

    async fn set_dns_records(&self, domain: &str, records: &[DnsRecord]) -> Result<(), ClientError> {
        rejected(&lock(&self.dns_error))?;
        lock(&self.dns_calls).push((domain.to_string(), records.to_vec()));
        Ok(())
    }
}

// ----------------------------
// Site records
// ----------------------------

#[derive(Default)]
pub struct FakeRecordStore {
    records: Mutex<HashMap<String, FieldUpdates>>,
    updates: Mutex<Vec<(String, FieldUpdates)>>,
    create_error: Mutex<Option<String>>,
    update_error: Mutex<Option<String>>,
    next_id: AtomicU32,
}

impl FakeRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_create(&self, msg: &str) {
        *lock(&self.create_error) = Some(msg.to_string());
    }

    pub fn fail_updates(&self, msg: &str) {
        *lock(&self.update_error) = Some(msg.to_string());
    }

    pub fn record(&self, id: &str) -> Option<FieldUpdates> {
        lock(&self.records).get(id).cloned()
    }

    /// Current value at a field path of a record.
    pub fn field(&self, id: &str, path: &str) -> Option<Value> {
        self.record(id).and_then(|r| r.get(path).cloned())
    }

    pub fn updates(&self) -> Vec<(String, FieldUpdates)> {
        lock(&self.updates).clone()
    }

    pub fn record_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = lock(&self.records).keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl SiteRecordStore for FakeRecordStore {
    async fn create_record(&self, fields: FieldUpdates) -> Result<String, ClientError> {
        rejected(&lock(&self.create_error))?;
        let id = format!("rec_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.records).insert(id.clone(), fields);
        Ok(id)
    }

    async fn update_fields(&self, record_id: &str, fields: FieldUpdates) -> Result<(), ClientError> {
        rejected(&lock(&self.update_error))?;
        lock(&self.updates).push((record_id.to_string(), fields.clone()));
        lock(&self.records)
            .entry(record_id.to_string())
            .or_default()
            .extend(fields);
        Ok(())
    }
}

// ----------------------------
// Analytics
// ----------------------------

#[derive(Default)]
pub struct FakeAnalytics {
    error: Mutex<Option<String>>,
    properties: Mutex<Vec<(String, String)>>,
}

impl FakeAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, msg: &str) {
        *lock(&self.error) = Some(msg.to_string());
    }

    /// `(site_name, site_url)` pairs a property was created for.
    pub fn properties(&self) -> Vec<(String, String)> {
        lock(&self.properties).clone()
    }
}

#[async_trait]
impl AnalyticsProvider for FakeAnalytics {
    async fn create_property(
        &self,
        site_name: &str,
        site_url: &str,
    ) -> Result<AnalyticsIds, ClientError> {
        rejected(&lock(&self.error))?;
        let mut props = lock(&self.properties);
        props.push((site_name.to_string(), site_url.to_string()));
        Ok(AnalyticsIds {
            measurement_id: format!("G-TEST{}", props.len()),
            property_id: format!("properties/{}", 1000 + props.len()),
        })
    }
}

// ----------------------------
// Bundle
// ----------------------------

/// One fake per collaborator, shared with the workflow under test.
#[derive(Clone)]
pub struct FakeWorld {
    pub registrar: Arc<FakeRegistrar>,
    pub platform: Arc<FakePlatform>,
    pub source: Arc<FakeSourceHost>,
    pub records: Arc<FakeRecordStore>,
    pub analytics: Arc<FakeAnalytics>,
}

impl Default for FakeWorld {
    fn default() -> Self {
        Self::with_source(FakeSourceHost::ready_after(1))
    }
}

impl FakeWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: FakeSourceHost) -> Self {
        Self {
            registrar: Arc::new(FakeRegistrar::new()),
            platform: Arc::new(FakePlatform::new()),
            source: Arc::new(source),
            records: Arc::new(FakeRecordStore::new()),
            analytics: Arc::new(FakeAnalytics::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            registrar: self.registrar.clone(),
            platform: self.platform.clone(),
            source: self.source.clone(),
            records: self.records.clone(),
            analytics: self.analytics.clone(),
        }
    }
}
