use std::time::Duration;

// Config is a central place for runtime configuration.
// Values come from environment variables (with a .env file honoured via dotenvy).
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub api_secret: String,
    /// No DATABASE_URL means jobs live in process memory only.
    pub database_url: Option<String>,
    pub migrate_on_startup: bool,
    pub job_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub readiness_attempts: u32,
    pub readiness_delay_ms: u64,
    pub call_timeout_secs: u64,
    pub registrar: ServiceEndpoint,
    pub platform: ServiceEndpoint,
    pub platform_team_id: Option<String>,
    pub source_host: ServiceEndpoint,
    pub repo_owner: String,
    pub template_owner: String,
    pub template_repo: String,
    pub records: ServiceEndpoint,
    pub analytics: ServiceEndpoint,
}

#[derive(Clone, Debug)]
pub struct ServiceEndpoint {
    pub base_url: String,
    pub token: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let api_secret = env_or_fallback("SITEFLOW_API_SECRET", "API_SECRET")
            .ok_or_else(|| anyhow::anyhow!("SITEFLOW_API_SECRET is missing"))?;

        let bind_addr = env_or_fallback("SITEFLOW_BIND_ADDR", "BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3001".to_string());

        let database_url = env_or_fallback("SITEFLOW_DATABASE_URL", "DATABASE_URL");
        let migrate_on_startup = env_bool("SITEFLOW_MIGRATE_ON_STARTUP").unwrap_or(false);

        let job_ttl_secs = env_parse("SITEFLOW_JOB_TTL_SECS", "JOB_TTL_SECS").unwrap_or(3600);
        let sweep_interval_secs =
            env_parse("SITEFLOW_SWEEP_INTERVAL_SECS", "SWEEP_INTERVAL_SECS").unwrap_or(60);

        let readiness_attempts =
            env_parse("SITEFLOW_READINESS_ATTEMPTS", "READINESS_ATTEMPTS").unwrap_or(10);
        let readiness_delay_ms =
            env_parse("SITEFLOW_READINESS_DELAY_MS", "READINESS_DELAY_MS").unwrap_or(2000);
        let call_timeout_secs =
            env_parse("SITEFLOW_CALL_TIMEOUT_SECS", "CALL_TIMEOUT_SECS").unwrap_or(30);

        let registrar = endpoint("REGISTRAR", "https://api.registrar.example/v1")?;
        let platform = endpoint("PLATFORM", "https://api.vercel.com")?;
        let platform_team_id = env_or_fallback("SITEFLOW_PLATFORM_TEAM_ID", "VERCEL_TEAM_ID");
        let source_host = endpoint("SOURCE_HOST", "https://api.github.com")?;
        let records = endpoint("RECORDS", "http://localhost:8080")?;
        let analytics = endpoint("ANALYTICS", "http://localhost:8081")?;

        let repo_owner = env_or_fallback("SITEFLOW_REPO_OWNER", "GITHUB_OWNER")
            .ok_or_else(|| anyhow::anyhow!("SITEFLOW_REPO_OWNER is missing"))?;
        let template_owner = env_or_fallback("SITEFLOW_TEMPLATE_OWNER", "TEMPLATE_OWNER")
            .unwrap_or_else(|| repo_owner.clone());
        let template_repo = env_or_fallback("SITEFLOW_TEMPLATE_REPO", "TEMPLATE_REPO")
            .unwrap_or_else(|| "website-template".to_string());

        Ok(Self {
            bind_addr,
            api_secret,
            database_url,
            migrate_on_startup,
            job_ttl_secs,
            sweep_interval_secs,
            readiness_attempts,
            readiness_delay_ms,
            call_timeout_secs,
            registrar,
            platform,
            platform_team_id,
            source_host,
            repo_owner,
            template_owner,
            template_repo,
            records,
            analytics,
        })
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs.max(1))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }

    pub fn readiness_delay(&self) -> Duration {
        Duration::from_millis(self.readiness_delay_ms)
    }
}

fn endpoint(name: &str, default_url: &str) -> anyhow::Result<ServiceEndpoint> {
    let base_url = env_or_fallback(&format!("SITEFLOW_{name}_URL"), &format!("{name}_URL"))
        .unwrap_or_else(|| default_url.to_string());
    let token = env_or_fallback(&format!("SITEFLOW_{name}_TOKEN"), &format!("{name}_TOKEN"))
        .ok_or_else(|| anyhow::anyhow!("SITEFLOW_{name}_TOKEN is missing"))?;

    Ok(ServiceEndpoint {
        base_url: base_url.trim_end_matches('/').to_string(),
        token,
    })
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_parse<T: std::str::FromStr>(primary: &str, fallback: &str) -> Option<T> {
    env_or_fallback(primary, fallback).and_then(|s| s.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
