//! Domain purchase: availability re-check, registration, project attachment and DNS.
//!
//! Registration cannot be undone, so everything after it is best-effort and the
//! outcome reports what did and did not happen instead of rolling back.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::{
    says_already_done, tolerate_already_done, with_deadline, DeploymentPlatform,
    DomainAvailability, DomainRegistrar, FieldUpdates, RegistrantInfo, SiteRecordStore,
};
use crate::error::ProvisionError;
use crate::jobs::id::slugify;
use crate::workflow::executor::dns_records;
use crate::workflow::normalize_domain;

const PLATFORM_HOST_SUFFIX: &str = ".vercel.app";
const REGISTRATION_YEARS: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaseRequest {
    pub domain: String,
    pub user_id: String,
    pub site_id: String,
    pub website_url: String,
    pub user_info: RegistrantInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOutcome {
    pub success: bool,
    pub domain: String,
    pub order_id: Option<String>,
    pub project_name: String,
    pub domain_attached: bool,
    pub www_attached: bool,
    pub dns_configured: bool,
    pub warnings: Vec<String>,
    pub message: String,
}

#[derive(Clone)]
pub struct DomainService {
    registrar: Arc<dyn DomainRegistrar>,
    platform: Arc<dyn DeploymentPlatform>,
    records: Option<Arc<dyn SiteRecordStore>>,
    call_timeout: Duration,
}

impl DomainService {
    pub fn new(
        registrar: Arc<dyn DomainRegistrar>,
        platform: Arc<dyn DeploymentPlatform>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registrar,
            platform,
            records: None,
            call_timeout,
        }
    }

    /// Mirror purchased domains onto the site record.
    pub fn with_records(mut self, records: Arc<dyn SiteRecordStore>) -> Self {
        self.records = Some(records);
        self
    }

    pub async fn check(&self, domain: &str) -> Result<DomainAvailability, ProvisionError> {
        let domain = normalize_domain(domain);
        if domain.is_empty() {
            return Err(ProvisionError::Validation("domain is required".into()));
        }
        with_deadline(
            "check domain availability",
            self.call_timeout,
            self.registrar.check_availability(&domain),
        )
        .await
        .map_err(|e| ProvisionError::collaborator("check domain availability", e))
    }

    pub async fn purchase(&self, req: PurchaseRequest) -> Result<PurchaseOutcome, ProvisionError> {
        let domain = normalize_domain(&req.domain);
        validate(&domain, &req)?;

        // Availability can change between quote and purchase.
        let availability = self.check(&domain).await?;
        if !availability.available {
            return Err(ProvisionError::DomainUnavailable(domain));
        }

        let registered = with_deadline(
            "register domain",
            self.call_timeout,
            self.registrar
                .register(&domain, REGISTRATION_YEARS, &req.user_info),
        )
        .await;
        let order_id = match registered {
            Ok(reg) if reg.success => reg.order_id,
            Ok(reg) => {
                let reason = reg
                    .reason
                    .unwrap_or_else(|| "registrar declined the order".to_string());
                if !says_already_done(&reason) {
                    return Err(ProvisionError::RegistrationFailed(reason));
                }
                tracing::info!(domain = %domain, reason = %reason, "domain already registered");
                None
            }
            Err(e) if e.is_already_done() => {
                tracing::info!(domain = %domain, error = %e, "domain already registered");
                None
            }
            Err(e) => return Err(ProvisionError::collaborator("register domain", e)),
        };
        tracing::info!(domain = %domain, order_id = ?order_id, "domain registered");

        let project_name = derive_project_name(&req.website_url, &req.site_id);
        let mut warnings = Vec::new();

        let domain_attached = self
            .attach(&project_name, &domain, &mut warnings)
            .await;
        let www_attached = self
            .attach(&project_name, &format!("www.{domain}"), &mut warnings)
            .await;

        let dns = with_deadline(
            "configure dns",
            self.call_timeout,
            self.registrar.set_dns_records(&domain, &dns_records()),
        )
        .await;
        let dns_configured = match dns {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(domain = %domain, error = %e, "dns configuration failed");
                warnings.push(format!("DNS configuration failed: {e}"));
                false
            }
        };

        self.mirror(&req.site_id, &domain, dns_configured).await;

        let message = if warnings.is_empty() {
            format!("Domain {domain} purchased and connected")
        } else {
            format!("Domain {domain} purchased; some configuration steps need attention")
        };

        Ok(PurchaseOutcome {
            success: true,
            domain,
            order_id,
            project_name,
            domain_attached,
            www_attached,
            dns_configured,
            warnings,
            message,
        })
    }

    async fn attach(&self, project: &str, domain: &str, warnings: &mut Vec<String>) -> bool {
        let res = with_deadline(
            "attach domain",
            self.call_timeout,
            self.platform.add_domain_to_project(project, domain),
        )
        .await;

        match tolerate_already_done(res) {
            Ok(already) => {
                if already {
                    tracing::info!(project, domain, "domain already attached");
                }
                true
            }
            Err(e) => {
                tracing::warn!(project, domain, error = %e, "domain attachment failed");
                warnings.push(format!("Attaching {domain} to {project} failed: {e}"));
                false
            }
        }
    }

    async fn mirror(&self, site_id: &str, domain: &str, dns_configured: bool) {
        let Some(records) = &self.records else {
            return;
        };
        if site_id.trim().is_empty() {
            return;
        }

        let mut fields = FieldUpdates::new();
        fields.insert("domainName".into(), json!(domain));
        fields.insert("domain.status".into(), json!("registered"));
        fields.insert("domain.dnsConfigured".into(), json!(dns_configured));
        fields.insert("updatedAt".into(), json!(chrono::Utc::now().to_rfc3339()));

        let res = with_deadline(
            "mirror site record",
            self.call_timeout,
            records.update_fields(site_id, fields),
        )
        .await;
        if let Err(e) = res {
            tracing::warn!(site_id, error = %e, "site record not updated with domain");
        }
    }
}

fn validate(domain: &str, req: &PurchaseRequest) -> Result<(), ProvisionError> {
    let mut missing = Vec::new();
    if domain.is_empty() {
        missing.push("domain");
    }
    if req.site_id.trim().is_empty() && req.website_url.trim().is_empty() {
        missing.push("siteId or websiteUrl");
    }
    if req.user_info.email.trim().is_empty() {
        missing.push("userInfo.email");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::Validation(format!(
            "missing required field(s): {}",
            missing.join(", ")
        )))
    }
}

/// `https://acme-1739.vercel.app` → `acme-1739`; anything else → `site-<siteId>`.
pub fn derive_project_name(website_url: &str, site_id: &str) -> String {
    let host = website_url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    match host.strip_suffix(PLATFORM_HOST_SUFFIX) {
        Some(sub) if !sub.is_empty() && !sub.contains('.') => sub.to_string(),
        _ => format!("site-{}", slugify(site_id)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_name_from_platform_url() {
        assert_eq!(
            derive_project_name("https://acme-1739812345678.vercel.app/", "x"),
            "acme-1739812345678"
        );
        assert_eq!(derive_project_name("acme.vercel.app", "x"), "acme");
    }

    #[test]
    fn project_name_falls_back_to_site_id() {
        assert_eq!(derive_project_name("https://acme.com", "Site_42"), "site-site-42");
        assert_eq!(derive_project_name("", "abc"), "site-abc");
    }

    #[test]
    fn purchase_requires_contact_email() {
        let req = PurchaseRequest {
            domain: "acme.com".into(),
            site_id: "s1".into(),
            ..Default::default()
        };
        let err = validate("acme.com", &req).unwrap_err();
        assert!(err.to_string().contains("userInfo.email"));
    }
}
