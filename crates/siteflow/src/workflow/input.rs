use serde::{Deserialize, Serialize};

use crate::error::ProvisionError;

/// Request payload for one website. Immutable once the workflow starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowInput {
    pub website_name: String,
    pub company_name: String,
    pub theme: String,
    pub layout: String,
    pub user_email: String,
    pub user_name: Option<String>,
    pub user_phone: Option<String>,
    pub domain_name: String,
    /// Existing site record to update instead of creating a new one.
    pub record_id: Option<String>,
    /// Registrar is the DNS authority for the domain.
    pub manage_dns: bool,
}

impl WorkflowInput {
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let mut missing = Vec::new();
        if self.website_name.trim().is_empty() {
            missing.push("websiteName");
        }
        if self.domain_name.trim().is_empty() {
            missing.push("domainName");
        }
        if self.user_email.trim().is_empty() {
            missing.push("userEmail");
        }
        if !missing.is_empty() {
            return Err(ProvisionError::Validation(format!(
                "missing required field(s): {}",
                missing.join(", ")
            )));
        }

        if !self.user_email.contains('@') {
            return Err(ProvisionError::Validation(format!(
                "userEmail {} is not an email address",
                self.user_email
            )));
        }
        if !self.domain().contains('.') || self.domain().contains(char::is_whitespace) {
            return Err(ProvisionError::Validation(format!(
                "domainName {} is not a domain",
                self.domain_name
            )));
        }
        Ok(())
    }

    /// Bare, lowercase domain without scheme or `www.`.
    pub fn domain(&self) -> String {
        normalize_domain(&self.domain_name)
    }
}

pub fn normalize_domain(raw: &str) -> String {
    let d = raw.trim().to_lowercase();
    let d = d
        .strip_prefix("https://")
        .or_else(|| d.strip_prefix("http://"))
        .unwrap_or(&d);
    let d = d.strip_prefix("www.").unwrap_or(d);
    d.trim_end_matches('/').to_string()
}

const THEMES: &[&str] = &["modern", "classic", "minimal", "bold", "elegant"];
const LAYOUTS: &[&str] = &["standard", "sidebar", "landing", "portfolio"];

/// Settings baked into the generated site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig {
    pub site_name: String,
    pub company_name: String,
    pub theme: String,
    pub layout: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub domain: String,
}

impl TemplateConfig {
    /// Unknown themes and layouts fall back to the defaults.
    pub fn from_input(input: &WorkflowInput) -> Self {
        let theme = pick(&input.theme, THEMES);
        let layout = pick(&input.layout, LAYOUTS);
        let company_name = if input.company_name.trim().is_empty() {
            input.website_name.trim().to_string()
        } else {
            input.company_name.trim().to_string()
        };

        Self {
            site_name: input.website_name.trim().to_string(),
            company_name,
            theme,
            layout,
            contact_email: input.user_email.trim().to_string(),
            contact_phone: input.user_phone.clone(),
            domain: input.domain(),
        }
    }

    /// Build-time environment for the deployment platform.
    pub fn environment(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("NEXT_PUBLIC_SITE_NAME".to_string(), self.site_name.clone()),
            ("NEXT_PUBLIC_COMPANY_NAME".to_string(), self.company_name.clone()),
            ("NEXT_PUBLIC_THEME".to_string(), self.theme.clone()),
            ("NEXT_PUBLIC_LAYOUT".to_string(), self.layout.clone()),
            ("NEXT_PUBLIC_CONTACT_EMAIL".to_string(), self.contact_email.clone()),
            ("NEXT_PUBLIC_SITE_DOMAIN".to_string(), self.domain.clone()),
        ];
        if let Some(phone) = &self.contact_phone {
            env.push(("NEXT_PUBLIC_CONTACT_PHONE".to_string(), phone.clone()));
        }
        env
    }
}

fn pick(value: &str, allowed: &[&str]) -> String {
    let v = value.trim().to_lowercase();
    if allowed.contains(&v.as_str()) {
        v
    } else {
        allowed[0].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> WorkflowInput {
        WorkflowInput {
            website_name: "acme".into(),
            domain_name: "acme-homes.com".into(),
            user_email: "a@b.com".into(),
            ..Default::default()
        }
    }

    #[test]
    fn minimal_input_is_valid() {
        assert!(input().validate().is_ok());
    }

    #[test]
    fn missing_fields_are_listed() {
        let err = WorkflowInput::default().validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("websiteName"));
        assert!(msg.contains("domainName"));
        assert!(msg.contains("userEmail"));
    }

    #[test]
    fn domain_is_normalized() {
        assert_eq!(normalize_domain(" https://www.Acme-Homes.com/ "), "acme-homes.com");
    }

    #[test]
    fn template_falls_back_to_defaults() {
        let mut i = input();
        i.theme = "neon".into();
        i.layout = "Sidebar".into();
        let cfg = TemplateConfig::from_input(&i);
        assert_eq!(cfg.theme, "modern");
        assert_eq!(cfg.layout, "sidebar");
        assert_eq!(cfg.company_name, "acme");
    }
}
