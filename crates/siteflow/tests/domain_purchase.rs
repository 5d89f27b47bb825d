use std::time::Duration;

use serde_json::Value;
use siteflow::clients::{RegistrantInfo, Registration};
use siteflow::domain::{DomainService, PurchaseRequest};
use siteflow::error::ProvisionError;
use siteflow::testing::FakeWorld;

fn service(world: &FakeWorld) -> DomainService {
    DomainService::new(
        world.registrar.clone(),
        world.platform.clone(),
        Duration::from_millis(500),
    )
    .with_records(world.records.clone())
}

fn request() -> PurchaseRequest {
    PurchaseRequest {
        domain: "Acme-Homes.com".into(),
        user_id: "user-1".into(),
        site_id: "rec_1".into(),
        website_url: "https://acme-1739812345678.vercel.app".into(),
        user_info: RegistrantInfo {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "a@b.com".into(),
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn purchase_registers_attaches_and_configures_dns() {
    let world = FakeWorld::new();
    let outcome = service(&world).purchase(request()).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.domain, "acme-homes.com");
    assert_eq!(outcome.order_id.as_deref(), Some("order-1"));
    assert_eq!(outcome.project_name, "acme-1739812345678");
    assert!(outcome.domain_attached && outcome.www_attached && outcome.dns_configured);
    assert!(outcome.warnings.is_empty());

    assert_eq!(world.registrar.registered(), vec!["acme-homes.com".to_string()]);
    let attached = world.platform.attached_domains();
    assert_eq!(
        attached,
        vec![
            ("acme-1739812345678".to_string(), "acme-homes.com".to_string()),
            ("acme-1739812345678".to_string(), "www.acme-homes.com".to_string()),
        ]
    );

    let dns = world.registrar.dns_calls();
    assert_eq!(dns.len(), 1);
    let records = &dns[0].1;
    assert_eq!(records[0].record_type, "A");
    assert_eq!(records[0].host, "@");
    assert_eq!(records[0].value, "76.76.21.21");
    assert_eq!(records[1].record_type, "CNAME");
    assert_eq!(records[1].host, "www");
    assert_eq!(records[1].value, "cname.vercel-dns.com");

    assert_eq!(
        world.records.field("rec_1", "domainName"),
        Some(Value::from("acme-homes.com"))
    );
}

#[tokio::test]
async fn already_attached_is_success() {
    let world = FakeWorld::new();
    world
        .platform
        .fail_domain(r#"{"error":{"code":"domain_already_in_use"}}"#);

    let outcome = service(&world).purchase(request()).await.unwrap();
    assert!(outcome.domain_attached);
    assert!(outcome.www_attached);
    assert!(outcome.warnings.is_empty());
}

#[tokio::test]
async fn unavailable_domain_aborts_before_registration() {
    let world = FakeWorld::new();
    world.registrar.set_available(false);

    let err = service(&world).purchase(request()).await.unwrap_err();
    assert!(matches!(err, ProvisionError::DomainUnavailable(ref d) if d == "acme-homes.com"));
    assert!(err.user_message().contains("no longer available"));
    assert!(world.registrar.registered().is_empty());
}

#[tokio::test]
async fn declined_registration_is_reported() {
    let world = FakeWorld::new();
    world.registrar.set_registration(Registration {
        success: false,
        order_id: None,
        reason: Some("payment method declined".into()),
    });

    let err = service(&world).purchase(request()).await.unwrap_err();
    assert_eq!(err.code(), "REGISTRATION_FAILED");
    assert!(err.to_string().contains("payment method declined"));
    assert!(world.platform.attached_domains().is_empty());
}

#[tokio::test]
async fn already_registered_domain_continues_to_attach() {
    let world = FakeWorld::new();
    world
        .registrar
        .fail_registration("Domain acme-homes.com is already registered");

    let outcome = service(&world).purchase(request()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.order_id, None);
    assert!(outcome.domain_attached && outcome.www_attached && outcome.dns_configured);
    assert_eq!(world.platform.attached_domains().len(), 2);
    assert_eq!(world.registrar.dns_calls().len(), 1);
}

#[tokio::test]
async fn declined_as_already_registered_is_not_a_failure() {
    let world = FakeWorld::new();
    world.registrar.set_registration(Registration {
        success: false,
        order_id: None,
        reason: Some("Domain already registered to this account".into()),
    });

    let outcome = service(&world).purchase(request()).await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.order_id, None);
    assert!(outcome.domain_attached);
    assert_eq!(
        world.records.field("rec_1", "domainName"),
        Some(Value::from("acme-homes.com"))
    );
}

#[tokio::test]
async fn partial_success_keeps_the_purchase() {
    let world = FakeWorld::new();
    world.platform.fail_domain("project not found");
    world.registrar.fail_dns("nameservers not delegated");

    let outcome = service(&world).purchase(request()).await.unwrap();
    assert!(outcome.success);
    assert!(!outcome.domain_attached);
    assert!(!outcome.www_attached);
    assert!(!outcome.dns_configured);
    assert_eq!(outcome.warnings.len(), 3);
    assert_eq!(world.registrar.registered().len(), 1);
}

#[tokio::test]
async fn non_platform_url_uses_site_id_project() {
    let world = FakeWorld::new();
    let outcome = service(&world)
        .purchase(PurchaseRequest {
            website_url: "https://acme-homes.com".into(),
            ..request()
        })
        .await
        .unwrap();
    assert_eq!(outcome.project_name, "site-rec-1");
}

#[tokio::test]
async fn check_rejects_blank_domain() {
    let world = FakeWorld::new();
    let err = service(&world).check("  ").await.unwrap_err();
    assert_eq!(err.code(), "VALIDATION");

    let availability = service(&world).check("https://www.Acme.com/").await.unwrap();
    assert_eq!(availability.domain, "acme.com");
    assert!(availability.available);
}
