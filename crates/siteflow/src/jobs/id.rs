use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Allocates job ids shaped `<name-slug>_<millis>`.
///
/// The millisecond component is strictly increasing per generator, so two
/// requests for the same site name in the same millisecond still get distinct
/// ids. The readable name is kept on the job as `websiteName`.
#[derive(Debug, Default)]
pub struct JobIdGenerator {
    last_millis: AtomicI64,
}

impl JobIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self, website_name: &str) -> String {
        format!("{}_{}", slugify(website_name), self.next_millis())
    }

    fn next_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut last = self.last_millis.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(last + 1);
            match self.last_millis.compare_exchange(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => last = actual,
            }
        }
    }
}

/// Lowercase ASCII alphanumerics; every other run of characters collapses to `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "site".to_string()
    } else {
        slug
    }
}
