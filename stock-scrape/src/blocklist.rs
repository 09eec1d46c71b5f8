//! Blocklist policy applied to resolved URLs before any job is submitted.

use tracing::info;

use crate::error::TickerError;
use crate::types::TeamFlags;
use stock_common::util::{host_matches_domain, host_of};

/// Reason reported for blocked hosts.
pub const BLOCKED_REASON: &str = "This website is no longer supported for scraping. \
                                  Please contact support to enable it for your account.";

/// Social and login-walled hosts that are never scraped.
pub const DEFAULT_BLOCKED_DOMAINS: &[&str] = &[
    "facebook.com",
    "instagram.com",
    "x.com",
    "twitter.com",
    "linkedin.com",
    "tiktok.com",
    "snapchat.com",
    "pinterest.com",
    "whatsapp.com",
    "telegram.org",
    "youtube.com",
];

/// Domain blocklist with per-team exemptions.
#[derive(Debug, Clone)]
pub struct BlockListGuard {
    blocked: Vec<String>,
}

impl Default for BlockListGuard {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl BlockListGuard {
    /// Built-in list extended with `extra` domains.
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut blocked: Vec<String> = DEFAULT_BLOCKED_DOMAINS
            .iter()
            .map(|d| d.to_string())
            .collect();
        for domain in extra {
            let domain = domain.into().trim().to_lowercase();
            if !domain.is_empty() && !blocked.contains(&domain) {
                blocked.push(domain);
            }
        }
        Self { blocked }
    }

    /// Only the given domains, without the built-in list.
    pub fn only<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            blocked: domains
                .into_iter()
                .map(|d| d.into().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// Reject `url` when its host is blocked and not exempted for the team.
    pub fn check(&self, url: &str, flags: &TeamFlags) -> Result<(), TickerError> {
        let host = host_of(url)
            .ok_or_else(|| TickerError::Upstream(format!("Resolved URL is not valid: {}", url)))?;

        let exempt = flags
            .unblocked_domains
            .iter()
            .any(|domain| host_matches_domain(&host, domain));
        if exempt {
            return Ok(());
        }

        if self.blocked.iter().any(|domain| host_matches_domain(&host, domain)) {
            info!(host = %host, "Resolved URL is blocked");
            return Err(TickerError::Blocked(BLOCKED_REASON.to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_pages_allowed() {
        let guard = BlockListGuard::default();
        let flags = TeamFlags::default();
        assert!(guard
            .check("https://www.investing.com/equities/apple-computer-inc", &flags)
            .is_ok());
    }

    #[test]
    fn test_builtin_domains_blocked() {
        let guard = BlockListGuard::default();
        let flags = TeamFlags::default();

        let err = guard
            .check("https://m.facebook.com/somepage", &flags)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Could not scrape URL: {}", BLOCKED_REASON)
        );
        assert!(guard.check("https://x.com/user", &flags).is_err());
    }

    #[test]
    fn test_extra_domains() {
        let guard = BlockListGuard::new(vec!["Investing.com".to_string()]);
        let flags = TeamFlags::default();
        assert!(guard
            .check("https://uk.investing.com/equities/x", &flags)
            .is_err());
    }

    #[test]
    fn test_team_exemption() {
        let guard = BlockListGuard::only(["investing.com"]);
        let flags = TeamFlags {
            force_zdr: false,
            unblocked_domains: vec!["investing.com".into()],
        };
        assert!(guard
            .check("https://www.investing.com/equities/x", &flags)
            .is_ok());
    }

    #[test]
    fn test_invalid_url() {
        let guard = BlockListGuard::default();
        let err = guard.check("not a url", &TeamFlags::default()).unwrap_err();
        assert!(matches!(err, TickerError::Upstream(_)));
    }
}
