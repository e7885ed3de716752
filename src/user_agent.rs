//! Shared User-Agent string for upstream requests.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/jarcrawler/jarcrawler";

/// Default User-Agent for every source adapter (no per-source name in the header).
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("jarcrawler/{version} (server-jar-index; +{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL));
        assert_eq!(
            Some(env!("CARGO_PKG_VERSION")),
            ua.strip_prefix("jarcrawler/")
                .and_then(|s| s.split(' ').next())
        );
    }
}
