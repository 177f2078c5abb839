use std::fmt;

/// Marks keys that hold bookkeeping data rather than short-link records.
/// Short codes never contain it.
const INTERNAL: char = ':';

/// Key prefix that separates the data of one deployment environment from
/// another in a shared store.
///
/// A key `abc` in environment `production` is stored as `production:abc`.
/// Internal keys such as counters live under `production::`, which no short
/// code can reach.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    prefix: String,
}

impl Namespace {
    pub fn new(environment: impl AsRef<str>) -> Self {
        Self {
            prefix: format!("{}:", environment.as_ref()),
        }
    }

    /// The prefix including the trailing separator.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Scopes `key` to this namespace.
    pub fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// Scopes an internal key, out of reach of any short code.
    pub fn internal_key(&self, name: &str) -> String {
        format!("{}{INTERNAL}{name}", self.prefix)
    }

    /// Whether a key, already stripped of the prefix, is internal.
    pub fn is_internal(&self, key: &str) -> bool {
        key.contains(INTERNAL)
    }

    /// Removes the namespace prefix, or returns `None` if `key` belongs to a
    /// different namespace.
    pub fn strip<'a>(&self, key: &'a str) -> Option<&'a str> {
        key.strip_prefix(self.prefix.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix.trim_end_matches(':'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_and_strips() {
        let ns = Namespace::new("production");

        assert_eq!(ns.prefix(), "production:");
        assert_eq!(ns.key("abc123"), "production:abc123");
        assert_eq!(ns.strip("production:abc123"), Some("abc123"));
        assert_eq!(ns.strip("staging:abc123"), None);
        assert_eq!(ns.to_string(), "production");
    }

    #[test]
    fn empty_key_is_the_bare_prefix() {
        let ns = Namespace::new("dev");
        assert_eq!(ns.key(""), ns.prefix());
        assert_eq!(ns.strip("dev:"), Some(""));
    }

    #[test]
    fn internal_keys_are_set_apart() {
        let ns = Namespace::new("production");
        let key = ns.internal_key("count_urls_set");

        assert_eq!(key, "production::count_urls_set");
        assert_ne!(key, ns.key("count_urls_set"));
        let stripped = ns.strip(&key).unwrap();
        assert!(ns.is_internal(stripped));
        assert!(!ns.is_internal("count_urls_set"));
    }

    #[test]
    fn environments_do_not_share_prefixes() {
        let dev = Namespace::new("dev");
        let devel = Namespace::new("devel");
        assert_eq!(dev.strip(&devel.key("abc")), None);
    }
}
