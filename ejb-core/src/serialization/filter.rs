//! Class allow/deny filtering for incoming object graphs.

/// Decides which class names may be materialized from the wire.
///
/// Patterns are exact class names, package wildcards (`com.acme.*`, matching
/// anything below the package) or `*`. Exclusions always win; an empty
/// include list admits every class that is not excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilter {
    include: Vec<String>,
    exclude: Vec<String>,
}

impl ClassFilter {
    /// Creates a filter that admits every class.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Creates a filter from include and exclude pattern lists.
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    /// Parses comma-separated include and exclude lists.
    pub fn from_lists(include: &str, exclude: &str) -> Self {
        Self::new(split_patterns(include), split_patterns(exclude))
    }

    /// Adds an include pattern.
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    /// Adds an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    /// Returns the include patterns.
    pub fn includes(&self) -> &[String] {
        &self.include
    }

    /// Returns the exclude patterns.
    pub fn excludes(&self) -> &[String] {
        &self.exclude
    }

    /// Returns true if the class may be materialized.
    pub fn accepts(&self, class_name: &str) -> bool {
        if self.exclude.iter().any(|p| matches(p, class_name)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|p| matches(p, class_name))
    }
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn matches(pattern: &str, class_name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => class_name.starts_with(prefix),
        None => pattern == class_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accepts_everything() {
        let filter = ClassFilter::allow_all();
        assert!(filter.accepts("com.acme.Anything"));
    }

    #[test]
    fn test_exact_exclude() {
        let filter = ClassFilter::allow_all().exclude("com.acme.Gadget");
        assert!(!filter.accepts("com.acme.Gadget"));
        assert!(filter.accepts("com.acme.Gadgets"));
    }

    #[test]
    fn test_package_wildcard() {
        let filter = ClassFilter::allow_all().exclude("org.evil.*");
        assert!(!filter.accepts("org.evil.Payload"));
        assert!(!filter.accepts("org.evil.deep.Payload"));
        assert!(filter.accepts("org.good.Payload"));
    }

    #[test]
    fn test_include_restricts() {
        let filter = ClassFilter::allow_all().include("com.acme.*");
        assert!(filter.accepts("com.acme.Account"));
        assert!(!filter.accepts("com.other.Account"));
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = ClassFilter::allow_all()
            .include("com.acme.*")
            .exclude("com.acme.internal.*");
        assert!(filter.accepts("com.acme.Account"));
        assert!(!filter.accepts("com.acme.internal.Secret"));
    }

    #[test]
    fn test_star_exclude_blocks_all() {
        let filter = ClassFilter::allow_all().exclude("*");
        assert!(!filter.accepts("a.B"));
    }

    #[test]
    fn test_from_lists_trims_and_skips_empty() {
        let filter = ClassFilter::from_lists(" com.acme.* , ,", "org.evil.*");
        assert_eq!(filter.includes(), &["com.acme.*".to_string()]);
        assert_eq!(filter.excludes(), &["org.evil.*".to_string()]);
    }
}
