//! Include/exclude filtering of resource names and namespaces
//!
//! Filters are built once at startup from comma separated option values
//! and never change afterwards.

use std::collections::BTreeSet;

/// Include entry that lifts every restriction
const ALL: &str = "all";

/// Split a comma separated list, trimming whitespace and skipping empties
pub fn parse_list(input: &str) -> BTreeSet<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Include/exclude rule over plain names
///
/// An empty include set admits every name. Exclusion always wins over
/// inclusion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl NameFilter {
    pub fn new(include: BTreeSet<String>, exclude: BTreeSet<String>) -> Self {
        let include = if include.contains(ALL) {
            BTreeSet::new()
        } else {
            include
        };
        Self { include, exclude }
    }

    /// Build from raw comma separated option values
    pub fn from_lists(include: &str, exclude: &str) -> Self {
        Self::new(parse_list(include), parse_list(exclude))
    }

    pub fn includes(&self, name: &str) -> bool {
        if self.exclude.contains(name) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.contains(name)
    }

    /// Names asked for explicitly that are not also excluded
    pub fn requested(&self) -> BTreeSet<String> {
        self.include.difference(&self.exclude).cloned().collect()
    }

    /// Whether the include side narrows the candidate set
    pub fn is_restricted(&self) -> bool {
        !self.include.is_empty()
    }
}

/// Name and namespace filters applied together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceFilter {
    pub names: NameFilter,
    pub namespaces: NameFilter,
}

impl ResourceFilter {
    pub fn new(names: NameFilter, namespaces: NameFilter) -> Self {
        Self { names, namespaces }
    }

    pub fn included(&self, name: &str, namespace: &str) -> bool {
        self.namespaces.includes(namespace) && self.names.includes(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        let list = parse_list(" a, b ,,c ,");
        assert_eq!(list.len(), 3);
        assert!(list.contains("a"));
        assert!(list.contains("b"));
        assert!(list.contains("c"));
        assert!(parse_list("").is_empty());
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let filter = NameFilter::from_lists("web,db", "db");
        assert!(filter.includes("web"));
        assert!(!filter.includes("db"));
        assert!(!filter.includes("cache"));
    }

    #[test]
    fn test_empty_filter_admits_everything() {
        let filter = NameFilter::default();
        for name in ["node-a", "kube-system", "x"] {
            assert!(filter.includes(name));
        }
        // Empty names are matched by no rule
        assert!(filter.includes(""));
    }

    #[test]
    fn test_empty_name_rejected_by_include_list() {
        let filter = NameFilter::from_lists("web", "");
        assert!(!filter.includes(""));
    }

    #[test]
    fn test_all_keyword_lifts_include() {
        let filter = NameFilter::from_lists("all", "db");
        assert!(!filter.is_restricted());
        assert!(filter.includes("web"));
        assert!(!filter.includes("db"));
    }

    #[test]
    fn test_requested_drops_excluded_names() {
        let filter = NameFilter::from_lists("web,db", "db");
        let requested: Vec<String> = filter.requested().into_iter().collect();
        assert_eq!(requested, vec!["web".to_string()]);
    }

    #[test]
    fn test_resource_filter_checks_namespace() {
        let filter = ResourceFilter::new(
            NameFilter::default(),
            NameFilter::from_lists("", "kube-system"),
        );
        assert!(filter.included("coredns", "default"));
        assert!(!filter.included("coredns", "kube-system"));

        let filter = ResourceFilter::new(
            NameFilter::from_lists("web", ""),
            NameFilter::from_lists("shop", "shop"),
        );
        assert!(!filter.included("web", "shop"));
    }
}
