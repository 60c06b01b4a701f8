//! Read options and selector encoding.

use std::collections::BTreeMap;

use thiserror::Error;

/// Options for [`Store::get`](crate::Store::get).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Return `Ok(None)` instead of `KeyNotFound` for a missing object.
    pub ignore_not_found: bool,
}

impl GetOptions {
    /// Options that tolerate a missing object.
    #[must_use]
    pub fn ignore_not_found() -> Self {
        Self { ignore_not_found: true }
    }
}

/// Options for [`Store::get_list`](crate::Store::get_list).
///
/// Without selectors the list is paginated in creation order: `page` is
/// 1-based (0 reads as 1) and `limit = 0` returns everything. A label
/// selector fetches the whole scope and filters it, ignoring `page` and
/// `limit`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Every pair must be present in an object's labels.
    pub label_selector: BTreeMap<String, String>,
    /// Accepted for interface compatibility; not applied.
    pub field_selector: BTreeMap<String, String>,
    /// 1-based page number.
    pub page: usize,
    /// Page size; `0` means unlimited.
    pub limit: usize,
    /// List across every namespace and ignore `limit`.
    pub all: bool,
}

impl ListOptions {
    /// Page `page` of size `limit`.
    #[must_use]
    pub fn paged(page: usize, limit: usize) -> Self {
        Self { page, limit, ..Self::default() }
    }

    /// Everything in every namespace.
    #[must_use]
    pub fn all() -> Self {
        Self { all: true, ..Self::default() }
    }

    /// Adds a required label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.label_selector.insert(key.into(), value.into());
        self
    }

    pub(crate) fn has_selector(&self) -> bool {
        !self.label_selector.is_empty() || !self.field_selector.is_empty()
    }
}

/// A selector string that is not a list of `key=value` pairs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid selector term {term:?}: expected key=value")]
pub struct SelectorError {
    /// The offending term.
    pub term: String,
}

/// Parses `k1=v1,k2=v2` into a selector map. Empty terms are skipped.
///
/// # Errors
///
/// Returns [`SelectorError`] for a term without `=` or with an empty key.
pub fn parse_selector(s: &str) -> Result<BTreeMap<String, String>, SelectorError> {
    let mut selector = BTreeMap::new();
    for term in s.split(',').map(str::trim).filter(|term| !term.is_empty()) {
        match term.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                selector.insert(key.trim().to_owned(), value.trim().to_owned());
            },
            _ => return Err(SelectorError { term: term.to_owned() }),
        }
    }
    Ok(selector)
}

/// Formats a selector map as `k1=v1,k2=v2`, keys in order.
#[must_use]
pub fn encode_selector(selector: &BTreeMap<String, String>) -> String {
    selector.iter().map(|(key, value)| format!("{key}={value}")).collect::<Vec<_>>().join(",")
}

/// Index range `[first, last]` of page `page` of size `limit` within `len`
/// items, or `None` if the page starts past the end.
pub(crate) fn page_window(page: usize, limit: usize, len: usize) -> Option<(usize, usize)> {
    let first = page.max(1).saturating_sub(1).saturating_mul(limit);
    if limit == 0 || first >= len {
        return None;
    }
    let last = first.saturating_add(limit).min(len) - 1;
    Some((first, last))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("", &[])]
    #[case("env=prod", &[("env", "prod")])]
    #[case("env=prod,tier=web", &[("env", "prod"), ("tier", "web")])]
    #[case(" env = prod , ,tier=", &[("env", "prod"), ("tier", "")])]
    fn parses_selectors(#[case] input: &str, #[case] expected: &[(&str, &str)]) {
        let expected: BTreeMap<_, _> =
            expected.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
        assert_eq!(parse_selector(input).unwrap(), expected);
    }

    #[rstest]
    #[case("env")]
    #[case("=prod")]
    #[case("env=prod,tier")]
    fn rejects_malformed_terms(#[case] input: &str) {
        assert!(parse_selector(input).is_err());
    }

    #[test]
    fn encoding_is_ordered() {
        let selector = parse_selector("tier=web,env=prod").unwrap();
        assert_eq!(encode_selector(&selector), "env=prod,tier=web");
        assert_eq!(parse_selector(&encode_selector(&selector)).unwrap(), selector);
    }

    #[rstest]
    #[case(1, 3, 10, Some((0, 2)))]
    #[case(0, 3, 10, Some((0, 2)))]
    #[case(4, 3, 10, Some((9, 9)))]
    #[case(5, 3, 10, None)]
    #[case(1, 3, 0, None)]
    #[case(1, 20, 10, Some((0, 9)))]
    #[case(usize::MAX, usize::MAX, 10, None)]
    fn page_windows(
        #[case] page: usize,
        #[case] limit: usize,
        #[case] len: usize,
        #[case] expected: Option<(usize, usize)>,
    ) {
        assert_eq!(page_window(page, limit, len), expected);
    }

    proptest! {
        /// Pages tile the items: each index falls in exactly one page window.
        #[test]
        fn windows_partition_items(len in 0usize..200, limit in 1usize..25) {
            let mut covered = Vec::new();
            let pages = len.div_ceil(limit);
            for page in 1..=pages {
                let (first, last) = page_window(page, limit, len).expect("page within range");
                prop_assert!(last - first < limit);
                covered.extend(first..=last);
            }
            prop_assert_eq!(covered, (0..len).collect::<Vec<_>>());
            prop_assert_eq!(page_window(pages + 1, limit, len), None);
        }
    }
}
