//! Scope intersection for issued access tokens

/// Client-requested scopes that the IdP also authorized
///
/// Keeps the requested order and drops duplicates. Either side may be absent;
/// an empty result is valid.
pub fn intersect_scopes(requested: Option<&str>, authorized: Option<&str>) -> Vec<String> {
    let authorized: Vec<&str> = authorized
        .map(|s| s.split_whitespace().collect())
        .unwrap_or_default();

    let mut granted: Vec<String> = Vec::new();
    for scope in requested.unwrap_or_default().split_whitespace() {
        if authorized.contains(&scope) && !granted.iter().any(|g| g == scope) {
            granted.push(scope.to_string());
        }
    }
    granted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_intersection_follows_requested_order() {
        assert_eq!(
            intersect_scopes(Some("write admin read"), Some("read write")),
            vec!["write", "read"]
        );
        assert_eq!(
            intersect_scopes(Some("read write admin"), Some("read write")).join(" "),
            "read write"
        );
    }

    #[test]
    fn test_duplicates_collapse() {
        assert_eq!(
            intersect_scopes(Some("read read write read"), Some("write read")),
            vec!["read", "write"]
        );
    }

    #[test]
    fn test_absent_sides() {
        assert!(intersect_scopes(None, Some("read")).is_empty());
        assert!(intersect_scopes(Some("read"), None).is_empty());
        assert!(intersect_scopes(Some("read"), Some("")).is_empty());
        assert!(intersect_scopes(Some(""), Some("")).is_empty());
    }

    proptest! {
        #[test]
        fn granted_is_subset_of_both(
            requested in prop::collection::vec("[a-d]{1,2}", 0..8),
            authorized in prop::collection::vec("[a-d]{1,2}", 0..8),
        ) {
            let granted = intersect_scopes(Some(&requested.join(" ")), Some(&authorized.join(" ")));
            for scope in &granted {
                prop_assert!(requested.contains(scope));
                prop_assert!(authorized.contains(scope));
            }
            let mut unique = granted.clone();
            unique.sort();
            unique.dedup();
            prop_assert_eq!(unique.len(), granted.len());
        }

        #[test]
        fn every_common_scope_is_granted(
            requested in prop::collection::vec("[a-d]{1,2}", 0..8),
            authorized in prop::collection::vec("[a-d]{1,2}", 0..8),
        ) {
            let granted = intersect_scopes(Some(&requested.join(" ")), Some(&authorized.join(" ")));
            for scope in requested.iter().filter(|s| authorized.contains(s)) {
                prop_assert!(granted.contains(scope));
            }
        }
    }
}
