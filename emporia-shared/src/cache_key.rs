use sha2::{Digest, Sha256};

/// Builds a cache key from ordered `name:value` components.
///
/// Components are joined as `name:value` pairs separated by `__` and hashed,
/// so the key stays a fixed length no matter how long usernames or query
/// strings are. Two keys are equal only if every component matches.
pub fn get_cache_key(components: &[(&str, &str)]) -> String {
    let raw = components
        .iter()
        .map(|(name, value)| format!("{}:{}", name, value))
        .collect::<Vec<String>>()
        .join("__");

    hex::encode(Sha256::digest(raw.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_components_same_key() {
        let a = get_cache_key(&[("site_domain", "shop.example.com"), ("username", "alice")]);
        let b = get_cache_key(&[("site_domain", "shop.example.com"), ("username", "alice")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_any_component_changes_key() {
        let base = [
            ("site_domain", "shop.example.com"),
            ("partner_code", "edx"),
            ("resource", "enterprise-learner"),
            ("username", "alice"),
        ];
        let key = get_cache_key(&base);

        for i in 0..base.len() {
            let mut changed = base;
            changed[i].1 = "other";
            assert_ne!(key, get_cache_key(&changed), "component {} must be part of the key", i);
        }
    }

    #[test]
    fn test_name_is_part_of_key() {
        assert_ne!(
            get_cache_key(&[("username", "42")]),
            get_cache_key(&[("learner_id", "42")])
        );
    }
}
