//! Fingerprinting of the mutable configuration of a `WebApp`. The fingerprint is stored as an
//! annotation on the Deployment's pod template, so a change to the configuration shows up as a
//! change to a single string, and also rolls the pods so they pick up the new environment.
use sha2::{Digest, Sha256};

use std::collections::BTreeMap;

/// Annotation on the Deployment's pod template that holds the configuration fingerprint
pub const CONFIG_HASH_ANNOTATION: &str = "webapp.crdlego.com/config-hash";

/// number of bytes of the digest that are kept in the fingerprint
const FINGERPRINT_LEN: usize = 16;

/// Returns a hex encoded digest of the given key/value pairs. The pairs are sorted and each key
/// and value is length-prefixed before digesting, so the result only depends on the set of pairs
/// and not on iteration order, and no two distinct sets share an encoding.
pub fn fingerprint<'a, I>(config_data: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let sorted: BTreeMap<&str, &str> = config_data
        .into_iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();

    let mut hasher = Sha256::new();
    for (key, value) in sorted {
        update_prefixed(&mut hasher, key);
        update_prefixed(&mut hasher, value);
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..FINGERPRINT_LEN])
}

fn update_prefixed(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_be_bytes());
    hasher.update(value.as_bytes());
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashMap;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn of(items: &[(String, String)]) -> String {
        fingerprint(items.iter().map(|(k, v)| (k, v)))
    }

    #[test]
    fn fingerprint_does_not_depend_on_order() {
        let a = pairs(&[("A", "1"), ("B", "2"), ("C", "3")]);
        let b = pairs(&[("C", "3"), ("A", "1"), ("B", "2")]);
        assert_eq!(of(&a), of(&b));

        let as_map: HashMap<String, String> = a.iter().cloned().collect();
        assert_eq!(of(&a), fingerprint(&as_map));
    }

    #[test]
    fn fingerprint_changes_when_a_value_changes() {
        let debug = pairs(&[("LOG_LEVEL", "debug")]);
        let info = pairs(&[("LOG_LEVEL", "info")]);
        assert_ne!(of(&debug), of(&info));
    }

    #[test]
    fn key_value_boundaries_are_part_of_the_fingerprint() {
        let one = pairs(&[("AB", "C")]);
        let other = pairs(&[("A", "BC")]);
        assert_ne!(of(&one), of(&other));
    }

    #[test]
    fn empty_configuration_has_a_stable_fingerprint() {
        let empty: BTreeMap<String, String> = BTreeMap::new();
        let fp = fingerprint(&empty);
        assert_eq!(fp, fingerprint(&BTreeMap::<String, String>::new()));
        assert_eq!(FINGERPRINT_LEN * 2, fp.len());
    }
}
