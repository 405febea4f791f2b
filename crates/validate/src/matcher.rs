use std::collections::BTreeMap;

use crate::model::{key_of, Key, Record, ResultSet};

/// A key present on both sides.
#[derive(Debug)]
pub(crate) struct MatchedPair<'a> {
    pub key: Key,
    pub base: &'a Record,
    pub compare: &'a Record,
}

#[derive(Debug, Default)]
pub(crate) struct PairMatchOutput<'a> {
    pub matched: Vec<MatchedPair<'a>>,
    pub base_only: Vec<Key>,
    pub compare_only: Vec<Key>,
}

/// Match records by exact key tuple. Both sides are keyed in the base
/// side's key-field order, so the declaration order on the compare side
/// does not matter. Output vectors are in ascending key order.
pub(crate) fn match_exact_key<'a>(base: &'a ResultSet, compare: &'a ResultSet) -> PairMatchOutput<'a> {
    let order = base.key_fields();

    let base_map: BTreeMap<Key, &Record> = base
        .records()
        .iter()
        .map(|r| (key_of(r, order), r))
        .collect();
    let mut compare_map: BTreeMap<Key, &Record> = compare
        .records()
        .iter()
        .map(|r| (key_of(r, order), r))
        .collect();

    let mut out = PairMatchOutput::default();
    for (key, base_record) in base_map {
        match compare_map.remove(&key) {
            Some(compare_record) => out.matched.push(MatchedPair {
                key,
                base: base_record,
                compare: compare_record,
            }),
            None => out.base_only.push(key),
        }
    }
    out.compare_only = compare_map.into_keys().collect();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{KeyPart, Record};

    fn set(name: &str, keys: &[&str], rows: Vec<Record>) -> ResultSet {
        ResultSet::new(name, keys.iter().copied(), rows).unwrap()
    }

    #[test]
    fn split_into_matched_and_one_sided() {
        let base = set(
            "base",
            &["id"],
            vec![Record::new().with("id", 1), Record::new().with("id", 2)],
        );
        let compare = set(
            "compare",
            &["id"],
            vec![Record::new().with("id", 3), Record::new().with("id", 1)],
        );
        let out = match_exact_key(&base, &compare);
        assert_eq!(out.matched.len(), 1);
        assert_eq!(out.matched[0].key, Key::from(vec![KeyPart::from(1.0)]));
        assert_eq!(out.base_only, vec![Key::from(vec![KeyPart::from(2.0)])]);
        assert_eq!(out.compare_only, vec![Key::from(vec![KeyPart::from(3.0)])]);
    }

    #[test]
    fn compare_key_order_follows_base() {
        let base = set(
            "base",
            &["usubjid", "visit"],
            vec![Record::new().with("usubjid", "S1").with("visit", 2)],
        );
        let compare = set(
            "compare",
            &["visit", "usubjid"],
            vec![Record::new().with("visit", 2).with("usubjid", "S1")],
        );
        let out = match_exact_key(&base, &compare);
        assert_eq!(out.matched.len(), 1);
        assert!(out.base_only.is_empty());
        assert!(out.compare_only.is_empty());
    }

    #[test]
    fn key_equality_is_exact() {
        let base = set("base", &["id"], vec![Record::new().with("id", "A")]);
        let compare = set("compare", &["id"], vec![Record::new().with("id", "a")]);
        let out = match_exact_key(&base, &compare);
        assert!(out.matched.is_empty());
        assert_eq!(out.base_only.len(), 1);
        assert_eq!(out.compare_only.len(), 1);
    }
}
