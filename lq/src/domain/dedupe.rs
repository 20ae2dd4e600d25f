//! Key-based deduplication
//!
//! The comparison key is always an explicit closure supplied by the caller.

use std::collections::HashSet;
use std::hash::Hash;

use super::Candidate;

/// Keep the first item for each distinct key, preserving input order
pub fn unique_by<T, K, F>(items: impl IntoIterator<Item = T>, mut key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: FnMut(&T) -> K,
{
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(key(item))).collect()
}

/// Drop every base item whose key also appears in `seen`
pub fn exclude_seen<T, K, F>(base: impl IntoIterator<Item = T>, seen: &[T], key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let seen_keys: HashSet<K> = seen.iter().map(&key).collect();
    base.into_iter().filter(|item| !seen_keys.contains(&key(item))).collect()
}

/// Unique candidates by identity and lookup value, keeping the earliest timestamp
pub fn unique_candidates(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        a.identity
            .cmp(&b.identity)
            .then_with(|| a.lookup_value.cmp(&b.lookup_value))
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
    unique_by(candidates, Candidate::key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    #[derive(Debug, Clone, PartialEq)]
    struct Hungry {
        id: u32,
        action: &'static str,
        eat: &'static str,
    }

    fn hungry(id: u32, action: &'static str, eat: &'static str) -> Hungry {
        Hungry { id, action, eat }
    }

    #[test]
    fn test_unique_by_keeps_first() {
        let items = vec![
            hungry(2, "eat", "apple"),
            hungry(2, "eat", "banana"),
            hungry(3, "prep", "carrot"),
        ];

        let result = unique_by(items, |h| (h.id, h.action));

        assert_eq!(result, vec![hungry(2, "eat", "apple"), hungry(3, "prep", "carrot")]);
    }

    #[test]
    fn test_exclude_seen() {
        let base = vec![hungry(2, "eat", "apple"), hungry(3, "prep", "carrot")];
        let seen = vec![
            hungry(2, "eat", "banana"),
            hungry(2, "prep", "apple"),
            hungry(3, "eat", "date"),
            hungry(4, "prep", "fennel"),
        ];

        let result = exclude_seen(base, &seen, |h| (h.id, h.action));

        assert_eq!(result, vec![hungry(3, "prep", "carrot")]);
    }

    #[test]
    fn test_exclude_seen_with_empty_history() {
        let base = vec![hungry(1, "eat", "apple")];
        assert_eq!(exclude_seen(base.clone(), &[], |h| h.id), base);
    }

    #[test]
    fn test_unique_candidates_keeps_earliest() {
        let dt = |s: &str| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap();
        let candidates = vec![
            Candidate::new("1", dt("2016-06-03 19:30:00"), "a@b.com"),
            Candidate::new("1", dt("2016-06-03 19:05:00"), "a@b.com"),
            Candidate::new("1", dt("2016-06-03 19:10:00"), "other@b.com"),
            Candidate::new("2", dt("2016-06-03 19:45:00"), "a@b.com"),
        ];

        let unique = unique_candidates(candidates);

        assert_eq!(unique.len(), 3);
        assert_eq!(unique[0].created_at, dt("2016-06-03 19:05:00"));
        assert_eq!(unique[1].lookup_value, "other@b.com");
        assert_eq!(unique[2].identity, "2");
    }
}
