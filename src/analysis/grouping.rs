//! Grouping and statistics over resolved holdings.
//!
//! Grouping is a presentation concern: the underlying result sequence keeps
//! arrival order, and each group preserves that order for its records.

use crate::models::HoldingRecord;
use std::collections::HashMap;

/// Records of one collection, in arrival order.
#[derive(Debug, Clone)]
pub struct CollectionGroup<'a> {
    pub name: String,
    pub records: Vec<&'a HoldingRecord>,
}

/// Group records by collection name.
///
/// Groups follow `order` (configured collection order) and are present even
/// when empty. Collections not listed in `order` follow, in first-seen order.
pub fn group_by_collection<'a>(
    records: &'a [HoldingRecord],
    order: &[&str],
) -> Vec<CollectionGroup<'a>> {
    let mut groups: Vec<CollectionGroup<'a>> = order
        .iter()
        .map(|name| CollectionGroup {
            name: name.to_string(),
            records: Vec::new(),
        })
        .collect();

    for record in records {
        match groups.iter_mut().find(|g| g.name == record.collection) {
            Some(group) => group.records.push(record),
            None => groups.push(CollectionGroup {
                name: record.collection.clone(),
                records: vec![record],
            }),
        }
    }

    groups
}

/// Number of records per collection.
pub fn collection_counts(records: &[HoldingRecord]) -> HashMap<String, usize> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    for record in records {
        *counts.entry(record.collection.clone()).or_default() += 1;
    }

    counts
}

/// Records whose metadata carries no image.
pub fn missing_images(records: &[HoldingRecord]) -> Vec<&HoldingRecord> {
    records.iter().filter(|r| r.image().is_none()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenMetadata;

    fn create_test_record(collection: &str, token_id: &str, image: Option<&str>) -> HoldingRecord {
        HoldingRecord {
            collection: collection.to_string(),
            token_id: token_id.to_string(),
            metadata_uri: format!("https://meta.example.org/{token_id}"),
            metadata: Some(TokenMetadata {
                image: image.map(str::to_string),
                ..TokenMetadata::default()
            }),
        }
    }

    #[test]
    fn test_group_by_collection_keeps_arrival_order() {
        let records = vec![
            create_test_record("BoredApes", "9", None),
            create_test_record("CryptoJunks", "3", None),
            create_test_record("BoredApes", "1", None),
        ];

        let groups = group_by_collection(&records, &["CryptoJunks", "BoredApes"]);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].name, "CryptoJunks");
        assert_eq!(groups[1].name, "BoredApes");
        let ape_ids: Vec<_> = groups[1].records.iter().map(|r| r.token_id.as_str()).collect();
        assert_eq!(ape_ids, vec!["9", "1"]);
    }

    #[test]
    fn test_group_by_collection_empty_and_unknown() {
        let records = vec![create_test_record("Punks", "4", None)];

        let groups = group_by_collection(&records, &["CryptoJunks"]);

        assert_eq!(groups.len(), 2);
        assert!(groups[0].records.is_empty());
        assert_eq!(groups[1].name, "Punks");
        assert_eq!(groups[1].records.len(), 1);
    }

    #[test]
    fn test_collection_counts() {
        let records = vec![
            create_test_record("CryptoJunks", "1", None),
            create_test_record("CryptoJunks", "2", None),
            create_test_record("BoredApes", "1", None),
        ];

        let counts = collection_counts(&records);

        assert_eq!(counts.get("CryptoJunks"), Some(&2));
        assert_eq!(counts.get("BoredApes"), Some(&1));
    }

    #[test]
    fn test_missing_images() {
        let records = vec![
            create_test_record("CryptoJunks", "1", Some("https://img/1.png")),
            create_test_record("CryptoJunks", "2", None),
        ];

        let missing = missing_images(&records);

        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].token_id, "2");
    }
}
