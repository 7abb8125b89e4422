//! Ordering and display projection of search hits.

use std::cmp::Ordering;

use crate::record::{DisplayRecord, SearchHit};

/// Sort key for a hit: missing or NaN distances rank after everything else.
fn sort_key(hit: &SearchHit) -> f32 {
    match hit.distance {
        Some(d) if !d.is_nan() => d,
        _ => f32::INFINITY,
    }
}

/// Order hits by ascending distance. The sort is stable, so equal distances
/// keep their incoming order.
pub fn rank(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.sort_by(|a, b| {
        sort_key(a)
            .partial_cmp(&sort_key(b))
            .unwrap_or(Ordering::Equal)
    });
    hits
}

/// Project hits to the fields a user sees.
pub fn present(hits: &[SearchHit]) -> Vec<DisplayRecord> {
    hits.iter()
        .map(|hit| DisplayRecord {
            title: hit.document.title.clone(),
            description: hit.document.description.clone(),
            url: hit.document.url.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Document;

    fn hit(id: &str, distance: Option<f32>) -> SearchHit {
        SearchHit {
            document: Document {
                id: id.to_string(),
                title: format!("Title {id}"),
                description: format!("Description {id}"),
                url: format!("https://example.com/{id}"),
                combined_text: format!("Title {id}. Description {id}"),
                embedding: vec![0.1, 0.2],
            },
            distance,
        }
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.document.id.as_str()).collect()
    }

    #[test]
    fn test_rank_ascending() {
        let ranked = rank(vec![hit("a", Some(0.9)), hit("b", Some(0.1)), hit("c", Some(0.5))]);
        let distances: Vec<_> = ranked.iter().map(|h| h.distance.unwrap()).collect();
        assert_eq!(distances, vec![0.1, 0.5, 0.9]);
    }

    #[test]
    fn test_missing_distance_sorts_last() {
        for position in 0..3 {
            let mut hits = vec![hit("a", Some(0.3)), hit("b", Some(0.2))];
            hits.insert(position, hit("missing", None));

            let ranked = rank(hits);
            assert_eq!(ids(&ranked), vec!["b", "a", "missing"]);
        }
    }

    #[test]
    fn test_nan_distance_sorts_last() {
        let ranked = rank(vec![hit("nan", Some(f32::NAN)), hit("a", Some(0.4))]);
        assert_eq!(ids(&ranked), vec!["a", "nan"]);
    }

    #[test]
    fn test_rank_is_stable() {
        let ranked = rank(vec![
            hit("first", Some(0.2)),
            hit("x", Some(0.1)),
            hit("second", Some(0.2)),
            hit("none1", None),
            hit("none2", None),
        ]);
        assert_eq!(ids(&ranked), vec!["x", "first", "second", "none1", "none2"]);
    }

    #[test]
    fn test_rank_empty() {
        assert!(rank(vec![]).is_empty());
    }

    #[test]
    fn test_present_projects_display_fields() {
        let hits = vec![hit("a", Some(0.1))];
        let shown = present(&hits);

        assert_eq!(
            shown,
            vec![DisplayRecord {
                title: "Title a".to_string(),
                description: "Description a".to_string(),
                url: "https://example.com/a".to_string(),
            }]
        );

        let json = serde_json::to_value(&shown[0]).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.len(), 3);
        assert!(json.get("id").is_none());
        assert!(json.get("embedding").is_none());
        assert!(json.get("combined_text").is_none());

        // the hits themselves are untouched
        assert_eq!(hits[0].document.embedding, vec![0.1, 0.2]);
    }
}
