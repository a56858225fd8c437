use super::*;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

#[test]
fn matching_stores_are_consistent() {
    let report = ConsistencyReport::compare(&ids(&["a", "b", "c"]), &ids(&["c", "a", "b"]));

    assert!(report.is_consistent);
    assert_eq!(report.docstore_chunks, 3);
    assert_eq!(report.vector_rows, 3);
    assert_eq!(report.summary(), "3 chunks, 3 vectors, consistent");
}

#[test]
fn empty_stores_are_consistent() {
    assert!(ConsistencyReport::compare(&[], &[]).is_consistent);
}

#[test]
fn missing_and_orphaned_ids_are_reported() {
    let report = ConsistencyReport::compare(&ids(&["a", "b", "c"]), &ids(&["b", "x"]));

    assert!(!report.is_consistent);
    assert_eq!(report.missing_in_index, ids(&["a", "c"]));
    assert_eq!(report.orphaned_in_index, ids(&["x"]));
    assert!(report.summary().contains("2 missing from vector index"));
}

#[test]
fn duplicated_vectors_are_reported() {
    let report = ConsistencyReport::compare(&ids(&["a", "b"]), &ids(&["a", "b", "a", "a"]));

    assert!(!report.is_consistent);
    assert_eq!(report.duplicated_in_index, ids(&["a"]));
    assert!(report.missing_in_index.is_empty());
    assert!(report.orphaned_in_index.is_empty());
}
