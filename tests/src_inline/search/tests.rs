use super::*;
use crate::input::ColumnMapping;

const PROCESSED: &str = "PrimaryID\tGeneNames\tFoldChange\tSignificance\n\
P1\tACTB\t2.0\t0.01\n\
P2\tTUBB;TUBB5\t-3.0\t0.04\n\
P3\tGAPDH\t0.1\t0.5\n\
P4\tACTBL2\t0.8\t0.001\n\
P5\t\t1.2\t0.2\n";

fn store() -> TabularStore {
    let mapping = ColumnMapping {
        transform_significance: true,
        ..ColumnMapping::default()
    };
    TabularStore::build("", PROCESSED, &mapping).unwrap()
}

fn cutoffs() -> Cutoffs {
    Cutoffs {
        p_cutoff: 0.05,
        log2_fc_cutoff: 1.0,
    }
}

fn ids(group: &BatchResultGroup) -> Vec<&str> {
    group.results.iter().map(|r| r.protein_id.as_str()).collect()
}

#[test]
fn test_split_terms() {
    assert_eq!(
        split_terms("ACTB\r\nTUBB; GAPDH\n\n ;"),
        vec!["ACTB", "TUBB", "GAPDH"]
    );
    assert!(split_terms("  \n ; ").is_empty());
}

#[test]
fn test_groups_follow_term_order() {
    let query = SearchQuery::from_text("ACTB\nTUBB\nGAPDH", IdentifierField::GeneName);
    let groups = search(&store(), &query, &cutoffs());
    let terms: Vec<&str> = groups.iter().map(|g| g.search_term.as_str()).collect();
    assert_eq!(terms, vec!["ACTB", "TUBB", "GAPDH"]);
    assert_eq!(ids(&groups[0]), vec!["P1", "P4"]);
    assert_eq!(ids(&groups[1]), vec!["P2"]);
    assert_eq!(ids(&groups[2]), vec!["P3"]);
    assert!(groups.iter().all(|g| g.total_count == g.results.len()));
}

#[test]
fn test_empty_match_still_yields_group() {
    let query = SearchQuery::from_text("NOPE;ACTB", IdentifierField::GeneName);
    let groups = search(&store(), &query, &cutoffs());
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].search_term, "NOPE");
    assert!(groups[0].results.is_empty());
    assert_eq!(groups[0].total_count, 0);
    assert_eq!(groups[0].error, None);
}

#[test]
fn test_empty_query_returns_no_groups() {
    let query = SearchQuery::from_text(" \n ", IdentifierField::GeneName);
    assert!(search(&store(), &query, &cutoffs()).is_empty());
}

#[test]
fn test_significance_scenario() {
    let store = store();
    let significant: Vec<&str> = store
        .records()
        .iter()
        .filter(|r| cutoffs().is_significant(r))
        .map(|r| r.primary_id.as_str())
        .collect();
    assert_eq!(significant, vec!["P1", "P2"]);

    let query = SearchQuery::from_text("P1", IdentifierField::PrimaryId).with_significant_only(true);
    let groups = search(&store, &query, &cutoffs());
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0].results,
        vec![SearchResult {
            protein_id: "P1".to_string(),
            gene_name: Some("ACTB".to_string()),
            is_significant: true,
        }]
    );
}

#[test]
fn test_significant_only_drops_non_significant() {
    let query = SearchQuery::from_text("ACTB", IdentifierField::GeneName).with_significant_only(true);
    let groups = search(&store(), &query, &cutoffs());
    assert_eq!(ids(&groups[0]), vec!["P1"]);

    let query = SearchQuery::from_text("ACTB", IdentifierField::GeneName);
    let groups = search(&store(), &query, &cutoffs());
    assert!(groups[0].results[0].is_significant);
    assert!(!groups[0].results[1].is_significant);
}

#[test]
fn test_exact_and_alias_matching() {
    let query = SearchQuery::from_text("actb", IdentifierField::GeneName).with_exact(true);
    let groups = search(&store(), &query, &cutoffs());
    assert_eq!(ids(&groups[0]), vec!["P1"]);

    let query = SearchQuery::from_text("TUBB5", IdentifierField::GeneName).with_exact(true);
    let groups = search(&store(), &query, &cutoffs());
    assert_eq!(ids(&groups[0]), vec!["P2"]);
}

#[test]
fn test_regex_terms_and_invalid_regex_is_not_fatal() {
    let query = SearchQuery::from_text("^act\n([a-z\n^GAP", IdentifierField::GeneName).with_regex(true);
    let groups = search(&store(), &query, &cutoffs());
    assert_eq!(groups.len(), 3);
    assert_eq!(ids(&groups[0]), vec!["P1", "P4"]);
    assert!(groups[1].results.is_empty());
    assert!(matches!(
        groups[1].error,
        Some(QueryError::InvalidRegexTerm { ref term, .. }) if term == "([a-z"
    ));
    assert_eq!(ids(&groups[2]), vec!["P3"]);
}

#[test]
fn test_per_term_results_are_unique_by_protein() {
    let processed = "PrimaryID\tGeneNames\tFoldChange\tSignificance\tComparison\n\
P1\tACTB\t2.0\t2.0\tA\n\
P1\tACTB\t1.0\t1.0\tB\n\
P2\tACTB\t1.0\t1.0\tA\n";
    let mapping = ColumnMapping {
        comparison: Some("Comparison".to_string()),
        ..ColumnMapping::default()
    };
    let store = TabularStore::build("", processed, &mapping).unwrap();
    let query = SearchQuery::from_text("ACTB\nACTB", IdentifierField::GeneName);
    let groups = search(&store, &query, &cutoffs());
    assert_eq!(ids(&groups[0]), vec!["P1", "P2"]);
    assert_eq!(ids(&groups[1]), vec!["P1", "P2"]);
    assert_eq!(flatten_unique_ids(&groups), vec!["P1", "P2"]);
}

#[test]
fn test_advanced_filter_bounds() {
    let store = store();
    let right = RawAdvancedFilter {
        min_fc_right: "1.2".to_string(),
        search_right: true,
        ..RawAdvancedFilter::default()
    }
    .to_filter();
    let query = SearchQuery::from_text("P", IdentifierField::PrimaryId).with_advanced(Some(right));
    let groups = search(&store, &query, &cutoffs());
    assert_eq!(ids(&groups[0]), vec!["P1", "P5"]);

    let left = AdvancedFilter {
        min_fc_left: Some(1.0),
        max_fc_left: Some(3.0),
        max_p: Some(0.05),
        search_left: true,
        ..AdvancedFilter::default()
    };
    let query = SearchQuery::from_text("P", IdentifierField::PrimaryId).with_advanced(Some(left));
    let groups = search(&store, &query, &cutoffs());
    assert_eq!(ids(&groups[0]), vec!["P2"]);
}

#[test]
fn test_advanced_filter_p_range_only() {
    let filter = RawAdvancedFilter {
        min_p: "0.0".to_string(),
        max_p: "0.005".to_string(),
        ..RawAdvancedFilter::default()
    }
    .to_filter();
    let query = SearchQuery::from_text("P", IdentifierField::PrimaryId).with_advanced(Some(filter));
    let groups = search(&store(), &query, &cutoffs());
    assert_eq!(ids(&groups[0]), vec!["P4"]);
}

#[test]
fn test_invalid_filter_strings_are_absent_bounds() {
    let raw = RawAdvancedFilter {
        min_p: "abc".to_string(),
        max_p: " ".to_string(),
        min_fc_right: "inf".to_string(),
        max_fc_right: "2.5".to_string(),
        search_right: true,
        ..RawAdvancedFilter::default()
    };
    let filter = raw.to_filter();
    assert_eq!(filter.min_p, None);
    assert_eq!(filter.max_p, None);
    assert_eq!(filter.min_fc_right, None);
    assert_eq!(filter.max_fc_right, Some(2.5));
    assert!(filter.search_right);
}

#[test]
fn test_suggest_prefix_then_substring() {
    let names: Vec<String> = ["GAPDH", "ACTB", "TUBB", "ACTG1", "BACT"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(suggest(&names, "act", 10), vec!["ACTB", "ACTG1", "BACT"]);
    assert_eq!(suggest(&names, "ACT", 1), vec!["ACTB"]);
    assert!(suggest(&names, "  ", 10).is_empty());
    assert!(suggest(&names, "zzz", 10).is_empty());
}

#[test]
fn test_p_bounds_are_inclusive_at_the_record_value() {
    let mut processed = String::from("PrimaryID\tFoldChange\tSignificance\n");
    for i in 1..1000 {
        processed.push_str(&format!("P{i}\t1.0\t{}\n", i as f64 / 1000.0));
    }
    let mapping = ColumnMapping {
        transform_significance: true,
        ..ColumnMapping::default()
    };
    let store = TabularStore::build("", &processed, &mapping).unwrap();
    for i in 1..1000 {
        let p = i as f64 / 1000.0;
        let filter = AdvancedFilter {
            min_p: Some(p),
            max_p: Some(p),
            ..AdvancedFilter::default()
        };
        let record = store.get(&format!("P{i}"), "1").unwrap();
        assert!(filter.matches(record), "p = {p} excluded by [{p}, {p}]");
    }

    let filter = AdvancedFilter {
        min_p: Some(0.002),
        max_p: Some(0.004),
        ..AdvancedFilter::default()
    };
    let inside: Vec<&str> = store
        .records()
        .iter()
        .filter(|r| filter.matches(r))
        .map(|r| r.primary_id.as_str())
        .collect();
    assert_eq!(inside, vec!["P2", "P3", "P4"]);
}
