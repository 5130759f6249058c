use std::time::Duration;

use super::*;
use crate::input::ColumnMapping;
use crate::search::IdentifierField;
use crate::selection::annotation::Anchor;

const PROCESSED: &str = "PrimaryID\tGeneNames\tFoldChange\tSignificance\tComparison\n\
P1\tACTB\t2.0\t3.0\tKO\n\
P2\tACTG1\t2.02\t3.01\tKO\n\
P3\tTUBB\t-3.0\t0.2\tKO\n\
P4\tGAPDH\t0.1\t1.5\tKO\n";

fn session() -> DatasetSession {
    let mapping = ColumnMapping {
        comparison: Some("Comparison".to_string()),
        ..ColumnMapping::default()
    };
    let store = TabularStore::build("", PROCESSED, &mapping).unwrap();
    DatasetSession::new(
        "ds",
        Arc::new(store),
        VolcanoSettings::default(),
        VariantStore::in_memory(),
        WorkerPool::new(2).unwrap(),
    )
    .unwrap()
}

#[test]
fn test_search_sync_and_async_agree() {
    let session = session();
    let query = SearchQuery::from_text("ACT\nTUBB", IdentifierField::GeneName);
    let sync = session.search(&query);
    let handle = session.search_async(query);
    assert_eq!(handle.wait(), Some(sync.clone()));
    assert_eq!(sync[0].total_count, 2);
    assert_eq!(session.dataset_id(), "ds");
}

#[test]
fn test_select_from_search_disambiguates_and_flattens() {
    let session = session();
    let query = SearchQuery::from_text("ACTB\nACT", IdentifierField::GeneName);
    let groups = session.search(&query);
    let state = session.select_from_search("Hits (WT)", &groups);
    let sel = &state.selection;
    assert_eq!(sel.selections_name, vec!["Hits (WT) (KO)"]);
    assert_eq!(sel.members_of("Hits (WT) (KO)"), vec!["P1", "P2"]);
    assert!(sel.is_consistent());
}

#[test]
fn test_snapshots_are_immutable() {
    let session = session();
    let before = session.plot_state();
    session.create_selection("A", &["P1"]);
    session.create_selection("B", &["P1"]);
    assert!(before.selection.selected_map.is_empty());
    let after = session.plot_state();
    assert_eq!(after.selection.groups_of("P1"), vec!["A", "B"]);
    let removed = session.remove_selection("A");
    assert_eq!(removed.selection.groups_of("P1"), vec!["B"]);
}

#[test]
fn test_points_are_cached_until_state_changes() {
    let session = session();
    let first = session.points();
    let second = session.points();
    assert!(Arc::ptr_eq(&first, &second));

    session.create_selection("Up", &["P4"]);
    let third = session.points();
    assert!(!Arc::ptr_eq(&first, &third));
    assert_eq!(third[3].color, selection_color(0));
}

#[test]
fn test_click_finds_close_neighbors() {
    let session = session();
    let result = session.click("P1", None).unwrap();
    assert_eq!(result.clicked.protein_id, "P1");
    let ids: Vec<&str> = result.nearby.iter().map(|n| n.point.protein_id.as_str()).collect();
    assert_eq!(ids, vec!["P2"]);
    assert!(result.nearby[0].pixel_distance <= 10.0);

    assert!(session.click("P404", None).is_none());
    assert!(session.click("P1", Some("WT")).is_none());
    assert!(session.click("P1", Some("KO")).is_some());
}

#[test]
fn test_click_radius_follows_settings() {
    let session = session();
    session.update_settings(|s| VolcanoSettings {
        pixel_radius: 0.5,
        ..s.clone()
    });
    assert!(session.click("P1", None).unwrap().nearby.is_empty());
}

#[test]
fn test_annotation_operations() {
    let session = session();
    assert!(session.add_annotation("note", 1.0, 1.0));
    assert!(!session.add_annotation("note", 2.0, 2.0));
    assert!(session.update_annotation("note", AnnotationEdit::Offset(Anchor { ax: 1.0, ay: 1.0 })));
    assert_eq!(
        session.plot_state().annotations.get("note").unwrap().anchor,
        Anchor { ax: 1.0, ay: 1.0 }
    );
    assert!(session.remove_annotation("note"));
    assert!(!session.remove_annotation("note"));

    assert_eq!(session.annotate_proteins(&["P1", "P3", "P404"]), 2);
    assert_eq!(session.annotate_proteins(&["P1"]), 0);
    let state = session.plot_state();
    assert!(state.annotations.get("ACTB(P1)").is_some());
    assert!(state.annotations.get("TUBB(P3)").is_some());
}

#[test]
fn test_traces_and_background_regeneration() {
    let session = session();
    session.create_selection("Up", &["P1"]);
    let traces = session.traces();
    assert!(traces.traces.iter().any(|t| t.name == "Up" && t.points.len() == 1));
    assert!(session.latest_traces().is_none());

    let version = session.submit_regeneration().wait().unwrap();
    let (latest_version, latest) = session.latest_traces().unwrap();
    assert_eq!(latest_version, version);
    assert_eq!(*latest, traces);
}

#[test]
fn test_debounced_suggestions() {
    let session = session();
    let stale = session.suggest_debounced("a");
    let fresh = session.suggest_debounced("act");
    assert_eq!(stale.wait(), Some(None));
    let got = fresh.wait_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(got, Some(vec!["ACTB".to_string(), "ACTG1".to_string()]));
}

#[test]
fn test_variant_round_trip_replaces_selection() {
    let session = session();
    session.create_selection("A", &["P1"]);
    session.create_selection("B", &["P2"]);
    session.update_settings(|s| {
        let mut next = s.clone();
        next.cutoffs.p_cutoff = 0.01;
        next
    });
    let saved = session.save_variant("strict", "p<=0.01").unwrap();
    assert_eq!(saved.selections_name, vec!["A", "B"]);

    session.remove_selection("A");
    session.create_selection("C", &["P3"]);
    session.update_settings(|s| {
        let mut next = s.clone();
        next.cutoffs.p_cutoff = 0.2;
        next.width_px = 500.0;
        next
    });
    let color_b = session.plot_state().selection.color_map["B"].clone();

    assert!(session.load_variant("strict"));
    let settings = session.settings();
    assert_eq!(settings.cutoffs.p_cutoff, 0.01);
    assert_eq!(settings.width_px, 500.0);
    let state = session.plot_state();
    assert_eq!(state.selection.selections_name, vec!["A", "B"]);
    assert_eq!(state.selection.color_map["B"], color_b);
    assert_eq!(state.selection.color_map["A"], selection_color(0));
    assert!(state.selection.groups_of("P3").is_empty());
    assert!(state.selection.is_consistent());

    assert!(!session.load_variant("missing"));
    assert_eq!(session.list_variants().len(), 1);
    assert!(session.delete_variant("strict").unwrap());
    assert!(!session.delete_variant("strict").unwrap());
}

#[test]
fn test_variant_load_publishes_settings_and_selection_together() {
    let session = session();
    session.create_selection("A", &["P1"]);
    session.update_settings(|s| {
        let mut next = s.clone();
        next.cutoffs.p_cutoff = 0.01;
        next
    });
    session.save_variant("strict", "").unwrap();
    session.remove_selection("A");
    session.create_selection("B", &["P3"]);
    session.update_settings(|s| {
        let mut next = s.clone();
        next.cutoffs.p_cutoff = 0.2;
        next
    });
    session.save_variant("loose", "").unwrap();

    let consistent = |view: &SessionState| match view.settings.cutoffs.p_cutoff {
        p if p == 0.01 => view.plot.selection.selections_name == vec!["A"],
        p if p == 0.2 => view.plot.selection.selections_name == vec!["B"],
        _ => false,
    };
    assert!(consistent(&session.view_state()));

    std::thread::scope(|scope| {
        let reader = scope.spawn(|| {
            (0..2000)
                .filter(|_| !consistent(&session.view_state()))
                .count()
        });
        for round in 0..500 {
            let name = if round % 2 == 0 { "strict" } else { "loose" };
            assert!(session.load_variant(name));
        }
        assert_eq!(reader.join().unwrap(), 0);
    });
    assert!(consistent(&session.view_state()));
}
