use contractgraph_core::{
    ChangeIngestor, ChangeKind, ContextFile, ContractGraphError, RawFileChange, Snapshot,
    WarningCode,
};

#[test]
fn test_empty_input_is_rejected() {
    let err = ChangeIngestor::ingest(vec![], vec![ContextFile::new("a.ts", "")]).unwrap_err();
    assert!(matches!(err, ContractGraphError::NoChangesFound));
    assert!(err.is_ingest_error());
}

#[test]
fn test_paths_are_normalized_and_sorted() {
    let (set, warnings) = ChangeIngestor::ingest(
        vec![
            RawFileChange::modified(".\\src\\z.ts", "a", "b"),
            RawFileChange::added("src//a.ts", "x"),
        ],
        vec![],
    )
    .unwrap();
    assert!(warnings.is_empty());
    let paths: Vec<&str> = set.changes().iter().map(|c| c.path.as_str()).collect();
    assert_eq!(paths, vec!["src/a.ts", "src/z.ts"]);
}

#[test]
fn test_duplicate_records_last_wins_with_warning() {
    let (set, warnings) = ChangeIngestor::ingest(
        vec![
            RawFileChange::added("src/a.ts", "first"),
            RawFileChange::modified("src/a.ts", "old", "second"),
        ],
        vec![],
    )
    .unwrap();
    assert_eq!(set.len(), 1);
    let change = set.get("src/a.ts").unwrap();
    assert_eq!(change.change_kind, ChangeKind::Modified);
    assert_eq!(change.after_content.as_deref(), Some("second"));
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, WarningCode::ConflictingChangeKind);
}

#[test]
fn test_identical_duplicates_do_not_warn() {
    let (_, warnings) = ChangeIngestor::ingest(
        vec![
            RawFileChange::added("a.ts", "1"),
            RawFileChange::added("a.ts", "2"),
        ],
        vec![],
    )
    .unwrap();
    assert!(warnings.is_empty());
}

#[test]
fn test_content_invariants_per_change_kind() {
    let mut added = RawFileChange::added("a.ts", "x");
    added.before_content = Some("y".into());
    assert!(ChangeIngestor::ingest(vec![added], vec![]).is_err());

    let mut removed = RawFileChange::removed("a.ts", "x");
    removed.after_content = Some("y".into());
    assert!(ChangeIngestor::ingest(vec![removed], vec![]).is_err());

    let mut renamed = RawFileChange::renamed("old.ts", "new.ts", "a", "b");
    renamed.old_path = None;
    let err = ChangeIngestor::ingest(vec![renamed], vec![]).unwrap_err();
    assert!(matches!(err, ContractGraphError::Ingest { .. }));

    let mut modified = RawFileChange::modified("a.ts", "a", "b");
    modified.after_content = None;
    let err = ChangeIngestor::ingest(vec![modified], vec![]).unwrap_err();
    assert!(err.to_string().contains("a.ts"));
}

#[test]
fn test_empty_path_is_rejected() {
    let err = ChangeIngestor::ingest(vec![RawFileChange::added(" ./ ", "x")], vec![]).unwrap_err();
    assert!(err.is_ingest_error());
}

#[test]
fn test_snapshot_path_reused_twice_is_rejected() {
    let err = ChangeIngestor::ingest(
        vec![
            RawFileChange::modified("src/a.ts", "a", "b"),
            RawFileChange::renamed("src/a.ts", "src/b.ts", "a", "b"),
        ],
        vec![],
    )
    .unwrap_err();
    assert!(err.is_ingest_error());
}

#[test]
fn test_context_files_join_both_snapshots() {
    let (set, warnings) = ChangeIngestor::ingest(
        vec![
            RawFileChange::removed("src/gone.ts", "old"),
            RawFileChange::added("src/new.ts", "new"),
        ],
        vec![
            ContextFile::new("src/shared.ts", "same"),
            ContextFile::new("src/new.ts", "shadow"),
        ],
    )
    .unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].code, WarningCode::ContextCollision);

    let before: Vec<&str> = set
        .snapshot_files(Snapshot::Before)
        .iter()
        .map(|f| f.path)
        .collect();
    let after: Vec<&str> = set
        .snapshot_files(Snapshot::After)
        .iter()
        .map(|f| f.path)
        .collect();
    assert_eq!(before, vec!["src/gone.ts", "src/shared.ts"]);
    assert_eq!(after, vec!["src/new.ts", "src/shared.ts"]);
}

#[test]
fn test_raw_records_deserialize_from_json() {
    let json = r#"[
        {"path": "src/a.ts", "change_kind": "Added", "after_content": "export const a = 1;"},
        {"path": "src/b.ts", "change_kind": "Renamed", "old_path": "lib/b.ts",
         "before_content": "x", "after_content": "x"}
    ]"#;
    let records: Vec<RawFileChange> = serde_json::from_str(json).unwrap();
    let (set, _) = ChangeIngestor::ingest(records, vec![]).unwrap();
    assert_eq!(set.summary().renamed, 1);
    assert_eq!(set.get("src/b.ts").unwrap().old_path.as_deref(), Some("lib/b.ts"));
}
