mod common;

use approx::assert_relative_eq;
use common::engine;
use contractgraph_core::{
    ChangeIngestor, ContextFile, ContractGraphError, EdgeKind, EdgeStatus, EngineConfig,
    NodeStatus, RawFileChange, Snapshot, WarningCode,
};
use contractgraph_graph::{
    BlastRadiusPropagator, ContractDiffEngine, EngineOutput, IdentityOverride,
};
use std::collections::BTreeSet;

const A_BEFORE: &str = r#"
export function foo(x) {
  return x + 1;
}
"#;

const A_AFTER: &str = r#"
function foo(x) {
  return x + 1;
}
"#;

const B: &str = r#"
import { foo } from './a';

export function page(n) {
  return foo(n);
}
"#;

fn scenario_a() -> EngineOutput {
    engine()
        .run(
            vec![RawFileChange::modified("src/a.ts", A_BEFORE, A_AFTER)],
            vec![ContextFile::new("src/b.ts", B)],
        )
        .unwrap()
}

fn scenario_removed_a() -> EngineOutput {
    engine()
        .run(
            vec![RawFileChange::removed("src/a.ts", A_BEFORE)],
            vec![ContextFile::new("src/b.ts", B)],
        )
        .unwrap()
}

const PANEL_BEFORE: &str = r#"
import { Child } from './child';

export function Panel({ title, user }) {
  return <Child a={title} b={user} />;
}
"#;

const PANEL_AFTER: &str = r#"
import { Child } from './child';

export function Panel({ title, user }) {
  return <Child a={title} />;
}
"#;

const CHILD: &str = r#"
export function Child({ a, b }) {
  return a;
}
"#;

const APP: &str = r#"
import { Panel } from './panel';

export function App() {
  return <Panel title="x" user={null} />;
}
"#;

fn scenario_d() -> EngineOutput {
    engine()
        .run(
            vec![RawFileChange::modified(
                "src/panel.tsx",
                PANEL_BEFORE,
                PANEL_AFTER,
            )],
            vec![
                ContextFile::new("src/child.tsx", CHILD),
                ContextFile::new("src/app.tsx", APP),
            ],
        )
        .unwrap()
}

const CARD: &str = "export function card(title) {\n  return title;\n}\n";

#[test]
fn test_unexported_function_severs_consumer_edge() {
    let output = scenario_a();

    // the file keeps its identity: its only export became the file root
    let a = output.node("src/a.ts").unwrap();
    assert_eq!(a.status, NodeStatus::Modified);
    assert_eq!(a.before.as_deref(), Some("src/a.ts#foo"));
    assert_eq!(a.after.as_deref(), Some("src/a.ts"));
    assert!(output.node("src/a.ts#foo").is_none());

    let page = output.node("src/b.ts#page").unwrap();
    assert_eq!(page.status, NodeStatus::Unchanged);
    assert!(page.affected);

    let edge = output
        .edge("src/a.ts", "src/b.ts#page", EdgeKind::Call)
        .unwrap();
    assert_eq!(edge.status, EdgeStatus::Severed);
    assert!(edge.after_payload.is_none());

    assert_eq!(output.report.key_edges, vec![edge.edge_id()]);
    assert!(output.report.seed_identities.contains("src/a.ts"));
    assert!(output.report.is_affected("src/b.ts#page"));
    assert!(output
        .report
        .warnings
        .iter()
        .any(|w| w.code == WarningCode::UnresolvedConsumption
            && w.path.as_deref() == Some("src/b.ts")));

    assert_eq!(output.narratives.len(), 1);
    assert_eq!(
        output.narratives[0].ranked_explanation,
        "`src/a.ts` → `src/b.ts#page` (call) was severed: the dependency is gone after the change; \
         it carried #0. 1 affected component(s) downstream of `src/b.ts#page`."
    );
}

#[test]
fn test_removed_file_deletes_its_exports() {
    let output = scenario_removed_a();

    let foo = output.node("src/a.ts#foo").unwrap();
    assert_eq!(foo.status, NodeStatus::Deleted);
    assert!(foo.after.is_none());
    let edge = output
        .edge("src/a.ts#foo", "src/b.ts#page", EdgeKind::Call)
        .unwrap();
    assert_eq!(edge.status, EdgeStatus::Severed);
    assert!(output.node("src/b.ts#page").unwrap().affected);
    assert!(output.narratives[0]
        .ranked_explanation
        .contains("`src/a.ts#foo` no longer exists"));
}

#[test]
fn test_pure_rename_links_identity_unchanged() {
    let output = engine()
        .run(
            vec![RawFileChange::renamed("old/card.ts", "new/card.ts", CARD, CARD)],
            vec![],
        )
        .unwrap();

    assert_eq!(output.nodes.len(), 1);
    let card = output.node("new/card.ts#card").unwrap();
    assert_eq!(card.before.as_deref(), Some("old/card.ts#card"));
    assert_eq!(card.after.as_deref(), Some("new/card.ts#card"));
    assert_relative_eq!(card.match_score.unwrap(), 1.0);
    assert_eq!(card.status, NodeStatus::Unchanged);
    assert!(output.report.seed_identities.is_empty());
    assert!(output.report.affected_identities.is_empty());
}

#[test]
fn test_rename_with_changed_facts_is_modified() {
    let after = "export function card(title, subtitle) {\n  return title + subtitle;\n}\n";
    let output = engine()
        .run(
            vec![RawFileChange::renamed("old/card.ts", "new/card.ts", CARD, after)],
            vec![],
        )
        .unwrap();

    let card = output.node("new/card.ts#card").unwrap();
    assert_eq!(card.before.as_deref(), Some("old/card.ts#card"));
    assert_eq!(card.status, NodeStatus::Modified);
    assert!(card.match_score.unwrap() > 0.5);
}

fn duplicated_move() -> (Vec<RawFileChange>, Vec<ContextFile>) {
    (
        vec![
            RawFileChange::removed("old/card.ts", CARD),
            RawFileChange::added("new/card_a.ts", CARD),
            RawFileChange::added("new/card_b.ts", CARD),
        ],
        vec![],
    )
}

#[test]
fn test_tied_candidates_fail_with_identity_conflict() {
    let (records, context) = duplicated_move();
    let err = engine().run(records, context).unwrap_err();
    match err {
        ContractGraphError::IdentityMatchConflict { before, candidates } => {
            assert_eq!(before, "old/card.ts#card");
            assert_eq!(
                candidates,
                vec!["new/card_a.ts#card".to_string(), "new/card_b.ts#card".to_string()]
            );
        }
        other => panic!("expected an identity conflict, got {:?}", other),
    }
}

#[test]
fn test_override_resolves_identity_conflict() {
    let (records, context) = duplicated_move();
    let output = engine()
        .with_overrides(vec![IdentityOverride::link(
            "old/card.ts#card",
            "new/card_b.ts#card",
        )])
        .run(records, context)
        .unwrap();

    let linked = output.node("new/card_b.ts#card").unwrap();
    assert_eq!(linked.before.as_deref(), Some("old/card.ts#card"));
    assert_eq!(linked.status, NodeStatus::Unchanged);
    assert_eq!(
        output.node("new/card_a.ts#card").unwrap().status,
        NodeStatus::Created
    );
}

#[test]
fn test_unmatched_override_keeps_before_component_deleted() {
    let (records, context) = duplicated_move();
    let output = engine()
        .with_overrides(vec![IdentityOverride::unmatched("old/card.ts#card")])
        .run(records, context)
        .unwrap();

    let statuses: Vec<(&str, NodeStatus)> = output
        .nodes
        .iter()
        .map(|n| (n.identity.as_str(), n.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("new/card_a.ts#card", NodeStatus::Created),
            ("new/card_b.ts#card", NodeStatus::Created),
            ("old/card.ts#card", NodeStatus::Deleted),
        ]
    );
}

#[test]
fn test_invalid_override_is_rejected() {
    let (records, context) = duplicated_move();
    let err = engine()
        .with_overrides(vec![IdentityOverride::link("old/missing.ts#x", "new/card_a.ts#card")])
        .run(records, context)
        .unwrap_err();
    assert!(matches!(err, ContractGraphError::InvalidOverride(_)));
}

#[test]
fn test_dropped_jsx_attribute_simplifies_edge() {
    let output = scenario_d();

    let edge = output
        .edge("src/child.tsx#Child", "src/panel.tsx#Panel", EdgeKind::PropFlow)
        .unwrap();
    assert_eq!(edge.status, EdgeStatus::Simplified);
    assert_eq!(edge.narrowing().dropped_fields, vec!["b".to_string()]);

    let downstream = output
        .edge("src/panel.tsx#Panel", "src/app.tsx#App", EdgeKind::PropFlow)
        .unwrap();
    assert_eq!(downstream.status, EdgeStatus::Unchanged);

    assert_eq!(output.node("src/panel.tsx#Panel").unwrap().status, NodeStatus::Modified);
    assert!(output.node("src/app.tsx#App").unwrap().affected);
    assert!(output.node("src/child.tsx#Child").unwrap().affected);

    assert_eq!(output.report.severed_edges.len(), 1);
    let ranked = &output.report.severed_edges[0];
    assert_eq!(ranked.edge_id, edge.edge_id());
    assert_eq!(ranked.consequence_score, 2);
    assert_eq!(
        output.narratives[0].ranked_explanation,
        "`src/child.tsx#Child` → `src/panel.tsx#Panel` (prop-flow) was simplified: dropped b. \
         2 affected component(s) downstream of `src/panel.tsx#Panel`."
    );
}

#[test]
fn test_every_identity_gets_exactly_one_status() {
    for output in [scenario_a(), scenario_removed_a(), scenario_d()] {
        let identities: BTreeSet<&str> = output.nodes.iter().map(|n| n.identity.as_str()).collect();
        assert_eq!(identities.len(), output.nodes.len());
        assert_eq!(identities.len(), output.identities.len());

        for component in output.before.components() {
            let owners = output
                .nodes
                .iter()
                .filter(|n| n.before.as_deref() == Some(component.id.as_str()))
                .count();
            assert_eq!(owners, 1, "{} is owned {} times", component.id, owners);
        }
        for component in output.after.components() {
            let owners = output
                .nodes
                .iter()
                .filter(|n| n.after.as_deref() == Some(component.id.as_str()))
                .count();
            assert_eq!(owners, 1, "{} is owned {} times", component.id, owners);
        }
    }
}

#[test]
fn test_deleted_endpoints_always_sever() {
    let output = scenario_removed_a();
    let deleted: BTreeSet<&str> = output
        .nodes
        .iter()
        .filter(|n| n.status == NodeStatus::Deleted)
        .map(|n| n.identity.as_str())
        .collect();
    assert!(!deleted.is_empty());
    for edge in &output.edges {
        if deleted.contains(edge.from.as_str()) || deleted.contains(edge.to.as_str()) {
            assert_eq!(edge.status, EdgeStatus::Severed, "{}", edge.edge_id());
        }
    }
}

#[test]
fn test_propagation_is_idempotent() {
    let output = scenario_d();
    let propagator = BlastRadiusPropagator::new(output_budget());
    let rerun = propagator.propagate(&output.nodes, &output.edges).unwrap();
    assert_eq!(rerun.affected, output.report.affected_identities);

    let mut nodes = output.nodes.clone();
    rerun.apply(&mut nodes);
    assert_eq!(nodes, output.nodes);
}

fn output_budget() -> usize {
    engine().config().propagation.max_node_visits
}

#[test]
fn test_identical_input_gives_identical_output() {
    let first = scenario_d();
    let second = scenario_d();
    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.digest().unwrap(), second.digest().unwrap());
    assert_eq!(first.digest().unwrap().len(), 64);
}

#[test]
fn test_output_does_not_depend_on_extraction_concurrency() {
    let records = || {
        vec![
            RawFileChange::modified("src/panel.tsx", PANEL_BEFORE, PANEL_AFTER),
            RawFileChange::modified("src/a.ts", A_BEFORE, A_AFTER),
        ]
    };
    let context = || {
        vec![
            ContextFile::new("src/child.tsx", CHILD),
            ContextFile::new("src/app.tsx", APP),
            ContextFile::new("src/b.ts", B),
        ]
    };
    let digests: Vec<String> = [1, 8]
        .into_iter()
        .map(|concurrency| {
            let mut config = EngineConfig::default();
            config.extraction.concurrency = concurrency;
            let output = ContractDiffEngine::new(config)
                .unwrap()
                .run(records(), context())
                .unwrap();
            output.digest().unwrap()
        })
        .collect();
    assert_eq!(digests[0], digests[1]);
}

#[test]
fn test_empty_change_set_is_rejected() {
    let err = engine()
        .run(vec![], vec![ContextFile::new("src/b.ts", B)])
        .unwrap_err();
    assert!(matches!(err, ContractGraphError::NoChangesFound));
    assert!(err.is_ingest_error());
}

#[test]
fn test_run_changeset_matches_run() {
    let records = vec![RawFileChange::modified("src/a.ts", A_BEFORE, A_AFTER)];
    let context = vec![ContextFile::new("src/b.ts", B)];
    let (changes, _) = ChangeIngestor::ingest(records, context).unwrap();
    let output = engine().run_changeset(&changes).unwrap();
    assert_eq!(output.nodes, scenario_a().nodes);
}

#[test]
fn test_classified_graph_attaches_classifications() {
    let output = scenario_a();

    let before = output.classified_graph(Snapshot::Before);
    assert_eq!(before.nodes.len(), output.before.component_count());
    assert!(before.nodes.iter().all(|n| n.classification.is_some()));
    let severed = before
        .edges
        .iter()
        .find(|e| e.edge.from == "src/a.ts#foo")
        .and_then(|e| e.classification)
        .unwrap();
    assert_eq!(severed.status, EdgeStatus::Severed);

    let after = output.classified_graph(Snapshot::After);
    assert!(after.edges.is_empty());
    assert!(after
        .nodes
        .iter()
        .all(|n| n.classification.map(|c| c.status) != Some(NodeStatus::Deleted)));
}
