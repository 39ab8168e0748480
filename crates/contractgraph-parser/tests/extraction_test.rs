use contractgraph_core::{
    Confidence, EdgeKind, ExtractionConfig, Snapshot, Symbol, SymbolKind, WarningCode,
    ChangeIngestor, ContextFile, RawFileChange,
};
use contractgraph_parser::{ContractExtractor, Extraction, ExtractionPool};

fn extract(path: &str, source: &str) -> Extraction {
    ContractExtractor::new(&ExtractionConfig::default())
        .unwrap()
        .extract(path, Some(source))
}

fn produced<'a>(extraction: &'a Extraction, name: &str) -> &'a Symbol {
    extraction
        .facts
        .produces
        .iter()
        .find(|s| s.name == name)
        .unwrap_or_else(|| panic!("no produced symbol {}", name))
}

fn consumed<'a>(extraction: &'a Extraction, name: &str) -> Vec<&'a Symbol> {
    extraction
        .facts
        .consumes
        .iter()
        .filter(|s| s.name == name)
        .collect()
}

#[test]
fn test_jsx_prop_flow_inside_guarded_component() {
    let src = r#"
import { Child } from './Child';

export function Panel({ title, user }) {
  if (!user) return null;
  return <Child a={title} b={user.name} />;
}
"#;
    let extraction = extract("src/ui/Panel.tsx", src);

    let panel = produced(&extraction, "Panel");
    assert_eq!(panel.kind, SymbolKind::Export);
    assert!(panel.payload.fields.contains_key("title"));
    assert!(panel.payload.fields.contains_key("user"));
    assert!(!panel.payload.open);

    let child = consumed(&extraction, "Child");
    assert_eq!(child.len(), 1);
    let child = child[0];
    assert_eq!(child.via, EdgeKind::PropFlow);
    assert_eq!(child.origin.as_deref(), Some("src/ui/Child"));
    assert_eq!(child.scope.as_deref(), Some("Panel"));
    assert!(child.payload.fields.contains_key("a"));
    assert!(child.payload.fields.contains_key("b"));
    assert!(child.payload.guards.contains("user"));
    assert_eq!(extraction.facts.confidence, Confidence::High);
}

#[test]
fn test_export_forms_and_reexports() {
    let src = r#"
export { fetchUser as loadUser } from './users';
export * from './types';
export default function App(props) {}
export const Button = ({ label, onClick = noop }) => null;
"#;
    let extraction = extract("src/lib/index.ts", src);

    assert!(produced(&extraction, "loadUser").payload.open);
    let app = produced(&extraction, "App");
    assert!(app.default);
    assert!(app.payload.fields.contains_key("#0"));
    let button = produced(&extraction, "Button");
    assert!(!button.payload.fields["label"].optional);
    assert!(button.payload.fields["onClick"].optional);

    let fetch_user = consumed(&extraction, "fetchUser");
    assert_eq!(fetch_user[0].origin.as_deref(), Some("src/lib/users"));

    let wildcard = consumed(&extraction, "*");
    assert_eq!(wildcard[0].origin.as_deref(), Some("src/lib/types"));
    assert!(wildcard[0].is_low_confidence());
    assert_eq!(extraction.facts.confidence, Confidence::Low);
    assert!(extraction
        .warnings
        .iter()
        .any(|w| w.code == WarningCode::ExtractionAmbiguous));
}

#[test]
fn test_namespace_default_and_unused_imports() {
    let src = r#"
import * as api from './api';
import helpers from '../shared/helpers';
import { unused } from './x';
import React from 'react';

export function page(id) {
  return api.load(id, 1) + helpers.format(id);
}
"#;
    let extraction = extract("src/page.ts", src);

    let load = consumed(&extraction, "load");
    assert_eq!(load[0].via, EdgeKind::Call);
    assert_eq!(load[0].origin.as_deref(), Some("src/api"));
    assert_eq!(load[0].payload.fields.len(), 2);

    let helpers = consumed(&extraction, "helpers");
    assert!(helpers[0].default);
    assert_eq!(helpers[0].origin.as_deref(), Some("shared/helpers"));
    assert!(helpers[0].payload.fields.contains_key("format"));

    let unused = consumed(&extraction, "unused");
    assert_eq!(unused.len(), 1);
    assert_eq!(unused[0].scope, None);

    // bare package imports are not part of the code base
    assert!(consumed(&extraction, "React").is_empty());
}

#[test]
fn test_computed_dynamic_import_is_low_confidence() {
    let src = "export async function load(name) {\n  const m = await import(name);\n  return m;\n}\n";
    let extraction = extract("src/loader.js", src);
    let wildcard = consumed(&extraction, "*");
    assert_eq!(wildcard.len(), 1);
    assert_eq!(wildcard[0].origin, None);
    assert!(wildcard[0].is_low_confidence());
    assert_eq!(wildcard[0].scope.as_deref(), Some("load"));
}

#[test]
fn test_rust_items_uses_and_assertions() {
    let api = r#"
pub struct Request {
    pub id: u64,
    #[serde(default)]
    pub note: Option<String>,
}

pub fn send(req: Request, retries: u32) -> bool {
    assert!(retries < 5);
    true
}
"#;
    let extraction = extract("src/api/mod.rs", api);
    let request = produced(&extraction, "Request");
    assert!(!request.payload.fields["id"].optional);
    assert!(request.payload.fields["note"].optional);
    let send = produced(&extraction, "send");
    assert_eq!(send.payload.fields.len(), 2);
    assert!(extraction
        .facts
        .invariants
        .iter()
        .any(|g| g.expression == "retries < 5"));

    let app = r#"
use crate::api::{send, Request};
use crate::ui;

pub fn run() {
    let ok = send(Request { id: 1, note: None }, 3);
    ui::render(ok);
}
"#;
    let extraction = extract("src/app.rs", app);
    let send = consumed(&extraction, "send");
    assert_eq!(send[0].via, EdgeKind::Call);
    assert_eq!(send[0].origin.as_deref(), Some("api"));
    assert_eq!(send[0].scope.as_deref(), Some("run"));

    let request = consumed(&extraction, "Request");
    assert!(request[0].payload.fields.contains_key("id"));
    assert!(request[0].payload.fields["note"].optional);

    let render = consumed(&extraction, "render");
    assert_eq!(render[0].origin.as_deref(), Some("ui"));
    assert_eq!(render[0].via, EdgeKind::Call);
}

#[test]
fn test_regex_literal_with_backtick_keeps_later_exports() {
    let src = "const re = /`/;\nexport function foo(x) { return x; }\n";
    let extraction = extract("src/a.ts", src);
    let foo = produced(&extraction, "foo");
    assert!(foo.payload.fields.contains_key("#0"));
    assert_eq!(extraction.facts.confidence, Confidence::High);
    assert!(extraction.warnings.is_empty());
}

#[test]
fn test_jsx_text_apostrophe_keeps_later_props() {
    let src = r#"
import { Child } from './Child';

export function Card({ title }) {
  return <div><p>Don't</p><Child a={title} /></div>;
}
"#;
    let extraction = extract("src/Card.jsx", src);
    let child = consumed(&extraction, "Child");
    assert_eq!(child.len(), 1);
    assert_eq!(child[0].via, EdgeKind::PropFlow);
    assert!(child[0].payload.fields.contains_key("a"));
    assert_eq!(child[0].scope.as_deref(), Some("Card"));
    assert_eq!(extraction.facts.confidence, Confidence::High);
}

#[test]
fn test_syntax_errors_mark_the_file_low_confidence() {
    let src = "export function broken(x) {\n  return x +;\n}\n";
    let extraction = extract("src/broken.ts", src);
    assert_eq!(extraction.facts.confidence, Confidence::Low);
    assert!(extraction
        .warnings
        .iter()
        .any(|w| w.code == WarningCode::ExtractionAmbiguous && w.message.contains("syntax error")));

    let fine = extract("src/fine.ts", "export function fine(x) {\n  return x + 1;\n}\n");
    assert_eq!(fine.facts.confidence, Confidence::High);
}

#[test]
fn test_pool_extracts_whole_snapshot_in_path_order() {
    let records = vec![
        RawFileChange::modified("src/b.ts", "export const b = 1;", "export const b = 2;"),
        RawFileChange::added("src/a.ts", "import { b } from './b';\nexport function a() { return b; }"),
    ];
    let context = vec![ContextFile::new("README.md", "# notes")];
    let (changes, _) = ChangeIngestor::ingest(records, context).unwrap();

    let extractor = ContractExtractor::new(&ExtractionConfig::default()).unwrap();
    let pool = ExtractionPool::new(2).unwrap();
    let after = pool.extract_snapshot(&extractor, &changes.snapshot_files(Snapshot::After));
    let paths: Vec<&str> = after.files.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["README.md", "src/a.ts", "src/b.ts"]);
    assert_eq!(after.warnings.len(), 1);
    assert_eq!(after.warnings[0].code, WarningCode::UnsupportedLanguage);

    let before = pool.extract_snapshot(&extractor, &changes.snapshot_files(Snapshot::Before));
    assert!(before.get("src/a.ts").is_none());
    assert!(before.get("src/b.ts").is_some());
}
