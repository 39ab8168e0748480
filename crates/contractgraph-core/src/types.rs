use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

pub type ComponentId = String;

/// Prefix for synthetic shared-store components.
pub const STORE_PREFIX: &str = "@store/";
/// Prefix for synthetic external-endpoint components.
pub const EXTERNAL_PREFIX: &str = "@external/";
/// Store key used when the accessed key cannot be determined statically.
pub const DYNAMIC_STORE_KEY: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Snapshot {
    Before,
    After,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Before => write!(f, "before"),
            Snapshot::After => write!(f, "after"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
    Renamed,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
            ChangeKind::Renamed => "renamed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "added" | "add" | "a" => Ok(ChangeKind::Added),
            "removed" | "deleted" | "d" => Ok(ChangeKind::Removed),
            "modified" | "changed" | "m" => Ok(ChangeKind::Modified),
            "renamed" | "moved" | "r" => Ok(ChangeKind::Renamed),
            other => Err(format!("unknown change kind: {}", other)),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Confidence {
    #[default]
    High,
    Low,
}

impl Confidence {
    /// The weaker of two confidences.
    pub fn min(self, other: Confidence) -> Confidence {
        if self == Confidence::Low || other == Confidence::Low {
            Confidence::Low
        } else {
            Confidence::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    PropFlow,
    StateRead,
    StateWrite,
    Call,
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EdgeKind::PropFlow => "prop-flow",
            EdgeKind::StateRead => "state-read",
            EdgeKind::StateWrite => "state-write",
            EdgeKind::Call => "call",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    /// An exported value, function, class or type.
    Export,
    /// A value imported from another module of the code base.
    Import,
    StateRead,
    StateWrite,
    /// A call leaving the code base (HTTP endpoint, fetch, ...).
    ExternalCall,
}

impl SymbolKind {
    pub fn is_produced(&self) -> bool {
        matches!(
            self,
            SymbolKind::Export | SymbolKind::StateWrite | SymbolKind::ExternalCall
        )
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct FieldShape {
    pub optional: bool,
}

/// The data carried along a contract: named or positional (`#0`, `#1`, ...)
/// fields, the guards gating it, and whether unknown fields may also flow.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct PayloadShape {
    pub fields: BTreeMap<String, FieldShape>,
    pub guards: BTreeSet<String>,
    pub open: bool,
}

/// How an after payload narrowed relative to its before payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrowing {
    pub dropped_fields: Vec<String>,
    pub now_optional: Vec<String>,
    pub removed_guards: Vec<String>,
}

impl Narrowing {
    pub fn is_narrowed(&self) -> bool {
        !(self.dropped_fields.is_empty()
            && self.now_optional.is_empty()
            && self.removed_guards.is_empty())
    }
}

fn is_positional(field: &str) -> bool {
    field.starts_with('#')
}

impl PayloadShape {
    /// A payload that accepts anything, used for values whose shape is unknown.
    pub fn open() -> Self {
        Self {
            open: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.guards.is_empty() && !self.open
    }

    pub fn with_field(mut self, name: impl Into<String>, optional: bool) -> Self {
        self.add_field(name, optional);
        self
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guards.insert(guard.into());
        self
    }

    /// Adds a field; a field seen both required and optional stays required.
    pub fn add_field(&mut self, name: impl Into<String>, optional: bool) {
        self.fields
            .entry(name.into())
            .and_modify(|f| f.optional = f.optional && optional)
            .or_insert(FieldShape { optional });
    }

    pub fn merge(&mut self, other: &PayloadShape) {
        for (name, shape) in &other.fields {
            self.add_field(name.clone(), shape.optional);
        }
        self.guards.extend(other.guards.iter().cloned());
        self.open |= other.open;
    }

    /// Restricts a consumer's usage payload to what the producer declares it
    /// accepts. Fields are only dropped when the producer's declaration is closed
    /// and speaks the same namespace (named vs positional) as the field.
    pub fn constrain_by(&self, declared: &PayloadShape) -> PayloadShape {
        let mut out = PayloadShape {
            fields: BTreeMap::new(),
            guards: self.guards.clone(),
            open: self.open,
        };
        let declares_named = declared.fields.keys().any(|k| !is_positional(k));
        let declares_positional = declared.fields.keys().any(|k| is_positional(k));

        for (name, shape) in &self.fields {
            match declared.fields.get(name) {
                Some(decl) => {
                    out.fields.insert(
                        name.clone(),
                        FieldShape {
                            optional: shape.optional || decl.optional,
                        },
                    );
                }
                None => {
                    let same_namespace = if is_positional(name) {
                        declares_positional || !declares_named
                    } else {
                        declares_named
                    };
                    if declared.open || !same_namespace {
                        out.fields.insert(name.clone(), *shape);
                    }
                }
            }
        }
        out
    }

    pub fn narrowing_to(&self, after: &PayloadShape) -> Narrowing {
        let mut narrowing = Narrowing::default();
        for (name, before) in &self.fields {
            match after.fields.get(name) {
                None => narrowing.dropped_fields.push(name.clone()),
                Some(after) if !before.optional && after.optional => {
                    narrowing.now_optional.push(name.clone())
                }
                Some(_) => {}
            }
        }
        narrowing.removed_guards = self.guards.difference(&after.guards).cloned().collect();
        narrowing
    }

    pub fn describe_fields(&self) -> String {
        if self.fields.is_empty() {
            return "no fields".to_string();
        }
        self.fields
            .iter()
            .map(|(name, shape)| {
                if shape.optional {
                    format!("{}?", name)
                } else {
                    name.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// A conditional gate or assertion the extractor saw around contract facts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Guard {
    pub expression: String,
}

impl Guard {
    pub fn new(expression: &str) -> Self {
        Self {
            expression: normalize_expression(expression),
        }
    }
}

/// Collapses whitespace so formatting changes never look like contract changes.
pub fn normalize_expression(expression: &str) -> String {
    expression.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol {
    pub kind: SymbolKind,
    /// Exported/imported name, store key or external endpoint.
    pub name: String,
    /// Normalized module the symbol is imported from.
    pub origin: Option<String>,
    /// Default export, or an import of a module's default export.
    pub default: bool,
    pub via: EdgeKind,
    pub payload: PayloadShape,
    /// Exported declaration whose body contains the fact; `None` at module level.
    pub scope: Option<String>,
    pub confidence: Confidence,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: impl Into<String>, via: EdgeKind) -> Self {
        Self {
            kind,
            name: name.into(),
            origin: None,
            default: false,
            via,
            payload: PayloadShape::default(),
            scope: None,
            confidence: Confidence::High,
        }
    }

    pub fn export(name: impl Into<String>) -> Self {
        Self::new(SymbolKind::Export, name, EdgeKind::PropFlow)
    }

    pub fn import(name: impl Into<String>, origin: Option<String>) -> Self {
        let mut symbol = Self::new(SymbolKind::Import, name, EdgeKind::PropFlow);
        symbol.origin = origin;
        symbol
    }

    pub fn state_read(key: impl Into<String>) -> Self {
        Self::new(SymbolKind::StateRead, key, EdgeKind::StateRead)
    }

    pub fn state_write(key: impl Into<String>) -> Self {
        Self::new(SymbolKind::StateWrite, key, EdgeKind::StateWrite)
    }

    pub fn external_call(endpoint: impl Into<String>) -> Self {
        Self::new(SymbolKind::ExternalCall, endpoint, EdgeKind::Call)
    }

    pub fn with_payload(mut self, payload: PayloadShape) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_scope(mut self, scope: Option<String>) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn is_low_confidence(&self) -> bool {
        self.confidence == Confidence::Low
    }
}

/// Contract facts of one file in one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContractFacts {
    pub produces: Vec<Symbol>,
    pub consumes: Vec<Symbol>,
    pub invariants: Vec<Guard>,
    pub confidence: Confidence,
}

impl ContractFacts {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.produces.is_empty() && self.consumes.is_empty() && self.invariants.is_empty()
    }

    /// Sorts and deduplicates every list and derives the file confidence.
    /// A file already marked Low (e.g. unsupported language) stays Low.
    pub fn normalize(&mut self) {
        self.produces.sort();
        self.produces.dedup();
        self.consumes.sort();
        self.consumes.dedup();
        self.invariants.sort();
        self.invariants.dedup();
        let any_low = self
            .produces
            .iter()
            .chain(self.consumes.iter())
            .any(|s| s.is_low_confidence());
        if any_low {
            self.confidence = Confidence::Low;
        }
    }

    pub fn exports(&self) -> impl Iterator<Item = &Symbol> {
        self.produces
            .iter()
            .filter(|s| s.kind == SymbolKind::Export)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Export,
    FileRoot,
    Store,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Component {
    pub id: ComponentId,
    pub display_name: String,
    pub path: String,
    pub snapshot: Snapshot,
    pub kind: ComponentKind,
}

impl Component {
    pub fn export(path: &str, name: &str, snapshot: Snapshot) -> Self {
        Self {
            id: format!("{}#{}", path, name),
            display_name: name.to_string(),
            path: path.to_string(),
            snapshot,
            kind: ComponentKind::Export,
        }
    }

    pub fn file_root(path: &str, snapshot: Snapshot) -> Self {
        Self {
            id: path.to_string(),
            display_name: file_stem(path).to_string(),
            path: path.to_string(),
            snapshot,
            kind: ComponentKind::FileRoot,
        }
    }

    pub fn store(key: &str, snapshot: Snapshot) -> Self {
        Self {
            id: format!("{}{}", STORE_PREFIX, key),
            display_name: key.to_string(),
            path: STORE_PREFIX.trim_end_matches('/').to_string(),
            snapshot,
            kind: ComponentKind::Store,
        }
    }

    pub fn external(endpoint: &str, snapshot: Snapshot) -> Self {
        Self {
            id: format!("{}{}", EXTERNAL_PREFIX, endpoint),
            display_name: endpoint.to_string(),
            path: EXTERNAL_PREFIX.trim_end_matches('/').to_string(),
            snapshot,
            kind: ComponentKind::External,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, ComponentKind::Store | ComponentKind::External)
    }
}

/// File name without directories or extension.
pub fn file_stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.find('.') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// Path with its final extension removed.
pub fn strip_extension(path: &str) -> &str {
    let name_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[name_start..].rfind('.') {
        Some(0) | None => path,
        Some(idx) => &path[..name_start + idx],
    }
}

/// Directed data-flow edge from producer to consumer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: ComponentId,
    pub to: ComponentId,
    pub kind: EdgeKind,
    pub payload: PayloadShape,
    pub confidence: Confidence,
}

impl Edge {
    pub fn new(from: ComponentId, to: ComponentId, kind: EdgeKind) -> Self {
        Self {
            from,
            to,
            kind,
            payload: PayloadShape::default(),
            confidence: Confidence::High,
        }
    }

    pub fn key(&self) -> (ComponentId, ComponentId, EdgeKind) {
        (self.from.clone(), self.to.clone(), self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_merge_keeps_required_over_optional() {
        let mut a = PayloadShape::default().with_field("x", true);
        let b = PayloadShape::default()
            .with_field("x", false)
            .with_field("y", true)
            .with_guard("user");
        a.merge(&b);
        assert!(!a.fields["x"].optional);
        assert!(a.fields["y"].optional);
        assert!(a.guards.contains("user"));
    }

    #[test]
    fn constrain_drops_fields_a_closed_producer_no_longer_accepts() {
        let usage = PayloadShape::default()
            .with_field("title", false)
            .with_field("onClose", false);
        let declared = PayloadShape::default()
            .with_field("title", false)
            .with_field("size", true);
        let constrained = usage.constrain_by(&declared);
        assert_eq!(constrained.fields.len(), 1);
        assert!(constrained.fields.contains_key("title"));
    }

    #[test]
    fn constrain_keeps_fields_for_open_or_foreign_namespace() {
        let usage = PayloadShape::default().with_field("#0", false);
        let named = PayloadShape::default().with_field("title", false);
        assert!(usage.constrain_by(&named).fields.contains_key("#0"));

        let open = PayloadShape::open();
        let usage = PayloadShape::default().with_field("anything", false);
        assert!(usage.constrain_by(&open).fields.contains_key("anything"));
    }

    #[test]
    fn constrain_marks_declared_optional_fields() {
        let usage = PayloadShape::default().with_field("size", false);
        let declared = PayloadShape::default().with_field("size", true);
        assert!(usage.constrain_by(&declared).fields["size"].optional);
    }

    #[test]
    fn narrowing_detects_dropped_optional_and_guards() {
        let before = PayloadShape::default()
            .with_field("a", false)
            .with_field("b", false)
            .with_guard("isReady");
        let after = PayloadShape::default().with_field("a", true);
        let n = before.narrowing_to(&after);
        assert_eq!(n.dropped_fields, vec!["b".to_string()]);
        assert_eq!(n.now_optional, vec!["a".to_string()]);
        assert_eq!(n.removed_guards, vec!["isReady".to_string()]);
        assert!(n.is_narrowed());
    }

    #[test]
    fn growing_payload_is_not_narrowing() {
        let before = PayloadShape::default().with_field("a", false);
        let after = PayloadShape::default()
            .with_field("a", false)
            .with_field("b", false);
        assert!(!before.narrowing_to(&after).is_narrowed());
    }

    #[test]
    fn component_ids_and_path_helpers() {
        let c = Component::export("src/ui/Button.tsx", "Button", Snapshot::After);
        assert_eq!(c.id, "src/ui/Button.tsx#Button");
        let root = Component::file_root("src/ui/index.ts", Snapshot::Before);
        assert_eq!(root.display_name, "index");
        assert_eq!(Component::store("cart.items", Snapshot::After).id, "@store/cart.items");
        assert_eq!(strip_extension("src/a.test.ts"), "src/a.test");
        assert_eq!(strip_extension("src/.env"), "src/.env");
        assert_eq!(file_stem("lib/.hidden"), ".hidden");
    }

    #[test]
    fn facts_normalize_sorts_and_derives_confidence() {
        let mut facts = ContractFacts {
            produces: vec![Symbol::export("b"), Symbol::export("a"), Symbol::export("a")],
            consumes: vec![Symbol::state_read("k").with_confidence(Confidence::Low)],
            invariants: vec![Guard::new("x   &&  y")],
            confidence: Confidence::High,
        };
        facts.normalize();
        assert_eq!(facts.produces.len(), 2);
        assert_eq!(facts.produces[0].name, "a");
        assert_eq!(facts.confidence, Confidence::Low);
        assert_eq!(facts.invariants[0].expression, "x && y");
    }

    #[test]
    fn change_kind_parses_common_spellings() {
        assert_eq!("Deleted".parse::<ChangeKind>().unwrap(), ChangeKind::Removed);
        assert_eq!("R".parse::<ChangeKind>().unwrap(), ChangeKind::Renamed);
        assert!("copied".parse::<ChangeKind>().is_err());
    }
}
