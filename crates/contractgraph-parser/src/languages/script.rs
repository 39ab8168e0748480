// ABOUTME: Contract fact collector for JavaScript/TypeScript syntax trees, JSX included
// ABOUTME: Recognizes exports with their parameters, local imports and how each import is used

use super::extractor_utils::{
    call_of, child_by_kind, child_text_by_field, collect_external_call, collect_store_access,
    collect_store_destructure, condition_expression, early_exit_guard, is_field_of,
    marks_optional, named_children, negate, node_text, object_keys, placed, positional_args,
    resolve_origin, Context, FactSink, SharedPatterns,
};
use super::DialectCollector;
use crate::language::Dialect;
use contractgraph_core::{normalize_expression, Confidence, EdgeKind, PayloadShape, Symbol};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;
use tree_sitter::Node;

/// One local name bound by an import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Binding {
    /// Name exported by the origin module.
    pub(crate) imported: String,
    pub(crate) local: String,
    pub(crate) default: bool,
    /// `* as ns` / `const x = require(..)`: members are the imported symbols.
    pub(crate) namespace: bool,
}

struct Import {
    binding: Binding,
    origin: String,
    uses: usize,
}

pub struct ScriptCollector<'s, 't> {
    content: &'s str,
    root: Node<'t>,
    shared: &'s SharedPatterns,
    sink: FactSink<'s>,
    /// Top-level declarations by name: functions, classes and declarators.
    declarations: BTreeMap<String, Node<'t>>,
    /// Node id of an exported declaration -> exported name.
    scopes: BTreeMap<usize, String>,
    imports: Vec<Import>,
    /// Subtrees already handled as imports (`require` declarators).
    skipped: BTreeSet<usize>,
}

fn unquote(text: &str) -> &str {
    text.trim().trim_matches(|c| c == '"' || c == '\'')
}

fn is_loader_call(call: &Node, content: &str) -> bool {
    call.child_by_field_name("function")
        .map(|f| f.kind() == "import" || (f.kind() == "identifier" && node_text(&f, content) == "require"))
        .unwrap_or(false)
}

/// Parameter node with type annotations and defaults peeled off.
fn unwrap_param<'t>(param: Node<'t>) -> Node<'t> {
    match param.kind() {
        "required_parameter" | "optional_parameter" => {
            param.child_by_field_name("pattern").unwrap_or(param)
        }
        "assignment_pattern" => param.child_by_field_name("left").unwrap_or(param),
        _ => param,
    }
}

fn is_this_param(param: &Node) -> bool {
    unwrap_param(*param).kind() == "this"
}

impl<'s, 't> ScriptCollector<'s, 't> {
    pub fn new(path: &'s str, content: &'s str, root: Node<'t>, shared: &'s SharedPatterns) -> Self {
        Self {
            content,
            root,
            shared,
            sink: FactSink::new(path),
            declarations: BTreeMap::new(),
            scopes: BTreeMap::new(),
            imports: Vec::new(),
            skipped: BTreeSet::new(),
        }
    }

    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.content)
    }

    fn collect_all(mut self) -> FactSink<'s> {
        self.index_declarations();
        for statement in named_children(&self.root) {
            self.collect_module_statement(statement);
        }
        let root = self.root;
        self.visit_children(root, &Context::default());
        self.flush_unused_imports();
        debug!(
            path = self.sink.path,
            produces = self.sink.produces.len(),
            consumes = self.sink.consumes.len(),
            "Collected script contract facts"
        );
        self.sink
    }

    fn index_declarations(&mut self) {
        for statement in named_children(&self.root) {
            let declaration = if statement.kind() == "export_statement" {
                match statement.child_by_field_name("declaration") {
                    Some(declaration) => declaration,
                    None => continue,
                }
            } else {
                statement
            };
            match declaration.kind() {
                "function_declaration" | "generator_function_declaration" | "class_declaration"
                | "abstract_class_declaration" => {
                    if let Some(name) = child_text_by_field(&declaration, "name", self.content) {
                        self.declarations.entry(name.to_string()).or_insert(declaration);
                    }
                }
                "lexical_declaration" | "variable_declaration" => {
                    for declarator in named_children(&declaration) {
                        if declarator.kind() != "variable_declarator" {
                            continue;
                        }
                        if let Some(name) = declarator.child_by_field_name("name") {
                            if name.kind() == "identifier" {
                                self.declarations
                                    .entry(self.text(&name).to_string())
                                    .or_insert(declarator);
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }

    fn export(&mut self, name: &str, default: bool, payload: PayloadShape, scope: Option<Node<'t>>) {
        if let Some(scope) = scope {
            self.scopes.entry(scope.id()).or_insert_with(|| name.to_string());
        }
        self.sink
            .produce(Symbol::export(name).with_default(default).with_payload(payload));
    }

    /// Declared parameters of a `formal_parameters` list.
    fn params(&self, list: &Node) -> PayloadShape {
        let parts: Vec<Node> = named_children(list)
            .into_iter()
            .filter(|p| !is_this_param(p))
            .collect();

        let mut payload = PayloadShape::default();
        if let [only] = parts.as_slice() {
            let pattern = unwrap_param(*only);
            if pattern.kind() == "object_pattern" {
                return self.destructured(&pattern);
            }
        }
        for (idx, part) in parts.iter().enumerate() {
            let pattern = unwrap_param(*part);
            if pattern.kind() == "rest_pattern" || part.kind() == "rest_pattern" {
                payload.open = true;
                continue;
            }
            let optional = matches!(part.kind(), "assignment_pattern" | "optional_parameter")
                || part.child_by_field_name("value").is_some();
            payload.add_field(format!("#{}", idx), optional);
        }
        payload
    }

    fn destructured(&self, pattern: &Node) -> PayloadShape {
        let mut payload = PayloadShape::default();
        for item in named_children(pattern) {
            match item.kind() {
                "shorthand_property_identifier_pattern" => {
                    payload.add_field(self.text(&item), false)
                }
                "object_assignment_pattern" => {
                    if let Some(left) = item.child_by_field_name("left") {
                        payload.add_field(self.text(&left), true);
                    }
                }
                "pair_pattern" => {
                    if let Some(key) = item.child_by_field_name("key") {
                        let defaulted = item
                            .child_by_field_name("value")
                            .map(|v| v.kind() == "assignment_pattern")
                            .unwrap_or(false);
                        payload.add_field(unquote(self.text(&key)), defaulted);
                    }
                }
                "rest_pattern" => payload.open = true,
                _ => {}
            }
        }
        payload
    }

    /// Parameters of a callable value, if it is one.
    fn callable_params(&self, value: Node<'t>, depth: usize) -> Option<PayloadShape> {
        match value.kind() {
            "arrow_function" => match value.child_by_field_name("parameters") {
                Some(list) => Some(self.params(&list)),
                None => value
                    .child_by_field_name("parameter")
                    .map(|_| PayloadShape::default().with_field("#0", false)),
            },
            "function_expression" | "function" | "generator_function" => value
                .child_by_field_name("parameters")
                .map(|list| self.params(&list)),
            "class" => Some(self.class_params(&value)),
            "parenthesized_expression" | "as_expression" | "satisfies_expression" => {
                let inner = named_children(&value).into_iter().next()?;
                self.callable_params(inner, depth)
            }
            // wrappers such as memo(..) / forwardRef(..)
            "call_expression" if depth < 2 => {
                let args = value.child_by_field_name("arguments")?;
                let first = named_children(&args).into_iter().next()?;
                self.callable_params(first, depth + 1)
            }
            "identifier" if depth < 2 => self.local_params(self.text(&value), depth + 1),
            _ => None,
        }
    }

    /// Parameters of a top-level function, class or callable const named `name`.
    fn local_params(&self, name: &str, depth: usize) -> Option<PayloadShape> {
        let declaration = *self.declarations.get(name)?;
        match declaration.kind() {
            "function_declaration" | "generator_function_declaration" => declaration
                .child_by_field_name("parameters")
                .map(|list| self.params(&list)),
            "class_declaration" | "abstract_class_declaration" => {
                Some(self.class_params(&declaration))
            }
            "variable_declarator" => {
                let value = declaration.child_by_field_name("value")?;
                self.callable_params(value, depth)
            }
            _ => None,
        }
    }

    fn class_params(&self, class: &Node) -> PayloadShape {
        let constructor = class.child_by_field_name("body").and_then(|body| {
            named_children(&body).into_iter().find(|member| {
                member.kind() == "method_definition"
                    && child_text_by_field(member, "name", self.content) == Some("constructor")
            })
        });
        constructor
            .and_then(|c| c.child_by_field_name("parameters"))
            .map(|list| self.params(&list))
            .unwrap_or_else(PayloadShape::open)
    }

    fn collect_module_statement(&mut self, statement: Node<'t>) {
        match statement.kind() {
            "import_statement" => self.collect_import(&statement),
            "export_statement" => self.collect_export(statement),
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(&statement) {
                    if declarator.kind() == "variable_declarator" {
                        self.collect_require(declarator);
                    }
                }
            }
            "expression_statement" => {
                if let Some(assignment) = named_children(&statement)
                    .into_iter()
                    .find(|n| n.kind() == "assignment_expression")
                {
                    self.collect_commonjs_export(assignment);
                }
            }
            _ => {}
        }
    }

    fn collect_export(&mut self, statement: Node<'t>) {
        let default = child_by_kind(&statement, "default").is_some();

        if let Some(source) = statement.child_by_field_name("source") {
            self.collect_reexport(&statement, &source);
            return;
        }

        if let Some(declaration) = statement.child_by_field_name("declaration") {
            self.collect_exported_declaration(declaration, default);
            return;
        }

        if let Some(value) = statement.child_by_field_name("value") {
            let named = match value.kind() {
                "identifier" => Some(self.text(&value).to_string()),
                "function_expression" | "function" | "class" | "generator_function" => {
                    child_text_by_field(&value, "name", self.content).map(str::to_string)
                }
                _ => None,
            };
            match named {
                Some(local) if value.kind() == "identifier" => {
                    let payload = self
                        .local_params(&local, 0)
                        .unwrap_or_else(PayloadShape::open);
                    let scope = self.declarations.get(&local).copied();
                    self.export(&local, true, payload, scope);
                }
                named => {
                    let payload = self
                        .callable_params(value, 0)
                        .unwrap_or_else(PayloadShape::open);
                    let name = named.unwrap_or_else(|| "default".to_string());
                    self.export(&name, true, payload, Some(value));
                }
            }
            return;
        }

        if let Some(clause) = child_by_kind(&statement, "export_clause") {
            for specifier in named_children(&clause) {
                if specifier.kind() != "export_specifier" {
                    continue;
                }
                let Some(local) = child_text_by_field(&specifier, "name", self.content) else {
                    continue;
                };
                let local = unquote(local).to_string();
                let exported = child_text_by_field(&specifier, "alias", self.content)
                    .map(|a| unquote(a).to_string())
                    .unwrap_or_else(|| local.clone());
                let default = exported == "default";
                let payload = self
                    .local_params(&local, 0)
                    .unwrap_or_else(PayloadShape::open);
                let name = if default { local.clone() } else { exported };
                let scope = self.declarations.get(&local).copied();
                self.export(&name, default, payload, scope);
            }
        }
    }

    fn collect_exported_declaration(&mut self, declaration: Node<'t>, default: bool) {
        match declaration.kind() {
            "function_declaration" | "generator_function_declaration" | "function_signature" => {
                let name = child_text_by_field(&declaration, "name", self.content)
                    .unwrap_or("default")
                    .to_string();
                let payload = declaration
                    .child_by_field_name("parameters")
                    .map(|list| self.params(&list))
                    .unwrap_or_else(PayloadShape::open);
                self.export(&name, default, payload, Some(declaration));
            }
            "class_declaration" | "abstract_class_declaration" => {
                if let Some(name) = child_text_by_field(&declaration, "name", self.content) {
                    let payload = self.class_params(&declaration);
                    self.export(name, default, payload, Some(declaration));
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                for declarator in named_children(&declaration) {
                    if declarator.kind() != "variable_declarator" {
                        continue;
                    }
                    let Some(name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    if name.kind() != "identifier" {
                        continue;
                    }
                    let payload = declarator
                        .child_by_field_name("value")
                        .and_then(|value| self.callable_params(value, 0))
                        .unwrap_or_else(PayloadShape::open);
                    let name = self.text(&name);
                    self.export(name, false, payload, Some(declarator));
                }
            }
            "ambient_declaration" => {
                if let Some(inner) = named_children(&declaration).into_iter().next() {
                    self.collect_exported_declaration(inner, default);
                }
            }
            // interfaces, type aliases, enums and namespaces
            _ => {
                if let Some(name) = child_text_by_field(&declaration, "name", self.content) {
                    self.export(name, default, PayloadShape::open(), Some(declaration));
                }
            }
        }
    }

    fn collect_reexport(&mut self, statement: &Node<'t>, source: &Node<'t>) {
        let Some(specifier) = self.shared.string_value(source, self.content) else {
            return;
        };
        if !self.shared.is_local(&specifier) {
            return;
        }
        let origin = resolve_origin(self.sink.path, &specifier, Dialect::Script);

        if let Some(clause) = child_by_kind(statement, "export_clause") {
            for item in named_children(&clause) {
                if item.kind() != "export_specifier" {
                    continue;
                }
                let Some(local) = child_text_by_field(&item, "name", self.content) else {
                    continue;
                };
                let local = unquote(local);
                let exported = child_text_by_field(&item, "alias", self.content)
                    .map(unquote)
                    .unwrap_or(local);
                self.sink.produce(
                    Symbol::export(exported)
                        .with_default(exported == "default")
                        .with_payload(PayloadShape::open()),
                );
                self.sink.consume(
                    Symbol::import(local, Some(origin.clone())).with_default(local == "default"),
                );
            }
            return;
        }

        if let Some(namespace) = child_by_kind(statement, "namespace_export") {
            if let Some(alias) = named_children(&namespace).into_iter().next() {
                self.sink.produce(
                    Symbol::export(unquote(self.text(&alias))).with_payload(PayloadShape::open()),
                );
            }
        }
        self.sink
            .ambiguous(&format!("wildcard re-export of `{}`", specifier));
        self.sink
            .consume(Symbol::import("*", Some(origin)).with_confidence(Confidence::Low));
    }

    /// `module.exports = ..` and `exports.name = ..`.
    fn collect_commonjs_export(&mut self, assignment: Node<'t>) {
        let (Some(left), Some(right)) = (
            assignment.child_by_field_name("left"),
            assignment.child_by_field_name("right"),
        ) else {
            return;
        };
        let target: String = self
            .text(&left)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if target == "module.exports" {
            if right.kind() == "object" {
                let keys = object_keys(&right, self.content);
                for key in keys.fields.keys() {
                    let payload = self
                        .local_params(key, 0)
                        .unwrap_or_else(PayloadShape::open);
                    let scope = self.declarations.get(key).copied();
                    self.export(key, false, payload, scope);
                }
            } else {
                let payload = self
                    .callable_params(right, 0)
                    .unwrap_or_else(PayloadShape::open);
                self.export("default", true, payload, Some(right));
            }
            return;
        }
        let name = target
            .strip_prefix("module.exports.")
            .or_else(|| target.strip_prefix("exports."))
            .filter(|n| !n.is_empty() && !n.contains('.'));
        if let Some(name) = name {
            let payload = self
                .callable_params(right, 0)
                .unwrap_or_else(PayloadShape::open);
            self.export(name, false, payload, Some(right));
        }
    }

    fn collect_import(&mut self, statement: &Node) {
        let Some(specifier) = statement
            .child_by_field_name("source")
            .and_then(|source| self.shared.string_value(&source, self.content))
        else {
            return;
        };
        if !self.shared.is_local(&specifier) {
            return;
        }
        let origin = resolve_origin(self.sink.path, &specifier, Dialect::Script);
        for binding in import_bindings(statement, self.content) {
            self.imports.push(Import {
                binding,
                origin: origin.clone(),
                uses: 0,
            });
        }
    }

    /// `const x = require('./x')` and `const { a } = require('./x')`.
    fn collect_require(&mut self, declarator: Node<'t>) {
        let (Some(target), Some(call)) = (
            declarator.child_by_field_name("name"),
            declarator.child_by_field_name("value"),
        ) else {
            return;
        };
        if call.kind() != "call_expression" || !is_loader_call(&call, self.content) {
            return;
        }
        let args = call
            .child_by_field_name("arguments")
            .map(|a| named_children(&a))
            .unwrap_or_default();
        let specifier = match args.as_slice() {
            [only] => self.shared.string_value(only, self.content),
            _ => None,
        };
        // non-literal require: reported as a loader call during the walk
        let Some(specifier) = specifier.filter(|s| !s.contains(":param")) else {
            return;
        };
        self.skipped.insert(declarator.id());
        if !self.shared.is_local(&specifier) {
            return;
        }
        let origin = resolve_origin(self.sink.path, &specifier, Dialect::Script);
        let bindings: Vec<Binding> = match target.kind() {
            "object_pattern" => named_children(&target)
                .into_iter()
                .filter_map(|item| {
                    let (imported, local) = match item.kind() {
                        "shorthand_property_identifier_pattern" => {
                            (self.text(&item), self.text(&item))
                        }
                        "pair_pattern" => (
                            child_text_by_field(&item, "key", self.content)?,
                            child_text_by_field(&item, "value", self.content)?,
                        ),
                        _ => return None,
                    };
                    Some(Binding {
                        imported: unquote(imported).to_string(),
                        local: local.to_string(),
                        default: false,
                        namespace: false,
                    })
                })
                .collect(),
            _ => {
                let local = self.text(&target).to_string();
                vec![Binding {
                    imported: local.clone(),
                    local,
                    default: true,
                    namespace: true,
                }]
            }
        };
        for binding in bindings {
            self.imports.push(Import {
                binding,
                origin: origin.clone(),
                uses: 0,
            });
        }
    }

    fn visit_children(&mut self, node: Node<'t>, ctx: &Context) {
        let mut ctx = ctx.clone();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.visit(child, &ctx);
            if let Some(guard) = early_exit_guard(&child, self.content) {
                self.sink.invariant(&guard);
                ctx = ctx.guarded(&guard);
            }
        }
    }

    fn visit(&mut self, node: Node<'t>, ctx: &Context) {
        if self.skipped.contains(&node.id()) {
            return;
        }
        let scoped;
        let ctx = match self.scopes.get(&node.id()) {
            Some(name) => {
                scoped = ctx.scoped(name);
                &scoped
            }
            None => ctx,
        };

        match node.kind() {
            "import_statement" => return,
            "if_statement" => {
                self.visit_if(node, ctx);
                return;
            }
            "binary_expression" if !ctx.in_condition => {
                let operator = node.child_by_field_name("operator").map(|o| o.kind());
                if let (Some("&&"), Some(left), Some(right)) = (
                    operator,
                    node.child_by_field_name("left"),
                    node.child_by_field_name("right"),
                ) {
                    let guard = normalize_expression(self.text(&left));
                    self.sink.invariant(&guard);
                    self.visit(left, ctx);
                    self.visit(right, &ctx.guarded(&guard));
                    return;
                }
            }
            "ternary_expression" if !ctx.in_condition => {
                if let (Some(condition), Some(consequence), Some(alternative)) = (
                    node.child_by_field_name("condition"),
                    node.child_by_field_name("consequence"),
                    node.child_by_field_name("alternative"),
                ) {
                    let guard = normalize_expression(self.text(&condition));
                    self.sink.invariant(&guard);
                    self.visit(condition, ctx);
                    self.visit(consequence, &ctx.guarded(&guard));
                    self.visit(alternative, &ctx.guarded(&negate(&guard)));
                    return;
                }
            }
            "call_expression" => {
                self.collect_call(node, ctx);
            }
            "variable_declarator" => {
                if let (Some(name), Some(value)) = (
                    node.child_by_field_name("name"),
                    node.child_by_field_name("value"),
                ) {
                    if name.kind() == "object_pattern" && self.shared.is_store(&value, self.content) {
                        collect_store_destructure(&name, self.content, ctx, &mut self.sink);
                    }
                }
            }
            "identifier" | "shorthand_property_identifier" | "type_identifier" => {
                self.collect_usage(node, ctx);
            }
            _ => {}
        }
        if self.shared.is_store(&node, self.content) {
            collect_store_access(node, self.content, self.shared, ctx, &mut self.sink);
        }
        self.visit_children(node, ctx);
    }

    fn visit_if(&mut self, node: Node<'t>, ctx: &Context) {
        let condition = node.child_by_field_name("condition");
        let expression = condition
            .map(|c| condition_expression(&c, self.content))
            .unwrap_or_default();
        if let Some(condition) = condition {
            self.visit(condition, &ctx.condition());
        }
        self.sink.invariant(&expression);
        if let Some(consequence) = node.child_by_field_name("consequence") {
            self.visit(consequence, &ctx.guarded(&expression));
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            let chained = named_children(&alternative)
                .first()
                .map(|n| n.kind() == "if_statement")
                .unwrap_or(false);
            if chained || expression.is_empty() {
                self.visit(alternative, ctx);
            } else {
                let negated = negate(&expression);
                self.sink.invariant(&negated);
                self.visit(alternative, &ctx.guarded(&negated));
            }
        }
    }

    fn collect_call(&mut self, call: Node<'t>, ctx: &Context) {
        collect_external_call(call, self.content, self.shared, ctx, &mut self.sink);

        let Some(function) = call.child_by_field_name("function") else {
            return;
        };
        let callee: String = self
            .text(&function)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if matches!(callee.as_str(), "assert" | "invariant" | "console.assert") {
            if let Some(condition) = call
                .child_by_field_name("arguments")
                .and_then(|args| named_children(&args).into_iter().next())
            {
                self.sink.invariant(self.text(&condition));
            }
            return;
        }

        if !is_loader_call(&call, self.content) {
            return;
        }
        let keyword = if function.kind() == "import" { "import" } else { "require" };
        let args = call
            .child_by_field_name("arguments")
            .map(|a| named_children(&a))
            .unwrap_or_default();
        let literal = match args.as_slice() {
            [only] => self
                .shared
                .string_value(only, self.content)
                .filter(|s| !s.contains(":param")),
            _ => None,
        };
        match literal {
            Some(specifier) if !self.shared.is_local(&specifier) => {}
            Some(specifier) => {
                let origin = resolve_origin(self.sink.path, &specifier, Dialect::Script);
                self.sink.ambiguous(&format!(
                    "`{}('{}')` loads the whole module",
                    keyword, specifier
                ));
                self.sink.consume(placed(
                    Symbol::import("*", Some(origin)).with_confidence(Confidence::Low),
                    ctx,
                ));
            }
            None => {
                self.sink
                    .ambiguous(&format!("`{}` with a computed module specifier", keyword));
                self.sink.consume(placed(
                    Symbol::import("*", None).with_confidence(Confidence::Low),
                    ctx,
                ));
            }
        }
    }

    fn collect_usage(&mut self, node: Node<'t>, ctx: &Context) {
        let name = self.text(&node);
        let Some(idx) = self.imports.iter().position(|i| i.binding.local == name) else {
            return;
        };
        let Some(parent) = node.parent() else {
            return;
        };
        if matches!(parent.kind(), "jsx_closing_element" | "import_specifier") {
            return;
        }
        let binding = self.imports[idx].binding.clone();
        let origin = self.imports[idx].origin.clone();
        self.imports[idx].uses += 1;

        let member = match parent.kind() {
            "member_expression" if is_field_of(&node, "object") => parent
                .child_by_field_name("property")
                .map(|p| (parent, self.text(&p))),
            "nested_type_identifier" if is_field_of(&node, "module") => parent
                .child_by_field_name("name")
                .map(|p| (parent, self.text(&p))),
            _ => None,
        };

        if let Some((access, member_name)) = member {
            if binding.namespace {
                let (via, payload) = match jsx_element_named(&access) {
                    Some(element) => (EdgeKind::PropFlow, self.jsx_attributes(&element, member_name)),
                    None => self.call_or_reference(&access),
                };
                let mut symbol = placed(
                    Symbol::import(member_name, Some(origin)).with_payload(payload),
                    ctx,
                );
                symbol.via = via;
                self.sink.consume(symbol);
            } else {
                let payload = PayloadShape::default().with_field(member_name, false);
                self.consume_binding(&binding, &origin, EdgeKind::PropFlow, payload, ctx);
            }
            return;
        }

        if binding.namespace && !binding.default {
            self.sink
                .ambiguous(&format!("namespace `{}` used as a value", binding.local));
            let symbol = Symbol::import("*", Some(origin)).with_confidence(Confidence::Low);
            self.sink.consume(placed(symbol, ctx));
            return;
        }

        match jsx_element_named(&node) {
            Some(element) => {
                let payload = self.jsx_attributes(&element, &binding.local);
                self.consume_binding(&binding, &origin, EdgeKind::PropFlow, payload, ctx);
            }
            None => {
                let (via, payload) = self.call_or_reference(&node);
                self.consume_binding(&binding, &origin, via, payload, ctx);
            }
        }
    }

    fn consume_binding(
        &mut self,
        binding: &Binding,
        origin: &str,
        via: EdgeKind,
        payload: PayloadShape,
        ctx: &Context,
    ) {
        let symbol = Symbol::import(binding.imported.as_str(), Some(origin.to_string()))
            .with_default(binding.default)
            .with_payload(payload);
        let mut symbol = placed(symbol, ctx);
        symbol.via = via;
        self.sink.consume(symbol);
    }

    /// `name(..)`, `name<T>(..)` and `new name(..)` become calls, everything
    /// else a plain reference.
    fn call_or_reference(&self, node: &Node) -> (EdgeKind, PayloadShape) {
        let call = call_of(node).or_else(|| {
            node.parent()
                .filter(|p| p.kind() == "new_expression" && is_field_of(node, "constructor"))
        });
        match call.and_then(|c| c.child_by_field_name("arguments")) {
            Some(args) => (EdgeKind::Call, positional_args(&args, self.content)),
            None if call.is_some() => (EdgeKind::Call, PayloadShape::default()),
            None => (EdgeKind::PropFlow, PayloadShape::default()),
        }
    }

    /// Attribute names passed on a JSX opening or self-closing element.
    fn jsx_attributes(&mut self, element: &Node, tag: &str) -> PayloadShape {
        let mut payload = PayloadShape::default();
        let mut spread = false;
        for child in named_children(element) {
            match child.kind() {
                "jsx_attribute" => {
                    let parts = named_children(&child);
                    let Some(name) = parts.first() else { continue };
                    let optional = match parts.get(1) {
                        Some(value) if value.kind() == "jsx_expression" => named_children(value)
                            .first()
                            .map(|v| marks_optional(self.text(v)))
                            .unwrap_or(false),
                        _ => false,
                    };
                    payload.add_field(self.text(name), optional);
                }
                "jsx_expression" => spread = true,
                _ => {}
            }
        }
        if spread {
            payload.open = true;
            self.sink.ambiguous(&format!("spread attributes on <{}>", tag));
        }
        payload
    }

    fn flush_unused_imports(&mut self) {
        let unused: Vec<(Binding, String)> = self
            .imports
            .iter()
            .filter(|i| i.uses == 0)
            .map(|i| (i.binding.clone(), i.origin.clone()))
            .collect();
        for (binding, origin) in unused {
            self.consume_binding(
                &binding,
                &origin,
                EdgeKind::PropFlow,
                PayloadShape::default(),
                &Context::default(),
            );
        }
    }
}

/// The opening or self-closing JSX element whose tag is `name`.
fn jsx_element_named<'t>(name: &Node<'t>) -> Option<Node<'t>> {
    let parent = name.parent()?;
    (matches!(parent.kind(), "jsx_opening_element" | "jsx_self_closing_element")
        && is_field_of(name, "name"))
    .then_some(parent)
}

/// Local bindings introduced by an `import` statement.
pub(crate) fn import_bindings(statement: &Node, content: &str) -> Vec<Binding> {
    let Some(clause) = child_by_kind(statement, "import_clause") else {
        return Vec::new();
    };
    let mut bindings = Vec::new();
    for part in named_children(&clause) {
        match part.kind() {
            "identifier" => {
                let local = node_text(&part, content).to_string();
                bindings.push(Binding {
                    imported: local.clone(),
                    local,
                    default: true,
                    namespace: false,
                });
            }
            "namespace_import" => {
                if let Some(alias) = named_children(&part).into_iter().next() {
                    bindings.push(Binding {
                        imported: "*".to_string(),
                        local: node_text(&alias, content).to_string(),
                        default: false,
                        namespace: true,
                    });
                }
            }
            "named_imports" => {
                for specifier in named_children(&part) {
                    if specifier.kind() != "import_specifier" {
                        continue;
                    }
                    let Some(imported) = child_text_by_field(&specifier, "name", content) else {
                        continue;
                    };
                    let imported = unquote(imported);
                    let local = child_text_by_field(&specifier, "alias", content).unwrap_or(imported);
                    bindings.push(Binding {
                        imported: imported.to_string(),
                        local: local.to_string(),
                        default: imported == "default",
                        namespace: false,
                    });
                }
            }
            _ => {}
        }
    }
    bindings
}

impl<'s, 't> DialectCollector<'s> for ScriptCollector<'s, 't> {
    fn dialect(&self) -> Dialect {
        Dialect::Script
    }

    fn collect(self) -> FactSink<'s> {
        self.collect_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::create_parser;

    fn first_import(src: &str) -> Vec<Binding> {
        let tree = create_parser("a.ts").unwrap().parse(src, None).unwrap();
        let statement = named_children(&tree.root_node())[0];
        import_bindings(&statement, src)
    }

    #[test]
    fn parses_mixed_import_clauses() {
        let bindings = first_import("import React, { useState as useLocal, type Props } from './x';");
        assert_eq!(bindings.len(), 3);
        assert!(bindings[0].default);
        assert_eq!(bindings[1].imported, "useState");
        assert_eq!(bindings[1].local, "useLocal");
        assert_eq!(bindings[2].imported, "Props");

        let ns = first_import("import * as api from './api';");
        assert!(ns[0].namespace);
        assert_eq!(ns[0].local, "api");
    }

    #[test]
    fn side_effect_imports_bind_nothing() {
        assert!(first_import("import './styles.css';").is_empty());
    }
}
