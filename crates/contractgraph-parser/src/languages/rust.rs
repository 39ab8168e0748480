// ABOUTME: Contract fact collector for Rust syntax trees
// ABOUTME: Public items become exports, crate-local `use` items become imports tracked to each use site

use super::extractor_utils::{
    call_of, child_by_kind, child_text_by_field, collect_external_call, collect_store_access,
    condition_expression, early_exit_guard, is_field_of, named_children, negate, node_text,
    object_keys, placed, positional_args, resolve_origin, token_tree_args, Context, FactSink,
    SharedPatterns,
};
use super::DialectCollector;
use crate::language::Dialect;
use contractgraph_core::{Confidence, EdgeKind, PayloadShape, Symbol};
use std::collections::BTreeMap;
use tracing::debug;
use tree_sitter::Node;

fn is_option_type(ty: &str) -> bool {
    let ty = ty.trim().trim_start_matches('&').trim_start();
    ty.starts_with("Option<") || ty.starts_with("Option <") || ty.starts_with("std::option::Option<")
}

fn is_public(item: &Node) -> bool {
    child_by_kind(item, "visibility_modifier").is_some()
}

/// One name brought into scope by a `use` tree.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UseItem {
    /// `crate::a::b` path of the module the name lives in.
    module: String,
    name: String,
    local: String,
}

fn join_path(prefix: &str, path: &str) -> String {
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => path.to_string(),
        (_, true) => prefix.to_string(),
        _ => format!("{}::{}", prefix, path),
    }
}

fn compact(node: &Node, content: &str) -> String {
    node_text(node, content)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

fn use_item(full: &str, alias: Option<&str>) -> UseItem {
    let (module, name) = match full.rsplit_once("::") {
        Some((module, name)) => (module.to_string(), name.to_string()),
        None => (String::new(), full.to_string()),
    };
    if name != "self" {
        return UseItem {
            local: alias.unwrap_or(&name).to_string(),
            module,
            name,
        };
    }
    // `a::b::{self}` names the module `b` itself
    let (parent, module_name) = match module.rsplit_once("::") {
        Some((parent, module_name)) => (parent.to_string(), module_name.to_string()),
        None => (String::new(), module.clone()),
    };
    UseItem {
        local: alias.unwrap_or(&module_name).to_string(),
        module: parent,
        name: module_name,
    }
}

/// Flattens the `use` tree rooted at `node` into individual items.
fn expand_use_tree(prefix: &str, node: &Node, content: &str, out: &mut Vec<UseItem>) {
    match node.kind() {
        "use_as_clause" => {
            let (Some(path), Some(alias)) = (
                node.child_by_field_name("path"),
                child_text_by_field(node, "alias", content),
            ) else {
                return;
            };
            out.push(use_item(&join_path(prefix, &compact(&path, content)), Some(alias)));
        }
        "scoped_use_list" => {
            let base = match node.child_by_field_name("path") {
                Some(path) => join_path(prefix, &compact(&path, content)),
                None => prefix.to_string(),
            };
            if let Some(list) = node.child_by_field_name("list") {
                expand_use_tree(&base, &list, content, out);
            }
        }
        "use_list" => {
            for child in named_children(node) {
                expand_use_tree(prefix, &child, content, out);
            }
        }
        "use_wildcard" => {
            let module = match named_children(node).first() {
                Some(path) => join_path(prefix, &compact(path, content)),
                None => prefix.to_string(),
            };
            out.push(UseItem {
                module,
                name: "*".to_string(),
                local: "*".to_string(),
            });
        }
        "attribute_item" => {}
        _ => out.push(use_item(&join_path(prefix, &compact(node, content)), None)),
    }
}

struct Import {
    item: UseItem,
    /// Origin of the module holding `item`.
    item_origin: String,
    /// Origin when `item` is itself a module.
    module_origin: String,
    uses: usize,
}

impl Import {
    /// A lowercase name may be a module (`ui::render(..)`) or a function.
    fn maybe_module(&self) -> bool {
        self.item
            .name
            .chars()
            .next()
            .map(|c| c.is_ascii_lowercase())
            .unwrap_or(false)
    }
}

pub struct RustCollector<'s, 't> {
    content: &'s str,
    root: Node<'t>,
    shared: &'s SharedPatterns,
    sink: FactSink<'s>,
    /// Node id of a public item or of an `impl` block for one -> item name.
    scopes: BTreeMap<usize, String>,
    imports: Vec<Import>,
}

impl<'s, 't> RustCollector<'s, 't> {
    pub fn new(path: &'s str, content: &'s str, root: Node<'t>, shared: &'s SharedPatterns) -> Self {
        Self {
            content,
            root,
            shared,
            sink: FactSink::new(path),
            scopes: BTreeMap::new(),
            imports: Vec::new(),
        }
    }

    fn text(&self, node: &Node) -> &'s str {
        node_text(node, self.content)
    }

    fn collect_all(mut self) -> FactSink<'s> {
        let items = named_children(&self.root);
        for item in &items {
            self.collect_item(*item);
        }
        // impl blocks may precede the type they extend
        for item in &items {
            if item.kind() == "impl_item" {
                self.collect_impl(*item);
            }
        }
        for item in &items {
            if item.kind() == "use_declaration" {
                self.collect_use(item);
            }
        }
        let root = self.root;
        self.visit_children(root, &Context::default());
        self.flush_unused_imports();
        debug!(
            path = self.sink.path,
            produces = self.sink.produces.len(),
            consumes = self.sink.consumes.len(),
            "Collected rust contract facts"
        );
        self.sink
    }

    fn fn_params(&self, parameters: &Node) -> PayloadShape {
        let mut payload = PayloadShape::default();
        let params = named_children(parameters)
            .into_iter()
            .filter(|p| p.kind() == "parameter");
        for (idx, param) in params.enumerate() {
            let optional = param
                .child_by_field_name("type")
                .map(|ty| is_option_type(self.text(&ty)))
                .unwrap_or(false);
            payload.add_field(format!("#{}", idx), optional);
        }
        payload
    }

    fn struct_fields(&self, item: &Node) -> PayloadShape {
        let Some(body) = item.child_by_field_name("body") else {
            // unit struct
            return PayloadShape::default();
        };
        let mut payload = PayloadShape::default();
        match body.kind() {
            "field_declaration_list" => {
                for field in named_children(&body) {
                    if field.kind() != "field_declaration" {
                        continue;
                    }
                    let Some(name) = child_text_by_field(&field, "name", self.content) else {
                        continue;
                    };
                    let optional = field
                        .child_by_field_name("type")
                        .map(|ty| is_option_type(self.text(&ty)))
                        .unwrap_or(false);
                    payload.add_field(name, optional);
                }
            }
            "ordered_field_declaration_list" => {
                let types = named_children(&body)
                    .into_iter()
                    .filter(|n| !matches!(n.kind(), "visibility_modifier" | "attribute_item"));
                for (idx, ty) in types.enumerate() {
                    payload.add_field(format!("#{}", idx), is_option_type(self.text(&ty)));
                }
            }
            _ => return PayloadShape::open(),
        }
        payload
    }

    fn collect_item(&mut self, item: Node<'t>) {
        if !is_public(&item) {
            return;
        }
        let payload = match item.kind() {
            "function_item" | "function_signature_item" => item
                .child_by_field_name("parameters")
                .map(|p| self.fn_params(&p))
                .unwrap_or_else(PayloadShape::open),
            "struct_item" | "union_item" => self.struct_fields(&item),
            "enum_item" | "trait_item" | "type_item" | "const_item" | "static_item" | "mod_item" => {
                PayloadShape::open()
            }
            _ => return,
        };
        let Some(name) = child_text_by_field(&item, "name", self.content) else {
            return;
        };
        self.scopes.insert(item.id(), name.to_string());
        self.sink.produce(Symbol::export(name).with_payload(payload));
    }

    fn collect_impl(&mut self, item: Node<'t>) {
        let Some(target) = item.child_by_field_name("type") else {
            return;
        };
        let target = match target.kind() {
            "generic_type" => target.child_by_field_name("type").unwrap_or(target),
            _ => target,
        };
        let name = self.text(&target);
        let exported = self.sink.produces.iter().any(|s| s.name == name);
        if exported {
            self.scopes.insert(item.id(), name.to_string());
        }
    }

    fn collect_use(&mut self, declaration: &Node) {
        let Some(argument) = declaration.child_by_field_name("argument") else {
            return;
        };
        let tree = compact(&argument, self.content);
        if !self.shared.is_local(&tree) {
            return;
        }
        let reexport = is_public(declaration);
        let mut items = Vec::new();
        expand_use_tree("", &argument, self.content, &mut items);

        for item in items {
            let item_origin = resolve_origin(self.sink.path, &item.module, Dialect::Rust);
            if item.name == "*" {
                self.sink.ambiguous(&format!("glob import of `{}`", item.module));
                self.sink.consume(
                    Symbol::import("*", Some(item_origin)).with_confidence(Confidence::Low),
                );
                continue;
            }
            if reexport {
                self.sink
                    .produce(Symbol::export(item.local.as_str()).with_payload(PayloadShape::open()));
                self.sink
                    .consume(Symbol::import(item.name.as_str(), Some(item_origin)));
                continue;
            }
            let module_origin = resolve_origin(
                self.sink.path,
                &join_path(&item.module, &item.name),
                Dialect::Rust,
            );
            self.imports.push(Import {
                item,
                item_origin,
                module_origin,
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
        let scoped;
        let ctx = match self.scopes.get(&node.id()) {
            Some(name) => {
                scoped = ctx.scoped(name);
                &scoped
            }
            None => ctx,
        };

        match node.kind() {
            "use_declaration" => return,
            "if_expression" => {
                self.visit_if(node, ctx);
                return;
            }
            "macro_invocation" => self.collect_assert(&node),
            "call_expression" => {
                collect_external_call(node, self.content, self.shared, ctx, &mut self.sink)
            }
            "identifier" | "type_identifier" => self.collect_usage(node, ctx),
            _ => {}
        }
        if self.shared.is_store(&node, self.content) {
            collect_store_access(node, self.content, self.shared, ctx, &mut self.sink);
        }
        self.visit_children(node, ctx);
    }

    fn visit_if(&mut self, node: Node<'t>, ctx: &Context) {
        let condition = node.child_by_field_name("condition");
        // `if let` patterns bind rather than test
        let expression = condition
            .filter(|c| c.kind() != "let_condition" && c.kind() != "let_chain")
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
                .map(|n| n.kind() == "if_expression")
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

    /// `assert!`, `debug_assert!` and their `_eq`/`_ne` forms.
    fn collect_assert(&mut self, invocation: &Node) {
        let Some(name) = child_text_by_field(invocation, "macro", self.content) else {
            return;
        };
        let base = name.strip_prefix("debug_").unwrap_or(name);
        let Some(tree) = child_by_kind(invocation, "token_tree") else {
            return;
        };
        let args = token_tree_args(&tree, self.content);
        let condition = match (base, args.as_slice()) {
            ("assert_eq", [left, right, ..]) => format!("{} == {}", left, right),
            ("assert_ne", [left, right, ..]) => format!("{} != {}", left, right),
            ("assert", [condition, ..]) => condition.clone(),
            _ => return,
        };
        self.sink.invariant(&condition);
    }

    fn collect_usage(&mut self, node: Node<'t>, ctx: &Context) {
        let name = self.text(&node);
        let Some(idx) = self.imports.iter().position(|i| i.item.local == name) else {
            return;
        };
        let Some(parent) = node.parent() else {
            return;
        };

        let path_parent = matches!(parent.kind(), "scoped_identifier" | "scoped_type_identifier");
        if path_parent && is_field_of(&node, "name") {
            // `other::Button` names something else
            return;
        }
        self.imports[idx].uses += 1;

        if path_parent && is_field_of(&node, "path") {
            let Some(member) = parent.child_by_field_name("name") else {
                return;
            };
            let member_name = self.text(&member);
            if self.imports[idx].maybe_module() {
                let origin = self.imports[idx].module_origin.clone();
                let (via, payload) = self.usage_payload(&parent);
                self.consume(member_name, &origin, via, payload, ctx);
            } else {
                let import = &self.imports[idx];
                let (imported, origin) = (import.item.name.clone(), import.item_origin.clone());
                let payload = PayloadShape::default().with_field(member_name, false);
                self.consume(&imported, &origin, EdgeKind::PropFlow, payload, ctx);
            }
            return;
        }

        let (via, payload) = self.usage_payload(&node);
        let import = &self.imports[idx];
        let (imported, origin) = (import.item.name.clone(), import.item_origin.clone());
        self.consume(&imported, &origin, via, payload, ctx);
    }

    /// Calls, macro invocations and struct literals carry their arguments.
    fn usage_payload(&self, node: &Node) -> (EdgeKind, PayloadShape) {
        let callee = match node.parent() {
            Some(parent) if parent.kind() == "generic_function" && is_field_of(node, "function") => {
                parent
            }
            _ => *node,
        };
        if let Some(args) = call_of(&callee).and_then(|c| c.child_by_field_name("arguments")) {
            return (EdgeKind::Call, positional_args(&args, self.content));
        }
        let Some(parent) = node.parent() else {
            return (EdgeKind::PropFlow, PayloadShape::default());
        };
        match parent.kind() {
            "macro_invocation" if is_field_of(node, "macro") => {
                let mut payload = PayloadShape::default();
                if let Some(tree) = child_by_kind(&parent, "token_tree") {
                    for idx in 0..token_tree_args(&tree, self.content).len() {
                        payload.add_field(format!("#{}", idx), false);
                    }
                }
                (EdgeKind::Call, payload)
            }
            "struct_expression" if is_field_of(node, "name") => {
                (EdgeKind::PropFlow, object_keys(&parent, self.content))
            }
            _ => (EdgeKind::PropFlow, PayloadShape::default()),
        }
    }

    fn consume(&mut self, name: &str, origin: &str, via: EdgeKind, payload: PayloadShape, ctx: &Context) {
        let mut symbol = placed(
            Symbol::import(name, Some(origin.to_string())).with_payload(payload),
            ctx,
        );
        symbol.via = via;
        self.sink.consume(symbol);
    }

    fn flush_unused_imports(&mut self) {
        let unused: Vec<(String, String)> = self
            .imports
            .iter()
            .filter(|i| i.uses == 0)
            .map(|i| (i.item.name.clone(), i.item_origin.clone()))
            .collect();
        for (name, origin) in unused {
            self.consume(
                &name,
                &origin,
                EdgeKind::PropFlow,
                PayloadShape::default(),
                &Context::default(),
            );
        }
    }
}

impl<'s, 't> DialectCollector<'s> for RustCollector<'s, 't> {
    fn dialect(&self) -> Dialect {
        Dialect::Rust
    }

    fn collect(self) -> FactSink<'s> {
        self.collect_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::create_parser;

    fn use_items(src: &str) -> Vec<UseItem> {
        let tree = create_parser("src/lib.rs").unwrap().parse(src, None).unwrap();
        let root = tree.root_node();
        let declaration = named_children(&root)[0];
        let argument = declaration.child_by_field_name("argument").unwrap();
        let mut out = Vec::new();
        expand_use_tree("", &argument, src, &mut out);
        out
    }

    #[test]
    fn expands_nested_use_trees() {
        let out = use_items("use crate::ui::{self, Button, forms::{Input as Field}};");
        assert_eq!(
            out,
            vec![
                UseItem {
                    module: "crate".to_string(),
                    name: "ui".to_string(),
                    local: "ui".to_string()
                },
                UseItem {
                    module: "crate::ui".to_string(),
                    name: "Button".to_string(),
                    local: "Button".to_string()
                },
                UseItem {
                    module: "crate::ui::forms".to_string(),
                    name: "Input".to_string(),
                    local: "Field".to_string()
                },
            ]
        );
    }

    #[test]
    fn glob_uses_keep_their_module() {
        let out = use_items("use super::model::*;");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].module, "super::model");
        assert_eq!(out[0].name, "*");
    }

    #[test]
    fn option_types_are_optional() {
        assert!(is_option_type(" Option<String>"));
        assert!(is_option_type("&Option<u8>"));
        assert!(!is_option_type("Vec<Option<u8>>"));
    }
}
