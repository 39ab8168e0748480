// ABOUTME: Shared utilities for the dialect collectors
// ABOUTME: Node helpers, guard context, store access, external calls and import origin resolution

use crate::language::Dialect;
use contractgraph_core::{
    normalize_expression, strip_extension, Confidence, ContractGraphError, ExtractionConfig,
    PayloadShape, Result, Symbol, Warning, WarningCode, DYNAMIC_STORE_KEY,
};
use regex::Regex;
use tree_sitter::Node;

/// Extract text from a tree-sitter Node
#[inline]
pub fn node_text<'a>(node: &Node, content: &'a str) -> &'a str {
    node.utf8_text(content.as_bytes()).unwrap_or("")
}

/// Find first child of a specific kind
pub fn child_by_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).find(|child| child.kind() == kind);
    found
}

/// Named children without comments.
pub fn named_children<'a>(node: &Node<'a>) -> Vec<Node<'a>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.kind().ends_with("comment"))
        .collect()
}

/// Get text of a child by field name
pub fn child_text_by_field<'a>(node: &Node, field_name: &str, content: &'a str) -> Option<&'a str> {
    node.child_by_field_name(field_name)
        .map(|child| node_text(&child, content))
}

/// True when `node` sits in the `field` slot of its parent.
pub fn is_field_of(node: &Node, field: &str) -> bool {
    node.parent()
        .and_then(|parent| parent.child_by_field_name(field))
        .map(|child| child == *node)
        .unwrap_or(false)
}

/// The call expression invoking `node` as its callee.
pub fn call_of<'a>(node: &Node<'a>) -> Option<Node<'a>> {
    let parent = node.parent()?;
    (parent.kind() == "call_expression" && is_field_of(node, "function")).then_some(parent)
}

/// `(object, property)` of a script member access or a rust field access.
pub fn member_parts<'a>(node: &Node<'a>) -> Option<(Node<'a>, Node<'a>)> {
    match node.kind() {
        "member_expression" => Some((
            node.child_by_field_name("object")?,
            node.child_by_field_name("property")?,
        )),
        "field_expression" => Some((
            node.child_by_field_name("value")?,
            node.child_by_field_name("field")?,
        )),
        _ => None,
    }
}

/// `(object, index)` of `x[i]` in either dialect.
fn subscript_parts<'a>(node: &Node<'a>) -> Option<(Node<'a>, Node<'a>)> {
    match node.kind() {
        "subscript_expression" => Some((
            node.child_by_field_name("object")?,
            node.child_by_field_name("index")?,
        )),
        "index_expression" => {
            let parts = named_children(node);
            Some((*parts.first()?, *parts.get(1)?))
        }
        _ => None,
    }
}

/// True when `node` is assigned to or updated in place.
pub fn is_written(node: &Node) -> bool {
    let Some(parent) = node.parent() else {
        return false;
    };
    match parent.kind() {
        "assignment_expression"
        | "augmented_assignment_expression"
        | "compound_assignment_expr" => is_field_of(node, "left"),
        "update_expression" => true,
        _ => false,
    }
}

/// Accumulates the facts and warnings of one file.
#[derive(Debug)]
pub struct FactSink<'a> {
    pub path: &'a str,
    pub produces: Vec<Symbol>,
    pub consumes: Vec<Symbol>,
    /// Asserted conditions and guard expressions, in source order.
    pub invariants: Vec<String>,
    pub warnings: Vec<Warning>,
    /// Set when the parse tree had to recover from syntax errors.
    pub incomplete: bool,
}

impl<'a> FactSink<'a> {
    pub fn new(path: &'a str) -> Self {
        Self {
            path,
            produces: Vec::new(),
            consumes: Vec::new(),
            invariants: Vec::new(),
            warnings: Vec::new(),
            incomplete: false,
        }
    }

    /// Records a construct that could not be classified statically.
    pub fn ambiguous(&mut self, construct: &str) {
        self.warnings.push(Warning::new(
            WarningCode::ExtractionAmbiguous,
            Some(self.path),
            format!("{}; kept with low confidence", construct),
        ));
    }

    /// Marks the whole file low confidence: code swallowed by error recovery
    /// may hide facts.
    pub fn syntax_errors(&mut self, count: usize) {
        self.incomplete = true;
        self.ambiguous(&format!(
            "{} syntax error(s) in the parse tree; facts near them may be missing",
            count
        ));
    }

    pub fn produce(&mut self, symbol: Symbol) {
        self.produces.push(symbol);
    }

    pub fn consume(&mut self, symbol: Symbol) {
        self.consumes.push(symbol);
    }

    pub fn invariant(&mut self, expression: &str) {
        let expression = normalize_expression(expression);
        if !expression.is_empty() {
            self.invariants.push(expression);
        }
    }
}

/// Counts ERROR and MISSING nodes below `node`.
pub fn syntax_error_count(node: &Node) -> usize {
    if !node.has_error() {
        return 0;
    }
    if node.is_error() || node.is_missing() {
        return 1;
    }
    let mut cursor = node.walk();
    let count: usize = node
        .children(&mut cursor)
        .map(|child| syntax_error_count(&child))
        .sum();
    count
}

/// Structural position of a fact: the exported declaration it belongs to and
/// every guard around it, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Context {
    pub scope: Option<String>,
    pub guards: Vec<String>,
    /// Walking the condition of an `if`; inline guards are not recorded there.
    pub in_condition: bool,
}

impl Context {
    pub fn scoped(&self, name: &str) -> Context {
        Context {
            scope: Some(name.to_string()),
            ..self.clone()
        }
    }

    pub fn guarded(&self, expression: &str) -> Context {
        let mut ctx = self.clone();
        if !expression.is_empty() && !ctx.guards.iter().any(|g| g == expression) {
            ctx.guards.push(expression.to_string());
        }
        ctx
    }

    pub fn condition(&self) -> Context {
        Context {
            in_condition: true,
            ..self.clone()
        }
    }
}

/// Attaches the scope and guards of `ctx` to a symbol.
pub fn placed(mut symbol: Symbol, ctx: &Context) -> Symbol {
    for guard in &ctx.guards {
        symbol.payload.guards.insert(guard.clone());
    }
    symbol.with_scope(ctx.scope.clone())
}

/// Negation used for `else` branches and early returns.
pub fn negate(expression: &str) -> String {
    let trimmed = expression.trim();
    let simple = |s: &str| {
        s.chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '?'))
    };
    if let Some(rest) = trimmed.strip_prefix('!') {
        if simple(rest) {
            return rest.to_string();
        }
    }
    if simple(trimmed) {
        format!("!{}", trimmed)
    } else {
        format!("!({})", trimmed)
    }
}

/// Normalized text of an `if` condition, without the surrounding parentheses.
pub fn condition_expression(condition: &Node, content: &str) -> String {
    let inner = if condition.kind() == "parenthesized_expression" {
        named_children(condition).into_iter().next().unwrap_or(*condition)
    } else {
        *condition
    };
    normalize_expression(node_text(&inner, content))
}

/// True for a statement that leaves the enclosing block.
pub fn exits(node: &Node) -> bool {
    match node.kind() {
        "return_statement" | "throw_statement" | "break_statement" | "continue_statement"
        | "return_expression" | "break_expression" | "continue_expression" => true,
        "expression_statement" => named_children(node).first().map(exits).unwrap_or(false),
        "statement_block" | "block" => {
            let body = named_children(node);
            body.len() == 1 && exits(&body[0])
        }
        _ => false,
    }
}

/// `if (!x) return;` guards every later sibling with the negated condition.
pub fn early_exit_guard(statement: &Node, content: &str) -> Option<String> {
    let node = if statement.kind() == "expression_statement" {
        *named_children(statement).first()?
    } else {
        *statement
    };
    if !matches!(node.kind(), "if_statement" | "if_expression") {
        return None;
    }
    if node.child_by_field_name("alternative").is_some() {
        return None;
    }
    if !exits(&node.child_by_field_name("consequence")?) {
        return None;
    }
    let expression = condition_expression(&node.child_by_field_name("condition")?, content);
    (!expression.is_empty()).then(|| negate(&expression))
}

pub fn marks_optional(value: &str) -> bool {
    let value = value.trim();
    value.contains("?.")
        || value.contains("??")
        || value == "undefined"
        || value == "null"
        || value == "None"
        || value.starts_with("Option<")
}

/// Positional payload `#0, #1, ..` of an argument list.
pub fn positional_args(arguments: &Node, content: &str) -> PayloadShape {
    let mut payload = PayloadShape::default();
    for (idx, arg) in named_children(arguments).iter().enumerate() {
        if arg.kind() == "spread_element" {
            payload.open = true;
            continue;
        }
        payload.add_field(format!("#{}", idx), marks_optional(node_text(arg, content)));
    }
    payload
}

/// Comma separated arguments of a macro token tree, normalized.
pub fn token_tree_args(tree: &Node, content: &str) -> Vec<String> {
    let mut cursor = tree.walk();
    let tokens: Vec<Node> = tree.children(&mut cursor).collect();
    let inner = match tokens.len() {
        0..=2 => &[][..],
        len => &tokens[1..len - 1],
    };
    let mut args = Vec::new();
    let mut span: Option<(usize, usize)> = None;
    for token in inner {
        if token.kind() == "," {
            if let Some((start, end)) = span.take() {
                args.push(normalize_expression(&content[start..end]));
            }
            continue;
        }
        span = Some(match span {
            Some((start, _)) => (start, token.end_byte()),
            None => (token.start_byte(), token.end_byte()),
        });
    }
    if let Some((start, end)) = span {
        args.push(normalize_expression(&content[start..end]));
    }
    args
}

fn property_name(key: &Node, content: &str) -> Option<String> {
    match key.kind() {
        "computed_property_name" => None,
        _ => Some(
            node_text(key, content)
                .trim_matches(|c| c == '"' || c == '\'' || c == '`')
                .to_string(),
        ),
    }
}

/// Keys of an object or struct literal. Spreads and computed keys make the
/// payload open.
pub fn object_keys(object: &Node, content: &str) -> PayloadShape {
    let mut payload = PayloadShape::default();
    let body = match object.kind() {
        "struct_expression" => match object.child_by_field_name("body") {
            Some(body) => body,
            None => return PayloadShape::open(),
        },
        _ => *object,
    };
    for entry in named_children(&body) {
        match entry.kind() {
            "pair" | "field_initializer" => {
                let key = entry
                    .child_by_field_name("key")
                    .or_else(|| entry.child_by_field_name("field"));
                let value = entry.child_by_field_name("value");
                match key.and_then(|k| property_name(&k, content)) {
                    Some(name) => payload.add_field(
                        name,
                        value
                            .map(|v| marks_optional(node_text(&v, content)))
                            .unwrap_or(false),
                    ),
                    None => payload.open = true,
                }
            }
            "shorthand_property_identifier" | "shorthand_field_initializer" => {
                payload.add_field(node_text(&entry, content).trim(), false)
            }
            "method_definition" => {
                if let Some(name) = child_text_by_field(&entry, "name", content) {
                    payload.add_field(name, false);
                }
            }
            "spread_element" | "base_field_initializer" => payload.open = true,
            _ => {}
        }
    }
    payload
}

/// Value node of `key: value` inside an object literal.
pub fn object_property<'a>(object: &Node<'a>, key: &str, content: &str) -> Option<Node<'a>> {
    named_children(object)
        .into_iter()
        .filter(|entry| entry.kind() == "pair")
        .find(|pair| {
            pair.child_by_field_name("key")
                .and_then(|k| property_name(&k, content))
                .map(|name| name == key)
                .unwrap_or(false)
        })
        .and_then(|pair| pair.child_by_field_name("value"))
}

const STORE_METHODS: &[&str] = &[
    "get", "set", "setState", "getState", "dispatch", "subscribe", "update",
];
const MUTATORS: &[&str] = &[
    "push", "pop", "shift", "unshift", "splice", "sort", "reverse", "insert", "remove", "clear",
    "extend", "retain", "truncate", "delete", "add",
];
const HTTP_METHODS: &str = "get|post|put|patch|delete|head|request";

/// Config-dependent name patterns shared by every dialect.
#[derive(Debug, Clone)]
pub struct SharedPatterns {
    store: Regex,
    client: Regex,
    http_method: Regex,
    format_param: Regex,
    local_prefixes: Vec<String>,
}

fn alternation(names: &[String]) -> String {
    let mut names: Vec<String> = names
        .iter()
        .filter(|n| !n.trim().is_empty())
        .map(|n| regex::escape(n.trim()))
        .collect();
    if names.is_empty() {
        // matches nothing
        return r"[^\s\S]".to_string();
    }
    names.sort();
    names.dedup();
    names.join("|")
}

fn pattern(source: &str) -> Result<Regex> {
    Regex::new(source)
        .map_err(|e| ContractGraphError::Config(format!("invalid extraction pattern: {}", e)))
}

impl SharedPatterns {
    pub fn compile(config: &ExtractionConfig) -> Result<Self> {
        Ok(Self {
            store: pattern(&format!(
                r"^(?:this\.|self\.)?(?:{})$",
                alternation(&config.store_identifiers)
            ))?,
            client: pattern(&format!(
                r"^(?:this\.|self\.)?(?:{})$",
                alternation(&config.http_clients)
            ))?,
            http_method: pattern(&format!(r"^(?:{})$", HTTP_METHODS))?,
            format_param: pattern(r"\{[^{}]*\}")?,
            local_prefixes: config.local_import_prefixes.clone(),
        })
    }

    pub fn is_local(&self, specifier: &str) -> bool {
        self.local_prefixes
            .iter()
            .any(|prefix| specifier.starts_with(prefix.as_str()))
    }

    fn matches_receiver(pattern: &Regex, node: &Node, content: &str) -> bool {
        match node.kind() {
            "identifier" => pattern.is_match(node_text(node, content)),
            "member_expression" | "field_expression" => match member_parts(node) {
                Some((object, _)) if matches!(object.kind(), "this" | "self") => {
                    let text: String = node_text(node, content)
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .collect();
                    pattern.is_match(&text)
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// True for a reference to one of the configured store identifiers.
    pub fn is_store(&self, node: &Node, content: &str) -> bool {
        Self::matches_receiver(&self.store, node, content)
    }

    pub fn is_client(&self, node: &Node, content: &str) -> bool {
        Self::matches_receiver(&self.client, node, content)
    }

    /// Literal value of a string node. Template substitutions and rust
    /// `format!` placeholders read as `:param`.
    pub fn string_value(&self, node: &Node, content: &str) -> Option<String> {
        match node.kind() {
            "string" | "string_literal" => {
                let text = node_text(node, content);
                Some(text.get(1..text.len().saturating_sub(1))?.to_string())
            }
            "raw_string_literal" => {
                child_by_kind(node, "string_content").map(|c| node_text(&c, content).to_string())
            }
            "template_string" => {
                let mut value = String::new();
                let mut cursor = node.walk();
                for part in node.children(&mut cursor) {
                    match part.kind() {
                        "`" => {}
                        "template_substitution" => value.push_str(":param"),
                        _ => value.push_str(node_text(&part, content)),
                    }
                }
                Some(value)
            }
            "macro_invocation" if child_text_by_field(node, "macro", content) == Some("format") => {
                let tokens = child_by_kind(node, "token_tree")?;
                let literal = named_children(&tokens)
                    .into_iter()
                    .find(|t| matches!(t.kind(), "string_literal" | "raw_string_literal"))?;
                let inner = self.string_value(&literal, content)?;
                Some(self.format_param.replace_all(&inner, ":param").into_owned())
            }
            _ => None,
        }
    }

    /// A literal usable as a store key or module specifier.
    fn static_string(&self, node: &Node, content: &str) -> Option<String> {
        self.string_value(node, content)
            .filter(|value| !value.contains(":param"))
    }
}

#[derive(Debug, Clone)]
struct Segment<'t> {
    name: String,
    node: Node<'t>,
    called: Option<Node<'t>>,
}

/// `.a.b.c()` segments following `base`, stopping after the first call.
fn member_chain<'t>(base: Node<'t>, content: &str) -> Vec<Segment<'t>> {
    let mut segments = Vec::new();
    let mut current = base;
    while let Some(parent) = current.parent() {
        let Some((object, property)) = member_parts(&parent) else {
            break;
        };
        if object != current {
            break;
        }
        let called = call_of(&parent);
        segments.push(Segment {
            name: node_text(&property, content).to_string(),
            node: parent,
            called,
        });
        if called.is_some() {
            break;
        }
        current = parent;
    }
    segments
}

fn store_symbol(key: &str, field: Option<&str>, write: bool, low: bool, ctx: &Context) -> Symbol {
    let mut payload = PayloadShape::default();
    if let Some(field) = field {
        payload.add_field(field, false);
    }
    let symbol = if write {
        Symbol::state_write(key)
    } else {
        Symbol::state_read(key)
    };
    let confidence = if low { Confidence::Low } else { Confidence::High };
    placed(symbol.with_payload(payload).with_confidence(confidence), ctx)
}

fn record_store(sink: &mut FactSink<'_>, symbol: Symbol) {
    if symbol.kind.is_produced() {
        sink.produce(symbol);
    } else {
        sink.consume(symbol);
    }
}

fn first_argument<'t>(call: &Node<'t>) -> Option<Node<'t>> {
    call.child_by_field_name("arguments")
        .and_then(|args| named_children(&args).into_iter().next())
}

/// Reads and writes of the shared store through `store`, a node for which
/// [`SharedPatterns::is_store`] holds.
pub fn collect_store_access(
    store: Node,
    content: &str,
    patterns: &SharedPatterns,
    ctx: &Context,
    sink: &mut FactSink<'_>,
) {
    let Some(parent) = store.parent() else {
        return;
    };

    if let Some((object, index)) = subscript_parts(&parent) {
        if object != store {
            return;
        }
        let chain = member_chain(parent, content);
        let field = chain
            .first()
            .filter(|s| s.called.is_none())
            .map(|s| s.name.as_str());
        let end = chain.last().map(|s| s.node).unwrap_or(parent);
        let write = is_written(&end);
        match patterns.static_string(&index, content) {
            Some(key) => record_store(sink, store_symbol(&key, field, write, false, ctx)),
            None => {
                sink.ambiguous(&format!(
                    "dynamic store key `[{}]`",
                    normalize_expression(node_text(&index, content))
                ));
                record_store(sink, store_symbol(DYNAMIC_STORE_KEY, field, write, true, ctx));
            }
        }
        return;
    }

    let mut chain = member_chain(store, content);
    if chain.is_empty() {
        return;
    }
    if let (Some(call), true) = (
        chain[0].called,
        STORE_METHODS.contains(&chain[0].name.as_str()),
    ) {
        match chain[0].name.as_str() {
            "getState" => {
                chain = member_chain(call, content);
                if chain.is_empty() {
                    sink.ambiguous("whole-store snapshot through `getState()`");
                    record_store(sink, store_symbol(DYNAMIC_STORE_KEY, None, false, true, ctx));
                    return;
                }
            }
            "setState" => {
                match first_argument(&call).filter(|arg| arg.kind() == "object") {
                    Some(object) => {
                        let keys = object_keys(&object, content);
                        for key in keys.fields.keys() {
                            record_store(sink, store_symbol(key, None, true, false, ctx));
                        }
                        if keys.open {
                            sink.ambiguous("spread inside `setState`");
                            record_store(
                                sink,
                                store_symbol(DYNAMIC_STORE_KEY, None, true, true, ctx),
                            );
                        }
                    }
                    None => {
                        sink.ambiguous("non-literal `setState` argument");
                        record_store(sink, store_symbol(DYNAMIC_STORE_KEY, None, true, true, ctx));
                    }
                }
                return;
            }
            "dispatch" => {
                let action = first_argument(&call)
                    .filter(|arg| arg.kind() == "object")
                    .and_then(|object| object_property(&object, "type", content))
                    .and_then(|value| patterns.static_string(&value, content));
                match action {
                    Some(action) => record_store(sink, store_symbol(&action, None, true, false, ctx)),
                    None => {
                        sink.ambiguous("dispatch of a non-literal action");
                        record_store(sink, store_symbol(DYNAMIC_STORE_KEY, None, true, true, ctx));
                    }
                }
                return;
            }
            "subscribe" => {
                sink.ambiguous("store subscription reads every key");
                record_store(sink, store_symbol(DYNAMIC_STORE_KEY, None, false, true, ctx));
                return;
            }
            method => {
                let write = method != "get";
                match first_argument(&call).and_then(|arg| patterns.static_string(&arg, content)) {
                    Some(key) => record_store(sink, store_symbol(&key, None, write, false, ctx)),
                    None => {
                        sink.ambiguous(&format!("store `{}` with a computed key", method));
                        record_store(sink, store_symbol(DYNAMIC_STORE_KEY, None, write, true, ctx));
                    }
                }
                return;
            }
        }
    }

    let key = chain[0].name.clone();
    let last = &chain[chain.len() - 1];
    let mutated = chain.len() > 1
        && last.called.is_some()
        && MUTATORS.contains(&last.name.as_str());
    let write = mutated || (last.called.is_none() && is_written(&last.node));
    let field = chain
        .get(1)
        .filter(|s| !(s.called.is_some() && (mutated || chain.len() == 2)))
        .map(|s| s.name.as_str());
    record_store(sink, store_symbol(&key, field, write, false, ctx));
}

/// `const { a, b } = store`: every destructured key is read.
pub fn collect_store_destructure(pattern: &Node, content: &str, ctx: &Context, sink: &mut FactSink<'_>) {
    for item in named_children(pattern) {
        let key = match item.kind() {
            "shorthand_property_identifier_pattern" => Some(node_text(&item, content)),
            "pair_pattern" => child_text_by_field(&item, "key", content),
            "object_assignment_pattern" => child_text_by_field(&item, "left", content),
            "rest_pattern" => {
                sink.ambiguous("rest pattern over the store");
                record_store(sink, store_symbol(DYNAMIC_STORE_KEY, None, false, true, ctx));
                None
            }
            _ => None,
        };
        if let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) {
            record_store(sink, store_symbol(key, None, false, false, ctx));
        }
    }
}

fn http_payload(value: Option<Node>, content: &str) -> PayloadShape {
    let Some(value) = value else {
        return PayloadShape::default();
    };
    match value.kind() {
        "object" => object_keys(&value, content),
        "call_expression" => {
            let stringified = value
                .child_by_field_name("function")
                .map(|f| node_text(&f, content).replace(char::is_whitespace, "") == "JSON.stringify")
                .unwrap_or(false);
            match first_argument(&value).filter(|arg| stringified && arg.kind() == "object") {
                Some(object) => object_keys(&object, content),
                None => PayloadShape::open(),
            }
        }
        _ => PayloadShape::open(),
    }
}

fn option_value<'t>(object: Option<&Node<'t>>, key: &str, content: &str) -> Option<Node<'t>> {
    object
        .filter(|o| o.kind() == "object")
        .and_then(|o| object_property(o, key, content))
}

fn endpoint_symbol(
    sink: &mut FactSink<'_>,
    method: &str,
    url: Option<String>,
    payload: PayloadShape,
    ctx: &Context,
    construct: &str,
) {
    let method = method.to_ascii_uppercase();
    let symbol = match url {
        Some(url) => Symbol::external_call(format!("{} {}", method, url)),
        None => {
            sink.ambiguous(&format!("{} with a non-literal endpoint", construct));
            Symbol::external_call(format!("{} {}", method, DYNAMIC_STORE_KEY))
                .with_confidence(Confidence::Low)
        }
    };
    sink.produce(placed(symbol.with_payload(payload), ctx));
}

/// `fetch(..)`, configured HTTP client calls and `reqwest::` calls.
pub fn collect_external_call(
    call: Node,
    content: &str,
    patterns: &SharedPatterns,
    ctx: &Context,
    sink: &mut FactSink<'_>,
) {
    let Some(function) = call.child_by_field_name("function") else {
        return;
    };
    let args = call
        .child_by_field_name("arguments")
        .map(|a| named_children(&a))
        .unwrap_or_default();
    let url = args.first().and_then(|a| patterns.string_value(a, content));
    let option = |object, key| option_value(object, key, content);

    if function.kind() == "identifier" && node_text(&function, content) == "fetch" {
        let options = args.get(1);
        let method = option(options, "method")
            .and_then(|m| patterns.string_value(&m, content))
            .unwrap_or_else(|| "GET".to_string());
        let payload = match options {
            Some(_) => match option(options, "body") {
                Some(body) => http_payload(Some(body), content),
                None => PayloadShape::default(),
            },
            None => PayloadShape::default(),
        };
        endpoint_symbol(sink, &method, url, payload, ctx, "fetch");
        return;
    }

    let verb = match function.kind() {
        "member_expression" | "field_expression" => match member_parts(&function) {
            Some((object, property)) if patterns.is_client(&object, content) => {
                Some(node_text(&property, content))
            }
            _ => None,
        },
        "scoped_identifier" => {
            let path = child_text_by_field(&function, "path", content);
            let name = child_text_by_field(&function, "name", content);
            match (path, name) {
                (Some("reqwest"), Some(name)) => Some(name),
                _ => None,
            }
        }
        _ => None,
    };
    let Some(verb) = verb.filter(|v| patterns.http_method.is_match(v)) else {
        return;
    };

    let mut verb = verb.to_string();
    let mut url = url;
    if verb == "request" {
        let config = args.first();
        verb = option(config, "method")
            .and_then(|m| patterns.string_value(&m, content))
            .unwrap_or_else(|| "GET".to_string());
        if url.is_none() {
            url = option(config, "url").and_then(|u| patterns.string_value(&u, content));
        }
    }
    let payload = if matches!(verb.as_str(), "post" | "put" | "patch") {
        http_payload(args.get(1).copied(), content)
    } else {
        PayloadShape::default()
    };
    endpoint_symbol(sink, &verb, url, payload, ctx, "HTTP client call");
}

/// The rust module a file defines: `src/ui/mod.rs` -> `src/ui`, `src/ui/app.rs` -> `src/ui/app`.
fn rust_self_module(path: &str) -> String {
    let stem = strip_extension(path);
    let (dir, name) = match stem.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", stem),
    };
    if matches!(name, "mod" | "lib" | "main") {
        dir.to_string()
    } else {
        stem.to_string()
    }
}

fn parent(path: &str) -> String {
    path.rsplit_once('/')
        .map(|(dir, _)| dir.to_string())
        .unwrap_or_default()
}

fn join(base: &str, rest: &str) -> String {
    match (base.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}/{}", base, rest),
    }
}

/// Normalizes an import specifier into a module path without extension.
///
/// Relative script specifiers resolve against the importing file; root aliases
/// (`@/`, `~/`, `/`) and `crate::` paths stay root-relative and are matched by
/// suffix later.
pub fn resolve_origin(importer: &str, specifier: &str, dialect: Dialect) -> String {
    match dialect {
        Dialect::Rust => {
            let mut segments = specifier.split("::").map(str::trim).peekable();
            let mut base = match segments.peek().copied() {
                Some("crate") => {
                    segments.next();
                    String::new()
                }
                Some("self") => {
                    segments.next();
                    rust_self_module(importer)
                }
                Some("super") => rust_self_module(importer),
                _ => String::new(),
            };
            while segments.peek().copied() == Some("super") {
                segments.next();
                base = parent(&base);
            }
            let rest: Vec<&str> = segments.filter(|s| !s.is_empty()).collect();
            join(&base, &rest.join("/"))
        }
        Dialect::Script => {
            let resolved = if specifier.starts_with("./")
                || specifier.starts_with("../")
                || specifier == "."
                || specifier == ".."
            {
                let base = parent(importer);
                let mut stack: Vec<&str> = base.split('/').filter(|p| !p.is_empty()).collect();
                for segment in specifier.split('/') {
                    match segment {
                        "" | "." => {}
                        ".." => {
                            stack.pop();
                        }
                        other => stack.push(other),
                    }
                }
                stack.join("/")
            } else if let Some(rest) = specifier
                .strip_prefix("@/")
                .or_else(|| specifier.strip_prefix("~/"))
                .or_else(|| specifier.strip_prefix('/'))
            {
                rest.to_string()
            } else {
                specifier.to_string()
            };
            let name = resolved.rsplit('/').next().unwrap_or(&resolved);
            let known = name
                .rsplit_once('.')
                .map(|(_, ext)| Dialect::Script.file_extensions().contains(&ext))
                .unwrap_or(false);
            if known {
                strip_extension(&resolved).to_string()
            } else {
                resolved
            }
        }
    }
}
