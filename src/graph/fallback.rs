// src/graph/fallback.rs

//! Line-oriented fallback parser for graph files.
//!
//! Used when the YAML parser rejects a document (for example because a node
//! key is declared twice). It accepts a deliberately small grammar and
//! produces the same [`RawGraph`] as the YAML path:
//!
//! ```text
//! document     := top_entry*
//! top_entry    := "story:" scalar
//!               | "nodes:" NEWLINE node_entry+
//!               | "edges:" NEWLINE ("- " flow_list NEWLINE)+
//!               | "policies:" NEWLINE "ready_requires:" list_value
//!               | "task_id_map:" NEWLINE (key ":" list_value)+
//! node_entry   := key ":" NEWLINE (field ":" scalar NEWLINE)*
//!               | key ":" flow_map
//! list_value   := flow_list | NEWLINE ("- " scalar NEWLINE)+
//! flow_list    := "[" (scalar ("," scalar)*)? "]"
//! flow_map     := "{" (field ":" scalar ("," field ":" scalar)*)? "}"
//! ```
//!
//! Indentation rules:
//! - spaces only; a tab in leading whitespace is an error;
//! - top-level keys start at column 0, every body line is indented deeper;
//! - inside a body, the first line fixes the entry indent, and lines
//!   indented further belong to the entry above them.
//!
//! `#` starts a comment at the start of a line or after whitespace, outside
//! quotes. Scalars may be single- or double-quoted. Unknown top-level keys and
//! unknown fields are skipped. Anything else is an error naming the line.

use tracing::debug;

use crate::errors::{Result, StorydagError};
use crate::graph::model::{RawGraph, RawNode, RawPolicies};

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    no: usize,
    indent: usize,
    text: &'a str,
}

/// Parse a graph document with the fallback grammar.
pub fn parse_fallback(text: &str) -> Result<RawGraph> {
    let lines = tokenize(text)?;
    let mut graph = RawGraph::default();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.indent != 0 {
            return Err(syntax(line, "unexpected indentation at top level"));
        }
        let (key, rest) = split_key(line.text).ok_or_else(|| syntax(line, "expected `key:`"))?;
        let end = block_end(&lines, i + 1, 0);
        let body = &lines[i + 1..end];

        match key.as_str() {
            "story" => {
                expect_no_body(body)?;
                graph.story = Some(unquote(rest));
            }
            "nodes" => graph.nodes = parse_nodes(line, rest, body)?,
            "edges" => graph.edges = parse_edges(line, rest, body)?,
            "policies" => graph.policies = parse_policies(line, rest, body)?,
            "task_id_map" => graph.task_id_map = parse_alias_map(line, rest, body)?,
            other => debug!(key = %other, line = line.no, "skipping unknown top-level key"),
        }
        i = end;
    }

    Ok(graph)
}

fn tokenize(text: &str) -> Result<Vec<Line<'_>>> {
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let no = idx + 1;
        let stripped = strip_comment(raw).trim_end();
        if stripped.trim().is_empty() {
            continue;
        }
        let leading = &stripped[..stripped.len() - stripped.trim_start().len()];
        if leading.contains('\t') {
            return Err(StorydagError::GraphError(format!(
                "line {no}: tabs are not allowed in indentation"
            )));
        }
        out.push(Line {
            no,
            indent: leading.len(),
            text: stripped.trim_start(),
        });
    }
    Ok(out)
}

/// Index one past the last line (from `start`) indented deeper than `indent`.
fn block_end(lines: &[Line<'_>], start: usize, indent: usize) -> usize {
    lines[start..]
        .iter()
        .position(|l| l.indent <= indent)
        .map(|p| start + p)
        .unwrap_or(lines.len())
}

/// Split `body` into entries at the indent of its first line; each entry is
/// its head line plus the lines nested under it.
fn entries<'a, 'b>(body: &'b [Line<'a>]) -> Result<Vec<(Line<'a>, &'b [Line<'a>])>> {
    let Some(first) = body.first() else {
        return Ok(Vec::new());
    };
    let base = first.indent;
    let mut out = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let head = body[i];
        if head.indent != base {
            return Err(syntax(head, "inconsistent indentation"));
        }
        let end = block_end(body, i + 1, base);
        out.push((head, &body[i + 1..end]));
        i = end;
    }
    Ok(out)
}

fn parse_nodes(head: Line<'_>, rest: &str, body: &[Line<'_>]) -> Result<Vec<(String, RawNode)>> {
    if !rest.is_empty() && rest != "{}" {
        return Err(syntax(head, "`nodes:` takes an indented block"));
    }
    let mut nodes = Vec::new();
    for (line, children) in entries(body)? {
        let (key, value) = split_key(line.text).ok_or_else(|| syntax(line, "expected `KEY:`"))?;
        let mut node = RawNode::default();
        if !value.is_empty() {
            if !children.is_empty() {
                return Err(syntax(line, "inline node map cannot have a nested block"));
            }
            for (field, v) in parse_flow_map(line, value)? {
                assign_node_field(&mut node, &field, v);
            }
        } else {
            for (child, nested) in entries(children)? {
                if !nested.is_empty() {
                    return Err(syntax(nested[0], "node fields must be scalars"));
                }
                let (field, v) =
                    split_key(child.text).ok_or_else(|| syntax(child, "expected `field: value`"))?;
                assign_node_field(&mut node, &field, unquote(v));
            }
        }
        nodes.push((key, node));
    }
    Ok(nodes)
}

fn assign_node_field(node: &mut RawNode, field: &str, value: String) {
    match field {
        "title" => node.title = Some(value),
        "kind" => node.kind = Some(value),
        _ => {}
    }
}

fn parse_edges(head: Line<'_>, rest: &str, body: &[Line<'_>]) -> Result<Vec<Vec<String>>> {
    if !rest.is_empty() && rest != "[]" {
        return Err(syntax(head, "`edges:` takes an indented list"));
    }
    let mut edges = Vec::new();
    for (line, nested) in entries(body)? {
        if !nested.is_empty() {
            return Err(syntax(nested[0], "edges must be written as `- [PARENT, CHILD]`"));
        }
        let item = list_item(line).ok_or_else(|| syntax(line, "expected `- [PARENT, CHILD]`"))?;
        edges.push(parse_flow_list(line, item)?);
    }
    Ok(edges)
}

fn parse_policies(head: Line<'_>, rest: &str, body: &[Line<'_>]) -> Result<RawPolicies> {
    if !rest.is_empty() && rest != "{}" {
        return Err(syntax(head, "`policies:` takes an indented block"));
    }
    let mut policies = RawPolicies::default();
    for (line, children) in entries(body)? {
        let (key, value) = split_key(line.text).ok_or_else(|| syntax(line, "expected `key:`"))?;
        if key == "ready_requires" {
            policies.ready_requires = parse_list_value(line, value, children)?;
        } else {
            debug!(key = %key, line = line.no, "skipping unknown policy");
        }
    }
    Ok(policies)
}

fn parse_alias_map(
    head: Line<'_>,
    rest: &str,
    body: &[Line<'_>],
) -> Result<Vec<(String, Vec<String>)>> {
    if !rest.is_empty() && rest != "{}" {
        return Err(syntax(head, "`task_id_map:` takes an indented block"));
    }
    let mut map = Vec::new();
    for (line, children) in entries(body)? {
        let (key, value) = split_key(line.text).ok_or_else(|| syntax(line, "expected `KEY:`"))?;
        map.push((key, parse_list_value(line, value, children)?));
    }
    Ok(map)
}

fn parse_list_value(line: Line<'_>, value: &str, children: &[Line<'_>]) -> Result<Vec<String>> {
    if !value.is_empty() {
        if !children.is_empty() {
            return Err(syntax(children[0], "inline value cannot have a nested block"));
        }
        if value.starts_with('[') {
            return parse_flow_list(line, value);
        }
        return Ok(vec![unquote(value)]);
    }
    let mut items = Vec::new();
    for (child, nested) in entries(children)? {
        if !nested.is_empty() {
            return Err(syntax(nested[0], "list items must be scalars"));
        }
        let item = list_item(child).ok_or_else(|| syntax(child, "expected `- item`"))?;
        items.push(unquote(item));
    }
    Ok(items)
}

fn expect_no_body(body: &[Line<'_>]) -> Result<()> {
    match body.first() {
        Some(line) => Err(syntax(*line, "scalar key cannot have a nested block")),
        None => Ok(()),
    }
}

fn list_item<'a>(line: Line<'a>) -> Option<&'a str> {
    if line.text == "-" {
        return None;
    }
    line.text.strip_prefix("- ").map(str::trim)
}

fn parse_flow_list(line: Line<'_>, s: &str) -> Result<Vec<String>> {
    let inner = s
        .trim()
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| syntax(line, "expected `[a, b]`"))?;
    if inner.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(split_outside_quotes(inner, ',')
        .into_iter()
        .map(|item| unquote(item.trim()))
        .collect())
}

fn parse_flow_map(line: Line<'_>, s: &str) -> Result<Vec<(String, String)>> {
    let inner = s
        .trim()
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| syntax(line, "expected `{field: value, ...}`"))?;
    let mut pairs = Vec::new();
    for part in split_outside_quotes(inner, ',') {
        if part.trim().is_empty() {
            continue;
        }
        let (k, v) = split_key(part.trim()).ok_or_else(|| syntax(line, "expected `field: value`"))?;
        pairs.push((k, unquote(v)));
    }
    Ok(pairs)
}

/// Split `key: rest` on the first colon outside quotes that is followed by
/// whitespace or the end of the line.
fn split_key(text: &str) -> Option<(String, &str)> {
    let mut quote: Option<char> = None;
    let bytes: Vec<(usize, char)> = text.char_indices().collect();
    for (pos, &(idx, ch)) in bytes.iter().enumerate() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, ':') => {
                let next = bytes.get(pos + 1).map(|&(_, c)| c);
                if next.is_none() || next.is_some_and(char::is_whitespace) {
                    let key = unquote(text[..idx].trim());
                    if key.is_empty() {
                        return None;
                    }
                    return Some((key, text[idx + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_outside_quotes(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut start = 0;
    for (idx, ch) in s.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, c) if c == sep => {
                parts.push(&s[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&s[start..]);
    parts
}

fn strip_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut prev_ws = true;
    for (idx, ch) in line.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '#') if prev_ws => return &line[..idx],
            _ => {}
        }
        prev_ws = ch.is_whitespace();
    }
    line
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    for q in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(q) && s.ends_with(q) {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

fn syntax(line: Line<'_>, msg: &str) -> StorydagError {
    StorydagError::GraphError(format!("line {}: {msg}: `{}`", line.no, line.text))
}
