use anyhow::{anyhow, Context, Result};
use std::fmt;
use tree_sitter::{Node, Parser, Tree};

/// A function's name and positional parameter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInfo {
    pub name: String,
    pub args: Vec<String>,
}

impl fmt::Display for FunctionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.args.join(", "))
    }
}

/// A function or method with its 1-based, inclusive line range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Definition {
    pub info: FunctionInfo,
    pub start_line: usize,
    pub end_line: usize,
}

impl Definition {
    pub fn contains(&self, line_number: usize) -> bool {
        self.start_line <= line_number && line_number <= self.end_line
    }
}

/// One entry of a module outline, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutlineItem {
    Function(Definition),
    Class { name: String, methods: Vec<Definition> },
}

fn parse(source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::language())
        .context("Failed to set tree-sitter language")?;
    parser
        .parse(source, None)
        .ok_or_else(|| anyhow!("Failed to parse python source"))
}

fn node_text<'a>(source: &'a [u8], node: Node) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// `decorated_definition` wraps the real definition; the reported range is the
/// `def`/`class` line onward, decorators excluded.
fn unwrap_decorated(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        if let Some(inner) = node.child_by_field_name("definition") {
            return inner;
        }
    }
    node
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

/// Positional parameter names, stopping at `*`/`*args` (keyword-only params
/// and `**kwargs` are not listed).
fn parameter_names(source: &[u8], params: Node) -> Vec<String> {
    let mut out = Vec::new();
    for p in named_children(params) {
        let name_node = match p.kind() {
            "identifier" => Some(p),
            "default_parameter" | "typed_default_parameter" => p.child_by_field_name("name"),
            "typed_parameter" => named_children(p).into_iter().next().filter(|n| n.kind() == "identifier"),
            "list_splat_pattern" | "keyword_separator" => break,
            _ => None,
        };
        if let Some(n) = name_node {
            out.push(node_text(source, n).to_string());
        }
    }
    out
}

fn function_definition(source: &[u8], node: Node) -> Option<Definition> {
    if node.kind() != "function_definition" {
        return None;
    }
    let name = node_text(source, node.child_by_field_name("name")?).to_string();
    let args = node
        .child_by_field_name("parameters")
        .map(|p| parameter_names(source, p))
        .unwrap_or_default();
    Some(Definition {
        info: FunctionInfo { name, args },
        start_line: node.start_position().row + 1,
        end_line: node.end_position().row + 1,
    })
}

/// Top-level functions and classes with their direct methods.
///
/// Returns `Ok(None)` when the source does not parse cleanly.
pub fn module_outline(source_text: &str) -> Result<Option<Vec<OutlineItem>>> {
    let tree = parse(source_text)?;
    let root = tree.root_node();
    if root.has_error() {
        return Ok(None);
    }
    let source = source_text.as_bytes();

    let mut items = Vec::new();
    for child in named_children(root) {
        let node = unwrap_decorated(child);
        match node.kind() {
            "function_definition" => {
                if let Some(def) = function_definition(source, node) {
                    items.push(OutlineItem::Function(def));
                }
            }
            "class_definition" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| node_text(source, n).to_string())
                    .unwrap_or_default();
                let methods = node
                    .child_by_field_name("body")
                    .map(|body| {
                        named_children(body)
                            .into_iter()
                            .filter_map(|m| function_definition(source, unwrap_decorated(m)))
                            .collect()
                    })
                    .unwrap_or_default();
                items.push(OutlineItem::Class { name, methods });
            }
            _ => {}
        }
    }
    Ok(Some(items))
}

/// Outline flattened to functions and methods, in declaration order.
pub fn flattened_definitions(items: &[OutlineItem]) -> Vec<&Definition> {
    let mut out = Vec::new();
    for item in items {
        match item {
            OutlineItem::Function(def) => out.push(def),
            OutlineItem::Class { methods, .. } => out.extend(methods.iter()),
        }
    }
    out
}

/// One line per symbol: `name(args)` for functions, `Class: Name` followed by
/// its methods for classes. `None` if the file does not parse.
pub fn symbol_summaries(source_text: &str) -> Result<Option<Vec<String>>> {
    let Some(items) = module_outline(source_text)? else {
        return Ok(None);
    };
    let mut out = Vec::new();
    for item in &items {
        match item {
            OutlineItem::Function(def) => out.push(def.info.to_string()),
            OutlineItem::Class { name, methods } => {
                out.push(format!("Class: {name}"));
                out.extend(methods.iter().map(|m| m.info.to_string()));
            }
        }
    }
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARITH: &str = "def add(a, b):\n    return a + b\n\n\ndef divide(a, b):\n    return a / b\n";

    #[test]
    fn function_info_display() {
        let info = FunctionInfo {
            name: "divide".into(),
            args: vec!["a".into(), "b".into()],
        };
        assert_eq!(info.to_string(), "divide(a, b)");
    }

    #[test]
    fn outlines_top_level_functions() {
        let items = module_outline(ARITH).unwrap().unwrap();
        let defs = flattened_definitions(&items);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].info.name, "add");
        assert_eq!((defs[0].start_line, defs[0].end_line), (1, 2));
        assert_eq!(defs[1].info.name, "divide");
        assert_eq!((defs[1].start_line, defs[1].end_line), (5, 6));
    }

    #[test]
    fn class_methods_are_flattened() {
        let src = "\
class Calc:
    def __init__(self, base):
        self.base = base

    @staticmethod
    def twice(x):
        return 2 * x

def main():
    pass
";
        let summaries = symbol_summaries(src).unwrap().unwrap();
        assert_eq!(
            summaries,
            vec!["Class: Calc", "__init__(self, base)", "twice(x)", "main()"]
        );

        let items = module_outline(src).unwrap().unwrap();
        let defs = flattened_definitions(&items);
        let twice = defs.iter().find(|d| d.info.name == "twice").unwrap();
        assert_eq!(twice.start_line, 6);
    }

    #[test]
    fn parameter_kinds() {
        let src = "def f(a, b=1, c: int = 2, d: str = 'x', *args, e, **kw):\n    pass\n";
        let summaries = symbol_summaries(src).unwrap().unwrap();
        assert_eq!(summaries, vec!["f(a, b, c, d)"]);
    }

    #[test]
    fn nested_functions_are_not_listed() {
        let src = "def outer():\n    def inner():\n        pass\n    return inner\n";
        let summaries = symbol_summaries(src).unwrap().unwrap();
        assert_eq!(summaries, vec!["outer()"]);
    }

    #[test]
    fn syntax_error_yields_none() {
        assert!(symbol_summaries("def broken(:\n    pass\n").unwrap().is_none());
    }

    #[test]
    fn module_without_definitions_is_empty() {
        let summaries = symbol_summaries("X = 1\nprint(X)\n").unwrap().unwrap();
        assert!(summaries.is_empty());
    }
}
