//! Query-driven normalizer: syntax tree to flat construct list.

use crate::error::{Result, SegmentationError};
use crate::syntax::queries::{QueryRegistry, QueryType};
use crate::syntax::{ConstructKind, QueryNormalizer, StructureConstruct};
use regex::Regex;
use std::collections::HashSet;
use std::sync::Arc;
use tree_sitter::{Node, QueryCursor, Tree};

/// Declaration keywords recorded as modifiers.
const MODIFIER_KEYWORDS: &[&str] = &[
    "abstract", "async", "const", "default", "export", "extern", "final", "override", "private",
    "protected", "pub", "public", "static", "unsafe", "virtual",
];

fn identifier() -> &'static Regex {
    static_regex!(IDENTIFIER, r"[A-Za-z_][A-Za-z0-9_]*")
}

fn modifiers_of(first_line: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for word in identifier().find_iter(first_line).map(|m| m.as_str()) {
        if MODIFIER_KEYWORDS.contains(&word) && !seen.iter().any(|s| s == word) {
            seen.push(word.to_string());
        }
    }
    seen
}

fn line_of_start(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

/// Last line holding content: a node ending at column 0 stops on the line before.
fn line_of_end(node: Node<'_>) -> usize {
    let end = node.end_position();
    if end.column == 0 && end.row > node.start_position().row {
        end.row
    } else {
        end.row + 1
    }
}

/// Normalizer running the registered queries.
#[derive(Debug, Clone, Default)]
pub struct TreeSitterNormalizer {
    registry: Arc<QueryRegistry>,
}

impl TreeSitterNormalizer {
    /// Creates a normalizer over `registry`.
    #[must_use]
    pub const fn new(registry: Arc<QueryRegistry>) -> Self {
        Self { registry }
    }

    /// The registry queries come from.
    #[must_use]
    pub fn registry(&self) -> &QueryRegistry {
        &self.registry
    }

    fn run_query(
        &self,
        tree: &Tree,
        language: &str,
        query_type: QueryType,
        source: &[u8],
        out: &mut Vec<StructureConstruct>,
    ) -> Result<bool> {
        let Some(query) = self.registry.get(language, query_type)? else {
            return Ok(false);
        };

        let names = query.capture_names();
        let mut cursor = QueryCursor::new();
        for query_match in cursor.matches(&query, tree.root_node(), source) {
            let mut name = String::new();
            let mut definition: Option<(ConstructKind, Node<'_>)> = None;

            for capture in query_match.captures {
                let capture_name = names[capture.index as usize];
                if capture_name == "name" {
                    name = capture
                        .node
                        .utf8_text(source)
                        .map_err(|e| SegmentationError::NormalizationFailed {
                            language: language.to_string(),
                            reason: format!("construct name is not UTF-8: {e}"),
                        })?
                        .to_string();
                } else if let Some(kind) = ConstructKind::from_capture(capture_name) {
                    definition = Some((kind, capture.node));
                }
            }

            if let Some((kind, node)) = definition {
                let start_line = line_of_start(node);
                let first_line = node
                    .utf8_text(source)
                    .ok()
                    .and_then(|text| text.lines().next())
                    .unwrap_or("");
                out.push(StructureConstruct {
                    kind,
                    name,
                    start_line,
                    end_line: line_of_end(node).max(start_line),
                    dependencies: Vec::new(),
                    modifiers: modifiers_of(first_line),
                });
            }
        }
        Ok(true)
    }
}

/// Fills `dependencies` with the names of other constructs each construct mentions.
fn link_dependencies(constructs: &mut [StructureConstruct], lines: &[&str]) {
    let names: HashSet<String> = constructs
        .iter()
        .filter(|c| c.kind != ConstructKind::Import && !c.name.is_empty())
        .map(|c| c.name.clone())
        .collect();

    for construct in constructs.iter_mut() {
        if construct.kind == ConstructKind::Import {
            continue;
        }
        let mut deps: Vec<String> = Vec::new();
        for line in lines
            .iter()
            .take(construct.end_line)
            .skip(construct.start_line.saturating_sub(1))
        {
            for word in identifier().find_iter(line).map(|m| m.as_str()) {
                if word != construct.name
                    && names.contains(word)
                    && !deps.iter().any(|d| d == word)
                {
                    deps.push(word.to_string());
                }
            }
        }
        construct.dependencies = deps;
    }
}

impl QueryNormalizer for TreeSitterNormalizer {
    fn normalize(
        &self,
        tree: &Tree,
        language: &str,
        content: &str,
    ) -> Result<Option<Vec<StructureConstruct>>> {
        let source = content.as_bytes();
        let mut constructs = Vec::new();
        let mut any_query = false;
        for query_type in QueryType::ALL {
            any_query |= self.run_query(tree, language, query_type, source, &mut constructs)?;
        }
        if !any_query {
            return Ok(None);
        }

        // The same node may match several patterns; keep the first kind seen.
        let mut seen = HashSet::new();
        constructs.retain(|c| seen.insert((c.start_line, c.end_line, c.name.clone())));
        constructs.sort_by(|a, b| {
            a.start_line
                .cmp(&b.start_line)
                .then(b.end_line.cmp(&a.end_line))
        });

        let lines: Vec<&str> = content.split('\n').collect();
        link_dependencies(&mut constructs, &lines);
        Ok(Some(constructs))
    }
}
