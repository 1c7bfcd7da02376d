use serde::{Deserialize, Serialize};

/// A decoded, render-ready text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredDocument {
    pub title: String,
    pub author: String,
    pub body: Vec<BodyNode>,
    /// Unbalanced indent markers that were repaired while parsing.
    pub anomalies: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum BodyNode {
    /// Source line breaks are kept as `\n` inside the text.
    PlainText(String),
    RubyAnnotation {
        base: String,
        reading: String,
    },
    EmphasisSpan(String),
    IndentBlock {
        level: u32,
        children: Vec<BodyNode>,
    },
    PageBreak,
}

impl BodyNode {
    pub fn kind(&self) -> &'static str {
        match self {
            BodyNode::PlainText(_) => "plain_text",
            BodyNode::RubyAnnotation { .. } => "ruby_annotation",
            BodyNode::EmphasisSpan(_) => "emphasis_span",
            BodyNode::IndentBlock { .. } => "indent_block",
            BodyNode::PageBreak => "page_break",
        }
    }
}

impl StructuredDocument {
    /// Depth-first walk over every node, nested ones included.
    pub fn walk(&self) -> Vec<&BodyNode> {
        fn visit<'a>(nodes: &'a [BodyNode], out: &mut Vec<&'a BodyNode>) {
            for node in nodes {
                out.push(node);
                if let BodyNode::IndentBlock { children, .. } = node {
                    visit(children, out);
                }
            }
        }

        let mut out = Vec::new();
        visit(&self.body, &mut out);
        out
    }
}
