//! Fragment renderers for structured documents.

use std::fmt::Write as _;

use bunko_core::{BodyNode, StructuredDocument};

const INDENT_UNIT: char = '\u{3000}';

pub fn to_html(doc: &StructuredDocument) -> String {
    let mut out = String::new();
    html_nodes(&doc.body, &mut out);
    out
}

fn html_nodes(nodes: &[BodyNode], out: &mut String) {
    for node in nodes {
        match node {
            BodyNode::PlainText(text) => {
                let mut lines = text.split('\n');
                if let Some(first) = lines.next() {
                    escape_into(first, out);
                }
                for line in lines {
                    out.push_str("<br>");
                    escape_into(line, out);
                }
            }
            BodyNode::RubyAnnotation { base, reading } => {
                out.push_str("<ruby>");
                escape_into(base, out);
                out.push_str("<rt>");
                escape_into(reading, out);
                out.push_str("</rt></ruby>");
            }
            BodyNode::EmphasisSpan(text) => {
                out.push_str("<em class=\"boten\">");
                escape_into(text, out);
                out.push_str("</em>");
            }
            BodyNode::IndentBlock { level, children } => {
                let _ = write!(out, "<div class=\"indent-{level}\">");
                html_nodes(children, out);
                out.push_str("</div>");
            }
            BodyNode::PageBreak => out.push_str("<div class=\"page-break\"></div>"),
        }
    }
}

fn escape_into(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}

/// Terminal-friendly rendering: ruby as `base（reading）`, indents as ideographic spaces.
pub fn to_plain_text(doc: &StructuredDocument) -> String {
    let mut out = String::new();
    if !doc.title.is_empty() {
        out.push_str(&doc.title);
        out.push('\n');
    }
    if !doc.author.is_empty() {
        out.push_str(&doc.author);
        out.push('\n');
    }
    if !out.is_empty() {
        out.push('\n');
    }
    plain_nodes(&doc.body, 0, &mut out);
    out
}

fn plain_nodes(nodes: &[BodyNode], depth: u32, out: &mut String) {
    for node in nodes {
        match node {
            BodyNode::PlainText(text) => {
                let mut lines = text.split('\n');
                if let Some(first) = lines.next() {
                    out.push_str(first);
                }
                for line in lines {
                    out.push('\n');
                    pad(depth, out);
                    out.push_str(line);
                }
            }
            BodyNode::RubyAnnotation { base, reading } => {
                let _ = write!(out, "{base}（{reading}）");
            }
            BodyNode::EmphasisSpan(text) => out.push_str(text),
            BodyNode::IndentBlock { level, children } => {
                let depth = depth.saturating_add(*level);
                pad(depth, out);
                plain_nodes(children, depth, out);
            }
            BodyNode::PageBreak => out.push_str("\n\u{c}\n"),
        }
    }
}

fn pad(depth: u32, out: &mut String) {
    out.extend(std::iter::repeat_n(INDENT_UNIT, depth as usize));
}
