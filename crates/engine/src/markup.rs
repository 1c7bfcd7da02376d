//! Archive annotation markup → [`StructuredDocument`].

use std::sync::LazyLock;

use bunko_core::{BodyNode, StructuredDocument};
use regex::{Captures, Regex};

const SEPARATOR: &str = "-------";

static INLINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"｜(?P<mbase>[^｜《\n]+)《(?P<mread>[^》]+)》",
        r"|(?P<base>[一-龠々]+)《(?P<read>[^》]+)》",
        r"|［＃「(?P<em>[^」]+)」に傍点］",
        r"|［＃ここから(?P<indent>[0-9０-９]+)字下げ］",
        r"|(?P<dedent>［＃ここで字下げ終わり］)",
        r"|(?P<page>［＃改ページ］)",
    ))
    .expect("inline markup pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// How many leading lines may hold the title and author.
    pub metadata_scan_lines: usize,
    /// Author lines must be shorter than this many characters.
    pub author_max_chars: usize,
    /// A separator only ends the front matter when it sits below this line index.
    pub separator_min_line: usize,
    /// First line index considered when no separator is found.
    pub fallback_scan_from: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            metadata_scan_lines: 10,
            author_max_chars: 50,
            separator_min_line: 5,
            fallback_scan_from: 3,
        }
    }
}

impl ParseOptions {
    pub fn from_settings(settings: &bunko_core::Settings) -> Self {
        Self {
            metadata_scan_lines: settings.metadata_scan_lines,
            author_max_chars: settings.author_max_chars,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FrontMatter<'a> {
    title: &'a str,
    author: &'a str,
    body_start: Option<usize>,
}

pub fn parse(text: &str, options: &ParseOptions) -> StructuredDocument {
    let text = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
    let lines: Vec<&str> = text.split('\n').collect();
    let front = front_matter(&lines, options);

    let (title, author, body_text) = match front.body_start {
        Some(start) => (
            front.title.to_string(),
            front.author.to_string(),
            lines.get(start..).unwrap_or_default().join("\n"),
        ),
        None => (String::new(), String::new(), text.clone()),
    };

    let (body, anomalies) = parse_inline(&body_text);
    StructuredDocument {
        title,
        author,
        body,
        anomalies,
    }
}

fn front_matter<'a>(lines: &[&'a str], options: &ParseOptions) -> FrontMatter<'a> {
    let mut title = "";
    let mut author = "";
    for line in lines.iter().take(options.metadata_scan_lines) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if title.is_empty() {
            title = line;
        } else if line.chars().count() < options.author_max_chars {
            author = line;
            break;
        }
    }

    FrontMatter {
        title,
        author,
        body_start: body_after_separator(lines, options)
            .or_else(|| first_prose_line(lines, options)),
    }
}

fn body_after_separator(lines: &[&str], options: &ParseOptions) -> Option<usize> {
    let separator = lines
        .iter()
        .enumerate()
        .position(|(idx, line)| idx > options.separator_min_line && line.contains(SEPARATOR))?;
    lines
        .iter()
        .enumerate()
        .skip(separator + 1)
        .find(|(_, line)| line.trim().is_empty())
        .map(|(idx, _)| idx + 1)
}

fn first_prose_line(lines: &[&str], options: &ParseOptions) -> Option<usize> {
    lines
        .iter()
        .enumerate()
        .skip(options.fallback_scan_from)
        .find(|(_, line)| {
            let line = line.trim();
            !line.is_empty()
                && !line.contains('【')
                && !line.contains(SEPARATOR)
                && !line.contains("《》")
                && !line.contains("｜：")
        })
        .map(|(idx, _)| idx)
}

/// Open indent regions are a stack; each frame collects its children until closed.
#[derive(Debug, Default)]
struct BodyBuilder {
    root: Vec<BodyNode>,
    open: Vec<(u32, Vec<BodyNode>)>,
    anomalies: usize,
}

impl BodyBuilder {
    fn target(&mut self) -> &mut Vec<BodyNode> {
        match self.open.last_mut() {
            Some((_, children)) => children,
            None => &mut self.root,
        }
    }

    fn text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let target = self.target();
        if let Some(BodyNode::PlainText(last)) = target.last_mut() {
            last.push_str(text);
        } else {
            target.push(BodyNode::PlainText(text.to_string()));
        }
    }

    fn node(&mut self, node: BodyNode) {
        self.target().push(node);
    }

    fn open_indent(&mut self, level: u32) {
        self.open.push((level, Vec::new()));
    }

    fn close_indent(&mut self) {
        match self.open.pop() {
            Some((level, children)) => self.node(BodyNode::IndentBlock { level, children }),
            None => {
                self.anomalies += 1;
                tracing::debug!("indent end without a matching start; ignored");
            }
        }
    }

    fn finish(mut self) -> (Vec<BodyNode>, usize) {
        if !self.open.is_empty() {
            tracing::debug!(
                unclosed = self.open.len(),
                "indent start without a matching end; closed at end of document"
            );
        }
        while let Some((level, children)) = self.open.pop() {
            self.anomalies += 1;
            self.node(BodyNode::IndentBlock { level, children });
        }
        (self.root, self.anomalies)
    }
}

fn parse_inline(body: &str) -> (Vec<BodyNode>, usize) {
    let mut builder = BodyBuilder::default();
    let mut cursor = 0;

    for caps in INLINE.captures_iter(body) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        builder.text(&body[cursor..whole.start()]);
        cursor = whole.end();
        apply(&mut builder, &caps);
    }
    builder.text(&body[cursor..]);
    builder.finish()
}

fn apply(builder: &mut BodyBuilder, caps: &Captures<'_>) {
    let group = |name: &str| caps.name(name).map(|m| m.as_str());

    if let (Some(base), Some(reading)) = (
        group("mbase").or_else(|| group("base")),
        group("mread").or_else(|| group("read")),
    ) {
        builder.node(BodyNode::RubyAnnotation {
            base: base.to_string(),
            reading: reading.to_string(),
        });
    } else if let Some(text) = group("em") {
        builder.node(BodyNode::EmphasisSpan(text.to_string()));
    } else if let Some(level) = group("indent") {
        builder.open_indent(indent_level(level));
    } else if group("dedent").is_some() {
        builder.close_indent();
    } else if group("page").is_some() {
        builder.node(BodyNode::PageBreak);
    }
}

fn indent_level(digits: &str) -> u32 {
    digits
        .chars()
        .filter_map(|ch| match ch {
            '０'..='９' => Some(ch as u32 - '０' as u32),
            _ => ch.to_digit(10),
        })
        .fold(0u32, |acc, digit| acc.saturating_mul(10).saturating_add(digit))
}
