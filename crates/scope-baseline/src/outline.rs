//! PRD outline parser
//!
//! Uses pulldown-cmark to flatten a PRD into an ordered list of headings,
//! list items and paragraph lines. Plain-text PRDs come out as paragraph
//! lines, which the extractor interprets with its own line rules.

use pulldown_cmark::{Event, Parser as MdParser, Tag, TagEnd};
use serde::{Deserialize, Serialize};

/// One structural element of a PRD, in document order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    /// Markdown heading
    Heading { level: u8, text: String },
    /// List item text (without nested items)
    Item {
        /// Nesting depth, 0 for top-level items
        depth: usize,
        text: String,
        /// Item owns a nested list
        has_children: bool,
    },
    /// One line of a paragraph outside any list
    Line {
        text: String,
        /// Text of a bold span opening the line (`**Label**: detail`)
        bold_label: Option<String>,
    },
}

/// Flattened PRD structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrdOutline {
    /// Document title (first H1)
    pub title: Option<String>,
    /// `title` from YAML front matter, if any
    pub front_matter_title: Option<String>,
    pub blocks: Vec<Block>,
}

impl PrdOutline {
    /// Parse PRD text. Never fails; unparseable front matter is kept as body text.
    #[must_use]
    pub fn parse(content: &str) -> Self {
        let (front_matter_title, body) = extract_front_matter(content);
        let mut outline = parse_structure(body);
        outline.front_matter_title = front_matter_title;
        outline
    }

    /// Title to report in baseline metadata
    #[must_use]
    pub fn document_title(&self) -> Option<&str> {
        self.front_matter_title.as_deref().or(self.title.as_deref())
    }
}

/// Split YAML front matter from the body
fn extract_front_matter(content: &str) -> (Option<String>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let Some(end) = rest.find("\n---") else {
        return (None, content);
    };

    let yaml = &rest[..end];
    let after = &rest[end + 4..];
    let body = after.split_once('\n').map_or("", |(_, body)| body);

    match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(value) => {
            let title = value
                .get("title")
                .and_then(serde_yaml::Value::as_str)
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty());
            (title, body)
        }
        Err(err) => {
            tracing::debug!("ignoring unparseable front matter: {err}");
            (None, content)
        }
    }
}

#[derive(Debug, Default)]
struct ItemFrame {
    text: String,
    flushed: bool,
}

#[derive(Debug, Default)]
struct LineState {
    text: String,
    bold_open_at_start: bool,
    bold_label: Option<String>,
}

impl LineState {
    fn flush(&mut self, blocks: &mut Vec<Block>) {
        let text = collapse_ws(&self.text);
        if !text.is_empty() {
            blocks.push(Block::Line {
                text,
                bold_label: self.bold_label.take().map(|l| collapse_ws(&l)),
            });
        }
        *self = LineState::default();
    }
}

fn parse_structure(content: &str) -> PrdOutline {
    let parser = MdParser::new(content);

    let mut blocks: Vec<Block> = Vec::new();
    let mut items: Vec<ItemFrame> = Vec::new();
    let mut heading: Option<(u8, String)> = None;
    let mut line: Option<LineState> = None;
    let mut in_code_block = false;
    let mut title: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                heading = Some((level as u8, String::new()));
            }
            Event::End(TagEnd::Heading(_)) => {
                if let Some((level, text)) = heading.take() {
                    let text = collapse_ws(&text);
                    if !text.is_empty() {
                        if level == 1 && title.is_none() {
                            title = Some(text.clone());
                        }
                        blocks.push(Block::Heading { level, text });
                    }
                }
            }
            Event::Start(Tag::List(_)) => {
                // A nested list closes the text of the item that owns it
                let depth = items.len().saturating_sub(1);
                if let Some(parent) = items.last_mut().filter(|p| !p.flushed) {
                    let text = collapse_ws(&parent.text);
                    parent.flushed = true;
                    if !text.is_empty() {
                        blocks.push(Block::Item {
                            depth,
                            text,
                            has_children: true,
                        });
                    }
                }
            }
            Event::Start(Tag::Item) => items.push(ItemFrame::default()),
            Event::End(TagEnd::Item) => {
                if let Some(frame) = items.pop() {
                    let text = collapse_ws(&frame.text);
                    if !frame.flushed && !text.is_empty() {
                        blocks.push(Block::Item {
                            depth: items.len(),
                            text,
                            has_children: false,
                        });
                    }
                }
            }
            Event::Start(Tag::Paragraph) => {
                if items.is_empty() && heading.is_none() {
                    line = Some(LineState::default());
                } else if let Some(frame) = items.last_mut() {
                    push_spaced(&mut frame.text, "");
                }
            }
            Event::End(TagEnd::Paragraph) => {
                if let Some(mut state) = line.take() {
                    state.flush(&mut blocks);
                }
            }
            Event::Start(Tag::Strong) => {
                if let Some(state) = line.as_mut() {
                    if state.text.trim().is_empty() {
                        state.bold_open_at_start = true;
                    }
                }
            }
            Event::End(TagEnd::Strong) => {
                if let Some(state) = line.as_mut() {
                    if state.bold_open_at_start && state.bold_label.is_none() {
                        state.bold_label = Some(state.text.clone());
                    }
                    state.bold_open_at_start = false;
                }
            }
            Event::Start(Tag::CodeBlock(_)) => in_code_block = true,
            Event::End(TagEnd::CodeBlock) => in_code_block = false,
            Event::Text(text) | Event::Code(text) => {
                if in_code_block {
                    continue;
                }
                if let Some((_, buf)) = heading.as_mut() {
                    buf.push_str(&text);
                } else if let Some(frame) = items.last_mut() {
                    frame.text.push_str(&text);
                } else if let Some(state) = line.as_mut() {
                    state.text.push_str(&text);
                }
            }
            Event::SoftBreak | Event::HardBreak => {
                if let Some((_, buf)) = heading.as_mut() {
                    buf.push(' ');
                } else if let Some(frame) = items.last_mut() {
                    frame.text.push(' ');
                } else if let Some(state) = line.as_mut() {
                    state.flush(&mut blocks);
                }
            }
            _ => {}
        }
    }

    PrdOutline {
        title,
        front_matter_title: None,
        blocks,
    }
}

fn push_spaced(buf: &mut String, text: &str) {
    if !buf.is_empty() && !buf.ends_with(' ') {
        buf.push(' ');
    }
    buf.push_str(text);
}

/// Trim and collapse internal whitespace runs to single spaces
pub(crate) fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
