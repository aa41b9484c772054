use askama::Template;
use serde::Deserialize;
use serde_json::{Map, Value};

/// A newsletter body as stored, interpreted once per campaign.
///
/// Bodies written in the editor arrive as an ops document (`{"ops": [...]}` or a bare
/// array). Anything else is treated as literal text.
#[derive(Debug, Clone, PartialEq)]
pub enum RichBody {
    Structured(Vec<Op>),
    Opaque(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Op {
    pub insert: Insert,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Insert {
    Text(String),
    Embed(Map<String, Value>),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Attributes {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strike: bool,
    #[serde(default)]
    pub link: Option<String>,
    /// Line-level: carried by the op holding the line's terminating newline.
    #[serde(default)]
    pub header: Option<u8>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OpsDocument {
    Wrapped { ops: Vec<Op> },
    Bare(Vec<Op>),
}

impl RichBody {
    pub fn parse(source: &str) -> Self {
        match serde_json::from_str::<OpsDocument>(source) {
            Ok(OpsDocument::Wrapped { ops }) | Ok(OpsDocument::Bare(ops)) => {
                RichBody::Structured(ops)
            }
            Err(_) => RichBody::Opaque(source.to_string()),
        }
    }

    pub fn to_html(&self) -> Result<String, askama::Error> {
        let blocks = match self {
            RichBody::Structured(ops) => structured_blocks(ops),
            RichBody::Opaque(text) => opaque_blocks(text),
        };
        RichBodyHtml { blocks }.render()
    }

    pub fn to_text(&self) -> String {
        match self {
            RichBody::Structured(ops) => ops
                .iter()
                .filter_map(|op| match &op.insert {
                    Insert::Text(text) => Some(text.as_str()),
                    Insert::Embed(_) => None,
                })
                .collect(),
            RichBody::Opaque(text) => text.clone(),
        }
    }
}

/// One paragraph or header of a rendered body.
#[derive(Debug, Default)]
struct Block {
    /// 0 for a paragraph.
    header: u8,
    runs: Vec<Run>,
}

/// A span of text sharing one set of inline formats, or an image.
#[derive(Debug, Default)]
struct Run {
    text: String,
    /// Empty when the run is not linked or its target was rejected.
    link: String,
    /// Non-empty only for image embeds.
    image: String,
    bold: bool,
    italic: bool,
    underline: bool,
    strike: bool,
    line_break: bool,
}

impl Run {
    fn text(text: &str, attributes: &Attributes) -> Self {
        Self {
            text: text.to_string(),
            link: attributes
                .link
                .as_deref()
                .and_then(safe_url)
                .unwrap_or_default()
                .to_string(),
            bold: attributes.bold,
            italic: attributes.italic,
            underline: attributes.underline,
            strike: attributes.strike,
            ..Self::default()
        }
    }
}

#[derive(Template)]
#[template(path = "rich_body.html")]
struct RichBodyHtml {
    blocks: Vec<Block>,
}

fn opaque_blocks(text: &str) -> Vec<Block> {
    let runs = text
        .replace("\r\n", "\n")
        .split('\n')
        .enumerate()
        .map(|(i, line)| Run {
            text: line.to_string(),
            line_break: i > 0,
            ..Run::default()
        })
        .collect();
    vec![Block { header: 0, runs }]
}

fn structured_blocks(ops: &[Op]) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut line = Vec::new();

    for op in ops {
        match &op.insert {
            Insert::Text(text) => {
                let mut segments = text.split('\n').peekable();
                while let Some(segment) = segments.next() {
                    if !segment.is_empty() {
                        line.push(Run::text(segment, &op.attributes));
                    }
                    // every segment but the last was terminated by a newline
                    if segments.peek().is_some() {
                        blocks.push(close_line(&mut line, op.attributes.header));
                    }
                }
            }
            Insert::Embed(embed) => {
                if let Some(src) = embed
                    .get("image")
                    .and_then(Value::as_str)
                    .and_then(safe_url)
                {
                    line.push(Run {
                        image: src.to_string(),
                        ..Run::default()
                    });
                }
            }
        }
    }

    if !line.is_empty() {
        blocks.push(close_line(&mut line, None));
    }
    blocks
}

fn close_line(line: &mut Vec<Run>, header: Option<u8>) -> Block {
    Block {
        header: header.filter(|level| (1..=6).contains(level)).unwrap_or(0),
        runs: std::mem::take(line),
    }
}

fn safe_url(raw: &str) -> Option<&str> {
    let url = url::Url::parse(raw).ok()?;
    matches!(url.scheme(), "http" | "https" | "mailto").then_some(raw)
}
