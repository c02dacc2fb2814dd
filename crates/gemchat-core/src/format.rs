//! Assistant reply formatter.
//!
//! Model replies use loose asterisk conventions instead of real markdown:
//! `* Title*` for headings, `* item` for bullets, `** item` for nested bullets
//! and `**bold**` spans inside bullets. This module turns that text into HTML
//! markup, one block per input line.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

const MAIN_HEADING_CLASS: &str = "text-lg font-bold text-white mb-3 mt-4 first:mt-0";
const SUB_HEADING_CLASS: &str = "text-base font-semibold text-gray-200 mb-2 mt-3";
const BULLET_CLASS: &str = "text-sm text-gray-300 mb-1 ml-4";
const SUB_BULLET_CLASS: &str = "text-xs text-gray-400 mb-1 ml-8";
const PARAGRAPH_CLASS: &str = "text-sm text-gray-300 mb-2";
const EMPHASIS_CLASS: &str = "text-white font-semibold";
const LIST_CLASS: &str = "list-disc list-inside mb-3";

// `[^\n\r\x{2028}\x{2029}]` is "any character except a line terminator";
// plain `.` only stops at `\n`.
static EMPHASIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*([^\n\r\x{2028}\x{2029}]*?)\*\*").expect("emphasis pattern is valid")
});

static LIST_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(<li[^>]*>[^\n\r\x{2028}\x{2029}]*?</li>)+")
        .expect("list run pattern is valid")
});

/// HTML produced by [`format_response`].
///
/// Reply text is inserted verbatim, without escaping. Replies come from a
/// remote model and are only moderately trusted, so this type is the one
/// place where unescaped markup is allowed: render it through an explicit
/// trusted-markup path (the transcript template uses `|safe`) and never
/// concatenate it with escaped user input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup(String);

impl Markup {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Markup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Markup {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Classification of a single trimmed line.
///
/// The payload is the line text with its asterisk delimiters removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block<'a> {
    MainHeading(&'a str),
    SubHeading(&'a str),
    Bullet(&'a str),
    SubBullet(&'a str),
    Paragraph(&'a str),
    BlankLine,
}

impl Block<'_> {
    /// Short name used by `gemchat format --explain`.
    pub fn kind(&self) -> &'static str {
        match self {
            Block::MainHeading(_) => "main-heading",
            Block::SubHeading(_) => "sub-heading",
            Block::Bullet(_) => "bullet",
            Block::SubBullet(_) => "sub-bullet",
            Block::Paragraph(_) => "paragraph",
            Block::BlankLine => "blank",
        }
    }

    fn render_into(&self, out: &mut String) {
        match *self {
            Block::MainHeading(text) => {
                out.push_str(&format!(r#"<h2 class="{MAIN_HEADING_CLASS}">{text}</h2>"#));
            }
            Block::SubHeading(text) => {
                out.push_str(&format!(r#"<h3 class="{SUB_HEADING_CLASS}">{text}</h3>"#));
            }
            Block::Bullet(text) => {
                let text = EMPHASIS.replace_all(
                    text,
                    format!(r#"<strong class="{EMPHASIS_CLASS}">${{1}}</strong>"#).as_str(),
                );
                out.push_str(&format!(r#"<li class="{BULLET_CLASS}">{text}</li>"#));
            }
            Block::SubBullet(text) => {
                out.push_str(&format!(r#"<li class="{SUB_BULLET_CLASS}">{text}</li>"#));
            }
            Block::Paragraph(text) => {
                out.push_str(&format!(r#"<p class="{PARAGRAPH_CLASS}">{text}</p>"#));
            }
            Block::BlankLine => out.push_str("<br>"),
        }
    }
}

/// Classifies one line of reply text.
///
/// Rules are tested in this order and the first match wins:
/// `* …*` heading, `** …**` sub-heading, `* …` bullet, `** …` sub-bullet,
/// any other non-empty line is a paragraph. A line starting with `** ` never
/// matches the single-asterisk rules because its second character is `*`.
pub fn classify(line: &str) -> Block<'_> {
    let line = trim_line(line);

    if let Some(rest) = line.strip_prefix("* ")
        && let Some(heading) = rest.strip_suffix('*')
    {
        return Block::MainHeading(heading);
    }
    if let Some(rest) = line.strip_prefix("** ")
        && let Some(heading) = rest.strip_suffix("**")
    {
        return Block::SubHeading(heading);
    }
    if let Some(rest) = line.strip_prefix("* ") {
        return Block::Bullet(rest);
    }
    if let Some(rest) = line.strip_prefix("** ") {
        return Block::SubBullet(rest);
    }
    if line.is_empty() {
        Block::BlankLine
    } else {
        Block::Paragraph(line)
    }
}

/// Trims whitespace, line terminators and byte order marks from both ends.
/// NEL (U+0085) is not trimmed.
fn trim_line(line: &str) -> &str {
    line.trim_matches(|c: char| c == '\u{FEFF}' || (c.is_whitespace() && c != '\u{85}'))
}

/// Formats a model reply into markup. `None` and `""` produce empty markup.
pub fn format_response(text: Option<&str>) -> Markup {
    match text {
        Some(text) => format_text(text),
        None => Markup::default(),
    }
}

/// Formats a model reply into markup.
pub fn format_text(text: &str) -> Markup {
    if text.is_empty() {
        return Markup::default();
    }

    let mut fragments = String::with_capacity(text.len() * 2);
    for line in text.split('\n') {
        classify(line).render_into(&mut fragments);
    }

    let wrapped = LIST_RUN.replace_all(&fragments, |caps: &regex::Captures<'_>| {
        format!(r#"<ul class="{LIST_CLASS}">{}</ul>"#, &caps[0])
    });

    Markup(wrapped.into_owned())
}
