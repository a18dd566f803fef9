//! Record file codec: a `---` delimited header of `key: value` lines followed
//! by free-form body text.
//!
//! Header values are scalars, bracketed lists (`[a, b]`) or one level of
//! indented sections. Values that would not survive a round trip unquoted
//! are written as double-quoted JSON strings. Single-quoted values with `''`
//! escapes are accepted when reading.

use gitvault_types::RecordFile;

use crate::error::CodecError;

pub const DELIMITER: &str = "---";
const INDENT: &str = "  ";

/// Schema of a record header: how a frontmatter struct maps to header lines.
pub trait Frontmatter: Sized {
    fn write_header(&self, w: &mut HeaderWriter);
    fn read_header(r: &HeaderReader<'_>) -> Self;
}

pub fn serialize<F: Frontmatter>(record: &RecordFile<F>) -> String {
    let mut writer = HeaderWriter::default();
    record.frontmatter.write_header(&mut writer);

    let mut out = String::from(DELIMITER);
    out.push('\n');
    for line in &writer.lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(&record.content);
    out
}

pub fn parse<F: Frontmatter>(text: &str) -> Result<RecordFile<F>, CodecError> {
    let (block, body) = split_document(text)?;
    let header = Header::parse(block);
    Ok(RecordFile {
        frontmatter: F::read_header(&header.reader()),
        content: body.to_string(),
    })
}

/// Split a record file into header block and body. The blank line that
/// separates them is not part of the body.
pub fn split_document(text: &str) -> Result<(&str, &str), CodecError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let after_open = match text.split_once('\n') {
        Some((first, rest)) if first.trim_end() == DELIMITER => rest,
        _ => return Err(CodecError::MissingOpenDelimiter),
    };

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            let header = &after_open[..offset];
            let rest = &after_open[offset + line.len()..];
            let body = rest
                .strip_prefix("\r\n")
                .or_else(|| rest.strip_prefix('\n'))
                .unwrap_or(rest);
            return Ok((header, body));
        }
        offset += line.len();
    }
    Err(CodecError::MissingCloseDelimiter)
}

// =====================================================
// Header model
// =====================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Scalar(String),
    List(Vec<String>),
    Section(Vec<(String, HeaderValue)>),
}

#[derive(Debug, Default)]
pub struct Header {
    entries: Vec<(String, HeaderValue)>,
}

impl Header {
    pub fn parse(block: &str) -> Self {
        let mut entries: Vec<(String, HeaderValue)> = Vec::new();
        for line in block.lines() {
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            let nested = line.starts_with(' ') || line.starts_with('\t');
            let Some((key, raw)) = line.trim().split_once(':') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = parse_value(raw.trim());

            if !nested {
                entries.push((key, value));
                continue;
            }
            if let Some((_, parent)) = entries.last_mut() {
                match parent {
                    HeaderValue::Section(children) => children.push((key, value)),
                    HeaderValue::Scalar(s) if s.is_empty() => {
                        *parent = HeaderValue::Section(vec![(key, value)]);
                    }
                    _ => {}
                }
            }
        }
        Self { entries }
    }

    pub fn reader(&self) -> HeaderReader<'_> {
        HeaderReader {
            entries: &self.entries,
        }
    }
}

fn parse_value(raw: &str) -> HeaderValue {
    if raw.starts_with('[') && raw.ends_with(']') {
        let inner = raw[1..raw.len() - 1].trim();
        if inner.is_empty() {
            return HeaderValue::List(Vec::new());
        }
        return HeaderValue::List(split_items(inner).iter().map(|item| unquote(item.trim())).collect());
    }
    HeaderValue::Scalar(unquote(raw))
}

/// Split list items on commas outside quotes.
fn split_items(inner: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_double = false;
    let mut in_single = false;
    let mut escaped = false;
    for (i, ch) in inner.char_indices() {
        if in_double {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_double = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '\'' => in_single = !in_single,
            '"' if !in_single => in_double = true,
            ',' if !in_single => {
                items.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&inner[start..]);
    items
}

fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        if let Ok(value) = serde_json::from_str::<String>(raw) {
            return value;
        }
        return raw[1..raw.len() - 1].to_string();
    }
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].replace("''", "'");
    }
    raw.to_string()
}

fn needs_quotes(value: &str, in_list: bool) -> bool {
    if value.trim() != value {
        return true;
    }
    if value.starts_with(['[', '"', '\'', '#']) {
        return true;
    }
    if value.chars().any(char::is_control) {
        return true;
    }
    in_list && (value.is_empty() || value.contains([',', '[', ']', '\'', '"']))
}

fn quote(value: &str, in_list: bool) -> String {
    if needs_quotes(value, in_list) {
        serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
    } else {
        value.to_string()
    }
}

// =====================================================
// Writing
// =====================================================

#[derive(Debug, Default)]
pub struct HeaderWriter {
    lines: Vec<String>,
    nested: bool,
}

impl HeaderWriter {
    fn push(&mut self, key: &str, rendered: &str) {
        let indent = if self.nested { INDENT } else { "" };
        if rendered.is_empty() {
            self.lines.push(format!("{}{}:", indent, key));
        } else {
            self.lines.push(format!("{}{}: {}", indent, key, rendered));
        }
    }

    pub fn text(&mut self, key: &str, value: &str) -> &mut Self {
        let rendered = quote(value, false);
        self.push(key, &rendered);
        self
    }

    /// Written only when present
    pub fn optional_text(&mut self, key: &str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value {
            self.text(key, value);
        }
        self
    }

    pub fn number(&mut self, key: &str, value: impl std::fmt::Display) -> &mut Self {
        let rendered = value.to_string();
        self.push(key, &rendered);
        self
    }

    pub fn flag(&mut self, key: &str, value: bool) -> &mut Self {
        self.push(key, if value { "true" } else { "false" });
        self
    }

    pub fn list(&mut self, key: &str, items: &[String]) -> &mut Self {
        let rendered: Vec<String> = items.iter().map(|item| quote(item, true)).collect();
        let rendered = format!("[{}]", rendered.join(", "));
        self.push(key, &rendered);
        self
    }

    pub fn section(&mut self, key: &str, build: impl FnOnce(&mut HeaderWriter)) -> &mut Self {
        self.push(key, "");
        let mut child = HeaderWriter {
            lines: Vec::new(),
            nested: true,
        };
        build(&mut child);
        self.lines.extend(child.lines);
        self
    }
}

// =====================================================
// Reading
// =====================================================

/// Tolerant view over parsed header entries: absent or mistyped keys read
/// as the type's default.
#[derive(Debug, Clone, Copy)]
pub struct HeaderReader<'a> {
    entries: &'a [(String, HeaderValue)],
}

impl<'a> HeaderReader<'a> {
    fn get(&self, key: &str) -> Option<&'a HeaderValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn optional_text(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(HeaderValue::Scalar(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> String {
        self.optional_text(key).unwrap_or_default()
    }

    /// Present and non-empty
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.optional_text(key).filter(|s| !s.is_empty())
    }

    pub fn list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(HeaderValue::List(items)) => items.clone(),
            Some(HeaderValue::Scalar(s)) if !s.is_empty() => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    pub fn optional_float(&self, key: &str) -> Option<f64> {
        self.non_empty(key).and_then(|s| s.parse::<f64>().ok())
    }

    pub fn float(&self, key: &str) -> f64 {
        self.optional_float(key).unwrap_or(0.0)
    }

    pub fn int(&self, key: &str) -> i64 {
        let Some(raw) = self.non_empty(key) else {
            return 0;
        };
        raw.parse::<i64>()
            .ok()
            .or_else(|| raw.parse::<f64>().ok().map(|f| f.round() as i64))
            .unwrap_or(0)
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.optional_text(key).as_deref(), Some("true"))
    }

    pub fn section(&self, key: &str) -> HeaderReader<'a> {
        match self.get(key) {
            Some(HeaderValue::Section(children)) => HeaderReader { entries: children },
            _ => HeaderReader { entries: &[] },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Note {
        id: String,
        title: String,
        score: i64,
        weight: f64,
        pinned: bool,
        tags: Vec<String>,
        owner: Option<String>,
        author: String,
        source: String,
    }

    impl Frontmatter for Note {
        fn write_header(&self, w: &mut HeaderWriter) {
            w.text("id", &self.id)
                .text("title", &self.title)
                .number("score", self.score)
                .number("weight", self.weight)
                .flag("pinned", self.pinned)
                .list("tags", &self.tags)
                .optional_text("owner", self.owner.as_deref())
                .section("meta", |m| {
                    m.text("author", &self.author).text("source", &self.source);
                });
        }

        fn read_header(r: &HeaderReader<'_>) -> Self {
            let meta = r.section("meta");
            Self {
                id: r.text("id"),
                title: r.text("title"),
                score: r.int("score"),
                weight: r.float("weight"),
                pinned: r.flag("pinned"),
                tags: r.list("tags"),
                owner: r.optional_text("owner"),
                author: meta.text("author"),
                source: meta.text("source"),
            }
        }
    }

    fn note() -> Note {
        Note {
            id: "n1".into(),
            title: "Plan: ship v2 [draft]".into(),
            score: 3,
            weight: 0.75,
            pinned: true,
            tags: vec!["work".into(), "q3, maybe".into(), "it's".into(), "[x]".into()],
            owner: None,
            author: "  padded ".into(),
            source: "it's \"quoted\"".into(),
        }
    }

    #[test]
    fn test_round_trip_preserves_header_and_body() {
        let record = RecordFile {
            frontmatter: note(),
            content: "\nfirst line\n---\nnot a delimiter for the header\n".to_string(),
        };
        let text = serialize(&record);
        let parsed: RecordFile<Note> = parse(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_multiline_value_round_trip() {
        let mut fm = note();
        fm.title = "line one\nline two".into();
        let record = RecordFile {
            frontmatter: fm,
            content: String::new(),
        };
        let text = serialize(&record);
        assert!(text.contains("title: \"line one\\nline two\""));
        let parsed: RecordFile<Note> = parse(&text).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_layout() {
        let record = RecordFile {
            frontmatter: Note {
                id: "n1".into(),
                title: "Hello".into(),
                tags: vec!["a".into(), "b".into()],
                author: "me".into(),
                ..Note::default()
            },
            content: "Body".to_string(),
        };
        let expected = "---\nid: n1\ntitle: Hello\nscore: 0\nweight: 0\npinned: false\ntags: [a, b]\nmeta:\n  author: me\n  source:\n---\n\nBody";
        assert_eq!(serialize(&record), expected);
    }

    #[test]
    fn test_missing_fields_read_as_defaults() {
        let parsed: RecordFile<Note> = parse("---\nid: n9\n---\n\ntext").unwrap();
        assert_eq!(parsed.frontmatter.id, "n9");
        assert_eq!(parsed.frontmatter.title, "");
        assert_eq!(parsed.frontmatter.score, 0);
        assert!(parsed.frontmatter.tags.is_empty());
        assert_eq!(parsed.frontmatter.owner, None);
        assert_eq!(parsed.frontmatter.author, "");
        assert_eq!(parsed.content, "text");
    }

    #[test]
    fn test_single_quoted_values_are_accepted() {
        let text = "---\nid: n2\ntitle: 'Don''t: panic'\ntags: ['a, b', c]\nmeta:\n  author: 'x'\n---\n\n";
        let parsed: RecordFile<Note> = parse(text).unwrap();
        assert_eq!(parsed.frontmatter.title, "Don't: panic");
        assert_eq!(parsed.frontmatter.tags, vec!["a, b".to_string(), "c".to_string()]);
        assert_eq!(parsed.frontmatter.author, "x");
    }

    #[test]
    fn test_crlf_documents() {
        let parsed: RecordFile<Note> = parse("---\r\nid: n3\r\nscore: 7\r\n---\r\n\r\nbody\r\n").unwrap();
        assert_eq!(parsed.frontmatter.id, "n3");
        assert_eq!(parsed.frontmatter.score, 7);
        assert_eq!(parsed.content, "body\r\n");
    }

    #[test]
    fn test_missing_opening_delimiter() {
        let result: Result<RecordFile<Note>, _> = parse("id: n1\n---\n\nbody");
        assert_eq!(result.unwrap_err(), CodecError::MissingOpenDelimiter);
    }

    #[test]
    fn test_missing_closing_delimiter() {
        let result: Result<RecordFile<Note>, _> = parse("---\nid: n1\ntitle: x\n");
        assert_eq!(result.unwrap_err(), CodecError::MissingCloseDelimiter);
    }

    #[test]
    fn test_unparseable_numbers_fall_back_to_zero() {
        let parsed: RecordFile<Note> = parse("---\nscore: lots\nweight: 2.5\n---\n").unwrap();
        assert_eq!(parsed.frontmatter.score, 0);
        assert_eq!(parsed.frontmatter.weight, 2.5);
        assert_eq!(parsed.content, "");
    }
}
