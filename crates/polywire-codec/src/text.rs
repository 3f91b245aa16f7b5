//! YAML-subset text format.
//!
//! Bodies are UTF-8. Top-level mapping entries are `key: value` lines;
//! nested mappings and typed objects use `!Alias { ... }` braces with
//! two-space indentation; sequences render inline as `[a, b, c]`. Plain
//! scalars stay bare, anything ambiguous is double-quoted with backslash
//! escapes. A document whose first content byte would fall outside the
//! ASCII range gains a leading space so polymorphic readers can detect
//! text from the first byte.

use polywire_frame::Framing;
use polywire_store::ByteStore;

use crate::error::{Result, WireError};
use crate::value::{Field, Value};

/// Per-document renderer state.
#[derive(Debug)]
pub(crate) struct TextState {
    pub doc_start: u64,
    contexts: Vec<Ctx>,
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum Ctx {
    Top,
    Brace { first: bool },
    Seq { first: bool },
}

impl TextState {
    pub fn new(doc_start: u64) -> Self {
        Self {
            doc_start,
            contexts: vec![Ctx::Top],
        }
    }

    fn brace_depth(&self) -> usize {
        self.contexts
            .iter()
            .filter(|ctx| matches!(ctx, Ctx::Brace { .. }))
            .count()
    }
}

fn put<S: ByteStore>(f: &mut Framing<S>, bytes: &[u8]) -> Result<()> {
    f.buf_mut().write_slice(bytes)?;
    Ok(())
}

// A text stream must begin with an ASCII byte so format discovery can look
// at the first byte alone.
fn guard_first_byte<S: ByteStore>(f: &mut Framing<S>, st: &TextState, first: u8) -> Result<()> {
    if f.buf().write_position() == st.doc_start && first >= 0x80 {
        put(f, b" ")?;
    }
    Ok(())
}

pub(crate) fn write_field<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    field: &Field,
) -> Result<()> {
    let key = match field {
        Field::Named(name) => name.clone(),
        Field::Ordinal(ordinal) => ordinal.to_string(),
        Field::Anonymous => return Ok(()),
    };
    guard_first_byte(f, st, key.as_bytes().first().copied().unwrap_or(b' '))?;

    if let Some(Ctx::Brace { first }) = st.contexts.last_mut() {
        let lead = if *first { "\n" } else { ",\n" };
        *first = false;
        put(f, lead.as_bytes())?;
        let indent = "  ".repeat(st.brace_depth());
        put(f, indent.as_bytes())?;
    }

    if scalar_needs_quotes(&key) {
        put(f, quote(&key).as_bytes())?;
    } else {
        put(f, key.as_bytes())?;
    }
    put(f, b": ")
}

// Closes a value: top-level entries are newline terminated.
fn end_scalar<S: ByteStore>(f: &mut Framing<S>, st: &TextState) -> Result<()> {
    if st.contexts.last() == Some(&Ctx::Top) {
        put(f, b"\n")?;
    }
    Ok(())
}

fn write_scalar_token<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    token: &str,
) -> Result<()> {
    guard_first_byte(f, st, token.as_bytes().first().copied().unwrap_or(b' '))?;
    put(f, token.as_bytes())?;
    end_scalar(f, st)
}

pub(crate) fn write_text<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    s: &str,
) -> Result<()> {
    if scalar_needs_quotes(s) {
        write_scalar_token(f, st, &quote(s))
    } else {
        write_scalar_token(f, st, s)
    }
}

/// Symbols render bare; callers keep them identifier-like.
pub(crate) fn write_symbol<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    symbol: &str,
) -> Result<()> {
    write_scalar_token(f, st, symbol)
}

pub(crate) fn write_i64<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    value: i64,
) -> Result<()> {
    write_scalar_token(f, st, &value.to_string())
}

pub(crate) fn write_f64<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    value: f64,
) -> Result<()> {
    write_scalar_token(f, st, &value.to_string())
}

pub(crate) fn write_bool<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    value: bool,
) -> Result<()> {
    write_scalar_token(f, st, if value { "true" } else { "false" })
}

pub(crate) fn write_null<S: ByteStore>(f: &mut Framing<S>, st: &mut TextState) -> Result<()> {
    // an empty scalar reads back as null
    end_scalar(f, st)
}

pub(crate) fn begin_typed<S: ByteStore>(
    f: &mut Framing<S>,
    st: &mut TextState,
    alias: &str,
) -> Result<()> {
    guard_first_byte(f, st, b'!')?;
    put(f, b"!")?;
    put(f, alias.as_bytes())?;
    put(f, b" ")
}

pub(crate) fn begin_mapping<S: ByteStore>(f: &mut Framing<S>, st: &mut TextState) -> Result<()> {
    guard_first_byte(f, st, b'{')?;
    put(f, b"{")?;
    st.contexts.push(Ctx::Brace { first: true });
    Ok(())
}

pub(crate) fn end_mapping<S: ByteStore>(f: &mut Framing<S>, st: &mut TextState) -> Result<()> {
    st.contexts.pop();
    put(f, b"\n")?;
    let indent = "  ".repeat(st.brace_depth());
    put(f, indent.as_bytes())?;
    put(f, b"}")?;
    end_scalar(f, st)
}

pub(crate) fn begin_sequence<S: ByteStore>(f: &mut Framing<S>, st: &mut TextState) -> Result<()> {
    guard_first_byte(f, st, b'[')?;
    put(f, b"[")?;
    st.contexts.push(Ctx::Seq { first: true });
    Ok(())
}

/// Separator before each sequence element.
pub(crate) fn next_element<S: ByteStore>(f: &mut Framing<S>, st: &mut TextState) -> Result<()> {
    if let Some(Ctx::Seq { first }) = st.contexts.last_mut() {
        if *first {
            *first = false;
        } else {
            put(f, b", ")?;
        }
    }
    Ok(())
}

pub(crate) fn end_sequence<S: ByteStore>(f: &mut Framing<S>, st: &mut TextState) -> Result<()> {
    st.contexts.pop();
    put(f, b"]")?;
    end_scalar(f, st)
}

fn scalar_needs_quotes(s: &str) -> bool {
    if s.is_empty() {
        return true;
    }
    if s.starts_with(char::is_whitespace) || s.ends_with(char::is_whitespace) {
        return true;
    }
    if s.starts_with('!') || s.starts_with('-') {
        return true;
    }
    if s.contains(['"', '\n', '\r', ',', ':', '#', '{', '}', '[', ']']) {
        return true;
    }
    matches!(s, "true" | "false")
        || s.parse::<i64>().is_ok()
        || s.parse::<f64>().is_ok()
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Parse a whole body: a top-level mapping, or a single (possibly typed)
/// value when the body is not `key: value` shaped.
pub(crate) fn parse_any(input: &[u8]) -> Result<Value> {
    // zeroed tail padding from the framing layer ends the text
    let end = input.iter().position(|&b| b == 0).unwrap_or(input.len());
    let text = std::str::from_utf8(&input[..end])
        .map_err(|err| WireError::Malformed(format!("body is not UTF-8: {err}")))?;

    let mut parser = Parser {
        bytes: text.as_bytes(),
        pos: 0,
    };
    parser.skip_blank();
    if parser.at_end() {
        return Ok(Value::Null);
    }
    let value = if parser.looks_like_mapping() {
        let entries = parser.parse_mapping_entries(None)?;
        Value::Mapping(entries)
    } else {
        parser.parse_value()?
    };
    parser.skip_blank();
    if !parser.at_end() {
        return Err(WireError::Malformed(format!(
            "trailing content at byte {}",
            parser.pos
        )));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t')) {
            self.pos += 1;
        }
    }

    fn skip_blank(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    // A body is mapping-shaped when a ':' appears on the first line before
    // any opening bracket or quote.
    fn looks_like_mapping(&self) -> bool {
        for &b in &self.bytes[self.pos..] {
            match b {
                b':' => return true,
                b'\n' | b'!' | b'[' | b'{' | b'"' => return false,
                _ => {}
            }
        }
        false
    }

    fn malformed(&self, what: &str) -> WireError {
        WireError::Malformed(format!("{what} at byte {}", self.pos))
    }

    fn parse_key(&mut self) -> Result<Field> {
        self.skip_blank();
        let key = if self.peek() == Some(b'"') {
            self.parse_quoted()?
        } else {
            let start = self.pos;
            while let Some(b) = self.peek() {
                if b == b':' || b == b'\n' {
                    break;
                }
                self.pos += 1;
            }
            std::str::from_utf8(&self.bytes[start..self.pos])
                .map_err(|_| self.malformed("non-UTF-8 key"))?
                .trim()
                .to_string()
        };
        self.skip_spaces();
        if self.bump() != Some(b':') {
            return Err(self.malformed("expected ':' after key"));
        }
        self.skip_spaces();
        match key.parse::<u32>() {
            Ok(ordinal) => Ok(Field::Ordinal(ordinal)),
            Err(_) => Ok(Field::Named(key)),
        }
    }

    // `terminator` is Some(b'}') inside braces, None at the top level.
    fn parse_mapping_entries(&mut self, terminator: Option<u8>) -> Result<Vec<(Field, Value)>> {
        let mut entries = Vec::new();
        loop {
            self.skip_blank();
            match (self.peek(), terminator) {
                (None, None) => break,
                (None, Some(_)) => return Err(self.malformed("unterminated mapping")),
                (Some(b), Some(t)) if b == t => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }
            let field = self.parse_key()?;
            let value = if matches!(self.peek(), Some(b'\n') | None)
                || (terminator.is_some() && matches!(self.peek(), Some(b',' | b'}')))
            {
                Value::Null
            } else {
                self.parse_value()?
            };
            entries.push((field, value));
            self.skip_spaces();
            if terminator.is_some() && self.peek() == Some(b',') {
                self.pos += 1;
            }
        }
        Ok(entries)
    }

    fn parse_value(&mut self) -> Result<Value> {
        self.skip_spaces();
        match self.peek() {
            Some(b'!') => {
                self.pos += 1;
                let start = self.pos;
                while let Some(b) = self.peek() {
                    if b.is_ascii_whitespace() {
                        break;
                    }
                    self.pos += 1;
                }
                let alias = std::str::from_utf8(&self.bytes[start..self.pos])
                    .map_err(|_| self.malformed("non-UTF-8 alias"))?
                    .to_string();
                if alias.is_empty() {
                    return Err(self.malformed("empty type alias"));
                }
                self.skip_blank();
                let value = self.parse_value()?;
                Ok(Value::typed(alias, value))
            }
            Some(b'{') => {
                self.pos += 1;
                let entries = self.parse_mapping_entries(Some(b'}'))?;
                Ok(Value::Mapping(entries))
            }
            Some(b'[') => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_blank();
                    match self.peek() {
                        Some(b']') => {
                            self.pos += 1;
                            break;
                        }
                        None => return Err(self.malformed("unterminated sequence")),
                        _ => {}
                    }
                    items.push(self.parse_value()?);
                    self.skip_blank();
                    if self.peek() == Some(b',') {
                        self.pos += 1;
                    }
                }
                Ok(Value::Sequence(items))
            }
            Some(b'"') => Ok(Value::Text(self.parse_quoted()?)),
            _ => self.parse_bare(),
        }
    }

    fn parse_quoted(&mut self) -> Result<String> {
        debug_assert_eq!(self.peek(), Some(b'"'));
        self.pos += 1;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.malformed("unterminated string")),
                Some(b'"') => return Ok(out),
                Some(b'\\') => match self.bump() {
                    Some(b'"') => out.push('"'),
                    Some(b'\\') => out.push('\\'),
                    Some(b'n') => out.push('\n'),
                    Some(b't') => out.push('\t'),
                    Some(b'r') => out.push('\r'),
                    _ => return Err(self.malformed("unknown escape")),
                },
                Some(b) if b < 0x80 => out.push(b as char),
                Some(first) => {
                    // multi-byte UTF-8: re-decode from the byte slice
                    let len = utf8_len(first);
                    let start = self.pos - 1;
                    let end = start + len;
                    let chunk = self
                        .bytes
                        .get(start..end)
                        .ok_or_else(|| self.malformed("truncated UTF-8"))?;
                    let s = std::str::from_utf8(chunk)
                        .map_err(|_| self.malformed("invalid UTF-8"))?;
                    out.push_str(s);
                    self.pos = end;
                }
            }
        }
    }

    fn parse_bare(&mut self) -> Result<Value> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if matches!(b, b'\n' | b',' | b'}' | b']') {
                break;
            }
            self.pos += 1;
        }
        let token = std::str::from_utf8(&self.bytes[start..self.pos])
            .map_err(|_| self.malformed("non-UTF-8 scalar"))?
            .trim();
        Ok(classify_bare(token))
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        0xF0..=0xF7 => 4,
        0xE0..=0xEF => 3,
        _ => 2,
    }
}

fn classify_bare(token: &str) -> Value {
    if token.is_empty() {
        return Value::Null;
    }
    match token {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(v) = token.parse::<i64>() {
        return Value::I64(v);
    }
    if let Ok(v) = token.parse::<f64>() {
        return Value::F64(v);
    }
    Value::Text(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_mapping() {
        let body = b"message: Hello World\nnumber: 1234567890\ncode: SECONDS\nprice: 10.5\n";
        let value = parse_any(body).unwrap();
        let Value::Mapping(entries) = value else {
            panic!("expected mapping")
        };
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].0, Field::named("message"));
        assert_eq!(entries[0].1, Value::Text("Hello World".into()));
        assert_eq!(entries[1].1, Value::I64(1_234_567_890));
        assert_eq!(entries[2].1, Value::Text("SECONDS".into()));
        assert_eq!(entries[3].1, Value::F64(10.5));
    }

    #[test]
    fn parses_typed_braces() {
        let body = b"!TestMarshallable {\n  name: name,\n  count: 1\n}\n";
        let value = parse_any(body).unwrap();
        assert_eq!(
            value,
            Value::typed(
                "TestMarshallable",
                Value::mapping([
                    ("name", Value::Text("name".into())),
                    ("count", Value::I64(1)),
                ])
            )
        );
    }

    #[test]
    fn parses_inline_sequences_and_quotes() {
        let body = b"items: [1, two, \"three, four\"]\nflag: true\nnothing:\n";
        let Value::Mapping(entries) = parse_any(body).unwrap() else {
            panic!("expected mapping")
        };
        assert_eq!(
            entries[0].1,
            Value::Sequence(vec![
                Value::I64(1),
                Value::Text("two".into()),
                Value::Text("three, four".into()),
            ])
        );
        assert_eq!(entries[1].1, Value::Bool(true));
        assert_eq!(entries[2].1, Value::Null);
    }

    #[test]
    fn quoted_escapes_roundtrip() {
        let original = "line\none \"two\" \\ three";
        let quoted = quote(original);
        let body = format!("key: {quoted}\n");
        let Value::Mapping(entries) = parse_any(body.as_bytes()).unwrap() else {
            panic!("expected mapping")
        };
        assert_eq!(entries[0].1, Value::Text(original.into()));
    }

    #[test]
    fn zero_padding_ends_the_document() {
        let body = b"count: 3\n\0\0\0";
        let Value::Mapping(entries) = parse_any(body).unwrap() else {
            panic!("expected mapping")
        };
        assert_eq!(entries, vec![(Field::named("count"), Value::I64(3))]);
    }

    #[test]
    fn numeric_looking_strings_need_quotes() {
        assert!(scalar_needs_quotes("10.5"));
        assert!(scalar_needs_quotes("true"));
        assert!(scalar_needs_quotes(""));
        assert!(scalar_needs_quotes("a: b"));
        assert!(!scalar_needs_quotes("Hello World"));
        assert!(!scalar_needs_quotes("SECONDS"));
    }

    #[test]
    fn non_ascii_text_parses() {
        let body = "note: héllo\n".as_bytes();
        let Value::Mapping(entries) = parse_any(body).unwrap() else {
            panic!("expected mapping")
        };
        assert_eq!(entries[0].1, Value::Text("héllo".into()));
    }
}
