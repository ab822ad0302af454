//! Reader and writer for ISO-8859-1 Java `.properties` files.
//!
//! Tracking files in a local repository use this format. Input bytes are decoded as Latin-1
//! (every byte is one `char`), `\uXXXX` escapes are honoured on read, and characters outside
//! Latin-1 are written back as `\uXXXX` so the output stays single-byte.

use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyEntry {
    pub key: String,
    pub value: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertiesFile {
    pub entries: Vec<PropertyEntry>,
}

impl PropertiesFile {
    #[must_use]
    pub fn by_key(&self, key: &str) -> impl Iterator<Item = &PropertyEntry> {
        let key = key.to_string();
        self.entries.iter().filter(move |e| e.key == key)
    }

    /// Collapse into a map; later duplicates win, as with `java.util.Properties#load`.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.entries
            .into_iter()
            .map(|entry| (entry.key, entry.value))
            .collect()
    }
}

/// Decode raw file bytes as ISO-8859-1 and parse them.
#[must_use]
pub fn parse_latin1(bytes: &[u8]) -> PropertiesFile {
    let text: String = bytes.iter().map(|&b| char::from(b)).collect();
    parse(&text)
}

/// Parse a `.properties` document into key/value entries.
#[must_use]
pub fn parse(text: &str) -> PropertiesFile {
    let chars: Vec<char> = text.chars().collect();
    let mut offset = 0usize;
    let mut entries = Vec::new();

    while offset < chars.len() {
        let line_start = offset;
        let logical = read_logical_line(&chars, &mut offset);
        if let Some((key, value)) = parse_logical_line(&logical) {
            entries.push(PropertyEntry { key, value });
        }

        // Ensure we always make progress even on pathological inputs.
        if offset == line_start {
            offset += 1;
        }
    }

    PropertiesFile { entries }
}

fn read_logical_line(chars: &[char], offset: &mut usize) -> Vec<char> {
    let mut out = Vec::new();

    loop {
        let segment_start = *offset;
        let mut line_end = segment_start;
        while line_end < chars.len() && chars[line_end] != '\n' && chars[line_end] != '\r' {
            line_end += 1;
        }

        let segment = &chars[segment_start..line_end];
        // Comment lines never continue, even when they end with a backslash.
        let is_comment = segment
            .iter()
            .find(|c| !is_whitespace(**c))
            .is_some_and(|c| *c == '#' || *c == '!');
        let continues = !is_comment && ends_with_unescaped_backslash(segment);
        let copy_end = if continues {
            line_end.saturating_sub(1)
        } else {
            line_end
        };
        out.extend_from_slice(&chars[segment_start..copy_end]);

        // Consume `\n`, `\r` or `\r\n`.
        *offset = line_end;
        if *offset < chars.len() && chars[*offset] == '\r' {
            *offset += 1;
        }
        if *offset < chars.len() && chars[*offset] == '\n' {
            *offset += 1;
        }

        if !continues || *offset >= chars.len() {
            break;
        }

        // Continuation: skip leading whitespace on the next physical line.
        while *offset < chars.len() && is_whitespace(chars[*offset]) {
            *offset += 1;
        }
    }

    out
}

fn ends_with_unescaped_backslash(line: &[char]) -> bool {
    let backslashes = line.iter().rev().take_while(|c| **c == '\\').count();
    backslashes % 2 == 1
}

fn parse_logical_line(line: &[char]) -> Option<(String, String)> {
    let mut i = 0usize;
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    if i >= line.len() || line[i] == '#' || line[i] == '!' {
        return None;
    }

    let key_start = i;
    while i < line.len() {
        match line[i] {
            '\\' => i += 2,
            '=' | ':' => break,
            c if is_whitespace(c) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(line.len());

    // Skip whitespace between key and separator.
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    // Optional `:` / `=`.
    if i < line.len() && (line[i] == '=' || line[i] == ':') {
        i += 1;
    }

    // Skip whitespace after separator.
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    let key = unescape(&line[key_start..key_end]);
    let value = unescape(&line[i.min(line.len())..]);
    Some((key, value))
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0C')
}

fn unescape(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }

        i += 1;
        if i >= chars.len() {
            break;
        }

        match chars[i] {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\x0C'),
            'u' => {
                let hex: String = chars[i + 1..chars.len().min(i + 5)].iter().collect();
                match (hex.len() == 4)
                    .then(|| u32::from_str_radix(&hex, 16).ok())
                    .flatten()
                    .and_then(char::from_u32)
                {
                    Some(ch) => {
                        out.push(ch);
                        i += 4;
                    }
                    None => out.push('u'),
                }
            }
            other => out.push(other),
        }
        i += 1;
    }

    out
}

/// Serialize `entries` as ISO-8859-1 bytes, preceded by `#`-prefixed comment lines.
///
/// Entries are written in map order, so output is deterministic.
#[must_use]
pub fn store_latin1(entries: &BTreeMap<String, String>, comments: &[&str]) -> Vec<u8> {
    let mut text = String::new();
    for comment in comments {
        for line in comment.lines() {
            text.push('#');
            escape_into(&mut text, line, EscapeMode::Comment);
            text.push('\n');
        }
    }
    for (key, value) in entries {
        escape_into(&mut text, key, EscapeMode::Key);
        text.push('=');
        escape_into(&mut text, value, EscapeMode::Value);
        text.push('\n');
    }

    // Every char is <= U+00FF after escaping.
    text.chars().map(|c| c as u32 as u8).collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EscapeMode {
    Key,
    Value,
    Comment,
}

fn escape_into(out: &mut String, text: &str, mode: EscapeMode) {
    for (idx, c) in text.chars().enumerate() {
        if mode == EscapeMode::Comment {
            if (c as u32) > 0xFF {
                push_unicode_escape(out, c);
            } else {
                out.push(c);
            }
            continue;
        }
        match c {
            ' ' if idx == 0 || mode == EscapeMode::Key => out.push_str("\\ "),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0C' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || (c as u32) > 0xFF => push_unicode_escape(out, c),
            c => out.push(c),
        }
    }
}

fn push_unicode_escape(out: &mut String, c: char) {
    let mut units = [0u16; 2];
    for unit in c.encode_utf16(&mut units) {
        out.push_str(&format!("\\u{:04X}", unit));
    }
}
