//! Format-preserving writer for state files.
//!
//! State files are meant to be edited by hand, so saving never re-serializes
//! an existing file. Instead each line is scanned and only the lines that
//! carry managed data (`paths`, `[sdks]`, `[envs]`, `[tools]`) are rewritten.
//! Comments, blank lines, unknown keys and unknown sections pass through.
//! Managed tables written as root dotted keys (`sdks.go = "1.22"`) or inline
//! tables (`sdks = { go = "1.22" }`) are re-emitted as `[sdks]` sections.

use crate::error::Result;
use crate::io;
use crate::state::ActivityState;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Write `state` to its backing file, updating the existing text in place
/// or rendering a fresh file when none exists.
pub fn update_file(state: &ActivityState) -> Result<()> {
    let path = state.file();
    let rendered = match io::read_optional(path)? {
        Some(existing) => update(&existing, state),
        None => render_fresh(state),
    };
    io::atomic_write(path, rendered.as_bytes())?;
    debug!(file = %path.display(), "wrote state");
    Ok(())
}

/// Render a complete state file.
pub fn render_fresh(state: &ActivityState) -> String {
    let mut out = vec!["paths = [".to_string()];
    for p in state.paths() {
        out.push(path_item(p));
    }
    out.push("]".to_string());
    for section in Section::MANAGED {
        out.push(String::new());
        out.push(format!("[{}]", section.name()));
        if let Some(entries) = section.entries(state) {
            for (k, v) in entries {
                out.push(key_line(k, v));
            }
        }
    }
    join_lines(out)
}

/// Rewrite `existing` so its managed data matches `state`.
pub fn update(existing: &str, state: &ActivityState) -> String {
    let mut updater = Updater::new(state);
    for line in existing.lines() {
        updater.line(line);
    }
    updater.finish()
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Section {
    Root,
    Sdks,
    Envs,
    Tools,
    Other,
}

impl Section {
    const MANAGED: [Section; 3] = [Section::Sdks, Section::Envs, Section::Tools];

    fn from_header(name: &str) -> Self {
        match name {
            "sdks" => Section::Sdks,
            "envs" => Section::Envs,
            "tools" => Section::Tools,
            _ => Section::Other,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Section::Sdks => "sdks",
            Section::Envs => "envs",
            Section::Tools => "tools",
            Section::Root | Section::Other => "",
        }
    }

    fn entries(self, state: &ActivityState) -> Option<&BTreeMap<String, String>> {
        match self {
            Section::Sdks => Some(state.sdks()),
            Section::Envs => Some(state.envs()),
            Section::Tools => Some(state.tools()),
            Section::Root | Section::Other => None,
        }
    }
}

enum PathsProgress {
    NotSeen,
    Open(HashSet<String>),
    Done,
}

// ---------------------------------------------------------------------------
// Updater
// ---------------------------------------------------------------------------

struct Updater<'a> {
    state: &'a ActivityState,
    out: Vec<String>,
    section: Section,
    /// Index of the first line after the current section header.
    section_start: usize,
    processed: HashSet<(Section, String)>,
    seen_sections: HashSet<Section>,
    paths: PathsProgress,
}

impl<'a> Updater<'a> {
    fn new(state: &'a ActivityState) -> Self {
        Updater {
            state,
            out: Vec::new(),
            section: Section::Root,
            section_start: 0,
            processed: HashSet::new(),
            seen_sections: HashSet::new(),
            paths: PathsProgress::NotSeen,
        }
    }

    fn line(&mut self, line: &str) {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            self.out.push(line.to_string());
            return;
        }
        let (code, comment) = split_comment(line);

        if matches!(self.paths, PathsProgress::Open(_)) {
            self.path_items(code, comment);
            return;
        }

        let code_trimmed = code.trim();
        if code_trimmed.starts_with('[') && code_trimmed.ends_with(']') {
            self.header(line, code_trimmed);
            return;
        }

        let Some((raw_key, raw_value)) = split_key_value(code) else {
            self.out.push(line.to_string());
            return;
        };
        let key = decode_key(raw_key.trim());

        match self.section {
            Section::Root if key == "paths" => self.paths_header(raw_value, comment),
            Section::Root if managed_root_key(raw_key).is_some() => {
                // The table is rendered at the end with every entry.
                if let Some(c) = comment {
                    self.out.push(c.to_string());
                }
            }
            Section::Sdks | Section::Envs | Section::Tools => {
                self.managed_key(line, raw_key, &key, raw_value, comment)
            }
            Section::Root | Section::Other => self.out.push(line.to_string()),
        }
    }

    fn header(&mut self, line: &str, code: &str) {
        if matches!(self.paths, PathsProgress::NotSeen) && !self.state.paths().is_empty() {
            self.insert_paths_block(true);
        }
        self.flush_section();

        let inner = code.trim_start_matches('[').trim_end_matches(']').trim();
        self.section = if code.starts_with("[[") {
            Section::Other
        } else {
            Section::from_header(&decode_key(inner))
        };
        self.seen_sections.insert(self.section);
        self.out.push(line.to_string());
        self.section_start = self.out.len();
    }

    fn managed_key(
        &mut self,
        line: &str,
        raw_key: &str,
        key: &str,
        raw_value: &str,
        comment: Option<&str>,
    ) {
        if !self.processed.insert((self.section, key.to_string())) {
            return;
        }
        let Some(wanted) = self.section.entries(self.state).and_then(|m| m.get(key)) else {
            return;
        };
        if decode_value(raw_value.trim()) == *wanted {
            self.out.push(line.to_string());
            return;
        }
        let indent = &line[..line.len() - line.trim_start().len()];
        let rewritten = format!("{indent}{} = {}", raw_key.trim(), quote(wanted));
        self.out.push(attach(rewritten, comment));
    }

    // -- paths array ---------------------------------------------------------

    fn paths_header(&mut self, raw_value: &str, comment: Option<&str>) {
        let rest = raw_value.trim_start();
        let rest = rest.strip_prefix('[').unwrap_or(rest);
        // A one-line array keeps its comment on the closing bracket.
        let (header_comment, rest_comment) = match find_unquoted(rest, ']') {
            Some(_) => (None, comment),
            None => (comment, None),
        };
        self.out.push(attach("paths = [".to_string(), header_comment));
        self.paths = PathsProgress::Open(HashSet::new());
        self.path_items(rest, rest_comment);
    }

    fn path_items(&mut self, code: &str, comment: Option<&str>) {
        let (items, closes) = match find_unquoted(code, ']') {
            Some(idx) => (&code[..idx], true),
            None => (code, false),
        };
        let mut emitted_any = false;
        for item in split_unquoted(items, ',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let value = decode_value(item);
            let keep = self.state.exists_path(&value);
            if let PathsProgress::Open(emitted) = &mut self.paths {
                if keep && emitted.insert(value.clone()) {
                    self.out.push(path_item(&value));
                    emitted_any = true;
                }
            }
        }
        if closes {
            self.close_paths(comment);
            return;
        }
        if let (true, Some(c)) = (emitted_any, comment) {
            if let Some(last) = self.out.pop() {
                self.out.push(attach(last, Some(c)));
            }
        }
    }

    fn close_paths(&mut self, comment: Option<&str>) {
        if let PathsProgress::Open(emitted) = &self.paths {
            for p in self.state.paths() {
                if !emitted.contains(p) {
                    self.out.push(path_item(p));
                }
            }
        }
        self.out.push(attach("]".to_string(), comment));
        self.paths = PathsProgress::Done;
    }

    /// Insert the whole array at the end of the root table. `before_table`
    /// keeps a blank line between the array and the header that follows.
    fn insert_paths_block(&mut self, before_table: bool) {
        let pos = self.insertion_point();
        let mut block = vec!["paths = [".to_string()];
        block.extend(self.state.paths().iter().map(|p| path_item(p)));
        block.push("]".to_string());
        if before_table && self.out.get(pos).map_or(true, |l| !l.trim().is_empty()) {
            block.push(String::new());
        }
        self.insert_at(pos, block);
        self.paths = PathsProgress::Done;
    }

    fn insert_at(&mut self, pos: usize, lines: Vec<String>) {
        let tail = self.out.split_off(pos);
        self.out.extend(lines);
        self.out.extend(tail);
    }

    // -- sections ------------------------------------------------------------

    /// Append state entries the current section never mentioned, right after
    /// its last non-blank line.
    fn flush_section(&mut self) {
        let Some(entries) = self.section.entries(self.state) else {
            return;
        };
        let missing: Vec<String> = entries
            .iter()
            .filter(|(k, _)| !self.processed.contains(&(self.section, (*k).clone())))
            .map(|(k, v)| key_line(k, v))
            .collect();
        if missing.is_empty() {
            return;
        }
        let pos = self.insertion_point();
        self.insert_at(pos, missing);
    }

    fn insertion_point(&self) -> usize {
        let mut pos = self.out.len();
        while pos > self.section_start && self.out[pos - 1].trim().is_empty() {
            pos -= 1;
        }
        pos
    }

    fn finish(mut self) -> String {
        if matches!(self.paths, PathsProgress::Open(_)) {
            self.close_paths(None);
        }
        self.flush_section();
        if matches!(self.paths, PathsProgress::NotSeen) && !self.state.paths().is_empty() {
            // No table header was ever seen, so the end of file is still root.
            self.insert_paths_block(false);
        }
        for section in Section::MANAGED {
            if self.seen_sections.contains(&section) {
                continue;
            }
            let Some(entries) = section.entries(self.state).filter(|m| !m.is_empty()) else {
                continue;
            };
            if self.out.last().is_some_and(|l| !l.trim().is_empty()) {
                self.out.push(String::new());
            }
            self.out.push(format!("[{}]", section.name()));
            self.out.extend(entries.iter().map(|(k, v)| key_line(k, v)));
        }
        join_lines(self.out)
    }
}

fn join_lines(lines: Vec<String>) -> String {
    if lines.is_empty() {
        return String::new();
    }
    let mut s = lines.join("\n");
    s.push('\n');
    s
}

// ---------------------------------------------------------------------------
// Lexical helpers
// ---------------------------------------------------------------------------

fn path_item(path: &str) -> String {
    format!("  {},", quote(path))
}

fn key_line(key: &str, value: &str) -> String {
    format!("{} = {}", encode_key(key), quote(value))
}

fn attach(line: String, comment: Option<&str>) -> String {
    match comment {
        Some(c) => format!("{line} {c}"),
        None => line,
    }
}

/// TOML basic string.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn encode_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if bare {
        key.to_string()
    } else {
        quote(key)
    }
}

/// Decode a TOML string value, falling back to trimming quotes when the
/// text is not a valid TOML string.
fn decode_value(raw: &str) -> String {
    let doc = format!("v = {raw}");
    if let Ok(table) = doc.parse::<toml::Table>() {
        if let Some(s) = table.get("v").and_then(|v| v.as_str()) {
            return s.to_string();
        }
    }
    raw.trim_matches(|c| c == '"' || c == '\'').to_string()
}

fn decode_key(raw: &str) -> String {
    if raw.starts_with('"') || raw.starts_with('\'') {
        decode_value(raw)
    } else {
        raw.to_string()
    }
}

/// Managed section addressed by a root-level key, either dotted
/// (`sdks.go`) or bare with an inline table value (`sdks`).
fn managed_root_key(raw_key: &str) -> Option<Section> {
    let first = split_unquoted(raw_key.trim(), '.').into_iter().next()?;
    match Section::from_header(&decode_key(first.trim())) {
        Section::Other => None,
        section => Some(section),
    }
}

/// Split off a trailing `# comment`, ignoring `#` inside strings.
fn split_comment(line: &str) -> (&str, Option<&str>) {
    match find_unquoted(line, '#') {
        Some(idx) => (line[..idx].trim_end(), Some(&line[idx..])),
        None => (line, None),
    }
}

fn split_key_value(code: &str) -> Option<(&str, &str)> {
    let idx = find_unquoted(code, '=')?;
    Some((&code[..idx], &code[idx + 1..]))
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_basic = false;
    let mut in_literal = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_basic {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_basic = false,
                _ => {}
            }
            continue;
        }
        if in_literal {
            if c == '\'' {
                in_literal = false;
            }
            continue;
        }
        match c {
            '"' => in_basic = true,
            '\'' => in_literal = true,
            c if c == needle => return Some(i),
            _ => {}
        }
    }
    None
}

fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while let Some(idx) = find_unquoted(rest, sep) {
        parts.push(&rest[..idx]);
        rest = &rest[idx + sep.len_utf8()..];
    }
    parts.push(rest);
    parts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
