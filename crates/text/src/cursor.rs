//! Heuristics over a single line of source text and a cursor column.
//!
//! These fill the gap between the editor's raw (line, character) positions
//! and the compiler's symbol queries, which want the qualified name under
//! the cursor, the end column of the identifier, or the call site a
//! signature-help request refers to. Columns are UTF-16 code units on both
//! sides, per the protocol.
//!
//! Everything here is pure: no I/O, no state.

use std::sync::LazyLock;

use regex::Regex;

use crate::position::{byte_to_utf16, utf16_len, utf16_to_byte};

/// One identifier: a word-char run or a backtick-quoted name.
static IDENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+|``[^`]+``").unwrap());

/// A qualified name: identifiers joined by `.` or `?`.
static QUALIFIED: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?:\w+|``[^`]+``)(?:[.?](?:\w+|``[^`]+``))*").unwrap());

static LET_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"let[ \w]+$").unwrap());
static MEMBER_DECL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"member[ \w.]+$").unwrap());

fn strip_backticks(ident: &str) -> &str {
	ident
		.strip_prefix("``")
		.and_then(|s| s.strip_suffix("``"))
		.unwrap_or(ident)
}

/// The dotted name under the cursor, split into simple identifiers, up to
/// and including the identifier containing the cursor.
///
/// Containment is inclusive on both ends, so a cursor sitting on a `.` or
/// just past the last character still belongs to the name. When the cursor
/// touches no qualified name, or touches more than one, the answer is
/// empty.
pub fn find_names_under_cursor(line: &str, character: u32) -> Vec<String> {
	let Some(cursor) = utf16_to_byte(line, character) else {
		return Vec::new();
	};

	let mut touching = QUALIFIED
		.find_iter(line)
		.filter(|m| m.start() <= cursor && cursor <= m.end());
	let (Some(name), None) = (touching.next(), touching.next()) else {
		return Vec::new();
	};

	let mut idents = Vec::new();
	for ident in IDENT.find_iter(name.as_str()) {
		let start = name.start() + ident.start();
		let end = name.start() + ident.end();
		idents.push(strip_backticks(ident.as_str()).to_string());
		if start <= cursor && cursor <= end {
			break;
		}
	}
	idents
}

/// Exclusive end column of the single identifier the cursor lies within.
pub fn find_end_of_identifier_under_cursor(line: &str, character: u32) -> Option<u32> {
	let cursor = utf16_to_byte(line, character)?;
	let mut touching = IDENT
		.find_iter(line)
		.filter(|m| m.start() <= cursor && cursor <= m.end());
	match (touching.next(), touching.next()) {
		(Some(ident), None) => Some(byte_to_utf16(line, ident.end())),
		_ => None,
	}
}

/// Length of the trimmed text before the `(` that opens the call the cursor
/// is inside, or `None` when the cursor is not inside a call's argument
/// list.
///
/// Scans leftward from `cursor - 1`, skipping balanced `(...)` groups.
/// Prefixes that end a `let` binding or a `member` declaration are
/// declarations rather than calls and are suppressed.
pub fn find_method_call_before_cursor(line: &str, cursor: u32) -> Option<u32> {
	let len = utf16_len(line);
	if cursor == 0 || len == 0 {
		return None;
	}
	let start = utf16_to_byte(line, (cursor - 1).min(len - 1))?;

	let bytes = line.as_bytes();
	let mut depth = 0u32;
	let mut open = None;
	for i in (0..=start).rev() {
		match bytes[i] {
			b')' => depth += 1,
			b'(' if depth > 0 => depth -= 1,
			b'(' => {
				open = Some(i);
				break;
			}
			_ => {}
		}
	}

	let prefix = line[..open?].trim_end();
	if LET_DECL.is_match(prefix) || MEMBER_DECL.is_match(prefix) {
		return None;
	}
	Some(utf16_len(prefix))
}

/// Number of commas in `[end_of_name, min(cursor - 1, len))`.
///
/// Commas inside strings or nested calls are counted too; signature help
/// accepts this as a heuristic.
pub fn count_commas(line: &str, end_of_name: u32, cursor: u32) -> u32 {
	let len = utf16_len(line);
	let stop = cursor.saturating_sub(1).min(len);
	if stop <= end_of_name {
		return 0;
	}
	let (Some(start), Some(end)) = (utf16_to_byte(line, end_of_name), utf16_to_byte(line, stop))
	else {
		return 0;
	};
	line.as_bytes()[start..end].iter().filter(|&&b| b == b',').count() as u32
}

/// Ordered abbreviation match for workspace-symbol queries.
///
/// Each character of `find` must match either the very next character of
/// `candidate`, or the first character of a later uppercase-introduced
/// word (compared case-insensitively). `fb` matches `FooBar` but not
/// `Foobar`; the empty query matches everything.
pub fn matches_title_case(find: &str, candidate: &str) -> bool {
	let chars: Vec<char> = candidate.chars().collect();
	let mut i = 0usize;
	'find: for f in find.chars() {
		if i < chars.len() && chars[i] == f {
			i += 1;
			continue;
		}
		while i < chars.len() {
			let c = chars[i];
			i += 1;
			if c.is_uppercase() && c.to_lowercase().eq(f.to_lowercase()) {
				continue 'find;
			}
		}
		return false;
	}
	true
}

/// All identifier tokens in `text`, backticks stripped.
pub fn identifiers(text: &str) -> impl Iterator<Item = &str> {
	IDENT.find_iter(text).map(|m| strip_backticks(m.as_str()))
}
