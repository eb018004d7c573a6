//! Conversion between LSP positions (UTF-16 code units) and byte/char
//! offsets. All document addressing on the wire is UTF-16 per the protocol;
//! everything internal is byte offsets into `&str` or char offsets into a
//! [`Rope`].

use lsp_types::Position;
use ropey::Rope;

/// Number of UTF-16 code units in `s`.
pub fn utf16_len(s: &str) -> u32 {
	s.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Byte offset of the UTF-16 column `col` in `line`.
///
/// A column that lands inside a surrogate pair is floored to the start of
/// the containing char. Returns `None` when `col` is past the end of the
/// line (`col == utf16_len(line)` is the end and is valid).
pub fn utf16_to_byte(line: &str, col: u32) -> Option<usize> {
	let mut units = 0u32;
	for (byte, c) in line.char_indices() {
		if units >= col {
			return Some(byte);
		}
		units += c.len_utf16() as u32;
		if units > col {
			return Some(byte);
		}
	}
	if units >= col { Some(line.len()) } else { None }
}

/// UTF-16 column of the byte offset `byte` in `line`.
pub fn byte_to_utf16(line: &str, byte: usize) -> u32 {
	utf16_len(&line[..byte.min(line.len())])
}

/// Char offset in `rope` of an LSP position.
///
/// The character is clamped to the end of its line; a line past the end of
/// the document returns `None`.
pub fn lsp_position_to_char(rope: &Rope, position: Position) -> Option<usize> {
	let line_idx = position.line as usize;
	if line_idx >= rope.len_lines() {
		return None;
	}
	let line_start = rope.line_to_char(line_idx);
	let line = rope.line(line_idx);
	let mut units = 0u32;
	for (offset, c) in line.chars().enumerate() {
		if units >= position.character {
			return Some(line_start + offset);
		}
		units += c.len_utf16() as u32;
	}
	// Past-the-end characters clamp to just before the line break.
	let mut end = line.len_chars();
	if end > 0 && line.char(end - 1) == '\n' {
		end -= 1;
		if end > 0 && line.char(end - 1) == '\r' {
			end -= 1;
		}
	}
	Some(line_start + end)
}

/// LSP position of the char offset `char_idx` in `rope`.
pub fn char_to_lsp_position(rope: &Rope, char_idx: usize) -> Option<Position> {
	if char_idx > rope.len_chars() {
		return None;
	}
	let line_idx = rope.char_to_line(char_idx);
	let line_start = rope.line_to_char(line_idx);
	let character = rope
		.slice(line_start..char_idx)
		.chars()
		.map(|c| c.len_utf16() as u32)
		.sum();
	Some(Position {
		line: line_idx as u32,
		character,
	})
}

/// Content of line `line` with the trailing newline stripped, or the empty
/// string past the end of the document.
pub fn line_of(rope: &Rope, line: u32) -> String {
	let line_idx = line as usize;
	if line_idx >= rope.len_lines() {
		return String::new();
	}
	let text: String = rope.line(line_idx).chars().collect();
	text.trim_end_matches(['\n', '\r']).to_string()
}
