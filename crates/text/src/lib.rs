//! Pure text utilities for the language server: cursor heuristics over a
//! single line, and position conversion between LSP UTF-16 coordinates and
//! rope/byte offsets.

pub mod cursor;
pub mod position;

pub use cursor::{
	count_commas, find_end_of_identifier_under_cursor, find_method_call_before_cursor,
	find_names_under_cursor, identifiers, matches_title_case,
};
pub use position::{
	byte_to_utf16, char_to_lsp_position, line_of, lsp_position_to_char, utf16_len, utf16_to_byte,
};
