use std::ops::Range;

use chunkstore_core::hash::{ParseHashError, HASH_LEN};
use thiserror::Error;
use yansi::Paint;

/// An error that happened while parsing a chunk hash given on the command
/// line
#[derive(Error, Debug)]
pub enum HashArgError {
    #[error("{0}")]
    Parse(String),
}

/// Convert a [`ParseHashError`] into a [`HashArgError`] that points at the
/// offending part of the input
pub trait IntoHashArgError {
    fn into_hash_arg_error(self, input: &str) -> HashArgError;
}

impl IntoHashArgError for ParseHashError {
    fn into_hash_arg_error(self, input: &str) -> HashArgError {
        let input = input.trim();
        if input.is_empty() {
            return HashArgError::Parse("Chunk hash must not be empty".to_string());
        }

        let expected_len = HASH_LEN * 2;
        let ParseHashError::Hex(err) = self;
        let (msg, span): (String, Range<usize>) = match err {
            hex::FromHexError::InvalidHexCharacter { c, index } => (
                format!("Invalid hex character `{c}'."),
                index..index + c.len_utf8(),
            ),
            _ if input.len() > expected_len => (
                format!("Hash is too long. Expected {expected_len} hex characters."),
                expected_len..input.len(),
            ),
            _ => (
                format!("Hash is too short. Expected {expected_len} hex characters."),
                input.len()..input.len(),
            ),
        };

        // make sure the span is on char boundaries
        let start = (0..=span.start.min(input.len()))
            .rev()
            .find(|i| input.is_char_boundary(*i))
            .unwrap_or(0);
        let end = (span.end.min(input.len())..=input.len())
            .find(|i| input.is_char_boundary(*i))
            .unwrap_or(input.len());

        // format message
        let span_len = input[start..end].chars().count();
        let prefix = input[..start].chars().count();
        let center_prefix = ((span_len + 1) / 2).saturating_sub(1);
        let center_suffix = span_len / 2;
        HashArgError::Parse(
            format!(
                "Unable to parse chunk hash\n\n{}{}{}\n{}{}{}{}\n{}{}{}",
                &input[..start],
                &input[start..end].red(),
                &input[end..],
                " ".repeat(prefix),
                "─".repeat(center_prefix).red(),
                (if end > start { "┬" } else { "│" }).red(),
                "─".repeat(center_suffix).red(),
                " ".repeat(prefix + center_prefix),
                "╰── ".red(),
                msg.red().bold()
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use assertor::{assert_that, BooleanAssertion, EqualityAssertion};
    use chunkstore_core::ChunkHash;

    use super::{HashArgError, IntoHashArgError};

    fn message(input: &str) -> String {
        yansi::disable();
        let err = input.parse::<ChunkHash>().unwrap_err();
        let HashArgError::Parse(msg) = err.into_hash_arg_error(input);
        msg
    }

    #[test]
    fn invalid_character() {
        let msg = message("00000000000000000000000000000000000000x0");
        assert_that!(msg.contains("Invalid hex character `x'")).is_true();
        // the marker sits below the offending character
        let marker_line = msg.lines().nth(3).unwrap();
        assert_that!(marker_line.find('┬')).is_equal_to(Some(38));
    }

    #[test]
    fn wrong_length() {
        assert_that!(message("abcd").contains("too short")).is_true();
        assert_that!(message(&"ab".repeat(21)).contains("too long")).is_true();
    }

    #[test]
    fn empty() {
        assert_that!(message("")).is_equal_to("Chunk hash must not be empty".to_string());
    }
}
