use crate::grammar::TokenType;
use compact_str::CompactString;
use std::fmt;

/// Token type of no token.
pub const INVALID_TOKEN_TYPE: TokenType = 0;

/// A token produced by the reference lexer. `start..stop` are character
/// offsets into the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub token_type: TokenType,
    pub text: CompactString,
    pub start: usize,
    pub stop: usize,
}

impl Token {
    pub fn new(
        token_type: TokenType,
        text: impl Into<CompactString>,
        start: usize,
        stop: usize,
    ) -> Self {
        Self {
            token_type,
            text: text.into(),
            start,
            stop,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[@{}..{}='{}',<{}>]",
            self.start,
            self.stop,
            self.text.escape_debug(),
            self.token_type
        )
    }
}
