use super::token::Token;

/// Input the decision procedure reads with arbitrary lookahead.
pub trait SymbolStream {
    /// Symbol `i` positions ahead; `la(1)` is the next symbol. `None` past
    /// the end of input.
    fn la(&self, i: usize) -> Option<u32>;

    /// Position of the next symbol.
    fn index(&self) -> usize;

    /// Moves past the next symbol. No-op at end of input.
    fn consume(&mut self);
}

/// Characters of a string, as Unicode scalar values.
#[derive(Debug, Clone)]
pub struct CharStream {
    chars: Vec<char>,
    position: usize,
}

impl CharStream {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            position: 0,
        }
    }

    /// Text of the characters in `start..stop`, clamped to the input.
    #[must_use]
    pub fn text(&self, start: usize, stop: usize) -> String {
        let stop = stop.min(self.chars.len());
        let start = start.min(stop);
        self.chars[start..stop].iter().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl SymbolStream for CharStream {
    fn la(&self, i: usize) -> Option<u32> {
        self.chars
            .get(self.position + i.checked_sub(1)?)
            .map(|&c| u32::from(c))
    }

    fn index(&self) -> usize {
        self.position
    }

    fn consume(&mut self) {
        if self.position < self.chars.len() {
            self.position += 1;
        }
    }
}

/// Tokens produced by a lexer, read by token type.
#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    pub fn new(tokens: impl IntoIterator<Item = Token>) -> Self {
        Self {
            tokens: tokens.into_iter().collect(),
            position: 0,
        }
    }

    /// Token `i` positions ahead, like [`SymbolStream::la`].
    #[must_use]
    pub fn lt(&self, i: usize) -> Option<&Token> {
        self.tokens.get(self.position + i.checked_sub(1)?)
    }

    #[must_use]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

impl SymbolStream for TokenStream {
    fn la(&self, i: usize) -> Option<u32> {
        self.lt(i).map(|t| t.token_type)
    }

    fn index(&self) -> usize {
        self.position
    }

    fn consume(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }
}
