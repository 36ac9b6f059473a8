//! The tokenizer. Whitespace separates tokens and is otherwise insignificant;
//! multi-byte symbols are attempted before their single-byte prefixes.

use crate::ParseError;
use crate::token::{Keyword, Symbol, Token};

/// Tokenize `input`, returning each token with its starting byte offset.
/// The final element is always [`Token::Eof`].
pub fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let mut lexer = Lexer {
        input: input.as_bytes(),
        pos: 0,
    };
    let mut tokens = Vec::new();
    loop {
        let (token, pos) = lexer.next_token()?;
        let done = token == Token::Eof;
        tokens.push((token, pos));
        if done {
            return Ok(tokens);
        }
    }
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

impl Lexer<'_> {
    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn next_token(&mut self) -> Result<(Token, usize), ParseError> {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
        let start = self.pos;
        let Some(byte) = self.peek() else {
            return Ok((Token::Eof, start));
        };

        if let Some(symbol) = self.take_symbol() {
            return Ok((Token::Symbol(symbol), start));
        }
        if byte == b'\'' {
            return Ok((self.take_string()?, start));
        }
        if byte.is_ascii_digit() {
            return Ok((self.take_number(), start));
        }
        if byte.is_ascii_alphabetic() || byte == b'_' {
            return Ok((self.take_word(), start));
        }

        Err(ParseError::SyntaxError {
            message: format!("unexpected character `{}`", byte as char),
            position: start,
        })
    }

    fn take_symbol(&mut self) -> Option<Symbol> {
        // Two-byte symbols first.
        let two = match (self.peek(), self.peek_at(1)) {
            (Some(b'>'), Some(b'=')) => Some(Symbol::GtEq),
            (Some(b'<'), Some(b'=')) => Some(Symbol::LtEq),
            (Some(b'<'), Some(b'>')) | (Some(b'!'), Some(b'=')) => Some(Symbol::NotEq),
            _ => None,
        };
        if let Some(symbol) = two {
            self.pos += 2;
            return Some(symbol);
        }
        let one = match self.peek()? {
            b'*' => Symbol::Star,
            b',' => Symbol::Comma,
            b'(' => Symbol::LParen,
            b')' => Symbol::RParen,
            b'=' => Symbol::Eq,
            b'>' => Symbol::Gt,
            b'<' => Symbol::Lt,
            b'+' => Symbol::Plus,
            b'-' => Symbol::Minus,
            b'/' => Symbol::Slash,
            b';' => Symbol::Semicolon,
            b'.' => Symbol::Dot,
            _ => return None,
        };
        self.pos += 1;
        Some(one)
    }

    fn take_string(&mut self) -> Result<Token, ParseError> {
        let start = self.pos;
        self.pos += 1; // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(ParseError::SyntaxError {
                        message: "unterminated string literal".into(),
                        position: start,
                    });
                }
                Some(b'\'') => {
                    self.pos += 1;
                    return Ok(Token::Str(text));
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let Some(escaped) = self.peek() else {
                        return Err(ParseError::SyntaxError {
                            message: "unterminated string literal".into(),
                            position: start,
                        });
                    };
                    text.push(match escaped {
                        b'n' => '\n',
                        b't' => '\t',
                        b'r' => '\r',
                        b'0' => '\0',
                        other => other as char,
                    });
                    self.pos += 1;
                }
                Some(_) => {
                    // Consume one whole UTF-8 character.
                    let rest = &self.input[self.pos..];
                    let ch_len = utf8_len(rest[0]);
                    let chunk = std::str::from_utf8(&rest[..ch_len.min(rest.len())])
                        .map_err(|_| ParseError::SyntaxError {
                            message: "invalid utf-8 in string literal".into(),
                            position: self.pos,
                        })?;
                    text.push_str(chunk);
                    self.pos += chunk.len();
                }
            }
        }
    }

    fn take_number(&mut self) -> Token {
        let start = self.pos;
        let mut seen_dot = false;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_digit() {
                self.pos += 1;
            } else if byte == b'.' && !seen_dot && matches!(self.peek_at(1), Some(b) if b.is_ascii_digit()) {
                seen_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = std::str::from_utf8(&self.input[start..self.pos]).expect("ascii digits");
        Token::Number(text.to_owned())
    }

    fn take_word(&mut self) -> Token {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_') {
            self.pos += 1;
        }
        let word = std::str::from_utf8(&self.input[start..self.pos]).expect("ascii word");
        match Keyword::lookup(word) {
            Some(keyword) => Token::Keyword(keyword),
            None => Token::Ident(word.to_owned()),
        }
    }
}

fn utf8_len(first: u8) -> usize {
    match first {
        b if b < 0x80 => 1,
        b if b >> 5 == 0b110 => 2,
        b if b >> 4 == 0b1110 => 3,
        _ => 4,
    }
}
