use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Keyword {
    Def,
    Extern,
}

/// One classified lexeme. Punctuation and operator characters are not
/// classified here: anything outside an identifier or number lexeme comes
/// out as `Unknown`, and the parser decides what the character means.
#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Keyword(Keyword),
    Ident(String),
    Number(f64),
    Unknown(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "<eof>"),
            Token::Keyword(Keyword::Def) => write!(f, "def"),
            Token::Keyword(Keyword::Extern) => write!(f, "extern"),
            Token::Ident(name) => write!(f, "{}", name),
            Token::Number(value) => write!(f, "{}", value),
            Token::Unknown(c) => write!(f, "{}", c),
        }
    }
}

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum LexError {
    #[error("malformed number literal {0:?}")]
    MalformedNumber(String),
}

lazy_static! {
    static ref SKIP_RE: Regex = Regex::new(r"^(?:\s+|#.*)+").unwrap();
    static ref IDENT_RE: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*").unwrap();
    static ref NUMBER_RE: Regex = Regex::new(r"^(?:[0-9]+\.?[0-9]*|\.[0-9]+)").unwrap();
}

/// On-demand tokenizer over a source buffer, consumed left to right.
pub struct Tokenizer<'src> {
    source: &'src str,
    pos: usize,
}

impl<'src> Tokenizer<'src> {
    pub fn new(source: &'src str) -> Self {
        Tokenizer { source, pos: 0 }
    }

    fn rest(&self) -> &'src str {
        &self.source[self.pos..]
    }

    /// Produce the next token, consuming its lexeme. Once the source is
    /// exhausted this keeps returning `Token::Eof`.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(skip) = SKIP_RE.find(self.rest()) {
            self.pos += skip.end();
        }

        let rest = self.rest();

        if let Some(m) = IDENT_RE.find(rest) {
            self.pos += m.end();
            return Ok(match m.as_str() {
                "def" => Token::Keyword(Keyword::Def),
                "extern" => Token::Keyword(Keyword::Extern),
                name => Token::Ident(name.to_string()),
            });
        }

        if let Some(m) = NUMBER_RE.find(rest) {
            // The lexeme is consumed whether or not it parses, so a bad
            // number costs one token, not the whole session.
            self.pos += m.end();
            let value = m
                .as_str()
                .parse()
                .map_err(|_| LexError::MalformedNumber(m.as_str().to_string()))?;
            return Ok(Token::Number(value));
        }

        match rest.chars().next() {
            Some(c) => {
                self.pos += c.len_utf8();
                Ok(Token::Unknown(c))
            }
            None => Ok(Token::Eof),
        }
    }
}

/// Lex the entire input eagerly. The parser pulls tokens on demand; this is
/// for tests and the token dump mode of the driver.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut tokenizer = Tokenizer::new(source);
    let mut tokens = Vec::new();
    loop {
        match tokenizer.next_token()? {
            Token::Eof => return Ok(tokens),
            token => tokens.push(token),
        }
    }
}
