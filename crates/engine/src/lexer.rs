//! Tokenizer for the command-function dialect.
//!
//! The lexer understands the small slice of JavaScript that Smithery command
//! functions are written in: identifiers, quoted strings with backslash escapes,
//! backtick templates, and the punctuation `{ } [ ] ( ) , : . + ; =>`. Anything
//! else becomes a [`TokenKind::Error`] token so the parser can report it with a
//! position instead of guessing.

use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

/// Position of a token in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// Piece of a backtick template literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateChunk {
    Text(String),
    /// Raw source between `${` and `}`, with the span of that source.
    Interpolation { source: String, span: Span },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Identifier(String),
    Str(String),
    Template(Vec<TemplateChunk>),
    /// Numeric literal. Only lexed so the parser can reject it by name.
    Number(String),
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Colon,
    Dot,
    Plus,
    Semicolon,
    Arrow,
    Error(String),
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Identifier(name) => write!(f, "identifier '{name}'"),
            TokenKind::Str(text) => write!(f, "string '{text}'"),
            TokenKind::Template(_) => write!(f, "template literal"),
            TokenKind::Number(digits) => write!(f, "number {digits}"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::LBracket => write!(f, "'['"),
            TokenKind::RBracket => write!(f, "']'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Colon => write!(f, "':'"),
            TokenKind::Dot => write!(f, "'.'"),
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Arrow => write!(f, "'=>'"),
            TokenKind::Error(message) => write!(f, "{message}"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
    /// Offset added to every span, so nested lexers report positions in the outer source.
    base: Span,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_origin(source, Span::default())
    }

    /// Creates a lexer whose spans are relative to `origin` (used for template interpolations).
    pub(crate) fn with_origin(source: &'a str, origin: Span) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: origin.line,
            column: origin.column,
            pos: 0,
            base: origin,
        }
    }

    /// Tokenize the entire source. The last token is always [`TokenKind::Eof`].
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn next_token(&mut self) -> Token {
        if let Some(message) = self.skip_whitespace_and_comments() {
            return self.token_from(self.pos, self.line, self.column, TokenKind::Error(message));
        }

        let start_pos = self.pos;
        let start_line = self.line;
        let start_column = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '.' => self.single(TokenKind::Dot),
                '+' => self.single(TokenKind::Plus),
                ';' => self.single(TokenKind::Semicolon),
                '=' => {
                    self.advance();
                    if self.peek_char() == Some('>') {
                        self.advance();
                        TokenKind::Arrow
                    } else {
                        TokenKind::Error("assignment and comparison operators are not supported".to_string())
                    }
                }
                '\'' | '"' => self.scan_string(c),
                '`' => self.scan_template(),
                '?' => {
                    self.advance();
                    TokenKind::Error("conditional and optional-chaining operators ('?') are not supported".to_string())
                }
                c if c.is_ascii_digit() => self.scan_number(),
                c if is_identifier_start(c) => self.scan_identifier(),
                c => {
                    self.advance();
                    TokenKind::Error(format!("unexpected character '{c}'"))
                }
            },
        };

        self.token_from(start_pos, start_line, start_column, kind)
    }

    fn token_from(&self, start: usize, line: usize, column: usize, kind: TokenKind) -> Token {
        Token {
            kind,
            span: Span {
                start: self.base.start + start,
                end: self.base.start + self.pos,
                line,
                column,
            },
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Skips whitespace, `//` and `/* */` comments. Returns an error message for an unterminated block comment.
    fn skip_whitespace_and_comments(&mut self) -> Option<String> {
        loop {
            match self.peek_char() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') => match self.peek_second() {
                    Some('/') => {
                        while let Some(c) = self.peek_char() {
                            if c == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    }
                    Some('*') => {
                        self.advance();
                        self.advance();
                        let mut closed = false;
                        while let Some(c) = self.advance() {
                            if c == '*' && self.peek_char() == Some('/') {
                                self.advance();
                                closed = true;
                                break;
                            }
                        }
                        if !closed {
                            return Some("unterminated block comment".to_string());
                        }
                    }
                    _ => return None,
                },
                _ => return None,
            }
        }
    }

    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_identifier_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Identifier(self.source[start..self.pos].to_string())
    }

    fn scan_number(&mut self) -> TokenKind {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        TokenKind::Number(self.source[start..self.pos].to_string())
    }

    fn scan_string(&mut self, quote: char) -> TokenKind {
        self.advance();
        let mut value = String::new();
        loop {
            match self.advance() {
                None | Some('\n') => return TokenKind::Error("unterminated string literal".to_string()),
                Some(c) if c == quote => return TokenKind::Str(value),
                Some('\\') => match self.scan_escape() {
                    Ok(Some(c)) => value.push(c),
                    Ok(None) => {}
                    Err(message) => return TokenKind::Error(message),
                },
                Some(c) => value.push(c),
            }
        }
    }

    fn scan_template(&mut self) -> TokenKind {
        self.advance();
        let mut chunks = Vec::new();
        let mut text = String::new();
        loop {
            match self.peek_char() {
                None => return TokenKind::Error("unterminated template literal".to_string()),
                Some('`') => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.scan_escape() {
                        Ok(Some(c)) => text.push(c),
                        Ok(None) => {}
                        Err(message) => return TokenKind::Error(message),
                    }
                }
                Some('$') if self.peek_second() == Some('{') => {
                    self.advance();
                    self.advance();
                    if !text.is_empty() {
                        chunks.push(TemplateChunk::Text(std::mem::take(&mut text)));
                    }
                    let span = Span {
                        start: self.base.start + self.pos,
                        end: self.base.start + self.pos,
                        line: self.line,
                        column: self.column,
                    };
                    let inner_start = self.pos;
                    loop {
                        match self.peek_char() {
                            None => return TokenKind::Error("unterminated template interpolation".to_string()),
                            Some('}') => break,
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                    let source = self.source[inner_start..self.pos].to_string();
                    self.advance();
                    chunks.push(TemplateChunk::Interpolation {
                        span: Span {
                            end: self.base.start + inner_start + source.len(),
                            ..span
                        },
                        source,
                    });
                }
                Some(c) => {
                    self.advance();
                    text.push(c);
                }
            }
        }
        if !text.is_empty() {
            chunks.push(TemplateChunk::Text(text));
        }
        TokenKind::Template(chunks)
    }

    /// Decodes the escape sequence following a backslash. `Ok(None)` is a line continuation.
    fn scan_escape(&mut self) -> Result<Option<char>, String> {
        let Some(c) = self.advance() else {
            return Err("unterminated escape sequence".to_string());
        };
        let decoded = match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'v' => '\u{b}',
            '0' => '\0',
            '\n' => return Ok(None),
            'x' => self.scan_hex_escape(2)?,
            'u' if self.peek_char() == Some('{') => {
                self.advance();
                let mut digits = String::new();
                while let Some(c) = self.advance() {
                    if c == '}' {
                        break;
                    }
                    digits.push(c);
                }
                decode_code_point(&digits)?
            }
            'u' => self.scan_hex_escape(4)?,
            other => other,
        };
        Ok(Some(decoded))
    }

    fn scan_hex_escape(&mut self, width: usize) -> Result<char, String> {
        let mut digits = String::with_capacity(width);
        for _ in 0..width {
            match self.advance() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                _ => return Err("malformed hexadecimal escape sequence".to_string()),
            }
        }
        decode_code_point(&digits)
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_second(&self) -> Option<char> {
        let mut lookahead = self.chars.clone();
        lookahead.next();
        lookahead.next().map(|(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn decode_code_point(digits: &str) -> Result<char, String> {
    u32::from_str_radix(digits, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| format!("invalid unicode escape '\\u{{{digits}}}'"))
}
