/// Token kinds produced by the scanner.
///
/// Keywords are matched case-insensitively; every other identifier-shaped
/// word becomes `Ident`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Error,
    Eof,
    Ident,

    Comma,
    Arrow,
    OpenParen,
    CloseParen,
    StringLit,
    Integer,
    Float,
    Dot,

    And,
    Or,

    Add,
    Subtract,
    Multiply,
    Divide,
    True,
    False,

    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,

    Select,
    From,
    As,
    Namespace,
    Where,

    JsonPath,
    Jq,
}

impl TokenKind {
    /// Keywords are identifier-shaped; positions that take field names
    /// accept them as plain words (`metadata -> namespace`).
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            TokenKind::And
                | TokenKind::Or
                | TokenKind::True
                | TokenKind::False
                | TokenKind::Select
                | TokenKind::From
                | TokenKind::As
                | TokenKind::Namespace
                | TokenKind::Where
                | TokenKind::JsonPath
                | TokenKind::Jq
        )
    }
}

/// One lexical unit: kind, byte offset of its first rune, and its text.
/// For string literals the text is the unescaped content without quotes.
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub offset: usize,
    pub text: String,
}

/// One-rune-lookahead scanner over a UTF-8 query string, buffering a
/// single token so the parser can `peek` without consuming. The scanner
/// is fused: once `Eof` is produced, every further `scan` returns `Eof`.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    next: Token,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer {
            input,
            pos: 0,
            next: Token {
                kind: TokenKind::Eof,
                offset: input.len(),
                text: String::new(),
            },
        };
        lexer.next = lexer.scan_token();
        lexer
    }

    /// Return the buffered token and advance to the next one.
    pub fn scan(&mut self) -> Token {
        let eof = Token {
            kind: TokenKind::Eof,
            offset: self.input.len(),
            text: String::new(),
        };
        let token = std::mem::replace(&mut self.next, eof);
        self.next = self.scan_token();
        token
    }

    /// Kind of the next token, without consuming it.
    pub fn peek(&self) -> TokenKind {
        self.next.kind
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn second_char(&self) -> Option<char> {
        self.input[self.pos..].chars().nth(1)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn scan_token(&mut self) -> Token {
        while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
            self.bump();
        }

        let offset = self.pos;
        let Some(c) = self.peek_char() else {
            return Token {
                kind: TokenKind::Eof,
                offset,
                text: String::new(),
            };
        };

        if c == '_' || c.is_alphabetic() {
            return self.scan_ident(offset);
        }
        if c == '"' || c == '\'' || c == '`' {
            return self.scan_string(offset);
        }
        if c.is_ascii_digit() || (c == '.' && self.second_char().is_some_and(|c| c.is_ascii_digit()))
        {
            return self.scan_number(offset);
        }

        self.bump();
        let kind = match c {
            '.' => TokenKind::Dot,
            ',' => TokenKind::Comma,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '+' => TokenKind::Add,
            '*' => TokenKind::Multiply,
            '/' => TokenKind::Divide,
            '-' => {
                if self.peek_char() == Some('>') {
                    self.bump();
                    TokenKind::Arrow
                } else {
                    TokenKind::Subtract
                }
            }
            '=' => {
                // accept both `=` and `==`
                if self.peek_char() == Some('=') {
                    self.bump();
                }
                TokenKind::Equal
            }
            '!' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::NotEqual
                } else {
                    TokenKind::Error
                }
            }
            '<' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::LessThanEqual
                } else {
                    TokenKind::LessThan
                }
            }
            '>' => {
                if self.peek_char() == Some('=') {
                    self.bump();
                    TokenKind::GreaterThanEqual
                } else {
                    TokenKind::GreaterThan
                }
            }
            _ => TokenKind::Error,
        };

        Token {
            kind,
            offset,
            text: self.input[offset..self.pos].to_string(),
        }
    }

    fn scan_ident(&mut self, offset: usize) -> Token {
        while matches!(self.peek_char(), Some(c) if c == '_' || c.is_alphanumeric()) {
            self.bump();
        }

        let text = &self.input[offset..self.pos];
        let kind = match text.to_ascii_lowercase().as_str() {
            "or" => TokenKind::Or,
            "and" => TokenKind::And,
            "select" => TokenKind::Select,
            "from" => TokenKind::From,
            "as" => TokenKind::As,
            "namespace" => TokenKind::Namespace,
            "where" => TokenKind::Where,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "jsonpath" => TokenKind::JsonPath,
            "jq" => TokenKind::Jq,
            _ => TokenKind::Ident,
        };

        Token {
            kind,
            offset,
            text: text.to_string(),
        }
    }

    fn scan_string(&mut self, offset: usize) -> Token {
        let open = self.bump().unwrap_or('"');
        let mut text = String::new();

        loop {
            let Some(c) = self.bump() else {
                // unterminated string
                return Token {
                    kind: TokenKind::Error,
                    offset,
                    text,
                };
            };

            if c == open {
                break;
            }

            // a backslash escapes only the three quote runes
            if c == '\\' && matches!(self.peek_char(), Some('"' | '\'' | '`')) {
                text.push(self.bump().unwrap_or('\\'));
                continue;
            }

            text.push(c);
        }

        Token {
            kind: TokenKind::StringLit,
            offset,
            text,
        }
    }

    fn scan_number(&mut self, offset: usize) -> Token {
        while matches!(self.peek_char(), Some(c) if c == '.' || c.is_ascii_digit()) {
            self.bump();
        }

        let text = &self.input[offset..self.pos];
        let kind = if text.parse::<i64>().is_ok() {
            TokenKind::Integer
        } else if text.parse::<f64>().is_ok() {
            TokenKind::Float
        } else {
            TokenKind::Error
        };

        Token {
            kind,
            offset,
            text: text.to_string(),
        }
    }
}
