use log::debug;

use crate::error::{LexError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Int,
    Double,
    String,
    Bool,
    Identifier,
    Type,

    Func,
    If,
    Else,
    While,
    Return,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Bang,
    Equal,
    EqualEqual,
    BangEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,

    Colon,
    Comma,
    Dot,
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    LeftBrace,
    RightBrace,

    NewLine,
    Eof,
}

/// Operator grouping the parser and evaluator dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpCategory {
    Arithmetic,
    Comparison,
    Logical,
}

impl TokenKind {
    pub fn category(&self) -> Option<OpCategory> {
        match self {
            TokenKind::Plus
            | TokenKind::Minus
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Percent => Some(OpCategory::Arithmetic),
            TokenKind::EqualEqual
            | TokenKind::BangEqual
            | TokenKind::Less
            | TokenKind::LessEqual
            | TokenKind::Greater
            | TokenKind::GreaterEqual => Some(OpCategory::Comparison),
            TokenKind::And | TokenKind::Or => Some(OpCategory::Logical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Token {
            kind,
            text: text.into(),
            line,
            column,
        }
    }
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    match lexer.run() {
        Ok(tokens) => Ok(tokens),
        Err(err) => {
            debug!("{}", err);
            Err(err.into())
        }
    }
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
    parens: i32,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            parens: 0,
        }
    }

    fn run(&mut self) -> std::result::Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        while let Some(c) = self.peek() {
            match c {
                '\\' if self.peek_at(1) == Some('\n') => {
                    // Line continuation: swallow both, no NewLine token.
                    self.pos += 2;
                    self.line += 1;
                    self.column = 1;
                }
                '\n' => {
                    tokens.push(Token::new(
                        TokenKind::NewLine,
                        "\\n",
                        self.line,
                        self.column,
                    ));
                    self.pos += 1;
                    self.line += 1;
                    self.column = 1;
                }
                ' ' | '\t' | '\r' => self.bump(),
                '#' => {
                    while self.peek().is_some_and(|c| c != '\n') {
                        self.bump();
                    }
                }
                '"' => tokens.push(self.read_string()?),
                c if c.is_ascii_digit() => tokens.push(self.read_number()?),
                '.' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    tokens.push(self.read_number()?)
                }
                c if c.is_ascii_alphabetic() => tokens.push(self.read_word()),
                _ => tokens.push(self.read_operator()?),
            }
        }

        if self.parens != 0 {
            return Err(LexError::UnbalancedParenthesis {
                line: self.line,
                column: self.column,
            });
        }

        tokens.push(Token::new(TokenKind::Eof, "", self.line, self.column));
        Ok(tokens)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) {
        self.pos += 1;
        self.column += 1;
    }

    fn read_string(&mut self) -> std::result::Result<Token, LexError> {
        let (start_line, start_column) = (self.line, self.column);
        self.bump(); // opening quote

        let mut text = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.bump();
                    return Ok(Token::new(TokenKind::String, text, start_line, start_column));
                }
                Some('\n') => {
                    // Raw accumulation, no escapes; literals may span lines.
                    text.push('\n');
                    self.pos += 1;
                    self.line += 1;
                    self.column = 1;
                }
                Some(c) => {
                    text.push(c);
                    self.bump();
                }
                None => {
                    return Err(LexError::UnterminatedString {
                        line: start_line,
                        column: start_column,
                    })
                }
            }
        }
    }

    fn read_number(&mut self) -> std::result::Result<Token, LexError> {
        let (start_line, start_column) = (self.line, self.column);
        let mut text = String::new();
        let mut decimal_found = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                text.push(c);
                self.bump();
            } else if c == '.' {
                if decimal_found {
                    text.push(c);
                    return Err(LexError::MalformedNumber {
                        text,
                        line: start_line,
                        column: start_column,
                    });
                }
                decimal_found = true;
                text.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let kind = if decimal_found {
            TokenKind::Double
        } else {
            TokenKind::Int
        };
        Ok(Token::new(kind, text, start_line, start_column))
    }

    fn read_word(&mut self) -> Token {
        let (start_line, start_column) = (self.line, self.column);
        let mut word = String::new();

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }

        let kind = keyword(&word).unwrap_or(TokenKind::Identifier);
        Token::new(kind, word, start_line, start_column)
    }

    fn read_operator(&mut self) -> std::result::Result<Token, LexError> {
        let (start_line, start_column) = (self.line, self.column);
        let c = self.peek().expect("read_operator called at end of input");

        // The operator characters proper may not close out the input.
        if is_operator_char(c) && self.pos == self.chars.len() - 1 {
            return Err(LexError::TrailingOperator {
                ch: c,
                line: start_line,
                column: start_column,
            });
        }

        if let Some(next) = self.peek_at(1) {
            let two = match (c, next) {
                ('=', '=') => Some(TokenKind::EqualEqual),
                ('!', '=') => Some(TokenKind::BangEqual),
                ('<', '=') => Some(TokenKind::LessEqual),
                ('>', '=') => Some(TokenKind::GreaterEqual),
                ('&', '&') => Some(TokenKind::And),
                ('|', '|') => Some(TokenKind::Or),
                _ => None,
            };
            if let Some(kind) = two {
                let mut text = String::from(c);
                text.push(next);
                self.bump();
                self.bump();
                return Ok(Token::new(kind, text, start_line, start_column));
            }
        }

        let kind = match c {
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => TokenKind::Equal,
            '!' => TokenKind::Bang,
            '<' => TokenKind::Less,
            '>' => TokenKind::Greater,
            ':' => TokenKind::Colon,
            ',' => TokenKind::Comma,
            '.' => TokenKind::Dot,
            '[' => TokenKind::LeftSquare,
            ']' => TokenKind::RightSquare,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '(' => {
                self.parens += 1;
                TokenKind::LeftParen
            }
            ')' => {
                self.parens -= 1;
                if self.parens < 0 {
                    return Err(LexError::UnbalancedParenthesis {
                        line: start_line,
                        column: start_column,
                    });
                }
                TokenKind::RightParen
            }
            _ => {
                return Err(LexError::UnexpectedCharacter {
                    ch: c,
                    line: start_line,
                    column: start_column,
                })
            }
        };

        self.bump();
        Ok(Token::new(kind, c.to_string(), start_line, start_column))
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "and" => Some(TokenKind::And),
        "or" => Some(TokenKind::Or),
        "not" => Some(TokenKind::Bang),
        "if" => Some(TokenKind::If),
        "else" => Some(TokenKind::Else),
        "while" => Some(TokenKind::While),
        "return" => Some(TokenKind::Return),
        "func" => Some(TokenKind::Func),
        "true" | "false" => Some(TokenKind::Bool),
        "int" | "double" | "string" | "bool" | "void" => Some(TokenKind::Type),
        _ => None,
    }
}

fn is_operator_char(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '%' | '=' | '!' | '<' | '>' | '&' | '|'
    )
}
