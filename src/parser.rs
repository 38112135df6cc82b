use crate::{
    error::{ParseError, Result},
    tokenizer::{OpCategory, Token, TokenKind},
};
use std::fmt::{self, Display, Formatter};

/// Declared types: cast targets, list element types, parameter and
/// return types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeName {
    Int,
    Double,
    Bool,
    Str,
    Void,
}

impl TypeName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeName::Int => "int",
            TypeName::Double => "double",
            TypeName::Bool => "bool",
            TypeName::Str => "string",
            TypeName::Void => "void",
        }
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulo => "%",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEqual => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEqual => ">=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    pub fn category(&self) -> OpCategory {
        match self {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Modulo => OpCategory::Arithmetic,
            BinaryOp::Equal
            | BinaryOp::NotEqual
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => OpCategory::Comparison,
            BinaryOp::And | BinaryOp::Or => OpCategory::Logical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub ty: TypeName,
}

/// A sequence of statements: the whole program, or the body of an
/// `if`/`while`/function.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Expr>,
}

/// One AST node. Every node keeps the token it came from so runtime
/// errors can name a source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub token: Token,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLiteral(i64),
    DoubleLiteral(f64),
    BoolLiteral(bool),
    StringLiteral(String),
    Variable(String),
    Assign {
        name: String,
        value: Box<Expr>,
    },
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        operator: UnaryOp,
        operand: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        then_block: Block,
        else_block: Option<Block>,
    },
    While {
        condition: Box<Expr>,
        body: Block,
    },
    Print(Box<Expr>),
    Input(Box<Expr>),
    Cast {
        target: TypeName,
        value: Box<Expr>,
    },
    ListInit {
        name: String,
        element_type: TypeName,
    },
    ListAppend {
        name: String,
        value: Box<Expr>,
    },
    ListIndex {
        name: String,
        index: Box<Expr>,
    },
    ListPop {
        name: String,
        index: Box<Expr>,
    },
    ListReplace {
        name: String,
        index: Box<Expr>,
        value: Box<Expr>,
    },
    ListLength {
        name: String,
    },
    FunctionDef {
        name: String,
        return_type: TypeName,
        params: Vec<Parameter>,
        body: Block,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Return(Box<Expr>),
}

pub fn parse(tokens: &[Token]) -> Result<Block> {
    assert!(
        tokens.last().is_some_and(|t| t.kind == TokenKind::Eof),
        "Token slice must be terminated by Eof"
    );

    Parser { tokens, pos: 0 }.parse_program()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    fn skip_newlines(&mut self) {
        while self.check(TokenKind::NewLine) {
            self.advance();
        }
    }

    /// Consume a token of the given kind. Newlines in front of the
    /// expected token are skipped, so braces and signatures may span
    /// lines.
    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if kind != TokenKind::NewLine {
            self.skip_newlines();
        }
        let token = self.current().clone();
        if token.kind != kind {
            return Err(ParseError::UnexpectedToken {
                found: found_text(&token),
                expected: expected.to_string(),
                line: token.line,
            }
            .into());
        }
        self.advance();
        Ok(token)
    }

    /// Statement separators are newlines, but a complete statement may
    /// also abut a closing brace or end-of-input on the same line.
    fn eat_newline(&mut self) {
        if self.check(TokenKind::NewLine) {
            self.advance();
        }
    }

    fn parse_program(&mut self) -> Result<Block> {
        let mut statements = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::Eof => break,
                TokenKind::NewLine => self.advance(),
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(Block { statements })
    }

    fn parse_statement(&mut self) -> Result<Expr> {
        match self.current().kind {
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            _ => {
                let expr = self.parse_expression()?;
                self.eat_newline();
                Ok(expr)
            }
        }
    }

    fn parse_return(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        self.advance();
        let value = self.parse_expression()?;
        self.eat_newline();
        Ok(Expr {
            kind: ExprKind::Return(Box::new(value)),
            token,
        })
    }

    fn parse_if(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        self.advance();
        self.expect(TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;
        self.expect(TokenKind::RightParen, "')'")?;
        self.expect(TokenKind::LeftBrace, "'{'")?;
        let then_block = self.parse_block()?;
        self.expect(TokenKind::RightBrace, "'}'")?;

        self.skip_newlines();
        let else_block = if self.check(TokenKind::Else) {
            self.advance();
            self.expect(TokenKind::LeftBrace, "'{'")?;
            let block = self.parse_block()?;
            self.expect(TokenKind::RightBrace, "'}'")?;
            Some(block)
        } else {
            None
        };

        Ok(Expr {
            kind: ExprKind::If {
                condition: Box::new(condition),
                then_block,
                else_block,
            },
            token,
        })
    }

    fn parse_while(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        self.advance();
        self.expect(TokenKind::LeftParen, "'('")?;
        let condition = self.parse_expression()?;

        // The condition's root must already be boolean-shaped; this is a
        // syntactic check, not a type pass.
        let boolean_root = match &condition.kind {
            ExprKind::Binary { operator, .. } => matches!(
                operator.category(),
                OpCategory::Comparison | OpCategory::Logical
            ),
            ExprKind::Unary { operator, .. } => *operator == UnaryOp::Not,
            _ => false,
        };
        if !boolean_root {
            return Err(ParseError::NonBooleanCondition { line: token.line }.into());
        }

        self.expect(TokenKind::RightParen, "')'")?;
        self.expect(TokenKind::LeftBrace, "'{'")?;
        let body = self.parse_block()?;
        self.expect(TokenKind::RightBrace, "'}'")?;

        Ok(Expr {
            kind: ExprKind::While {
                condition: Box::new(condition),
                body,
            },
            token,
        })
    }

    fn parse_block(&mut self) -> Result<Block> {
        let mut statements = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::RightBrace | TokenKind::Eof => break,
                TokenKind::NewLine => self.advance(),
                _ => statements.push(self.parse_statement()?),
            }
        }
        Ok(Block { statements })
    }

    /// Combined assignment/equality/logical layer. Dispatches on the
    /// operator token's category rather than its text.
    fn parse_expression(&mut self) -> Result<Expr> {
        let mut left = self.parse_term()?;

        loop {
            let token = self.current().clone();
            if token.kind == TokenKind::Equal {
                self.advance();
                left = self.finish_assignment(left, token)?;
            } else if matches!(
                token.kind.category(),
                Some(OpCategory::Comparison | OpCategory::Logical)
            ) {
                self.advance();
                let operator = binary_op(&token.kind);
                let right = self.parse_term()?;
                left = Expr {
                    kind: ExprKind::Binary {
                        left: Box::new(left),
                        operator,
                        right: Box::new(right),
                    },
                    token,
                };
            } else {
                break;
            }
        }

        Ok(left)
    }

    /// Everything an `=` can introduce: a second `=` re-parses as
    /// equality, the literal word `list` with a `:type()` suffix
    /// declares a typed list, anything else assigns to a variable.
    fn finish_assignment(&mut self, left: Expr, token: Token) -> Result<Expr> {
        if self.check(TokenKind::Equal) {
            self.advance();
            let right = self.parse_term()?;
            return Ok(Expr {
                kind: ExprKind::Binary {
                    left: Box::new(left),
                    operator: BinaryOp::Equal,
                    right: Box::new(right),
                },
                token,
            });
        }

        let name = match &left.kind {
            ExprKind::Variable(name) => name.clone(),
            _ => return Err(ParseError::InvalidAssignmentTarget { line: token.line }.into()),
        };

        if self.check(TokenKind::Identifier)
            && self.current().text == "list"
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Colon)
        {
            self.advance(); // 'list'
            self.advance(); // ':'
            let ty_token = self.expect(TokenKind::Type, "a list element type")?;
            let element_type = type_name(&ty_token)?;
            if element_type == TypeName::Void {
                return Err(ParseError::UnexpectedToken {
                    found: ty_token.text,
                    expected: "a list element type".to_string(),
                    line: ty_token.line,
                }
                .into());
            }
            self.expect(TokenKind::LeftParen, "'('")?;
            self.expect(TokenKind::RightParen, "')'")?;
            return Ok(Expr {
                kind: ExprKind::ListInit { name, element_type },
                token: left.token,
            });
        }

        let value = self.parse_expression()?;
        Ok(Expr {
            kind: ExprKind::Assign {
                name,
                value: Box::new(value),
            },
            token: left.token,
        })
    }

    fn parse_term(&mut self) -> Result<Expr> {
        let mut node = self.parse_factor()?;

        while matches!(self.current().kind, TokenKind::Plus | TokenKind::Minus) {
            let token = self.current().clone();
            self.advance();
            let operator = binary_op(&token.kind);
            let right = self.parse_factor()?;
            node = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(node),
                    operator,
                    right: Box::new(right),
                },
                token,
            };
        }

        Ok(node)
    }

    fn parse_factor(&mut self) -> Result<Expr> {
        let mut node = self.parse_unary()?;

        while matches!(
            self.current().kind,
            TokenKind::Star | TokenKind::Slash | TokenKind::Percent
        ) {
            let token = self.current().clone();
            self.advance();
            let operator = binary_op(&token.kind);
            let right = self.parse_unary()?;
            node = Expr {
                kind: ExprKind::Binary {
                    left: Box::new(node),
                    operator,
                    right: Box::new(right),
                },
                token,
            };
        }

        Ok(node)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        let operator = match token.kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };

        self.advance();
        let operand = self.parse_unary()?;
        Ok(Expr {
            kind: ExprKind::Unary {
                operator,
                operand: Box::new(operand),
            },
            token,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self.current().clone();
        match token.kind {
            TokenKind::Int => {
                self.advance();
                let value = token.text.parse::<i64>().map_err(|_| ParseError::InvalidNumber {
                    text: token.text.clone(),
                    line: token.line,
                })?;
                Ok(Expr {
                    kind: ExprKind::IntLiteral(value),
                    token,
                })
            }
            TokenKind::Double => {
                self.advance();
                let value = token.text.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                    text: token.text.clone(),
                    line: token.line,
                })?;
                Ok(Expr {
                    kind: ExprKind::DoubleLiteral(value),
                    token,
                })
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr {
                    kind: ExprKind::StringLiteral(token.text.clone()),
                    token,
                })
            }
            TokenKind::Bool => {
                self.advance();
                let value = token.text == "true";
                Ok(Expr {
                    kind: ExprKind::BoolLiteral(value),
                    token,
                })
            }
            TokenKind::Identifier => self.parse_identifier(token),
            TokenKind::Type => {
                self.advance();
                if !self.check(TokenKind::LeftParen) {
                    return Err(ParseError::UnexpectedToken {
                        found: found_text(self.current()),
                        expected: "'(' after type keyword".to_string(),
                        line: self.current().line,
                    }
                    .into());
                }
                let target = type_name(&token)?;
                if target == TypeName::Void {
                    return Err(ParseError::UnexpectedToken {
                        found: token.text,
                        expected: "a cast target".to_string(),
                        line: token.line,
                    }
                    .into());
                }
                let mut args = self.parse_arguments()?;
                if args.len() != 1 {
                    return Err(ParseError::WrongArgumentCount {
                        callee: token.text.clone(),
                        expected: 1,
                        found: args.len(),
                        line: token.line,
                    }
                    .into());
                }
                Ok(Expr {
                    kind: ExprKind::Cast {
                        target,
                        value: Box::new(args.remove(0)),
                    },
                    token,
                })
            }
            TokenKind::Func => self.parse_function_definition(token),
            TokenKind::LeftParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                Ok(expr)
            }
            _ => Err(ParseError::ExpectedExpression {
                found: found_text(&token),
                line: token.line,
            }
            .into()),
        }
    }

    /// After an identifier: `.method(...)`, `[index]`, a call, or a bare
    /// variable reference. Assignment is picked up by the expression
    /// layer above.
    fn parse_identifier(&mut self, token: Token) -> Result<Expr> {
        self.advance();
        match self.current().kind {
            TokenKind::Dot => self.parse_method(token),
            TokenKind::LeftSquare => {
                self.advance();
                let index = self.parse_expression()?;
                self.expect(TokenKind::RightSquare, "']'")?;
                Ok(Expr {
                    kind: ExprKind::ListIndex {
                        name: token.text.clone(),
                        index: Box::new(index),
                    },
                    token,
                })
            }
            TokenKind::LeftParen => {
                let mut args = self.parse_arguments()?;
                let name = token.text.clone();
                match name.as_str() {
                    "print" | "input" => {
                        if args.len() != 1 {
                            return Err(ParseError::WrongArgumentCount {
                                callee: name,
                                expected: 1,
                                found: args.len(),
                                line: token.line,
                            }
                            .into());
                        }
                        let arg = Box::new(args.remove(0));
                        let kind = if name == "print" {
                            ExprKind::Print(arg)
                        } else {
                            ExprKind::Input(arg)
                        };
                        Ok(Expr { kind, token })
                    }
                    _ => Ok(Expr {
                        kind: ExprKind::Call { name, args },
                        token,
                    }),
                }
            }
            _ => Ok(Expr {
                kind: ExprKind::Variable(token.text.clone()),
                token,
            }),
        }
    }

    fn parse_method(&mut self, token: Token) -> Result<Expr> {
        self.advance(); // '.'
        let method = self.expect(TokenKind::Identifier, "a list method name")?;
        let name = token.text.clone();

        let kind = match method.text.as_str() {
            "append" => {
                self.expect(TokenKind::LeftParen, "'('")?;
                let value = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                ExprKind::ListAppend {
                    name,
                    value: Box::new(value),
                }
            }
            "pop" => {
                self.expect(TokenKind::LeftParen, "'('")?;
                let index = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                ExprKind::ListPop {
                    name,
                    index: Box::new(index),
                }
            }
            "length" => {
                self.expect(TokenKind::LeftParen, "'('")?;
                self.expect(TokenKind::RightParen, "')'")?;
                ExprKind::ListLength { name }
            }
            "replace" => {
                self.expect(TokenKind::LeftParen, "'('")?;
                let index = self.parse_expression()?;
                self.expect(TokenKind::Comma, "','")?;
                let value = self.parse_expression()?;
                self.expect(TokenKind::RightParen, "')'")?;
                ExprKind::ListReplace {
                    name,
                    index: Box::new(index),
                    value: Box::new(value),
                }
            }
            _ => {
                return Err(ParseError::UnknownMethod {
                    name: method.text,
                    line: method.line,
                }
                .into())
            }
        };

        Ok(Expr { kind, token })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokenKind::LeftParen, "'('")?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                args.push(self.parse_expression()?);
                if self.check(TokenKind::RightParen) {
                    break;
                }
                self.expect(TokenKind::Comma, "','")?;
            }
        }
        self.expect(TokenKind::RightParen, "')'")?;
        Ok(args)
    }

    fn parse_function_definition(&mut self, token: Token) -> Result<Expr> {
        self.advance(); // 'func'
        self.expect(TokenKind::Colon, "':'")?;
        let ret_token = self.expect(TokenKind::Type, "a return type")?;
        let return_type = type_name(&ret_token)?;
        let name = self
            .expect(TokenKind::Identifier, "a function name")?
            .text;

        self.expect(TokenKind::LeftParen, "'('")?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                let param_name = self.expect(TokenKind::Identifier, "a parameter name")?.text;
                self.expect(TokenKind::Colon, "':'")?;
                let ty_token = self.expect(TokenKind::Type, "a parameter type")?;
                let ty = type_name(&ty_token)?;
                if ty == TypeName::Void {
                    return Err(ParseError::UnexpectedToken {
                        found: ty_token.text,
                        expected: "a parameter type".to_string(),
                        line: ty_token.line,
                    }
                    .into());
                }
                params.push(Parameter {
                    name: param_name,
                    ty,
                });
                if self.check(TokenKind::RightParen) {
                    break;
                }
                self.expect(TokenKind::Comma, "','")?;
            }
        }
        self.expect(TokenKind::RightParen, "')'")?;

        self.expect(TokenKind::LeftBrace, "'{'")?;
        let body = self.parse_block()?;
        self.expect(TokenKind::RightBrace, "'}'")?;

        // Syntactic check only: a non-void body must contain a return
        // among its top-level statements.
        let has_return = body
            .statements
            .iter()
            .any(|s| matches!(s.kind, ExprKind::Return(_)));
        if return_type != TypeName::Void && !has_return {
            return Err(ParseError::MissingReturn {
                function: name,
                line: token.line,
            }
            .into());
        }

        Ok(Expr {
            kind: ExprKind::FunctionDef {
                name,
                return_type,
                params,
                body,
            },
            token,
        })
    }
}

fn binary_op(kind: &TokenKind) -> BinaryOp {
    match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Subtract,
        TokenKind::Star => BinaryOp::Multiply,
        TokenKind::Slash => BinaryOp::Divide,
        TokenKind::Percent => BinaryOp::Modulo,
        TokenKind::EqualEqual => BinaryOp::Equal,
        TokenKind::BangEqual => BinaryOp::NotEqual,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::LessEqual => BinaryOp::LessEqual,
        TokenKind::Greater => BinaryOp::Greater,
        TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
        TokenKind::And => BinaryOp::And,
        TokenKind::Or => BinaryOp::Or,
        _ => unreachable!("not a binary operator"),
    }
}

fn type_name(token: &Token) -> Result<TypeName> {
    match token.text.as_str() {
        "int" => Ok(TypeName::Int),
        "double" => Ok(TypeName::Double),
        "bool" => Ok(TypeName::Bool),
        "string" => Ok(TypeName::Str),
        "void" => Ok(TypeName::Void),
        _ => Err(ParseError::UnexpectedToken {
            found: token.text.clone(),
            expected: "a type name".to_string(),
            line: token.line,
        }
        .into()),
    }
}

fn found_text(token: &Token) -> String {
    if token.kind == TokenKind::Eof {
        "end of input".to_string()
    } else {
        token.text.clone()
    }
}
