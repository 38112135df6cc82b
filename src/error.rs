use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Malformed input rejected before any token reaches the parser.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    #[error("lex error: malformed number '{text}' at line {line}, column {column}")]
    MalformedNumber {
        text: String,
        line: usize,
        column: usize,
    },
    #[error("lex error: unterminated string literal starting at line {line}, column {column}")]
    UnterminatedString { line: usize, column: usize },
    #[error("lex error: unexpected character '{ch}' at line {line}, column {column}")]
    UnexpectedCharacter {
        ch: char,
        line: usize,
        column: usize,
    },
    #[error("lex error: unbalanced parenthesis at line {line}, column {column}")]
    UnbalancedParenthesis { line: usize, column: usize },
    #[error("lex error: operator '{ch}' at end of input at line {line}, column {column}")]
    TrailingOperator {
        ch: char,
        line: usize,
        column: usize,
    },
}

/// Grammar violations. Each names the offending token and what was expected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("parse error: unexpected token '{found}' at line {line}, expected {expected}")]
    UnexpectedToken {
        found: String,
        expected: String,
        line: usize,
    },
    #[error("parse error: expected an expression, found '{found}' at line {line}")]
    ExpectedExpression { found: String, line: usize },
    #[error("parse error: invalid assignment target at line {line}")]
    InvalidAssignmentTarget { line: usize },
    #[error("parse error: invalid number '{text}' at line {line}")]
    InvalidNumber { text: String, line: usize },
    #[error("parse error: unknown list method '{name}' at line {line}")]
    UnknownMethod { name: String, line: usize },
    #[error("parse error: {callee} takes {expected} argument(s) but got {found} at line {line}")]
    WrongArgumentCount {
        callee: String,
        expected: usize,
        found: usize,
        line: usize,
    },
    #[error("parse error: while condition at line {line} must be a comparison or logical expression")]
    NonBooleanCondition { line: usize },
    #[error("parse error: missing return statement in function '{function}' at line {line}")]
    MissingReturn { function: String, line: usize },
}

/// Failures raised while walking the tree. Effects already produced stay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("type error: {message} at line {line}")]
    TypeMismatch { message: String, line: usize },
    #[error("runtime error: undefined variable '{name}' at line {line}")]
    UndefinedVariable { name: String, line: usize },
    #[error("runtime error: undefined function '{name}' at line {line}")]
    UndefinedFunction { name: String, line: usize },
    #[error("runtime error: division or modulo by zero at line {line}")]
    DivisionByZero { line: usize },
    #[error(
        "runtime error: index {index} out of bounds for list '{name}' of length {len} at line {line}"
    )]
    IndexOutOfBounds {
        name: String,
        index: i64,
        len: usize,
        line: usize,
    },
    #[error("type error: list '{name}' holds {expected} but got {found} at line {line}")]
    ListTypeMismatch {
        name: String,
        expected: String,
        found: String,
        line: usize,
    },
    #[error("runtime error: list '{name}' already exists at line {line}")]
    ListRedeclaration { name: String, line: usize },
    #[error("runtime error: '{name}' is not a list at line {line}")]
    NotAList { name: String, line: usize },
    #[error("type cast error: cannot convert {found} to {target} at line {line}")]
    InvalidCast {
        found: String,
        target: String,
        line: usize,
    },
    #[error(
        "runtime error: function '{name}' expects {expected} argument(s) but got {found} at line {line}"
    )]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
        line: usize,
    },
    #[error("runtime error: function '{name}' is already defined at line {line}")]
    FunctionRedefinition { name: String, line: usize },
    #[error(
        "type error: function '{name}' declares return type {expected} but returned {found} at line {line}"
    )]
    ReturnTypeMismatch {
        name: String,
        expected: String,
        found: String,
        line: usize,
    },
    #[error("runtime error: return statement outside of a function at line {line}")]
    ReturnOutsideFunction { line: usize },
    #[error("runtime error: return with a value in void function '{name}' at line {line}")]
    VoidReturn { name: String, line: usize },
}
