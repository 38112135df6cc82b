use crate::environment::{Environment, FunctionContext};
use crate::error::{Result, RuntimeError};
use crate::parser::{BinaryOp, Block, Expr, ExprKind, Parameter, TypeName, UnaryOp};
use crate::tokenizer::OpCategory;
use std::{
    cell::RefCell,
    collections::HashMap,
    fmt::{self, Debug, Display, Formatter},
    io::{self, Write},
    rc::Rc,
};

#[derive(Clone)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Str(String),
    None,
    List(Rc<RefCell<TypedVector>>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::None => "none",
            Value::List(_) => "list",
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    fn matches(&self, ty: TypeName) -> bool {
        matches!(
            (self, ty),
            (Value::Int(_), TypeName::Int)
                | (Value::Double(_), TypeName::Double)
                | (Value::Bool(_), TypeName::Bool)
                | (Value::Str(_), TypeName::Str)
        )
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow().values() == *b.borrow().values()
            }
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(d) => write!(f, "{}", d),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Str(s) => write!(f, "{}", s),
            Value::None => write!(f, "None"),
            Value::List(list) => {
                write!(f, "[")?;
                for (i, item) in list.borrow().values().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Value::Str(s) = self {
            write!(f, "\"{}\"", s)
        } else {
            write!(f, "{}", self)
        }
    }
}

/// A list whose element type is fixed at creation. `push` and `replace`
/// refuse values of any other runtime type, leaving the list unchanged.
#[derive(Debug, PartialEq)]
pub struct TypedVector {
    element_type: TypeName,
    values: Vec<Value>,
}

impl TypedVector {
    pub fn new(element_type: TypeName) -> Self {
        TypedVector {
            element_type,
            values: Vec::new(),
        }
    }

    pub fn element_type(&self) -> TypeName {
        self.element_type
    }

    pub fn values(&self) -> &Vec<Value> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn push(&mut self, value: Value) -> bool {
        if !value.matches(self.element_type) {
            return false;
        }
        self.values.push(value);
        true
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.values.get(index).cloned()
    }

    pub fn pop(&mut self, index: usize) -> Option<Value> {
        if index < self.values.len() {
            Some(self.values.remove(index))
        } else {
            None
        }
    }

    #[must_use]
    pub fn replace(&mut self, index: usize, value: Value) -> bool {
        if index >= self.values.len() || !value.matches(self.element_type) {
            return false;
        }
        self.values[index] = value;
        true
    }
}

/// An immutable user function definition, registered once when its
/// definition node is evaluated.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub return_type: TypeName,
    pub params: Vec<Parameter>,
    pub body: Block,
}

/// How evaluation of one node completed. `Return` unwinds block, `if`
/// and `while` evaluation until the call that pushed the frame absorbs
/// it.
enum Signal {
    Continue(Value),
    Return(Value),
}

pub struct Interpreter {
    env: Environment,
    functions: HashMap<String, Rc<Function>>,
    out: Box<dyn Write>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(out: Box<dyn Write>) -> Self {
        Interpreter {
            env: Environment::new(),
            functions: HashMap::new(),
            out,
        }
    }

    /// Runs the statements of a program block in source order for their
    /// effects.
    pub fn execute(&mut self, block: &Block) -> Result<()> {
        self.run_block(block)?;
        Ok(())
    }

    fn run_block(&mut self, block: &Block) -> Result<Signal> {
        for statement in &block.statements {
            if let Signal::Return(value) = self.eval(statement)? {
                return Ok(Signal::Return(value));
            }
        }
        Ok(Signal::Continue(Value::None))
    }

    fn eval_value(&mut self, expr: &Expr) -> Result<Value> {
        Ok(match self.eval(expr)? {
            Signal::Continue(value) | Signal::Return(value) => value,
        })
    }

    fn eval(&mut self, expr: &Expr) -> Result<Signal> {
        let line = expr.token.line;
        match &expr.kind {
            ExprKind::IntLiteral(value) => Ok(Signal::Continue(Value::Int(*value))),
            ExprKind::DoubleLiteral(value) => Ok(Signal::Continue(Value::Double(*value))),
            ExprKind::BoolLiteral(value) => Ok(Signal::Continue(Value::Bool(*value))),
            ExprKind::StringLiteral(value) => {
                Ok(Signal::Continue(Value::Str(value.clone())))
            }
            ExprKind::Variable(name) => match self.env.get(name) {
                Some(value) => Ok(Signal::Continue(value.clone())),
                None => Err(RuntimeError::UndefinedVariable {
                    name: name.clone(),
                    line,
                }
                .into()),
            },
            ExprKind::Assign { name, value } => {
                let value = self.eval_value(value)?;
                self.env.set(name.clone(), value.clone());
                Ok(Signal::Continue(value))
            }
            ExprKind::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.eval_value(left)?;
                let right = self.eval_value(right)?;
                Ok(Signal::Continue(evaluate_binary(
                    left, *operator, right, line,
                )?))
            }
            ExprKind::Unary { operator, operand } => {
                let operand = self.eval_value(operand)?;
                Ok(Signal::Continue(evaluate_unary(*operator, operand, line)?))
            }
            ExprKind::If {
                condition,
                then_block,
                else_block,
            } => {
                let condition = self.eval_value(condition)?;
                if coerce_bool(&condition, line)? {
                    self.run_block(then_block)
                } else if let Some(block) = else_block {
                    self.run_block(block)
                } else {
                    Ok(Signal::Continue(Value::None))
                }
            }
            ExprKind::While { condition, body } => self.run_while(condition, body),
            ExprKind::Print(expr) => {
                let value = self.eval_value(expr)?;
                writeln!(self.out, "{}", value)?;
                Ok(Signal::Continue(value))
            }
            ExprKind::Input(prompt) => {
                let prompt = self.eval_value(prompt)?;
                writeln!(self.out, "{}", prompt)?;
                self.out.flush()?;
                let mut buffer = String::new();
                io::stdin().read_line(&mut buffer)?;
                let text = buffer.trim_end_matches(['\n', '\r']).to_string();
                Ok(Signal::Continue(Value::Str(text)))
            }
            ExprKind::Cast { target, value } => {
                let value = self.eval_value(value)?;
                Ok(Signal::Continue(cast(*target, value, line)?))
            }
            ExprKind::ListInit { name, element_type } => {
                if self.env.get(name).is_some() {
                    return Err(RuntimeError::ListRedeclaration {
                        name: name.clone(),
                        line,
                    }
                    .into());
                }
                let list = Rc::new(RefCell::new(TypedVector::new(*element_type)));
                self.env.set(name.clone(), Value::List(list));
                Ok(Signal::Continue(Value::None))
            }
            ExprKind::ListAppend { name, value } => {
                let list = self.lookup_list(name, line)?;
                let value = self.eval_value(value)?;
                let expected = list.borrow().element_type();
                if !list.borrow_mut().push(value.clone()) {
                    return Err(RuntimeError::ListTypeMismatch {
                        name: name.clone(),
                        expected: expected.to_string(),
                        found: value.type_name().to_string(),
                        line,
                    }
                    .into());
                }
                Ok(Signal::Continue(Value::None))
            }
            ExprKind::ListIndex { name, index } => {
                let list = self.lookup_list(name, line)?;
                let index = self.index_value(index, line)?;
                let len = list.borrow().len();
                match usize::try_from(index).ok().and_then(|i| list.borrow().get(i)) {
                    Some(value) => Ok(Signal::Continue(value)),
                    None => Err(RuntimeError::IndexOutOfBounds {
                        name: name.clone(),
                        index,
                        len,
                        line,
                    }
                    .into()),
                }
            }
            ExprKind::ListPop { name, index } => {
                let list = self.lookup_list(name, line)?;
                let index = self.index_value(index, line)?;
                let len = list.borrow().len();
                match usize::try_from(index)
                    .ok()
                    .and_then(|i| list.borrow_mut().pop(i))
                {
                    Some(value) => Ok(Signal::Continue(value)),
                    None => Err(RuntimeError::IndexOutOfBounds {
                        name: name.clone(),
                        index,
                        len,
                        line,
                    }
                    .into()),
                }
            }
            ExprKind::ListReplace { name, index, value } => {
                let list = self.lookup_list(name, line)?;
                let index = self.index_value(index, line)?;
                let value = self.eval_value(value)?;
                let (len, expected) = {
                    let borrowed = list.borrow();
                    (borrowed.len(), borrowed.element_type())
                };
                let in_bounds = usize::try_from(index).map_or(false, |i| i < len);
                if !in_bounds {
                    return Err(RuntimeError::IndexOutOfBounds {
                        name: name.clone(),
                        index,
                        len,
                        line,
                    }
                    .into());
                }
                if !list.borrow_mut().replace(index as usize, value.clone()) {
                    return Err(RuntimeError::ListTypeMismatch {
                        name: name.clone(),
                        expected: expected.to_string(),
                        found: value.type_name().to_string(),
                        line,
                    }
                    .into());
                }
                Ok(Signal::Continue(Value::None))
            }
            ExprKind::ListLength { name } => {
                let list = self.lookup_list(name, line)?;
                let len = list.borrow().len();
                Ok(Signal::Continue(Value::Int(len as i64)))
            }
            ExprKind::FunctionDef {
                name,
                return_type,
                params,
                body,
            } => {
                if self.functions.contains_key(name) {
                    return Err(RuntimeError::FunctionRedefinition {
                        name: name.clone(),
                        line,
                    }
                    .into());
                }
                let function = Function {
                    name: name.clone(),
                    return_type: *return_type,
                    params: params.clone(),
                    body: body.clone(),
                };
                self.functions.insert(name.clone(), Rc::new(function));
                Ok(Signal::Continue(Value::None))
            }
            ExprKind::Call { name, args } => self.call_function(name, args, line),
            ExprKind::Return(value) => {
                let Some(frame) = self.env.current_frame() else {
                    return Err(RuntimeError::ReturnOutsideFunction { line }.into());
                };
                let function = frame.function().to_string();
                let declared = frame.return_type();
                if declared == TypeName::Void {
                    return Err(RuntimeError::VoidReturn {
                        name: function,
                        line,
                    }
                    .into());
                }
                let value = self.eval_value(value)?;
                if !value.matches(declared) {
                    return Err(RuntimeError::ReturnTypeMismatch {
                        name: function,
                        expected: declared.to_string(),
                        found: value.type_name().to_string(),
                        line,
                    }
                    .into());
                }
                Ok(Signal::Return(value))
            }
        }
    }

    /// The loop condition is re-evaluated after every statement of the
    /// body, not once per pass. Deliberate language behavior.
    fn run_while(&mut self, condition: &Expr, body: &Block) -> Result<Signal> {
        let line = condition.token.line;
        loop {
            let entry = self.eval_value(condition)?;
            if !coerce_bool(&entry, line)? {
                break;
            }
            for statement in &body.statements {
                if let Signal::Return(value) = self.eval(statement)? {
                    return Ok(Signal::Return(value));
                }
                let recheck = self.eval_value(condition)?;
                if !coerce_bool(&recheck, line)? {
                    return Ok(Signal::Continue(Value::None));
                }
            }
        }
        Ok(Signal::Continue(Value::None))
    }

    fn call_function(&mut self, name: &str, args: &[Expr], line: usize) -> Result<Signal> {
        let Some(function) = self.functions.get(name).cloned() else {
            return Err(RuntimeError::UndefinedFunction {
                name: name.to_string(),
                line,
            }
            .into());
        };

        if function.params.len() != args.len() {
            return Err(RuntimeError::ArityMismatch {
                name: name.to_string(),
                expected: function.params.len(),
                found: args.len(),
                line,
            }
            .into());
        }

        // Arguments evaluate in the caller's scope, before the frame is
        // pushed.
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval_value(arg)?);
        }

        let mut frame = FunctionContext::new(function.name.clone(), function.return_type);
        for (param, value) in function.params.iter().zip(values) {
            frame.define(param.name.clone(), value);
        }

        self.env.push_frame(frame);
        let result = self.run_block(&function.body);
        self.env.pop_frame();

        match result? {
            Signal::Return(value) => Ok(Signal::Continue(value)),
            Signal::Continue(_) => Ok(Signal::Continue(Value::None)),
        }
    }

    fn lookup_list(&self, name: &str, line: usize) -> Result<Rc<RefCell<TypedVector>>> {
        match self.env.get(name) {
            Some(Value::List(list)) => Ok(Rc::clone(list)),
            Some(_) => Err(RuntimeError::NotAList {
                name: name.to_string(),
                line,
            }
            .into()),
            None => Err(RuntimeError::UndefinedVariable {
                name: name.to_string(),
                line,
            }
            .into()),
        }
    }

    fn index_value(&mut self, expr: &Expr, line: usize) -> Result<i64> {
        match self.eval_value(expr)? {
            Value::Int(i) => Ok(i),
            Value::Double(d) => Ok(d.trunc() as i64),
            other => Err(RuntimeError::TypeMismatch {
                message: format!("list index must be a number, got {}", other.type_name()),
                line,
            }
            .into()),
        }
    }
}

/// Dispatches on the operator's category, mirroring the token
/// classification the parser used.
fn evaluate_binary(left: Value, operator: BinaryOp, right: Value, line: usize) -> Result<Value> {
    match operator.category() {
        OpCategory::Arithmetic => arithmetic(left, operator, right, line),
        OpCategory::Comparison => comparison(left, operator, right, line),
        OpCategory::Logical => logical(left, operator, right, line),
    }
}

fn arithmetic(left: Value, operator: BinaryOp, right: Value, line: usize) -> Result<Value> {
    if let Value::Str(prefix) = &left {
        if operator != BinaryOp::Add {
            return Err(RuntimeError::TypeMismatch {
                message: format!("string operands support only '+', not '{}'", operator.symbol()),
                line,
            }
            .into());
        }
        return match right {
            Value::Str(_) | Value::Int(_) | Value::Double(_) | Value::Bool(_) => {
                Ok(Value::Str(format!("{}{}", prefix, right)))
            }
            _ => Err(RuntimeError::TypeMismatch {
                message: format!("cannot concatenate {} to a string", right.type_name()),
                line,
            }
            .into()),
        };
    }

    let (Some(l), Some(r)) = (left.as_number(), right.as_number()) else {
        return Err(RuntimeError::TypeMismatch {
            message: format!(
                "unsupported operand types {} and {} for '{}'",
                left.type_name(),
                right.type_name(),
                operator.symbol()
            ),
            line,
        }
        .into());
    };

    let result = match operator {
        BinaryOp::Add => l + r,
        BinaryOp::Subtract => l - r,
        BinaryOp::Multiply => l * r,
        BinaryOp::Divide => {
            if r == 0.0 {
                return Err(RuntimeError::DivisionByZero { line }.into());
            }
            l / r
        }
        BinaryOp::Modulo => {
            if r == 0.0 {
                return Err(RuntimeError::DivisionByZero { line }.into());
            }
            l % r
        }
        _ => unreachable!("not an arithmetic operator"),
    };

    Ok(narrow(result))
}

/// Arithmetic runs in f64; a result with no fractional part collapses
/// back to an int. Load-bearing: `7 / 2` is `3.5` but `6 / 2` is `3`.
fn narrow(result: f64) -> Value {
    if result.fract() == 0.0 {
        Value::Int(result as i64)
    } else {
        Value::Double(result)
    }
}

fn comparison(left: Value, operator: BinaryOp, right: Value, line: usize) -> Result<Value> {
    if left.as_number().is_some() || right.as_number().is_some() {
        let (Some(l), Some(r)) = (left.as_number(), right.as_number()) else {
            return Err(RuntimeError::TypeMismatch {
                message: format!(
                    "cannot compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ),
                line,
            }
            .into());
        };
        let result = match operator {
            BinaryOp::Equal => l == r,
            BinaryOp::NotEqual => l != r,
            BinaryOp::Less => l < r,
            BinaryOp::LessEqual => l <= r,
            BinaryOp::Greater => l > r,
            BinaryOp::GreaterEqual => l >= r,
            _ => unreachable!("not a comparison operator"),
        };
        return Ok(Value::Bool(result));
    }

    match operator {
        BinaryOp::Equal => Ok(Value::Bool(left == right)),
        BinaryOp::NotEqual => Ok(Value::Bool(left != right)),
        _ => Err(RuntimeError::TypeMismatch {
            message: format!(
                "'{}' requires numeric operands, got {} and {}",
                operator.symbol(),
                left.type_name(),
                right.type_name()
            ),
            line,
        }
        .into()),
    }
}

/// Both operands are evaluated and coerced before the operator applies;
/// there is no short-circuiting.
fn logical(left: Value, operator: BinaryOp, right: Value, line: usize) -> Result<Value> {
    let l = coerce_bool(&left, line)?;
    let r = coerce_bool(&right, line)?;
    let result = match operator {
        BinaryOp::And => l && r,
        BinaryOp::Or => l || r,
        _ => unreachable!("not a logical operator"),
    };
    Ok(Value::Bool(result))
}

/// Booleans pass through; the string "true" counts as true and any
/// other string as false.
fn coerce_bool(value: &Value, line: usize) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Str(s) => Ok(s == "true"),
        other => Err(RuntimeError::TypeMismatch {
            message: format!("cannot use {} as a boolean", other.type_name()),
            line,
        }
        .into()),
    }
}

fn evaluate_unary(operator: UnaryOp, operand: Value, line: usize) -> Result<Value> {
    match (operator, operand) {
        (UnaryOp::Negate, Value::Int(n)) => Ok(Value::Int(-n)),
        (UnaryOp::Negate, Value::Double(d)) => Ok(Value::Double(-d)),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, operand) => Err(RuntimeError::TypeMismatch {
            message: format!("cannot negate {}", operand.type_name()),
            line,
        }
        .into()),
        (UnaryOp::Not, operand) => Err(RuntimeError::TypeMismatch {
            message: format!("'not' requires a boolean, got {}", operand.type_name()),
            line,
        }
        .into()),
    }
}

fn cast(target: TypeName, value: Value, line: usize) -> Result<Value> {
    let invalid = |value: &Value| RuntimeError::InvalidCast {
        found: value.type_name().to_string(),
        target: target.to_string(),
        line,
    };

    match target {
        TypeName::Int => match &value {
            Value::Int(_) => Ok(value),
            Value::Str(s) => s.parse::<i64>().map(Value::Int).map_err(|_| {
                RuntimeError::InvalidCast {
                    found: format!("string \"{}\"", s),
                    target: target.to_string(),
                    line,
                }
                .into()
            }),
            // Doubles never silently drop their fraction.
            _ => Err(invalid(&value).into()),
        },
        TypeName::Double => match &value {
            Value::Int(n) => Ok(Value::Double(*n as f64)),
            Value::Double(_) => Ok(value),
            Value::Str(s) => s.parse::<f64>().map(Value::Double).map_err(|_| {
                RuntimeError::InvalidCast {
                    found: format!("string \"{}\"", s),
                    target: target.to_string(),
                    line,
                }
                .into()
            }),
            _ => Err(invalid(&value).into()),
        },
        TypeName::Bool => match &value {
            Value::Bool(_) => Ok(value),
            _ => Err(invalid(&value).into()),
        },
        TypeName::Str => Ok(Value::Str(value.to_string())),
        TypeName::Void => unreachable!("void is not a cast target"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::parser::parse;
    use crate::tokenizer::tokenize;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.borrow().clone()).unwrap()
        }
    }

    fn interpreter() -> (Interpreter, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let interpreter = Interpreter::with_output(Box::new(buffer.clone()));
        (interpreter, buffer)
    }

    fn run_in(interpreter: &mut Interpreter, source: &str) -> Result<()> {
        let tokens = tokenize(source)?;
        let block = parse(&tokens)?;
        interpreter.execute(&block)
    }

    fn run(source: &str) -> Result<String> {
        let (mut interpreter, buffer) = interpreter();
        run_in(&mut interpreter, source)?;
        Ok(buffer.contents())
    }

    /// Runs a program expected to fail, returning the output produced
    /// before the failure along with the error.
    fn run_expect_err(source: &str) -> (String, RuntimeError) {
        let (mut interpreter, buffer) = interpreter();
        match run_in(&mut interpreter, source) {
            Err(Error::Runtime(err)) => (buffer.contents(), err),
            other => panic!("expected runtime error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_assignment_and_print() -> Result<()> {
        assert_eq!(run("x = 5\nprint(x)\n")?, "5\n");
        Ok(())
    }

    #[test]
    fn test_precedence_evaluates_to_seven() -> Result<()> {
        assert_eq!(run("print(1 + 2 * 3)\n")?, "7\n");
        Ok(())
    }

    #[test]
    fn test_while_counts_to_three() -> Result<()> {
        let out = run("i = 0\nwhile (i < 3) { print(i) i = i + 1 }\n")?;
        assert_eq!(out, "0\n1\n2\n");
        Ok(())
    }

    #[test]
    fn test_while_rechecks_condition_mid_block() -> Result<()> {
        // The condition turns false after the first statement, so the
        // print never runs even though it is still inside the body.
        let out = run("i = 0\nwhile (i < 1) { i = 5 print(i) }\n")?;
        assert_eq!(out, "");
        Ok(())
    }

    #[test]
    fn test_narrowing() -> Result<()> {
        assert_eq!(run("print(7 / 2)\n")?, "3.5\n");
        assert_eq!(run("print(6 / 2)\n")?, "3\n");
        assert_eq!(run("print(2.5 + 2.5)\n")?, "5\n");
        assert_eq!(run("print(7 % 2)\n")?, "1\n");
        assert_eq!(run("print(1 + 2.5)\n")?, "3.5\n");
        Ok(())
    }

    #[test]
    fn test_division_by_zero() {
        let (out, err) = run_expect_err("print(5 / 0)\n");
        assert_eq!(out, "");
        assert!(matches!(err, RuntimeError::DivisionByZero { line: 1 }));

        let (_, err) = run_expect_err("print(5 % 0)\n");
        assert!(matches!(err, RuntimeError::DivisionByZero { .. }));
    }

    #[test]
    fn test_string_concatenation() -> Result<()> {
        assert_eq!(run("print(\"a\" + 1)\n")?, "a1\n");
        assert_eq!(run("print(\"pi=\" + 3.5)\n")?, "pi=3.5\n");
        assert_eq!(run("print(\"b\" + true)\n")?, "btrue\n");

        let (_, err) = run_expect_err("print(1 + \"a\")\n");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        let (_, err) = run_expect_err("print(\"a\" - \"b\")\n");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_comparisons() -> Result<()> {
        assert_eq!(run("print(1 == 1.0)\n")?, "true\n");
        assert_eq!(run("print(2 < 1.5)\n")?, "false\n");
        assert_eq!(run("print(2 >= 2)\n")?, "true\n");
        assert_eq!(run("print(\"a\" == \"a\")\n")?, "true\n");
        assert_eq!(run("print(\"a\" != \"b\")\n")?, "true\n");
        // Mixed non-numeric operands are unequal, not an error.
        assert_eq!(run("print(\"a\" == true)\n")?, "false\n");

        // A numeric operand demands a numeric partner.
        let (_, err) = run_expect_err("print(\"a\" == 1)\n");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        let (_, err) = run_expect_err("print(\"a\" < \"b\")\n");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_logical_operators() -> Result<()> {
        assert_eq!(run("print(true and \"true\")\n")?, "true\n");
        assert_eq!(run("print(true and \"no\")\n")?, "false\n");
        assert_eq!(run("print(false or true)\n")?, "true\n");
        assert_eq!(run("print(true && false)\n")?, "false\n");
        assert_eq!(run("print(false || false)\n")?, "false\n");

        let (_, err) = run_expect_err("print(1 and true)\n");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_unary_operators() -> Result<()> {
        assert_eq!(run("print(-5)\n")?, "-5\n");
        assert_eq!(run("print(-2.5)\n")?, "-2.5\n");
        assert_eq!(run("print(!true)\n")?, "false\n");
        assert_eq!(run("print(not false)\n")?, "true\n");

        let (_, err) = run_expect_err("print(!1)\n");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        let (_, err) = run_expect_err("print(-\"x\")\n");
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
        Ok(())
    }

    #[test]
    fn test_if_else() -> Result<()> {
        let out = run("x = 2\nif (x == 1) {\nprint(\"one\")\n}\nelse {\nprint(\"other\")\n}\n")?;
        assert_eq!(out, "other\n");

        // Conditions coerce like logical operands.
        assert_eq!(run("if (\"true\") { print(1) }\n")?, "1\n");
        assert_eq!(run("if (\"nope\") { print(1) }\n")?, "");
        Ok(())
    }

    #[test]
    fn test_lists() -> Result<()> {
        let out = run(
            "nums = list:int()\nnums.append(1)\nnums.append(2)\nprint(nums)\nprint(nums.length())\nprint(nums[1])\nprint(nums.pop(0))\nprint(nums)\nnums.replace(0, 9)\nprint(nums)\n",
        )?;
        assert_eq!(out, "[1, 2]\n2\n2\n1\n[2]\n[9]\n");
        Ok(())
    }

    #[test]
    fn test_list_type_mismatch_leaves_list_unchanged() -> Result<()> {
        let (mut interpreter, buffer) = interpreter();
        run_in(&mut interpreter, "nums = list:int()\nnums.append(1)\n")?;

        let result = run_in(&mut interpreter, "nums.append(\"two\")\n");
        assert!(matches!(
            result,
            Err(Error::Runtime(RuntimeError::ListTypeMismatch { .. }))
        ));

        run_in(&mut interpreter, "print(nums.length())\n")?;
        assert_eq!(buffer.contents(), "1\n");
        Ok(())
    }

    #[test]
    fn test_list_errors() {
        let (_, err) = run_expect_err("nums = list:int()\nnums = list:int()\n");
        assert!(matches!(err, RuntimeError::ListRedeclaration { .. }));

        let (_, err) = run_expect_err("nums = list:int()\nprint(nums[0])\n");
        assert!(matches!(
            err,
            RuntimeError::IndexOutOfBounds { index: 0, len: 0, .. }
        ));

        let (_, err) = run_expect_err("nums = list:int()\nnums.pop(0 - 1)\n");
        assert!(matches!(err, RuntimeError::IndexOutOfBounds { .. }));

        let (_, err) = run_expect_err("x = 1\nx.append(2)\n");
        assert!(matches!(err, RuntimeError::NotAList { .. }));

        let (_, err) = run_expect_err("ghost.append(2)\n");
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
    }

    #[test]
    fn test_list_aliasing() -> Result<()> {
        // Assignment shares the list; mutation through one name is
        // visible through the other.
        let out = run("xs = list:int()\nys = xs\nys.append(7)\nprint(xs)\n")?;
        assert_eq!(out, "[7]\n");
        Ok(())
    }

    #[test]
    fn test_list_index_truncates_double() -> Result<()> {
        let out = run("xs = list:int()\nxs.append(5)\nprint(xs[0.9])\n")?;
        assert_eq!(out, "5\n");
        Ok(())
    }

    #[test]
    fn test_function_call() -> Result<()> {
        let out = run("func: int add(a: int, b: int) {\nreturn a + b\n}\nprint(add(2, 3))\n")?;
        assert_eq!(out, "5\n");
        Ok(())
    }

    #[test]
    fn test_arity_checked_before_body_runs() {
        let source =
            "func: int add(a: int, b: int) {\nprint(\"ran\")\nreturn a + b\n}\nadd(2)\n";
        let (out, err) = run_expect_err(source);
        assert_eq!(out, "");
        assert!(matches!(
            err,
            RuntimeError::ArityMismatch { expected: 2, found: 1, .. }
        ));
    }

    #[test]
    fn test_recursion() -> Result<()> {
        let source = "func: int fact(n: int) {\nif (n == 0) {\nreturn 1\n}\nreturn n * fact(n - 1)\n}\nprint(fact(5))\n";
        assert_eq!(run(source)?, "120\n");
        Ok(())
    }

    #[test]
    fn test_return_unwinds_nested_blocks() -> Result<()> {
        // The return fires inside an if inside a while; nothing after it
        // in the call may run.
        let source = "func: int first(limit: int) {\ni = 0\nwhile (i < limit) {\nif (i == 2) {\nreturn i\n}\ni = i + 1\n}\nreturn 0 - 1\n}\nprint(first(10))\n";
        assert_eq!(run(source)?, "2\n");
        Ok(())
    }

    #[test]
    fn test_function_falling_off_end_yields_none() -> Result<()> {
        let out = run("func: void greet(who: string) {\nprint(\"hi \" + who)\n}\nprint(greet(\"you\"))\n")?;
        assert_eq!(out, "hi you\nNone\n");
        Ok(())
    }

    #[test]
    fn test_function_errors() {
        let (_, err) = run_expect_err("missing(1)\n");
        assert!(matches!(err, RuntimeError::UndefinedFunction { .. }));

        let (_, err) = run_expect_err(
            "func: int f(a: int) {\nreturn a\n}\nfunc: int f(a: int) {\nreturn a\n}\n",
        );
        assert!(matches!(err, RuntimeError::FunctionRedefinition { .. }));

        let (_, err) = run_expect_err("func: int f(a: int) {\nreturn \"no\"\n}\nf(1)\n");
        assert!(matches!(err, RuntimeError::ReturnTypeMismatch { .. }));

        let (_, err) = run_expect_err("func: void f(a: int) {\nreturn a\n}\nf(1)\n");
        assert!(matches!(err, RuntimeError::VoidReturn { .. }));

        let (_, err) = run_expect_err("return 5\n");
        assert!(matches!(err, RuntimeError::ReturnOutsideFunction { line: 1 }));
    }

    #[test]
    fn test_scoping_rules() -> Result<()> {
        // Parameter writes stay in the frame; unbound writes land in the
        // global table and outlive the call.
        let source = "func: void f(a: int) {\na = 99\ng = a\n}\nf(1)\nprint(g)\n";
        assert_eq!(run(source)?, "99\n");

        let (_, err) = run_expect_err("func: void f(a: int) {\nx = 1\n}\nf(1)\nprint(a)\n");
        assert!(matches!(err, RuntimeError::UndefinedVariable { .. }));
        Ok(())
    }

    #[test]
    fn test_casts() -> Result<()> {
        assert_eq!(run("print(int(\"42\") + 1)\n")?, "43\n");
        assert_eq!(run("print(double(\"2.5\") + 1)\n")?, "3.5\n");
        assert_eq!(run("print(double(3))\n")?, "3\n");
        assert_eq!(run("print(string(5) + \"!\")\n")?, "5!\n");
        assert_eq!(run("print(bool(true))\n")?, "true\n");
        assert_eq!(run("print(string(false))\n")?, "false\n");

        // Doubles never cast to int, fractional or not.
        let (_, err) = run_expect_err("print(int(3.5))\n");
        assert!(matches!(err, RuntimeError::InvalidCast { .. }));
        let (_, err) = run_expect_err("print(int(4.0))\n");
        assert!(matches!(err, RuntimeError::InvalidCast { .. }));

        let (_, err) = run_expect_err("print(int(\"abc\"))\n");
        assert!(matches!(err, RuntimeError::InvalidCast { .. }));
        let (_, err) = run_expect_err("print(bool(1))\n");
        assert!(matches!(err, RuntimeError::InvalidCast { .. }));
        Ok(())
    }

    #[test]
    fn test_print_yields_its_value() -> Result<()> {
        assert_eq!(run("x = print(3)\nprint(x)\n")?, "3\n3\n");
        Ok(())
    }

    #[test]
    fn test_effects_before_error_remain() {
        let (out, err) = run_expect_err("print(1)\nprint(2 / 0)\nprint(3)\n");
        assert_eq!(out, "1\n");
        assert!(matches!(err, RuntimeError::DivisionByZero { line: 2 }));
    }

    #[test]
    fn test_undefined_variable() {
        let (_, err) = run_expect_err("print(ghost)\n");
        assert!(matches!(err, RuntimeError::UndefinedVariable { line: 1, .. }));
    }

    #[test]
    fn test_value_display() {
        assert_eq!(format!("{}", Value::Int(42)), "42");
        assert_eq!(format!("{}", Value::Double(2.5)), "2.5");
        assert_eq!(format!("{}", Value::Bool(true)), "true");
        assert_eq!(format!("{}", Value::Str("hello".to_string())), "hello");
        assert_eq!(format!("{}", Value::None), "None");

        let mut list = TypedVector::new(TypeName::Int);
        assert!(list.push(Value::Int(1)));
        assert!(list.push(Value::Int(2)));
        let value = Value::List(Rc::new(RefCell::new(list)));
        assert_eq!(format!("{}", value), "[1, 2]");
        assert_eq!(format!("{:?}", Value::Str("s".to_string())), "\"s\"");
    }

    #[test]
    fn test_typed_vector_rejects_mismatches() {
        let mut list = TypedVector::new(TypeName::Int);
        assert!(list.push(Value::Int(1)));
        assert!(!list.push(Value::Str("nope".to_string())));
        assert_eq!(list.len(), 1);

        assert!(!list.replace(0, Value::Bool(true)));
        assert!(list.replace(0, Value::Int(9)));
        assert_eq!(list.get(0), Some(Value::Int(9)));

        assert_eq!(list.pop(5), None);
        assert_eq!(list.pop(0), Some(Value::Int(9)));
        assert!(list.is_empty());
    }
}
