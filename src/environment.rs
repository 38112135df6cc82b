use crate::parser::TypeName;
use crate::runtime::Value;
use std::collections::HashMap;

/// The activation record for one function call: its locals plus the
/// callee's declared return type for the runtime return check.
#[derive(Debug)]
pub struct FunctionContext {
    function: String,
    return_type: TypeName,
    locals: HashMap<String, Value>,
}

impl FunctionContext {
    pub fn new(function: String, return_type: TypeName) -> Self {
        FunctionContext {
            function,
            return_type,
            locals: HashMap::new(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn return_type(&self) -> TypeName {
        self.return_type
    }

    pub fn define(&mut self, name: String, value: Value) {
        self.locals.insert(name, value);
    }
}

/// Two storage tiers: one global table plus a stack of call frames.
/// Only the innermost frame is consulted before falling back to the
/// globals; frames do not chain into each other.
#[derive(Debug, Default)]
pub struct Environment {
    globals: HashMap<String, Value>,
    frames: Vec<FunctionContext>,
}

impl Environment {
    pub fn new() -> Self {
        Environment::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        if let Some(frame) = self.frames.last() {
            if let Some(value) = frame.locals.get(name) {
                return Some(value);
            }
        }
        self.globals.get(name)
    }

    /// Writes hit the tier a read would have found the name in: the
    /// innermost frame when it already holds the binding, otherwise the
    /// global table (creating the binding there if absent).
    pub fn set(&mut self, name: String, value: Value) {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(slot) = frame.locals.get_mut(&name) {
                *slot = value;
                return;
            }
        }
        self.globals.insert(name, value);
    }

    pub fn push_frame(&mut self, frame: FunctionContext) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<FunctionContext> {
        self.frames.pop()
    }

    pub fn current_frame(&self) -> Option<&FunctionContext> {
        self.frames.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_reads_and_writes() {
        let mut env = Environment::new();
        env.set("x".to_string(), Value::Int(1));
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
        assert_eq!(env.get("y"), None);

        env.set("x".to_string(), Value::Int(2));
        assert_eq!(env.get("x"), Some(&Value::Int(2)));
    }

    #[test]
    fn test_frame_shadows_global() {
        let mut env = Environment::new();
        env.set("x".to_string(), Value::Int(1));

        let mut frame = FunctionContext::new("f".to_string(), TypeName::Void);
        frame.define("x".to_string(), Value::Int(10));
        env.push_frame(frame);

        assert_eq!(env.get("x"), Some(&Value::Int(10)));

        // Writing a frame-bound name updates the frame, not the global.
        env.set("x".to_string(), Value::Int(11));
        assert_eq!(env.get("x"), Some(&Value::Int(11)));

        env.pop_frame();
        assert_eq!(env.get("x"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_unbound_write_in_frame_goes_global() {
        let mut env = Environment::new();
        env.push_frame(FunctionContext::new("f".to_string(), TypeName::Void));

        env.set("g".to_string(), Value::Int(7));
        env.pop_frame();

        assert_eq!(env.get("g"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_only_innermost_frame_is_consulted() {
        let mut env = Environment::new();

        let mut outer = FunctionContext::new("outer".to_string(), TypeName::Void);
        outer.define("a".to_string(), Value::Int(1));
        env.push_frame(outer);
        env.push_frame(FunctionContext::new("inner".to_string(), TypeName::Void));

        // 'a' lives in the outer frame, which is not visible here.
        assert_eq!(env.get("a"), None);
    }
}
