use std::collections::HashMap;
use std::fmt;

use crate::ast::{Expr, Function, Item, Prototype, ANON_FN_NAME};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum CodegenError {
    #[error("unknown variable referenced {0}")]
    UnknownVariable(String),
    #[error("unknown function referenced {0}")]
    UnknownFunction(String),
    #[error("invalid number of args in call {0} expected {1} found {2}")]
    InvalidCall(String, usize, usize),
    #[error("invalid binary operator {0}")]
    InvalidOperator(char),
}

/// What the backend hands back for one top-level unit: a number for an
/// evaluated expression, or the name it registered for a definition or
/// extern declaration.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    Number(f64),
    Defined(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(value) => write!(f, "{}", value),
            Value::Defined(name) => write!(f, "{}", name),
        }
    }
}

/// The capability the front end hands completed trees to. The parser and
/// driver never look past this boundary.
pub trait Generate {
    fn generate(&mut self, item: &Item) -> Result<Value, CodegenError>;
}

type Builtin = fn(&[f64]) -> f64;

/// Native routines an `extern` declaration may bind to, with their arity.
fn builtin(name: &str) -> Option<(usize, Builtin)> {
    Some(match name {
        "sin" => (1, |args| args[0].sin()),
        "cos" => (1, |args| args[0].cos()),
        "tan" => (1, |args| args[0].tan()),
        "sqrt" => (1, |args| args[0].sqrt()),
        "fabs" => (1, |args| args[0].abs()),
        "exp" => (1, |args| args[0].exp()),
        "log" => (1, |args| args[0].ln()),
        "floor" => (1, |args| args[0].floor()),
        "pow" => (2, |args| args[0].powf(args[1])),
        "atan2" => (2, |args| args[0].atan2(args[1])),
        _ => return None,
    })
}

/// Tree-walking backend over `f64` values. `def` registers a function,
/// `extern` binds a prototype to a native routine, and the anonymous
/// top-level definition is evaluated on the spot.
pub struct Interpreter {
    functions: HashMap<String, Function>,
    externs: HashMap<String, (usize, Builtin)>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            functions: HashMap::new(),
            externs: HashMap::new(),
        }
    }

    fn declare_extern(&mut self, proto: &Prototype) -> Result<Value, CodegenError> {
        let (arity, native) =
            builtin(&proto.name).ok_or_else(|| CodegenError::UnknownFunction(proto.name.clone()))?;
        if arity != proto.params.len() {
            return Err(CodegenError::InvalidCall(
                proto.name.clone(),
                arity,
                proto.params.len(),
            ));
        }
        self.externs.insert(proto.name.clone(), (arity, native));
        Ok(Value::Defined(proto.name.clone()))
    }

    fn call(&self, callee: &str, args: &[f64]) -> Result<f64, CodegenError> {
        if let Some(function) = self.functions.get(callee) {
            let params = &function.proto.params;
            if params.len() != args.len() {
                return Err(CodegenError::InvalidCall(
                    callee.to_string(),
                    params.len(),
                    args.len(),
                ));
            }
            // Positional binding; a duplicated parameter name shadows the
            // earlier occurrence.
            let scope: HashMap<String, f64> =
                params.iter().cloned().zip(args.iter().copied()).collect();
            self.eval(&function.body, &scope)
        } else if let Some((arity, native)) = self.externs.get(callee) {
            if *arity != args.len() {
                return Err(CodegenError::InvalidCall(
                    callee.to_string(),
                    *arity,
                    args.len(),
                ));
            }
            Ok(native(args))
        } else {
            Err(CodegenError::UnknownFunction(callee.to_string()))
        }
    }

    fn eval(&self, expr: &Expr, scope: &HashMap<String, f64>) -> Result<f64, CodegenError> {
        match expr {
            Expr::Number(value) => Ok(*value),
            Expr::Variable(name) => scope
                .get(name)
                .copied()
                .ok_or_else(|| CodegenError::UnknownVariable(name.clone())),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, scope)?;
                let rhs = self.eval(rhs, scope)?;
                match op {
                    '+' => Ok(lhs + rhs),
                    '-' => Ok(lhs - rhs),
                    '*' => Ok(lhs * rhs),
                    '/' => Ok(lhs / rhs),
                    // Comparison yields 1.0 or 0.0; everything is a double.
                    '<' => Ok(if lhs < rhs { 1.0 } else { 0.0 }),
                    _ => Err(CodegenError::InvalidOperator(*op)),
                }
            }
            Expr::Call { callee, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                self.call(callee, &values)
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Generate for Interpreter {
    fn generate(&mut self, item: &Item) -> Result<Value, CodegenError> {
        match item {
            Item::Extern(proto) => self.declare_extern(proto),
            Item::Function(function) => {
                if function.proto.name == ANON_FN_NAME {
                    let value = self.eval(&function.body, &HashMap::new())?;
                    Ok(Value::Number(value))
                } else {
                    let name = function.proto.name.clone();
                    self.functions.insert(name.clone(), function.clone());
                    Ok(Value::Defined(name))
                }
            }
        }
    }
}
