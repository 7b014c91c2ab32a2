use std::fmt;

/// Name given to the synthetic function wrapped around a bare top-level
/// expression. The backend treats a definition with this name as an
/// immediately evaluated entry point.
pub const ANON_FN_NAME: &str = "__anon_expr";

#[derive(Debug, PartialEq, Clone)]
pub enum Expr {
    Number(f64),
    Variable(String),
    Binary {
        op: char,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        callee: String,
        args: Vec<Expr>,
    },
}

/// A function's name and ordered parameter names, without a body. Used for
/// both `extern` declarations and `def` definitions. Parameter order is
/// positional; the parser does not reject duplicate names.
#[derive(Debug, PartialEq, Clone)]
pub struct Prototype {
    pub name: String,
    pub params: Vec<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct Function {
    pub proto: Prototype,
    pub body: Expr,
}

/// One top-level unit, the granularity at which the driver hands completed
/// trees to the backend.
#[derive(Debug, PartialEq, Clone)]
pub enum Item {
    Function(Function),
    Extern(Prototype),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op, rhs),
            Expr::Call { callee, args } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.params.join(" "))
    }
}
