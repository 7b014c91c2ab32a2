use std::collections::HashMap;

use crate::ast::{Expr, Function, Item, Prototype, ANON_FN_NAME};
use crate::lexer::{Keyword, LexError, Token, Tokenizer};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParseError {
    #[error("Unknown token when expecting an expression")]
    ExpectedExpression,
    #[error("Expected ')'")]
    ExpectedCloseParen,
    #[error("Expected ','")]
    ExpectedComma,
    #[error("Expected function name in prototype")]
    ExpectedPrototypeName,
    #[error("Expected '(' in prototype")]
    ExpectedPrototypeOpen,
    #[error("Expected ')' in prototype")]
    ExpectedPrototypeClose,
    #[error(transparent)]
    Lex(#[from] LexError),
}

/// Binary operator precedences, keyed by the raw operator character. Fixed
/// at parser construction; a character not present in the table is not a
/// binary operator.
#[derive(Debug, Clone)]
pub struct OpTable {
    precedence: HashMap<char, i32>,
}

impl Default for OpTable {
    fn default() -> Self {
        let mut precedence = HashMap::new();
        precedence.insert('<', 10);
        precedence.insert('+', 20);
        precedence.insert('-', 20);
        precedence.insert('*', 40);
        OpTable { precedence }
    }
}

impl OpTable {
    pub fn new(entries: impl IntoIterator<Item = (char, i32)>) -> Self {
        OpTable {
            precedence: entries.into_iter().collect(),
        }
    }

    fn get(&self, op: char) -> i32 {
        self.precedence.get(&op).copied().unwrap_or(-1)
    }
}

/// Recursive-descent parser with a single token of lookahead.
pub struct Parser<'src> {
    tokenizer: Tokenizer<'src>,
    current: Token,
    ops: OpTable,
}

impl<'src> Parser<'src> {
    pub fn new(source: &'src str, ops: OpTable) -> Result<Self, ParseError> {
        let mut tokenizer = Tokenizer::new(source);
        let current = tokenizer.next_token()?;
        Ok(Parser {
            tokenizer,
            current,
            ops,
        })
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn at_eof(&self) -> bool {
        self.current == Token::Eof
    }

    /// Advance the lookahead by one token. Public so the driver can perform
    /// the one-token skip after a syntax error; the parser itself never
    /// retries.
    pub fn advance(&mut self) -> Result<(), ParseError> {
        self.current = self.tokenizer.next_token()?;
        Ok(())
    }

    fn at_char(&self, c: char) -> bool {
        self.current == Token::Unknown(c)
    }

    /// Precedence of the current token, -1 if it is not a binary operator.
    fn current_precedence(&self) -> i32 {
        match self.current {
            Token::Unknown(op) => self.ops.get(op),
            _ => -1,
        }
    }

    /// primary ::= number | identifier_expr | '(' expression ')'
    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.current.clone() {
            Token::Number(value) => {
                self.advance()?; // eat the number
                Ok(Expr::Number(value))
            }
            Token::Ident(name) => self.parse_identifier(name),
            Token::Unknown('(') => self.parse_paren(),
            _ => Err(ParseError::ExpectedExpression),
        }
    }

    /// parenexpr ::= '(' expression ')'
    fn parse_paren(&mut self) -> Result<Expr, ParseError> {
        self.advance()?; // eat '('
        let expr = self.parse_expression()?;
        if !self.at_char(')') {
            return Err(ParseError::ExpectedCloseParen);
        }
        self.advance()?; // eat ')'
        Ok(expr)
    }

    /// identifier_expr ::= identifier | identifier '(' expression* ')'
    fn parse_identifier(&mut self, name: String) -> Result<Expr, ParseError> {
        self.advance()?; // eat the identifier

        if !self.at_char('(') {
            return Ok(Expr::Variable(name));
        }

        self.advance()?; // eat '('
        let mut args = Vec::new();
        if !self.at_char(')') {
            loop {
                args.push(self.parse_expression()?);

                if self.at_char(')') {
                    break;
                }
                if !self.at_char(',') {
                    return Err(ParseError::ExpectedComma);
                }
                self.advance()?; // eat ','
            }
        }
        self.advance()?; // eat ')'

        Ok(Expr::Call { callee: name, args })
    }

    /// binop_rhs ::= (<op> primary)*, precedence climbing.
    ///
    /// Operators below `min_precedence` are left for the caller. Equal
    /// precedence binds left; only a strictly tighter operator on the right
    /// claims the freshly parsed primary as its own lhs.
    fn parse_bin_op_rhs(&mut self, min_precedence: i32, mut lhs: Expr) -> Result<Expr, ParseError> {
        loop {
            let op = match self.current {
                Token::Unknown(op) if self.ops.get(op) >= min_precedence => op,
                _ => return Ok(lhs),
            };
            let precedence = self.ops.get(op);
            self.advance()?; // eat the operator

            let mut rhs = self.parse_primary()?;

            if precedence < self.current_precedence() {
                rhs = self.parse_bin_op_rhs(precedence + 1, rhs)?;
            }

            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    /// expression ::= primary binop_rhs
    pub fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.parse_primary()?;
        self.parse_bin_op_rhs(0, lhs)
    }

    /// prototype ::= identifier '(' identifier* ')'
    fn parse_prototype(&mut self) -> Result<Prototype, ParseError> {
        let name = match self.current.clone() {
            Token::Ident(name) => name,
            _ => return Err(ParseError::ExpectedPrototypeName),
        };
        self.advance()?; // eat the name

        if !self.at_char('(') {
            return Err(ParseError::ExpectedPrototypeOpen);
        }
        self.advance()?; // eat '('

        let mut params = Vec::new();
        while let Token::Ident(param) = &self.current {
            params.push(param.clone());
            self.advance()?;
        }

        if !self.at_char(')') {
            return Err(ParseError::ExpectedPrototypeClose);
        }
        self.advance()?; // eat ')'

        Ok(Prototype { name, params })
    }

    /// definition ::= 'def' prototype expression
    pub fn parse_definition(&mut self) -> Result<Function, ParseError> {
        self.advance()?; // eat 'def'
        let proto = self.parse_prototype()?;
        let body = self.parse_expression()?;
        Ok(Function { proto, body })
    }

    /// external ::= 'extern' prototype
    pub fn parse_extern(&mut self) -> Result<Prototype, ParseError> {
        self.advance()?; // eat 'extern'
        self.parse_prototype()
    }

    /// toplevelexpr ::= expression, wrapped as an anonymous nullary function.
    pub fn parse_top_level_expr(&mut self) -> Result<Function, ParseError> {
        let body = self.parse_expression()?;
        Ok(Function {
            proto: Prototype {
                name: ANON_FN_NAME.to_string(),
                params: Vec::new(),
            },
            body,
        })
    }
}

/// Parse every top-level unit in `source` with the default operator table,
/// stopping at the first error. The driver loop does its own per-unit
/// dispatch so it can recover; this is the convenience path for tests and
/// batch use.
pub fn parse(source: &str) -> Result<Vec<Item>, ParseError> {
    let mut parser = Parser::new(source, OpTable::default())?;
    let mut items = Vec::new();

    while !parser.at_eof() {
        match parser.current().clone() {
            Token::Unknown(';') => parser.advance()?,
            Token::Keyword(Keyword::Def) => items.push(Item::Function(parser.parse_definition()?)),
            Token::Keyword(Keyword::Extern) => items.push(Item::Extern(parser.parse_extern()?)),
            _ => items.push(Item::Function(parser.parse_top_level_expr()?)),
        }
    }

    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn binary(op: char, lhs: Expr, rhs: Expr) -> Expr {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    fn parse_expr(source: &str) -> Result<Expr, ParseError> {
        Parser::new(source, OpTable::default())?.parse_expression()
    }

    #[test]
    fn multiplication_binds_tighter() {
        let expr = parse_expr("1+2*3").unwrap();
        let target = binary(
            '+',
            Expr::Number(1.0),
            binary('*', Expr::Number(2.0), Expr::Number(3.0)),
        );
        assert_eq!(expr, target);
    }

    #[test]
    fn equal_precedence_groups_left() {
        let expr = parse_expr("1+2+3").unwrap();
        let target = binary(
            '+',
            binary('+', Expr::Number(1.0), Expr::Number(2.0)),
            Expr::Number(3.0),
        );
        assert_eq!(expr, target);
    }

    #[test]
    fn parens_override_precedence() {
        let expr = parse_expr("x + 1 * (2 - 3)").unwrap();
        let target = binary(
            '+',
            Expr::Variable("x".to_string()),
            binary(
                '*',
                Expr::Number(1.0),
                binary('-', Expr::Number(2.0), Expr::Number(3.0)),
            ),
        );
        assert_eq!(expr, target);
    }

    #[test]
    fn call_arguments_are_ordered() {
        let expr = parse_expr("foo(1, x, bar(2))").unwrap();
        let target = Expr::Call {
            callee: "foo".to_string(),
            args: vec![
                Expr::Number(1.0),
                Expr::Variable("x".to_string()),
                Expr::Call {
                    callee: "bar".to_string(),
                    args: vec![Expr::Number(2.0)],
                },
            ],
        };
        assert_eq!(expr, target);
    }

    #[test]
    fn call_without_arguments() {
        let expr = parse_expr("foo()").unwrap();
        assert_eq!(
            expr,
            Expr::Call {
                callee: "foo".to_string(),
                args: vec![],
            }
        );
    }

    #[test]
    fn call_missing_comma() {
        assert_eq!(parse_expr("foo(1 2)"), Err(ParseError::ExpectedComma));
    }

    #[test]
    fn unterminated_paren() {
        assert_eq!(parse_expr("(1+2"), Err(ParseError::ExpectedCloseParen));
    }

    #[test]
    fn non_starter_token_is_rejected() {
        assert_eq!(parse_expr(")"), Err(ParseError::ExpectedExpression));
    }

    // A failure while climbing into a tighter right-hand operator must
    // surface, not be dropped in favor of the pre-recursion state.
    #[test]
    fn nested_rhs_error_propagates() {
        assert_eq!(parse_expr("1+2*"), Err(ParseError::ExpectedExpression));
        assert_eq!(parse_expr("1+2*(3"), Err(ParseError::ExpectedCloseParen));
    }

    #[test]
    fn parses_definition() {
        let mut parser = Parser::new("def foo(x y) x+y", OpTable::default()).unwrap();
        let function = parser.parse_definition().unwrap();
        let target = Function {
            proto: Prototype {
                name: "foo".to_string(),
                params: vec!["x".to_string(), "y".to_string()],
            },
            body: binary(
                '+',
                Expr::Variable("x".to_string()),
                Expr::Variable("y".to_string()),
            ),
        };
        assert_eq!(function, target);
        assert!(parser.at_eof());
    }

    #[test]
    fn parses_extern_without_body() {
        let mut parser = Parser::new("extern sin(x)", OpTable::default()).unwrap();
        let proto = parser.parse_extern().unwrap();
        assert_eq!(
            proto,
            Prototype {
                name: "sin".to_string(),
                params: vec!["x".to_string()],
            }
        );
    }

    #[test]
    fn duplicate_parameters_are_not_rejected() {
        let mut parser = Parser::new("def f(x x) x", OpTable::default()).unwrap();
        let function = parser.parse_definition().unwrap();
        assert_eq!(function.proto.params, ["x", "x"]);
    }

    #[test]
    fn prototype_errors_name_the_construct() {
        let mut parser = Parser::new("def (x) x", OpTable::default()).unwrap();
        assert_eq!(
            parser.parse_definition(),
            Err(ParseError::ExpectedPrototypeName)
        );

        let mut parser = Parser::new("def f x", OpTable::default()).unwrap();
        assert_eq!(
            parser.parse_definition(),
            Err(ParseError::ExpectedPrototypeOpen)
        );

        let mut parser = Parser::new("def f(x + y) x", OpTable::default()).unwrap();
        assert_eq!(
            parser.parse_definition(),
            Err(ParseError::ExpectedPrototypeClose)
        );
    }

    #[test]
    fn top_level_expr_wraps_in_anonymous_function() {
        let mut parser = Parser::new("4*4", OpTable::default()).unwrap();
        let function = parser.parse_top_level_expr().unwrap();
        let target = Function {
            proto: Prototype {
                name: ANON_FN_NAME.to_string(),
                params: vec![],
            },
            body: binary('*', Expr::Number(4.0), Expr::Number(4.0)),
        };
        assert_eq!(function, target);
    }

    // The driver protocol: after a syntax error, skipping exactly one token
    // leaves the parser on a clean lookahead for the next unit.
    #[test]
    fn one_token_skip_recovers() {
        let mut parser = Parser::new("(1+2 ; extern sin(x)", OpTable::default()).unwrap();
        assert_eq!(
            parser.parse_top_level_expr(),
            Err(ParseError::ExpectedCloseParen)
        );
        parser.advance().unwrap();
        let proto = parser.parse_extern().unwrap();
        assert_eq!(proto.name, "sin");
        assert!(parser.at_eof());
    }

    #[test]
    fn custom_operator_table() {
        let ops = OpTable::new(vec![('%', 30), ('+', 20)]);
        let expr = Parser::new("1+2%3", ops).unwrap().parse_expression().unwrap();
        let target = binary(
            '+',
            Expr::Number(1.0),
            binary('%', Expr::Number(2.0), Expr::Number(3.0)),
        );
        assert_eq!(expr, target);
    }

    #[test]
    fn absent_operator_ends_the_expression() {
        // '/' is not in the default table, so it is not a binary operator.
        let mut parser = Parser::new("1/2", OpTable::default()).unwrap();
        assert_eq!(parser.parse_expression(), Ok(Expr::Number(1.0)));
        assert_eq!(parser.current(), &Token::Unknown('/'));
    }

    #[test]
    fn parse_collects_all_units() {
        let items = parse("extern sin(x); def f(x) sin(x) * x; f(1)").unwrap();
        assert_eq!(items.len(), 3);
        assert!(matches!(items[0], Item::Extern(_)));
        assert!(matches!(items[1], Item::Function(_)));
        match &items[2] {
            Item::Function(function) => assert_eq!(function.proto.name, ANON_FN_NAME),
            item => panic!("expected anonymous function, got {:?}", item),
        }
    }
}
