use crate::frontend::lexer::{Span, Spanned};
use crate::frontend::parser_error::ParserError;
use crate::frontend::token::Token;
use crate::lang::node::{Block, Expression, Program, Statement};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,      // == !=
    LessGreater, // < >
    Sum,         // + -
    Product,     // * /
    Prefix,      // -x !x
    Call,        // f(x)
    Index,       // a[i]
}

fn precedence_of(token: &Token) -> Precedence {
    match token {
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Lt | Token::Gt => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Star | Token::Slash => Precedence::Product,
        Token::LParen => Precedence::Call,
        Token::LBracket => Precedence::Index,
        _ => Precedence::Lowest,
    }
}

/// Pratt parser for Monkey.
///
/// Consumes lexed `Spanned` tokens and produces a `Program`. Statements are
/// `let`, `return`, and expression statements; a trailing `;` is optional
/// everywhere.
///
/// Comments are filtered out in `Parser::new`.
pub struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Span of the most recently consumed token, used to locate errors at
    /// end of input.
    last_span: Option<Span>,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        let tokens: Vec<Spanned> = tokens
            .into_iter()
            .filter(|t| !matches!(t.token, Token::Comment(_)))
            .collect();
        Parser {
            tokens,
            pos: 0,
            last_span: None,
        }
    }

    fn current(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    /// Consume and return the current token; `Eof` past the end.
    fn advance(&mut self) -> Token {
        match self.tokens.get(self.pos) {
            Some(s) => {
                self.last_span = Some(s.span.clone());
                self.pos += 1;
                s.token.clone()
            }
            None => Token::Eof,
        }
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    /// Constructs a `ParserError` at the current token, else at the last
    /// consumed one, else at 1:1 for empty input.
    fn error(&self, message: &str) -> ParserError {
        let (line, col) = match (self.current(), &self.last_span) {
            (Some(spanned), _) => (spanned.span.line, spanned.span.col),
            (None, Some(span)) => (span.line, span.col),
            (None, None) => (1, 1),
        };
        ParserError {
            message: message.to_string(),
            line,
            col,
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), ParserError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(self.error(&format!(
                "expected '{}', found '{}'",
                expected,
                self.peek()
            )))
        }
    }

    fn skip_semicolon(&mut self) {
        if matches!(self.peek(), Token::Semicolon) {
            self.advance();
        }
    }

    pub fn parse(&mut self) -> Result<Program, ParserError> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Statement, ParserError> {
        let statement = match self.peek() {
            Token::Let => self.parse_let()?,
            Token::Return => {
                self.advance();
                Statement::Return(self.parse_expression(Precedence::Lowest)?)
            }
            _ => Statement::Expression(self.parse_expression(Precedence::Lowest)?),
        };
        self.skip_semicolon();
        Ok(statement)
    }

    fn parse_let(&mut self) -> Result<Statement, ParserError> {
        self.advance(); // 'let'

        let name = match self.peek() {
            Token::Ident(name) => name.clone(),
            other => {
                return Err(self.error(&format!(
                    "expected identifier after 'let', found '{}'",
                    other
                )));
            }
        };
        self.advance();

        self.expect(Token::Assign)?;
        let value = self.parse_expression(Precedence::Lowest)?;
        Ok(Statement::Let { name, value })
    }

    fn parse_block(&mut self) -> Result<Block, ParserError> {
        self.expect(Token::LBrace)?;

        let mut statements = Vec::new();
        while !matches!(self.peek(), Token::RBrace | Token::Eof) {
            statements.push(self.parse_statement()?);
        }

        self.expect(Token::RBrace)?;
        Ok(Block { statements })
    }

    // Expressions

    fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression, ParserError> {
        let mut left = self.parse_prefix()?;

        while !matches!(self.peek(), Token::Semicolon) && precedence < precedence_of(self.peek())
        {
            left = self.parse_infix(left)?;
        }

        Ok(left)
    }

    fn parse_prefix(&mut self) -> Result<Expression, ParserError> {
        let start = self.error("");
        let token = self.advance();

        match token {
            Token::Ident(name) => Ok(Expression::Identifier(name)),
            Token::Integer(n) => Ok(Expression::Integer(n)),
            Token::String(s) => Ok(Expression::String(s)),
            Token::Bool(b) => Ok(Expression::Boolean(b)),

            Token::Bang | Token::Minus => {
                let right = self.parse_expression(Precedence::Prefix)?;
                Ok(Expression::prefix(&token.to_string(), right))
            }

            Token::LParen => {
                let expr = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::RParen)?;
                Ok(expr)
            }

            Token::If => self.parse_if(),
            Token::Fn => self.parse_function(),
            Token::LBracket => Ok(Expression::Array(self.parse_list(Token::RBracket)?)),
            Token::LBrace => self.parse_hash(),

            Token::Eof => Err(ParserError {
                message: "unexpected end of input".to_string(),
                ..start
            }),
            other => Err(ParserError {
                message: format!("unexpected '{}' at start of expression", other),
                ..start
            }),
        }
    }

    fn parse_infix(&mut self, left: Expression) -> Result<Expression, ParserError> {
        let token = self.advance();

        match token {
            Token::LParen => {
                let arguments = self.parse_list(Token::RParen)?;
                Ok(Expression::Call {
                    function: Box::new(left),
                    arguments,
                })
            }
            Token::LBracket => {
                let index = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::RBracket)?;
                Ok(Expression::Index {
                    left: Box::new(left),
                    index: Box::new(index),
                })
            }
            _ => {
                let right = self.parse_expression(precedence_of(&token))?;
                Ok(Expression::infix(left, &token.to_string(), right))
            }
        }
    }

    fn parse_if(&mut self) -> Result<Expression, ParserError> {
        self.expect(Token::LParen)?;
        let condition = self.parse_expression(Precedence::Lowest)?;
        self.expect(Token::RParen)?;

        let consequence = self.parse_block()?;

        let alternative = if matches!(self.peek(), Token::Else) {
            self.advance();
            Some(self.parse_block()?)
        } else {
            None
        };

        Ok(Expression::If {
            condition: Box::new(condition),
            consequence,
            alternative,
        })
    }

    fn parse_function(&mut self) -> Result<Expression, ParserError> {
        self.expect(Token::LParen)?;

        let mut parameters = Vec::new();
        if matches!(self.peek(), Token::RParen) {
            self.advance();
        } else {
            loop {
                match self.peek() {
                    Token::Ident(name) => {
                        parameters.push(name.clone());
                        self.advance();
                    }
                    other => {
                        return Err(
                            self.error(&format!("expected parameter name, found '{}'", other))
                        );
                    }
                }

                if matches!(self.peek(), Token::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
            self.expect(Token::RParen)?;
        }

        let body = self.parse_block()?;
        Ok(Expression::Function { parameters, body })
    }

    /// Comma-separated expressions up to `end`; the opening delimiter is
    /// already consumed.
    fn parse_list(&mut self, end: Token) -> Result<Vec<Expression>, ParserError> {
        let mut items = Vec::new();

        if *self.peek() == end {
            self.advance();
            return Ok(items);
        }

        items.push(self.parse_expression(Precedence::Lowest)?);
        while matches!(self.peek(), Token::Comma) {
            self.advance();
            items.push(self.parse_expression(Precedence::Lowest)?);
        }

        self.expect(end)?;
        Ok(items)
    }

    fn parse_hash(&mut self) -> Result<Expression, ParserError> {
        let mut pairs = Vec::new();

        while !matches!(self.peek(), Token::RBrace) {
            let key = self.parse_expression(Precedence::Lowest)?;
            self.expect(Token::Colon)?;
            let value = self.parse_expression(Precedence::Lowest)?;
            pairs.push((key, value));

            if !matches!(self.peek(), Token::RBrace) {
                self.expect(Token::Comma)?;
            }
        }

        self.expect(Token::RBrace)?;
        Ok(Expression::Hash(pairs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn parse(source: &str) -> Program {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap()
    }

    fn parse_error(source: &str) -> ParserError {
        let tokens = Lexer::new(source).tokenize().unwrap();
        Parser::new(tokens).parse().unwrap_err()
    }

    fn canonical(source: &str) -> String {
        parse(source).to_string()
    }

    fn int(n: i64) -> Expression {
        Expression::Integer(n)
    }

    #[test]
    fn test_let_statements() {
        let program = parse("let x = 5; let y = true; let foobar = y;");
        assert_eq!(
            program.statements,
            vec![
                Statement::Let {
                    name: "x".to_string(),
                    value: int(5),
                },
                Statement::Let {
                    name: "y".to_string(),
                    value: Expression::Boolean(true),
                },
                Statement::Let {
                    name: "foobar".to_string(),
                    value: Expression::ident("y"),
                },
            ]
        );
    }

    #[test]
    fn test_return_statements() {
        let program = parse("return 5; return x + y");
        assert_eq!(program.statements[0], Statement::Return(int(5)));
        assert_eq!(
            program.statements[1],
            Statement::Return(Expression::infix(
                Expression::ident("x"),
                "+",
                Expression::ident("y")
            ))
        );
    }

    #[test]
    fn test_operator_precedence() {
        let cases = [
            ("-a * b", "((-a) * b)"),
            ("!-a", "(!(-a))"),
            ("a + b + c", "((a + b) + c)"),
            ("a + b * c + d / e - f", "(((a + (b * c)) + (d / e)) - f)"),
            ("5 > 4 == 3 < 4", "((5 > 4) == (3 < 4))"),
            ("3 + 4 * 5 == 3 * 1 + 4 * 5", "((3 + (4 * 5)) == ((3 * 1) + (4 * 5)))"),
            ("1 + (2 + 3) + 4", "((1 + (2 + 3)) + 4)"),
            ("-(5 + 5)", "(-(5 + 5))"),
            ("!(true == true)", "(!(true == true))"),
            ("a + add(b * c) + d", "((a + add((b * c))) + d)"),
            ("add(a, b, 1, 2 * 3, 4 + 5, add(6, 7 * 8))", "add(a, b, 1, (2 * 3), (4 + 5), add(6, (7 * 8)))"),
            ("a * [1, 2, 3, 4][b * c] * d", "((a * ([1, 2, 3, 4][(b * c)])) * d)"),
            ("add(a * b[2], b[1], 2 * [1, 2][1])", "add((a * (b[2])), (b[1]), (2 * ([1, 2][1])))"),
        ];

        for (source, expected) in cases {
            assert_eq!(canonical(source), expected, "source: {}", source);
        }
    }

    #[test]
    fn test_if_expressions() {
        let program = parse("if (x < y) { x } else { y }");
        let Statement::Expression(Expression::If {
            condition,
            consequence,
            alternative,
        }) = &program.statements[0]
        else {
            panic!("expected if expression, got {:?}", program.statements[0]);
        };

        assert_eq!(condition.to_string(), "(x < y)");
        assert_eq!(consequence.statements.len(), 1);
        assert_eq!(alternative.as_ref().map(|b| b.statements.len()), Some(1));
    }

    #[test]
    fn test_function_literals() {
        for (source, params) in [
            ("fn() {};", vec![]),
            ("fn(x) {};", vec!["x"]),
            ("fn(x, y, z) { x + y; }", vec!["x", "y", "z"]),
        ] {
            match &parse(source).statements[0] {
                Statement::Expression(Expression::Function { parameters, .. }) => {
                    assert_eq!(parameters, &params, "source: {}", source);
                }
                other => panic!("expected function literal, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_call_expression() {
        assert_eq!(canonical("add(1, 2 * 3, 4 + 5);"), "add(1, (2 * 3), (4 + 5))");
        assert_eq!(canonical("fn(x) { x }(5)"), "fn(x) x(5)");
    }

    #[test]
    fn test_hash_literals() {
        let program = parse(r#"{"one": 1, "two": 2}"#);
        match &program.statements[0] {
            Statement::Expression(Expression::Hash(pairs)) => {
                assert_eq!(pairs.len(), 2);
                assert_eq!(pairs[0], (Expression::String("one".to_string()), int(1)));
            }
            other => panic!("expected hash literal, got {:?}", other),
        }

        assert_eq!(parse("{}").statements[0], Statement::Expression(Expression::Hash(vec![])));
    }

    #[test]
    fn test_comments_are_ignored() {
        assert_eq!(canonical("// leading\nlet a = 1; // trailing\na"), "let a = 1;a");
    }

    #[test]
    fn test_missing_let_name() {
        let err = parse_error("let = 5;");
        assert_eq!((err.line, err.col), (1, 5));
        assert!(err.message.contains("expected identifier"));
    }

    #[test]
    fn test_missing_closing_paren() {
        let err = parse_error("(1 + 2");
        assert!(err.message.contains("expected ')'"), "{}", err.message);
    }

    #[test]
    fn test_unexpected_token_location() {
        let err = parse_error("let x = 1;\nlet y = );");
        assert_eq!(err.to_string(), "2:9: unexpected ')' at start of expression");
    }

    #[test]
    fn test_unexpected_end_of_input() {
        let err = parse_error("1 +");
        assert_eq!(err.message, "unexpected end of input");
    }
}
