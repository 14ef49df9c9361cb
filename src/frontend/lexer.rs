use crate::frontend::token::Token;

#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexerError {
    pub message: String,
    pub line: usize,
    pub col: usize,
}

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.line, self.col, self.message)
    }
}

impl std::error::Error for LexerError {}

pub struct Lexer {
    source: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn span(&self) -> Span {
        Span {
            line: self.line,
            col: self.col,
        }
    }

    fn error(&self, message: String, span: &Span) -> LexerError {
        LexerError {
            message,
            line: span.line,
            col: span.col,
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// `// ...` up to the end of the line.
    fn read_comment(&mut self) -> Token {
        self.advance();
        self.advance();
        let mut comment = String::new();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            comment.push(ch);
            self.advance();
        }
        Token::Comment(comment.trim().to_string())
    }

    fn read_string(&mut self) -> Result<Token, LexerError> {
        let start = self.span();
        self.advance();

        let mut string = String::new();
        loop {
            match self.current() {
                Some('"') => {
                    self.advance();
                    return Ok(Token::String(string));
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => string.push('\n'),
                        Some('t') => string.push('\t'),
                        Some('r') => string.push('\r'),
                        Some('\\') => string.push('\\'),
                        Some('"') => string.push('"'),
                        Some(ch) => {
                            return Err(
                                self.error(format!("unknown escape sequence: \\{}", ch), &self.span())
                            );
                        }
                        None => {
                            return Err(self.error(
                                "unexpected EOF in escape sequence".to_string(),
                                &self.span(),
                            ));
                        }
                    }
                    self.advance();
                }
                Some(ch) => {
                    string.push(ch);
                    self.advance();
                }
                None => {
                    return Err(self.error("unterminated string literal".to_string(), &start));
                }
            }
        }
    }

    fn read_number(&mut self) -> Result<Token, LexerError> {
        let start = self.span();

        let mut digits = String::new();
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        let value: i64 = digits
            .parse()
            .map_err(|_| self.error(format!("integer literal out of range: {}", digits), &start))?;
        Ok(Token::Integer(value))
    }

    fn read_identifier(&mut self) -> Token {
        let mut ident = String::new();
        while let Some(ch) = self.current() {
            if ch.is_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        Token::keyword(&ident).unwrap_or(Token::Ident(ident))
    }

    fn read_operator(&mut self) -> Option<Token> {
        let ch = self.current()?;
        let next = self.peek();

        let (token, width) = match (ch, next) {
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::NotEq, 2),
            ('=', _) => (Token::Assign, 1),
            ('!', _) => (Token::Bang, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            (',', _) => (Token::Comma, 1),
            (';', _) => (Token::Semicolon, 1),
            (':', _) => (Token::Colon, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            _ => return None,
        };

        for _ in 0..width {
            self.advance();
        }
        Some(token)
    }

    pub fn tokenize(&mut self) -> Result<Vec<Spanned>, LexerError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let span = self.span();

            let token = match self.current() {
                None => {
                    tokens.push(Spanned {
                        token: Token::Eof,
                        span,
                    });
                    break;
                }
                Some('/') if self.peek() == Some('/') => self.read_comment(),
                Some('"') => self.read_string()?,
                Some(ch) if ch.is_ascii_digit() => self.read_number()?,
                Some(ch) if ch.is_alphabetic() || ch == '_' => self.read_identifier(),
                Some(ch) => match self.read_operator() {
                    Some(token) => token,
                    None => {
                        return Err(self.error(format!("unexpected character: '{}'", ch), &span));
                    }
                },
            };

            tokens.push(Spanned { token, span });
        }

        Ok(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .filter(|t| !matches!(t, Token::Eof))
            .collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(s.to_string())
    }

    #[test]
    fn test_let_statement() {
        assert_eq!(
            tokens("let five = 5;"),
            vec![
                Token::Let,
                ident("five"),
                Token::Assign,
                Token::Integer(5),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_function_literal() {
        assert_eq!(
            tokens("let add = fn(x, y) { x + y; };"),
            vec![
                Token::Let,
                ident("add"),
                Token::Assign,
                Token::Fn,
                Token::LParen,
                ident("x"),
                Token::Comma,
                ident("y"),
                Token::RParen,
                Token::LBrace,
                ident("x"),
                Token::Plus,
                ident("y"),
                Token::Semicolon,
                Token::RBrace,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            tokens("!-/*5; 5 < 10 > 5; 10 == 10; 10 != 9;"),
            vec![
                Token::Bang,
                Token::Minus,
                Token::Slash,
                Token::Star,
                Token::Integer(5),
                Token::Semicolon,
                Token::Integer(5),
                Token::Lt,
                Token::Integer(10),
                Token::Gt,
                Token::Integer(5),
                Token::Semicolon,
                Token::Integer(10),
                Token::Eq,
                Token::Integer(10),
                Token::Semicolon,
                Token::Integer(10),
                Token::NotEq,
                Token::Integer(9),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_keywords_and_booleans() {
        assert_eq!(
            tokens("if (5 < 10) { return true; } else { return false; }"),
            vec![
                Token::If,
                Token::LParen,
                Token::Integer(5),
                Token::Lt,
                Token::Integer(10),
                Token::RParen,
                Token::LBrace,
                Token::Return,
                Token::Bool(true),
                Token::Semicolon,
                Token::RBrace,
                Token::Else,
                Token::LBrace,
                Token::Return,
                Token::Bool(false),
                Token::Semicolon,
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_composite_literals() {
        assert_eq!(
            tokens(r#"[1, 2]; {"foo": "bar"}"#),
            vec![
                Token::LBracket,
                Token::Integer(1),
                Token::Comma,
                Token::Integer(2),
                Token::RBracket,
                Token::Semicolon,
                Token::LBrace,
                Token::String("foo".to_string()),
                Token::Colon,
                Token::String("bar".to_string()),
                Token::RBrace,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            tokens(r#""a\tb\n\"c\"""#),
            vec![Token::String("a\tb\n\"c\"".to_string())]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            tokens("1 // one\n2"),
            vec![
                Token::Integer(1),
                Token::Comment("one".to_string()),
                Token::Integer(2),
            ]
        );
        assert_eq!(tokens("4 / 2"), vec![Token::Integer(4), Token::Slash, Token::Integer(2)]);
    }

    #[test]
    fn test_spans() {
        let spanned = Lexer::new("let x\n  = 10;").tokenize().unwrap();
        assert_eq!(spanned[0].span, Span { line: 1, col: 1 });
        assert_eq!(spanned[1].span, Span { line: 1, col: 5 });
        assert_eq!(spanned[2].span, Span { line: 2, col: 3 });
        assert_eq!(spanned[3].span, Span { line: 2, col: 5 });
    }

    #[test]
    fn test_unterminated_string() {
        let err = Lexer::new("let s = \"abc").tokenize().unwrap_err();
        assert_eq!(err.message, "unterminated string literal");
        assert_eq!((err.line, err.col), (1, 9));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("1 @ 2").tokenize().unwrap_err();
        assert_eq!(err.to_string(), "1:3: unexpected character: '@'");
    }

    #[test]
    fn test_integer_out_of_range() {
        let err = Lexer::new("99999999999999999999").tokenize().unwrap_err();
        assert!(err.message.contains("out of range"));
    }
}
