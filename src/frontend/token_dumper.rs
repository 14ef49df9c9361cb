use crate::frontend::lexer::Spanned;
use crate::frontend::token::Token;

pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints source text for each token
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";
    const BLU: &'static str = "\x1b[34m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Spanned]) {
        for s in tokens {
            println!("{}", self.render(s));
        }
    }

    fn render(&self, s: &Spanned) -> String {
        let kind = kind(&s.token);
        let colr = if self.color { color(&s.token) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        let shown = if self.show_debug_repr {
            format!("{:?}", s.token)
        } else {
            s.token.to_string()
        };

        format!(
            "[{:02}:{:02}] {}{:<8} {}{}",
            s.span.line, s.span.col, colr, kind, shown, reset
        )
    }
}

fn kind(t: &Token) -> &'static str {
    use Token::*;
    match t {
        Comment(_) => "COMMENT",
        Eof => "EOF",

        Integer(_) => "INT",
        String(_) => "STRING",
        Bool(_) => "BOOL",
        Ident(_) => "IDENT",

        Let | Fn | If | Else | Return => "KEYWORD",

        Assign | Plus | Minus | Bang | Star | Slash => "OP",
        Lt | Gt | Eq | NotEq => "CMP",

        LParen | RParen => "PAREN",
        LBrace | RBrace => "BRACE",
        LBracket | RBracket => "BRACKET",
        Comma | Semicolon | Colon => "PUNCT",
    }
}

fn color(t: &Token) -> &'static str {
    use Token::*;
    match t {
        Comment(_) | Eof => TokenDumper::DIM,
        String(_) => TokenDumper::GRN,
        Integer(_) | Bool(_) => TokenDumper::CYN,
        Ident(_) => TokenDumper::YEL,
        Let | Fn | If | Else | Return => TokenDumper::BLU,
        Assign | Plus | Minus | Bang | Star | Slash | Lt | Gt | Eq | NotEq => TokenDumper::MAG,
        _ => TokenDumper::RESET,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn lines(dumper: TokenDumper, source: &str) -> Vec<std::string::String> {
        Lexer::new(source)
            .tokenize()
            .unwrap()
            .iter()
            .map(|s| dumper.render(s))
            .collect()
    }

    #[test]
    fn test_plain_debug_output() {
        let out = lines(TokenDumper::new().no_color(), "let x = 5;");
        assert_eq!(out[0], "[01:01] KEYWORD  Let");
        assert_eq!(out[3], "[01:09] INT      Integer(5)");
        assert_eq!(out.last().unwrap(), "[01:11] EOF      Eof");
    }

    #[test]
    fn test_pretty_output_shows_source_text() {
        let out = lines(TokenDumper::new().no_color().pretty(), "a != \"b\"");
        assert_eq!(out[1], "[01:03] CMP      !=");
        assert_eq!(out[2], "[01:06] STRING   \"b\"");
    }

    #[test]
    fn test_colored_output_resets() {
        let out = lines(TokenDumper::new(), "fn");
        assert!(out[0].starts_with("[01:01] \x1b[34m"));
        assert!(out[0].ends_with("\x1b[0m"));
    }
}
