//! Lexical splitting for the expression parser.

use tails_core::{CompileError, CompileResult, Pos, Span};

use crate::pratt::SymbolTable;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Number,
    Str,
    Identifier,
    Operator,
    End,
}

#[derive(Clone, Debug)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: String,
    /// Parsed value, for `Number` tokens.
    pub number: f64,
    /// Unescaped contents, for `Str` tokens.
    pub string: String,
    pub span: Span,
}

impl Token {
    fn end(span: Span) -> Token {
        Token {
            kind: TokenKind::End,
            text: String::new(),
            number: 0.0,
            string: String::new(),
            span,
        }
    }

    pub fn is_end(&self) -> bool {
        self.kind == TokenKind::End
    }
}

/// Splits source text into numbers, strings, identifiers, and operators.
///
/// Operators are matched against the registered symbols, longest first (up
/// to three characters), so multi-character operators like `<=` and `:=`
/// lex as single tokens. Identifiers may end in `:` (for `if:`, `else:`).
pub struct Tokenizer<'s> {
    src: &'s str,
    pos: usize,
    symbols: Option<&'static SymbolTable>,
    cur: Option<Token>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            symbols: None,
            cur: None,
        }
    }

    pub fn with_symbols(src: &'s str, symbols: &'static SymbolTable) -> Self {
        Self {
            src,
            pos: 0,
            symbols: Some(symbols),
            cur: None,
        }
    }

    pub fn peek(&mut self) -> CompileResult<&Token> {
        if self.cur.is_none() {
            let token = self.read_token()?;
            self.cur = Some(token);
        }
        match self.cur.as_ref() {
            Some(token) => Ok(token),
            None => Err(CompileError::new("tokenizer state corrupted")),
        }
    }

    pub fn next(&mut self) -> CompileResult<Token> {
        match self.cur.take() {
            Some(token) => Ok(token),
            None => self.read_token(),
        }
    }

    pub fn at_end(&mut self) -> CompileResult<bool> {
        Ok(self.peek()?.is_end())
    }

    /// Span of the next unread byte.
    pub fn here(&self) -> Span {
        Span::at(Pos::new(self.pos as u32))
    }

    /// Skips raw text up to and including `delim`, returning the text before
    /// it. Discards any peeked token.
    pub fn skip_through(&mut self, delim: char) -> Option<&'s str> {
        self.cur = None;
        let rest = &self.src[self.pos..];
        let index = rest.find(delim)?;
        let text = &rest[..index];
        self.pos += index + delim.len_utf8();
        Some(text)
    }

    fn remaining(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.remaining();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    fn read_token(&mut self) -> CompileResult<Token> {
        self.skip_whitespace();
        let start = self.pos;
        let rest = self.remaining();
        let Some(first) = rest.chars().next() else {
            return Ok(Token::end(self.here()));
        };

        if first == '"' {
            return self.read_string(start);
        }
        if first.is_ascii_digit()
            || (first == '-' && rest[1..].chars().next().is_some_and(|c| c.is_ascii_digit()))
        {
            return self.read_number(start);
        }
        if first.is_alphabetic() || first == '_' {
            let mut len = first.len_utf8();
            for c in rest[len..].chars() {
                if c.is_alphanumeric() || c == '_' {
                    len += c.len_utf8();
                } else {
                    break;
                }
            }
            // An identifier may end in ':' (if:, else:).
            if rest[len..].starts_with(':') {
                len += 1;
            }
            self.pos += len;
            return Ok(Token {
                kind: TokenKind::Identifier,
                text: rest[..len].to_string(),
                number: 0.0,
                string: String::new(),
                span: self.span_from(start),
            });
        }
        self.read_operator(start)
    }

    fn read_string(&mut self, start: usize) -> CompileResult<Token> {
        let rest = self.remaining();
        let mut contents = String::new();
        let mut chars = rest.char_indices().skip(1).peekable();
        while let Some((index, c)) = chars.next() {
            match c {
                '"' => {
                    self.pos += index + 1;
                    return Ok(Token {
                        kind: TokenKind::Str,
                        text: rest[..index + 1].to_string(),
                        number: 0.0,
                        string: contents,
                        span: self.span_from(start),
                    });
                }
                '\\' => match chars.next() {
                    Some((_, 'n')) => contents.push('\n'),
                    Some((_, 't')) => contents.push('\t'),
                    Some((_, escaped)) => contents.push(escaped),
                    None => break,
                },
                c => contents.push(c),
            }
        }
        Err(CompileError::at(
            "unclosed string literal",
            self.span_from(start),
        ))
    }

    fn read_number(&mut self, start: usize) -> CompileResult<Token> {
        let rest = self.remaining();
        let bytes = rest.as_bytes();
        let mut len = 0;
        if bytes[0] == b'-' {
            len += 1;
        }
        while len < bytes.len() && (bytes[len].is_ascii_digit() || bytes[len] == b'.') {
            len += 1;
        }
        if len < bytes.len() && (bytes[len] == b'e' || bytes[len] == b'E') {
            let mut exp = len + 1;
            if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
                exp += 1;
            }
            if exp < bytes.len() && bytes[exp].is_ascii_digit() {
                len = exp;
                while len < bytes.len() && bytes[len].is_ascii_digit() {
                    len += 1;
                }
            }
        }
        let text = &rest[..len];
        let number: f64 = text
            .parse()
            .map_err(|_| CompileError::at("invalid number", self.span_from(start)))?;
        if number.is_nan() || number.is_infinite() {
            return Err(CompileError::at("invalid number", self.span_from(start)));
        }
        self.pos += len;
        Ok(Token {
            kind: TokenKind::Number,
            text: text.to_string(),
            number,
            string: String::new(),
            span: self.span_from(start),
        })
    }

    // Longest registered symbol match, up to three characters.
    fn read_operator(&mut self, start: usize) -> CompileResult<Token> {
        let rest = self.remaining();
        let mut end = 0;
        let mut best = None;
        for (count, c) in rest.chars().take(3).enumerate() {
            end += c.len_utf8();
            match self.symbols {
                Some(symbols) => {
                    if symbols.has(&rest[..end]) {
                        best = Some(end);
                    }
                }
                // Without a symbol table, a single character is the token.
                None if count == 0 => best = Some(end),
                None => {}
            }
        }
        let Some(len) = best else {
            let c = rest.chars().next().map(String::from).unwrap_or_default();
            return Err(CompileError::at(
                format!("unknown token \"{}\"", c),
                self.span_from(start),
            ));
        };
        self.pos += len;
        Ok(Token {
            kind: TokenKind::Operator,
            text: rest[..len].to_string(),
            number: 0.0,
            string: String::new(),
            span: self.span_from(start),
        })
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(Pos::new(start as u32), Pos::new(self.pos as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::grammar;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut tokens = Tokenizer::with_symbols(src, grammar());
        let mut out = Vec::new();
        loop {
            let tok = tokens.next().unwrap();
            if tok.is_end() {
                return out;
            }
            out.push(tok.kind);
        }
    }

    #[test]
    fn numbers() {
        let mut t = Tokenizer::new("3 -4 2.5 1e3");
        assert_eq!(t.next().unwrap().number, 3.0);
        assert_eq!(t.next().unwrap().number, -4.0);
        assert_eq!(t.next().unwrap().number, 2.5);
        assert_eq!(t.next().unwrap().number, 1000.0);
        assert!(t.at_end().unwrap());
    }

    #[test]
    fn strings_and_escapes() {
        let mut t = Tokenizer::new(r#""hello" "a\"b" "x\ny""#);
        assert_eq!(t.next().unwrap().string, "hello");
        assert_eq!(t.next().unwrap().string, "a\"b");
        assert_eq!(t.next().unwrap().string, "x\ny");
    }

    #[test]
    fn unclosed_string() {
        let mut t = Tokenizer::new("\"oops");
        assert!(t.next().is_err());
    }

    #[test]
    fn identifiers_may_end_in_colon() {
        let mut t = Tokenizer::new("foo if: else: _bar2");
        assert_eq!(t.next().unwrap().text, "foo");
        assert_eq!(t.next().unwrap().text, "if:");
        assert_eq!(t.next().unwrap().text, "else:");
        assert_eq!(t.next().unwrap().text, "_bar2");
    }

    #[test]
    fn operators_match_longest() {
        let mut t = Tokenizer::with_symbols("<= < := ==", grammar());
        assert_eq!(t.next().unwrap().text, "<=");
        assert_eq!(t.next().unwrap().text, "<");
        assert_eq!(t.next().unwrap().text, ":=");
        assert_eq!(t.next().unwrap().text, "==");
    }

    #[test]
    fn mixed_expression() {
        assert_eq!(
            kinds("1 + foo * (2 - 3)"),
            [
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::Operator,
                TokenKind::Number,
                TokenKind::Operator,
            ]
        );
    }

    #[test]
    fn peek_does_not_consume() {
        let mut t = Tokenizer::new("42");
        assert_eq!(t.peek().unwrap().number, 42.0);
        assert_eq!(t.next().unwrap().number, 42.0);
        assert!(t.at_end().unwrap());
    }

    #[test]
    fn skip_through_returns_raw_text() {
        let mut t = Tokenizer::with_symbols("(a# b# -- #) rest", grammar());
        let open = t.next().unwrap();
        assert_eq!(open.text, "(");
        assert_eq!(t.skip_through(')').unwrap(), "a# b# -- #");
        assert_eq!(t.next().unwrap().text, "rest");
    }

    #[test]
    fn unknown_operator_fails() {
        let mut t = Tokenizer::with_symbols("§", grammar());
        assert!(t.next().is_err());
    }
}
