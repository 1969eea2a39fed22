//! Lexer (tokenizer) for the circuit DSL.

use crate::error::{NetforgeError, Result};
use crate::units;

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The kind of token
    pub kind: TokenKind,
    /// The token's text. For unit tokens this is the base unit name with
    /// the prefix stripped ("ohm" for `kohm`), or empty for a bare prefix.
    pub text: String,
    /// SI prefix multiplier for unit tokens, 1.0 otherwise
    pub scale: f64,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

impl Token {
    fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            scale: 1.0,
            line,
            column,
        }
    }
}

/// Token kinds. A closed set: the parser matches on these exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// A component-type keyword (Resistor, VoltageSource, ...)
    Component,
    /// The `Connect` keyword
    Connect,
    /// The `Subcircuit` keyword
    Subcircuit,
    /// The `Simulate` keyword (or its `analysis` alias)
    Simulate,
    /// The `Macro` keyword
    Macro,
    /// The `For` keyword
    For,
    /// The `Import` keyword
    Import,
    /// A directive keyword (dc, ac, transient, noise, paramSweep, ...)
    Keyword,
    /// A unit, possibly magnitude-prefixed (`ohm`, `kohm`, `uF`)
    Unit,
    /// A numeric literal
    Number,
    /// A double-quoted string literal
    Str,
    /// An identifier
    Identifier,
    /// An operator (`+`, `==`, `||`, ...)
    Operator,
    /// A structural symbol (`;`, `,`, `.`, parens, braces, brackets)
    Symbol,
    /// End of input sentinel
    Eof,
}

const DIRECTIVE_KEYWORDS: &[&str] = &[
    "dc",
    "ac",
    "transient",
    "noise",
    "paramSweep",
    "monteCarlo",
    "plot",
];

/// Tokenize an entire source text. The result always ends with an EOF
/// sentinel; any unrecognized character is a fatal error.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Lexer::new(source);
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

/// Lexer for tokenizing circuit DSL input.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    /// Set when the previous token was a number with an alphabetic
    /// character immediately following it; enables bare-prefix units.
    after_number: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            line: 1,
            column: 1,
            after_number: false,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        let adjacent = self.after_number;
        self.after_number = false;
        self.skip_whitespace_and_comments()?;

        let ch = match self.chars.peek() {
            Some(&(_, ch)) => ch,
            None => {
                return Ok(Token::new(TokenKind::Eof, "", self.line, self.column));
            }
        };

        let start_line = self.line;
        let start_column = self.column;

        if ch.is_ascii_digit() {
            let text = self.read_number(start_line, start_column)?;
            if let Some(&(_, next)) = self.chars.peek() {
                if next.is_alphabetic() {
                    self.after_number = true;
                }
            }
            return Ok(Token::new(TokenKind::Number, text, start_line, start_column));
        }

        if ch.is_alphabetic() || ch == '_' {
            let text = self.read_identifier();
            return Ok(self.classify_word(text, adjacent, start_line, start_column));
        }

        match ch {
            '"' => {
                let text = self.read_string(start_line, start_column)?;
                Ok(Token::new(TokenKind::Str, text, start_line, start_column))
            }
            ';' | ',' | '.' | '(' | ')' | '{' | '}' | '[' | ']' => {
                self.advance();
                Ok(Token::new(
                    TokenKind::Symbol,
                    ch.to_string(),
                    start_line,
                    start_column,
                ))
            }
            '=' | '!' | '<' | '>' | '&' | '|' | '+' | '-' | '*' | '/' | '%' | '^' => {
                let text = self.read_operator(start_line, start_column)?;
                Ok(Token::new(TokenKind::Operator, text, start_line, start_column))
            }
            _ => Err(NetforgeError::lexer(
                start_line,
                start_column,
                format!("unexpected character '{}'", ch),
            )),
        }
    }

    fn advance(&mut self) -> Option<char> {
        if let Some((_, ch)) = self.chars.next() {
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            Some(ch)
        } else {
            None
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            match self.chars.peek() {
                Some(&(_, ch)) if ch.is_whitespace() => {
                    self.advance();
                }
                Some(&(_, '/')) => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    match lookahead.peek() {
                        Some(&(_, '/')) => {
                            while let Some(&(_, c)) = self.chars.peek() {
                                if c == '\n' {
                                    break;
                                }
                                self.advance();
                            }
                        }
                        Some(&(_, '*')) => {
                            let line = self.line;
                            let column = self.column;
                            self.advance();
                            self.advance();
                            self.skip_block_comment(line, column)?;
                        }
                        _ => return Ok(()),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn skip_block_comment(&mut self, line: usize, column: usize) -> Result<()> {
        // Block comments do not nest.
        loop {
            match self.advance() {
                Some('*') => {
                    if let Some(&(_, '/')) = self.chars.peek() {
                        self.advance();
                        return Ok(());
                    }
                }
                Some(_) => {}
                None => {
                    return Err(NetforgeError::lexer(line, column, "unterminated block comment"));
                }
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut text = String::new();
        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        text
    }

    fn read_number(&mut self, line: usize, column: usize) -> Result<String> {
        let mut text = String::new();

        while let Some(&(_, ch)) = self.chars.peek() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Decimal part
        if let Some(&(_, '.')) = self.chars.peek() {
            let mut lookahead = self.chars.clone();
            lookahead.next();
            if matches!(lookahead.peek(), Some(&(_, d)) if d.is_ascii_digit()) {
                text.push('.');
                self.advance();
                while let Some(&(_, ch)) = self.chars.peek() {
                    if ch.is_ascii_digit() {
                        text.push(ch);
                        self.advance();
                    } else {
                        break;
                    }
                }
            }
        }

        // Exponent part
        if let Some(&(_, ch)) = self.chars.peek() {
            if ch == 'e' || ch == 'E' {
                let mut lookahead = self.chars.clone();
                lookahead.next();
                let signed = matches!(lookahead.peek(), Some(&(_, s)) if s == '+' || s == '-');
                if signed {
                    lookahead.next();
                }
                if matches!(lookahead.peek(), Some(&(_, d)) if d.is_ascii_digit()) {
                    text.push(ch);
                    self.advance();
                    if signed {
                        if let Some(sign) = self.advance() {
                            text.push(sign);
                        }
                    }
                    while let Some(&(_, d)) = self.chars.peek() {
                        if d.is_ascii_digit() {
                            text.push(d);
                            self.advance();
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        if text.parse::<f64>().is_err() {
            return Err(NetforgeError::lexer(
                line,
                column,
                format!("malformed number '{}'", text),
            ));
        }
        Ok(text)
    }

    fn read_string(&mut self, line: usize, column: usize) -> Result<String> {
        self.advance(); // opening quote
        let mut text = String::new();
        loop {
            match self.advance() {
                Some('"') => return Ok(text),
                Some('\\') => match self.advance() {
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some('n') => text.push('\n'),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => {
                        return Err(NetforgeError::lexer(line, column, "unterminated string literal"));
                    }
                },
                Some(ch) => text.push(ch),
                None => {
                    return Err(NetforgeError::lexer(line, column, "unterminated string literal"));
                }
            }
        }
    }

    fn read_operator(&mut self, line: usize, column: usize) -> Result<String> {
        let first = self.advance().unwrap_or_default();
        let second = self.chars.peek().map(|&(_, c)| c);
        let two = |lexer: &mut Self, a: char, b: char| -> String {
            lexer.advance();
            let mut s = String::with_capacity(2);
            s.push(a);
            s.push(b);
            s
        };
        let text = match (first, second) {
            ('=', Some('=')) => two(self, '=', '='),
            ('!', Some('=')) => two(self, '!', '='),
            ('<', Some('=')) => two(self, '<', '='),
            ('>', Some('=')) => two(self, '>', '='),
            ('&', Some('&')) => two(self, '&', '&'),
            ('|', Some('|')) => two(self, '|', '|'),
            ('&', _) => {
                return Err(NetforgeError::lexer(line, column, "stray '&' (did you mean '&&'?)"));
            }
            (op, _) => op.to_string(),
        };
        Ok(text)
    }

    /// Classify an alphabetic word. Keyword tables are consulted before
    /// falling through to the generic identifier rule so that component
    /// and structural keywords are never swallowed by it.
    fn classify_word(&mut self, text: String, after_number: bool, line: usize, column: usize) -> Token {
        use crate::dsl::ast::ComponentType;

        if ComponentType::from_keyword(&text).is_some() {
            return Token::new(TokenKind::Component, text, line, column);
        }
        let kind = match text.as_str() {
            "Connect" => Some(TokenKind::Connect),
            "Subcircuit" => Some(TokenKind::Subcircuit),
            "Simulate" | "analysis" => Some(TokenKind::Simulate),
            "Macro" => Some(TokenKind::Macro),
            "For" => Some(TokenKind::For),
            "Import" => Some(TokenKind::Import),
            _ => None,
        };
        if let Some(kind) = kind {
            return Token::new(kind, text, line, column);
        }
        if DIRECTIVE_KEYWORDS.contains(&text.as_str()) {
            return Token::new(TokenKind::Keyword, text, line, column);
        }
        if let Some((scale, base)) = units::split_unit(&text, after_number) {
            let mut token = Token::new(TokenKind::Unit, base.unwrap_or_default(), line, column);
            token.scale = scale;
            return token;
        }
        Token::new(TokenKind::Identifier, text, line, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_component_declaration() {
        let tokens = tokenize("Resistor R1(1000 ohm);").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Component);
        assert_eq!(tokens[0].text, "Resistor");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "R1");
        assert_eq!(tokens[3].kind, TokenKind::Number);
        assert_eq!(tokens[4].kind, TokenKind::Unit);
        assert_eq!(tokens[4].text, "ohm");
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_number_unit_split() {
        // "1k" with no whitespace splits into a number and a bare-prefix
        // unit carrying the magnitude.
        let tokens = tokenize("1k ohm").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "1");
        assert_eq!(tokens[1].kind, TokenKind::Unit);
        assert_eq!(tokens[1].scale, 1e3);
        assert_eq!(tokens[2].kind, TokenKind::Unit);
        assert_eq!(tokens[2].text, "ohm");
        assert_eq!(tokens[2].scale, 1.0);
    }

    #[test]
    fn test_prefixed_unit_word() {
        let tokens = tokenize("4.7 uF").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "4.7");
        assert_eq!(tokens[1].kind, TokenKind::Unit);
        assert_eq!(tokens[1].text, "F");
        assert_eq!(tokens[1].scale, 1e-6);
    }

    #[test]
    fn test_lone_prefix_letter_is_identifier_when_separated() {
        // "m" only acts as a magnitude immediately after a number.
        let tokens = tokenize("For m in range(3)").unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].text, "m");
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = tokenize("// heading\nResistor /* inline */ R1;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Component);
        assert_eq!(tokens[1].text, "R1");
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("a == b && c || d | e"),
            vec![
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Operator,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_scientific_number() {
        let tokens = tokenize("1e-6").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].text, "1e-6");
    }

    #[test]
    fn test_unexpected_character_is_fatal() {
        let err = tokenize("Resistor R1 @").unwrap_err();
        match err {
            NetforgeError::LexerError { line, column, .. } => {
                assert_eq!(line, 1);
                assert_eq!(column, 13);
            }
            other => panic!("expected lexer error, got {:?}", other),
        }
    }

    #[test]
    fn test_location_tracking() {
        let tokens = tokenize("Resistor R1;\nConnect(a, b);").unwrap();
        let connect = tokens.iter().find(|t| t.kind == TokenKind::Connect).unwrap();
        assert_eq!(connect.line, 2);
        assert_eq!(connect.column, 1);
    }

    #[test]
    fn test_analysis_alias() {
        let tokens = tokenize("analysis main { dc; }").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Simulate);
        assert_eq!(tokens[2].kind, TokenKind::Symbol);
        assert_eq!(tokens[3].kind, TokenKind::Keyword);
        assert_eq!(tokens[3].text, "dc");
    }

    #[test]
    fn test_deterministic() {
        let source = "Resistor R1(1k ohm); Connect(R1.positive, ground);";
        assert_eq!(tokenize(source).unwrap(), tokenize(source).unwrap());
    }
}
