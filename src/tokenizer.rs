use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

/// Position of a token in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn new(line: usize, column: usize, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// All token kinds MovaScript can emit.
///
/// Both keyword surfaces (English and Ukrainian) collapse onto the same
/// kind; the original spelling survives only in the token's lexeme.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Integer(i64),
    Float(f64),
    Str(String),
    Boolean(bool),

    Identifier(String),

    // Bindings
    Let,
    Var,
    Const,

    // Functions
    Fun,
    Return,

    // Control flow
    If,
    Else,
    Match,
    While,
    For,
    In,
    Break,
    Continue,

    // OOP
    Class,
    Trait,
    Data,
    Impl,
    SelfKw,
    New,

    // Type words (parsed, discarded by the compiler)
    TypeInt,
    TypeFloat,
    TypeString,
    TypeBool,
    TypeList,
    TypeMap,
    TypeOption,
    TypeResult,

    // Async surface (reserved)
    Async,
    Await,
    Spawn,

    None,
    Some,
    Print,

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Power,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Not,
    Assign,
    PlusAssign,
    MinusAssign,
    Arrow,
    FatArrow,
    Pipe,
    Range,
    DoubleColon,

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Semicolon,
    Underscore,

    // Meta
    Newline,
    Eof,
    Invalid,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Integer(n) => write!(f, "{}", n),
            TokenKind::Float(n) => write!(f, "{}", n),
            TokenKind::Str(s) => write!(f, "\"{}\"", s),
            TokenKind::Boolean(b) => write!(f, "{}", b),
            TokenKind::Identifier(s) => write!(f, "{}", s),
            other => write!(f, "{:?}", other),
        }
    }
}

/// A token with its kind and source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: Position,
}

impl Token {
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }
}

/// Fatal lexical error: unterminated literal or an invalid character.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at {line}:{column}")]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl LexError {
    fn new(message: impl Into<String>, position: &Position) -> Self {
        Self {
            message: message.into(),
            line: position.line,
            column: position.column,
        }
    }
}

/// Tokenizer for MovaScript source text.
pub struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    keywords: HashMap<&'static str, TokenKind>,
    tokens: Vec<Token>,
}

impl Tokenizer {
    pub fn new(input: &str) -> Self {
        let mut keywords = HashMap::new();
        for (word, kind) in keyword_table() {
            keywords.insert(word, kind);
        }
        Self {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            keywords,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        while !self.is_at_end() {
            let ch = self.current_char();

            if ch == '\n' {
                self.advance();
                continue;
            }
            if ch.is_whitespace() {
                self.advance();
                continue;
            }
            if ch == '/' && self.peek_char() == Some('/') {
                self.skip_line_comment();
                continue;
            }
            if ch == '/' && self.peek_char() == Some('*') {
                self.skip_block_comment()?;
                continue;
            }
            if ch == '"' || ch == '\'' {
                self.handle_string(ch)?;
                continue;
            }
            if ch.is_ascii_digit() {
                self.handle_number()?;
                continue;
            }
            if is_identifier_start(ch) {
                self.handle_identifier();
                continue;
            }
            self.handle_operator_or_delimiter()?;
        }

        self.tokens
            .push(Token::new(TokenKind::Eof, self.current_position()));
        Ok(std::mem::take(&mut self.tokens))
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn current_char(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.input[self.position]
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> char {
        let ch = self.current_char();
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        ch
    }

    /// True and consumed when the next character equals `expected`.
    fn match_char(&mut self, expected: char) -> bool {
        if self.current_char() == expected && !self.is_at_end() {
            self.advance();
            true
        } else {
            false
        }
    }

    fn current_position(&self) -> Position {
        Position::new(self.line, self.column, self.position)
    }

    fn emit(&mut self, kind: TokenKind, position: Position) {
        self.tokens.push(Token::new(kind, position));
    }

    fn skip_line_comment(&mut self) {
        while !self.is_at_end() && self.current_char() != '\n' {
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.current_position();
        self.advance(); // '/'
        self.advance(); // '*'
        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                return Err(LexError::new("unterminated block comment", &start));
            }
            if self.current_char() == '/' && self.peek_char() == Some('*') {
                self.advance();
                self.advance();
                depth += 1;
            } else if self.current_char() == '*' && self.peek_char() == Some('/') {
                self.advance();
                self.advance();
                depth -= 1;
            } else {
                self.advance();
            }
        }
        Ok(())
    }

    fn handle_string(&mut self, quote: char) -> Result<(), LexError> {
        let start = self.current_position();
        self.advance(); // opening quote

        let mut value = String::new();
        while !self.is_at_end() && self.current_char() != quote {
            if self.current_char() == '\\' {
                self.advance();
                if self.is_at_end() {
                    return Err(LexError::new("unterminated string literal", &start));
                }
                match self.current_char() {
                    'n' => value.push('\n'),
                    't' => value.push('\t'),
                    'r' => value.push('\r'),
                    '\\' => value.push('\\'),
                    '"' => value.push('"'),
                    '\'' => value.push('\''),
                    other => {
                        value.push('\\');
                        value.push(other);
                    }
                }
                self.advance();
            } else {
                value.push(self.advance());
            }
        }

        if self.is_at_end() {
            return Err(LexError::new("unterminated string literal", &start));
        }
        self.advance(); // closing quote
        self.emit(TokenKind::Str(value), start);
        Ok(())
    }

    fn handle_number(&mut self) -> Result<(), LexError> {
        let start = self.current_position();
        let mut text = String::new();
        while !self.is_at_end() && self.current_char().is_ascii_digit() {
            text.push(self.advance());
        }

        // A dot only promotes to float when a digit follows; otherwise it
        // is the member-access operator and stays untouched.
        let mut is_float = false;
        if self.current_char() == '.'
            && self
                .peek_char()
                .map(|c| c.is_ascii_digit())
                .unwrap_or(false)
        {
            is_float = true;
            text.push(self.advance());
            while !self.is_at_end() && self.current_char().is_ascii_digit() {
                text.push(self.advance());
            }
        }

        let kind = if is_float {
            let value = text
                .parse()
                .map_err(|_| LexError::new(format!("invalid float literal '{}'", text), &start))?;
            TokenKind::Float(value)
        } else {
            let value = text
                .parse()
                .map_err(|_| LexError::new(format!("invalid integer literal '{}'", text), &start))?;
            TokenKind::Integer(value)
        };
        self.emit(kind, start);
        Ok(())
    }

    fn handle_identifier(&mut self) {
        let start = self.current_position();
        let mut text = String::new();
        while !self.is_at_end() && is_identifier_continue(self.current_char()) {
            text.push(self.advance());
        }

        if text == "_" {
            self.emit(TokenKind::Underscore, start);
            return;
        }

        let kind = self
            .keywords
            .get(text.as_str())
            .cloned()
            .unwrap_or(TokenKind::Identifier(text));
        self.emit(kind, start);
    }

    fn handle_operator_or_delimiter(&mut self) -> Result<(), LexError> {
        let start = self.current_position();
        let ch = self.advance();

        let kind = match ch {
            '+' => {
                if self.match_char('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.match_char('>') {
                    TokenKind::Arrow
                } else if self.match_char('=') {
                    TokenKind::MinusAssign
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.match_char('*') {
                    TokenKind::Power
                } else {
                    TokenKind::Star
                }
            }
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '=' => {
                if self.match_char('=') {
                    TokenKind::Eq
                } else if self.match_char('>') {
                    TokenKind::FatArrow
                } else {
                    TokenKind::Assign
                }
            }
            '!' => {
                if self.match_char('=') {
                    TokenKind::Ne
                } else {
                    TokenKind::Not
                }
            }
            '<' => {
                if self.match_char('=') {
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if self.match_char('=') {
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '&' => {
                if self.match_char('&') {
                    TokenKind::And
                } else {
                    return Err(LexError::new("unexpected character '&'", &start));
                }
            }
            '|' => {
                if self.match_char('|') {
                    TokenKind::Or
                } else if self.match_char('>') {
                    TokenKind::Pipe
                } else {
                    return Err(LexError::new("unexpected character '|'", &start));
                }
            }
            '.' => {
                if self.match_char('.') {
                    TokenKind::Range
                } else {
                    TokenKind::Dot
                }
            }
            ':' => {
                if self.match_char(':') {
                    TokenKind::DoubleColon
                } else {
                    TokenKind::Colon
                }
            }
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            other => {
                return Err(LexError::new(
                    format!("unexpected character '{}'", other),
                    &start,
                ));
            }
        };

        self.emit(kind, start);
        Ok(())
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_' || ('\u{0400}'..='\u{052F}').contains(&ch)
}

fn is_identifier_continue(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit()
}

/// The bilingual keyword surface: each kind carries one English and one
/// Ukrainian spelling (booleans carry the extra spellings the original
/// grammar accepted).
fn keyword_table() -> Vec<(&'static str, TokenKind)> {
    vec![
        ("let", TokenKind::Let),
        ("нехай", TokenKind::Let),
        ("var", TokenKind::Var),
        ("змінна", TokenKind::Var),
        ("const", TokenKind::Const),
        ("стала", TokenKind::Const),
        ("fun", TokenKind::Fun),
        ("функція", TokenKind::Fun),
        ("return", TokenKind::Return),
        ("повернути", TokenKind::Return),
        ("if", TokenKind::If),
        ("якщо", TokenKind::If),
        ("else", TokenKind::Else),
        ("інакше", TokenKind::Else),
        ("match", TokenKind::Match),
        ("співпадіння", TokenKind::Match),
        ("while", TokenKind::While),
        ("поки", TokenKind::While),
        ("for", TokenKind::For),
        ("для", TokenKind::For),
        ("in", TokenKind::In),
        ("в", TokenKind::In),
        ("break", TokenKind::Break),
        ("перервати", TokenKind::Break),
        ("continue", TokenKind::Continue),
        ("продовжити", TokenKind::Continue),
        ("class", TokenKind::Class),
        ("клас", TokenKind::Class),
        ("trait", TokenKind::Trait),
        ("риса", TokenKind::Trait),
        ("data", TokenKind::Data),
        ("дані", TokenKind::Data),
        ("impl", TokenKind::Impl),
        ("втілення", TokenKind::Impl),
        ("self", TokenKind::SelfKw),
        ("себе", TokenKind::SelfKw),
        ("new", TokenKind::New),
        ("новий", TokenKind::New),
        ("int", TokenKind::TypeInt),
        ("ціле", TokenKind::TypeInt),
        ("float", TokenKind::TypeFloat),
        ("дробове", TokenKind::TypeFloat),
        ("string", TokenKind::TypeString),
        ("рядок", TokenKind::TypeString),
        ("bool", TokenKind::TypeBool),
        ("логічне", TokenKind::TypeBool),
        ("list", TokenKind::TypeList),
        ("список", TokenKind::TypeList),
        ("map", TokenKind::TypeMap),
        ("словник", TokenKind::TypeMap),
        ("option", TokenKind::TypeOption),
        ("опція", TokenKind::TypeOption),
        ("result", TokenKind::TypeResult),
        ("результат", TokenKind::TypeResult),
        ("async", TokenKind::Async),
        ("асинх", TokenKind::Async),
        ("await", TokenKind::Await),
        ("чекати", TokenKind::Await),
        ("spawn", TokenKind::Spawn),
        ("запустити", TokenKind::Spawn),
        ("true", TokenKind::Boolean(true)),
        ("так", TokenKind::Boolean(true)),
        ("істина", TokenKind::Boolean(true)),
        ("false", TokenKind::Boolean(false)),
        ("ні", TokenKind::Boolean(false)),
        ("хиба", TokenKind::Boolean(false)),
        ("none", TokenKind::None),
        ("нічого", TokenKind::None),
        ("some", TokenKind::Some),
        ("деяке", TokenKind::Some),
        ("print", TokenKind::Print),
        ("друк", TokenKind::Print),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut tokenizer = Tokenizer::new(source);
        tokenizer
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_basic_tokenization() {
        let actual = kinds("let x = 5 + 3 * (2 - 1)");
        let expected = vec![
            TokenKind::Let,
            TokenKind::Identifier("x".to_string()),
            TokenKind::Assign,
            TokenKind::Integer(5),
            TokenKind::Plus,
            TokenKind::Integer(3),
            TokenKind::Star,
            TokenKind::LParen,
            TokenKind::Integer(2),
            TokenKind::Minus,
            TokenKind::Integer(1),
            TokenKind::RParen,
            TokenKind::Eof,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_keywords_both_languages() {
        let actual = kinds("fun функція if якщо while поки none нічого");
        let expected = vec![
            TokenKind::Fun,
            TokenKind::Fun,
            TokenKind::If,
            TokenKind::If,
            TokenKind::While,
            TokenKind::While,
            TokenKind::None,
            TokenKind::None,
            TokenKind::Eof,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_cyrillic_identifiers() {
        let actual = kinds("нехай лічильник1 = 0");
        let expected = vec![
            TokenKind::Let,
            TokenKind::Identifier("лічильник1".to_string()),
            TokenKind::Assign,
            TokenKind::Integer(0),
            TokenKind::Eof,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_numbers_and_dot_operator() {
        let actual = kinds("42 3.25 0 xs.length 1..5");
        let expected = vec![
            TokenKind::Integer(42),
            TokenKind::Float(3.25),
            TokenKind::Integer(0),
            TokenKind::Identifier("xs".to_string()),
            TokenKind::Dot,
            TokenKind::Identifier("length".to_string()),
            TokenKind::Integer(1),
            TokenKind::Range,
            TokenKind::Integer(5),
            TokenKind::Eof,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_operators_longest_match() {
        let actual = kinds("== != <= >= -> => ** |> .. :: += -= && || = !");
        let expected = vec![
            TokenKind::Eq,
            TokenKind::Ne,
            TokenKind::Le,
            TokenKind::Ge,
            TokenKind::Arrow,
            TokenKind::FatArrow,
            TokenKind::Power,
            TokenKind::Pipe,
            TokenKind::Range,
            TokenKind::DoubleColon,
            TokenKind::PlusAssign,
            TokenKind::MinusAssign,
            TokenKind::And,
            TokenKind::Or,
            TokenKind::Assign,
            TokenKind::Not,
            TokenKind::Eof,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_string_literals_and_escapes() {
        let actual = kinds(r#""hello" 'world' "a\nb" "quote: \"x\"""#);
        let expected = vec![
            TokenKind::Str("hello".to_string()),
            TokenKind::Str("world".to_string()),
            TokenKind::Str("a\nb".to_string()),
            TokenKind::Str("quote: \"x\"".to_string()),
            TokenKind::Eof,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_wildcard_token() {
        let actual = kinds("_ _x");
        let expected = vec![
            TokenKind::Underscore,
            TokenKind::Identifier("_x".to_string()),
            TokenKind::Eof,
        ];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_nested_block_comments() {
        let actual = kinds("1 /* outer /* inner */ still out */ 2 // trailing");
        let expected = vec![TokenKind::Integer(1), TokenKind::Integer(2), TokenKind::Eof];
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_unterminated_string_reports_opening_position() {
        let mut tokenizer = Tokenizer::new("let s = \"oops");
        let error = tokenizer.tokenize().unwrap_err();
        assert_eq!(error.line, 1);
        assert_eq!(error.column, 9);
        assert!(error.message.contains("unterminated"));
    }

    #[test]
    fn test_invalid_character() {
        let mut tokenizer = Tokenizer::new("let a = 1 @ 2");
        let error = tokenizer.tokenize().unwrap_err();
        assert!(error.message.contains('@'));
    }

    #[test]
    fn test_position_tracking() {
        let mut tokenizer = Tokenizer::new("let\nx = 5");
        let tokens = tokenizer.tokenize().unwrap();
        let x = tokens
            .iter()
            .find(|t| matches!(t.kind, TokenKind::Identifier(ref n) if n == "x"))
            .unwrap();
        assert_eq!(x.position.line, 2);
        assert_eq!(x.position.column, 1);
    }
}
