//! Lexer and parser for the `KEY = ( scalar, ... )` text form
//!
//! Only the subset the command protocol needs is accepted: one or more
//! `name = value` settings whose value is a scalar or a flat list of
//! scalars. Groups, arrays, nested lists and comments are syntax errors.

use super::command::Arg;
use super::ParseError;

/// A parsed top-level value
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Scalar(Arg),
    List(Vec<Arg>),
}

/// A parsed `name = value` setting
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Setting {
    pub name: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Name(String),
    Scalar(Arg),
    Assign,
    Open,
    Close,
    Comma,
    Semicolon,
    Unsupported(char),
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    peeked: Option<(usize, Token)>,
}

fn syntax(offset: usize, reason: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        offset,
        reason: reason.into(),
    }
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            peeked: None,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&mut self) -> Result<Option<&(usize, Token)>, ParseError> {
        if self.peeked.is_none() {
            self.peeked = self.lex()?;
        }
        Ok(self.peeked.as_ref())
    }

    fn next(&mut self) -> Result<Option<(usize, Token)>, ParseError> {
        match self.peeked.take() {
            Some(token) => Ok(Some(token)),
            None => self.lex(),
        }
    }

    fn lex(&mut self) -> Result<Option<(usize, Token)>, ParseError> {
        self.skip_whitespace();
        let start = self.pos;
        let c = match self.peek_char() {
            Some(c) => c,
            None => return Ok(None),
        };

        let token = match c {
            '=' | ':' => {
                self.bump();
                Token::Assign
            }
            '(' => {
                self.bump();
                Token::Open
            }
            ')' => {
                self.bump();
                Token::Close
            }
            ',' => {
                self.bump();
                Token::Comma
            }
            ';' => {
                self.bump();
                Token::Semicolon
            }
            '"' => Token::Scalar(Arg::Str(self.lex_string()?)),
            c if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' => {
                Token::Scalar(self.lex_number()?)
            }
            c if c.is_ascii_alphabetic() || c == '*' => Token::Name(self.lex_name()),
            other => {
                self.bump();
                Token::Unsupported(other)
            }
        };
        Ok(Some((start, token)))
    }

    fn lex_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '*' {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.src[start..self.pos].to_string()
    }

    fn lex_string(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| syntax(start, "unterminated string"))?;
            match c {
                '"' => return Ok(out),
                '\\' => {
                    let escape_at = self.pos - 1;
                    let e = self
                        .bump()
                        .ok_or_else(|| syntax(escape_at, "unterminated escape"))?;
                    match e {
                        '\\' => out.push('\\'),
                        '"' => out.push('"'),
                        'n' => out.push('\n'),
                        'r' => out.push('\r'),
                        't' => out.push('\t'),
                        'f' => out.push('\u{0c}'),
                        'x' => {
                            let digits = self.rest().get(..2).unwrap_or_default();
                            let byte = u8::from_str_radix(digits, 16)
                                .map_err(|_| syntax(escape_at, "invalid \\x escape"))?;
                            self.pos += 2;
                            out.push(char::from(byte));
                        }
                        other => {
                            return Err(syntax(escape_at, format!("unknown escape '\\{}'", other)))
                        }
                    }
                }
                other => out.push(other),
            }
        }
    }

    fn lex_number(&mut self) -> Result<Arg, ParseError> {
        let start = self.pos;
        let mut negative = false;
        if let Some(sign @ ('+' | '-')) = self.peek_char() {
            negative = sign == '-';
            self.bump();
        }

        let rest = self.rest();
        if rest.starts_with("0x") || rest.starts_with("0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits = &self.src[digits_start..self.pos];
            let magnitude = i64::from_str_radix(digits, 16)
                .map_err(|_| syntax(start, "invalid hex integer"))?;
            let value = if negative { -magnitude } else { magnitude };
            let long = self.eat_long_suffix();
            self.expect_boundary(start)?;
            return Ok(integer(value, long));
        }

        let mut is_float = false;
        self.eat_digits();
        if self.peek_char() == Some('.') {
            is_float = true;
            self.bump();
            self.eat_digits();
        }
        if let Some('e' | 'E') = self.peek_char() {
            is_float = true;
            self.bump();
            if let Some('+' | '-') = self.peek_char() {
                self.bump();
            }
            let exponent_start = self.pos;
            self.eat_digits();
            if exponent_start == self.pos {
                return Err(syntax(start, "missing exponent digits"));
            }
        }

        let literal = &self.src[start..self.pos];
        if is_float {
            self.expect_boundary(start)?;
            let value: f64 = literal
                .parse()
                .map_err(|_| syntax(start, format!("invalid float '{}'", literal)))?;
            return Ok(Arg::Float(value));
        }

        let value: i64 = literal
            .parse()
            .map_err(|_| syntax(start, format!("invalid integer '{}'", literal)))?;
        let long = self.eat_long_suffix();
        self.expect_boundary(start)?;
        Ok(integer(value, long))
    }

    fn eat_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
    }

    fn eat_long_suffix(&mut self) -> bool {
        if self.peek_char() == Some('L') {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_boundary(&self, start: usize) -> Result<(), ParseError> {
        match self.peek_char() {
            Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                Err(syntax(start, "malformed number"))
            }
            _ => Ok(()),
        }
    }
}

fn integer(value: i64, long: bool) -> Arg {
    match i32::try_from(value) {
        Ok(small) if !long => Arg::Int(small),
        _ => Arg::Int64(value),
    }
}

/// Parse every top-level setting in `text`.
pub(crate) fn parse_settings(text: &str) -> Result<Vec<Setting>, ParseError> {
    let mut lexer = Lexer::new(text);
    let mut settings = Vec::new();

    while let Some((offset, token)) = lexer.next()? {
        let name = match token {
            Token::Name(name) => name,
            other => {
                return Err(syntax(
                    offset,
                    format!("expected a name, found {}", describe(&other)),
                ))
            }
        };

        match lexer.next()? {
            Some((_, Token::Assign)) => {}
            Some((at, other)) => {
                return Err(syntax(at, format!("expected '=', found {}", describe(&other))))
            }
            None => return Err(syntax(text.len(), "expected '=' before end of text")),
        }

        let value = parse_value(&mut lexer, text.len())?;

        let terminated = matches!(lexer.peek()?, Some((_, Token::Semicolon | Token::Comma)));
        if terminated {
            lexer.next()?;
        }

        settings.push(Setting { name, value });
    }

    Ok(settings)
}

fn parse_value(lexer: &mut Lexer<'_>, end: usize) -> Result<Value, ParseError> {
    match lexer.next()? {
        Some((_, Token::Open)) => parse_list(lexer, end).map(Value::List),
        Some((offset, token)) => parse_scalar(lexer, offset, token).map(Value::Scalar),
        None => Err(syntax(end, "expected a value before end of text")),
    }
}

fn parse_list(lexer: &mut Lexer<'_>, end: usize) -> Result<Vec<Arg>, ParseError> {
    let mut items = Vec::new();

    let empty = matches!(lexer.peek()?, Some((_, Token::Close)));
    if empty {
        lexer.next()?;
        return Ok(items);
    }

    loop {
        let (offset, token) = lexer
            .next()?
            .ok_or_else(|| syntax(end, "unterminated list"))?;
        if token == Token::Open {
            return Err(syntax(offset, "nested lists are not supported"));
        }
        items.push(parse_scalar(lexer, offset, token)?);

        match lexer.next()? {
            Some((_, Token::Comma)) => continue,
            Some((_, Token::Close)) => return Ok(items),
            Some((at, other)) => {
                return Err(syntax(at, format!("expected ',' or ')', found {}", describe(&other))))
            }
            None => return Err(syntax(end, "unterminated list")),
        }
    }
}

fn parse_scalar(lexer: &mut Lexer<'_>, offset: usize, token: Token) -> Result<Arg, ParseError> {
    match token {
        Token::Scalar(Arg::Str(mut s)) => {
            // adjacent literals concatenate: "ab" "cd" == "abcd"
            while matches!(lexer.peek()?, Some((_, Token::Scalar(Arg::Str(_))))) {
                if let Some((_, Token::Scalar(Arg::Str(more)))) = lexer.next()? {
                    s.push_str(&more);
                }
            }
            Ok(Arg::Str(s))
        }
        Token::Scalar(arg) => Ok(arg),
        Token::Name(name) if name.eq_ignore_ascii_case("true") => Ok(Arg::Bool(true)),
        Token::Name(name) if name.eq_ignore_ascii_case("false") => Ok(Arg::Bool(false)),
        other => Err(syntax(offset, format!("expected a scalar, found {}", describe(&other)))),
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Name(name) => format!("name '{}'", name),
        Token::Scalar(arg) => format!("{} value", arg.kind_name()),
        Token::Assign => "'='".to_string(),
        Token::Open => "'('".to_string(),
        Token::Close => "')'".to_string(),
        Token::Comma => "','".to_string(),
        Token::Semicolon => "';'".to_string(),
        Token::Unsupported(c) => format!("unsupported character '{}'", c),
    }
}
