//! Parsed inbound commands

use std::fmt;

use super::parser::{parse_settings, Value};
use super::{Answer, Limits, ParseError, SourceTag, COMMAND_KEYWORD};

/// A typed positional argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i32),
    Int64(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Arg {
    /// Human readable type name, used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Arg::Int(_) => "int",
            Arg::Int64(_) => "int64",
            Arg::Float(_) => "float",
            Arg::Str(_) => "string",
            Arg::Bool(_) => "bool",
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Arg::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Arg::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Arg::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Arg::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Int(v) => write!(f, "{}", v),
            Arg::Int64(v) => write!(f, "{}", v),
            Arg::Float(v) => write!(f, "{}", v),
            Arg::Str(v) => f.write_str(v),
            Arg::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A validated `AT = ( id, "op", ... )` request
///
/// Positions are counted after the id: position 0 is the operation name
/// and is never returned by the typed getters, arguments start at 1.
///
/// `Clone` yields an independent copy (arguments and any pending answer
/// included), suitable for handing to an asynchronous continuation while
/// the original message is released.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    id: u32,
    elements: Vec<Arg>,
    source: Option<SourceTag>,
    answer: Option<Answer>,
}

impl Command {
    /// Parse `text` with default limits and no source tag
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Self::parse_with(text, None, &Limits::default())
    }

    /// Parse `text`, attaching an externally supplied source tag
    pub fn parse_with(
        text: &str,
        source: Option<&str>,
        limits: &Limits,
    ) -> Result<Self, ParseError> {
        if text.len() > limits.max_text_len {
            return Err(ParseError::TooLong {
                len: text.len(),
                max: limits.max_text_len,
            });
        }

        let mut settings = parse_settings(text)?;
        if settings.len() != 1 {
            return Err(ParseError::SettingCount(settings.len()));
        }
        let setting = settings.remove(0);

        if setting.name != COMMAND_KEYWORD {
            return Err(ParseError::Keyword(setting.name));
        }

        let mut list = match setting.value {
            Value::List(list) => list,
            Value::Scalar(_) => return Err(ParseError::NotAList),
        };
        if list.len() < 2 {
            return Err(ParseError::TooFewElements(list.len()));
        }

        let id = match list[0] {
            Arg::Int(id) if id >= 1 => id as u32,
            _ => return Err(ParseError::InvalidId),
        };

        match &list[1] {
            Arg::Str(op) if !op.is_empty() && op.len() <= limits.max_op_name_len => {}
            _ => {
                return Err(ParseError::InvalidOperation {
                    max: limits.max_op_name_len,
                })
            }
        }

        let source = source
            .map(|raw| SourceTag::parse(raw, limits.max_from_len))
            .transpose()?;

        list.remove(0);
        Ok(Self {
            id,
            elements: list,
            source,
            answer: None,
        })
    }

    /// Command id chosen by the requester
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Operation name
    pub fn operation(&self) -> &str {
        self.elements[0].as_str().unwrap_or_default()
    }

    /// Source tag supplied alongside the text, if any
    pub fn source(&self) -> Option<&SourceTag> {
        self.source.as_ref()
    }

    /// Number of arguments after the operation name
    pub fn arg_count(&self) -> usize {
        self.elements.len() - 1
    }

    /// Raw argument at `index` (1-based; 0 is the operation)
    pub fn arg(&self, index: usize) -> Option<&Arg> {
        if index == 0 {
            return None;
        }
        self.elements.get(index)
    }

    /// Arguments in order, operation excluded
    pub fn args(&self) -> &[Arg] {
        &self.elements[1..]
    }

    pub fn get_int(&self, index: usize) -> Option<i32> {
        self.arg(index).and_then(Arg::as_int)
    }

    pub fn get_int64(&self, index: usize) -> Option<i64> {
        self.arg(index).and_then(Arg::as_int64)
    }

    pub fn get_float(&self, index: usize) -> Option<f64> {
        self.arg(index).and_then(Arg::as_float)
    }

    pub fn get_str(&self, index: usize) -> Option<&str> {
        self.arg(index).and_then(Arg::as_str)
    }

    pub fn get_bool(&self, index: usize) -> Option<bool> {
        self.arg(index).and_then(Arg::as_bool)
    }

    /// The pending answer, created on first use with status `UNKNOWN`
    pub fn answer(&mut self) -> &mut Answer {
        let id = self.id;
        self.answer.get_or_insert_with(|| Answer::new(id))
    }

    /// Whether an answer has been started
    pub fn has_answer(&self) -> bool {
        self.answer.is_some()
    }

    /// Detach the pending answer, leaving none behind
    pub fn take_answer(&mut self) -> Option<Answer> {
        self.answer.take()
    }

    /// Consume the command, keeping only its answer
    pub fn into_answer(mut self) -> Answer {
        let id = self.id;
        self.answer.take().unwrap_or_else(|| Answer::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Status;

    #[test]
    fn test_parse_minimal_command() {
        let cmd = Command::parse(r#"AT = (1, "ping")"#).unwrap();
        assert_eq!(cmd.id(), 1);
        assert_eq!(cmd.operation(), "ping");
        assert_eq!(cmd.arg_count(), 0);
        assert!(cmd.source().is_none());
        assert!(!cmd.has_answer());
    }

    #[test]
    fn test_typed_argument_lookup() {
        let cmd =
            Command::parse(r#"AT = (42, "set", 7, 9000000000, 2.5, "wlan0", true)"#).unwrap();
        assert_eq!(cmd.get_int(1), Some(7));
        assert_eq!(cmd.get_int64(2), Some(9_000_000_000));
        assert_eq!(cmd.get_float(3), Some(2.5));
        assert_eq!(cmd.get_str(4), Some("wlan0"));
        assert_eq!(cmd.get_bool(5), Some(true));
        assert_eq!(cmd.arg_count(), 5);
    }

    #[test]
    fn test_type_mismatch_and_range_return_none() {
        let cmd = Command::parse(r#"AT = (3, "set", 7, "x")"#).unwrap();
        assert_eq!(cmd.get_str(1), None);
        assert_eq!(cmd.get_int64(1), None);
        assert_eq!(cmd.get_int(2), None);
        assert_eq!(cmd.get_int(3), None);
        assert!(cmd.arg(99).is_none());
    }

    #[test]
    fn test_operation_not_fetchable_as_argument() {
        let cmd = Command::parse(r#"AT = (3, "set", 7)"#).unwrap();
        assert_eq!(cmd.get_str(0), None);
        assert!(cmd.arg(0).is_none());
    }

    #[test]
    fn test_rejects_malformed_input() {
        let cases = [
            (r#"IH = (1, "ping")"#, ParseError::Keyword("IH".to_string())),
            (r#"at = (1, "ping")"#, ParseError::Keyword("at".to_string())),
            ("AT = (1)", ParseError::TooFewElements(1)),
            ("AT = ()", ParseError::TooFewElements(0)),
            ("AT = 5", ParseError::NotAList),
            (r#"AT = (0, "ping")"#, ParseError::InvalidId),
            (r#"AT = (-4, "ping")"#, ParseError::InvalidId),
            (r#"AT = ("1", "ping")"#, ParseError::InvalidId),
            (r#"AT = (1L, "ping")"#, ParseError::InvalidId),
            (
                r#"AT = (1, "")"#,
                ParseError::InvalidOperation { max: 10 },
            ),
            (
                r#"AT = (1, "much_too_long")"#,
                ParseError::InvalidOperation { max: 10 },
            ),
            (r#"AT = (1, 2)"#, ParseError::InvalidOperation { max: 10 }),
            (
                r#"AT = (1, "a"); AT = (2, "b")"#,
                ParseError::SettingCount(2),
            ),
            ("", ParseError::SettingCount(0)),
        ];

        for (text, expected) in cases {
            assert_eq!(Command::parse(text).unwrap_err(), expected, "input: {}", text);
        }
    }

    #[test]
    fn test_first_broken_rule_wins() {
        let limits = Limits::default();
        let oversized = format!(r#"IH = (0, ""){}"#, " ".repeat(200));
        let long_source = "X".repeat(limits.max_from_len + 1);

        let cases = [
            (
                oversized.as_str(),
                None,
                ParseError::TooLong {
                    len: oversized.len(),
                    max: 120,
                },
            ),
            (r#"AT = 1; IH = 2"#, None, ParseError::SettingCount(2)),
            ("IH = 5", None, ParseError::Keyword("IH".to_string())),
            ("AT = 0", None, ParseError::NotAList),
            ("AT = (0)", None, ParseError::TooFewElements(1)),
            (r#"AT = (0, "")"#, None, ParseError::InvalidId),
            (
                r#"AT = (1, "")"#,
                Some(long_source.as_str()),
                ParseError::InvalidOperation { max: 10 },
            ),
            (
                r#"AT = (1, "ping")"#,
                Some(long_source.as_str()),
                ParseError::InvalidSource { max: 64 },
            ),
        ];

        for (text, source, expected) in cases {
            assert_eq!(
                Command::parse_with(text, source, &limits).unwrap_err(),
                expected,
                "input: {}",
                text
            );
        }
    }

    #[test]
    fn test_rejects_oversized_text() {
        let padding = " ".repeat(200);
        let text = format!(r#"AT = (1, "ping"){}"#, padding);
        assert!(matches!(
            Command::parse(&text),
            Err(ParseError::TooLong { max: 120, .. })
        ));
    }

    #[test]
    fn test_length_limit_is_inclusive() {
        let limits = Limits::default();
        let base = r#"AT = (1, "ping")"#;
        let text = format!("{}{}", base, " ".repeat(limits.max_text_len - base.len()));
        assert_eq!(text.len(), limits.max_text_len);
        assert!(Command::parse(&text).is_ok());
    }

    #[test]
    fn test_custom_limits() {
        let limits = Limits {
            max_text_len: 40,
            max_op_name_len: 3,
            max_from_len: 8,
        };
        assert!(Command::parse_with(r#"AT = (1, "abc")"#, None, &limits).is_ok());
        assert_eq!(
            Command::parse_with(r#"AT = (1, "abcd")"#, None, &limits).unwrap_err(),
            ParseError::InvalidOperation { max: 3 }
        );
    }

    #[test]
    fn test_source_tag_validation() {
        let limits = Limits::default();
        let cmd = Command::parse_with(r#"AT = (1, "ping")"#, Some("XMPP=user@server"), &limits)
            .unwrap();
        let source = cmd.source().unwrap();
        assert_eq!(source.channel(), "XMPP");
        assert_eq!(source.address(), "user@server");

        assert_eq!(
            Command::parse_with(r#"AT = (1, "ping")"#, Some(""), &limits).unwrap_err(),
            ParseError::InvalidSource { max: 64 }
        );
        let long = format!("XMPP={}", "u".repeat(80));
        assert!(Command::parse_with(r#"AT = (1, "ping")"#, Some(&long), &limits).is_err());
    }

    #[test]
    fn test_answer_lifecycle() {
        let mut cmd = Command::parse(r#"AT = (5, "ping")"#).unwrap();
        cmd.answer().set_status(Status::OK).add_text("pong");
        assert!(cmd.has_answer());

        let answer = cmd.into_answer();
        assert_eq!(answer.render(), r#"IH = ( 5, 200, "pong" )"#);
    }

    #[test]
    fn test_copy_is_independent() {
        let mut original = Command::parse(r#"AT = (9, "echo", 1, "a")"#).unwrap();
        original.answer().add_text("first");

        let mut copy = original.clone();
        copy.answer().set_status(Status::FAIL).add_text("second");

        let original_answer = original.take_answer().unwrap();
        assert_eq!(original_answer.status(), Status::UNKNOWN);
        assert_eq!(original_answer.parts().collect::<Vec<_>>(), vec!["first"]);

        let copy_answer = copy.take_answer().unwrap();
        assert_eq!(copy_answer.status(), Status::FAIL);
        assert_eq!(
            copy_answer.parts().collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert_eq!(copy.args(), original.args());
    }
}
