//! Source tags: `"<CHANNEL>=<address>"`

use std::fmt;

use super::ParseError;

/// Where a command came from, used to route its answer back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTag {
    raw: String,
    split: Option<usize>,
}

impl SourceTag {
    /// Fold `raw` to ASCII and check its length is within `1..=max_len`
    ///
    /// Non-ASCII characters become `?` and control characters are removed.
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, ParseError> {
        let folded: String = raw
            .chars()
            .filter(|c| !c.is_control())
            .map(|c| if c.is_ascii() { c } else { '?' })
            .collect();

        if folded.is_empty() || folded.len() > max_len {
            return Err(ParseError::InvalidSource { max: max_len });
        }

        let split = folded.find('=');
        Ok(Self { raw: folded, split })
    }

    /// Build the tag for `address` on `channel`
    pub fn for_channel(channel: &str, address: &str, max_len: usize) -> Result<Self, ParseError> {
        Self::parse(&format!("{}={}", channel, address), max_len)
    }

    /// Channel part, before the first `=`
    pub fn channel(&self) -> &str {
        match self.split {
            Some(at) => &self.raw[..at],
            None => &self.raw,
        }
    }

    /// Address part, after the first `=` (empty when absent)
    pub fn address(&self) -> &str {
        match self.split {
            Some(at) => &self.raw[at + 1..],
            None => "",
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
