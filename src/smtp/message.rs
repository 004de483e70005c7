//! The message assembler: accumulates one captured `Message` per
//! MAIL→QUIT exchange from the (response, params) pairs the driver feeds
//! it during DATA_HDR and DATA_BODY.

use chrono::{DateTime, Utc};

use crate::smtp::engine::{Response, State};
use crate::smtp::error::ProtocolViolation;

/// A captured SMTP message: an ordered list of headers (insertion order
/// and original casing preserved, duplicates accumulating values) plus a
/// body buffer. Immutable once it leaves the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    headers: Vec<(String, Vec<String>)>,
    body: String,
    received_at: DateTime<Utc>,
    id: u64,
}

impl Message {
    fn new() -> Self {
        Message {
            headers: Vec::new(),
            body: String::new(),
            received_at: Utc::now(),
            id: 0,
        }
    }

    /// Header names in first-seen insertion order, original casing.
    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// All values recorded for `name` (case-insensitive match), in the
    /// order they were appended. Empty if the header was never seen.
    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    /// The first recorded value for `name`, if any.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.header_values(name).first().map(String::as_str)
    }

    /// The accumulated body text, raw DATA lines joined by `\n`.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Assigned by the capture queue at enqueue time; `0` until then.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub(crate) fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

/// Accumulates a single in-progress [`Message`] across a connection.
///
/// One `Assembler` is reused for successive messages on the same
/// connection: [`Assembler::finish`] hands back the completed message and
/// allocates a fresh one, rather than clearing fields in place (spec §9).
pub struct Assembler {
    current: Message,
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler {
    pub fn new() -> Self {
        Assembler {
            current: Message::new(),
        }
    }

    /// Mutates the in-progress message per spec §4.3. Only called by the
    /// driver for every line processed during a transaction; a no-op
    /// outside DATA_HDR/DATA_BODY.
    ///
    /// Returns `Err` only for the one unrecoverable case: a continuation
    /// line arriving before any header has been stored.
    pub fn store(&mut self, response: &Response, params: Option<&str>) -> Result<(), ProtocolViolation> {
        match response.next_state {
            State::DataHdr => {
                if let Some(line) = params {
                    self.store_header_line(line)?;
                }
            }
            State::DataBody => {
                if let Some(line) = params {
                    self.current.body.push_str(line);
                    self.current.body.push('\n');
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn store_header_line(&mut self, line: &str) -> Result<(), ProtocolViolation> {
        let is_continuation = line.chars().next().is_some_and(char::is_whitespace);
        if is_continuation {
            let last = self
                .current
                .headers
                .last_mut()
                .ok_or(ProtocolViolation::ContinuationBeforeHeader)?;
            let value = last.1.last_mut().expect("a stored header always has a value");
            value.push(' ');
            value.push_str(line.trim());
            return Ok(());
        }

        // A header line with no `:` is malformed and silently dropped.
        let Some(colon) = line.find(':') else {
            return Ok(());
        };
        let name = line[..colon].trim().to_string();
        let value = line[colon + 1..].trim().to_string();

        if let Some((_, values)) = self
            .current
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            values.push(value);
        } else {
            self.current.headers.push((name, vec![value]));
        }
        Ok(())
    }

    /// Takes the completed message and allocates a fresh one for the next
    /// transaction on this connection.
    pub fn finish(&mut self) -> Message {
        std::mem::replace(&mut self.current, Message::new())
    }
}
