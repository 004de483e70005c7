//! The action classifier: context-sensitive lexing of a single input line.
//!
//! `classify` is a pure function of the raw line and the current protocol
//! state. It never fails - unrecognised input always maps to
//! [`Action::Unrecog`] - and it performs no I/O, which keeps it trivially
//! unit-testable in isolation from the transition engine and the driver.

use crate::smtp::engine::State;

/// A classified unit of client input, tagged with whether it drives a
/// state transition on its own (stateful) or is a no-op query answerable
/// from any state (stateless).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Helo,
    Ehlo,
    Mail,
    Rcpt,
    Data,
    DataEnd,
    Quit,
    Unrecog,
    BlankLine,
    Rset,
    Vrfy,
    Expn,
    Help,
    Noop,
    AuthPlain,
    AuthPlainExt,
    AuthUnsupported,
    AuthSuccess,
    AuthFailed,
}

impl Action {
    /// Stateless actions (RSET, VRFY, EXPN, HELP, NOOP) can be answered
    /// from any state without affecting the rest of the transaction; all
    /// other actions are stateful.
    pub fn is_stateless(self) -> bool {
        matches!(
            self,
            Action::Rset | Action::Vrfy | Action::Expn | Action::Help | Action::Noop
        )
    }
}

/// Classifies a single input line given the current protocol state.
///
/// `auth_enabled` selects the extended authentication action set
/// described in spec §4.1; with it `false`, an `AUTH PLAIN` line is just
/// another unrecognised command.
pub fn classify(line: &str, state: State, auth_enabled: bool) -> (Action, Option<String>) {
    match state {
        State::DataHdr => classify_data_hdr(line),
        State::DataBody => classify_data_body(line),
        State::Credentials => classify_credentials(line),
        _ => classify_command(line, auth_enabled),
    }
}

fn classify_data_hdr(line: &str) -> (Action, Option<String>) {
    if line == "." {
        (Action::DataEnd, None)
    } else if line.is_empty() {
        (Action::BlankLine, None)
    } else {
        (Action::Unrecog, Some(line.to_string()))
    }
}

fn classify_data_body(line: &str) -> (Action, Option<String>) {
    if line == "." {
        (Action::DataEnd, None)
    } else {
        // Every non-terminator line, blank or not, is captured verbatim;
        // the blank case still carries `Some("")` so the assembler can
        // tell it apart from a line that produced no params at all.
        (Action::Unrecog, Some(line.to_string()))
    }
}

fn classify_credentials(line: &str) -> (Action, Option<String>) {
    if line.is_empty() {
        (Action::AuthFailed, None)
    } else {
        (Action::AuthSuccess, Some(line.to_string()))
    }
}

fn classify_command(line: &str, auth_enabled: bool) -> (Action, Option<String>) {
    let upper = line.to_uppercase();

    if auth_enabled && upper.starts_with("AUTH PLAIN") {
        let rest = line[10..].trim();
        return if rest.is_empty() {
            (Action::AuthPlain, None)
        } else {
            (Action::AuthPlainExt, Some(rest.to_string()))
        };
    }
    if auth_enabled && upper.starts_with("AUTH") {
        return (Action::AuthUnsupported, None);
    }

    if upper.starts_with("HELO ") || upper == "HELO" {
        (Action::Helo, params_after(line, 4))
    } else if upper.starts_with("EHLO ") || upper == "EHLO" {
        (Action::Ehlo, params_after(line, 4))
    } else if upper.starts_with("MAIL FROM:") {
        (Action::Mail, params_after(line, 10))
    } else if upper.starts_with("RCPT TO:") {
        (Action::Rcpt, params_after(line, 8))
    } else if upper.starts_with("DATA") {
        (Action::Data, None)
    } else if upper.starts_with("QUIT") {
        (Action::Quit, None)
    } else if upper.starts_with("RSET") {
        (Action::Rset, None)
    } else if upper.starts_with("NOOP") {
        (Action::Noop, None)
    } else if upper.starts_with("EXPN") {
        (Action::Expn, params_after(line, 4))
    } else if upper.starts_with("VRFY") {
        (Action::Vrfy, params_after(line, 4))
    } else if upper.starts_with("HELP") {
        (Action::Help, params_after(line, 4))
    } else {
        (Action::Unrecog, None)
    }
}

/// Returns the trimmed suffix of `line` after the first `prefix_len` bytes,
/// or `None` if nothing follows the verb. Preserves original casing.
fn params_after(line: &str, prefix_len: usize) -> Option<String> {
    let rest = line.get(prefix_len..).unwrap_or("").trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helo_is_case_insensitive() {
        let (action, params) = classify("helo example.com", State::Greet, false);
        assert_eq!(action, Action::Helo);
        assert_eq!(params.as_deref(), Some("example.com"));
    }

    #[test]
    fn mail_from_extracts_params_preserving_case() {
        let (action, params) = classify("MAIL FROM:<Foo@Bar.com>", State::Mail, false);
        assert_eq!(action, Action::Mail);
        assert_eq!(params.as_deref(), Some("<Foo@Bar.com>"));
    }

    #[test]
    fn unknown_verb_in_command_phase_is_unrecog() {
        let (action, _) = classify("FOOBAR", State::Greet, false);
        assert_eq!(action, Action::Unrecog);
    }

    #[test]
    fn leading_whitespace_is_not_a_verb() {
        let (action, _) = classify(" HELO example.com", State::Greet, false);
        assert_eq!(action, Action::Unrecog);
    }

    #[test]
    fn data_hdr_dot_terminates() {
        let (action, params) = classify(".", State::DataHdr, false);
        assert_eq!(action, Action::DataEnd);
        assert_eq!(params, None);
    }

    #[test]
    fn data_hdr_blank_line_is_separator() {
        let (action, params) = classify("", State::DataHdr, false);
        assert_eq!(action, Action::BlankLine);
        assert_eq!(params, None);
    }

    #[test]
    fn data_hdr_other_line_is_header_carrier() {
        let (action, params) = classify("Subject: Hi", State::DataHdr, false);
        assert_eq!(action, Action::Unrecog);
        assert_eq!(params.as_deref(), Some("Subject: Hi"));
    }

    #[test]
    fn data_body_dot_terminates() {
        let (action, params) = classify(".", State::DataBody, false);
        assert_eq!(action, Action::DataEnd);
        assert_eq!(params, None);
    }

    #[test]
    fn data_body_dot_prefixed_line_is_verbatim() {
        let (action, params) = classify("..not terminator", State::DataBody, false);
        assert_eq!(action, Action::Unrecog);
        assert_eq!(params.as_deref(), Some("..not terminator"));
    }

    #[test]
    fn data_body_blank_line_carries_empty_params() {
        let (action, params) = classify("", State::DataBody, false);
        assert_eq!(action, Action::Unrecog);
        assert_eq!(params.as_deref(), Some(""));
    }

    #[test]
    fn auth_plain_bare_prompts_for_credentials() {
        let (action, params) = classify("AUTH PLAIN", State::Greet, true);
        assert_eq!(action, Action::AuthPlain);
        assert_eq!(params, None);
    }

    #[test]
    fn auth_plain_with_token_is_inline() {
        let (action, params) = classify("AUTH PLAIN AGZvbwBiYXI=", State::Greet, true);
        assert_eq!(action, Action::AuthPlainExt);
        assert_eq!(params.as_deref(), Some("AGZvbwBiYXI="));
    }

    #[test]
    fn auth_unsupported_mechanism() {
        let (action, _) = classify("AUTH LOGIN", State::Greet, true);
        assert_eq!(action, Action::AuthUnsupported);
    }

    #[test]
    fn auth_ignored_entirely_when_disabled() {
        let (action, _) = classify("AUTH PLAIN", State::Greet, false);
        assert_eq!(action, Action::Unrecog);
    }

    #[test]
    fn credentials_empty_line_fails() {
        let (action, _) = classify("", State::Credentials, true);
        assert_eq!(action, Action::AuthFailed);
    }

    #[test]
    fn credentials_any_line_succeeds() {
        let (action, params) = classify("dGVzdA==", State::Credentials, true);
        assert_eq!(action, Action::AuthSuccess);
        assert_eq!(params.as_deref(), Some("dGVzdA=="));
    }
}
