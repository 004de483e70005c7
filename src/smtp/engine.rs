//! The transition engine: a pure, total function of `(Action, State)`.
//!
//! `execute` never fails and never blocks. Every cell of the state table
//! in spec §4.2 is implemented explicitly; any `(action, state)` pair not
//! named there falls through to the catch-all arm, which answers
//! `503 Bad sequence of commands` without changing state, exactly as the
//! spec's "implicit default for unlisted cells" requires.

use crate::smtp::action::Action;

/// Position in the SMTP conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Connect,
    Greet,
    AuthPlain,
    Credentials,
    Mail,
    Rcpt,
    DataHdr,
    DataBody,
    Quit,
}

/// What the engine wants the driver to do with the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Write `"<code> <text>\r\n"` to the client.
    Transmit(u16, &'static str),
    /// A state change that must never reach the wire - used for the
    /// header/body boundary and DATA content capture (spec §4.2 footnote 5).
    Silent,
}

/// The engine's verdict for one classified input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub kind: ResponseKind,
    pub next_state: State,
}

impl Response {
    fn transmit(code: u16, text: &'static str, next_state: State) -> Self {
        Response {
            kind: ResponseKind::Transmit(code, text),
            next_state,
        }
    }

    fn silent(next_state: State) -> Self {
        Response {
            kind: ResponseKind::Silent,
            next_state,
        }
    }

    fn reject(state: State) -> Self {
        Response::transmit(503, "Bad sequence of commands", state)
    }

    /// `None` for silent responses - the driver must not write these.
    pub fn wire_line(&self) -> Option<String> {
        match self.kind {
            ResponseKind::Transmit(code, text) => Some(format!("{code} {text}")),
            ResponseKind::Silent => None,
        }
    }
}

/// Executes one classified action against the current state.
pub fn execute(action: Action, state: State) -> Response {
    use Action::*;
    use State::*;

    // Stateless actions answer identically from every state.
    match action {
        Rset => return Response::transmit(250, "OK", Greet),
        Vrfy | Expn => return Response::transmit(252, "Cannot VRFY user, but will accept message", state),
        Help => return Response::transmit(211, "See https://www.rfc-editor.org/rfc/rfc5321", state),
        Noop => return Response::transmit(250, "OK", state),
        _ => {}
    }

    match (action, state) {
        (Connect, Connect) => Response::transmit(220, "SMTP service ready", Greet),

        (Helo, Greet) | (Ehlo, Greet) => Response::transmit(250, "OK", Mail),

        (Mail, Mail) => Response::transmit(250, "OK", Rcpt),
        // Tolerates a pipelined new message after a prior QUIT acceptance
        // on the same connection (spec §4.2 footnote 2).
        (Mail, Quit) => Response::transmit(250, "OK", Rcpt),

        (Rcpt, Rcpt) => Response::transmit(250, "OK", Rcpt),

        (Data, Rcpt) => {
            Response::transmit(354, "Start mail input; end with <CRLF>.<CRLF>", DataHdr)
        }

        (DataEnd, DataHdr) | (DataEnd, DataBody) => Response::transmit(250, "OK", Quit),

        (Unrecog, DataHdr) => Response::silent(DataHdr),
        (Unrecog, DataBody) => Response::silent(DataBody),
        (Unrecog, _) => Response::transmit(500, "Command not recognized", state),

        (BlankLine, DataHdr) => Response::silent(DataBody),
        (BlankLine, DataBody) => Response::silent(DataBody),
        (BlankLine, _) => Response::reject(state),

        (Quit, Quit) => Response::transmit(221, "service closing transmission channel", Connect),

        // Extended authentication states (spec §4.1/§9). GREET_AUTH is
        // collapsed into AuthPlain - see DESIGN.md - so the prompt and the
        // handshake state are one and the same.
        (AuthPlain, Greet) | (AuthPlain, AuthPlain) => {
            Response::transmit(334, "", Credentials)
        }
        (AuthPlainExt, Greet) | (AuthPlainExt, AuthPlain) => {
            Response::transmit(235, "Authentication successful", Greet)
        }
        (AuthUnsupported, Greet) | (AuthUnsupported, AuthPlain) => {
            Response::transmit(504, "Unrecognized authentication type", state)
        }
        (AuthSuccess, Credentials) => Response::transmit(235, "Authentication successful", Greet),
        (AuthFailed, Credentials) => Response::transmit(501, "Authentication failed", Greet),

        // Every other (action, state) pair is undefined by the table and
        // defaults to a bad-sequence rejection with no state change.
        _ => Response::reject(state),
    }
}
