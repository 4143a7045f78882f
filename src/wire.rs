use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::vector::Vector2;

/// Two-byte sequence delimiting every message in both directions.
pub(crate) const TERMINATOR: &[u8] = b"\x07\x08";

static POSITION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^OK -?[0-9]+ -?[0-9]+$").unwrap());
static CONFIRMATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[0-9]{1,5}$").unwrap());

/// Messages the server sends, rendered with the trailing terminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ServerMessage {
    Confirmation(u16),
    Move,
    TurnLeft,
    TurnRight,
    PickUp,
    Logout,
    Ok,
    LoginFailed,
    SyntaxError,
    LogicError,
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Confirmation(code) => write!(f, "{code}\x07\x08"),
            ServerMessage::Move => write!(f, "102 MOVE\x07\x08"),
            ServerMessage::TurnLeft => write!(f, "103 TURN LEFT\x07\x08"),
            ServerMessage::TurnRight => write!(f, "104 TURN RIGHT\x07\x08"),
            ServerMessage::PickUp => write!(f, "105 GET MESSAGE\x07\x08"),
            ServerMessage::Logout => write!(f, "106 LOGOUT\x07\x08"),
            ServerMessage::Ok => write!(f, "200 OK\x07\x08"),
            ServerMessage::LoginFailed => write!(f, "300 LOGIN FAILED\x07\x08"),
            ServerMessage::SyntaxError => write!(f, "301 SYNTAX ERROR\x07\x08"),
            ServerMessage::LogicError => write!(f, "302 LOGIC ERROR\x07\x08"),
        }
    }
}

/// What the session expects to read next. Each state carries its own frame
/// length cap and grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Expect {
    Username,
    Confirmation,
    Position,
    Pickup,
    FullPower,
}

impl Expect {
    /// Maximum frame length in bytes, terminator included. Reading this many
    /// bytes without a terminator is a syntax error.
    pub(crate) fn max_frame(self) -> usize {
        match self {
            Expect::Username => 20,
            // 12 rather than 7 so that RECHARGING still fits; the digit
            // grammar bounds the code itself.
            Expect::Confirmation => 12,
            Expect::Position => 12,
            Expect::Pickup => 100,
            Expect::FullPower => 12,
        }
    }
}

/// A classified client message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ClientMessage {
    Username(String),
    Confirmation(u16),
    Position(Vector2),
    Recharging,
    FullPower,
    Secret(Vec<u8>),
}

/// Classifies a framed payload (terminator stripped) against the grammar of
/// the current state.
pub(crate) fn parse(expect: Expect, payload: &[u8]) -> Result<ClientMessage, SessionError> {
    match expect {
        Expect::Username => {
            // Anything printable goes; before login even the protocol
            // literals are just usernames.
            let name = std::str::from_utf8(payload).map_err(|_| SessionError::Syntax)?;
            if name.len() > Expect::Username.max_frame() - TERMINATOR.len() {
                return Err(SessionError::Syntax);
            }
            Ok(ClientMessage::Username(name.to_owned()))
        }
        Expect::Confirmation => match std::str::from_utf8(payload) {
            Ok("RECHARGING") => Ok(ClientMessage::Recharging),
            Ok("FULL POWER") => Ok(ClientMessage::FullPower),
            Ok(text) if CONFIRMATION_RE.is_match(text) => {
                let code: u32 = text.parse().map_err(|_| SessionError::Syntax)?;
                let code = u16::try_from(code).map_err(|_| SessionError::Syntax)?;
                Ok(ClientMessage::Confirmation(code))
            }
            _ => Err(SessionError::Syntax),
        },
        Expect::Position => match std::str::from_utf8(payload) {
            Ok("RECHARGING") => Ok(ClientMessage::Recharging),
            Ok("FULL POWER") => Ok(ClientMessage::FullPower),
            Ok(text) if POSITION_RE.is_match(text) => {
                let mut coords = text.split(' ').skip(1);
                let (Some(x), Some(y)) = (coords.next(), coords.next()) else {
                    return Err(SessionError::Syntax);
                };
                let x = x.parse().map_err(|_| SessionError::Syntax)?;
                let y = y.parse().map_err(|_| SessionError::Syntax)?;
                Ok(ClientMessage::Position(Vector2::new(x, y)))
            }
            _ => Err(SessionError::Syntax),
        },
        Expect::Pickup => match payload {
            b"RECHARGING" => Ok(ClientMessage::Recharging),
            b"FULL POWER" => Ok(ClientMessage::FullPower),
            // The picked-up message is opaque and may be empty.
            _ => Ok(ClientMessage::Secret(payload.to_vec())),
        },
        Expect::FullPower => {
            if payload == b"FULL POWER" {
                Ok(ClientMessage::FullPower)
            } else {
                // While charging, nothing else is legal.
                Err(SessionError::Logic)
            }
        }
    }
}

/// Everything that can end a session early. The first three carry a fixed
/// wire literal; timeouts and I/O failures close the connection silently.
#[derive(Debug, Error)]
pub(crate) enum SessionError {
    #[error("malformed message")]
    Syntax,
    #[error("message out of order")]
    Logic,
    #[error("confirmation code mismatch")]
    LoginFailed,
    #[error("client idle past deadline")]
    TimedOut,
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Final response owed to the client, if any.
    pub(crate) fn response(&self) -> Option<ServerMessage> {
        match self {
            SessionError::Syntax => Some(ServerMessage::SyntaxError),
            SessionError::Logic => Some(ServerMessage::LogicError),
            SessionError::LoginFailed => Some(ServerMessage::LoginFailed),
            SessionError::TimedOut | SessionError::Io(_) => None,
        }
    }
}
