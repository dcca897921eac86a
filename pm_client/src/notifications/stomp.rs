//! Minimal STOMP 1.2 frame codec.
//!
//! Only what the notification channel needs: building client frames and
//! parsing the frames the broker sends back over a WebSocket text message.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StompError {
    #[error("empty frame")]
    Empty,
    #[error("unknown STOMP command: {0}")]
    UnknownCommand(String),
    #[error("malformed header line: {0}")]
    MalformedHeader(String),
    #[error("invalid escape sequence in header: {0}")]
    BadEscape(String),
    #[error("frame is not terminated by NUL")]
    MissingNul,
    #[error("invalid content-length: {0}")]
    BadContentLength(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Send,
    Subscribe,
    Unsubscribe,
    Ack,
    Nack,
    Begin,
    Commit,
    Abort,
    Disconnect,
    Message,
    Receipt,
    Error,
}

impl Command {
    pub fn as_str(self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Send => "SEND",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Ack => "ACK",
            Command::Nack => "NACK",
            Command::Begin => "BEGIN",
            Command::Commit => "COMMIT",
            Command::Abort => "ABORT",
            Command::Disconnect => "DISCONNECT",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
        }
    }

    /// CONNECT and CONNECTED frames carry their headers unescaped.
    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SEND" => Command::Send,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "ACK" => Command::Ack,
            "NACK" => Command::Nack,
            "BEGIN" => Command::Begin,
            "COMMIT" => Command::Commit,
            "ABORT" => Command::Abort,
            "DISCONNECT" => Command::Disconnect,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            other => return Err(StompError::UnknownCommand(other.to_string())),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `key`; repeated headers keep the first occurrence.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The `heart-beat` header as `(cx, cy)` milliseconds, `(0, 0)` when absent.
    pub fn heart_beat(&self) -> (u64, u64) {
        self.get("heart-beat")
            .and_then(|v| {
                let (cx, cy) = v.split_once(',')?;
                Some((cx.trim().parse().ok()?, cy.trim().parse().ok()?))
            })
            .unwrap_or((0, 0))
    }

    pub fn encode(&self) -> String {
        let escape = self.command.escapes_headers();
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');
        for (k, v) in &self.headers {
            if escape {
                out.push_str(&escape_header(k));
                out.push(':');
                out.push_str(&escape_header(v));
            } else {
                out.push_str(k);
                out.push(':');
                out.push_str(v);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parses one frame. `Ok(None)` is a heart-beat (a bare EOL).
    /// Anything after the first frame's NUL is ignored; see [`Frame::frames`].
    pub fn parse(raw: &str) -> Result<Option<Frame>, StompError> {
        Ok(Self::parse_prefix(raw)?.map(|(frame, _)| frame))
    }

    /// Every frame in one transport message, in order. Stops after the
    /// first malformed frame.
    pub fn frames(raw: &str) -> Frames<'_> {
        Frames {
            rest: raw,
            failed: false,
        }
    }

    /// Parses the leading frame and returns it with the unread remainder.
    fn parse_prefix(raw: &str) -> Result<Option<(Frame, &str)>, StompError> {
        let text = raw.trim_start_matches(['\r', '\n']);
        if text.is_empty() {
            return if raw.is_empty() {
                Err(StompError::Empty)
            } else {
                Ok(None)
            };
        }

        let (command_line, mut rest) = split_line(text);
        let command: Command = command_line.parse()?;
        let escaped = command.escapes_headers();

        let mut headers = Vec::new();
        loop {
            if rest.is_empty() {
                return Err(StompError::MissingNul);
            }
            let (line, tail) = split_line(rest);
            rest = tail;
            if line.is_empty() {
                break;
            }
            let (k, v) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
            if escaped {
                headers.push((unescape_header(k)?, unescape_header(v)?));
            } else {
                headers.push((k.to_string(), v.to_string()));
            }
        }

        let frame_len = headers
            .iter()
            .find(|(k, _)| k == "content-length")
            .map(|(_, v)| {
                v.parse::<usize>()
                    .map_err(|_| StompError::BadContentLength(v.clone()))
            })
            .transpose()?;

        let end = match frame_len {
            Some(len) => {
                if rest.get(..len).is_none() {
                    return Err(StompError::BadContentLength(len.to_string()));
                }
                if !rest[len..].starts_with('\0') {
                    return Err(StompError::MissingNul);
                }
                len
            }
            None => rest.find('\0').ok_or(StompError::MissingNul)?,
        };

        let frame = Frame {
            command,
            headers,
            body: rest[..end].to_string(),
        };
        Ok(Some((frame, &rest[end + 1..])))
    }
}

/// Iterator returned by [`Frame::frames`].
pub struct Frames<'a> {
    rest: &'a str,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame, StompError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.trim_start_matches(['\r', '\n']).is_empty() {
            return None;
        }
        match Frame::parse_prefix(self.rest) {
            Ok(Some((frame, tail))) => {
                self.rest = tail;
                Some(Ok(frame))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn split_line(text: &str) -> (&str, &str) {
    match text.find('\n') {
        Some(i) => (text[..i].trim_end_matches('\r'), &text[i + 1..]),
        None => (text.trim_end_matches('\r'), ""),
    }
}

fn escape_header(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            _ => return Err(StompError::BadEscape(raw.to_string())),
        }
    }
    Ok(out)
}

/// Resolves the heart-beat intervals of a session.
///
/// Returns `(send_every, expect_within)`; `None` disables that direction.
pub fn negotiate_heartbeat(
    client: (u64, u64),
    server: (u64, u64),
) -> (Option<Duration>, Option<Duration>) {
    let pick = |ours: u64, theirs: u64| {
        (ours > 0 && theirs > 0).then(|| Duration::from_millis(ours.max(theirs)))
    };
    (pick(client.0, server.1), pick(client.1, server.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_frame_is_not_escaped() {
        let frame = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("heart-beat", "10000,10000");
        assert_eq!(
            frame.encode(),
            "CONNECT\naccept-version:1.2\nheart-beat:10000,10000\n\n\0"
        );
    }

    #[test]
    fn parses_message_with_escaped_headers() {
        let raw = "MESSAGE\r\ndestination:/user/queue/notifications\nx-note:a\\cb\\\\c\\n\n\n{\"id\":\"1\"}\0\n";
        let frame = Frame::parse(raw).unwrap().unwrap();
        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("destination"), Some("/user/queue/notifications"));
        assert_eq!(frame.get("x-note"), Some("a:b\\c\n"));
        assert_eq!(frame.body, "{\"id\":\"1\"}");
    }

    #[test]
    fn escaping_survives_encode_and_parse() {
        let frame = Frame::new(Command::Send)
            .header("weird:key", "line\nbreak\\")
            .body("hi");
        let parsed = Frame::parse(&frame.encode()).unwrap().unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn bare_eol_is_a_heartbeat() {
        assert_eq!(Frame::parse("\n"), Ok(None));
        assert_eq!(Frame::parse("\r\n"), Ok(None));
        assert_eq!(Frame::parse(""), Err(StompError::Empty));
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let raw = "MESSAGE\ncontent-length:3\n\na\0b\0";
        let frame = Frame::parse(raw).unwrap().unwrap();
        assert_eq!(frame.body, "a\0b");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            Frame::parse("HELLO\n\n\0"),
            Err(StompError::UnknownCommand("HELLO".into()))
        );
        assert_eq!(Frame::parse("MESSAGE\nnocolon\n\n\0"), Err(StompError::MalformedHeader("nocolon".into())));
        assert_eq!(Frame::parse("MESSAGE\n\nbody"), Err(StompError::MissingNul));
    }

    #[test]
    fn one_message_can_carry_several_frames() {
        let first = Frame::new(Command::Message).header("message-id", "1").body("a");
        let second = Frame::new(Command::Message)
            .header("message-id", "2")
            .header("content-length", "3")
            .body("b\0c");
        let raw = format!("{}\n{}\n", first.encode(), second.encode());

        let frames: Vec<Frame> = Frame::frames(&raw).collect::<Result<_, _>>().unwrap();
        assert_eq!(frames, vec![first.clone(), second]);
        assert_eq!(Frame::parse(&raw).unwrap(), Some(first));

        assert_eq!(Frame::frames("\n").count(), 0);
        let broken: Vec<_> = Frame::frames("MESSAGE\n\nok\0BOGUS\n\n\0MESSAGE\n\nlost\0").collect();
        assert_eq!(broken.len(), 2);
        assert_eq!(broken[0].as_ref().unwrap().body, "ok");
        assert!(broken[1].is_err());
    }

    #[test]
    fn heartbeat_negotiation() {
        let frame = Frame::new(Command::Connected).header("heart-beat", "0,20000");
        assert_eq!(frame.heart_beat(), (0, 20000));
        let (send, expect) = negotiate_heartbeat((10000, 10000), frame.heart_beat());
        assert_eq!(send, Some(Duration::from_millis(20000)));
        assert_eq!(expect, None);
    }
}
