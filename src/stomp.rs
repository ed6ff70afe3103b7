//! STOMP 1.2 frame codec.
//!
//! A frame is `COMMAND\n(header:value\n)*\n body \0`. Header values are
//! escaped (`\\`, `\n`, `\r`, `\c`) except in `CONNECT` and `CONNECTED`
//! frames. A `content-length` header bounds the body; without it the body
//! runs to the first NUL. Bare EOLs between frames are heart-beats.

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StompError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("malformed header line '{0}'")]
    MalformedHeader(String),
    #[error("invalid escape sequence in '{0}'")]
    InvalidEscape(String),
    #[error("frame is not terminated by NUL")]
    Unterminated,
    #[error("frame is not valid UTF-8")]
    Encoding,
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

    pub fn parse(s: &str) -> Result<Self, StompError> {
        let command = match s {
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
        };
        Ok(command)
    }

    fn escapes_headers(self) -> bool {
        !matches!(self, Command::Connect | Command::Connected)
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
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First occurrence wins when a header repeats.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_text(&self) -> Result<&str, StompError> {
        std::str::from_utf8(&self.body).map_err(|_| StompError::Encoding)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(self.command.as_str().as_bytes());
        out.push(b'\n');
        let escape = self.command.escapes_headers();
        for (name, value) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(name).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(value).as_bytes());
            } else {
                out.extend_from_slice(name.as_bytes());
                out.push(b':');
                out.extend_from_slice(value.as_bytes());
            }
            out.push(b'\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.extend_from_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }

    /// Encoded frame as text for WebSocket text messages.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.encode()).into_owned()
    }
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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

fn unescape_header(s: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
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
            _ => return Err(StompError::InvalidEscape(s.to_string())),
        }
    }
    Ok(out)
}

fn split_line(buf: &[u8]) -> Option<(&[u8], &[u8])> {
    let end = buf.iter().position(|&b| b == b'\n')?;
    let line = &buf[..end];
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    Some((line, &buf[end + 1..]))
}

/// Decodes every complete frame in `buf`; returns them and the number of
/// bytes consumed. A trailing partial frame is left in place.
pub fn decode_frames(buf: &[u8]) -> Result<(Vec<Frame>, usize), StompError> {
    let mut frames = Vec::new();
    let mut consumed = 0;
    loop {
        let rest = &buf[consumed..];
        let skip = rest
            .iter()
            .take_while(|&&b| b == b'\n' || b == b'\r')
            .count();
        if skip == rest.len() {
            consumed += skip;
            return Ok((frames, consumed));
        }
        match decode_one(&rest[skip..])? {
            Some((frame, used)) => {
                frames.push(frame);
                consumed += skip + used;
            }
            None => {
                consumed += skip;
                return Ok((frames, consumed));
            }
        }
    }
}

/// Decodes exactly one frame, ignoring leading heart-beats.
pub fn decode(buf: &[u8]) -> Result<Frame, StompError> {
    let (mut frames, _) = decode_frames(buf)?;
    if frames.is_empty() {
        return Err(StompError::Unterminated);
    }
    Ok(frames.remove(0))
}

fn decode_one(buf: &[u8]) -> Result<Option<(Frame, usize)>, StompError> {
    let Some((line, mut rest)) = split_line(buf) else {
        return Ok(None);
    };
    let command_text = std::str::from_utf8(line).map_err(|_| StompError::Encoding)?;
    let command = Command::parse(command_text)?;
    let escape = command.escapes_headers();

    let mut headers = Vec::new();
    loop {
        let Some((line, next)) = split_line(rest) else {
            return Ok(None);
        };
        rest = next;
        if line.is_empty() {
            break;
        }
        let text = std::str::from_utf8(line).map_err(|_| StompError::Encoding)?;
        let (name, value) = text
            .split_once(':')
            .ok_or_else(|| StompError::MalformedHeader(text.to_string()))?;
        if escape {
            headers.push((unescape_header(name)?, unescape_header(value)?));
        } else {
            headers.push((name.to_string(), value.to_string()));
        }
    }

    let length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .and_then(|(_, v)| v.trim().parse::<usize>().ok());
    let (body, after) = match length {
        Some(n) => {
            if rest.len() <= n {
                return Ok(None);
            }
            if rest[n] != 0 {
                return Err(StompError::Unterminated);
            }
            (&rest[..n], n + 1)
        }
        None => match rest.iter().position(|&b| b == 0) {
            Some(n) => (&rest[..n], n + 1),
            None => return Ok(None),
        },
    };
    let used = buf.len() - rest.len() + after;
    Ok(Some((
        Frame {
            command,
            headers,
            body: body.to_vec(),
        },
        used,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_send_frame() {
        let raw = b"SEND\ndestination:/app/entry\ncontent-type:application/json\n\n{\"name\":\"neo\"}\0";
        let frame = decode(raw).unwrap();
        assert_eq!(frame.command, Command::Send);
        assert_eq!(frame.get("destination"), Some("/app/entry"));
        assert_eq!(frame.body_text().unwrap(), "{\"name\":\"neo\"}");
    }

    #[test]
    fn encodes_with_content_length_and_nul() {
        let bytes = Frame::new(Command::Message)
            .header("destination", "/notice")
            .body("hi")
            .encode();
        assert_eq!(bytes, b"MESSAGE\ndestination:/notice\ncontent-length:2\n\nhi\0".to_vec());
    }

    #[test]
    fn header_escaping_applies_outside_connect() {
        let frame = Frame::new(Command::Send).header("k", "a:b\nc");
        let decoded = decode(&frame.encode()).unwrap();
        assert_eq!(decoded.get("k"), Some("a:b\nc"));

        let connect = Frame::new(Command::Connect).header("passcode", "a\\b");
        let text = connect.to_text();
        assert!(text.contains("passcode:a\\b\n"));
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let raw = b"SEND\ndestination:/x\ncontent-length:3\n\na\0b\0";
        let frame = decode(raw).unwrap();
        assert_eq!(frame.body, b"a\0b".to_vec());
    }

    #[test]
    fn splits_several_frames_and_keeps_partial_tail() {
        let mut raw = b"\nCONNECT\naccept-version:1.2\n\n\0\r\nSUBSCRIBE\nid:0\ndestination:/notice\n\n\0".to_vec();
        raw.extend_from_slice(b"SEND\ndestination:/app/chat\n\n{\"na");
        let (frames, used) = decode_frames(&raw).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].command, Command::Subscribe);
        assert!(raw[used..].starts_with(b"SEND"));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(
            decode(b"FLY\n\n\0"),
            Err(StompError::UnknownCommand("FLY".into()))
        );
        assert!(matches!(
            decode(b"SEND\nnocolon\n\n\0"),
            Err(StompError::MalformedHeader(_))
        ));
        assert!(matches!(
            decode(b"SEND\nk:\\t\n\n\0"),
            Err(StompError::InvalidEscape(_))
        ));
        assert_eq!(decode(b"\n\n"), Err(StompError::Unterminated));
    }
}
