//! Line-delimited JSON framing.
//!
//! One message per line: the JSON text followed by `\n`. serde_json never
//! emits raw newlines inside a value, so a newline always ends a message.
//!
//! `MAX_LINE_LEN` bounds how much a single read may buffer, so a peer that
//! never sends a newline cannot make us allocate without limit.

use std::io::{self, BufRead, Read, Write};

use serde::{Serialize, de::DeserializeOwned};

pub const MAX_LINE_LEN: u64 = 64 * 1024;

/// Write one message and flush.
pub fn write_message<W: Write, T: Serialize>(writer: &mut W, msg: &T) -> io::Result<()> {
    serde_json::to_writer(&mut *writer, msg)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

/// Read one message. `Ok(None)` means the peer closed the stream.
///
/// Returns `InvalidData` for malformed JSON or lines over `MAX_LINE_LEN`
/// (not counting the newline). The rest of an oversized line is discarded,
/// so the next call starts at the following message.
pub fn read_message<R: BufRead, T: DeserializeOwned>(reader: &mut R) -> io::Result<Option<T>> {
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .by_ref()
            .take(MAX_LINE_LEN + 1)
            .read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n') && read as u64 > MAX_LINE_LEN {
            reader.skip_until(b'\n')?;
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("message longer than {MAX_LINE_LEN} bytes"),
            ));
        }
        // blank lines are keep-alives
        if line.trim_ascii().is_empty() {
            continue;
        }
        return serde_json::from_slice(&line)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::message::{ClientMessage, ServerEvent};
    use std::io::Cursor;

    #[test]
    fn messages_in_sequence() -> anyhow::Result<()> {
        let mut buf = Vec::new();
        write_message(&mut buf, &ClientMessage::Guess { index: 3 })?;
        write_message(&mut buf, &ClientMessage::Goodbye)?;
        assert_eq!(buf.iter().filter(|&&b| b == b'\n').count(), 2);

        let mut cursor = Cursor::new(buf);
        let first: Option<ClientMessage> = read_message(&mut cursor)?;
        let second: Option<ClientMessage> = read_message(&mut cursor)?;
        let end: Option<ClientMessage> = read_message(&mut cursor)?;

        assert_eq!(first, Some(ClientMessage::Guess { index: 3 }));
        assert_eq!(second, Some(ClientMessage::Goodbye));
        assert_eq!(end, None);
        Ok(())
    }

    #[test]
    fn skips_blank_lines() -> anyhow::Result<()> {
        let mut cursor = Cursor::new(b"\n  \n{\"type\":\"goodbye\"}\n".to_vec());
        let msg: Option<ClientMessage> = read_message(&mut cursor)?;
        assert_eq!(msg, Some(ClientMessage::Goodbye));
        Ok(())
    }

    #[test]
    fn last_line_without_newline_is_accepted() -> anyhow::Result<()> {
        let mut cursor = Cursor::new(b"{\"type\":\"goodbye\"}".to_vec());
        let msg: Option<ClientMessage> = read_message(&mut cursor)?;
        assert_eq!(msg, Some(ClientMessage::Goodbye));
        Ok(())
    }

    #[test]
    fn rejects_malformed_json() {
        let mut cursor = Cursor::new(b"{\"type\":\n".to_vec());
        let err = read_message::<_, ClientMessage>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn rejects_oversized_line() {
        let long = vec![b'x'; MAX_LINE_LEN as usize + 10];
        let mut cursor = Cursor::new(long);
        let err = read_message::<_, ClientMessage>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_line_is_skipped_entirely() -> anyhow::Result<()> {
        let mut input = vec![b'x'; MAX_LINE_LEN as usize * 2];
        input.extend_from_slice(b"\n{\"type\":\"goodbye\"}\n");
        let mut cursor = Cursor::new(input);

        let err = read_message::<_, ClientMessage>(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let next: Option<ClientMessage> = read_message(&mut cursor)?;
        assert_eq!(next, Some(ClientMessage::Goodbye));
        Ok(())
    }

    #[test]
    fn accepts_a_message_of_exactly_the_limit() -> anyhow::Result<()> {
        let prefix = r#"{"type":"error","message":""#;
        let suffix = r#""}"#;
        let filler = "m".repeat(MAX_LINE_LEN as usize - prefix.len() - suffix.len());
        let line = format!("{prefix}{filler}{suffix}\n");
        assert_eq!(line.len() as u64, MAX_LINE_LEN + 1);

        let mut cursor = Cursor::new(line.into_bytes());
        let msg: Option<ServerEvent> = read_message(&mut cursor)?;
        assert!(matches!(msg, Some(ServerEvent::Error { message }) if message == filler));
        Ok(())
    }
}
