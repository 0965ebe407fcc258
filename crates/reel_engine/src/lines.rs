use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

/// Longest line kept; anything beyond is dropped up to the next terminator.
const MAX_LINE_BYTES: usize = 64 * 1024;

/// Splits tool output on `\r` or `\n`.
///
/// Progress bars redraw in place with bare carriage returns, so both count as
/// terminators. Lines are decoded lossily and trimmed; blank lines are skipped.
#[derive(Debug, Default)]
pub struct OutputLineCodec {
    discarding: bool,
}

impl OutputLineCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for OutputLineCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        loop {
            let Some(end) = src.iter().position(|b| *b == b'\n' || *b == b'\r') else {
                if src.len() > MAX_LINE_BYTES {
                    src.clear();
                    self.discarding = true;
                }
                return Ok(None);
            };

            let line = src.split_to(end);
            src.advance(1);
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                return Ok(Some(text.to_string()));
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        let rest = src.split();
        if std::mem::take(&mut self.discarding) {
            return Ok(None);
        }
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(input: &[u8]) -> Vec<String> {
        let mut codec = OutputLineCodec::new();
        let mut buf = BytesMut::from(input);
        let mut lines = Vec::new();
        while let Some(line) = codec.decode_eof(&mut buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn splits_on_carriage_returns_and_newlines() {
        let lines = drain(b"[download]   1.0% of 10MiB\r[download]  50.0% of 10MiB\r\nDone\n");
        assert_eq!(
            lines,
            vec![
                "[download]   1.0% of 10MiB",
                "[download]  50.0% of 10MiB",
                "Done"
            ]
        );
    }

    #[test]
    fn waits_for_terminator_until_eof() {
        let mut codec = OutputLineCodec::new();
        let mut buf = BytesMut::from(&b"partial"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), Some("partial".to_string()));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        assert_eq!(drain(b"caf\xE9\n"), vec!["caf\u{FFFD}"]);
    }
}
