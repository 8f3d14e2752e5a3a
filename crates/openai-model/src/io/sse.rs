use super::{Chunks, ChunksError};

#[derive(Debug, PartialEq, Eq)]
pub enum Error {
    ChunksError(ChunksError),
    InvalidPayload,
}

/// A type for reading server-sent events from a chunk stream.
///
/// Only the `data` field is surfaced. Comments and the other fields are
/// skipped, and multiple `data` lines of one event are joined with line
/// feeds.
pub struct Sse {
    buf: String,
    pending_bytes: Vec<u8>,
    // A trailing `\r` may be the first half of a `\r\n` split across chunks.
    pending_cr: bool,
    chunks: Chunks,
}

impl Sse {
    #[inline]
    pub fn new(chunks: Chunks) -> Self {
        Self {
            buf: String::new(),
            pending_bytes: Vec::new(),
            pending_cr: false,
            chunks,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<String>, Error> {
        loop {
            // Drain the events that are already buffered first.
            if let Some(event) = self.try_parse_event()? {
                return Ok(Some(event));
            }

            let Some(bytes) =
                self.chunks.next_chunk().await.map_err(Error::ChunksError)?
            else {
                if std::mem::take(&mut self.pending_cr) {
                    self.buf.push('\n');
                    continue;
                }
                // Abort if no more data available.
                return Ok(None);
            };
            self.push_bytes(&bytes)?;
        }
    }

    /// Appends bytes to the buffer, keeping an incomplete UTF-8 sequence
    /// at the end around until the rest of it arrives.
    ///
    /// Line endings are normalized to line feeds.
    fn push_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.pending_bytes.extend_from_slice(bytes);
        let valid_len = match str::from_utf8(&self.pending_bytes) {
            Ok(s) => s.len(),
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            Err(_) => return Err(Error::InvalidPayload),
        };
        let rest = self.pending_bytes.split_off(valid_len);
        let valid = std::mem::replace(&mut self.pending_bytes, rest);
        let mut valid =
            String::from_utf8(valid).map_err(|_| Error::InvalidPayload)?;
        if std::mem::take(&mut self.pending_cr) {
            valid.insert(0, '\r');
        }
        if valid.ends_with('\r') {
            valid.pop();
            self.pending_cr = true;
        }
        self.buf
            .push_str(&valid.replace("\r\n", "\n").replace('\r', "\n"));
        Ok(())
    }

    fn try_parse_event(&mut self) -> Result<Option<String>, Error> {
        // `end-of-line` is always a line feed here, see `push_bytes`.
        //
        // event         = *( comment / field ) end-of-line
        // comment       = colon *any-char end-of-line
        // field         = 1*name-char [ colon [ space ] *any-char ] end-of-line
        // end-of-line   = ( cr lf / cr / lf )
        while let Some(eol_idx) = self.buf.find("\n\n") {
            let mut data: Option<String> = None;
            for line in self.buf[0..eol_idx].lines() {
                if line.starts_with(':') {
                    continue;
                }
                let Some((name, value)) = line.split_once(':') else {
                    return Err(Error::InvalidPayload);
                };
                if name != "data" {
                    continue;
                }
                let value = value.strip_prefix(' ').unwrap_or(value);
                match &mut data {
                    Some(data) => {
                        data.push('\n');
                        data.push_str(value);
                    }
                    None => data = Some(value.to_owned()),
                }
            }

            // Consume the bytes from the buffer.
            self.buf.drain(0..eol_idx + 2);

            if data.is_some() {
                return Ok(data);
            }
        }
        Ok(None)
    }
}
