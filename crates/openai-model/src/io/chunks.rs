#[cfg(test)]
use std::collections::VecDeque;

use bytes::Bytes;
use reqwest::Response;

/// Failed to read the next chunk from the connection.
#[derive(Debug, PartialEq, Eq)]
pub struct Error(pub String);

enum Source {
    Response(Response),
    #[cfg(test)]
    Canned(VecDeque<Bytes>),
}

/// The raw body of a streaming completion, chunk by chunk.
pub struct Chunks {
    source: Source,
    received: usize,
}

impl Chunks {
    pub fn from_response(response: Response) -> Self {
        Self::new(Source::Response(response))
    }

    /// Replays canned chunks, for parsing tests.
    #[cfg(test)]
    pub fn from_vec_deque(chunks: VecDeque<Bytes>) -> Self {
        Self::new(Source::Canned(chunks))
    }

    fn new(source: Source) -> Self {
        Self {
            source,
            received: 0,
        }
    }

    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        let chunk = match &mut self.source {
            Source::Response(response) => {
                response.chunk().await.map_err(|err| {
                    warn!(
                        "stream broke after {} bytes: {err}",
                        self.received
                    );
                    Error(err.to_string())
                })?
            }
            #[cfg(test)]
            Source::Canned(chunks) => chunks.pop_front(),
        };
        match &chunk {
            Some(bytes) => self.received += bytes.len(),
            None => trace!("stream ended after {} bytes", self.received),
        }
        Ok(chunk)
    }
}
