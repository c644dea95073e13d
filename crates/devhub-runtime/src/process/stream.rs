//! Async stream log readers (non-UTF8-safe).
//!
//! Supervised tools can emit non-UTF8 bytes on stdout/stderr, and
//! `BufReader::lines()` would end the reader on the first invalid byte.
//! Lines are read as bytes and decoded lossily instead.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::debug;

pub(crate) fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    process_id: Arc<str>,
    stream_type: &'static str,
) {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }

                    let line = String::from_utf8_lossy(&buf);
                    debug!(id = %process_id, %stream_type, "{line}");
                }
                Err(e) => {
                    debug!(id = %process_id, %stream_type, error = %e, "output reader exiting due to read error");
                    break;
                }
            }
        }

        debug!(id = %process_id, %stream_type, "output reader task exiting");
    });
}
