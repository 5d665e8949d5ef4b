//! Turns a chunked HTTP body into text as it arrives.
//!
//! Chunk boundaries are arbitrary, so a multi-byte character can be split
//! across two chunks. [`Utf8StreamDecoder`] holds back an incomplete tail
//! until the rest arrives and replaces genuinely invalid bytes with U+FFFD.

use futures_util::{Stream, StreamExt};

use crate::metrics;

const REPLACEMENT: char = '\u{FFFD}';

#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes as much of `pending + bytes` as is complete.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    // valid_up_to guarantees this slice is UTF-8
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(REPLACEMENT);
                            start = valid_end + bad;
                        }
                        None => {
                            // incomplete sequence at the end, wait for more bytes
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flushes whatever is still held back. An incomplete tail becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }
}

/// Accumulates decoded text and reports what each chunk added.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    decoder: Utf8StreamDecoder,
    content: String,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk. Returns the newly decoded text, possibly empty.
    pub fn push(&mut self, chunk: &[u8]) -> String {
        let delta = self.decoder.decode(chunk);
        self.content.push_str(&delta);
        delta
    }

    /// Flushes the decoder. Returns the final delta.
    pub fn finish(&mut self) -> String {
        let delta = self.decoder.finish();
        self.content.push_str(&delta);
        delta
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }
}

/// Drains `stream`, calling `on_update(delta, content_so_far)` for every
/// non-empty delta. Stops at the first stream error.
pub async fn assemble<S, B, F>(stream: S, mut on_update: F) -> anyhow::Result<String>
where
    S: Stream<Item = anyhow::Result<B>>,
    B: AsRef<[u8]>,
    F: FnMut(&str, &str),
{
    futures_util::pin_mut!(stream);
    let mut assembler = StreamAssembler::new();

    while let Some(chunk) = stream.next().await {
        let delta = assembler.push(chunk?.as_ref());
        if !delta.is_empty() {
            metrics::inc_stream_chunks();
            on_update(&delta, assembler.content());
        }
    }

    let tail = assembler.finish();
    if !tail.is_empty() {
        on_update(&tail, assembler.content());
    }
    Ok(assembler.into_content())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use proptest::prelude::*;

    #[test]
    fn test_split_multibyte_character_is_held_back() {
        let bytes = "é".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), "");
        assert_eq!(decoder.decode(&bytes[1..]), "é");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_become_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_tail_is_flushed_as_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[b'x', 0xE2, 0x82]), "x");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[tokio::test]
    async fn test_assemble_reports_growing_content() {
        let chunks = vec![Ok(b"Hel".to_vec()), Ok(b"lo".to_vec())];
        let mut seen = Vec::new();
        let content = assemble(stream::iter(chunks), |_, so_far| seen.push(so_far.to_string()))
            .await
            .unwrap();

        assert_eq!(content, "Hello");
        assert_eq!(seen, vec!["Hel", "Hello"]);
    }

    #[tokio::test]
    async fn test_assemble_stops_on_error() {
        let chunks: Vec<anyhow::Result<Vec<u8>>> = vec![
            Ok(b"partial".to_vec()),
            Err(anyhow::anyhow!("connection reset")),
            Ok(b"never".to_vec()),
        ];
        let mut seen = String::new();
        let result = assemble(stream::iter(chunks), |delta, _| seen.push_str(delta)).await;

        assert!(result.is_err());
        assert_eq!(seen, "partial");
    }

    #[test]
    fn test_assemble_blocking_helper() {
        let chunks = vec![Ok(vec![0xC3]), Ok(vec![0xA9, b'!'])];
        let content = tokio_test::block_on(assemble(stream::iter(chunks), |_, _| {})).unwrap();
        assert_eq!(content, "é!");
    }

    proptest! {
        #[test]
        fn prop_deltas_concatenate_to_input(text in "\\PC{0,64}", cuts in proptest::collection::vec(0usize..256, 0..8)) {
            let bytes = text.as_bytes();
            let mut points: Vec<usize> = cuts.into_iter().map(|c| c % (bytes.len() + 1)).collect();
            points.push(0);
            points.push(bytes.len());
            points.sort_unstable();
            points.dedup();

            let mut assembler = StreamAssembler::new();
            let mut joined = String::new();
            for window in points.windows(2) {
                joined.push_str(&assembler.push(&bytes[window[0]..window[1]]));
            }
            joined.push_str(&assembler.finish());

            prop_assert_eq!(&joined, &text);
            prop_assert_eq!(assembler.content(), text.as_str());
        }
    }
}
