//! Git pkt-line framing.
//!
//! Each line is prefixed with a 4-character hex length that counts the
//! prefix itself. `0000`, `0001` and `0002` are 4-byte special packets.

use crate::{GitError, Result};
use std::ops::Range;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 4;

/// Length of a hex SHA-1 object id.
const OID_HEX_LEN: usize = 40;

/// Suffix marking a peeled annotated tag.
const PEEL_SUFFIX: &str = "^{}";

/// A pkt-line packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Data line with content.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
}

impl PktLine {
    /// Creates a data packet from a string slice.
    pub fn from_string(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }

    /// Creates a data packet from bytes.
    pub fn from_bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Data(b.into())
    }

    /// Encodes the packet to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Appends the encoded packet to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::Data(data) => {
                out.extend_from_slice(format!("{:04x}", data.len() + HEADER_LEN).as_bytes());
                out.extend_from_slice(data);
            }
            Self::Flush => out.extend_from_slice(b"0000"),
        }
    }
}

/// A ref line of an advertisement: `<oid> <name>[\0<capabilities>][\n]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefLine<'a> {
    /// Hex object id.
    pub object_id: &'a str,
    /// Ref name with any `^{}` peel marker removed.
    pub name: &'a str,
    /// Whether the name carried a `^{}` peel marker.
    pub peeled: bool,
    /// Capability list after the NUL, without the trailing newline.
    pub capabilities: Option<&'a [u8]>,
}

impl<'a> RefLine<'a> {
    /// Parses a chunk payload. Returns `None` for anything that is not a ref
    /// line, including the `# service=` header.
    pub fn parse(payload: &'a [u8]) -> Option<Self> {
        if payload.first() == Some(&b'#') {
            return None;
        }
        let oid = payload.get(..OID_HEX_LEN)?;
        if payload.get(OID_HEX_LEN) != Some(&b' ') || !oid.iter().all(u8::is_ascii_hexdigit) {
            return None;
        }

        let rest = &payload[OID_HEX_LEN + 1..];
        let name_end = rest
            .iter()
            .position(|&b| b == b'\n' || b == 0)
            .unwrap_or(rest.len());
        let name = std::str::from_utf8(&rest[..name_end]).ok()?;
        let (name, peeled) = match name.strip_suffix(PEEL_SUFFIX) {
            Some(name) => (name, true),
            None => (name, false),
        };

        let capabilities = (rest.get(name_end) == Some(&0)).then(|| {
            let caps = &rest[name_end + 1..];
            caps.strip_suffix(b"\n").unwrap_or(caps)
        });

        Some(Self {
            object_id: std::str::from_utf8(oid).ok()?,
            name,
            peeled,
            capabilities,
        })
    }
}

/// One framed chunk of an advertisement buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<'a> {
    /// Byte range of the whole chunk, length prefix included.
    pub span: Range<usize>,
    /// The ref carried by the chunk, if it is a ref line.
    pub reference: Option<RefLine<'a>>,
}

/// Lazy iterator over the chunks of an advertisement.
///
/// Cloning the scanner restarts nothing; call [`scan`] again for a fresh pass.
/// Iteration ends after the first framing error.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    data: &'a [u8],
    pos: usize,
    failed: bool,
}

/// Scans `data` chunk by chunk.
pub fn scan(data: &[u8]) -> Scanner<'_> {
    Scanner {
        data,
        pos: 0,
        failed: false,
    }
}

impl<'a> Scanner<'a> {
    fn read_chunk(&self) -> Result<Chunk<'a>> {
        let start = self.pos;
        let remaining = self.data.len() - start;
        let header = self.data.get(start..start + HEADER_LEN).ok_or_else(|| {
            GitError::MalformedAdvertisement(format!("truncated length at offset {start}"))
        })?;

        let len = match parse_length(header)? {
            0..=2 => HEADER_LEN,
            len if len < HEADER_LEN => {
                return Err(GitError::MalformedAdvertisement(format!(
                    "length {len:04x} at offset {start} is smaller than its prefix"
                )))
            }
            len => len,
        };
        if len > remaining {
            return Err(GitError::MalformedAdvertisement(format!(
                "length {len} at offset {start} exceeds the {remaining} remaining bytes"
            )));
        }

        let span = start..start + len;
        let reference = RefLine::parse(&self.data[start + HEADER_LEN..span.end]);
        Ok(Chunk { span, reference })
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.data.len() {
            return None;
        }
        match self.read_chunk() {
            Ok(chunk) => {
                self.pos = chunk.span.end;
                Some(Ok(chunk))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn parse_length(header: &[u8]) -> Result<usize> {
    header
        .iter()
        .try_fold(0usize, |len, &b| {
            char::from(b).to_digit(16).map(|d| len * 16 + d as usize)
        })
        .ok_or_else(|| {
            GitError::MalformedAdvertisement(format!(
                "invalid length {:?}",
                String::from_utf8_lossy(header)
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OID: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn test_pktline_encode() {
        assert_eq!(PktLine::from_string("hello\n").encode(), b"000ahello\n");
        assert_eq!(PktLine::Flush.encode(), b"0000");
    }

    #[test]
    fn test_pktline_empty_data() {
        let pkt = PktLine::from_bytes(Vec::new());
        assert_eq!(pkt.encode(), b"0004");
    }

    #[test]
    fn test_encode_into_appends() {
        let mut out = b"prefix".to_vec();
        PktLine::from_string("a\n").encode_into(&mut out);
        assert_eq!(out, b"prefix0006a\n");
    }

    #[test]
    fn test_ref_line_with_capabilities() {
        let payload = format!("{OID} HEAD\0multi_ack symref=HEAD:refs/heads/master\n");
        let line = RefLine::parse(payload.as_bytes()).unwrap();
        assert_eq!(line.object_id, OID);
        assert_eq!(line.name, "HEAD");
        assert!(!line.peeled);
        assert_eq!(
            line.capabilities,
            Some(b"multi_ack symref=HEAD:refs/heads/master".as_slice())
        );
    }

    #[test]
    fn test_ref_line_without_newline_or_capabilities() {
        let payload = format!("{OID} refs/heads/v1");
        let line = RefLine::parse(payload.as_bytes()).unwrap();
        assert_eq!(line.name, "refs/heads/v1");
        assert_eq!(line.capabilities, None);
    }

    #[test]
    fn test_ref_line_empty_capabilities() {
        let payload = format!("{OID} HEAD\0\n");
        let line = RefLine::parse(payload.as_bytes()).unwrap();
        assert_eq!(line.capabilities, Some(b"".as_slice()));
    }

    #[test]
    fn test_ref_line_peeled() {
        let payload = format!("{OID} refs/tags/v1.2.3^{{}}\n");
        let line = RefLine::parse(payload.as_bytes()).unwrap();
        assert_eq!(line.name, "refs/tags/v1.2.3");
        assert!(line.peeled);
    }

    #[test]
    fn test_ref_line_rejects_non_refs() {
        assert!(RefLine::parse(b"# service=git-upload-pack\n").is_none());
        assert!(RefLine::parse(b"").is_none());
        assert!(RefLine::parse(b"0123 HEAD\n").is_none());
        let short = format!("{} HEAD\n", &OID[..39]);
        assert!(RefLine::parse(short.as_bytes()).is_none());
        let not_hex = format!("{}z HEAD\n", &OID[..39]);
        assert!(RefLine::parse(not_hex.as_bytes()).is_none());
        let no_space = format!("{OID}\tHEAD\n");
        assert!(RefLine::parse(no_space.as_bytes()).is_none());
    }

    #[test]
    fn test_scan_spans_tile_buffer() {
        let mut data = PktLine::from_string("# service=git-upload-pack\n").encode();
        data.extend(PktLine::Flush.encode());
        data.extend(PktLine::from_string(&format!("{OID} refs/heads/v1\n")).encode());
        data.extend(PktLine::Flush.encode());

        let chunks: Vec<Chunk<'_>> = scan(&data).collect::<Result<_>>().unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].span, 0..30);
        assert_eq!(chunks[1].span, 30..34);
        assert_eq!(chunks[2].span.start, 34);
        assert_eq!(chunks[3].span.end, data.len());
        assert!(chunks[0].reference.is_none());
        assert!(chunks[1].reference.is_none());
        assert_eq!(chunks[2].reference.unwrap().name, "refs/heads/v1");
    }

    #[test]
    fn test_scan_is_restartable() {
        let data = PktLine::from_string(&format!("{OID} HEAD\n")).encode();
        let first: Vec<_> = scan(&data).collect();
        let second: Vec<_> = scan(&data).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
    }

    #[test]
    fn test_scan_special_packets() {
        let chunks: Vec<_> = scan(b"000000010002").collect::<Result<_>>().unwrap();
        let spans: Vec<_> = chunks.into_iter().map(|c| c.span).collect();
        assert_eq!(spans, [0..4, 4..8, 8..12]);
    }

    #[test]
    fn test_scan_empty_buffer() {
        assert_eq!(scan(b"").count(), 0);
    }

    #[test]
    fn test_scan_invalid_length() {
        let results: Vec<_> = scan(b"zzzz0000").collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(GitError::MalformedAdvertisement(_))));
    }

    #[test]
    fn test_scan_length_exceeds_buffer() {
        let results: Vec<_> = scan(b"0000ffffshort").collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(GitError::MalformedAdvertisement(_))));
    }

    #[test]
    fn test_scan_truncated_header() {
        let results: Vec<_> = scan(b"000").collect();
        assert!(matches!(
            results.as_slice(),
            [Err(GitError::MalformedAdvertisement(_))]
        ));
    }

    #[test]
    fn test_scan_length_three_is_malformed() {
        assert!(scan(b"0003").next().unwrap().is_err());
    }
}
