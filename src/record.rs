use std::fmt;

/// Identifier of a record inside the watched directory: its file name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(name: impl Into<String>) -> Self {
        RecordId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An already-serialized unit of telemetry read from one file.
///
/// The publisher never parses or validates `payload`; the bytes are
/// forwarded as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub payload: Vec<u8>,
}

impl Record {
    pub fn new(id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Record {
            id: RecordId::new(id),
            payload: payload.into(),
        }
    }
}

/// The records collected during one flush cycle, joined into one body.
#[derive(Debug, Clone)]
pub struct Batch {
    pub ids: Vec<RecordId>,
    pub payload: Vec<u8>,
}

impl Batch {
    /// Build a batch from collected records, preserving their order.
    pub fn from_records(records: Vec<Record>) -> Self {
        let payload = join_payloads(records.iter().map(|r| r.payload.as_slice()));
        let ids = records.into_iter().map(|r| r.id).collect();
        Batch { ids, payload }
    }
}

/// Join payloads into the newline-delimited body posted to the collector.
///
/// Trailing line breaks of every payload are stripped, payloads are joined
/// with `\n` and the body ends with exactly one `\n`. Payloads that are
/// empty after stripping are left out. No payloads yield an empty body.
pub fn join_payloads<I>(payloads: I) -> Vec<u8>
where
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut body = Vec::new();
    for payload in payloads {
        let payload = payload.as_ref();
        let end = payload
            .iter()
            .rposition(|b| *b != b'\n' && *b != b'\r')
            .map_or(0, |last| last + 1);
        if end == 0 {
            continue;
        }
        body.extend_from_slice(&payload[..end]);
        body.push(b'\n');
    }
    body
}
