use crate::frame::{Resynchronizer, encode_synced};
use crate::protocol::{RECORD_SIZE, TelemetryRecord};
use serde::Deserialize;
use std::{fmt, io, str::FromStr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const READ_CHUNK: usize = 256;

/// How records are delimited on the wire.
///
/// Both ends of a connection must agree on the framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Back-to-back 16-byte records. Alignment cannot be recovered.
    #[default]
    Raw,
    /// Sync marker + record + CRC, recoverable after garbage or corruption.
    Synced,
}

impl Framing {
    pub fn encode(&self, record: &TelemetryRecord) -> Vec<u8> {
        match self {
            Framing::Raw => record.encode().to_vec(),
            Framing::Synced => encode_synced(record).to_vec(),
        }
    }
}

impl fmt::Display for Framing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Framing::Raw => write!(f, "raw"),
            Framing::Synced => write!(f, "synced"),
        }
    }
}

impl FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Framing::Raw),
            "synced" => Ok(Framing::Synced),
            other => Err(format!("unknown framing '{}', expected raw or synced", other)),
        }
    }
}

/// Result of reading one record from a stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReadOutcome {
    Record(TelemetryRecord),
    /// The peer closed the stream on a record boundary.
    Closed,
    /// The peer closed the stream with this many bytes of an unfinished record.
    Truncated(usize),
}

/// Reads framed records from a byte stream.
///
/// Short reads are accumulated until a whole record is available, so the only
/// way to observe a partial record is the stream ending in the middle of one.
pub struct RecordReader<R> {
    inner: R,
    framing: Framing,
    resync: Resynchronizer,
}

impl<R> RecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R, framing: Framing) -> Self {
        Self {
            inner,
            framing,
            resync: Resynchronizer::new(),
        }
    }

    pub async fn next_record(&mut self) -> io::Result<ReadOutcome> {
        match self.framing {
            Framing::Raw => self.next_raw().await,
            Framing::Synced => self.next_synced().await,
        }
    }

    /// Bytes dropped so far while resynchronizing. Always zero for raw framing.
    pub fn discarded(&self) -> usize {
        self.resync.discarded()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    async fn next_raw(&mut self) -> io::Result<ReadOutcome> {
        let mut buf = [0u8; RECORD_SIZE];
        let mut filled = 0;

        while filled < RECORD_SIZE {
            let n = self.inner.read(&mut buf[filled..]).await?;
            if n == 0 {
                return Ok(if filled == 0 {
                    ReadOutcome::Closed
                } else {
                    ReadOutcome::Truncated(filled)
                });
            }
            filled += n;
        }

        Ok(ReadOutcome::Record(TelemetryRecord::from_bytes(&buf)))
    }

    async fn next_synced(&mut self) -> io::Result<ReadOutcome> {
        let mut chunk = [0u8; READ_CHUNK];

        loop {
            if let Some(record) = self.resync.next_record() {
                return Ok(ReadOutcome::Record(record));
            }

            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                let left = self.resync.finish();
                return Ok(if left == 0 {
                    ReadOutcome::Closed
                } else {
                    ReadOutcome::Truncated(left)
                });
            }
            self.resync.extend(&chunk[..n]);
        }
    }
}

/// Writes framed records, one flush per record.
pub struct RecordWriter<W> {
    inner: W,
    framing: Framing,
}

impl<W> RecordWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(inner: W, framing: Framing) -> Self {
        Self { inner, framing }
    }

    pub async fn write_record(&mut self, record: &TelemetryRecord) -> io::Result<()> {
        self.inner.write_all(&self.framing.encode(record)).await?;
        self.inner.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}
