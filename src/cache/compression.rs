//! Codecs for the body of a cache file. The header is always stored as-is,
//! everything after it goes through one of these.

use std::io::{self, BufReader, BufWriter, Read, Write};

use flate2::{read::GzDecoder, write::GzEncoder};

/// How the shape list of a cache file is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Shapes are stored as raw varints and little-endian coordinates.
    None,
    /// The whole shape list is one gzip stream.
    #[default]
    Gzip,
}

impl Compression {
    /// Wrap `source` so that reading from it yields the decoded body.
    pub fn reader<R: Read>(self, source: R) -> BodyReader<R> {
        let source = BufReader::new(source);
        match self {
            Compression::None => BodyReader::Plain(source),
            Compression::Gzip => BodyReader::Gzip(GzDecoder::new(source)),
        }
    }

    /// Wrap `sink` so that writes to it are encoded. The returned writer
    /// must be [`finish`](BodyWriter::finish)ed for the body to be complete.
    pub fn writer<W: Write>(self, sink: W) -> BodyWriter<W> {
        let sink = BufWriter::new(sink);
        match self {
            Compression::None => BodyWriter::Plain(sink),
            Compression::Gzip => {
                BodyWriter::Gzip(GzEncoder::new(sink, flate2::Compression::default()))
            }
        }
    }
}

impl From<Compression> for u8 {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => 0,
            Compression::Gzip => 1,
        }
    }
}

impl TryFrom<u8> for Compression {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Gzip),
            _ => Err(()),
        }
    }
}

/// Decoding side of a cache body, see [`Compression::reader`].
pub enum BodyReader<R: Read> {
    Plain(BufReader<R>),
    Gzip(GzDecoder<BufReader<R>>),
}

impl<R: Read> BodyReader<R> {
    fn inner(&mut self) -> &mut dyn Read {
        match self {
            BodyReader::Plain(r) => r,
            BodyReader::Gzip(r) => r,
        }
    }
}

impl<R: Read> Read for BodyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner().read(buf)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.inner().read_exact(buf)
    }
}

/// Encoding side of a cache body, see [`Compression::writer`].
pub enum BodyWriter<W: Write> {
    Plain(BufWriter<W>),
    Gzip(GzEncoder<BufWriter<W>>),
}

impl<W: Write> BodyWriter<W> {
    fn inner(&mut self) -> &mut dyn Write {
        match self {
            BodyWriter::Plain(w) => w,
            BodyWriter::Gzip(w) => w,
        }
    }

    /// Flush the buffer and, for gzip, the stream trailer. Returns the sink.
    pub fn finish(self) -> io::Result<W> {
        let buffered = match self {
            BodyWriter::Plain(w) => w,
            BodyWriter::Gzip(w) => w.finish()?,
        };
        buffered.into_inner().map_err(|e| e.into_error())
    }
}

impl<W: Write> Write for BodyWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner().flush()
    }
}
