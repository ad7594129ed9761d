//! Abstract alignment records and the sink they are written to.

use std::io::{self, Read, Write};

use anyhow::Result;

/// SAM-style flag bits carried by [`AlignmentRecord::flags`].
pub mod sam_flags {
    /// Read is one arm of a pair
    pub const PAIRED: u16 = 0x1;
    /// Both arms aligned as a proper pair
    pub const PROPER_PAIR: u16 = 0x2;
    /// Read is unmapped
    pub const UNMAPPED: u16 = 0x4;
    /// Mate is unmapped
    pub const MATE_UNMAPPED: u16 = 0x8;
    /// Read is reverse complemented
    pub const REVERSE: u16 = 0x10;
    /// Mate is reverse complemented
    pub const MATE_REVERSE: u16 = 0x20;
    /// First arm of a pair
    pub const FIRST_OF_PAIR: u16 = 0x40;
    /// Second arm of a pair
    pub const SECOND_OF_PAIR: u16 = 0x80;
}

/// Placement of a record's mate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MateRecord {
    /// Template of the mate
    pub template_id: i64,
    /// Zero-based start of the mate
    pub position: i32,
    /// Whether the mate is reverse complemented
    pub reverse: bool,
}

/// One output record. Field order is the output sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlignmentRecord {
    /// Template id, `-1` when unmapped
    pub template_id: i64,
    /// Zero-based start, `-1` when unmapped
    pub position: i32,
    /// Read id (not encoded)
    pub read_id: i32,
    /// [`sam_flags`] bits
    pub flags: u16,
    /// Mate placement for paired records with a mapped mate
    pub mate: Option<MateRecord>,
    /// Alignment score
    pub score: Option<i32>,
    /// `XC` status code for unmapped records
    pub status_code: Option<char>,
}

impl AlignmentRecord {
    /// A mapped record with no mate.
    #[must_use]
    pub fn mapped(read_id: i32, flags: u16, template_id: i64, position: i32, score: i32) -> Self {
        Self {
            template_id,
            position,
            read_id,
            flags,
            mate: None,
            score: Some(score),
            status_code: None,
        }
    }

    /// An unmapped record carrying its `XC` code.
    #[must_use]
    pub fn unmapped(read_id: i32, flags: u16, status_code: char) -> Self {
        Self {
            template_id: -1,
            position: -1,
            read_id,
            flags: flags | sam_flags::UNMAPPED,
            mate: None,
            score: None,
            status_code: Some(status_code),
        }
    }

    /// Sets the mate placement.
    #[must_use]
    pub fn with_mate(mut self, mate: MateRecord) -> Self {
        self.mate = Some(mate);
        self
    }

    /// Whether the record is reverse complemented.
    #[must_use]
    pub fn is_reverse(&self) -> bool {
        self.flags & sam_flags::REVERSE != 0
    }

    /// Coordinate used to order output.
    #[must_use]
    pub fn coordinate(&self) -> (i64, i64) {
        (self.template_id, i64::from(self.position))
    }

    /// Writes the fixed little-endian temp-stream layout.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.template_id.to_le_bytes())?;
        writer.write_all(&self.position.to_le_bytes())?;
        writer.write_all(&self.read_id.to_le_bytes())?;
        writer.write_all(&self.flags.to_le_bytes())?;
        match self.mate {
            Some(mate) => {
                writer.write_all(&[1])?;
                writer.write_all(&mate.template_id.to_le_bytes())?;
                writer.write_all(&mate.position.to_le_bytes())?;
                writer.write_all(&[u8::from(mate.reverse)])?;
            }
            None => writer.write_all(&[0])?,
        }
        match self.score {
            Some(score) => {
                writer.write_all(&[1])?;
                writer.write_all(&score.to_le_bytes())?;
            }
            None => writer.write_all(&[0])?,
        }
        let code = self.status_code.map_or(0, |c| u8::try_from(c).unwrap_or(b'?'));
        writer.write_all(&[code])
    }

    /// Reads one record, or `None` at a clean end of stream.
    ///
    /// A stream ending mid-record is an `UnexpectedEof` error.
    pub fn read_from<R: Read>(reader: &mut R) -> io::Result<Option<Self>> {
        let mut tid = [0u8; 8];
        if !read_exact_or_eof(reader, &mut tid)? {
            return Ok(None);
        }
        let template_id = i64::from_le_bytes(tid);
        let position = i32::from_le_bytes(read_array(reader)?);
        let read_id = i32::from_le_bytes(read_array(reader)?);
        let flags = u16::from_le_bytes(read_array(reader)?);

        let mate = match read_array::<_, 1>(reader)?[0] {
            0 => None,
            _ => Some(MateRecord {
                template_id: i64::from_le_bytes(read_array(reader)?),
                position: i32::from_le_bytes(read_array(reader)?),
                reverse: read_array::<_, 1>(reader)?[0] != 0,
            }),
        };
        let score = match read_array::<_, 1>(reader)?[0] {
            0 => None,
            _ => Some(i32::from_le_bytes(read_array(reader)?)),
        };
        let status_code = match read_array::<_, 1>(reader)?[0] {
            0 => None,
            c => Some(char::from(c)),
        };
        Ok(Some(Self { template_id, position, read_id, flags, mate, score, status_code }))
    }
}

fn read_array<R: Read, const N: usize>(reader: &mut R) -> io::Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    Ok(buf)
}

/// Fills `buf`, returning `false` if the stream was already at its end.
fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(true)
}

/// Destination for final, ordered output records.
pub trait RecordSink: Send {
    /// Writes one record.
    fn write_record(&mut self, record: &AlignmentRecord) -> Result<()>;

    /// Flushes and closes the sink.
    fn finish(&mut self) -> Result<()>;
}
