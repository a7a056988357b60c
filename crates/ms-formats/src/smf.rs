//! Standard MIDI File parser.
//!
//! Chunk framing (`MThd`, `MTrk` and unknown chunks) is read with binrw;
//! track bodies are walked with a byte cursor because their events are
//! variable-length and use running status.

use binrw::io::Cursor;
use binrw::BinRead;
use ms_ir::{
    ChannelEvent, ChannelEventKind, MetaEvent, MidiEvent, MidiEventKind, MidiFile, MidiTrack,
    META_END_OF_TRACK,
};

use crate::FormatError;

const TRACK_CHUNK_ID: [u8; 4] = *b"MTrk";

#[derive(BinRead, Debug)]
#[br(big, magic = b"MThd")]
struct HeaderChunk {
    length: u32,
    format: u16,
    num_tracks: u16,
    time_division: u16,
    // Header chunks longer than 6 bytes carry fields we don't know about.
    #[br(count = length.saturating_sub(6) as usize)]
    _extra: Vec<u8>,
}

#[derive(BinRead, Debug)]
#[br(big)]
struct RawChunk {
    id: [u8; 4],
    length: u32,
    #[br(count = length as usize)]
    data: Vec<u8>,
}

fn map_chunk_error(err: binrw::Error) -> FormatError {
    if err.is_eof() {
        return FormatError::UnexpectedEof;
    }
    match err {
        binrw::Error::BadMagic { .. } => FormatError::InvalidHeader,
        other => FormatError::Chunk(other.to_string()),
    }
}

/// Load a Standard MIDI File from bytes.
pub fn load_midi(data: &[u8]) -> Result<MidiFile, FormatError> {
    let mut cursor = Cursor::new(data);
    let header = HeaderChunk::read(&mut cursor).map_err(map_chunk_error)?;

    if header.length < 6 || header.time_division == 0 {
        return Err(FormatError::InvalidHeader);
    }
    if header.format > 1 {
        return Err(FormatError::UnsupportedFormat(header.format));
    }

    let num_tracks = header.num_tracks as usize;
    let mut tracks = Vec::with_capacity(num_tracks);

    while tracks.len() < num_tracks {
        if cursor.position() as usize >= data.len() {
            return Err(FormatError::UnexpectedEof);
        }
        let chunk = RawChunk::read(&mut cursor).map_err(map_chunk_error)?;
        if chunk.id != TRACK_CHUNK_ID {
            log::debug!(
                "skipping unknown chunk {:?} ({} bytes)",
                String::from_utf8_lossy(&chunk.id),
                chunk.length
            );
            continue;
        }
        tracks.push(parse_track(tracks.len(), &chunk.data)?);
    }

    let file = MidiFile {
        format: header.format,
        time_division: header.time_division,
        tracks,
    };
    log::debug!(
        "loaded MIDI format {}: {} tracks, {} events, division {:#06x}",
        file.format,
        file.num_tracks(),
        file.num_events(),
        file.time_division
    );
    Ok(file)
}

// ---------------------------------------------------------------------------
// TrackReader — cursor over one MTrk body
// ---------------------------------------------------------------------------

struct TrackReader<'a> {
    data: &'a [u8],
    pos: usize,
    track: usize,
}

impl<'a> TrackReader<'a> {
    fn new(track: usize, data: &'a [u8]) -> Self {
        Self { data, pos: 0, track }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn invalid(&self) -> FormatError {
        FormatError::InvalidEvent {
            track: self.track,
            offset: self.pos,
        }
    }

    fn read_u8(&mut self) -> Result<u8, FormatError> {
        let v = *self.data.get(self.pos).ok_or(FormatError::UnexpectedEof)?;
        self.pos += 1;
        Ok(v)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], FormatError> {
        if self.pos + n > self.data.len() {
            return Err(FormatError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Variable-length quantity, at most four bytes.
    fn read_var_len(&mut self) -> Result<u32, FormatError> {
        let mut value: u32 = 0;
        for _ in 0..4 {
            let byte = self.read_u8()?;
            value = (value << 7) | (byte & 0x7F) as u32;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(self.invalid())
    }
}

fn parse_track(index: usize, data: &[u8]) -> Result<MidiTrack, FormatError> {
    let mut reader = TrackReader::new(index, data);
    let mut events = Vec::new();
    let mut running_status: Option<u8> = None;

    // A missing end-of-track event is tolerated; the chunk length bounds the track.
    while !reader.at_end() {
        let delta_time = reader.read_var_len()?;
        let mut status = reader.read_u8()?;

        if status < 0x80 {
            status = running_status.ok_or_else(|| reader.invalid())?;
            reader.pos -= 1;
        }

        match status {
            0xFF => {
                running_status = None;
                let meta_type = reader.read_u8()?;
                let len = reader.read_var_len()? as usize;
                let data = reader.read_bytes(len)?.to_vec();
                events.push(MidiEvent::new(
                    delta_time,
                    MidiEventKind::Meta(MetaEvent { meta_type, data }),
                ));
                if meta_type == META_END_OF_TRACK {
                    break;
                }
            }
            0xF0 | 0xF7 => {
                running_status = None;
                let len = reader.read_var_len()? as usize;
                let data = reader.read_bytes(len)?.to_vec();
                events.push(MidiEvent::new(delta_time, MidiEventKind::SysEx(data)));
            }
            0x80..=0xEF => {
                let kind = ChannelEventKind::from_status(status).ok_or_else(|| reader.invalid())?;
                let param1 = reader.read_u8()?;
                let param2 = if kind.data_len() == 2 { reader.read_u8()? } else { 0 };
                running_status = Some(status);
                events.push(MidiEvent::new(
                    delta_time,
                    MidiEventKind::Channel(ChannelEvent {
                        kind,
                        channel: status & 0x0F,
                        param1,
                        param2,
                    }),
                ));
            }
            _ => return Err(reader.invalid()),
        }
    }

    Ok(MidiTrack::new(events))
}
