use super::descriptor::DescriptorCodec;
use super::descriptor_list::DescriptorList;
use super::descriptors::TeletextDescriptor;
use super::psi::{add_long_section, check_table, LongTableHeader, TableCodec};
use super::table::Table;
use super::types::*;
use crate::error::{Result, TsError};
use bytes::{BufMut, BytesMut};

/// One elementary stream of a PMT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmtStream {
    pub pid: Pid,
    pub stream_type: u8,
    pub descs: DescriptorList,
}

impl PmtStream {
    pub fn new(pid: Pid, stream_type: u8) -> Self {
        Self {
            pid,
            stream_type,
            descs: DescriptorList::new(),
        }
    }

    fn has_descriptor(&self, tag: u8) -> bool {
        self.descs.search(tag, 0, 0).is_some()
    }

    /// True for audio stream types, and for private streams carrying an
    /// AC-3, E-AC-3, DTS or AAC descriptor.
    pub fn is_audio(&self) -> bool {
        is_audio_stream_type(self.stream_type)
            || [DID_DTS, DID_AC3, DID_ENHANCED_AC3, DID_AAC]
                .into_iter()
                .any(|tag| self.has_descriptor(tag))
    }

    pub fn is_video(&self) -> bool {
        is_video_stream_type(self.stream_type)
    }

    /// True with a subtitling descriptor or a teletext descriptor declaring
    /// a subtitle page.
    pub fn is_subtitles(&self) -> bool {
        if self.has_descriptor(DID_SUBTITLING) {
            return true;
        }
        let mut index = 0;
        while let Some(found) = self.descs.search(DID_TELETEXT, index, 0) {
            let subtitles = self
                .descs
                .get(found)
                .and_then(|desc| TeletextDescriptor::deserialize(desc).ok())
                .is_some_and(|td| td.entries.iter().any(|e| e.is_subtitles()));
            if subtitles {
                return true;
            }
            index = found + 1;
        }
        false
    }
}

/// Program Map Table.
///
/// A PMT is always made of one single section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub header: LongTableHeader,
    pub service_id: u16,
    pub pcr_pid: Pid,
    /// Program-level descriptors.
    pub descs: DescriptorList,
    pub streams: Vec<PmtStream>,
}

impl Default for Pmt {
    fn default() -> Self {
        Self {
            header: LongTableHeader::default(),
            service_id: 0,
            pcr_pid: PID_NULL,
            descs: DescriptorList::new(),
            streams: Vec::new(),
        }
    }
}

impl Pmt {
    pub fn new(version: u8, is_current: bool, service_id: u16, pcr_pid: Pid) -> Self {
        Self {
            header: LongTableHeader { version, is_current },
            service_id,
            pcr_pid,
            ..Self::default()
        }
    }

    pub fn stream(&self, pid: Pid) -> Option<&PmtStream> {
        self.streams.iter().find(|s| s.pid == pid)
    }
}

fn too_large() -> TsError {
    TsError::Serialization("PMT does not fit in one section".into())
}

impl TableCodec for Pmt {
    const TABLE_ID: u8 = TID_PMT;

    fn serialize(&self) -> Result<Table> {
        let max = MAX_PSI_LONG_SECTION_PAYLOAD_SIZE;
        let mut payload = BytesMut::with_capacity(max);
        payload.put_u16(self.pcr_pid | 0xE000);

        let room = max - payload.len();
        if self.descs.length_serialize(&mut payload, 0, room) < self.descs.len() {
            return Err(too_large());
        }

        for stream in &self.streams {
            if payload.len() + 3 > max {
                return Err(too_large());
            }
            payload.put_u8(stream.stream_type);
            payload.put_u16(stream.pid | 0xE000);
            let room = max - payload.len();
            if room < 2 || stream.descs.length_serialize(&mut payload, 0, room) < stream.descs.len() {
                return Err(too_large());
            }
        }

        let mut table = Table::new();
        add_long_section(&mut table, TID_PMT, false, self.service_id, self.header, &payload)?;
        Ok(table)
    }

    fn deserialize(table: &Table) -> Result<Self> {
        check_table(table, TID_PMT)?;
        let section = match table.section_at(0) {
            Some(section) if table.section_count() == 1 => section,
            _ => {
                return Err(TsError::Deserialization(format!(
                    "PMT with {} sections",
                    table.section_count()
                )))
            }
        };

        let mut pmt = Pmt::new(
            section.version(),
            section.is_current(),
            section.table_id_extension(),
            PID_NULL,
        );
        let mut data = section.payload();
        if data.len() < 2 {
            return Err(TsError::Deserialization("PMT payload too short".into()));
        }
        pmt.pcr_pid = u16::from_be_bytes([data[0], data[1]]) & 0x1FFF;
        data = &data[2..];

        let read = pmt
            .descs
            .append_from_length(data)
            .map_err(|e| TsError::Deserialization(e.to_string()))?;
        data = &data[read..];

        while data.len() >= 3 {
            let mut stream = PmtStream::new(u16::from_be_bytes([data[1], data[2]]) & 0x1FFF, data[0]);
            data = &data[3..];
            let read = stream
                .descs
                .append_from_length(data)
                .map_err(|e| TsError::Deserialization(e.to_string()))?;
            data = &data[read..];
            pmt.streams.push(stream);
        }

        if !data.is_empty() {
            return Err(TsError::Deserialization(format!(
                "{} trailing bytes in PMT",
                data.len()
            )));
        }
        Ok(pmt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::descriptor::Descriptor;
    use crate::format::ts::descriptors::{TeletextEntry, TELETEXT_SUBTITLES, TELETEXT_SUBTITLES_HI};
    use pretty_assertions::assert_eq;

    fn sample_pmt() -> Pmt {
        let mut pmt = Pmt::new(1, true, 4006, 161);
        pmt.streams.push(PmtStream::new(161, ST_MPEG2_VIDEO));

        let mut audio = PmtStream::new(162, ST_PES_PRIV);
        audio.descs.append(Descriptor::new(DID_AC3, &[0x00]).unwrap());
        pmt.streams.push(audio);

        let mut teletext = PmtStream::new(1068, ST_PES_PRIV);
        let td = TeletextDescriptor {
            entries: vec![
                TeletextEntry::new("fra", TELETEXT_SUBTITLES_HI, 888),
                TeletextEntry::new("fra", TELETEXT_SUBTITLES, 889),
            ],
        };
        teletext.descs.append(td.serialize().unwrap());
        pmt.streams.push(teletext);
        pmt
    }

    #[test]
    fn test_round_trip_and_classification() {
        let pmt = sample_pmt();
        let table = pmt.serialize().unwrap();
        assert_eq!(table.section_count(), 1);
        let decoded = Pmt::deserialize(&table).unwrap();
        assert_eq!(decoded, pmt);

        let video = decoded.stream(161).unwrap();
        assert!(video.is_video() && !video.is_audio() && !video.is_subtitles());
        let audio = decoded.stream(162).unwrap();
        assert!(!audio.is_video() && audio.is_audio() && !audio.is_subtitles());
        let teletext = decoded.stream(1068).unwrap();
        assert!(!teletext.is_video() && !teletext.is_audio() && teletext.is_subtitles());
    }

    #[test]
    fn test_too_large_pmt_fails() {
        let mut pmt = Pmt::new(0, true, 1, 100);
        let mut stream = PmtStream::new(200, ST_PES_PRIV);
        for _ in 0..5 {
            stream.descs.append(Descriptor::new(0x90, &[0; 255]).unwrap());
        }
        pmt.streams.push(stream);
        assert!(pmt.serialize().is_err());

        pmt.streams[0].descs.remove_by_index(0);
        pmt.streams[0].descs.remove_by_index(0);
        assert!(pmt.serialize().is_ok());
    }

    #[test]
    fn test_multi_section_pmt_rejected() {
        let mut table = sample_pmt().serialize().unwrap();
        add_long_section(&mut table, TID_PMT, false, 4006, LongTableHeader { version: 1, is_current: true }, &[0xE0, 0x10, 0xF0, 0x00])
            .unwrap();
        assert!(Pmt::deserialize(&table).is_err());
    }
}
