//! Typed descriptors.

use super::descriptor::{expect_tag, Descriptor, DescriptorCodec};
use super::types::*;
use crate::error::{Result, TsError};
use crate::utils::language::ISO639_SIZE;
use crate::utils::{append_iso639_language, decode_bcd, encode_bcd, iso639_language};
use bytes::{BufMut, BytesMut};

/// Teletext page types of a teletext_descriptor.
pub const TELETEXT_INITIAL_PAGE: u8 = 0x01;
pub const TELETEXT_SUBTITLES: u8 = 0x02;
pub const TELETEXT_ADDITIONAL_INFO: u8 = 0x03;
pub const TELETEXT_PROGRAM_SCHEDULE: u8 = 0x04;
pub const TELETEXT_SUBTITLES_HI: u8 = 0x05;

const TELETEXT_ENTRY_SIZE: usize = ISO639_SIZE + 2;
const MAX_TELETEXT_ENTRIES: usize = 255 / TELETEXT_ENTRY_SIZE;

/// One page of a teletext_descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeletextEntry {
    /// ISO-639 language code.
    pub language: String,
    /// One of the `TELETEXT_*` page types.
    pub teletext_type: u8,
    /// Decimal page number, magazine times 100 plus page.
    pub page_number: u16,
}

impl TeletextEntry {
    pub fn new(language: &str, teletext_type: u8, page_number: u16) -> Self {
        Self {
            language: language.to_string(),
            teletext_type,
            page_number,
        }
    }

    /// True for both subtitle page types.
    pub fn is_subtitles(&self) -> bool {
        self.teletext_type == TELETEXT_SUBTITLES || self.teletext_type == TELETEXT_SUBTITLES_HI
    }
}

/// DVB teletext_descriptor (ETSI EN 300 468, 6.2.43).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeletextDescriptor {
    pub entries: Vec<TeletextEntry>,
}

impl DescriptorCodec for TeletextDescriptor {
    const TAG: u8 = DID_TELETEXT;

    fn serialize(&self) -> Result<Descriptor> {
        if self.entries.len() > MAX_TELETEXT_ENTRIES {
            return Err(TsError::Serialization(format!(
                "too many teletext entries: {}",
                self.entries.len()
            )));
        }
        let mut payload = BytesMut::with_capacity(self.entries.len() * TELETEXT_ENTRY_SIZE);
        for entry in &self.entries {
            append_iso639_language(&entry.language, &mut payload)
                .map_err(|e| TsError::Serialization(e.to_string()))?;
            let magazine = ((entry.page_number / 100) % 8) as u8;
            payload.put_u8((entry.teletext_type << 3) | magazine);
            payload.put_u8(encode_bcd(entry.page_number % 100));
        }
        Descriptor::new(Self::TAG, &payload)
    }

    fn deserialize(descriptor: &Descriptor) -> Result<Self> {
        expect_tag(descriptor, Self::TAG)?;
        let payload = descriptor.payload();
        if payload.len() % TELETEXT_ENTRY_SIZE != 0 {
            return Err(TsError::Deserialization(format!(
                "teletext descriptor payload of {} bytes",
                payload.len()
            )));
        }
        let entries = payload
            .chunks_exact(TELETEXT_ENTRY_SIZE)
            .map(|entry| {
                // Magazine 0 is transmitted for magazine 8.
                let magazine = match entry[3] & 0x07 {
                    0 => 8,
                    m => u16::from(m),
                };
                TeletextEntry {
                    language: iso639_language(&entry[..ISO639_SIZE]),
                    teletext_type: entry[3] >> 3,
                    page_number: 100 * magazine + decode_bcd(entry[4]),
                }
            })
            .collect();
        Ok(Self { entries })
    }
}

/// DVB private_data_specifier_descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrivateDataSpecifierDescriptor {
    pub pds: u32,
}

impl DescriptorCodec for PrivateDataSpecifierDescriptor {
    const TAG: u8 = DID_PRIV_DATA_SPECIF;

    fn serialize(&self) -> Result<Descriptor> {
        Descriptor::new(Self::TAG, &self.pds.to_be_bytes())
    }

    fn deserialize(descriptor: &Descriptor) -> Result<Self> {
        expect_tag(descriptor, Self::TAG)?;
        let bytes: [u8; 4] = descriptor.payload().try_into().map_err(|_| {
            TsError::Deserialization(format!(
                "private data specifier payload of {} bytes",
                descriptor.payload_size()
            ))
        })?;
        Ok(Self {
            pds: u32::from_be_bytes(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_teletext_descriptor() {
        let desc = Descriptor::from_bytes(vec![
            0x56, 10, b'f', b'r', b'a', 0x28, 0x88, b'f', b'r', b'a', 0x10, 0x89,
        ])
        .unwrap();
        let teletext = TeletextDescriptor::deserialize(&desc).unwrap();
        assert_eq!(
            teletext.entries,
            vec![
                TeletextEntry::new("fra", TELETEXT_SUBTITLES_HI, 888),
                TeletextEntry::new("fra", TELETEXT_SUBTITLES, 889),
            ]
        );
        assert!(teletext.entries.iter().all(TeletextEntry::is_subtitles));
        assert_eq!(teletext.serialize().unwrap(), desc);
    }

    #[test]
    fn test_teletext_descriptor_errors() {
        let wrong_size = Descriptor::new(DID_TELETEXT, &[0; 4]).unwrap();
        assert!(TeletextDescriptor::deserialize(&wrong_size).is_err());
        let wrong_tag = Descriptor::new(DID_LANGUAGE, &[0; 5]).unwrap();
        assert!(TeletextDescriptor::deserialize(&wrong_tag).is_err());
        let bad_language = TeletextDescriptor {
            entries: vec![TeletextEntry::new("fr", TELETEXT_SUBTITLES, 100)],
        };
        assert!(bad_language.serialize().is_err());
    }

    #[test]
    fn test_private_data_specifier() {
        let desc = PrivateDataSpecifierDescriptor { pds: 0x0000_0028 }.serialize().unwrap();
        assert_eq!(desc.content().as_ref(), &[0x5F, 4, 0, 0, 0, 0x28]);
        assert_eq!(PrivateDataSpecifierDescriptor::deserialize(&desc).unwrap().pds, 0x28);
        let short = Descriptor::new(DID_PRIV_DATA_SPECIF, &[0, 0, 1]).unwrap();
        assert!(PrivateDataSpecifierDescriptor::deserialize(&short).is_err());
    }
}
