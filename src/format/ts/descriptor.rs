use super::types::*;
use crate::error::{Result, TsError};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// Size of the tag and length fields.
pub const DESCRIPTOR_HEADER_SIZE: usize = 2;

/// A raw binary descriptor: tag, length and payload.
///
/// The content is shared between clones and copied on modification.
#[derive(Clone, PartialEq, Eq)]
pub struct Descriptor {
    data: Bytes,
}

impl Descriptor {
    /// Builds a descriptor from its complete binary content.
    pub fn from_bytes(content: impl Into<Bytes>) -> Result<Self> {
        let data: Bytes = content.into();
        if data.len() < DESCRIPTOR_HEADER_SIZE || data.len() > MAX_DESCRIPTOR_SIZE {
            return Err(TsError::InvalidData(format!("invalid descriptor size {}", data.len())));
        }
        if data[1] as usize != data.len() - DESCRIPTOR_HEADER_SIZE {
            return Err(TsError::InvalidData(format!(
                "descriptor length field {} does not match size {}",
                data[1],
                data.len()
            )));
        }
        Ok(Self { data })
    }

    /// Builds a descriptor from a tag and a payload of at most 255 bytes.
    pub fn new(tag: u8, payload: &[u8]) -> Result<Self> {
        let length = u8::try_from(payload.len())
            .map_err(|_| TsError::InvalidData(format!("descriptor payload too long: {}", payload.len())))?;
        let mut data = BytesMut::with_capacity(DESCRIPTOR_HEADER_SIZE + payload.len());
        data.put_u8(tag);
        data.put_u8(length);
        data.put_slice(payload);
        Ok(Self { data: data.freeze() })
    }

    pub fn tag(&self) -> u8 {
        self.data[0]
    }

    pub fn content(&self) -> &Bytes {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn payload(&self) -> &[u8] {
        &self.data[DESCRIPTOR_HEADER_SIZE..]
    }

    pub fn payload_size(&self) -> usize {
        self.data.len() - DESCRIPTOR_HEADER_SIZE
    }

    /// True for tags in the user private range.
    pub fn is_private(&self) -> bool {
        self.tag() >= DID_PRIVATE_FIRST
    }

    /// Replaces the payload, the tag is kept.
    pub fn replace_payload(&mut self, payload: &[u8]) -> Result<()> {
        *self = Self::new(self.tag(), payload)?;
        Ok(())
    }

    /// Truncates the payload or pads it with zeroes.
    pub fn resize_payload(&mut self, new_size: usize) -> Result<()> {
        let mut payload = self.payload().to_vec();
        payload.resize(new_size, 0);
        self.replace_payload(&payload)
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("tag", &format_args!("{:#04x}", self.tag()))
            .field("payload_size", &self.payload_size())
            .finish()
    }
}

/// Conversion between a typed descriptor and its binary form.
pub trait DescriptorCodec: Sized {
    /// Tag of the descriptors handled by this codec.
    const TAG: u8;

    fn serialize(&self) -> Result<Descriptor>;

    fn deserialize(descriptor: &Descriptor) -> Result<Self>;
}

// Common check of the deserializers.
pub(crate) fn expect_tag(descriptor: &Descriptor, tag: u8) -> Result<()> {
    if descriptor.tag() == tag {
        Ok(())
    } else {
        Err(TsError::Deserialization(format!(
            "expected descriptor tag {:#04x}, got {:#04x}",
            tag,
            descriptor.tag()
        )))
    }
}
