use super::descriptor::{Descriptor, DescriptorCodec, DESCRIPTOR_HEADER_SIZE};
use super::descriptors::PrivateDataSpecifierDescriptor;
use super::types::*;
use crate::error::{Result, TsError};
use bytes::{BufMut, BytesMut};

/// Maximum value of a 12-bit descriptor loop length.
const MAX_LOOP_LENGTH: usize = 0x0FFF;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Element {
    desc: Descriptor,
    pds: u32,
}

/// An ordered list of descriptors.
///
/// Each descriptor is associated with the private data specifier in
/// effect at its position, which is the value of the last preceding
/// `private_data_specifier_descriptor`, or zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorList {
    list: Vec<Element>,
}

// The PDS defined by a private_data_specifier_descriptor, if it is one.
fn carried_pds(desc: &Descriptor) -> Option<u32> {
    if desc.tag() != DID_PRIV_DATA_SPECIF {
        return None;
    }
    let pds = match desc.payload() {
        [a, b, c, d, ..] => u32::from_be_bytes([*a, *b, *c, *d]),
        _ => 0,
    };
    Some(pds)
}

impl DescriptorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn clear(&mut self) {
        self.list.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Descriptor> {
        self.list.get(index).map(|e| &e.desc)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Descriptor> {
        self.list.iter().map(|e| &e.desc)
    }

    /// Private data specifier in effect for the descriptor at `index`.
    pub fn private_data_specifier(&self, index: usize) -> u32 {
        self.list.get(index).map_or(0, |e| e.pds)
    }

    fn last_pds(&self) -> u32 {
        self.list.last().map_or(0, |e| e.pds)
    }

    /// Appends a descriptor at the end of the list.
    pub fn append(&mut self, desc: Descriptor) {
        let pds = carried_pds(&desc).unwrap_or_else(|| self.last_pds());
        self.list.push(Element { desc, pds });
    }

    /// Appends all descriptors of a descriptor loop.
    ///
    /// The area must contain complete descriptors only.
    pub fn append_from_bytes(&mut self, mut data: &[u8]) -> Result<()> {
        while !data.is_empty() {
            if data.len() < DESCRIPTOR_HEADER_SIZE {
                return Err(TsError::InvalidData("truncated descriptor header".into()));
            }
            let size = DESCRIPTOR_HEADER_SIZE + data[1] as usize;
            if size > data.len() {
                return Err(TsError::InvalidData(format!(
                    "descriptor of {} bytes exceeds the {} remaining bytes",
                    size,
                    data.len()
                )));
            }
            self.append(Descriptor::from_bytes(data[..size].to_vec())?);
            data = &data[size..];
        }
        Ok(())
    }

    /// Appends a descriptor loop preceded by its 12-bit length.
    ///
    /// Returns the number of bytes read from `data`.
    pub fn append_from_length(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() < 2 {
            return Err(TsError::InvalidData("truncated descriptor loop length".into()));
        }
        let length = (u16::from_be_bytes([data[0], data[1]]) & 0x0FFF) as usize;
        let end = 2 + length;
        if end > data.len() {
            return Err(TsError::InvalidData(format!(
                "descriptor loop of {} bytes exceeds the {} remaining bytes",
                length,
                data.len() - 2
            )));
        }
        self.append_from_bytes(&data[2..end])?;
        Ok(end)
    }

    /// Appends a private_data_specifier_descriptor unless `pds` is zero or
    /// already in effect.
    pub fn append_private_data_specifier(&mut self, pds: u32) -> Result<()> {
        if pds != 0 && self.last_pds() != pds {
            self.append(PrivateDataSpecifierDescriptor { pds }.serialize()?);
        }
        Ok(())
    }

    /// Removes private descriptors which have no private data specifier.
    pub fn remove_invalid_private_descriptors(&mut self) {
        self.list.retain(|e| !(e.desc.is_private() && e.pds == 0));
    }

    /// Removes the descriptor at `index`.
    ///
    /// A private_data_specifier_descriptor is removed only when no private
    /// descriptor depends on it. Returns false when nothing was removed.
    pub fn remove_by_index(&mut self, index: usize) -> bool {
        if index >= self.list.len() {
            return false;
        }
        if self.list[index].desc.tag() == DID_PRIV_DATA_SPECIF {
            let dependents = self.list[index + 1..]
                .iter()
                .take_while(|e| e.desc.tag() != DID_PRIV_DATA_SPECIF)
                .any(|e| e.desc.is_private());
            if dependents {
                return false;
            }
            // Following descriptors inherit the previous specifier.
            let previous = if index == 0 { 0 } else { self.list[index - 1].pds };
            for e in self.list[index + 1..]
                .iter_mut()
                .take_while(|e| e.desc.tag() != DID_PRIV_DATA_SPECIF)
            {
                e.pds = previous;
            }
        }
        self.list.remove(index);
        true
    }

    /// Removes all descriptors with `tag`.
    ///
    /// For private tags and a non-zero `pds`, only descriptors under that
    /// specifier are removed. Returns the number of removed descriptors.
    pub fn remove_by_tag(&mut self, tag: u8, pds: u32) -> usize {
        let check_pds = pds != 0 && tag >= DID_PRIVATE_FIRST;
        let mut removed = 0;
        let mut index = self.list.len();
        while index > 0 {
            index -= 1;
            let e = &self.list[index];
            let matches = e.desc.tag() == tag && (!check_pds || e.pds == pds);
            if matches && self.remove_by_index(index) {
                removed += 1;
            }
        }
        removed
    }

    /// Index of the first descriptor with `tag` at or after `start`.
    ///
    /// For private tags and a non-zero `pds`, the descriptor must also be
    /// under that specifier.
    pub fn search(&self, tag: u8, start: usize, pds: u32) -> Option<usize> {
        let check_pds = pds != 0 && tag >= DID_PRIVATE_FIRST;
        self.list
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, e)| e.desc.tag() == tag && (!check_pds || e.pds == pds))
            .map(|(i, _)| i)
    }

    /// Total size of all descriptors.
    pub fn binary_size(&self) -> usize {
        self.list.iter().map(|e| e.desc.size()).sum()
    }

    /// Appends all descriptors to `buf`.
    pub fn serialize(&self, buf: &mut BytesMut) {
        for e in &self.list {
            buf.put_slice(e.desc.content());
        }
    }

    /// Appends a 12-bit length followed by as many descriptors as possible,
    /// starting at index `start`, within `max_size` bytes including the length.
    ///
    /// The 4 reserved bits of the length are set. Returns the index of the
    /// first descriptor which was not serialized. Nothing is written when
    /// `max_size` cannot even hold the length.
    pub fn length_serialize(&self, buf: &mut BytesMut, start: usize, max_size: usize) -> usize {
        let start = start.min(self.list.len());
        if max_size < 2 {
            return start;
        }
        let room = max_size.saturating_sub(2).min(MAX_LOOP_LENGTH);
        let mut size = 0;
        let mut end = start;
        while end < self.list.len() && size + self.list[end].desc.size() <= room {
            size += self.list[end].desc.size();
            end += 1;
        }
        buf.put_u16(0xF000 | size as u16);
        for e in &self.list[start..end] {
            buf.put_slice(e.desc.content());
        }
        end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pds(value: u32) -> Descriptor {
        PrivateDataSpecifierDescriptor { pds: value }.serialize().unwrap()
    }

    fn private(tag: u8) -> Descriptor {
        Descriptor::new(tag, &[tag]).unwrap()
    }

    #[test]
    fn test_pds_tracking() {
        let mut list = DescriptorList::new();
        list.append(private(0x0A));
        list.append(pds(0x28));
        list.append(private(0x83));
        list.append_private_data_specifier(0x28).unwrap();
        assert_eq!(list.len(), 3);
        list.append_private_data_specifier(0x29).unwrap();
        list.append(private(0x84));
        assert_eq!(
            (0..list.len()).map(|i| list.private_data_specifier(i)).collect::<Vec<_>>(),
            vec![0, 0x28, 0x28, 0x29, 0x29]
        );
        assert_eq!(list.search(0x84, 0, 0x29), Some(4));
        assert_eq!(list.search(0x84, 0, 0x28), None);
        assert_eq!(list.search(0x84, 0, 0), Some(4));
    }

    #[test]
    fn test_remove_pds_with_dependents() {
        let mut list = DescriptorList::new();
        list.append(pds(0x28));
        list.append(private(0x0A));
        list.append(private(0x83));
        assert!(!list.remove_by_index(0));
        assert!(list.remove_by_index(2));
        assert!(list.remove_by_index(0));
        assert_eq!(list.len(), 1);
        assert_eq!(list.private_data_specifier(0), 0);
    }

    #[test]
    fn test_remove_invalid_private_descriptors() {
        let mut list = DescriptorList::new();
        list.append(private(0x90));
        list.append(pds(1));
        list.append(private(0x90));
        list.remove_invalid_private_descriptors();
        assert_eq!(list.len(), 2);
        assert_eq!(list.remove_by_tag(0x90, 2), 0);
        assert_eq!(list.remove_by_tag(0x90, 1), 1);
    }

    #[test]
    fn test_length_serialize() {
        let mut list = DescriptorList::new();
        for tag in [0x0A, 0x52, 0x56] {
            list.append(Descriptor::new(tag, &[0; 4]).unwrap());
        }
        assert_eq!(list.binary_size(), 18);

        let mut buf = BytesMut::new();
        let next = list.length_serialize(&mut buf, 0, 14);
        assert_eq!(next, 2);
        assert_eq!(&buf[..2], &[0xF0, 12]);

        let mut parsed = DescriptorList::new();
        assert_eq!(parsed.append_from_length(&buf).unwrap(), 14);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get(1).map(Descriptor::tag), Some(0x52));
    }

    #[test]
    fn test_truncated_loop() {
        let mut list = DescriptorList::new();
        assert!(list.append_from_bytes(&[0x0A, 4, 0]).is_err());
        assert!(list.append_from_length(&[0xF0, 8, 0x0A, 0]).is_err());
    }
}
