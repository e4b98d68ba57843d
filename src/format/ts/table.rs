use super::section::{ExtTableId, Section};
use super::types::*;
use crate::error::{Result, TsError};

/// A table: the sections sharing one table id, table id extension and version.
///
/// Sections are stored by section number. The table is valid once every
/// section from 0 to the last section number is present.
#[derive(Debug, Clone)]
pub struct Table {
    tid: u8,
    tid_ext: u16,
    version: u8,
    source_pid: Pid,
    missing_count: usize,
    sections: Vec<Option<Section>>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl Table {
    /// Creates an empty, invalid table.
    pub fn new() -> Self {
        Self {
            tid: TID_NULL,
            tid_ext: 0,
            version: 0,
            source_pid: PID_NULL,
            missing_count: 0,
            sections: Vec::new(),
        }
    }

    /// Builds a table from a set of sections, in any order.
    pub fn from_sections<I: IntoIterator<Item = Section>>(sections: I) -> Result<Self> {
        let mut table = Self::new();
        for section in sections {
            table.add_section(section, true, true)?;
        }
        Ok(table)
    }

    /// Adds a section to the table.
    ///
    /// The first section defines the table id, extension, version and
    /// number of sections. Later sections must match the first three.
    ///
    /// # Arguments
    ///
    /// * `replace` - Replace a section which is already present
    /// * `grow` - Accept a different last section number and resize the table
    ///
    /// # Returns
    ///
    /// An error when the section does not belong to the table or cannot be stored.
    pub fn add_section(&mut self, mut section: Section, replace: bool, grow: bool) -> Result<()> {
        let index = section.section_number() as usize;
        let last = section.last_section_number() as usize;

        if self.sections.is_empty() {
            self.sections = vec![None; last + 1];
            self.tid = section.table_id();
            self.tid_ext = section.table_id_extension();
            self.version = section.version();
            self.source_pid = section.source_pid();
            self.missing_count = self.sections.len();
        } else if section.table_id() != self.tid
            || section.table_id_extension() != self.tid_ext
            || section.version() != self.version
        {
            return Err(TsError::InvalidTable(format!(
                "section {:?} does not belong to table {:?} version {}",
                section.etid(),
                self.etid(),
                self.version
            )));
        } else if last != self.sections.len() - 1 {
            if !grow {
                return Err(TsError::InvalidTable(format!(
                    "last section number {} differs from table size {}",
                    last,
                    self.sections.len()
                )));
            }
            if last < self.sections.len() - 1 {
                section.set_last_section_number((self.sections.len() - 1) as u8, true);
            } else {
                self.missing_count += last + 1 - self.sections.len();
                self.sections.resize(last + 1, None);
                for existing in self.sections.iter_mut().flatten() {
                    existing.set_last_section_number(last as u8, true);
                }
            }
        }

        match &mut self.sections[index] {
            slot @ None => {
                *slot = Some(section);
                self.missing_count -= 1;
            }
            Some(_) if !replace => {
                return Err(TsError::InvalidTable(format!("section {} already present", index)));
            }
            Some(existing) => *existing = section,
        }
        Ok(())
    }

    /// True when all sections are present.
    pub fn is_valid(&self) -> bool {
        !self.sections.is_empty() && self.missing_count == 0
    }

    pub fn missing_count(&self) -> usize {
        self.missing_count
    }

    pub fn table_id(&self) -> u8 {
        self.tid
    }

    pub fn table_id_extension(&self) -> u16 {
        self.tid_ext
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn source_pid(&self) -> Pid {
        self.source_pid
    }

    /// Extended table id, short or long depending on the first section.
    pub fn etid(&self) -> ExtTableId {
        match self.sections.iter().flatten().next() {
            Some(section) => section.etid(),
            None => ExtTableId::short(self.tid),
        }
    }

    /// True if the table is made of short sections.
    pub fn is_short_section(&self) -> bool {
        self.sections
            .iter()
            .flatten()
            .next()
            .is_some_and(|section| section.is_short_section())
    }

    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Section at `index`, None if out of range or missing.
    pub fn section_at(&self, index: usize) -> Option<&Section> {
        self.sections.get(index).and_then(|s| s.as_ref())
    }

    /// Present sections, in section number order.
    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter().flatten()
    }

    /// Total size in bytes of all present sections.
    pub fn total_size(&self) -> usize {
        self.sections().map(Section::size).sum()
    }

    /// Index of the first TS packet of the table in the demultiplexed stream.
    pub fn first_ts_packet_index(&self) -> PacketCounter {
        self.sections()
            .map(Section::first_ts_packet_index)
            .min()
            .unwrap_or(0)
    }

    /// Index of the last TS packet of the table in the demultiplexed stream.
    pub fn last_ts_packet_index(&self) -> PacketCounter {
        self.sections()
            .map(Section::last_ts_packet_index)
            .max()
            .unwrap_or(0)
    }

    pub fn set_table_id_extension(&mut self, tid_ext: u16, recompute_crc: bool) {
        self.tid_ext = tid_ext;
        for section in self.sections.iter_mut().flatten() {
            section.set_table_id_extension(tid_ext, recompute_crc);
        }
    }

    pub fn set_version(&mut self, version: u8, recompute_crc: bool) {
        self.version = version;
        for section in self.sections.iter_mut().flatten() {
            section.set_version(version, recompute_crc);
        }
    }

    pub fn set_source_pid(&mut self, pid: Pid) {
        self.source_pid = pid;
        for section in self.sections.iter_mut().flatten() {
            section.set_source_pid(pid);
        }
    }

    /// Empties the table, which becomes invalid.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

/// Two tables are equal when both are valid and all their sections are identical.
impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.is_valid()
            && other.is_valid()
            && self.tid == other.tid
            && self.tid_ext == other.tid_ext
            && self.version == other.version
            && self.sections == other.sections
    }
}
