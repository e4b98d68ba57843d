use super::section::{LongSectionHeader, Section};
use super::table::Table;
use crate::error::{Result, TsError};

/// Conversion between a typed table and its binary form.
pub trait TableCodec: Sized {
    /// Table id of the tables handled by this codec.
    const TABLE_ID: u8;

    fn serialize(&self) -> Result<Table>;

    fn deserialize(table: &Table) -> Result<Self>;
}

/// Version and current/next indicator shared by all long tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongTableHeader {
    pub version: u8,
    pub is_current: bool,
}

impl Default for LongTableHeader {
    fn default() -> Self {
        Self {
            version: 0,
            is_current: true,
        }
    }
}

// Checks that a binary table can be deserialized as `tid`.
pub(crate) fn check_table(table: &Table, tid: u8) -> Result<()> {
    if !table.is_valid() {
        return Err(TsError::Deserialization(format!(
            "incomplete table {:#04x}, {} missing sections",
            table.table_id(),
            table.missing_count()
        )));
    }
    if table.table_id() != tid {
        return Err(TsError::Deserialization(format!(
            "expected table id {:#04x}, got {:#04x}",
            tid,
            table.table_id()
        )));
    }
    Ok(())
}

// Appends a section after the last one, growing the table.
pub(crate) fn add_long_section(
    table: &mut Table,
    tid: u8,
    is_private: bool,
    tid_ext: u16,
    header: LongTableHeader,
    payload: &[u8],
) -> Result<()> {
    let number = u8::try_from(table.section_count())
        .map_err(|_| TsError::Serialization("too many sections".into()))?;
    let section = Section::long(
        LongSectionHeader {
            table_id: tid,
            is_private,
            table_id_extension: tid_ext,
            version: header.version,
            is_current: header.is_current,
            section_number: number,
            last_section_number: number,
        },
        payload,
    )
    .map_err(|e| TsError::Serialization(e.to_string()))?;
    table.add_section(section, true, true)
}
