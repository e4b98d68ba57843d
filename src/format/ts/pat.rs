use super::psi::{add_long_section, check_table, LongTableHeader, TableCodec};
use super::table::Table;
use super::types::*;
use crate::error::Result;
use bytes::{Buf, BufMut, BytesMut};

/// One service of a PAT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatService {
    pub service_id: u16,
    pub pmt_pid: Pid,
}

/// Program Association Table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pat {
    pub header: LongTableHeader,
    pub transport_stream_id: u16,
    /// PID of the NIT, `PID_NULL` when absent.
    pub nit_pid: Pid,
    pub services: Vec<PatService>,
}

impl Default for Pat {
    fn default() -> Self {
        Self {
            header: LongTableHeader::default(),
            transport_stream_id: 0,
            nit_pid: PID_NULL,
            services: Vec::new(),
        }
    }
}

impl Pat {
    pub fn new(version: u8, is_current: bool, transport_stream_id: u16) -> Self {
        Self {
            header: LongTableHeader { version, is_current },
            transport_stream_id,
            ..Self::default()
        }
    }

    /// PMT PID of a service, if the service is declared.
    pub fn pmt_pid(&self, service_id: u16) -> Option<Pid> {
        self.services
            .iter()
            .find(|s| s.service_id == service_id)
            .map(|s| s.pmt_pid)
    }
}

impl TableCodec for Pat {
    const TABLE_ID: u8 = TID_PAT;

    fn serialize(&self) -> Result<Table> {
        let mut table = Table::new();
        let mut payload = BytesMut::new();

        // The NIT is declared as service 0 in the first section.
        if self.nit_pid != PID_NULL {
            payload.put_u16(0);
            payload.put_u16(self.nit_pid | 0xE000);
        }

        for service in &self.services {
            if payload.len() > MAX_PSI_LONG_SECTION_PAYLOAD_SIZE - 4 {
                add_long_section(&mut table, TID_PAT, false, self.transport_stream_id, self.header, &payload)?;
                payload.clear();
            }
            payload.put_u16(service.service_id);
            payload.put_u16(service.pmt_pid | 0xE000);
        }

        add_long_section(&mut table, TID_PAT, false, self.transport_stream_id, self.header, &payload)?;
        Ok(table)
    }

    fn deserialize(table: &Table) -> Result<Self> {
        check_table(table, TID_PAT)?;
        let mut pat = Self::default();
        for section in table.sections() {
            pat.header = LongTableHeader {
                version: section.version(),
                is_current: section.is_current(),
            };
            pat.transport_stream_id = section.table_id_extension();
            let mut data = section.payload();
            while data.remaining() >= 4 {
                let service_id = data.get_u16();
                let pid = data.get_u16() & 0x1FFF;
                if service_id == 0 {
                    pat.nit_pid = pid;
                } else {
                    pat.services.push(PatService {
                        service_id,
                        pmt_pid: pid,
                    });
                }
            }
        }
        Ok(pat)
    }
}
