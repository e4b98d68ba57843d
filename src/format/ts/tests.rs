use super::types::*;
use super::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use quickcheck_macros::quickcheck;
use std::sync::Arc;

const PMT_PID: Pid = 0x0100;
const VIDEO_PID: Pid = 0x0101;
const TELETEXT_PID: Pid = 1068;

// Splits `data` into packets on `pid`. Sections are prefixed with a pointer
// field and padded with 0xFF, PES packets are padded by adaptation field
// stuffing.
fn packetize(pid: Pid, cc: &mut u8, data: &[u8], section: bool) -> Vec<TsPacket> {
    let mut payload = Vec::with_capacity(data.len() + 1);
    if section {
        payload.push(0);
    }
    payload.extend_from_slice(data);

    let mut packets = Vec::new();
    for (i, chunk) in payload.chunks(TS_PACKET_SIZE - TS_HEADER_SIZE).enumerate() {
        let mut pkt = NULL_PACKET;
        pkt.set_pid(pid);
        pkt.set_pusi(i == 0);
        pkt.set_cc(*cc);
        *cc = (*cc + 1) % CC_MAX;

        let stuffing = TS_PACKET_SIZE - TS_HEADER_SIZE - chunk.len();
        let start = if section || stuffing == 0 {
            TS_HEADER_SIZE
        } else {
            pkt.b[3] |= 0x20;
            pkt.b[4] = (stuffing - 1) as u8;
            if stuffing > 1 {
                pkt.b[5] = 0x00;
            }
            TS_HEADER_SIZE + stuffing
        };
        pkt.b[start..start + chunk.len()].copy_from_slice(chunk);
        packets.push(pkt);
    }
    packets
}

fn table_packets(pid: Pid, cc: &mut u8, table: &Table) -> Vec<TsPacket> {
    table
        .sections()
        .flat_map(|section| packetize(pid, cc, section.content(), true))
        .collect()
}

fn pes_bytes(stream_id: u8, pts: u64, payload: &[u8]) -> Vec<u8> {
    let length = (8 + payload.len()) as u16;
    let mut data = vec![0x00, 0x00, 0x01, stream_id];
    data.extend_from_slice(&length.to_be_bytes());
    data.extend_from_slice(&[0x80, 0x80, 0x05, 0, 0, 0, 0, 0]);
    put_pts_dts(&mut data[9..14], pts);
    data.extend_from_slice(payload);
    data
}

fn sample_pat(version: u8) -> Pat {
    let mut pat = Pat::new(version, true, 1);
    pat.services.push(PatService {
        service_id: 4006,
        pmt_pid: PMT_PID,
    });
    pat
}

fn sample_pmt() -> Pmt {
    let mut pmt = Pmt::new(0, true, 4006, VIDEO_PID);
    pmt.streams.push(PmtStream::new(VIDEO_PID, ST_MPEG2_VIDEO));
    let mut teletext = PmtStream::new(TELETEXT_PID, ST_PES_PRIV);
    let td = TeletextDescriptor {
        entries: vec![TeletextEntry::new("fra", descriptors::TELETEXT_SUBTITLES, 888)],
    };
    teletext.descs.append(td.serialize().unwrap());
    pmt.streams.push(teletext);
    pmt
}

#[test]
fn test_pat_then_pmt() {
    let pmts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pmts);
    let mut demux = SectionDemux::new(PidSet::from_pids([PID_PAT])).with_table_handler(
        move |demux: &mut SectionDemux, table: &Table| match table.table_id() {
            TID_PAT => {
                let pat = Pat::deserialize(table).unwrap();
                for service in &pat.services {
                    demux.add_pid(service.pmt_pid);
                }
            }
            TID_PMT => sink.lock().push(Pmt::deserialize(table).unwrap()),
            _ => {}
        },
    );

    let mut pat_cc = 0;
    let mut pmt_cc = 0;
    let pmt_table = sample_pmt().serialize().unwrap();

    // The PMT is ignored until the PAT has been seen.
    demux.feed_packets(&table_packets(PMT_PID, &mut pmt_cc, &pmt_table));
    assert!(pmts.lock().is_empty());

    demux.feed_packets(&table_packets(PID_PAT, &mut pat_cc, &sample_pat(0).serialize().unwrap()));
    assert!(demux.pid_filter().contains(PMT_PID));

    demux.feed_packets(&table_packets(PMT_PID, &mut pmt_cc, &pmt_table));
    let pmts = pmts.lock();
    assert_eq!(pmts.len(), 1);
    assert_eq!(pmts[0], sample_pmt());
    assert!(pmts[0].stream(TELETEXT_PID).unwrap().is_subtitles());
    assert_eq!(demux.packet_count(), 3);
    assert!(!demux.status().has_errors());
}

#[test]
fn test_repeated_sections_and_new_version() {
    let tables = Arc::new(Mutex::new(0));
    let sections = Arc::new(Mutex::new(0));
    let (t, s) = (Arc::clone(&tables), Arc::clone(&sections));
    let mut demux = SectionDemux::new(PidSet::from_pids([PID_PAT]))
        .with_table_handler(move |_: &mut SectionDemux, _: &Table| *t.lock() += 1)
        .with_section_handler(move |_: &mut SectionDemux, _: &Section| *s.lock() += 1);

    let mut cc = 0;
    let v0 = sample_pat(0).serialize().unwrap();
    demux.feed_packets(&table_packets(PID_PAT, &mut cc, &v0));
    demux.feed_packets(&table_packets(PID_PAT, &mut cc, &v0));
    assert_eq!(*tables.lock(), 1);
    assert_eq!(*sections.lock(), 2);

    demux.feed_packets(&table_packets(PID_PAT, &mut cc, &sample_pat(1).serialize().unwrap()));
    assert_eq!(*tables.lock(), 2);
    assert_eq!(*sections.lock(), 3);
}

#[test]
fn test_wrong_crc_is_counted() {
    let tables = Arc::new(Mutex::new(0));
    let t = Arc::clone(&tables);
    let mut demux = SectionDemux::new(PidSet::from_pids([PID_PAT]))
        .with_table_handler(move |_: &mut SectionDemux, _: &Table| *t.lock() += 1);

    let mut cc = 0;
    let mut packets = table_packets(PID_PAT, &mut cc, &sample_pat(0).serialize().unwrap());
    packets[0].b[14] ^= 0x01;
    demux.feed_packets(&packets);
    assert_eq!(*tables.lock(), 0);
    assert_eq!(demux.status().wrong_crc, 1);
}

#[test]
fn test_discontinuity_drops_partial_section() {
    let tables = Arc::new(Mutex::new(Vec::new()));
    let t = Arc::clone(&tables);
    let mut demux = StandaloneTableDemux::new(PidSet::from_pids([PID_PAT]));
    let mut collector = SectionDemux::new(PidSet::from_pids([PID_PAT]))
        .with_table_handler(move |_: &mut SectionDemux, table: &Table| t.lock().push(table.clone()));

    let mut pat = Pat::new(0, true, 1);
    for i in 0..60u16 {
        pat.services.push(PatService {
            service_id: i + 1,
            pmt_pid: 0x200 + i,
        });
    }
    let mut cc = 0;
    let packets = table_packets(PID_PAT, &mut cc, &pat.serialize().unwrap());
    assert_eq!(packets.len(), 2);

    // Second packet lost.
    let mut lost = packets[1];
    lost.set_cc((packets[1].cc() + 1) % CC_MAX);
    demux.feed_packets(&[packets[0], lost]);
    collector.feed_packets(&[packets[0], lost]);
    assert_eq!(demux.status().discontinuities, 1);
    assert_eq!(demux.table_count(), 0);
    assert!(tables.lock().is_empty());

    // The next unit start resynchronizes.
    let mut cc = (lost.cc() + 1) % CC_MAX;
    let packets = table_packets(PID_PAT, &mut cc, &pat.serialize().unwrap());
    demux.feed_packets(&packets);
    collector.feed_packets(&packets);
    assert_eq!(demux.table_count(), 1);
    assert_eq!(Pat::deserialize(&demux.table_at(0).unwrap()).unwrap(), pat);
    assert_eq!(tables.lock().len(), 1);
}

#[test]
fn test_scrambled_packet() {
    let mut demux = StandaloneTableDemux::new(PidSet::from_pids([PID_PAT]));
    let mut cc = 0;
    let mut packets = table_packets(PID_PAT, &mut cc, &sample_pat(0).serialize().unwrap());
    packets[0].set_scrambling(2);
    demux.feed_packets(&packets);
    assert_eq!(demux.status().scrambled, 1);
    assert_eq!(demux.table_count(), 0);
}

fn large_pat(version: u8) -> Pat {
    let mut pat = Pat::new(version, true, 1);
    for i in 0..60u16 {
        pat.services.push(PatService {
            service_id: i + 1,
            pmt_pid: 0x200 + i,
        });
    }
    pat
}

fn counting_demux() -> (SectionDemux, Arc<Mutex<u32>>, Arc<Mutex<u32>>) {
    let tables = Arc::new(Mutex::new(0));
    let sections = Arc::new(Mutex::new(0));
    let (t, s) = (Arc::clone(&tables), Arc::clone(&sections));
    let demux = SectionDemux::new(PidSet::from_pids([PID_PAT]))
        .with_table_handler(move |_: &mut SectionDemux, _: &Table| *t.lock() += 1)
        .with_section_handler(move |_: &mut SectionDemux, _: &Section| *s.lock() += 1);
    (demux, tables, sections)
}

#[test]
fn test_duplicate_packet_ignored() {
    let (mut demux, tables, sections) = counting_demux();
    let mut cc = 0;
    let packets = table_packets(PID_PAT, &mut cc, &sample_pat(0).serialize().unwrap());
    assert_eq!(packets.len(), 1);
    demux.feed_packets(&[packets[0], packets[0]]);
    assert_eq!(*tables.lock(), 1);
    assert_eq!(*sections.lock(), 1);

    // Duplicates inside a multi-packet section are skipped too.
    let packets = table_packets(PID_PAT, &mut cc, &large_pat(1).serialize().unwrap());
    assert_eq!(packets.len(), 2);
    demux.feed_packets(&[packets[0], packets[0], packets[1], packets[1]]);
    assert_eq!(*tables.lock(), 2);
    assert_eq!(*sections.lock(), 2);
    assert_eq!(demux.status().discontinuities, 0);
}

#[test]
fn test_continuity_counter_wraps() {
    let (mut demux, tables, sections) = counting_demux();
    let mut cc = 14;
    let mut packets = table_packets(PID_PAT, &mut cc, &large_pat(0).serialize().unwrap());
    packets.extend(table_packets(PID_PAT, &mut cc, &large_pat(1).serialize().unwrap()));
    let ccs: Vec<u8> = packets.iter().map(|p| p.cc()).collect();
    assert_eq!(ccs, vec![14, 15, 0, 1]);

    demux.feed_packets(&packets);
    assert_eq!(demux.status().discontinuities, 0);
    assert_eq!(*tables.lock(), 2);
    assert_eq!(*sections.lock(), 2);
}

#[test]
fn test_scrambled_packet_inside_section() {
    let mut demux = StandaloneTableDemux::new(PidSet::from_pids([PID_PAT]));
    let pat = large_pat(0);
    let mut cc = 0;
    let mut packets = table_packets(PID_PAT, &mut cc, &pat.serialize().unwrap());
    packets[1].set_scrambling(2);
    demux.feed_packets(&packets);
    assert_eq!(demux.status().scrambled, 1);
    assert_eq!(demux.table_count(), 0);

    // The next clean unit start assembles from scratch.
    demux.feed_packets(&table_packets(PID_PAT, &mut cc, &pat.serialize().unwrap()));
    assert_eq!(demux.table_count(), 1);
    assert_eq!(Pat::deserialize(&demux.table_at(0).unwrap()).unwrap(), pat);
    assert_eq!(demux.status().discontinuities, 0);
}

#[test]
fn test_reset_from_table_handler() {
    let tables = Arc::new(Mutex::new(0));
    let t = Arc::clone(&tables);
    let mut demux = SectionDemux::new(PidSet::from_pids([PID_PAT])).with_table_handler(
        move |demux: &mut SectionDemux, _: &Table| {
            *t.lock() += 1;
            demux.reset();
        },
    );

    // Same version twice: the reset makes the second one a new table.
    let mut cc = 0;
    let table = sample_pat(0).serialize().unwrap();
    demux.feed_packets(&table_packets(PID_PAT, &mut cc, &table));
    demux.feed_packets(&table_packets(PID_PAT, &mut cc, &table));
    assert_eq!(*tables.lock(), 2);
    assert_eq!(demux.packet_count(), 2);
}

#[test]
fn test_handler_removes_itself() {
    let tables = Arc::new(Mutex::new(0));
    let t = Arc::clone(&tables);
    let mut demux = SectionDemux::new(PidSet::from_pids([PID_PAT])).with_table_handler(
        move |demux: &mut SectionDemux, _: &Table| {
            *t.lock() += 1;
            demux.set_table_handler(None);
        },
    );

    let mut cc = 0;
    for version in 0..3 {
        demux.feed_packets(&table_packets(PID_PAT, &mut cc, &sample_pat(version).serialize().unwrap()));
    }
    assert_eq!(*tables.lock(), 1);
}

#[test]
fn test_standalone_reset_pid() {
    let mut demux = StandaloneTableDemux::new(PidSet::from_pids([PID_PAT, PMT_PID]));
    let (mut pat_cc, mut pmt_cc) = (0, 0);
    demux.feed_packets(&table_packets(PID_PAT, &mut pat_cc, &sample_pat(0).serialize().unwrap()));
    demux.feed_packets(&table_packets(PMT_PID, &mut pmt_cc, &sample_pmt().serialize().unwrap()));
    assert_eq!(demux.table_count(), 2);
    assert_eq!(demux.table_at(1).unwrap().table_id(), TID_PMT);

    demux.reset_pid(PMT_PID);
    let tables = demux.tables();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0].source_pid(), PID_PAT);
}

#[test]
fn test_pes_reassembly() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let mut demux = PesDemux::new(PidSet::from_pids([VIDEO_PID]))
        .with_handler(move |_: &mut PesDemux, pes: &PesPacket| sink.lock().push(pes.clone()));

    let payload: Vec<u8> = (0..400u16).map(|i| i as u8).collect();
    let mut cc = 0;
    let mut packets = packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 90_000, &payload), false);
    assert_eq!(packets.len(), 3);
    // The packet is complete when the next one starts.
    packets.extend(packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 93_600, &[0; 10]), false));
    demux.feed_packets(&packets);

    let received = received.lock();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].stream_id(), SID_VIDEO);
    assert_eq!(received[0].pts(), Some(90_000));
    assert_eq!(received[0].payload(), payload.as_slice());
    assert_eq!(received[0].source_pid(), VIDEO_PID);
    assert_eq!(received[0].first_ts_packet_index(), 0);
    assert_eq!(received[0].last_ts_packet_index(), 2);
    assert_eq!(demux.pes_count(), 1);
}

#[test]
fn test_pes_reset_pid_from_handler() {
    let count = Arc::new(Mutex::new(0));
    let c = Arc::clone(&count);
    let mut demux = PesDemux::default().with_handler(move |demux: &mut PesDemux, pes: &PesPacket| {
        *c.lock() += 1;
        demux.reset_pid(pes.source_pid());
    });

    let mut cc = 0;
    let mut pes = |demux: &mut PesDemux, size: usize| {
        let packets = packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 0, &vec![0x55; size]), false);
        demux.feed_packets(&packets);
    };

    pes(&mut demux, 300);
    pes(&mut demux, 300);
    // The start of the second packet was dropped with the reset.
    assert_eq!(*count.lock(), 1);
    pes(&mut demux, 10);
    assert_eq!(*count.lock(), 1);
    pes(&mut demux, 10);
    assert_eq!(*count.lock(), 2);
}

#[test]
fn test_pes_scrambled_drops_context() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let mut demux = PesDemux::new(PidSet::from_pids([VIDEO_PID]))
        .with_handler(move |_: &mut PesDemux, pes: &PesPacket| sink.lock().push(pes.pts()));

    let mut cc = 0;
    let mut packets = packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 1000, &[0; 300]), false);
    packets[1].set_scrambling(3);
    packets.extend(packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 2000, &[0; 10]), false));
    demux.feed_packets(&packets);
    assert_eq!(demux.pes_count(), 0);

    // Reassembly restarts cleanly at the following unit start.
    demux.feed_packets(&packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 3000, &[0; 10]), false));
    assert_eq!(demux.pes_count(), 1);
    assert_eq!(*received.lock(), vec![Some(2000)]);
}

#[test]
fn test_pes_duplicate_unit_start() {
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let mut demux = PesDemux::new(PidSet::from_pids([VIDEO_PID]))
        .with_handler(move |_: &mut PesDemux, pes: &PesPacket| sink.lock().push(pes.pts()));

    let mut cc = 0;
    let mut single = |pts: u64| packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, pts, &[0x42; 20]), false)[0];
    let (a, b, c) = (single(1000), single(2000), single(3000));
    demux.feed_packets(&[a, a, b, c]);
    assert_eq!(*received.lock(), vec![Some(1000), Some(2000)]);
    assert_eq!(demux.pes_count(), 2);
}

#[test]
fn test_pes_duplicate_continuation() {
    let sizes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&sizes);
    let mut demux = PesDemux::new(PidSet::from_pids([VIDEO_PID]))
        .with_handler(move |_: &mut PesDemux, pes: &PesPacket| sink.lock().push(pes.payload().len()));

    let mut cc = 0;
    let first = packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 0, &[0x11; 300]), false);
    let next = packetize(VIDEO_PID, &mut cc, &pes_bytes(SID_VIDEO, 0, &[0x22; 10]), false);
    demux.feed_packets(&[first[0], first[1], first[1], next[0]]);
    assert_eq!(*sizes.lock(), vec![300]);
}

#[quickcheck]
fn prop_pat_through_demux(count: u8) -> bool {
    let mut pat = Pat::new(count % 32, true, 0x1234);
    for i in 0..u16::from(count) {
        pat.services.push(PatService {
            service_id: i + 1,
            pmt_pid: 0x20 + i,
        });
    }
    let mut demux = StandaloneTableDemux::new(PidSet::from_pids([PID_PAT]));
    let mut cc = 0;
    demux.feed_packets(&table_packets(PID_PAT, &mut cc, &pat.serialize().unwrap()));
    demux.table_count() == 1 && Pat::deserialize(&demux.table_at(0).unwrap()).unwrap() == pat
}
