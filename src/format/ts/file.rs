use super::demux::Demux;
use super::packet::TsPacket;
use super::types::*;
use crate::error::Result;
use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use futures::stream::{self, Stream};
use log::debug;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Number of packets examined to detect the packet format.
const DETECTION_PACKETS: usize = 8;

/// Size of the timecode prefix of M2TS packets.
const M2TS_HEADER_SIZE: usize = M2TS_PACKET_SIZE - TS_PACKET_SIZE;

/// Any producer of TS packets.
#[async_trait]
pub trait PacketSource: Send {
    /// Reads the next packet, `None` at end of stream.
    async fn read_packet(&mut self) -> Result<Option<TsPacket>>;
}

/// Reads TS packets from a file or any asynchronous byte stream.
///
/// Both plain 188-byte TS and 192-byte M2TS packets are accepted, the
/// format is detected on the first packets. A truncated packet at the end
/// of the stream is ignored.
pub struct TsFileReader<R: AsyncRead + Unpin> {
    reader: R,
    buffer: BytesMut,
    packet_size: Option<usize>,
    eof: bool,
}

impl TsFileReader<File> {
    /// Opens a TS or M2TS file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(File::open(path).await?))
    }
}

impl<R: AsyncRead + Unpin> TsFileReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: BytesMut::with_capacity(DETECTION_PACKETS * M2TS_PACKET_SIZE),
            packet_size: None,
            eof: false,
        }
    }

    /// Size of packets in the stream, known after the first read.
    pub fn packet_size(&self) -> Option<usize> {
        self.packet_size
    }

    /// True when the stream uses 192-byte M2TS packets.
    pub fn is_m2ts(&self) -> bool {
        self.packet_size == Some(M2TS_PACKET_SIZE)
    }

    // Reads until `size` bytes are buffered or the end of stream.
    async fn fill(&mut self, size: usize) -> Result<()> {
        while !self.eof && self.buffer.len() < size {
            self.buffer.reserve(size - self.buffer.len());
            if self.reader.read_buf(&mut self.buffer).await? == 0 {
                self.eof = true;
            }
        }
        Ok(())
    }

    // Votes on the alignment of sync bytes in the buffered data.
    fn detect_packet_size(&self) -> usize {
        let data = &self.buffer[..];
        let votes = |size: usize, offset: usize| {
            (0..DETECTION_PACKETS)
                .map(|i| offset + i * size)
                .take_while(|&pos| pos < data.len())
                .filter(|&pos| data[pos] == SYNC_BYTE)
                .count()
        };
        let ts = votes(TS_PACKET_SIZE, 0);
        let m2ts = votes(M2TS_PACKET_SIZE, M2TS_HEADER_SIZE);
        debug!("packet format votes: TS {}, M2TS {}", ts, m2ts);
        if m2ts > ts {
            M2TS_PACKET_SIZE
        } else {
            TS_PACKET_SIZE
        }
    }

    /// Reads the next packet, `None` at end of stream.
    pub async fn read_packet(&mut self) -> Result<Option<TsPacket>> {
        let packet_size = match self.packet_size {
            Some(size) => size,
            None => {
                self.fill(DETECTION_PACKETS * M2TS_PACKET_SIZE).await?;
                let size = self.detect_packet_size();
                self.packet_size = Some(size);
                size
            }
        };

        self.fill(packet_size).await?;
        if self.buffer.len() < packet_size {
            if !self.buffer.is_empty() {
                debug!("ignoring {} trailing bytes", self.buffer.len());
                self.buffer.clear();
            }
            return Ok(None);
        }

        if packet_size == M2TS_PACKET_SIZE {
            self.buffer.advance(M2TS_HEADER_SIZE);
        }
        let packet = TsPacket::from_slice(&self.buffer[..TS_PACKET_SIZE])?;
        self.buffer.advance(TS_PACKET_SIZE);
        Ok(Some(packet))
    }

    /// Turns the reader into a stream of packets. The stream ends after the
    /// first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<TsPacket>> {
        stream::unfold(Some(self), |reader| async move {
            let mut reader = reader?;
            match reader.read_packet().await {
                Ok(Some(packet)) => Some((Ok(packet), Some(reader))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> PacketSource for TsFileReader<R> {
    async fn read_packet(&mut self) -> Result<Option<TsPacket>> {
        TsFileReader::read_packet(self).await
    }
}

/// Feeds every packet of `source` to all `demuxes`, in order.
///
/// Returns the number of packets read.
pub async fn feed_all<S: PacketSource + ?Sized>(
    source: &mut S,
    demuxes: &mut [&mut dyn Demux],
) -> Result<PacketCounter> {
    let mut count = 0;
    while let Some(packet) = source.read_packet().await? {
        for demux in demuxes.iter_mut() {
            demux.feed_packet(&packet);
        }
        count += 1;
    }
    Ok(count)
}

/// Writes 188-byte packets to `sink` and flushes it.
pub async fn write_packets<W: AsyncWrite + Unpin>(sink: &mut W, packets: &[TsPacket]) -> Result<()> {
    for packet in packets {
        sink.write_all(&packet.b).await?;
    }
    sink.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::ts::packet::NULL_PACKET;
    use futures::StreamExt;
    use std::io::Cursor;

    fn packets(count: u16) -> Vec<TsPacket> {
        (0..count)
            .map(|i| {
                let mut pkt = NULL_PACKET;
                pkt.set_pid(0x100 + i);
                pkt
            })
            .collect()
    }

    #[tokio::test]
    async fn test_read_ts_with_partial_reads() {
        let mut data = Vec::new();
        write_packets(&mut data, &packets(3)).await.unwrap();
        data.extend_from_slice(&[0x47, 0x00]);

        let mock = tokio_test::io::Builder::new()
            .read(&data[..100])
            .read(&data[100..300])
            .read(&data[300..])
            .build();
        let mut reader = TsFileReader::new(mock);
        let mut pids = Vec::new();
        while let Some(pkt) = reader.read_packet().await.unwrap() {
            pids.push(pkt.pid());
        }
        assert_eq!(pids, vec![0x100, 0x101, 0x102]);
        assert_eq!(reader.packet_size(), Some(TS_PACKET_SIZE));
    }

    #[tokio::test]
    async fn test_read_m2ts() {
        let mut data = Vec::new();
        for pkt in packets(10) {
            data.extend_from_slice(&[0x12, 0x34, 0x56, 0x78]);
            data.extend_from_slice(&pkt.b);
        }
        let reader = TsFileReader::new(Cursor::new(data));
        let all: Vec<TsPacket> = reader
            .into_stream()
            .map(|pkt| pkt.unwrap())
            .collect()
            .await;
        assert_eq!(all.len(), 10);
        assert_eq!(all[9].pid(), 0x109);
    }

    #[tokio::test]
    async fn test_empty_stream() {
        let mut reader = TsFileReader::new(Cursor::new(Vec::new()));
        assert!(reader.read_packet().await.unwrap().is_none());
        assert!(reader.read_packet().await.unwrap().is_none());
    }
}
