//! sACN (E1.31) output.
//!
//! Each universe goes out as one 638-byte data packet to its multicast group
//! `239.255.<hi>.<lo>:5568`. The constant parts of the packet are laid out once; per send only
//! the sequence number, universe and DMX payload change.

use std::collections::{HashMap, HashSet};
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use prism_fixtures::DMX_CHANNELS;
use thiserror::Error;
use uuid::Uuid;

use crate::output::mapper::{DmxUniverse, UniverseBuffers};
use crate::output::network_config::NetworkConfig;

pub const SACN_PORT: u16 = 5568;
pub const PACKET_LEN: usize = 638;
pub const HEADER_LEN: usize = 126;
pub const DEFAULT_PRIORITY: u8 = 100;
pub const MAX_PRIORITY: u8 = 200;
pub const MAX_UNIVERSE: u16 = 63999;

const ACN_PACKET_IDENTIFIER: [u8; 12] = *b"ASC-E1.17\0\0\0";
const VECTOR_ROOT_E131_DATA: u32 = 0x0000_0004;
const VECTOR_E131_DATA_PACKET: u32 = 0x0000_0002;
const VECTOR_DMP_SET_PROPERTY: u8 = 0x02;
const SOURCE_NAME_LEN: usize = 64;

const PRIORITY_OFFSET: usize = 108;
const SEQUENCE_OFFSET: usize = 111;
const UNIVERSE_OFFSET: usize = 113;

#[derive(Debug, Error)]
pub enum SacnError {
    #[error("sACN universe {0} is outside 1..=63999")]
    InvalidUniverse(u16),
    #[error("sACN socket error: {0}")]
    Io(#[from] io::Error),
}

pub fn multicast_addr(universe: u16) -> SocketAddrV4 {
    let [hi, lo] = universe.to_be_bytes();
    SocketAddrV4::new(Ipv4Addr::new(239, 255, hi, lo), SACN_PORT)
}

fn flags_and_length(from_offset: usize) -> [u8; 2] {
    (0x7000u16 | (PACKET_LEN - from_offset) as u16).to_be_bytes()
}

/// A reusable E1.31 data packet.
#[derive(Clone)]
pub struct SacnPacket {
    buf: [u8; PACKET_LEN],
}

impl SacnPacket {
    pub fn new(cid: [u8; 16], source_name: &str, priority: u8) -> Self {
        let mut buf = [0u8; PACKET_LEN];

        // Root layer
        buf[0..2].copy_from_slice(&0x0010u16.to_be_bytes());
        buf[2..4].copy_from_slice(&0x0000u16.to_be_bytes());
        buf[4..16].copy_from_slice(&ACN_PACKET_IDENTIFIER);
        buf[16..18].copy_from_slice(&flags_and_length(16));
        buf[18..22].copy_from_slice(&VECTOR_ROOT_E131_DATA.to_be_bytes());
        buf[22..38].copy_from_slice(&cid);

        // Framing layer
        buf[38..40].copy_from_slice(&flags_and_length(38));
        buf[40..44].copy_from_slice(&VECTOR_E131_DATA_PACKET.to_be_bytes());
        // Null terminated, so at most 63 bytes of name
        let name = source_name.as_bytes();
        let name_len = name.len().min(SOURCE_NAME_LEN - 1);
        buf[44..44 + name_len].copy_from_slice(&name[..name_len]);
        buf[PRIORITY_OFFSET] = priority.min(MAX_PRIORITY);
        // 109-110 sync address, 112 options: all zero

        // DMP layer
        buf[115..117].copy_from_slice(&flags_and_length(115));
        buf[117] = VECTOR_DMP_SET_PROPERTY;
        buf[118] = 0xa1;
        buf[119..121].copy_from_slice(&0x0000u16.to_be_bytes());
        buf[121..123].copy_from_slice(&0x0001u16.to_be_bytes());
        buf[123..125].copy_from_slice(&(DMX_CHANNELS as u16 + 1).to_be_bytes());
        // 125 is the DMX start code, always 0

        Self { buf }
    }

    pub fn priority(&self) -> u8 {
        self.buf[PRIORITY_OFFSET]
    }

    pub fn set_priority(&mut self, priority: u8) {
        self.buf[PRIORITY_OFFSET] = priority.min(MAX_PRIORITY);
    }

    pub fn cid(&self) -> &[u8] {
        &self.buf[22..38]
    }

    /// Fill in the per-send fields and return the wire bytes.
    pub fn encode(&mut self, universe: u16, sequence: u8, data: &DmxUniverse) -> &[u8] {
        self.buf[SEQUENCE_OFFSET] = sequence;
        self.buf[UNIVERSE_OFFSET..UNIVERSE_OFFSET + 2].copy_from_slice(&universe.to_be_bytes());
        self.buf[HEADER_LEN..].copy_from_slice(data);
        &self.buf
    }
}

/// Sends universe buffers out over the configured interfaces.
///
/// One non-blocking socket per interface, opened on first use and kept. A failing interface is
/// reported once and then stays quiet until a send through it succeeds again.
pub struct SacnSender {
    packet: SacnPacket,
    network_config: NetworkConfig,
    sockets: HashMap<Ipv4Addr, UdpSocket>,
    sequences: HashMap<u16, u8>,
    failing: HashSet<Ipv4Addr>,
}

impl SacnSender {
    pub fn new(source_name: &str, network_config: NetworkConfig) -> Self {
        let cid = *Uuid::new_v4().as_bytes();
        log::info!(
            "sACN source \"{}\" with CID {}",
            source_name,
            Uuid::from_bytes(cid)
        );

        Self {
            packet: SacnPacket::new(cid, source_name, DEFAULT_PRIORITY),
            network_config,
            sockets: HashMap::new(),
            sequences: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn priority(&self) -> u8 {
        self.packet.priority()
    }

    /// Set the priority (0-200, default 100)
    pub fn set_priority(&mut self, priority: u8) {
        if priority > MAX_PRIORITY {
            log::warn!("sACN priority {} clamped to {}", priority, MAX_PRIORITY);
        }
        self.packet.set_priority(priority);
    }

    pub fn network_config(&self) -> &NetworkConfig {
        &self.network_config
    }

    /// Swap the interface setup. Open sockets are dropped and reopened on demand.
    pub fn set_network_config(&mut self, network_config: NetworkConfig) {
        log::info!("sACN output now on {}", network_config.describe());
        self.network_config = network_config;
        self.sockets.clear();
        self.failing.clear();
    }

    /// Sequence number for the next packet of `universe`.
    pub fn next_sequence(&mut self, universe: u16) -> u8 {
        let sequence = self.sequences.entry(universe).or_insert(0);
        let current = *sequence;
        *sequence = sequence.wrapping_add(1);
        current
    }

    /// Send every buffer. Returns how many universes went out.
    pub fn send(&mut self, universes: &UniverseBuffers) -> usize {
        let mut sent = 0;
        for (universe, data) in universes.iter() {
            if universe == 0 || universe > MAX_UNIVERSE {
                log::debug!("{}", SacnError::InvalidUniverse(universe));
                continue;
            }
            let Some(address) = self
                .network_config
                .interface_for_universe(universe)
                .map(|interface| interface.address)
            else {
                continue;
            };

            let sequence = self.next_sequence(universe);
            match self.send_universe(address, universe, sequence, data) {
                Ok(()) => {
                    if self.failing.remove(&address) {
                        log::info!("sACN output on {} recovered", address);
                    }
                    sent += 1;
                }
                Err(SacnError::Io(e)) if e.kind() == io::ErrorKind::WouldBlock => {
                    log::debug!("sACN send buffer full on {}, dropped universe {}", address, universe);
                }
                Err(e) => {
                    self.sockets.remove(&address);
                    if self.failing.insert(address) {
                        log::warn!("sACN output on {} failed: {}", address, e);
                    }
                }
            }
        }
        sent
    }

    fn send_universe(
        &mut self,
        address: Ipv4Addr,
        universe: u16,
        sequence: u8,
        data: &DmxUniverse,
    ) -> Result<(), SacnError> {
        if !self.sockets.contains_key(&address) {
            let socket = UdpSocket::bind(SocketAddrV4::new(address, 0))?;
            socket.set_nonblocking(true)?;
            socket.set_multicast_loop_v4(false)?;
            log::debug!("Opened sACN socket on {}", address);
            self.sockets.insert(address, socket);
        }

        let packet = self.packet.encode(universe, sequence, data);
        if let Some(socket) = self.sockets.get(&address) {
            socket.send_to(packet, multicast_addr(universe))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet() -> SacnPacket {
        SacnPacket::new([7; 16], "Prism", DEFAULT_PRIORITY)
    }

    #[test]
    fn test_packet_layout() {
        let mut packet = packet();
        let mut data = [0u8; DMX_CHANNELS];
        data[0] = 255;
        data[511] = 9;
        let bytes = packet.encode(1, 42, &data).to_vec();

        assert_eq!(bytes.len(), PACKET_LEN);
        assert_eq!(&bytes[0..4], &[0x00, 0x10, 0x00, 0x00]);
        assert_eq!(&bytes[4..16], b"ASC-E1.17\0\0\0");
        assert_eq!(&bytes[16..18], &[0x72, 0x6e]);
        assert_eq!(&bytes[18..22], &[0, 0, 0, 4]);
        assert_eq!(&bytes[22..38], &[7; 16]);
        assert_eq!(&bytes[38..40], &[0x72, 0x58]);
        assert_eq!(&bytes[40..44], &[0, 0, 0, 2]);
        assert_eq!(&bytes[44..49], b"Prism");
        assert_eq!(bytes[49], 0);
        assert_eq!(bytes[108], 100);
        assert_eq!(bytes[111], 42);
        assert_eq!(&bytes[113..115], &[0, 1]);
        assert_eq!(&bytes[115..117], &[0x72, 0x0b]);
        assert_eq!(bytes[117], 0x02);
        assert_eq!(bytes[118], 0xa1);
        assert_eq!(&bytes[119..125], &[0, 0, 0, 1, 0x02, 0x01]);
        assert_eq!(bytes[125], 0);
        assert_eq!(bytes[126], 255);
        assert_eq!(bytes[637], 9);
    }

    #[test]
    fn test_long_source_name_is_terminated() {
        let name = "x".repeat(100);
        let mut packet = SacnPacket::new([0; 16], &name, DEFAULT_PRIORITY);
        let bytes = packet.encode(1, 0, &[0; DMX_CHANNELS]).to_vec();
        assert!(bytes[44..107].iter().all(|b| *b == b'x'));
        assert_eq!(bytes[107], 0);
    }

    #[test]
    fn test_priority_is_capped() {
        let mut packet = packet();
        packet.set_priority(150);
        assert_eq!(packet.priority(), 150);
        packet.set_priority(255);
        assert_eq!(packet.priority(), MAX_PRIORITY);
    }

    #[test]
    fn test_universe_is_big_endian() {
        let mut packet = packet();
        let bytes = packet.encode(0x1234, 0, &[0; DMX_CHANNELS]).to_vec();
        assert_eq!(&bytes[113..115], &[0x12, 0x34]);
    }

    #[test]
    fn test_multicast_addr() {
        assert_eq!(multicast_addr(1).to_string(), "239.255.0.1:5568");
        assert_eq!(multicast_addr(256).to_string(), "239.255.1.0:5568");
        assert_eq!(multicast_addr(63999).to_string(), "239.255.249.255:5568");
    }

    #[test]
    fn test_sequence_per_universe_wraps() {
        let mut sender = SacnSender::new("Prism", NetworkConfig::default());
        assert_eq!(sender.next_sequence(1), 0);
        assert_eq!(sender.next_sequence(1), 1);
        assert_eq!(sender.next_sequence(2), 0);

        for _ in 2..255 {
            sender.next_sequence(1);
        }
        assert_eq!(sender.next_sequence(1), 255);
        assert_eq!(sender.next_sequence(1), 0);
    }

    #[test]
    fn test_unrouted_and_invalid_universes_are_skipped() {
        let mut sender = SacnSender::new("Prism", NetworkConfig::new(None));
        let mut buffers = UniverseBuffers::new();
        buffers.universe_mut(1)[0] = 1;
        buffers.universe_mut(0);
        buffers.universe_mut(64000);

        assert_eq!(sender.send(&buffers), 0);
        // Nothing was sent so no sequence was spent
        assert_eq!(sender.next_sequence(1), 0);
    }
}
