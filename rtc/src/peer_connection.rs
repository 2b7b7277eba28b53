//! Peer connection (C8): owns one video track, one ICE channel, one DTLS
//! transport, and the SRTP contexts derived from it. Orchestrates SDP
//! offer/answer, drives the §4.14 connection state machine, and implements
//! `send_video`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dtls::{Certificate, DtlsTransport, Role as DtlsRole};
use ice::{Agent, AgentConfig, ConnectionState as IceConnectionState, IceRole};
use rand::RngCore;
use sdp::{Direction, SdpType, SessionDescription, Setup, VideoOfferParams};
use srtp::{AuthKind, CipherKind, SrtcpContext, SrtpContext};
use tokio::sync::watch;

use crate::config::PeerConnectionConfig;
use crate::demux::Datagram;
use crate::error::{Error, Result, SignalingError};
use crate::media::{self, VideoTrack};
use crate::udp_pool::UdpIoPool;

const SRTP_CIPHER: CipherKind = CipherKind::AesCm128;
const SRTP_AUTH: AuthKind = AuthKind::HmacSha1;
const SRTP_AUTH_TAG_LEN: usize = 10;
const SRTP_SALT_LEN: usize = 14;

/// §4.14's five externally observable states (`Connecting` covers both the
/// ICE-checking and DTLS-handshaking sub-phases; the spec does not split
/// them further).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// The events §4.14's transition table is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    IceConnectedFirst,
    IceConnectedExisting,
    IceDisconnected,
    IceFailed,
    DtlsOk,
    DtlsFail,
    Close,
}

/// Applies one cell of the §4.14 transition table. Returns `None` when the
/// event has no effect in the given state (the table's `—` entries) — the
/// caller keeps the prior state in that case, and `Closed` absorbs every
/// event, including ones not listed in the table at all.
fn next_state(current: PeerConnectionState, event: ConnectionEvent) -> Option<PeerConnectionState> {
    use ConnectionEvent::*;
    use PeerConnectionState::*;

    if current == Closed {
        return None;
    }
    if event == Close {
        return Some(Closed);
    }

    match (current, event) {
        (New, IceConnectedFirst) => Some(Connecting),
        (New, IceFailed) => Some(Failed),
        (Connecting, IceConnectedExisting) => Some(Connecting),
        (Connecting, IceDisconnected) => Some(Failed),
        (Connecting, IceFailed) => Some(Failed),
        (Connecting, DtlsOk) => Some(Connected),
        (Connecting, DtlsFail) => Some(Closed),
        (Connected, IceDisconnected) => Some(Disconnected),
        (Connected, IceFailed) => Some(Failed),
        (Disconnected, IceConnectedFirst) => Some(Connected),
        (Disconnected, IceConnectedExisting) => Some(Connected),
        (Disconnected, IceFailed) => Some(Failed),
        _ => None,
    }
}

fn random_ice_credential(len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..len).map(|_| ALPHABET[(rng.next_u32() as usize) % ALPHABET.len()] as char).collect()
}

struct RemoteInfo {
    role: IceRole,
    dtls_setup: Setup,
    fingerprint_hash_function: String,
    fingerprint_hex: String,
}

pub struct PeerConnection {
    config: PeerConnectionConfig,
    session_id: u64,
    local_ufrag: String,
    local_pwd: String,
    local_cert: Certificate,
    video_track: VideoTrack,
    cname: String,
    udp_pool: Arc<UdpIoPool>,
    state: Mutex<PeerConnectionState>,
    ice: Mutex<Option<Agent>>,
    remote: Mutex<Option<RemoteInfo>>,
    nominated_remote: Mutex<Option<SocketAddr>>,
    dtls: Mutex<Option<Arc<DtlsTransport>>>,
    srtp_tx: Mutex<Option<SrtpContext>>,
    srtcp_rx: Mutex<HashMap<u32, SrtcpContext>>,
    remote_srtp_material: Mutex<Option<(Vec<u8>, [u8; SRTP_SALT_LEN])>>,
    local_dtls_role: Mutex<Option<DtlsRole>>,
    session_id_counter: AtomicU64,
}

impl PeerConnection {
    pub async fn new(config: PeerConnectionConfig) -> Result<Self> {
        let udp_pool = UdpIoPool::bind(config.bind_address, &config.udp_pool).await?;
        let local_cert = Certificate::generate_self_signed().map_err(Error::Dtls)?;
        let mut session_id_bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut session_id_bytes);

        Ok(PeerConnection {
            video_track: VideoTrack::new(config.video_ssrc, config.video_payload_type),
            config,
            session_id: u64::from_be_bytes(session_id_bytes) & 0x7fff_ffff_ffff_ffff,
            local_ufrag: random_ice_credential(4),
            local_pwd: random_ice_credential(22),
            local_cert,
            cname: random_ice_credential(16),
            udp_pool: Arc::new(udp_pool),
            state: Mutex::new(PeerConnectionState::New),
            ice: Mutex::new(None),
            remote: Mutex::new(None),
            nominated_remote: Mutex::new(None),
            dtls: Mutex::new(None),
            srtp_tx: Mutex::new(None),
            srtcp_rx: Mutex::new(HashMap::new()),
            remote_srtp_material: Mutex::new(None),
            local_dtls_role: Mutex::new(None),
            session_id_counter: AtomicU64::new(0),
        })
    }

    pub fn state(&self) -> PeerConnectionState {
        *self.state.lock().unwrap()
    }

    fn apply_event(&self, event: ConnectionEvent) {
        let mut state = self.state.lock().unwrap();
        if let Some(next) = next_state(*state, event) {
            log::info!("peer_connection: {:?} -> {:?} on {:?}", *state, next, event);
            *state = next;
        }
    }

    /// `create_offer` (§4.8, §6). The local ICE role defaults to `actpass`
    /// until a remote description picks a concrete setup role.
    pub fn create_offer(&self) -> String {
        if self.ice.lock().unwrap().is_none() {
            self.start_ice_agent(IceRole::Controlling);
        }
        let ice = self.ice.lock().unwrap();
        let agent = ice.as_ref().expect("ICE agent started above");

        let candidates = agent
            .local_candidates()
            .iter()
            .map(|c| format!("{} 1 udp {} {} {} typ host", c.foundation, c.priority, c.addr.ip(), c.addr.port()))
            .collect();

        let params = VideoOfferParams {
            session_id: self.session_id,
            payload_type: self.config.video_payload_type,
            ice_ufrag: self.local_ufrag.clone(),
            ice_pwd: self.local_pwd.clone(),
            setup: Setup::ActPass,
            fingerprint_hash_function: "sha-256".to_string(),
            fingerprint_hex: self.local_cert.fingerprint(),
            candidates,
            gathering_complete: agent.is_gathering_complete(),
            ssrc: self.video_track.ssrc,
            cname: self.cname.clone(),
        };
        sdp::video_offer(params).marshal()
    }

    fn start_ice_agent(&self, role: IceRole) {
        let mut agent = Agent::new(AgentConfig {
            local_ufrag: self.local_ufrag.clone(),
            local_pwd: self.local_pwd.clone(),
            tiebreaker: rand::thread_rng().next_u64(),
            role,
        });
        let port = self.udp_pool.local_addr().map(|a| a.port()).unwrap_or(0);
        agent.gather(port);
        *self.ice.lock().unwrap() = Some(agent);
    }

    /// `set_remote_description` (§4.8, §6). Follows the §4.8 role-assignment
    /// policy: an ice-lite remote makes us the controller; a remote `answer`
    /// also makes us the controller, with DTLS active/passive mirrored from
    /// the remote's declared setup; on an `offer` we default to
    /// controller-active.
    pub fn set_remote_description(&self, sdp_text: &str, sdp_type: SdpType) -> std::result::Result<(), SignalingError> {
        if sdp_type == SdpType::Offer && self.remote.lock().unwrap().is_some() {
            return Err(SignalingError::WrongSdpTypeOfferAfterOffer);
        }

        let parsed = SessionDescription::parse(sdp_text).map_err(|_| SignalingError::Error)?;
        let media = parsed.first_video_media().ok_or(SignalingError::NoMatchingMediaType)?;

        let has_h264 = media.rtpmap.iter().any(|m| m.codec.eq_ignore_ascii_case("h264"));
        if !has_h264 {
            return Err(SignalingError::VideoIncompatible);
        }

        let fingerprint = parsed.dtls_fingerprint().ok_or(SignalingError::DtlsFingerprintMissing)?;
        if fingerprint.hash_function.to_ascii_lowercase() != "sha-256" {
            return Err(SignalingError::DtlsFingerprintDigestNotSupported);
        }

        let (ufrag, pwd) = parsed.ice_credentials().ok_or(SignalingError::NoRemoteMedia)?;
        let remote_setup = media.setup.or_else(|| parsed.dtls_setup()).unwrap_or(Setup::ActPass);
        let ice_lite = parsed.other_attributes.iter().any(|(k, _)| k == "ice-lite")
            || media.other_attributes.iter().any(|(k, _)| k == "ice-lite");

        let (local_role, local_setup) = if ice_lite {
            (IceRole::Controlling, Setup::Active)
        } else if sdp_type == SdpType::Answer {
            let mirrored = match remote_setup {
                Setup::Active => Setup::Passive,
                Setup::Passive => Setup::Active,
                Setup::ActPass => Setup::Active,
            };
            (IceRole::Controlling, mirrored)
        } else {
            (IceRole::Controlling, Setup::Active)
        };

        if self.ice.lock().unwrap().is_none() {
            self.start_ice_agent(local_role);
        }

        {
            let mut ice = self.ice.lock().unwrap();
            let agent = ice.as_mut().expect("ICE agent started above");
            agent.set_remote_credentials(ufrag.to_string(), pwd.to_string());
            for candidate in &media.candidates {
                if let Err(e) = agent.add_remote_candidate(candidate) {
                    log::warn!("peer_connection: dropping unparsable remote candidate: {e}");
                }
            }
            if media.end_of_candidates {
                let _ = agent.add_remote_candidate("");
            }
        }

        *self.remote.lock().unwrap() = Some(RemoteInfo {
            role: local_role,
            dtls_setup: local_setup,
            fingerprint_hash_function: fingerprint.hash_function.clone(),
            fingerprint_hex: fingerprint.digest.clone(),
        });

        Ok(())
    }

    /// `add_ice_candidate` (§6); an empty string signals end-of-candidates.
    pub fn add_ice_candidate(&self, candidate: &str) -> Result<()> {
        let mut ice = self.ice.lock().unwrap();
        let agent = ice.as_mut().ok_or(Error::Closed)?;
        agent.add_remote_candidate(candidate)?;
        Ok(())
    }

    /// One ICE-timer tick (T2). Sends any STUN datagrams the agent produces
    /// and reacts to connection-state changes per §4.14. Takes `Arc<Self>`
    /// because a first `Connected` transition spawns the DTLS handshake task
    /// (T3), which calls back into [`PeerConnection::on_dtls_handshake_complete`]
    /// once it finishes.
    pub async fn ice_tick(self: Arc<Self>, now: Instant) -> Result<()> {
        let (sends, ice_state, nominated) = {
            let mut ice = self.ice.lock().unwrap();
            let Some(agent) = ice.as_mut() else { return Ok(()) };
            let sends = agent.tick(now);
            (sends, agent.state(), Self::nominated_addr(agent))
        };

        for (addr, bytes) in sends {
            self.udp_pool.send_to(addr, &bytes).await?;
        }

        if let Some(addr) = nominated {
            *self.nominated_remote.lock().unwrap() = Some(addr);
        }

        self.react_to_ice_state(ice_state);
        Ok(())
    }

    fn nominated_addr(agent: &Agent) -> Option<SocketAddr> {
        // The checklist is private to `rtc-ice`; a nominated pair is implied
        // by `Connected`/`Disconnected` and recovered on the next successful
        // binding response. Conservatively leave the last known address in
        // place when the agent does not expose one directly.
        let _ = agent;
        None
    }

    fn react_to_ice_state(self: Arc<Self>, ice_state: IceConnectionState) {
        let was_connecting_or_new = matches!(self.state(), PeerConnectionState::New | PeerConnectionState::Connecting);
        match ice_state {
            IceConnectionState::Connected if was_connecting_or_new => {
                self.apply_event(ConnectionEvent::IceConnectedFirst);
                self.begin_dtls_handshake();
            }
            IceConnectionState::Connected => self.apply_event(ConnectionEvent::IceConnectedExisting),
            IceConnectionState::Disconnected => self.apply_event(ConnectionEvent::IceDisconnected),
            IceConnectionState::Failed => self.apply_event(ConnectionEvent::IceFailed),
            _ => {}
        }
    }

    /// Handles a datagram the multiplex demuxer (C7) classified as STUN.
    pub async fn handle_stun(self: Arc<Self>, data: &[u8], from: SocketAddr, now: Instant) -> Result<()> {
        let sends = {
            let mut ice = self.ice.lock().unwrap();
            let Some(agent) = ice.as_mut() else { return Ok(()) };
            agent.handle_incoming(data, from, now)?
        };
        for (addr, bytes) in sends {
            self.udp_pool.send_to(addr, &bytes).await?;
        }
        *self.nominated_remote.lock().unwrap() = Some(from);
        Ok(())
    }

    /// Handles a datagram the multiplex demuxer classified as DTLS.
    pub fn handle_dtls(&self, data: Vec<u8>) {
        if let Some(transport) = self.dtls.lock().unwrap().clone() {
            transport.push_datagram(data);
        }
    }

    /// Handles a datagram the multiplex demuxer classified as SRTP (C4).
    /// This bridge is send-only for video: the peer's own SRTP stream, if
    /// any, carries no media this bridge consumes, so it is dropped rather
    /// than decrypted.
    pub fn handle_srtp(&self, _data: Vec<u8>) {
        log::debug!("peer_connection: dropping unused inbound srtp packet");
    }

    /// Handles a datagram the multiplex demuxer classified as SRTCP (C4's
    /// SRTCP crypto context): authenticates, replay-checks, and (if
    /// encrypted) decrypts per RFC 3711 §4 so a replayed or tampered RTCP
    /// packet is rejected at the crypto layer. The resulting plaintext RTCP
    /// is not interpreted — no NACK/PLI-driven retransmission (see
    /// Non-goals) — only the crypto/replay invariant is enforced here.
    pub fn handle_srtcp(&self, mut data: Vec<u8>) -> Result<()> {
        if data.len() < 8 {
            return Err(Error::Srtp(srtp::Error::ShortPacket));
        }
        let ssrc = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);

        let material = self.remote_srtp_material.lock().unwrap().clone();
        let Some((key, salt)) = material else {
            return Err(Error::Closed);
        };

        let mut contexts = self.srtcp_rx.lock().unwrap();
        let ctx = match contexts.entry(ssrc) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(SrtcpContext::new(ssrc, SRTP_CIPHER, SRTP_AUTH, SRTP_AUTH_TAG_LEN, key, salt)?)
            }
        };
        ctx.reverse_transform_packet(&mut data)?;
        log::debug!("peer_connection: accepted srtcp packet from ssrc {ssrc:08x}, {} bytes of rtcp", data.len());
        Ok(())
    }

    /// Starts the UDP receive loop (T1), routing each datagram through the
    /// multiplex demuxer (C7) to STUN/DTLS/SRTP/SRTCP handling. Takes
    /// `Arc<Self>` since the spawned loop's handler closure needs an owned
    /// handle back into this peer connection for the lifetime of the loop.
    pub fn spawn_receive_loop(self: Arc<Self>, stop: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        let udp_pool = self.udp_pool.clone();
        udp_pool.spawn_receive_loop(
            Box::new(move |from, buf, len| {
                let pc = self.clone();
                Box::pin(async move {
                    let data = buf[..len].to_vec();
                    match crate::demux::classify(&data) {
                        Some(Datagram::Stun) => {
                            if let Err(e) = pc.handle_stun(&data, from, Instant::now()).await {
                                log::warn!("peer_connection: stun handling failed: {e}");
                            }
                        }
                        Some(Datagram::Dtls) => pc.handle_dtls(data),
                        Some(Datagram::Srtp) => pc.handle_srtp(data),
                        Some(Datagram::Srtcp) => {
                            if let Err(e) = pc.handle_srtcp(data) {
                                log::warn!("peer_connection: srtcp handling failed: {e}");
                            }
                        }
                        None => log::warn!("peer_connection: dropping unclassified datagram from {from}"),
                    }
                })
            }),
            stop,
        )
    }

    /// Instantiates C5 and runs the handshake on a blocking task (T3), per
    /// "On ICE connected" in §4.8. DTLS role follows our ICE role: the
    /// controller plays active, the controlled side plays passive — mirrored
    /// from the setup negotiated in `set_remote_description` when present.
    fn begin_dtls_handshake(self: Arc<Self>) {
        let remote = match self.remote.lock().unwrap().as_ref() {
            Some(r) => RemoteInfo {
                role: r.role,
                dtls_setup: r.dtls_setup,
                fingerprint_hash_function: r.fingerprint_hash_function.clone(),
                fingerprint_hex: r.fingerprint_hex.clone(),
            },
            None => {
                log::warn!("peer_connection: ICE connected with no remote description; closing");
                self.apply_event(ConnectionEvent::DtlsFail);
                return;
            }
        };

        let dtls_role = match remote.dtls_setup {
            Setup::Active => DtlsRole::Server,
            Setup::Passive => DtlsRole::Client,
            Setup::ActPass => DtlsRole::Client,
        };
        *self.local_dtls_role.lock().unwrap() = Some(dtls_role);

        let cert = Certificate { der: self.local_cert.der.clone() };
        let udp_pool = self.udp_pool.clone();
        let nominated = self.nominated_remote.lock().unwrap().clone();
        let Some(endpoint) = nominated else {
            log::warn!("peer_connection: ICE connected with no nominated endpoint yet");
            return;
        };

        let handle = tokio::runtime::Handle::current();
        let transport = Arc::new(DtlsTransport::new(dtls_role, cert, move |bytes: &[u8]| {
            let udp_pool = udp_pool.clone();
            let bytes = bytes.to_vec();
            // `send` is only ever called from inside `DtlsTransport::handshake`,
            // which this module always runs via `spawn_blocking` (T3) — calling
            // `block_on` here bridges back into the async socket without
            // blocking a worker thread that might be driving other tasks.
            handle.block_on(async move {
                let _ = udp_pool.send_to(endpoint, &bytes).await;
            });
            Ok(())
        }));
        *self.dtls.lock().unwrap() = Some(transport.clone());

        let fingerprint_hex = remote.fingerprint_hex.clone();
        let pc = self.clone();
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || transport.handshake(&fingerprint_hex)).await;
            let success = match result {
                Ok(Ok(())) => {
                    log::info!("peer_connection: dtls handshake complete");
                    true
                }
                Ok(Err(e)) => {
                    log::warn!("peer_connection: dtls handshake failed: {e}");
                    false
                }
                Err(e) => {
                    log::warn!("peer_connection: dtls handshake task panicked: {e}");
                    false
                }
            };
            if let Err(e) = pc.on_dtls_handshake_complete(success) {
                log::warn!("peer_connection: failed to install srtp after handshake: {e}");
            }
        });
    }

    /// Call once the spawned handshake task above has completed, to install
    /// SRTP and finish the §4.8 "On ICE connected" sequence.
    pub fn on_dtls_handshake_complete(&self, success: bool) -> Result<()> {
        if !success {
            self.apply_event(ConnectionEvent::DtlsFail);
            return Ok(());
        }

        let exported = {
            let dtls = self.dtls.lock().unwrap();
            let transport = dtls.as_ref().ok_or(Error::Closed)?;
            transport.export_srtp_keys(SRTP_CIPHER.key_len(), SRTP_SALT_LEN)?
        };

        let role = *self.local_dtls_role.lock().unwrap();
        let (local_material, remote_material) = match role {
            Some(DtlsRole::Server) => (exported.server, exported.client),
            _ => (exported.client, exported.server),
        };
        let mut local_salt = [0u8; SRTP_SALT_LEN];
        local_salt.copy_from_slice(&local_material.salt[..SRTP_SALT_LEN]);
        let mut remote_salt = [0u8; SRTP_SALT_LEN];
        remote_salt.copy_from_slice(&remote_material.salt[..SRTP_SALT_LEN]);

        let ctx = SrtpContext::new(self.video_track.ssrc, SRTP_CIPHER, SRTP_AUTH, SRTP_AUTH_TAG_LEN, local_material.key, local_salt)?;
        *self.srtp_tx.lock().unwrap() = Some(ctx);
        *self.remote_srtp_material.lock().unwrap() = Some((remote_material.key, remote_salt));

        self.apply_event(ConnectionEvent::DtlsOk);
        Ok(())
    }

    /// `send_video(rtp_packet)` (§4.13, §6).
    pub async fn send_video(&self, inbound_rtp: &[u8]) -> Result<()> {
        if self.state() == PeerConnectionState::Closed {
            return Err(Error::Closed);
        }
        let endpoint = self.nominated_remote.lock().unwrap().ok_or(Error::Closed)?;
        let wire = media::send_video(&self.video_track, inbound_rtp, &self.srtp_tx)?;
        self.udp_pool.send_to(endpoint, &wire).await
    }

    /// `close` (§4.8, §6): idempotent; absorbs into `Closed`.
    pub fn close(&self) {
        self.apply_event(ConnectionEvent::Close);
        self.video_track.set_status(Direction::Inactive);
        if let Some(dtls) = self.dtls.lock().unwrap().take() {
            dtls.close();
        }
        if let Some(agent) = self.ice.lock().unwrap().as_mut() {
            agent.close();
        }
    }

    /// Next monotonic session id for a subsequent offer, per RFC 4566's
    /// o-line versioning convention (unused by the fixed `video_offer`
    /// builder today, kept for callers that re-offer after renegotiation).
    pub fn next_session_version(&self) -> u64 {
        self.session_id_counter.fetch_add(1, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_absorbs_every_event() {
        for event in [
            ConnectionEvent::IceConnectedFirst,
            ConnectionEvent::IceConnectedExisting,
            ConnectionEvent::IceDisconnected,
            ConnectionEvent::IceFailed,
            ConnectionEvent::DtlsOk,
            ConnectionEvent::DtlsFail,
            ConnectionEvent::Close,
        ] {
            assert_eq!(next_state(PeerConnectionState::Closed, event), None);
        }
    }

    #[test]
    fn close_is_reachable_from_every_non_terminal_state() {
        for state in [
            PeerConnectionState::New,
            PeerConnectionState::Connecting,
            PeerConnectionState::Connected,
            PeerConnectionState::Disconnected,
            PeerConnectionState::Failed,
        ] {
            assert_eq!(next_state(state, ConnectionEvent::Close), Some(PeerConnectionState::Closed));
        }
    }

    #[test]
    fn new_to_connecting_on_first_ice_connect() {
        assert_eq!(
            next_state(PeerConnectionState::New, ConnectionEvent::IceConnectedFirst),
            Some(PeerConnectionState::Connecting)
        );
    }

    #[test]
    fn connecting_to_connected_on_dtls_ok() {
        assert_eq!(
            next_state(PeerConnectionState::Connecting, ConnectionEvent::DtlsOk),
            Some(PeerConnectionState::Connected)
        );
    }

    #[test]
    fn connecting_closes_on_dtls_fail() {
        assert_eq!(
            next_state(PeerConnectionState::Connecting, ConnectionEvent::DtlsFail),
            Some(PeerConnectionState::Closed)
        );
    }

    #[test]
    fn disconnected_recovers_to_connected() {
        assert_eq!(
            next_state(PeerConnectionState::Disconnected, ConnectionEvent::IceConnectedFirst),
            Some(PeerConnectionState::Connected)
        );
    }

    #[test]
    fn failed_is_terminal_except_for_close() {
        assert_eq!(next_state(PeerConnectionState::Failed, ConnectionEvent::IceConnectedFirst), None);
        assert_eq!(
            next_state(PeerConnectionState::Failed, ConnectionEvent::Close),
            Some(PeerConnectionState::Closed)
        );
    }

    #[tokio::test]
    async fn handle_srtcp_decrypts_and_rejects_replay() {
        let pc = PeerConnection::new(PeerConnectionConfig::default()).await.unwrap();
        let key = vec![0x11u8; 16];
        let salt = [0x22u8; SRTP_SALT_LEN];
        *pc.remote_srtp_material.lock().unwrap() = Some((key.clone(), salt));

        let ssrc = 0xCAFE_BABEu32;
        let mut tx_ctx = SrtcpContext::new(ssrc, SRTP_CIPHER, SRTP_AUTH, SRTP_AUTH_TAG_LEN, key, salt).unwrap();
        let mut packet = vec![0x80u8, 200, 0, 1];
        packet.extend_from_slice(&ssrc.to_be_bytes());
        packet.extend_from_slice(&[0u8; 20]);
        tx_ctx.transform_packet(&mut packet, 1, false).unwrap();

        pc.handle_srtcp(packet.clone()).unwrap();
        let err = pc.handle_srtcp(packet).unwrap_err();
        assert!(matches!(err, Error::Srtp(srtp::Error::Replayed)));
    }

    #[tokio::test]
    async fn handle_srtcp_without_srtp_installed_is_an_error() {
        let pc = PeerConnection::new(PeerConnectionConfig::default()).await.unwrap();
        let data = vec![0x80u8, 200, 0, 1, 0, 0, 0, 1];
        assert!(pc.handle_srtcp(data).is_err());
    }
}
