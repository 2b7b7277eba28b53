use std::net::SocketAddr;
use std::time::{Duration, Instant};

use stun::message::{
    Message, MessageClass, MessageType, TransactionId, ATTR_ICE_CONTROLLED, ATTR_ICE_CONTROLLING,
    ATTR_PRIORITY, ATTR_USERNAME, ATTR_USE_CANDIDATE, ATTR_XOR_MAPPED_ADDRESS,
};

use crate::candidate::{candidate_priority, gather_host_candidates, CandidateKind, LocalCandidate, RemoteCandidate};
use crate::checklist::{pair_priority, Checklist, EntryState};
use crate::connection_state::ConnectionState;
use crate::error::{Error, Result};

pub const TA: Duration = Duration::from_millis(50);
pub const CONNECTED_KEEPALIVE: Duration = Duration::from_secs(3);
pub const FAILED_TIMEOUT: Duration = Duration::from_secs(16);
pub const DISCONNECTED_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IceRole {
    Controlling,
    Controlled,
}

/// Static, per-session agent configuration.
pub struct AgentConfig {
    pub local_ufrag: String,
    pub local_pwd: String,
    pub tiebreaker: u64,
    pub role: IceRole,
}

/// An ICE channel: one local candidate bound to the RTP socket, a checklist of
/// remote candidate pairs, and the STUN binding request/response protocol
/// logic. Timer-driven steps ([`Agent::tick`]) and socket-driven steps
/// ([`Agent::handle_incoming`]) both return any STUN datagrams the caller
/// should send; neither touches the socket directly.
pub struct Agent {
    role: IceRole,
    state: ConnectionState,
    local_ufrag: String,
    local_pwd: String,
    tiebreaker: u64,
    remote_ufrag: Option<String>,
    remote_pwd: Option<String>,
    local_candidates: Vec<LocalCandidate>,
    checklist: Checklist,
    credentials_at: Option<Instant>,
    last_binding_request_received_at: Option<Instant>,
    end_of_candidates: bool,
}

impl Agent {
    pub fn new(config: AgentConfig) -> Self {
        Agent {
            role: config.role,
            state: ConnectionState::New,
            local_ufrag: config.local_ufrag,
            local_pwd: config.local_pwd,
            tiebreaker: config.tiebreaker,
            remote_ufrag: None,
            remote_pwd: None,
            local_candidates: Vec::new(),
            checklist: Checklist::new(),
            credentials_at: None,
            last_binding_request_received_at: None,
            end_of_candidates: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn role(&self) -> IceRole {
        self.role
    }

    /// Gathers host candidates bound to `port`. Idempotent; callers gather
    /// once at channel construction.
    pub fn gather(&mut self, port: u16) {
        self.local_candidates = gather_host_candidates(port);
        self.state = ConnectionState::Checking;
        log::info!(
            "ice: gathered {} host candidate(s) on port {port}",
            self.local_candidates.len()
        );
    }

    pub fn local_candidates(&self) -> &[LocalCandidate] {
        &self.local_candidates
    }

    pub fn is_gathering_complete(&self) -> bool {
        !self.local_candidates.is_empty()
    }

    fn local_priority(&self) -> u32 {
        self.local_candidates
            .first()
            .map(|c| c.priority)
            .unwrap_or_else(|| candidate_priority(CandidateKind::Host, 65535))
    }

    pub fn set_remote_credentials(&mut self, ufrag: String, pwd: String) {
        self.remote_ufrag = Some(ufrag);
        self.remote_pwd = Some(pwd);
        self.credentials_at = Some(Instant::now());
    }

    /// `add_remote_candidate("")` signals end-of-candidates per the trickle ICE
    /// convention used by `add_ice_candidate` at the peer-connection surface.
    pub fn add_remote_candidate(&mut self, line: &str) -> Result<()> {
        if line.is_empty() {
            self.end_of_candidates = true;
            return Ok(());
        }
        let remote = RemoteCandidate::parse(line)?;
        self.insert_remote(remote);
        Ok(())
    }

    fn insert_remote(&mut self, remote: RemoteCandidate) {
        let (g, d) = match self.role {
            IceRole::Controlling => (self.local_priority(), remote.priority),
            IceRole::Controlled => (remote.priority, self.local_priority()),
        };
        let priority = pair_priority(g, d);
        self.checklist.add_or_update(remote, priority);
    }

    fn set_state(&mut self, new_state: ConnectionState) {
        if self.state != new_state {
            log::info!("ice: state {:?} -> {:?}", self.state, new_state);
            self.state = new_state;
        }
    }

    fn build_binding_request(
        &self,
        use_candidate: bool,
        transaction_id: TransactionId,
    ) -> Vec<u8> {
        let mut msg = Message::new(MessageType::BINDING_REQUEST, transaction_id);
        let (remote_ufrag, _remote_pwd) = (
            self.remote_ufrag.as_deref().unwrap_or(""),
            self.remote_pwd.as_deref().unwrap_or(""),
        );
        msg.add_attribute(
            ATTR_USERNAME,
            &stun::attributes::encode_username(remote_ufrag, &self.local_ufrag),
        );
        msg.add_attribute(
            ATTR_PRIORITY,
            &stun::attributes::encode_priority(self.local_priority()),
        );
        match self.role {
            IceRole::Controlling => {
                msg.add_attribute(
                    ATTR_ICE_CONTROLLING,
                    &stun::attributes::encode_tiebreaker(self.tiebreaker),
                );
                if use_candidate {
                    msg.add_attribute(ATTR_USE_CANDIDATE, &[]);
                }
            }
            IceRole::Controlled => {
                msg.add_attribute(
                    ATTR_ICE_CONTROLLED,
                    &stun::attributes::encode_tiebreaker(self.tiebreaker),
                );
            }
        }
        msg.encode_with_integrity(self.remote_pwd.as_deref().unwrap_or("").as_bytes(), true)
    }

    fn send_binding_request(&mut self, idx: usize, now: Instant) -> (SocketAddr, Vec<u8>) {
        let use_candidate = self.role == IceRole::Controlling;
        let transaction_id = TransactionId::new();
        let addr = self.checklist.get(idx).remote.addr;
        let payload = self.build_binding_request(use_candidate, transaction_id);
        self.checklist
            .mark_in_progress(idx, now, transaction_id, use_candidate);
        (addr, payload)
    }

    /// Timer-driven step: call roughly every 50 ms while `Checking`, every 3 s
    /// once `Connected`. Returns any STUN datagrams to send this tick.
    pub fn tick(&mut self, now: Instant) -> Vec<(SocketAddr, Vec<u8>)> {
        let mut sends = Vec::new();
        if self.state == ConnectionState::Closed {
            return sends;
        }

        if let Some(idx) = self.checklist.entries().iter().position(|e| e.nominated) {
            let entry = self.checklist.get(idx).clone_summary();
            let failed = entry
                .last_response_at
                .map(|t| now.duration_since(t) > FAILED_TIMEOUT)
                .unwrap_or(false);
            let disconnected = entry
                .last_response_at
                .map(|t| now.duration_since(t) > DISCONNECTED_TIMEOUT)
                .unwrap_or(false)
                && self
                    .last_binding_request_received_at
                    .map(|t| now.duration_since(t) > DISCONNECTED_TIMEOUT)
                    .unwrap_or(true);

            if failed {
                self.set_state(ConnectionState::Failed);
            } else if disconnected {
                self.set_state(ConnectionState::Disconnected);
            } else {
                let due = entry
                    .last_check_at
                    .map(|t| now.duration_since(t) >= CONNECTED_KEEPALIVE)
                    .unwrap_or(true);
                if due {
                    sends.push(self.send_binding_request(idx, now));
                }
            }
            return sends;
        }

        for idx in 0..self.checklist.entries().len() {
            let entry = self.checklist.get(idx);
            if entry.state == EntryState::InProgress {
                if let Some(first) = entry.first_check_at {
                    if now.duration_since(first) > FAILED_TIMEOUT {
                        self.checklist.mark_failed(idx);
                    }
                }
            }
        }

        let waiting = self
            .checklist
            .entries()
            .iter()
            .filter(|e| e.state == EntryState::Waiting)
            .count();
        let in_progress = self
            .checklist
            .entries()
            .iter()
            .filter(|e| e.state == EntryState::InProgress)
            .count();
        let rto = Duration::from_millis(500).max(TA * (waiting + in_progress) as u32);

        if let Some(idx) = self.checklist.entries().iter().position(|e| {
            e.state == EntryState::InProgress
                && e.last_check_at
                    .map(|t| now.duration_since(t) > rto)
                    .unwrap_or(true)
        }) {
            sends.push(self.send_binding_request(idx, now));
            return sends;
        }

        if let Some(idx) = self
            .checklist
            .entries()
            .iter()
            .position(|e| e.state == EntryState::Waiting)
        {
            sends.push(self.send_binding_request(idx, now));
            return sends;
        }

        if self.checklist.is_empty() {
            if let Some(t) = self.credentials_at {
                if now.duration_since(t) > FAILED_TIMEOUT {
                    self.set_state(ConnectionState::Failed);
                }
            }
        }

        sends
    }

    /// Socket-driven step: feed a datagram the demuxer classified as STUN.
    /// Returns any STUN datagrams to send in reply.
    pub fn handle_incoming(
        &mut self,
        data: &[u8],
        from: SocketAddr,
        now: Instant,
    ) -> Result<Vec<(SocketAddr, Vec<u8>)>> {
        let msg = match Message::decode(data) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("ice: dropping unparsable stun datagram: {e}");
                return Ok(vec![]);
            }
        };

        match msg.typ.class {
            MessageClass::Request => self.handle_binding_request(msg, from, now),
            MessageClass::SuccessResponse => self.handle_binding_response(msg, from, now),
            _ => Ok(vec![]),
        }
    }

    fn handle_binding_request(
        &mut self,
        msg: Message,
        from: SocketAddr,
        now: Instant,
    ) -> Result<Vec<(SocketAddr, Vec<u8>)>> {
        let local_pwd = self.local_pwd.clone();
        if msg.check_integrity(local_pwd.as_bytes()).is_err() {
            log::warn!("ice: binding request from {from} failed integrity check");
            return Ok(vec![]);
        }

        self.last_binding_request_received_at = Some(now);

        let use_candidate = msg.get_attribute(ATTR_USE_CANDIDATE).is_some();

        let idx = match self.checklist.find_by_addr(&from) {
            Some(i) => i,
            None => {
                let remote = RemoteCandidate::peer_reflexive(from, 0);
                self.insert_remote(remote);
                self.checklist.find_by_addr(&from).expect("just inserted")
            }
        };

        if use_candidate {
            self.checklist.nominate(idx);
            if self.checklist.get(idx).state == EntryState::Succeeded {
                self.set_state(ConnectionState::Connected);
            }
        }

        let mut response = Message::new(MessageType::BINDING_SUCCESS_RESPONSE, msg.transaction_id);
        response.add_attribute(ATTR_XOR_MAPPED_ADDRESS, &stun::xoraddr::encode(from, &msg.transaction_id));
        let payload = response.encode_with_integrity(local_pwd.as_bytes(), true);
        Ok(vec![(from, payload)])
    }

    fn handle_binding_response(
        &mut self,
        msg: Message,
        from: SocketAddr,
        now: Instant,
    ) -> Result<Vec<(SocketAddr, Vec<u8>)>> {
        let idx = match self.checklist.find_by_transaction(&msg.transaction_id) {
            Some(i) => i,
            None => {
                if self.checklist.find_by_addr(&from).is_none() {
                    let remote = RemoteCandidate::peer_reflexive(from, 0);
                    self.insert_remote(remote);
                }
                return Ok(vec![]);
            }
        };

        self.checklist.mark_succeeded(idx, now);
        let entry = self.checklist.get(idx);
        if entry.use_candidate_sent && self.role == IceRole::Controlling {
            self.checklist.nominate(idx);
        }
        if self.checklist.nominated().is_some() {
            self.set_state(ConnectionState::Connected);
        }
        Ok(vec![])
    }

    pub fn close(&mut self) {
        self.set_state(ConnectionState::Closed);
    }
}

impl crate::checklist::ChecklistEntry {
    /// A cheap copy of the handful of timing fields `tick` needs, so it can
    /// release the checklist borrow before calling back into `self`.
    fn clone_summary(&self) -> EntrySummary {
        EntrySummary {
            last_response_at: self.last_response_at,
            last_check_at: self.last_check_at,
        }
    }
}

struct EntrySummary {
    last_response_at: Option<Instant>,
    last_check_at: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_agent(role: IceRole) -> Agent {
        let mut agent = Agent::new(AgentConfig {
            local_ufrag: "abcd".into(),
            local_pwd: "local_password_24_chars__".into(),
            tiebreaker: 42,
            role,
        });
        agent.gather(9);
        agent.set_remote_credentials("wxyz".into(), "remote_password_24_chars_".into());
        agent
    }

    #[test]
    fn add_remote_candidate_creates_waiting_entry() {
        let mut agent = test_agent(IceRole::Controlling);
        agent
            .add_remote_candidate("1 1 udp 2130706431 198.51.100.1 54321 typ host")
            .unwrap();
        assert_eq!(agent.checklist.entries().len(), 1);
        assert_eq!(agent.checklist.entries()[0].state, EntryState::Waiting);
    }

    #[test]
    fn tick_sends_binding_request_for_waiting_entry() {
        let mut agent = test_agent(IceRole::Controlling);
        agent
            .add_remote_candidate("1 1 udp 2130706431 198.51.100.1 54321 typ host")
            .unwrap();
        let sends = agent.tick(Instant::now());
        assert_eq!(sends.len(), 1);
        assert_eq!(agent.checklist.entries()[0].state, EntryState::InProgress);
    }

    #[test]
    fn full_handshake_nominates_and_connects() {
        let mut controller = test_agent(IceRole::Controlling);
        controller
            .add_remote_candidate("1 1 udp 2130706431 198.51.100.1 54321 typ host")
            .unwrap();

        let now = Instant::now();
        let sends = controller.tick(now);
        assert_eq!(sends.len(), 1);
        let (_dest, request_bytes) = &sends[0];

        // Simulate the responder verifying integrity with our local password
        // and echoing a success response back.
        let request = Message::decode(request_bytes).unwrap();
        request
            .check_integrity(b"remote_password_24_chars_")
            .unwrap();
        assert!(request.get_attribute(ATTR_USE_CANDIDATE).is_some());

        let mut response =
            Message::new(MessageType::BINDING_SUCCESS_RESPONSE, request.transaction_id);
        response.add_attribute(
            ATTR_XOR_MAPPED_ADDRESS,
            &stun::xoraddr::encode("127.0.0.1:9".parse().unwrap(), &request.transaction_id),
        );
        let response_bytes =
            response.encode_with_integrity(b"local_password_24_chars__", true);

        controller
            .handle_incoming(
                &response_bytes,
                "198.51.100.1:54321".parse().unwrap(),
                now,
            )
            .unwrap();

        assert_eq!(controller.state(), ConnectionState::Connected);
        assert!(controller.checklist.nominated().is_some());
    }

    #[test]
    fn responder_accepts_use_candidate_and_nominates() {
        let mut responder = test_agent(IceRole::Controlled);
        responder
            .add_remote_candidate("1 1 udp 2130706431 198.51.100.1 54321 typ host")
            .unwrap();

        let mut req = Message::new(MessageType::BINDING_REQUEST, TransactionId::new());
        req.add_attribute(
            ATTR_USERNAME,
            &stun::attributes::encode_username("abcd", "wxyz"),
        );
        req.add_attribute(ATTR_USE_CANDIDATE, &[]);
        let req_bytes = req.encode_with_integrity(b"local_password_24_chars__", true);

        let sends = responder
            .handle_incoming(&req_bytes, "198.51.100.1:54321".parse().unwrap(), Instant::now())
            .unwrap();
        assert_eq!(sends.len(), 1);
        assert!(responder.checklist.nominated().is_some());
    }
}
