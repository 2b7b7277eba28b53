//! Glues the WFB-ng-style radio ingest pipeline (C9-C13) to this peer
//! connection's video send path: `radio driver -> C9 -> C10 -> C11/C12 ->
//! consumer`, where the consumer is [`feed_wfb_frame`] below, feeding C8.

use std::time::Instant;

use wfb::{WfbLink, WfbLinkConfig};

use crate::error::Result;
use crate::peer_connection::PeerConnection;

/// Runs one raw radio frame through `link`, forwarding every reassembled
/// payload `send_video` in order. A session-key announcement frame or a
/// frame still blocked on a FEC gap yields nothing to forward and is not an
/// error.
pub async fn feed_wfb_frame(pc: &PeerConnection, link: &mut WfbLink, config: &WfbLinkConfig, raw_frame: &[u8], now: Instant) -> Result<()> {
    let forwarded = link.handle_frame(raw_frame, config, now)?;
    for payload in forwarded {
        pc.send_video(&payload).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConnectionConfig;
    use std::collections::HashMap;
    use wfb::StreamKind;

    fn qos_data_frame(radio_port: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8; 24];
        frame[0] = 0x08;
        frame[1] = 0x01;
        frame[4] = 0x01;
        frame[5..9].copy_from_slice(&[1, 2, 3, 4]);
        frame[9] = radio_port;
        frame[10] = 0x01;
        frame[11..15].copy_from_slice(&[5, 6, 7, 8]);
        frame[15] = radio_port;
        frame.extend_from_slice(payload);
        frame
    }

    fn link_config() -> WfbLinkConfig {
        let mut streams = HashMap::new();
        streams.insert(3u8, StreamKind::NoFec);
        WfbLinkConfig {
            bind_phrase: "shared phrase".to_string(),
            streams,
            rx_queue_max_size: 8,
        }
    }

    #[tokio::test]
    async fn session_key_announcement_forwards_nothing_and_does_not_error() {
        let config = link_config();
        let mut link = WfbLink::new(&config).unwrap();
        let pc = PeerConnection::new(PeerConnectionConfig::default()).await.unwrap();

        let mut tx_session = wfb::WfbSession::new(&config.bind_phrase).unwrap();
        let announcement = tx_session.rotate_session_key().unwrap();
        let frame = qos_data_frame(127, &announcement);

        feed_wfb_frame(&pc, &mut link, &config, &frame, Instant::now()).await.unwrap();
    }
}
