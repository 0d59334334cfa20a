//! Instance discovery responder
//!
//! Multiple host instances may run at once, each with an OS-assigned
//! command port. The responder shares a fixed UDP port with its siblings,
//! joins the multicast group on the loopback interface, and answers
//! well-formed search queries with this instance's pid and command port so
//! the caller can pick the right one. The group and port may carry
//! unrelated discovery traffic, which must get no reply.

use std::net::{Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, error, warn};

use crate::config::BridgeConfig;
use crate::error::BridgeError;

const MAX_DATAGRAM: usize = 2048;

pub(crate) struct DiscoveryResponder {
    socket: UdpSocket,
    search_target: String,
    command_port: u16,
}

impl DiscoveryResponder {
    /// Bind the discovery port with address reuse (several instances share
    /// it) and join the multicast group on the loopback interface.
    pub(crate) fn bind(config: &BridgeConfig, command_port: u16) -> Result<Self, BridgeError> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;

        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.discovery_port));
        socket.bind(&addr.into())?;

        let socket = UdpSocket::from_std(socket.into())?;

        // Some minimal environments refuse multicast membership on the
        // loopback interface; direct unicast queries still work, so the
        // responder stays up either way.
        if let Err(err) = socket.join_multicast_v4(config.multicast_group, Ipv4Addr::LOCALHOST) {
            warn!(
                "failed to join multicast group {}: {err}",
                config.multicast_group
            );
        }

        Ok(DiscoveryResponder {
            socket,
            search_target: config.search_target.clone(),
            command_port,
        })
    }

    /// Port actually bound, for configurations that requested port 0.
    pub(crate) fn local_port(&self) -> Result<u16, BridgeError> {
        Ok(self.socket.local_addr()?.port())
    }

    /// Receive loop. A malformed or foreign datagram is logged and dropped;
    /// the responder keeps listening until the runtime shuts down.
    pub(crate) async fn serve(self) {
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (len, peer) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(err) => {
                    error!("error while receiving discovery datagram: {err}");
                    continue;
                }
            };

            match self.respond(&buf[..len], peer).await {
                Ok(true) => debug!(%peer, "answered discovery query"),
                Ok(false) => {}
                Err(err) => error!(%peer, "error while processing discovery query: {err}"),
            }
        }
    }

    async fn respond(&self, datagram: &[u8], peer: SocketAddr) -> Result<bool, BridgeError> {
        let query = std::str::from_utf8(datagram).map_err(|err| BridgeError::DiscoveryParse {
            detail: format!("datagram is not UTF-8: {err}"),
        })?;

        if !query_matches(query, &self.search_target) {
            warn!(%peer, "unexpected discovery query:\n{}", query.trim_end());
            return Ok(false);
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\nST: {st}\r\nUSN: pid:{pid}\r\nLocation: 127.0.0.1:{port}\r\n\r\n",
            st = self.search_target,
            pid = std::process::id(),
            port = self.command_port,
        );

        self.socket.send_to(response.as_bytes(), peer).await?;
        Ok(true)
    }
}

/// A query is answered only when the request line and both required headers
/// match exactly. Header names are case-insensitive, values are not.
fn query_matches(query: &str, search_target: &str) -> bool {
    let mut lines = query.split("\r\n");

    match lines.next() {
        Some(request_line) if request_line.trim_end() == "M-SEARCH * HTTP/1.1" => {}
        _ => return false,
    }

    let mut man = None;
    let mut st = None;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "man" => man = Some(value.trim().to_string()),
            "st" => st = Some(value.trim().to_string()),
            _ => {}
        }
    }

    man.as_deref() == Some("\"ssdp:discover\"") && st.as_deref() == Some(search_target)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "drawbridge:run";

    fn query(request_line: &str, man: &str, st: &str) -> String {
        format!("{request_line}\r\nMAN: {man}\r\nST: {st}\r\n\r\n")
    }

    #[test]
    fn exact_query_matches() {
        let q = query("M-SEARCH * HTTP/1.1", "\"ssdp:discover\"", TARGET);
        assert!(query_matches(&q, TARGET));
    }

    #[test]
    fn header_names_are_case_insensitive() {
        let q = format!("M-SEARCH * HTTP/1.1\r\nman: \"ssdp:discover\"\r\nst: {TARGET}\r\n\r\n");
        assert!(query_matches(&q, TARGET));
    }

    #[test]
    fn wrong_request_line_gets_no_reply() {
        let q = query("GET * HTTP/1.1", "\"ssdp:discover\"", TARGET);
        assert!(!query_matches(&q, TARGET));

        let q = query("M-SEARCH / HTTP/1.1", "\"ssdp:discover\"", TARGET);
        assert!(!query_matches(&q, TARGET));
    }

    #[test]
    fn wrong_search_target_gets_no_reply() {
        let q = query("M-SEARCH * HTTP/1.1", "\"ssdp:discover\"", "something-else");
        assert!(!query_matches(&q, TARGET));
    }

    #[test]
    fn missing_discover_directive_gets_no_reply() {
        let q = query("M-SEARCH * HTTP/1.1", "ssdp:discover", TARGET);
        assert!(!query_matches(&q, TARGET));

        let q = format!("M-SEARCH * HTTP/1.1\r\nST: {TARGET}\r\n\r\n");
        assert!(!query_matches(&q, TARGET));
    }

    #[test]
    fn garbage_gets_no_reply() {
        assert!(!query_matches("", TARGET));
        assert!(!query_matches("\r\n\r\n", TARGET));
        assert!(!query_matches("NOTIFY * HTTP/1.1\r\n\r\n", TARGET));
    }
}
