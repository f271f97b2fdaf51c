//! Typed request/response protocol between the analyzer and its host.
//!
//! The host owns everything behind narrow operations: "fetch raw log
//! text for an identifier", "read/write a named configuration value",
//! and a fire-and-forget "navigate to timestamp" notification. Messages
//! travel over an abstract duplex channel; request/response pairs are
//! matched by correlation id, independent of any transport.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,

    #[error("encode error: {0}")]
    Encode(String),
}

/// A request sent to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostRequest {
    /// Fetch raw log text given an identifier
    FetchLog { log_id: String },

    /// Read a configuration value keyed by dotted path
    /// (e.g. `timeline.activeTheme`)
    GetConfig { key: String },

    /// Write a configuration value keyed by dotted path
    SetConfig { key: String, value: serde_json::Value },
}

/// A response from the host, correlated to a request by id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostResponse {
    LogText { text: String },
    ConfigValue { value: serde_json::Value },
    Ack,
}

/// One-way notifications; no response expected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    /// The user navigated to a point in the timeline
    NavigateToTimestamp { ns: u64 },
}

/// Envelope carried over the channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChannelMessage {
    Request { id: u64, body: HostRequest },
    Response { id: u64, body: HostResponse },
    Event { body: HostEvent },
}

/// Abstract duplex message channel. Implementations wrap whatever
/// transport the host uses; the core never sees it.
pub trait DuplexChannel {
    fn send(&mut self, msg: ChannelMessage) -> Result<(), ChannelError>;

    /// Non-blocking receive of the next inbound message, if any
    fn try_recv(&mut self) -> Option<ChannelMessage>;
}

/// Client side of the protocol: assigns correlation ids and matches
/// responses back to requests.
pub struct HostClient<C: DuplexChannel> {
    channel: C,
    next_id: u64,
    /// Responses received for ids nobody has claimed yet
    pending: Vec<(u64, HostResponse)>,
}

impl<C: DuplexChannel> HostClient<C> {
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            next_id: 1,
            pending: Vec::new(),
        }
    }

    /// Send a request, returning the correlation id to poll with
    pub fn request(&mut self, body: HostRequest) -> Result<u64, ChannelError> {
        let id = self.next_id;
        self.next_id += 1;
        self.channel.send(ChannelMessage::Request { id, body })?;
        Ok(id)
    }

    /// Send a one-way event
    pub fn notify(&mut self, body: HostEvent) -> Result<(), ChannelError> {
        self.channel.send(ChannelMessage::Event { body })
    }

    /// Poll for the response to a previously sent request. Responses to
    /// other requests encountered along the way are retained.
    pub fn poll_response(&mut self, id: u64) -> Option<HostResponse> {
        if let Some(pos) = self.pending.iter().position(|(rid, _)| *rid == id) {
            return Some(self.pending.remove(pos).1);
        }

        while let Some(msg) = self.channel.try_recv() {
            match msg {
                ChannelMessage::Response { id: rid, body } if rid == id => return Some(body),
                ChannelMessage::Response { id: rid, body } => self.pending.push((rid, body)),
                // Requests/events addressed to us are not modeled here
                _ => {}
            }
        }
        None
    }

    pub fn into_inner(self) -> C {
        self.channel
    }
}

/// In-memory channel pair for tests and non-remote hosts
#[derive(Debug, Default)]
pub struct LocalChannel {
    outbound: VecDeque<ChannelMessage>,
    inbound: VecDeque<ChannelMessage>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// What the host would read from this side
    pub fn take_outbound(&mut self) -> Option<ChannelMessage> {
        self.outbound.pop_front()
    }

    /// Inject a message as if the host had sent it
    pub fn push_inbound(&mut self, msg: ChannelMessage) {
        self.inbound.push_back(msg);
    }
}

impl DuplexChannel for LocalChannel {
    fn send(&mut self, msg: ChannelMessage) -> Result<(), ChannelError> {
        self.outbound.push_back(msg);
        Ok(())
    }

    fn try_recv(&mut self) -> Option<ChannelMessage> {
        self.inbound.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_response_correlation() {
        let mut client = HostClient::new(LocalChannel::new());

        let first = client
            .request(HostRequest::GetConfig {
                key: "timeline.activeTheme".to_string(),
            })
            .unwrap();
        let second = client
            .request(HostRequest::FetchLog {
                log_id: "07L000001".to_string(),
            })
            .unwrap();
        assert_ne!(first, second);

        // Host answers out of order
        let channel = &mut client.channel;
        channel.push_inbound(ChannelMessage::Response {
            id: second,
            body: HostResponse::LogText {
                text: "raw".to_string(),
            },
        });
        channel.push_inbound(ChannelMessage::Response {
            id: first,
            body: HostResponse::ConfigValue {
                value: serde_json::json!("dark"),
            },
        });

        assert_eq!(
            client.poll_response(first),
            Some(HostResponse::ConfigValue {
                value: serde_json::json!("dark")
            })
        );
        // The out-of-order response was retained
        assert_eq!(
            client.poll_response(second),
            Some(HostResponse::LogText {
                text: "raw".to_string()
            })
        );
    }

    #[test]
    fn test_navigate_event_round_trips_as_json() {
        let msg = ChannelMessage::Event {
            body: HostEvent::NavigateToTimestamp { ns: 1_500_000 },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(serde_json::from_str::<ChannelMessage>(&json).unwrap(), msg);
    }
}
