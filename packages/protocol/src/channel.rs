//! Message passing between frames and the host.
//!
//! Every request travels with its own one-shot reply channel, so replies
//! need no ids and may arrive in any order:
//!
//! - [`HostBus`] carries [`InboundMessage`]s from every frame to the host.
//! - [`FrameSender`] carries [`FrameInbound`]s from the host to one frame,
//!   with a reply port for requests and none for broadcasts.
//!
//! # Example
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! use framelink_protocol::{host_bus, Envelope, FrameKind, Reply, RequestKind, ViewSubType};
//! use framelink_identity::AppletIdentity;
//!
//! let (bus, mut inbox) = host_bus();
//! let sender = FrameKind::Applet {
//!     applet_hash: AppletIdentity::from_core([1; 32]),
//!     group_hash: None,
//!     sub_type: ViewSubType::Main,
//! };
//! let pending = bus
//!     .post("applet://x", Envelope::new(RequestKind::TogglePocket, sender))
//!     .unwrap();
//!
//! let message = inbox.recv().await.unwrap();
//! message.port.send(Reply::ok()).unwrap();
//!
//! assert!(pending.await.unwrap().is_success());
//! # });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};

use crate::error::TransportError;
use crate::parent::ParentToAppletMessage;
use crate::request::{Envelope, Reply};

/// Create a reply channel for one call.
pub fn reply_channel() -> (ReplyPort, PendingReply) {
    let (tx, rx) = oneshot::channel();
    (ReplyPort(tx), PendingReply(rx))
}

/// The answering end of a call. Sending consumes it, so a call gets at
/// most one reply.
#[derive(Debug)]
pub struct ReplyPort(oneshot::Sender<Reply>);

impl ReplyPort {
    /// Send the reply. Fails if the caller stopped waiting.
    pub fn send(self, reply: Reply) -> Result<(), TransportError> {
        self.0.send(reply).map_err(|_| TransportError::Closed)
    }

    /// Whether the caller has stopped waiting.
    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }
}

/// The waiting end of a call.
///
/// There is no timeout. A caller that wants one wraps this future in its
/// own deadline and simply drops it on expiry.
#[derive(Debug)]
pub struct PendingReply(oneshot::Receiver<Reply>);

impl Future for PendingReply {
    type Output = Result<Reply, TransportError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.0)
            .poll(cx)
            .map_err(|_| TransportError::Closed)
    }
}

/// A request as the host receives it.
#[derive(Debug)]
pub struct InboundMessage {
    /// Origin of the sending frame, as attached by the transport.
    pub origin: String,
    pub envelope: Envelope,
    pub port: ReplyPort,
}

/// Create the bus every frame posts its requests to.
pub fn host_bus() -> (HostBus, HostInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HostBus { tx }, HostInbox { rx })
}

/// Posting end of the host bus. Cheap to clone, one per frame.
#[derive(Debug, Clone)]
pub struct HostBus {
    tx: mpsc::UnboundedSender<InboundMessage>,
}

impl HostBus {
    /// Post a request and get the future for its reply.
    pub fn post(&self, origin: &str, envelope: Envelope) -> Result<PendingReply, TransportError> {
        let (port, pending) = reply_channel();
        self.tx
            .send(InboundMessage {
                origin: origin.to_string(),
                envelope,
                port,
            })
            .map_err(|_| TransportError::Disconnected("host"))?;
        Ok(pending)
    }
}

/// Receiving end of the host bus.
#[derive(Debug)]
pub struct HostInbox {
    rx: mpsc::UnboundedReceiver<InboundMessage>,
}

impl HostInbox {
    /// Wait for the next request. `None` once every [`HostBus`] is dropped.
    pub async fn recv(&mut self) -> Option<InboundMessage> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<InboundMessage> {
        self.rx.try_recv().ok()
    }
}

/// A host message as a frame receives it.
#[derive(Debug)]
pub struct FrameInbound {
    /// Origin of the sender, checked by the frame against its trusted origin.
    pub origin: String,
    pub message: ParentToAppletMessage,
    /// Present when the host waits for an answer.
    pub port: Option<ReplyPort>,
}

/// Create the channel a host uses to reach one frame.
pub fn frame_channel() -> (FrameSender, FrameInbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (FrameSender { tx }, FrameInbox { rx })
}

#[derive(Debug, Clone)]
pub struct FrameSender {
    tx: mpsc::UnboundedSender<FrameInbound>,
}

impl FrameSender {
    /// Fire-and-forget delivery.
    pub fn notify(
        &self,
        origin: &str,
        message: ParentToAppletMessage,
    ) -> Result<(), TransportError> {
        self.tx
            .send(FrameInbound {
                origin: origin.to_string(),
                message,
                port: None,
            })
            .map_err(|_| TransportError::Disconnected("frame"))
    }

    /// Deliver a message and get the future for the frame's answer.
    pub fn request(
        &self,
        origin: &str,
        message: ParentToAppletMessage,
    ) -> Result<PendingReply, TransportError> {
        let (port, pending) = reply_channel();
        self.tx
            .send(FrameInbound {
                origin: origin.to_string(),
                message,
                port: Some(port),
            })
            .map_err(|_| TransportError::Disconnected("frame"))?;
        Ok(pending)
    }

    /// Whether the frame has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct FrameInbox {
    rx: mpsc::UnboundedReceiver<FrameInbound>,
}

impl FrameInbox {
    pub async fn recv(&mut self) -> Option<FrameInbound> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<FrameInbound> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameKind, ViewSubType};
    use crate::request::RequestKind;
    use framelink_identity::AppletIdentity;

    fn envelope(request: RequestKind) -> Envelope {
        Envelope::new(
            request,
            FrameKind::Applet {
                applet_hash: AppletIdentity::from_core([7; 32]),
                group_hash: None,
                sub_type: ViewSubType::Main,
            },
        )
    }

    #[tokio::test]
    async fn reply_reaches_caller() {
        let (port, pending) = reply_channel();
        port.send(Reply::success(&"hi")).unwrap();
        assert_eq!(pending.await.unwrap(), Reply::success(&"hi"));
    }

    #[tokio::test]
    async fn dropped_port_closes_call() {
        let (port, pending) = reply_channel();
        drop(port);
        assert_eq!(pending.await, Err(TransportError::Closed));
    }

    #[test]
    fn send_after_caller_gone_fails() {
        let (port, pending) = reply_channel();
        drop(pending);
        assert!(port.is_closed());
        assert_eq!(port.send(Reply::ok()), Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn replies_can_arrive_out_of_order() {
        let (bus, mut inbox) = host_bus();
        let first = bus.post("applet://a", envelope(RequestKind::TogglePocket)).unwrap();
        let second = bus
            .post("applet://a", envelope(RequestKind::RequestClose))
            .unwrap();

        let m1 = inbox.recv().await.unwrap();
        let m2 = inbox.recv().await.unwrap();
        assert_eq!(m1.envelope.request, RequestKind::TogglePocket);

        m2.port.send(Reply::success(&2)).unwrap();
        assert_eq!(second.await.unwrap(), Reply::success(&2));
        m1.port.send(Reply::success(&1)).unwrap();
        assert_eq!(first.await.unwrap(), Reply::success(&1));
    }

    #[test]
    fn post_without_host_fails() {
        let (bus, inbox) = host_bus();
        drop(inbox);
        let err = bus
            .post("applet://a", envelope(RequestKind::TogglePocket))
            .unwrap_err();
        assert_eq!(err, TransportError::Disconnected("host"));
    }

    #[tokio::test]
    async fn frame_broadcast_has_no_port() {
        let (sender, mut inbox) = frame_channel();
        sender
            .notify(
                "host://main",
                ParentToAppletMessage::LocaleChange {
                    locale: "de".into(),
                },
            )
            .unwrap();
        let pending = sender
            .request("host://main", ParentToAppletMessage::OnBeforeUnload)
            .unwrap();

        let broadcast = inbox.recv().await.unwrap();
        assert!(broadcast.port.is_none());
        let request = inbox.recv().await.unwrap();
        request.port.unwrap().send(Reply::success(&1)).unwrap();
        assert_eq!(pending.await.unwrap().into_result().unwrap(), 1);
    }
}
