//! Where delivered persona messages go once they are stored.

use pal_domain::model::Message;
use tokio::sync::mpsc;

use super::DeliveryOrigin;

/// Called once per delivered message, after it has been persisted.
///
/// Implementations must not block: the scheduler calls this inline.
pub trait DeliverySink: Send + Sync {
    fn delivered(&self, message: &Message, origin: DeliveryOrigin);
}

/// Logs deliveries. Used by the daemon, where nobody is watching a terminal.
#[derive(Debug, Default)]
pub struct LogSink;

impl DeliverySink for LogSink {
    fn delivered(&self, message: &Message, origin: DeliveryOrigin) {
        tracing::info!(
            conversation_id = %message.conversation_id,
            friend_id = %message.sender_id,
            sender = %message.sender_name,
            origin = origin.as_str(),
            chars = message.content.chars().count(),
            images = message.images.len(),
            "message delivered"
        );
    }
}

/// A delivered message plus what triggered it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    pub origin: DeliveryOrigin,
}

/// Forwards deliveries to a channel (the interactive CLI renders them).
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Delivery>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Delivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DeliverySink for ChannelSink {
    fn delivered(&self, message: &Message, origin: DeliveryOrigin) {
        let delivery = Delivery {
            message: message.clone(),
            origin,
        };
        if self.tx.send(delivery).is_err() {
            tracing::debug!(message_id = %message.id, "delivery receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_with_origin() {
        let (sink, mut rx) = ChannelSink::new();
        let msg = Message::new("c1", "rin", "Rin", "hey", vec![]);
        sink.delivered(&msg, DeliveryOrigin::Outreach);

        let got = rx.try_recv().unwrap();
        assert_eq!(got.message.id, msg.id);
        assert_eq!(got.origin, DeliveryOrigin::Outreach);
    }

    #[test]
    fn closed_channel_is_ignored() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.delivered(&Message::new("c1", "rin", "Rin", "hey", vec![]), DeliveryOrigin::User);
    }
}
