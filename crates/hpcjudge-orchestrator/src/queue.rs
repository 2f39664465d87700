// crates/hpcjudge-orchestrator/src/queue.rs
// ============================================================================
// Module: HPC Judge Queue Transport
// Description: tokio-nsq consumer/producer wrappers for the judge and report
// topics, plus the visibility-touch interval calculation.
// Purpose: Keep the touch-interval formula (§4.5.A, §5 concurrency model)
// testable as pure logic, and give the consumer loop one small surface
// (`next`/`touch`/`finish`/`requeue`) instead of the raw `tokio_nsq` types.
// Dependencies: tokio-nsq
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use hpcjudge_config::NsqConfig;
use tokio_nsq::NSQChannel;
use tokio_nsq::NSQConsumerConfig;
use tokio_nsq::NSQConsumerConfigSources;
use tokio_nsq::NSQConsumerLookupConfig;
use tokio_nsq::NSQMessage;
use tokio_nsq::NSQProducerConfig;
use tokio_nsq::NSQTopic;

use crate::error::OrchestratorError;

// ============================================================================
// SECTION: Touch Interval
// ============================================================================

/// Computes the background touch interval from the configured message
/// visibility timeout, matching `connectNSQ`'s formula exactly: `msg_timeout
/// - 1s` when `msg_timeout >= 3s`, otherwise `2/3 * msg_timeout`. Keeping a
/// handler's message visible across a long-running bridge round trip
/// depends on this never exceeding `msg_timeout` itself.
#[must_use]
pub fn touch_interval(msg_timeout: Duration) -> Duration {
    if msg_timeout >= Duration::from_secs(3) {
        msg_timeout - Duration::from_secs(1)
    } else {
        (msg_timeout * 2) / 3
    }
}

// ============================================================================
// SECTION: Inbound Message
// ============================================================================

/// One delivery of a judge message, wrapping the underlying `tokio_nsq`
/// message so callers never reach past this module for ack/touch/requeue.
pub struct InboundMessage {
    inner: NSQMessage,
}

impl InboundMessage {
    /// Raw message body, expected to parse as [`hpcjudge_core::JudgeMessage`].
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.inner.body
    }

    /// Delivery attempt count, `1` on first delivery.
    #[must_use]
    pub fn attempt(&self) -> u16 {
        self.inner.attempt
    }

    /// Extends this message's visibility window without acking it.
    pub async fn touch(&self) {
        self.inner.touch().await;
    }

    /// Acks the message: no further delivery will occur.
    pub async fn finish(self) {
        self.inner.finish().await;
    }

    /// Requeues the message for redelivery after `delay`.
    pub async fn requeue(self, delay: Duration) {
        self.inner.requeue_with_delay(delay).await;
    }
}

// ============================================================================
// SECTION: Consumer
// ============================================================================

/// Consumes the inbound judge topic.
pub struct JudgeQueueConsumer {
    inner: tokio_nsq::NSQConsumer,
}

impl JudgeQueueConsumer {
    /// Builds a consumer from `config`, subscribing to `config.topics.judge`
    /// on `config.channel` against every `nsqlookupd` address configured.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::MalformedMessage`] if the topic or
    /// channel name is not a valid NSQ identifier.
    pub fn connect(config: &NsqConfig) -> Result<Self, OrchestratorError> {
        let topic = NSQTopic::new(config.topics.judge.clone()).map_err(|err| OrchestratorError::MalformedMessage(err.to_string()))?;
        let channel = NSQChannel::new(config.channel.clone()).map_err(|err| OrchestratorError::MalformedMessage(err.to_string()))?;
        let sources = NSQConsumerConfigSources::Lookup(NSQConsumerLookupConfig::new().set_hosts(config.nsqlookupd.address.clone()));
        let mut consumer_config = NSQConsumerConfig::new(topic, channel).set_sources(sources).set_max_in_flight(config.concurrent);
        if !config.auth_secret.is_empty() {
            consumer_config = consumer_config.set_auth_secret(config.auth_secret.clone());
        }
        Ok(Self { inner: consumer_config.build() })
    }

    /// Awaits the next delivery.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::MalformedMessage`] if the underlying
    /// connection produced a protocol-level error rather than a message.
    pub async fn next(&mut self) -> Option<InboundMessage> {
        self.inner.consume_filtered().await.map(|inner| InboundMessage { inner })
    }
}

// ============================================================================
// SECTION: Producer
// ============================================================================

/// Publishes verdicts to the outbound report topic.
pub struct JudgeQueueProducer {
    inner: tokio_nsq::NSQProducer,
    topic: NSQTopic,
}

impl JudgeQueueProducer {
    /// Builds a producer targeting `config.nsqd.address` and
    /// `config.topics.report`.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::MalformedMessage`] if the report topic
    /// name is not a valid NSQ identifier.
    pub fn connect(config: &NsqConfig) -> Result<Self, OrchestratorError> {
        let topic = NSQTopic::new(config.topics.report.clone()).map_err(|err| OrchestratorError::MalformedMessage(err.to_string()))?;
        let inner = NSQProducerConfig::new(config.nsqd.address.clone()).build();
        Ok(Self { inner, topic })
    }

    /// Publishes `body` (a serialised [`hpcjudge_core::ReportMessage`]) to
    /// the report topic.
    ///
    /// # Errors
    /// Returns [`OrchestratorError::MalformedMessage`] if the underlying
    /// connection rejects the publish.
    pub async fn publish(&self, body: Vec<u8>) -> Result<(), OrchestratorError> {
        self.inner
            .publish(&self.topic, body)
            .await
            .map_err(|err| OrchestratorError::MalformedMessage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::touch_interval;
    use std::time::Duration;

    #[test]
    fn subtracts_one_second_at_or_above_three_seconds() {
        assert_eq!(touch_interval(Duration::from_secs(5)), Duration::from_secs(4));
        assert_eq!(touch_interval(Duration::from_secs(3)), Duration::from_secs(2));
    }

    #[test]
    fn uses_two_thirds_below_three_seconds() {
        assert_eq!(touch_interval(Duration::from_millis(1500)), Duration::from_millis(1000));
    }
}
