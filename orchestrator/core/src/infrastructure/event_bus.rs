// Copyright (c) 2026 flowguard contributors
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Resilience Events
//
// In-memory event streaming over tokio broadcast channels. Health detections,
// recovery decisions, checkpoint activity and pool lifecycle changes are all
// published here; events are lost on restart.

use crate::domain::events::{CheckpointEvent, HealthEvent, PoolEvent, RecoveryEvent};
use crate::domain::flow::FlowId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Unified event type for the event bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResilienceEvent {
    Health(HealthEvent),
    Recovery(RecoveryEvent),
    Checkpoint(CheckpointEvent),
    Pool(PoolEvent),
}

impl ResilienceEvent {
    /// Flow this event concerns, if any (pool events are tenant-scoped).
    pub fn flow_id(&self) -> Option<FlowId> {
        match self {
            ResilienceEvent::Health(e) => Some(e.flow_id()),
            ResilienceEvent::Recovery(e) => Some(e.flow_id()),
            ResilienceEvent::Checkpoint(e) => Some(e.flow_id()),
            ResilienceEvent::Pool(_) => None,
        }
    }
}

/// Event bus for publishing and subscribing to resilience events
#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<ResilienceEvent>>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    /// Capacity determines how many events can be buffered before dropping old ones
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish_health_event(&self, event: HealthEvent) {
        self.publish(ResilienceEvent::Health(event));
    }

    pub fn publish_recovery_event(&self, event: RecoveryEvent) {
        self.publish(ResilienceEvent::Recovery(event));
    }

    pub fn publish_checkpoint_event(&self, event: CheckpointEvent) {
        self.publish(ResilienceEvent::Checkpoint(event));
    }

    pub fn publish_pool_event(&self, event: PoolEvent) {
        self.publish(ResilienceEvent::Pool(event));
    }

    fn publish(&self, event: ResilienceEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is listening
        let receiver_count = self.sender.send(event).unwrap_or(0);

        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    /// Subscribe to all resilience events
    pub fn subscribe(&self) -> EventReceiver {
        let receiver = self.sender.subscribe();
        EventReceiver { receiver }
    }

    /// Subscribe and filter for a single flow
    pub fn subscribe_flow(&self, flow_id: FlowId) -> FlowEventReceiver {
        let receiver = self.sender.subscribe();
        FlowEventReceiver { receiver, flow_id }
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Receiver for all resilience events
pub struct EventReceiver {
    receiver: broadcast::Receiver<ResilienceEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<ResilienceEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without waiting
    pub fn try_recv(&mut self) -> Result<ResilienceEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Receiver for flow-specific events (filtered)
pub struct FlowEventReceiver {
    receiver: broadcast::Receiver<ResilienceEvent>,
    flow_id: FlowId,
}

impl FlowEventReceiver {
    /// Receive the next event for the subscribed flow, skipping all others
    pub async fn recv(&mut self) -> Result<ResilienceEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.flow_id() == Some(self.flow_id) {
                return Ok(event);
            }
        }
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::health::HealthStatus;
    use crate::domain::tenant::TenantKey;
    use chrono::Utc;

    fn detected(flow_id: FlowId) -> HealthEvent {
        HealthEvent::FlowHealthDetected {
            flow_id,
            phase: "data_import".to_string(),
            status: HealthStatus::Critical,
            phase_elapsed_secs: 10,
            total_elapsed_secs: 7300,
            reason: None,
            detected_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_event_bus_publish_subscribe() {
        let event_bus = EventBus::new(10);
        let mut receiver = event_bus.subscribe();

        let flow_id = FlowId::new();
        event_bus.publish_health_event(detected(flow_id));

        match receiver.recv().await.unwrap() {
            ResilienceEvent::Health(HealthEvent::FlowHealthDetected {
                flow_id: id,
                status,
                ..
            }) => {
                assert_eq!(id, flow_id);
                assert_eq!(status, HealthStatus::Critical);
            }
            _ => panic!("Wrong event type received"),
        }
    }

    #[tokio::test]
    async fn test_flow_event_filtering() {
        let event_bus = EventBus::new(10);
        let flow_id = FlowId::new();
        let mut receiver = event_bus.subscribe_flow(flow_id);

        event_bus.publish_health_event(detected(FlowId::new()));
        event_bus.publish_pool_event(PoolEvent::TenantRemoved {
            tenant: TenantKey::new("a", "b"),
            removed_at: Utc::now(),
        });
        event_bus.publish_health_event(detected(flow_id));

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.flow_id(), Some(flow_id));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let event_bus = EventBus::new(10);
        let mut receiver1 = event_bus.subscribe();
        let mut receiver2 = event_bus.subscribe();

        assert_eq!(event_bus.subscriber_count(), 2);

        event_bus.publish_pool_event(PoolEvent::TenantRemoved {
            tenant: TenantKey::new("a", "b"),
            removed_at: Utc::now(),
        });

        let _ = receiver1.recv().await.unwrap();
        let _ = receiver2.recv().await.unwrap();
        assert!(matches!(receiver1.try_recv(), Err(EventBusError::Empty)));
    }

    #[test]
    fn test_publish_without_subscribers_is_harmless() {
        let event_bus = EventBus::default();
        event_bus.publish_health_event(detected(FlowId::new()));
        assert_eq!(event_bus.subscriber_count(), 0);
    }
}
