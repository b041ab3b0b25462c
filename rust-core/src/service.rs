//! Async context service.
//!
//! A single tokio task owns the pipeline and the publisher. Everything that
//! mutates them arrives through one command channel or from the task's own
//! stability timer, so samples and the deadline never race.
//!
//! ```text
//! ContextHandle ──Command──▶ select! {                 ──PropertyChange──▶ Subscription
//!                              commands.recv()
//!                              sleep_until(deadline)
//!                            }
//! ```
//!
//! Sample time is milliseconds since the service was spawned, measured with
//! `tokio::time::Instant` so paused-clock tests drive it deterministically.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};

use crate::config::EngineConfig;
use crate::error::ServiceError;
use crate::pipeline::ContextPipeline;
use crate::publisher::{PropertyPublisher, Subscription};
use crate::source::RawReading;
use crate::types::{AccelSample, ContextProperty, ContextSnapshot};

enum Command {
    Reading(RawReading),
    Subscribe {
        properties: Vec<ContextProperty>,
        reply: oneshot::Sender<Subscription>,
    },
    Snapshot {
        reply: oneshot::Sender<ContextSnapshot>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Cloneable handle to a running service.
#[derive(Clone)]
pub struct ContextHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ContextHandle {
    /// Queue one reading. It is stamped when the service takes it.
    pub fn push_reading(&self, x: i32, y: i32, z: i32) -> Result<(), ServiceError> {
        self.send(Command::Reading(RawReading { x, y, z }))
    }

    /// Subscribe to `properties` (all when empty). Current values are
    /// delivered first.
    pub async fn subscribe(
        &self,
        properties: &[ContextProperty],
    ) -> Result<Subscription, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Subscribe {
            properties: properties.to_vec(),
            reply,
        })?;
        response.await.map_err(|_| ServiceError::Closed)
    }

    /// Current value of every property, after all queued readings.
    pub async fn snapshot(&self) -> Result<ContextSnapshot, ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot { reply })?;
        response.await.map_err(|_| ServiceError::Closed)
    }

    /// Stop the service after it has handled everything queued before this
    /// call. Open subscriptions end.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Shutdown { reply })?;
        response.await.map_err(|_| ServiceError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.commands.send(command).map_err(|_| ServiceError::Closed)
    }
}

/// The task side of the service.
pub struct ContextService {
    pipeline: ContextPipeline,
    publisher: PropertyPublisher,
    origin: Instant,
}

impl ContextService {
    /// Start the service on the current tokio runtime.
    pub fn spawn(config: &EngineConfig) -> ContextHandle {
        let (commands, receiver) = mpsc::unbounded_channel();
        let service = Self {
            pipeline: ContextPipeline::new(config),
            publisher: PropertyPublisher::new(),
            origin: Instant::now(),
        };

        tracing::info!(
            stability_timeout_secs = config.context.timeout().as_secs(),
            "context service started"
        );
        tokio::spawn(service.run(receiver));

        ContextHandle { commands }
    }

    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let deadline = self.deadline_instant();

            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(Command::Reading(reading)) => self.handle_reading(reading),
                        Some(Command::Subscribe { properties, reply }) => {
                            let subscription = self.publisher.subscribe(&properties);
                            let _ = reply.send(subscription);
                        }
                        Some(Command::Snapshot { reply }) => {
                            let _ = reply.send(self.pipeline.snapshot());
                        }
                        Some(Command::Shutdown { reply }) => {
                            let _ = reply.send(());
                            break;
                        }
                        None => break,
                    }
                }

                _ = sleep_until(deadline.unwrap_or(self.origin)), if deadline.is_some() => {
                    self.handle_deadline();
                }
            }
        }

        tracing::info!(
            samples = self.pipeline.samples_processed(),
            published = self.publisher.published_count(),
            "context service stopped"
        );
    }

    fn handle_reading(&mut self, reading: RawReading) {
        let sample = AccelSample::new(self.now_ms(), reading.x, reading.y, reading.z);
        for change in self.pipeline.process_sample(&sample) {
            self.publisher.publish(change);
        }
    }

    fn handle_deadline(&mut self) {
        if let Some(change) = self.pipeline.poll_deadline(self.now_ms()) {
            self.publisher.publish(change);
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn deadline_instant(&self) -> Option<Instant> {
        self.pipeline
            .next_deadline_ms()
            .map(|ms| self.origin + Duration::from_millis(ms))
    }
}
