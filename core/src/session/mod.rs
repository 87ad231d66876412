pub mod consumer;
pub mod controller;
pub mod producer;
pub mod slot;

pub use consumer::{spawn_consumer, ConsumerHandle};
pub use controller::{ConsumerConfig, ConsumersConfig, ResultReceivers, Session, SessionConfig};
pub use producer::{spawn_producer, ProducerHandle};
pub use slot::{FrameReader, FrameSlot};
