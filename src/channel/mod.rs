//! Channel Module Implementation
//!
//! The channel converts one full-duplex byte transport into a lazy sequence
//! of typed packages, and serializes outbound packages back onto it.
//!
//! # Architecture
//!
//! Three tasks cooperate per channel:
//! - the fill loop pumps transport bytes into the inbound pipe
//! - the parser driver runs the active pipeline filter over buffered bytes
//!   and enqueues packages
//! - the send loop drains the outbound pipe to the transport
//!
//! Backpressure comes from the pipe capacities: the inbound pipe throttles
//! the fill loop, the outbound pipe throttles senders.
//!
//! # Components
//!
//! - `Channel`: owns the transport halves, the pipes and the filter chain
//! - `ChannelHandle`: clonable send/close endpoint
//! - `PackageStream`: the lazy package sequence returned by `run`
//! - `ChannelOptions`: buffer sizes and the max-package-length guard

mod channel;
mod controller;
mod driver;
mod io_tasks;
mod options;
mod package_queue;

pub use channel::{Channel, ChannelHandle, PackageStream};
pub use controller::ChannelState;
pub use options::{ChannelOptions, DEFAULT_BUFFER_SIZE};
pub use package_queue::{PackageConsumer, PackageProducer, PackageQueue};
