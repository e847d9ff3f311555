//! # Dispatcher
//!
//! 变更通知分发模块。
//!
//! 负责：
//! - 按名称构建 Router / Transformer / Formatter / BatchFormatter
//! - 逐条或按批执行分发流水线，并给出每条记录的结果
//! - 通过独立队列把结果交给目标端 transport，队列满时不丢弃而是要求重投

pub mod ack;
pub mod batcher;
pub mod builtin;
pub mod dispatcher;
pub mod encoder;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod pipeline;
pub mod registry;
pub mod transports;

pub use ack::{AckSender, Acknowledger};
pub use batcher::{Batch, Batcher};
pub use contracts::{ChangeNotificationRecord, DestinationTransport, RecordOutcome};
pub use dispatcher::{
    BatchSettings, Dispatcher, DispatcherBuilder, DispatcherConfig, Notification,
    create_dispatcher,
};
pub use encoder::Encoder;
pub use error::DispatcherError;
pub use handle::{Delivery, TransportHandle};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use pipeline::{Disposition, Pipeline, Prepared};
pub use registry::{RegisteredStages, Registry};
pub use transports::{FileTransport, LogTransport};
