//! Frame Graph
//!
//! 单帧内声明式的 GPU 工作调度：
//!
//! - [`FgResourceTable`]：导入的 image / buffer，跨帧持久化 layout
//! - [`FgRenderPass`] / [`FgComputePass`]：Pass 声明
//! - [`FgFrameBuilder::build`]：按提交顺序模拟资源状态，合成最小 barrier 集合
//! - [`FgExecutor`]：按顺序提交 barrier 批次并调用 Pass 回调
//!
//! Pass 不会被重排，不做资源别名或内存分配。

mod barrier;
mod command_target;
mod config;
mod executor;
mod graph;
mod handle;
mod pass;
mod resource_state;
mod resource_table;
mod tracker;

pub use barrier::{FgBarrierMerger, FgBufferBarrier, FgImageBarrier};
pub use command_target::{FgCommandTarget, FgRenderingAttachment, FgRenderingInfo};
pub use config::FrameGraphConfig;
pub use executor::{FgExecutor, FgExecutorPass};
pub use graph::{FgFrameBuilder, FrameGraph};
pub use handle::{FgBufferId, FgImageId};
pub use pass::{
    FgAccessType, FgBufferUsage, FgColorAttachment, FgComputePass, FgDepthAttachment, FgExecuteFn, FgImageUsage,
    FgRenderPass,
};
pub use resource_state::{FgBufferState, FgImageState, writes_only};
pub use resource_table::{FgBufferEntry, FgImageDesc, FgImageEntry, FgResourceTable, infer_aspect};
pub use tracker::FgResourceTracker;
