//! Barrier 合并
//!
//! 每次同步命令都有固定开销，所以一个 Pass 之前的所有资源转换必须合并成
//! 一次 `vkCmdPipelineBarrier2` 提交，而不是每个资源一条命令。

use ash::vk;

use super::command_target::FgCommandTarget;
use super::resource_state::{FgBufferState, FgImageState};

/// 一个图像 barrier：从 `src` 状态转换到 `dst` 状态
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FgImageBarrier {
    pub image: vk::Image,
    pub aspect: vk::ImageAspectFlags,
    pub src: FgImageState,
    pub dst: FgImageState,
}

impl FgImageBarrier {
    #[inline]
    pub fn is_layout_transition(&self) -> bool {
        self.src.layout != self.dst.layout
    }
}

/// 一个缓冲区 barrier
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FgBufferBarrier {
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
    pub src: FgBufferState,
    pub dst: FgBufferState,
}

/// Barrier 累加器
///
/// `put_*` 只是把请求放进待提交列表，`flush_barriers` 把所有待提交的 barrier
/// 作为一次依赖提交录制下来并清空列表。
#[derive(Clone, Debug, Default)]
pub struct FgBarrierMerger {
    image_barriers: Vec<FgImageBarrier>,
    buffer_barriers: Vec<FgBufferBarrier>,
}

impl FgBarrierMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_image_barrier(
        &mut self,
        image: vk::Image,
        aspect: vk::ImageAspectFlags,
        src: FgImageState,
        dst: FgImageState,
    ) {
        self.image_barriers.push(FgImageBarrier { image, aspect, src, dst });
    }

    pub fn put_buffer_barrier(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        src: FgBufferState,
        dst: FgBufferState,
    ) {
        self.buffer_barriers.push(FgBufferBarrier {
            buffer,
            offset,
            size,
            src,
            dst,
        });
    }

    /// 录制所有待提交的 barrier 并清空；没有待提交的 barrier 时什么都不录制
    pub fn flush_barriers<T: FgCommandTarget + ?Sized>(&mut self, target: &mut T) {
        if self.is_empty() {
            return;
        }

        target.pipeline_barrier(&self.image_barriers, &self.buffer_barriers);
        self.image_barriers.clear();
        self.buffer_barriers.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.image_barriers.is_empty() && self.buffer_barriers.is_empty()
    }

    #[inline]
    pub fn image_barriers(&self) -> &[FgImageBarrier] {
        &self.image_barriers
    }

    #[inline]
    pub fn buffer_barriers(&self) -> &[FgBufferBarrier] {
        &self.buffer_barriers
    }

    #[inline]
    pub fn barrier_count(&self) -> usize {
        self.image_barriers.len() + self.buffer_barriers.len()
    }
}
