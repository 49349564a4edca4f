//! 命令录制目标
//!
//! executor 只通过 [`FgCommandTarget`] 录制命令。真实渲染时由 [`GfxCommandBuffer`] 实现，
//! 测试中可以换成只记录调用的实现。

use ash::vk;
use itertools::Itertools;
use kestrel_gfx::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};
use kestrel_gfx::commands::command_buffer::GfxCommandBuffer;

use super::barrier::{FgBufferBarrier, FgImageBarrier};

/// dynamic rendering 的一个附件，所有句柄都已解析为 Vulkan 对象
#[derive(Clone, Copy)]
pub struct FgRenderingAttachment {
    pub view: vk::ImageView,
    pub layout: vk::ImageLayout,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
    pub clear_value: vk::ClearValue,
}

impl FgRenderingAttachment {
    fn to_vk(self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(self.clear_value)
    }
}

/// 一个 render pass 解析之后的渲染信息
///
/// 在 build 时按值捕获进执行闭包，不引用 Pass 描述本身。
#[derive(Clone)]
pub struct FgRenderingInfo {
    pub extent: vk::Extent2D,
    pub color_attachments: Vec<FgRenderingAttachment>,
    pub depth_attachment: Option<FgRenderingAttachment>,
}

impl FgRenderingInfo {
    /// 覆盖整个渲染区域的 scissor
    #[inline]
    pub fn full_scissor(&self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        }
    }

    /// Y 轴翻转的 viewport
    ///
    /// 原点放在底部、高度取负，使屏幕空间与引擎 Y 轴向上的世界坐标一致。
    #[inline]
    pub fn flipped_viewport(&self) -> vk::Viewport {
        vk::Viewport {
            x: 0.0,
            y: self.extent.height as f32,
            width: self.extent.width as f32,
            height: -(self.extent.height as f32),
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

/// frame graph 录制命令的目标
pub trait FgCommandTarget {
    /// 把一批 barrier 作为一次依赖提交
    fn pipeline_barrier(&mut self, image_barriers: &[FgImageBarrier], buffer_barriers: &[FgBufferBarrier]);

    fn begin_rendering(&mut self, info: &FgRenderingInfo);

    fn end_rendering(&mut self);

    fn set_viewport(&mut self, viewport: vk::Viewport);

    fn set_scissor(&mut self, scissor: vk::Rect2D);

    fn begin_label(&mut self, label: &str, color: glam::Vec4);

    fn end_label(&mut self);
}

impl FgCommandTarget for GfxCommandBuffer {
    fn pipeline_barrier(&mut self, image_barriers: &[FgImageBarrier], buffer_barriers: &[FgBufferBarrier]) {
        let image_barriers = image_barriers
            .iter()
            .map(|b| {
                GfxImageBarrier::new()
                    .image(b.image)
                    .image_aspect_flag(b.aspect)
                    .layout_transfer(b.src.layout, b.dst.layout)
                    .src_mask(b.src.stage, b.src.src_access())
                    .dst_mask(b.dst.stage, b.dst.access)
            })
            .collect_vec();
        let buffer_barriers = buffer_barriers
            .iter()
            .map(|b| {
                GfxBufferBarrier::new()
                    .buffer(b.buffer, b.offset, b.size)
                    .src_mask(b.src.stage, b.src.src_access())
                    .dst_mask(b.dst.stage, b.dst.access)
            })
            .collect_vec();

        GfxCommandBuffer::pipeline_barrier(self, vk::DependencyFlags::empty(), &image_barriers, &buffer_barriers);
    }

    fn begin_rendering(&mut self, info: &FgRenderingInfo) {
        let color_attachments = info.color_attachments.iter().map(|a| a.to_vk()).collect_vec();
        let depth_attachment = info.depth_attachment.map(|a| a.to_vk());

        let mut rendering_info = vk::RenderingInfo::default()
            .render_area(info.full_scissor())
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth_attachment) = depth_attachment.as_ref() {
            rendering_info = rendering_info.depth_attachment(depth_attachment);
        }

        self.cmd_begin_rendering(&rendering_info);
    }

    fn end_rendering(&mut self) {
        self.cmd_end_rendering();
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        self.cmd_set_viewport(0, std::slice::from_ref(&viewport));
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        self.cmd_set_scissor(0, std::slice::from_ref(&scissor));
    }

    fn begin_label(&mut self, label: &str, color: glam::Vec4) {
        GfxCommandBuffer::begin_label(self, label, color);
    }

    fn end_label(&mut self) {
        GfxCommandBuffer::end_label(self);
    }
}
