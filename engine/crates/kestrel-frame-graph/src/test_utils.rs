use ash::vk;

use crate::frame_graph::{FgBufferBarrier, FgCommandTarget, FgImageBarrier, FgRenderingInfo};

/// 录制下来的一条命令
#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    Barrier {
        images: Vec<FgImageBarrier>,
        buffers: Vec<FgBufferBarrier>,
    },
    BeginRendering {
        width: u32,
        height: u32,
        color_views: Vec<vk::ImageView>,
        color_layouts: Vec<vk::ImageLayout>,
        depth_view: Option<vk::ImageView>,
    },
    EndRendering,
    Viewport {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    Scissor {
        width: u32,
        height: u32,
    },
    BeginLabel(String),
    EndLabel,
    /// Pass 回调中写入的标记
    Marker(String),
}

/// 只记录调用、不访问 GPU 的命令录制目标
#[derive(Default)]
pub struct RecordingTarget {
    pub commands: Vec<Recorded>,
}

impl RecordingTarget {
    pub fn mark(&mut self, marker: impl Into<String>) {
        self.commands.push(Recorded::Marker(marker.into()));
    }

    /// 按录制顺序返回所有 barrier 批次
    pub fn barrier_batches(&self) -> Vec<(&[FgImageBarrier], &[FgBufferBarrier])> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Recorded::Barrier { images, buffers } => Some((images.as_slice(), buffers.as_slice())),
                _ => None,
            })
            .collect()
    }

    /// 按录制顺序返回所有标记
    pub fn markers(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Recorded::Marker(marker) => Some(marker.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl FgCommandTarget for RecordingTarget {
    fn pipeline_barrier(&mut self, image_barriers: &[FgImageBarrier], buffer_barriers: &[FgBufferBarrier]) {
        self.commands.push(Recorded::Barrier {
            images: image_barriers.to_vec(),
            buffers: buffer_barriers.to_vec(),
        });
    }

    fn begin_rendering(&mut self, info: &FgRenderingInfo) {
        self.commands.push(Recorded::BeginRendering {
            width: info.extent.width,
            height: info.extent.height,
            color_views: info.color_attachments.iter().map(|a| a.view).collect(),
            color_layouts: info.color_attachments.iter().map(|a| a.layout).collect(),
            depth_view: info.depth_attachment.map(|a| a.view),
        });
    }

    fn end_rendering(&mut self) {
        self.commands.push(Recorded::EndRendering);
    }

    fn set_viewport(&mut self, viewport: vk::Viewport) {
        self.commands.push(Recorded::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
        });
    }

    fn set_scissor(&mut self, scissor: vk::Rect2D) {
        self.commands.push(Recorded::Scissor {
            width: scissor.extent.width,
            height: scissor.extent.height,
        });
    }

    fn begin_label(&mut self, label: &str, _color: glam::Vec4) {
        self.commands.push(Recorded::BeginLabel(label.to_string()));
    }

    fn end_label(&mut self) {
        self.commands.push(Recorded::EndLabel);
    }
}
