//! Pass 描述
//!
//! `FgRenderPass` / `FgComputePass` 只是声明：读写了哪些资源、使用了哪些附件、
//! 以及一个延迟执行的回调。提交给 [`FgFrameBuilder`](super::FgFrameBuilder) 之前没有任何副作用。
//!
//! 所有 `read_*` / `write_*` / `set_*` 方法都是**设置**而不是追加：
//! 同一个 Pass 上调用两次 `read_images`，第一次的列表会被丢弃。
//! 计算 Pass 的读写存放在同一个列表里，`read_*` 只替换读取项，`write_*` 只替换写入项。

use ash::vk;
use kestrel_gfx::basic::color::LabelColor;

use super::command_target::FgCommandTarget;
use super::handle::{FgBufferId, FgImageId};

/// Pass 的执行回调，在该 Pass 的 barrier 提交之后调用
pub type FgExecuteFn<'a, T> = Box<dyn FnOnce(&mut T) + 'a>;

/// 资源的访问类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FgAccessType {
    Read,
    Write,
}

/// 图像的一次使用
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FgImageUsage {
    pub image: FgImageId,
    pub stage: vk::PipelineStageFlags2,
    pub access_type: FgAccessType,
}

impl FgImageUsage {
    #[inline]
    pub fn read(image: FgImageId, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            image,
            stage,
            access_type: FgAccessType::Read,
        }
    }

    #[inline]
    pub fn write(image: FgImageId, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            image,
            stage,
            access_type: FgAccessType::Write,
        }
    }
}

/// 缓冲区的一次使用
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FgBufferUsage {
    pub buffer: FgBufferId,
    pub stage: vk::PipelineStageFlags2,
    pub access_type: FgAccessType,
    /// 显式指定的 access；为 None 时由 stage 推断
    pub access: Option<vk::AccessFlags2>,
}

impl FgBufferUsage {
    #[inline]
    pub fn read(buffer: FgBufferId, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            buffer,
            stage,
            access_type: FgAccessType::Read,
            access: None,
        }
    }

    #[inline]
    pub fn write(buffer: FgBufferId, stage: vk::PipelineStageFlags2) -> Self {
        Self {
            buffer,
            stage,
            access_type: FgAccessType::Write,
            access: None,
        }
    }

    #[inline]
    pub fn with_access(mut self, access: vk::AccessFlags2) -> Self {
        self.access = Some(access);
        self
    }
}

/// 颜色附件
#[derive(Clone, Copy)]
pub struct FgColorAttachment {
    pub image: FgImageId,
    pub clear_value: vk::ClearValue,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
}

impl FgColorAttachment {
    /// 先清除再写入
    pub fn clear(image: FgImageId, color: [f32; 4]) -> Self {
        Self {
            image,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue { float32: color },
            },
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
        }
    }

    /// 在已有内容上继续写入
    pub fn load(image: FgImageId) -> Self {
        Self {
            image,
            clear_value: vk::ClearValue::default(),
            load_op: vk::AttachmentLoadOp::LOAD,
            store_op: vk::AttachmentStoreOp::STORE,
        }
    }

    #[inline]
    pub fn with_store_op(mut self, store_op: vk::AttachmentStoreOp) -> Self {
        self.store_op = store_op;
        self
    }
}

/// 深度附件
#[derive(Clone, Copy)]
pub struct FgDepthAttachment {
    pub image: FgImageId,
    pub clear_value: vk::ClearValue,
    pub load_op: vk::AttachmentLoadOp,
    pub store_op: vk::AttachmentStoreOp,
}

impl FgDepthAttachment {
    pub fn clear(image: FgImageId, depth: f32, stencil: u32) -> Self {
        Self {
            image,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth, stencil },
            },
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
        }
    }

    pub fn load(image: FgImageId) -> Self {
        Self {
            image,
            clear_value: vk::ClearValue::default(),
            load_op: vk::AttachmentLoadOp::LOAD,
            store_op: vk::AttachmentStoreOp::STORE,
        }
    }

    #[inline]
    pub fn with_store_op(mut self, store_op: vk::AttachmentStoreOp) -> Self {
        self.store_op = store_op;
        self
    }
}

/// 光栅化 Pass 描述
pub struct FgRenderPass<'a, T: FgCommandTarget> {
    pub(crate) label: String,
    pub(crate) label_color: glam::Vec4,

    pub(crate) image_reads: Vec<FgImageUsage>,
    pub(crate) image_writes: Vec<FgImageUsage>,
    pub(crate) buffer_reads: Vec<FgBufferUsage>,
    pub(crate) buffer_writes: Vec<FgBufferUsage>,

    pub(crate) color_attachments: Vec<FgColorAttachment>,
    pub(crate) depth_attachment: Option<FgDepthAttachment>,

    pub(crate) execute: Option<FgExecuteFn<'a, T>>,
}

impl<'a, T: FgCommandTarget> FgRenderPass<'a, T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            label_color: LabelColor::COLOR_PASS,
            image_reads: Vec::new(),
            image_writes: Vec::new(),
            buffer_reads: Vec::new(),
            buffer_writes: Vec::new(),
            color_attachments: Vec::new(),
            depth_attachment: None,
            execute: None,
        }
    }

    pub fn set_label_color(&mut self, color: glam::Vec4) -> &mut Self {
        self.label_color = color;
        self
    }

    /// 设置在 fragment shader 中采样的图像
    pub fn read_images(&mut self, images: &[FgImageId]) -> &mut Self {
        self.read_images_at(images, vk::PipelineStageFlags2::FRAGMENT_SHADER)
    }

    /// 设置在 `stage` 读取的图像
    pub fn read_images_at(&mut self, images: &[FgImageId], stage: vk::PipelineStageFlags2) -> &mut Self {
        self.image_reads = images.iter().map(|&image| FgImageUsage::read(image, stage)).collect();
        self
    }

    /// 设置在 fragment shader 中作为 storage image 写入的图像
    pub fn write_images(&mut self, images: &[FgImageId]) -> &mut Self {
        self.write_images_at(images, vk::PipelineStageFlags2::FRAGMENT_SHADER)
    }

    /// 设置在 `stage` 作为 storage image 写入的图像
    pub fn write_images_at(&mut self, images: &[FgImageId], stage: vk::PipelineStageFlags2) -> &mut Self {
        self.image_writes = images.iter().map(|&image| FgImageUsage::write(image, stage)).collect();
        self
    }

    /// 设置读取的缓冲区，每一项带有自己的 stage
    pub fn read_buffers(&mut self, buffers: &[(FgBufferId, vk::PipelineStageFlags2)]) -> &mut Self {
        self.buffer_reads = buffers.iter().map(|&(buffer, stage)| FgBufferUsage::read(buffer, stage)).collect();
        self
    }

    /// 设置写入的缓冲区，每一项带有自己的 stage
    pub fn write_buffers(&mut self, buffers: &[(FgBufferId, vk::PipelineStageFlags2)]) -> &mut Self {
        self.buffer_writes = buffers.iter().map(|&(buffer, stage)| FgBufferUsage::write(buffer, stage)).collect();
        self
    }

    pub fn set_color_attachments(&mut self, attachments: Vec<FgColorAttachment>) -> &mut Self {
        self.color_attachments = attachments;
        self
    }

    pub fn set_depth_attachment(&mut self, attachment: Option<FgDepthAttachment>) -> &mut Self {
        self.depth_attachment = attachment;
        self
    }

    /// 设置执行回调
    ///
    /// 回调在 dynamic rendering 已经开始、viewport 和 scissor 已经设置之后调用。
    pub fn set_execute(&mut self, execute: impl FnOnce(&mut T) + 'a) -> &mut Self {
        self.execute = Some(Box::new(execute));
        self
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 按 color 附件、depth 附件的顺序遍历所有附件使用的图像
    pub(crate) fn attachment_images(&self) -> impl Iterator<Item = FgImageId> + '_ {
        self.color_attachments.iter().map(|a| a.image).chain(self.depth_attachment.iter().map(|a| a.image))
    }
}

/// 计算 Pass 描述
///
/// 读写集合存放在同一个列表中，用 [`FgAccessType`] 区分。
pub struct FgComputePass<'a, T: FgCommandTarget> {
    pub(crate) label: String,
    pub(crate) label_color: glam::Vec4,

    pub(crate) images: Vec<FgImageUsage>,
    pub(crate) buffers: Vec<FgBufferUsage>,

    pub(crate) execute: Option<FgExecuteFn<'a, T>>,
}

impl<'a, T: FgCommandTarget> FgComputePass<'a, T> {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            label_color: LabelColor::COLOR_COMPUTE,
            images: Vec::new(),
            buffers: Vec::new(),
            execute: None,
        }
    }

    pub fn set_label_color(&mut self, color: glam::Vec4) -> &mut Self {
        self.label_color = color;
        self
    }

    /// 设置全部图像使用（替换之前的列表）
    pub fn set_images(&mut self, images: Vec<FgImageUsage>) -> &mut Self {
        self.images = images;
        self
    }

    /// 设置全部缓冲区使用（替换之前的列表）
    pub fn set_buffers(&mut self, buffers: Vec<FgBufferUsage>) -> &mut Self {
        self.buffers = buffers;
        self
    }

    /// 设置读取的图像，只替换之前的读取项，写入项保留
    pub fn read_images(&mut self, images: &[(FgImageId, vk::PipelineStageFlags2)]) -> &mut Self {
        self.replace_images(FgAccessType::Read, images.iter().map(|&(image, stage)| FgImageUsage::read(image, stage)));
        self
    }

    /// 设置写入的图像，只替换之前的写入项
    pub fn write_images(&mut self, images: &[(FgImageId, vk::PipelineStageFlags2)]) -> &mut Self {
        self.replace_images(FgAccessType::Write, images.iter().map(|&(image, stage)| FgImageUsage::write(image, stage)));
        self
    }

    pub fn read_buffers(&mut self, buffers: &[(FgBufferId, vk::PipelineStageFlags2)]) -> &mut Self {
        self.replace_buffers(
            FgAccessType::Read,
            buffers.iter().map(|&(buffer, stage)| FgBufferUsage::read(buffer, stage)),
        );
        self
    }

    pub fn write_buffers(&mut self, buffers: &[(FgBufferId, vk::PipelineStageFlags2)]) -> &mut Self {
        self.replace_buffers(
            FgAccessType::Write,
            buffers.iter().map(|&(buffer, stage)| FgBufferUsage::write(buffer, stage)),
        );
        self
    }

    /// 只读取一张图像，等价于 `read_images(&[(image, stage)])`
    pub fn read_image(&mut self, image: FgImageId, stage: vk::PipelineStageFlags2) -> &mut Self {
        self.read_images(&[(image, stage)])
    }

    pub fn write_image(&mut self, image: FgImageId, stage: vk::PipelineStageFlags2) -> &mut Self {
        self.write_images(&[(image, stage)])
    }

    pub fn read_buffer(&mut self, buffer: FgBufferId, stage: vk::PipelineStageFlags2) -> &mut Self {
        self.read_buffers(&[(buffer, stage)])
    }

    pub fn write_buffer(&mut self, buffer: FgBufferId, stage: vk::PipelineStageFlags2) -> &mut Self {
        self.write_buffers(&[(buffer, stage)])
    }

    fn replace_images(&mut self, access_type: FgAccessType, usages: impl Iterator<Item = FgImageUsage>) {
        self.images.retain(|usage| usage.access_type != access_type);
        self.images.extend(usages);
    }

    fn replace_buffers(&mut self, access_type: FgAccessType, usages: impl Iterator<Item = FgBufferUsage>) {
        self.buffers.retain(|usage| usage.access_type != access_type);
        self.buffers.extend(usages);
    }

    pub fn set_execute(&mut self, execute: impl FnOnce(&mut T) + 'a) -> &mut Self {
        self.execute = Some(Box::new(execute));
        self
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn image_usages(&self, access_type: FgAccessType) -> impl Iterator<Item = &FgImageUsage> {
        self.images.iter().filter(move |usage| usage.access_type == access_type)
    }

    pub(crate) fn buffer_usages(&self, access_type: FgAccessType) -> impl Iterator<Item = &FgBufferUsage> {
        self.buffers.iter().filter(move |usage| usage.access_type == access_type)
    }
}
