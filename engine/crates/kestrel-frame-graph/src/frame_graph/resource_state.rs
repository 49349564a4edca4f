//! 资源状态定义
//!
//! 一个资源状态就是 `{layout, stage, access}` 三元组（buffer 没有 layout）。
//! barrier 合成时比较的就是前后两个三元组：完全相同则不需要任何同步。

use ash::vk;

/// 所有只读的 access 位
///
/// 生成 barrier 时 src access 只需要保留写操作，读操作不会产生需要 flush 的数据。
const READ_ONLY_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::INDIRECT_COMMAND_READ.as_raw()
        | vk::AccessFlags2::INDEX_READ.as_raw()
        | vk::AccessFlags2::VERTEX_ATTRIBUTE_READ.as_raw()
        | vk::AccessFlags2::UNIFORM_READ.as_raw()
        | vk::AccessFlags2::INPUT_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags2::SHADER_READ.as_raw()
        | vk::AccessFlags2::SHADER_SAMPLED_READ.as_raw()
        | vk::AccessFlags2::SHADER_STORAGE_READ.as_raw()
        | vk::AccessFlags2::COLOR_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
        | vk::AccessFlags2::TRANSFER_READ.as_raw()
        | vk::AccessFlags2::HOST_READ.as_raw()
        | vk::AccessFlags2::MEMORY_READ.as_raw(),
);

/// 只保留写操作的 access 位
#[inline]
pub fn writes_only(access: vk::AccessFlags2) -> vk::AccessFlags2 {
    access & !READ_ONLY_ACCESS
}

/// 图像资源状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FgImageState {
    pub layout: vk::ImageLayout,
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

impl Default for FgImageState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

// new & 常量定义
impl FgImageState {
    #[inline]
    pub const fn new(layout: vk::ImageLayout, stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self { layout, stage, access }
    }

    /// 未定义状态（初始状态或不关心内容）
    pub const UNDEFINED: Self =
        Self::new(vk::ImageLayout::UNDEFINED, vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE);

    /// 通用布局
    pub const GENERAL: Self = Self::new(
        vk::ImageLayout::GENERAL,
        vk::PipelineStageFlags2::ALL_COMMANDS,
        vk::AccessFlags2::from_raw(vk::AccessFlags2::MEMORY_READ.as_raw() | vk::AccessFlags2::MEMORY_WRITE.as_raw()),
    );

    /// 传输源
    pub const TRANSFER_SRC: Self = Self::new(
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
    );

    /// 传输目标
    pub const TRANSFER_DST: Self = Self::new(
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
    );

    /// 呈现（swapchain image）
    pub const PRESENT: Self =
        Self::new(vk::ImageLayout::PRESENT_SRC_KHR, vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE);

    const DEPTH_TEST_STAGES: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
        vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw() | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
    );
}

// 各个角色对应的目标状态
impl FgImageState {
    /// 在 shader 中采样或以只读方式访问
    #[inline]
    pub fn shader_read(stage: vk::PipelineStageFlags2) -> Self {
        Self::new(
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            stage,
            vk::AccessFlags2::SHADER_SAMPLED_READ | vk::AccessFlags2::SHADER_STORAGE_READ,
        )
    }

    /// 作为 storage image 写入
    #[inline]
    pub fn storage_write(stage: vk::PipelineStageFlags2) -> Self {
        Self::new(vk::ImageLayout::GENERAL, stage, vk::AccessFlags2::SHADER_STORAGE_WRITE)
    }

    /// 颜色附件；load op 为 LOAD 时需要额外的读 access
    #[inline]
    pub fn color_attachment(load_op: vk::AttachmentLoadOp) -> Self {
        let mut access = vk::AccessFlags2::COLOR_ATTACHMENT_WRITE;
        if load_op == vk::AttachmentLoadOp::LOAD {
            access |= vk::AccessFlags2::COLOR_ATTACHMENT_READ;
        }
        Self::new(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, access)
    }

    /// 深度附件；load op 为 LOAD 时需要额外的读 access
    #[inline]
    pub fn depth_attachment(load_op: vk::AttachmentLoadOp) -> Self {
        let mut access = vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE;
        if load_op == vk::AttachmentLoadOp::LOAD {
            access |= vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ;
        }
        Self::new(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL, Self::DEPTH_TEST_STAGES, access)
    }

    /// 帧末尾需要转换到的状态
    ///
    /// 之后的使用者（present engine、下一帧）不在 graph 内，只能给出该 layout 下最保守的 stage/access。
    pub fn final_state(layout: vk::ImageLayout) -> Self {
        match layout {
            vk::ImageLayout::PRESENT_SRC_KHR => Self::PRESENT,
            vk::ImageLayout::TRANSFER_SRC_OPTIMAL => Self::TRANSFER_SRC,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL => Self::TRANSFER_DST,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => {
                Self::shader_read(vk::PipelineStageFlags2::ALL_COMMANDS)
            }
            vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => Self::color_attachment(vk::AttachmentLoadOp::LOAD),
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => Self::depth_attachment(vk::AttachmentLoadOp::LOAD),
            vk::ImageLayout::GENERAL => Self::GENERAL,
            _ => Self::new(
                layout,
                vk::PipelineStageFlags2::ALL_COMMANDS,
                vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
            ),
        }
    }
}

// 辅助方法
impl FgImageState {
    /// 检查是否包含写操作
    #[inline]
    pub fn is_write(&self) -> bool {
        !writes_only(self.access).is_empty()
    }

    /// 用于 barrier src 的 access（去掉读操作）
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        writes_only(self.access)
    }
}

/// 缓冲区资源状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FgBufferState {
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

impl Default for FgBufferState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl FgBufferState {
    #[inline]
    pub const fn new(stage: vk::PipelineStageFlags2, access: vk::AccessFlags2) -> Self {
        Self { stage, access }
    }

    /// 未定义状态
    pub const UNDEFINED: Self = Self::new(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE);

    /// 以只读方式在 `stage` 访问 buffer，access 由 stage 推断
    ///
    /// - VERTEX_INPUT: 顶点属性 + 索引
    /// - INDEX_INPUT / VERTEX_ATTRIBUTE_INPUT: 对应的专用读
    /// - DRAW_INDIRECT: 间接命令
    /// - TRANSFER: 传输读
    /// - 其他 shader stage: uniform + shader 读
    pub fn read(stage: vk::PipelineStageFlags2) -> Self {
        let mut access = vk::AccessFlags2::NONE;
        if stage.contains(vk::PipelineStageFlags2::VERTEX_INPUT) {
            access |= vk::AccessFlags2::VERTEX_ATTRIBUTE_READ | vk::AccessFlags2::INDEX_READ;
        }
        if stage.contains(vk::PipelineStageFlags2::INDEX_INPUT) {
            access |= vk::AccessFlags2::INDEX_READ;
        }
        if stage.contains(vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT) {
            access |= vk::AccessFlags2::VERTEX_ATTRIBUTE_READ;
        }
        if stage.contains(vk::PipelineStageFlags2::DRAW_INDIRECT) {
            access |= vk::AccessFlags2::INDIRECT_COMMAND_READ;
        }
        if stage.intersects(vk::PipelineStageFlags2::TRANSFER | vk::PipelineStageFlags2::ALL_TRANSFER) {
            access |= vk::AccessFlags2::TRANSFER_READ;
        }

        let non_fixed_function = stage
            & !(vk::PipelineStageFlags2::VERTEX_INPUT
                | vk::PipelineStageFlags2::INDEX_INPUT
                | vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT
                | vk::PipelineStageFlags2::DRAW_INDIRECT
                | vk::PipelineStageFlags2::TRANSFER
                | vk::PipelineStageFlags2::ALL_TRANSFER);
        if !non_fixed_function.is_empty() || access.is_empty() {
            access |= vk::AccessFlags2::UNIFORM_READ | vk::AccessFlags2::SHADER_STORAGE_READ;
        }

        Self::new(stage, access)
    }

    /// 以写方式在 `stage` 访问 buffer
    pub fn write(stage: vk::PipelineStageFlags2) -> Self {
        let mut access = vk::AccessFlags2::NONE;
        if stage.intersects(vk::PipelineStageFlags2::TRANSFER | vk::PipelineStageFlags2::ALL_TRANSFER) {
            access |= vk::AccessFlags2::TRANSFER_WRITE;
        }
        let shader_stages = stage & !(vk::PipelineStageFlags2::TRANSFER | vk::PipelineStageFlags2::ALL_TRANSFER);
        if !shader_stages.is_empty() || access.is_empty() {
            access |= vk::AccessFlags2::SHADER_STORAGE_WRITE;
        }
        Self::new(stage, access)
    }

    /// 检查是否包含写操作
    #[inline]
    pub fn is_write(&self) -> bool {
        !writes_only(self.access).is_empty()
    }

    /// 用于 barrier src 的 access（去掉读操作）
    #[inline]
    pub fn src_access(&self) -> vk::AccessFlags2 {
        writes_only(self.access)
    }
}
