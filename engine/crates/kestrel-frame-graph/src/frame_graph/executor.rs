//! 执行器
//!
//! `build()` 的产物。只包含已经算好的 barrier 批次和包装好的回调，
//! 被 [`FgExecutor::execute`] 按值消耗，不能跨帧复用。

use ash::vk;

use super::barrier::FgBarrierMerger;
use super::command_target::FgCommandTarget;
use super::pass::FgExecuteFn;
use super::resource_table::FgResourceTable;

/// 一个待执行的 Pass：先提交 barrier，再调用回调
pub struct FgExecutorPass<'a, T> {
    pub(crate) name: String,
    pub(crate) barriers: FgBarrierMerger,
    pub(crate) execute: FgExecuteFn<'a, T>,
}

/// 一帧的执行计划
pub struct FgExecutor<'a, T> {
    pub(crate) passes: Vec<FgExecutorPass<'a, T>>,
    /// 所有 Pass 之后的 barrier（帧末 layout 转换）
    pub(crate) final_barriers: FgBarrierMerger,
}

impl<'a, T: FgCommandTarget> FgExecutor<'a, T> {
    /// 按提交顺序录制所有 Pass
    ///
    /// 第 N 个 Pass 的 barrier 在第 N-1 个 Pass 的回调之后、第 N 个 Pass 的回调之前提交；
    /// 最后提交帧末的 barrier。
    pub fn execute(self, target: &mut T) {
        let _span = tracy_client::Client::running()
            .map(|client| client.span(tracy_client::span_location!("FgExecutor::execute"), 0));

        let Self {
            passes,
            mut final_barriers,
        } = self;

        for pass in passes {
            let FgExecutorPass {
                name,
                mut barriers,
                execute,
            } = pass;

            log::trace!("FrameGraph: execute pass \"{}\"", name);
            barriers.flush_barriers(target);
            execute(&mut *target);
        }

        final_barriers.flush_barriers(target);
    }
}

// getters
impl<T> FgExecutor<'_, T> {
    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    #[inline]
    pub fn pass_name(&self, index: usize) -> &str {
        &self.passes[index].name
    }

    /// 第 `index` 个 Pass 之前提交的 barrier
    #[inline]
    pub fn pass_barriers(&self, index: usize) -> &FgBarrierMerger {
        &self.passes[index].barriers
    }

    #[inline]
    pub fn final_barriers(&self) -> &FgBarrierMerger {
        &self.final_barriers
    }

    /// 整帧的 barrier 总数
    pub fn barrier_count(&self) -> usize {
        self.passes.iter().map(|pass| pass.barriers.barrier_count()).sum::<usize>() + self.final_barriers.barrier_count()
    }
}

// 调试方法
impl<T> FgExecutor<'_, T> {
    /// 打印执行计划
    ///
    /// `resources` 只用于把 Vulkan 句柄翻译回调试名称。
    pub fn print_execution_plan(&self, resources: &FgResourceTable) {
        log::info!("╔══════════════════════════════════════════════════════════════════╗");
        log::info!("║                 FrameGraph Execution Plan                        ║");
        log::info!("╠══════════════════════════════════════════════════════════════════╣");
        log::info!(
            "║ Passes: {}  |  Barriers: {}  |  Order: [{}]",
            self.passes.len(),
            self.barrier_count(),
            self.passes.iter().map(|pass| pass.name.as_str()).collect::<Vec<_>>().join(" → ")
        );
        log::info!("╚══════════════════════════════════════════════════════════════════╝");

        let pass_count = self.passes.len();
        for (index, pass) in self.passes.iter().enumerate() {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ [{}/{}] Pass: \"{}\"", index + 1, pass_count, pass.name);
            log::info!("├─────────────────────────────────────────────────────────────────┤");
            Self::print_barriers(&pass.barriers, resources);
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        if !self.final_barriers.is_empty() {
            log::info!("");
            log::info!("┌─────────────────────────────────────────────────────────────────┐");
            log::info!("│ Final layout transitions");
            log::info!("├─────────────────────────────────────────────────────────────────┤");
            Self::print_barriers(&self.final_barriers, resources);
            log::info!("└─────────────────────────────────────────────────────────────────┘");
        }

        log::info!("");
        log::info!("═══════════════════════ End of Execution Plan ═══════════════════════");
    }

    fn print_barriers(barriers: &FgBarrierMerger, resources: &FgResourceTable) {
        if barriers.is_empty() {
            log::info!("│ No barriers required");
            return;
        }

        log::info!(
            "│ Barriers: {} image, {} buffer",
            barriers.image_barriers().len(),
            barriers.buffer_barriers().len()
        );

        for barrier in barriers.image_barriers() {
            let name = resources
                .iter_images()
                .find(|(_, entry)| entry.image == barrier.image)
                .map(|(_, entry)| entry.name.as_str())
                .unwrap_or("<unknown>");
            let layout_change = if barrier.is_layout_transition() {
                format!("{:?} → {:?}", barrier.src.layout, barrier.dst.layout)
            } else {
                format!("{:?} (no layout change)", barrier.src.layout)
            };
            log::info!("│   Image \"{}\":", name);
            log::info!("│       Layout: {}", layout_change);
            log::info!(
                "│       Stage:  {} → {}",
                format_pipeline_stage(barrier.src.stage),
                format_pipeline_stage(barrier.dst.stage)
            );
            log::info!(
                "│       Access: {} → {}",
                format_access_flags(barrier.src.src_access()),
                format_access_flags(barrier.dst.access)
            );
            log::info!("│       Aspect: {:?}", barrier.aspect);
        }

        for barrier in barriers.buffer_barriers() {
            let name = resources
                .iter_buffers()
                .find(|(_, entry)| entry.buffer == barrier.buffer)
                .map(|(_, entry)| entry.name.as_str())
                .unwrap_or("<unknown>");
            log::info!("│   Buffer \"{}\" [{}, +{}]:", name, barrier.offset, barrier.size);
            log::info!(
                "│       Stage:  {} → {}",
                format_pipeline_stage(barrier.src.stage),
                format_pipeline_stage(barrier.dst.stage)
            );
            log::info!(
                "│       Access: {} → {}",
                format_access_flags(barrier.src.src_access()),
                format_access_flags(barrier.dst.access)
            );
        }
    }
}

const STAGE_NAMES: &[(vk::PipelineStageFlags2, &str)] = &[
    (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
    (vk::PipelineStageFlags2::DRAW_INDIRECT, "DRAW_INDIRECT"),
    (vk::PipelineStageFlags2::VERTEX_INPUT, "VERTEX_INPUT"),
    (vk::PipelineStageFlags2::INDEX_INPUT, "INDEX_INPUT"),
    (vk::PipelineStageFlags2::VERTEX_ATTRIBUTE_INPUT, "VERTEX_ATTR_INPUT"),
    (vk::PipelineStageFlags2::VERTEX_SHADER, "VERTEX_SHADER"),
    (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
    (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
    (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
    (vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, "COLOR_ATTACHMENT_OUTPUT"),
    (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
    (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
    (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
    (vk::PipelineStageFlags2::ALL_GRAPHICS, "ALL_GRAPHICS"),
    (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
];

const ACCESS_NAMES: &[(vk::AccessFlags2, &str)] = &[
    (vk::AccessFlags2::INDIRECT_COMMAND_READ, "INDIRECT_CMD_READ"),
    (vk::AccessFlags2::INDEX_READ, "INDEX_READ"),
    (vk::AccessFlags2::VERTEX_ATTRIBUTE_READ, "VERTEX_ATTR_READ"),
    (vk::AccessFlags2::UNIFORM_READ, "UNIFORM_READ"),
    (vk::AccessFlags2::SHADER_SAMPLED_READ, "SAMPLED_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_READ, "STORAGE_READ"),
    (vk::AccessFlags2::SHADER_STORAGE_WRITE, "STORAGE_WRITE"),
    (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACH_READ"),
    (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACH_WRITE"),
    (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ, "DEPTH_ATTACH_READ"),
    (vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE, "DEPTH_ATTACH_WRITE"),
    (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
    (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
    (vk::AccessFlags2::MEMORY_READ, "MEMORY_READ"),
    (vk::AccessFlags2::MEMORY_WRITE, "MEMORY_WRITE"),
];

/// 格式化 PipelineStageFlags2 为可读字符串
fn format_pipeline_stage(stage: vk::PipelineStageFlags2) -> String {
    let names: Vec<_> = STAGE_NAMES.iter().filter(|(flag, _)| stage.contains(*flag)).map(|(_, name)| *name).collect();
    if names.is_empty() { format!("{:?}", stage) } else { names.join(" | ") }
}

/// 格式化 AccessFlags2 为可读字符串
fn format_access_flags(access: vk::AccessFlags2) -> String {
    if access == vk::AccessFlags2::NONE {
        return "NONE".to_string();
    }
    let names: Vec<_> = ACCESS_NAMES.iter().filter(|(flag, _)| access.contains(*flag)).map(|(_, name)| *name).collect();
    if names.is_empty() { format!("{:?}", access) } else { names.join(" | ") }
}
