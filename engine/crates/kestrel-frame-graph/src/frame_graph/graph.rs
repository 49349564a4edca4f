//! FrameGraph 与单帧构建器
//!
//! # 使用流程
//!
//! 1. 创建 graph: `FrameGraph::new()`，导入长期存在的资源
//! 2. 每帧导入 swapchain image: `graph.import_swapchain_image(...)`
//! 3. 开始一帧: `let mut frame = graph.begin_frame()`
//! 4. 提交 Pass: `frame.add_render_pass(...)` / `frame.add_compute_pass(...)`
//! 5. 合成 barrier: `let executor = frame.build()`
//! 6. 录制: `executor.execute(&mut cmd)`
//!
//! # 生命周期
//!
//! `'a` 是 Pass 回调可以借用的外部资源的生命周期。构建器可变借用 graph，
//! 所以在 `build()` 之前无法移除任何资源。

use ash::vk;

use super::barrier::FgBarrierMerger;
use super::command_target::{FgCommandTarget, FgRenderingAttachment, FgRenderingInfo};
use super::config::FrameGraphConfig;
use super::executor::{FgExecutor, FgExecutorPass};
use super::handle::{FgBufferId, FgImageId};
use super::pass::{FgAccessType, FgBufferUsage, FgComputePass, FgExecuteFn, FgRenderPass};
use super::resource_state::{FgBufferState, FgImageState};
use super::resource_table::{FgImageDesc, FgResourceTable};
use super::tracker::FgResourceTracker;

/// 跨帧存在的 frame graph：资源表 + 配置
pub struct FrameGraph {
    resources: FgResourceTable,
    config: FrameGraphConfig,
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl FrameGraph {
    pub fn new() -> Self {
        Self::with_config(FrameGraphConfig::default())
    }

    pub fn with_config(config: FrameGraphConfig) -> Self {
        Self {
            resources: FgResourceTable::new(),
            config,
        }
    }

    /// 开始一帧
    ///
    /// 返回的构建器独占 graph 直到 `build()`。
    pub fn begin_frame<'a, T: FgCommandTarget + 'a>(&mut self) -> FgFrameBuilder<'_, 'a, T> {
        FgFrameBuilder {
            graph: self,
            passes: Vec::new(),
        }
    }
}

// 资源导入与查询
impl FrameGraph {
    pub fn import_image(&mut self, name: impl Into<String>, desc: FgImageDesc) -> FgImageId {
        self.resources.import_image(name, desc)
    }

    pub fn import_swapchain_image(&mut self, desc: FgImageDesc) -> FgImageId {
        self.resources.import_swapchain_image(desc)
    }

    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> FgBufferId {
        self.resources.import_buffer(name, buffer, offset, size, usage)
    }

    pub fn remove_image(&mut self, id: FgImageId) {
        self.resources.remove_image(id);
    }

    pub fn remove_buffer(&mut self, id: FgBufferId) {
        self.resources.remove_buffer(id);
    }

    #[inline]
    pub fn swapchain_image_id(&self) -> FgImageId {
        self.resources.swapchain_image_id()
    }

    #[inline]
    pub fn resources(&self) -> &FgResourceTable {
        &self.resources
    }

    #[inline]
    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: FrameGraphConfig) {
        self.config = config;
    }
}

enum FgPendingPass<'a, T: FgCommandTarget> {
    Render(FgRenderPass<'a, T>),
    Compute(FgComputePass<'a, T>),
}

/// 单帧构建器
///
/// 收集本帧的 Pass，`build()` 时按提交顺序合成 barrier。
pub struct FgFrameBuilder<'g, 'a, T: FgCommandTarget + 'a> {
    graph: &'g mut FrameGraph,
    passes: Vec<FgPendingPass<'a, T>>,
}

impl<'a, T: FgCommandTarget + 'a> FgFrameBuilder<'_, 'a, T> {
    #[inline]
    pub fn resources(&self) -> &FgResourceTable {
        &self.graph.resources
    }

    /// 在帧中途导入图像（例如本帧才创建的临时图像）
    pub fn import_image(&mut self, name: impl Into<String>, desc: FgImageDesc) -> FgImageId {
        self.graph.resources.import_image(name, desc)
    }

    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> FgBufferId {
        self.graph.resources.import_buffer(name, buffer, offset, size, usage)
    }

    #[inline]
    pub fn pass_count(&self) -> usize {
        self.passes.len()
    }

    /// 校验并提交一个光栅化 Pass
    ///
    /// # Panics
    /// - 引用了未导入的资源
    /// - 没有任何附件
    /// - 附件尺寸不一致，或尺寸为 0×0
    pub fn add_render_pass(&mut self, pass: FgRenderPass<'a, T>) -> &mut Self {
        let resources = &self.graph.resources;
        let images = pass.image_reads.iter().chain(pass.image_writes.iter()).map(|usage| usage.image);
        for image in images.chain(pass.attachment_images()) {
            check_image(resources, &pass.label, image);
        }
        for usage in pass.buffer_reads.iter().chain(pass.buffer_writes.iter()) {
            check_buffer(resources, &pass.label, usage.buffer);
        }
        render_extent(resources, &pass);

        if pass.execute.is_none() {
            log::warn!("FrameGraph: render pass \"{}\" has no execute callback", pass.label);
        }
        self.passes.push(FgPendingPass::Render(pass));
        self
    }

    /// 校验并提交一个计算 Pass
    ///
    /// # Panics
    /// 引用了未导入的资源
    pub fn add_compute_pass(&mut self, pass: FgComputePass<'a, T>) -> &mut Self {
        let resources = &self.graph.resources;
        for usage in &pass.images {
            check_image(resources, &pass.label, usage.image);
        }
        for usage in &pass.buffers {
            check_buffer(resources, &pass.label, usage.buffer);
        }

        if pass.execute.is_none() {
            log::warn!("FrameGraph: compute pass \"{}\" has no execute callback", pass.label);
        }
        self.passes.push(FgPendingPass::Compute(pass));
        self
    }

    /// 合成本帧所有的 barrier，生成执行器
    ///
    /// 跟踪到的帧末 layout 写回资源表，作为下一帧的初始 layout。
    pub fn build(self) -> FgExecutor<'a, T> {
        let _span = tracy_client::Client::running()
            .map(|client| client.span(tracy_client::span_location!("FgFrameBuilder::build"), 0));

        let Self { graph, passes } = self;
        if passes.is_empty() {
            log::warn!("FrameGraph: build a frame without any pass");
        }

        let debug_labels = graph.config.debug_labels;
        let mut tracker = FgResourceTracker::seed(&graph.resources);

        let mut executor_passes = Vec::with_capacity(passes.len());
        for pass in passes {
            let executor_pass = match pass {
                FgPendingPass::Render(pass) => build_render_pass(&graph.resources, &mut tracker, pass, debug_labels),
                FgPendingPass::Compute(pass) => build_compute_pass(&graph.resources, &mut tracker, pass, debug_labels),
            };
            executor_passes.push(executor_pass);
        }

        let mut final_barriers = FgBarrierMerger::new();
        tracker.converge_final_layouts(&graph.resources, &mut final_barriers);
        tracker.write_back(&mut graph.resources);

        let executor = FgExecutor {
            passes: executor_passes,
            final_barriers,
        };
        log::debug!(
            "FrameGraph: built {} passes with {} barriers",
            executor.pass_count(),
            executor.barrier_count()
        );
        if graph.config.log_execution_plan {
            executor.print_execution_plan(&graph.resources);
        }

        executor
    }
}

fn check_image(resources: &FgResourceTable, pass: &str, image: FgImageId) {
    assert!(resources.contains_image(image), "FrameGraph: pass \"{}\" references unknown image {:?}", pass, image);
}

fn check_buffer(resources: &FgResourceTable, pass: &str, buffer: FgBufferId) {
    assert!(
        resources.contains_buffer(buffer),
        "FrameGraph: pass \"{}\" references unknown buffer {:?}",
        pass,
        buffer
    );
}

/// 渲染区域取第一个附件的尺寸，其余附件必须与之一致
fn render_extent<T: FgCommandTarget>(resources: &FgResourceTable, pass: &FgRenderPass<'_, T>) -> vk::Extent2D {
    let mut attachments = pass.attachment_images();
    let Some(first) = attachments.next() else {
        panic!("FrameGraph: render pass \"{}\" has no attachment", pass.label);
    };

    let first_extent = resources.get_image_extent(first);
    let extent = vk::Extent2D {
        width: first_extent.width,
        height: first_extent.height,
    };
    for image in attachments {
        let other = resources.get_image_extent(image);
        assert!(
            other.width == extent.width && other.height == extent.height,
            "FrameGraph: render pass \"{}\" attachment extent mismatch: {:?} is {}x{}, expected {}x{}",
            pass.label,
            image,
            other.width,
            other.height,
            extent.width,
            extent.height
        );
    }
    assert!(
        extent.width != 0 && extent.height != 0,
        "FrameGraph: render pass \"{}\" has zero render extent {}x{}",
        pass.label,
        extent.width,
        extent.height
    );

    extent
}

/// 同一 Pass 内对同一资源的多个角色只保留最后一个
///
/// 一次依赖提交内的多个 barrier 之间没有顺序，同一资源只能出现一次。
fn resolve_last_role<I: PartialEq + Copy, S>(requests: impl IntoIterator<Item = (I, S)>) -> Vec<(I, S)> {
    let mut resolved: Vec<(I, S)> = Vec::new();
    for (id, state) in requests {
        match resolved.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => slot.1 = state,
            None => resolved.push((id, state)),
        }
    }
    resolved
}

fn buffer_target_state(usage: &FgBufferUsage) -> FgBufferState {
    let mut state = match usage.access_type {
        FgAccessType::Read => FgBufferState::read(usage.stage),
        FgAccessType::Write => FgBufferState::write(usage.stage),
    };
    if let Some(access) = usage.access {
        state.access = access;
    }
    state
}

fn transition_all(
    resources: &FgResourceTable,
    tracker: &mut FgResourceTracker,
    barriers: &mut FgBarrierMerger,
    images: Vec<(FgImageId, FgImageState)>,
    buffers: Vec<(FgBufferId, FgBufferState)>,
) {
    for (image, state) in resolve_last_role(images) {
        tracker.transition_image(resources, image, state, barriers);
    }
    for (buffer, state) in resolve_last_role(buffers) {
        tracker.transition_buffer(resources, buffer, state, barriers);
    }
}

fn build_render_pass<'a, T: FgCommandTarget + 'a>(
    resources: &FgResourceTable,
    tracker: &mut FgResourceTracker,
    pass: FgRenderPass<'a, T>,
    debug_labels: bool,
) -> FgExecutorPass<'a, T> {
    let mut barriers = FgBarrierMerger::new();

    // image reads, image writes, color, depth, buffer reads, buffer writes
    let mut images = Vec::new();
    images.extend(pass.image_reads.iter().map(|u| (u.image, FgImageState::shader_read(u.stage))));
    images.extend(pass.image_writes.iter().map(|u| (u.image, FgImageState::storage_write(u.stage))));
    images.extend(pass.color_attachments.iter().map(|a| (a.image, FgImageState::color_attachment(a.load_op))));
    images.extend(pass.depth_attachment.iter().map(|a| (a.image, FgImageState::depth_attachment(a.load_op))));

    let buffers = pass
        .buffer_reads
        .iter()
        .chain(pass.buffer_writes.iter())
        .map(|u| (u.buffer, buffer_target_state(u)))
        .collect();

    transition_all(resources, tracker, &mut barriers, images, buffers);

    let rendering_info = FgRenderingInfo {
        extent: render_extent(resources, &pass),
        color_attachments: pass
            .color_attachments
            .iter()
            .map(|a| FgRenderingAttachment {
                view: resources.get_image_view(a.image),
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                load_op: a.load_op,
                store_op: a.store_op,
                clear_value: a.clear_value,
            })
            .collect(),
        depth_attachment: pass.depth_attachment.map(|a| FgRenderingAttachment {
            view: resources.get_image_view(a.image),
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            load_op: a.load_op,
            store_op: a.store_op,
            clear_value: a.clear_value,
        }),
    };

    let FgRenderPass {
        label,
        label_color,
        execute: user_execute,
        ..
    } = pass;
    let name = label.clone();
    let execute: FgExecuteFn<'a, T> = Box::new(move |target: &mut T| {
        if debug_labels {
            target.begin_label(&label, label_color);
        }
        target.begin_rendering(&rendering_info);
        target.set_viewport(rendering_info.flipped_viewport());
        target.set_scissor(rendering_info.full_scissor());
        if let Some(user_execute) = user_execute {
            user_execute(&mut *target);
        }
        target.end_rendering();
        if debug_labels {
            target.end_label();
        }
    });

    FgExecutorPass {
        name,
        barriers,
        execute,
    }
}

fn build_compute_pass<'a, T: FgCommandTarget + 'a>(
    resources: &FgResourceTable,
    tracker: &mut FgResourceTracker,
    pass: FgComputePass<'a, T>,
    debug_labels: bool,
) -> FgExecutorPass<'a, T> {
    let mut barriers = FgBarrierMerger::new();

    let images = pass
        .image_usages(FgAccessType::Read)
        .map(|u| (u.image, FgImageState::shader_read(u.stage)))
        .chain(pass.image_usages(FgAccessType::Write).map(|u| (u.image, FgImageState::storage_write(u.stage))))
        .collect();
    let buffers = pass
        .buffer_usages(FgAccessType::Read)
        .chain(pass.buffer_usages(FgAccessType::Write))
        .map(|u| (u.buffer, buffer_target_state(u)))
        .collect();

    transition_all(resources, tracker, &mut barriers, images, buffers);

    let FgComputePass {
        label,
        label_color,
        execute: user_execute,
        ..
    } = pass;
    let name = label.clone();
    let execute: FgExecuteFn<'a, T> = Box::new(move |target: &mut T| {
        if debug_labels {
            target.begin_label(&label, label_color);
        }
        if let Some(user_execute) = user_execute {
            user_execute(&mut *target);
        }
        if debug_labels {
            target.end_label();
        }
    });

    FgExecutorPass {
        name,
        barriers,
        execute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_graph::{FgColorAttachment, FgDepthAttachment, FgImageUsage};
    use crate::test_utils::{Recorded, RecordingTarget};
    use ash::vk::Handle;

    fn color_desc(raw: u64, width: u32, height: u32) -> FgImageDesc {
        FgImageDesc::new_2d(
            vk::Image::from_raw(raw),
            vk::ImageView::from_raw(raw + 1000),
            vk::Format::R8G8B8A8_UNORM,
            width,
            height,
        )
    }

    fn graph_with_swapchain() -> (FrameGraph, FgImageId) {
        let mut graph = FrameGraph::new();
        let swapchain = graph.import_swapchain_image(
            color_desc(100, 800, 600).with_layouts(vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR),
        );
        (graph, swapchain)
    }

    fn marker_render_pass<'a>(name: &str, color: FgImageId) -> FgRenderPass<'a, RecordingTarget> {
        let marker = name.to_string();
        let mut pass = FgRenderPass::new(name);
        pass.set_color_attachments(vec![FgColorAttachment::clear(color, [0.0; 4])])
            .set_execute(move |target: &mut RecordingTarget| target.mark(marker));
        pass
    }

    fn marker_compute_pass<'a>(name: &str) -> FgComputePass<'a, RecordingTarget> {
        let marker = name.to_string();
        let mut pass = FgComputePass::new(name);
        pass.set_execute(move |target: &mut RecordingTarget| target.mark(marker));
        pass
    }

    fn image_of(graph: &FrameGraph, id: FgImageId) -> vk::Image {
        graph.resources().get_image(id)
    }

    #[test]
    fn test_single_pass_two_batches() {
        let (mut graph, swapchain) = graph_with_swapchain();

        let executor = {
            let mut frame = graph.begin_frame();
            frame.add_render_pass(marker_render_pass("forward", swapchain));
            frame.build()
        };

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);

        let batches = target.barrier_batches();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].0.len(), 1);
        assert_eq!(batches[0].0[0].src.layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(batches[0].0[0].dst.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(batches[1].0.len(), 1);
        assert_eq!(batches[1].0[0].src.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(batches[1].0[0].dst.layout, vk::ImageLayout::PRESENT_SRC_KHR);

        assert_eq!(graph.resources().get_image_layout(swapchain), vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_render_pass_command_sequence() {
        let (mut graph, swapchain) = graph_with_swapchain();

        let executor = {
            let mut frame = graph.begin_frame();
            frame.add_render_pass(marker_render_pass("forward", swapchain));
            frame.build()
        };

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);

        let commands = &target.commands;
        assert_eq!(commands.len(), 9);
        assert!(matches!(commands[0], Recorded::Barrier { .. }));
        assert_eq!(commands[1], Recorded::BeginLabel("forward".to_string()));
        assert_eq!(
            commands[2],
            Recorded::BeginRendering {
                width: 800,
                height: 600,
                color_views: vec![vk::ImageView::from_raw(1100)],
                color_layouts: vec![vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL],
                depth_view: None,
            }
        );
        assert_eq!(
            commands[3],
            Recorded::Viewport {
                x: 0.0,
                y: 600.0,
                width: 800.0,
                height: -600.0,
            }
        );
        assert_eq!(
            commands[4],
            Recorded::Scissor {
                width: 800,
                height: 600,
            }
        );
        assert_eq!(commands[5], Recorded::Marker("forward".to_string()));
        assert_eq!(commands[6], Recorded::EndRendering);
        assert_eq!(commands[7], Recorded::EndLabel);
        assert!(matches!(commands[8], Recorded::Barrier { .. }));
    }

    #[test]
    fn test_read_after_write() {
        let (mut graph, swapchain) = graph_with_swapchain();
        let x = graph.import_image("x", color_desc(1, 800, 600));
        let x_image = image_of(&graph, x);

        let executor = {
            let mut frame = graph.begin_frame();
            frame.add_render_pass(marker_render_pass("a", x));

            let mut b = marker_render_pass("b", swapchain);
            b.read_images(&[x]);
            frame.add_render_pass(b);
            frame.build()
        };

        let a_barriers = executor.pass_barriers(0).image_barriers();
        assert_eq!(a_barriers.len(), 1);
        assert_eq!(a_barriers[0].image, x_image);
        assert_eq!(a_barriers[0].dst.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert!(a_barriers.iter().all(|b| b.dst.layout != vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL));

        let x_in_b = executor
            .pass_barriers(1)
            .image_barriers()
            .iter()
            .find(|b| b.image == x_image)
            .copied()
            .unwrap();
        assert_eq!(x_in_b.src.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(x_in_b.src.access, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
        assert_eq!(x_in_b.dst.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(x_in_b.dst.stage, vk::PipelineStageFlags2::FRAGMENT_SHADER);
        assert!(!x_in_b.dst.is_write());
    }

    #[test]
    fn test_removed_resource_has_no_trailing_barrier() {
        let (mut graph, swapchain) = graph_with_swapchain();
        let y = graph.import_image(
            "y",
            color_desc(7, 64, 64).with_layouts(vk::ImageLayout::UNDEFINED, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL),
        );
        let y_image = image_of(&graph, y);
        graph.remove_image(y);

        let executor = {
            let mut frame = graph.begin_frame();
            frame.add_render_pass(marker_render_pass("forward", swapchain));
            frame.build()
        };

        let finals = executor.final_barriers().image_barriers();
        assert_eq!(finals.len(), 1);
        assert!(finals.iter().all(|b| b.image != y_image));

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);
        assert_eq!(target.markers(), vec!["forward"]);
    }

    #[test]
    fn test_no_redundant_barrier() {
        let mut graph = FrameGraph::new();
        let x = graph.import_image("x", color_desc(1, 256, 256));
        let target_image = graph.import_image("target", color_desc(2, 256, 256));

        let executor = {
            let mut frame = graph.begin_frame();
            for name in ["first", "second"] {
                let mut pass = marker_render_pass(name, target_image);
                pass.read_images(&[x]);
                frame.add_render_pass(pass);
            }
            frame.build()
        };

        assert_eq!(executor.pass_barriers(0).barrier_count(), 2);
        assert!(executor.pass_barriers(1).is_empty());
        assert!(executor.final_barriers().is_empty());

        // 空批次不会录制
        let mut target = RecordingTarget::default();
        executor.execute(&mut target);
        assert_eq!(target.barrier_batches().len(), 1);
    }

    #[test]
    fn test_pass_order_preserved() {
        let (mut graph, _) = graph_with_swapchain();

        let executor = {
            let mut frame = graph.begin_frame();
            for name in ["c", "a", "b"] {
                frame.add_compute_pass(marker_compute_pass(name));
            }
            frame.build()
        };
        assert_eq!(executor.pass_name(0), "c");

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);
        assert_eq!(target.markers(), vec!["c", "a", "b"]);
    }

    #[test]
    #[should_panic(expected = "attachment extent mismatch")]
    fn test_extent_mismatch_panics() {
        let mut graph = FrameGraph::new();
        let a = graph.import_image("a", color_desc(1, 800, 600));
        let b = graph.import_image("b", color_desc(2, 640, 480));

        let mut frame = graph.begin_frame::<RecordingTarget>();
        let mut pass = FgRenderPass::new("gbuffer");
        pass.set_color_attachments(vec![FgColorAttachment::clear(a, [0.0; 4]), FgColorAttachment::clear(b, [0.0; 4])]);
        frame.add_render_pass(pass);
    }

    #[test]
    #[should_panic(expected = "zero render extent")]
    fn test_zero_extent_panics() {
        let mut graph = FrameGraph::new();
        let a = graph.import_image("a", color_desc(1, 0, 0));

        let mut frame = graph.begin_frame::<RecordingTarget>();
        frame.add_render_pass(marker_render_pass("empty", a));
    }

    #[test]
    #[should_panic(expected = "has no attachment")]
    fn test_pass_without_attachment_panics() {
        let mut graph = FrameGraph::new();
        let mut frame = graph.begin_frame::<RecordingTarget>();
        frame.add_render_pass(FgRenderPass::new("nothing"));
    }

    #[test]
    #[should_panic(expected = "references unknown image")]
    fn test_unknown_image_panics() {
        let (mut graph, swapchain) = graph_with_swapchain();
        let mut frame = graph.begin_frame::<RecordingTarget>();
        let mut pass = marker_render_pass("forward", swapchain);
        pass.read_images(&[FgImageId::new(42)]);
        frame.add_render_pass(pass);
    }

    #[test]
    #[should_panic(expected = "references unknown buffer")]
    fn test_unknown_buffer_panics() {
        let mut graph = FrameGraph::new();
        let mut frame = graph.begin_frame::<RecordingTarget>();
        let mut pass = FgComputePass::new("cull");
        pass.read_buffer(FgBufferId::new(3), vk::PipelineStageFlags2::COMPUTE_SHADER);
        frame.add_compute_pass(pass);
    }

    #[test]
    fn test_last_role_wins() {
        let (mut graph, swapchain) = graph_with_swapchain();
        let x = graph.import_image("x", color_desc(1, 64, 64));
        let x_image = image_of(&graph, x);

        let executor = {
            let mut frame = graph.begin_frame();
            let mut pass = marker_render_pass("forward", swapchain);
            pass.read_images(&[x]).write_images(&[x]);
            frame.add_render_pass(pass);
            frame.build()
        };

        let x_barriers: Vec<_> =
            executor.pass_barriers(0).image_barriers().iter().filter(|b| b.image == x_image).collect();
        assert_eq!(x_barriers.len(), 1);
        assert_eq!(x_barriers[0].dst.layout, vk::ImageLayout::GENERAL);
        assert_eq!(x_barriers[0].dst.access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
    }

    #[test]
    fn test_reconfigured_attachments_only_last_applies() {
        let mut graph = FrameGraph::new();
        let a = graph.import_image("a", color_desc(1, 64, 64));
        let b = graph.import_image("b", color_desc(2, 64, 64));
        let b_image = image_of(&graph, b);

        let executor = {
            let mut frame = graph.begin_frame::<RecordingTarget>();
            let mut pass = FgRenderPass::new("forward");
            pass.set_color_attachments(vec![FgColorAttachment::clear(a, [0.0; 4])]);
            pass.set_color_attachments(vec![FgColorAttachment::clear(b, [0.0; 4])]);
            frame.add_render_pass(pass);
            frame.build()
        };

        let barriers = executor.pass_barriers(0).image_barriers();
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].image, b_image);
        assert_eq!(graph.resources().get_image_layout(a), vk::ImageLayout::UNDEFINED);
    }

    #[test]
    fn test_depth_attachment() {
        let mut graph = FrameGraph::new();
        let color = graph.import_image("color", color_desc(1, 128, 128));
        let depth = graph.import_image(
            "depth",
            FgImageDesc::new_2d(
                vk::Image::from_raw(2),
                vk::ImageView::from_raw(3),
                vk::Format::D32_SFLOAT,
                128,
                128,
            ),
        );

        let executor = {
            let mut frame = graph.begin_frame();
            let mut pass = marker_render_pass("forward", color);
            pass.set_depth_attachment(Some(FgDepthAttachment::clear(depth, 1.0, 0)));
            frame.add_render_pass(pass);
            frame.build()
        };

        let barriers = executor.pass_barriers(0).image_barriers();
        let depth_barrier = barriers.iter().find(|b| b.image == vk::Image::from_raw(2)).unwrap();
        assert_eq!(depth_barrier.aspect, vk::ImageAspectFlags::DEPTH);
        assert_eq!(depth_barrier.dst.layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
        assert_eq!(
            depth_barrier.dst.stage,
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS
        );

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);
        let depth_view = target.commands.iter().find_map(|command| match command {
            Recorded::BeginRendering { depth_view, .. } => Some(*depth_view),
            _ => None,
        });
        assert_eq!(depth_view, Some(Some(vk::ImageView::from_raw(3))));
    }

    #[test]
    #[should_panic(expected = "attachment extent mismatch")]
    fn test_color_depth_extent_mismatch_panics() {
        let mut graph = FrameGraph::new();
        let color = graph.import_image("color", color_desc(1, 64, 64));
        let depth = graph.import_image(
            "depth",
            FgImageDesc::new_2d(
                vk::Image::from_raw(2),
                vk::ImageView::from_raw(3),
                vk::Format::D32_SFLOAT,
                32,
                32,
            ),
        );

        let mut frame = graph.begin_frame::<RecordingTarget>();
        let mut pass = marker_render_pass("forward", color);
        pass.set_depth_attachment(Some(FgDepthAttachment::clear(depth, 1.0, 0)));
        frame.add_render_pass(pass);
    }

    #[test]
    fn test_depth_only_pass() {
        let mut graph = FrameGraph::new();
        let depth = graph.import_image(
            "shadow_map",
            FgImageDesc::new_2d(
                vk::Image::from_raw(2),
                vk::ImageView::from_raw(3),
                vk::Format::D32_SFLOAT,
                32,
                32,
            ),
        );

        let executor = {
            let mut frame = graph.begin_frame();
            let mut pass = FgRenderPass::new("shadow");
            pass.set_depth_attachment(Some(FgDepthAttachment::clear(depth, 1.0, 0)))
                .set_execute(|target: &mut RecordingTarget| target.mark("shadow"));
            frame.add_render_pass(pass);
            frame.build()
        };

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);

        assert_eq!(target.markers(), vec!["shadow"]);
        let begin = target.commands.iter().find(|command| matches!(command, Recorded::BeginRendering { .. }));
        assert_eq!(
            begin,
            Some(&Recorded::BeginRendering {
                width: 32,
                height: 32,
                color_views: vec![],
                color_layouts: vec![],
                depth_view: Some(vk::ImageView::from_raw(3)),
            })
        );
        assert_eq!(graph.resources().get_image_layout(depth), vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);
    }

    #[test]
    fn test_compute_to_render_buffer_dependency() {
        let (mut graph, swapchain) = graph_with_swapchain();
        let vertices = graph.import_buffer(
            "vertices",
            vk::Buffer::from_raw(9),
            256,
            4096,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::VERTEX_BUFFER,
        );
        let noise = graph.import_image("noise", color_desc(5, 32, 32));

        let executor = {
            let mut frame = graph.begin_frame();
            let mut skin = marker_compute_pass("skin");
            skin.write_buffer(vertices, vk::PipelineStageFlags2::COMPUTE_SHADER)
                .write_image(noise, vk::PipelineStageFlags2::COMPUTE_SHADER);
            frame.add_compute_pass(skin);

            let mut draw = marker_render_pass("draw", swapchain);
            draw.read_buffers(&[(vertices, vk::PipelineStageFlags2::VERTEX_INPUT)]);
            frame.add_render_pass(draw);
            frame.build()
        };

        let skin = executor.pass_barriers(0);
        assert_eq!(skin.image_barriers().len(), 1);
        assert_eq!(skin.image_barriers()[0].dst.layout, vk::ImageLayout::GENERAL);
        assert_eq!(skin.buffer_barriers().len(), 1);
        assert_eq!(skin.buffer_barriers()[0].dst.access, vk::AccessFlags2::SHADER_STORAGE_WRITE);

        let draw = executor.pass_barriers(1).buffer_barriers();
        assert_eq!(draw.len(), 1);
        assert_eq!(draw[0].buffer, vk::Buffer::from_raw(9));
        assert_eq!(draw[0].offset, 256);
        assert_eq!(draw[0].size, 4096);
        assert_eq!(draw[0].src.stage, vk::PipelineStageFlags2::COMPUTE_SHADER);
        assert_eq!(draw[0].src.access, vk::AccessFlags2::SHADER_STORAGE_WRITE);
        assert_eq!(draw[0].dst.stage, vk::PipelineStageFlags2::VERTEX_INPUT);
        assert_eq!(draw[0].dst.access, vk::AccessFlags2::VERTEX_ATTRIBUTE_READ | vk::AccessFlags2::INDEX_READ);
    }

    #[test]
    fn test_explicit_buffer_access() {
        let mut graph = FrameGraph::new();
        let args = graph.import_buffer("args", vk::Buffer::from_raw(4), 0, 64, vk::BufferUsageFlags::INDIRECT_BUFFER);

        let executor = {
            let mut frame = graph.begin_frame::<RecordingTarget>();
            let mut pass = FgComputePass::new("dispatch");
            pass.set_buffers(vec![
                FgBufferUsage::read(args, vk::PipelineStageFlags2::DRAW_INDIRECT)
                    .with_access(vk::AccessFlags2::INDIRECT_COMMAND_READ | vk::AccessFlags2::SHADER_STORAGE_READ),
            ]);
            frame.add_compute_pass(pass);
            frame.build()
        };

        let barriers = executor.pass_barriers(0).buffer_barriers();
        assert_eq!(barriers.len(), 1);
        assert_eq!(
            barriers[0].dst.access,
            vk::AccessFlags2::INDIRECT_COMMAND_READ | vk::AccessFlags2::SHADER_STORAGE_READ
        );
    }

    #[test]
    fn test_compute_image_usages() {
        let mut graph = FrameGraph::new();
        let input = graph.import_image("input", color_desc(1, 64, 64));
        let output = graph.import_image("output", color_desc(2, 64, 64));

        let executor = {
            let mut frame = graph.begin_frame::<RecordingTarget>();
            let mut blur = FgComputePass::new("blur");
            blur.set_images(vec![
                FgImageUsage::read(input, vk::PipelineStageFlags2::COMPUTE_SHADER),
                FgImageUsage::write(output, vk::PipelineStageFlags2::COMPUTE_SHADER),
            ]);
            frame.add_compute_pass(blur);
            frame.build()
        };

        let barriers = executor.pass_barriers(0).image_barriers();
        assert_eq!(barriers.len(), 2);
        assert_eq!(barriers[0].image, vk::Image::from_raw(1));
        assert_eq!(barriers[0].dst.layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);
        assert_eq!(barriers[1].image, vk::Image::from_raw(2));
        assert_eq!(barriers[1].dst.layout, vk::ImageLayout::GENERAL);
    }

    #[test]
    fn test_compute_read_image_twice_keeps_last() {
        let mut graph = FrameGraph::new();
        let first = graph.import_image("first", color_desc(1, 64, 64));
        let second = graph.import_image("second", color_desc(2, 64, 64));

        let executor = {
            let mut frame = graph.begin_frame::<RecordingTarget>();
            let mut blur = FgComputePass::new("blur");
            blur.read_image(first, vk::PipelineStageFlags2::COMPUTE_SHADER)
                .read_image(second, vk::PipelineStageFlags2::COMPUTE_SHADER);
            frame.add_compute_pass(blur);
            frame.build()
        };

        let barriers = executor.pass_barriers(0).image_barriers();
        assert_eq!(barriers.len(), 1);
        assert_eq!(barriers[0].image, vk::Image::from_raw(2));
        assert_eq!(graph.resources().get_image_layout(first), vk::ImageLayout::UNDEFINED);
    }

    #[test]
    fn test_layout_persists_across_frames() {
        let mut graph = FrameGraph::new();
        let x = graph.import_image("x", color_desc(1, 64, 64));

        for frame_index in 0..2 {
            let executor = {
                let mut frame = graph.begin_frame();
                frame.add_render_pass(marker_render_pass("forward", x));
                frame.build()
            };

            let barrier = executor.pass_barriers(0).image_barriers()[0];
            if frame_index == 0 {
                assert_eq!(barrier.src.layout, vk::ImageLayout::UNDEFINED);
            } else {
                assert_eq!(barrier.src.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
                assert!(!barrier.is_layout_transition());
            }
            assert_eq!(graph.resources().get_image_layout(x), vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        }
    }

    #[test]
    fn test_swapchain_reimported_each_frame() {
        let (mut graph, swapchain) = graph_with_swapchain();
        for raw in [200, 201] {
            let id = graph.import_swapchain_image(
                color_desc(raw, 800, 600).with_layouts(vk::ImageLayout::UNDEFINED, vk::ImageLayout::PRESENT_SRC_KHR),
            );
            assert_eq!(id, swapchain);
            assert_eq!(graph.swapchain_image_id(), swapchain);

            let executor = {
                let mut frame = graph.begin_frame();
                let present = frame.resources().swapchain_image_id();
                frame.add_render_pass(marker_render_pass("present", present));
                frame.build()
            };
            let first = executor.pass_barriers(0).image_barriers()[0];
            assert_eq!(first.image, vk::Image::from_raw(raw));
            assert_eq!(first.src.layout, vk::ImageLayout::UNDEFINED);
        }
    }

    #[test]
    fn test_labels_disabled() {
        let mut graph = FrameGraph::with_config(FrameGraphConfig {
            debug_labels: false,
            ..Default::default()
        });
        let x = graph.import_image("x", color_desc(1, 64, 64));

        let executor = {
            let mut frame = graph.begin_frame();
            frame.add_render_pass(marker_render_pass("forward", x));
            frame.add_compute_pass(marker_compute_pass("post"));
            frame.build()
        };

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);
        assert!(
            target.commands.iter().all(|c| !matches!(c, Recorded::BeginLabel(_) | Recorded::EndLabel))
        );
        assert_eq!(target.markers(), vec!["forward", "post"]);
    }

    #[test]
    fn test_compute_pass_wrapped_in_label() {
        let mut graph = FrameGraph::new();
        let executor = {
            let mut frame = graph.begin_frame();
            frame.add_compute_pass(marker_compute_pass("cull"));
            frame.build()
        };

        let mut target = RecordingTarget::default();
        executor.execute(&mut target);
        assert_eq!(
            target.commands,
            vec![
                Recorded::BeginLabel("cull".to_string()),
                Recorded::Marker("cull".to_string()),
                Recorded::EndLabel,
            ]
        );
    }

    #[test]
    fn test_print_execution_plan_on_build() {
        let (mut graph, swapchain) = graph_with_swapchain();
        graph.set_config(FrameGraphConfig {
            log_execution_plan: true,
            ..Default::default()
        });
        let x = graph.import_image("x", color_desc(1, 800, 600));

        let executor = {
            let mut frame = graph.begin_frame();
            frame.add_render_pass(marker_render_pass("a", x));
            let mut b = marker_render_pass("b", swapchain);
            b.read_images(&[x]);
            frame.add_render_pass(b);
            frame.build()
        };
        assert_eq!(executor.pass_count(), 2);
        assert_eq!(executor.barrier_count(), 4);
    }

    #[test]
    fn test_resolve_last_role() {
        let resolved = resolve_last_role([(1, 'a'), (2, 'b'), (1, 'c')]);
        assert_eq!(resolved, vec![(1, 'c'), (2, 'b')]);
    }
}
