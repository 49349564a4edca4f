//! 资源状态跟踪
//!
//! 每次 build 创建一个新的 tracker，记录每个资源最近一次 barrier 之后的
//! `{layout, stage, access}`。目标状态与当前状态完全相同时不生成 barrier，
//! 这就是"最小 barrier"的来源：冗余的同步永远不会被提交。

use super::barrier::FgBarrierMerger;
use super::handle::{FgBufferId, FgImageId};
use super::resource_state::{FgBufferState, FgImageState};
use super::resource_table::FgResourceTable;

/// build 期间的资源状态表，与资源表按相同下标对齐
pub struct FgResourceTracker {
    images: Vec<Option<FgImageState>>,
    buffers: Vec<Option<FgBufferState>>,
}

impl FgResourceTracker {
    /// 用资源表中持久化的 layout 初始化，stage 为 TOP_OF_PIPE，access 为空
    pub fn seed(table: &FgResourceTable) -> Self {
        let mut images = vec![None; table.image_slot_count()];
        for (id, entry) in table.iter_images() {
            images[id.index() as usize] = Some(FgImageState {
                layout: entry.current_layout,
                ..FgImageState::UNDEFINED
            });
        }

        let mut buffers = vec![None; table.buffer_slot_count()];
        for (id, _) in table.iter_buffers() {
            buffers[id.index() as usize] = Some(FgBufferState::UNDEFINED);
        }

        Self { images, buffers }
    }

    #[inline]
    pub fn image_state(&self, id: FgImageId) -> FgImageState {
        self.images
            .get(id.index() as usize)
            .copied()
            .flatten()
            .unwrap_or_else(|| panic!("FrameGraph: image {:?} is not tracked", id))
    }

    #[inline]
    pub fn buffer_state(&self, id: FgBufferId) -> FgBufferState {
        self.buffers
            .get(id.index() as usize)
            .copied()
            .flatten()
            .unwrap_or_else(|| panic!("FrameGraph: buffer {:?} is not tracked", id))
    }

    /// 把图像转换到 `dst`，状态变化时向 `merger` 放入一个 barrier
    ///
    /// 返回是否生成了 barrier。
    pub fn transition_image(
        &mut self,
        table: &FgResourceTable,
        id: FgImageId,
        dst: FgImageState,
        merger: &mut FgBarrierMerger,
    ) -> bool {
        let src = self.image_state(id);
        if src == dst {
            return false;
        }

        let entry = table.image_entry(id);
        log::debug!(
            "FrameGraph: image \"{}\" {:?} -> {:?}, stage {:?} -> {:?}",
            entry.name,
            src.layout,
            dst.layout,
            src.stage,
            dst.stage
        );
        merger.put_image_barrier(entry.image, entry.aspect(), src, dst);
        self.images[id.index() as usize] = Some(dst);
        true
    }

    /// 把缓冲区转换到 `dst`，状态变化时向 `merger` 放入一个 barrier
    pub fn transition_buffer(
        &mut self,
        table: &FgResourceTable,
        id: FgBufferId,
        dst: FgBufferState,
        merger: &mut FgBarrierMerger,
    ) -> bool {
        let src = self.buffer_state(id);
        if src == dst {
            return false;
        }

        let entry = table.buffer_entry(id);
        log::debug!("FrameGraph: buffer \"{}\" stage {:?} -> {:?}", entry.name, src.stage, dst.stage);
        merger.put_buffer_barrier(entry.buffer, entry.offset, entry.size, src, dst);
        self.buffers[id.index() as usize] = Some(dst);
        true
    }

    /// 把所有声明了帧末 layout、且当前 layout 不同的图像转换过去
    pub fn converge_final_layouts(&mut self, table: &FgResourceTable, merger: &mut FgBarrierMerger) {
        for (id, entry) in table.iter_images() {
            if !entry.has_final_layout() {
                continue;
            }
            if self.image_state(id).layout == entry.final_layout {
                continue;
            }
            self.transition_image(table, id, FgImageState::final_state(entry.final_layout), merger);
        }
    }

    /// 把跟踪到的 layout 写回资源表，作为下一帧的初始 layout
    pub fn write_back(&self, table: &mut FgResourceTable) {
        for (index, state) in self.images.iter().enumerate() {
            let Some(state) = state else {
                continue;
            };
            let id = FgImageId::new(index as u32);
            if table.contains_image(id) {
                table.image_entry_mut(id).current_layout = state.layout;
            }
        }
    }
}
