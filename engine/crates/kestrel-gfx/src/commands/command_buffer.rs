use std::ffi::CString;

use ash::vk;
use itertools::Itertools;

use crate::commands::barrier::{GfxBufferBarrier, GfxImageBarrier};

/// 对 `vk::CommandBuffer` 的封装
///
/// 只负责录制命令，不负责分配和释放；command buffer 的生命周期由外部的 command pool 管理。
/// 显式持有 `ash::Device`，避免依赖全局单例。
pub struct GfxCommandBuffer {
    vk_handle: vk::CommandBuffer,
    device: ash::Device,

    /// 未开启 `VK_EXT_debug_utils` 时为 None，此时 label 相关命令是空操作
    debug_utils: Option<ash::ext::debug_utils::Device>,
}

// new & init
impl GfxCommandBuffer {
    pub fn new(
        device: ash::Device,
        vk_handle: vk::CommandBuffer,
        debug_utils: Option<ash::ext::debug_utils::Device>,
    ) -> Self {
        Self {
            vk_handle,
            device,
            debug_utils,
        }
    }
}

// 绘制相关命令
impl GfxCommandBuffer {
    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_begin_rendering(&self, render_info: &vk::RenderingInfo) {
        unsafe {
            self.device.cmd_begin_rendering(self.vk_handle, render_info);
        }
    }

    /// - command type: action, state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_end_rendering(&self) {
        unsafe {
            self.device.cmd_end_rendering(self.vk_handle);
        }
    }

    /// - command type: state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_set_viewport(&self, first_viewport: u32, viewports: &[vk::Viewport]) {
        unsafe {
            self.device.cmd_set_viewport(self.vk_handle, first_viewport, viewports);
        }
    }

    /// - command type: state
    /// - supported queue types: graphics
    #[inline]
    pub fn cmd_set_scissor(&self, first_scissor: u32, scissors: &[vk::Rect2D]) {
        unsafe {
            self.device.cmd_set_scissor(self.vk_handle, first_scissor, scissors);
        }
    }
}

// 同步相关命令
impl GfxCommandBuffer {
    /// 将 image barrier 和 buffer barrier 合并进同一个 `vkCmdPipelineBarrier2`
    ///
    /// - command type: synchronize
    /// - supported queue types: graphics, compute, transfer
    pub fn pipeline_barrier(
        &self,
        dependency_flags: vk::DependencyFlags,
        image_barriers: &[GfxImageBarrier],
        buffer_barriers: &[GfxBufferBarrier],
    ) {
        if image_barriers.is_empty() && buffer_barriers.is_empty() {
            return;
        }

        let image_barriers = image_barriers.iter().map(|b| *b.inner()).collect_vec();
        let buffer_barriers = buffer_barriers.iter().map(|b| *b.inner()).collect_vec();
        let dependency_info = vk::DependencyInfo::default()
            .image_memory_barriers(&image_barriers)
            .buffer_memory_barriers(&buffer_barriers)
            .dependency_flags(dependency_flags);
        unsafe {
            self.device.cmd_pipeline_barrier2(self.vk_handle, &dependency_info);
        }
    }
}

// debug 相关命令
impl GfxCommandBuffer {
    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn begin_label(&self, label_name: &str, label_color: glam::Vec4) {
        let Some(debug_utils) = &self.debug_utils else {
            return;
        };
        let name = CString::new(label_name).unwrap_or_else(|_| {
            log::warn!("debug label {:?} contains a NUL byte", label_name);
            CString::default()
        });
        unsafe {
            debug_utils.cmd_begin_debug_utils_label(
                self.vk_handle,
                &vk::DebugUtilsLabelEXT::default().label_name(name.as_c_str()).color(label_color.into()),
            );
        }
    }

    /// - command type: state, action
    /// - supported queue type: graphics, compute
    #[inline]
    pub fn end_label(&self) {
        if let Some(debug_utils) = &self.debug_utils {
            unsafe {
                debug_utils.cmd_end_debug_utils_label(self.vk_handle);
            }
        }
    }
}
