//! Kestrel GFX 层
//!
//! 对 Vulkan 命令录制做一层薄封装：barrier 构建器、命令缓冲区、debug label 颜色。
//! 不持有任何全局单例，`ash::Device` 由调用方显式传入。

pub mod basic {
    pub mod color;
}

pub mod commands {
    pub mod barrier;
    pub mod command_buffer;
}
