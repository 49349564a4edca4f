//! Kestrel frame graph
//!
//! 在一帧之内跟踪 GPU 资源（image / buffer）的状态，按 Pass 的声明顺序自动合成最小的
//! barrier 集合，并驱动命令录制。

pub mod frame_graph;

#[cfg(test)]
pub(crate) mod test_utils;
