//! Frame graph 资源句柄定义
//!
//! 句柄是资源表中的稠密下标，而不是指针：纹理和缓冲区会频繁地导入和移除，
//! 下标配合 free-list 复用可以让资源表保持为平坦数组，每帧的查询都是 O(1)。

use std::fmt;

/// Frame graph 内部的 Image 句柄
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FgImageId(pub(crate) u32);

impl FgImageId {
    /// 无效句柄
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// 资源在资源表中的下标
    #[inline]
    pub fn index(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for FgImageId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for FgImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() { write!(f, "FgImage({})", self.0) } else { write!(f, "FgImage(INVALID)") }
    }
}

/// Frame graph 内部的 Buffer 句柄
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FgBufferId(pub(crate) u32);

impl FgBufferId {
    /// 无效句柄
    pub const INVALID: Self = Self(u32::MAX);

    #[inline]
    pub(crate) fn new(index: u32) -> Self {
        Self(index)
    }

    /// 资源在资源表中的下标
    #[inline]
    pub fn index(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl Default for FgBufferId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Debug for FgBufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() { write!(f, "FgBuffer({})", self.0) } else { write!(f, "FgBuffer(INVALID)") }
    }
}
