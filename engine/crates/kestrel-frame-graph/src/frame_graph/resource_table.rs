//! 资源表
//!
//! 记录所有导入 frame graph 的 image / buffer 的当前状态。
//! frame graph 只跟踪状态、生成 layout 转换，从不分配或释放 GPU 内存：
//! 底层的 `vk::Image` / `vk::Buffer` 归导入它的外部模块所有。

use ash::vk;

use super::handle::{FgBufferId, FgImageId};

/// swapchain image 固定占用的槽位
pub(crate) const SWAPCHAIN_IMAGE_SLOT: u32 = 0;

/// 平坦数组 + free-list
///
/// 下标即句柄。前 `reserved` 个槽位只能通过 [`FgSlots::set`] 写入，
/// 不参与分配，移除后也不会进入 free-list。
#[derive(Debug)]
pub(crate) struct FgSlots<T> {
    entries: Vec<Option<T>>,
    free_list: Vec<u32>,
    reserved: u32,
}

impl<T> FgSlots<T> {
    pub fn with_reserved(reserved: u32) -> Self {
        let mut entries = Vec::with_capacity(reserved as usize);
        entries.resize_with(reserved as usize, || None);
        Self {
            entries,
            free_list: Vec::new(),
            reserved,
        }
    }

    /// 插入新条目，优先复用 free-list 中的下标
    pub fn insert(&mut self, value: T) -> u32 {
        if let Some(index) = self.free_list.pop() {
            self.entries[index as usize] = Some(value);
            return index;
        }

        let index = u32::try_from(self.entries.len())
            .ok()
            .filter(|index| *index != u32::MAX)
            .unwrap_or_else(|| panic!("FrameGraph: resource table is full"));
        self.entries.push(Some(value));
        index
    }

    /// 直接写入指定的保留槽位
    pub fn set(&mut self, index: u32, value: T) {
        assert!(index < self.reserved, "FrameGraph: slot {} is not a reserved slot", index);
        self.entries[index as usize] = Some(value);
    }

    pub fn remove(&mut self, index: u32) -> Option<T> {
        let value = self.entries.get_mut(index as usize)?.take()?;
        if index >= self.reserved {
            self.free_list.push(index);
        }
        Some(value)
    }

    #[inline]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.entries.get(index as usize)?.as_ref()
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.entries.get_mut(index as usize)?.as_mut()
    }

    /// 槽位总数（包括空槽位），可用于按下标分配平行数组
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.entries.iter().enumerate().filter_map(|(index, entry)| entry.as_ref().map(|e| (index as u32, e)))
    }
}

/// 图像导入描述
#[derive(Clone, Copy, Debug)]
pub struct FgImageDesc {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub extent: vk::Extent3D,
    /// 导入时图像所处的 layout
    pub current_layout: vk::ImageLayout,
    /// 帧结束时需要转换到的 layout；`UNDEFINED` 表示不关心
    pub final_layout: vk::ImageLayout,
}

impl FgImageDesc {
    /// 2D 图像描述，初始 layout 为 `UNDEFINED`，不要求帧末 layout
    pub fn new_2d(image: vk::Image, view: vk::ImageView, format: vk::Format, width: u32, height: u32) -> Self {
        Self {
            image,
            view,
            format,
            usage: vk::ImageUsageFlags::empty(),
            extent: vk::Extent3D { width, height, depth: 1 },
            current_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::UNDEFINED,
        }
    }

    #[inline]
    pub fn with_usage(mut self, usage: vk::ImageUsageFlags) -> Self {
        self.usage = usage;
        self
    }

    #[inline]
    pub fn with_layouts(mut self, current_layout: vk::ImageLayout, final_layout: vk::ImageLayout) -> Self {
        self.current_layout = current_layout;
        self.final_layout = final_layout;
        self
    }
}

/// 图像资源条目
#[derive(Clone, Debug)]
pub struct FgImageEntry {
    /// 调试名称
    pub name: String,
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub usage: vk::ImageUsageFlags,
    pub extent: vk::Extent3D,
    /// 持久化的 layout，每次 build 之后更新为帧末的 layout
    pub current_layout: vk::ImageLayout,
    pub final_layout: vk::ImageLayout,
}

impl FgImageEntry {
    fn new(name: String, desc: FgImageDesc) -> Self {
        Self {
            name,
            image: desc.image,
            view: desc.view,
            format: desc.format,
            usage: desc.usage,
            extent: desc.extent,
            current_layout: desc.current_layout,
            final_layout: desc.final_layout,
        }
    }

    /// 根据格式推断 aspect flags
    #[inline]
    pub fn aspect(&self) -> vk::ImageAspectFlags {
        infer_aspect(self.format)
    }

    /// 是否声明了帧末 layout
    #[inline]
    pub fn has_final_layout(&self) -> bool {
        self.final_layout != vk::ImageLayout::UNDEFINED
    }
}

/// 从格式推断 aspect
pub fn infer_aspect(format: vk::Format) -> vk::ImageAspectFlags {
    match format {
        vk::Format::D16_UNORM | vk::Format::D32_SFLOAT | vk::Format::X8_D24_UNORM_PACK32 => {
            vk::ImageAspectFlags::DEPTH
        }
        vk::Format::S8_UINT => vk::ImageAspectFlags::STENCIL,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT => {
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        }
        _ => vk::ImageAspectFlags::COLOR,
    }
}

/// 缓冲区资源条目
#[derive(Clone, Debug)]
pub struct FgBufferEntry {
    /// 调试名称
    pub name: String,
    pub buffer: vk::Buffer,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
    pub usage: vk::BufferUsageFlags,
}

/// 资源表
///
/// 所有查询都是 O(1) 的数组下标访问。查询不存在的句柄会直接 panic：
/// 静默返回空句柄只会让错误在 GPU 命令流里以更难排查的形式出现。
#[derive(Debug)]
pub struct FgResourceTable {
    images: FgSlots<FgImageEntry>,
    buffers: FgSlots<FgBufferEntry>,
}

impl Default for FgResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

// new & init
impl FgResourceTable {
    pub fn new() -> Self {
        Self {
            images: FgSlots::with_reserved(SWAPCHAIN_IMAGE_SLOT + 1),
            buffers: FgSlots::with_reserved(0),
        }
    }
}

// import & remove
impl FgResourceTable {
    /// 导入外部图像
    pub fn import_image(&mut self, name: impl Into<String>, desc: FgImageDesc) -> FgImageId {
        let name = name.into();
        let id = FgImageId::new(self.images.insert(FgImageEntry::new(name, desc)));
        log::debug!("FrameGraph: import image {:?} \"{}\"", id, self.image_entry(id).name);
        id
    }

    /// 导入 swapchain image，固定占用 0 号槽位；每帧导入时覆盖上一帧的条目
    pub fn import_swapchain_image(&mut self, desc: FgImageDesc) -> FgImageId {
        self.images.set(SWAPCHAIN_IMAGE_SLOT, FgImageEntry::new("swapchain".to_string(), desc));
        FgImageId::new(SWAPCHAIN_IMAGE_SLOT)
    }

    /// 导入外部缓冲区
    pub fn import_buffer(
        &mut self,
        name: impl Into<String>,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> FgBufferId {
        let entry = FgBufferEntry {
            name: name.into(),
            buffer,
            offset,
            size,
            usage,
        };
        let id = FgBufferId::new(self.buffers.insert(entry));
        log::debug!("FrameGraph: import buffer {:?} \"{}\"", id, self.buffer_entry(id).name);
        id
    }

    /// 移除图像，句柄回到 free-list
    pub fn remove_image(&mut self, id: FgImageId) {
        if self.images.remove(id.0).is_none() {
            panic!("FrameGraph: remove unknown image {:?}", id);
        }
    }

    /// 移除缓冲区，句柄回到 free-list
    pub fn remove_buffer(&mut self, id: FgBufferId) {
        if self.buffers.remove(id.0).is_none() {
            panic!("FrameGraph: remove unknown buffer {:?}", id);
        }
    }
}

// getters
impl FgResourceTable {
    #[inline]
    pub fn contains_image(&self, id: FgImageId) -> bool {
        self.images.get(id.0).is_some()
    }

    #[inline]
    pub fn contains_buffer(&self, id: FgBufferId) -> bool {
        self.buffers.get(id.0).is_some()
    }

    #[inline]
    pub fn image_entry(&self, id: FgImageId) -> &FgImageEntry {
        self.images.get(id.0).unwrap_or_else(|| panic!("FrameGraph: unknown image {:?}", id))
    }

    #[inline]
    pub(crate) fn image_entry_mut(&mut self, id: FgImageId) -> &mut FgImageEntry {
        self.images.get_mut(id.0).unwrap_or_else(|| panic!("FrameGraph: unknown image {:?}", id))
    }

    #[inline]
    pub fn buffer_entry(&self, id: FgBufferId) -> &FgBufferEntry {
        self.buffers.get(id.0).unwrap_or_else(|| panic!("FrameGraph: unknown buffer {:?}", id))
    }

    #[inline]
    pub fn get_image(&self, id: FgImageId) -> vk::Image {
        self.image_entry(id).image
    }

    #[inline]
    pub fn get_image_view(&self, id: FgImageId) -> vk::ImageView {
        self.image_entry(id).view
    }

    #[inline]
    pub fn get_image_format(&self, id: FgImageId) -> vk::Format {
        self.image_entry(id).format
    }

    #[inline]
    pub fn get_image_extent(&self, id: FgImageId) -> vk::Extent3D {
        self.image_entry(id).extent
    }

    #[inline]
    pub fn get_image_layout(&self, id: FgImageId) -> vk::ImageLayout {
        self.image_entry(id).current_layout
    }

    #[inline]
    pub fn get_image_usage(&self, id: FgImageId) -> vk::ImageUsageFlags {
        self.image_entry(id).usage
    }

    #[inline]
    pub fn get_buffer(&self, id: FgBufferId) -> vk::Buffer {
        self.buffer_entry(id).buffer
    }

    #[inline]
    pub fn get_buffer_offset(&self, id: FgBufferId) -> vk::DeviceSize {
        self.buffer_entry(id).offset
    }

    #[inline]
    pub fn get_buffer_size(&self, id: FgBufferId) -> vk::DeviceSize {
        self.buffer_entry(id).size
    }

    #[inline]
    pub fn get_buffer_usage(&self, id: FgBufferId) -> vk::BufferUsageFlags {
        self.buffer_entry(id).usage
    }

    /// swapchain image 的句柄；本帧尚未导入 swapchain image 时 panic
    pub fn swapchain_image_id(&self) -> FgImageId {
        let id = FgImageId::new(SWAPCHAIN_IMAGE_SLOT);
        assert!(self.contains_image(id), "FrameGraph: swapchain image has not been imported");
        id
    }

    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    #[inline]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    #[inline]
    pub(crate) fn image_slot_count(&self) -> usize {
        self.images.capacity()
    }

    #[inline]
    pub(crate) fn buffer_slot_count(&self) -> usize {
        self.buffers.capacity()
    }

    pub fn iter_images(&self) -> impl Iterator<Item = (FgImageId, &FgImageEntry)> {
        self.images.iter().map(|(index, entry)| (FgImageId::new(index), entry))
    }

    pub fn iter_buffers(&self) -> impl Iterator<Item = (FgBufferId, &FgBufferEntry)> {
        self.buffers.iter().map(|(index, entry)| (FgBufferId::new(index), entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    #[test]
    fn test_import_and_query_image() {
        let mut table = FgResourceTable::new();
        let id = table.import_image(
            "albedo",
            color_desc(1, 640, 480).with_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED),
        );

        assert_eq!(table.get_image(id).as_raw(), 1);
        assert_eq!(table.get_image_usage(id), vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED);
        assert_eq!(table.get_image_view(id).as_raw(), 1001);
        assert_eq!(table.get_image_format(id), vk::Format::R8G8B8A8_UNORM);
        assert_eq!(table.get_image_extent(id).width, 640);
        assert_eq!(table.get_image_extent(id).height, 480);
        assert_eq!(table.image_entry(id).aspect(), vk::ImageAspectFlags::COLOR);
    }

    #[test]
    fn test_regular_import_skips_swapchain_slot() {
        let mut table = FgResourceTable::new();
        let id = table.import_image("albedo", color_desc(1, 4, 4));
        assert_ne!(id.index(), SWAPCHAIN_IMAGE_SLOT);
    }

    #[test]
    fn test_removed_id_is_reused() {
        let mut table = FgResourceTable::new();
        let a = table.import_image("a", color_desc(1, 4, 4));
        let b = table.import_image("b", color_desc(2, 4, 4));
        assert_ne!(a, b);

        table.remove_image(a);
        assert!(!table.contains_image(a));

        let c = table.import_image("c", color_desc(3, 4, 4));
        assert_eq!(c, a);
        assert_eq!(table.get_image(c).as_raw(), 3);
        assert_eq!(table.image_count(), 2);
    }

    #[test]
    fn test_import_and_query_buffer() {
        let mut table = FgResourceTable::new();
        let id = table.import_buffer("instances", vk::Buffer::from_raw(9), 128, 1024, vk::BufferUsageFlags::STORAGE_BUFFER);

        assert_eq!(table.get_buffer(id).as_raw(), 9);
        assert_eq!(table.get_buffer_offset(id), 128);
        assert_eq!(table.get_buffer_size(id), 1024);
        assert_eq!(table.get_buffer_usage(id), vk::BufferUsageFlags::STORAGE_BUFFER);

        table.remove_buffer(id);
        let reused = table.import_buffer("other", vk::Buffer::from_raw(10), 0, 16, vk::BufferUsageFlags::UNIFORM_BUFFER);
        assert_eq!(reused, id);
        assert_eq!(table.get_buffer_usage(reused), vk::BufferUsageFlags::UNIFORM_BUFFER);
    }

    #[test]
    fn test_swapchain_slot_is_overwritten() {
        let mut table = FgResourceTable::new();
        let first = table.import_swapchain_image(color_desc(50, 800, 600));
        let second = table.import_swapchain_image(color_desc(51, 1024, 768));

        assert_eq!(first, second);
        assert_eq!(table.swapchain_image_id(), first);
        assert_eq!(table.get_image(first).as_raw(), 51);
        assert_eq!(table.get_image_extent(first).width, 1024);
    }

    #[test]
    fn test_removed_swapchain_slot_is_not_reused() {
        let mut table = FgResourceTable::new();
        let swapchain = table.import_swapchain_image(color_desc(50, 800, 600));
        table.remove_image(swapchain);

        let id = table.import_image("albedo", color_desc(1, 4, 4));
        assert_ne!(id, swapchain);
    }

    #[test]
    #[should_panic(expected = "unknown image")]
    fn test_query_removed_image_panics() {
        let mut table = FgResourceTable::new();
        let id = table.import_image("a", color_desc(1, 4, 4));
        table.remove_image(id);
        table.get_image(id);
    }

    #[test]
    #[should_panic(expected = "unknown buffer")]
    fn test_query_invalid_buffer_panics() {
        let table = FgResourceTable::new();
        table.get_buffer_size(FgBufferId::INVALID);
    }

    #[test]
    #[should_panic(expected = "swapchain image has not been imported")]
    fn test_swapchain_before_import_panics() {
        let table = FgResourceTable::new();
        table.swapchain_image_id();
    }

    #[test]
    fn test_infer_aspect() {
        assert_eq!(infer_aspect(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(
            infer_aspect(vk::Format::D24_UNORM_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(infer_aspect(vk::Format::B8G8R8A8_SRGB), vk::ImageAspectFlags::COLOR);
    }
}
