/// debug label 使用的颜色
pub struct LabelColor;
impl LabelColor {
    const BLUE: glam::Vec4 = glam::vec4(0.0, 0.0, 1.0, 1.0);
    const MAGENTA: glam::Vec4 = glam::vec4(1.0, 0.0, 1.0, 1.0);

    /// 光栅化 Pass
    pub const COLOR_PASS: glam::Vec4 = Self::BLUE;
    /// 计算 Pass
    pub const COLOR_COMPUTE: glam::Vec4 = Self::MAGENTA;
}
