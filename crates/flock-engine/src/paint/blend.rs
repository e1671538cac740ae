/// Blend mode shared by every element of a batch container (and by a ribbon mesh).
///
/// All colors are premultiplied, so every mode is expressed against
/// premultiplied source/destination values.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub enum BlendMode {
    /// Source-over.
    #[default]
    Normal,
    /// Additive (`lighter`).
    Add,
    Multiply,
    Screen,
}

impl BlendMode {
    /// Name of the equivalent canvas `globalCompositeOperation`.
    pub fn composite_name(self) -> &'static str {
        match self {
            BlendMode::Normal => "source-over",
            BlendMode::Add => "lighter",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
        }
    }

    /// Composites one premultiplied source channel over a destination channel.
    ///
    /// `sa`/`da` are the source/destination alphas. Used per channel by software
    /// raster targets; for the alpha channel pass `s == sa` and `d == da`.
    #[inline]
    pub fn composite(self, s: f32, sa: f32, d: f32, da: f32) -> f32 {
        match self {
            BlendMode::Normal => s + d * (1.0 - sa),
            BlendMode::Add => (s + d).min(1.0),
            BlendMode::Multiply => s * d + s * (1.0 - da) + d * (1.0 - sa),
            BlendMode::Screen => s + d - s * d,
        }
    }

    /// GPU blend state (premultiplied alpha).
    pub fn blend_state(self) -> wgpu::BlendState {
        let alpha = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        };
        let color = match self {
            BlendMode::Normal => alpha,
            BlendMode::Add => wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::One,
                operation: wgpu::BlendOperation::Add,
            },
            BlendMode::Multiply => wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::Dst,
                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                operation: wgpu::BlendOperation::Add,
            },
            BlendMode::Screen => wgpu::BlendComponent {
                src_factor: wgpu::BlendFactor::One,
                dst_factor: wgpu::BlendFactor::OneMinusSrc,
                operation: wgpu::BlendOperation::Add,
            },
        };
        wgpu::BlendState { color, alpha }
    }
}
