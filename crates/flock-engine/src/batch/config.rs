use crate::paint::BlendMode;

/// Upper bound on elements per batch: a 16-bit index space addresses 65536
/// vertices, and every element uses 4.
pub const MAX_BATCH_SIZE: usize = 65536 / 4;

pub const DEFAULT_MAX_SIZE: usize = 15000;

/// Per-element attribute stored in a buffer group.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Attribute {
    /// Corner offsets of the quad (frame size × anchor × scale).
    Scale,
    Position,
    Rotation,
    Uvs,
    Alpha,
}

impl Attribute {
    /// Shader location order.
    pub const ALL: [Attribute; 5] = [
        Attribute::Scale,
        Attribute::Position,
        Attribute::Rotation,
        Attribute::Uvs,
        Attribute::Alpha,
    ];

    /// Floats per vertex.
    #[inline]
    pub const fn components(self) -> usize {
        match self {
            Attribute::Scale | Attribute::Position | Attribute::Uvs => 2,
            Attribute::Rotation | Attribute::Alpha => 1,
        }
    }

    #[inline]
    pub const fn shader_location(self) -> u32 {
        match self {
            Attribute::Scale => 0,
            Attribute::Position => 1,
            Attribute::Rotation => 2,
            Attribute::Uvs => 3,
            Attribute::Alpha => 4,
        }
    }
}

/// Which attributes are re-derived every frame (`true`, dynamic) versus
/// captured when a batch is (re)built (`false`, static).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BatchProperties {
    pub scale: bool,
    pub position: bool,
    pub rotation: bool,
    pub uvs: bool,
    pub alpha: bool,
}

impl Default for BatchProperties {
    fn default() -> Self {
        Self { scale: false, position: true, rotation: false, uvs: false, alpha: false }
    }
}

impl BatchProperties {
    /// All flags cleared (state after `destroy`).
    pub const NONE: Self = Self { scale: false, position: false, rotation: false, uvs: false, alpha: false };

    #[inline]
    pub fn is_dynamic(&self, attr: Attribute) -> bool {
        match attr {
            Attribute::Scale => self.scale,
            Attribute::Position => self.position,
            Attribute::Rotation => self.rotation,
            Attribute::Uvs => self.uvs,
            Attribute::Alpha => self.alpha,
        }
    }

    /// Overrides only the flags present in `selection`.
    pub fn merge(&mut self, selection: PropertySelection) {
        let PropertySelection { scale, position, rotation, uvs, alpha } = selection;
        self.scale = scale.unwrap_or(self.scale);
        self.position = position.unwrap_or(self.position);
        self.rotation = rotation.unwrap_or(self.rotation);
        self.uvs = uvs.unwrap_or(self.uvs);
        self.alpha = alpha.unwrap_or(self.alpha);
    }
}

/// Partial property selection; `None` keeps the current flag.
///
/// ```ignore
/// container.set_properties(PropertySelection::new().rotation(true).alpha(true));
/// ```
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PropertySelection {
    pub scale: Option<bool>,
    pub position: Option<bool>,
    pub rotation: Option<bool>,
    pub uvs: Option<bool>,
    pub alpha: Option<bool>,
}

impl PropertySelection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(mut self, dynamic: bool) -> Self {
        self.scale = Some(dynamic);
        self
    }

    pub fn position(mut self, dynamic: bool) -> Self {
        self.position = Some(dynamic);
        self
    }

    pub fn rotation(mut self, dynamic: bool) -> Self {
        self.rotation = Some(dynamic);
        self
    }

    pub fn uvs(mut self, dynamic: bool) -> Self {
        self.uvs = Some(dynamic);
        self
    }

    pub fn alpha(mut self, dynamic: bool) -> Self {
        self.alpha = Some(dynamic);
        self
    }
}

/// Batch container construction parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Maximum number of elements rendered.
    pub max_size: usize,
    /// Requested elements per buffer group; see [`effective_batch_size`](Self::effective_batch_size).
    pub batch_size: usize,
    pub properties: PropertySelection,
    pub blend_mode: BlendMode,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            batch_size: MAX_BATCH_SIZE,
            properties: PropertySelection::default(),
            blend_mode: BlendMode::Normal,
        }
    }
}

impl BatchConfig {
    /// `batch_size` clamped to [`MAX_BATCH_SIZE`], then to `max_size`, and never below 1.
    pub fn effective_batch_size(&self) -> usize {
        self.batch_size.min(MAX_BATCH_SIZE).min(self.max_size).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_clamps_to_index_ceiling() {
        let cfg = BatchConfig { max_size: 100_000, batch_size: 50_000, ..BatchConfig::default() };
        assert_eq!(cfg.effective_batch_size(), 16384);
    }

    #[test]
    fn batch_size_clamps_to_max_size() {
        let cfg = BatchConfig { max_size: 10, batch_size: 20, ..BatchConfig::default() };
        assert_eq!(cfg.effective_batch_size(), 10);
    }

    #[test]
    fn default_batch_size_is_max_size() {
        assert_eq!(BatchConfig::default().effective_batch_size(), DEFAULT_MAX_SIZE);
    }

    #[test]
    fn merge_leaves_omitted_flags_alone() {
        let mut props = BatchProperties { rotation: true, ..BatchProperties::default() };
        props.merge(PropertySelection::new().scale(true));
        assert_eq!(
            props,
            BatchProperties { scale: true, position: true, rotation: true, uvs: false, alpha: false }
        );
    }

    #[test]
    fn merge_can_turn_position_static() {
        let mut props = BatchProperties::default();
        props.merge(PropertySelection::new().position(false));
        assert!(!props.position);
    }
}
