//! Render targets and the registry that orders them.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use vesper_core::alloc::{SlotArena, SlotId};

use crate::depth_buffer::{DepthBufferId, DepthFormat, PoolId};
use crate::error::{RenderSystemError, RenderSystemResult};

/// Number of render target priority groups.
pub const NUM_RENDERTARGET_GROUPS: u8 = 10;
/// Default group for windows.
pub const DEFAULT_RT_GROUP: u8 = 4;
/// Default group for render textures, updated before windows.
pub const REND_TO_TEX_RT_GROUP: u8 = 2;

/// Stable id of an attached render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderTargetId(pub(crate) SlotId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTargetKind {
    Window,
    Texture,
    MultiRenderTarget,
}

/// Parameters for creating a render target.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTargetDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub fsaa: u8,
    pub fsaa_hint: String,
    pub priority: u8,
    pub depth_pool: PoolId,
    pub depth_format: DepthFormat,
    pub prefers_depth_texture: bool,
    pub fullscreen: bool,
}

impl RenderTargetDesc {
    pub fn window(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            fsaa: 0,
            fsaa_hint: String::new(),
            priority: DEFAULT_RT_GROUP,
            depth_pool: PoolId::DEFAULT,
            depth_format: DepthFormat::default(),
            prefers_depth_texture: false,
            fullscreen: false,
        }
    }

    pub fn texture(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            priority: REND_TO_TEX_RT_GROUP,
            ..Self::window(name, width, height)
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_fsaa(mut self, fsaa: u8, hint: impl Into<String>) -> Self {
        self.fsaa = fsaa;
        self.fsaa_hint = hint.into();
        self
    }

    pub fn with_depth_pool(mut self, pool: PoolId) -> Self {
        self.depth_pool = pool;
        self
    }

    pub fn with_depth_format(mut self, format: DepthFormat) -> Self {
        self.depth_format = format;
        self
    }

    pub fn with_depth_texture(mut self, prefers: bool) -> Self {
        self.prefers_depth_texture = prefers;
        self
    }

    pub fn with_fullscreen(mut self, fullscreen: bool) -> Self {
        self.fullscreen = fullscreen;
        self
    }
}

/// A surface rendering can be directed at.
#[derive(Debug, Clone)]
pub struct RenderTarget {
    name: String,
    kind: RenderTargetKind,
    width: u32,
    height: u32,
    fsaa: u8,
    fsaa_hint: String,
    priority: u8,
    primary: bool,
    active: bool,
    auto_updated: bool,
    fullscreen: bool,
    depth_pool: PoolId,
    desired_depth_format: DepthFormat,
    prefers_depth_texture: bool,
    depth_buffer: Option<DepthBufferId>,
}

impl RenderTarget {
    pub fn new(kind: RenderTargetKind, desc: &RenderTargetDesc) -> Self {
        Self {
            name: desc.name.clone(),
            kind,
            width: desc.width,
            height: desc.height,
            fsaa: desc.fsaa,
            fsaa_hint: desc.fsaa_hint.clone(),
            priority: desc.priority,
            primary: false,
            active: true,
            auto_updated: true,
            fullscreen: desc.fullscreen,
            depth_pool: desc.depth_pool,
            desired_depth_format: desc.depth_format,
            prefers_depth_texture: desc.prefers_depth_texture,
            depth_buffer: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RenderTargetKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn fsaa(&self) -> u8 {
        self.fsaa
    }

    pub fn fsaa_hint(&self) -> &str {
        &self.fsaa_hint
    }

    pub fn priority(&self) -> u8 {
        self.priority
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub(crate) fn set_primary(&mut self, primary: bool) {
        self.primary = primary;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_auto_updated(&self) -> bool {
        self.auto_updated
    }

    pub fn set_auto_updated(&mut self, auto_updated: bool) {
        self.auto_updated = auto_updated;
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn depth_pool(&self) -> PoolId {
        self.depth_pool
    }

    /// Changing the pool does not detach the current buffer.
    pub fn set_depth_pool(&mut self, pool: PoolId) {
        self.depth_pool = pool;
    }

    pub fn desired_depth_format(&self) -> DepthFormat {
        self.desired_depth_format
    }

    pub fn prefers_depth_texture(&self) -> bool {
        self.prefers_depth_texture
    }

    pub fn depth_buffer(&self) -> Option<DepthBufferId> {
        self.depth_buffer
    }

    pub(crate) fn set_depth_buffer(&mut self, buffer: Option<DepthBufferId>) {
        self.depth_buffer = buffer;
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

/// Pixel rectangle of a target that rendering is clipped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub target: RenderTargetId,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// A viewport covering the whole of `target`.
    pub fn full(id: RenderTargetId, target: &RenderTarget) -> Self {
        Self {
            target: id,
            left: 0,
            top: 0,
            width: target.width(),
            height: target.height(),
        }
    }
}

/// Name-indexed, priority-ordered set of render targets.
///
/// Names are unique; both indices are updated together on attach and detach.
#[derive(Default)]
pub struct RenderTargetRegistry {
    targets: SlotArena<RenderTarget>,
    by_name: IndexMap<String, RenderTargetId>,
    by_priority: BTreeMap<u8, Vec<RenderTargetId>>,
}

impl RenderTargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if a target with this name and priority could not be attached.
    pub fn check_attachable(&self, name: &str, priority: u8) -> RenderSystemResult<()> {
        if priority >= NUM_RENDERTARGET_GROUPS {
            return Err(RenderSystemError::PriorityOutOfRange {
                name: name.to_string(),
                priority,
                max: NUM_RENDERTARGET_GROUPS,
            });
        }
        if self.by_name.contains_key(name) {
            return Err(RenderSystemError::DuplicateRenderTarget {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub fn attach(&mut self, target: RenderTarget) -> RenderSystemResult<RenderTargetId> {
        self.check_attachable(target.name(), target.priority())?;

        let name = target.name().to_string();
        let priority = target.priority();
        let id = RenderTargetId(self.targets.insert(target));
        self.by_name.insert(name, id);
        self.by_priority.entry(priority).or_default().push(id);
        Ok(id)
    }

    pub fn detach(&mut self, name: &str) -> Option<(RenderTargetId, RenderTarget)> {
        let id = self.by_name.shift_remove(name)?;
        let target = self.targets.remove(id.0)?;
        if let Some(group) = self.by_priority.get_mut(&target.priority()) {
            group.retain(|other| *other != id);
            if group.is_empty() {
                self.by_priority.remove(&target.priority());
            }
        }
        Some((id, target))
    }

    pub fn id_of(&self, name: &str) -> Option<RenderTargetId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&RenderTarget> {
        self.id_of(name).and_then(|id| self.get_by_id(id))
    }

    pub fn get_by_id(&self, id: RenderTargetId) -> Option<&RenderTarget> {
        self.targets.get(id.0)
    }

    pub fn get_by_id_mut(&mut self, id: RenderTargetId) -> Option<&mut RenderTarget> {
        self.targets.get_mut(id.0)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Ids in attach order.
    pub fn ids(&self) -> Vec<RenderTargetId> {
        self.by_name.values().copied().collect()
    }

    /// Targets from lowest to highest priority; attach order within a group.
    pub fn iter_by_priority(&self) -> impl Iterator<Item = (RenderTargetId, &RenderTarget)> {
        self.by_priority
            .values()
            .flatten()
            .filter_map(|id| self.targets.get(id.0).map(|target| (*id, target)))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(name: &str, priority: u8) -> RenderTarget {
        RenderTarget::new(
            RenderTargetKind::Texture,
            &RenderTargetDesc::texture(name, 64, 64).with_priority(priority),
        )
    }

    #[test]
    fn test_attach_and_lookup() {
        let mut registry = RenderTargetRegistry::new();
        let id = registry.attach(texture("a", 0)).unwrap();
        assert_eq!(registry.id_of("a"), Some(id));
        assert_eq!(registry.get("a").map(RenderTarget::name), Some("a"));
        assert!(registry.get("b").is_none());
    }

    #[test]
    fn test_priority_out_of_range() {
        let mut registry = RenderTargetRegistry::new();
        let err = registry.attach(texture("a", NUM_RENDERTARGET_GROUPS)).unwrap_err();
        assert!(matches!(err, RenderSystemError::PriorityOutOfRange { priority: 10, .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = RenderTargetRegistry::new();
        registry.attach(texture("a", 0)).unwrap();
        let err = registry.attach(texture("a", 1)).unwrap_err();
        assert_eq!(err, RenderSystemError::DuplicateRenderTarget { name: "a".into() });
        assert_eq!(registry.iter_by_priority().count(), 1);
    }

    #[test]
    fn test_priority_order_keeps_insertion_order() {
        let mut registry = RenderTargetRegistry::new();
        registry.attach(texture("late", 6)).unwrap();
        registry.attach(texture("first", 1)).unwrap();
        registry.attach(texture("second", 1)).unwrap();
        registry.attach(texture("early", 0)).unwrap();

        let order: Vec<_> = registry.iter_by_priority().map(|(_, t)| t.name()).collect();
        assert_eq!(order, ["early", "first", "second", "late"]);
    }

    #[test]
    fn test_detach_updates_both_indices() {
        let mut registry = RenderTargetRegistry::new();
        registry.attach(texture("a", 0)).unwrap();
        let b = registry.attach(texture("b", 0)).unwrap();

        let (id, target) = registry.detach("b").unwrap();
        assert_eq!(id, b);
        assert_eq!(target.name(), "b");
        assert!(registry.get("b").is_none());
        assert!(registry.get_by_id(b).is_none());
        assert_eq!(registry.iter_by_priority().count(), 1);
        assert!(registry.detach("b").is_none());
    }
}
