//! Pooled depth/stencil surfaces.
//!
//! A [`DepthBuffer`] lives in exactly one pool bucket, keyed by [`PoolId`].
//! Render targets in the same pool share any buffer that satisfies
//! [`DepthBuffer::is_compatible`]. Buffers in [`PoolId::NON_SHAREABLE`] are
//! destroyed as soon as their last target lets go.
//!
//! Buffers only hold target *ids*. The render system owns both sides and
//! keeps the association consistent.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use vesper_core::alloc::{SlotArena, SlotId};

use crate::target::{RenderTarget, RenderTargetId};

/// Key of a depth buffer pool bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PoolId(pub u16);

impl PoolId {
    /// The target never gets a depth buffer.
    pub const NO_DEPTH: PoolId = PoolId(0);
    /// Buffers added by hand rather than through the pool.
    pub const MANUAL_USAGE: PoolId = PoolId(0);
    pub const DEFAULT: PoolId = PoolId(1);
    /// Never shared; destroyed when the last target detaches.
    pub const NON_SHAREABLE: PoolId = PoolId(65534);
    pub const INVALID: PoolId = PoolId(65535);
}

impl Default for PoolId {
    fn default() -> Self {
        PoolId::DEFAULT
    }
}

/// Depth/stencil pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DepthFormat {
    D16Unorm,
    /// 24-bit depth with 8-bit stencil; matches any format in non-exact lookups.
    #[default]
    D24UnormS8Uint,
    D32Float,
    D32FloatS8Uint,
}

impl DepthFormat {
    pub const fn depth_bits(self) -> u16 {
        match self {
            DepthFormat::D16Unorm => 16,
            DepthFormat::D24UnormS8Uint => 24,
            DepthFormat::D32Float | DepthFormat::D32FloatS8Uint => 32,
        }
    }

    pub const fn has_stencil(self) -> bool {
        matches!(self, DepthFormat::D24UnormS8Uint | DepthFormat::D32FloatS8Uint)
    }

    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            DepthFormat::D16Unorm => wgpu::TextureFormat::Depth16Unorm,
            DepthFormat::D24UnormS8Uint => wgpu::TextureFormat::Depth24PlusStencil8,
            DepthFormat::D32Float => wgpu::TextureFormat::Depth32Float,
            DepthFormat::D32FloatS8Uint => wgpu::TextureFormat::Depth32FloatStencil8,
        }
    }
}

/// Stable id of a pooled depth buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DepthBufferId(pub(crate) SlotId);

/// What the caller must do after a target detaches from a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachOutcome {
    Keep,
    /// Last target gone from a non-shareable buffer.
    Destroy,
}

/// A depth/stencil surface and the targets currently using it.
#[derive(Debug, Clone)]
pub struct DepthBuffer {
    pool_id: PoolId,
    bit_depth: u16,
    width: u32,
    height: u32,
    fsaa: u8,
    fsaa_hint: String,
    format: DepthFormat,
    depth_texture: bool,
    manual: bool,
    attached: IndexSet<RenderTargetId>,
}

impl DepthBuffer {
    pub fn new(width: u32, height: u32, format: DepthFormat) -> Self {
        Self {
            pool_id: PoolId::DEFAULT,
            bit_depth: format.depth_bits(),
            width,
            height,
            fsaa: 0,
            fsaa_hint: String::new(),
            format,
            depth_texture: false,
            manual: false,
            attached: IndexSet::new(),
        }
    }

    /// A buffer matching `target` exactly, the usual backend factory result.
    pub fn for_target(target: &RenderTarget) -> Self {
        Self::new(target.width(), target.height(), target.desired_depth_format())
            .with_fsaa(target.fsaa(), target.fsaa_hint())
            .with_depth_texture(target.prefers_depth_texture())
    }

    pub fn with_fsaa(mut self, fsaa: u8, hint: impl Into<String>) -> Self {
        self.fsaa = fsaa;
        self.fsaa_hint = hint.into();
        self
    }

    pub fn with_depth_texture(mut self, depth_texture: bool) -> Self {
        self.depth_texture = depth_texture;
        self
    }

    pub fn with_pool_id(mut self, pool_id: PoolId) -> Self {
        self.pool_id = pool_id;
        self
    }

    pub fn with_manual(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    pub(crate) fn set_pool_id(&mut self, pool_id: PoolId) {
        self.pool_id = pool_id;
    }

    pub fn bit_depth(&self) -> u16 {
        self.bit_depth
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

    pub fn format(&self) -> DepthFormat {
        self.format
    }

    pub fn is_depth_texture(&self) -> bool {
        self.depth_texture
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    pub fn attached_targets(&self) -> impl Iterator<Item = RenderTargetId> + '_ {
        self.attached.iter().copied()
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// Whether this buffer can serve `target`.
    ///
    /// The buffer must be at least as large as the target (exactly as large
    /// when the target samples it as a texture), match its FSAA level and
    /// depth-texture preference, and have the desired format. Without
    /// `exact_format`, a default D24S8 buffer stands in for any format.
    pub fn is_compatible(&self, target: &RenderTarget, exact_format: bool) -> bool {
        let size_ok = if target.prefers_depth_texture() {
            self.width == target.width() && self.height == target.height()
        } else {
            self.width >= target.width() && self.height >= target.height()
        };

        let format_ok = self.format == target.desired_depth_format()
            || (!exact_format && self.format == DepthFormat::D24UnormS8Uint);

        size_ok
            && self.fsaa == target.fsaa()
            && self.depth_texture == target.prefers_depth_texture()
            && format_ok
    }

    /// Record that `target` now uses this buffer.
    ///
    /// # Panics
    ///
    /// Panics if the target is already recorded.
    pub fn notify_render_target_attached(&mut self, target: RenderTargetId) {
        let inserted = self.attached.insert(target);
        assert!(inserted, "render target {target:?} attached to the same depth buffer twice");
    }

    /// Record that `target` stopped using this buffer.
    ///
    /// # Panics
    ///
    /// Panics if the target was never attached.
    pub fn notify_render_target_detached(&mut self, target: RenderTargetId) -> DetachOutcome {
        let removed = self.attached.shift_remove(&target);
        assert!(removed, "render target {target:?} was not attached to this depth buffer");

        if self.attached.is_empty() && self.pool_id == PoolId::NON_SHAREABLE {
            DetachOutcome::Destroy
        } else {
            DetachOutcome::Keep
        }
    }

    /// Drop every back-reference, returning them in attach order.
    pub(crate) fn take_attached_targets(&mut self) -> Vec<RenderTargetId> {
        self.attached.drain(..).collect()
    }

    /// Check the preconditions for copying this buffer's contents into `dst`.
    pub fn check_copy_to(&self, dst: &DepthBuffer) -> Result<(), String> {
        if self.width != dst.width || self.height != dst.height {
            return Err(format!(
                "size mismatch {}x{} vs {}x{}",
                self.width, self.height, dst.width, dst.height
            ));
        }
        if self.fsaa != dst.fsaa || self.fsaa_hint != dst.fsaa_hint {
            return Err(format!(
                "FSAA mismatch {} '{}' vs {} '{}'",
                self.fsaa, self.fsaa_hint, dst.fsaa, dst.fsaa_hint
            ));
        }
        if self.format != dst.format {
            return Err(format!("format mismatch {:?} vs {:?}", self.format, dst.format));
        }
        Ok(())
    }
}

/// Owning storage for depth buffers plus their pool buckets.
#[derive(Default)]
pub struct DepthBufferPool {
    buffers: SlotArena<DepthBuffer>,
    buckets: BTreeMap<PoolId, Vec<DepthBufferId>>,
}

impl DepthBufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `buffer` at the end of its pool's bucket.
    pub fn insert(&mut self, buffer: DepthBuffer) -> DepthBufferId {
        let pool_id = buffer.pool_id();
        let id = DepthBufferId(self.buffers.insert(buffer));
        self.buckets.entry(pool_id).or_default().push(id);
        id
    }

    pub fn get(&self, id: DepthBufferId) -> Option<&DepthBuffer> {
        self.buffers.get(id.0)
    }

    pub fn get_mut(&mut self, id: DepthBufferId) -> Option<&mut DepthBuffer> {
        self.buffers.get_mut(id.0)
    }

    pub fn contains(&self, id: DepthBufferId) -> bool {
        self.buffers.contains(id.0)
    }

    pub fn remove(&mut self, id: DepthBufferId) -> Option<DepthBuffer> {
        let buffer = self.buffers.remove(id.0)?;
        if let Some(bucket) = self.buckets.get_mut(&buffer.pool_id()) {
            bucket.retain(|other| *other != id);
            if bucket.is_empty() {
                self.buckets.remove(&buffer.pool_id());
            }
        }
        Some(buffer)
    }

    /// Buffers of one pool, in insertion order.
    pub fn bucket(&self, pool_id: PoolId) -> &[DepthBufferId] {
        self.buckets.get(&pool_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn ids(&self) -> Vec<DepthBufferId> {
        self.buckets.values().flatten().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{RenderTargetDesc, RenderTargetKind};

    fn target_800x600() -> RenderTarget {
        RenderTarget::new(RenderTargetKind::Texture, &RenderTargetDesc::texture("rt", 800, 600))
    }

    fn target_id(n: u32) -> RenderTargetId {
        RenderTargetId(SlotId::new(0, n))
    }

    #[test]
    fn test_larger_buffer_is_compatible() {
        let target = target_800x600();
        let buffer = DepthBuffer::new(1024, 768, DepthFormat::D24UnormS8Uint);
        assert!(buffer.is_compatible(&target, true));
    }

    #[test]
    fn test_smaller_buffer_is_not_compatible() {
        let target = target_800x600();
        let buffer = DepthBuffer::new(640, 768, DepthFormat::D24UnormS8Uint);
        assert!(!buffer.is_compatible(&target, true));
    }

    #[test]
    fn test_fsaa_mismatch_is_not_compatible() {
        let target = target_800x600();
        let buffer = DepthBuffer::new(1024, 768, DepthFormat::D24UnormS8Uint).with_fsaa(4, "");
        assert!(!buffer.is_compatible(&target, true));
    }

    #[test]
    fn test_depth_texture_needs_exact_size() {
        let desc = RenderTargetDesc::texture("shadow", 512, 512).with_depth_texture(true);
        let target = RenderTarget::new(RenderTargetKind::Texture, &desc);

        let larger = DepthBuffer::new(1024, 1024, DepthFormat::D24UnormS8Uint).with_depth_texture(true);
        assert!(!larger.is_compatible(&target, false));

        let exact = DepthBuffer::new(512, 512, DepthFormat::D24UnormS8Uint).with_depth_texture(true);
        assert!(exact.is_compatible(&target, false));

        let not_texture = DepthBuffer::new(512, 512, DepthFormat::D24UnormS8Uint);
        assert!(!not_texture.is_compatible(&target, false));
    }

    #[test]
    fn test_default_format_matches_any_when_not_exact() {
        let desc = RenderTargetDesc::texture("hdr", 256, 256).with_depth_format(DepthFormat::D32Float);
        let target = RenderTarget::new(RenderTargetKind::Texture, &desc);

        let d24 = DepthBuffer::new(256, 256, DepthFormat::D24UnormS8Uint);
        assert!(!d24.is_compatible(&target, true));
        assert!(d24.is_compatible(&target, false));

        let d16 = DepthBuffer::new(256, 256, DepthFormat::D16Unorm);
        assert!(!d16.is_compatible(&target, false));
    }

    #[test]
    fn test_non_shareable_detach_requests_destroy() {
        let mut buffer =
            DepthBuffer::new(64, 64, DepthFormat::D24UnormS8Uint).with_pool_id(PoolId::NON_SHAREABLE);
        buffer.notify_render_target_attached(target_id(0));
        buffer.notify_render_target_attached(target_id(1));
        assert_eq!(buffer.notify_render_target_detached(target_id(0)), DetachOutcome::Keep);
        assert_eq!(buffer.notify_render_target_detached(target_id(1)), DetachOutcome::Destroy);
    }

    #[test]
    fn test_shareable_detach_keeps_buffer() {
        let mut buffer = DepthBuffer::new(64, 64, DepthFormat::D24UnormS8Uint);
        buffer.notify_render_target_attached(target_id(3));
        assert_eq!(buffer.notify_render_target_detached(target_id(3)), DetachOutcome::Keep);
        assert_eq!(buffer.attached_count(), 0);
    }

    #[test]
    #[should_panic(expected = "attached to the same depth buffer twice")]
    fn test_double_attach_panics() {
        let mut buffer = DepthBuffer::new(64, 64, DepthFormat::D24UnormS8Uint);
        buffer.notify_render_target_attached(target_id(0));
        buffer.notify_render_target_attached(target_id(0));
    }

    #[test]
    #[should_panic(expected = "was not attached")]
    fn test_unknown_detach_panics() {
        let mut buffer = DepthBuffer::new(64, 64, DepthFormat::D24UnormS8Uint);
        buffer.notify_render_target_detached(target_id(9));
    }

    #[test]
    fn test_copy_preconditions() {
        let a = DepthBuffer::new(128, 128, DepthFormat::D24UnormS8Uint);
        let b = DepthBuffer::new(128, 128, DepthFormat::D24UnormS8Uint);
        assert!(a.check_copy_to(&b).is_ok());

        let c = DepthBuffer::new(128, 64, DepthFormat::D24UnormS8Uint);
        assert!(a.check_copy_to(&c).is_err());

        let d = DepthBuffer::new(128, 128, DepthFormat::D24UnormS8Uint).with_fsaa(0, "Quality");
        assert!(a.check_copy_to(&d).is_err());

        let e = DepthBuffer::new(128, 128, DepthFormat::D32Float);
        assert!(a.check_copy_to(&e).is_err());
    }

    #[test]
    fn test_pool_buckets_keep_insertion_order() {
        let mut pool = DepthBufferPool::new();
        let a = pool.insert(DepthBuffer::new(1, 1, DepthFormat::D16Unorm));
        let b = pool.insert(DepthBuffer::new(2, 2, DepthFormat::D16Unorm).with_pool_id(PoolId(7)));
        let c = pool.insert(DepthBuffer::new(3, 3, DepthFormat::D16Unorm));

        assert_eq!(pool.bucket(PoolId::DEFAULT), &[a, c]);
        assert_eq!(pool.bucket(PoolId(7)), &[b]);

        pool.remove(a);
        assert_eq!(pool.bucket(PoolId::DEFAULT), &[c]);
        assert!(pool.get(a).is_none());

        pool.remove(b);
        assert!(pool.bucket(PoolId(7)).is_empty());
        assert_eq!(pool.len(), 1);
    }
}
