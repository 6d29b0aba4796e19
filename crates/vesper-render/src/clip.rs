//! Program binding state and the clip planes that depend on it.
//!
//! User clip planes are specified in world space, but a bound vertex program
//! decides what space the pipeline clips in. [`ProgramBindings`] reports
//! every change of bound state to a [`ProgramBindingListener`];
//! [`ClipPlaneState`] listens and marks its planes for re-upload when the
//! vertex stage flips.

use vesper_core::math::Plane;

use crate::gpu_program::{GpuProgramParameters, GpuProgramType};

/// Observer of program bind/unbind transitions.
pub trait ProgramBindingListener {
    /// Called only when `stage` actually changes bound state.
    fn program_binding_changed(&mut self, stage: GpuProgramType, bound: bool);
}

/// User clip planes plus a flag saying the backend copy is stale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipPlaneState {
    planes: Vec<Plane>,
    dirty: bool,
}

impl ClipPlaneState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn add(&mut self, plane: Plane) {
        self.planes.push(plane);
        self.dirty = true;
    }

    /// Replace the list; a no-op if nothing changed.
    pub fn set(&mut self, planes: &[Plane]) {
        if self.planes != planes {
            self.planes = planes.to_vec();
            self.dirty = true;
        }
    }

    pub fn reset(&mut self) {
        if !self.planes.is_empty() {
            self.planes.clear();
            self.dirty = true;
        }
    }

    /// Hand the planes over for upload if they are stale.
    pub fn take_dirty(&mut self) -> Option<&[Plane]> {
        if self.dirty {
            self.dirty = false;
            Some(&self.planes)
        } else {
            None
        }
    }
}

impl ProgramBindingListener for ClipPlaneState {
    fn program_binding_changed(&mut self, stage: GpuProgramType, _bound: bool) {
        if stage == GpuProgramType::Vertex && !self.planes.is_empty() {
            self.dirty = true;
        }
    }
}

/// Which stages have a program bound, and the parameters last bound to each.
#[derive(Debug, Clone, Default)]
pub struct ProgramBindings {
    bound: [bool; GpuProgramType::COUNT],
    params: [Option<GpuProgramParameters>; GpuProgramType::COUNT],
}

impl ProgramBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_bound(&self, stage: GpuProgramType) -> bool {
        self.bound[stage.index()]
    }

    /// Update a stage, notifying `listener` if the state changed.
    pub fn set_bound(
        &mut self,
        stage: GpuProgramType,
        bound: bool,
        listener: &mut dyn ProgramBindingListener,
    ) {
        let slot = &mut self.bound[stage.index()];
        if *slot != bound {
            *slot = bound;
            listener.program_binding_changed(stage, bound);
        }
    }

    pub fn active_parameters(&self, stage: GpuProgramType) -> Option<&GpuProgramParameters> {
        self.params[stage.index()].as_ref()
    }

    pub fn active_parameters_mut(
        &mut self,
        stage: GpuProgramType,
    ) -> Option<&mut GpuProgramParameters> {
        self.params[stage.index()].as_mut()
    }

    pub fn set_active_parameters(&mut self, stage: GpuProgramType, params: Option<GpuProgramParameters>) {
        self.params[stage.index()] = params;
    }

    /// Clear every bound flag and parameter set without notifying anyone.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vesper_core::math::Vec3;

    fn plane() -> Plane {
        Plane::new(Vec3::Y, 0.0)
    }

    #[test]
    fn test_set_same_planes_is_not_dirty() {
        let mut clip = ClipPlaneState::new();
        clip.set(&[plane()]);
        assert!(clip.take_dirty().is_some());
        clip.set(&[plane()]);
        assert!(!clip.is_dirty());
    }

    #[test]
    fn test_vertex_binding_with_planes_marks_dirty() {
        let mut clip = ClipPlaneState::new();
        clip.add(plane());
        let _ = clip.take_dirty();

        let mut bindings = ProgramBindings::new();
        bindings.set_bound(GpuProgramType::Vertex, true, &mut clip);
        assert!(clip.is_dirty());
        let _ = clip.take_dirty();

        // Re-binding an already bound stage is not a change.
        bindings.set_bound(GpuProgramType::Vertex, true, &mut clip);
        assert!(!clip.is_dirty());

        bindings.set_bound(GpuProgramType::Vertex, false, &mut clip);
        assert!(clip.is_dirty());
    }

    #[test]
    fn test_other_stages_and_empty_planes_are_ignored() {
        let mut clip = ClipPlaneState::new();
        let mut bindings = ProgramBindings::new();
        bindings.set_bound(GpuProgramType::Vertex, true, &mut clip);
        assert!(!clip.is_dirty());

        clip.add(plane());
        let _ = clip.take_dirty();
        bindings.set_bound(GpuProgramType::Fragment, true, &mut clip);
        assert!(!clip.is_dirty());
        assert!(bindings.is_bound(GpuProgramType::Fragment));
    }

    #[test]
    fn test_reset_clears_flags() {
        let mut clip = ClipPlaneState::new();
        let mut bindings = ProgramBindings::new();
        bindings.set_bound(GpuProgramType::Geometry, true, &mut clip);
        bindings.set_active_parameters(GpuProgramType::Geometry, Some(GpuProgramParameters::new()));
        bindings.reset();
        assert!(!bindings.is_bound(GpuProgramType::Geometry));
        assert!(bindings.active_parameters(GpuProgramType::Geometry).is_none());
    }
}
