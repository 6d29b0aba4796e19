//! Draw submissions and the geometry statistics they feed.

/// Primitive topology of a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationType {
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    TriangleFan,
    LineListAdj,
    LineStripAdj,
    TriangleListAdj,
    TriangleStripAdj,
}

impl OperationType {
    /// Faces produced by `count` indices (or vertices) of this topology.
    ///
    /// Point and line topologies produce no faces. Degenerate counts clamp to zero.
    pub fn face_count(self, count: usize) -> usize {
        match self {
            OperationType::TriangleList => count / 3,
            OperationType::TriangleListAdj => count / 6,
            OperationType::TriangleStripAdj => (count / 2).saturating_sub(2),
            OperationType::TriangleStrip | OperationType::TriangleFan => count.saturating_sub(2),
            OperationType::PointList
            | OperationType::LineList
            | OperationType::LineStrip
            | OperationType::LineListAdj
            | OperationType::LineStripAdj => 0,
        }
    }
}

/// One draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOperation {
    pub operation_type: OperationType,
    pub vertex_count: usize,
    /// `Some` for indexed draws.
    pub index_count: Option<usize>,
    pub instance_count: usize,
}

impl RenderOperation {
    pub fn new(operation_type: OperationType, vertex_count: usize) -> Self {
        Self {
            operation_type,
            vertex_count,
            index_count: None,
            instance_count: 1,
        }
    }

    pub fn indexed(operation_type: OperationType, vertex_count: usize, index_count: usize) -> Self {
        Self {
            index_count: Some(index_count),
            ..Self::new(operation_type, vertex_count)
        }
    }

    pub fn with_instances(mut self, instance_count: usize) -> Self {
        self.instance_count = instance_count;
        self
    }

    /// Indices for indexed draws, vertices otherwise.
    pub fn primitive_count(&self) -> usize {
        self.index_count.unwrap_or(self.vertex_count)
    }
}

/// Counters reset by `begin_geometry_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeometryStats {
    pub batches: usize,
    pub faces: usize,
    pub vertices: usize,
}

impl GeometryStats {
    /// Account for one submission repeated over `pass_iterations` iterations.
    pub fn record(&mut self, op: &RenderOperation, pass_iterations: usize) {
        let instances = op.instance_count.max(1);
        let mut count = op.primitive_count().saturating_mul(instances);
        if pass_iterations > 1 {
            count = count.saturating_mul(pass_iterations);
        }
        self.faces = self.faces.saturating_add(op.operation_type.face_count(count));
        self.vertices = self
            .vertices
            .saturating_add(op.vertex_count.saturating_mul(instances));
        self.batches = self.batches.saturating_add(pass_iterations);
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_formulas() {
        assert_eq!(OperationType::TriangleList.face_count(300), 100);
        assert_eq!(OperationType::TriangleStrip.face_count(100), 98);
        assert_eq!(OperationType::TriangleFan.face_count(10), 8);
        assert_eq!(OperationType::TriangleListAdj.face_count(600), 100);
        assert_eq!(OperationType::TriangleStripAdj.face_count(20), 8);
        assert_eq!(OperationType::LineList.face_count(100), 0);
    }

    #[test]
    fn test_degenerate_counts_clamp() {
        assert_eq!(OperationType::TriangleStrip.face_count(1), 0);
        assert_eq!(OperationType::TriangleStripAdj.face_count(3), 0);
    }

    #[test]
    fn test_record_multiplies_before_formula() {
        let mut stats = GeometryStats::default();
        let op = RenderOperation::new(OperationType::TriangleStrip, 10).with_instances(2);
        stats.record(&op, 3);
        // 10 * 2 * 3 = 60 strip vertices -> 58 faces.
        assert_eq!(stats.faces, 58);
        assert_eq!(stats.vertices, 20);
        assert_eq!(stats.batches, 3);
    }

    #[test]
    fn test_huge_counts_saturate() {
        let mut stats = GeometryStats::default();
        let op = RenderOperation::new(OperationType::TriangleStrip, usize::MAX / 2).with_instances(4);
        stats.record(&op, 2);
        stats.record(&op, 2);
        assert_eq!(stats.faces, usize::MAX);
        assert_eq!(stats.vertices, usize::MAX);
        assert_eq!(stats.batches, 4);
    }

    #[test]
    fn test_indexed_uses_index_count() {
        let mut stats = GeometryStats::default();
        stats.record(&RenderOperation::indexed(OperationType::TriangleList, 4, 6), 1);
        assert_eq!(stats.faces, 2);
        assert_eq!(stats.vertices, 4);
        assert_eq!(stats.batches, 1);
        stats.reset();
        assert_eq!(stats, GeometryStats::default());
    }
}
