//! Walks around the triangles incident to a vertex.

use super::DynamicMesh;

/// One triangle reached while walking around a vertex.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FanStep {
    /// The triangle reached.
    pub triangle: u32,
    /// The vertex (other than the center) of the edge through which `triangle` was entered.
    ///
    /// For the first step, this is the vertex of the edge the walk did not leave through.
    pub entry: u32,
    /// The vertex (other than the center) of the edge through which the walk leaves `triangle`.
    pub exit: u32,
}

/// A lazy walk over the triangles around a vertex, crossing one edge at a time.
///
/// The walk starts at a given triangle, leaves it through the edge `(center, exit)`, and stops
/// when it reaches a boundary edge, an edge rejected by the `connected` predicate, or the starting
/// triangle again. The iterator can be cloned or [restarted](TriangleFan::restart) to walk the
/// same fan again.
#[derive(Clone)]
pub struct TriangleFan<'a, F> {
    mesh: &'a DynamicMesh,
    center: u32,
    start: FanStep,
    next: Option<FanStep>,
    looped: bool,
    connected: F,
}

fn other_vertex(tri: [u32; 3], a: u32, b: u32) -> u32 {
    tri.into_iter().find(|v| *v != a && *v != b).unwrap_or(u32::MAX)
}

impl<'a, F: Fn(u32, u32) -> bool> TriangleFan<'a, F> {
    /// Walks around `center` starting at `triangle`, leaving it through the edge `(center, exit)`.
    ///
    /// `connected(t1, t2)` tells if the walk may cross from `t1` to its edge-neighbor `t2`.
    pub fn new(mesh: &'a DynamicMesh, center: u32, triangle: u32, exit: u32, connected: F) -> Self {
        let entry = other_vertex(mesh.triangle(triangle), center, exit);
        let start = FanStep {
            triangle,
            entry,
            exit,
        };
        Self {
            mesh,
            center,
            start,
            next: Some(start),
            looped: false,
            connected,
        }
    }

    /// Rewinds this walk to its first triangle.
    pub fn restart(&mut self) {
        self.next = Some(self.start);
        self.looped = false;
    }

    /// Did the walk come back to its first triangle?
    ///
    /// Only meaningful once the iterator is exhausted.
    pub fn is_loop(&self) -> bool {
        self.looped
    }

    fn step_from(&mut self, step: FanStep) -> Option<FanStep> {
        let incident = self.mesh.edge_triangles(self.center, step.exit)?;
        let nbh = incident
            .into_iter()
            .flatten()
            .find(|tid| *tid != step.triangle)?;

        if !(self.connected)(step.triangle, nbh) {
            return None;
        }

        if nbh == self.start.triangle {
            self.looped = true;
            return None;
        }

        let exit = other_vertex(self.mesh.triangle(nbh), self.center, step.exit);
        Some(FanStep {
            triangle: nbh,
            entry: step.exit,
            exit,
        })
    }
}

impl<'a, F: Fn(u32, u32) -> bool> Iterator for TriangleFan<'a, F> {
    type Item = FanStep;

    fn next(&mut self) -> Option<FanStep> {
        let current = self.next.take()?;
        self.next = self.step_from(current);
        Some(current)
    }
}

/// A maximal run of triangles around a vertex, each sharing an edge with the next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanGroup {
    /// The triangles of this run, in walking order.
    pub triangles: Vec<u32>,
    /// Does the last triangle share an edge with the first one?
    pub is_loop: bool,
}

/// Groups the triangles around `vid` into runs of edge-adjacent triangles.
///
/// Two neighboring triangles are only grouped if `connected` accepts them. A vertex whose
/// triangles form more than one group is a bowtie vertex.
pub fn contiguous_fan_groups(
    mesh: &DynamicMesh,
    vid: u32,
    connected: impl Fn(u32, u32) -> bool + Copy,
) -> Vec<FanGroup> {
    let mut remaining: Vec<u32> = mesh.vertex_triangles(vid).to_vec();
    let mut groups = vec![];

    while let Some(&seed) = remaining.first() {
        let tri = mesh.triangle(seed);
        let k = tri.iter().position(|v| *v == vid).unwrap_or(0);
        let out = tri[(k + 1) % 3];
        let inc = tri[(k + 2) % 3];

        // Walk backward to find the beginning of the run.
        let mut backward = TriangleFan::new(mesh, vid, seed, out, connected);
        let mut first = None;
        for step in backward.by_ref() {
            first = Some(step);
        }

        let group = if backward.is_loop() {
            let triangles = TriangleFan::new(mesh, vid, seed, inc, connected)
                .map(|step| step.triangle)
                .collect();
            FanGroup {
                triangles,
                is_loop: true,
            }
        } else {
            let first = first.unwrap_or(FanStep {
                triangle: seed,
                entry: inc,
                exit: out,
            });
            let mut forward = TriangleFan::new(mesh, vid, first.triangle, first.entry, connected);
            let triangles = forward.by_ref().map(|step| step.triangle).collect();
            FanGroup {
                triangles,
                is_loop: forward.is_loop(),
            }
        };

        remaining.retain(|tid| !group.triangles.contains(tid));
        groups.push(group);
    }

    groups
}

impl DynamicMesh {
    /// Gives each extra fan group of a bowtie vertex its own copy of the vertex.
    ///
    /// Returns the number of vertices created.
    pub fn split_bowties(&mut self) -> usize {
        let mut num_created = 0;

        for vid in 0..self.max_vertex_id() {
            if !self.is_vertex(vid) {
                continue;
            }

            let groups = contiguous_fan_groups(self, vid, |_, _| true);
            for group in groups.iter().skip(1) {
                let _ = self.split_vertex(vid, &group.triangles);
                num_created += 1;
            }
        }

        num_created
    }
}
