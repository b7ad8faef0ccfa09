use super::hashmap::HashMap;
use crate::math::{Point, Real};
use smallvec::SmallVec;

type CellKey = [i32; 3];

/// A uniform spatial hash of points, each tagged with a value of type `T`.
///
/// Used wherever the fracturing pipeline needs to find coincident or nearby vertices that
/// are not topologically connected: island detection, proximity tests, hole filling,
/// collision sampling.
#[derive(Clone, Debug)]
pub struct PointHashGrid<T> {
    cell_size: Real,
    cells: HashMap<CellKey, SmallVec<[(T, Point<Real>); 4]>>,
}

impl<T: Copy + PartialEq> PointHashGrid<T> {
    /// An empty grid with cubic cells of side `cell_size`.
    pub fn new(cell_size: Real) -> Self {
        assert!(cell_size > 0.0, "The cell size of a hash grid must be positive.");
        Self {
            cell_size,
            cells: HashMap::default(),
        }
    }

    /// The side length of the cells of this grid.
    pub fn cell_size(&self) -> Real {
        self.cell_size
    }

    fn key(&self, pt: &Point<Real>) -> CellKey {
        let inv = 1.0 / self.cell_size;
        [
            (pt.x * inv).floor() as i32,
            (pt.y * inv).floor() as i32,
            (pt.z * inv).floor() as i32,
        ]
    }

    /// Removes every point from this grid.
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Is this grid empty?
    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|cell| cell.is_empty())
    }

    /// Inserts `value` at the location `pt`.
    pub fn insert(&mut self, value: T, pt: Point<Real>) {
        let key = self.key(&pt);
        self.cells.entry(key).or_default().push((value, pt));
    }

    /// Removes `value` that was inserted at the location `pt`.
    ///
    /// Returns `false` if it was not found.
    pub fn remove(&mut self, value: T, pt: &Point<Real>) -> bool {
        let key = self.key(pt);
        if let Some(cell) = self.cells.get_mut(&key) {
            if let Some(pos) = cell.iter().position(|(v, _)| *v == value) {
                let _ = cell.swap_remove(pos);
                return true;
            }
        }

        false
    }

    /// Moves `value` from `old_pt` to `new_pt`.
    pub fn update_point(&mut self, value: T, old_pt: &Point<Real>, new_pt: Point<Real>) {
        let old_key = self.key(old_pt);
        if old_key == self.key(&new_pt) {
            if let Some(cell) = self.cells.get_mut(&old_key) {
                if let Some(entry) = cell.iter_mut().find(|(v, _)| *v == value) {
                    entry.1 = new_pt;
                    return;
                }
            }
        } else {
            let _ = self.remove(value, old_pt);
        }

        self.insert(value, new_pt);
    }

    /// Does the cell containing `pt` contain no point?
    pub fn is_cell_empty(&self, pt: &Point<Real>) -> bool {
        self.cells
            .get(&self.key(pt))
            .map(|cell| cell.is_empty())
            .unwrap_or(true)
    }

    fn for_each_in_ball(
        &self,
        center: &Point<Real>,
        radius: Real,
        mut f: impl FnMut(T, &Point<Real>),
    ) {
        let radius = radius.max(0.0);
        let mins = self.key(&(center - na::Vector3::repeat(radius)));
        let maxs = self.key(&(center + na::Vector3::repeat(radius)));
        let radius_sq = radius * radius;

        for i in mins[0]..=maxs[0] {
            for j in mins[1]..=maxs[1] {
                for k in mins[2]..=maxs[2] {
                    let Some(cell) = self.cells.get(&[i, j, k]) else {
                        continue;
                    };

                    for (value, pt) in cell {
                        if na::distance_squared(pt, center) <= radius_sq {
                            f(*value, pt);
                        }
                    }
                }
            }
        }
    }

    /// Finds the point closest to `center` within the distance `radius`, ignoring the values
    /// for which `ignore` returns `true`.
    ///
    /// Returns its value and its distance to `center`.
    pub fn find_nearest_in_radius(
        &self,
        center: &Point<Real>,
        radius: Real,
        ignore: impl Fn(&T) -> bool,
    ) -> Option<(T, Real)> {
        let mut best: Option<(T, Real)> = None;

        self.for_each_in_ball(center, radius, |value, pt| {
            if ignore(&value) {
                return;
            }

            let dist_sq = na::distance_squared(pt, center);
            if best.map(|(_, best_dist)| dist_sq < best_dist).unwrap_or(true) {
                best = Some((value, dist_sq));
            }
        });

        best.map(|(value, dist_sq)| (value, dist_sq.sqrt()))
    }

    /// Pushes to `out` all the values located at a distance smaller than `radius` from `center`.
    pub fn find_points_in_ball(&self, center: &Point<Real>, radius: Real, out: &mut Vec<T>) {
        self.for_each_in_ball(center, radius, |value, _| out.push(value));
    }
}

#[cfg(test)]
mod test {
    use super::PointHashGrid;
    use crate::math::Point;

    #[test]
    fn nearest_in_radius() {
        let mut grid = PointHashGrid::new(0.1);
        grid.insert(0, Point::new(0.0, 0.0, 0.0));
        grid.insert(1, Point::new(0.05, 0.0, 0.0));
        grid.insert(2, Point::new(1.0, 0.0, 0.0));

        let query = Point::new(0.06, 0.01, 0.0);
        let (id, dist) = grid.find_nearest_in_radius(&query, 0.2, |_| false).unwrap();
        assert_eq!(id, 1);
        assert_relative_eq!(dist, (0.01f64 * 0.01 + 0.01 * 0.01).sqrt());

        let (id, _) = grid.find_nearest_in_radius(&query, 0.2, |v| *v == 1).unwrap();
        assert_eq!(id, 0);
        assert!(grid.find_nearest_in_radius(&Point::new(0.5, 0.5, 0.5), 0.1, |_| false).is_none());
    }

    #[test]
    fn remove_and_update() {
        let mut grid = PointHashGrid::new(1.0);
        let a = Point::new(-0.5, 0.2, 3.1);
        grid.insert(7u32, a);
        assert!(!grid.is_cell_empty(&a));

        grid.update_point(7, &a, Point::new(10.0, 10.0, 10.0));
        assert!(grid.is_cell_empty(&a));

        let mut found = vec![];
        grid.find_points_in_ball(&Point::new(10.2, 10.0, 10.0), 0.5, &mut found);
        assert_eq!(found, vec![7]);

        assert!(grid.remove(7, &Point::new(10.0, 10.0, 10.0)));
        assert!(grid.is_empty());
    }
}
