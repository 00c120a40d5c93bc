use geo::{algorithm::orient::Direction, unary_union, BoundingRect, Distance, Euclidean, MultiPolygon, Orient, Point, Rect};
use rstar::{RTree, AABB};

use crate::geom::BoundingBox;

/// R-tree over the bounding boxes of a slice of MultiPolygons, addressed by slice position.
#[derive(Debug, Clone)]
pub(crate) struct ShapeIndex {
    rtree: RTree<BoundingBox>,
    len: usize,
}

impl ShapeIndex {
    /// Construct an index over `shapes`, addressed by iteration position.
    /// Empty shapes have no bounding box and are never returned.
    pub(crate) fn new<'a>(shapes: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Self {
        let mut len = 0;
        let boxes = shapes.into_iter()
            .enumerate()
            .inspect(|_| len += 1)
            .filter_map(|(i, shape)| shape.bounding_rect().map(|rect| BoundingBox::new(i, rect)))
            .collect();
        Self { rtree: RTree::bulk_load(boxes), len }
    }

    /// Get the number of indexed positions.
    #[inline] pub(crate) fn len(&self) -> usize { self.len }

    /// Positions whose bounding box intersects `rect`, in ascending order.
    pub(crate) fn candidates(&self, rect: &Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(rect.min().into(), rect.max().into());
        let mut found = self.rtree.locate_in_envelope_intersecting(&envelope)
            .map(|bbox| bbox.idx())
            .collect::<Vec<_>>();
        found.sort_unstable();
        found
    }

    /// Exact nearest shape to `point` and its Euclidean distance (zero inside or on the boundary).
    /// Equidistant shapes resolve to the lowest position.
    ///
    /// Boxes are visited in order of their distance to the point, which bounds the distance to
    /// the shape from below, so the scan stops once no remaining box can beat the best match.
    pub(crate) fn nearest<'a>(
        &self,
        point: &Point<f64>,
        shape_at: impl Fn(usize) -> &'a MultiPolygon<f64>,
    ) -> Option<(usize, f64)> {
        let query = [point.x(), point.y()];
        let mut best: Option<(usize, f64)> = None;

        for (bbox, dist_2) in self.rtree.nearest_neighbor_iter_with_distance_2(&query) {
            if let Some((_, best_dist)) = best {
                if dist_2.sqrt() > best_dist { break }
            }

            let idx = bbox.idx();
            let dist = Euclidean.distance(point, shape_at(idx));
            best = match best {
                Some((best_idx, best_dist)) if best_dist < dist || (best_dist == dist && best_idx < idx) => {
                    Some((best_idx, best_dist))
                }
                _ => Some((idx, dist)),
            };
        }

        best
    }
}

/// Compute the union of all MultiPolygons into a single MultiPolygon.
/// Inputs are oriented consistently first, as the union relies on a shared winding order.
pub(crate) fn dissolve(shapes: &[MultiPolygon<f64>]) -> MultiPolygon<f64> {
    let oriented = shapes.iter()
        .map(|shape| shape.orient(Direction::Default))
        .collect::<Vec<_>>();
    unary_union(&oriented)
}
