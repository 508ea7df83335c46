//! Map-space to device-space projection of points, lines and polygon rings.
//!
//! Vertices are first reprojected into the map coordinate system (if a
//! transform is configured). Clipping happens there, against the context
//! extent grown by [`CLIP_BUFFER_RATIO`] on every side, so that strokes and
//! offsets near the visible edge never show a seam. The clipped vertices are
//! then mapped to pixels.

use cartosym_core::geometry::{BBox, Point, Polygon};

use crate::context::RenderContext;
use crate::error::TransformError;

/// Fraction of the extent width/height added on each side before clipping.
pub const CLIP_BUFFER_RATIO: f64 = 0.1;
/// Tolerance for inside/outside tests against the clip rectangle.
pub const CLIP_EPSILON: f64 = 1e-9;

/// Reproject one point into the map coordinate system, the one the extent
/// and the map-to-pixel transform are expressed in.
pub fn to_map_crs(context: &RenderContext, point: &Point) -> Result<Point, TransformError> {
    match context.coordinate_transform() {
        Some(ct) => {
            let (x, y, _) = ct.transform_point(point.x, point.y, 0.0)?;
            Ok(Point::new(x, y))
        }
        None => Ok(*point),
    }
}

/// Project one map point into device pixels.
pub fn project_point(context: &RenderContext, point: &Point) -> Result<Point, TransformError> {
    let mapped = to_map_crs(context, point)?;
    Ok(context.map_to_pixel().transform(&mapped))
}

fn reproject_points(context: &RenderContext, points: &[Point]) -> Vec<Point> {
    if context.coordinate_transform().is_none() {
        return points.to_vec();
    }
    points
        .iter()
        .filter_map(|p| match to_map_crs(context, p) {
            Ok(pt) => Some(pt),
            Err(e) => {
                log::warn!("Dropping vertex: {}", e);
                None
            }
        })
        .collect()
}

fn to_pixels(context: &RenderContext, points: &[Point]) -> Vec<Point> {
    let mtp = context.map_to_pixel();
    points.iter().map(|p| mtp.transform(p)).collect()
}

/// Bounds of a source-space box in the map coordinate system. With a
/// transform this is the box around the reprojected corners.
pub fn map_bounds(context: &RenderContext, bbox: &BBox) -> Option<BBox> {
    if context.coordinate_transform().is_none() {
        return Some(*bbox);
    }
    BBox::from_points(&reproject_points(context, &bbox.corners()))
}

/// The rectangle geometry is clipped against, if the context has an extent.
pub fn clip_rect(context: &RenderContext) -> Option<BBox> {
    context.extent().map(|e| {
        e.buffered(
            e.width() * CLIP_BUFFER_RATIO,
            e.height() * CLIP_BUFFER_RATIO,
        )
    })
}

/// Project a line string. Clipping may split it into several chains; an
/// unclipped line always comes back as a single chain.
pub fn project_line_string(
    context: &RenderContext,
    points: &[Point],
    clip_to_extent: bool,
) -> Vec<Vec<Point>> {
    let mapped = reproject_points(context, points);
    let chains = match clip_rect(context).filter(|_| clip_to_extent) {
        Some(rect) => clip_polyline(&mapped, &rect),
        None if mapped.is_empty() => Vec::new(),
        None => vec![mapped],
    };
    chains.iter().map(|chain| to_pixels(context, chain)).collect()
}

/// Project a polygon ring, optionally clipped to the extent.
pub fn project_ring(context: &RenderContext, ring: &[Point], clip_to_extent: bool) -> Vec<Point> {
    let mapped = reproject_points(context, ring);
    match clip_rect(context).filter(|_| clip_to_extent) {
        Some(rect) => to_pixels(context, &clip_ring(&mapped, &rect)),
        None => to_pixels(context, &mapped),
    }
}

/// Project the outer ring and each hole independently. Holes that clip away
/// entirely are dropped; the remaining holes keep their input order.
pub fn project_polygon(
    context: &RenderContext,
    polygon: &Polygon,
    clip_to_extent: bool,
) -> (Vec<Point>, Vec<Vec<Point>>) {
    let exterior = project_ring(context, &polygon.exterior, clip_to_extent);
    let holes = polygon
        .interiors
        .iter()
        .map(|ring| project_ring(context, ring, clip_to_extent))
        .filter(|ring| !ring.is_empty())
        .collect();
    (exterior, holes)
}

fn inside(p: &Point, rect: &BBox) -> bool {
    p.x >= rect.min.x - CLIP_EPSILON
        && p.x <= rect.max.x + CLIP_EPSILON
        && p.y >= rect.min.y - CLIP_EPSILON
        && p.y <= rect.max.y + CLIP_EPSILON
}

/// Liang-Barsky clip of segment `a`-`b`. Returns the visible part, if any.
fn clip_segment(a: Point, b: Point, rect: &BBox) -> Option<(Point, Point)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let mut t0: f64 = 0.0;
    let mut t1: f64 = 1.0;
    let checks = [
        (-dx, a.x - rect.min.x),
        (dx, rect.max.x - a.x),
        (-dy, a.y - rect.min.y),
        (dy, rect.max.y - a.y),
    ];
    for (p, q) in checks {
        if p == 0.0 {
            if q < -CLIP_EPSILON {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| Point::new(a.x + t * dx, a.y + t * dy);
    let start = if t0 > 0.0 { at(t0) } else { a };
    let end = if t1 < 1.0 { at(t1) } else { b };
    Some((start, end))
}

/// Clip a polyline to `rect`, splitting it wherever it leaves the rectangle.
pub fn clip_polyline(points: &[Point], rect: &BBox) -> Vec<Vec<Point>> {
    if points.len() == 1 {
        return if inside(&points[0], rect) {
            vec![points.to_vec()]
        } else {
            Vec::new()
        };
    }

    let mut chains = Vec::new();
    let mut current: Vec<Point> = Vec::new();
    for seg in points.windows(2) {
        match clip_segment(seg[0], seg[1], rect) {
            Some((start, end)) => {
                if current.last() != Some(&start) {
                    if current.len() > 1 {
                        chains.push(std::mem::take(&mut current));
                    }
                    current = vec![start];
                }
                current.push(end);
                if end != seg[1] {
                    chains.push(std::mem::take(&mut current));
                }
            }
            None => {
                if current.len() > 1 {
                    chains.push(std::mem::take(&mut current));
                }
                current.clear();
            }
        }
    }
    if current.len() > 1 {
        chains.push(current);
    }
    chains
}

#[derive(Clone, Copy)]
enum Edge {
    Left,
    Right,
    Bottom,
    Top,
}

impl Edge {
    fn keeps(&self, p: &Point, rect: &BBox) -> bool {
        match self {
            Edge::Left => p.x >= rect.min.x - CLIP_EPSILON,
            Edge::Right => p.x <= rect.max.x + CLIP_EPSILON,
            Edge::Bottom => p.y >= rect.min.y - CLIP_EPSILON,
            Edge::Top => p.y <= rect.max.y + CLIP_EPSILON,
        }
    }

    fn intersect(&self, a: &Point, b: &Point, rect: &BBox) -> Point {
        match self {
            Edge::Left | Edge::Right => {
                let x = if matches!(self, Edge::Left) {
                    rect.min.x
                } else {
                    rect.max.x
                };
                let t = (x - a.x) / (b.x - a.x);
                Point::new(x, a.y + t * (b.y - a.y))
            }
            Edge::Bottom | Edge::Top => {
                let y = if matches!(self, Edge::Bottom) {
                    rect.min.y
                } else {
                    rect.max.y
                };
                let t = (y - a.y) / (b.y - a.y);
                Point::new(a.x + t * (b.x - a.x), y)
            }
        }
    }
}

/// Sutherland-Hodgman clip of a ring to `rect`. A closed input ring (first
/// vertex repeated at the end) yields a closed output ring. A ring entirely
/// inside comes back unchanged; one entirely outside comes back empty.
pub fn clip_ring(ring: &[Point], rect: &BBox) -> Vec<Point> {
    let closed = ring.len() > 1 && ring.first() == ring.last();
    let open = if closed { &ring[..ring.len() - 1] } else { ring };

    let mut output: Vec<Point> = open.to_vec();
    for edge in [Edge::Left, Edge::Right, Edge::Bottom, Edge::Top] {
        if output.is_empty() {
            break;
        }
        let input = std::mem::take(&mut output);
        let mut prev = input[input.len() - 1];
        for cur in input {
            let cur_in = edge.keeps(&cur, rect);
            let prev_in = edge.keeps(&prev, rect);
            if cur_in {
                if !prev_in {
                    output.push(edge.intersect(&prev, &cur, rect));
                }
                output.push(cur);
            } else if prev_in {
                output.push(edge.intersect(&prev, &cur, rect));
            }
            prev = cur;
        }
    }

    if output.len() < 3 {
        return Vec::new();
    }
    if closed {
        output.push(output[0]);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map_to_pixel::MapToPixel;
    use crate::context::CoordinateTransform;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn rect() -> BBox {
        BBox::from_coords(0.0, 0.0, 10.0, 10.0)
    }

    fn closed_square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Point> {
        vec![
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
            Point::new(x0, y0),
        ]
    }

    #[derive(Debug)]
    struct Shift(f64);

    impl CoordinateTransform for Shift {
        fn transform_point(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), TransformError> {
            Ok((x + self.0, y + self.0, z))
        }
    }

    #[derive(Debug)]
    struct ShiftX(f64);

    impl CoordinateTransform for ShiftX {
        fn transform_point(&self, x: f64, y: f64, z: f64) -> Result<(f64, f64, f64), TransformError> {
            Ok((x + self.0, y, z))
        }
    }

    #[derive(Debug)]
    struct Unset;

    impl CoordinateTransform for Unset {
        fn is_valid(&self) -> bool {
            false
        }

        fn transform_point(&self, x: f64, y: f64, _z: f64) -> Result<(f64, f64, f64), TransformError> {
            Err(TransformError::Failed {
                x,
                y,
                message: "unset".to_string(),
            })
        }
    }

    #[test]
    fn test_ring_fully_inside_is_unchanged() {
        let ring = closed_square(2.0, 2.0, 8.0, 8.0);
        assert_eq!(clip_ring(&ring, &rect()), ring);
    }

    #[test]
    fn test_ring_fully_outside_is_empty() {
        let ring = closed_square(20.0, 20.0, 30.0, 30.0);
        assert!(clip_ring(&ring, &rect()).is_empty());
    }

    #[test]
    fn test_ring_straddling_edge_is_trimmed() {
        let ring = closed_square(5.0, 5.0, 15.0, 8.0);
        let clipped = clip_ring(&ring, &rect());
        assert_eq!(clipped.first(), clipped.last());
        assert!(clipped.iter().all(|p| p.x <= 10.0 + CLIP_EPSILON));
        let bb = BBox::from_points(&clipped).unwrap();
        assert!((bb.max.x - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_ring_enclosing_rect_becomes_rect() {
        let ring = closed_square(-5.0, -5.0, 15.0, 15.0);
        let clipped = clip_ring(&ring, &rect());
        let bb = BBox::from_points(&clipped).unwrap();
        assert_eq!(bb, rect());
    }

    #[test]
    fn test_polyline_leaving_and_reentering_splits() {
        let line = vec![
            Point::new(1.0, 5.0),
            Point::new(5.0, 5.0),
            Point::new(5.0, 20.0),
            Point::new(8.0, 20.0),
            Point::new(8.0, 5.0),
        ];
        let chains = clip_polyline(&line, &rect());
        assert_eq!(chains.len(), 2);
        assert_eq!(chains[0].len(), 3);
        assert!((chains[0][2].y - 10.0).abs() < 1e-10);
        assert!((chains[1][0].y - 10.0).abs() < 1e-10);
        assert_eq!(chains[1][1], Point::new(8.0, 5.0));
    }

    #[test]
    fn test_polyline_fully_outside_vanishes() {
        let line = vec![Point::new(20.0, 20.0), Point::new(30.0, 25.0)];
        assert!(clip_polyline(&line, &rect()).is_empty());
    }

    #[test]
    fn test_clip_rect_is_buffered() {
        let mtp = MapToPixel::new(1.0, 50.0, 50.0, 100.0, 100.0, 0.0);
        let ctx = RenderContext::new(mtp);
        let r = clip_rect(&ctx).unwrap();
        assert!((r.min.x + 10.0).abs() < 1e-9);
        assert!((r.max.x - 110.0).abs() < 1e-9);
    }

    #[test]
    fn test_projection_uses_coordinate_transform() {
        let ctx = RenderContext::for_device().with_coordinate_transform(Arc::new(Shift(1.0)));
        let p = project_point(&ctx, &Point::new(2.0, 3.0)).unwrap();
        assert_eq!(p, Point::new(3.0, 4.0));
    }

    #[test]
    fn test_clipping_happens_after_reprojection() {
        // The view covers map x 1000..1100; the transform moves source x by +1000.
        let mtp = MapToPixel::new(1.0, 1050.0, 50.0, 100.0, 100.0, 0.0);
        let ctx = RenderContext::new(mtp).with_coordinate_transform(Arc::new(ShiftX(1000.0)));
        let line = vec![Point::new(40.0, 50.0), Point::new(60.0, 50.0)];
        let chains = project_line_string(&ctx, &line, true);
        assert_eq!(chains.len(), 1);
        assert_eq!(chains[0].len(), 2);
        assert!(chains[0][0].distance_to(&Point::new(40.0, 50.0)) < 1e-9);
        assert!(chains[0][1].distance_to(&Point::new(60.0, 50.0)) < 1e-9);

        let ring = closed_square(40.0, 40.0, 60.0, 60.0);
        assert_eq!(project_ring(&ctx, &ring, true).len(), 5);

        // Source x 1040 lands at map x 2040, far outside the view.
        let far = vec![Point::new(1040.0, 50.0), Point::new(1060.0, 50.0)];
        assert!(project_line_string(&ctx, &far, true).is_empty());
    }

    #[test]
    fn test_map_bounds_follow_transform() {
        let bbox = BBox::from_coords(0.0, 0.0, 2.0, 3.0);
        assert_eq!(map_bounds(&RenderContext::for_device(), &bbox), Some(bbox));
        let ctx = RenderContext::for_device().with_coordinate_transform(Arc::new(ShiftX(10.0)));
        assert_eq!(map_bounds(&ctx, &bbox), Some(BBox::from_coords(10.0, 0.0, 12.0, 3.0)));
    }

    #[test]
    fn test_invalid_transform_is_skipped() {
        let ctx = RenderContext::for_device().with_coordinate_transform(Arc::new(Unset));
        let p = project_point(&ctx, &Point::new(2.0, 3.0)).unwrap();
        assert_eq!(p, Point::new(2.0, 3.0));
    }

    #[test]
    fn test_polygon_holes_keep_order() {
        let polygon = Polygon::new(
            closed_square(0.0, 0.0, 10.0, 10.0),
            vec![closed_square(1.0, 1.0, 2.0, 2.0), closed_square(5.0, 5.0, 6.0, 6.0)],
        );
        let (exterior, holes) = project_polygon(&RenderContext::for_device(), &polygon, true);
        assert_eq!(exterior.len(), 5);
        assert_eq!(holes.len(), 2);
        assert_eq!(holes[0][0], Point::new(1.0, 1.0));
        assert_eq!(holes[1][0], Point::new(5.0, 5.0));
    }

    proptest! {
        #[test]
        fn prop_identity_projection_is_passthrough(
            coords in prop::collection::vec((-1.0e6f64..1.0e6, -1.0e6f64..1.0e6), 1..32)
        ) {
            let ctx = RenderContext::for_device();
            let points: Vec<Point> = coords.iter().map(|&(x, y)| Point::new(x, y)).collect();
            let chains = project_line_string(&ctx, &points, true);
            prop_assert_eq!(chains.len(), 1);
            prop_assert_eq!(&chains[0], &points);
            prop_assert_eq!(project_ring(&ctx, &points, true), points);
        }
    }
}
