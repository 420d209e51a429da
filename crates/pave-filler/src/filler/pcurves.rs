//! 2D curves of split and section edges on the faces they lie in.

use std::collections::BTreeSet;

use bop_kernel::geometry::curve2d::{Circle2d, Curve2d, Line2d, Polyline2d};
use bop_kernel::{Curve, GeometryError, Point2d, ShapeRef, Surface, Tolerance, Vec2};
use tracing::{debug, info, instrument};

use super::PaveFiller;
use crate::error::{FillerError, WarningCode};

/// Exact pcurve for the analytic cases, a polyline through `samples`
/// points otherwise.
pub(crate) fn build_pcurve(
    curve: &Curve,
    range: (f64, f64),
    surface: &Surface,
    samples: usize,
) -> Result<Curve2d, GeometryError> {
    if let Some(plane) = surface.as_plane() {
        match curve {
            Curve::Line(line) => {
                let (u, v) = plane.parameters_of(&line.origin);
                return Ok(Curve2d::Line(Line2d {
                    origin: Point2d::new(u, v),
                    direction: Vec2::new(line.direction.dot(&plane.u_axis), line.direction.dot(&plane.v_axis)),
                }));
            }
            Curve::Circle(circle) if circle.normal.is_parallel_to(&plane.normal, Tolerance::default().angular) => {
                let (u, v) = plane.parameters_of(&circle.center);
                let phi = circle
                    .x_axis
                    .dot(&plane.v_axis)
                    .atan2(circle.x_axis.dot(&plane.u_axis));
                let (phase, sign) = if circle.normal.dot(&plane.normal) > 0.0 {
                    (phi, 1.0)
                } else {
                    (-phi, -1.0)
                };
                return Ok(Curve2d::Circle(Circle2d {
                    center: Point2d::new(u, v),
                    radius: circle.radius,
                    phase,
                    sign,
                }));
            }
            _ => {}
        }
    }

    let n = samples.max(2);
    let mut parameters = Vec::with_capacity(n + 1);
    let mut points: Vec<Point2d> = Vec::with_capacity(n + 1);
    for k in 0..=n {
        let t = range.0 + (range.1 - range.0) * k as f64 / n as f64;
        let (mut u, v) = surface.parameters_of(&curve.evaluate(t))?;
        if let (Some(period), Some(last)) = (surface.u_period(), points.last()) {
            // keep u continuous across the seam
            u += period * ((last.x - u) / period).round();
        }
        parameters.push(t);
        points.push(Point2d::new(u, v));
    }
    Ok(Curve2d::Polyline(Polyline2d { parameters, points }))
}

/// Largest distance between the curve and the pcurve mapped onto the
/// surface, checked at the ends, the nodes and halfway between them.
pub(crate) fn pcurve_deviation(
    pcurve: &Curve2d,
    curve: &Curve,
    range: (f64, f64),
    surface: &Surface,
    samples: usize,
) -> f64 {
    let n = 2 * samples.max(2);
    (0..=n)
        .map(|k| {
            let t = range.0 + (range.1 - range.0) * k as f64 / n as f64;
            let uv = pcurve.evaluate(t);
            surface.evaluate(uv.x, uv.y).distance_to(&curve.evaluate(t))
        })
        .fold(0.0, f64::max)
}

impl PaveFiller {
    /// Build pcurves of every split or section edge lying inside a face.
    /// Failures leave the edge without a pcurve and add a warning.
    #[instrument(skip(self))]
    pub(super) fn make_pcurves(&mut self) -> Result<(), FillerError> {
        let faces: Vec<usize> = self.ds.faces_with_info().collect();
        let mut n_built = 0;
        let mut n_failed = 0;
        for face in faces {
            self.cancel.check()?;
            let ShapeRef::Face(face_id) = self.ds.shape_of(face)? else {
                continue;
            };
            let Some(surface) = self.store.faces.get(face_id).map(|f| f.surface) else {
                continue;
            };
            let Some(info) = self.ds.face_info(face) else {
                continue;
            };
            let mut edges = BTreeSet::new();
            for &pb in info.pave_blocks_in.iter().chain(&info.pave_blocks_sc) {
                let real = self.ds.real_pave_block(pb);
                if let Some(edge) = self.ds.pave_block(real)?.edge {
                    edges.insert(edge);
                }
            }
            for edge in edges {
                if self.ds.pcurve(edge, face).is_some() {
                    continue;
                }
                let (curve, range) = self.ds.edge_curve(&self.store, edge)?;
                let built = build_pcurve(&curve, range, &surface, self.config.pcurve_samples).and_then(|pcurve| {
                    let deviation = pcurve_deviation(&pcurve, &curve, range, &surface, self.config.pcurve_samples);
                    if deviation.is_finite() {
                        Ok((pcurve, deviation))
                    } else {
                        Err(GeometryError::Degenerate {
                            reason: "pcurve leaves the surface".into(),
                        })
                    }
                });
                match built {
                    Ok((pcurve, deviation)) => {
                        if deviation > self.ds.tolerance(edge) {
                            debug!(edge, face, deviation, "edge tolerance grown to its pcurve");
                            self.ds.update_tolerance(edge, deviation);
                        }
                        self.ds.set_pcurve(edge, face, pcurve);
                        n_built += 1;
                    }
                    Err(err) => {
                        self.report
                            .add_warning(WarningCode::PCurveNotBuilt, vec![edge, face], err.to_string());
                        n_failed += 1;
                    }
                }
            }
        }
        info!(n_built, n_failed, "pcurves made");
        Ok(())
    }
}
