use geo::{LineString, MultiPolygon, Rect};

const PADDING: f64 = 10.0;

/// Equirectangular projection of longitude/latitude onto an SVG canvas,
/// fitted to an extent. Longitudes are shrunk by the cosine of the centre
/// latitude so that shapes keep their proportions at city scale.
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    min_x: f64,
    max_y: f64,
    x_scale: f64,
    scale: f64,
    pub width: f64,
    pub height: f64,
}

impl Projection {
    /// Fits `extent` into a canvas `width` units wide with a fixed padding;
    /// the height follows from the extent's proportions.
    pub fn fit(extent: Rect<f64>, width: f64) -> Self {
        let centre_lat = (extent.min().y + extent.max().y) / 2.0;
        let x_scale = centre_lat.to_radians().cos().abs().max(0.01);

        let span_x = (extent.width() * x_scale).max(f64::EPSILON);
        let span_y = extent.height().max(f64::EPSILON);
        let scale = (width - 2.0 * PADDING) / span_x;
        let height = span_y * scale + 2.0 * PADDING;

        Self {
            min_x: extent.min().x,
            max_y: extent.max().y,
            x_scale,
            scale,
            width,
            height,
        }
    }

    pub fn project(&self, longitude: f64, latitude: f64) -> (f64, f64) {
        let x = (longitude - self.min_x) * self.x_scale * self.scale + PADDING;
        let y = (self.max_y - latitude) * self.scale + PADDING;
        (x, y)
    }

    /// SVG path data for a multipolygon; holes rely on `fill-rule="evenodd"`.
    pub fn path(&self, shape: &MultiPolygon<f64>) -> String {
        let mut d = String::new();
        for polygon in &shape.0 {
            self.ring(&mut d, polygon.exterior());
            for interior in polygon.interiors() {
                self.ring(&mut d, interior);
            }
        }
        d
    }

    fn ring(&self, d: &mut String, ring: &LineString<f64>) {
        for (idx, coord) in ring.coords().enumerate() {
            let (x, y) = self.project(coord.x, coord.y);
            let command = if idx == 0 { 'M' } else { 'L' };
            d.push_str(&format!("{command}{x:.2},{y:.2}"));
        }
        if ring.coords().next().is_some() {
            d.push('Z');
        }
    }

    pub fn view_box(&self) -> String {
        format!("0 0 {:.0} {:.0}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    #[test]
    fn test_corners_map_inside_padding() {
        let extent = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 10.0, y: 5.0 });
        let projection = Projection::fit(extent, 220.0);

        assert_eq!(projection.project(0.0, 5.0), (10.0, 10.0));
        let (x, y) = projection.project(10.0, 0.0);
        assert!((x - 210.0).abs() < 1e-9);
        assert!((y - (projection.height - 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_latitude_shrinks_longitude() {
        let extent = Rect::new(coord! { x: 174.0, y: -37.0 }, coord! { x: 175.0, y: -36.0 });
        let projection = Projection::fit(extent, 820.0);
        // One degree of longitude is shorter than one of latitude here.
        assert!(projection.height > projection.width);
    }

    #[test]
    fn test_path_closes_each_ring() {
        let square = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let extent = Rect::new(coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 });
        let projection = Projection::fit(extent, 120.0);

        let d = projection.path(&MultiPolygon::new(vec![square]));

        assert!(d.starts_with("M10.00,"));
        assert_eq!(d.matches('Z').count(), 1);
        assert_eq!(d.matches('L').count(), 4);
    }
}
