use serde_json::{json, Map, Value};
use std::f64::consts::PI;

const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Coordinate system of an ArcGIS response, from its `spatialReference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    Wgs84,
    WebMercator,
}

impl Crs {
    pub fn from_wkid(wkid: i64) -> Option<Crs> {
        match wkid {
            4326 => Some(Crs::Wgs84),
            3857 | 102100 | 102113 | 900913 => Some(Crs::WebMercator),
            _ => None,
        }
    }

    fn to_lon_lat(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Crs::Wgs84 => (x, y),
            Crs::WebMercator => {
                let lon = (x / EARTH_RADIUS_M).to_degrees();
                let lat = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - PI / 2.0).to_degrees();
                (lon, lat)
            }
        }
    }
}

type Position = Vec<f64>;
type Ring = Vec<Position>;

pub struct GeometryReader {
    pub crs: Crs,
    pub has_z: bool,
}

impl GeometryReader {
    /// Convert one ArcGIS geometry object. Empty geometries become `null`.
    pub fn convert(&self, geometry: &Value) -> Result<Value, String> {
        let obj = match geometry {
            Value::Null => return Ok(Value::Null),
            Value::Object(obj) => obj,
            _ => return Err("geometry is not an object".to_string()),
        };

        if obj.contains_key("rings") {
            self.polygon(obj)
        } else if obj.contains_key("paths") {
            self.polyline(obj)
        } else if obj.contains_key("points") {
            self.multipoint(obj)
        } else if obj.contains_key("x") {
            self.point(obj)
        } else if obj.is_empty() {
            Ok(Value::Null)
        } else {
            Err("unrecognized geometry type".to_string())
        }
    }

    fn point(&self, obj: &Map<String, Value>) -> Result<Value, String> {
        let x = obj.get("x").unwrap_or(&Value::Null);
        let y = obj.get("y").unwrap_or(&Value::Null);
        // ArcGIS encodes an empty point as x = null or "NaN".
        if x.is_null() || x.as_str() == Some("NaN") {
            return Ok(Value::Null);
        }
        let x = x.as_f64().ok_or("point x is not a number")?;
        let y = y.as_f64().ok_or("point y is not a number")?;
        let (lon, lat) = self.crs.to_lon_lat(x, y);
        let mut position = vec![lon, lat];
        if self.has_z {
            if let Some(z) = obj.get("z").and_then(Value::as_f64) {
                position.push(z);
            }
        }
        Ok(json!({ "type": "Point", "coordinates": position }))
    }

    fn multipoint(&self, obj: &Map<String, Value>) -> Result<Value, String> {
        let points = self.positions(&obj["points"], "points")?;
        if points.is_empty() {
            return Ok(Value::Null);
        }
        Ok(json!({ "type": "MultiPoint", "coordinates": points }))
    }

    fn polyline(&self, obj: &Map<String, Value>) -> Result<Value, String> {
        let paths = obj["paths"].as_array().ok_or("paths is not an array")?;
        let mut lines = Vec::with_capacity(paths.len());
        for path in paths {
            let line = self.positions(path, "path")?;
            if line.len() < 2 {
                return Err("path with fewer than 2 positions".to_string());
            }
            lines.push(line);
        }
        Ok(match lines.len() {
            0 => Value::Null,
            1 => json!({ "type": "LineString", "coordinates": lines.remove(0) }),
            _ => json!({ "type": "MultiLineString", "coordinates": lines }),
        })
    }

    fn polygon(&self, obj: &Map<String, Value>) -> Result<Value, String> {
        let raw_rings = obj["rings"].as_array().ok_or("rings is not an array")?;
        let mut rings = Vec::with_capacity(raw_rings.len());
        for raw in raw_rings {
            rings.push(close_ring(self.positions(raw, "ring")?)?);
        }

        let mut polygons = assemble_polygons(rings);
        Ok(match polygons.len() {
            0 => Value::Null,
            1 => json!({ "type": "Polygon", "coordinates": polygons.remove(0) }),
            _ => json!({ "type": "MultiPolygon", "coordinates": polygons }),
        })
    }

    fn positions(&self, value: &Value, what: &str) -> Result<Vec<Position>, String> {
        let items = value.as_array().ok_or_else(|| format!("{} is not an array", what))?;
        items.iter().map(|p| self.position(p)).collect()
    }

    fn position(&self, value: &Value) -> Result<Position, String> {
        let coords = value.as_array().ok_or("coordinate is not an array")?;
        if coords.len() < 2 {
            return Err("coordinate with fewer than 2 values".to_string());
        }
        let x = coords[0].as_f64().ok_or("coordinate is not numeric")?;
        let y = coords[1].as_f64().ok_or("coordinate is not numeric")?;
        let (lon, lat) = self.crs.to_lon_lat(x, y);
        let mut position = vec![lon, lat];
        if self.has_z {
            if let Some(z) = coords.get(2).and_then(Value::as_f64) {
                position.push(z);
            }
        }
        Ok(position)
    }
}

fn close_ring(mut ring: Ring) -> Result<Ring, String> {
    let open = match (ring.first(), ring.last()) {
        (Some(first), Some(last)) => first[..2] != last[..2],
        _ => false,
    };
    if open {
        ring.push(ring[0].clone());
    }
    if ring.len() < 4 {
        return Err("ring with fewer than 4 positions".to_string());
    }
    Ok(ring)
}

/// Shoelace area; positive for counter-clockwise rings.
fn signed_area(ring: &[Position]) -> f64 {
    ring.windows(2)
        .map(|w| w[0][0] * w[1][1] - w[1][0] * w[0][1])
        .sum::<f64>()
        / 2.0
}

fn contains(ring: &[Position], point: &[f64]) -> bool {
    let (px, py) = (point[0], point[1]);
    let mut inside = false;
    for w in ring.windows(2) {
        let (x1, y1) = (w[0][0], w[0][1]);
        let (x2, y2) = (w[1][0], w[1][1]);
        if (y1 > py) != (y2 > py) && px < (x2 - x1) * (py - y1) / (y2 - y1) + x1 {
            inside = !inside;
        }
    }
    inside
}

fn on_segment(a: &[f64], b: &[f64], p: &[f64]) -> bool {
    let cross = (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
    let scale = (b[0] - a[0]).abs().max((b[1] - a[1]).abs()).max(1.0);
    cross.abs() <= 1e-9 * scale
        && p[0] >= a[0].min(b[0])
        && p[0] <= a[0].max(b[0])
        && p[1] >= a[1].min(b[1])
        && p[1] <= a[1].max(b[1])
}

fn on_boundary(ring: &[Position], point: &[f64]) -> bool {
    ring.windows(2).any(|w| on_segment(&w[0], &w[1], point))
}

/// Whether `hole` lies inside `exterior`. Ray casting is undefined for points on
/// the exterior's edge, so vertices touching it are skipped in favour of one
/// strictly off the boundary; failing that, the hole's edge midpoints are tried.
fn encloses(exterior: &[Position], hole: &[Position]) -> bool {
    let vertices = hole.iter().map(|p| vec![p[0], p[1]]);
    let midpoints = hole
        .windows(2)
        .map(|w| vec![(w[0][0] + w[1][0]) / 2.0, (w[0][1] + w[1][1]) / 2.0]);
    vertices
        .chain(midpoints)
        .find(|p| !on_boundary(exterior, p))
        .is_some_and(|p| contains(exterior, &p))
}

/// Group ArcGIS rings into GeoJSON polygons.
///
/// ArcGIS exterior rings are clockwise and holes counter-clockwise; GeoJSON
/// wants the opposite. Each hole goes to the smallest exterior containing it.
/// A hole with no containing exterior becomes a polygon of its own.
fn assemble_polygons(rings: Vec<Ring>) -> Vec<Vec<Ring>> {
    let mut polygons: Vec<Vec<Ring>> = Vec::new();
    let mut holes: Vec<Ring> = Vec::new();

    for mut ring in rings {
        if signed_area(&ring) > 0.0 {
            holes.push(ring);
        } else {
            ring.reverse();
            polygons.push(vec![ring]);
        }
    }

    for mut hole in holes {
        let owner = polygons
            .iter()
            .enumerate()
            .filter(|(_, p)| encloses(&p[0], &hole))
            .min_by(|(_, a), (_, b)| {
                signed_area(&a[0]).abs().total_cmp(&signed_area(&b[0]).abs())
            })
            .map(|(i, _)| i);

        match owner {
            Some(i) => {
                hole.reverse();
                polygons[i].push(hole);
            }
            None => polygons.push(vec![hole]),
        }
    }

    polygons
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wgs84() -> GeometryReader {
        GeometryReader { crs: Crs::Wgs84, has_z: false }
    }

    // Clockwise square from (x0,y0) with side s, ArcGIS exterior orientation.
    fn cw_square(x0: f64, y0: f64, s: f64) -> Value {
        json!([[x0, y0], [x0, y0 + s], [x0 + s, y0 + s], [x0 + s, y0], [x0, y0]])
    }

    fn ccw_square(x0: f64, y0: f64, s: f64) -> Value {
        json!([[x0, y0], [x0 + s, y0], [x0 + s, y0 + s], [x0, y0 + s], [x0, y0]])
    }

    fn ring_area(value: &Value) -> f64 {
        let ring: Vec<Position> = serde_json::from_value(value.clone()).unwrap();
        signed_area(&ring)
    }

    #[test]
    fn polygon_exterior_is_rewound_counter_clockwise() {
        let g = wgs84().convert(&json!({ "rings": [cw_square(0.0, 0.0, 10.0)] })).unwrap();
        assert_eq!(g["type"], "Polygon");
        assert!(ring_area(&g["coordinates"][0]) > 0.0);
    }

    #[test]
    fn hole_is_attached_to_enclosing_exterior() {
        let g = wgs84()
            .convert(&json!({ "rings": [cw_square(0.0, 0.0, 10.0), ccw_square(2.0, 2.0, 2.0)] }))
            .unwrap();
        assert_eq!(g["type"], "Polygon");
        let rings = g["coordinates"].as_array().unwrap();
        assert_eq!(rings.len(), 2);
        assert!(ring_area(&rings[0]) > 0.0);
        assert!(ring_area(&rings[1]) < 0.0);
    }

    #[test]
    fn hole_touching_exterior_edge_stays_a_hole() {
        let hole = json!([[10.0, 5.0], [8.0, 6.0], [8.0, 4.0], [10.0, 5.0]]);
        let g = wgs84()
            .convert(&json!({ "rings": [cw_square(0.0, 0.0, 10.0), hole] }))
            .unwrap();
        assert_eq!(g["type"], "Polygon");
        let rings = g["coordinates"].as_array().unwrap();
        assert_eq!(rings.len(), 2);
        assert!(ring_area(&rings[1]) < 0.0);

        // Touching the north edge at a vertex.
        let hole = json!([[5.0, 10.0], [4.0, 8.0], [6.0, 8.0], [5.0, 10.0]]);
        let g = wgs84()
            .convert(&json!({ "rings": [cw_square(0.0, 0.0, 10.0), hole] }))
            .unwrap();
        assert_eq!(g["type"], "Polygon");
        assert_eq!(g["coordinates"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn disjoint_exteriors_become_multipolygon() {
        let g = wgs84()
            .convert(&json!({ "rings": [
                cw_square(0.0, 0.0, 10.0),
                cw_square(20.0, 0.0, 10.0),
                ccw_square(22.0, 2.0, 1.0),
            ] }))
            .unwrap();
        assert_eq!(g["type"], "MultiPolygon");
        let polys = g["coordinates"].as_array().unwrap();
        assert_eq!(polys.len(), 2);
        assert_eq!(polys[0].as_array().unwrap().len(), 1);
        assert_eq!(polys[1].as_array().unwrap().len(), 2);
    }

    #[test]
    fn island_hole_goes_to_smallest_exterior() {
        // Big square, a lake in it, an island in the lake, a pond on the island.
        let g = wgs84()
            .convert(&json!({ "rings": [
                cw_square(0.0, 0.0, 100.0),
                ccw_square(10.0, 10.0, 80.0),
                cw_square(20.0, 20.0, 60.0),
                ccw_square(30.0, 30.0, 5.0),
            ] }))
            .unwrap();
        let polys = g["coordinates"].as_array().unwrap();
        assert_eq!(polys.len(), 2);
        // The pond belongs to the island, not to the outer square.
        assert_eq!(polys[1].as_array().unwrap().len(), 2);
        assert_eq!(polys[1][0][0], json!([20.0, 20.0]));
    }

    #[test]
    fn open_ring_is_closed() {
        let g = wgs84()
            .convert(&json!({ "rings": [[[0.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, 0.0]]] }))
            .unwrap();
        let ring = g["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring.first(), ring.last());
    }

    #[test]
    fn points_lines_and_empties() {
        let r = wgs84();
        assert_eq!(
            r.convert(&json!({"x": -118.24, "y": 34.05})).unwrap(),
            json!({"type": "Point", "coordinates": [-118.24, 34.05]})
        );
        assert_eq!(r.convert(&json!({"x": "NaN", "y": "NaN"})).unwrap(), Value::Null);
        assert_eq!(r.convert(&json!({})).unwrap(), Value::Null);
        assert_eq!(r.convert(&json!({"rings": []})).unwrap(), Value::Null);
        assert_eq!(
            r.convert(&json!({"points": [[1.0, 2.0], [3.0, 4.0]]})).unwrap()["type"],
            "MultiPoint"
        );
        assert_eq!(
            r.convert(&json!({"paths": [[[0.0, 0.0], [1.0, 1.0]]]})).unwrap()["type"],
            "LineString"
        );
        assert_eq!(
            r.convert(&json!({"paths": [[[0.0, 0.0], [1.0, 1.0]], [[2.0, 2.0], [3.0, 3.0]]]}))
                .unwrap()["type"],
            "MultiLineString"
        );
    }

    #[test]
    fn malformed_geometry_is_rejected() {
        let r = wgs84();
        assert!(r.convert(&json!({"rings": "oops"})).is_err());
        assert!(r.convert(&json!({"rings": [[[0.0, 0.0], [1.0]]]})).is_err());
        assert!(r.convert(&json!({"rings": [[[0.0, 0.0], [1.0, 1.0]]]})).is_err());
        assert!(r.convert(&json!({"paths": [[["a", "b"], [1.0, 1.0]]]})).is_err());
        assert!(r.convert(&json!({"x": 1.0})).is_err());
        assert!(r.convert(&json!({"curveRings": []})).is_err());
        assert!(r.convert(&json!(42)).is_err());
    }

    #[test]
    fn web_mercator_is_reprojected() {
        let r = GeometryReader { crs: Crs::WebMercator, has_z: false };
        let g = r.convert(&json!({"x": -13_163_066.0, "y": 4_035_932.0})).unwrap();
        let lon = g["coordinates"][0].as_f64().unwrap();
        let lat = g["coordinates"][1].as_f64().unwrap();
        assert!((lon - -118.2458).abs() < 0.001, "{}", lon);
        assert!((lat - 34.053).abs() < 0.001, "{}", lat);
    }

    #[test]
    fn z_values_kept_only_when_flagged() {
        let g = GeometryReader { crs: Crs::Wgs84, has_z: true }
            .convert(&json!({"x": 1.0, "y": 2.0, "z": 3.0}))
            .unwrap();
        assert_eq!(g["coordinates"], json!([1.0, 2.0, 3.0]));
        let g = wgs84().convert(&json!({"x": 1.0, "y": 2.0, "z": 3.0})).unwrap();
        assert_eq!(g["coordinates"], json!([1.0, 2.0]));
    }
}
