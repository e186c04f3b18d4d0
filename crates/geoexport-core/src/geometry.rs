/// Geographic coordinate, bounding-box, and polygon types.
/// All coordinate math uses f64 in degrees (EPSG:4326 lon/lat order).
use serde::{Deserialize, Serialize};

/// A point in geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatLon {
    /// Latitude in degrees, -90 to +90.
    pub lat: f64,
    /// Longitude in degrees, -180 to +180.
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Axis-aligned lon/lat bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BBox {
    pub fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self { min_lon, min_lat, max_lon, max_lat }
    }

    /// Closed-interval overlap test; touching edges count as overlapping.
    pub fn overlaps(&self, other: &BBox) -> bool {
        self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
            && self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
    }

    pub fn contains(&self, p: LatLon) -> bool {
        p.lon >= self.min_lon && p.lon <= self.max_lon && p.lat >= self.min_lat && p.lat <= self.max_lat
    }

    /// Corners in ring order: SW, SE, NE, NW.
    pub fn corners(&self) -> [LatLon; 4] {
        [
            LatLon::new(self.min_lat, self.min_lon),
            LatLon::new(self.min_lat, self.max_lon),
            LatLon::new(self.max_lat, self.max_lon),
            LatLon::new(self.max_lat, self.min_lon),
        ]
    }

    /// This box as a closed polygon ring.
    pub fn to_geometry(&self) -> Geometry {
        let mut ring: Vec<[f64; 2]> = self.corners().iter().map(|p| [p.lon, p.lat]).collect();
        ring.push(ring[0]);
        Geometry::Polygon(vec![ring])
    }
}

/// GeoJSON-shaped polygon geometry. Positions are `[lon, lat]`; the first
/// ring of each polygon is the exterior, any further rings are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

impl Geometry {
    fn polygons(&self) -> Vec<&[Vec<[f64; 2]>]> {
        match self {
            Geometry::Polygon(rings) => vec![rings.as_slice()],
            Geometry::MultiPolygon(polys) => polys.iter().map(|p| p.as_slice()).collect(),
        }
    }

    fn rings(&self) -> impl Iterator<Item = &Vec<[f64; 2]>> {
        self.polygons().into_iter().flat_map(|p| p.iter())
    }

    /// Bounding box over every vertex. An empty geometry yields an inverted
    /// (infinite) box that overlaps nothing.
    pub fn bbox(&self) -> BBox {
        let mut b = BBox::new(f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for ring in self.rings() {
            for &[lon, lat] in ring {
                b.min_lon = b.min_lon.min(lon);
                b.min_lat = b.min_lat.min(lat);
                b.max_lon = b.max_lon.max(lon);
                b.max_lat = b.max_lat.max(lat);
            }
        }
        b
    }

    /// Point-in-polygon by even-odd ray casting. A point is inside a polygon
    /// when it is inside the exterior ring and outside every hole.
    pub fn contains(&self, p: LatLon) -> bool {
        self.polygons().into_iter().any(|rings| {
            let Some((exterior, holes)) = rings.split_first() else {
                return false;
            };
            ring_contains(exterior, p) && !holes.iter().any(|h| ring_contains(h, p))
        })
    }

    /// True if the geometry and the box share at least one point.
    pub fn intersects_bbox(&self, bbox: &BBox) -> bool {
        if !self.bbox().overlaps(bbox) {
            return false;
        }
        for ring in self.rings() {
            if ring.iter().any(|&[lon, lat]| bbox.contains(LatLon::new(lat, lon))) {
                return true;
            }
        }
        if bbox.corners().iter().any(|&c| self.contains(c)) {
            return true;
        }
        let corners = bbox.corners();
        for ring in self.rings() {
            for seg in ring.windows(2) {
                for k in 0..4 {
                    let a = corners[k];
                    let b = corners[(k + 1) % 4];
                    if segments_intersect(seg[0], seg[1], [a.lon, a.lat], [b.lon, b.lat]) {
                        return true;
                    }
                }
            }
        }
        false
    }
}

fn ring_contains(ring: &[[f64; 2]], p: LatLon) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > p.lat) != (yj > p.lat) && p.lon < (xj - xi) * (p.lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn on_segment(a: [f64; 2], b: [f64; 2], p: [f64; 2]) -> bool {
    p[0] >= a[0].min(b[0]) && p[0] <= a[0].max(b[0]) && p[1] >= a[1].min(b[1]) && p[1] <= a[1].max(b[1])
}

fn segments_intersect(p1: [f64; 2], p2: [f64; 2], q1: [f64; 2], q2: [f64; 2]) -> bool {
    let d1 = orient(q1, q2, p1);
    let d2 = orient(q1, q2, p2);
    let d3 = orient(p1, p2, q1);
    let d4 = orient(p1, p2, q2);
    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0)) && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0)) {
        return true;
    }
    (d1 == 0.0 && on_segment(q1, q2, p1))
        || (d2 == 0.0 && on_segment(q1, q2, p2))
        || (d3 == 0.0 && on_segment(p1, p2, q1))
        || (d4 == 0.0 && on_segment(p1, p2, q2))
}
