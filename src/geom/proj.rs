use geo::{Coord, MapCoords};
use proj4rs::{proj::Proj as Proj4, transform::transform};

use crate::error::{AttributionError, AttributionResult};

/// PROJ.4 definitions of the coordinate reference systems the pipeline can convert between,
/// and whether each one is geographic (degrees in, radians through proj4rs).
const REGISTRY: &[(u32, &str, bool)] = &[
    (2056, "+proj=somerc +lat_0=46.9524055555556 +lon_0=7.43958333333333 +k_0=1 +x_0=2600000 +y_0=1200000 +ellps=bessel +towgs84=674.374,15.056,405.346,0,0,0,0 +units=m +no_defs +type=crs", false),
    (21781, "+proj=somerc +lat_0=46.9524055555556 +lon_0=7.43958333333333 +k_0=1 +x_0=600000 +y_0=200000 +ellps=bessel +towgs84=674.374,15.056,405.346,0,0,0,0 +units=m +no_defs +type=crs", false),
    (3857, "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 +x_0=0 +y_0=0 +k=1 +units=m +no_defs +type=crs", false),
    (4326, "+proj=longlat +datum=WGS84 +no_defs +type=crs", true),
];

fn lookup(epsg: u32) -> AttributionResult<(&'static str, bool)> {
    REGISTRY.iter()
        .find(|(code, _, _)| *code == epsg)
        .map(|&(_, proj4, geographic)| (proj4, geographic))
        .ok_or(AttributionError::UnsupportedCrs(epsg))
}

/// Check whether an EPSG code can be used as a source or target CRS.
pub fn is_supported_epsg(epsg: u32) -> bool {
    lookup(epsg).is_ok()
}

/// Coordinate transformation between two registered CRSs.
pub struct Projector {
    from: Proj4,
    to: Proj4,
    from_epsg: u32,
    to_epsg: u32,
    from_geographic: bool,
    to_geographic: bool,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Projector(EPSG:{} -> EPSG:{})", self.from_epsg, self.to_epsg)
    }
}

impl Projector {
    pub fn new(from_epsg: u32, to_epsg: u32) -> AttributionResult<Self> {
        let (from_string, from_geographic) = lookup(from_epsg)?;
        let (to_string, to_geographic) = lookup(to_epsg)?;

        let build = |proj_string: &str| Proj4::from_proj_string(proj_string)
            .map_err(|e| AttributionError::Projection {
                from: from_epsg,
                to: to_epsg,
                reason: format!("failed to build PROJ.4 '{proj_string}': {e}"),
            });

        Ok(Self {
            from: build(from_string)?,
            to: build(to_string)?,
            from_epsg,
            to_epsg,
            from_geographic,
            to_geographic,
        })
    }

    /// True when source and target are the same CRS.
    #[inline] pub fn is_identity(&self) -> bool { self.from_epsg == self.to_epsg }

    /// Transform a single coordinate.
    pub fn project_coord(&self, coord: Coord<f64>) -> AttributionResult<Coord<f64>> {
        if self.is_identity() { return Ok(coord) }

        let mut point = if self.from_geographic {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };

        transform(&self.from, &self.to, &mut point)
            .map_err(|e| AttributionError::Projection {
                from: self.from_epsg,
                to: self.to_epsg,
                reason: e.to_string(),
            })?;

        Ok(if self.to_geographic {
            Coord { x: point.0.to_degrees(), y: point.1.to_degrees() }
        } else {
            Coord { x: point.0, y: point.1 }
        })
    }

    /// Transform every coordinate of a geometry.
    pub fn project<G: MapCoords<f64, f64>>(&self, geometry: &G) -> AttributionResult<G::Output> {
        geometry.try_map_coords(|coord| self.project_coord(coord))
    }
}
