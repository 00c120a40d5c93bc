mod bbox;
mod geom;
mod heal;
mod proj;

use bbox::BoundingBox;
pub(crate) use geom::{dissolve, ShapeIndex};
pub(crate) use heal::{check_finite, heal};
pub use proj::{is_supported_epsg, Projector};
