//! Components every world registers.

mod name;
mod polygon_collider;
mod prototype;
mod script;

pub use name::Name;
pub use polygon_collider::PolygonCollider2D;
pub use prototype::{MAX_CLONES, Prototype};
pub use script::ScriptRef;
