//! Pure data structures shared by the cart engine, the broadcaster and the overlays.

pub mod cart;
pub mod overlay;

pub use cart::*;
pub use overlay::*;
