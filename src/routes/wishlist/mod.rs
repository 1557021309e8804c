mod handler;
mod model;

pub use handler::{get_certain_wishlist, get_wishlist};
pub use model::{WishlistItem, WishlistOverview, WishlistPageRequest, WishlistPageResponse};
