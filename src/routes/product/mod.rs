mod handler;
mod model;

pub use handler::get_product_data;
pub use model::{Product, ProductRequest};
