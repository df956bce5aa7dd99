pub mod cars;
pub mod categories;
pub mod images;
pub mod products;

pub use cars::CarService;
pub use categories::CategoryService;
pub use products::ProductService;
