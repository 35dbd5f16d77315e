pub mod activity;
pub mod api;
pub mod assignment;
pub mod course;
pub mod material;
pub mod pagination;
pub mod user;

pub use activity::*;
pub use api::*;
pub use assignment::*;
pub use course::*;
pub use material::*;
pub use pagination::*;
pub use user::*;
