pub mod approval;
pub mod context;
pub mod lifecycle;
pub mod materializer;
pub mod schema;
pub mod store;
