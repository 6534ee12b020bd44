pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod state;

pub use models::*;
pub use router::appointment_request_routes;
pub use services::approval::AppointmentApprovalService;
pub use services::schema::ProposeWritePath;
pub use state::AppointmentState;
