pub mod appointment;
pub mod dealership;
pub mod maintenance;
pub mod session;

pub use appointment::{Appointment, BookingRequest, BookingResponse};
pub use dealership::{
    Coordinates, InventoryRequest, InventoryResponse, RankingCandidate, RankingRequest,
    RankingResponse,
};
pub use maintenance::{MaintenanceRequest, MaintenanceResponse, Recommendation};
pub use session::{ConversationState, PendingConfirmation, Session};
