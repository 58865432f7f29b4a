pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod ipc;
pub mod models;
pub mod renderer;
pub mod session_store;

pub use catalog::{Catalog, CatalogError, CatalogInventory};
pub use config::AssistConfig;
pub use error::{AssistError, TurnError};
pub use gateway::{
    AppointmentBooking, DealershipRanking, Gateway, GatewayError, HttpGateway, InventoryCheck,
    Operation, PredictiveMaintenance,
};
pub use renderer::{create_renderer, EchoRenderer, GeminiRenderer, RenderError, ReplyRenderer};
pub use session_store::{InMemorySessionStore, SessionStore, StoreError, TurnGate};
