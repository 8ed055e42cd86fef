pub mod allocation_service;
pub mod backlog_service;
pub mod bot_service;
pub mod broadcast_service;
pub mod economy_service;
pub mod prize_service;
pub mod scheduler_service;
pub mod user_service;

pub use allocation_service::*;
pub use backlog_service::*;
pub use bot_service::*;
pub use broadcast_service::*;
pub use economy_service::*;
pub use prize_service::*;
pub use scheduler_service::*;
pub use user_service::*;
