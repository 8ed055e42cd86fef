pub mod missed;
pub mod prizes;
pub mod users;
pub mod wins;

pub use missed as missed_entity;
pub use prizes as prize_entity;
pub use users as user_entity;
pub use wins as win_entity;
