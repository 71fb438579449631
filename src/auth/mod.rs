pub mod session;

pub use session::{login, logout, SessionUser};
