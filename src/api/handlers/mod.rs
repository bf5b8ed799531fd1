//! Route handlers for the gateway.
//!
//! Sessions are resolved by the access guard and arrive as an `Extension<Session>`.

pub mod home;
pub use self::home::home;

pub mod login;
pub use self::login::login;

pub mod verify;
pub use self::verify::verify;

pub mod me;
pub use self::me::me;

pub mod logout;
pub use self::logout::logout;

pub mod types;
