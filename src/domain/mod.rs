// Domain layer: entities, ports and the error taxonomy.

pub mod entities;
pub mod errors;
pub mod ports;

pub use entities::User;
pub use errors::{
    CancellationError, JoinError, LoginError, PasswordHashError, SendBufferFull, SignupError,
    TokenError, UserStoreError,
};
