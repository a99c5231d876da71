use uuid::Uuid;

// Account record persisted by the user store. The game core only ever reads
// the id → username mapping at session setup.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}
