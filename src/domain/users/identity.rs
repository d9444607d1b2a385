use uuid::Uuid;

/// The user a session token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub login: String,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub login: String,
    pub password_hash: Option<String>,
}
