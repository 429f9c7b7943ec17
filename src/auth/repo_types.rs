use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::templates::lists::TemplateLists;

/// User row as stored in the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub all_templates: Vec<Uuid>,
    pub fav_templates: Vec<Uuid>,
    pub recent_templates: Vec<Uuid>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,         // trimmed and lowercased
    pub password_hash: String, // Argon2 PHC string
    pub templates: TemplateLists,
    pub created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password_hash: r.password_hash,
            templates: TemplateLists {
                all: r.all_templates,
                fav: r.fav_templates,
                recents: r.recent_templates,
            },
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}
