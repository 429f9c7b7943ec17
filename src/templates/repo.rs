use async_trait::async_trait;
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    store::StoreError,
    templates::{
        lists::{ListEdit, TemplateLists},
        model::{Block, Template},
    },
};

/// Field changes for one update; `None` leaves the column alone.
#[derive(Debug, Clone)]
pub struct TemplatePatch {
    pub name: Option<String>,
    pub blocks: Option<Vec<Block>>,
    pub is_favorite: Option<bool>,
    pub updated_at: OffsetDateTime,
}

impl TemplatePatch {
    pub fn apply_to(&self, t: &mut Template) {
        if let Some(name) = &self.name {
            t.name = name.clone();
        }
        if let Some(blocks) = &self.blocks {
            t.blocks = blocks.clone();
        }
        if let Some(fav) = self.is_favorite {
            t.is_favorite = fav;
        }
        t.updated_at = self.updated_at;
    }

    pub fn list_edit(&self, id: Uuid) -> ListEdit {
        ListEdit::Touched {
            id,
            favorite: self.is_favorite,
        }
    }
}

/// Template persistence. Every lookup is scoped to the owner, and every write
/// commits the template row together with the owner's lists.
#[async_trait]
pub trait TemplateRepository: Send + Sync {
    async fn find_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Template>, StoreError>;
    /// Most recently updated first.
    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Template>, StoreError>;
    /// `None` if the owner does not exist.
    async fn create(&self, template: &Template) -> Result<Option<TemplateLists>, StoreError>;
    /// `None` if no template `id` is owned by `owner`.
    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &TemplatePatch,
    ) -> Result<Option<(Template, TemplateLists)>, StoreError>;
    /// `None` if no template `id` is owned by `owner`.
    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Option<TemplateLists>, StoreError>;
}

#[derive(Debug, FromRow)]
struct TemplateRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    content: Json<Vec<Block>>,
    is_favorite: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<TemplateRow> for Template {
    fn from(r: TemplateRow) -> Self {
        Self {
            id: r.id,
            owner_id: r.user_id,
            name: r.name,
            blocks: r.content.0,
            is_favorite: r.is_favorite,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const TEMPLATE_COLUMNS: &str = "id, user_id, name, content, is_favorite, created_at, updated_at";

#[derive(Clone)]
pub struct PgTemplateRepository {
    db: PgPool,
}

impl PgTemplateRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

type Tx = Transaction<'static, Postgres>;

/// Locks the owner row for the rest of the transaction.
async fn lock_lists(tx: &mut Tx, owner: Uuid) -> Result<Option<TemplateLists>, StoreError> {
    let row = sqlx::query_as::<_, (Vec<Uuid>, Vec<Uuid>, Vec<Uuid>)>(
        r#"
        SELECT all_templates, fav_templates, recent_templates
        FROM users
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(owner)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(row.map(|(all, fav, recents)| TemplateLists { all, fav, recents }))
}

async fn store_lists(tx: &mut Tx, owner: Uuid, lists: &TemplateLists) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        UPDATE users
           SET all_templates = $2,
               fav_templates = $3,
               recent_templates = $4,
               updated_at = now()
         WHERE id = $1
        "#,
    )
    .bind(owner)
    .bind(&lists.all[..])
    .bind(&lists.fav[..])
    .bind(&lists.recents[..])
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl TemplateRepository for PgTemplateRepository {
    async fn find_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Template>, StoreError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Template::from))
    }

    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Template>, StoreError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE user_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Template::from).collect())
    }

    async fn create(&self, t: &Template) -> Result<Option<TemplateLists>, StoreError> {
        let mut tx = self.db.begin().await?;
        let Some(mut lists) = lock_lists(&mut tx, t.owner_id).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            INSERT INTO templates (id, user_id, name, content, is_favorite, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(t.id)
        .bind(t.owner_id)
        .bind(&t.name)
        .bind(Json(&t.blocks))
        .bind(t.is_favorite)
        .bind(t.created_at)
        .bind(t.updated_at)
        .execute(&mut *tx)
        .await?;

        lists.apply(ListEdit::Created {
            id: t.id,
            favorite: t.is_favorite,
        });
        store_lists(&mut tx, t.owner_id, &lists).await?;
        tx.commit().await?;
        Ok(Some(lists))
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &TemplatePatch,
    ) -> Result<Option<(Template, TemplateLists)>, StoreError> {
        let mut tx = self.db.begin().await?;
        let Some(mut lists) = lock_lists(&mut tx, owner).await? else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            r#"
            UPDATE templates
               SET name = COALESCE($3, name),
                   content = COALESCE($4, content),
                   is_favorite = COALESCE($5, is_favorite),
                   updated_at = $6
             WHERE id = $1 AND user_id = $2
            RETURNING {TEMPLATE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(owner)
        .bind(patch.name.as_deref())
        .bind(patch.blocks.as_ref().map(Json))
        .bind(patch.is_favorite)
        .bind(patch.updated_at)
        .fetch_optional(&mut *tx)
        .await?;
        // dropping `tx` rolls back
        let Some(row) = row else {
            return Ok(None);
        };

        lists.apply(patch.list_edit(id));
        store_lists(&mut tx, owner, &lists).await?;
        tx.commit().await?;
        Ok(Some((row.into(), lists)))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Option<TemplateLists>, StoreError> {
        let mut tx = self.db.begin().await?;
        let Some(mut lists) = lock_lists(&mut tx, owner).await? else {
            return Ok(None);
        };

        let res = sqlx::query("DELETE FROM templates WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await?;
        if res.rows_affected() == 0 {
            return Ok(None);
        }

        lists.apply(ListEdit::Removed { id });
        store_lists(&mut tx, owner, &lists).await?;
        tx.commit().await?;
        Ok(Some(lists))
    }
}
