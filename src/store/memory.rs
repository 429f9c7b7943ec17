//! In-process repositories for tests, with failure injection.
//!
//! One async mutex guards both tables, so a template write and its list edit
//! commit together the way a Postgres transaction does.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    auth::{
        repo::UserRepository,
        repo_types::{NewUser, User},
    },
    store::StoreError,
    templates::{
        lists::{ListEdit, TemplateLists},
        model::Template,
        repo::{TemplatePatch, TemplateRepository},
    },
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    templates: HashMap<Uuid, Template>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    fail_writes: Arc<AtomicBool>,
    read_stall_ms: Arc<AtomicU64>,
    write_stall_ms: Arc<AtomicU64>,
}

fn pause(ms: &AtomicU64) -> Option<Duration> {
    match ms.load(Ordering::SeqCst) {
        0 => None,
        n => Some(Duration::from_millis(n)),
    }
}

impl MemoryStore {
    /// Makes every template write fail as a backend error before it changes anything.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Delays template reads, simulating a hung backend.
    pub fn stall(&self, delay: Duration) {
        self.read_stall_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delays template writes while the tables are held, like a slow transaction.
    pub fn stall_writes(&self, delay: Duration) {
        self.write_stall_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Deletes a template row without touching anyone's lists.
    pub async fn remove_template_row(&self, id: Uuid) {
        self.tables.lock().await.templates.remove(&id);
    }

    async fn maybe_stall_read(&self) {
        if let Some(d) = pause(&self.read_stall_ms) {
            tokio::time::sleep(d).await;
        }
    }

    /// Runs inside the critical section of a write.
    async fn begin_write(&self) -> Result<(), StoreError> {
        if let Some(d) = pause(&self.write_stall_ms) {
            tokio::time::sleep(d).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow::anyhow!("injected write failure")));
        }
        Ok(())
    }
}

/// Owner presence is checked by the caller while the tables are held.
fn edit_lists(t: &mut Tables, owner: Uuid, edit: ListEdit) -> TemplateLists {
    match t.users.get_mut(&owner) {
        Some(u) => {
            u.templates.apply(edit);
            u.templates.clone()
        }
        None => TemplateLists::default(),
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn create(&self, new: NewUser) -> Result<User, StoreError> {
        let mut t = self.tables.lock().await;
        if t.users.values().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            templates: TemplateLists::default(),
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.insert(user.id, user.clone());
        Ok(user)
    }
}

#[async_trait]
impl TemplateRepository for MemoryStore {
    async fn find_owned(&self, id: Uuid, owner: Uuid) -> Result<Option<Template>, StoreError> {
        self.maybe_stall_read().await;
        let t = self.tables.lock().await;
        Ok(t.templates.get(&id).filter(|x| x.owner_id == owner).cloned())
    }

    async fn list_by_owner(&self, owner: Uuid) -> Result<Vec<Template>, StoreError> {
        self.maybe_stall_read().await;
        let t = self.tables.lock().await;
        let mut out: Vec<Template> = t
            .templates
            .values()
            .filter(|x| x.owner_id == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(out)
    }

    async fn create(&self, template: &Template) -> Result<Option<TemplateLists>, StoreError> {
        let mut t = self.tables.lock().await;
        self.begin_write().await?;
        if !t.users.contains_key(&template.owner_id) {
            return Ok(None);
        }
        if t.templates.contains_key(&template.id) {
            return Err(StoreError::Duplicate("templates_pkey".into()));
        }
        t.templates.insert(template.id, template.clone());
        let edit = ListEdit::Created {
            id: template.id,
            favorite: template.is_favorite,
        };
        Ok(Some(edit_lists(&mut t, template.owner_id, edit)))
    }

    async fn update(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &TemplatePatch,
    ) -> Result<Option<(Template, TemplateLists)>, StoreError> {
        let mut t = self.tables.lock().await;
        self.begin_write().await?;
        if !t.users.contains_key(&owner) {
            return Ok(None);
        }
        let Some(row) = t.templates.get_mut(&id).filter(|x| x.owner_id == owner) else {
            return Ok(None);
        };
        patch.apply_to(row);
        let updated = row.clone();
        let lists = edit_lists(&mut t, owner, patch.list_edit(id));
        Ok(Some((updated, lists)))
    }

    async fn delete(&self, owner: Uuid, id: Uuid) -> Result<Option<TemplateLists>, StoreError> {
        let mut t = self.tables.lock().await;
        self.begin_write().await?;
        if !t.users.contains_key(&owner) {
            return Ok(None);
        }
        if !t.templates.get(&id).is_some_and(|x| x.owner_id == owner) {
            return Ok(None);
        }
        t.templates.remove(&id);
        Ok(Some(edit_lists(&mut t, owner, ListEdit::Removed { id })))
    }
}
