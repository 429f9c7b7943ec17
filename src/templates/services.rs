//! Template CRUD and the user-list consistency protocol.
//!
//! Every mutation goes through one repository call that writes the template
//! row and the owner's lists in a single transaction, with the owner row
//! locked, so the favorite flag and the `fav` list always change together.

use std::{str::FromStr, time::Duration};

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{error, info};
use uuid::Uuid;

use crate::{
    error::AppError,
    render::{self, Values},
    state::AppState,
    store::bounded,
    templates::{
        dto::{CreateTemplateRequest, UpdateTemplateRequest},
        lists::TemplateLists,
        model::{parse_blocks, Block, RawBlock, Template},
        repo::TemplatePatch,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    All,
    Favorites,
    Recent,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Favorites => "favorites",
            Self::Recent => "recent",
        }
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "favorites" => Ok(Self::Favorites),
            "recent" => Ok(Self::Recent),
            other => Err(AppError::invalid(format!(
                "Unknown category '{other}', expected one of all, favorites, recent"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateListing {
    pub all: Vec<Template>,
    pub favorites: Vec<Template>,
    pub recent: Vec<Template>,
}

impl TemplateListing {
    pub fn take(self, category: Category) -> Vec<Template> {
        match category {
            Category::All => self.all,
            Category::Favorites => self.favorites,
            Category::Recent => self.recent,
        }
    }
}

fn required_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::invalid("Template name is required"));
    }
    Ok(name.to_string())
}

fn blocks_from(raw: Vec<RawBlock>) -> Result<Vec<Block>, AppError> {
    parse_blocks(raw).map_err(|e| AppError::invalid(format!("Invalid template data: {e}")))
}

fn limit(st: &AppState) -> Duration {
    st.config.store_timeout()
}

pub async fn create_template(
    st: &AppState,
    owner: Uuid,
    req: CreateTemplateRequest,
) -> Result<(Template, TemplateLists), AppError> {
    let name = required_name(&req.name)?;
    let blocks = blocks_from(req.content)?;

    let template = Template::new(owner, name, blocks, req.is_favorite);
    let lists = bounded(limit(st), st.templates.create(&template))
        .await
        .inspect_err(|e| {
            error!(error = %e, %owner, "template create failed");
        })?
        .ok_or_else(|| AppError::not_found("User"))?;

    info!(template_id = %template.id, %owner, "template created");
    Ok((template, lists))
}

pub async fn get_template(
    st: &AppState,
    requester: Uuid,
    id: Uuid,
) -> Result<Template, AppError> {
    // foreign templates look exactly like missing ones
    bounded(limit(st), st.templates.find_owned(id, requester))
        .await?
        .ok_or_else(|| AppError::not_found("Template"))
}

pub async fn update_template(
    st: &AppState,
    requester: Uuid,
    id: Uuid,
    req: UpdateTemplateRequest,
) -> Result<(Template, TemplateLists), AppError> {
    if req.is_empty() {
        return Err(AppError::invalid("Please provide at least one field to update"));
    }
    // set semantics: sending the flag again also repairs a drifted fav list
    let patch = TemplatePatch {
        name: req.name.as_deref().map(required_name).transpose()?,
        blocks: req.content.map(blocks_from).transpose()?,
        is_favorite: req.is_favorite,
        updated_at: OffsetDateTime::now_utc(),
    };

    let (template, lists) = bounded(limit(st), st.templates.update(requester, id, &patch))
        .await
        .inspect_err(|e| {
            error!(error = %e, template_id = %id, "template update failed");
        })?
        .ok_or_else(|| AppError::not_found("Template"))?;

    info!(template_id = %id, owner = %requester, "template updated");
    Ok((template, lists))
}

pub async fn delete_template(
    st: &AppState,
    requester: Uuid,
    id: Uuid,
) -> Result<TemplateLists, AppError> {
    let lists = bounded(limit(st), st.templates.delete(requester, id))
        .await
        .inspect_err(|e| {
            error!(error = %e, template_id = %id, "template delete failed");
        })?
        .ok_or_else(|| AppError::not_found("Template"))?;

    info!(template_id = %id, owner = %requester, "template deleted");
    Ok(lists)
}

pub async fn list_templates(st: &AppState, owner: Uuid) -> Result<TemplateListing, AppError> {
    let user = bounded(limit(st), st.users.find_by_id(owner))
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    let mut all = bounded(limit(st), st.templates.list_by_owner(owner)).await?;
    all.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let favorites = all.iter().filter(|t| t.is_favorite).cloned().collect();
    // stale ids in recents are skipped, not reported
    let recent = user
        .templates
        .recents
        .iter()
        .filter_map(|id| all.iter().find(|t| t.id == *id))
        .cloned()
        .collect();

    Ok(TemplateListing {
        all,
        favorites,
        recent,
    })
}

pub async fn list_category(
    st: &AppState,
    owner: Uuid,
    category: &str,
) -> Result<(Category, Vec<Template>), AppError> {
    let category = category.parse::<Category>()?;
    let listing = list_templates(st, owner).await?;
    Ok((category, listing.take(category)))
}

/// Renders an owned template; returns its name alongside the document.
pub async fn render_template(
    st: &AppState,
    requester: Uuid,
    id: Uuid,
    values: &Values,
) -> Result<(String, String), AppError> {
    let template = get_template(st, requester, id).await?;
    let html = render::render_document(&template, values);
    info!(template_id = %id, blocks = template.blocks.len(), "template rendered");
    Ok((template.name, html))
}
