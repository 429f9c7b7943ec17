use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AppError,
    render::Values,
    templates::{
        lists::ListCounts,
        model::{text_of, RawBlock, Template},
    },
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: Vec<RawBlock>,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Partial update; absent fields are left alone.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTemplateRequest {
    pub name: Option<String>,
    pub content: Option<Vec<RawBlock>>,
    pub is_favorite: Option<bool>,
}

impl UpdateTemplateRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.content.is_none() && self.is_favorite.is_none()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RenderRequest {
    #[serde(default)]
    pub values: HashMap<String, Value>,
}

impl RenderRequest {
    /// An absent or blank body means no values; anything else must be valid JSON.
    pub fn from_body(body: &[u8]) -> Result<Self, AppError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| AppError::invalid(format!("Invalid render request: {e}")))
    }

    /// Strings, numbers and booleans are accepted; `null`, arrays and objects are rejected.
    pub fn into_values(self) -> Result<Values, AppError> {
        self.values
            .into_iter()
            .map(|(k, v)| match v {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => {
                    let text = text_of(&v);
                    Ok((k, text))
                }
                _ => Err(AppError::invalid(format!(
                    "Value for '{k}' must be a string, number or boolean"
                ))),
            })
            .collect()
    }
}

#[derive(Debug, Serialize)]
pub struct TemplateMutationResponse {
    pub message: &'static str,
    pub template: Template,
    pub user: ListCounts,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub message: &'static str,
    pub template: Template,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub category: &'static str,
    pub templates: Vec<Template>,
}
