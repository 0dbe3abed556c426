//! Two-level common code taxonomy (group -> codes).
//!
//! A code is usable only while both the code and its owning group are
//! enabled. The rule is evaluated on read; nothing is denormalized.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{AppError, AppResult};
use crate::models::code::{CommonCode, CommonCodeGroup};

#[async_trait]
pub trait CodeSource: Send + Sync {
    async fn group(&self, group_code: &str) -> AppResult<Option<CommonCodeGroup>>;

    async fn groups(&self) -> AppResult<Vec<CommonCodeGroup>>;

    /// All codes of the group, enabled or not.
    async fn codes(&self, group_code: &str) -> AppResult<Vec<CommonCode>>;

    async fn code(&self, group_code: &str, code: &str) -> AppResult<Option<CommonCode>>;
}

pub fn is_effectively_active(group: &CommonCodeGroup, code: &CommonCode) -> bool {
    code.group_code == group.group_code && code.use_yn && group.use_yn
}

pub struct CodeRegistry<S: CodeSource + ?Sized> {
    source: Arc<S>,
}

impl<S: CodeSource + ?Sized> CodeRegistry<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Enabled codes of an enabled group, by `sort_order` then code.
    /// A disabled or unknown group yields an empty list.
    pub async fn active_codes(&self, group_code: &str) -> AppResult<Vec<CommonCode>> {
        let group = match self.source.group(group_code).await? {
            Some(group) if group.use_yn => group,
            Some(_) => {
                tracing::debug!(group_code = %group_code, "code group disabled");
                return Ok(Vec::new());
            }
            None => return Ok(Vec::new()),
        };

        let mut codes: Vec<CommonCode> = self
            .source
            .codes(group_code)
            .await?
            .into_iter()
            .filter(|code| is_effectively_active(&group, code))
            .collect();
        codes.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.code.cmp(&b.code)));
        Ok(codes)
    }

    /// A disabled group, a disabled code and a missing pair all report NotFound.
    pub async fn resolve_code(&self, group_code: &str, code: &str) -> AppResult<CommonCode> {
        let not_found = || AppError::not_found(format!("common code {group_code}/{code} not found"));

        let group = self.source.group(group_code).await?.ok_or_else(not_found)?;
        let found = self.source.code(group_code, code).await?.ok_or_else(not_found)?;

        if is_effectively_active(&group, &found) {
            Ok(found)
        } else {
            Err(not_found())
        }
    }

    /// Enabled groups by `sort_order` then group code.
    pub async fn active_groups(&self) -> AppResult<Vec<CommonCodeGroup>> {
        let mut groups: Vec<CommonCodeGroup> = self
            .source
            .groups()
            .await?
            .into_iter()
            .filter(|group| group.use_yn)
            .collect();
        groups.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.group_code.cmp(&b.group_code))
        });
        Ok(groups)
    }
}
