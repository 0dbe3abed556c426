use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::tree::TreeNode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Category {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
    #[schema(example = "Outerwear")]
    pub name: String,
    pub sort_order: i64,
    pub use_yn: bool,
}

impl Category {
    pub fn new(id: i64, parent_id: Option<i64>, name: impl Into<String>, sort_order: i64) -> Self {
        Self {
            id,
            parent_id,
            name: name.into(),
            sort_order,
            use_yn: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.use_yn = false;
        self
    }
}

impl TreeNode for Category {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }

    fn parent_id(&self) -> Option<i64> {
        self.parent_id
    }

    fn sort_order(&self) -> i64 {
        self.sort_order
    }

    fn is_enabled(&self) -> bool {
        self.use_yn
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryTreeItem {
    pub id: i64,
    pub name: String,
    pub sort_order: i64,
    pub children: Vec<CategoryTreeItem>,
}
