use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommonCodeGroup {
    #[schema(example = "ORDER_STATUS")]
    pub group_code: String,
    pub group_name: String,
    pub sort_order: i64,
    pub use_yn: bool,
}

impl CommonCodeGroup {
    pub fn new(group_code: impl Into<String>, group_name: impl Into<String>) -> Self {
        Self {
            group_code: group_code.into(),
            group_name: group_name.into(),
            sort_order: 0,
            use_yn: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.use_yn = false;
        self
    }
}

/// A code within a group. The owning group is referenced by `group_code`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CommonCode {
    pub group_code: String,
    #[schema(example = "SHIPPED")]
    pub code: String,
    pub code_name: String,
    pub sort_order: i64,
    pub use_yn: bool,
}

impl CommonCode {
    pub fn new(
        group_code: impl Into<String>,
        code: impl Into<String>,
        code_name: impl Into<String>,
        sort_order: i64,
    ) -> Self {
        Self {
            group_code: group_code.into(),
            code: code.into(),
            code_name: code_name.into(),
            sort_order,
            use_yn: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.use_yn = false;
        self
    }
}
