use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::utils::parse_day;

pub mod admin;
pub mod authz;
pub mod categories;
pub mod codes;
pub mod health;
pub mod menus;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AsOfQuery {
    /// Evaluate as of this calendar day (`YYYY-MM-DD`). Defaults to now.
    pub as_of: Option<String>,
}

impl AsOfQuery {
    pub fn resolve(&self, state: &AppState) -> AppResult<DateTime<Utc>> {
        as_of_or_now(state, self.as_of.as_deref())
    }
}

pub fn as_of_or_now(state: &AppState, day: Option<&str>) -> AppResult<DateTime<Utc>> {
    match day {
        Some(day) => parse_day(day),
        None => Ok(state.clock.now()),
    }
}
