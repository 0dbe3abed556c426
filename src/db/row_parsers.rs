use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, Type};
use uuid::Uuid;

use crate::authz::AuthorityLevel;
use crate::errors::AppError;
use crate::models::category::Category;
use crate::models::code::{CommonCode, CommonCodeGroup};
use crate::models::menu::{FavoriteMenu, Menu};
use crate::models::program::{Program, RoleProgram, UserProgram};

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, AppError>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {}: {}", name, e)))
}

/// `Y`/`N` flag columns. Anything other than `Y` (any case) reads as off.
pub fn parse_yn(s: &str) -> bool {
    s.trim().eq_ignore_ascii_case("y")
}

pub fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(s.trim()).map_err(|e| AppError::internal(format!("invalid uuid: {}", e)))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP format
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(AppError::internal(format!("invalid datetime: {}", s)))
}

/// Calendar day columns: `YYYY-MM-DD`, compact `YYYYMMDD`, or a timestamp
/// whose date part is taken.
pub fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    let s = s.trim();

    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(day);
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Ok(day);
    }
    if let Ok(dt) = parse_datetime(s) {
        return Ok(dt.date_naive());
    }

    Err(AppError::internal(format!("invalid date: {}", s)))
}

pub fn parse_opt_date(s: Option<String>) -> Result<Option<NaiveDate>, AppError> {
    match s {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_date(&s)?)),
        _ => Ok(None),
    }
}

/// An authority value outside the scale grants nothing. It is logged rather
/// than failing the whole read.
pub fn parse_authority(s: &str, context: &str) -> AuthorityLevel {
    match s.parse::<AuthorityLevel>() {
        Ok(level) => level,
        Err(err) => {
            tracing::warn!(value = %s, context = %context, error = %err, "unknown authority value; treating as NONE");
            AuthorityLevel::None
        }
    }
}

pub fn program_from_row(row: &SqliteRow) -> Result<Program, AppError> {
    let program_id: String = column(row, "program_id")?;
    let program_name: String = column(row, "program_name")?;
    let close_yn: String = column(row, "close_yn")?;

    Ok(Program {
        program_id,
        program_name,
        closed: parse_yn(&close_yn),
    })
}

pub fn role_program_from_row(row: &SqliteRow) -> Result<RoleProgram, AppError> {
    let role_code: String = column(row, "role_code")?;
    let program_id: String = column(row, "program_id")?;
    let authority_s: String = column(row, "role_authority")?;
    let use_yn: String = column(row, "use_yn")?;

    let authority = parse_authority(&authority_s, &format!("role_programs {role_code}/{program_id}"));

    Ok(RoleProgram {
        role_code,
        program_id,
        authority,
        use_yn: parse_yn(&use_yn),
    })
}

pub fn user_program_from_row(row: &SqliteRow) -> Result<UserProgram, AppError> {
    let user_id_s: String = column(row, "user_id")?;
    let program_id: String = column(row, "program_id")?;
    let authority_s: String = column(row, "user_authority")?;
    let begin_s: Option<String> = column(row, "valid_begin_date")?;
    let end_s: Option<String> = column(row, "valid_end_date")?;

    let user_id = parse_uuid(&user_id_s)?;
    let authority = parse_authority(&authority_s, &format!("user_programs {user_id}/{program_id}"));

    Ok(UserProgram {
        user_id,
        program_id,
        authority,
        valid_begin_date: parse_opt_date(begin_s)?,
        valid_end_date: parse_opt_date(end_s)?,
    })
}

pub fn menu_from_row(row: &SqliteRow) -> Result<Menu, AppError> {
    let id: i64 = column(row, "id")?;
    let parent_id: Option<i64> = column(row, "parent_id")?;
    let name: String = column(row, "menu_name")?;
    let sort_order: i64 = column(row, "sort_order")?;
    let use_yn: String = column(row, "use_yn")?;

    Ok(Menu {
        id,
        parent_id,
        name,
        sort_order,
        use_yn: parse_yn(&use_yn),
    })
}

pub fn favorite_from_row(row: &SqliteRow) -> Result<FavoriteMenu, AppError> {
    let user_id_s: String = column(row, "user_id")?;
    let menu_id: i64 = column(row, "menu_id")?;
    let created_at_s: String = column(row, "created_at")?;

    Ok(FavoriteMenu {
        user_id: parse_uuid(&user_id_s)?,
        menu_id,
        created_at: parse_datetime(&created_at_s)?,
    })
}

pub fn category_from_row(row: &SqliteRow) -> Result<Category, AppError> {
    let id: i64 = column(row, "id")?;
    let parent_id: Option<i64> = column(row, "parent_id")?;
    let name: String = column(row, "category_name")?;
    let sort_order: i64 = column(row, "sort_order")?;
    let use_yn: String = column(row, "use_yn")?;

    Ok(Category {
        id,
        parent_id,
        name,
        sort_order,
        use_yn: parse_yn(&use_yn),
    })
}

pub fn code_group_from_row(row: &SqliteRow) -> Result<CommonCodeGroup, AppError> {
    let group_code: String = column(row, "group_code")?;
    let group_name: String = column(row, "group_name")?;
    let sort_order: i64 = column(row, "sort_order")?;
    let use_yn: String = column(row, "use_yn")?;

    Ok(CommonCodeGroup {
        group_code,
        group_name,
        sort_order,
        use_yn: parse_yn(&use_yn),
    })
}

pub fn code_from_row(row: &SqliteRow) -> Result<CommonCode, AppError> {
    let group_code: String = column(row, "group_code")?;
    let code: String = column(row, "code")?;
    let code_name: String = column(row, "code_name")?;
    let sort_order: i64 = column(row, "sort_order")?;
    let use_yn: String = column(row, "use_yn")?;

    Ok(CommonCode {
        group_code,
        code,
        code_name,
        sort_order,
        use_yn: parse_yn(&use_yn),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yn_flags() {
        assert!(parse_yn("Y"));
        assert!(parse_yn(" y "));
        assert!(!parse_yn("N"));
        assert!(!parse_yn(""));
    }

    #[test]
    fn test_date_formats() {
        let day = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(parse_date("2025-01-31").unwrap(), day);
        assert_eq!(parse_date("20250131").unwrap(), day);
        assert_eq!(parse_date("2025-01-31 23:59:59").unwrap(), day);
        assert!(parse_date("31/01/2025").is_err());
        assert_eq!(parse_opt_date(Some("  ".to_string())).unwrap(), None);
    }

    #[test]
    fn test_unknown_authority_grants_nothing() {
        assert_eq!(parse_authority("write", "t"), AuthorityLevel::Write);
        assert_eq!(parse_authority("SUPERUSER", "t"), AuthorityLevel::None);
    }
}
