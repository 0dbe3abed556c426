//! In-memory implementation of every read trait, for tests and embedding.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::GrantStore;
use crate::category::CategorySource;
use crate::codes::CodeSource;
use crate::errors::AppResult;
use crate::menu::{MenuSource, ProgramMapping};
use crate::models::category::Category;
use crate::models::code::{CommonCode, CommonCodeGroup};
use crate::models::menu::{FavoriteMenu, Menu};
use crate::models::program::{Program, RoleProgram, UserProgram};
use crate::utils::utc_now;

#[derive(Debug, Default)]
struct MemoryData {
    programs: BTreeMap<String, Program>,
    user_roles: BTreeSet<(Uuid, String)>,
    role_programs: BTreeMap<(String, String), RoleProgram>,
    user_programs: BTreeMap<(Uuid, String), UserProgram>,
    menus: BTreeMap<i64, Menu>,
    menu_programs: ProgramMapping,
    favorites: BTreeMap<(Uuid, i64), FavoriteMenu>,
    categories: BTreeMap<i64, Category>,
    groups: BTreeMap<String, CommonCodeGroup>,
    codes: BTreeMap<(String, String), CommonCode>,
}

/// Keyed like the relational schema: writing an existing key replaces the row.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<MemoryData>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn put_program(&self, program: Program) {
        self.write().programs.insert(program.program_id.clone(), program);
    }

    pub fn assign_role(&self, user_id: Uuid, role_code: &str) {
        self.write().user_roles.insert((user_id, role_code.to_string()));
    }

    pub fn revoke_role(&self, user_id: Uuid, role_code: &str) {
        self.write().user_roles.remove(&(user_id, role_code.to_string()));
    }

    pub fn put_role_grant(&self, grant: RoleProgram) {
        let key = (grant.role_code.clone(), grant.program_id.clone());
        self.write().role_programs.insert(key, grant);
    }

    /// Removes a role and, with it, the role's grants and memberships.
    pub fn delete_role(&self, role_code: &str) {
        let mut data = self.write();
        data.role_programs.retain(|(role, _), _| role != role_code);
        data.user_roles.retain(|(_, role)| role != role_code);
    }

    pub fn put_override(&self, ov: UserProgram) {
        let key = (ov.user_id, ov.program_id.clone());
        self.write().user_programs.insert(key, ov);
    }

    pub fn remove_override(&self, user_id: Uuid, program_id: &str) {
        self.write().user_programs.remove(&(user_id, program_id.to_string()));
    }

    pub fn put_menu(&self, menu: Menu, program_id: Option<&str>) {
        let mut data = self.write();
        match program_id {
            Some(program_id) => {
                data.menu_programs.insert(menu.id, program_id.to_string());
            }
            None => {
                data.menu_programs.remove(&menu.id);
            }
        }
        data.menus.insert(menu.id, menu);
    }

    pub fn add_favorite(&self, user_id: Uuid, menu_id: i64) {
        self.write()
            .favorites
            .entry((user_id, menu_id))
            .or_insert_with(|| FavoriteMenu {
                user_id,
                menu_id,
                created_at: utc_now(),
            });
    }

    pub fn put_category(&self, category: Category) {
        self.write().categories.insert(category.id, category);
    }

    pub fn put_group(&self, group: CommonCodeGroup) {
        self.write().groups.insert(group.group_code.clone(), group);
    }

    pub fn put_code(&self, code: CommonCode) {
        let key = (code.group_code.clone(), code.code.clone());
        self.write().codes.insert(key, code);
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn program(&self, program_id: &str) -> AppResult<Option<Program>> {
        Ok(self.read().programs.get(program_id).cloned())
    }

    async fn programs(&self, program_ids: &BTreeSet<String>) -> AppResult<Vec<Program>> {
        let data = self.read();
        Ok(program_ids
            .iter()
            .filter_map(|id| data.programs.get(id).cloned())
            .collect())
    }

    async fn role_codes(&self, user_id: Uuid) -> AppResult<BTreeSet<String>> {
        Ok(self
            .read()
            .user_roles
            .iter()
            .filter(|(user, _)| *user == user_id)
            .map(|(_, role)| role.clone())
            .collect())
    }

    async fn role_grants(
        &self,
        role_codes: &BTreeSet<String>,
        program_id: &str,
    ) -> AppResult<Vec<RoleProgram>> {
        let data = self.read();
        Ok(role_codes
            .iter()
            .filter_map(|role| {
                data.role_programs
                    .get(&(role.clone(), program_id.to_string()))
                    .cloned()
            })
            .collect())
    }

    async fn role_grants_for_roles(&self, role_codes: &BTreeSet<String>) -> AppResult<Vec<RoleProgram>> {
        Ok(self
            .read()
            .role_programs
            .values()
            .filter(|grant| role_codes.contains(&grant.role_code))
            .cloned()
            .collect())
    }

    async fn user_override(&self, user_id: Uuid, program_id: &str) -> AppResult<Option<UserProgram>> {
        Ok(self
            .read()
            .user_programs
            .get(&(user_id, program_id.to_string()))
            .cloned())
    }

    async fn user_overrides(&self, user_id: Uuid) -> AppResult<Vec<UserProgram>> {
        Ok(self
            .read()
            .user_programs
            .values()
            .filter(|ov| ov.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl MenuSource for MemoryStore {
    async fn menus(&self) -> AppResult<Vec<Menu>> {
        Ok(self.read().menus.values().cloned().collect())
    }

    async fn program_mapping(&self) -> AppResult<ProgramMapping> {
        Ok(self.read().menu_programs.clone())
    }

    async fn favorites(&self, user_id: Uuid) -> AppResult<Vec<FavoriteMenu>> {
        Ok(self
            .read()
            .favorites
            .values()
            .filter(|fav| fav.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CategorySource for MemoryStore {
    async fn categories(&self) -> AppResult<Vec<Category>> {
        Ok(self.read().categories.values().cloned().collect())
    }
}

#[async_trait]
impl CodeSource for MemoryStore {
    async fn group(&self, group_code: &str) -> AppResult<Option<CommonCodeGroup>> {
        Ok(self.read().groups.get(group_code).cloned())
    }

    async fn groups(&self) -> AppResult<Vec<CommonCodeGroup>> {
        Ok(self.read().groups.values().cloned().collect())
    }

    async fn codes(&self, group_code: &str) -> AppResult<Vec<CommonCode>> {
        Ok(self
            .read()
            .codes
            .values()
            .filter(|code| code.group_code == group_code)
            .cloned()
            .collect())
    }

    async fn code(&self, group_code: &str, code: &str) -> AppResult<Option<CommonCode>> {
        Ok(self
            .read()
            .codes
            .get(&(group_code.to_string(), code.to_string()))
            .cloned())
    }
}
