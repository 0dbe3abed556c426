//! Menu visibility: which menu nodes a user may see.
//!
//! A menu mapped to a program is visible only while the user resolves to more
//! than NONE on that program. Folders are visible only through a visible
//! descendant, and a disabled menu hides its entire subtree.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::authz::{AuthorityLevel, GrantSnapshot, GrantStore, PermissionResolver};
use crate::errors::AppResult;
use crate::models::menu::{FavoriteMenu, Menu, MenuTreeItem};
use crate::tree::{TreeCache, TreeIndex};

/// Menu id -> program id, supplied by the host.
pub type ProgramMapping = HashMap<i64, String>;

#[async_trait]
pub trait MenuSource: Send + Sync {
    async fn menus(&self) -> AppResult<Vec<Menu>>;

    async fn program_mapping(&self) -> AppResult<ProgramMapping>;

    async fn favorites(&self, user_id: Uuid) -> AppResult<Vec<FavoriteMenu>>;
}

/// The pruned menu forest plus the program decision behind each mapped node.
#[derive(Debug, Clone)]
pub struct VisibleMenus {
    pub tree: TreeIndex<Menu>,
    pub programs: HashMap<i64, (String, AuthorityLevel)>,
}

impl VisibleMenus {
    pub fn to_items(&self) -> Vec<MenuTreeItem> {
        self.tree.fold_nested(&|menu: &Menu, children: Vec<MenuTreeItem>| {
            let program = self.programs.get(&menu.id);
            MenuTreeItem {
                id: menu.id,
                name: menu.name.clone(),
                sort_order: menu.sort_order,
                program_id: program.map(|(program_id, _)| program_id.clone()),
                authority: program.map(|(_, authority)| *authority),
                children,
            }
        })
    }
}

/// Computes the visible forest from an already-built index and grant snapshot.
///
/// The snapshot must contain every program named by `mapping` for nodes of
/// `index`; a mapped program that does not exist is reported as NotFound.
pub fn visible_menus(
    index: &TreeIndex<Menu>,
    mapping: &ProgramMapping,
    snapshot: &GrantSnapshot,
    as_of: DateTime<Utc>,
) -> AppResult<VisibleMenus> {
    let enabled = index.retain_enabled();

    let mut decided = HashMap::new();
    for menu in enabled.walk() {
        if let Some(program_id) = mapping.get(&menu.id) {
            let resolution = snapshot.resolve(program_id, as_of)?;
            decided.insert(menu.id, (program_id.clone(), resolution.authority));
        }
    }

    // Leaf status comes from the full index: a folder emptied by disabled
    // children is still a folder and needs a visible descendant.
    let tree = enabled.prune(|menu| {
        if !menu.use_yn {
            return false;
        }
        match decided.get(&menu.id) {
            Some((_, authority)) => authority.is_granted(),
            None => index.is_leaf(menu.id),
        }
    });
    decided.retain(|id, _| tree.contains(*id));

    tracing::debug!(
        user_id = %snapshot.user_id(),
        total = index.len(),
        visible = tree.len(),
        "menu visibility computed"
    );

    Ok(VisibleMenus {
        tree,
        programs: decided,
    })
}

pub struct MenuVisibilityEngine<G, M>
where
    G: GrantStore + ?Sized,
    M: MenuSource + ?Sized,
{
    resolver: PermissionResolver<G>,
    source: Arc<M>,
    cache: Arc<TreeCache<Menu>>,
}

impl<G, M> MenuVisibilityEngine<G, M>
where
    G: GrantStore + ?Sized,
    M: MenuSource + ?Sized,
{
    pub fn new(resolver: PermissionResolver<G>, source: Arc<M>, cache: Arc<TreeCache<Menu>>) -> Self {
        Self {
            resolver,
            source,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<TreeCache<Menu>> {
        &self.cache
    }

    /// The full (unpruned) menu index, from cache when warm.
    pub async fn menu_index(&self) -> AppResult<Arc<TreeIndex<Menu>>> {
        let source = Arc::clone(&self.source);
        self.cache
            .get_or_build(|| async move { source.menus().await })
            .await
    }

    pub async fn visible_menu_tree(&self, user_id: Uuid, as_of: DateTime<Utc>) -> AppResult<VisibleMenus> {
        let index = self.menu_index().await?;
        self.visible_in(&index, user_id, as_of).await
    }

    async fn visible_in(
        &self,
        index: &TreeIndex<Menu>,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> AppResult<VisibleMenus> {
        let mapping = self.source.program_mapping().await?;
        let programs: BTreeSet<String> = mapping
            .iter()
            .filter(|(menu_id, _)| index.contains(**menu_id))
            .map(|(_, program_id)| program_id.clone())
            .collect();

        let snapshot = self.resolver.snapshot(user_id, &programs).await?;
        visible_menus(index, &mapping, &snapshot, as_of)
    }

    /// The user's favorites that are currently visible, in menu tree order.
    /// Favorites pointing at a menu that no longer exists are skipped.
    pub async fn visible_favorites(&self, user_id: Uuid, as_of: DateTime<Utc>) -> AppResult<Vec<Menu>> {
        let index = self.menu_index().await?;
        let favorites = self.source.favorites(user_id).await?;

        let mut wanted = HashSet::new();
        for favorite in favorites {
            if index.contains(favorite.menu_id) {
                wanted.insert(favorite.menu_id);
            } else {
                tracing::warn!(
                    user_id = %user_id,
                    menu_id = favorite.menu_id,
                    "favorite references a missing menu"
                );
            }
        }
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let visible = self.visible_in(&index, user_id, as_of).await?;
        Ok(visible
            .tree
            .walk()
            .into_iter()
            .filter(|menu| wanted.contains(&menu.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::program::{Program, RoleProgram};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn ids(visible: &VisibleMenus) -> Vec<i64> {
        visible.tree.walk().iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_branch_without_accessible_leaf_is_pruned() {
        // Root(1) -> A(2) -> B(3, P); Root(1) -> C(4, Q)
        let index = TreeIndex::build(vec![
            Menu::new(1, None, "Root", 0),
            Menu::new(2, Some(1), "A", 0),
            Menu::new(3, Some(2), "B", 0),
            Menu::new(4, Some(1), "C", 1),
        ])
        .unwrap();
        let mapping: ProgramMapping =
            [(3, "P".to_string()), (4, "Q".to_string())].into_iter().collect();
        let snapshot = GrantSnapshot::new(Uuid::new_v4(), vec!["R".to_string()])
            .with_program(Program::new("P", "P"))
            .with_program(Program::new("Q", "Q"))
            .with_role_grant(RoleProgram::new("R", "Q", AuthorityLevel::Read));

        let visible = visible_menus(&index, &mapping, &snapshot, now()).unwrap();
        assert_eq!(ids(&visible), vec![1, 4]);
        assert_eq!(
            visible.programs.get(&4),
            Some(&("Q".to_string(), AuthorityLevel::Read))
        );
        assert!(!visible.programs.contains_key(&3));
    }

    #[test]
    fn test_disabled_parent_hides_granted_children() {
        let index = TreeIndex::build(vec![
            Menu::new(1, None, "Root", 0),
            Menu::new(2, Some(1), "Folder", 0).disabled(),
            Menu::new(3, Some(2), "Screen", 0),
            Menu::new(4, Some(1), "Plain", 1),
        ])
        .unwrap();
        let mapping: ProgramMapping = [(3, "P".to_string())].into_iter().collect();
        let snapshot = GrantSnapshot::new(Uuid::new_v4(), vec!["R".to_string()])
            .with_program(Program::new("P", "P"))
            .with_role_grant(RoleProgram::new("R", "P", AuthorityLevel::Admin));

        let visible = visible_menus(&index, &mapping, &snapshot, now()).unwrap();
        assert_eq!(ids(&visible), vec![1, 4]);
    }

    #[test]
    fn test_folder_with_only_disabled_children_is_dropped() {
        let index = TreeIndex::build(vec![
            Menu::new(1, None, "Settings", 0),
            Menu::new(2, Some(1), "Folder", 0),
            Menu::new(3, Some(2), "Screen", 0).disabled(),
        ])
        .unwrap();
        let snapshot = GrantSnapshot::new(Uuid::new_v4(), Vec::new());

        let visible = visible_menus(&index, &ProgramMapping::new(), &snapshot, now()).unwrap();
        assert!(visible.tree.is_empty(), "unexpected visible ids {:?}", ids(&visible));
    }

    #[test]
    fn test_closed_program_hides_menu() {
        let index = TreeIndex::build(vec![Menu::new(1, None, "Orders", 0)]).unwrap();
        let mapping: ProgramMapping = [(1, "ORD".to_string())].into_iter().collect();
        let snapshot = GrantSnapshot::new(Uuid::new_v4(), vec!["R".to_string()])
            .with_program(Program::new("ORD", "Orders").closed())
            .with_role_grant(RoleProgram::new("R", "ORD", AuthorityLevel::Admin));

        let visible = visible_menus(&index, &mapping, &snapshot, now()).unwrap();
        assert!(visible.tree.is_empty());
    }

    #[test]
    fn test_mapping_to_missing_program_is_an_error() {
        let index = TreeIndex::build(vec![Menu::new(1, None, "Ghost", 0)]).unwrap();
        let mapping: ProgramMapping = [(1, "GONE".to_string())].into_iter().collect();
        let snapshot = GrantSnapshot::new(Uuid::new_v4(), Vec::new());

        let err = visible_menus(&index, &mapping, &snapshot, now()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_nested_items_carry_authority() {
        let index = TreeIndex::build(vec![
            Menu::new(1, None, "Catalog", 0),
            Menu::new(2, Some(1), "Products", 0),
        ])
        .unwrap();
        let mapping: ProgramMapping = [(2, "PRD".to_string())].into_iter().collect();
        let snapshot = GrantSnapshot::new(Uuid::new_v4(), vec!["R".to_string()])
            .with_program(Program::new("PRD", "Products"))
            .with_role_grant(RoleProgram::new("R", "PRD", AuthorityLevel::Write));

        let items = visible_menus(&index, &mapping, &snapshot, now())
            .unwrap()
            .to_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Catalog");
        assert_eq!(items[0].authority, None);
        assert_eq!(items[0].children[0].authority, Some(AuthorityLevel::Write));
    }
}
