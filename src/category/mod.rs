//! Category tree: the same hierarchical rules as menus, without permissions.

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::{AppError, AppResult};
use crate::models::category::{Category, CategoryTreeItem};
use crate::tree::{TreeCache, TreeIndex};

#[async_trait]
pub trait CategorySource: Send + Sync {
    async fn categories(&self) -> AppResult<Vec<Category>>;
}

pub struct CategoryTree<S: CategorySource + ?Sized> {
    source: Arc<S>,
    cache: Arc<TreeCache<Category>>,
}

impl<S: CategorySource + ?Sized> CategoryTree<S> {
    pub fn new(source: Arc<S>, cache: Arc<TreeCache<Category>>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<TreeCache<Category>> {
        &self.cache
    }

    pub async fn index(&self) -> AppResult<Arc<TreeIndex<Category>>> {
        let source = Arc::clone(&self.source);
        self.cache
            .get_or_build(|| async move { source.categories().await })
            .await
    }

    /// Categories that are enabled along with every ancestor.
    pub async fn active_tree(&self) -> AppResult<TreeIndex<Category>> {
        Ok(self.index().await?.retain_enabled())
    }

    /// Pre-order active subtree rooted at `id`. An unknown category and one
    /// hidden by a disabled ancestor both report NotFound.
    pub async fn active_subtree(&self, id: i64) -> AppResult<Vec<Category>> {
        let active = self.active_tree().await?;
        let nodes = active
            .subtree(id)
            .map_err(|_| AppError::not_found(format!("category {id} not found")))?;
        Ok(nodes.into_iter().cloned().collect())
    }

    /// Root-to-category breadcrumb, regardless of enable flags.
    pub async fn path(&self, id: i64) -> AppResult<Vec<Category>> {
        let index = self.index().await?;
        Ok(index.path_to(id)?.into_iter().cloned().collect())
    }

    /// Deleting a category that still has children is a structural error.
    pub async fn check_deletable(&self, id: i64) -> AppResult<()> {
        let index = self.index().await?;
        index.ensure_leaf(id)?;
        Ok(())
    }
}

pub fn to_items(tree: &TreeIndex<Category>) -> Vec<CategoryTreeItem> {
    tree.fold_nested(&|category: &Category, children: Vec<CategoryTreeItem>| CategoryTreeItem {
        id: category.id,
        name: category.name.clone(),
        sort_order: category.sort_order,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn tree() -> CategoryTree<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.put_category(Category::new(1, None, "Apparel", 0));
        store.put_category(Category::new(2, Some(1), "Outerwear", 1));
        store.put_category(Category::new(3, Some(2), "Jackets", 0));
        store.put_category(Category::new(4, Some(1), "Shoes", 0).disabled());
        store.put_category(Category::new(5, Some(4), "Boots", 0));
        CategoryTree::new(store, Arc::new(TreeCache::new(true)))
    }

    #[tokio::test]
    async fn test_disabled_branch_is_hidden() {
        let tree = tree();
        let active = tree.active_tree().await.unwrap();
        let ids: Vec<i64> = active.walk().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let items = to_items(&active);
        assert_eq!(items[0].children[0].children[0].name, "Jackets");
    }

    #[tokio::test]
    async fn test_subtree_under_disabled_ancestor_is_not_found() {
        let tree = tree();
        assert!(tree.active_subtree(5).await.unwrap_err().is_not_found());
        let ids: Vec<i64> = tree.active_subtree(2).await.unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_path_and_delete_check() {
        let tree = tree();
        let names: Vec<String> = tree.path(3).await.unwrap().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["Apparel", "Outerwear", "Jackets"]);

        assert!(matches!(
            tree.check_deletable(2).await,
            Err(AppError::StructuralIntegrity(_))
        ));
        tree.check_deletable(3).await.unwrap();
    }
}
