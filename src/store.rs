use std::collections::BTreeMap;

use futures::TryStreamExt;
use mongodb::{
    bson::{doc, Document},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::{
    error::SplitError,
    schemas::{Expense, Group},
};

const GROUPS_COLLECTION: &str = "groups";
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("group \"{0}\" not found!")]
    GroupNotFound(String),
    #[error("group \"{0}\" already present!")]
    GroupExists(String),
    #[error("expense \"{expense}\" not found in group \"{group}\"")]
    ExpenseNotFound { group: String, expense: String },
    #[error(transparent)]
    Split(#[from] SplitError),
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] bson::ser::Error),
}

/// Where groups and their expenses live.
///
/// Expenses are embedded in their group document, so deleting a group
/// deletes its expenses with it.
pub enum GroupStore {
    Mongo(Collection<Group>),
    Memory(RwLock<BTreeMap<String, Group>>),
}

impl GroupStore {
    /// Opens the groups collection, making sure group ids are unique.
    pub async fn mongo(client: &Client, database: &str) -> Result<Self, StoreError> {
        let groups: Collection<Group> = client.database(database).collection(GROUPS_COLLECTION);
        let unique_id = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        groups.create_index(unique_id, None).await?;
        Ok(Self::Mongo(groups))
    }

    pub fn in_memory() -> Self {
        Self::Memory(RwLock::new(BTreeMap::new()))
    }

    pub async fn create_group(&self, group: Group) -> Result<Group, StoreError> {
        match self {
            Self::Mongo(groups) => match groups.insert_one(group.clone(), None).await {
                Ok(_) => Ok(group),
                Err(err) if is_duplicate_key(&err) => Err(StoreError::GroupExists(group.id)),
                Err(err) => Err(err.into()),
            },
            Self::Memory(groups) => {
                let mut groups = groups.write().await;
                if groups.contains_key(&group.id) {
                    return Err(StoreError::GroupExists(group.id));
                }
                groups.insert(group.id.clone(), group.clone());
                Ok(group)
            }
        }
    }

    pub async fn get_group(&self, id: &str) -> Result<Group, StoreError> {
        let group = match self {
            Self::Mongo(groups) => groups.find_one(by_id(id), None).await?,
            Self::Memory(groups) => groups.read().await.get(id).cloned(),
        };
        group.ok_or_else(|| StoreError::GroupNotFound(id.to_string()))
    }

    /// Lists groups, restricted to those created by `owner` when given.
    pub async fn list_groups(&self, owner: Option<&str>) -> Result<Vec<Group>, StoreError> {
        match self {
            Self::Mongo(groups) => {
                let filter = match owner {
                    Some(owner) => doc! { "owner": owner },
                    None => doc! {},
                };
                Ok(groups.find(filter, None).await?.try_collect().await?)
            }
            Self::Memory(groups) => Ok(groups
                .read()
                .await
                .values()
                .filter(|group| owner.is_none() || group.owner.as_deref() == owner)
                .cloned()
                .collect()),
        }
    }

    pub async fn delete_group(&self, id: &str) -> Result<(), StoreError> {
        let deleted = match self {
            Self::Mongo(groups) => groups.delete_one(by_id(id), None).await?.deleted_count > 0,
            Self::Memory(groups) => groups.write().await.remove(id).is_some(),
        };
        if deleted {
            Ok(())
        } else {
            Err(StoreError::GroupNotFound(id.to_string()))
        }
    }

    /// Validates `expense` against the stored group and appends it.
    pub async fn add_expense(
        &self,
        group_id: &str,
        expense: Expense,
    ) -> Result<Expense, StoreError> {
        match self {
            Self::Mongo(groups) => {
                let group = self.get_group(group_id).await?;
                group.check_new_expense(&expense)?;
                let document = bson::to_bson(&expense)?;
                // Members never change after creation; the expense id is
                // rechecked by the filter so concurrent adds cannot both land.
                let pushed = groups
                    .update_one(
                        push_expense_filter(group_id, &expense.id),
                        doc! { "$push": { "expenses": document } },
                        None,
                    )
                    .await?;
                if pushed.matched_count > 0 {
                    return Ok(expense);
                }
                match groups.find_one(by_id(group_id), None).await? {
                    None => Err(StoreError::GroupNotFound(group_id.to_string())),
                    Some(_) => Err(SplitError::DuplicateExpense(expense.id).into()),
                }
            }
            Self::Memory(groups) => {
                let mut groups = groups.write().await;
                let group = groups
                    .get_mut(group_id)
                    .ok_or_else(|| StoreError::GroupNotFound(group_id.to_string()))?;
                group.add_expense(expense.clone())?;
                Ok(expense)
            }
        }
    }

    pub async fn remove_expense(&self, group_id: &str, expense_id: &str) -> Result<(), StoreError> {
        let not_found = || StoreError::ExpenseNotFound {
            group: group_id.to_string(),
            expense: expense_id.to_string(),
        };
        match self {
            Self::Mongo(groups) => {
                let pulled = groups
                    .update_one(
                        by_id(group_id),
                        doc! { "$pull": { "expenses": { "id": expense_id } } },
                        None,
                    )
                    .await?;
                if pulled.matched_count == 0 {
                    Err(StoreError::GroupNotFound(group_id.to_string()))
                } else if pulled.modified_count == 0 {
                    Err(not_found())
                } else {
                    Ok(())
                }
            }
            Self::Memory(groups) => {
                let mut groups = groups.write().await;
                let group = groups
                    .get_mut(group_id)
                    .ok_or_else(|| StoreError::GroupNotFound(group_id.to_string()))?;
                group.remove_expense(expense_id).map(|_| ()).ok_or_else(not_found)
            }
        }
    }
}

fn by_id(id: &str) -> Document {
    doc! { "id": id }
}

/// Matches the group only while it has no expense with `expense_id` yet.
fn push_expense_filter(group_id: &str, expense_id: &str) -> Document {
    doc! { "id": group_id, "expenses.id": { "$ne": expense_id } }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::tests::expense;

    fn trip() -> Group {
        Group::new(
            "trip",
            "Trip to NYC",
            ["john", "sarah", "mike"].map(String::from),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn groups_can_be_created_once() {
        let store = GroupStore::in_memory();
        store.create_group(trip()).await.unwrap();
        let err = store.create_group(trip()).await.unwrap_err();
        assert!(matches!(err, StoreError::GroupExists(id) if id == "trip"));
        assert_eq!(store.get_group("trip").await.unwrap(), trip());
    }

    #[tokio::test]
    async fn listing_filters_by_owner() {
        let store = GroupStore::in_memory();
        store.create_group(trip().with_owner("alice")).await.unwrap();
        let mut flat = Group::new("flat", "Flat", ["a".to_string()]).unwrap();
        flat.owner = Some("bob".to_string());
        store.create_group(flat).await.unwrap();

        assert_eq!(store.list_groups(None).await.unwrap().len(), 2);
        let alice = store.list_groups(Some("alice")).await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].id, "trip");
        assert!(store.list_groups(Some("carol")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expenses_are_validated_before_storing() {
        let store = GroupStore::in_memory();
        store.create_group(trip()).await.unwrap();

        store
            .add_expense("trip", expense("hotel", 800, "mike", &["john", "mike"]))
            .await
            .unwrap();
        let err = store
            .add_expense("trip", expense("bar", 200, "emma", &["john"]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Split(SplitError::InvalidReference { .. })));

        let group = store.get_group("trip").await.unwrap();
        assert_eq!(group.expenses.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_adds_of_one_expense_store_it_once() {
        let store = GroupStore::in_memory();
        store.create_group(trip()).await.unwrap();

        let (first, second) = tokio::join!(
            store.add_expense("trip", expense("hotel", 800, "mike", &["john", "mike"])),
            store.add_expense("trip", expense("hotel", 500, "john", &["sarah"])),
        );
        let failures: Vec<_> = [first, second].into_iter().filter_map(Result::err).collect();
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0],
            StoreError::Split(SplitError::DuplicateExpense(id)) if id == "hotel"
        ));
        assert_eq!(store.get_group("trip").await.unwrap().expenses.len(), 1);
    }

    #[test]
    fn expense_push_only_matches_groups_without_that_expense() {
        assert_eq!(
            push_expense_filter("trip", "hotel"),
            doc! { "id": "trip", "expenses.id": { "$ne": "hotel" } }
        );
    }

    #[tokio::test]
    async fn removing_expenses_and_groups() {
        let store = GroupStore::in_memory();
        store.create_group(trip()).await.unwrap();
        store
            .add_expense("trip", expense("hotel", 800, "mike", &["john", "mike"]))
            .await
            .unwrap();

        store.remove_expense("trip", "hotel").await.unwrap();
        assert!(matches!(
            store.remove_expense("trip", "hotel").await,
            Err(StoreError::ExpenseNotFound { .. })
        ));

        store.delete_group("trip").await.unwrap();
        assert!(matches!(
            store.get_group("trip").await,
            Err(StoreError::GroupNotFound(_))
        ));
        assert!(matches!(
            store.add_expense("trip", expense("x", 1, "john", &["john"])).await,
            Err(StoreError::GroupNotFound(_))
        ));
    }
}
