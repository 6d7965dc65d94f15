//! Read-only store surfaces the caller must provide.
//!
//! The core never persists its own durable state; people, blocks, templates,
//! assignments and absences are loaded through these ports and loaned to a
//! scheduling run read-only.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::domain::{Absence, Assignment, Block, Person, RotationTemplate};

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PersonStore: Send + Sync {
    /// List every person visible to the scheduling run
    async fn list(&self) -> anyhow::Result<Vec<Person>>;

    /// Get a person by id
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Person>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// List every block
    async fn list(&self) -> anyhow::Result<Vec<Block>>;

    /// List blocks whose date falls in `[start, end]`
    async fn list_by_range(&self, start: NaiveDate, end: NaiveDate) -> anyhow::Result<Vec<Block>>;

    /// Get a block by id
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Block>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// List every rotation template
    async fn list(&self) -> anyhow::Result<Vec<RotationTemplate>>;

    /// Get a template by id
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<RotationTemplate>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    /// List the current assignment set for a schedule
    async fn list(&self, schedule_id: Uuid) -> anyhow::Result<Vec<Assignment>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AbsenceStore: Send + Sync {
    /// List every absence
    async fn list(&self) -> anyhow::Result<Vec<Absence>>;

    /// List absences overlapping `[start, end]`
    async fn list_by_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> anyhow::Result<Vec<Absence>>;
}
