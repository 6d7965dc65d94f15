//! Assembles a `SchedulingContext` from the caller-provided stores.
//!
//! This service is the only component that touches all five read-only
//! stores; everything downstream works against the assembled, indexed
//! context.

use chrono::NaiveDate;
use std::sync::Arc;

use crate::domain::{CoreError, SchedulingContext, ShiftPreference};
use crate::ports::{AbsenceStore, BlockStore, PersonStore, TemplateStore};

pub struct ContextService {
    people: Arc<dyn PersonStore>,
    blocks: Arc<dyn BlockStore>,
    templates: Arc<dyn TemplateStore>,
    absences: Arc<dyn AbsenceStore>,
}

impl ContextService {
    pub fn new(
        people: Arc<dyn PersonStore>,
        blocks: Arc<dyn BlockStore>,
        templates: Arc<dyn TemplateStore>,
        absences: Arc<dyn AbsenceStore>,
    ) -> Self {
        Self {
            people,
            blocks,
            templates,
            absences,
        }
    }

    /// Load everything and build an indexed context. Preferences are passed
    /// by the caller; they live with the request, not in a store.
    pub async fn load(
        &self,
        preferences: Vec<ShiftPreference>,
    ) -> Result<SchedulingContext, CoreError> {
        let people = self.people.list().await?;
        let blocks = self.blocks.list().await?;
        let templates = self.templates.list().await?;
        let absences = self.absences.list().await?;
        tracing::debug!(
            people = people.len(),
            blocks = blocks.len(),
            templates = templates.len(),
            absences = absences.len(),
            "context loaded"
        );
        SchedulingContext::new(people, blocks, templates, absences, preferences)
    }

    /// Load a date-bounded context: blocks and absences are range-filtered
    /// by the stores.
    pub async fn load_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        preferences: Vec<ShiftPreference>,
    ) -> Result<SchedulingContext, CoreError> {
        let people = self.people.list().await?;
        let blocks = self.blocks.list_by_range(start, end).await?;
        let templates = self.templates.list().await?;
        let absences = self.absences.list_by_range(start, end).await?;
        SchedulingContext::new(people, blocks, templates, absences, preferences)
    }
}
