//! Mentor-owned weekly availability templates and their expansion into
//! AVAILABLE sessions over a date range.

use chrono::{Datelike, NaiveDate};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait,
};
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::config::SchedulingConfig;
use crate::directory::{ensure_mentor, MentorDirectory};
use crate::entity::availability_template::{self, Entity as TemplateEntity};
use crate::error::{backend, invalid_request, Error, ErrorCode, Result};
use crate::lifecycle::{validate_duration, validate_policy, SessionDraft, SessionStateMachine};
use crate::model::{AvailabilityTemplate, GenerationReport};
use crate::sequence::{SequenceAllocator, AVAILABILITY_TEMPLATES};

fn template_not_found() -> Error {
    Error::rejected(
        ErrorCode::AvailabilityTemplateNotFound,
        "Template not found or access denied",
    )
}

/// Inclusive day range, rejecting reversed bounds and ranges wider than
/// the configured horizon.
pub(crate) fn days_between(
    config: &SchedulingConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<impl Iterator<Item = NaiveDate>> {
    if end < start {
        return Err(invalid_request(format!(
            "End date {end} is before start date {start}"
        )));
    }
    if end.signed_duration_since(start).num_days() > config.max_horizon_days {
        return Err(invalid_request(format!(
            "Date range may span at most {} days",
            config.max_horizon_days
        )));
    }
    Ok(start.iter_days().take_while(move |day| *day <= end))
}

/// Stores templates and applies them to calendar ranges.
#[derive(Debug, Clone, Copy)]
pub struct TemplateEngine<'a> {
    conn: &'a DatabaseConnection,
    mentors: &'a dyn MentorDirectory,
    config: &'a SchedulingConfig,
    sessions: SessionStateMachine<'a>,
}

impl<'a> TemplateEngine<'a> {
    pub fn new(
        conn: &'a DatabaseConnection,
        mentors: &'a dyn MentorDirectory,
        clock: &'a dyn Clock,
        config: &'a SchedulingConfig,
    ) -> Self {
        Self {
            conn,
            mentors,
            config,
            sessions: SessionStateMachine::new(conn, clock, config),
        }
    }

    /// Creates or replaces a template owned by `mentor_id`.
    ///
    /// A new id is allocated only when `template.id` is `None`. Saving a
    /// default template clears the previous default in the same
    /// transaction, under the mentor's schedule lock, so readers always see
    /// at most one default.
    #[instrument(skip(self, template), fields(name = %template.template_name))]
    pub async fn save(&self, template: AvailabilityTemplate, mentor_id: i64) -> Result<AvailabilityTemplate> {
        ensure_mentor(self.mentors, mentor_id).await?;
        self.validate(&template)?;

        let txn = self.conn.begin().await.map_err(backend)?;
        SequenceAllocator.lock_mentor(&txn, mentor_id).await?;

        let existing = match template.id {
            Some(id) => Some(
                TemplateEntity::find_by_id(id)
                    .filter(availability_template::Column::MentorId.eq(mentor_id))
                    .one(&txn)
                    .await
                    .map_err(backend)?
                    .ok_or_else(template_not_found)?,
            ),
            None => None,
        };
        let id = match &existing {
            Some(row) => row.id,
            None => SequenceAllocator.next(&txn, AVAILABILITY_TEMPLATES).await?,
        };

        if template.is_default {
            TemplateEntity::update_many()
                .col_expr(availability_template::Column::IsDefault, Expr::value(false))
                .filter(availability_template::Column::MentorId.eq(mentor_id))
                .filter(availability_template::Column::IsDefault.eq(true))
                .filter(availability_template::Column::Id.ne(id))
                .exec(&txn)
                .await
                .map_err(backend)?;
        }

        let active = template.to_active_model(id, mentor_id)?;
        let saved = match existing {
            Some(_) => active.update(&txn).await,
            None => active.insert(&txn).await,
        }
        .map_err(backend)?;

        txn.commit().await.map_err(backend)?;
        info!(template_id = id, mentor_id, is_default = saved.is_default, "template saved");
        AvailabilityTemplate::try_from(saved)
    }

    fn validate(&self, template: &AvailabilityTemplate) -> Result<()> {
        if template.template_name.trim().is_empty() {
            return Err(invalid_request("Template name is required"));
        }
        validate_duration(self.config, template.default_duration_minutes)?;
        validate_policy(self.config, &template.policy)?;
        for day in &template.daily_availabilities {
            for window in &day.time_slots {
                if window.end_time <= window.start_time {
                    return Err(invalid_request(format!(
                        "Window on {} ends at {} before it starts at {}",
                        day.day_of_week, window.end_time, window.start_time
                    )));
                }
                if let Some(minutes) = window.session_duration_minutes {
                    validate_duration(self.config, minutes)?;
                }
            }
        }
        Ok(())
    }

    /// Template `id` if it belongs to `mentor_id`.
    pub async fn get(&self, id: i64, mentor_id: i64) -> Result<AvailabilityTemplate> {
        let row = TemplateEntity::find_by_id(id)
            .filter(availability_template::Column::MentorId.eq(mentor_id))
            .one(self.conn)
            .await
            .map_err(backend)?
            .ok_or_else(template_not_found)?;
        AvailabilityTemplate::try_from(row)
    }

    /// Active templates of a mentor, by id.
    pub async fn list(&self, mentor_id: i64) -> Result<Vec<AvailabilityTemplate>> {
        TemplateEntity::find()
            .filter(availability_template::Column::MentorId.eq(mentor_id))
            .filter(availability_template::Column::IsActive.eq(true))
            .order_by_asc(availability_template::Column::Id)
            .all(self.conn)
            .await
            .map_err(backend)?
            .into_iter()
            .map(AvailabilityTemplate::try_from)
            .collect()
    }

    pub async fn default_for(&self, mentor_id: i64) -> Result<Option<AvailabilityTemplate>> {
        TemplateEntity::find()
            .filter(availability_template::Column::MentorId.eq(mentor_id))
            .filter(availability_template::Column::IsDefault.eq(true))
            .one(self.conn)
            .await
            .map_err(backend)?
            .map(AvailabilityTemplate::try_from)
            .transpose()
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64, mentor_id: i64) -> Result<()> {
        let deleted = TemplateEntity::delete_many()
            .filter(availability_template::Column::Id.eq(id))
            .filter(availability_template::Column::MentorId.eq(mentor_id))
            .exec(self.conn)
            .await
            .map_err(backend)?;
        if deleted.rows_affected == 0 {
            return Err(template_not_found());
        }
        info!(template_id = id, mentor_id, "template deleted");
        Ok(())
    }

    /// Expands template `id` over `[start, end]` into AVAILABLE sessions.
    ///
    /// Each open window yields one candidate at its start time. Candidates
    /// that overlap an active session are skipped and reported, not
    /// treated as errors.
    #[instrument(skip(self))]
    pub async fn apply(
        &self,
        id: i64,
        mentor_id: i64,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<GenerationReport> {
        let template = self.get(id, mentor_id).await?;

        let mut drafts = Vec::new();
        for day in days_between(self.config, start, end)? {
            let Some(daily) = template.day(day.weekday()) else {
                continue;
            };
            for window in &daily.time_slots {
                let duration = window
                    .session_duration_minutes
                    .unwrap_or(template.default_duration_minutes);
                let mut draft = SessionDraft::new(
                    mentor_id,
                    day.and_time(window.start_time),
                    duration,
                    template.policy.clone(),
                );
                draft.availability_template = Some(template.template_name.clone());
                draft.session_title = window.session_title.clone();
                draft.session_description = window.session_description.clone();
                drafts.push(draft);
                if drafts.len() > self.config.max_candidates_per_request {
                    return Err(too_many_candidates(self.config));
                }
            }
        }

        let report = self.sessions.place_all(drafts).await?;
        info!(
            template_id = id,
            mentor_id,
            created = report.created.len(),
            skipped = report.skipped.len(),
            "template applied"
        );
        Ok(report)
    }
}

pub(crate) fn too_many_candidates(config: &SchedulingConfig) -> Error {
    Error::rejected(
        ErrorCode::TooManyCandidates,
        format!(
            "Request expands to more than {} candidate sessions",
            config.max_candidates_per_request
        ),
    )
}
