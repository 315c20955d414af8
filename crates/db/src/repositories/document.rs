use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use docflow_core::domain::document::{
    ActorId, Document, DocumentId, DocumentStatus, NewDocument, TemplateId,
};
use docflow_core::domain::line::ApprovalLine;
use docflow_core::domain::step::{ApprovalStep, StepDecision, StepRole};
use docflow_core::workflow::{DocumentRepository, StoreError};

use super::{decode_error, RepositoryError};
use crate::DbPool;

const DOCUMENT_COLUMNS: &str = "id, template_id, title, content, status, created_by, created_at,
                                submitted_at, settled_at";

pub struct SqlDocumentRepository {
    pool: DbPool,
}

impl SqlDocumentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Reads document rows and their lines inside one transaction so a
    /// document's status and steps come from the same commit.
    async fn fetch_documents(
        &self,
        sql: &str,
        bind: i64,
    ) -> Result<Vec<Document>, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let rows = sqlx::query(sql).bind(bind).fetch_all(&mut *tx).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in &rows {
            let id = DocumentId(row.try_get("id").map_err(decode_error)?);
            let line = load_line(&mut tx, id).await?;
            documents.push(row_to_document(row, line)?);
        }

        tx.commit().await?;
        Ok(documents)
    }

    async fn insert_document(&self, document: NewDocument) -> Result<Document, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO document (template_id, title, content, status, created_by, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(document.template_id.0)
        .bind(&document.title)
        .bind(&document.content)
        .bind(DocumentStatus::Draft.as_str())
        .bind(document.created_by.0)
        .bind(document.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for step in document.line.steps() {
            sqlx::query(
                "INSERT INTO approval_step (document_id, step_order, approver_id, role, decision,
                                            comment, decided_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(id)
            .bind(i64::from(step.order))
            .bind(step.approver_id.0)
            .bind(step.role.as_str())
            .bind(step.decision.as_str())
            .bind(&step.comment)
            .bind(step.decided_at.map(|at| at.to_rfc3339()))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Document {
            id: DocumentId(id),
            template_id: document.template_id,
            title: document.title,
            content: document.content,
            status: DocumentStatus::Draft,
            created_by: document.created_by,
            created_at: document.created_at,
            submitted_at: None,
            settled_at: None,
            line: document.line,
        })
    }

    async fn write_submission(&self, document: &Document) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE document SET status = ?, submitted_at = ? WHERE id = ? AND status = 'draft'",
        )
        .bind(document.status.as_str())
        .bind(document.submitted_at.map(|at| at.to_rfc3339()))
        .bind(document.id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() != 1 {
            return Err(RepositoryError::StaleWrite(format!(
                "document {} is no longer a draft",
                document.id
            )));
        }
        Ok(())
    }

    async fn write_decision(
        &self,
        document: &Document,
        step: &ApprovalStep,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        update_step(&mut tx, document.id, step).await?;

        // The derived status is only valid for the line it was derived from.
        let stored = load_line(&mut tx, document.id).await?;
        if stored != document.line {
            return Err(RepositoryError::StaleWrite(format!(
                "approval line of document {} changed since it was loaded",
                document.id
            )));
        }

        let result = sqlx::query(
            "UPDATE document SET status = ?, settled_at = ?
             WHERE id = ? AND status = 'in_progress'",
        )
        .bind(document.status.as_str())
        .bind(document.settled_at.map(|at| at.to_rfc3339()))
        .bind(document.id.0)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            return Err(RepositoryError::StaleWrite(format!(
                "document {} is no longer in progress",
                document.id
            )));
        }

        tx.commit().await?;
        Ok(())
    }
}

async fn load_line(
    tx: &mut Transaction<'_, Sqlite>,
    document_id: DocumentId,
) -> Result<ApprovalLine, RepositoryError> {
    let rows = sqlx::query(
        "SELECT step_order, approver_id, role, decision, comment, decided_at
         FROM approval_step WHERE document_id = ? ORDER BY step_order",
    )
    .bind(document_id.0)
    .fetch_all(&mut **tx)
    .await?;

    let steps = rows.iter().map(row_to_step).collect::<Result<Vec<_>, _>>()?;
    Ok(ApprovalLine::from_steps(steps))
}

/// Only a pending step is overwritten, so a concurrent writer from another
/// process cannot silently replace a recorded decision.
async fn update_step(
    tx: &mut Transaction<'_, Sqlite>,
    document_id: DocumentId,
    step: &ApprovalStep,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        "UPDATE approval_step SET decision = ?, comment = ?, decided_at = ?
         WHERE document_id = ? AND step_order = ? AND decision = 'pending'",
    )
    .bind(step.decision.as_str())
    .bind(&step.comment)
    .bind(step.decided_at.map(|at| at.to_rfc3339()))
    .bind(document_id.0)
    .bind(i64::from(step.order))
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() != 1 {
        return Err(RepositoryError::StaleWrite(format!(
            "step {} of document {document_id} was already decided",
            step.order
        )));
    }
    Ok(())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{value}`: {error}")))
}

fn parse_optional_timestamp(
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.as_deref().map(parse_timestamp).transpose()
}

fn row_to_step(row: &SqliteRow) -> Result<ApprovalStep, RepositoryError> {
    let order: i64 = row.try_get("step_order").map_err(decode_error)?;
    let approver_id: i64 = row.try_get("approver_id").map_err(decode_error)?;
    let role: String = row.try_get("role").map_err(decode_error)?;
    let decision: String = row.try_get("decision").map_err(decode_error)?;
    let comment: Option<String> = row.try_get("comment").map_err(decode_error)?;
    let decided_at: Option<String> = row.try_get("decided_at").map_err(decode_error)?;

    Ok(ApprovalStep {
        order: u32::try_from(order)
            .map_err(|_| RepositoryError::Decode(format!("invalid step order {order}")))?,
        approver_id: ActorId(approver_id),
        role: StepRole::parse(&role)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown step role `{role}`")))?,
        decision: StepDecision::parse(&decision)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown decision `{decision}`")))?,
        comment,
        decided_at: parse_optional_timestamp(decided_at)?,
    })
}

fn row_to_document(row: &SqliteRow, line: ApprovalLine) -> Result<Document, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let template_id: i64 = row.try_get("template_id").map_err(decode_error)?;
    let title: String = row.try_get("title").map_err(decode_error)?;
    let content: String = row.try_get("content").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let created_by: i64 = row.try_get("created_by").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let submitted_at: Option<String> = row.try_get("submitted_at").map_err(decode_error)?;
    let settled_at: Option<String> = row.try_get("settled_at").map_err(decode_error)?;

    Ok(Document {
        id: DocumentId(id),
        template_id: TemplateId(template_id),
        title,
        content,
        status: DocumentStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("unknown document status `{status}`")))?,
        created_by: ActorId(created_by),
        created_at: parse_timestamp(&created_at)?,
        submitted_at: parse_optional_timestamp(submitted_at)?,
        settled_at: parse_optional_timestamp(settled_at)?,
        line,
    })
}

#[async_trait::async_trait]
impl DocumentRepository for SqlDocumentRepository {
    async fn insert(&self, document: NewDocument) -> Result<Document, StoreError> {
        Ok(self.insert_document(document).await?)
    }

    async fn find_by_id(&self, id: DocumentId) -> Result<Option<Document>, StoreError> {
        let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM document WHERE id = ?");
        Ok(self.fetch_documents(&sql, id.0).await?.pop())
    }

    async fn save_submission(&self, document: &Document) -> Result<(), StoreError> {
        Ok(self.write_submission(document).await?)
    }

    async fn save_decision(
        &self,
        document: &Document,
        step: &ApprovalStep,
    ) -> Result<(), StoreError> {
        Ok(self.write_decision(document, step).await?)
    }

    async fn list_by_author(&self, author_id: ActorId) -> Result<Vec<Document>, StoreError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document
             WHERE created_by = ? ORDER BY created_at DESC, id DESC"
        );
        Ok(self.fetch_documents(&sql, author_id.0).await?)
    }

    async fn list_pending_for_approver(
        &self,
        approver_id: ActorId,
    ) -> Result<Vec<Document>, StoreError> {
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM document
             WHERE status = 'in_progress'
               AND id IN (SELECT document_id FROM approval_step
                          WHERE approver_id = ? AND decision = 'pending')
             ORDER BY id"
        );
        Ok(self.fetch_documents(&sql, approver_id.0).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use docflow_core::approvals::ApprovalRouter;
    use docflow_core::domain::document::{
        ActorId, DocumentId, DocumentStatus, NewDocument, TemplateId,
    };
    use docflow_core::domain::line::ApprovalLine;
    use docflow_core::domain::step::{ApprovalStep, DecisionKind, StepDecision, StepRole};
    use docflow_core::workflow::{DocumentRepository, StoreError};

    use super::SqlDocumentRepository;
    use crate::{connect_with_settings, migrations::run_pending, DbPool};

    const AUTHOR: ActorId = ActorId(100);

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");
        pool
    }

    fn new_document(minute: u32, steps: Vec<(ActorId, StepRole)>) -> NewDocument {
        let steps = steps
            .into_iter()
            .zip(1u32..)
            .map(|((actor, role), order)| ApprovalStep::pending(order, actor, role))
            .collect();
        NewDocument {
            template_id: TemplateId(3),
            title: format!("Expense report {minute}"),
            content: "<p>conference travel</p>".to_string(),
            created_by: AUTHOR,
            created_at: Utc.with_ymd_and_hms(2026, 10, 17, 9, minute, 0).single().expect("time"),
            line: ApprovalLine::from_steps(steps),
        }
    }

    #[tokio::test]
    async fn insert_and_load_round_trips_line() {
        let repository = SqlDocumentRepository::new(pool().await);
        let inserted = repository
            .insert(new_document(
                0,
                vec![(ActorId(1), StepRole::Mandatory), (ActorId(2), StepRole::Reference)],
            ))
            .await
            .expect("insert");

        let loaded = repository.find_by_id(inserted.id).await.expect("load").expect("present");
        assert_eq!(loaded, inserted);
        assert_eq!(loaded.status, DocumentStatus::Draft);
        assert_eq!(loaded.line.len(), 2);
        assert!(repository.find_by_id(DocumentId(999)).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn decision_updates_step_and_status_together() {
        let repository = SqlDocumentRepository::new(pool().await);
        let mut document = repository
            .insert(new_document(0, vec![(ActorId(1), StepRole::Mandatory)]))
            .await
            .expect("insert");

        let now = Utc::now();
        document.transition_to(DocumentStatus::InProgress, now).expect("submit");
        repository.save_submission(&document).await.expect("save submission");

        let outcome = ApprovalRouter::apply(
            &mut document,
            ActorId(1),
            DecisionKind::Reject,
            Some("missing receipts"),
            now,
        )
        .expect("reject");
        repository.save_decision(&document, &outcome.settled_step).await.expect("save decision");

        let loaded = repository.find_by_id(document.id).await.expect("load").expect("present");
        assert_eq!(loaded.status, DocumentStatus::Rejected);
        assert_eq!(loaded.settled_at, document.settled_at);
        let step = loaded.line.step(1).expect("step");
        assert_eq!(step.decision, StepDecision::Rejected);
        assert_eq!(step.comment.as_deref(), Some("missing receipts"));
    }

    #[tokio::test]
    async fn deciding_a_recorded_step_again_is_a_conflict() {
        let repository = SqlDocumentRepository::new(pool().await);
        let mut document = repository
            .insert(new_document(0, vec![(ActorId(1), StepRole::Mandatory)]))
            .await
            .expect("insert");
        document.transition_to(DocumentStatus::InProgress, Utc::now()).expect("submit");
        repository.save_submission(&document).await.expect("save submission");

        let outcome =
            ApprovalRouter::apply(&mut document, ActorId(1), DecisionKind::Approve, None, Utc::now())
                .expect("approve");
        repository.save_decision(&document, &outcome.settled_step).await.expect("first write");

        let error = repository
            .save_decision(&document, &outcome.settled_step)
            .await
            .expect_err("second write");
        assert!(matches!(error, StoreError::Conflict(_)));

        let error = repository.save_submission(&document).await.expect_err("resubmit");
        assert!(matches!(error, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn author_listing_is_newest_first() {
        let repository = SqlDocumentRepository::new(pool().await);
        let older = repository
            .insert(new_document(0, vec![(ActorId(1), StepRole::Mandatory)]))
            .await
            .expect("insert");
        let newer = repository
            .insert(new_document(30, vec![(ActorId(1), StepRole::Mandatory)]))
            .await
            .expect("insert");

        let ids: Vec<DocumentId> = repository
            .list_by_author(AUTHOR)
            .await
            .expect("list")
            .into_iter()
            .map(|document| document.id)
            .collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert!(repository.list_by_author(ActorId(1)).await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn pending_listing_only_includes_in_progress_documents() {
        let repository = SqlDocumentRepository::new(pool().await);
        let _draft = repository
            .insert(new_document(0, vec![(ActorId(1), StepRole::Mandatory)]))
            .await
            .expect("insert");
        let mut routed = repository
            .insert(new_document(
                5,
                vec![(ActorId(2), StepRole::Mandatory), (ActorId(1), StepRole::Consent)],
            ))
            .await
            .expect("insert");
        routed.transition_to(DocumentStatus::InProgress, Utc::now()).expect("submit");
        repository.save_submission(&routed).await.expect("save submission");

        let pending = repository.list_pending_for_approver(ActorId(1)).await.expect("pending");
        let ids: Vec<DocumentId> = pending.iter().map(|document| document.id).collect();
        assert_eq!(ids, vec![routed.id], "drafts are never pending");
    }

    #[tokio::test]
    async fn unknown_status_is_a_decode_error() {
        let pool = pool().await;
        let repository = SqlDocumentRepository::new(pool.clone());
        let document = repository
            .insert(new_document(0, vec![(ActorId(1), StepRole::Mandatory)]))
            .await
            .expect("insert");

        sqlx::query("PRAGMA ignore_check_constraints = ON").execute(&pool).await.expect("pragma");
        sqlx::query("UPDATE document SET status = 'archived' WHERE id = ?")
            .bind(document.id.0)
            .execute(&pool)
            .await
            .expect("corrupt status");

        let error = repository.find_by_id(document.id).await.expect_err("decode");
        assert!(matches!(error, StoreError::Decode(ref message) if message.contains("archived")));
    }
}
