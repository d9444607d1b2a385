use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::application::access::AccessChecker;
use crate::application::ports::document_repository::{
    DocumentError, DocumentReader, DocumentWriter,
};
use crate::domain::documents::document::{Document, Payload, PayloadKind};
use crate::domain::documents::filter::{AttributeValue, ListFilter};
use crate::domain::users::identity::Identity;
use crate::infrastructure::db::PgPool;

pub struct SqlxDocumentRepository {
    pub pool: PgPool,
}

impl SqlxDocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn grants_for<'e, E>(executor: E, ids: &[Uuid]) -> sqlx::Result<HashMap<Uuid, Vec<String>>>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query(
            r#"SELECT g.document_id, u.login
               FROM document_grants g
               JOIN users u ON u.user_id = g.user_id
               WHERE g.document_id = ANY($1)
               ORDER BY g.document_id, g.position"#,
        )
        .bind(ids)
        .fetch_all(executor)
        .await?;
        let mut out: HashMap<Uuid, Vec<String>> = HashMap::new();
        for r in rows {
            out.entry(r.get("document_id"))
                .or_default()
                .push(r.get("login"));
        }
        Ok(out)
    }
}

fn storage(err: sqlx::Error) -> DocumentError {
    DocumentError::Storage(err.into())
}

fn document_from_row(r: &PgRow, grant: Vec<String>) -> Document {
    Document {
        id: r.get("id"),
        name: r.get("name"),
        mime: r.try_get::<Option<String>, _>("mime").ok().flatten().unwrap_or_default(),
        is_file: r.get("is_file"),
        is_public: r.get("is_public"),
        created_at: r.get("created_at"),
        owner: r.get("owner"),
        grant,
    }
}

#[async_trait]
impl DocumentReader for SqlxDocumentRepository {
    async fn list_readable(
        &self,
        requester: &Identity,
        filter: &ListFilter,
    ) -> anyhow::Result<Vec<Document>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            r#"SELECT d.id, d.name, d.mime, d.is_file, d.is_public, d.created_at, u.login AS owner
               FROM documents d
               JOIN users u ON u.user_id = d.owner_id
               WHERE (d.owner_id = "#,
        );
        qb.push_bind(requester.user_id);
        qb.push(
            " OR d.is_public = TRUE OR EXISTS (SELECT 1 FROM document_grants g \
             WHERE g.document_id = d.id AND g.user_id = ",
        );
        qb.push_bind(requester.user_id);
        qb.push("))");

        if let Some(login) = &filter.owner_login {
            qb.push(" AND u.login = ");
            qb.push_bind(login.clone());
        }
        if let Some(attr) = &filter.attribute {
            // identifier comes from the allow-list, never from caller text
            qb.push(" AND ");
            qb.push(attr.column.as_sql());
            qb.push(" = ");
            match &attr.value {
                AttributeValue::Text(s) => qb.push_bind(s.clone()),
                AttributeValue::Bool(b) => qb.push_bind(*b),
                AttributeValue::Id(id) => qb.push_bind(*id),
            };
        }
        qb.push(" ORDER BY d.name, d.created_at");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit);
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.get("id")).collect();
        let mut grants = if ids.is_empty() {
            HashMap::new()
        } else {
            Self::grants_for(&self.pool, &ids).await?
        };
        let items = rows
            .iter()
            .map(|r| {
                let id: Uuid = r.get("id");
                document_from_row(r, grants.remove(&id).unwrap_or_default())
            })
            .collect();
        Ok(items)
    }

    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query(
            r#"SELECT d.id, d.name, d.mime, d.is_file, d.is_public, d.created_at, u.login AS owner
               FROM documents d
               JOIN users u ON u.user_id = d.owner_id
               WHERE d.id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut grants = Self::grants_for(&self.pool, &[id]).await?;
        Ok(Some(document_from_row(
            &row,
            grants.remove(&id).unwrap_or_default(),
        )))
    }

    async fn get_payload(&self, id: Uuid, kind: PayloadKind) -> anyhow::Result<Option<Payload>> {
        let payload = match kind {
            PayloadKind::File => {
                sqlx::query_scalar::<_, Vec<u8>>(
                    "SELECT data FROM document_files WHERE document_id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(Payload::File)
            }
            PayloadKind::Json => {
                sqlx::query_scalar::<_, String>(
                    "SELECT data FROM document_data WHERE document_id = $1",
                )
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .map(Payload::Json)
            }
        };
        Ok(payload)
    }
}

#[async_trait]
impl DocumentWriter for SqlxDocumentRepository {
    async fn create(&self, doc: &Document, payload: &Payload) -> Result<(), DocumentError> {
        if payload.kind() != doc.payload_kind() {
            return Err(DocumentError::Validation(
                "payload does not match the declared document type".into(),
            ));
        }

        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let inserted = sqlx::query(
            r#"INSERT INTO documents (id, name, mime, is_file, is_public, created_at, owner_id)
               SELECT $1, $2, $3, $4, $5, $6, user_id FROM users WHERE login = $7"#,
        )
        .bind(doc.id)
        .bind(&doc.name)
        .bind(&doc.mime)
        .bind(doc.is_file)
        .bind(doc.is_public)
        .bind(doc.created_at)
        .bind(&doc.owner)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;
        if inserted.rows_affected() == 0 {
            return Err(DocumentError::Storage(anyhow::anyhow!(
                "owner {} does not exist",
                doc.owner
            )));
        }

        match payload {
            Payload::File(bytes) => {
                sqlx::query("INSERT INTO document_files (document_id, data) VALUES ($1, $2)")
                    .bind(doc.id)
                    .bind(bytes)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?;
            }
            Payload::Json(text) => {
                sqlx::query("INSERT INTO document_data (document_id, data) VALUES ($1, $2)")
                    .bind(doc.id)
                    .bind(text)
                    .execute(&mut *tx)
                    .await
                    .map_err(storage)?;
            }
        }

        for (position, login) in doc.grant.iter().enumerate() {
            let granted = sqlx::query(
                r#"INSERT INTO document_grants (document_id, user_id, position)
                   SELECT $1, user_id, $3 FROM users WHERE login = $2"#,
            )
            .bind(doc.id)
            .bind(login)
            .bind(position as i32)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
            if granted.rows_affected() == 0 {
                return Err(DocumentError::Validation(format!(
                    "unknown grantee: {login}"
                )));
            }
        }

        tx.commit().await.map_err(storage)?;
        Ok(())
    }

    async fn delete(
        &self,
        requester: &Identity,
        id: Uuid,
        access: &dyn AccessChecker,
    ) -> Result<(), DocumentError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        // Row lock: a concurrent delete waits here and then finds nothing.
        let row = sqlx::query(
            r#"SELECT d.id, d.name, d.mime, d.is_file, d.is_public, d.created_at, u.login AS owner
               FROM documents d
               JOIN users u ON u.user_id = d.owner_id
               WHERE d.id = $1
               FOR UPDATE OF d"#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(storage)?
        .ok_or(DocumentError::NotFound)?;
        let mut grants = Self::grants_for(&mut *tx, &[id]).await.map_err(storage)?;
        let doc = document_from_row(&row, grants.remove(&id).unwrap_or_default());

        if !access.can_delete(requester, &doc) {
            return Err(DocumentError::AccessDenied);
        }

        for stmt in [
            "DELETE FROM document_grants WHERE document_id = $1",
            "DELETE FROM document_files WHERE document_id = $1",
            "DELETE FROM document_data WHERE document_id = $1",
        ] {
            sqlx::query(stmt)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(storage)?;
        }
        let res = sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        if res.rows_affected() == 0 {
            return Err(DocumentError::NotFound);
        }

        tx.commit().await.map_err(storage)?;
        Ok(())
    }
}
