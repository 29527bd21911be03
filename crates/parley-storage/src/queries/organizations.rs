// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Organization rows: creation and lookup.

use chrono::Utc;
use parley_core::ParleyError;
use parley_core::types::{NewOrganization, Organization};
use rusqlite::{OptionalExtension, Row, params};

use crate::database::Database;

const COLUMNS: &str = "id, name, slug, created_at, updated_at, is_active, metadata";

fn row_to_organization(row: &Row<'_>) -> rusqlite::Result<Organization> {
    Ok(Organization {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
        is_active: row.get(5)?,
        metadata: row.get(6)?,
    })
}

/// Slugs are lowercase ASCII alphanumerics, optionally joined by single hyphens.
pub fn validate_slug(slug: &str) -> Result<(), ParleyError> {
    let well_formed = !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(ParleyError::Validation(format!(
            "slug `{slug}` must be lowercase alphanumeric"
        )))
    }
}

pub async fn create(db: &Database, org: &NewOrganization) -> Result<Organization, ParleyError> {
    if org.name.trim().is_empty() {
        return Err(ParleyError::Validation("organization name is required".into()));
    }
    validate_slug(&org.slug)?;

    let org = org.clone();
    db.connection()
        .call(move |conn| -> Result<Organization, rusqlite::Error> {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO organizations (name, slug, created_at, updated_at, is_active, metadata)
                 VALUES (?1, ?2, ?3, ?3, 1, ?4)",
                params![org.name, org.slug, now, org.metadata],
            )?;
            Ok(Organization {
                id: conn.last_insert_rowid(),
                name: org.name,
                slug: org.slug,
                created_at: now,
                updated_at: now,
                is_active: true,
                metadata: org.metadata,
            })
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_id(db: &Database, id: i64) -> Result<Option<Organization>, ParleyError> {
    db.connection()
        .call(move |conn| -> Result<Option<Organization>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM organizations WHERE id = ?1"),
                params![id],
                row_to_organization,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_by_slug(db: &Database, slug: &str) -> Result<Option<Organization>, ParleyError> {
    let slug = slug.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Organization>, rusqlite::Error> {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM organizations WHERE slug = ?1"),
                params![slug],
                row_to_organization,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> NewOrganization {
        NewOrganization {
            name: "Acme".into(),
            slug: "acme".into(),
            metadata: None,
        }
    }

    #[test]
    fn slug_rules() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("acme-2").is_ok());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("acme corp").is_err());
        assert!(validate_slug("-acme").is_err());
        assert!(validate_slug("").is_err());
    }

    #[tokio::test]
    async fn create_then_lookup_by_id_and_slug() {
        let db = Database::open_in_memory().await.unwrap();
        let org = create(&db, &acme()).await.unwrap();
        assert!(org.is_active);

        let by_id = get_by_id(&db, org.id).await.unwrap().unwrap();
        assert_eq!(by_id.slug, "acme");
        let by_slug = get_by_slug(&db, "acme").await.unwrap().unwrap();
        assert_eq!(by_slug.id, org.id);
        assert!(get_by_slug(&db, "globex").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_slug_is_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        create(&db, &acme()).await.unwrap();
        let err = create(&db, &acme()).await.unwrap_err();
        assert!(matches!(err, ParleyError::Storage { .. }));
    }
}
