/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! DAL for referral books.

use diesel::prelude::*;

use super::audit_outbox::queue_audit_event;
use super::models::{NewSqliteBook, SqliteBook};
use super::{TxnError, DAL};
use crate::database::schema::books;
use crate::database::{UniversalTimestamp, UniversalUuid};
use crate::error::{DomainViolation, EngineError};
use crate::models::{Book, NewBook};

/// Loads a book row or aborts the transaction with `BookNotFound`.
pub(crate) fn load_book(
    conn: &mut SqliteConnection,
    id: &UniversalUuid,
) -> Result<SqliteBook, TxnError> {
    books::table
        .filter(books::id.eq(id.to_vec()))
        .select(SqliteBook::as_select())
        .first(conn)
        .optional()?
        .ok_or_else(|| DomainViolation::BookNotFound(*id).into())
}

/// DAL for book operations.
pub struct BookDAL<'a> {
    dal: &'a DAL,
}

impl<'a> BookDAL<'a> {
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a book.
    pub async fn create(&self, new_book: NewBook, actor: String) -> Result<Book, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let id = UniversalUuid::new_v4();
                let row = NewSqliteBook {
                    id: id.to_vec(),
                    name: new_book.name,
                    classification: new_book.classification,
                    region: new_book.region,
                    priority_tier: new_book.priority_tier,
                    max_days_before_expiry: new_book.max_days_before_expiry,
                    renewal_window_days: new_book.renewal_window_days,
                    grace_period_days: new_book.grace_period_days,
                    online_bidding: new_book.online_bidding,
                    active: true,
                    created_at: now.to_rfc3339(),
                    updated_at: now.to_rfc3339(),
                };
                diesel::insert_into(books::table).values(&row).execute(conn)?;

                let book: Book = load_book(conn, &id)?
                    .try_into()
                    .map_err(TxnError::Conversion)?;
                let after = serde_json::to_value(&book)
                    .map_err(|e| TxnError::Conversion(e.to_string()))?;
                queue_audit_event(conn, "books", &id, "create", None, Some(after), &actor, &now)?;
                Ok(book)
            })
            .await
    }

    /// Fetches a book by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<Book, EngineError> {
        self.dal
            .read(move |conn| {
                load_book(conn, &id)?
                    .try_into()
                    .map_err(TxnError::Conversion)
            })
            .await
    }

    /// Fetches a book by name, if one exists.
    pub async fn get_by_name(&self, name: String) -> Result<Option<Book>, EngineError> {
        self.dal
            .read(move |conn| {
                let row: Option<SqliteBook> = books::table
                    .filter(books::name.eq(name))
                    .select(SqliteBook::as_select())
                    .first(conn)
                    .optional()?;
                row.map(|r| r.try_into().map_err(TxnError::Conversion))
                    .transpose()
            })
            .await
    }

    /// Lists active books ordered by name.
    pub async fn list_active(&self) -> Result<Vec<Book>, EngineError> {
        self.dal
            .read(|conn| {
                let rows: Vec<SqliteBook> = books::table
                    .filter(books::active.eq(true))
                    .order(books::name.asc())
                    .select(SqliteBook::as_select())
                    .load(conn)?;
                rows.into_iter()
                    .map(|r| r.try_into().map_err(TxnError::Conversion))
                    .collect()
            })
            .await
    }

    /// Lists every book, active or not. Enforcement needs renewal windows
    /// for books that have since been deactivated.
    pub async fn list_all(&self) -> Result<Vec<Book>, EngineError> {
        self.dal
            .read(|conn| {
                let rows: Vec<SqliteBook> = books::table
                    .order(books::name.asc())
                    .select(SqliteBook::as_select())
                    .load(conn)?;
                rows.into_iter()
                    .map(|r| r.try_into().map_err(TxnError::Conversion))
                    .collect()
            })
            .await
    }

    /// Activates or deactivates a book. Books are never deleted while
    /// registrations reference them.
    pub async fn set_active(
        &self,
        id: UniversalUuid,
        active: bool,
        actor: String,
    ) -> Result<Book, EngineError> {
        self.dal
            .immediate(move |conn| {
                let now = UniversalTimestamp::now();
                let before: Book = load_book(conn, &id)?
                    .try_into()
                    .map_err(TxnError::Conversion)?;

                diesel::update(books::table.filter(books::id.eq(id.to_vec())))
                    .set((
                        books::active.eq(active),
                        books::updated_at.eq(now.to_rfc3339()),
                    ))
                    .execute(conn)?;

                let after: Book = load_book(conn, &id)?
                    .try_into()
                    .map_err(TxnError::Conversion)?;
                let before_json = serde_json::to_value(&before)
                    .map_err(|e| TxnError::Conversion(e.to_string()))?;
                let after_json = serde_json::to_value(&after)
                    .map_err(|e| TxnError::Conversion(e.to_string()))?;
                queue_audit_event(
                    conn,
                    "books",
                    &id,
                    "set_active",
                    Some(before_json),
                    Some(after_json),
                    &actor,
                    &now,
                )?;
                Ok(after)
            })
            .await
    }
}
