//! Session attribute reads and writes.

use proteus_session_storage::{RecordFamily, Row, WriteOptions, single_row};

use crate::{
    error::Result,
    ticket::{ID_COLUMN, lookup_user},
    types::{Ticket, UserId},
};

/// Reads and writes session attributes keyed by user id.
#[derive(Debug)]
pub struct SessionAccessor<'a> {
    store: &'a dyn RecordFamily,
    tickets: &'a dyn RecordFamily,
}

impl<'a> SessionAccessor<'a> {
    /// Creates an accessor over the store and ticket families.
    #[must_use]
    pub fn new(store: &'a dyn RecordFamily, tickets: &'a dyn RecordFamily) -> Self {
        Self { store, tickets }
    }

    /// Merges `attributes` into the user's row without expiry.
    ///
    /// Columns not named in `attributes` keep their values.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`](crate::SessionError::Store) if the
    /// write fails.
    pub async fn set(&self, user_id: &UserId, attributes: Row) -> Result<()> {
        self.store
            .set(single_row(user_id.as_str(), attributes), WriteOptions::persistent())
            .await?;
        Ok(())
    }

    /// Reads the requested columns (all of them when `columns` is empty).
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`](crate::SessionError::Store) if the
    /// read fails.
    pub async fn get(&self, user_id: &UserId, columns: &[&str]) -> Result<Option<Row>> {
        Ok(self.store.get(user_id.as_str(), columns).await?)
    }

    /// Resolves `ticket` and reads the owner's attributes.
    ///
    /// Returns `None` only when the ticket does not resolve. A resolved user
    /// with no stored attributes yields a row holding just `id`; a stored
    /// `id` attribute is replaced by the resolved user id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`](crate::SessionError::Store) if either
    /// read fails.
    pub async fn get_by_ticket(&self, ticket: &Ticket, columns: &[&str]) -> Result<Option<Row>> {
        Ok(self.get_with_owner(ticket, columns).await?.map(|(_, row)| row))
    }

    /// Same as [`get_by_ticket`](Self::get_by_ticket), also returning the
    /// resolved owner.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`](crate::SessionError::Store) if either
    /// read fails.
    pub async fn get_with_owner(
        &self,
        ticket: &Ticket,
        columns: &[&str],
    ) -> Result<Option<(UserId, Row)>> {
        let Some(user_id) = lookup_user(self.tickets, ticket).await? else {
            return Ok(None);
        };

        let mut row = self.get(&user_id, columns).await?.unwrap_or_default();
        row.insert(ID_COLUMN, user_id.as_str());
        Ok(Some((user_id, row)))
    }
}
