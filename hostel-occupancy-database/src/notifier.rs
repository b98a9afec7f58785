use async_trait::async_trait;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use hostel_occupancy_ledger::notify::{Notification, Notifier, NotifyError};

use crate::error::DatabaseError;
use crate::models::NewNotificationRow;
use crate::schema::notifications;
use crate::Pool;

/// Stores notifications for the portal's notification center.
#[derive(Clone)]
pub struct DatabaseNotifier {
    pool: Pool,
}

impl DatabaseNotifier {
    #[must_use]
    pub const fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn insert(&self, notification: &Notification) -> Result<(), DatabaseError> {
        let mut connection = self.pool.get().await?;
        let connection: &mut AsyncPgConnection = &mut connection;
        diesel::insert_into(notifications::table)
            .values(NewNotificationRow {
                user_id: notification.user.0,
                title: &notification.title,
                message: &notification.message,
                kind: notification.kind.as_str(),
                read: false,
            })
            .execute(connection)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for DatabaseNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.insert(&notification)
            .await
            .map_err(|error| NotifyError(Box::new(error)))
    }
}
