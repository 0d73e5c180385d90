//! Best-effort transaction finalization
//!
//! A unit of work ends by committing when it succeeded and rolling back when it
//! failed. Failures while doing so are logged and never returned: the caller
//! already holds the only error it can act on.

use std::error::Error as StdError;
use std::future::Future;

use futures::future::BoxFuture;
use sqlx_mysql_conn_mgr::{Client, TransactionHandle};
use tracing::{debug, error};

/// What [`finish_transaction`] did with a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalization {
   /// The unit of work succeeded and was committed
   Committed,
   /// The unit of work failed and was rolled back
   RolledBack,
   /// The unit of work failed and the rollback failed too
   RollbackFailed,
   /// The commit failed and the follow-up rollback succeeded
   CommitFailedRolledBack,
   /// The commit failed and so did the follow-up rollback
   CommitFailedRollbackFailed,
}

impl Finalization {
   pub fn is_committed(&self) -> bool {
      matches!(self, Self::Committed)
   }
}

/// Commit or roll back `tx` depending on whether the unit of work failed
///
/// - With an `error`, the transaction is rolled back once.
/// - Without one, it is committed. If the commit fails, the failure is logged
///   and the transaction is rolled back once.
///
/// Commit and rollback failures are logged at error level and reflected in the
/// returned [`Finalization`]; they are never returned as errors. Rollback is
/// attempted at most once per call.
///
/// # Example
///
/// ```no_run
/// use sqlx_mysql_commons::{Client, finish_transaction};
///
/// # async fn example(client: &Client) -> Result<(), sqlx_mysql_commons::Error> {
/// let mut tx = client.begin().await?;
/// let result = match tx.connection() {
///     Some(conn) => sqlx::query("DELETE FROM carts WHERE expired = 1")
///         .execute(conn)
///         .await
///         .map(|_| ()),
///     None => Ok(()),
/// };
///
/// finish_transaction(tx, result.as_ref().err().map(|e| e as &dyn std::error::Error)).await;
/// result?;
/// # Ok(())
/// # }
/// ```
pub fn finish_transaction<T>(
   tx: T,
   error: Option<&dyn StdError>,
) -> impl Future<Output = Finalization> + Send + use<T>
where
   T: TransactionHandle,
{
   let cause = error.map(ToString::to_string);
   finalize(tx, cause)
}

async fn finalize<T: TransactionHandle>(mut tx: T, cause: Option<String>) -> Finalization {
   if let Some(cause) = cause {
      return match rollback(&mut tx, &cause).await {
         Ok(()) => Finalization::RolledBack,
         Err(()) => Finalization::RollbackFailed,
      };
   }

   let commit_err = match tx.commit().await {
      Ok(()) => return Finalization::Committed,
      Err(e) => e,
   };

   error!(error = %commit_err, "error committing database transaction changes");

   match rollback(&mut tx, &commit_err.to_string()).await {
      Ok(()) => Finalization::CommitFailedRolledBack,
      Err(()) => Finalization::CommitFailedRollbackFailed,
   }
}

async fn rollback<T: TransactionHandle>(tx: &mut T, cause: &str) -> Result<(), ()> {
   match tx.rollback().await {
      Ok(()) => {
         debug!(cause, "Transaction rolled back");
         Ok(())
      }
      Err(e) => {
         error!(error = %e, cause, "error rolling back database transaction changes");
         Err(())
      }
   }
}

/// Finalize `tx` according to `result`, then hand `result` back unchanged
pub async fn complete<H, T, E>(tx: H, result: Result<T, E>) -> Result<T, E>
where
   H: TransactionHandle,
   E: StdError,
{
   let finalizing = finish_transaction(tx, result.as_ref().err().map(|e| e as &dyn StdError));
   finalizing.await;
   result
}

/// Run `work` inside a transaction on `client`
///
/// The transaction is committed when `work` returns `Ok` and rolled back when it
/// returns `Err`, following [`finish_transaction`]. Failing to begin the
/// transaction is converted into `E`.
///
/// # Example
///
/// ```no_run
/// use sqlx_mysql_commons::{Client, Error, with_transaction};
///
/// # async fn example(client: &Client) -> Result<(), Error> {
/// let rows = with_transaction(client, |tx| {
///     Box::pin(async move {
///         let conn = tx
///             .connection()
///             .ok_or_else(|| Error::Other("driver does not expose connections".into()))?;
///         let done = sqlx::query("UPDATE accounts SET balance = balance - 10 WHERE id = 1")
///             .execute(conn)
///             .await?;
///         Ok::<_, Error>(done.rows_affected())
///     })
/// })
/// .await?;
/// assert!(rows <= 1);
/// # Ok(())
/// # }
/// ```
pub async fn with_transaction<T, E, F>(client: &Client, work: F) -> Result<T, E>
where
   F: for<'t> FnOnce(&'t mut dyn TransactionHandle) -> BoxFuture<'t, Result<T, E>>,
   E: StdError + From<sqlx_mysql_conn_mgr::Error>,
{
   let mut tx = client.begin().await?;
   let result = work(&mut *tx).await;
   complete(tx, result).await
}
