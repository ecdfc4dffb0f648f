//! Single writer thread. All writes go through one connection so SQLite
//! never sees two concurrent writers.

use diesel::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use cardsync_core::errors::DatabaseError;
use cardsync_core::Result;

use super::DbPool;

type WriteJob = Box<dyn FnOnce(&mut SqliteConnection) + Send>;

#[derive(Clone)]
pub struct WriteHandle {
    sender: mpsc::UnboundedSender<WriteJob>,
}

impl WriteHandle {
    /// Runs `job` on the writer connection and returns its result.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let boxed: WriteJob = Box::new(move |conn| {
            let _ = reply.send(job(conn));
        });
        self.sender
            .send(boxed)
            .map_err(|_| DatabaseError::Internal("database writer stopped".to_string()))?;
        response
            .await
            .map_err(|_| DatabaseError::Internal("database writer dropped the job".to_string()))?
    }
}

pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (sender, mut receiver) = mpsc::unbounded_channel::<WriteJob>();
    std::thread::spawn(move || {
        let mut conn = match pool.get() {
            Ok(conn) => conn,
            Err(e) => {
                error!("[CardSync] Database writer could not get a connection: {}", e);
                return;
            }
        };
        debug!("[CardSync] Database writer started");
        while let Some(job) = receiver.blocking_recv() {
            job(&mut *conn);
        }
        debug!("[CardSync] Database writer stopped");
    });
    WriteHandle { sender }
}
