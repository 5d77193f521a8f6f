use std::io::Read;
use std::sync::{Arc, Mutex};
use std::thread;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{mpsc, oneshot};

/// Size of each file read handed to the pool.
pub const CHUNK_SIZE: usize = 64 * 1024;

struct ReadJob {
    file: std::fs::File,
    reply: oneshot::Sender<std::io::Result<(std::fs::File, Bytes)>>,
}

/// Fixed-size pool of threads performing blocking file reads off the
/// async runtime.
///
/// Each job reads a single chunk; the file handle travels with the job and
/// is returned alongside the chunk, so the handle remains exclusively owned
/// by the request that opened it and is closed whenever that request's
/// stream is dropped.
#[derive(Clone)]
pub struct ReadPool {
    tx: mpsc::Sender<ReadJob>,
}

impl ReadPool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let (tx, rx) = mpsc::channel::<ReadJob>(workers * 2);
        let rx = Arc::new(Mutex::new(rx));

        for id in 0..workers {
            let rx = Arc::clone(&rx);
            thread::Builder::new()
                .name(format!("read-pool-{id}"))
                .spawn(move || worker_loop(rx))
                .expect("failed to spawn read pool worker");
        }

        Self { tx }
    }

    /// Read the next chunk of `file` on the pool.
    pub async fn read_chunk(
        &self,
        file: std::fs::File,
    ) -> std::io::Result<(std::fs::File, Bytes)> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(ReadJob { file, reply }).await.map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::Other, "read pool is shut down")
        })?;
        rx.await.map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::Other, "read pool dropped the request")
        })?
    }

    /// Stream a file's contents chunk by chunk, strictly in file order.
    ///
    /// The stream is only polled when the connection can take more bytes,
    /// so a slow client suspends its own reads without tying up a worker.
    pub fn stream_file(
        &self,
        file: std::fs::File,
    ) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        let pool = self.clone();
        futures::stream::try_unfold(Some(file), move |state| {
            let pool = pool.clone();
            async move {
                let Some(file) = state else {
                    return Ok(None);
                };
                let (file, chunk) = pool.read_chunk(file).await?;
                if chunk.is_empty() {
                    // EOF, handle dropped here
                    Ok(None)
                } else {
                    Ok(Some((chunk, Some(file))))
                }
            }
        })
    }
}

fn worker_loop(rx: Arc<Mutex<mpsc::Receiver<ReadJob>>>) {
    loop {
        // Workers take turns receiving; the reads themselves run in
        // parallel once a job is claimed.
        let job = {
            let mut rx = match rx.lock() {
                Ok(rx) => rx,
                Err(_) => return,
            };
            rx.blocking_recv()
        };
        let Some(job) = job else {
            return;
        };
        let result = read_one_chunk(job.file);
        // The requesting task may be gone (client disconnect); dropping
        // the chunk is the correct outcome in that case.
        let _ = job.reply.send(result);
    }
}

fn read_one_chunk(mut file: std::fs::File) -> std::io::Result<(std::fs::File, Bytes)> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let n = file.read(&mut buf)?;
    buf.truncate(n);
    Ok((file, Bytes::from(buf)))
}
