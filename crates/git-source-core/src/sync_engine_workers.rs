use crate::error::Result;
use crate::ingest::FileIngestor;
use crate::model::RepositoryConfig;
use crate::sync_engine::{Coordinator, RepoWork, SyncOptions, sync_one};
use std::collections::VecDeque;
use std::sync::{Mutex, mpsc};
use std::thread;

enum RepoEvent {
    Started { index: usize },
    Finished { index: usize, result: Result<RepoWork> },
}

pub(crate) fn run_work_items(
    repos: &[RepositoryConfig],
    options: &SyncOptions,
    ingestor: &dyn FileIngestor,
    coordinator: &mut Coordinator<'_>,
) -> anyhow::Result<()> {
    let jobs = options.jobs.min(repos.len());
    if jobs <= 1 {
        return run_work_items_serial(repos, options, ingestor, coordinator);
    }
    run_work_items_parallel(repos, options, ingestor, coordinator, jobs)
}

fn run_work_items_serial(
    repos: &[RepositoryConfig],
    options: &SyncOptions,
    ingestor: &dyn FileIngestor,
    coordinator: &mut Coordinator<'_>,
) -> anyhow::Result<()> {
    for (index, config) in repos.iter().enumerate() {
        coordinator.started(index);
        let result = sync_one(config, options, ingestor);
        coordinator.finished(index, result)?;
    }
    Ok(())
}

/// Workers pull repositories off a shared queue and send results back;
/// registration stays on this thread.
fn run_work_items_parallel(
    repos: &[RepositoryConfig],
    options: &SyncOptions,
    ingestor: &dyn FileIngestor,
    coordinator: &mut Coordinator<'_>,
    jobs: usize,
) -> anyhow::Result<()> {
    let queue = Mutex::new((0..repos.len()).collect::<VecDeque<_>>());
    let (tx, rx) = mpsc::channel::<RepoEvent>();

    thread::scope(|scope| {
        for _ in 0..jobs {
            let tx = tx.clone();
            let queue = &queue;
            scope.spawn(move || {
                loop {
                    let next = queue.lock().ok().and_then(|mut pending| pending.pop_front());
                    let Some(index) = next else {
                        break;
                    };
                    let _ = tx.send(RepoEvent::Started { index });
                    let result = sync_one(&repos[index], options, ingestor);
                    let _ = tx.send(RepoEvent::Finished { index, result });
                }
            });
        }
        drop(tx);

        let mut first_error = None;
        while let Ok(event) = rx.recv() {
            if first_error.is_some() {
                continue;
            }
            let handled = match event {
                RepoEvent::Started { index } => {
                    coordinator.started(index);
                    Ok(())
                }
                RepoEvent::Finished { index, result } => coordinator.finished(index, result),
            };
            if let Err(err) = handled {
                if let Ok(mut pending) = queue.lock() {
                    pending.clear();
                }
                first_error = Some(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    })
}
