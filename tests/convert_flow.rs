use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use vellum::application::convert::{ConvertMode, ConvertService, ConvertSettings};
use vellum::application::repos::{
    ArtifactCache, BlobStorage, RepoError, SavePreparer, StorageError, TaskStore, WorkQueue,
};
use vellum::domain::conversion::{
    ConversionKey, InputCommand, QueuedWorkItem, TaskRecord,
};
use vellum::domain::types::{
    CommandKind, CsvDelimiter, ErrorCode, FileStatus, OutputFormat, QueuePriority,
};

#[derive(Default)]
struct MemoryTaskStore {
    rows: Mutex<HashMap<String, TaskRecord>>,
    fail_select: std::sync::atomic::AtomicBool,
}

impl MemoryTaskStore {
    async fn seed(&self, record: TaskRecord) {
        self.rows
            .lock()
            .await
            .insert(record.key.as_str().to_string(), record);
    }

    async fn set_status(&self, key: &ConversionKey, status: FileStatus, status_info: i32) {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows.get_mut(key.as_str()) {
            row.status = status;
            row.status_info = status_info;
            row.last_open_date = OffsetDateTime::now_utc();
        }
    }

    fn fail_next_selects(&self) {
        self.fail_select
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_if_absent(&self, record: &TaskRecord) -> Result<bool, RepoError> {
        let mut rows = self.rows.lock().await;
        if rows.contains_key(record.key.as_str()) {
            return Ok(false);
        }
        rows.insert(record.key.as_str().to_string(), record.clone());
        Ok(true)
    }

    async fn select(&self, key: &ConversionKey) -> Result<Option<TaskRecord>, RepoError> {
        if self.fail_select.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(RepoError::from_persistence("select failed"));
        }
        Ok(self.rows.lock().await.get(key.as_str()).cloned())
    }
}

#[derive(Default)]
struct RecordingQueue {
    items: Mutex<Vec<(QueuedWorkItem, QueuePriority)>>,
}

impl RecordingQueue {
    async fn len(&self) -> usize {
        self.items.lock().await.len()
    }
}

#[async_trait]
impl WorkQueue for RecordingQueue {
    async fn enqueue(&self, item: QueuedWorkItem, priority: QueuePriority) -> Result<(), RepoError> {
        self.items.lock().await.push((item, priority));
        Ok(())
    }
}

/// Queue whose "worker" finishes every job instantly, like a fully
/// functional conversion stack from the orchestrator's point of view.
struct ImmediateWorkQueue {
    tasks: Arc<MemoryTaskStore>,
}

#[async_trait]
impl WorkQueue for ImmediateWorkQueue {
    async fn enqueue(&self, item: QueuedWorkItem, _priority: QueuePriority) -> Result<(), RepoError> {
        self.tasks
            .set_status(&item.cmd.doc_id, FileStatus::Ok, 0)
            .await;
        Ok(())
    }
}

#[derive(Default)]
struct MemoryBlobStorage {
    objects: Mutex<HashMap<String, Bytes>>,
    fail_puts: bool,
    deleted_prefixes: Mutex<Vec<String>>,
}

impl MemoryBlobStorage {
    fn failing() -> Self {
        Self {
            fail_puts: true,
            ..Default::default()
        }
    }

    async fn contains(&self, object_key: &str) -> bool {
        self.objects.lock().await.contains_key(object_key)
    }
}

#[async_trait]
impl BlobStorage for MemoryBlobStorage {
    async fn put_object(&self, object_key: &str, data: Bytes) -> Result<(), StorageError> {
        if self.fail_puts {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.objects
            .lock()
            .await
            .insert(object_key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, object_key: &str) -> Result<Bytes, StorageError> {
        self.objects
            .lock()
            .await
            .get(object_key)
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn signed_url(&self, base_url: &str, object_key: &str) -> Result<String, StorageError> {
        Ok(format!("{base_url}/download/{object_key}?signature=test"))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), StorageError> {
        let wanted = format!("{prefix}/");
        self.objects
            .lock()
            .await
            .retain(|key, _| !key.starts_with(&wanted) && key != prefix);
        self.deleted_prefixes.lock().await.push(prefix.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingCache {
    invalidated: Mutex<Vec<String>>,
}

impl RecordingCache {
    async fn invalidations(&self) -> Vec<String> {
        self.invalidated.lock().await.clone()
    }
}

#[async_trait]
impl ArtifactCache for RecordingCache {
    async fn invalidate(&self, key: &ConversionKey) -> Result<(), StorageError> {
        self.invalidated
            .lock()
            .await
            .push(key.as_str().to_string());
        Ok(())
    }
}

#[derive(Default)]
struct RecordingPreparer {
    prepared: Mutex<Vec<InputCommand>>,
}

#[async_trait]
impl SavePreparer for RecordingPreparer {
    async fn prepare_save(&self, cmd: &InputCommand) -> Result<(), StorageError> {
        self.prepared.lock().await.push(cmd.clone());
        Ok(())
    }
}

struct Harness {
    tasks: Arc<MemoryTaskStore>,
    queue: Arc<RecordingQueue>,
    cache: Arc<RecordingCache>,
    preparer: Arc<RecordingPreparer>,
    service: ConvertService,
}

fn settings() -> ConvertSettings {
    ConvertSettings {
        convert_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(50),
        healthcheck_file: std::path::PathBuf::from("fixtures/healthcheck.docx"),
    }
}

fn harness() -> Harness {
    harness_with(settings())
}

fn harness_with(settings: ConvertSettings) -> Harness {
    let tasks = Arc::new(MemoryTaskStore::default());
    let queue = Arc::new(RecordingQueue::default());
    let cache = Arc::new(RecordingCache::default());
    let preparer = Arc::new(RecordingPreparer::default());
    let service = ConvertService::new(
        tasks.clone(),
        queue.clone(),
        Arc::new(MemoryBlobStorage::default()),
        cache.clone(),
        preparer.clone(),
        settings,
    );
    Harness {
        tasks,
        queue,
        cache,
        preparer,
        service,
    }
}

fn plain_command(doc_key: &str, output_ext: &str) -> InputCommand {
    let doc_id = ConversionKey::derive(doc_key, output_ext).expect("key");
    let mut cmd = InputCommand::conv(
        doc_id,
        format!("output.{output_ext}"),
        OutputFormat::Pdf,
    );
    cmd.url = Some("http://source.test/doc1.docx".to_string());
    cmd.format = Some("docx".to_string());
    cmd
}

fn seeded_record(cmd: &InputCommand, status: FileStatus, status_info: i32) -> TaskRecord {
    let mut record = TaskRecord::queued(cmd.doc_id.clone(), "docx", cmd.title.clone());
    record.status = status;
    record.status_info = status_info;
    record
}

#[tokio::test]
async fn duplicate_submissions_enqueue_once() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");

    let first = h
        .service
        .convert(cmd.clone(), ConvertMode::Async, "http://app.test")
        .await
        .expect("first submit");
    let second = h
        .service
        .convert(cmd.clone(), ConvertMode::Async, "http://app.test")
        .await
        .expect("second submit");

    assert_eq!(h.queue.len().await, 1);
    assert_eq!(first.url, None);
    assert_eq!(first.error, ErrorCode::NoError);
    // Before the worker acts the duplicate sees WaitQueue and stays pending.
    assert_eq!(second.url, None);
    assert_eq!(second.error, ErrorCode::NoError);

    let (item, priority) = h.queue.items.lock().await[0].clone();
    assert_eq!(item.cmd.doc_id.as_str(), "conv_doc1_pdf");
    assert_eq!(item.to_file, "output.pdf");
    assert!(!item.from_origin);
    assert_eq!(priority, QueuePriority::Low);
}

#[tokio::test]
async fn ok_status_resolves_to_signed_url() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");
    h.tasks.seed(seeded_record(&cmd, FileStatus::Ok, 0)).await;

    let outcome = h
        .service
        .convert(cmd, ConvertMode::Async, "http://app.test")
        .await
        .expect("convert");

    assert_eq!(outcome.error, ErrorCode::NoError);
    assert_eq!(
        outcome.url.as_deref(),
        Some("http://app.test/download/conv_doc1_pdf/output.pdf?signature=test")
    );
    // Resolving an existing record must not enqueue again.
    assert_eq!(h.queue.len().await, 0);
}

#[tokio::test]
async fn err_status_carries_worker_code_verbatim() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");
    h.tasks.seed(seeded_record(&cmd, FileStatus::Err, 17)).await;

    let outcome = h
        .service
        .convert(cmd, ConvertMode::Async, "http://app.test")
        .await
        .expect("convert");

    assert_eq!(outcome.url, None);
    assert_eq!(outcome.error, ErrorCode::Worker(17));
    assert!(h.cache.invalidations().await.is_empty());
}

#[tokio::test]
async fn err_to_reload_invalidates_cache_exactly_once() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");
    h.tasks
        .seed(seeded_record(&cmd, FileStatus::ErrToReload, 9))
        .await;

    let outcome = h
        .service
        .convert(cmd, ConvertMode::Async, "http://app.test")
        .await
        .expect("convert");

    assert_eq!(outcome.error, ErrorCode::Worker(9));
    assert_eq!(h.cache.invalidations().await, vec!["conv_doc1_pdf"]);
}

#[tokio::test]
async fn foreign_statuses_surface_as_unknown() {
    for status in [
        FileStatus::NeedParams,
        FileStatus::SaveVersion,
        FileStatus::UpdateVersion,
    ] {
        let h = harness();
        let cmd = plain_command("doc1", "pdf");
        h.tasks.seed(seeded_record(&cmd, status, 0)).await;

        let outcome = h
            .service
            .convert(cmd, ConvertMode::Async, "http://app.test")
            .await
            .expect("convert");

        assert_eq!(outcome.url, None);
        assert_eq!(outcome.error, ErrorCode::Unknown);
    }
}

#[tokio::test]
async fn stale_record_times_out_even_when_status_is_ok() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");
    let mut record = seeded_record(&cmd, FileStatus::Ok, 0);
    record.last_open_date = OffsetDateTime::now_utc() - time::Duration::seconds(60);
    h.tasks.seed(record).await;

    let outcome = h
        .service
        .convert(cmd, ConvertMode::Async, "http://app.test")
        .await
        .expect("convert");

    assert_eq!(outcome.url, None);
    assert_eq!(outcome.error, ErrorCode::ConvertTimeout);
}

#[tokio::test(start_paused = true)]
async fn err_status_with_code_zero_keeps_polling_until_timeout() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");
    // A worker that reports Err with code 0 reported nothing actionable;
    // the caller must not see a terminal "failure" with a success code.
    h.tasks.seed(seeded_record(&cmd, FileStatus::Err, 0)).await;

    let outcome = h
        .service
        .convert(cmd, ConvertMode::Sync, "http://app.test")
        .await
        .expect("convert");

    assert_eq!(outcome.url, None);
    assert_eq!(outcome.error, ErrorCode::ConvertTimeout);
}

#[tokio::test(start_paused = true)]
async fn poll_loop_times_out_on_stuck_record() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");

    // First call creates and enqueues; the "worker" never touches the
    // record, so the synchronous wait must end in a timeout.
    let outcome = h
        .service
        .convert(cmd, ConvertMode::Sync, "http://app.test")
        .await
        .expect("convert");

    assert_eq!(outcome.url, None);
    assert_eq!(outcome.error, ErrorCode::ConvertTimeout);
    assert_eq!(h.queue.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn poll_loop_picks_up_late_completion() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");

    let tasks = h.tasks.clone();
    let key = cmd.doc_id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        tasks.set_status(&key, FileStatus::Ok, 0).await;
    });

    let outcome = h
        .service
        .convert(cmd, ConvertMode::Sync, "http://app.test")
        .await
        .expect("convert");

    assert_eq!(outcome.error, ErrorCode::NoError);
    assert!(
        outcome
            .url
            .as_deref()
            .is_some_and(|url| url.contains("/download/conv_doc1_pdf/output.pdf"))
    );
}

#[tokio::test(start_paused = true)]
async fn poll_loop_surfaces_store_errors() {
    let h = harness();
    let cmd = plain_command("doc1", "pdf");
    h.tasks.fail_next_selects();

    let result = h
        .service
        .convert(cmd, ConvertMode::Sync, "http://app.test")
        .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn changes_conversion_prepares_then_submits() {
    let h = harness();
    let doc_id = ConversionKey::new("doc-changes-1").expect("key");

    let last_save = OffsetDateTime::now_utc();
    let outcome = h
        .service
        .convert_from_changes(
            doc_id.clone(),
            "http://app.test",
            Some(last_save),
            Some("cb-7".to_string()),
        )
        .await
        .expect("convert from changes");

    // Asynchronous at the queue layer: the caller sees the initial resolve.
    assert_eq!(outcome.url, None);
    assert_eq!(outcome.error, ErrorCode::NoError);

    let prepared = h.preparer.prepared.lock().await;
    assert_eq!(prepared.len(), 1);
    let cmd = &prepared[0];
    assert_eq!(cmd.kind, CommandKind::Sfcm);
    assert_eq!(cmd.output_format, OutputFormat::Inner);
    assert_eq!(cmd.delimiter, CsvDelimiter::Comma);
    assert!(!cmd.embedded_fonts);
    assert_eq!(cmd.last_save, Some(last_save));
    assert_eq!(cmd.userdata.as_deref(), Some("cb-7"));

    assert_eq!(h.queue.len().await, 1);
    let (item, _) = h.queue.items.lock().await[0].clone();
    assert_eq!(item.cmd.kind, CommandKind::Sfcm);
}

fn fixture_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("fixture");
    file.write_all(b"fixture bytes").expect("write fixture");
    file
}

#[tokio::test(start_paused = true)]
async fn health_probe_succeeds_and_cleans_up() {
    let fixture = fixture_file();
    let tasks = Arc::new(MemoryTaskStore::default());
    let storage = Arc::new(MemoryBlobStorage::default());
    let cache = Arc::new(RecordingCache::default());
    let service = ConvertService::new(
        tasks.clone(),
        Arc::new(ImmediateWorkQueue {
            tasks: tasks.clone(),
        }),
        storage.clone(),
        cache.clone(),
        Arc::new(RecordingPreparer::default()),
        ConvertSettings {
            convert_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            healthcheck_file: fixture.path().to_path_buf(),
        },
    );

    assert!(service.health_probe("http://app.test").await);

    // Cleanup always runs: the origin object is gone and the synthetic
    // key's cache entry was invalidated.
    let invalidations = cache.invalidations().await;
    assert_eq!(invalidations.len(), 1);
    assert!(invalidations[0].starts_with("healthcheck_"));
    let origin_key = format!("{}/origin", invalidations[0]);
    assert!(!storage.contains(&origin_key).await);
}

#[tokio::test(start_paused = true)]
async fn health_probe_with_broken_storage_reports_false_and_cleans_up() {
    let fixture = fixture_file();
    let tasks = Arc::new(MemoryTaskStore::default());
    let storage = Arc::new(MemoryBlobStorage::failing());
    let cache = Arc::new(RecordingCache::default());
    let service = ConvertService::new(
        tasks.clone(),
        Arc::new(RecordingQueue::default()),
        storage.clone(),
        cache.clone(),
        Arc::new(RecordingPreparer::default()),
        ConvertSettings {
            convert_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(50),
            healthcheck_file: fixture.path().to_path_buf(),
        },
    );

    assert!(!service.health_probe("http://app.test").await);

    assert_eq!(cache.invalidations().await.len(), 1);
    assert_eq!(storage.deleted_prefixes.lock().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn health_probe_with_missing_fixture_reports_false() {
    let h = harness_with(ConvertSettings {
        convert_timeout: Duration::from_secs(5),
        poll_interval: Duration::from_millis(50),
        healthcheck_file: std::path::PathBuf::from("does/not/exist.docx"),
    });

    assert!(!h.service.health_probe("http://app.test").await);
    assert_eq!(h.queue.len().await, 0);
}
