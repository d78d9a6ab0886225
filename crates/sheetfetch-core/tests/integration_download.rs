//! Integration tests: full download runs against a local HTTP server.
//!
//! Each test writes a workbook into a temp dir, runs the pipeline, and checks
//! the rewritten statuses, the files on disk, and what the server saw.

mod common;

use common::http_server::{self, body_for};
use sheetfetch_core::config::SheetfetchConfig;
use sheetfetch_core::engine::Outcome;
use sheetfetch_core::pipeline;
use sheetfetch_core::recorder::ProgressSink;
use sheetfetch_core::table::{open_store, Cell, JsonStore, Table, TableStore, Workbook};
use std::path::Path;
use tempfile::tempdir;

#[derive(Default)]
struct Collect {
    planned_total: usize,
    lines: Vec<(String, String, String)>,
    last_done: usize,
}

impl ProgressSink for Collect {
    fn planned(&mut self, _summary: &[sheetfetch_core::planner::TableSummary], total: usize) {
        self.planned_total = total;
    }

    fn completed(&mut self, outcome: &Outcome, url: &str, done: usize, _total: usize) {
        self.lines.push((
            outcome.status.to_string(),
            outcome.table.clone(),
            url.to_string(),
        ));
        self.last_done = done;
    }
}

fn config(root: &Path) -> SheetfetchConfig {
    SheetfetchConfig {
        download_root: root.join("downloads"),
        archive_root: root.join("archives"),
        request_timeout_secs: 10,
        user_agent: "sheetfetch-tests/1.0 (ops@example.com)".into(),
        ..SheetfetchConfig::default()
    }
}

fn table(name: &str, rows: Vec<(String, &str)>) -> Table {
    Table::new(
        name,
        vec!["URL".into(), "Status".into(), "Reason".into()],
        rows.into_iter()
            .map(|(url, status)| vec![Cell::text(url), Cell::text(status), Cell::text("")])
            .collect(),
    )
    .unwrap()
}

fn write_workbook(path: &Path, tables: Vec<Table>) -> JsonStore {
    let store = JsonStore::new(path);
    store.save(&Workbook::new(tables).unwrap()).unwrap();
    store
}

fn statuses(wb: &Workbook, table: &str) -> Vec<String> {
    let t = wb.table(table).unwrap();
    (0..t.len())
        .map(|r| t.get(r, "Status").unwrap().to_string())
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn books_scenario_skips_fetches_and_records() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let store = write_workbook(
        &dir.path().join("book.json"),
        vec![table(
            "Books",
            vec![
                (server.url("/files/a.pdf"), "ok"),
                (server.url("/files/b.pdf"), ""),
                (server.url("/missing/c.pdf"), "fail: timeout"),
            ],
        )],
    );
    // File from an earlier successful run.
    let books_dir = cfg.download_root.join("Books");
    std::fs::create_dir_all(&books_dir).unwrap();
    std::fs::write(books_dir.join("a.pdf"), body_for("/files/a.pdf")).unwrap();

    let mut progress = Collect::default();
    let report = pipeline::run_download(&store, &cfg, &mut progress)
        .await
        .unwrap();

    assert_eq!(progress.planned_total, 2);
    assert_eq!(report.planned[0].queued, 2);
    assert_eq!(report.summary.ok, 1);
    assert_eq!(report.summary.failed, 1);
    assert!(report.saved);
    assert_eq!(server.stats.requests(), 2, "row with status ok is never fetched");

    let wb = store.load().unwrap();
    assert_eq!(statuses(&wb, "Books"), vec!["ok", "ok", "fail"]);
    let books = wb.table("Books").unwrap();
    assert_eq!(books.get(2, "Reason"), Some(&Cell::text("HTTPError: 404")));
    assert_eq!(books.get(1, "Reason"), Some(&Cell::text("")));

    assert_eq!(
        std::fs::read(books_dir.join("b.pdf")).unwrap(),
        body_for("/files/b.pdf")
    );
    let mut names: Vec<String> = std::fs::read_dir(&books_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.pdf", "b.pdf"], "failed fetch leaves no file or .part");

    assert_eq!(progress.lines.len(), 2);
    assert_eq!(progress.last_done, 2);
    assert!(progress
        .lines
        .iter()
        .any(|(status, table, url)| status == "fail" && table == "Books" && url.ends_with("/missing/c.pdf")));
    assert!(server
        .stats
        .user_agents()
        .iter()
        .all(|ua| ua == "sheetfetch-tests/1.0 (ops@example.com)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_run_only_retries_failures() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let store = write_workbook(
        &dir.path().join("book.json"),
        vec![table(
            "Books",
            vec![
                (server.url("/files/one.pdf"), ""),
                (server.url("/missing/two.pdf"), ""),
            ],
        )],
    );

    pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert_eq!(server.stats.requests(), 2);

    let report = pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert_eq!(report.planned[0].queued, 1, "only the failed row is planned again");
    assert_eq!(server.stats.requests(), 3);
    assert_eq!(statuses(&store.load().unwrap(), "Books"), vec!["ok", "fail"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn existing_files_are_not_requested() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let store = write_workbook(
        &dir.path().join("book.json"),
        vec![table(
            "Maps",
            vec![
                (server.url("/files/north.png"), ""),
                (server.url("/files/south.png"), "fail"),
            ],
        )],
    );
    let maps_dir = cfg.download_root.join("Maps");
    std::fs::create_dir_all(&maps_dir).unwrap();
    std::fs::write(maps_dir.join("north.png"), b"n").unwrap();
    std::fs::write(maps_dir.join("south.png"), b"s").unwrap();

    let report = pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert_eq!(report.summary.exists, 2);
    assert_eq!(server.stats.requests(), 0);
    assert_eq!(report.peak_in_flight, 0);
    assert_eq!(statuses(&store.load().unwrap(), "Maps"), vec!["exists", "exists"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn unreachable_host_does_not_block_other_jobs() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let mut rows: Vec<(String, &str)> = (0..6)
        .map(|i| (server.url(&format!("/slow/{}.bin", i)), ""))
        .collect();
    rows.insert(2, ("http://127.0.0.1:1/never.bin".to_string(), ""));
    let store = write_workbook(&dir.path().join("book.json"), vec![table("Mixed", rows)]);

    let report = pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert_eq!(report.summary.ok, 6);
    assert_eq!(report.summary.failed, 1);

    let wb = store.load().unwrap();
    let mixed = wb.table("Mixed").unwrap();
    assert_eq!(mixed.get(2, "Status"), Some(&Cell::text("fail")));
    let reason = mixed.get(2, "Reason").unwrap().to_string();
    assert!(reason.starts_with("NetworkError: "), "got {reason}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rows_sharing_a_destination_never_mix_bodies() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    // Each pair resolves to T/f<i>.bin; bodies differ in length.
    let pairs: Vec<(String, String)> = (0..5)
        .map(|i| {
            (
                format!("/slow/s{}/f{}.bin", i, i),
                format!("/slow/a-much-longer-directory-name-{}/f{}.bin", i, i),
            )
        })
        .collect();
    let rows: Vec<(String, &str)> = pairs
        .iter()
        .flat_map(|(a, b)| [(server.url(a), ""), (server.url(b), "")])
        .collect();
    let store = write_workbook(&dir.path().join("book.json"), vec![table("T", rows)]);

    let report = pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.ok, 5, "one writer wins per destination");
    assert_eq!(report.summary.exists, 5);

    let folder = cfg.download_root.join("T");
    for (i, (a, b)) in pairs.iter().enumerate() {
        let content = std::fs::read(folder.join(format!("f{}.bin", i))).unwrap();
        assert!(
            content == body_for(a) || content == body_for(b),
            "f{}.bin holds a mix: {:?}",
            i,
            String::from_utf8_lossy(&content)
        );
    }
    let leftovers: Vec<_> = std::fs::read_dir(&folder)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|n| n.ends_with(".part"))
        .collect();
    assert!(leftovers.is_empty(), "leftover temp files: {:?}", leftovers);

    let st = statuses(&store.load().unwrap(), "T");
    for pair in st.chunks(2) {
        let mut pair = pair.to_vec();
        pair.sort();
        assert_eq!(pair, vec!["exists", "ok"]);
    }

    // Next run has nothing left for these rows.
    let again = pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert!(!again.saved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_never_exceeds_limit() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = SheetfetchConfig {
        max_concurrent: 3,
        ..config(dir.path())
    };
    let rows: Vec<(String, &str)> = (0..30)
        .map(|i| (server.url(&format!("/slow/{}.bin", i)), ""))
        .collect();
    let store = write_workbook(&dir.path().join("book.json"), vec![table("Bulk", rows)]);

    let mut progress = Collect::default();
    let report = pipeline::run_download(&store, &cfg, &mut progress)
        .await
        .unwrap();

    assert_eq!(report.summary.ok, 30);
    assert_eq!(progress.lines.len(), 30, "one outcome per job");
    assert!(report.peak_in_flight <= 3, "engine peak {}", report.peak_in_flight);
    assert!(report.peak_in_flight >= 1);
    assert!(
        server.stats.peak_in_flight() <= 3,
        "server saw {} at once",
        server.stats.peak_in_flight()
    );
    assert!(statuses(&store.load().unwrap(), "Bulk").iter().all(|s| s == "ok"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slow_response_times_out() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = SheetfetchConfig {
        request_timeout_secs: 1,
        ..config(dir.path())
    };
    let store = write_workbook(
        &dir.path().join("book.json"),
        vec![table("Slow", vec![(server.url("/hang/big.iso"), "")])],
    );

    let report = pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert_eq!(report.summary.failed, 1);
    let wb = store.load().unwrap();
    let reason = wb.table("Slow").unwrap().get(0, "Reason").unwrap().to_string();
    assert!(reason.starts_with("TimeoutError: "), "got {reason}");
    assert!(!cfg.download_root.join("Slow/big.iso").exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn csv_directory_store_is_rewritten_in_place() {
    let server = http_server::start();
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let tables = dir.path().join("tables");
    std::fs::create_dir_all(&tables).unwrap();
    std::fs::write(
        tables.join("Books.csv"),
        format!("Title,URL\nFirst,{}\n", server.url("/files/first.pdf")),
    )
    .unwrap();
    std::fs::write(tables.join("Untouched.csv"), "URL,Status\nhttps://example.com/x,ok\n").unwrap();

    let store = open_store(&tables).unwrap();
    let report = pipeline::run_download(store.as_ref(), &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert_eq!(report.summary.ok, 1);
    assert_eq!(report.planned.len(), 2);
    assert_eq!(report.planned[1].queued, 0);

    assert_eq!(
        std::fs::read_to_string(tables.join("Books.csv")).unwrap(),
        format!("Title,URL,Status,Reason\nFirst,{},ok,\n", server.url("/files/first.pdf"))
    );
    assert_eq!(
        std::fs::read_to_string(tables.join("Untouched.csv")).unwrap(),
        "URL,Status,Reason\nhttps://example.com/x,ok,\n"
    );
    assert!(cfg.download_root.join("Books/first.pdf").exists());
}

#[tokio::test]
async fn nothing_to_do_leaves_store_untouched() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let path = dir.path().join("book.json");
    write_workbook(
        &path,
        vec![table("Done", vec![("https://example.com/a.pdf".into(), "ok")])],
    );
    let before = std::fs::read(&path).unwrap();

    let store = open_store(&path).unwrap();
    let report = pipeline::run_download(store.as_ref(), &cfg, &mut Collect::default())
        .await
        .unwrap();
    assert!(!report.saved);
    assert_eq!(report.summary.total(), 0);
    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert!(!cfg.download_root.exists());
}

#[tokio::test]
async fn table_without_url_column_aborts_run() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let path = dir.path().join("book.json");
    let store = JsonStore::new(&path);
    store
        .save(
            &Workbook::new(vec![Table::new(
                "Links",
                vec!["Link".into()],
                vec![vec![Cell::text("https://example.com/a.pdf")]],
            )
            .unwrap()])
            .unwrap(),
        )
        .unwrap();

    let err = pipeline::run_download(&store, &cfg, &mut Collect::default())
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("no \"URL\" column"));
}

#[tokio::test]
async fn missing_store_is_a_setup_error() {
    let dir = tempdir().unwrap();
    assert!(open_store(&dir.path().join("absent.json")).is_err());
}
