// Paginated download of a day's archive.
//
// The row count reported by the server is turned into a plan of fixed-size
// page requests. Pages are fetched one after another, never concurrently,
// with a short pause in between, and glued back together in plan order.
// The first failing page aborts the whole download.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::api::{self, require};
use crate::error::ClientError;
use crate::model::{DateKey, Dataset, Page};
use crate::transport::Transport;

/// Rows requested per page.
pub const PAGE_SIZE: u64 = 100;

/// Pause between two page requests in production.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(10);

const RETRIEVAL: &str = "retrieval";

/// Parameters of one page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub sequence_number: u64,
    pub limit: u64,
    pub offset: u64,
}

impl PageRequest {
    /// Page `sequence_number` of a plan using pages of `page_size` rows.
    pub fn new(sequence_number: u64, page_size: u64) -> Self {
        PageRequest {
            sequence_number,
            limit: page_size,
            offset: sequence_number * page_size,
        }
    }
}

/// The ordered list of page requests needed for `total_rows` rows.
///
/// The limit is always `PAGE_SIZE`, even when fewer rows exist, and only
/// whole pages are requested once there is at least one: the rows past the
/// last full page are not fetched. The server relies on this request shape.
pub fn plan(total_rows: u64) -> Vec<PageRequest> {
    if total_rows == 0 {
        return Vec::new();
    }
    match total_rows / PAGE_SIZE {
        0 => vec![PageRequest::new(0, PAGE_SIZE)],
        full_pages => (0..full_pages)
            .map(|i| PageRequest::new(i, PAGE_SIZE))
            .collect(),
    }
}

/// Waits between consecutive page requests.
pub trait Pacer {
    fn pause(&self);
}

/// Sleeps the current thread for a fixed duration.
#[derive(Debug, Clone, Copy)]
pub struct ThreadSleep(pub Duration);

impl Default for ThreadSleep {
    fn default() -> Self {
        ThreadSleep(DEFAULT_PAGE_DELAY)
    }
}

impl Pacer for ThreadSleep {
    fn pause(&self) {
        thread::sleep(self.0);
    }
}

/// Does not wait at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl Pacer for NoDelay {
    fn pause(&self) {}
}

/// Receives download progress.
pub trait ProgressSink {
    /// Called after page `done - 1` has arrived; `total` is the plan length.
    fn page_done(&mut self, done: u64, total: u64);

    /// Called once every page has arrived.
    fn finish(&mut self) {}
}

/// Discards progress updates.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn page_done(&mut self, _done: u64, _total: u64) {}
}

/// Fetch every page of `requests` in order.
///
/// On failure the pages collected so far are dropped and the error names the
/// sequence number that failed.
#[allow(clippy::too_many_arguments)]
pub fn fetch_pages(
    transport: &dyn Transport,
    url: &str,
    token: &str,
    name: &str,
    date: &DateKey,
    requests: &[PageRequest],
    pacer: &dyn Pacer,
    progress: &mut dyn ProgressSink,
) -> Result<Vec<Page>, ClientError> {
    let date = date.to_string();
    let total = requests.len() as u64;
    let mut pages = Vec::with_capacity(requests.len());

    for (i, request) in requests.iter().enumerate() {
        if i > 0 {
            pacer.pause();
        }
        let page = api::request_page(transport, url, token, name, &date, *request).map_err(
            |source| ClientError::PageAborted {
                sequence: request.sequence_number,
                source: Box::new(source),
            },
        )?;
        debug!(
            sequence = page.sequence_number,
            rows = page.records.len(),
            "page received"
        );
        pages.push(page);
        progress.page_done(i as u64 + 1, total);
    }

    progress.finish();
    Ok(pages)
}

/// Flatten pages into a dataset for `date`, keeping page order and the
/// server's order within each page.
pub fn assemble(date: DateKey, pages: Vec<Page>) -> Dataset {
    let records = pages.into_iter().flat_map(|page| page.records).collect();
    Dataset { date, records }
}

/// Download the archive of `date`, expecting `total_rows` rows.
///
/// Arguments are validated even when there is nothing to fetch.
#[allow(clippy::too_many_arguments)]
pub fn retrieve(
    transport: &dyn Transport,
    url: &str,
    token: &str,
    name: &str,
    date: &str,
    total_rows: u64,
    pacer: &dyn Pacer,
    progress: &mut dyn ProgressSink,
) -> Result<Dataset, ClientError> {
    require(RETRIEVAL, "token", token)?;
    require(RETRIEVAL, "name", name)?;
    let date = DateKey::parse_for(RETRIEVAL, date)?;
    require(RETRIEVAL, "url", url)?;

    let requests = plan(total_rows);
    info!(%date, total_rows, pages = requests.len(), "starting paginated retrieval");

    let pages = fetch_pages(transport, url, token, name, &date, &requests, pacer, progress)?;
    let dataset = assemble(date, pages);

    info!(%date, records = dataset.len(), "retrieval complete");
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::Record;
    use crate::transport::scripted::ScriptedTransport;
    use crate::transport::TransportError;
    use std::cell::Cell;

    const URL: &str = "https://archive.local/partdatadb";
    const DATE: &str = "2024-05-01";

    fn record(tag: &str) -> Record {
        Record {
            name: tag.to_string(),
            value: "1.0".to_string(),
            quality: "good".to_string(),
            timestamp: format!("{DATE} 00:00:00"),
        }
    }

    fn page_body(sequence: u64, rows: usize) -> String {
        let records: Vec<Record> = (0..rows).map(|r| record(&format!("p{sequence}r{r}"))).collect();
        serde_json::json!({ "numbreq": sequence, "data": records }).to_string()
    }

    fn date() -> DateKey {
        DateKey::parse_for("test", DATE).unwrap()
    }

    #[derive(Default)]
    struct CountingPacer(Cell<usize>);

    impl Pacer for CountingPacer {
        fn pause(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        updates: Vec<(u64, u64)>,
        finished: bool,
    }

    impl ProgressSink for RecordingProgress {
        fn page_done(&mut self, done: u64, total: u64) {
            self.updates.push((done, total));
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }

    fn run(transport: &ScriptedTransport, rows: u64) -> Result<Dataset, ClientError> {
        retrieve(transport, URL, "tok", "user", DATE, rows, &NoDelay, &mut NoProgress)
    }

    #[test]
    fn plan_is_empty_without_rows() {
        assert!(plan(0).is_empty());
    }

    #[test]
    fn plan_below_one_page_asks_for_a_full_page() {
        for rows in [1, 42, 99] {
            assert_eq!(plan(rows), vec![PageRequest { sequence_number: 0, limit: 100, offset: 0 }]);
        }
    }

    #[test]
    fn plan_requests_whole_pages_only() {
        for rows in [100u64, 199, 250, 1000, 1099] {
            let requests = plan(rows);
            assert_eq!(requests.len() as u64, rows / 100, "{rows}");
            for (i, request) in requests.iter().enumerate() {
                let i = i as u64;
                assert_eq!(*request, PageRequest { sequence_number: i, limit: 100, offset: 100 * i });
            }
        }
    }

    #[test]
    fn zero_rows_makes_no_requests() {
        let transport = ScriptedTransport::new();
        let dataset = run(&transport, 0).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.date, date());
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn small_day_returns_whatever_the_server_sent() {
        let transport = ScriptedTransport::new().reply(200, page_body(0, 37));
        let dataset = run(&transport, 42).unwrap();

        assert_eq!(dataset.len(), 37);
        assert_eq!(transport.calls(), 1);
        assert_eq!(transport.param(0, "strLimit").as_deref(), Some("100"));
        assert_eq!(transport.param(0, "strOffSet").as_deref(), Some("0"));
    }

    #[test]
    fn two_hundred_fifty_rows_fetch_two_pages() {
        let transport = ScriptedTransport::new()
            .reply(200, page_body(0, 100))
            .reply(200, page_body(1, 100));
        let dataset = run(&transport, 250).unwrap();

        assert_eq!(dataset.len(), 200);
        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.param(0, "strOffSet").as_deref(), Some("0"));
        assert_eq!(transport.param(1, "strOffSet").as_deref(), Some("100"));
        assert_eq!(transport.param(1, "numbReg").as_deref(), Some("1"));
        assert_eq!(dataset.records[0].name, "p0r0");
        assert_eq!(dataset.records[100].name, "p1r0");
        assert_eq!(dataset.records[199].name, "p1r99");
    }

    #[test]
    fn every_page_carries_date_name_and_token() {
        let transport = ScriptedTransport::new()
            .reply(200, page_body(0, 1))
            .reply(200, page_body(1, 1))
            .reply(200, page_body(2, 1));
        run(&transport, 300).unwrap();

        for i in 0..3 {
            assert_eq!(transport.param(i, "date").as_deref(), Some(DATE));
            assert_eq!(transport.param(i, "name").as_deref(), Some("user"));
            assert_eq!(transport.requests()[i].token.as_deref(), Some("tok"));
        }
    }

    #[test]
    fn pauses_between_pages_and_reports_progress() {
        let transport = ScriptedTransport::new()
            .reply(200, page_body(0, 2))
            .reply(200, page_body(1, 2))
            .reply(200, page_body(2, 2));
        let pacer = CountingPacer::default();
        let mut progress = RecordingProgress::default();

        retrieve(&transport, URL, "tok", "user", DATE, 300, &pacer, &mut progress).unwrap();

        assert_eq!(pacer.0.get(), 2);
        assert_eq!(progress.updates, vec![(1, 3), (2, 3), (3, 3)]);
        assert!(progress.finished);
    }

    #[test]
    fn single_page_plan_reports_complete_progress() {
        let transport = ScriptedTransport::new().reply(200, page_body(0, 42));
        let pacer = CountingPacer::default();
        let mut progress = RecordingProgress::default();

        let dataset =
            retrieve(&transport, URL, "tok", "user", DATE, 42, &pacer, &mut progress).unwrap();

        assert_eq!(dataset.len(), 42);
        assert_eq!(transport.calls(), 1);
        assert_eq!(pacer.0.get(), 0);
        assert_eq!(progress.updates, vec![(1, 1)]);
        assert!(progress.finished);
    }

    #[test]
    fn failing_page_aborts_and_names_its_index() {
        let transport = ScriptedTransport::new()
            .reply(200, page_body(0, 100))
            .reply(200, page_body(1, 100))
            .reply(500, "boom");
        let mut progress = RecordingProgress::default();

        let err = retrieve(&transport, URL, "tok", "user", DATE, 500, &NoDelay, &mut progress)
            .unwrap_err();

        assert_eq!(err.failed_page(), Some(2));
        assert_eq!(err.kind(), ErrorKind::Server);
        assert_eq!(transport.calls(), 3);
        assert!(!progress.finished);
    }

    #[test]
    fn transport_failure_on_a_page_names_its_index() {
        let transport = ScriptedTransport::new()
            .reply(200, page_body(0, 100))
            .fail(TransportError::InvalidToken);
        let err = run(&transport, 200).unwrap_err();

        assert_eq!(err.failed_page(), Some(1));
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn malformed_page_is_a_decode_failure() {
        let transport = ScriptedTransport::new().reply(200, "[]");
        let err = run(&transport, 5).unwrap_err();
        assert_eq!(err.failed_page(), Some(0));
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn validation_happens_before_any_request_even_without_rows() {
        let transport = ScriptedTransport::new();
        let token = retrieve(&transport, URL, "", "user", "bad", 0, &NoDelay, &mut NoProgress)
            .unwrap_err();
        let date = retrieve(&transport, URL, "tok", "user", "2024-02-30", 500, &NoDelay, &mut NoProgress)
            .unwrap_err();
        let url = retrieve(&transport, "", "tok", "user", DATE, 500, &NoDelay, &mut NoProgress)
            .unwrap_err();

        assert_eq!(token.invalid_argument(), Some("token"));
        assert_eq!(date.invalid_argument(), Some("date"));
        assert_eq!(url.invalid_argument(), Some("url"));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn repeated_retrieval_yields_the_same_dataset() {
        let script = || {
            ScriptedTransport::new()
                .reply(200, page_body(0, 100))
                .reply(200, page_body(1, 50))
        };
        let first = run(&script(), 230).unwrap();
        let second = run(&script(), 230).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn assemble_concatenates_in_page_order() {
        let pages = vec![
            Page { sequence_number: 0, records: vec![record("a"), record("b")] },
            Page { sequence_number: 1, records: vec![] },
            Page { sequence_number: 2, records: vec![record("c"), record("a")] },
        ];
        let dataset = assemble(date(), pages);
        let names: Vec<&str> = dataset.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c", "a"]);
    }

    #[test]
    fn assemble_of_nothing_is_empty() {
        let dataset = assemble(date(), Vec::new());
        assert!(dataset.is_empty());
        assert_eq!(dataset.date, date());
    }
}
