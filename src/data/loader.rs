use std::time::{Duration, Instant};

use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

use super::error::DataError;
use super::model::{type_columns, CellValue, Dataset, Table};
use crate::settings::{SourceKind, SourceSettings};

// ---------------------------------------------------------------------------
// Source capability
// ---------------------------------------------------------------------------

/// A backend that can produce the full budget dataset.
///
/// Every backend makes a single attempt per call; failures propagate
/// immediately and nothing partial is returned.
pub trait DatasetSource {
    /// Short human-readable description for logs and the status bar.
    fn describe(&self) -> String;

    /// Fetch, normalize and validate the complete dataset.
    fn load(&mut self) -> Result<Dataset, DataError>;

    /// Whether [`DatasetSource::append`] is implemented.
    fn supports_append(&self) -> bool {
        false
    }

    /// Append rows (already in the sheet's column order). Returns the number
    /// of rows written.
    fn append(&mut self, _rows: &[Vec<CellValue>]) -> Result<usize, DataError> {
        Err(DataError::AppendUnsupported)
    }

    /// Drop anything held between loads.
    fn invalidate(&mut self) {}
}

impl<S: DatasetSource + ?Sized> DatasetSource for Box<S> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn load(&mut self) -> Result<Dataset, DataError> {
        (**self).load()
    }

    fn supports_append(&self) -> bool {
        (**self).supports_append()
    }

    fn append(&mut self, rows: &[Vec<CellValue>]) -> Result<usize, DataError> {
        (**self).append(rows)
    }

    fn invalidate(&mut self) {
        (**self).invalidate()
    }
}

/// Build the configured backend, wrapped in a cache when a TTL is set.
pub fn open_source(settings: &SourceSettings) -> Result<Box<dyn DatasetSource>, DataError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()?;

    let source: Box<dyn DatasetSource> = match settings.kind {
        SourceKind::CsvExport => Box::new(CsvExportSource::new(
            client,
            &settings.sheet_id,
            &settings.sheet_name,
        )?),
        SourceKind::SheetsApi => Box::new(SheetsApiSource::new(
            client,
            &settings.sheet_id,
            &settings.sheet_name,
            &settings.token_env,
        )),
    };

    if settings.cache_ttl_secs > 0 {
        let ttl = Duration::from_secs(settings.cache_ttl_secs);
        Ok(Box::new(CachedSource::new(source, ttl)))
    } else {
        Ok(source)
    }
}

// ---------------------------------------------------------------------------
// Public CSV export
// ---------------------------------------------------------------------------

const CSV_EXPORT_BASE: &str = "https://docs.google.com/spreadsheets/d";

/// Reads a publicly shared sheet through its CSV export endpoint.
pub struct CsvExportSource {
    client: Client,
    url: Url,
}

impl CsvExportSource {
    pub fn new(client: Client, sheet_id: &str, sheet_name: &str) -> Result<Self, DataError> {
        Self::with_base_url(client, CSV_EXPORT_BASE, sheet_id, sheet_name)
    }

    /// Same as [`CsvExportSource::new`] against another host (mirrors, tests).
    pub fn with_base_url(
        client: Client,
        base: &str,
        sheet_id: &str,
        sheet_name: &str,
    ) -> Result<Self, DataError> {
        Ok(Self {
            client,
            url: csv_export_url(base, sheet_id, sheet_name)?,
        })
    }
}

pub fn csv_export_url(base: &str, sheet_id: &str, sheet_name: &str) -> Result<Url, DataError> {
    let base = format!("{}/{sheet_id}/gviz/tq", base.trim_end_matches('/'));
    Url::parse_with_params(&base, &[("tqx", "out:csv"), ("sheet", sheet_name)])
        .map_err(|e| DataError::DataUnavailable(format!("invalid export URL: {e}")))
}

impl DatasetSource for CsvExportSource {
    fn describe(&self) -> String {
        format!("CSV export {}", self.url)
    }

    fn load(&mut self) -> Result<Dataset, DataError> {
        log::debug!("GET {}", self.url);
        let text = self
            .client
            .get(self.url.clone())
            .send()?
            .error_for_status()?
            .text()?;
        Dataset::from_table(parse_csv(&text)?)
    }
}

/// Header row + data rows, typed per column.
pub fn parse_csv(text: &str) -> Result<Table, DataError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::DataUnavailable(format!("reading CSV headers: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record = result
            .map_err(|e| DataError::DataUnavailable(format!("CSV row {row_no}: {e}")))?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table {
        header,
        rows: type_columns(rows),
    })
}

// ---------------------------------------------------------------------------
// Authenticated values API
// ---------------------------------------------------------------------------

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Reads (and appends to) a sheet through the authenticated values API.
///
/// The bearer token is taken from an environment variable on every call, so
/// a refreshed token is picked up without restarting.
pub struct SheetsApiSource {
    client: Client,
    base: String,
    spreadsheet_id: String,
    sheet_name: String,
    token_env: String,
}

/// `spreadsheets.values.get` response body.
#[derive(Debug, Deserialize)]
pub struct ValueRange {
    #[serde(default)]
    pub values: Vec<Vec<JsonValue>>,
}

#[derive(Debug, Deserialize)]
struct AppendResponse {
    updates: Option<UpdateSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateSummary {
    updated_rows: Option<usize>,
}

impl SheetsApiSource {
    pub fn new(client: Client, spreadsheet_id: &str, sheet_name: &str, token_env: &str) -> Self {
        Self::with_base_url(client, SHEETS_API_BASE, spreadsheet_id, sheet_name, token_env)
    }

    pub fn with_base_url(
        client: Client,
        base: &str,
        spreadsheet_id: &str,
        sheet_name: &str,
        token_env: &str,
    ) -> Self {
        Self {
            client,
            base: base.to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            sheet_name: sheet_name.to_string(),
            token_env: token_env.to_string(),
        }
    }

    fn token(&self) -> Result<String, DataError> {
        std::env::var(&self.token_env).map_err(|_| {
            DataError::DataUnavailable(format!(
                "no access token: environment variable {} is not set",
                self.token_env
            ))
        })
    }

    /// `{base}/{id}/values/{range}` with each segment percent-encoded.
    pub fn values_url(&self, range: &str) -> Result<Url, DataError> {
        let mut url = Url::parse(&self.base)
            .map_err(|e| DataError::DataUnavailable(format!("invalid API URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| DataError::DataUnavailable("invalid API URL".into()))?
            .pop_if_empty()
            .extend([self.spreadsheet_id.as_str(), "values", range]);
        Ok(url)
    }

    /// `values.append` endpoint. `RAW` stores strings exactly as sent, so
    /// `"007"` stays text and a leading `=` is not evaluated.
    pub fn append_url(&self) -> Result<Url, DataError> {
        let mut url = self.values_url(&format!("{}:append", self.sheet_name))?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");
        Ok(url)
    }
}

impl DatasetSource for SheetsApiSource {
    fn describe(&self) -> String {
        format!("Sheets API {}/{}", self.spreadsheet_id, self.sheet_name)
    }

    fn load(&mut self) -> Result<Dataset, DataError> {
        let url = self.values_url(&self.sheet_name)?;
        log::debug!("GET {url}");
        let body: ValueRange = self
            .client
            .get(url)
            .bearer_auth(self.token()?)
            .send()?
            .error_for_status()?
            .json()?;
        Dataset::from_table(parse_value_range(body))
    }

    fn supports_append(&self) -> bool {
        true
    }

    fn append(&mut self, rows: &[Vec<CellValue>]) -> Result<usize, DataError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let url = self.append_url()?;
        let values: Vec<Vec<JsonValue>> = rows
            .iter()
            .map(|row| row.iter().map(cell_to_json).collect())
            .collect();

        log::debug!("POST {url} ({} rows)", rows.len());
        let resp: AppendResponse = self
            .client
            .post(url)
            .bearer_auth(self.token()?)
            .json(&json!({ "values": values }))
            .send()?
            .error_for_status()?
            .json()?;

        Ok(resp
            .updates
            .and_then(|u| u.updated_rows)
            .unwrap_or(rows.len()))
    }
}

/// First row is the header; the API omits trailing empty cells.
///
/// Cells are flattened to text and typed per column, the same as CSV.
pub fn parse_value_range(body: ValueRange) -> Table {
    let mut rows = body.values.into_iter();
    let header = rows.next().unwrap_or_default().iter().map(json_to_text).collect();
    let rows = rows
        .map(|row| row.iter().map(json_to_text).collect())
        .collect();
    Table {
        header,
        rows: type_columns(rows),
    }
}

fn json_to_text(val: &JsonValue) -> String {
    match val {
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(true) => "TRUE".to_string(),
        JsonValue::Bool(false) => "FALSE".to_string(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

fn cell_to_json(cell: &CellValue) -> JsonValue {
    match cell {
        CellValue::Text(s) => JsonValue::String(s.clone()),
        CellValue::Integer(i) => json!(i),
        CellValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(f.to_string())),
        CellValue::Bool(b) => JsonValue::Bool(*b),
        CellValue::Empty => JsonValue::String(String::new()),
    }
}

// ---------------------------------------------------------------------------
// Time-boxed cache
// ---------------------------------------------------------------------------

/// Serves the last fetched dataset until `ttl` elapses, then refetches
/// synchronously. Failed loads are never cached.
pub struct CachedSource<S> {
    inner: S,
    ttl: Duration,
    cached: Option<(Instant, Dataset)>,
}

impl<S: DatasetSource> CachedSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            cached: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: DatasetSource> DatasetSource for CachedSource<S> {
    fn describe(&self) -> String {
        format!("{} (cached {}s)", self.inner.describe(), self.ttl.as_secs())
    }

    fn load(&mut self) -> Result<Dataset, DataError> {
        if let Some((fetched_at, dataset)) = &self.cached {
            if fetched_at.elapsed() < self.ttl {
                log::debug!("cache hit ({} records)", dataset.len());
                return Ok(dataset.clone());
            }
        }
        log::debug!("cache miss, fetching from {}", self.inner.describe());
        let dataset = self.inner.load()?;
        self.cached = Some((Instant::now(), dataset.clone()));
        Ok(dataset)
    }

    fn supports_append(&self) -> bool {
        self.inner.supports_append()
    }

    fn append(&mut self, rows: &[Vec<CellValue>]) -> Result<usize, DataError> {
        let n = self.inner.append(rows)?;
        self.invalidate();
        Ok(n)
    }

    fn invalidate(&mut self) {
        self.cached = None;
        self.inner.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{FIELD_DEPARTMENT, FIELD_FISCAL_YEAR, REQUIRED_FIELDS};
    use crate::data::filter::{cascade, FilterSelection};
    use crate::data::testing::FakeSource;
    use pretty_assertions::assert_eq;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn required_header() -> String {
        REQUIRED_FIELDS.join(",")
    }

    /// Serve one HTTP response on a local port. The handle yields the raw
    /// request head.
    fn serve_once(status: &str, content_type: &str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let status = status.to_string();
        let content_type = content_type.to_string();

        let handle = thread::spawn(move || {
            let (mut socket, _peer) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let mut req = Vec::new();
            loop {
                match socket.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        req.extend_from_slice(&buf[..n]);
                        if req.windows(4).any(|w| w == b"\r\n\r\n") || req.len() > 16 * 1024 {
                            break;
                        }
                    }
                }
            }

            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).unwrap();
            socket.write_all(body.as_bytes()).unwrap();
            socket.flush().unwrap();
            String::from_utf8_lossy(&req).into_owned()
        });

        (format!("http://{addr}"), handle)
    }

    fn sample_csv() -> String {
        format!(
            "{}\n1,ถนน,งบปกติ,2563,0012,วัด,5,ตำบลก,อำเภอข,จังหวัดค\n2,ประปา,งบปกติ,2564,กอง3,วัด,6,ตำบลก,อำเภอข,จังหวัดค\n",
            required_header()
        )
    }

    #[test]
    fn parse_csv_types_columns_and_keeps_header_order() {
        let text = format!(
            "{},หมายเหตุ\n1,ถนน,งบปกติ,2563,กอง3,วัด,5,ตำบลก,อำเภอข,จังหวัดค,\n",
            required_header()
        );
        let table = parse_csv(&text).unwrap();
        assert_eq!(table.header.len(), 11);
        assert_eq!(table.header[3], FIELD_FISCAL_YEAR);
        assert_eq!(table.rows[0][0], CellValue::Integer(1));
        assert_eq!(table.rows[0][3], CellValue::Integer(2563));
        assert_eq!(table.rows[0][4], CellValue::Text("กอง3".into()));
        assert_eq!(table.rows[0][10], CellValue::Empty);
    }

    #[test]
    fn csv_missing_column_is_a_schema_mismatch() {
        let header: Vec<&str> = REQUIRED_FIELDS
            .iter()
            .copied()
            .filter(|f| *f != FIELD_DEPARTMENT)
            .collect();
        let table = parse_csv(&format!("{}\n", header.join(","))).unwrap();
        match Dataset::from_table(table) {
            Err(DataError::SchemaMismatch { missing }) => {
                assert_eq!(missing, vec![FIELD_DEPARTMENT.to_string()])
            }
            other => panic!("expected schema mismatch, got {other:?}"),
        }
    }

    #[test]
    fn export_url_encodes_sheet_name() {
        let url = csv_export_url(CSV_EXPORT_BASE, "abc123", "ชีต 1").unwrap();
        assert_eq!(url.host_str(), Some("docs.google.com"));
        assert_eq!(url.path(), "/spreadsheets/d/abc123/gviz/tq");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("tqx".to_string(), "out:csv".to_string()),
                ("sheet".to_string(), "ชีต 1".to_string()),
            ]
        );
    }

    #[test]
    fn mixed_text_column_keeps_leading_zeros() {
        let ds = Dataset::from_table(parse_csv(&sample_csv()).unwrap()).unwrap();
        assert_eq!(ds.records[0].get(FIELD_DEPARTMENT), Some(&CellValue::Text("0012".into())));
        assert_eq!(ds.records[1].get(FIELD_FISCAL_YEAR), Some(&CellValue::Integer(2564)));

        let view = cascade(&ds, &FilterSelection::default());
        assert_eq!(view.departments, vec![crate::data::filter::ALL, "กอง3", "0012"]);
    }

    #[test]
    fn csv_export_load_reads_served_sheet() {
        let (base, server) = serve_once("200 OK", "text/csv; charset=utf-8", sample_csv());
        let mut source = CsvExportSource::with_base_url(Client::new(), &base, "abc123", "Sheet1").unwrap();

        let ds = source.load().unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].text(FIELD_DEPARTMENT), "0012");

        let request = server.join().unwrap();
        assert!(request.starts_with("GET /abc123/gviz/tq?tqx=out%3Acsv&sheet=Sheet1 "));
    }

    #[test]
    fn http_error_status_is_data_unavailable() {
        let (base, server) = serve_once("403 Forbidden", "text/html", "<h1>denied</h1>".into());
        let mut source = CsvExportSource::with_base_url(Client::new(), &base, "abc123", "Sheet1").unwrap();

        let err = source.load().unwrap_err();
        assert!(matches!(err, DataError::DataUnavailable(ref m) if m.contains("403")), "{err:?}");
        server.join().unwrap();
    }

    #[test]
    fn unreachable_host_is_data_unavailable() {
        let addr = TcpListener::bind(("127.0.0.1", 0)).unwrap().local_addr().unwrap();
        // listener is dropped, so the port refuses connections
        let mut source =
            CsvExportSource::with_base_url(Client::new(), &format!("http://{addr}"), "abc123", "Sheet1")
                .unwrap();
        assert!(matches!(source.load(), Err(DataError::DataUnavailable(_))));
    }

    #[test]
    fn sheets_api_load_sends_bearer_token() {
        let token_env = "BUDGET_DASHBOARD_TEST_TOKEN_LOAD";
        std::env::set_var(token_env, "secret-token");
        let body = json!({
            "range": "Sheet1!A1:J3",
            "values": [
                REQUIRED_FIELDS,
                [1, "ถนน", "งบปกติ", "2563", "007", "วัด", "5", "ก", "ข", "ค"],
                [2, "ประปา", "งบปกติ", "2564", "กอง3", "วัด", "6", "ก", "ข", "ค"]
            ]
        });
        let (base, server) = serve_once("200 OK", "application/json", body.to_string());
        let mut source =
            SheetsApiSource::with_base_url(Client::new(), &base, "abc123", "Sheet1", token_env);

        let ds = source.load().unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].get(FIELD_DEPARTMENT), Some(&CellValue::Text("007".into())));

        let request = server.join().unwrap().to_ascii_lowercase();
        assert!(request.starts_with("get /abc123/values/sheet1 "));
        assert!(request.contains("authorization: bearer secret-token"));
    }

    #[test]
    fn sheets_api_without_token_is_data_unavailable() {
        let mut source = SheetsApiSource::with_base_url(
            Client::new(),
            "http://127.0.0.1:9",
            "abc123",
            "Sheet1",
            "BUDGET_DASHBOARD_TEST_TOKEN_NEVER_SET",
        );
        match source.load() {
            Err(DataError::DataUnavailable(m)) => {
                assert!(m.contains("BUDGET_DASHBOARD_TEST_TOKEN_NEVER_SET"))
            }
            other => panic!("expected missing token, got {other:?}"),
        }
    }

    #[test]
    fn append_url_stores_values_raw() {
        let source = SheetsApiSource::new(Client::new(), "abc123", "Sheet1", "TOKEN");
        let url = source.append_url().unwrap();
        assert_eq!(url.path(), "/v4/spreadsheets/abc123/values/Sheet1:append");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("valueInputOption".to_string(), "RAW".to_string()),
                ("insertDataOption".to_string(), "INSERT_ROWS".to_string()),
            ]
        );
    }

    #[test]
    fn values_url_puts_range_in_one_segment() {
        let source = SheetsApiSource::new(Client::new(), "abc123", "Sheet1", "TOKEN");
        let url = source.values_url("Sheet1:append").unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Sheet1:append"
        );
    }

    #[test]
    fn value_range_pads_short_rows() {
        let body: ValueRange = serde_json::from_value(json!({
            "range": "Sheet1!A1:K3",
            "majorDimension": "ROWS",
            "values": [
                REQUIRED_FIELDS,
                ["1", "ถนน", "งบปกติ", "2563", "กอง3"],
                [2, "ประปา", "เงินอุดหนุน", 2564.0, "กอง10", "วัด", null, "ก", "ข", "ค"]
            ]
        }))
        .unwrap();
        let ds = Dataset::from_table(parse_value_range(body)).unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.records[0].text(FIELD_DEPARTMENT), "กอง3");
        assert_eq!(ds.records[0].get("จังหวัด"), Some(&CellValue::Empty));
        assert_eq!(ds.records[1].get(FIELD_FISCAL_YEAR), Some(&CellValue::Float(2564.0)));
        assert_eq!(ds.records[1].text(FIELD_FISCAL_YEAR), "2564");
    }

    #[test]
    fn empty_value_range_fails_schema_check() {
        let body: ValueRange = serde_json::from_value(json!({ "range": "Sheet1" })).unwrap();
        assert!(matches!(
            Dataset::from_table(parse_value_range(body)),
            Err(DataError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn cells_serialize_for_append() {
        assert_eq!(cell_to_json(&CellValue::Integer(3)), json!(3));
        assert_eq!(cell_to_json(&CellValue::Float(1.5)), json!(1.5));
        assert_eq!(cell_to_json(&CellValue::Empty), json!(""));
        assert_eq!(cell_to_json(&CellValue::Text("ก".into())), json!("ก"));
    }

    #[test]
    fn cache_serves_until_ttl_elapses() {
        let mut cached = CachedSource::new(FakeSource::sample(), Duration::from_secs(3600));
        let first = cached.load().unwrap();
        let second = cached.load().unwrap();
        assert_eq!(first, second);
        assert_eq!(cached.inner().loads(), 1);

        let mut expired = CachedSource::new(FakeSource::sample(), Duration::ZERO);
        expired.load().unwrap();
        expired.load().unwrap();
        assert_eq!(expired.inner().loads(), 2);
    }

    #[test]
    fn cache_does_not_keep_failures() {
        let mut cached = CachedSource::new(FakeSource::failing(), Duration::from_secs(3600));
        assert!(matches!(cached.load(), Err(DataError::DataUnavailable(_))));
        assert!(cached.load().is_err());
        assert_eq!(cached.inner().loads(), 2);
    }

    #[test]
    fn append_through_cache_forces_refetch() {
        let mut cached = CachedSource::new(FakeSource::sample(), Duration::from_secs(3600));
        let before = cached.load().unwrap().len();
        let row = vec![CellValue::Integer(99); REQUIRED_FIELDS.len()];
        assert_eq!(cached.append(&[row]).unwrap(), 1);
        let after = cached.load().unwrap().len();
        assert_eq!(after, before + 1);
        assert_eq!(cached.inner().loads(), 2);
    }

    #[test]
    fn read_only_backends_reject_append() {
        let mut source = CsvExportSource::new(Client::new(), "abc", "Sheet1").unwrap();
        assert!(!source.supports_append());
        assert!(matches!(
            source.append(&[vec![CellValue::Empty]]),
            Err(DataError::AppendUnsupported)
        ));
    }
}
