//! Google Drive store
//!
//! Uses the Drive v3 REST API with an already-issued OAuth access token.
//! File mode downloads and overwrites one file id; folder mode reads the
//! newest `health_metrics_*.csv` in the folder and uploads a new file.

use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use super::{per_run_file_name, StoreError, TableStore, WriteMode, FILE_PREFIX};

/// Drive metadata API
pub const DRIVE_API: &str = "https://www.googleapis.com/drive/v3";

/// Drive media upload API
pub const DRIVE_UPLOAD_API: &str = "https://www.googleapis.com/upload/drive/v3";

const CSV_MIME: &str = "text/csv";

/// What the store is addressed by
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveTarget {
    /// Stable file id, updated in place
    File(String),
    /// Containing folder id, one new file per run
    Folder(String),
}

impl DriveTarget {
    pub fn mode(&self) -> WriteMode {
        match self {
            DriveTarget::File(_) => WriteMode::UpdateInPlace,
            DriveTarget::Folder(_) => WriteMode::CreatePerRun,
        }
    }
}

/// Blocking Google Drive store
pub struct DriveStore {
    http: Client,
    token: String,
    target: DriveTarget,
    api_base: String,
    upload_base: String,
}

impl DriveStore {
    pub fn new(token: impl Into<String>, target: DriveTarget) -> Result<Self, StoreError> {
        let http = Client::builder()
            .user_agent(concat!("synheart-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            token: token.into(),
            target,
            api_base: DRIVE_API.to_string(),
            upload_base: DRIVE_UPLOAD_API.to_string(),
        })
    }

    /// Override both API hosts (metadata and upload)
    pub fn with_endpoints(
        mut self,
        api_base: impl Into<String>,
        upload_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.upload_base = upload_base.into();
        self
    }

    fn download(&self, file_id: &str) -> Result<Option<String>, StoreError> {
        let url = format!("{}/files/{}", self.api_base, file_id);
        debug!(%file_id, "downloading table");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("alt", "media")])
            .send()?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(check("download", response)?.text()?))
    }

    fn newest_in_folder(&self, folder_id: &str) -> Result<Option<DriveFile>, StoreError> {
        let url = format!("{}/files", self.api_base);
        let query = format!(
            "'{folder_id}' in parents and name contains '{FILE_PREFIX}' and trashed = false"
        );

        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[
                ("q", query.as_str()),
                ("orderBy", "name desc"),
                ("pageSize", "1"),
                ("fields", "files(id,name)"),
            ])
            .send()?;

        let list: DriveFileList = check("list", response)?.json()?;
        Ok(list.files.into_iter().next())
    }

    fn overwrite(&self, file_id: &str, csv: &str) -> Result<(), StoreError> {
        let url = format!("{}/files/{}", self.upload_base, file_id);

        let response = self
            .http
            .patch(&url)
            .bearer_auth(&self.token)
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, CSV_MIME)
            .body(csv.to_string())
            .send()?;

        check("update", response)?;
        Ok(())
    }

    /// Create metadata and content in a single multipart request so a
    /// failed upload never leaves an empty file behind
    fn create(&self, folder_id: &str, name: &str, csv: &str) -> Result<DriveFile, StoreError> {
        let url = format!("{}/files", self.upload_base);
        let boundary = format!("sync-{}", Uuid::new_v4().simple());
        let metadata = serde_json::json!({
            "name": name,
            "parents": [folder_id],
            "mimeType": CSV_MIME,
        });

        let body = multipart_body(&boundary, &metadata, csv);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .query(&[("uploadType", "multipart"), ("fields", "id,name")])
            .header(
                CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()?;

        Ok(check("create", response)?.json()?)
    }
}

impl TableStore for DriveStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match &self.target {
            DriveTarget::File(id) => self.download(id),
            DriveTarget::Folder(folder) => match self.newest_in_folder(folder)? {
                Some(file) => {
                    debug!(name = %file.name, "using newest table in folder");
                    self.download(&file.id)
                }
                None => Ok(None),
            },
        }
    }

    fn save(&self, csv: &str, written_at: DateTime<Utc>) -> Result<String, StoreError> {
        match &self.target {
            DriveTarget::File(id) => {
                self.overwrite(id, csv)?;
                Ok(format!("drive:{id}"))
            }
            DriveTarget::Folder(folder) => {
                let file = self.create(folder, &per_run_file_name(written_at), csv)?;
                info!(id = %file.id, name = %file.name, "created table file");
                Ok(format!("drive:{}", file.id))
            }
        }
    }
}

/// `multipart/related` body: JSON metadata part, then the CSV media part
fn multipart_body(boundary: &str, metadata: &Value, csv: &str) -> String {
    format!(
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n\
         --{boundary}\r\nContent-Type: {CSV_MIME}\r\n\r\n{csv}\r\n--{boundary}--\r\n"
    )
}

fn check(operation: &str, response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(StoreError::Status {
        operation: operation.to_string(),
        status: status.as_u16(),
        body: response.text().unwrap_or_default(),
    })
}

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
    #[serde(default)]
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    fn response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Answer one connection per canned response; yields each request seen
    fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let mut requests = Vec::new();
            for reply in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());

                let mut request = String::new();
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if let Some(len) = lower.strip_prefix("content-length:") {
                        content_length = len.trim().parse().unwrap();
                    }
                    request.push_str(&lower);
                }
                let mut body = vec![0; content_length];
                reader.read_exact(&mut body).unwrap();
                request.push_str("\r\n");
                request.push_str(&String::from_utf8(body).unwrap());

                stream.write_all(reply.as_bytes()).unwrap();
                requests.push(request);
            }
            requests
        });
        (base, handle)
    }

    fn store(base: &str, target: DriveTarget) -> DriveStore {
        DriveStore::new("token", target)
            .unwrap()
            .with_endpoints(base, base)
    }

    fn written_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 16, 6, 30, 0).unwrap()
    }

    #[test]
    fn test_target_modes() {
        assert_eq!(
            DriveTarget::File("abc".into()).mode(),
            WriteMode::UpdateInPlace
        );
        assert_eq!(
            DriveTarget::Folder("xyz".into()).mode(),
            WriteMode::CreatePerRun
        );
    }

    #[test]
    fn test_file_list_parsing() {
        let list: DriveFileList = serde_json::from_str(
            r#"{"files": [{"id": "1", "name": "health_metrics_20240115T060000000000Z.csv"}]}"#,
        )
        .unwrap();
        assert_eq!(list.files[0].id, "1");

        let empty: DriveFileList = serde_json::from_str("{}").unwrap();
        assert!(empty.files.is_empty());
    }

    #[test]
    fn test_multipart_body_layout() {
        let metadata = serde_json::json!({"name": "t.csv", "parents": ["folder"]});
        let body = multipart_body("b1", &metadata, "Date\n2024-01-15\n");

        let parts: Vec<&str> = body.split("--b1").collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "");
        assert!(parts[1].starts_with("\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n"));
        assert!(parts[1].ends_with(&format!("{metadata}\r\n")));
        assert_eq!(
            parts[2],
            "\r\nContent-Type: text/csv\r\n\r\nDate\n2024-01-15\n\r\n"
        );
        assert_eq!(parts[3], "--\r\n");
    }

    #[test]
    fn test_missing_file_loads_as_none() {
        let (base, server) = serve(vec![response("404 Not Found", "")]);
        let loaded = store(&base, DriveTarget::File("abc".into())).load().unwrap();
        assert_eq!(loaded, None);

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("get /files/abc?alt=media "));
        assert!(requests[0].contains("authorization: bearer token"));
    }

    #[test]
    fn test_file_download_and_failed_overwrite() {
        let (base, server) = serve(vec![
            response("200 OK", "Date\n2024-01-15\n"),
            response("500 Internal Server Error", "backend down"),
        ]);
        let drive = store(&base, DriveTarget::File("abc".into()));

        assert_eq!(drive.load().unwrap().as_deref(), Some("Date\n2024-01-15\n"));
        match drive.save("Date\n2024-01-16\n", written_at()) {
            Err(StoreError::Status {
                operation,
                status,
                body,
            }) => {
                assert_eq!(operation, "update");
                assert_eq!(status, 500);
                assert_eq!(body, "backend down");
            }
            other => panic!("expected status error, got {other:?}"),
        }

        let requests = server.join().unwrap();
        assert!(requests[1].starts_with("patch /files/abc?uploadtype=media "));
        assert!(requests[1].contains("content-type: text/csv"));
        assert!(requests[1].ends_with("Date\n2024-01-16\n"));
    }

    #[test]
    fn test_folder_loads_most_recent_file() {
        let (base, server) = serve(vec![
            response("200 OK", r#"{"files": [{"id": "f2", "name": "health_metrics_x.csv"}]}"#),
            response("200 OK", "Date\n2024-01-10\n"),
        ]);
        let drive = store(&base, DriveTarget::Folder("dir".into()));

        assert_eq!(drive.load().unwrap().as_deref(), Some("Date\n2024-01-10\n"));

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("get /files?"));
        assert!(requests[0].contains("orderby=name+desc"));
        assert!(requests[1].starts_with("get /files/f2?alt=media "));
    }

    #[test]
    fn test_folder_save_creates_timestamped_file() {
        let (base, server) = serve(vec![response(
            "200 OK",
            r#"{"id": "new1", "name": "health_metrics_20240116T063000000000Z.csv"}"#,
        )]);
        let drive = store(&base, DriveTarget::Folder("dir".into()));

        let location = drive.save("Date\n2024-01-15\n", written_at()).unwrap();
        assert_eq!(location, "drive:new1");

        let requests = server.join().unwrap();
        assert!(requests[0].starts_with("post /files?uploadtype=multipart"));
        assert!(requests[0].contains("content-type: multipart/related; boundary=sync-"));
        assert!(requests[0].contains(r#""name":"health_metrics_20240116T063000000000Z.csv""#));
        assert!(requests[0].contains(r#""parents":["dir"]"#));
        assert!(requests[0].contains("Date\n2024-01-15\n"));
    }

    #[test]
    fn test_unreachable_drive_is_a_store_error() {
        let store = DriveStore::new("token", DriveTarget::File("abc".into()))
            .unwrap()
            .with_endpoints("http://127.0.0.1:9", "http://127.0.0.1:9");
        assert!(matches!(store.load(), Err(StoreError::Http(_))));
    }
}
