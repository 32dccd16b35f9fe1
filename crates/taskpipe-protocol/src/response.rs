use crate::{ProtocolError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use taskpipe_core::{ClientId, TaskStatus, WorkerId, RESULT_UNSET};

/// Filesystem path of a client's private channel, derived from the public
/// channel path: `<public>.<pid>.<tid>`. The client creates the FIFO
/// before submitting; the server only ever opens its write end.
pub fn response_path(public: &Path, client: ClientId) -> PathBuf {
    let mut path = public.as_os_str().to_os_string();
    path.push(format!(".{client}"));
    PathBuf::from(path)
}

/// One status event sent over a client's private channel, as a text line:
///
/// `<epoch-secs>; <request_id>; <workload>; <server_pid>; <worker_id>; <result>; <STATUS>`
///
/// `result` is -1 for every status except `TSKDN`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub timestamp: i64,
    pub request_id: i32,
    pub workload: i32,
    pub server_pid: i32,
    pub worker_id: WorkerId,
    pub result: i32,
    pub status: TaskStatus,
}

impl Response {
    pub fn new(
        timestamp: i64,
        request_id: i32,
        workload: i32,
        server_pid: i32,
        worker_id: WorkerId,
        result: Option<i32>,
        status: TaskStatus,
    ) -> Self {
        Response {
            timestamp,
            request_id,
            workload,
            server_pid,
            worker_id,
            result: result.unwrap_or(RESULT_UNSET),
            status,
        }
    }

    /// Wire token for a status event.
    pub fn status_token(status: TaskStatus) -> &'static str {
        match status {
            TaskStatus::Queued => "RECVD",
            TaskStatus::Executing => "TSKEX",
            TaskStatus::Done => "TSKDN",
            TaskStatus::TooLate => "TLATE",
            TaskStatus::Failed => "FAILD",
        }
    }

    pub fn status_from_token(token: &str) -> Result<TaskStatus> {
        match token {
            "RECVD" => Ok(TaskStatus::Queued),
            "TSKEX" => Ok(TaskStatus::Executing),
            "TSKDN" => Ok(TaskStatus::Done),
            "TLATE" => Ok(TaskStatus::TooLate),
            "FAILD" => Ok(TaskStatus::Failed),
            other => Err(ProtocolError::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}; {}; {}; {}; {}; {}; {}",
            self.timestamp,
            self.request_id,
            self.workload,
            self.server_pid,
            self.worker_id,
            self.result,
            Self::status_token(self.status),
        )
    }
}

impl FromStr for Response {
    type Err = ProtocolError;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || ProtocolError::MalformedResponse(line.to_string());

        let fields: Vec<&str> = line.split(';').map(str::trim).collect();
        if fields.len() != 7 {
            return Err(malformed());
        }

        Ok(Response {
            timestamp: fields[0].parse().map_err(|_| malformed())?,
            request_id: fields[1].parse().map_err(|_| malformed())?,
            workload: fields[2].parse().map_err(|_| malformed())?,
            server_pid: fields[3].parse().map_err(|_| malformed())?,
            worker_id: fields[4].parse().map_err(|_| malformed())?,
            result: fields[5].parse().map_err(|_| malformed())?,
            status: Self::status_from_token(fields[6])?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_roundtrip() {
        let response = Response::new(1_700_000_000, 12, 3, 999, 4, Some(6), TaskStatus::Done);
        let line = response.to_string();
        assert_eq!(line, "1700000000; 12; 3; 999; 4; 6; TSKDN");

        let parsed: Response = line.parse().unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_unset_result() {
        let response = Response::new(1, 2, 3, 4, 5, None, TaskStatus::Queued);
        assert_eq!(response.result, RESULT_UNSET);
        assert!(response.to_string().ends_with("; -1; RECVD"));
    }

    #[test]
    fn test_status_tokens() {
        for (status, token) in [
            (TaskStatus::Queued, "RECVD"),
            (TaskStatus::Executing, "TSKEX"),
            (TaskStatus::Done, "TSKDN"),
            (TaskStatus::TooLate, "TLATE"),
            (TaskStatus::Failed, "FAILD"),
        ] {
            assert_eq!(Response::status_token(status), token);
            assert_eq!(Response::status_from_token(token).unwrap(), status);
        }
        assert!(Response::status_from_token("NOPE").is_err());
    }

    #[test]
    fn test_response_path() {
        let path = response_path(Path::new("/tmp/requests"), ClientId::new(4242, 7));
        assert_eq!(path, PathBuf::from("/tmp/requests.4242.7"));
    }

    #[test]
    fn test_malformed_lines() {
        assert!("".parse::<Response>().is_err());
        assert!("1; 2; 3".parse::<Response>().is_err());
        assert!("a; 2; 3; 4; 5; 6; TSKDN".parse::<Response>().is_err());
        assert!("1; 2; 3; 4; 5; 6; WAT".parse::<Response>().is_err());
    }
}
