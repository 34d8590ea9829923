//! Per-device results of a batch operation.

use std::fmt;

use serde::Serialize;

use crate::driver::{Response, redact};
use crate::oplog::{OperationKind, OperationStatus};

/// How one device fared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceResult {
    pub device: String,
    pub status: OperationStatus,
    pub detail: String,
}

/// Results of one operation over a set of devices, in the order visited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub kind: OperationKind,
    pub results: Vec<DeviceResult>,
}

impl BatchReport {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: DeviceResult) {
        self.results.push(result);
    }

    pub fn get(&self, device: &str) -> Option<&DeviceResult> {
        self.results.iter().find(|r| r.device == device)
    }

    pub fn succeeded(&self) -> usize {
        self.count(OperationStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(OperationStatus::Failed)
    }

    fn count(&self, status: OperationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    /// Every device succeeded.
    pub fn is_success(&self) -> bool {
        self.results
            .iter()
            .all(|r| r.status == OperationStatus::Success)
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} of {} devices succeeded",
            self.kind,
            self.succeeded(),
            self.results.len()
        )
    }
}

/// Status and detail for a device given the responses to a configuration
/// sequence and the final save.
pub(crate) fn judge(responses: &[Response], saved: Option<&Response>) -> (OperationStatus, String) {
    let rejected: Vec<_> = responses.iter().filter(|r| !r.is_success()).collect();

    if let Some(saved) = saved.filter(|s| !s.is_success()) {
        let reason = saved
            .failure_message
            .clone()
            .unwrap_or_else(|| format!("{:?}", saved.outcome).to_lowercase());
        return (
            OperationStatus::Partial,
            format!(
                "{} commands applied, save failed: {}",
                responses.len() - rejected.len(),
                reason
            ),
        );
    }

    match rejected.first() {
        None => (
            OperationStatus::Success,
            format!("{} commands applied", responses.len()),
        ),
        Some(first) => {
            let reason = first
                .failure_message
                .clone()
                .unwrap_or_else(|| format!("{:?}", first.outcome).to_lowercase());
            (
                OperationStatus::Partial,
                format!(
                    "{} of {} commands failed; first '{}': {}",
                    rejected.len(),
                    responses.len(),
                    redact(&first.command),
                    reason
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn ok(command: &str) -> Response {
        Response::completed(command, "", "", "R1(config)#", Duration::ZERO)
    }

    #[test]
    fn test_judge() {
        let applied = [ok("hostname R1"), ok("ip domain-name lab")];
        let saved = Response::completed("write memory", "[OK]", "", "R1#", Duration::ZERO);
        let (status, detail) = judge(&applied, Some(&saved));
        assert_eq!(status, OperationStatus::Success);
        assert_eq!(detail, "2 commands applied");

        let mixed = [
            ok("hostname R1"),
            Response::timed_out("crypto key generate rsa", "", "", Duration::ZERO),
        ];
        let (status, detail) = judge(&mixed, Some(&saved));
        assert_eq!(status, OperationStatus::Partial);
        assert!(detail.contains("1 of 2"));
        assert!(detail.contains("no prompt after"));

        let unsaved = saved.with_failure(Some("write memory did not report [OK]".into()));
        let (status, detail) = judge(&applied, Some(&unsaved));
        assert_eq!(status, OperationStatus::Partial);
        assert!(detail.contains("save failed"));
    }

    #[test]
    fn test_report_summary() {
        let mut report = BatchReport::new(OperationKind::Backup);
        report.push(DeviceResult {
            device: "R1".into(),
            status: OperationStatus::Success,
            detail: String::new(),
        });
        report.push(DeviceResult {
            device: "R2".into(),
            status: OperationStatus::Failed,
            detail: "connection refused".into(),
        });
        assert_eq!(report.to_string(), "backup: 1 of 2 devices succeeded");
        assert_eq!(report.failed(), 1);
        assert!(!report.is_success());
        assert_eq!(report.get("R2").unwrap().detail, "connection refused");
    }
}
