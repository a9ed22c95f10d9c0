//! Status document parsing and health evaluation
//!
//! Turns the raw document bytes into a typed record, then into a verdict:
//! - capacity usage measured against the device's own yellow/red thresholds
//! - expansion-slot scan for unhealthy drives
//! - severities combined by taking the worst of the two

use crate::error::CheckError;
use roxmltree::{Document, Node};
use tracing::debug;

/// Slot status code the device reports for a healthy drive.
pub const HEALTHY_SLOT_STATUS: i64 = 3;

/// Health severity in ascending order of badness. The numeric values are
/// the Nagios exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok = 0,
    Warning = 1,
    Critical = 2,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Critical => "CRITICAL",
        }
    }

    pub fn exit_code(self) -> i32 {
        self as i32
    }
}

/// The fields of an `ESATMUpdate` status document the check consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub total_capacity: i64,
    pub used_capacity: i64,
    pub yellow_threshold: i64,
    pub red_threshold: i64,
    pub slots: Vec<SlotStatus>,
}

/// One expansion-slot record, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotStatus {
    /// Zero-based slot number as the device reports it.
    pub number: i64,
    /// Raw status code; [`HEALTHY_SLOT_STATUS`] means healthy.
    pub status: i64,
}

/// Decodes the framed payload into a typed status record.
///
/// The payload is UTF-8 XML, possibly wrapped in whitespace or NUL noise
/// left over from the device's fixed-size buffers.
pub fn parse_status(payload: &[u8]) -> Result<DeviceStatus, CheckError> {
    let text = std::str::from_utf8(payload)?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    let doc = Document::parse(text)?;

    let root = doc.root_element();
    if root.tag_name().name() != "ESATMUpdate" {
        return Err(CheckError::MissingElement("ESATMUpdate"));
    }

    // Slot elements carry device-chosen tag names; only their position and
    // their mSlotNumber/mStatus children matter.
    let slots_node = child_element(root, "mSlotsExp")?;
    let mut slots = Vec::new();
    for slot in slots_node.children().filter(Node::is_element) {
        slots.push(SlotStatus {
            number: child_int(slot, "mSlotNumber")?,
            status: child_int(slot, "mStatus")?,
        });
    }

    Ok(DeviceStatus {
        total_capacity: child_int(root, "mTotalCapacityProtected")?,
        used_capacity: child_int(root, "mUsedCapacityProtected")?,
        yellow_threshold: child_int(root, "mYellowThreshold")?,
        red_threshold: child_int(root, "mRedThreshold")?,
        slots,
    })
}

fn child_element<'a, 'i>(
    parent: Node<'a, 'i>,
    name: &'static str,
) -> Result<Node<'a, 'i>, CheckError> {
    parent
        .children()
        .find(|n| n.is_element() && n.tag_name().name() == name)
        .ok_or(CheckError::MissingElement(name))
}

fn child_int(parent: Node, name: &'static str) -> Result<i64, CheckError> {
    let text = child_element(parent, name)?.text().unwrap_or("").trim();
    text.parse().map_err(|_| CheckError::InvalidValue {
        element: name,
        reason: format!("expected an integer, got {text:?}"),
    })
}

/// Capacity figures derived from one document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapacityCheck {
    /// Used capacity on a 0-100 scale.
    pub percent_used: f64,
    /// Device red threshold divided by 100.
    pub critical_pct: f64,
    /// Device yellow threshold divided by 100.
    pub warning_pct: f64,
}

impl CapacityCheck {
    pub fn severity(&self) -> Severity {
        if self.percent_used > self.critical_pct {
            Severity::Critical
        } else if self.percent_used > self.warning_pct {
            Severity::Warning
        } else {
            Severity::Ok
        }
    }
}

impl DeviceStatus {
    /// Computes capacity usage against the device-reported thresholds.
    ///
    /// The device scales its thresholds by 100 (8500 -> 85.0) and the
    /// usage figure on the 0-100 scale is compared directly against that
    /// rescaled value.
    pub fn capacity(&self) -> Result<CapacityCheck, CheckError> {
        if self.total_capacity == 0 {
            return Err(CheckError::InvalidValue {
                element: "mTotalCapacityProtected",
                reason: "total capacity is zero".into(),
            });
        }
        Ok(CapacityCheck {
            percent_used: self.used_capacity as f64 / self.total_capacity as f64 * 100.0,
            critical_pct: self.red_threshold as f64 / 100.0,
            warning_pct: self.yellow_threshold as f64 / 100.0,
        })
    }

    /// One-based numbers of slots holding an unhealthy drive, in document
    /// order.
    pub fn failed_slots(&self) -> Vec<i64> {
        self.slots
            .iter()
            .filter(|slot| slot.status != HEALTHY_SLOT_STATUS)
            .map(|slot| slot.number + 1)
            .collect()
    }
}

/// Final verdict for one check run.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub severity: Severity,
    pub messages: Vec<String>,
}

impl CheckReport {
    /// The one line a monitoring framework parses, e.g.
    /// `WARNING - 80% of capacity used, drive #2 is not healthy`.
    pub fn status_line(&self) -> String {
        format!("{} - {}", self.severity.label(), self.messages.join(", "))
    }
}

/// Evaluates a parsed document: capacity verdict and drive verdict,
/// combined by taking the worst of the two.
pub fn evaluate(status: &DeviceStatus) -> Result<CheckReport, CheckError> {
    let capacity = status.capacity()?;
    let failed = status.failed_slots();

    let capacity_severity = capacity.severity();
    let drive_severity = if failed.is_empty() {
        Severity::Ok
    } else {
        Severity::Critical
    };

    debug!(
        "capacity {:.1}% used (warn > {}, crit > {}), {} failed slot(s)",
        capacity.percent_used,
        capacity.warning_pct,
        capacity.critical_pct,
        failed.len()
    );

    let mut messages = vec![format!("{}% of capacity used", capacity.percent_used as i64)];
    messages.extend(failed.iter().map(|slot| format!("drive #{slot} is not healthy")));

    Ok(CheckReport {
        severity: capacity_severity.max(drive_severity),
        messages,
    })
}
