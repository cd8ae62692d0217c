// Data shapes exchanged with the archive server and handed to the export.
//
// Wire field names follow the server's JSON (`ConName`, `numbreq`, `Qual`, ...);
// the Rust side uses descriptive names through serde renames.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::ClientError;

/// Authenticated session returned by a successful registration.
///
/// There is no public constructor: the only way to obtain a `Session` is
/// `api::register`, so a `Session` always carries a non-empty token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
    username: String,
}

impl Session {
    pub(crate) fn new(token: String, username: String) -> Self {
        Session { token, username }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn username(&self) -> &str {
        &self.username
    }
}

/// A calendar date in `YYYY-MM-DD` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub const FORMAT: &'static str = "%Y-%m-%d";

    /// Parse a date argument for `operation`. Both the shape (`YYYY-MM-DD`,
    /// zero padded) and the calendar value are checked.
    pub fn parse_for(operation: &'static str, raw: &str) -> Result<Self, ClientError> {
        if raw.is_empty() {
            return Err(ClientError::validation(operation, "date", "empty value"));
        }
        // chrono tolerates signs, spaces and unpadded fields; the server does not
        if !has_date_shape(raw) {
            return Err(ClientError::validation(
                operation,
                "date",
                format!("`{raw}` is not in YYYY-MM-DD format"),
            ));
        }
        NaiveDate::parse_from_str(raw, Self::FORMAT)
            .map(DateKey)
            .map_err(|e| {
                ClientError::validation(operation, "date", format!("`{raw}` is not a valid date: {e}"))
            })
    }
}

/// Exactly `DDDD-DD-DD` with ASCII digits.
fn has_date_shape(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}

/// One historical measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Qual")]
    pub quality: String,
    #[serde(rename = "TimeStamp")]
    pub timestamp: String,
}

/// A page of records as fetched from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub sequence_number: u64,
    pub records: Vec<Record>,
}

/// All records retrieved for one date, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub date: DateKey,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Body of a `/partdatadb` answer.
#[derive(Debug, Deserialize)]
pub(crate) struct PageBody {
    #[serde(rename = "numbreq", alias = "sequenceNumber")]
    pub sequence_number: u64,
    #[serde(rename = "data", alias = "records", default, deserialize_with = "null_as_empty")]
    pub records: Vec<Record>,
}

/// Body of a `/cntstr` answer. The count is transmitted as a string.
#[derive(Debug, Deserialize)]
pub(crate) struct CountBody {
    pub cntstr: Option<String>,
}

/// Snapshot returned by `/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(rename = "timeStart")]
    pub started_at: String,
    #[serde(rename = "mbRTU", default, deserialize_with = "null_as_empty")]
    pub serial_interfaces: Vec<SerialInterface>,
    #[serde(rename = "mbTCP", default, deserialize_with = "null_as_empty")]
    pub network_interfaces: Vec<NetworkInterface>,
    #[serde(rename = "sizeFiles", default)]
    pub log_sizes: LogFileSizes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialInterface {
    #[serde(rename = "ConName")]
    pub name: String,
    #[serde(rename = "Con")]
    pub device: String,
    #[serde(rename = "ConParams")]
    pub line: LineParams,
}

/// Serial line settings of a Modbus-RTU interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineParams {
    #[serde(rename = "BaudRate")]
    pub baud_rate: u32,
    #[serde(rename = "DataBits")]
    pub data_bits: u8,
    #[serde(rename = "Parity")]
    pub parity: String,
    #[serde(rename = "StopBits")]
    pub stop_bits: u8,
}

impl fmt::Display for LineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} baud, {} data bits, parity {}, {} stop bits",
            self.baud_rate, self.data_bits, self.parity, self.stop_bits
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    #[serde(rename = "ConName")]
    pub name: String,
    #[serde(rename = "Con")]
    pub address: String,
}

/// Sizes of the server's log files, in megabytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogFileSizes {
    #[serde(rename = "I")]
    pub info: i64,
    #[serde(rename = "W")]
    pub warning: i64,
    #[serde(rename = "E")]
    pub error: i64,
}

// The server encodes empty lists as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}
