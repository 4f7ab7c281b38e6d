//! `DadosTrecho` XML survey format.
//!
//! Expected layout:
//!
//! ```text
//! <DadosTrecho>
//!   <Trecho>
//!     <NomeTrecho>..</NomeTrecho> <Placa>..</Placa> <IRI>..</IRI> <Operador>..</Operador>
//!   </Trecho>
//!   <Logs>
//!     <Log Hodometro=".." DataHora="..">
//!       <GPS X="long" Y="lat"/>
//!       <Barometro Temp=".." Altitude=".."/>
//!     </Log>
//!   </Logs>
//! </DadosTrecho>
//! ```

use async_trait::async_trait;
use std::io::Read;
use tracing::{debug, warn};
use xml::attribute::OwnedAttribute;
use xml::reader::{EventReader, XmlEvent};

use crate::model::{GeoPosition, HeaderRecord, RawEntry, SurveyLog};
use crate::traits::{LogParser, ParseError};

const ROOT: &str = "DadosTrecho";
const HEADER: &str = "Trecho";
const LOGS: &str = "Logs";
const LOG: &str = "Log";
const GPS: &str = "GPS";
const BAROMETER: &str = "Barometro";

/// Parser for `DadosTrecho` road-survey logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct DadosTrechoParser;

impl DadosTrechoParser {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous entry point used by [`LogParser::parse`].
    pub fn parse_reader<R: Read>(&self, source: R) -> Result<SurveyLog, ParseError> {
        let mut state = DocumentState::default();

        for event in EventReader::new(source) {
            match event.map_err(|e| ParseError::InvalidXml(e.to_string()))? {
                XmlEvent::StartElement {
                    name, attributes, ..
                } => state.open(name.local_name, &attributes)?,
                XmlEvent::EndElement { .. } => state.close(),
                XmlEvent::Characters(text) | XmlEvent::CData(text) => state.text(&text),
                _ => {}
            }
        }

        state.finish()
    }
}

#[async_trait]
impl LogParser for DadosTrechoParser {
    fn format_id(&self) -> &str {
        "dados-trecho"
    }

    async fn parse(&self, content: &[u8]) -> Result<SurveyLog, ParseError> {
        self.parse_reader(content)
    }
}

/// Which header field the current character data belongs to.
#[derive(Debug, Clone, Copy)]
enum HeaderField {
    StretchName,
    VehiclePlate,
    AssetType,
    Driver,
}

impl HeaderField {
    fn from_element(name: &str) -> Option<Self> {
        match name {
            "NomeTrecho" => Some(Self::StretchName),
            "Placa" => Some(Self::VehiclePlate),
            "IRI" => Some(Self::AssetType),
            "Operador" => Some(Self::Driver),
            _ => None,
        }
    }

    fn slot<'a>(&self, header: &'a mut HeaderRecord) -> &'a mut String {
        match self {
            Self::StretchName => &mut header.stretch_name,
            Self::VehiclePlate => &mut header.vehicle_plate,
            Self::AssetType => &mut header.asset_type,
            Self::Driver => &mut header.driver,
        }
    }
}

/// Attributes collected for one `<Log>` element before it is validated.
#[derive(Debug, Default)]
struct PendingEntry {
    odometer: Option<String>,
    timestamp: Option<String>,
    lat: Option<String>,
    long: Option<String>,
    temperature: Option<String>,
    altitude: Option<String>,
}

impl PendingEntry {
    fn into_entry(self) -> Result<RawEntry, ParseError> {
        let odometer = required(self.odometer, LOG, "Hodometro")?;
        let timestamp = required(self.timestamp, LOG, "DataHora")?;
        let lat = required(self.lat, GPS, "Y")?;
        let long = required(self.long, GPS, "X")?;
        let temperature = required(self.temperature, BAROMETER, "Temp")?;
        let altitude = required(self.altitude, BAROMETER, "Altitude")?;

        Ok(RawEntry {
            odometer: number("Hodometro", &odometer)?,
            timestamp: timestamp.trim().to_string(),
            position: GeoPosition {
                lat: number("Y", &lat)?,
                long: number("X", &long)?,
            },
            temperature: number("Temp", &temperature)?,
            altitude: number("Altitude", &altitude)?,
        })
    }
}

fn required(
    value: Option<String>,
    element: &'static str,
    attribute: &'static str,
) -> Result<String, ParseError> {
    value.ok_or(ParseError::MissingAttribute { element, attribute })
}

fn number(field: &'static str, value: &str) -> Result<f64, ParseError> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

fn attribute(attributes: &[OwnedAttribute], name: &str) -> Option<String> {
    attributes
        .iter()
        .find(|a| a.name.local_name == name)
        .map(|a| a.value.clone())
}

#[derive(Debug, Default)]
struct DocumentState {
    path: Vec<String>,
    header: HeaderRecord,
    seen_header: bool,
    seen_logs: bool,
    current_field: Option<HeaderField>,
    pending: Option<PendingEntry>,
    entries: Vec<RawEntry>,
    skipped: usize,
}

impl DocumentState {
    fn open(&mut self, name: String, attributes: &[OwnedAttribute]) -> Result<(), ParseError> {
        let depth = self.path.len();
        let parent = self.path.last().map(String::as_str);

        match (depth, parent, name.as_str()) {
            (0, _, ROOT) => {}
            (0, _, _) => return Err(ParseError::Schema(ROOT.to_string())),
            (1, _, HEADER) => self.seen_header = true,
            (1, _, LOGS) => self.seen_logs = true,
            (2, Some(HEADER), field) => self.current_field = HeaderField::from_element(field),
            (2, Some(LOGS), LOG) => {
                self.pending = Some(PendingEntry {
                    odometer: attribute(attributes, "Hodometro"),
                    timestamp: attribute(attributes, "DataHora"),
                    ..PendingEntry::default()
                });
            }
            (3, Some(LOG), GPS) if self.in_logs() => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.long = attribute(attributes, "X");
                    pending.lat = attribute(attributes, "Y");
                }
            }
            (3, Some(LOG), BAROMETER) if self.in_logs() => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.temperature = attribute(attributes, "Temp");
                    pending.altitude = attribute(attributes, "Altitude");
                }
            }
            _ => {}
        }

        self.path.push(name);
        Ok(())
    }

    fn in_logs(&self) -> bool {
        self.path.get(1).map(String::as_str) == Some(LOGS)
    }

    fn close(&mut self) {
        let closed = self.path.pop();
        match (self.path.len(), closed.as_deref()) {
            (2, Some(LOG)) if self.in_logs() => self.flush_entry(),
            (2, _) => self.current_field = None,
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if self.path.len() != 3 {
            return;
        }
        if let Some(field) = self.current_field {
            field.slot(&mut self.header).push_str(text);
        }
    }

    fn flush_entry(&mut self) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        match pending.into_entry() {
            Ok(entry) => self.entries.push(entry),
            Err(e) => {
                self.skipped += 1;
                warn!(
                    index = self.entries.len() + self.skipped - 1,
                    error = %e,
                    "Skipping log entry"
                );
            }
        }
    }

    fn finish(self) -> Result<SurveyLog, ParseError> {
        if !self.seen_header {
            return Err(ParseError::Schema(format!("{ROOT}/{HEADER}")));
        }
        if !self.seen_logs {
            return Err(ParseError::Schema(format!("{ROOT}/{LOGS}")));
        }

        let mut header = self.header;
        for value in [
            &mut header.stretch_name,
            &mut header.vehicle_plate,
            &mut header.asset_type,
            &mut header.driver,
        ] {
            *value = value.trim().to_string();
        }

        debug!(
            entries = self.entries.len(),
            skipped = self.skipped,
            "Parsed survey log"
        );

        Ok(SurveyLog {
            header,
            entries: self.entries,
            skipped_entries: self.skipped,
        })
    }
}
