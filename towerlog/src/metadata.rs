//! Site, logger and sensor metadata of NRG exports.
//!
//! Besides measurements, an export describes the logger that recorded it and every sensor
//! channel wired to it. Loggers are stored once per site number and sensors once per channel
//! within a site.

use thiserror::Error;
use tracing::{info, warn};

use crate::destination::Warehouse;
use crate::error::LoadResult;
use crate::schema::ensure_schema;
use crate::text::{
    BlockStart, ParameterRecord, TextDocument, find_channel_blocks, find_param,
    read_channel_block, read_parameter_block,
};
use crate::types::{Cell, RecordBatch};
use crate::upsert::{KeyStrategy, UpsertOutcome, upsert_new};

/// Needle locating the site number line.
pub const SITE_NUMBER_NEEDLE: &str = "Site Number:";
/// Column holding the site number in logger and sensor tables.
pub const SITE_NUMBER_COLUMN: &str = "Site Number";
/// Column identifying a sensor within a site.
pub const CHANNEL_COLUMN: &str = "Channel";
pub const LOGGER_MODEL: &str = "Model";
pub const LOGGER_SERIAL_NUMBER: &str = "Serial Number";

pub const EXPORT_PARAMETERS_SECTION: &str = "Export Parameters";
pub const SITE_PROPERTIES_SECTION: &str = "Site Properties";
pub const LOGGER_HISTORY_SECTION: &str = "Logger History";
pub const SENSOR_HISTORY_SECTION: &str = "Sensor History";

/// Marker of the measurement table header, also its key column.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";
/// Provenance column holding the binary source file name.
pub const RLD_FILE_COLUMN: &str = "rld_file_name";
/// Provenance column holding the decrypted text file name.
pub const TXT_FILE_COLUMN: &str = "txt_file_name";

/// Required metadata missing from an export.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MetadataGap {
    #[error("section `{0}` not found or empty")]
    MissingSection(&'static str),
    #[error("parameter `{parameter}` not found in section `{section}`")]
    MissingParameter {
        section: &'static str,
        parameter: &'static str,
    },
}

/// Outcome of [`register_site_metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataRegistration {
    /// Required logger metadata is missing, nothing was stored.
    Incomplete(MetadataGap),
    /// The loggers table could not be reconciled, so no sensors were stored either.
    LoggerTableNotReady,
    Registered {
        logger: UpsertOutcome,
        channels: usize,
        sensors_inserted: usize,
    },
}

/// Returns the site number of an export, with inner spaces turned into underscores.
pub fn site_number(doc: &TextDocument) -> Option<String> {
    find_param(doc, SITE_NUMBER_NEEDLE)
        .map(|found| found.value)
        .filter(|value| !value.is_empty())
}

/// Returns the measurement table name of a site.
pub fn data_table_name(prefix: &str, site_number: &str) -> String {
    format!("{prefix}_{site_number}")
}

/// Builds the logger row of an export.
///
/// The row holds the `Site Properties` block extended with the site number from
/// `Export Parameters` and the model and serial number from `Logger History`.
pub fn logger_record(doc: &TextDocument) -> Result<RecordBatch, MetadataGap> {
    let export = section(doc, EXPORT_PARAMETERS_SECTION)?;
    let mut site = section(doc, SITE_PROPERTIES_SECTION)?;
    let history = section(doc, LOGGER_HISTORY_SECTION)?;

    let site_number = required(&export, EXPORT_PARAMETERS_SECTION, SITE_NUMBER_COLUMN)?;
    let model = required(&history, LOGGER_HISTORY_SECTION, LOGGER_MODEL)?;
    let serial = required(&history, LOGGER_HISTORY_SECTION, LOGGER_SERIAL_NUMBER)?;

    site.insert(SITE_NUMBER_COLUMN, site_number);
    site.insert(LOGGER_MODEL, model);
    site.insert(LOGGER_SERIAL_NUMBER, serial);

    Ok(RecordBatch::single_text_row(site))
}

/// Builds one single-row batch per sensor channel listed under `Sensor History`.
///
/// Each row carries the channel block, including its `Channel` line, plus the site number.
pub fn sensor_records(doc: &TextDocument, site_number: &str) -> Vec<RecordBatch> {
    find_channel_blocks(doc, SENSOR_HISTORY_SECTION)
        .into_iter()
        .filter_map(|line_number| read_channel_block(doc, line_number))
        .filter(|record| !record.is_empty())
        .map(|record| {
            let mut batch = RecordBatch::single_text_row(record);
            batch.set_constant_column(SITE_NUMBER_COLUMN, Cell::from(site_number));
            batch
        })
        .collect()
}

/// Stores the logger and sensor metadata of an export.
///
/// The logger row is appended to `loggers_table` unless its site number is already present.
/// Each sensor row is appended to `sensors_table` unless its channel already exists for the
/// same site. Warehouse errors are returned to the caller.
pub fn register_site_metadata<W>(
    warehouse: &W,
    doc: &TextDocument,
    loggers_table: &str,
    sensors_table: &str,
) -> LoadResult<MetadataRegistration>
where
    W: Warehouse + ?Sized,
{
    let logger = match logger_record(doc) {
        Ok(logger) => logger,
        Err(gap) => {
            warn!(table = loggers_table, %gap, "logger metadata incomplete");
            return Ok(MetadataRegistration::Incomplete(gap));
        }
    };

    // The record always holds the site number, checked by `logger_record`.
    let site_number = match logger
        .column_index(SITE_NUMBER_COLUMN)
        .and_then(|index| logger.value(0, index))
    {
        Some(Cell::Text(site_number)) => site_number.clone(),
        _ => {
            return Ok(MetadataRegistration::Incomplete(
                MetadataGap::MissingParameter {
                    section: EXPORT_PARAMETERS_SECTION,
                    parameter: SITE_NUMBER_COLUMN,
                },
            ));
        }
    };

    if !ensure_schema(warehouse, loggers_table, &logger, SITE_NUMBER_COLUMN, false)?.is_ready() {
        return Ok(MetadataRegistration::LoggerTableNotReady);
    }

    let logger_outcome = upsert_new(
        warehouse,
        loggers_table,
        logger,
        KeyStrategy::Primary {
            column: SITE_NUMBER_COLUMN,
        },
    )?;
    if let UpsertOutcome::Inserted(count) = logger_outcome {
        info!(table = loggers_table, site = %site_number, count, "registered logger");
    }

    let sensors = sensor_records(doc, &site_number);
    let channels = sensors.len();
    let parent_value = Cell::Text(site_number.clone());
    let mut sensors_inserted = 0;

    for sensor in sensors {
        if !ensure_schema(warehouse, sensors_table, &sensor, CHANNEL_COLUMN, false)?.is_ready() {
            continue;
        }

        let outcome = upsert_new(
            warehouse,
            sensors_table,
            sensor,
            KeyStrategy::Scoped {
                parent_column: SITE_NUMBER_COLUMN,
                parent_value: &parent_value,
                child_column: CHANNEL_COLUMN,
            },
        )?;
        if let UpsertOutcome::Inserted(count) = outcome {
            sensors_inserted += count;
        }
    }

    if sensors_inserted > 0 {
        info!(
            table = sensors_table,
            site = %site_number,
            count = sensors_inserted,
            "registered sensors"
        );
    }

    Ok(MetadataRegistration::Registered {
        logger: logger_outcome,
        channels,
        sensors_inserted,
    })
}

fn section(doc: &TextDocument, header: &'static str) -> Result<ParameterRecord, MetadataGap> {
    read_parameter_block(doc, BlockStart::Header(header), 0)
        .filter(|record| !record.is_empty())
        .ok_or(MetadataGap::MissingSection(header))
}

fn required(
    record: &ParameterRecord,
    section: &'static str,
    parameter: &'static str,
) -> Result<String, MetadataGap> {
    record
        .get(parameter)
        .map(str::to_owned)
        .ok_or(MetadataGap::MissingParameter { section, parameter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::memory::MemoryWarehouse;
    use crate::test_utils::sample_export;

    #[test]
    fn site_number_and_table_name() {
        let doc = TextDocument::from_text(&sample_export("42"));
        let site = site_number(&doc).unwrap();

        assert_eq!(site, "42");
        assert_eq!(data_table_name("NRG_Tower_SN", &site), "NRG_Tower_SN_42");
        assert_eq!(site_number(&TextDocument::from_text("Site Number:\n")), None);
    }

    #[test]
    fn logger_record_merges_sections() {
        let doc = TextDocument::from_text(&sample_export("42"));
        let logger = logger_record(&doc).unwrap();
        let names: Vec<_> = logger.column_names().collect();

        assert_eq!(
            names,
            vec!["Site Description", "Elevation", "Site Number", "Model", "Serial Number"]
        );
        assert_eq!(logger.value(0, 2), Some(&Cell::from("42")));
        assert_eq!(logger.value(0, 3), Some(&Cell::from("8206")));
    }

    #[test]
    fn logger_record_reports_missing_section() {
        let doc = TextDocument::from_text("Export Parameters\nSite Number: 42\n\n");

        assert_eq!(
            logger_record(&doc).unwrap_err(),
            MetadataGap::MissingSection(SITE_PROPERTIES_SECTION)
        );
    }

    #[test]
    fn sensor_records_carry_site_and_channel() {
        let doc = TextDocument::from_text(&sample_export("42"));
        let sensors = sensor_records(&doc, "42");

        assert_eq!(sensors.len(), 2);
        let first = &sensors[0];
        let channel = first.column_index(CHANNEL_COLUMN).unwrap();
        let site = first.column_index(SITE_NUMBER_COLUMN).unwrap();
        assert_eq!(first.value(0, channel), Some(&Cell::from("1")));
        assert_eq!(first.value(0, site), Some(&Cell::from("42")));
    }

    #[test]
    fn registration_is_idempotent() {
        let warehouse = MemoryWarehouse::new();
        let doc = TextDocument::from_text(&sample_export("42"));

        let first = register_site_metadata(&warehouse, &doc, "NRG_Loggers", "NRG_Sensors").unwrap();
        assert_eq!(
            first,
            MetadataRegistration::Registered {
                logger: UpsertOutcome::Inserted(1),
                channels: 2,
                sensors_inserted: 2,
            }
        );

        let second =
            register_site_metadata(&warehouse, &doc, "NRG_Loggers", "NRG_Sensors").unwrap();
        assert_eq!(
            second,
            MetadataRegistration::Registered {
                logger: UpsertOutcome::NothingNew,
                channels: 2,
                sensors_inserted: 0,
            }
        );

        let other_site = TextDocument::from_text(&sample_export("7"));
        register_site_metadata(&warehouse, &other_site, "NRG_Loggers", "NRG_Sensors").unwrap();
        assert_eq!(warehouse.table_rows("NRG_Loggers").unwrap().len(), 2);
        assert_eq!(warehouse.table_rows("NRG_Sensors").unwrap().len(), 4);
    }
}
