//! Loading the workbook sheets and joining event characteristics with sales.
//!
//! The source is either a spreadsheet workbook (`.xlsx`, `.xls`, `.ods`) with
//! the three sheets as tabs, or a directory holding one CSV export per sheet,
//! each file named after its sheet.

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, Sheets, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::DataSourceError;
use crate::features::{CalendarFeatures, RatioMetrics};

pub const EVENT_CHARACTERISTICS_SHEET: &str = "Event Characteristics Data";
pub const EVENT_SALES_SHEET: &str = "Event Point of Sale Data";
pub const STAND_SALES_SHEET: &str = "Stand Point of Sale Data";

const CHARACTERISTIC_COLUMNS: &[&str] = &[
    "Venue Name",
    "Calendar Date",
    "EventTypeName",
    "Opponent",
    "Event Time",
];

const EVENT_SALES_COLUMNS: &[&str] = &[
    "Venue Name",
    "Calendar Date",
    "Total Attendance",
    "Transactions",
    "Net Sales",
    "Units",
    "Total POS",
];

const STAND_SALES_COLUMNS: &[&str] = &[
    "Calendar Date",
    "Stand Group",
    "Transactions",
    "Net Sales",
    "Units",
    "Total POS",
    "Trans Per POS",
    "Units Per Trans",
];

/// Scheduling details of one event at one venue.
#[derive(Debug, Clone, PartialEq)]
pub struct EventCharacteristicRecord {
    pub venue_name: String,
    pub calendar_date: NaiveDate,
    pub event_type: String,
    pub opponent: String,
    pub event_time: NaiveTime,
}

/// Event-level point-of-sale outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct EventSalesRecord {
    pub venue_name: String,
    pub calendar_date: NaiveDate,
    pub total_attendance: f64,
    pub transactions: f64,
    pub net_sales: f64,
    pub units: f64,
    pub total_pos: f64,
}

/// Point-of-sale outcomes of one stand group at one event.
#[derive(Debug, Clone, PartialEq)]
pub struct StandSalesRecord {
    pub venue_name: Option<String>,
    pub calendar_date: NaiveDate,
    pub stand_group: String,
    pub transactions: f64,
    pub net_sales: f64,
    pub units: f64,
    pub total_pos: f64,
    /// Blank cells in the sheet load as `None`.
    pub trans_per_pos: Option<f64>,
    pub units_per_trans: Option<f64>,
}

/// One row of the characteristics/sales join.
///
/// `calendar` and `ratios` stay `None` until [`crate::features::derive_features`]
/// runs over the table.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEventRecord {
    pub characteristics: EventCharacteristicRecord,
    pub sales: EventSalesRecord,
    pub calendar: Option<CalendarFeatures>,
    pub ratios: Option<RatioMetrics>,
}

impl MergedEventRecord {
    pub fn key(&self) -> (&str, NaiveDate) {
        (
            self.characteristics.venue_name.as_str(),
            self.characteristics.calendar_date,
        )
    }
}

/// The three sheets of the workbook, parsed.
#[derive(Debug, Clone, Default)]
pub struct SourceTables {
    pub characteristics: Vec<EventCharacteristicRecord>,
    pub event_sales: Vec<EventSalesRecord>,
    pub stand_sales: Vec<StandSalesRecord>,
}

#[derive(Debug, Deserialize)]
struct CharacteristicRow {
    #[serde(rename = "Venue Name")]
    venue_name: String,
    #[serde(rename = "Calendar Date")]
    calendar_date: String,
    #[serde(rename = "EventTypeName")]
    event_type: String,
    #[serde(rename = "Opponent", default)]
    opponent: String,
    #[serde(rename = "Event Time")]
    event_time: String,
}

#[derive(Debug, Deserialize)]
struct EventSalesRow {
    #[serde(rename = "Venue Name")]
    venue_name: String,
    #[serde(rename = "Calendar Date")]
    calendar_date: String,
    #[serde(rename = "Total Attendance")]
    total_attendance: f64,
    #[serde(rename = "Transactions")]
    transactions: f64,
    #[serde(rename = "Net Sales")]
    net_sales: f64,
    #[serde(rename = "Units")]
    units: f64,
    #[serde(rename = "Total POS")]
    total_pos: f64,
}

#[derive(Debug, Deserialize)]
struct StandSalesRow {
    #[serde(rename = "Venue Name", default)]
    venue_name: Option<String>,
    #[serde(rename = "Calendar Date")]
    calendar_date: String,
    #[serde(rename = "Stand Group")]
    stand_group: String,
    #[serde(rename = "Transactions")]
    transactions: f64,
    #[serde(rename = "Net Sales")]
    net_sales: f64,
    #[serde(rename = "Units")]
    units: f64,
    #[serde(rename = "Total POS")]
    total_pos: f64,
    #[serde(rename = "Trans Per POS")]
    trans_per_pos: Option<f64>,
    #[serde(rename = "Units Per Trans")]
    units_per_trans: Option<f64>,
}

/// Load all three sheets from a workbook file or a directory of CSV exports.
pub fn load_tables(path: &Path) -> Result<SourceTables, DataSourceError> {
    let mut source = SheetSource::open(path)?;

    let characteristics = source
        .read_sheet::<CharacteristicRow>(EVENT_CHARACTERISTICS_SHEET, CHARACTERISTIC_COLUMNS)?
        .into_iter()
        .map(|(row, raw)| {
            Ok(EventCharacteristicRecord {
                calendar_date: date_cell(EVENT_CHARACTERISTICS_SHEET, row, &raw.calendar_date)?,
                event_time: time_cell(EVENT_CHARACTERISTICS_SHEET, row, &raw.event_time)?,
                venue_name: raw.venue_name,
                event_type: raw.event_type,
                opponent: raw.opponent,
            })
        })
        .collect::<Result<Vec<_>, DataSourceError>>()?;

    let event_sales = source
        .read_sheet::<EventSalesRow>(EVENT_SALES_SHEET, EVENT_SALES_COLUMNS)?
        .into_iter()
        .map(|(row, raw)| {
            Ok(EventSalesRecord {
                calendar_date: date_cell(EVENT_SALES_SHEET, row, &raw.calendar_date)?,
                venue_name: raw.venue_name,
                total_attendance: raw.total_attendance,
                transactions: raw.transactions,
                net_sales: raw.net_sales,
                units: raw.units,
                total_pos: raw.total_pos,
            })
        })
        .collect::<Result<Vec<_>, DataSourceError>>()?;

    let stand_sales = source
        .read_sheet::<StandSalesRow>(STAND_SALES_SHEET, STAND_SALES_COLUMNS)?
        .into_iter()
        .map(|(row, raw)| {
            Ok(StandSalesRecord {
                calendar_date: date_cell(STAND_SALES_SHEET, row, &raw.calendar_date)?,
                venue_name: raw.venue_name.filter(|v| !v.is_empty()),
                stand_group: raw.stand_group,
                transactions: raw.transactions,
                net_sales: raw.net_sales,
                units: raw.units,
                total_pos: raw.total_pos,
                trans_per_pos: raw.trans_per_pos,
                units_per_trans: raw.units_per_trans,
            })
        })
        .collect::<Result<Vec<_>, DataSourceError>>()?;

    tracing::info!(
        "Loaded sheets: {} characteristics, {} event sales, {} stand sales",
        characteristics.len(),
        event_sales.len(),
        stand_sales.len()
    );

    Ok(SourceTables {
        characteristics,
        event_sales,
        stand_sales,
    })
}

/// Path of a sheet's CSV export inside a data directory.
pub fn sheet_path(dir: &Path, sheet: &str) -> PathBuf {
    dir.join(format!("{sheet}.csv"))
}

enum SheetSource {
    Workbook {
        path: PathBuf,
        sheets: Sheets<BufReader<File>>,
    },
    CsvDirectory(PathBuf),
}

impl SheetSource {
    fn open(path: &Path) -> Result<Self, DataSourceError> {
        if path.is_dir() {
            return Ok(Self::CsvDirectory(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(DataSourceError::MissingPath(path.to_path_buf()));
        }

        let sheets = open_workbook_auto(path).map_err(|source| DataSourceError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Opened workbook {}", path.display());

        Ok(Self::Workbook {
            path: path.to_path_buf(),
            sheets,
        })
    }

    /// Read one sheet, checking its header before deserializing rows.
    ///
    /// Returned row numbers are 1-based spreadsheet rows (the header is row 1).
    fn read_sheet<T: DeserializeOwned>(
        &mut self,
        sheet: &str,
        required: &[&str],
    ) -> Result<Vec<(usize, T)>, DataSourceError> {
        match self {
            Self::Workbook { path, sheets } => read_workbook_sheet(path, sheets, sheet, required),
            Self::CsvDirectory(dir) => read_csv_sheet(dir, sheet, required),
        }
    }
}

fn read_workbook_sheet<T: DeserializeOwned>(
    path: &Path,
    sheets: &mut Sheets<BufReader<File>>,
    sheet: &str,
    required: &[&str],
) -> Result<Vec<(usize, T)>, DataSourceError> {
    if !sheets.sheet_names().iter().any(|name| name.as_str() == sheet) {
        return Err(DataSourceError::MissingSheet {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
        });
    }

    let range = sheets
        .worksheet_range(sheet)
        .map_err(|source| DataSourceError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;
    // Ranges start at the first used cell, not necessarily at A1
    let header_row = range.start().map_or(0, |(row, _)| row as usize);

    let mut rows = range.rows();
    let headers: csv::StringRecord = rows
        .next()
        .map(|cells| cells.iter().map(cell_text).collect())
        .unwrap_or_default();
    check_headers(sheet, &headers, required)?;

    rows.enumerate()
        .filter(|(_, cells)| cells.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|(idx, cells)| {
            let record: csv::StringRecord = cells.iter().map(cell_text).collect();
            record
                .deserialize::<T>(Some(&headers))
                .map(|r| (header_row + idx + 2, r))
                .map_err(|source| DataSourceError::Csv {
                    sheet: sheet.to_string(),
                    source,
                })
        })
        .collect()
}

fn read_csv_sheet<T: DeserializeOwned>(
    dir: &Path,
    sheet: &str,
    required: &[&str],
) -> Result<Vec<(usize, T)>, DataSourceError> {
    let path = sheet_path(dir, sheet);
    if !path.is_file() {
        return Err(DataSourceError::MissingSheet {
            sheet: sheet.to_string(),
            path,
        });
    }

    let csv_err = |source: csv::Error| DataSourceError::Csv {
        sheet: sheet.to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(&path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    check_headers(sheet, &headers, required)?;

    reader
        .deserialize::<T>()
        .enumerate()
        .map(|(idx, row)| row.map(|r| (idx + 2, r)).map_err(csv_err))
        .collect()
}

fn check_headers(
    sheet: &str,
    headers: &csv::StringRecord,
    required: &[&str],
) -> Result<(), DataSourceError> {
    match required
        .iter()
        .find(|column| !headers.iter().any(|h| h == **column))
    {
        Some(missing) => Err(DataSourceError::MissingColumn {
            sheet: sheet.to_string(),
            column: missing.to_string(),
        }),
        None => Ok(()),
    }
}

/// Render a spreadsheet cell the way a CSV export would spell it.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(value) => {
            let serial = value.as_f64();
            if (0.0..1.0).contains(&serial) {
                // Time-of-day cells carry no whole days
                let seconds = (serial * 86_400.0).round() as u32 % 86_400;
                NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_default()
            } else {
                value
                    .as_datetime()
                    .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                    .unwrap_or_else(|| serial.to_string())
            }
        }
    }
}

fn date_cell(sheet: &str, row: usize, value: &str) -> Result<NaiveDate, DataSourceError> {
    parse_date(value).ok_or_else(|| DataSourceError::Malformed {
        sheet: sheet.to_string(),
        row,
        message: format!("unrecognised date '{value}'"),
    })
}

fn time_cell(sheet: &str, row: usize, value: &str) -> Result<NaiveTime, DataSourceError> {
    parse_time(value).ok_or_else(|| DataSourceError::Malformed {
        sheet: sheet.to_string(),
        row,
        message: format!("unrecognised time '{value}'"),
    })
}

/// Parse a calendar date as spreadsheets commonly export it.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];
    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// Parse a time of day (`19:30:00`, `19:30` or `7:30 PM`).
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    const TIME_FORMATS: [&str; 3] = ["%H:%M:%S", "%H:%M", "%I:%M %p"];

    let value = value.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
}

/// Inner-join characteristics with event sales on (venue, date).
///
/// Rows without a partner on the other side are dropped. Output follows the
/// order of `characteristics`; a key that appears several times on the sales
/// side yields one merged row per sales row.
pub fn merge_events(
    characteristics: &[EventCharacteristicRecord],
    sales: &[EventSalesRecord],
) -> Vec<MergedEventRecord> {
    let mut sales_by_key: HashMap<(&str, NaiveDate), Vec<&EventSalesRecord>> = HashMap::new();
    for record in sales {
        sales_by_key
            .entry((record.venue_name.as_str(), record.calendar_date))
            .or_default()
            .push(record);
    }

    let merged: Vec<MergedEventRecord> = characteristics
        .iter()
        .flat_map(|chars| {
            sales_by_key
                .get(&(chars.venue_name.as_str(), chars.calendar_date))
                .into_iter()
                .flatten()
                .map(move |sales| MergedEventRecord {
                    characteristics: chars.clone(),
                    sales: (*sales).clone(),
                    calendar: None,
                    ratios: None,
                })
        })
        .collect();

    let dropped = characteristics.len().saturating_sub(merged.len());
    if dropped > 0 {
        tracing::debug!("{} characteristic rows had no matching sales row", dropped);
    }
    tracing::info!("Merged dataset: {} events", merged.len());

    merged
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::fs;

    use chrono::{Datelike, Timelike};
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn chars(venue: &str, day: NaiveDate) -> EventCharacteristicRecord {
        EventCharacteristicRecord {
            venue_name: venue.to_string(),
            calendar_date: day,
            event_type: "NBA Regular Season".to_string(),
            opponent: "Boston Celtics".to_string(),
            event_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
        }
    }

    fn sales(venue: &str, day: NaiveDate) -> EventSalesRecord {
        EventSalesRecord {
            venue_name: venue.to_string(),
            calendar_date: day,
            total_attendance: 15000.0,
            transactions: 9000.0,
            net_sales: 120000.0,
            units: 14000.0,
            total_pos: 80.0,
        }
    }

    // ==================== Parsing Tests ====================

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2023-03-05"), Some(date(2023, 3, 5)));
        assert_eq!(parse_date("03/05/2023"), Some(date(2023, 3, 5)));
        assert_eq!(parse_date("2023-03-05 00:00:00"), Some(date(2023, 3, 5)));
        assert_eq!(parse_date("March 5"), None);
    }

    #[test]
    fn test_parse_time_formats() {
        let two_pm = NaiveTime::from_hms_opt(14, 0, 0).unwrap();
        assert_eq!(parse_time("14:00:00"), Some(two_pm));
        assert_eq!(parse_time("14:00"), Some(two_pm));
        assert_eq!(parse_time("2:00 PM"), Some(two_pm));
        assert_eq!(parse_time("later"), None);
    }

    // ==================== Merge Tests ====================

    #[test]
    fn test_merge_drops_unmatched_rows() {
        let c = vec![
            chars("Silver Arena", date(2023, 1, 1)),
            chars("Silver Arena", date(2023, 1, 2)),
            chars("Other Hall", date(2023, 1, 1)),
        ];
        let s = vec![
            sales("Silver Arena", date(2023, 1, 1)),
            sales("Silver Arena", date(2023, 1, 3)),
        ];

        let merged = merge_events(&c, &s);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].key(), ("Silver Arena", date(2023, 1, 1)));
        assert!(merged[0].calendar.is_none());
    }

    #[test]
    fn test_merge_keys_exist_on_both_sides() {
        let c: Vec<_> = (1..=10)
            .map(|d| chars("Silver Arena", date(2023, 2, d)))
            .collect();
        let s: Vec<_> = (5..=15)
            .map(|d| sales("Silver Arena", date(2023, 2, d)))
            .collect();

        let merged = merge_events(&c, &s);

        let char_keys: HashSet<_> = c
            .iter()
            .map(|r| (r.venue_name.as_str(), r.calendar_date))
            .collect();
        let sales_keys: HashSet<_> = s
            .iter()
            .map(|r| (r.venue_name.as_str(), r.calendar_date))
            .collect();
        assert_eq!(merged.len(), 6);
        assert!(merged.len() <= char_keys.len().min(sales_keys.len()));
        for row in &merged {
            assert!(char_keys.contains(&row.key()));
            assert!(sales_keys.contains(&row.key()));
        }
    }

    #[test]
    fn test_merge_preserves_characteristic_order() {
        let c = vec![
            chars("Silver Arena", date(2023, 3, 9)),
            chars("Silver Arena", date(2023, 3, 1)),
        ];
        let s = vec![
            sales("Silver Arena", date(2023, 3, 1)),
            sales("Silver Arena", date(2023, 3, 9)),
        ];

        let merged = merge_events(&c, &s);
        assert_eq!(merged[0].characteristics.calendar_date, date(2023, 3, 9));
        assert_eq!(merged[1].characteristics.calendar_date, date(2023, 3, 1));
    }

    #[test]
    fn test_merge_repeats_duplicate_sales_keys() {
        let day = date(2023, 4, 2);
        let c = vec![
            chars("Silver Arena", date(2023, 4, 1)),
            chars("Silver Arena", day),
        ];
        let mut first = sales("Silver Arena", day);
        first.transactions = 8000.0;
        let mut second = sales("Silver Arena", day);
        second.transactions = 8500.0;
        let s = vec![first, sales("Silver Arena", date(2023, 4, 9)), second];

        let merged = merge_events(&c, &s);

        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|r| r.key() == ("Silver Arena", day)));
        assert_eq!(merged[0].sales.transactions, 8000.0);
        assert_eq!(merged[1].sales.transactions, 8500.0);
    }

    #[test]
    fn test_merge_repeats_duplicate_characteristic_keys() {
        let day = date(2023, 4, 2);
        let mut rematch = chars("Silver Arena", day);
        rematch.opponent = "Utah Jazz".to_string();
        let c = vec![chars("Silver Arena", day), rematch];
        let s = vec![sales("Silver Arena", day)];

        let merged = merge_events(&c, &s);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].characteristics.opponent, "Boston Celtics");
        assert_eq!(merged[1].characteristics.opponent, "Utah Jazz");
        assert_eq!(merged[0].sales, merged[1].sales);
    }

    // ==================== Loader Tests ====================

    const CHARACTERISTICS_BODY: &str =
        "Venue Name,Calendar Date,EventTypeName,Opponent,Event Time\n\
         Silver Arena,2023-01-07,NBA Regular Season,Boston Celtics,19:30:00\n\
         Silver Arena,2023-01-08,Concert,,20:00:00\n";

    const EVENT_SALES_BODY: &str =
        "Venue Name,Calendar Date,Total Attendance,Transactions,Net Sales,Units,Total POS\n\
         Silver Arena,2023-01-07,17000,10200,151000.50,16000,85\n";

    const STAND_SALES_BODY: &str = "Calendar Date,Stand Group,Transactions,Net Sales,Units,\
         Total POS,Trans Per POS,Units Per Trans\n\
         2023-01-07,Beverage,4000,50000,5200,20,200,1.3\n\
         2023-01-07,Grill,3000,45000,4100,25,,1.37\n";

    fn write_sheet(dir: &Path, sheet: &str, body: &str) {
        fs::write(sheet_path(dir, sheet), body).unwrap();
    }

    fn write_valid_workbook(dir: &Path) {
        write_sheet(dir, EVENT_CHARACTERISTICS_SHEET, CHARACTERISTICS_BODY);
        write_sheet(dir, EVENT_SALES_SHEET, EVENT_SALES_BODY);
        write_sheet(dir, STAND_SALES_SHEET, STAND_SALES_BODY);
    }

    /// Write comma-separated sheet bodies as tabs of an `.xlsx` file. ISO dates
    /// and times become real date cells, numbers become numeric cells.
    fn write_xlsx(path: &Path, sheets: &[(&str, &str)]) {
        let mut workbook = Workbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let time_format = Format::new().set_num_format("hh:mm:ss");

        for (name, body) in sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(*name).unwrap();

            for (row, line) in body.lines().enumerate() {
                for (col, cell) in line.split(',').map(str::trim).enumerate() {
                    let (row, col) = (row as u32, col as u16);
                    if cell.is_empty() {
                        continue;
                    }
                    if let Ok(day) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
                        let value = ExcelDateTime::from_ymd(
                            day.year() as u16,
                            day.month() as u8,
                            day.day() as u8,
                        )
                        .unwrap();
                        worksheet
                            .write_datetime_with_format(row, col, &value, &date_format)
                            .unwrap();
                    } else if let Ok(time) = NaiveTime::parse_from_str(cell, "%H:%M:%S") {
                        let value = ExcelDateTime::from_hms(
                            time.hour() as u16,
                            time.minute() as u8,
                            time.second(),
                        )
                        .unwrap();
                        worksheet
                            .write_datetime_with_format(row, col, &value, &time_format)
                            .unwrap();
                    } else if let Ok(number) = cell.parse::<f64>() {
                        worksheet.write_number(row, col, number).unwrap();
                    } else {
                        worksheet.write_string(row, col, cell).unwrap();
                    }
                }
            }
        }

        workbook.save(path).unwrap();
    }

    fn write_valid_xlsx(path: &Path) {
        write_xlsx(
            path,
            &[
                (EVENT_CHARACTERISTICS_SHEET, CHARACTERISTICS_BODY),
                (EVENT_SALES_SHEET, EVENT_SALES_BODY),
                (STAND_SALES_SHEET, STAND_SALES_BODY),
            ],
        );
    }

    #[test]
    fn test_load_tables_success() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_workbook(dir.path());

        let tables = load_tables(dir.path()).unwrap();

        assert_eq!(tables.characteristics.len(), 2);
        assert_eq!(tables.characteristics[1].opponent, "");
        assert_eq!(
            tables.characteristics[0].event_time,
            NaiveTime::from_hms_opt(19, 30, 0).unwrap()
        );
        assert_eq!(tables.event_sales.len(), 1);
        assert_eq!(tables.event_sales[0].net_sales, 151000.50);
        assert_eq!(tables.stand_sales.len(), 2);
        assert_eq!(tables.stand_sales[0].trans_per_pos, Some(200.0));
        assert_eq!(tables.stand_sales[1].trans_per_pos, None);
        assert_eq!(tables.stand_sales[0].venue_name, None);
    }

    #[test]
    fn test_load_tables_missing_directory() {
        let result = load_tables(Path::new("/definitely/not/here"));
        assert!(matches!(result, Err(DataSourceError::MissingPath(_))));
    }

    #[test]
    fn test_load_tables_missing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_workbook(dir.path());
        fs::remove_file(sheet_path(dir.path(), STAND_SALES_SHEET)).unwrap();

        let result = load_tables(dir.path());
        assert!(matches!(
            result,
            Err(DataSourceError::MissingSheet { ref sheet, .. }) if sheet == STAND_SALES_SHEET
        ));
    }

    #[test]
    fn test_load_tables_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_workbook(dir.path());
        write_sheet(
            dir.path(),
            EVENT_SALES_SHEET,
            "Venue Name,Calendar Date,Total Attendance,Transactions,Units,Total POS\n",
        );

        let result = load_tables(dir.path());
        assert!(matches!(
            result,
            Err(DataSourceError::MissingColumn { ref column, .. }) if column == "Net Sales"
        ));
    }

    #[test]
    fn test_load_tables_bad_date_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_workbook(dir.path());
        write_sheet(
            dir.path(),
            EVENT_CHARACTERISTICS_SHEET,
            "Venue Name,Calendar Date,EventTypeName,Opponent,Event Time\n\
             Silver Arena,2023-01-07,NBA Regular Season,Boston Celtics,19:30:00\n\
             Silver Arena,someday,NBA Regular Season,Boston Celtics,19:30:00\n",
        );

        let result = load_tables(dir.path());
        assert!(matches!(
            result,
            Err(DataSourceError::Malformed { row: 3, .. })
        ));
    }

    // ==================== Workbook Tests ====================

    #[test]
    fn test_load_workbook_matches_csv_export() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_workbook(dir.path());
        let xlsx = dir.path().join("Demand Planning.xlsx");
        write_valid_xlsx(&xlsx);

        let from_csv = load_tables(dir.path()).unwrap();
        let from_xlsx = load_tables(&xlsx).unwrap();

        assert_eq!(from_xlsx.characteristics, from_csv.characteristics);
        assert_eq!(from_xlsx.event_sales, from_csv.event_sales);
        assert_eq!(from_xlsx.stand_sales, from_csv.stand_sales);
        assert_eq!(from_xlsx.characteristics[1].opponent, "");
        assert_eq!(
            from_xlsx.characteristics[0].event_time,
            NaiveTime::from_hms_opt(19, 30, 0).unwrap()
        );
        assert_eq!(from_xlsx.stand_sales[1].trans_per_pos, None);
    }

    #[test]
    fn test_workbook_missing_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("partial.xlsx");
        write_xlsx(
            &xlsx,
            &[
                (EVENT_CHARACTERISTICS_SHEET, CHARACTERISTICS_BODY),
                (EVENT_SALES_SHEET, EVENT_SALES_BODY),
            ],
        );

        let result = load_tables(&xlsx);
        assert!(matches!(
            result,
            Err(DataSourceError::MissingSheet { ref sheet, .. }) if sheet == STAND_SALES_SHEET
        ));
    }

    #[test]
    fn test_workbook_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("renamed.xlsx");
        let event_sales = EVENT_SALES_BODY.replacen("Total POS", "Registers", 1);
        write_xlsx(
            &xlsx,
            &[
                (EVENT_CHARACTERISTICS_SHEET, CHARACTERISTICS_BODY),
                (EVENT_SALES_SHEET, event_sales.as_str()),
                (STAND_SALES_SHEET, STAND_SALES_BODY),
            ],
        );

        let result = load_tables(&xlsx);
        assert!(matches!(
            result,
            Err(DataSourceError::MissingColumn { ref column, .. }) if column == "Total POS"
        ));
    }

    #[test]
    fn test_workbook_bad_date_reports_row() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("bad.xlsx");
        let characteristics =
            format!("{CHARACTERISTICS_BODY}Silver Arena,someday,Concert,,20:00:00\n");
        write_xlsx(
            &xlsx,
            &[
                (EVENT_CHARACTERISTICS_SHEET, characteristics.as_str()),
                (EVENT_SALES_SHEET, EVENT_SALES_BODY),
                (STAND_SALES_SHEET, STAND_SALES_BODY),
            ],
        );

        let result = load_tables(&xlsx);
        assert!(matches!(
            result,
            Err(DataSourceError::Malformed { row: 4, .. })
        ));
    }

    #[test]
    fn test_unreadable_workbook() {
        let dir = tempfile::tempdir().unwrap();
        let xlsx = dir.path().join("broken.xlsx");
        fs::write(&xlsx, "not a spreadsheet").unwrap();

        assert!(matches!(
            load_tables(&xlsx),
            Err(DataSourceError::Workbook { .. })
        ));
    }
}
