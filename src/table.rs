//! Flat breakdown tables for planning spreadsheets.
//!
//! A [`BreakdownRecord`] is a tree; schedulers and ADs want one row per
//! scene. [`BreakdownRecord::to_table`] flattens it using a column preset,
//! and [`BreakdownTable`] renders as GFM Markdown, TSV or CSV.

use crate::output::{BreakdownRecord, ObjectCategory, Scene};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::str::FromStr;

/// UTF-8 byte order mark. Excel needs it to open UTF-8 CSV as UTF-8.
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Characters of scene content kept in the synopsis column.
pub const SYNOPSIS_CHARS: usize = 200;

/// One column of a breakdown table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Scene,
    Number,
    Time,
    Setting,
    Location,
    SubLocation,
    Characters,
    Extras,
    Objects,
    Props,
    Vehicles,
    Effects,
    Equipment,
    Synopsis,
}

impl Column {
    pub fn header(&self) -> &'static str {
        match self {
            Column::Scene => "Scene",
            Column::Number => "Number",
            Column::Time => "Time",
            Column::Setting => "Setting",
            Column::Location => "Location",
            Column::SubLocation => "Sub-location",
            Column::Characters => "Characters",
            Column::Extras => "Extras",
            Column::Objects => "Objects",
            Column::Props => "Props",
            Column::Vehicles => "Vehicles",
            Column::Effects => "Effects",
            Column::Equipment => "Equipment",
            Column::Synopsis => "Synopsis",
        }
    }

    fn category(&self) -> Option<ObjectCategory> {
        match self {
            Column::Props => Some(ObjectCategory::Prop),
            Column::Vehicles => Some(ObjectCategory::Vehicle),
            Column::Effects => Some(ObjectCategory::Effect),
            Column::Equipment => Some(ObjectCategory::Equipment),
            _ => None,
        }
    }
}

impl FromStr for Column {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "scene" => Ok(Column::Scene),
            "number" => Ok(Column::Number),
            "time" => Ok(Column::Time),
            "setting" => Ok(Column::Setting),
            "location" => Ok(Column::Location),
            "sub_location" | "sub-location" | "sublocation" => Ok(Column::SubLocation),
            "characters" => Ok(Column::Characters),
            "extras" | "crowd" => Ok(Column::Extras),
            "objects" => Ok(Column::Objects),
            "props" => Ok(Column::Props),
            "vehicles" => Ok(Column::Vehicles),
            "effects" => Ok(Column::Effects),
            "equipment" => Ok(Column::Equipment),
            "synopsis" => Ok(Column::Synopsis),
            other => Err(format!("unknown column '{other}'")),
        }
    }
}

/// Which columns a table carries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TablePreset {
    /// Scene, number, time, setting, location, characters, objects.
    #[default]
    Basic,
    /// Basic plus sub-location, extras, per-department object columns and
    /// a synopsis.
    Extended,
    Custom(Vec<Column>),
}

const BASIC: &[Column] = &[
    Column::Scene,
    Column::Number,
    Column::Time,
    Column::Setting,
    Column::Location,
    Column::Characters,
    Column::Objects,
];

const EXTENDED_EXTRA: &[Column] = &[
    Column::SubLocation,
    Column::Extras,
    Column::Props,
    Column::Vehicles,
    Column::Effects,
    Column::Equipment,
    Column::Synopsis,
];

impl TablePreset {
    pub fn columns(&self) -> Vec<Column> {
        match self {
            TablePreset::Basic => BASIC.to_vec(),
            TablePreset::Extended => BASIC.iter().chain(EXTENDED_EXTRA).copied().collect(),
            TablePreset::Custom(columns) => columns.clone(),
        }
    }
}

/// Parses `basic`, `extended`, or a comma-separated column list.
impl FromStr for TablePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(TablePreset::Basic),
            "extended" | "full" => Ok(TablePreset::Extended),
            list => list
                .split(',')
                .filter(|c| !c.trim().is_empty())
                .map(Column::from_str)
                .collect::<Result<Vec<_>, _>>()
                .and_then(|columns| {
                    if columns.is_empty() {
                        Err("empty column list".to_string())
                    } else {
                        Ok(TablePreset::Custom(columns))
                    }
                }),
        }
    }
}

/// A flattened breakdown: one row per scene, cells in column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
}

impl BreakdownTable {
    pub fn headers(&self) -> Vec<&'static str> {
        self.columns.iter().map(Column::header).collect()
    }

    /// Render as a GFM table. Pipes inside cells are escaped.
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("| {} |\n", self.headers().join(" | ")));
        out.push('|');
        for _ in &self.columns {
            out.push_str(" --- |");
        }
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
            out.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        out
    }

    /// Render as tab-separated values with a header row.
    pub fn to_tsv(&self) -> String {
        let clean = |s: &str| s.replace(['\t', '\n'], " ");
        let mut out = self.headers().join("\t");
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(|c| clean(c)).collect();
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }
        out
    }

    /// Write as RFC 4180 CSV with a header row. With `excel_bom`, a UTF-8
    /// byte order mark comes first.
    pub fn write_csv<W: io::Write>(&self, mut writer: W, excel_bom: bool) -> csv::Result<()> {
        if excel_bom {
            writer.write_all(UTF8_BOM)?;
        }
        let mut out = csv::WriterBuilder::new()
            .terminator(csv::Terminator::CRLF)
            .from_writer(writer);
        out.write_record(self.headers())?;
        for row in &self.rows {
            out.write_record(row)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Render as CSV without a byte order mark.
    pub fn to_csv(&self) -> csv::Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf, false)?;
        String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e).into())
    }
}

impl fmt::Display for BreakdownTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_markdown())
    }
}

fn synopsis(scene: &Scene) -> String {
    let flat = scene.content().split_whitespace().collect::<Vec<_>>().join(" ");
    flat.chars().take(SYNOPSIS_CHARS).collect()
}

impl BreakdownRecord {
    fn cell(&self, scene: &Scene, column: Column) -> String {
        match column {
            Column::Scene => scene.index.to_string(),
            Column::Number => scene.scene_number.clone().unwrap_or_default(),
            Column::Time => scene.time_of_day.to_string(),
            Column::Setting => scene.setting.as_str().to_string(),
            Column::Location => scene
                .location_id
                .as_ref()
                .and_then(|id| self.entity(id))
                .map(|e| e.name.clone())
                .or_else(|| scene.location.clone())
                .unwrap_or_default(),
            Column::SubLocation => scene.sub_location.clone().unwrap_or_default(),
            Column::Extras => scene
                .extras
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            Column::Characters => self.character_names(scene).join(", "),
            Column::Objects => self.object_names(scene).join(", "),
            Column::Props | Column::Vehicles | Column::Effects | Column::Equipment => scene
                .objects
                .iter()
                .filter_map(|id| self.entity(id))
                .filter(|e| e.category == column.category())
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            Column::Synopsis => synopsis(scene),
        }
    }

    /// Flatten the record into one row per scene.
    pub fn to_table(&self, preset: &TablePreset) -> BreakdownTable {
        let columns = preset.columns();
        let rows = self
            .scenes
            .iter()
            .map(|scene| columns.iter().map(|&c| self.cell(scene, c)).collect())
            .collect();
        BreakdownTable { columns, rows }
    }
}
