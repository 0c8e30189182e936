//! Exemplar catalog parsing.
//!
//! The catalog is a CSV table with header
//! `id,region,feature,ul_lat,ul_lon,lr_lat,lr_lon,tiles`. Column order is free;
//! extra columns are ignored. Rows whose `id` starts with `#` are comments.
//! `tiles` is a comma- or semicolon-separated list and usually needs quoting
//! when commas are used.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{ExemplarError, Result};
use crate::geo::Bounds;

pub const REQUIRED_COLUMNS: [&str; 8] = [
    "id", "region", "feature", "ul_lat", "ul_lon", "lr_lat", "lr_lon", "tiles",
];

/// One catalog row. `bounds` is normalized at parse time.
#[derive(Debug, Clone, PartialEq)]
pub struct ExemplarRecord {
    pub id: String,
    pub region: String,
    pub feature: String,
    pub bounds: Bounds,
    pub tiles: Vec<String>,
}

pub fn parse_catalog(path: &Path) -> Result<Vec<ExemplarRecord>> {
    let text = fs::read_to_string(path).map_err(|e| ExemplarError::io(path, e))?;
    parse_catalog_str(&text)
}

pub fn parse_catalog_str(text: &str) -> Result<Vec<ExemplarRecord>> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    let header = lines
        .next()
        .ok_or_else(|| ExemplarError::Configuration("catalog is empty".to_string()))?;
    let columns: HashMap<String, usize> = split_csv_line(header)
        .into_iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_string(), i))
        .collect();

    let mut missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        missing.sort_unstable();
        return Err(ExemplarError::Configuration(format!(
            "catalog is missing required columns: {}",
            missing.join(", ")
        )));
    }

    let mut records = Vec::new();
    for line in lines {
        let fields = split_csv_line(line);
        let field = |name: &str| column(&columns, &fields, name).to_string();

        let id = field("id");
        if id.starts_with('#') {
            continue;
        }

        let tiles = split_tiles(&field("tiles"));
        if tiles.is_empty() {
            return Err(ExemplarError::Configuration(format!(
                "catalog row {id} does not define any tiles"
            )));
        }

        let coord = |name: &str| -> Result<f64> {
            let raw = column(&columns, &fields, name);
            raw.parse::<f64>().map_err(|_| {
                ExemplarError::Configuration(format!("catalog row {id}: column {name} is not a number: '{raw}'"))
            })
        };
        let bounds = Bounds::from_corners(
            coord("ul_lat")?,
            coord("ul_lon")?,
            coord("lr_lat")?,
            coord("lr_lon")?,
        );

        records.push(ExemplarRecord {
            id,
            region: field("region"),
            feature: field("feature"),
            bounds,
            tiles,
        });
    }
    Ok(records)
}

fn column<'a>(columns: &HashMap<String, usize>, fields: &'a [String], name: &str) -> &'a str {
    columns
        .get(name)
        .and_then(|&i| fields.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

/// Split a tile list on `,` or `;`, trimming and dropping empty tokens.
pub fn split_tiles(field: &str) -> Vec<String> {
    field
        .split([',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Minimal RFC 4180 field splitter: `"` quotes a field, `""` escapes a quote.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.trim_end_matches('\r').chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields
}
