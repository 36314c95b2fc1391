//! Spreadsheet export of a saved result file.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use serde_json::{Map, Value};

pub const SHEET_NAME: &str = "Check results";

const HEADERS: [&str; 13] = [
    "Identifier",
    "ID",
    "Username",
    "First name",
    "Last name",
    "Phone",
    "Premium",
    "Verified",
    "Fake",
    "Bot",
    "Last seen",
    "Bio",
    "Profile photos",
];

/// Most recently modified `*.json` in `dir`.
pub fn latest_results_file(dir: &Path) -> anyhow::Result<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("no results to export; run `tgc check` first")
        }
        Err(e) => return Err(e).with_context(|| format!("listing {}", dir.display())),
    };

    let mut newest: Option<(std::time::SystemTime, PathBuf)> = None;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let modified = std::fs::metadata(&path)?.modified()?;
        if newest.as_ref().map_or(true, |(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    match newest {
        Some((_, path)) => Ok(path),
        None => bail!("no results to export; run `tgc check` first"),
    }
}

pub fn load_results(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let txt =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&txt).with_context(|| format!("parsing {}", path.display()))
}

/// One row per identifier. Error entries only fill the identifier and the
/// message (in the ID column).
pub fn write_workbook(results: &Map<String, Value>, output: &Path) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_background_color(Color::RGB(0xDDDDDD));
    for (col, title) in HEADERS.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, *title, &header)?;
    }

    for (idx, (identifier, data)) in results.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, identifier)?;

        if let Some(error) = data.get("error") {
            sheet.write_string(row, 1, text(Some(error)))?;
            continue;
        }

        match data.get("id").and_then(Value::as_i64) {
            Some(id) => sheet.write_number(row, 1, id as f64)?,
            None => sheet.write_string(row, 1, "")?,
        };
        sheet.write_string(row, 2, text(data.get("username")))?;
        sheet.write_string(row, 3, text(data.get("first_name")))?;
        sheet.write_string(row, 4, text(data.get("last_name")))?;
        sheet.write_string(row, 5, text(data.get("phone")))?;
        for (col, key) in [(6, "premium"), (7, "verified"), (8, "fake"), (9, "bot")] {
            sheet.write_string(row, col, yes_no(data.get(key)))?;
        }
        sheet.write_string(row, 10, text(data.get("last_seen")))?;
        sheet.write_string(row, 11, text(data.get("bio")))?;
        let photos = data
            .get("profile_photos")
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        sheet.write_number(row, 12, photos as f64)?;
    }

    sheet.autofit();
    workbook
        .save(output)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn text(v: Option<&Value>) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

fn yes_no(v: Option<&Value>) -> &'static str {
    if v.and_then(Value::as_bool).unwrap_or(false) {
        "Yes"
    } else {
        "No"
    }
}
