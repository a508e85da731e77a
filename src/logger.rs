//! 測定値のCSVファイルへの記録．

use crate::{SensorError, Wrench};
use chrono::{DateTime, TimeZone};
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// 1行目に書く単位の説明．
const UNITS_LINE: &str = "# time: RFC 3339, force: N, torque: N*mm";
/// 2行目に書く列名．
const COLUMNS: [&str; 7] = ["time", "Fx", "Fy", "Fz", "Tx", "Ty", "Tz"];

/// 時刻とレンチを1行ずつCSVファイルへ追記する．
///
/// ファイルは最初の書き込みのときに開く．
/// ファイルが空であれば，先頭に単位の説明と列名の2行を書く．
pub struct WrenchLog {
    path: PathBuf,
    writer: Option<csv::Writer<File>>,
}

impl WrenchLog {
    pub fn new(path: impl Into<PathBuf>) -> WrenchLog {
        WrenchLog {
            path: path.into(),
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 1レコードを追記する．
    pub fn append<Tz>(&mut self, time: &DateTime<Tz>, wrench: &Wrench) -> Result<(), SensorError>
    where
        Tz: TimeZone,
        Tz::Offset: Display,
    {
        if self.writer.is_none() {
            self.writer = Some(open_log(&self.path)?);
        }

        if let Some(writer) = self.writer.as_mut() {
            let mut record = Vec::with_capacity(COLUMNS.len());
            record.push(time.to_rfc3339());
            record.extend(wrench.to_array().iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
            writer.flush()?;
        }
        Ok(())
    }
}

fn open_log(path: &Path) -> Result<csv::Writer<File>, SensorError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    let is_empty = file.metadata()?.len() == 0;
    if is_empty {
        writeln!(file, "{}", UNITS_LINE)?;
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);
    if is_empty {
        writer.write_record(COLUMNS)?;
    }
    Ok(writer)
}
