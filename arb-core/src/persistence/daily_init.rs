//! Daily-init file (§6): a text matrix keyed by integer `strategyID`,
//! columns `avgPx, origBaseName1, origBaseName2, ytd1, 2day, ytd2`. Loaded
//! once on start, saved once on stop. A missing row on load is a warning,
//! never a fatal error — the strategy simply starts with defaults.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// One strategy's row in the daily-init matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyInitRow {
    pub avg_px: Decimal,
    pub orig_base_name_1: String,
    pub orig_base_name_2: String,
    pub ytd_1: Decimal,
    pub two_day: Decimal,
    pub ytd_2: Decimal,
}

impl Default for DailyInitRow {
    fn default() -> Self {
        Self {
            avg_px: Decimal::ZERO,
            orig_base_name_1: String::new(),
            orig_base_name_2: String::new(),
            ytd_1: Decimal::ZERO,
            two_day: Decimal::ZERO,
            ytd_2: Decimal::ZERO,
        }
    }
}

/// The whole file: one row per `strategyID`. Iteration order is by
/// ascending id for a stable on-disk rendering.
#[derive(Debug, Clone, Default)]
pub struct DailyInitTable {
    rows: BTreeMap<u64, DailyInitRow>,
}

impl DailyInitTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, strategy_id: u64) -> Option<&DailyInitRow> {
        self.rows.get(&strategy_id)
    }

    /// Row for `strategy_id`, or a logged-default row if one wasn't
    /// present in the file that was loaded (§6: "start with defaults and
    /// log a warning, do not exit").
    pub fn get_or_default(&self, strategy_id: u64) -> DailyInitRow {
        match self.rows.get(&strategy_id) {
            Some(row) => row.clone(),
            None => {
                warn!(strategy_id, "no daily-init row found, starting with defaults");
                DailyInitRow::default()
            }
        }
    }

    pub fn set(&mut self, strategy_id: u64, row: DailyInitRow) {
        self.rows.insert(strategy_id, row);
    }

    pub fn load(path: impl AsRef<Path>) -> io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::parse(&contents))
    }

    pub fn parse(contents: &str) -> Self {
        let mut table = Self::new();
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() != 7 {
                warn!(line_no, line, "malformed daily-init row, skipping");
                continue;
            }
            let strategy_id = match u64::from_str(cols[0]) {
                Ok(id) => id,
                Err(_) => {
                    warn!(line_no, line, "non-integer strategyID, skipping");
                    continue;
                }
            };
            let row = DailyInitRow {
                avg_px: Decimal::from_str(cols[1]).unwrap_or_default(),
                orig_base_name_1: cols[2].to_string(),
                orig_base_name_2: cols[3].to_string(),
                ytd_1: Decimal::from_str(cols[4]).unwrap_or_default(),
                two_day: Decimal::from_str(cols[5]).unwrap_or_default(),
                ytd_2: Decimal::from_str(cols[6]).unwrap_or_default(),
            };
            table.set(strategy_id, row);
        }
        table
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (id, row) in &self.rows {
            out.push_str(&format!(
                "{} {} {} {} {} {} {}\n",
                id, row.avg_px, row.orig_base_name_1, row.orig_base_name_2, row.ytd_1, row.two_day, row.ytd_2
            ));
        }
        out
    }

    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(self.render().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_row_returns_logged_default_not_an_error() {
        let table = DailyInitTable::new();
        let row = table.get_or_default(7);
        assert_eq!(row, DailyInitRow::default());
    }

    #[test]
    fn parse_skips_malformed_lines_and_comments() {
        let text = "# header\n1 100.5 IF IH 10 2 5\nbroken line\n3 50.0 IC IM 0 0 0\n";
        let table = DailyInitTable::parse(text);
        assert!(table.get(1).is_some());
        assert!(table.get(2).is_none());
        assert!(table.get(3).is_some());
    }

    #[test]
    fn round_trips_through_render_and_parse() {
        let mut table = DailyInitTable::new();
        table.set(
            1,
            DailyInitRow {
                avg_px: dec!(123.45),
                orig_base_name_1: "IF2412".to_string(),
                orig_base_name_2: "IH2412".to_string(),
                ytd_1: dec!(10),
                two_day: dec!(-3),
                ytd_2: dec!(5),
            },
        );
        let rendered = table.render();
        let parsed = DailyInitTable::parse(&rendered);
        assert_eq!(parsed.get(1), table.get(1));
    }

    #[test]
    fn round_trips_through_a_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daily_init.txt");
        let mut table = DailyInitTable::new();
        table.set(2, DailyInitRow { avg_px: dec!(99.0), ..Default::default() });
        table.save(&path).unwrap();
        let loaded = DailyInitTable::load(&path).unwrap();
        assert_eq!(loaded.get(2), table.get(2));
    }
}
