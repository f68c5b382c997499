use super::{ExportRecord, OutputGenerator, Table, EXPORT_FIELDS};
use crate::error::Result;

pub struct TextOutput;

impl OutputGenerator for TextOutput {
    fn generate(&self, records: &[ExportRecord]) -> Result<String> {
        let mut table = Table::new(&EXPORT_FIELDS);
        for record in records {
            table.push_row(
                record
                    .cells()
                    .into_iter()
                    .map(|cell| cell.unwrap_or_else(|| "None".to_string()))
                    .collect(),
            );
        }
        Ok(table.render())
    }

    fn file_extension(&self) -> &str {
        "txt"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_has_header_and_one_line_per_record() {
        let record = ExportRecord {
            time: "1970-01-01T00:00:00Z".to_string(),
            event: Some("XR-EXEC".to_string()),
            user: None,
            ip: None,
            path: Some("/bin/sh".to_string()),
            pid: Some(3),
            format: "VLOG".to_string(),
        };
        let text = TextOutput.generate(&[record.clone(), record]).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        for field in EXPORT_FIELDS {
            assert!(lines[0].contains(field));
        }
        assert!(lines[1].contains("XR-EXEC"));
        assert!(lines[1].contains("None"));
        assert_eq!(lines[1].len(), lines[2].len());
    }
}
