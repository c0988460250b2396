use std::io::Write;

use csv::WriterBuilder;

/// Writes report rows as csv, flushing after every row. Rows may differ in length.
pub struct Exporter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> Exporter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: WriterBuilder::new().flexible(true).from_writer(sink),
        }
    }

    pub fn write_row(&mut self, row: &[String]) -> csv::Result<()> {
        self.writer.write_record(row)?;
        self.writer.flush()?;
        Ok(())
    }
}

pub fn write_report<W: Write>(sink: W, rows: &[Vec<String>]) -> csv::Result<()> {
    let mut exporter = Exporter::new(sink);
    for row in rows {
        exporter.write_row(row)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn writes_rows_of_uneven_length() {
        let mut buffer = Vec::new();
        write_report(
            &mut buffer,
            &[
                row(&["Cohort", "Customers", "0-6", "7-13"]),
                row(&["06/19/2015-06/25/2015", "2 customers", "50.00% orderers (1)"]),
                row(&["", "", "50.00% 1st time (1)"]),
            ],
        )
        .expect("write");

        let text = String::from_utf8(buffer).expect("utf8");
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Cohort,Customers,0-6,7-13"));
        assert_eq!(
            lines.next(),
            Some("06/19/2015-06/25/2015,2 customers,50.00% orderers (1)")
        );

        let parsed: Vec<Vec<String>> = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes())
            .records()
            .map(|record| {
                record
                    .expect("record")
                    .iter()
                    .map(str::to_string)
                    .collect()
            })
            .collect();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[2], vec!["", "", "50.00% 1st time (1)"]);
    }
}
