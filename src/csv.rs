use crate::{PrepError, Result};

/// A csv file with a header line.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvTable {
    header: Vec<String>,
    rows: Vec<CsvRow>,
}

/// A data line, remembering the line it started at for error reporting.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRow {
    pub line: usize,
    pub fields: Vec<String>,
}

impl CsvTable {
    /// Parses csv text.
    ///
    /// Fields may be quoted with `"`, quoted fields may hold separators, line breaks and
    /// doubled `""` quotes. Blank lines are skipped.
    ///
    /// # Arguments
    /// * `text` - The whole file, header line first.
    ///
    /// # Returns
    /// The table or an error if a quote is left open or a row has the wrong field count.
    pub fn parse(text: &str) -> Result<Self> {
        let mut records = split_records(text)?.into_iter();
        let header = records
            .next()
            .map(|row| row.fields)
            .ok_or_else(|| PrepError::Empty("csv header".into()))?;

        let rows = records
            .map(|row| {
                if row.fields.len() != header.len() {
                    return Err(PrepError::Csv {
                        line: row.line,
                        msg: format!("expected {} fields, got {}", header.len(), row.fields.len()),
                    });
                }
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { header, rows })
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[CsvRow] {
        &self.rows
    }

    /// The position of the column named `name`.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.header
            .iter()
            .position(|column| column == name)
            .ok_or_else(|| PrepError::MissingColumn(name.to_string()))
    }
}

fn split_records(text: &str) -> Result<Vec<CsvRow>> {
    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut line = 1;
    let mut start = 1;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match (quoted, c) {
            (true, '"') if chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            (true, '"') => quoted = false,
            (true, c) => {
                if c == '\n' {
                    line += 1;
                }
                field.push(c);
            }
            (false, '"') if field.is_empty() => quoted = true,
            (false, ',') => fields.push(std::mem::take(&mut field)),
            (false, '\r') if chars.peek() == Some(&'\n') => {}
            (false, '\n') => {
                fields.push(std::mem::take(&mut field));
                push_record(&mut records, std::mem::take(&mut fields), start);
                line += 1;
                start = line;
            }
            (false, c) => field.push(c),
        }
    }

    if quoted {
        return Err(PrepError::Csv {
            line: start,
            msg: "unterminated quoted field".into(),
        });
    }

    fields.push(field);
    push_record(&mut records, fields, start);
    Ok(records)
}

fn push_record(records: &mut Vec<CsvRow>, fields: Vec<String>, line: usize) {
    let blank = fields.len() == 1 && fields[0].trim().is_empty();
    if !blank {
        records.push(CsvRow { line, fields });
    }
}
