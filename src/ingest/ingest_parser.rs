use csv::{ReaderBuilder, StringRecord};

use crate::errors::Result;
use crate::ingest::ingest_model::{CanonicalField, ParsedRow, RawRowFields, RowParseError};
use crate::ingest::ingest_profiles::InstitutionProfile;

/// Reads the header row of a delimited file, for profile selection.
/// An empty or headerless file yields an empty header, which no profile
/// matches.
pub fn read_header(content: &str) -> Result<Vec<String>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content.as_bytes());

    let header = reader
        .headers()
        .map(|record| record.iter().map(|field| field.to_string()).collect())
        .unwrap_or_default();
    Ok(header)
}

/// Column indices a profile resolved against one concrete header.
#[derive(Debug, Clone, Copy, Default)]
struct ResolvedColumns {
    date: Option<usize>,
    posted_date: Option<usize>,
    description: Option<usize>,
    amount: Option<usize>,
    debit: Option<usize>,
    credit: Option<usize>,
    source_category: Option<usize>,
}

impl ResolvedColumns {
    fn resolve(profile: &InstitutionProfile, header: &[String]) -> Self {
        ResolvedColumns {
            date: profile.resolve(CanonicalField::Date, header),
            posted_date: profile.resolve(CanonicalField::PostedDate, header),
            description: profile.resolve(CanonicalField::Description, header),
            amount: profile.resolve(CanonicalField::Amount, header),
            debit: profile.resolve(CanonicalField::Debit, header),
            credit: profile.resolve(CanonicalField::Credit, header),
            source_category: profile.resolve(CanonicalField::SourceCategory, header),
        }
    }
}

fn cell(record: &StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|idx| record.get(idx))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Turns raw delimited text into a sequence of loosely-typed field
/// mappings, one per source row, in original order. The parser never
/// fails on a single bad row; malformed records surface as row-level
/// error entries.
pub struct RowParser<'a> {
    profile: &'a InstitutionProfile,
}

impl<'a> RowParser<'a> {
    pub fn new(profile: &'a InstitutionProfile) -> Self {
        RowParser { profile }
    }

    /// Returns a fresh iterator over the file's data rows. Calling this
    /// again restarts from the first row.
    pub fn rows<'c>(&self, content: &'c str) -> Result<RowIter<'c>> {
        // Strict field counts: a record with a column count different from
        // the header surfaces as a row-level error entry, not a tolerated
        // partial row.
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(content.as_bytes());

        let header: Vec<String> = reader
            .headers()
            .map(|record| record.iter().map(|field| field.to_string()).collect())
            .unwrap_or_default();
        let columns = ResolvedColumns::resolve(self.profile, &header);

        Ok(RowIter {
            records: reader.into_records(),
            columns,
            row_number: 0,
        })
    }
}

/// Lazy iterator over parsed rows, 1-based numbering.
pub struct RowIter<'a> {
    records: csv::StringRecordsIntoIter<&'a [u8]>,
    columns: ResolvedColumns,
    row_number: usize,
}

impl Iterator for RowIter<'_> {
    type Item = ParsedRow;

    fn next(&mut self) -> Option<Self::Item> {
        let record = self.records.next()?;
        self.row_number += 1;

        let fields = match record {
            Ok(record) => Ok(RawRowFields {
                date: cell(&record, self.columns.date),
                posted_date: cell(&record, self.columns.posted_date),
                description: cell(&record, self.columns.description),
                amount: cell(&record, self.columns.amount),
                debit: cell(&record, self.columns.debit),
                credit: cell(&record, self.columns.credit),
                source_category: cell(&record, self.columns.source_category),
            }),
            Err(e) => Err(RowParseError::Malformed(e.to_string())),
        };

        Some(ParsedRow {
            row_number: self.row_number,
            fields,
        })
    }
}
