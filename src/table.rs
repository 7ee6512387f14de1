use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::slice::Iter;

use anyhow::Context;
use csv::{ReaderBuilder, StringRecord};
use serde_json::Value as Json;

/// Separates the elements of a multi-valued field when it is stored as a single string.
pub const DELIM: &str = "::";

/// Values are just Strings. A field holds an ordered list of them.
pub type Value = String;

/// Anything that can turn a field name into a stable column index.
///
/// The template compiler binds every column name through this once, so evaluation
/// never touches names again.
pub trait Resolver {
    fn find_field(&self, name: &str) -> Option<usize>;
}

/// The ordered field names of a [table].
///
/// Names are stored lower-cased. A requested name matches a field if the two are
/// equal ignoring case, or if the field is qualified and ends with `.name`, so
/// `genome.genome_id` is found by asking for `genome_id`.
///
/// [table]: Table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<String>,
}

impl Schema {
    pub fn new<S: AsRef<str>>(fields: impl IntoIterator<Item = S>) -> Self {
        let mut schema = Schema::default();
        for field in fields {
            schema.add_field(field.as_ref());
        }
        schema
    }

    /// Add a field and return its index. An existing field keeps its index.
    pub fn add_field(&mut self, name: &str) -> usize {
        let normalized = name.to_lowercase();
        match self.fields.iter().position(|f| *f == normalized) {
            Some(idx) => idx,
            None => {
                self.fields.push(normalized);
                self.fields.len() - 1
            }
        }
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }

    pub fn names(&self) -> Iter<'_, String> {
        self.fields.iter()
    }
}

impl Resolver for Schema {
    fn find_field(&self, name: &str) -> Option<usize> {
        let wanted = name.to_lowercase();
        let qualified = format!(".{wanted}");
        self.fields
            .iter()
            .position(|field| *field == wanted || field.ends_with(&qualified))
    }
}

/// A Record is one row of input: an ordered list of fields, each of which is a list of [value]s.
///
/// A scalar is a singleton list and an absent value is an empty list.
///
/// [value]: Value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<Vec<Value>>,
}

impl Record {
    /// A record of `width` empty fields.
    pub fn empty(width: usize) -> Self {
        Record {
            fields: vec![Vec::new(); width],
        }
    }

    /// Build a record from raw cells. Blank cells are empty, the rest are split on [`DELIM`].
    pub fn from_cells<S: AsRef<str>>(cells: impl IntoIterator<Item = S>) -> Self {
        let fields = cells
            .into_iter()
            .map(|cell| split_cell(cell.as_ref()))
            .collect();
        Record { fields }
    }

    /// The field as a scalar: the elements joined with [`DELIM`], or empty.
    pub fn get(&self, idx: usize) -> String {
        self.get_list(idx).join(DELIM)
    }

    /// The field as a list. Columns past the end of a short row are empty.
    pub fn get_list(&self, idx: usize) -> &[Value] {
        self.fields.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The field interpreted as a boolean, see [`analyze_boolean`].
    pub fn get_flag(&self, idx: usize) -> bool {
        analyze_boolean(self.get_list(idx))
    }

    pub fn set_list(&mut self, idx: usize, values: Vec<Value>) {
        if idx >= self.fields.len() {
            self.fields.resize(idx + 1, Vec::new());
        }
        self.fields[idx] = values;
    }

    /// Make sure the record has at least `width` fields.
    pub fn pad(&mut self, width: usize) {
        if self.fields.len() < width {
            self.fields.resize(width, Vec::new());
        }
    }

    pub fn width(&self) -> usize {
        self.fields.len()
    }
}

fn split_cell(cell: &str) -> Vec<Value> {
    if cell.trim().is_empty() {
        Vec::new()
    } else {
        cell.split(DELIM)
            .filter(|piece| !piece.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Interpret a list of strings as TRUE or FALSE.
///
/// Empty lists are false and lists of more than one element are true. A single element is
/// false if it is blank or reads as a false word (`n`, `no`, `0`, `f`, `false`, any case).
pub fn analyze_boolean(values: &[Value]) -> bool {
    match values {
        [] => false,
        [text] => {
            if text.trim().is_empty() {
                false
            } else {
                !matches!(
                    text.to_lowercase().as_str(),
                    "n" | "no" | "0" | "f" | "false"
                )
            }
        }
        _ => true,
    }
}

/// A named set of records sharing one [`Schema`].
#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub schema: Schema,
    pub records: Vec<Record>,
}

impl Table {
    pub fn new(name: String, schema: Schema, records: Vec<Record>) -> Self {
        Table {
            name,
            schema,
            records,
        }
    }

    /// Open a table, choosing the format from the file extension.
    ///
    /// `.txt`, `.tbl`, `.tab` and `.tsv` are tab-delimited with a header line, `.json` is a
    /// list of objects. The table is named after the file name.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let name = path
            .file_name()
            .map(|os_str| os_str.to_string_lossy().into_owned())
            .ok_or_else(|| anyhow::anyhow!("path `{}` has no file name", path.display()))?;
        let ext = path
            .extension()
            .map(|os_str| os_str.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let file = File::open(path).with_context(|| format!("opening `{}`", path.display()))?;
        let reader = BufReader::new(file);

        let table = match ext.as_str() {
            "txt" | "tbl" | "tab" | "tsv" => from_tsv(name, reader),
            "json" => from_json(name, reader),
            _ => anyhow::bail!(
                "file `{}` is not a recognized field-input file type",
                path.display()
            ),
        };
        table.with_context(|| format!("reading `{}`", path.display()))
    }

    pub fn iter(&self) -> Iter<'_, Record> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read a tab-delimited file whose first line names the fields.
pub fn from_tsv<R: io::Read>(name: String, reader: R) -> anyhow::Result<Table> {
    let mut tsv = ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let schema = Schema::new(tsv.headers()?.iter());

    let map_record = |result: Result<StringRecord, csv::Error>| {
        result.map(|row| {
            let mut record = Record::from_cells(row.iter());
            record.pad(schema.width());
            record
        })
    };

    let records = tsv
        .records()
        .map(map_record)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Table::new(name, schema, records))
}

/// Read a JSON list of flat objects.
///
/// Field values may be strings, numbers, booleans, null, or lists of those. Field names are
/// collected in order of first appearance across all the objects.
pub fn from_json<R: io::Read>(name: String, reader: R) -> anyhow::Result<Table> {
    let parsed: Json = serde_json::from_reader(reader)?;
    let Json::Array(objects) = parsed else {
        anyhow::bail!("JSON field input does not begin with a list");
    };

    let mut schema = Schema::default();
    let mut rows = Vec::with_capacity(objects.len());
    for (n, object) in objects.into_iter().enumerate() {
        let Json::Object(map) = object else {
            anyhow::bail!("JSON record {n} is not an object");
        };
        let mut row = Vec::with_capacity(map.len());
        for (key, value) in map {
            let values = json_values(&value)
                .with_context(|| format!("field `{key}` of JSON record {n}"))?;
            row.push((schema.add_field(&key), values));
        }
        rows.push(row);
    }

    let records = rows
        .into_iter()
        .map(|row| {
            let mut record = Record::empty(schema.width());
            for (idx, values) in row {
                record.set_list(idx, values);
            }
            record
        })
        .collect();

    Ok(Table::new(name, schema, records))
}

fn json_values(value: &Json) -> anyhow::Result<Vec<Value>> {
    match value {
        Json::Array(items) => items
            .iter()
            .map(json_scalar)
            .filter_map(Result::transpose)
            .collect(),
        other => Ok(json_scalar(other)?.into_iter().collect()),
    }
}

fn json_scalar(value: &Json) -> anyhow::Result<Option<Value>> {
    match value {
        Json::Null => Ok(None),
        Json::String(s) if s.trim().is_empty() => Ok(None),
        Json::String(s) => Ok(Some(s.clone())),
        Json::Number(n) => Ok(Some(n.to_string())),
        Json::Bool(b) => Ok(Some(b.to_string())),
        Json::Array(_) | Json::Object(_) => anyhow::bail!("nested JSON values are not supported"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use indoc::indoc;

    #[test]
    fn test_find_field() {
        let schema = Schema::new(["genome.genome_id", "Name", "host_name"]);

        assert_eq!(schema.find_field("genome_id"), Some(0));
        assert_eq!(schema.find_field("genome.genome_id"), Some(0));
        assert_eq!(schema.find_field("name"), Some(1));
        assert_eq!(schema.find_field("NAME"), Some(1));
        assert_eq!(schema.find_field("host"), None);
    }

    #[test]
    fn test_boolean_words() {
        let flag = |s: &str| analyze_boolean(&[s.to_string()]);

        assert!(flag("1"));
        assert!(flag("true"));
        assert!(flag("anything"));
        assert!(!flag(""));
        assert!(!flag("  "));
        assert!(!flag("No"));
        assert!(!flag("N"));
        assert!(!flag("0"));
        assert!(!flag("F"));
        assert!(!flag("FALSE"));
        assert!(!analyze_boolean(&[]));
        assert!(analyze_boolean(&["no".to_string(), "0".to_string()]));
    }

    #[test]
    fn test_record_cells() {
        let record = Record::from_cells(["a", "", "x::y::z", " "]);

        assert_eq!(record.get(0), "a");
        assert_eq!(record.get_list(1), &[] as &[String]);
        assert_eq!(record.get_list(2), &["x", "y", "z"]);
        assert_eq!(record.get(2), "x::y::z");
        assert!(!record.get_flag(3));
        assert_eq!(record.get(10), "");
    }

    #[test]
    fn test_from_tsv() -> anyhow::Result<()> {
        let input = indoc! {"
            id\tname\tlist
            1\tfirst\ta::b
            2\tsecond
        "};
        let table = from_tsv("test.tbl".into(), input.as_bytes())?;

        assert_eq!(table.len(), 2);
        assert_eq!(table.schema.find_field("list"), Some(2));
        assert_eq!(table.records[0].get_list(2), &["a", "b"]);
        assert_eq!(table.records[1].get(1), "second");
        assert_eq!(table.records[1].width(), 3);
        assert_eq!(table.records[1].get_list(2), &[] as &[String]);
        Ok(())
    }

    #[test]
    fn test_from_json() -> anyhow::Result<()> {
        let input = indoc! {r#"
            [
                { "id": "fig|1.1.peg.1", "segments": ["a", "b"], "length": 120 },
                { "id": "fig|1.1.peg.2", "accession": "NC_1", "length": null }
            ]
        "#};
        let table = from_json("features.json".into(), input.as_bytes())?;

        let accession = table.schema.find_field("accession").unwrap();
        let length = table.schema.find_field("length").unwrap();
        let segments = table.schema.find_field("segments").unwrap();
        assert_eq!(table.schema.width(), 4);
        assert_eq!(table.records[0].get_list(segments), &["a", "b"]);
        assert_eq!(table.records[0].get(length), "120");
        assert_eq!(table.records[0].get(accession), "");
        assert_eq!(table.records[1].get(accession), "NC_1");
        assert!(!table.records[1].get_flag(length));
        Ok(())
    }

    #[test]
    fn test_from_json_rejects_nesting() {
        let input = r#"[{ "id": { "inner": 1 } }]"#;
        assert!(from_json("bad.json".into(), input.as_bytes()).is_err());
    }
}
