mod command;
mod error;
mod eval;
mod expr;
mod globals;
mod table;
mod template;
mod writer;

pub use command::{
    conjunct, describe_product, feature_type_phrase, prefix_article, Answer, Clause, Command,
    Conjunction, Group, JsonKind,
};
pub use error::{CompileError, MapperError, TemplateError};
pub use eval::{Eval, FidMapper};
pub use expr::{FieldExpr, Function};
pub use globals::{GlobalContext, Globals, YES_NO};
pub use table::{analyze_boolean, from_json, from_tsv, Record, Resolver, Schema, Table, DELIM};
pub use template::LineTemplate;
pub use writer::{PrintWriter, TemplateWriter};

use anyhow::Context as AnyhowContext;
use tracing::debug;

/// Apply a compiled template to every record of `table` and send the text to `writer`.
///
/// Each piece of text is keyed by the record's value in `key_field`, or by its position in
/// the table when there is no key field. Returns the number of records processed.
pub fn pop(
    template: &mut LineTemplate,
    table: &Table,
    key_field: Option<&str>,
    writer: &mut dyn TemplateWriter,
) -> anyhow::Result<usize> {
    let key_col = key_field
        .map(|name| {
            table
                .schema
                .find_field(name)
                .with_context(|| format!("no key column named `{name}` in `{}`", table.name))
        })
        .transpose()?;

    for (n, record) in table.iter().enumerate() {
        let key = match key_col {
            Some(col) => record.get(col),
            None => n.to_string(),
        };
        let text = template.apply(record);
        writer
            .write(&table.name, &key, &text)
            .with_context(|| format!("writing output for record {n} of `{}`", table.name))?;
    }

    debug!("{} records processed from {}.", table.len(), table.name);
    Ok(table.len())
}
