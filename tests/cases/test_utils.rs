use poplines::{from_json, from_tsv, pop, Globals, LineTemplate, PrintWriter, Resolver, Table};

/// One markdown case file: a template, the records to apply it to and the expected output.
///
/// Optional `globals` records (fields `source`, `key`, `text`) are stored in the global cache
/// before compiling, and an optional `choices` table turns each of its columns into a choice
/// list.
pub struct TestCase {
    pub template: String,
    pub expected: String,
    pub records: Table,
    pub globals: Globals,
}

impl TestCase {
    pub fn run(self) -> anyhow::Result<()> {
        let mut template =
            LineTemplate::compile(&self.template, &self.records.schema, &self.globals)?
                .with_seed(12345);
        let mut writer = PrintWriter::new(Vec::new());
        pop(&mut template, &self.records, None, &mut writer)?;
        let actual = String::from_utf8(writer.into_inner())?;

        assert_eq!(self.expected, actual);
        Ok(())
    }
}

pub use parsing::test_case as parse_test_case;

mod parsing {
    use super::*;
    use anyhow::Context;

    /// Every `name:` line followed by a fenced code block, in order.
    ///
    /// Code block contents keep their trailing `\n`.
    pub fn named_code_blocks(input: &str) -> anyhow::Result<Vec<(String, String)>> {
        let mut blocks = Vec::new();
        let mut lines = input.lines();
        while let Some(line) = lines.next() {
            let Some(name) = line.trim().strip_suffix(':') else {
                continue;
            };
            let fence = lines
                .by_ref()
                .find(|line| !line.trim().is_empty())
                .with_context(|| format!("block `{name}` has no code fence"))?;
            anyhow::ensure!(fence.starts_with("```"), "block `{name}` has no code fence");

            let mut content = String::new();
            loop {
                let line = lines
                    .next()
                    .with_context(|| format!("block `{name}` is not closed"))?;
                if line.starts_with("```") {
                    break;
                }
                content.push_str(line);
                content.push('\n');
            }
            blocks.push((name.to_string(), content));
        }
        Ok(blocks)
    }

    fn table(name: &str, content: &str) -> anyhow::Result<Table> {
        if content.trim_start().starts_with('[') {
            from_json(name.into(), content.as_bytes())
        } else {
            from_tsv(name.into(), content.as_bytes())
        }
    }

    pub fn test_case(input: &str) -> anyhow::Result<TestCase> {
        let blocks = named_code_blocks(input)?;
        let block = |name: &str| {
            blocks
                .iter()
                .find(|(block_name, _)| block_name == name)
                .map(|(_, content)| content.as_str())
        };

        let template = block("template").context("missing template block")?;
        let expected = block("output").context("missing output block")?;
        let records = table("records", block("records").context("missing records block")?)?;

        let mut globals = Globals::new();
        if let Some(content) = block("globals") {
            let stored = table("globals", content)?;
            let field = |name| {
                stored
                    .schema
                    .find_field(name)
                    .context("globals needs source, key and text")
            };
            let (source, key, text) = (field("source")?, field("key")?, field("text")?);
            for record in stored.iter() {
                globals.store(&record.get(source), &record.get(key), record.get(text));
            }
        }
        if let Some(content) = block("choices") {
            let choices = table("choices", content)?;
            let fields: Vec<String> = choices.schema.names().cloned().collect();
            globals.read_choice_lists(&choices, &fields)?;
        }

        Ok(TestCase {
            template: template.trim_end_matches('\n').to_string(),
            expected: expected.to_string(),
            records,
            globals,
        })
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use indoc::indoc;

        #[test]
        fn test_named_code_blocks() -> anyhow::Result<()> {
            let input = indoc! {"
                # A heading

                template:

                ```
                Hello {{name}}
                ```

                output:
                ```
                Hello world
                ```
            "};
            let blocks = named_code_blocks(input)?;

            assert_eq!(
                blocks,
                [
                    ("template".to_string(), "Hello {{name}}\n".to_string()),
                    ("output".to_string(), "Hello world\n".to_string()),
                ]
            );
            Ok(())
        }
    }
}
