//! The cross-record cache that templates consult for `include(...)`, `sample(...)` and
//! `$choices`.
//!
//! Templates only ever read it. It is filled beforehand, either by running "global"
//! templates into it (see [`TemplateWriter`]) or by loading choice lists from a table.
//!
//! [`TemplateWriter`]: crate::TemplateWriter

use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::info;

use crate::table::{Resolver, Table};

/// Choice set that is always available.
pub const YES_NO: &str = "YesNo";

/// What a compiled template needs from the global cache.
pub trait GlobalContext {
    /// All strings stored for `key` under `source`, possibly none.
    fn strings(&self, source: &str, key: &str) -> &[String];

    /// The named choice set, if there is one.
    fn choice_set(&self, name: &str) -> Option<&BTreeSet<String>>;

    fn has_choice_set(&self, name: &str) -> bool {
        self.choice_set(name).is_some()
    }
}

/// In-memory [`GlobalContext`]: source name -> key -> strings, plus the named choice sets.
#[derive(Debug, Clone)]
pub struct Globals {
    cache: BTreeMap<String, HashMap<String, Vec<String>>>,
    choices: HashMap<String, BTreeSet<String>>,
}

impl Default for Globals {
    fn default() -> Self {
        let mut choices = HashMap::new();
        choices.insert(
            YES_NO.to_string(),
            BTreeSet::from(["Yes".to_string(), "No".to_string()]),
        );
        Globals {
            cache: BTreeMap::new(),
            choices,
        }
    }
}

impl Globals {
    pub fn new() -> Self {
        Globals::default()
    }

    /// Append `text` to the strings stored for `key` under `source`.
    pub fn store(&mut self, source: &str, key: &str, text: impl Into<String>) {
        self.cache
            .entry(source.to_string())
            .or_default()
            .entry(key.to_string())
            .or_default()
            .push(text.into());
    }

    /// Move everything stored in `other` into this cache, after what is already here.
    ///
    /// Choice sets in `other` replace those of the same name.
    pub fn merge(&mut self, other: Globals) {
        for (source, keys) in other.cache {
            let target = self.cache.entry(source).or_default();
            for (key, mut strings) in keys {
                target.entry(key).or_default().append(&mut strings);
            }
        }
        self.choices.extend(other.choices);
    }

    pub fn add_choice_set<S: Into<String>>(
        &mut self,
        name: &str,
        members: impl IntoIterator<Item = S>,
    ) {
        let set = members.into_iter().map(Into::into).collect();
        self.choices.insert(name.to_string(), set);
    }

    /// Build one choice set per named field from the non-blank values in `table`.
    ///
    /// Each set is named after its field.
    pub fn read_choice_lists<S: AsRef<str>>(
        &mut self,
        table: &Table,
        fields: &[S],
    ) -> anyhow::Result<()> {
        let indexes = fields
            .iter()
            .map(|field| {
                table.schema.find_field(field.as_ref()).ok_or_else(|| {
                    anyhow::anyhow!(
                        "no column named `{}` in `{}`",
                        field.as_ref(),
                        table.name
                    )
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut sets = vec![BTreeSet::new(); fields.len()];
        for record in table.iter() {
            for (set, &idx) in sets.iter_mut().zip(&indexes) {
                let value = record.get(idx);
                if !value.trim().is_empty() {
                    set.insert(value);
                }
            }
        }

        for (field, set) in fields.iter().zip(sets) {
            info!(
                "{} items added to choice list for {}.",
                set.len(),
                field.as_ref()
            );
            self.choices.insert(field.as_ref().to_string(), set);
        }
        Ok(())
    }
}

impl GlobalContext for Globals {
    fn strings(&self, source: &str, key: &str) -> &[String] {
        self.cache
            .get(source)
            .and_then(|keys| keys.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn choice_set(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.choices.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::table::from_tsv;
    use indoc::indoc;

    #[test]
    fn test_store_and_fetch() {
        let mut globals = Globals::new();
        globals.store("dlits.txt", "key3", "key3 dlit text");
        globals.store("dlits.txt", "key3", "more key3 dlit text");
        globals.store("ilits.txt", "key1", "key1 ilit text");

        assert_eq!(
            globals.strings("dlits.txt", "key3"),
            &["key3 dlit text", "more key3 dlit text"]
        );
        assert!(globals.strings("dlits.txt", "key1").is_empty());
        assert!(globals.strings("nothing.txt", "key1").is_empty());
    }

    #[test]
    fn test_merge() {
        let mut globals = Globals::new();
        globals.store("dlits.txt", "key1", "first");
        globals.add_choice_set("genus", ["Bacillus"]);

        let mut staged = Globals::new();
        staged.store("dlits.txt", "key1", "second");
        staged.store("ilits.txt", "key2", "other");
        globals.merge(staged);

        assert_eq!(globals.strings("dlits.txt", "key1"), &["first", "second"]);
        assert_eq!(globals.strings("ilits.txt", "key2"), &["other"]);
        assert!(globals.has_choice_set("genus"));
        assert!(globals.has_choice_set(YES_NO));
    }

    #[test]
    fn test_yes_no_is_builtin() {
        let globals = Globals::new();
        let set = globals.choice_set(YES_NO).unwrap();

        assert_eq!(set.len(), 2);
        assert!(globals.has_choice_set("YesNo"));
        assert!(!globals.has_choice_set("genus"));
    }

    #[test]
    fn test_read_choice_lists() -> anyhow::Result<()> {
        let input = indoc! {"
            genome\tgenus\tspecies
            g1\tEscherichia\tcoli
            g2\tBacillus\t
            g3\tEscherichia\talbertii
        "};
        let table = from_tsv("simple.tbl".into(), input.as_bytes())?;
        let mut globals = Globals::new();
        globals.read_choice_lists(&table, &["genus", "species"])?;

        let genus: Vec<_> = globals.choice_set("genus").unwrap().iter().collect();
        assert_eq!(genus, ["Bacillus", "Escherichia"]);
        assert_eq!(globals.choice_set("species").unwrap().len(), 2);

        assert!(globals.read_choice_lists(&table, &["strain"]).is_err());
        Ok(())
    }
}
