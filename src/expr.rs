use crate::eval::Eval;
use crate::table::{Record, DELIM};

pub(crate) use parsing::{column, compile};

mod parsing;

/// A compiled query over a [`Record`].
///
/// Field expressions appear inside `{{...}}` and as the parameters of most commands.
/// The simplest is a bare column name. The rest are one-level function calls whose
/// arguments are plain strings:
///
/// ```text
/// {{genome_name}}
/// {{$if:include(dlits.txt, key)}}
/// {{$list:sample(genus, 4)}}
/// {{$if:eq(type, CDS)}}
/// {{$if:singleton(aliases)}}
/// ```
///
/// Every expression can be read three ways: as a boolean ([`eval`]), as a scalar string
/// ([`get`]) and as a list ([`get_list`]). The three always agree; see each variant for the
/// exact projection.
///
/// [`eval`]: FieldExpr::eval
/// [`get`]: FieldExpr::get
/// [`get_list`]: FieldExpr::get_list
#[derive(Debug, Clone, PartialEq)]
pub enum FieldExpr {
    /// A column. True unless empty, blank or a false word; see [`analyze_boolean`].
    ///
    /// [`analyze_boolean`]: crate::table::analyze_boolean
    Reference { name: String, col: usize },

    /// `include(source, column)`: the global strings stored under `source` for this
    /// record's value of `column`. True if any of them is non-blank.
    Include {
        source: String,
        key_name: String,
        key_col: usize,
    },

    /// `sample(set, count)`: `count` random distinct members of a choice set.
    /// True if the set is non-empty.
    Sample { set: String, count: usize },

    /// `eq(column, value)`: true if the column is exactly `value`. Reads as `"1"` or nothing.
    Eq { col: usize, value: String },

    /// `singleton(column)`: true if the column holds exactly one element. Reads as the
    /// first element.
    Singleton { col: usize },
}

/// The closed set of functions a field expression may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Include,
    Sample,
    Eq,
    Singleton,
}

impl Function {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "include" => Some(Function::Include),
            "sample" => Some(Function::Sample),
            "eq" => Some(Function::Eq),
            "singleton" => Some(Function::Singleton),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Include => "include",
            Function::Sample => "sample",
            Function::Eq => "eq",
            Function::Singleton => "singleton",
        }
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Singleton => 1,
            Function::Include | Function::Sample | Function::Eq => 2,
        }
    }
}

impl FieldExpr {
    pub fn eval(&self, record: &Record, ctx: &mut Eval) -> bool {
        match self {
            FieldExpr::Reference { col, .. } => record.get_flag(*col),
            FieldExpr::Include { .. } => self
                .get_list(record, ctx)
                .iter()
                .any(|value| !value.trim().is_empty()),
            FieldExpr::Sample { set, count } => {
                *count > 0
                    && ctx
                        .globals()
                        .choice_set(set)
                        .is_some_and(|members| !members.is_empty())
            }
            FieldExpr::Eq { col, value } => record.get(*col) == *value,
            FieldExpr::Singleton { col } => record.get_list(*col).len() == 1,
        }
    }

    pub fn get(&self, record: &Record, ctx: &mut Eval) -> String {
        match self {
            FieldExpr::Reference { col, .. } => record.get(*col),
            FieldExpr::Include { .. } => self.get_list(record, ctx).join(DELIM),
            FieldExpr::Sample { set, count } => ctx.sample(set, *count).join(", "),
            FieldExpr::Eq { .. } => {
                if self.eval(record, ctx) {
                    "1".to_string()
                } else {
                    String::new()
                }
            }
            FieldExpr::Singleton { col } => {
                record.get_list(*col).first().cloned().unwrap_or_default()
            }
        }
    }

    pub fn get_list(&self, record: &Record, ctx: &mut Eval) -> Vec<String> {
        match self {
            FieldExpr::Reference { col, .. } => record.get_list(*col).to_vec(),
            FieldExpr::Include {
                source, key_col, ..
            } => ctx
                .globals()
                .strings(source, &record.get(*key_col))
                .to_vec(),
            FieldExpr::Sample { set, count } => ctx.sample(set, *count),
            FieldExpr::Eq { .. } => {
                if self.eval(record, ctx) {
                    vec!["1".to_string()]
                } else {
                    Vec::new()
                }
            }
            FieldExpr::Singleton { col } => record.get_list(*col).iter().take(1).cloned().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::globals::Globals;
    use crate::table::Schema;

    fn schema() -> Schema {
        Schema::new(["key", "flag", "aliases", "type"])
    }

    fn record(cells: [&str; 4]) -> Record {
        Record::from_cells(cells)
    }

    /// Evaluate all three views of `text` against `record`.
    fn views(text: &str, globals: &Globals, record: &Record) -> (bool, String, Vec<String>) {
        let expr = compile(text, &schema(), globals).unwrap();
        let mut rng = StdRng::seed_from_u64(100);
        let mut mapper = None;
        let mut ctx = Eval::new(globals, &mut rng, &mut mapper);
        (
            expr.eval(record, &mut ctx),
            expr.get(record, &mut ctx),
            expr.get_list(record, &mut ctx),
        )
    }

    #[test]
    fn test_reference_views() {
        let globals = Globals::new();

        let (flag, scalar, list) = views("aliases", &globals, &record(["k", "", "a::b", ""]));
        assert!(flag);
        assert_eq!(scalar, "a::b");
        assert_eq!(list, ["a", "b"]);

        let (flag, scalar, list) = views("flag", &globals, &record(["k", "No", "", ""]));
        assert!(!flag);
        assert_eq!(scalar, "No");
        assert_eq!(list, ["No"]);

        let (flag, scalar, list) = views("flag", &globals, &record(["k", "", "", ""]));
        assert!(!flag);
        assert_eq!(scalar, "");
        assert!(list.is_empty());
    }

    #[test]
    fn test_include_views() {
        let mut globals = Globals::new();
        globals.store("dlits.txt", "key2", "key2 dlit text");
        globals.store("dlits.txt", "key2", "more key2 dlit text");
        globals.store("blank.txt", "key2", " ");

        let line = record(["key2", "", "", ""]);
        let (flag, scalar, list) = views("include(dlits.txt, key)", &globals, &line);
        assert!(flag);
        assert_eq!(scalar, "key2 dlit text::more key2 dlit text");
        assert_eq!(list.len(), 2);

        let (flag, _, list) = views("include(blank.txt, key)", &globals, &line);
        assert!(!flag);
        assert_eq!(list.len(), 1);

        let (flag, scalar, _) = views(
            "include(dlits.txt, key)",
            &globals,
            &record(["key9", "", "", ""]),
        );
        assert!(!flag);
        assert_eq!(scalar, "");
    }

    #[test]
    fn test_eq_views() {
        let globals = Globals::new();

        let (flag, scalar, list) = views("eq(type, CDS)", &globals, &record(["k", "", "", "CDS"]));
        assert!(flag);
        assert_eq!(scalar, "1");
        assert_eq!(list, ["1"]);

        let (flag, scalar, list) = views("eq(type, CDS)", &globals, &record(["k", "", "", "rRNA"]));
        assert!(!flag);
        assert_eq!(scalar, "");
        assert!(list.is_empty());
    }

    #[test]
    fn test_singleton_views() {
        let globals = Globals::new();

        let (flag, scalar, list) =
            views("singleton(aliases)", &globals, &record(["k", "", "x", ""]));
        assert!(flag);
        assert_eq!(scalar, "x");
        assert_eq!(list, ["x"]);

        let (flag, scalar, list) =
            views("singleton(aliases)", &globals, &record(["k", "", "x::y", ""]));
        assert!(!flag);
        assert_eq!(scalar, "x");
        assert_eq!(list, ["x"]);

        let (flag, scalar, list) =
            views("singleton(aliases)", &globals, &record(["k", "", "", ""]));
        assert!(!flag);
        assert_eq!(scalar, "");
        assert!(list.is_empty());
    }

    #[test]
    fn test_sample_views() {
        let mut globals = Globals::new();
        globals.add_choice_set("genus", ["Bacillus", "Escherichia", "Listeria"]);
        globals.add_choice_set("empty", Vec::<String>::new());
        let line = record(["k", "", "", ""]);

        let (flag, scalar, list) = views("sample(genus, 2)", &globals, &line);
        assert!(flag);
        assert_eq!(scalar.split(", ").count(), 2);
        assert_eq!(list.len(), 2);

        let (flag, _, list) = views("sample(empty, 2)", &globals, &line);
        assert!(!flag);
        assert!(list.is_empty());
    }
}
