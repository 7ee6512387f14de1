//! The operations a compiled template is built from.
//!
//! A compiled template is a tree of [`Command`]s rooted at a [`Command::Block`]. Each node
//! renders itself against one record by appending to an output buffer, see [`Command::pop`].
//! Constructing a node checks its parameters, so evaluation itself cannot fail.

use serde_json::Value as Json;

use crate::error::TemplateError;
use crate::eval::Eval;
use crate::expr::{self, FieldExpr};
use crate::globals::GlobalContext;
use crate::table::{Record, Resolver};

pub use product::{describe_product, feature_type_phrase, prefix_article};

mod product;

const COLUMN_LEN: usize = 20;
const LIST_LEN: usize = 40;
const PRODUCT_LEN: usize = 40;

/// Join phrases into an English list.
///
/// One phrase stands alone, two are joined by the conjunction, and longer lists are
/// comma-separated with the conjunction before the last phrase. The conjunction `nl` puts
/// each phrase on its own line instead.
///
/// ```
/// use poplines::conjunct;
///
/// assert_eq!(conjunct("and", &["a", "b", "c"]), "a, b, and c");
/// assert_eq!(conjunct("or", &["a", "b"]), "a or b");
/// assert_eq!(conjunct("nl", &["a", "b"]), "a\nb");
/// ```
pub fn conjunct<S: AsRef<str>>(conjunction: &str, phrases: &[S]) -> String {
    if conjunction == "nl" {
        return join(phrases, "\n");
    }
    match phrases {
        [] => String::new(),
        [only] => only.as_ref().to_string(),
        [first, second] => format!("{} {conjunction} {}", first.as_ref(), second.as_ref()),
        [init @ .., last] => {
            let mut text = String::new();
            for phrase in init {
                text.push_str(phrase.as_ref());
                text.push_str(", ");
            }
            text.push_str(conjunction);
            text.push(' ');
            text.push_str(last.as_ref());
            text
        }
    }
}

fn join<S: AsRef<str>>(phrases: &[S], separator: &str) -> String {
    phrases
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<&str>>()
        .join(separator)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Literal(String),
    Block(Vec<Command>),
    Column(FieldExpr),

    /// Renders `then_block` if every condition is true, otherwise `else_block` (if any).
    If {
        conditions: Vec<FieldExpr>,
        then_block: Box<Command>,
        else_block: Option<Box<Command>>,
    },

    Group(Group),

    /// Conjuncts a list field. With a separator, the scalar view is split on it instead.
    List {
        expr: FieldExpr,
        conjunction: String,
        separator: Option<String>,
        quoted: bool,
    },

    /// Chooses between a singular and a plural word by the length of a list field.
    NumWord {
        expr: FieldExpr,
        singular: String,
        plural: String,
        separator: Option<String>,
    },

    /// A one-member JSON object.
    Json {
        kind: JsonKind,
        tag: String,
        expr: FieldExpr,
    },

    /// A multiple-choice answer list drawn from a choice set.
    Choice {
        set: String,
        answer: Answer,
        count: usize,
    },

    Strand(usize),

    /// Picks a word by the sign of a number. The scalar view is parsed as an `f64`, so
    /// `inf` and `infinity` count in any case. Anything that does not parse, including
    /// `NaN`, hex floats and suffixed forms like `1d`, counts as zero.
    SignWord {
        expr: FieldExpr,
        negative: String,
        zero: String,
        positive: String,
    },
    FeatureType(usize),
    Product {
        product_col: usize,
        type_col: usize,
    },
    Fid {
        fid: FieldExpr,
        function: Option<FieldExpr>,
    },
    GStore {
        genome_id: FieldExpr,
        genome_name: FieldExpr,
    },
}

/// A prefix and a set of guarded clauses, rendered as a sentence of the true clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub conjunction: Conjunction,
    pub null_clause: String,
    pub prefix: Box<Command>,
    pub clauses: Vec<Clause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Conjunction {
    /// `prefix clause, clause, and clause.`
    Prose(String),
    /// The prefix and each clause on a line of its own.
    Lines,
}

/// A group member, rendered only when its column is true.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub col: usize,
    pub body: Vec<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonKind {
    String,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Literal(String),
    Expr(FieldExpr),
}

impl Command {
    /// Append this node's text for `record` to `output`.
    pub fn pop(&self, output: &mut String, record: &Record, ctx: &mut Eval) {
        match self {
            Command::Literal(text) => output.push_str(text),
            Command::Block(children) => {
                for child in children {
                    child.pop(output, record, ctx);
                }
            }
            Command::Column(expr) => output.push_str(&expr.get(record, ctx)),
            Command::If {
                conditions,
                then_block,
                else_block,
            } => {
                let flag = conditions.iter().all(|cond| cond.eval(record, ctx));
                if flag {
                    then_block.pop(output, record, ctx);
                } else if let Some(else_block) = else_block {
                    else_block.pop(output, record, ctx);
                }
            }
            Command::Group(group) => group.pop(output, record, ctx),
            Command::List {
                expr,
                conjunction,
                separator,
                quoted,
            } => {
                let pieces = split_view(expr, separator.as_deref(), record, ctx);
                if *quoted {
                    let quoted: Vec<String> = pieces.iter().map(|p| format!("\"{p}\"")).collect();
                    output.push_str(&conjunct(conjunction, &quoted));
                } else {
                    output.push_str(&conjunct(conjunction, &pieces));
                }
            }
            Command::NumWord {
                expr,
                singular,
                plural,
                separator,
            } => {
                let pieces = split_view(expr, separator.as_deref(), record, ctx);
                output.push_str(if pieces.len() == 1 { singular } else { plural });
            }
            Command::Json { kind, tag, expr } => {
                let value = match kind {
                    JsonKind::String => json_string(&expr.get(record, ctx)),
                    JsonKind::List => {
                        let items: Vec<String> = expr
                            .get_list(record, ctx)
                            .iter()
                            .map(|item| json_string(item))
                            .collect();
                        format!("[{}]", items.join(", "))
                    }
                };
                output.push_str(&format!("{{ {}:{value} }}", json_string(tag)));
            }
            Command::Choice { set, answer, count } => {
                let answer = match answer {
                    Answer::Literal(text) => text.clone(),
                    Answer::Expr(expr) => expr.get(record, ctx),
                };
                let labeled: Vec<String> = ctx
                    .choices(set, &answer, *count)
                    .into_iter()
                    .zip('A'..='Z')
                    .map(|(choice, label)| format!("{label}) {choice}"))
                    .collect();
                output.push_str(&conjunct("or", &labeled));
            }
            Command::Strand(col) => output.push_str(match record.get(*col).as_str() {
                "+" => "the plus (+) strand",
                "-" => "the minus (-) strand",
                _ => "an unknown strand",
            }),
            Command::SignWord {
                expr,
                negative,
                zero,
                positive,
            } => {
                let value = expr
                    .get(record, ctx)
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|value| !value.is_nan())
                    .unwrap_or(0.0);
                output.push_str(if value < 0.0 {
                    negative
                } else if value == 0.0 {
                    zero
                } else {
                    positive
                });
            }
            Command::FeatureType(col) => {
                output.push_str(&feature_type_phrase(&record.get(*col)));
            }
            Command::Product {
                product_col,
                type_col,
            } => output.push_str(&describe_product(
                &record.get(*product_col),
                &record.get(*type_col),
            )),
            Command::Fid { fid, function } => {
                let fid = fid.get(record, ctx);
                let result = match function {
                    None => ctx.mapper().and_then(|mapper| mapper.magic_fid(&fid)),
                    Some(function) => {
                        let function = function.get(record, ctx);
                        ctx.mapper()
                            .and_then(|mapper| mapper.new_magic_fid(&fid, &function))
                    }
                };
                match result {
                    Ok(word) => output.push_str(&word),
                    Err(err) => output.push_str(&format!("{{ ERROR: {err}}}")),
                }
            }
            Command::GStore {
                genome_id,
                genome_name,
            } => {
                let id = genome_id.get(record, ctx);
                let name = genome_name.get(record, ctx);
                if let Err(err) = ctx
                    .mapper()
                    .and_then(|mapper| mapper.store_genome(&id, &name))
                {
                    output.push_str(&format!("{{ ERROR: {err}}}"));
                }
            }
        }
    }

    /// A guess at how much text this node produces, used to size output buffers.
    pub fn estimated_len(&self) -> usize {
        match self {
            Command::Literal(text) => text.len(),
            Command::Block(children) => children.iter().map(Command::estimated_len).sum(),
            Command::Column(_) => COLUMN_LEN,
            Command::If {
                then_block,
                else_block,
                ..
            } => {
                let then_len = then_block.estimated_len();
                else_block
                    .as_ref()
                    .map_or(then_len, |block| then_len.max(block.estimated_len()))
            }
            Command::Group(group) => {
                group.prefix.estimated_len()
                    + group
                        .clauses
                        .iter()
                        .flat_map(|clause| &clause.body)
                        .map(Command::estimated_len)
                        .sum::<usize>()
            }
            Command::List { .. } => LIST_LEN,
            Command::Product { .. } => PRODUCT_LEN,
            _ => 0,
        }
    }
}

impl Group {
    fn pop(&self, output: &mut String, record: &Record, ctx: &mut Eval) {
        let mut phrases = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            if record.get_flag(clause.col) {
                let mut phrase = String::new();
                for command in &clause.body {
                    command.pop(&mut phrase, record, ctx);
                }
                phrases.push(phrase);
            }
        }
        if phrases.is_empty() {
            output.push_str(&self.null_clause);
            return;
        }

        let mut prefix = String::new();
        self.prefix.pop(&mut prefix, record, ctx);
        match &self.conjunction {
            Conjunction::Lines => {
                if !prefix.trim().is_empty() {
                    output.push_str(&prefix);
                    output.push('\n');
                }
                output.push_str(&phrases.join("\n"));
            }
            Conjunction::Prose(conjunction) => {
                output.push_str(&prefix);
                output.push(' ');
                output.push_str(&conjunct(conjunction, &phrases));
                output.push('.');
            }
        }
    }
}

fn json_string(text: &str) -> String {
    Json::from(text).to_string()
}

fn split_view(
    expr: &FieldExpr,
    separator: Option<&str>,
    record: &Record,
    ctx: &mut Eval,
) -> Vec<String> {
    match separator {
        None => expr.get_list(record, ctx),
        Some(separator) => expr
            .get(record, ctx)
            .split(separator)
            .filter(|piece| !piece.is_empty())
            .map(str::to_owned)
            .collect(),
    }
}

/// Constructors for the leaf commands. Each takes the `:`-separated parameters of its
/// directive, with empty pieces already dropped.
impl Command {
    pub(crate) fn column(
        text: &str,
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        expr::compile(text, resolver, globals).map(Command::Column)
    }

    pub(crate) fn list(
        params: &[&str],
        quoted: bool,
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        let name = if quoted { "qlist" } else { "list" };
        let (expr, conjunction, separator) = match params {
            [] => return Err(TemplateError::parameters(name, "requires parameters")),
            [expr] => (expr, "and", None),
            [expr, conjunction] => (expr, *conjunction, None),
            [expr, conjunction, separator] => (expr, *conjunction, Some(separator.to_string())),
            _ => return Err(TemplateError::parameters(name, "has too many parameters")),
        };
        Ok(Command::List {
            expr: expr::compile(expr, resolver, globals)?,
            conjunction: conjunction.to_string(),
            separator,
            quoted,
        })
    }

    pub(crate) fn num_word(
        params: &[&str],
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        let (expr, singular, plural, separator) = match params {
            [expr, singular, plural] => (expr, singular, plural, None),
            [expr, singular, plural, separator] => {
                (expr, singular, plural, Some(separator.to_string()))
            }
            _ => {
                return Err(TemplateError::parameters(
                    "numword",
                    "requires three or four parameters",
                ))
            }
        };
        Ok(Command::NumWord {
            expr: expr::compile(expr, resolver, globals)?,
            singular: singular.to_string(),
            plural: plural.to_string(),
            separator,
        })
    }

    pub(crate) fn json(
        params: &[&str],
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        let (kind, tag, expr) = match params {
            [kind, tag] => (kind, tag, tag),
            [kind, tag, expr] => (kind, tag, expr),
            _ => {
                return Err(TemplateError::parameters(
                    "json",
                    "must have two or three parameters",
                ))
            }
        };
        let kind = match *kind {
            "string" => JsonKind::String,
            "list" => JsonKind::List,
            other => {
                return Err(TemplateError::parameters(
                    "json",
                    format!("has invalid type code \"{other}\""),
                ))
            }
        };
        Ok(Command::Json {
            kind,
            tag: tag.to_string(),
            expr: expr::compile(expr, resolver, globals)?,
        })
    }

    pub(crate) fn choice(
        params: &[&str],
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        let [set, answer, count] = params else {
            return Err(TemplateError::parameters(
                "choices",
                "requires all three parameters",
            ));
        };
        let count: usize = count.parse().map_err(|_| TemplateError::InvalidNumber {
            what: "answer count",
            value: count.to_string(),
        })?;
        if !(2..=10).contains(&count) {
            return Err(TemplateError::ChoiceCount(count));
        }
        if !globals.has_choice_set(set) {
            return Err(TemplateError::UnknownChoiceSet(set.to_string()));
        }
        let answer = match answer
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            Some(literal) if !literal.is_empty() => Answer::Literal(literal.to_string()),
            _ => Answer::Expr(expr::compile(answer, resolver, globals)?),
        };
        Ok(Command::Choice {
            set: set.to_string(),
            answer,
            count,
        })
    }

    pub(crate) fn strand(params: &[&str], resolver: &dyn Resolver) -> Result<Self, TemplateError> {
        single_column("strand", params, resolver).map(Command::Strand)
    }

    pub(crate) fn feature_type(
        params: &[&str],
        resolver: &dyn Resolver,
    ) -> Result<Self, TemplateError> {
        single_column("ftype", params, resolver).map(Command::FeatureType)
    }

    pub(crate) fn sign_word(
        params: &[&str],
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        let [expr, negative, zero, positive] = params else {
            return Err(TemplateError::parameters(
                "signWord",
                "requires exactly four parameters",
            ));
        };
        Ok(Command::SignWord {
            expr: expr::compile(expr, resolver, globals)?,
            negative: negative.to_string(),
            zero: zero.to_string(),
            positive: positive.to_string(),
        })
    }

    pub(crate) fn product(params: &[&str], resolver: &dyn Resolver) -> Result<Self, TemplateError> {
        let [product, feature_type] = params else {
            return Err(TemplateError::parameters(
                "product",
                "requires exactly two column names, the product column and the feature type column",
            ));
        };
        Ok(Command::Product {
            product_col: expr::column(product, resolver)?,
            type_col: expr::column(feature_type, resolver)?,
        })
    }

    pub(crate) fn fid(
        params: &[&str],
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        let (fid, function) = match params {
            [fid] => (fid, None),
            [fid, function] => (fid, Some(expr::compile(function, resolver, globals)?)),
            [] => return Err(TemplateError::parameters("fid", "requires parameters")),
            _ => return Err(TemplateError::parameters("fid", "has too many parameters")),
        };
        Ok(Command::Fid {
            fid: expr::compile(fid, resolver, globals)?,
            function,
        })
    }

    pub(crate) fn g_store(
        params: &[&str],
        resolver: &dyn Resolver,
        globals: &dyn GlobalContext,
    ) -> Result<Self, TemplateError> {
        let [genome_id, genome_name] = params else {
            return Err(TemplateError::parameters(
                "gStore",
                "requires exactly two parameters",
            ));
        };
        Ok(Command::GStore {
            genome_id: expr::compile(genome_id, resolver, globals)?,
            genome_name: expr::compile(genome_name, resolver, globals)?,
        })
    }
}

/// The opening parameters of a group: conjunction and null clause.
pub(crate) fn group_header(params: &[&str]) -> (Conjunction, String) {
    let conjunction = match params.first() {
        None => Conjunction::Prose("and".into()),
        Some(&"nl") => Conjunction::Lines,
        Some(conj) => Conjunction::Prose(conj.to_string()),
    };
    let null_clause = params.get(1).map(|s| s.to_string()).unwrap_or_default();
    (conjunction, null_clause)
}

fn single_column(
    command: &'static str,
    params: &[&str],
    resolver: &dyn Resolver,
) -> Result<usize, TemplateError> {
    match params {
        [name] => expr::column(name, resolver),
        _ => Err(TemplateError::parameters(
            command,
            "requires exactly one column name",
        )),
    }
}
