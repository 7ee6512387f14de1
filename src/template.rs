//! Compiles template text into a [`Command`] tree and applies it to records.
//!
//! * scan the text for literal runs and `{{...}}` constructs
//! * compile each construct into a command, or open/close a container on the compile stack
//! * freeze the stack into the tree that [`LineTemplate::apply`] walks once per record
//!
//! ```text
//! This feature {{$ftype:type}}{{$if:product}} and makes {{$product:product:type}}{{$fi}}.
//! {{$group:and:It has no known aliases.}}It is also known as{{$clause:alias}}{{alias}}{{$end}}
//! ```

use std::sync::OnceLock;

use rand::rngs::StdRng;
use rand::SeedableRng;
use regex::Regex;
use tracing::{debug, error};

use crate::command::{self, Command};
use crate::error::{CompileError, TemplateError};
use crate::eval::{Eval, FidMapper};
use crate::expr;
use crate::globals::GlobalContext;
use crate::table::{Record, Resolver};

use stack::{CompileStack, Construct, Kind};

mod stack;

fn construct_pattern() -> &'static Regex {
    static CONSTRUCT: OnceLock<Regex> = OnceLock::new();
    CONSTRUCT.get_or_init(|| Regex::new(r"(?s)\{\{(.+?)\}\}").unwrap())
}

fn directive_pattern() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| Regex::new(r"^\$(\w+)(?::(.+))?$").unwrap())
}

/// The closed set of `$` commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Null,
    Tab,
    Nl,
    Strand,
    Product,
    List,
    QList,
    NumWord,
    Json,
    Choices,
    Fid,
    GStore,
    SignWord,
    FeatureType,
    If,
    Else,
    Fi,
    Group,
    Clause,
    End,
}

impl Directive {
    fn from_name(name: &str) -> Option<Self> {
        let directive = match name {
            "0" => Directive::Null,
            "tab" => Directive::Tab,
            "nl" => Directive::Nl,
            "strand" => Directive::Strand,
            "product" => Directive::Product,
            "list" => Directive::List,
            "qlist" => Directive::QList,
            "numword" => Directive::NumWord,
            "json" => Directive::Json,
            "choices" => Directive::Choices,
            "fid" => Directive::Fid,
            "gStore" => Directive::GStore,
            "signWord" => Directive::SignWord,
            "ftype" => Directive::FeatureType,
            "if" => Directive::If,
            "else" => Directive::Else,
            "fi" => Directive::Fi,
            "group" => Directive::Group,
            "clause" => Directive::Clause,
            "end" => Directive::End,
            _ => return None,
        };
        Some(directive)
    }
}

/// A compiled template, ready to be applied to records.
///
/// The template borrows the global context it was compiled against and owns the random
/// number generator used by `sample(...)` and `$choices`. Applying it needs `&mut self`, so
/// each thread should compile its own copy.
pub struct LineTemplate<'g> {
    root: Command,
    globals: &'g dyn GlobalContext,
    rng: StdRng,
    mapper: Option<Box<dyn FidMapper>>,
}

impl<'g> LineTemplate<'g> {
    /// Compile `template`, binding column names through `resolver`.
    ///
    /// Compile errors are logged as well as returned.
    pub fn compile(
        template: &str,
        resolver: &dyn Resolver,
        globals: &'g dyn GlobalContext,
    ) -> Result<Self, CompileError> {
        let root = compile_tree(template, resolver, globals).map_err(|err| {
            error!("Parsing error encountered near \"{}\".", err.near);
            error!("Parser message: {}", err.error);
            err
        })?;
        debug!(
            "Compiled template of {} characters, estimated output length {}.",
            template.len(),
            root.estimated_len()
        );

        Ok(LineTemplate {
            root,
            globals,
            rng: StdRng::from_entropy(),
            mapper: None,
        })
    }

    /// Fix the random number seed so that output is reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.reseed(seed);
        self
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    /// Attach the feature-ID mapper used by `$fid` and `$gStore`.
    pub fn with_mapper(mut self, mapper: Box<dyn FidMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn take_mapper(&mut self) -> Option<Box<dyn FidMapper>> {
        self.mapper.take()
    }

    /// Render the template for one record.
    pub fn apply(&mut self, record: &Record) -> String {
        let mut output = String::with_capacity(self.root.estimated_len());
        let mut ctx = Eval::new(self.globals, &mut self.rng, &mut self.mapper);
        self.root.pop(&mut output, record, &mut ctx);
        output
    }
}

fn compile_tree(
    template: &str,
    resolver: &dyn Resolver,
    globals: &dyn GlobalContext,
) -> Result<Command, CompileError> {
    let mut stack = CompileStack::new();
    let mut last_match = 0;
    let mut last_construct = "";
    let mut last_position = 0;

    for caps in construct_pattern().captures_iter(template) {
        let Some(whole) = caps.get(0) else { continue };
        let Some(inner) = caps.get(1) else { continue };
        let construct = inner.as_str();
        let position = whole.start();
        last_construct = construct;
        last_position = position;

        let wrap = |error: TemplateError| CompileError::new(error, construct, template, position);
        if whole.start() > last_match {
            let literal = &template[last_match..whole.start()];
            stack
                .add_to_top(Command::Literal(literal.to_string()))
                .map_err(wrap)?;
        }
        compile_construct(&mut stack, construct, resolver, globals).map_err(wrap)?;
        last_match = whole.end();
    }

    if last_match < template.len() {
        stack
            .add_to_top(Command::Literal(template[last_match..].to_string()))
            .map_err(|error| CompileError::new(error, "", template, last_match))?;
    }

    stack
        .finish()
        .map_err(|error| CompileError::new(error, last_construct, template, last_position))
}

fn compile_construct(
    stack: &mut CompileStack,
    construct: &str,
    resolver: &dyn Resolver,
    globals: &dyn GlobalContext,
) -> Result<(), TemplateError> {
    if !construct.starts_with('$') {
        return stack.add_to_top(Command::column(construct, resolver, globals)?);
    }

    let caps = directive_pattern()
        .captures(construct)
        .ok_or_else(|| TemplateError::InvalidCommand(construct.into()))?;
    let name = &caps[1];
    let directive =
        Directive::from_name(name).ok_or_else(|| TemplateError::UnknownCommand(name.into()))?;
    let params: Vec<&str> = caps
        .get(2)
        .map(|params| {
            params
                .as_str()
                .split(':')
                .filter(|piece| !piece.is_empty())
                .collect()
        })
        .unwrap_or_default();

    match directive {
        Directive::Null => Ok(()),
        Directive::Tab => stack.add_to_top(Command::Literal("\t".into())),
        Directive::Nl => stack.add_to_top(Command::Literal("\n".into())),
        Directive::Strand => stack.add_to_top(Command::strand(&params, resolver)?),
        Directive::FeatureType => stack.add_to_top(Command::feature_type(&params, resolver)?),
        Directive::Product => stack.add_to_top(Command::product(&params, resolver)?),
        Directive::List => stack.add_to_top(Command::list(&params, false, resolver, globals)?),
        Directive::QList => stack.add_to_top(Command::list(&params, true, resolver, globals)?),
        Directive::NumWord => stack.add_to_top(Command::num_word(&params, resolver, globals)?),
        Directive::Json => stack.add_to_top(Command::json(&params, resolver, globals)?),
        Directive::Choices => stack.add_to_top(Command::choice(&params, resolver, globals)?),
        Directive::Fid => stack.add_to_top(Command::fid(&params, resolver, globals)?),
        Directive::GStore => stack.add_to_top(Command::g_store(&params, resolver, globals)?),
        Directive::SignWord => stack.add_to_top(Command::sign_word(&params, resolver, globals)?),
        Directive::If => {
            if params.is_empty() {
                return Err(TemplateError::parameters(
                    "if",
                    "requires at least one condition",
                ));
            }
            let conditions = params
                .iter()
                .map(|param| expr::compile(param, resolver, globals))
                .collect::<Result<Vec<_>, _>>()?;
            stack.add_and_push(Kind::If(conditions))?;
            stack.add_and_push(Kind::Block(Construct::Then))
        }
        Directive::Else => {
            stack.pop_in_context("else", &[Construct::Then])?;
            stack.add_and_push(Kind::Block(Construct::Else))
        }
        Directive::Fi => {
            stack.pop_in_context("fi", &[Construct::Then, Construct::Else])?;
            stack.pop();
            Ok(())
        }
        Directive::Group => {
            let (conjunction, null_clause) = command::group_header(&params);
            stack.add_and_push(Kind::Group {
                conjunction,
                null_clause,
            })?;
            stack.add_and_push(Kind::Block(Construct::Prefix))
        }
        Directive::Clause => {
            stack.pop_in_context("clause", &[Construct::Prefix, Construct::Clause])?;
            let [column] = params.as_slice() else {
                return Err(TemplateError::parameters(
                    "clause",
                    "requires exactly one column name",
                ));
            };
            stack.add_and_push(Kind::Clause(expr::column(column, resolver)?))
        }
        Directive::End => {
            stack.pop_in_context("end", &[Construct::Prefix, Construct::Clause])?;
            stack.pop();
            Ok(())
        }
    }
}
