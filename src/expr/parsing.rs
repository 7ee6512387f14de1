use std::sync::OnceLock;

use regex::Regex;

use super::*;
use crate::error::TemplateError;
use crate::globals::GlobalContext;
use crate::table::Resolver;

fn function_call() -> &'static Regex {
    static FUNCTION: OnceLock<Regex> = OnceLock::new();
    FUNCTION.get_or_init(|| Regex::new(r"^([a-z]\w+)\((.+)\)$").unwrap())
}

fn arg_separator() -> &'static Regex {
    static COMMA: OnceLock<Regex> = OnceLock::new();
    COMMA.get_or_init(|| Regex::new(r"\s*,\s*").unwrap())
}

/// Compile the text of a field expression, binding every column name through `resolver`.
pub fn compile(
    text: &str,
    resolver: &dyn Resolver,
    globals: &dyn GlobalContext,
) -> Result<FieldExpr, TemplateError> {
    let text = text.trim();
    let Some(caps) = function_call().captures(text) else {
        return column(text, resolver).map(|col| FieldExpr::Reference {
            name: text.to_string(),
            col,
        });
    };

    let name = &caps[1];
    let function =
        Function::from_name(name).ok_or_else(|| TemplateError::UnknownFunction(name.into()))?;
    let args: Vec<&str> = arg_separator().split(caps[2].trim()).collect();
    if args.len() != function.arity() {
        return Err(TemplateError::FunctionArity {
            function: function.name(),
            expected: function.arity(),
        });
    }

    let expr = match function {
        Function::Include => FieldExpr::Include {
            source: args[0].to_string(),
            key_name: args[1].to_string(),
            key_col: column(args[1], resolver)?,
        },
        Function::Sample => {
            let set = args[0];
            if !globals.has_choice_set(set) {
                return Err(TemplateError::UnknownChoiceSet(set.into()));
            }
            let count = match args[1].parse::<usize>() {
                Ok(count) if count >= 1 => count,
                _ => {
                    return Err(TemplateError::InvalidNumber {
                        what: "sample size",
                        value: args[1].into(),
                    })
                }
            };
            FieldExpr::Sample {
                set: set.to_string(),
                count,
            }
        }
        Function::Eq => FieldExpr::Eq {
            col: column(args[0], resolver)?,
            value: args[1].to_string(),
        },
        Function::Singleton => FieldExpr::Singleton {
            col: column(args[0], resolver)?,
        },
    };
    Ok(expr)
}

/// Bind a plain column name.
pub(crate) fn column(name: &str, resolver: &dyn Resolver) -> Result<usize, TemplateError> {
    resolver
        .find_field(name)
        .ok_or_else(|| TemplateError::UnknownField(name.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::globals::Globals;
    use crate::table::Schema;

    fn schema() -> Schema {
        Schema::new(["genome.genome_id", "type", "aliases"])
    }

    fn globals() -> Globals {
        let mut globals = Globals::new();
        globals.add_choice_set("genus", ["Bacillus", "Listeria"]);
        globals
    }

    fn assert_compiles(input: &str, expected: FieldExpr) {
        let compiled = compile(input, &schema(), &globals())
            .unwrap_or_else(|e| panic!("failed to compile {input}: {e}"));
        assert_eq!(compiled, expected, "for input: {input}");
    }

    fn assert_compile_fails(input: &str, expected: TemplateError) {
        let result = compile(input, &schema(), &globals());
        assert_eq!(result, Err(expected), "for input: {input}");
    }

    #[test]
    fn test_reference() {
        assert_compiles(
            "genome_id",
            FieldExpr::Reference {
                name: "genome_id".into(),
                col: 0,
            },
        );
        assert_compiles(
            " TYPE ",
            FieldExpr::Reference {
                name: "TYPE".into(),
                col: 1,
            },
        );
        assert_compile_fails("strain", TemplateError::UnknownField("strain".into()));
    }

    #[test]
    fn test_functions() {
        assert_compiles(
            "include(dlits.txt, genome_id)",
            FieldExpr::Include {
                source: "dlits.txt".into(),
                key_name: "genome_id".into(),
                key_col: 0,
            },
        );
        assert_compiles(
            "sample(genus,3)",
            FieldExpr::Sample {
                set: "genus".into(),
                count: 3,
            },
        );
        assert_compiles(
            "eq(type, CDS)",
            FieldExpr::Eq {
                col: 1,
                value: "CDS".into(),
            },
        );
        assert_compiles("singleton( aliases )", FieldExpr::Singleton { col: 2 });
    }

    #[test]
    fn test_function_errors() {
        assert_compile_fails(
            "count(aliases)",
            TemplateError::UnknownFunction("count".into()),
        );
        assert_compile_fails(
            "eq(type)",
            TemplateError::FunctionArity {
                function: "eq",
                expected: 2,
            },
        );
        assert_compile_fails(
            "singleton(type, aliases)",
            TemplateError::FunctionArity {
                function: "singleton",
                expected: 1,
            },
        );
        assert_compile_fails(
            "include(dlits.txt, strain)",
            TemplateError::UnknownField("strain".into()),
        );
        assert_compile_fails(
            "sample(species, 2)",
            TemplateError::UnknownChoiceSet("species".into()),
        );
        assert_compile_fails(
            "sample(genus, 0)",
            TemplateError::InvalidNumber {
                what: "sample size",
                value: "0".into(),
            },
        );
        assert_compile_fails(
            "sample(genus, many)",
            TemplateError::InvalidNumber {
                what: "sample size",
                value: "many".into(),
            },
        );
    }
}
