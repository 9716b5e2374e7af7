use crate::{
    lexer, parser, resolver, type_checker,
    util::{
        fmt::{canonical, tree},
        intern::Interner,
    },
    Error,
};

/// Each variant contains the input.
pub enum Test {
    ParserProgram(&'static str),
    ParserExpr(&'static str),
    ResolverProgram(&'static str),
    CheckerProgram(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

/// Runs the front end up to (and including) flattening.
fn front(input: &str, interner: &mut Interner<str>) -> Result<crate::ast::Program, Error> {
    let tokens = lexer::lex_in_new(input)?;
    let program = parser::parse_program(input, &tokens, interner)?;
    Ok(resolver::flatten(program, interner)?)
}

#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    let interner = &mut Interner::with_capacity(128);

    let result = match test {
        Test::ParserProgram(input) => lexer::lex_in_new(input)
            .map_err(Error::from)
            .and_then(|tokens| Ok(parser::parse_program(input, &tokens, interner)?))
            .map(|program| tree::print_program_string(interner, &program)),
        Test::ParserExpr(input) => lexer::lex_in_new(input)
            .map_err(Error::from)
            .and_then(|tokens| Ok(parser::parse_expr(input, &tokens, interner)?))
            .map(|expr| tree::print_expr_string(interner, &expr)),
        Test::ResolverProgram(input) => front(input, interner).map(|program| {
            let text = canonical::program_string(interner, &program);
            assert_round_trip(&text);
            text
        }),
        Test::CheckerProgram(input) => front(input, interner)
            .and_then(|program| type_checker::check(program, interner))
            .map(|program| tree::print_ir_string(interner, &program)),
    };

    match result {
        Ok(tree) => (tree, vec![]),
        Err(error) => (String::new(), vec![error.to_string()]),
    }
}

/// Parsing and flattening canonical text must reproduce it exactly.
#[track_caller]
pub fn assert_round_trip(text: &str) {
    let interner = &mut Interner::with_capacity(128);
    let program = front(text, interner).expect("canonical text must compile");
    let again = canonical::program_string(interner, &program);
    ::pretty_assertions::assert_eq!(text, again);
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::ParserProgram($source)
    };
    (@@get_test(parser, expr), $source:expr) => {
        crate::util::test_utils::Test::ParserExpr($source)
    };
    (@@get_test(resolver, program), $source:expr) => {
        crate::util::test_utils::Test::ResolverProgram($source)
    };
    (@@get_test(checker, program), $source:expr) => {
        crate::util::test_utils::Test::CheckerProgram($source)
    };
}
pub(crate) use tree_tests;
