use std::{
    env, fs,
    path::{Path, PathBuf},
    process::Command,
};

use indoc::indoc;
use pretty_assertions::assert_eq;
use specs::{
    lexer, parser, resolver,
    util::{fmt::canonical, intern::Interner},
    Config, ErrorKind,
};

const DEMOS: [(&str, &str); 4] = [
    ("functions", include_str!("../demos/functions.sp")),
    ("vectors", include_str!("../demos/vectors.sp")),
    ("animals", include_str!("../demos/animals.sp")),
    ("arrays", include_str!("../demos/arrays.sp")),
];

fn compile(src: &str) -> String {
    match specs::compile(src, &Config::default()) {
        Ok(code) => code,
        Err(error) => panic!("{}", error.render(src)),
    }
}

fn compile_err(src: &str) -> specs::Error {
    specs::compile(src, &Config::default()).expect_err("program should be rejected")
}

fn canonical_text(src: &str) -> String {
    let idents = &mut Interner::with_capacity(128);
    let tokens = lexer::lex_in_new(src).expect("lexes");
    let program = parser::parse_program(src, &tokens, idents).expect("parses");
    let program = resolver::flatten(program, idents).expect("flattens");
    canonical::program_string(idents, &program)
}

#[test]
fn demos_compile() {
    for (name, src) in DEMOS {
        let code = compile(src);
        assert!(code.contains("int _specs__UserMain(void)"), "{name}");
    }
}

#[test]
fn output_is_deterministic() {
    for (name, src) in DEMOS {
        assert_eq!(compile(src), compile(src), "{name}");
    }
}

#[test]
fn canonical_text_round_trips() {
    for (name, src) in DEMOS {
        let first = canonical_text(src);
        let second = canonical_text(&first);
        assert_eq!(first, second, "{name}");
    }
}

#[test]
fn nested_function_is_lifted() {
    let code = compile(indoc! {"
        fn Add [x int] [y int] -> int {
            fn Add2 [a int] [b int] -> int {
                return a + b
            }
            return (Add2 x y)
        }
        let three = (Add 1 2)
    "});
    assert!(code.contains("int _Add__Add2(int a, int b);\n"));
    assert!(code.contains("int Add(int x, int y);\n"));
    assert!(code.contains("\treturn _Add__Add2(x, y);\n"));
    assert!(code.contains("\tint three = Add(1, 2);\n"));
}

#[test]
fn interface_values_dispatch_on_their_tag() {
    let code = compile(include_str!("../demos/animals.sp"));
    assert!(code.contains("\tchar* species = Dog__Animal__GetSpecies(dog);\n"));
    assert!(code.contains("\tAnimal pet = Animal__From__Cat(Cat__New(9));\n"));
    assert!(code.contains("Animal__GetSpecies(pet)"));
    assert!(code.contains(indoc! {"
        Animal Animal__From__Person(Person* value)
        {
        \tAnimal result;
        \tresult.type = _specs__TypeID__Person;
        \tresult.value.Person = value;
        \treturn result;
        }
    "}));
}

#[test]
fn non_implementors_are_rejected_before_generation() {
    let error = compile_err(indoc! {"
        interface Animal {
            fn GetSpecies [self] -> string
        }
        struct Rock { [weight int] }
        let a Animal = Rock.New(3)
    "});
    assert_eq!(error.kind(), ErrorKind::TypeMismatch);
    assert!(error.to_string().ends_with("expected Animal, found Rock"));
    assert!(error.span().is_some());
}

#[test]
fn arrays_iterate_both_ways() {
    let code = compile(include_str!("../demos/arrays.sp"));
    assert!(code.contains("\tArray__Int* numbers = Array__Int__New(5);\n"));
    assert!(code.contains("\twhile (i < Array__Int__Length(numbers))\n"));
    assert!(code.contains("\t\tArray__Int__Set(numbers, i, (i + 1) * 100);\n"));
    assert!(code.contains("\tArrayIterator__Int _t1 = Array__Int__Iterate(numbers);\n"));
    assert!(code.contains(indoc! {"
        \tArrayIterator__Int _t2 = Array__Int__Reversed(numbers);
        \twhile (ArrayIterator__Int__HasNext(&_t2))
        \t{
        \t\tint n = ArrayIterator__Int__Next(&_t2);
    "}));
    assert!(code.contains("\tArrayIterator__Int iterator = { self, self->length - 1, -1 };\n"));
}

#[test]
fn generic_instances_are_emitted_once() {
    let code = compile(include_str!("../demos/arrays.sp"));
    assert_eq!(code.matches("struct Box__Int\n").count(), 1);
    assert_eq!(code.matches("int Box__Int__Get(Box__Int* self)\n").count(), 1);
    assert!(code.contains("\tBox__Int* first = Box__Int__New(forward);\n"));
    assert!(code.contains("\tBox__Int* second = Box__Int__New(backward);\n"));
    assert!(code.contains("\treturn Box__Int__Get(first) - Box__Int__Get(second);\n"));
}

#[test]
fn accumulator_is_called_once_from_its_parent() {
    let code = compile(include_str!("../demos/functions.sp"));
    let start = code.find("int Factorial(int n)\n{").expect("definition");
    let end = start + code[start..].find("\n}\n").expect("closing brace");
    let body = &code[start..end];
    assert_eq!(body.matches("_Factorial__Accumulator(").count(), 1);
    assert!(code.contains("\t\treturn acc;\n"));
}

#[test]
fn struct_methods_take_decomposed_arguments() {
    let code = compile(include_str!("../demos/vectors.sp"));
    assert!(code.contains(indoc! {"
        Vector2* Vector2__Add(Vector2* self, int other__x, int other__y)
        {
        \tVector2__static.Created = Vector2__static.Created + 1;
        \treturn Vector2__New(self->x + other__x, self->y + other__y);
        }
    "}));
}

#[test]
fn decomposed_arguments_match_parameters() {
    let code = compile(indoc! {r#"
        struct P { [a int] [b bool] [c string] }
        fn F [p P] [n int] -> int { return p.a + n }
        let p = P.New(1, true, "x")
        let r = (F p 2)
    "#});
    assert!(code.contains("int F(int p__a, bool p__b, char* p__c, int n);\n"));
    assert!(code.contains("\tint r = F(p->a, p->b, p->c, 2);\n"));
}

#[test]
fn every_dispatch_has_a_fallback() {
    let code = compile(include_str!("../demos/animals.sp"));
    let switches = code.matches("switch (self.type)").count();
    assert_eq!(switches, 2);
    assert_eq!(code.matches("default:\n\t\t\texit(1);").count(), switches);
}

#[test]
fn sibling_nested_functions_must_differ() {
    let error = compile_err(indoc! {"
        fn Outer {
            fn Inner { }
            fn Inner { }
        }
    "});
    assert_eq!(error.kind(), ErrorKind::DuplicateDeclaration);

    let code = compile(indoc! {"
        fn A { fn H { } }
        fn B { fn H { } }
    "});
    assert!(code.contains("void _A__H(void);\n"));
    assert!(code.contains("void _B__H(void);\n"));
}

#[test]
fn errors_name_their_kind() {
    let cases = [
        ("let x = $", ErrorKind::LexError),
        ("let = 1", ErrorKind::ParseError),
        ("let x = y", ErrorKind::UnresolvedReference),
        ("let x = 1 + true", ErrorKind::TypeMismatch),
        ("let x = Nope.New()", ErrorKind::UnresolvedReference),
        ("struct P { [a int] } let x = P<int>.New(1)", ErrorKind::UnknownGeneric),
    ];
    for (src, kind) in cases {
        let error = compile_err(src);
        assert_eq!(error.kind(), kind, "{src}");
        assert!(error.render(src).starts_with(&format!("error[{kind}] at 1:")));
    }
}

/// Builds the generated C with the system compiler and returns the program's
/// exit status, or `None` when no C compiler is installed.
fn run_c(name: &str, src: &str) -> Option<i32> {
    let runtime = Path::new(env!("CARGO_MANIFEST_DIR")).join("runtime");
    let dir: PathBuf = env::temp_dir().join(format!("specs-{}-{name}", std::process::id()));
    fs::create_dir_all(&dir).expect("temporary directory");
    let c_file = dir.join(format!("{name}.c"));
    let exe = dir.join(name);
    fs::write(&c_file, compile(src)).expect("write generated code");

    let built = match Command::new("cc")
        .arg("-std=c11")
        .arg("-I")
        .arg(&runtime)
        .arg("-o")
        .arg(&exe)
        .arg(&c_file)
        .status()
    {
        Ok(status) => status,
        Err(error) => {
            eprintln!("skipping {name}: cc unavailable ({error})");
            return None;
        }
    };
    assert!(built.success(), "cc rejected the output for {name}");
    let status = Command::new(&exe).status().expect("run compiled program");
    _ = fs::remove_dir_all(&dir);
    status.code()
}

#[test]
#[ignore = "needs a C compiler"]
fn compiled_demos_exit_with_their_results() {
    let expected = [
        // 5! - (0 + 1 + ... + 9)
        ("functions", 75),
        // Dot with the zero vector, plus sum.x
        ("vectors", 4),
        // Dog legs plus Person legs
        ("animals", 6),
        // (12345 - 54321) mod 256
        ("arrays", 8),
    ];
    for ((name, src), (_, code)) in DEMOS.into_iter().zip(expected) {
        if let Some(status) = run_c(name, src) {
            assert_eq!(status, code, "{name}");
        }
    }
}

#[test]
#[ignore = "needs a C compiler"]
fn compiled_array_iterates_in_both_directions() {
    let src = indoc! {"
        let numbers = Array<int>.New(5)
        let i = 0
        while i < 5 {
            numbers.Set(i, (i + 1) * 100)
            i = i + 1
        }
        let forward = 0
        for n in numbers {
            forward = forward * 10 + n / 100
        }
        let backward = 0
        for n in numbers.Reversed() {
            backward = backward * 10 + n / 100
        }
        if forward != 12345 { return 1 }
        if backward != 54321 { return 2 }
        if numbers.Get(4) != 500 { return 3 }
        return 0
    "};
    if let Some(status) = run_c("array_order", src) {
        assert_eq!(status, 0);
    }
}

#[test]
#[ignore = "needs a C compiler"]
fn compiled_vector_add_sums_fields() {
    let src = indoc! {"
        struct Vector2 {
            [x int]
            [y int]

            fn Add [self] [other Vector2] -> Vector2 {
                return Vector2.New(self.x + other.x, self.y + other.y)
            }
        }
        let v = Vector2.New(1, 2).Add(Vector2.New(3, 4))
        if v.x != 4 { return 1 }
        if v.y != 6 { return 2 }
        return 0
    "};
    if let Some(status) = run_c("vector_add", src) {
        assert_eq!(status, 0);
    }
}

#[test]
#[ignore = "needs a C compiler"]
fn compiled_nested_add_returns_sum() {
    let src = indoc! {"
        fn Add [x int] [y int] -> int {
            fn Add2 [a int] [b int] -> int {
                return a + b
            }
            return (Add2 x y)
        }
        return (Add 1 2)
    "};
    if let Some(status) = run_c("nested_add", src) {
        assert_eq!(status, 3);
    }
}
