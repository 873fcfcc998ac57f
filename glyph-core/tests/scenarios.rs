use glyph_core::grammar;
use glyph_core::{Executor, Mode, ParseError, Pipeline, Rustc, Type, TypeChecker, Value, parse_source};

fn run(source: &str) -> Vec<String> {
    Pipeline::new(Mode::Run, "scenario", source).collect()
}

#[test]
fn type_errors_stop_the_run() {
    let output = run("iX = 3\niY = iX + 2\niZ = iX + \"s\"\niW = 4");
    assert_eq!(
        output,
        [
            "Running scenario...",
            "iX = 3",
            "iY = 5",
            "Type error <- encountered while checking iZ = iX + \"s\"\nstring cannot add with type integer",
        ]
    );
}

#[test]
fn two_argument_functions_apply_one_step_at_a_time() {
    let output = run("fX = iA iB -> iA + iB\niC = fX : 3 : 4 ;");
    assert_eq!(output[1..], ["fX = <function>", "iC = 7", "Done."]);
}

#[test]
fn recursive_functions_see_their_own_type() {
    let source = "fiFact = iN -> if iN < 2 then 1 else iN * (fiFact : (iN - 1) ;)\nfiFact : 5 ;";
    let output = run(source);
    assert_eq!(output[1..], ["fiFact = <function>", "120", "Done."]);

    let checked: Vec<String> = Pipeline::new(Mode::Check, "scenario", source).collect();
    assert_eq!(checked, ["Checking scenario...", "Done."]);

    let bare = run("fFact = iN -> if iN < 2 then 1 else iN * (fFact : (iN - 1) ;)\nfFact : 6 ;");
    assert_eq!(bare[1..], ["fFact = <function>", "720", "Done."]);
}

#[test]
fn struct_fields_read_back() {
    let output = run("oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\niX2 = oP . iX");
    assert_eq!(
        output,
        [
            "Running scenario...",
            "oPoint = <function>",
            "oP = Point { iX: 1, iY: 2 }",
            "iX2 = 1",
            "Done.",
        ]
    );
}

#[test]
fn redefined_functions_call_the_previous_definition() {
    let output = run("fiF = iN -> iN + 1\nfiF = iN -> (fiF : iN ;) * 2\nfiF : 3 ;");
    assert_eq!(output[1..], ["fiF = <function>", "fiF = <function>", "8", "Done."]);
}

#[test]
fn field_values_have_their_declared_types() {
    let grammar = grammar::standard().unwrap();
    let source = "oRow = iId dScore sName -> struct\n\
                  oR = oRow : 7 : 2.5 : \"ada\" ;\n\
                  iA = oR.iId\n\
                  dB = oR.dScore\n\
                  sC = oR.sName";
    let mut checker = TypeChecker::new();
    let mut executor = Executor::new();
    for raw in parse_source(grammar, source).unwrap() {
        let statement = checker.convert(&raw).unwrap();
        executor.run(&statement).unwrap();
    }

    let Some(Type::Struct(row)) = checker.binding("oR") else {
        panic!("oR should be a struct");
    };
    assert_eq!(row.field("iId"), Some(&Type::Int));
    assert_eq!(row.field("dScore"), Some(&Type::Double));
    assert_eq!(row.field("sName"), Some(&Type::Str));
    assert!(matches!(executor.value("iA"), Some(Value::Int(7))));
    assert!(matches!(executor.value("dB"), Some(Value::Double(d)) if *d == 2.5));
    assert!(matches!(executor.value("sC"), Some(Value::Str(s)) if s.as_str() == "ada"));
}

#[test]
fn prefix_then_rest_equals_one_tuple_apply() {
    let output = run(
        "fX = iA iB iC -> iA * 100 + iB * 10 + iC\n\
         fX : 1 : 2 : 3 ;\n\
         fX :: (1, 2) : 3 ;\n\
         fX : 1 :: (2, 3) ;\n\
         fX :: (1, 2, 3) ;",
    );
    assert_eq!(output[2..6], ["123", "123", "123", "123"]);
}

#[test]
fn parsing_twice_gives_identical_trees() {
    let grammar = grammar::standard().unwrap();
    let source = "fX = iA -> iA * 2\nwhile false do\n  iY = fX : 3 ;\nendwhile\naZ = [1, 2] + [3]";
    let first = parse_source(grammar, source).unwrap();
    let second = parse_source(grammar, source).unwrap();
    assert_eq!(first, second);

    let typed = |raw: &[glyph_core::syntax::RawNode]| {
        let mut checker = TypeChecker::new();
        raw.iter()
            .map(|node| checker.convert(node).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(typed(&first), typed(&second));
}

#[test]
fn ambiguous_grammars_never_pick_a_derivation() {
    let grammar = grammar::compile(
        "line : wrap ExpressionStatement = sum EOL ;\n\
         sum : flatten-or-wrap BinaryOp = sum times sum | CONSTANT ;\n\
         times : unwrap-single-child = \"*\" ;",
    )
    .unwrap();
    match parse_source(&grammar, "2 * 3 * 4") {
        Err(ParseError::Ambiguous { report }) => assert!(!report.is_empty()),
        other => panic!("expected an ambiguity report, got {other:?}"),
    }
}

#[test]
fn compiled_programs_print_what_the_executor_prints() {
    if !Rustc::from_env().is_available() {
        eprintln!("rustc not found, skipping");
        return;
    }
    let programs = [
        "iX = 3\niY = iX + 2\nsZ = \"a\" + \"b\"",
        "fX = iA iB -> iA + iB\niC = fX : 3 : 4 ;\nfX :: (5, 6) ;",
        "fiFact = iN -> if iN < 2 then 1 else iN * (fiFact : (iN - 1) ;)\nfiFact : 10 ;",
        "oPoint = iX iY -> struct\noP = oPoint : 1 : 2 ;\niX2 = oP . iX\noP.iY = 5\noP",
        "fFact = iN -> if iN < 2 then 1 else iN * (fFact : (iN - 1) ;)\nfFact : 7 ;",
        "fiF = iN -> iN + 1\nfiF = iN -> (fiF : iN ;) * 2\nfiF : 3 ;",
        "iS = 0\nfor iI = 1 to 4 do\n  iS = iS + iI\nendfor\naX = [iS, 2 * iS]\ntT = (aX[1], 0.5, 'c', true)",
    ];
    for source in programs {
        let interpreted: Vec<String> = Pipeline::new(Mode::Run, "p", source).collect();
        let compiled: Vec<String> = Pipeline::new(Mode::Compile, "p", source).collect();
        assert_eq!(interpreted[1..], compiled[1..], "diverged on:\n{source}");
    }
}
